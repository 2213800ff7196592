#!/usr/bin/env -S cargo +nightly -Zscript
//! Generate seed corpus files for fuzzing.
//! Run: cargo +nightly -Zscript fuzz/generate_seeds.rs

fn main() {
    use std::fs;
    let dir = "fuzz/corpus/fuzz_decode";
    fs::create_dir_all(dir).unwrap();

    // Minimal BMP 1x1 24-bit, bottom-up
    let mut bmp = vec![0u8; 58]; // 54 header + 4 pixel (3 + 1 padding)
    bmp[0] = b'B'; bmp[1] = b'M';
    bmp[2..6].copy_from_slice(&58u32.to_le_bytes()); // file size
    bmp[10..14].copy_from_slice(&54u32.to_le_bytes()); // data offset
    bmp[14..18].copy_from_slice(&40u32.to_le_bytes()); // info header size
    bmp[18..22].copy_from_slice(&1i32.to_le_bytes()); // width
    bmp[22..26].copy_from_slice(&1i32.to_le_bytes()); // height
    bmp[26..28].copy_from_slice(&1u16.to_le_bytes()); // planes
    bmp[28..30].copy_from_slice(&24u16.to_le_bytes()); // bpp
    bmp[54] = 0xff; bmp[55] = 0x00; bmp[56] = 0x00; // BGR
    fs::write(format!("{dir}/bmp_1x1.bmp"), &bmp).unwrap();

    // OS/2 header, 8-bit palette 2x1
    let mut os2 = b"BM\0\0\0\0\0\0\0\0".to_vec();
    os2.extend_from_slice(&(14u32 + 12 + 256 * 3).to_le_bytes());
    os2.extend_from_slice(&12u32.to_le_bytes());
    os2.extend_from_slice(&2u16.to_le_bytes());
    os2.extend_from_slice(&1u16.to_le_bytes());
    os2.extend_from_slice(&1u16.to_le_bytes());
    os2.extend_from_slice(&8u16.to_le_bytes());
    os2.extend((0..=255u8).flat_map(|i| [i, i, i]));
    os2.extend_from_slice(&[0, 255, 0, 0]);
    fs::write(format!("{dir}/bmp_os2_palette.bmp"), os2).unwrap();

    // TIFF 2x2 grey, min-is-black, single strip
    let mut tif = b"II*\0\x0c\0\0\0".to_vec();
    tif.extend_from_slice(&[0x00, 0x40, 0x80, 0xff]);
    let entries: [(u16, u16, u32, u32); 8] = [
        (256, 3, 1, 2),   // width
        (257, 3, 1, 2),   // height
        (258, 3, 1, 8),   // bits per sample
        (259, 3, 1, 1),   // no compression
        (262, 3, 1, 1),   // min-is-black
        (273, 4, 1, 8),   // strip offset
        (277, 3, 1, 1),   // samples per pixel
        (279, 4, 1, 4),   // strip byte count
    ];
    tif.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (tag, kind, count, value) in entries {
        tif.extend_from_slice(&tag.to_le_bytes());
        tif.extend_from_slice(&kind.to_le_bytes());
        tif.extend_from_slice(&count.to_le_bytes());
        tif.extend_from_slice(&value.to_le_bytes());
    }
    tif.extend_from_slice(&0u32.to_le_bytes());
    fs::write(format!("{dir}/tiff_grey_2x2.tif"), &tif).unwrap();

    // Truncated/malformed seeds for edge coverage
    fs::write(format!("{dir}/empty.bin"), b"").unwrap();
    fs::write(format!("{dir}/bm_short.bin"), b"BM\x00\x00").unwrap();
    fs::write(format!("{dir}/ii_short.bin"), b"II*\0").unwrap();
    fs::write(format!("{dir}/bigtiff.bin"), b"II+\0\x08\0\0\0\0\0\0\0").unwrap();
    fs::write(format!("{dir}/tiff_loop.bin"), b"II*\0\x08\0\0\0\0\0\x08\0\0\0").unwrap();

    let pipeline = "fuzz/corpus/fuzz_pipeline";
    fs::create_dir_all(pipeline).unwrap();
    for (i, seed) in [bmp, tif].into_iter().enumerate() {
        let mut data = vec![(i * 3) as u8, 5];
        data.extend_from_slice(&seed);
        fs::write(format!("{pipeline}/seed_{i}.bin"), data).unwrap();
    }

    println!("Generated seed corpora in fuzz/corpus/");
}
