//! In-memory BMP and TIFF builders shared by the integration tests.

#![allow(dead_code)]

use zenrows::{AlphaMode, PixelBufferSource, PixelLayout, RowSource, Sample};

/// Route `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// A BMP with a 40-byte info header. `file_rows` are the stored rows in file
/// order, unpadded; `height` is negative for top-down storage.
pub fn bmp(
    width: u32,
    height: i32,
    bits: u16,
    palette: &[[u8; 3]],
    file_rows: &[Vec<u8>],
) -> Vec<u8> {
    let stride = (bits as usize * width as usize).div_ceil(32) * 4;
    let image_start = 14 + 40 + palette.len() * 4;
    let file_size = image_start + stride * file_rows.len();

    let mut out = Vec::with_capacity(file_size);
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&(file_size as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(image_start as u32).to_le_bytes());

    out.extend_from_slice(&40u32.to_le_bytes());
    out.extend_from_slice(&(width as i32).to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&bits.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // compression
    out.extend_from_slice(&((stride * file_rows.len()) as u32).to_le_bytes());
    out.extend_from_slice(&11811i32.to_le_bytes()); // 300 dpi
    out.extend_from_slice(&11811i32.to_le_bytes());
    out.extend_from_slice(&(palette.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    for [b, g, r] in palette {
        out.extend_from_slice(&[*b, *g, *r, 0]);
    }
    for row in file_rows {
        let mut padded = row.clone();
        padded.resize(stride, 0);
        out.extend_from_slice(&padded);
    }
    out
}

/// A 24-bit BMP from RGB pixels given in file order (bottom row first).
pub fn bmp24(width: u32, file_rows: &[Vec<[u8; 3]>]) -> Vec<u8> {
    let rows: Vec<Vec<u8>> = file_rows
        .iter()
        .map(|row| row.iter().flat_map(|&[r, g, b]| [b, g, r]).collect())
        .collect();
    bmp(width, file_rows.len() as i32, 24, &[], &rows)
}

/// One TIFF sub-image. Pixel data goes in `chunks`, one per strip or tile.
#[derive(Clone, Debug, Default)]
pub struct TiffImage {
    pub width: u32,
    pub height: u32,
    pub bits: u16,
    pub spp: u16,
    pub photometric: u16,
    /// 1 (none) or 32773 (PackBits).
    pub compression: u16,
    pub rows_per_strip: Option<u32>,
    pub tile: Option<(u32, u32)>,
    pub chunks: Vec<Vec<u8>>,
    pub color_map: Option<Vec<u16>>,
    /// Resolution value and unit (2 inch, 3 centimetre).
    pub resolution: Option<(u32, u16)>,
    pub ink_set: Option<u16>,
    pub icc: Option<Vec<u8>>,
}

impl TiffImage {
    /// An uncompressed single-strip image.
    pub fn strip(
        width: u32,
        height: u32,
        bits: u16,
        spp: u16,
        photometric: u16,
        data: Vec<u8>,
    ) -> Self {
        Self {
            width,
            height,
            bits,
            spp,
            photometric,
            compression: 1,
            chunks: vec![data],
            ..Self::default()
        }
    }
}

const SHORT: u16 = 3;
const LONG: u16 = 4;
const RATIONAL: u16 = 5;
const UNDEFINED: u16 = 7;

/// Serialise `images` as a chain of directories, in order.
pub fn tiff(big_endian: bool, images: &[TiffImage]) -> Vec<u8> {
    let u16b = |v: u16| if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
    let u32b = |v: u32| if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
    let shorts = |vs: &[u16]| vs.iter().flat_map(|&v| u16b(v)).collect::<Vec<u8>>();
    let longs = |vs: &[u32]| vs.iter().flat_map(|&v| u32b(v)).collect::<Vec<u8>>();

    let mut out = Vec::new();
    out.extend_from_slice(if big_endian { b"MM\0*" } else { b"II*\0" });
    out.extend_from_slice(&[0; 4]);
    let mut link_at = 4usize;

    for img in images {
        let mut offsets = Vec::new();
        let mut counts = Vec::new();
        for chunk in &img.chunks {
            offsets.push(out.len() as u32);
            counts.push(chunk.len() as u32);
            out.extend_from_slice(chunk);
        }

        // (tag, type, count, value bytes)
        let mut entries: Vec<(u16, u16, u32, Vec<u8>)> = vec![
            (256, LONG, 1, longs(&[img.width])),
            (257, LONG, 1, longs(&[img.height])),
            (258, SHORT, u32::from(img.spp), shorts(&vec![img.bits; usize::from(img.spp)])),
            (259, SHORT, 1, shorts(&[img.compression.max(1)])),
            (262, SHORT, 1, shorts(&[img.photometric])),
            (277, SHORT, 1, shorts(&[img.spp])),
        ];
        let n = offsets.len() as u32;
        match img.tile {
            Some((tw, th)) => {
                entries.push((322, LONG, 1, longs(&[tw])));
                entries.push((323, LONG, 1, longs(&[th])));
                entries.push((324, LONG, n, longs(&offsets)));
                entries.push((325, LONG, n, longs(&counts)));
            }
            None => {
                entries.push((273, LONG, n, longs(&offsets)));
                if let Some(rows) = img.rows_per_strip {
                    entries.push((278, LONG, 1, longs(&[rows])));
                }
                entries.push((279, LONG, n, longs(&counts)));
            }
        }
        if let Some((value, unit)) = img.resolution {
            entries.push((282, RATIONAL, 1, longs(&[value, 1])));
            entries.push((283, RATIONAL, 1, longs(&[value, 1])));
            entries.push((296, SHORT, 1, shorts(&[unit])));
        }
        if let Some(map) = &img.color_map {
            entries.push((320, SHORT, map.len() as u32, shorts(map)));
        }
        if let Some(ink) = img.ink_set {
            entries.push((332, SHORT, 1, shorts(&[ink])));
        }
        if let Some(icc) = &img.icc {
            entries.push((34675, UNDEFINED, icc.len() as u32, icc.clone()));
        }
        entries.sort_by_key(|e| e.0);

        if out.len() % 2 == 1 {
            out.push(0);
        }
        let ifd_at = out.len() as u32;
        out[link_at..link_at + 4].copy_from_slice(&u32b(ifd_at));

        let mut extra_at = ifd_at as usize + 2 + entries.len() * 12 + 4;
        let mut extra = Vec::new();
        out.extend_from_slice(&u16b(entries.len() as u16));
        for (tag, kind, count, bytes) in entries {
            out.extend_from_slice(&u16b(tag));
            out.extend_from_slice(&u16b(kind));
            out.extend_from_slice(&u32b(count));
            if bytes.len() <= 4 {
                let mut field = bytes.clone();
                field.resize(4, 0);
                out.extend_from_slice(&field);
            } else {
                out.extend_from_slice(&u32b(extra_at as u32));
                extra_at += bytes.len();
                extra.extend_from_slice(&bytes);
                if bytes.len() % 2 == 1 {
                    extra.push(0);
                    extra_at += 1;
                }
            }
        }
        link_at = out.len();
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&extra);
    }
    out
}

/// A random-access RGB source filled with one colour.
pub fn uniform_rgb(width: u32, height: u32, rgb: [u8; 3]) -> PixelBufferSource {
    let pixels = rgb.repeat((width * height) as usize);
    PixelBufferSource::new(
        pixels,
        width,
        height,
        width as usize * 3,
        PixelLayout::Rgb8,
        AlphaMode::Preserve,
    )
    .unwrap()
}

/// An RGB source from packed pixels.
pub fn rgb_source(width: u32, height: u32, pixels: Vec<u8>) -> PixelBufferSource {
    PixelBufferSource::new(
        pixels,
        width,
        height,
        width as usize * 3,
        PixelLayout::Rgb8,
        AlphaMode::Preserve,
    )
    .unwrap()
}

/// Copy out every row of `source`.
pub fn collect_rows(source: &mut dyn RowSource) -> Vec<Vec<Sample>> {
    (0..source.info().height)
        .map(|y| source.row(y).unwrap().to_vec())
        .collect()
}
