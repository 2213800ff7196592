#![cfg(feature = "tiff")]

mod common;

use common::*;
use zenrows::*;

const MIN_IS_WHITE: u16 = 0;
const MIN_IS_BLACK: u16 = 1;
const RGB: u16 = 2;
const PALETTE: u16 = 3;
const SEPARATED: u16 = 5;

fn decode(data: Vec<u8>) -> TiffSource<std::io::Cursor<Vec<u8>>> {
    TiffSource::from_bytes(data, &DecodeOptions::default()).unwrap()
}

#[test]
fn largest_sub_image_wins() {
    init_logging();
    let images = [
        TiffImage::strip(100, 100, 8, 1, MIN_IS_BLACK, vec![0; 100 * 100]),
        TiffImage::strip(400, 300, 8, 1, MIN_IS_BLACK, vec![7; 400 * 300]),
        TiffImage::strip(50, 50, 8, 1, MIN_IS_BLACK, vec![0; 50 * 50]),
    ];
    let mut src = decode(tiff(false, &images));
    assert_eq!((src.info().width, src.info().height), (400, 300));
    assert_eq!(src.row(299).unwrap()[399], SAMPLE_MAX - eight_to_sample(7));
}

#[test]
fn grey_polarity() {
    let black = TiffImage::strip(2, 1, 8, 1, MIN_IS_BLACK, vec![0, 255]);
    let mut black = decode(tiff(false, &[black]));
    assert_eq!(black.info().color_type, ColorType::Grey);
    assert_eq!(black.row(0).unwrap(), &[SAMPLE_MAX, 0]);

    let white = TiffImage::strip(2, 1, 8, 1, MIN_IS_WHITE, vec![0, 255]);
    let mut white = decode(tiff(false, &[white]));
    assert_eq!(white.row(0).unwrap(), &[0, SAMPLE_MAX]);
}

#[test]
fn bilevel_partial_final_byte() {
    let data = vec![0b1010_0000, 0b1100_0000];
    let mut src = decode(tiff(false, &[TiffImage::strip(10, 1, 1, 1, MIN_IS_WHITE, data)]));
    assert_eq!(src.info().color_type, ColorType::BlackWhite);
    let m = SAMPLE_MAX;
    assert_eq!(src.row(0).unwrap(), &[m, 0, m, 0, 0, 0, 0, 0, m, m]);
}

#[test]
fn palette_becomes_grey() {
    let mut map = vec![0u16; 3 * 256];
    for channel in 0..3 {
        map[channel * 256 + 1] = 0xffff;
        map[channel * 256 + 2] = 0x8000;
    }
    let mut image = TiffImage::strip(3, 1, 8, 1, PALETTE, vec![0, 1, 2]);
    image.color_map = Some(map);
    let mut src = decode(tiff(false, &[image]));
    assert_eq!(src.info().color_type, ColorType::Grey);
    assert_eq!(src.row(0).unwrap(), &[SAMPLE_MAX, 0, SAMPLE_MAX - eight_to_sample(0x80)]);
}

#[test]
fn packbits_strip() {
    let packed = vec![3, 1, 2, 3, 4, 0xfd, 9];
    let mut image = TiffImage::strip(4, 2, 8, 1, MIN_IS_WHITE, packed);
    image.compression = 32773;
    let mut src = decode(tiff(false, &[image]));
    let expand = |v: &[u8]| v.iter().map(|&b| eight_to_sample(b)).collect::<Vec<_>>();
    assert_eq!(src.row(0).unwrap(), &expand(&[1, 2, 3, 4])[..]);
    assert_eq!(src.row(1).unwrap(), &expand(&[9, 9, 9, 9])[..]);
}

#[test]
fn packbits_byte_count_larger_than_the_strip() {
    let packed = vec![3, 1, 2, 3, 4, 0xfd, 9];
    let mut image = TiffImage::strip(4, 2, 8, 1, MIN_IS_WHITE, packed);
    image.compression = 32773;
    let mut data = tiff(false, &[image]);
    // StripByteCounts, LONG, count 1.
    let entry = [0x17, 0x01, 4, 0, 1, 0, 0, 0];
    let at = data.windows(8).position(|w| w == entry).unwrap() + 8;
    data[at..at + 4].copy_from_slice(&u32::MAX.to_le_bytes());

    let mut src = decode(data);
    let expand = |v: &[u8]| v.iter().map(|&b| eight_to_sample(b)).collect::<Vec<_>>();
    assert_eq!(src.row(0).unwrap(), &expand(&[1, 2, 3, 4])[..]);
    assert_eq!(src.row(1).unwrap(), &expand(&[9, 9, 9, 9])[..]);
}

#[test]
fn tiles_are_stitched_into_rows() {
    let image = TiffImage {
        width: 20,
        height: 5,
        bits: 8,
        spp: 1,
        photometric: MIN_IS_WHITE,
        compression: 1,
        tile: Some((16, 16)),
        chunks: vec![vec![10; 16 * 16], vec![20; 16 * 16]],
        ..TiffImage::default()
    };
    let mut src = decode(tiff(false, &[image]));
    let row = src.row(4).unwrap();
    assert_eq!(row.len(), 20);
    assert!(row[..16].iter().all(|&v| v == eight_to_sample(10)));
    assert!(row[16..].iter().all(|&v| v == eight_to_sample(20)));
}

#[test]
fn big_endian_sixteen_bit_rgb() {
    let data = vec![0x12, 0x34, 0x00, 0x01, 0xff, 0xff];
    let mut src = decode(tiff(true, &[TiffImage::strip(1, 1, 16, 3, RGB, data)]));
    assert_eq!(src.info().color_type, ColorType::Rgb);
    assert_eq!(src.row(0).unwrap(), &[0x1234, 1, SAMPLE_MAX]);
}

#[test]
fn separated_cmyk_records_ink_set() {
    let mut image = TiffImage::strip(1, 1, 8, 4, SEPARATED, vec![255, 0, 0, 128]);
    image.ink_set = Some(1);
    let mut src = decode(tiff(false, &[image]));
    assert_eq!(src.info().color_type, ColorType::Cmyk);
    assert_eq!(src.ink_set(), Some(InkSet::Cmyk));
    assert_eq!(src.row(0).unwrap(), &[SAMPLE_MAX, 0, 0, eight_to_sample(128)]);
}

#[test]
fn six_inks_are_device_n() {
    let src = decode(tiff(false, &[TiffImage::strip(1, 1, 8, 6, SEPARATED, vec![0; 6])]));
    assert_eq!(src.info().color_type, ColorType::DeviceN(6));
    assert_eq!(src.info().samples_per_pixel, 6);
}

#[test]
fn embedded_profile_is_handed_over_once() {
    let mut image = TiffImage::strip(1, 1, 8, 3, RGB, vec![0, 0, 0]);
    image.icc = Some(b"not-really-an-icc-profile".to_vec());
    let mut src = decode(tiff(false, &[image]));
    assert_eq!(
        src.embedded_profile().map(|p| p.as_bytes()),
        Some(&b"not-really-an-icc-profile"[..])
    );
    let taken = src.take_embedded_profile().unwrap();
    assert_eq!(taken.into_bytes().len(), 25);
    assert!(src.take_embedded_profile().is_none());
}

#[test]
fn resolution_in_centimetres_is_converted() {
    let mut image = TiffImage::strip(1, 1, 8, 1, MIN_IS_WHITE, vec![0]);
    image.resolution = Some((100, 3));
    let src = decode(tiff(false, &[image]));
    assert!((src.info().xres - 254.0).abs() < 1e-9);

    let mut image = TiffImage::strip(1, 1, 8, 1, MIN_IS_WHITE, vec![0]);
    image.resolution = Some((600, 2));
    let src = decode(tiff(false, &[image]));
    assert_eq!(src.info().yres, 600.0);
}

#[test]
fn one_row_strips_in_any_order() {
    let image = TiffImage {
        width: 2,
        height: 4,
        bits: 8,
        spp: 1,
        photometric: MIN_IS_WHITE,
        compression: 1,
        rows_per_strip: Some(1),
        chunks: (0..4u8).map(|i| vec![i * 10; 2]).collect(),
        ..TiffImage::default()
    };
    let mut src = decode(tiff(false, &[image]));
    for y in [3, 0, 2, 1, 3] {
        assert_eq!(src.row(y).unwrap()[1], eight_to_sample(y as u8 * 10), "row {y}");
    }
}

#[test]
fn short_strip_is_zero_filled_or_rejected() {
    let image = TiffImage::strip(2, 2, 8, 1, MIN_IS_WHITE, vec![5, 5]);
    let data = tiff(false, &[image]);

    let mut lenient = decode(data.clone());
    assert_eq!(lenient.row(1).unwrap(), &[0, 0]);

    let strict = DecodeOptions::default().with_clamp_policy(ClampPolicy::Strict);
    let mut src = TiffSource::from_bytes(data, &strict).unwrap();
    assert!(matches!(src.row(0), Err(PipelineError::InvalidData(_))));
}

#[test]
fn unsupported_compression_rejected() {
    let mut image = TiffImage::strip(1, 1, 8, 1, MIN_IS_WHITE, vec![0]);
    image.compression = 5;
    assert!(matches!(
        TiffSource::from_bytes(tiff(false, &[image]), &DecodeOptions::default()),
        Err(PipelineError::UnsupportedVariant(_))
    ));
}

#[test]
fn bigtiff_rejected() {
    let data = b"II\x2b\x00\x08\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00".to_vec();
    assert!(matches!(
        TiffSource::from_bytes(data, &DecodeOptions::default()),
        Err(PipelineError::UnsupportedVariant(_))
    ));
}

#[test]
fn open_detects_tiff() {
    let data = tiff(true, &[TiffImage::strip(3, 2, 8, 3, RGB, vec![0; 18])]);
    let src = open_bytes(data, &DecodeOptions::default()).unwrap();
    assert_eq!(src.info().color_type, ColorType::Rgb);
    assert!(src.info().random_access);
}
