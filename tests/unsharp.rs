mod common;

use common::*;
use zenrows::*;

/// Left half at `left`, right half at `right`, in every channel.
fn step(width: u32, height: u32, left: u8, right: u8) -> PixelBufferSource {
    let pixels: Vec<u8> = (0..height)
        .flat_map(|_| (0..width).flat_map(move |x| [if x < width / 2 { left } else { right }; 3]))
        .collect();
    rgb_source(width, height, pixels)
}

#[test]
fn zero_amount_is_identity() {
    init_logging();
    let pixels: Vec<u8> = (0..9u32 * 7)
        .flat_map(|i| [(i * 37 % 256) as u8, (i * 11) as u8, 200])
        .collect();
    let mut original = rgb_source(9, 7, pixels.clone());
    let expected = collect_rows(&mut original);

    let mut out = UnsharpMask::new(rgb_source(9, 7, pixels), 2.0, 0.0, 0.0).unwrap();
    assert_eq!(collect_rows(&mut out), expected);
}

#[test]
fn uniform_image_is_unchanged() {
    for radius in [0.5, 1.0, 3.0] {
        let source = uniform_rgb(12, 10, [80, 160, 240]);
        let mut out = UnsharpMask::new(source, radius, 1.5, 0.0).unwrap();
        let expected = [80, 160, 240].map(eight_to_sample);
        for row in collect_rows(&mut out) {
            for px in row.chunks_exact(3) {
                assert_eq!(px, expected, "radius {radius}");
            }
        }
    }
}

#[test]
fn edges_gain_contrast() {
    let mut out = UnsharpMask::new(step(10, 5, 100, 150), 1.0, 1.0, 0.0).unwrap();
    let row = out.row(2).unwrap().to_vec();
    let dark = eight_to_sample(100);
    let light = eight_to_sample(150);
    // Pixels 4 and 5 sit either side of the step.
    assert!(row[4 * 3] < dark, "{} !< {dark}", row[4 * 3]);
    assert!(row[5 * 3] > light, "{} !> {light}", row[5 * 3]);
    // Far from the edge nothing changes.
    assert_eq!(row[0], dark);
    assert_eq!(row[9 * 3], light);
}

#[test]
fn threshold_gates_small_changes() {
    let mut out = UnsharpMask::new(step(10, 5, 100, 104), 1.0, 0.5, 10_000.0).unwrap();
    let mut plain = step(10, 5, 100, 104);
    assert_eq!(collect_rows(&mut out), collect_rows(&mut plain));
}

#[test]
fn output_is_clamped() {
    let mut out = UnsharpMask::new(step(8, 3, 0, 255), 1.0, 5.0, 0.0).unwrap();
    let row = out.row(1).unwrap();
    assert_eq!(row[3 * 3], 0);
    assert_eq!(row[4 * 3], SAMPLE_MAX);
}

#[test]
fn rejects_bad_parameters() {
    let bad = [(f64::NAN, 1.0, 0.0), (1.0, -0.5, 0.0), (1.0, 1.0, f64::INFINITY)];
    for (radius, amount, threshold) in bad {
        assert!(matches!(
            UnsharpMask::new(uniform_rgb(2, 2, [0, 0, 0]), radius, amount, threshold),
            Err(PipelineError::InvalidParameter(_))
        ));
    }
}

#[test]
fn forward_only_and_keeps_profile_chain() {
    let out = UnsharpMask::new(uniform_rgb(4, 4, [1, 1, 1]), 1.0, 1.0, 0.0).unwrap();
    assert!(!out.info().random_access);
    assert!(out.embedded_profile().is_none());
}

#[test]
fn row_past_end_serves_last_row() {
    let mut out = UnsharpMask::new(step(6, 4, 10, 200), 1.0, 1.0, 0.0).unwrap();
    let rows = collect_rows(&mut out);
    assert_eq!(out.row(4).unwrap(), &rows[3][..]);
}
