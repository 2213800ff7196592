mod common;

use common::*;
use zenrows::resample::*;
use zenrows::*;

#[test]
fn box_filter_keeps_uniform_colour() {
    init_logging();
    for (w, h) in [(7, 5), (3, 3), (1, 1), (10, 2)] {
        let mut out = BoxDownsample::new(uniform_rgb(10, 6, [12, 200, 77]), w, h.min(6)).unwrap();
        let expected = [eight_to_sample(12), eight_to_sample(200), eight_to_sample(77)];
        for row in collect_rows(&mut out) {
            for px in row.chunks_exact(3) {
                assert_eq!(px, expected, "{w}x{h}");
            }
        }
    }
}

#[test]
fn box_filter_averages_blocks() {
    // 4x1 row: black, white, black, white -> 2x1 mid grey.
    let pixels = [0u8, 0, 0, 255, 255, 255, 0, 0, 0, 255, 255, 255].to_vec();
    let mut out = HBoxDownsample::new(rgb_source(4, 1, pixels), 2).unwrap();
    let row = out.row(0).unwrap();
    assert!(row.iter().all(|&v| v == 32768), "{row:?}");
}

#[test]
fn lanczos_stays_in_range_around_a_bright_pixel() {
    let (w, h) = (5u32, 5u32);
    let mut pixels = vec![0u8; (w * h * 3) as usize];
    let centre = ((2 * w + 2) * 3) as usize;
    pixels[centre..centre + 3].copy_from_slice(&[255, 255, 255]);

    let mut out = Lanczos::with_default_window(rgb_source(w, h, pixels), w * 4, h * 4).unwrap();
    assert_eq!(out.info().width, 20);
    let rows = collect_rows(&mut out);
    assert_eq!(rows.len(), 20);
    // Ringing is clamped rather than wrapped; the peak survives.
    let peak = rows.iter().flatten().copied().max().unwrap();
    assert!(peak > SAMPLE_MAX / 2);
    assert!(rows.iter().flatten().any(|&v| v == 0));
}

#[test]
fn lanczos_keeps_uniform_colour() {
    for (w, h) in [(13, 9), (4, 4), (30, 2)] {
        let mut out = Lanczos::new(uniform_rgb(8, 8, [90, 90, 250]), w, h, 3).unwrap();
        for row in collect_rows(&mut out) {
            for px in row.chunks_exact(3) {
                assert_eq!(px, [eight_to_sample(90), eight_to_sample(90), eight_to_sample(250)]);
            }
        }
    }
}

#[test]
fn lanczos_is_forward_only() {
    let strict = PixelBufferSource::with_policy(
        vec![0; 4 * 4 * 3],
        4,
        4,
        12,
        PixelLayout::Rgb8,
        AlphaMode::Preserve,
        ClampPolicy::Strict,
    )
    .unwrap();
    let mut out = Lanczos::new(strict, 8, 8, 2).unwrap();
    assert!(!out.info().random_access);
    out.row(5).unwrap();
    assert!(matches!(
        out.row(2),
        Err(PipelineError::NonMonotonic {
            requested: 2,
            current: 5
        })
    ));
}

#[test]
fn bilinear_keeps_uniform_colour_and_endpoints() {
    let mut flat = Bilinear::new(uniform_rgb(3, 3, [40, 50, 60]), 11, 7).unwrap();
    for row in collect_rows(&mut flat) {
        for px in row.chunks_exact(3) {
            assert_eq!(px, [eight_to_sample(40), eight_to_sample(50), eight_to_sample(60)]);
        }
    }

    // Horizontal ramp 0..=255 across 4 pixels, enlarged to 10.
    let pixels: Vec<u8> = [0u8, 85, 170, 255].iter().flat_map(|&v| [v, v, v]).collect();
    let mut ramp = HBilinear::new(rgb_source(4, 1, pixels), 10).unwrap();
    let row = ramp.row(0).unwrap();
    assert_eq!(row[0], 0);
    assert_eq!(row[27], SAMPLE_MAX);
    assert!(row.chunks_exact(3).zip(row.chunks_exact(3).skip(1)).all(|(a, b)| a[0] <= b[0]));
}

#[test]
fn nearest_halving_picks_even_pixels() {
    let (w, h) = (6u32, 4u32);
    let pixels: Vec<u8> = (0..h)
        .flat_map(|y| (0..w).flat_map(move |x| [(y * 10 + x) as u8, 0, 0]))
        .collect();
    let mut out = Nearest::new(rgb_source(w, h, pixels), 3, 2).unwrap();
    let rows = collect_rows(&mut out);
    let red = |row: &Vec<Sample>| row.chunks_exact(3).map(|p| p[0]).collect::<Vec<_>>();
    assert_eq!(red(&rows[0]), [0, 2, 4].map(eight_to_sample));
    assert_eq!(red(&rows[1]), [20, 22, 24].map(eight_to_sample));
}

#[test]
fn single_axis_stages_compose_by_hand() {
    let horizontal = HNearest::new(uniform_rgb(4, 4, [1, 2, 3]), 2).unwrap();
    let mut both = VBilinear::new(horizontal, 6).unwrap();
    assert_eq!((both.info().width, both.info().height), (2, 6));
    let expected = [1, 2, 3].map(eight_to_sample);
    assert_eq!(both.row(5).unwrap()[..3], expected);
}

#[test]
fn resolution_follows_scale() {
    let src = uniform_rgb(100, 50, [0, 0, 0]).with_resolution(300.0, 300.0);
    let out = resample(Box::new(src), 50, 100, ResampleMethod::Nearest).unwrap();
    assert_eq!(out.info().xres, 150.0);
    assert_eq!(out.info().yres, 600.0);
}

#[test]
fn row_past_end_serves_last_row_everywhere() {
    for method in [
        ResampleMethod::Nearest,
        ResampleMethod::Bilinear,
        ResampleMethod::BoxFilter,
        ResampleMethod::Lanczos { window: 3 },
    ] {
        let pixels: Vec<u8> = (0..8u8 * 8).flat_map(|i| [i * 3, i, 255 - i]).collect();
        let mut out = resample(Box::new(rgb_source(8, 8, pixels)), 4, 4, method).unwrap();
        let last = out.row(3).unwrap().to_vec();
        assert_eq!(out.row(4).unwrap(), &last[..], "{method:?}");
    }
}

#[test]
fn oversized_lanczos_window_is_rejected() {
    for window in [0, resample::MAX_LANCZOS_WINDOW + 1, u32::MAX] {
        let source = Box::new(uniform_rgb(8, 8, [9, 9, 9]));
        let result = resample(source, 4, 4, ResampleMethod::Lanczos { window });
        assert!(
            matches!(result, Err(PipelineError::InvalidParameter(_))),
            "window {window}"
        );
    }
}
