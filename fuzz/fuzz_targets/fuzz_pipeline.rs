#![no_main]
use libfuzzer_sys::fuzz_target;
use zenrows::{DecodeOptions, Limits, Pipeline, ResampleMethod};

fuzz_target!(|data: &[u8]| {
    // First two bytes pick the target size and method; the rest is the file.
    let [w, h, rest @ ..] = data else {
        return;
    };
    let options = DecodeOptions::default().with_limits(Limits {
        max_pixels: Some(1 << 20),
        max_memory_bytes: Some(32 << 20),
        ..Limits::default()
    });
    let Ok(pipeline) = Pipeline::from_bytes(rest.to_vec(), &options) else {
        return;
    };
    let method = match w % 5 {
        0 => ResampleMethod::Nearest,
        1 => ResampleMethod::Bilinear,
        2 => ResampleMethod::BoxFilter,
        3 => ResampleMethod::Lanczos { window: 1 + u32::from(*h % 4) },
        _ => ResampleMethod::Auto,
    };
    let width = u32::from(*w % 64) + 1;
    let height = u32::from(*h % 64) + 1;
    let Ok(pipeline) = pipeline.resample(width, height, method) else {
        return;
    };
    let Ok(pipeline) = pipeline.unsharp_mask(1.0, 0.5, 0.0) else {
        return;
    };
    let _ = pipeline.render_rgb8([255, 255, 255], &enough::Unstoppable);
});
