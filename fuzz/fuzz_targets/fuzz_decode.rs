#![no_main]
use libfuzzer_sys::fuzz_target;
use zenrows::{BmpSource, ClampPolicy, DecodeOptions, Limits, RowSource, TiffSource};

fn drain(source: &mut dyn RowSource) {
    for y in 0..source.info().height {
        if source.row(y).is_err() {
            return;
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let limits = Limits {
        max_pixels: Some(1 << 22),
        max_memory_bytes: Some(64 << 20),
        ..Limits::default()
    };
    for clamp in [ClampPolicy::Lenient, ClampPolicy::Strict] {
        let options = DecodeOptions::default()
            .with_limits(limits.clone())
            .with_clamp_policy(clamp)
            .with_strip_height(7);

        // Each decoder on its own, whatever the signature says must never panic
        if let Ok(mut src) = BmpSource::from_bytes(data.to_vec(), &options) {
            drain(&mut src);
        }
        if let Ok(mut src) = TiffSource::from_bytes(data.to_vec(), &options) {
            drain(&mut src);
        }
    }
});
