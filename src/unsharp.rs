//! Unsharp-mask sharpening.

use crate::error::PipelineError;
use crate::options::ClampPolicy;
use crate::pixel::{Sample, clamp_sample};
use crate::ring::RowRing;
use crate::source::{EmbeddedProfile, RowBuffer, RowRequest, RowSource, SourceInfo, copy_row};

/// Normalised one-dimensional Gaussian, `2 * half + 1` taps wide.
#[derive(Clone, Debug)]
pub(crate) struct GaussianKernel {
    taps: Vec<f64>,
}

impl GaussianKernel {
    /// Sigma equals `radius`; the kernel reaches out to three sigma.
    pub(crate) fn new(radius: f64) -> Self {
        if radius <= 0.0 {
            return Self { taps: vec![1.0] };
        }
        let half = (3.0 * radius).ceil() as i64;
        let denom = 2.0 * radius * radius;
        let mut taps: Vec<f64> = (-half..=half)
            .map(|i| (-((i * i) as f64) / denom).exp())
            .collect();
        let sum: f64 = taps.iter().sum();
        taps.iter_mut().for_each(|t| *t /= sum);
        Self { taps }
    }

    pub(crate) fn width(&self) -> usize {
        self.taps.len()
    }

    pub(crate) fn half(&self) -> usize {
        self.taps.len() / 2
    }

    pub(crate) fn taps(&self) -> &[f64] {
        &self.taps
    }
}

fn check_param(name: &str, value: f64) -> Result<(), PipelineError> {
    if !value.is_finite() || value < 0.0 {
        return Err(PipelineError::InvalidParameter(format!(
            "unsharp mask {name} must be finite and non-negative, got {value}"
        )));
    }
    Ok(())
}

/// Horizontal Gaussian pass with edge columns replicated.
fn convolve_row(kernel: &GaussianKernel, spp: usize, raw: &[Sample], out: &mut [f64]) {
    let width = raw.len() / spp;
    let half = kernel.half() as i64;
    for (x, px) in out.chunks_exact_mut(spp).enumerate() {
        px.fill(0.0);
        for (k, &weight) in kernel.taps().iter().enumerate() {
            let sx = (x as i64 + k as i64 - half).clamp(0, width as i64 - 1) as usize;
            for (s, acc) in px.iter_mut().enumerate() {
                *acc += weight * f64::from(raw[sx * spp + s]);
            }
        }
    }
}

/// Sharpens by subtracting a Gaussian-blurred copy:
/// `out = (1 + amount) * original - amount * blurred`.
///
/// Samples whose change would be smaller than `threshold` (in sample units)
/// are left alone. Keeps one ring of raw upstream rows and one of
/// horizontally blurred rows, each as tall as the kernel, so rows must be
/// requested in non-decreasing order.
pub struct UnsharpMask<S> {
    source: S,
    kernel: GaussianKernel,
    amount: f64,
    threshold_sq: f64,
    raw: RowRing<Sample>,
    blurred: RowRing<f64>,
    acc: Vec<f64>,
    src_height: u32,
    info: SourceInfo,
    out: RowBuffer,
}

impl<S: RowSource> UnsharpMask<S> {
    pub fn new(source: S, radius: f64, amount: f64, threshold: f64) -> Result<Self, PipelineError> {
        check_param("radius", radius)?;
        check_param("amount", amount)?;
        check_param("threshold", threshold)?;
        let upstream = source.info();
        if upstream.samples_per_pixel == 0 {
            return Err(PipelineError::InvalidParameter(
                "unsharp mask: source has no samples per pixel".into(),
            ));
        }

        let kernel = GaussianKernel::new(radius);
        let row_len = upstream.row_len();
        let mut info = upstream.clone().blended();
        info.random_access = false;
        let out = RowBuffer::new(&info, source.clamp_policy(), "unsharp");
        Ok(Self {
            raw: RowRing::new(kernel.width(), row_len),
            blurred: RowRing::new(kernel.width(), row_len),
            acc: vec![0.0; row_len],
            src_height: upstream.height,
            source,
            kernel,
            amount,
            threshold_sq: threshold * threshold,
            info,
            out,
        })
    }

    fn produce(&mut self, row: u32) -> Result<(), PipelineError> {
        let spp = self.info.samples_per_pixel;
        let half = self.kernel.half() as i64;
        let last = i64::from(self.src_height) - 1;

        self.acc.fill(0.0);
        for (k, &weight) in self.kernel.taps().iter().enumerate() {
            let r = (i64::from(row) + k as i64 - half).clamp(0, last) as u32;
            let (raw, source, kernel) = (&mut self.raw, &mut self.source, &self.kernel);
            self.blurred.ensure(r, |dst| {
                raw.ensure(r, |raw_dst| copy_row(&mut *source, r, raw_dst))?;
                convolve_row(kernel, spp, raw.get(r), dst);
                Ok::<(), PipelineError>(())
            })?;
            for (acc, &v) in self.acc.iter_mut().zip(self.blurred.get(r)) {
                *acc += weight * v;
            }
        }

        let source = &mut self.source;
        self.raw.ensure(row, |dst| copy_row(&mut *source, row, dst))?;
        let original = self.raw.get(row);
        let samples = self.out.as_mut_slice().iter_mut().zip(original);
        for ((out, &orig), &blur) in samples.zip(&self.acc) {
            let orig = f64::from(orig);
            let sharpened = (1.0 + self.amount) * orig - self.amount * blur;
            let d = sharpened - orig;
            *out = if d * d < self.threshold_sq {
                orig as Sample
            } else {
                clamp_sample(sharpened)
            };
        }
        Ok(())
    }
}

impl<S: RowSource> RowSource for UnsharpMask<S> {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn clamp_policy(&self) -> ClampPolicy {
        self.out.policy()
    }

    fn row(&mut self, row: u32) -> Result<&[Sample], PipelineError> {
        if let RowRequest::Produce(row) = self.out.request(row)? {
            self.produce(row)?;
            self.out.commit(row);
        }
        Ok(self.out.as_slice())
    }

    fn embedded_profile(&self) -> Option<&EmbeddedProfile> {
        self.source.embedded_profile()
    }

    fn take_embedded_profile(&mut self) -> Option<EmbeddedProfile> {
        self.source.take_embedded_profile()
    }
}
