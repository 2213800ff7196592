//! Windowed-sinc resampling.
//!
//! Each destination coordinate maps to source position `c = d * src / dst`,
//! split into an integer origin and a fraction `f`. Tap `p` in
//! `-window..=window` reads source index `origin + p` (clamped to the edge)
//! with weight `sinc(f - p) * sinc((f - p) / window)`. Weights are normalised
//! per coordinate so flat areas stay flat.

use std::f64::consts::PI;

use super::check_target;
use crate::error::PipelineError;
use crate::options::ClampPolicy;
use crate::pixel::{Sample, clamp_sample};
use crate::ring::RowRing;
use crate::source::{EmbeddedProfile, RowBuffer, RowRequest, RowSource, SourceInfo, copy_row};

/// Half-width of the kernel when none is given.
pub const DEFAULT_LANCZOS_WINDOW: u32 = 6;

/// Largest accepted half-width.
pub const MAX_LANCZOS_WINDOW: u32 = 64;

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let x = x * PI;
        x.sin() / x
    }
}

/// Precomputed weights, one row of `2 * window + 1` taps per destination
/// coordinate.
pub(crate) struct CoefficientTable {
    window: i64,
    support: usize,
    origins: Vec<i64>,
    weights: Vec<f64>,
}

impl CoefficientTable {
    pub(crate) fn new(src: u32, dst: u32, window: u32) -> Self {
        let support = 2 * window as usize + 1;
        let w = f64::from(window);
        let mut origins = Vec::with_capacity(dst as usize);
        let mut weights = Vec::with_capacity(dst as usize * support);

        for d in 0..dst {
            let c = f64::from(d) * f64::from(src) / f64::from(dst);
            let origin = (u64::from(d) * u64::from(src) / u64::from(dst)) as i64;
            let f = c - origin as f64;
            origins.push(origin);

            let start = weights.len();
            for i in 0..support {
                let v = f - (i as f64 - w);
                weights.push(sinc(v) * sinc(v / w));
            }
            let row = &mut weights[start..];
            let sum: f64 = row.iter().sum();
            if sum.abs() > f64::EPSILON {
                row.iter_mut().for_each(|c| *c /= sum);
            }
        }

        Self {
            window: i64::from(window),
            support,
            origins,
            weights,
        }
    }

    pub(crate) fn support(&self) -> usize {
        self.support
    }

    /// Weights for destination coordinate `d`.
    pub(crate) fn weights(&self, d: usize) -> &[f64] {
        &self.weights[d * self.support..(d + 1) * self.support]
    }

    /// Clamped source index for tap `tap` of destination coordinate `d`.
    pub(crate) fn source_index(&self, d: usize, tap: usize, src_len: u32) -> u32 {
        let at = self.origins[d] + tap as i64 - self.window;
        at.clamp(0, i64::from(src_len) - 1) as u32
    }
}

fn check_window(window: u32) -> Result<(), PipelineError> {
    if !(1..=MAX_LANCZOS_WINDOW).contains(&window) {
        return Err(PipelineError::InvalidParameter(format!(
            "Lanczos window {window} outside 1..={MAX_LANCZOS_WINDOW}"
        )));
    }
    Ok(())
}

/// Windowed-sinc horizontal resize.
pub struct HLanczos<S> {
    source: S,
    table: CoefficientTable,
    src_width: u32,
    info: SourceInfo,
    out: RowBuffer,
}

impl<S: RowSource> HLanczos<S> {
    pub fn new(source: S, width: u32, window: u32) -> Result<Self, PipelineError> {
        let upstream = source.info();
        check_target("lanczos", upstream, width)?;
        check_window(window)?;
        let table = CoefficientTable::new(upstream.width, width, window);
        let src_width = upstream.width;
        let info = upstream.resized(width, upstream.height).blended();
        let out = RowBuffer::new(&info, source.clamp_policy(), "lanczos-h");
        Ok(Self {
            source,
            table,
            src_width,
            info,
            out,
        })
    }
}

impl<S: RowSource> RowSource for HLanczos<S> {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn clamp_policy(&self) -> ClampPolicy {
        self.out.policy()
    }

    fn row(&mut self, row: u32) -> Result<&[Sample], PipelineError> {
        if let RowRequest::Produce(row) = self.out.request(row)? {
            let spp = self.info.samples_per_pixel;
            let src = self.source.row(row)?;
            let dst = self.out.as_mut_slice();
            let table = &self.table;
            for (x, px) in dst.chunks_exact_mut(spp).enumerate() {
                for (s, out) in px.iter_mut().enumerate() {
                    let mut acc = 0.0;
                    for (tap, &weight) in table.weights(x).iter().enumerate() {
                        let sx = table.source_index(x, tap, self.src_width) as usize;
                        acc += f64::from(src[sx * spp + s]) * weight;
                    }
                    *out = clamp_sample(acc);
                }
            }
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

/// Windowed-sinc vertical resize.
///
/// Keeps the last `2 * window + 1` upstream rows in a ring, so rows must be
/// requested in non-decreasing order.
pub struct VLanczos<S> {
    source: S,
    table: CoefficientTable,
    src_height: u32,
    ring: RowRing<Sample>,
    acc: Vec<f64>,
    info: SourceInfo,
    out: RowBuffer,
}

impl<S: RowSource> VLanczos<S> {
    pub fn new(source: S, height: u32, window: u32) -> Result<Self, PipelineError> {
        let upstream = source.info();
        check_target("lanczos", upstream, height)?;
        check_window(window)?;
        let table = CoefficientTable::new(upstream.height, height, window);
        let src_height = upstream.height;
        let ring = RowRing::new(table.support(), upstream.row_len());
        let mut info = upstream.resized(upstream.width, height).blended();
        info.random_access = false;
        let out = RowBuffer::new(&info, source.clamp_policy(), "lanczos-v");
        Ok(Self {
            source,
            table,
            src_height,
            ring,
            acc: vec![0.0; info.row_len()],
            info,
            out,
        })
    }
}

impl<S: RowSource> RowSource for VLanczos<S> {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn clamp_policy(&self) -> ClampPolicy {
        self.out.policy()
    }

    fn row(&mut self, row: u32) -> Result<&[Sample], PipelineError> {
        if let RowRequest::Produce(row) = self.out.request(row)? {
            let y = row as usize;
            self.acc.fill(0.0);
            for tap in 0..self.table.support() {
                let sy = self.table.source_index(y, tap, self.src_height);
                let weight = self.table.weights(y)[tap];
                let source = &mut self.source;
                self.ring.ensure(sy, |dst| copy_row(&mut *source, sy, dst))?;
                for (acc, &v) in self.acc.iter_mut().zip(self.ring.get(sy)) {
                    *acc += f64::from(v) * weight;
                }
            }
            for (out, &acc) in self.out.as_mut_slice().iter_mut().zip(&self.acc) {
                *out = clamp_sample(acc);
            }
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

/// Two-axis windowed-sinc resize.
pub struct Lanczos<S> {
    inner: VLanczos<HLanczos<S>>,
}

impl<S: RowSource> Lanczos<S> {
    pub fn new(source: S, width: u32, height: u32, window: u32) -> Result<Self, PipelineError> {
        let horizontal = HLanczos::new(source, width, window)?;
        Ok(Self {
            inner: VLanczos::new(horizontal, height, window)?,
        })
    }

    pub fn with_default_window(source: S, width: u32, height: u32) -> Result<Self, PipelineError> {
        Self::new(source, width, height, DEFAULT_LANCZOS_WINDOW)
    }
}

impl<S: RowSource> RowSource for Lanczos<S> {
    fn info(&self) -> &SourceInfo {
        self.inner.info()
    }

    fn clamp_policy(&self) -> ClampPolicy {
        self.inner.clamp_policy()
    }

    fn row(&mut self, row: u32) -> Result<&[Sample], PipelineError> {
        self.inner.row(row)
    }

    fn embedded_profile(&self) -> Option<&EmbeddedProfile> {
        self.inner.embedded_profile()
    }

    fn take_embedded_profile(&mut self) -> Option<EmbeddedProfile> {
        self.inner.take_embedded_profile()
    }
}
