use super::check_target;
use crate::error::PipelineError;
use crate::options::ClampPolicy;
use crate::pixel::Sample;
use crate::ring::RowRing;
use crate::source::{EmbeddedProfile, RowBuffer, RowRequest, RowSource, SourceInfo, copy_row};

const ONE: u32 = 1 << 16;

/// Left/top neighbour and 16.16 weight of the right/bottom neighbour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Tap {
    index: u32,
    frac: u32,
}

/// Endpoint-aligned mapping: destination 0 lands on source 0 and the last
/// destination coordinate on the last source coordinate.
fn taps(src: u32, dst: u32) -> Vec<Tap> {
    (0..dst)
        .map(|d| {
            let pos = if dst > 1 {
                u64::from(d) * u64::from(src - 1) * u64::from(ONE) / u64::from(dst - 1)
            } else {
                0
            };
            Tap {
                index: (pos >> 16) as u32,
                frac: (pos & u64::from(ONE - 1)) as u32,
            }
        })
        .collect()
}

#[inline]
fn blend(a: Sample, b: Sample, frac: u32) -> Sample {
    ((u32::from(a) * (ONE - frac) + u32::from(b) * frac + (ONE >> 1)) >> 16) as Sample
}

/// Bilinear horizontal resize.
pub struct HBilinear<S> {
    source: S,
    taps: Vec<Tap>,
    src_width: u32,
    info: SourceInfo,
    out: RowBuffer,
}

impl<S: RowSource> HBilinear<S> {
    pub fn new(source: S, width: u32) -> Result<Self, PipelineError> {
        let upstream = source.info();
        check_target("bilinear", upstream, width)?;
        let info = upstream.resized(width, upstream.height).blended();
        let taps = taps(upstream.width, width);
        let src_width = upstream.width;
        let out = RowBuffer::new(&info, source.clamp_policy(), "bilinear-h");
        Ok(Self {
            source,
            taps,
            src_width,
            info,
            out,
        })
    }
}

impl<S: RowSource> RowSource for HBilinear<S> {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn clamp_policy(&self) -> ClampPolicy {
        self.out.policy()
    }

    fn row(&mut self, row: u32) -> Result<&[Sample], PipelineError> {
        if let RowRequest::Produce(row) = self.out.request(row)? {
            let spp = self.info.samples_per_pixel;
            let last = self.src_width - 1;
            let src = self.source.row(row)?;
            let dst = self.out.as_mut_slice();
            for (px, tap) in dst.chunks_exact_mut(spp).zip(&self.taps) {
                let left = tap.index as usize * spp;
                let right = tap.index.saturating_add(1).min(last) as usize * spp;
                for (s, out) in px.iter_mut().enumerate() {
                    *out = blend(src[left + s], src[right + s], tap.frac);
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

/// Bilinear vertical resize. Besides its output row it keeps the two
/// upstream rows it last blended.
pub struct VBilinear<S> {
    source: S,
    taps: Vec<Tap>,
    src_height: u32,
    window: RowRing<Sample>,
    info: SourceInfo,
    out: RowBuffer,
}

impl<S: RowSource> VBilinear<S> {
    pub fn new(source: S, height: u32) -> Result<Self, PipelineError> {
        let upstream = source.info();
        check_target("bilinear", upstream, height)?;
        let info = upstream.resized(upstream.width, height).blended();
        let taps = taps(upstream.height, height);
        let src_height = upstream.height;
        let window = RowRing::new(2, upstream.row_len());
        let out = RowBuffer::new(&info, source.clamp_policy(), "bilinear-v");
        Ok(Self {
            source,
            taps,
            src_height,
            window,
            info,
            out,
        })
    }
}

impl<S: RowSource> RowSource for VBilinear<S> {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn clamp_policy(&self) -> ClampPolicy {
        self.out.policy()
    }

    fn row(&mut self, row: u32) -> Result<&[Sample], PipelineError> {
        if let RowRequest::Produce(row) = self.out.request(row)? {
            let tap = self.taps[row as usize];
            let top = tap.index;
            let bottom = top.saturating_add(1).min(self.src_height - 1);
            let source = &mut self.source;
            self.window.ensure(top, |dst| copy_row(&mut *source, top, dst))?;
            self.window.ensure(bottom, |dst| copy_row(&mut *source, bottom, dst))?;

            let (a, b) = (self.window.get(top), self.window.get(bottom));
            for ((out, &a), &b) in self.out.as_mut_slice().iter_mut().zip(a).zip(b) {
                *out = blend(a, b, tap.frac);
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

/// Two-axis bilinear resize.
pub struct Bilinear<S> {
    inner: VBilinear<HBilinear<S>>,
}

impl<S: RowSource> Bilinear<S> {
    pub fn new(source: S, width: u32, height: u32) -> Result<Self, PipelineError> {
        let horizontal = HBilinear::new(source, width)?;
        Ok(Self {
            inner: VBilinear::new(horizontal, height)?,
        })
    }
}

impl<S: RowSource> RowSource for Bilinear<S> {
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
