use super::check_target;
use crate::error::PipelineError;
use crate::options::ClampPolicy;
use crate::pixel::Sample;
use crate::source::{EmbeddedProfile, RowBuffer, RowRequest, RowSource, SourceInfo};

/// Source interval `[start, end)` averaged into one destination coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Span {
    start: u32,
    end: u32,
}

impl Span {
    fn len(self) -> u64 {
        u64::from(self.end - self.start)
    }
}

fn spans(stage: &str, src: u32, dst: u32) -> Result<Vec<Span>, PipelineError> {
    if dst > src {
        return Err(PipelineError::InvalidParameter(format!(
            "{stage}: box filter cannot enlarge {src} to {dst}"
        )));
    }
    let at = |d: u32| (u64::from(d) * u64::from(src) / u64::from(dst)) as u32;
    Ok((0..dst)
        .map(|d| {
            let start = at(d);
            Span {
                start,
                end: at(d + 1).max(start + 1),
            }
        })
        .collect())
}

#[inline]
fn average(sum: u64, count: u64) -> Sample {
    ((sum + count / 2) / count) as Sample
}

/// Box-filter horizontal reduction.
pub struct HBoxDownsample<S> {
    source: S,
    spans: Vec<Span>,
    info: SourceInfo,
    out: RowBuffer,
}

impl<S: RowSource> HBoxDownsample<S> {
    pub fn new(source: S, width: u32) -> Result<Self, PipelineError> {
        let upstream = source.info();
        check_target("box filter", upstream, width)?;
        let spans = spans("box filter", upstream.width, width)?;
        let info = upstream.resized(width, upstream.height).blended();
        let out = RowBuffer::new(&info, source.clamp_policy(), "box-h");
        Ok(Self {
            source,
            spans,
            info,
            out,
        })
    }
}

impl<S: RowSource> RowSource for HBoxDownsample<S> {
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
            for (px, span) in dst.chunks_exact_mut(spp).zip(&self.spans) {
                let window = &src[span.start as usize * spp..span.end as usize * spp];
                for (s, out) in px.iter_mut().enumerate() {
                    let sum: u64 = window.iter().skip(s).step_by(spp).map(|&v| u64::from(v)).sum();
                    *out = average(sum, span.len());
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

/// Box-filter vertical reduction. Upstream rows are read once each, in order.
pub struct VBoxDownsample<S> {
    source: S,
    spans: Vec<Span>,
    sums: Vec<u64>,
    info: SourceInfo,
    out: RowBuffer,
}

impl<S: RowSource> VBoxDownsample<S> {
    pub fn new(source: S, height: u32) -> Result<Self, PipelineError> {
        let upstream = source.info();
        check_target("box filter", upstream, height)?;
        let spans = spans("box filter", upstream.height, height)?;
        let info = upstream.resized(upstream.width, height).blended();
        let out = RowBuffer::new(&info, source.clamp_policy(), "box-v");
        Ok(Self {
            source,
            spans,
            sums: vec![0; info.row_len()],
            info,
            out,
        })
    }
}

impl<S: RowSource> RowSource for VBoxDownsample<S> {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn clamp_policy(&self) -> ClampPolicy {
        self.out.policy()
    }

    fn row(&mut self, row: u32) -> Result<&[Sample], PipelineError> {
        if let RowRequest::Produce(row) = self.out.request(row)? {
            let span = self.spans[row as usize];
            self.sums.fill(0);
            for r in span.start..span.end {
                let src = self.source.row(r)?;
                for (sum, &v) in self.sums.iter_mut().zip(src) {
                    *sum += u64::from(v);
                }
            }
            for (out, &sum) in self.out.as_mut_slice().iter_mut().zip(&self.sums) {
                *out = average(sum, span.len());
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

/// Two-axis box-filter reduction.
pub struct BoxDownsample<S> {
    inner: VBoxDownsample<HBoxDownsample<S>>,
}

impl<S: RowSource> BoxDownsample<S> {
    pub fn new(source: S, width: u32, height: u32) -> Result<Self, PipelineError> {
        let horizontal = HBoxDownsample::new(source, width)?;
        Ok(Self {
            inner: VBoxDownsample::new(horizontal, height)?,
        })
    }
}

impl<S: RowSource> RowSource for BoxDownsample<S> {
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
