use super::check_target;
use crate::error::PipelineError;
use crate::options::ClampPolicy;
use crate::pixel::Sample;
use crate::source::{EmbeddedProfile, RowBuffer, RowRequest, RowSource, SourceInfo};

/// Source coordinate for each destination coordinate: `floor(d * src / dst)`.
fn nearest_map(src: u32, dst: u32) -> Vec<u32> {
    (0..dst)
        .map(|d| (u64::from(d) * u64::from(src) / u64::from(dst)) as u32)
        .collect()
}

/// Nearest-neighbour horizontal resize.
pub struct HNearest<S> {
    source: S,
    columns: Vec<u32>,
    info: SourceInfo,
    out: RowBuffer,
}

impl<S: RowSource> HNearest<S> {
    pub fn new(source: S, width: u32) -> Result<Self, PipelineError> {
        let upstream = source.info();
        check_target("nearest", upstream, width)?;
        let info = upstream.resized(width, upstream.height);
        let columns = nearest_map(upstream.width, width);
        let out = RowBuffer::new(&info, source.clamp_policy(), "nearest-h");
        Ok(Self {
            source,
            columns,
            info,
            out,
        })
    }
}

impl<S: RowSource> RowSource for HNearest<S> {
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
            for (px, &sx) in dst.chunks_exact_mut(spp).zip(&self.columns) {
                let at = sx as usize * spp;
                px.copy_from_slice(&src[at..at + spp]);
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

/// Nearest-neighbour vertical resize.
pub struct VNearest<S> {
    source: S,
    rows: Vec<u32>,
    info: SourceInfo,
    out: RowBuffer,
}

impl<S: RowSource> VNearest<S> {
    pub fn new(source: S, height: u32) -> Result<Self, PipelineError> {
        let upstream = source.info();
        check_target("nearest", upstream, height)?;
        let info = upstream.resized(upstream.width, height);
        let rows = nearest_map(upstream.height, height);
        let out = RowBuffer::new(&info, source.clamp_policy(), "nearest-v");
        Ok(Self {
            source,
            rows,
            info,
            out,
        })
    }
}

impl<S: RowSource> RowSource for VNearest<S> {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn clamp_policy(&self) -> ClampPolicy {
        self.out.policy()
    }

    fn row(&mut self, row: u32) -> Result<&[Sample], PipelineError> {
        if let RowRequest::Produce(row) = self.out.request(row)? {
            let src = self.source.row(self.rows[row as usize])?;
            self.out.as_mut_slice().copy_from_slice(src);
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

/// Two-axis nearest-neighbour resize.
pub struct Nearest<S> {
    inner: VNearest<HNearest<S>>,
}

impl<S: RowSource> Nearest<S> {
    pub fn new(source: S, width: u32, height: u32) -> Result<Self, PipelineError> {
        let horizontal = HNearest::new(source, width)?;
        Ok(Self {
            inner: VNearest::new(horizontal, height)?,
        })
    }
}

impl<S: RowSource> RowSource for Nearest<S> {
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
