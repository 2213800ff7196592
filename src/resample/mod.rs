//! Geometric resamplers.
//!
//! Every method is split into a horizontal and a vertical stage. The
//! two-axis types (`Nearest`, `Bilinear`, `BoxDownsample`, `Lanczos`) build
//! the horizontal stage first and wrap it in the vertical one, so vertical
//! filtering runs over rows that already have the final width.

mod bilinear;
mod downsample;
mod lanczos;
mod nearest;

use std::cmp::Ordering;

pub use bilinear::{Bilinear, HBilinear, VBilinear};
pub use downsample::{BoxDownsample, HBoxDownsample, VBoxDownsample};
pub use lanczos::{DEFAULT_LANCZOS_WINDOW, HLanczos, Lanczos, MAX_LANCZOS_WINDOW, VLanczos};
pub use nearest::{HNearest, Nearest, VNearest};

use crate::error::PipelineError;
use crate::source::{BoxedSource, RowSource, SourceInfo};

/// Resampling algorithm for [`resample`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResampleMethod {
    Nearest,
    Bilinear,
    /// Area averaging; only valid when neither axis grows.
    BoxFilter,
    Lanczos {
        window: u32,
    },
    /// Per axis: box filter when shrinking, Lanczos when growing, nothing
    /// when the size is unchanged.
    #[default]
    Auto,
}

/// Wrap `source` in the stages needed to produce a `width` x `height` image.
pub fn resample(
    source: BoxedSource,
    width: u32,
    height: u32,
    method: ResampleMethod,
) -> Result<BoxedSource, PipelineError> {
    let stage: BoxedSource = match method {
        ResampleMethod::Nearest => Box::new(Nearest::new(source, width, height)?),
        ResampleMethod::Bilinear => Box::new(Bilinear::new(source, width, height)?),
        ResampleMethod::BoxFilter => Box::new(BoxDownsample::new(source, width, height)?),
        ResampleMethod::Lanczos { window } => {
            Box::new(Lanczos::new(source, width, height, window)?)
        }
        ResampleMethod::Auto => {
            let (src_w, src_h) = (source.info().width, source.info().height);
            let chain: BoxedSource = match width.cmp(&src_w) {
                Ordering::Less => Box::new(HBoxDownsample::new(source, width)?),
                Ordering::Greater => {
                    Box::new(HLanczos::new(source, width, DEFAULT_LANCZOS_WINDOW)?)
                }
                Ordering::Equal => source,
            };
            let chain: BoxedSource = match height.cmp(&src_h) {
                Ordering::Less => Box::new(VBoxDownsample::new(chain, height)?),
                Ordering::Greater => {
                    Box::new(VLanczos::new(chain, height, DEFAULT_LANCZOS_WINDOW)?)
                }
                Ordering::Equal => chain,
            };
            chain
        }
    };
    Ok(stage)
}

/// Reject a zero target size or a source without samples.
pub(crate) fn check_target(
    stage: &str,
    upstream: &SourceInfo,
    size: u32,
) -> Result<(), PipelineError> {
    if size == 0 {
        return Err(PipelineError::InvalidParameter(format!(
            "{stage}: target size must be non-zero"
        )));
    }
    if upstream.samples_per_pixel == 0 {
        return Err(PipelineError::InvalidParameter(format!(
            "{stage}: source has no samples per pixel"
        )));
    }
    Ok(())
}
