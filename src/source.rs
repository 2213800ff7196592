//! The pull-based row contract every stage implements.

use tracing::warn;

use crate::error::PipelineError;
use crate::options::ClampPolicy;
use crate::pixel::{ColorType, Sample};

/// Resolution reported when a file does not carry one.
pub const DEFAULT_RESOLUTION: f64 = 72.0;

/// Geometry and colour description of a stage's output.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub color_type: ColorType,
    pub samples_per_pixel: usize,
    /// Horizontal resolution in pixels per inch.
    pub xres: f64,
    /// Vertical resolution in pixels per inch.
    pub yres: f64,
    /// Whether rows may be requested in any order.
    pub random_access: bool,
}

impl SourceInfo {
    pub fn new(width: u32, height: u32, color_type: ColorType) -> Self {
        Self {
            width,
            height,
            color_type,
            samples_per_pixel: color_type.samples_per_pixel(),
            xres: DEFAULT_RESOLUTION,
            yres: DEFAULT_RESOLUTION,
            random_access: false,
        }
    }

    /// Samples in one row.
    pub fn row_len(&self) -> usize {
        self.width as usize * self.samples_per_pixel
    }

    /// The same description resized, with resolution scaled to keep the
    /// physical size unchanged.
    pub(crate) fn resized(&self, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            xres: self.xres * f64::from(width) / f64::from(self.width),
            yres: self.yres * f64::from(height) / f64::from(self.height),
            ..self.clone()
        }
    }

    /// The description of a stage that blends neighbouring samples. Bilevel
    /// input can come out with intermediate values, so it becomes grey.
    pub(crate) fn blended(mut self) -> Self {
        if self.color_type == ColorType::BlackWhite {
            self.color_type = ColorType::Grey;
        }
        self
    }
}

/// An ICC profile carried by a source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbeddedProfile(Vec<u8>);

impl EmbeddedProfile {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// A pipeline stage producing image rows on demand.
///
/// The slice returned by [`row`](RowSource::row) borrows the stage until the
/// next call, so callers copy out whatever they need to keep. Requesting the
/// row that was returned last hands back the same buffer without recomputing.
/// Stages whose [`SourceInfo::random_access`] is false must be asked for rows
/// in non-decreasing order.
pub trait RowSource: Send {
    fn info(&self) -> &SourceInfo;

    /// Policy for out-of-range rows and short reads; filters inherit it from
    /// their upstream.
    fn clamp_policy(&self) -> ClampPolicy;

    fn row(&mut self, row: u32) -> Result<&[Sample], PipelineError>;

    fn embedded_profile(&self) -> Option<&EmbeddedProfile> {
        None
    }

    /// Hand ownership of the embedded profile to the caller.
    fn take_embedded_profile(&mut self) -> Option<EmbeddedProfile> {
        None
    }
}

/// A type-erased stage, for chains assembled at runtime.
pub type BoxedSource = Box<dyn RowSource>;

impl<S: RowSource + ?Sized> RowSource for Box<S> {
    fn info(&self) -> &SourceInfo {
        (**self).info()
    }

    fn clamp_policy(&self) -> ClampPolicy {
        (**self).clamp_policy()
    }

    fn row(&mut self, row: u32) -> Result<&[Sample], PipelineError> {
        (**self).row(row)
    }

    fn embedded_profile(&self) -> Option<&EmbeddedProfile> {
        (**self).embedded_profile()
    }

    fn take_embedded_profile(&mut self) -> Option<EmbeddedProfile> {
        (**self).take_embedded_profile()
    }
}

/// Copy upstream row `row` into `dst`, for filling ring slots.
pub(crate) fn copy_row<S: RowSource + ?Sized>(
    source: &mut S,
    row: u32,
    dst: &mut [Sample],
) -> Result<(), PipelineError> {
    dst.copy_from_slice(source.row(row)?);
    Ok(())
}

/// What a stage must do to answer a row request.
pub(crate) enum RowRequest {
    /// The buffer already holds the row.
    Cached,
    /// Produce this row into the buffer, then [`RowBuffer::commit`] it.
    Produce(u32),
}

/// A stage's single output row plus the bookkeeping every stage shares:
/// depth-1 memoization, out-of-range clamping and the forward-only check.
pub(crate) struct RowBuffer {
    data: Vec<Sample>,
    current: Option<u32>,
    watermark: Option<u32>,
    height: u32,
    random_access: bool,
    policy: ClampPolicy,
    stage: &'static str,
}

impl RowBuffer {
    pub(crate) fn new(info: &SourceInfo, policy: ClampPolicy, stage: &'static str) -> Self {
        Self {
            data: vec![0; info.row_len()],
            current: None,
            watermark: None,
            height: info.height,
            random_access: info.random_access,
            policy,
            stage,
        }
    }

    pub(crate) fn policy(&self) -> ClampPolicy {
        self.policy
    }

    pub(crate) fn request(&mut self, row: u32) -> Result<RowRequest, PipelineError> {
        let row = if row >= self.height {
            if self.policy.is_strict() {
                return Err(PipelineError::RowOutOfRange {
                    row,
                    height: self.height,
                });
            }
            warn!(
                stage = self.stage,
                row,
                height = self.height,
                "row requested past the end, serving the last row"
            );
            self.height - 1
        } else {
            row
        };

        if self.current == Some(row) {
            return Ok(RowRequest::Cached);
        }

        if !self.random_access {
            if let Some(watermark) = self.watermark.filter(|&w| row < w) {
                if self.policy.is_strict() {
                    return Err(PipelineError::NonMonotonic {
                        requested: row,
                        current: watermark,
                    });
                }
                warn!(
                    stage = self.stage,
                    row,
                    watermark,
                    "backwards request on a forward-only stage"
                );
            }
        }

        // The buffer is about to be overwritten; a failed produce must not
        // leave it looking valid.
        self.current = None;
        Ok(RowRequest::Produce(row))
    }

    pub(crate) fn commit(&mut self, row: u32) {
        self.current = Some(row);
        self.watermark = Some(self.watermark.map_or(row, |w| w.max(row)));
    }

    pub(crate) fn as_slice(&self) -> &[Sample] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Sample] {
        &mut self.data
    }
}
