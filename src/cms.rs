//! Colour-management boundary and the filter that applies a transform to
//! every row.
//!
//! Profile parsing and transform construction live outside this crate; the
//! pipeline only needs something that converts N pixels of 16-bit samples
//! from one colour space to another.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::buffer::PixelBufferSource;
use crate::error::PipelineError;
use crate::options::ClampPolicy;
use crate::pixel::{ColorType, Sample};
use crate::source::{RowBuffer, RowRequest, RowSource, SourceInfo};

/// A ready-to-run colour transform at 16 bits per sample.
///
/// Samples use the pipeline's conventions, including ink polarity for grey.
pub trait ColorTransform: Send + Sync {
    fn input_space(&self) -> ColorType;
    fn output_space(&self) -> ColorType;
    /// Convert `pixels` pixels from `input` into `output`. Both slices hold
    /// exactly `pixels` times the samples per pixel of their colour space.
    fn transform(&self, input: &[u16], output: &mut [u16], pixels: usize);
}

/// An opaque colour profile handle.
pub trait ColorProfile: Send + Sync {
    fn color_space(&self) -> ColorType;

    /// Device links convert directly between two device spaces.
    fn is_device_link(&self) -> bool {
        false
    }
}

/// Builds transforms from profile chains: input and output, optionally
/// with proofing or device-link profiles in between.
pub trait TransformFactory {
    fn create_transform(
        &self,
        profiles: &[&dyn ColorProfile],
        intent: RenderingIntent,
    ) -> Result<Box<dyn ColorTransform>, PipelineError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RenderingIntent {
    /// Whatever the colour-management library prefers.
    #[default]
    Default,
    Perceptual,
    RelativeColorimetric,
    /// Relative colorimetric with black point compensation.
    RelativeColorimetricBpc,
    Saturation,
    AbsoluteColorimetric,
}

impl RenderingIntent {
    pub const ALL: [RenderingIntent; 6] = [
        Self::Default,
        Self::Perceptual,
        Self::RelativeColorimetric,
        Self::RelativeColorimetricBpc,
        Self::Saturation,
        Self::AbsoluteColorimetric,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::Perceptual => "Perceptual",
            Self::RelativeColorimetric => "Relative Colorimetric",
            Self::RelativeColorimetricBpc => "Relative Colorimetric with BPC",
            Self::Saturation => "Saturation",
            Self::AbsoluteColorimetric => "Absolute Colorimetric",
        }
    }
}

impl fmt::Display for RenderingIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

enum TransformHandle {
    /// Built by the caller, who decides when it goes away.
    Shared(Arc<dyn ColorTransform>),
    /// Built for this filter from profiles.
    Owned(Box<dyn ColorTransform>),
}

impl TransformHandle {
    fn get(&self) -> &dyn ColorTransform {
        match self {
            Self::Shared(t) => t.as_ref(),
            Self::Owned(t) => t.as_ref(),
        }
    }
}

fn transformable(space: ColorType) -> bool {
    matches!(
        space,
        ColorType::Grey | ColorType::Rgb | ColorType::Cmyk | ColorType::Lab
    )
}

/// Applies a colour transform to each row, carrying alpha across unchanged.
///
/// The upstream embedded profile is dropped, since the output is no longer
/// in that colour space.
pub struct ColorTransformFilter<S> {
    source: S,
    transform: TransformHandle,
    in_spp: usize,
    out_spp: usize,
    alpha: bool,
    input: Vec<u16>,
    output: Vec<u16>,
    info: SourceInfo,
    out: RowBuffer,
}

impl<S: RowSource> ColorTransformFilter<S> {
    /// Use a transform the caller keeps ownership of.
    pub fn new(source: S, transform: Arc<dyn ColorTransform>) -> Result<Self, PipelineError> {
        Self::build(source, TransformHandle::Shared(transform))
    }

    /// Build a transform from `input` to `output` and own it.
    pub fn from_profiles(
        source: S,
        factory: &dyn TransformFactory,
        input: &dyn ColorProfile,
        output: &dyn ColorProfile,
        intent: RenderingIntent,
    ) -> Result<Self, PipelineError> {
        let transform = factory.create_transform(&[input, output], intent)?;
        debug!(%intent, "built colour transform from profiles");
        Self::build(source, TransformHandle::Owned(transform))
    }

    fn build(mut source: S, transform: TransformHandle) -> Result<Self, PipelineError> {
        let (in_space, out_space) = {
            let t = transform.get();
            (t.input_space(), t.output_space())
        };
        for space in [in_space, out_space] {
            if !transformable(space) {
                return Err(PipelineError::UnsupportedColorSpace(format!(
                    "transform space {space:?}"
                )));
            }
        }

        let upstream = source.info();
        let alpha = upstream.color_type.has_alpha();
        if upstream.color_type.without_alpha() != in_space {
            return Err(PipelineError::UnsupportedColorSpace(format!(
                "source is {:?}, transform expects {in_space:?}",
                upstream.color_type
            )));
        }
        let color_type = if alpha {
            out_space.with_alpha().ok_or_else(|| {
                PipelineError::UnsupportedColorSpace(format!("{out_space:?} with alpha"))
            })?
        } else {
            out_space
        };

        let width = upstream.width as usize;
        let in_spp = in_space.samples_per_pixel();
        let out_spp = out_space.samples_per_pixel();
        let mut info = upstream.clone();
        info.color_type = color_type;
        info.samples_per_pixel = color_type.samples_per_pixel();
        let out = RowBuffer::new(&info, source.clamp_policy(), "colour transform");

        if source.take_embedded_profile().is_some() {
            debug!("dropping upstream embedded profile");
        }

        Ok(Self {
            source,
            transform,
            in_spp,
            out_spp,
            alpha,
            input: if alpha { vec![0; width * in_spp] } else { Vec::new() },
            output: if alpha { vec![0; width * out_spp] } else { Vec::new() },
            info,
            out,
        })
    }

    /// Whether the filter built, and so owns, its transform.
    pub fn owns_transform(&self) -> bool {
        matches!(self.transform, TransformHandle::Owned(_))
    }
}

impl ColorTransformFilter<PixelBufferSource> {
    /// Transform an RGB or RGBA pixel buffer; the transform must take RGB.
    pub fn for_pixel_buffer(
        source: PixelBufferSource,
        transform: Arc<dyn ColorTransform>,
    ) -> Result<Self, PipelineError> {
        if transform.input_space() != ColorType::Rgb {
            return Err(PipelineError::UnsupportedColorSpace(format!(
                "pixel buffers are RGB, transform expects {:?}",
                transform.input_space()
            )));
        }
        Self::new(source, transform)
    }
}

impl<S: RowSource> RowSource for ColorTransformFilter<S> {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn clamp_policy(&self) -> ClampPolicy {
        self.out.policy()
    }

    fn row(&mut self, row: u32) -> Result<&[Sample], PipelineError> {
        if let RowRequest::Produce(row) = self.out.request(row)? {
            let width = self.info.width as usize;
            let src = self.source.row(row)?;
            let transform = self.transform.get();

            if !self.alpha {
                transform.transform(src, self.out.as_mut_slice(), width);
            } else {
                let (in_spp, out_spp) = (self.in_spp, self.out_spp);
                for (packed, px) in self
                    .input
                    .chunks_exact_mut(in_spp)
                    .zip(src.chunks_exact(in_spp + 1))
                {
                    packed.copy_from_slice(&px[..in_spp]);
                }
                transform.transform(&self.input, &mut self.output, width);
                let dst = self.out.as_mut_slice();
                for ((out, converted), px) in dst
                    .chunks_exact_mut(out_spp + 1)
                    .zip(self.output.chunks_exact(out_spp))
                    .zip(src.chunks_exact(in_spp + 1))
                {
                    out[..out_spp].copy_from_slice(converted);
                    out[out_spp] = px[in_spp];
                }
            }
            self.out.commit(row);
        }
        Ok(self.out.as_slice())
    }
}
