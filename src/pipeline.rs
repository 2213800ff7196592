//! Opening files by signature and chaining stages onto them.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use enough::Stop;
use tracing::debug;

#[cfg(feature = "bmp")]
use crate::bmp::BmpSource;
use crate::cms::{
    ColorProfile, ColorTransform, ColorTransformFilter, RenderingIntent, TransformFactory,
};
use crate::error::PipelineError;
use crate::options::{ClampPolicy, DecodeOptions};
use crate::pixel::{ImageFormat, Sample};
use crate::read::read_fully;
use crate::render::render_rgb8;
use crate::resample::{ResampleMethod, resample};
use crate::source::{BoxedSource, EmbeddedProfile, RowSource, SourceInfo};
#[cfg(feature = "tiff")]
use crate::tiff::TiffSource;
use crate::unsharp::UnsharpMask;

/// Open the file at `path` with whichever decoder its signature calls for.
pub fn open(path: impl AsRef<Path>, options: &DecodeOptions) -> Result<BoxedSource, PipelineError> {
    let path = path.as_ref();
    let mut file = File::open(path)?;
    let mut magic = [0u8; 4];
    let n = read_fully(&mut file, &mut magic)?;
    file.seek(SeekFrom::Start(0))?;
    let format = ImageFormat::detect(&magic[..n]).ok_or(PipelineError::UnrecognizedFormat)?;
    debug!(path = %path.display(), ?format, "opening");
    decoder(format, BufReader::new(file), options)
}

/// Decode an in-memory file with whichever decoder its signature calls for.
pub fn open_bytes(data: Vec<u8>, options: &DecodeOptions) -> Result<BoxedSource, PipelineError> {
    let format = ImageFormat::detect(&data).ok_or(PipelineError::UnrecognizedFormat)?;
    decoder(format, Cursor::new(data), options)
}

#[allow(unused_variables)]
fn decoder<R: Read + Seek + Send + 'static>(
    format: ImageFormat,
    reader: R,
    options: &DecodeOptions,
) -> Result<BoxedSource, PipelineError> {
    match format {
        #[cfg(feature = "bmp")]
        ImageFormat::Bmp => Ok(Box::new(BmpSource::new(reader, options)?)),
        #[cfg(feature = "tiff")]
        ImageFormat::Tiff => Ok(Box::new(TiffSource::new(reader, options)?)),
        #[allow(unreachable_patterns)]
        other => Err(PipelineError::UnsupportedVariant(format!(
            "{other:?} support not enabled"
        ))),
    }
}

/// A chain of stages built outward from a decoder.
///
/// ```no_run
/// use zenrows::{DecodeOptions, Pipeline, ResampleMethod, Unstoppable};
///
/// let rgb = Pipeline::open("scan.tif", &DecodeOptions::default())?
///     .resample(600, 400, ResampleMethod::Auto)?
///     .unsharp_mask(1.5, 0.6, 256.0)?
///     .render_rgb8([255, 255, 255], &Unstoppable)?;
/// # Ok::<(), zenrows::PipelineError>(())
/// ```
pub struct Pipeline {
    source: BoxedSource,
}

impl Pipeline {
    pub fn open(path: impl AsRef<Path>, options: &DecodeOptions) -> Result<Self, PipelineError> {
        Ok(Self::from_boxed(open(path, options)?))
    }

    pub fn from_bytes(data: Vec<u8>, options: &DecodeOptions) -> Result<Self, PipelineError> {
        Ok(Self::from_boxed(open_bytes(data, options)?))
    }

    pub fn from_source(source: impl RowSource + 'static) -> Self {
        Self::from_boxed(Box::new(source))
    }

    pub fn from_boxed(source: BoxedSource) -> Self {
        Self { source }
    }

    pub fn resample(
        self,
        width: u32,
        height: u32,
        method: ResampleMethod,
    ) -> Result<Self, PipelineError> {
        debug!(width, height, ?method, "adding resample stage");
        Ok(Self::from_boxed(resample(self.source, width, height, method)?))
    }

    pub fn unsharp_mask(
        self,
        radius: f64,
        amount: f64,
        threshold: f64,
    ) -> Result<Self, PipelineError> {
        debug!(radius, amount, threshold, "adding unsharp mask");
        Ok(Self::from_source(UnsharpMask::new(self.source, radius, amount, threshold)?))
    }

    pub fn color_transform(
        self,
        transform: Arc<dyn ColorTransform>,
    ) -> Result<Self, PipelineError> {
        Ok(Self::from_source(ColorTransformFilter::new(self.source, transform)?))
    }

    pub fn color_transform_from_profiles(
        self,
        factory: &dyn TransformFactory,
        input: &dyn ColorProfile,
        output: &dyn ColorProfile,
        intent: RenderingIntent,
    ) -> Result<Self, PipelineError> {
        Ok(Self::from_source(ColorTransformFilter::from_profiles(
            self.source,
            factory,
            input,
            output,
            intent,
        )?))
    }

    /// Pull every row and convert it to packed 8-bit RGB.
    pub fn render_rgb8(
        mut self,
        background: [u8; 3],
        stop: &dyn Stop,
    ) -> Result<Vec<u8>, PipelineError> {
        render_rgb8(&mut self.source, background, stop)
    }

    pub fn into_source(self) -> BoxedSource {
        self.source
    }
}

impl RowSource for Pipeline {
    fn info(&self) -> &SourceInfo {
        self.source.info()
    }

    fn clamp_policy(&self) -> ClampPolicy {
        self.source.clamp_policy()
    }

    fn row(&mut self, row: u32) -> Result<&[Sample], PipelineError> {
        self.source.row(row)
    }

    fn embedded_profile(&self) -> Option<&EmbeddedProfile> {
        self.source.embedded_profile()
    }

    fn take_embedded_profile(&mut self) -> Option<EmbeddedProfile> {
        self.source.take_embedded_profile()
    }
}
