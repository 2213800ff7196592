//! Rows served from a pixel buffer that is already in memory.

use crate::error::PipelineError;
use crate::options::ClampPolicy;
use crate::pixel::{ColorType, PixelLayout, SAMPLE_MAX, Sample, eight_to_sample};
use crate::source::{RowBuffer, RowRequest, RowSource, SourceInfo};

/// What to do with the alpha channel of an RGBA buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlphaMode {
    /// Output RGBA.
    #[default]
    Preserve,
    /// Composite onto white and output RGB.
    FlattenOnWhite,
}

/// An 8-bit RGB or RGBA buffer exposed as a random-access row source.
pub struct PixelBufferSource {
    pixels: Vec<u8>,
    stride: usize,
    layout: PixelLayout,
    flatten: bool,
    info: SourceInfo,
    out: RowBuffer,
}

impl PixelBufferSource {
    /// Wrap `pixels`, whose rows start every `stride` bytes.
    pub fn new(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        stride: usize,
        layout: PixelLayout,
        alpha: AlphaMode,
    ) -> Result<Self, PipelineError> {
        Self::with_policy(pixels, width, height, stride, layout, alpha, ClampPolicy::default())
    }

    pub fn with_policy(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        stride: usize,
        layout: PixelLayout,
        alpha: AlphaMode,
        policy: ClampPolicy,
    ) -> Result<Self, PipelineError> {
        let color_type = match (layout, alpha) {
            (PixelLayout::Rgb8, _) => ColorType::Rgb,
            (PixelLayout::Rgba8, AlphaMode::Preserve) => ColorType::Rgba,
            (PixelLayout::Rgba8, AlphaMode::FlattenOnWhite) => ColorType::Rgb,
        };
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidParameter(format!(
                "pixel buffer dimensions {width}x{height}"
            )));
        }

        let packed = width as usize * layout.bytes_per_pixel();
        if stride < packed {
            return Err(PipelineError::InvalidParameter(format!(
                "stride {stride} shorter than a {packed}-byte row"
            )));
        }
        let needed = stride * (height as usize - 1) + packed;
        if pixels.len() < needed {
            return Err(PipelineError::BufferTooSmall {
                needed,
                actual: pixels.len(),
            });
        }

        let mut info = SourceInfo::new(width, height, color_type);
        info.random_access = true;
        let out = RowBuffer::new(&info, policy, "pixel buffer");
        Ok(Self {
            pixels,
            stride,
            layout,
            flatten: layout == PixelLayout::Rgba8 && alpha == AlphaMode::FlattenOnWhite,
            info,
            out,
        })
    }

    /// Report a resolution other than the default 72 dpi.
    pub fn with_resolution(mut self, xres: f64, yres: f64) -> Self {
        self.info.xres = xres;
        self.info.yres = yres;
        self
    }

    /// Layout of the wrapped buffer.
    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    fn produce(&mut self, row: u32) {
        let packed = self.info.width as usize * self.layout.bytes_per_pixel();
        let start = row as usize * self.stride;
        let src = &self.pixels[start..start + packed];
        let dst = self.out.as_mut_slice();

        if self.flatten {
            for (px, out) in src.chunks_exact(4).zip(dst.chunks_exact_mut(3)) {
                let alpha = u32::from(px[3]);
                for (o, &c) in out.iter_mut().zip(&px[..3]) {
                    let ink = u32::from(eight_to_sample(255 - c));
                    *o = SAMPLE_MAX - (alpha * ink / 255) as Sample;
                }
            }
        } else {
            for (o, &c) in dst.iter_mut().zip(src) {
                *o = eight_to_sample(c);
            }
        }
    }
}

#[cfg(feature = "rgb")]
impl PixelBufferSource {
    /// Wrap tightly packed RGB pixels, `width` per row.
    pub fn from_rgb8(pixels: &[rgb::RGB8], width: u32, height: u32) -> Result<Self, PipelineError> {
        use rgb::ComponentBytes;
        let bytes = pixels.as_bytes().to_vec();
        Self::new(bytes, width, height, width as usize * 3, PixelLayout::Rgb8, AlphaMode::Preserve)
    }

    pub fn from_rgba8(
        pixels: &[rgb::RGBA8],
        width: u32,
        height: u32,
        alpha: AlphaMode,
    ) -> Result<Self, PipelineError> {
        use rgb::ComponentBytes;
        let bytes = pixels.as_bytes().to_vec();
        Self::new(bytes, width, height, width as usize * 4, PixelLayout::Rgba8, alpha)
    }
}

#[cfg(feature = "imgref")]
impl PixelBufferSource {
    pub fn from_imgref_rgb(img: imgref::ImgRef<'_, rgb::RGB8>) -> Result<Self, PipelineError> {
        use rgb::ComponentBytes;
        let mut pixels = Vec::with_capacity(img.width() * img.height() * 3);
        for row in img.rows() {
            pixels.extend_from_slice(row.as_bytes());
        }
        let (w, h) = dims(img.width(), img.height())?;
        Self::new(pixels, w, h, w as usize * 3, PixelLayout::Rgb8, AlphaMode::Preserve)
    }

    pub fn from_imgref_rgba(
        img: imgref::ImgRef<'_, rgb::RGBA8>,
        alpha: AlphaMode,
    ) -> Result<Self, PipelineError> {
        use rgb::ComponentBytes;
        let mut pixels = Vec::with_capacity(img.width() * img.height() * 4);
        for row in img.rows() {
            pixels.extend_from_slice(row.as_bytes());
        }
        let (w, h) = dims(img.width(), img.height())?;
        Self::new(pixels, w, h, w as usize * 4, PixelLayout::Rgba8, alpha)
    }
}

#[cfg(feature = "imgref")]
fn dims(width: usize, height: usize) -> Result<(u32, u32), PipelineError> {
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(PipelineError::DimensionsTooLarge {
            width: u32::MAX,
            height: u32::MAX,
        }),
    }
}

impl RowSource for PixelBufferSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn clamp_policy(&self) -> ClampPolicy {
        self.out.policy()
    }

    fn row(&mut self, row: u32) -> Result<&[Sample], PipelineError> {
        if let RowRequest::Produce(row) = self.out.request(row)? {
            self.produce(row);
            self.out.commit(row);
        }
        Ok(self.out.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_on_white() {
        // Opaque red, transparent black, half-covered black.
        let pixels = vec![255, 0, 0, 255, 0, 0, 0, 0, 0, 0, 0, 128];
        let mut src =
            PixelBufferSource::new(pixels, 3, 1, 12, PixelLayout::Rgba8, AlphaMode::FlattenOnWhite)
                .unwrap();
        assert_eq!(src.info().color_type, ColorType::Rgb);
        let row = src.row(0).unwrap();
        assert_eq!(&row[..3], &[SAMPLE_MAX, 0, 0]);
        assert_eq!(&row[3..6], &[SAMPLE_MAX; 3]);
        assert_eq!(row[6], SAMPLE_MAX - (128 * 65535 / 255) as Sample);
    }

    #[test]
    fn stride_padding_is_skipped() {
        let pixels = vec![1, 2, 3, 99, 4, 5, 6, 99];
        let mut src =
            PixelBufferSource::new(pixels, 1, 2, 4, PixelLayout::Rgb8, AlphaMode::Preserve)
                .unwrap();
        assert_eq!(src.row(1).unwrap(), &[0x0404, 0x0505, 0x0606]);
        assert_eq!(src.row(0).unwrap(), &[0x0101, 0x0202, 0x0303]);
    }

    #[test]
    fn rejects_short_buffers_and_strides() {
        assert!(matches!(
            PixelBufferSource::new(vec![0; 6], 2, 1, 5, PixelLayout::Rgb8, AlphaMode::Preserve),
            Err(PipelineError::InvalidParameter(_))
        ));
        assert!(matches!(
            PixelBufferSource::new(vec![0; 5], 1, 2, 3, PixelLayout::Rgb8, AlphaMode::Preserve),
            Err(PipelineError::BufferTooSmall { needed: 6, actual: 5 })
        ));
    }

    #[cfg(feature = "rgb")]
    #[test]
    fn typed_rgba_pixels() {
        let pixels = [rgb::RGBA8::new(0, 0, 0, 0), rgb::RGBA8::new(255, 255, 255, 255)];
        let mut src = PixelBufferSource::from_rgba8(&pixels, 2, 1, AlphaMode::Preserve).unwrap();
        assert_eq!(src.info().color_type, ColorType::Rgba);
        assert_eq!(src.row(0).unwrap()[4..], [SAMPLE_MAX; 4]);
    }
}
