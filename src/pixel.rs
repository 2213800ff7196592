//! Working sample type, colour types and native pixel layouts.

/// One channel value as carried between pipeline stages.
pub type Sample = u16;

/// Largest value a [`Sample`] may hold.
pub const SAMPLE_MAX: Sample = u16::MAX;

/// Expand an 8-bit channel to the working sample width by bit replication,
/// so that 0 maps to 0 and 255 maps to [`SAMPLE_MAX`].
#[inline]
pub fn eight_to_sample(v: u8) -> Sample {
    (u16::from(v) << 8) | u16::from(v)
}

/// Reduce a working sample to 8 bits, rounding to nearest.
#[inline]
pub fn sample_to_eight(v: Sample) -> u8 {
    ((u32::from(v) * 255 + 32_767) / 65_535) as u8
}

/// Clamp a floating-point accumulator into the sample range and round it.
#[inline]
pub(crate) fn clamp_sample(v: f64) -> Sample {
    if v.is_nan() || v <= 0.0 {
        0
    } else if v >= f64::from(SAMPLE_MAX) {
        SAMPLE_MAX
    } else {
        (v + 0.5) as Sample
    }
}

/// Colour representation of the samples a stage produces.
///
/// Grey-family types (`Grey`, `GreyAlpha`, `BlackWhite`) use ink polarity:
/// 0 is white and [`SAMPLE_MAX`] is black, the same sense as CMYK.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorType {
    /// Colour type not determined (yet).
    Null,
    Grey,
    GreyAlpha,
    Rgb,
    Rgba,
    Cmyk,
    CmykAlpha,
    /// One sample per pixel, only 0 or [`SAMPLE_MAX`].
    BlackWhite,
    Lab,
    /// Arbitrary ink set with the given number of channels.
    DeviceN(u16),
}

impl ColorType {
    /// Number of samples making up one pixel.
    pub fn samples_per_pixel(&self) -> usize {
        match self {
            Self::Null => 0,
            Self::Grey | Self::BlackWhite => 1,
            Self::GreyAlpha => 2,
            Self::Rgb | Self::Lab => 3,
            Self::Rgba | Self::Cmyk => 4,
            Self::CmykAlpha => 5,
            Self::DeviceN(n) => usize::from(*n),
        }
    }

    /// Whether the last sample of each pixel is alpha.
    pub fn has_alpha(&self) -> bool {
        matches!(self, Self::GreyAlpha | Self::Rgba | Self::CmykAlpha)
    }

    /// The same colour space with any alpha channel removed.
    pub fn without_alpha(&self) -> ColorType {
        match self {
            Self::GreyAlpha => Self::Grey,
            Self::Rgba => Self::Rgb,
            Self::CmykAlpha => Self::Cmyk,
            other => *other,
        }
    }

    /// The same colour space with an alpha channel appended, if one exists.
    pub fn with_alpha(&self) -> Option<ColorType> {
        match self {
            Self::Grey => Some(Self::GreyAlpha),
            Self::Rgb => Some(Self::Rgba),
            Self::Cmyk => Some(Self::CmykAlpha),
            _ => None,
        }
    }
}

/// Memory layout of an already-decoded pixel buffer handed to the pipeline.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    /// 3 channels, 8-bit RGB.
    Rgb8,
    /// 4 channels, 8-bit RGBA.
    Rgba8,
}

impl PixelLayout {
    /// Bytes per pixel for this layout.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }
}

/// File formats the pipeline can open, detected from magic bytes.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Windows bitmap (`BM`).
    Bmp,
    /// TIFF container, either byte order.
    Tiff,
}

impl ImageFormat {
    /// Identify a format from the first bytes of a file.
    pub fn detect(header: &[u8]) -> Option<ImageFormat> {
        match header {
            [b'B', b'M', ..] => Some(Self::Bmp),
            [b'I', b'I', 42, 0, ..] | [b'M', b'M', 0, 42, ..] => Some(Self::Tiff),
            _ => None,
        }
    }
}
