//! BMP file and info header parsing.

use std::io::Read;

use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::options::ClampPolicy;
use crate::pixel::{ColorType, SAMPLE_MAX, Sample, eight_to_sample};
use crate::read::read_fully;
use crate::source::DEFAULT_RESOLUTION;

const FILE_HEADER_LEN: usize = 14;

/// Pixel encodings the strip decoder expands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BmpPixels {
    /// 32 bits, B G R A.
    Bgra32,
    /// 24 bits, B G R.
    Bgr24,
    /// 16 bits, red in the top five, green in the middle six, blue in the low five.
    Rgb565,
    /// 8-bit palette index, shown as grey.
    Palette8,
}

impl BmpPixels {
    fn from_depth(bits: u16) -> Result<Self, PipelineError> {
        match bits {
            32 => Ok(Self::Bgra32),
            24 => Ok(Self::Bgr24),
            16 => Ok(Self::Rgb565),
            8 => Ok(Self::Palette8),
            other => Err(PipelineError::UnsupportedVariant(format!(
                "BMP bit depth {other}"
            ))),
        }
    }

    pub(crate) fn bits(self) -> u32 {
        match self {
            Self::Bgra32 => 32,
            Self::Bgr24 => 24,
            Self::Rgb565 => 16,
            Self::Palette8 => 8,
        }
    }

    pub(crate) fn color_type(self) -> ColorType {
        match self {
            Self::Bgra32 => ColorType::Rgba,
            Self::Bgr24 | Self::Rgb565 => ColorType::Rgb,
            Self::Palette8 => ColorType::Grey,
        }
    }
}

/// Everything the strip decoder needs from the headers.
#[derive(Clone, Debug)]
pub(crate) struct BmpHeader {
    pub(crate) width: u32,
    pub(crate) height: u32,
    /// Rows stored first-row-first (negative height in the info header).
    pub(crate) top_down: bool,
    pub(crate) pixels: BmpPixels,
    pub(crate) image_start: u64,
    pub(crate) xres: f64,
    pub(crate) yres: f64,
    /// Palette mapped to ink-polarity grey samples.
    pub(crate) grey_palette: Box<[Sample; 256]>,
}

impl BmpHeader {
    /// Bytes per stored row, padded to four bytes.
    pub(crate) fn bytes_per_row(&self) -> Result<usize, PipelineError> {
        let bits = u64::from(self.pixels.bits()) * u64::from(self.width);
        usize::try_from((bits + 31) / 32 * 4).map_err(|_| PipelineError::DimensionsTooLarge {
            width: self.width,
            height: self.height,
        })
    }
}

/// Little-endian field reader over a header block. Out-of-range reads are
/// a header error, not a panic.
struct Fields<'a>(&'a [u8]);

impl Fields<'_> {
    fn u16(&self, at: usize) -> Result<u16, PipelineError> {
        self.0
            .get(at..at + 2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .ok_or_else(|| truncated("info header"))
    }

    fn u32(&self, at: usize) -> Result<u32, PipelineError> {
        self.0
            .get(at..at + 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .ok_or_else(|| truncated("info header"))
    }

    fn i32(&self, at: usize) -> Result<i32, PipelineError> {
        self.u32(at).map(|v| v as i32)
    }
}

fn truncated(what: &str) -> PipelineError {
    PipelineError::InvalidHeader(format!("truncated BMP {what}"))
}

/// Pixels per metre to pixels per inch; unset or nonsense values fall back
/// to the default resolution.
fn ppm_to_ppi(ppm: i32) -> f64 {
    if ppm <= 0 {
        return DEFAULT_RESOLUTION;
    }
    f64::from((ppm as u32).saturating_mul(254).saturating_add(5000) / 10_000)
}

/// Grey ramp used when the file has no palette: index `i` is grey level `i`.
fn default_grey_palette() -> Box<[Sample; 256]> {
    let mut palette = Box::new([0; 256]);
    for (i, slot) in palette.iter_mut().enumerate() {
        *slot = SAMPLE_MAX - eight_to_sample(i as u8);
    }
    palette
}

/// Parse the file header, info header and palette, leaving `reader` just
/// past the palette.
pub(crate) fn read_header<R: Read + ?Sized>(
    reader: &mut R,
    policy: ClampPolicy,
) -> Result<BmpHeader, PipelineError> {
    let mut prefix = [0u8; FILE_HEADER_LEN + 4];
    if read_fully(reader, &mut prefix)? < prefix.len() {
        return Err(if prefix.starts_with(b"BM") {
            truncated("file header")
        } else {
            PipelineError::UnrecognizedFormat
        });
    }
    if &prefix[..2] != b"BM" {
        return Err(PipelineError::UnrecognizedFormat);
    }
    let file = Fields(&prefix);
    let image_start = u64::from(file.u32(10)?);
    let info_len = file.u32(14)?;

    if !matches!(info_len, 12 | 40 | 56 | 64) {
        return Err(PipelineError::InvalidHeader(format!(
            "unknown BMP info header length {info_len}"
        )));
    }

    // The info block as it sits in the file, including its own length field.
    let mut block = vec![0u8; info_len as usize];
    block[..4].copy_from_slice(&prefix[FILE_HEADER_LEN..]);
    if read_fully(reader, &mut block[4..])? < block.len() - 4 {
        return Err(truncated("info header"));
    }
    let info = Fields(&block);

    let (width, raw_height, depth, xres, yres, palette_len, entry_len) = if info_len == 12 {
        let depth = info.u16(10)?;
        let palette_len = if depth == 8 { 256 } else { 0 };
        (
            i64::from(info.u16(4)?),
            i64::from(info.u16(6)?),
            depth,
            DEFAULT_RESOLUTION,
            DEFAULT_RESOLUTION,
            palette_len,
            3,
        )
    } else {
        let depth = info.u16(14)?;
        let compression = info.u32(16)?;
        // Bitfield masks on 16/32-bit images are read as the fixed layouts.
        let plain = compression == 0 || (compression == 3 && matches!(depth, 16 | 32));
        if !plain {
            return Err(PipelineError::UnsupportedVariant(format!(
                "BMP compression {compression}"
            )));
        }
        let mut palette_len = info.u32(32)? as usize;
        if depth == 8 {
            if palette_len == 0 {
                palette_len = 256;
            }
            palette_len = palette_len.min(256);
        } else {
            palette_len = 0;
        }
        (
            i64::from(info.i32(4)?),
            i64::from(info.i32(8)?),
            depth,
            ppm_to_ppi(info.i32(24)?),
            ppm_to_ppi(info.i32(28)?),
            palette_len,
            4,
        )
    };

    let pixels = BmpPixels::from_depth(depth)?;
    let top_down = raw_height < 0;
    let (width, height) = match (u32::try_from(width), u32::try_from(raw_height.unsigned_abs())) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(PipelineError::InvalidHeader(format!(
                "BMP dimensions {width}x{raw_height}"
            )));
        }
    };

    let mut grey_palette = default_grey_palette();
    if palette_len > 0 {
        let mut raw = vec![0u8; palette_len * entry_len];
        let got = read_fully(reader, &mut raw)?;
        if got < raw.len() {
            if policy.is_strict() {
                return Err(PipelineError::ShortRead {
                    offset: (FILE_HEADER_LEN as u64) + u64::from(info_len),
                    expected: raw.len(),
                    actual: got,
                });
            }
            warn!(expected = raw.len(), actual = got, "truncated BMP palette");
        }
        let complete = got / entry_len;
        for (slot, entry) in grey_palette
            .iter_mut()
            .zip(raw.chunks_exact(entry_len).take(complete))
        {
            // Entries are stored B G R [reserved].
            let avg = (u16::from(entry[0]) + u16::from(entry[1]) + u16::from(entry[2])) / 3;
            *slot = SAMPLE_MAX - eight_to_sample(avg as u8);
        }
    }

    debug!(
        width,
        height, depth, info_len, top_down, image_start, "parsed BMP header"
    );

    Ok(BmpHeader {
        width,
        height,
        top_down,
        pixels,
        image_start,
        xres,
        yres,
        grey_palette,
    })
}
