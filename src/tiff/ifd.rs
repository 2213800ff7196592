//! Baseline TIFF container parsing: header, directory chain and the tags
//! the strip decoder uses.

use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom};

use tracing::{debug, trace, warn};

use crate::error::PipelineError;
use crate::read::read_fully;
use crate::source::DEFAULT_RESOLUTION;

const MAX_DIRECTORIES: usize = 4096;
/// Upper bound on any array-valued tag we are willing to read.
const MAX_TAG_BYTES: u64 = 64 << 20;

pub(crate) mod tag {
    pub(crate) const IMAGE_WIDTH: u16 = 256;
    pub(crate) const IMAGE_LENGTH: u16 = 257;
    pub(crate) const BITS_PER_SAMPLE: u16 = 258;
    pub(crate) const COMPRESSION: u16 = 259;
    pub(crate) const PHOTOMETRIC: u16 = 262;
    pub(crate) const STRIP_OFFSETS: u16 = 273;
    pub(crate) const SAMPLES_PER_PIXEL: u16 = 277;
    pub(crate) const ROWS_PER_STRIP: u16 = 278;
    pub(crate) const STRIP_BYTE_COUNTS: u16 = 279;
    pub(crate) const X_RESOLUTION: u16 = 282;
    pub(crate) const Y_RESOLUTION: u16 = 283;
    pub(crate) const PLANAR_CONFIG: u16 = 284;
    pub(crate) const RESOLUTION_UNIT: u16 = 296;
    pub(crate) const COLOR_MAP: u16 = 320;
    pub(crate) const TILE_WIDTH: u16 = 322;
    pub(crate) const TILE_LENGTH: u16 = 323;
    pub(crate) const TILE_OFFSETS: u16 = 324;
    pub(crate) const TILE_BYTE_COUNTS: u16 = 325;
    pub(crate) const INK_SET: u16 = 332;
    pub(crate) const ICC_PROFILE: u16 = 34675;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub(crate) fn u16(self, b: [u8; 2]) -> u16 {
        match self {
            Self::Little => u16::from_le_bytes(b),
            Self::Big => u16::from_be_bytes(b),
        }
    }

    pub(crate) fn u32(self, b: [u8; 4]) -> u32 {
        match self {
            Self::Little => u32::from_le_bytes(b),
            Self::Big => u32::from_be_bytes(b),
        }
    }
}

/// One 12-byte directory entry, value not yet resolved.
#[derive(Clone, Copy, Debug)]
struct Entry {
    tag: u16,
    kind: u16,
    count: u32,
    field: [u8; 4],
}

impl Entry {
    fn element_size(&self) -> Option<u64> {
        match self.kind {
            1 | 2 | 6 | 7 => Some(1),
            3 | 8 => Some(2),
            4 | 9 | 11 => Some(4),
            5 | 10 | 12 => Some(8),
            _ => None,
        }
    }
}

/// The entries of one image file directory.
#[derive(Clone, Debug)]
pub(crate) struct Directory {
    entries: Vec<Entry>,
}

impl Directory {
    fn find(&self, tag: u16) -> Option<&Entry> {
        self.entries.iter().find(|e| e.tag == tag)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Compression {
    None,
    PackBits,
}

/// Tile geometry of a tiled image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TileSize {
    pub(crate) width: u32,
    pub(crate) height: u32,
}

/// The selected directory with every tag the decoder needs resolved.
#[derive(Clone, Debug)]
pub(crate) struct ImageDirectory {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) bits_per_sample: u16,
    pub(crate) samples_per_pixel: u16,
    pub(crate) compression: Compression,
    pub(crate) photometric: u16,
    pub(crate) rows_per_strip: u32,
    pub(crate) tiles: Option<TileSize>,
    /// Strip or tile offsets, depending on `tiles`.
    pub(crate) offsets: Vec<u32>,
    pub(crate) byte_counts: Vec<u32>,
    pub(crate) xres: f64,
    pub(crate) yres: f64,
    pub(crate) color_map: Option<Vec<u16>>,
    pub(crate) ink_set: Option<u16>,
    pub(crate) icc_profile: Option<Vec<u8>>,
}

/// Reads tag values out of a container in a known byte order.
pub(crate) struct TagReader<'a, R> {
    reader: &'a mut R,
    order: ByteOrder,
}

impl<'a, R: Read + Seek> TagReader<'a, R> {
    pub(crate) fn new(reader: &'a mut R, order: ByteOrder) -> Self {
        Self { reader, order }
    }

    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), PipelineError> {
        self.reader.seek(SeekFrom::Start(offset))?;
        if read_fully(&mut *self.reader, buf)? < buf.len() {
            return Err(PipelineError::InvalidHeader(format!(
                "TIFF structure at offset {offset} runs past the end of the file"
            )));
        }
        Ok(())
    }

    /// Raw bytes of an entry's value, inline or out of line.
    fn value_bytes(&mut self, entry: &Entry) -> Result<Vec<u8>, PipelineError> {
        let size = entry.element_size().ok_or_else(|| {
            PipelineError::InvalidHeader(format!(
                "tag {} has unknown type {}",
                entry.tag, entry.kind
            ))
        })?;
        let len = size * u64::from(entry.count);
        if len > MAX_TAG_BYTES {
            return Err(PipelineError::LimitExceeded(format!(
                "tag {} holds {len} bytes",
                entry.tag
            )));
        }
        if len <= 4 {
            return Ok(entry.field[..len as usize].to_vec());
        }
        let mut buf = vec![0u8; len as usize];
        let offset = u64::from(self.order.u32(entry.field));
        self.read_exact_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Integer values of a BYTE, SHORT or LONG entry.
    fn unsigned(&mut self, entry: &Entry) -> Result<Vec<u32>, PipelineError> {
        let order = self.order;
        let bytes = self.value_bytes(entry)?;
        let values = match entry.kind {
            1 | 7 => bytes.iter().map(|&b| u32::from(b)).collect(),
            3 => bytes
                .chunks_exact(2)
                .map(|c| u32::from(order.u16([c[0], c[1]])))
                .collect(),
            4 => bytes
                .chunks_exact(4)
                .map(|c| order.u32([c[0], c[1], c[2], c[3]]))
                .collect(),
            other => {
                return Err(PipelineError::InvalidHeader(format!(
                    "tag {} has non-integer type {other}",
                    entry.tag
                )));
            }
        };
        Ok(values)
    }

    fn first_unsigned(&mut self, dir: &Directory, tag: u16) -> Result<Option<u32>, PipelineError> {
        match dir.find(tag) {
            Some(entry) => Ok(self.unsigned(entry)?.first().copied()),
            None => Ok(None),
        }
    }

    /// A resolution value. RATIONAL, SRATIONAL, FLOAT and integer types are
    /// read; anything else is ignored so the default applies.
    fn rational(&mut self, dir: &Directory, tag: u16) -> Result<Option<f64>, PipelineError> {
        let Some(entry) = dir.find(tag) else {
            return Ok(None);
        };
        if entry.count == 0 {
            return Ok(None);
        }
        let order = self.order;
        let value = match entry.kind {
            1 | 3 | 4 => self.unsigned(entry)?.first().map(|&v| f64::from(v)),
            5 => {
                let b = self.value_bytes(entry)?;
                let num = order.u32([b[0], b[1], b[2], b[3]]);
                let den = order.u32([b[4], b[5], b[6], b[7]]);
                (den != 0).then(|| f64::from(num) / f64::from(den))
            }
            10 => {
                let b = self.value_bytes(entry)?;
                let num = order.u32([b[0], b[1], b[2], b[3]]) as i32;
                let den = order.u32([b[4], b[5], b[6], b[7]]) as i32;
                (den != 0).then(|| f64::from(num) / f64::from(den))
            }
            11 => {
                let b = self.value_bytes(entry)?;
                Some(f64::from(f32::from_bits(order.u32([b[0], b[1], b[2], b[3]]))))
            }
            other => {
                warn!(tag, kind = other, "resolution tag has an unusable type, using the default");
                None
            }
        };
        Ok(value)
    }

    fn read_directory(&mut self, offset: u32) -> Result<(Directory, u32), PipelineError> {
        let mut count = [0u8; 2];
        self.read_exact_at(u64::from(offset), &mut count)?;
        let count = usize::from(self.order.u16(count));

        let mut raw = vec![0u8; count * 12 + 4];
        self.read_exact_at(u64::from(offset) + 2, &mut raw)?;
        let entries = raw[..count * 12]
            .chunks_exact(12)
            .map(|e| Entry {
                tag: self.order.u16([e[0], e[1]]),
                kind: self.order.u16([e[2], e[3]]),
                count: self.order.u32([e[4], e[5], e[6], e[7]]),
                field: [e[8], e[9], e[10], e[11]],
            })
            .collect();
        let tail = &raw[count * 12..];
        let next = self.order.u32([tail[0], tail[1], tail[2], tail[3]]);
        Ok((Directory { entries }, next))
    }
}

/// Read the container header; returns the byte order and first directory offset.
pub(crate) fn read_container_header<R: Read + Seek>(
    reader: &mut R,
) -> Result<(ByteOrder, u32), PipelineError> {
    let mut header = [0u8; 8];
    reader.seek(SeekFrom::Start(0))?;
    if read_fully(reader, &mut header)? < header.len() {
        return Err(PipelineError::UnrecognizedFormat);
    }
    let order = match &header[..2] {
        b"II" => ByteOrder::Little,
        b"MM" => ByteOrder::Big,
        _ => return Err(PipelineError::UnrecognizedFormat),
    };
    match order.u16([header[2], header[3]]) {
        42 => {}
        43 => return Err(PipelineError::UnsupportedVariant("BigTIFF".into())),
        _ => return Err(PipelineError::UnrecognizedFormat),
    }
    Ok((order, order.u32([header[4], header[5], header[6], header[7]])))
}

/// Walk the directory chain and return the directory with the largest
/// pixel area. Ties go to the earlier directory.
pub(crate) fn select_largest<R: Read + Seek>(
    tags: &mut TagReader<'_, R>,
    first: u32,
) -> Result<Directory, PipelineError> {
    let mut seen = HashSet::new();
    let mut offset = first;
    let mut best: Option<(u64, usize, Directory)> = None;
    let mut index = 0usize;

    while offset != 0 {
        if !seen.insert(offset) || seen.len() > MAX_DIRECTORIES {
            debug!(offset, "TIFF directory chain loops, stopping");
            break;
        }
        let (dir, next) = tags.read_directory(offset)?;
        let width = tags.first_unsigned(&dir, tag::IMAGE_WIDTH)?.unwrap_or(0);
        let height = tags.first_unsigned(&dir, tag::IMAGE_LENGTH)?.unwrap_or(0);
        let area = u64::from(width) * u64::from(height);
        trace!(index, width, height, "TIFF sub-image");
        if best.as_ref().is_none_or(|(a, _, _)| area > *a) {
            best = Some((area, index, dir));
        }
        offset = next;
        index += 1;
    }

    match best {
        Some((_, chosen, dir)) => {
            debug!(sub_images = index, chosen, "selected largest TIFF sub-image");
            Ok(dir)
        }
        None => Err(PipelineError::InvalidHeader("TIFF has no image directory".into())),
    }
}

/// Resolve the tags of the selected directory.
pub(crate) fn resolve<R: Read + Seek>(
    tags: &mut TagReader<'_, R>,
    dir: &Directory,
) -> Result<ImageDirectory, PipelineError> {
    let width = tags.first_unsigned(dir, tag::IMAGE_WIDTH)?.unwrap_or(0);
    let height = tags.first_unsigned(dir, tag::IMAGE_LENGTH)?.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidHeader(format!(
            "TIFF dimensions {width}x{height}"
        )));
    }

    let samples_per_pixel = tags
        .first_unsigned(dir, tag::SAMPLES_PER_PIXEL)?
        .unwrap_or(1);
    let bits = match dir.find(tag::BITS_PER_SAMPLE) {
        Some(entry) => tags.unsigned(entry)?,
        None => vec![1],
    };
    let bits_per_sample = bits.first().copied().unwrap_or(1);
    if bits.iter().any(|&b| b != bits_per_sample) {
        return Err(PipelineError::UnsupportedVariant(
            "mixed bits per sample".into(),
        ));
    }
    if !matches!(bits_per_sample, 1 | 8 | 16) {
        return Err(PipelineError::UnsupportedVariant(format!(
            "{bits_per_sample} bits per sample (1, 8 or 16 supported)"
        )));
    }
    let samples_per_pixel = u16::try_from(samples_per_pixel)
        .ok()
        .filter(|&s| s > 0)
        .ok_or_else(|| {
            PipelineError::InvalidHeader(format!("{samples_per_pixel} samples per pixel"))
        })?;

    let compression = match tags.first_unsigned(dir, tag::COMPRESSION)?.unwrap_or(1) {
        1 => Compression::None,
        32773 => Compression::PackBits,
        other => {
            return Err(PipelineError::UnsupportedVariant(format!(
                "TIFF compression {other}"
            )));
        }
    };
    let planar = tags.first_unsigned(dir, tag::PLANAR_CONFIG)?.unwrap_or(1);
    if planar != 1 {
        return Err(PipelineError::UnsupportedVariant(
            "separate sample planes".into(),
        ));
    }
    let photometric = tags
        .first_unsigned(dir, tag::PHOTOMETRIC)?
        .ok_or_else(|| PipelineError::InvalidHeader("missing photometric interpretation".into()))?;

    let rows_per_strip = match tags.first_unsigned(dir, tag::ROWS_PER_STRIP)? {
        Some(rows) if rows > 0 && rows <= height => rows,
        _ => height,
    };

    let tiles = match (
        tags.first_unsigned(dir, tag::TILE_WIDTH)?,
        tags.first_unsigned(dir, tag::TILE_LENGTH)?,
    ) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Some(TileSize {
            width: w,
            height: h,
        }),
        (None, None) => None,
        _ => return Err(PipelineError::InvalidHeader("incomplete tile geometry".into())),
    };
    let (offset_tag, count_tag) = if tiles.is_some() {
        (tag::TILE_OFFSETS, tag::TILE_BYTE_COUNTS)
    } else {
        (tag::STRIP_OFFSETS, tag::STRIP_BYTE_COUNTS)
    };
    let offsets = match dir.find(offset_tag) {
        Some(entry) => tags.unsigned(entry)?,
        None => return Err(PipelineError::InvalidHeader("missing data offsets".into())),
    };
    let byte_counts = match dir.find(count_tag) {
        Some(entry) => tags.unsigned(entry)?,
        None => Vec::new(),
    };

    let unit = tags.first_unsigned(dir, tag::RESOLUTION_UNIT)?.unwrap_or(2);
    let scale = if unit == 3 { 2.54 } else { 1.0 };
    let xres = tags
        .rational(dir, tag::X_RESOLUTION)?
        .filter(|r| r.is_finite() && *r > 0.0)
        .map_or(DEFAULT_RESOLUTION, |r| r * scale);
    let yres = tags
        .rational(dir, tag::Y_RESOLUTION)?
        .filter(|r| r.is_finite() && *r > 0.0)
        .map_or(DEFAULT_RESOLUTION, |r| r * scale);

    let color_map = match dir.find(tag::COLOR_MAP) {
        Some(entry) => Some(tags.unsigned(entry)?.into_iter().map(|v| v as u16).collect()),
        None => None,
    };
    let ink_set = tags.first_unsigned(dir, tag::INK_SET)?.map(|v| v as u16);
    let icc_profile = match dir.find(tag::ICC_PROFILE) {
        Some(entry) => Some(tags.value_bytes(entry)?),
        None => None,
    };

    trace!(
        width,
        height,
        bits_per_sample,
        samples_per_pixel,
        photometric,
        rows_per_strip,
        tiled = tiles.is_some(),
        "resolved TIFF directory"
    );

    Ok(ImageDirectory {
        width,
        height,
        bits_per_sample: bits_per_sample as u16,
        samples_per_pixel,
        compression,
        photometric: photometric as u16,
        rows_per_strip,
        tiles,
        offsets,
        byte_counts,
        xres,
        yres,
        color_map,
        ink_set,
        icc_profile,
    })
}
