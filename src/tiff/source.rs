use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use tracing::{debug, trace, warn};

use super::ifd::{
    ByteOrder, Compression, ImageDirectory, TagReader, read_container_header, resolve,
    select_largest,
};
use super::packbits;
use crate::bits::unpack_bits_msb;
use crate::error::PipelineError;
use crate::options::{ClampPolicy, DecodeOptions};
use crate::pixel::{ColorType, SAMPLE_MAX, Sample, eight_to_sample};
use crate::read::read_at;
use crate::source::{EmbeddedProfile, RowBuffer, RowRequest, RowSource, SourceInfo};

const PHOTOMETRIC_MIN_IS_WHITE: u16 = 0;
const PHOTOMETRIC_MIN_IS_BLACK: u16 = 1;
const PHOTOMETRIC_RGB: u16 = 2;
const PHOTOMETRIC_PALETTE: u16 = 3;
const PHOTOMETRIC_SEPARATED: u16 = 5;

/// The ink set declared by a separated (CMYK or DeviceN) image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InkSet {
    Cmyk,
    NotCmyk,
    Other(u16),
}

impl From<u16> for InkSet {
    fn from(v: u16) -> Self {
        match v {
            1 => Self::Cmyk,
            2 => Self::NotCmyk,
            other => Self::Other(other),
        }
    }
}

/// How stored samples become working samples.
#[derive(Clone, Debug)]
enum SampleMap {
    /// One bit per pixel; `ink_when_set` says whether a 1 bit is black.
    Bilevel { ink_when_set: bool },
    /// One-bit indices into a two-entry grey table.
    BilevelPalette([Sample; 2]),
    /// Eight-bit indices into a grey table.
    Palette(Box<[Sample; 256]>),
    /// 8 or 16-bit samples, with the first channel of each pixel optionally
    /// flipped into ink polarity.
    Direct {
        bits: u16,
        spp: usize,
        invert_first: bool,
    },
}

/// A decoded band: one strip, or one row of tiles.
struct Band {
    first: u32,
    rows: u32,
    data: Vec<u8>,
}

impl Band {
    fn contains(&self, row: u32) -> bool {
        row >= self.first && row - self.first < self.rows
    }
}

/// Reads a TIFF file one strip (or row of tiles) at a time.
///
/// When the file holds several sub-images the one with the largest pixel
/// area is decoded. Bands that do not contain the requested row are dropped
/// on every request, so sequential reading keeps a single band resident.
pub struct TiffSource<R> {
    reader: R,
    order: ByteOrder,
    dir: ImageDirectory,
    map: SampleMap,
    bytes_per_row: usize,
    band_height: u32,
    bands: Vec<Band>,
    scratch: Vec<u8>,
    profile: Option<EmbeddedProfile>,
    options: DecodeOptions,
    info: SourceInfo,
    out: RowBuffer,
}

impl TiffSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>, options: &DecodeOptions) -> Result<Self, PipelineError> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::new(file), options)
    }
}

impl TiffSource<Cursor<Vec<u8>>> {
    pub fn from_bytes(data: Vec<u8>, options: &DecodeOptions) -> Result<Self, PipelineError> {
        Self::new(Cursor::new(data), options)
    }
}

impl<R: Read + Seek + Send> TiffSource<R> {
    pub fn new(mut reader: R, options: &DecodeOptions) -> Result<Self, PipelineError> {
        let (order, first) = read_container_header(&mut reader)?;
        let mut tags = TagReader::new(&mut reader, order);
        let selected = select_largest(&mut tags, first)?;
        let mut dir = resolve(&mut tags, &selected)?;
        options.check_dimensions(dir.width, dir.height)?;

        let (color_type, map) = classify(&dir)?;
        let spp = usize::from(dir.samples_per_pixel);
        let bits = u64::from(dir.width) * spp as u64 * u64::from(dir.bits_per_sample);
        let bytes_per_row = usize::try_from(bits.div_ceil(8)).map_err(|_| {
            PipelineError::DimensionsTooLarge {
                width: dir.width,
                height: dir.height,
            }
        })?;

        let band_height = match dir.tiles {
            Some(tile) => {
                if dir.bits_per_sample == 1 && tile.width % 8 != 0 {
                    return Err(PipelineError::UnsupportedVariant(format!(
                        "bilevel tiles {} pixels wide",
                        tile.width
                    )));
                }
                tile.height
            }
            None => dir.rows_per_strip,
        };

        let mut info = SourceInfo::new(dir.width, dir.height, color_type);
        info.samples_per_pixel = spp;
        info.xres = dir.xres;
        info.yres = dir.yres;
        info.random_access = true;
        options.check_allocation(
            "TIFF row buffer",
            info.row_len() * std::mem::size_of::<Sample>(),
        )?;

        debug!(
            width = dir.width,
            height = dir.height,
            ?color_type,
            band_height,
            tiled = dir.tiles.is_some(),
            "opened TIFF"
        );

        let profile = dir.icc_profile.take().map(EmbeddedProfile::new);
        let scratch = if dir.bits_per_sample == 1 {
            vec![0; dir.width as usize]
        } else {
            Vec::new()
        };
        let out = RowBuffer::new(&info, options.clamp, "tiff");
        Ok(Self {
            reader,
            order,
            dir,
            map,
            bytes_per_row,
            band_height,
            bands: Vec::new(),
            scratch,
            profile,
            options: options.clone(),
            info,
            out,
        })
    }

    /// The declared ink set of a separated image, if any.
    pub fn ink_set(&self) -> Option<InkSet> {
        self.dir.ink_set.map(InkSet::from)
    }

    /// Decode strip or tile `index` into `out`, zero-filling what the file
    /// does not provide.
    fn decode_chunk(&mut self, index: usize, out: &mut [u8]) -> Result<(), PipelineError> {
        let Some(&offset) = self.dir.offsets.get(index) else {
            return Err(PipelineError::InvalidData(format!(
                "no offset for TIFF data chunk {index}"
            )));
        };
        let offset = u64::from(offset);
        let declared = self
            .dir
            .byte_counts
            .get(index)
            .map(|&c| c as usize)
            .filter(|&c| c > 0);
        let policy = self.options.clamp;

        match self.dir.compression {
            Compression::None => {
                let want = declared.map_or(out.len(), |c| c.min(out.len()));
                read_at(&mut self.reader, offset, &mut out[..want], policy)?;
                if want < out.len() {
                    short_chunk(policy, index, out.len(), want)?;
                }
            }
            Compression::PackBits => {
                let Some(len) = declared else {
                    return Err(PipelineError::InvalidHeader(
                        "compressed TIFF without byte counts".into(),
                    ));
                };
                let bound = packbits::max_packed_len(out.len());
                if len > bound {
                    debug!(index, declared = len, bound, "clipping oversized PackBits byte count");
                }
                let len = len.min(bound);
                self.options.check_allocation("TIFF compressed chunk", len)?;
                let mut packed = vec![0u8; len];
                read_at(&mut self.reader, offset, &mut packed, policy)?;
                let produced = packbits::unpack(&packed, out);
                if produced < out.len() {
                    short_chunk(policy, index, out.len(), produced)?;
                }
            }
        }
        Ok(())
    }

    fn load_band(&mut self, row: u32) -> Result<Band, PipelineError> {
        let index = row / self.band_height;
        let first = index * self.band_height;
        let rows = self.band_height.min(self.dir.height - first);
        let len = rows as usize * self.bytes_per_row;
        self.options.check_allocation("TIFF band", len)?;
        let mut data = vec![0u8; len];

        match self.dir.tiles {
            None => self.decode_chunk(index as usize, &mut data)?,
            Some(tile) => {
                let spp = u64::from(self.dir.samples_per_pixel);
                let bits = u64::from(tile.width) * spp * u64::from(self.dir.bits_per_sample);
                let tile_row_bytes = bits.div_ceil(8) as usize;
                let tile_len = tile_row_bytes * tile.height as usize;
                self.options.check_allocation("TIFF tile", tile_len)?;
                let across = self.dir.width.div_ceil(tile.width) as usize;
                let mut tile_buf = vec![0u8; tile_len];

                for column in 0..across {
                    tile_buf.fill(0);
                    self.decode_chunk(index as usize * across + column, &mut tile_buf)?;
                    let start = column * tile_row_bytes;
                    let take = tile_row_bytes.min(self.bytes_per_row - start);
                    for r in 0..rows as usize {
                        let dst = r * self.bytes_per_row + start;
                        let src = r * tile_row_bytes;
                        data[dst..dst + take].copy_from_slice(&tile_buf[src..src + take]);
                    }
                }
            }
        }

        debug!(band = index, first, rows, "decoded TIFF band");
        Ok(Band { first, rows, data })
    }

    fn produce(&mut self, row: u32) -> Result<(), PipelineError> {
        let before = self.bands.len();
        self.bands.retain(|band| band.contains(row));
        if self.bands.len() < before {
            trace!(row, evicted = before - self.bands.len(), "evicting TIFF bands");
        }
        if self.bands.is_empty() {
            let band = self.load_band(row)?;
            self.bands.push(band);
        }

        let band = &self.bands[0];
        let start = (row - band.first) as usize * self.bytes_per_row;
        let src = &band.data[start..start + self.bytes_per_row];
        expand_row(
            &self.map,
            self.order,
            src,
            &mut self.scratch,
            self.out.as_mut_slice(),
        );
        Ok(())
    }
}

fn short_chunk(
    policy: ClampPolicy,
    index: usize,
    expected: usize,
    actual: usize,
) -> Result<(), PipelineError> {
    if policy.is_strict() {
        return Err(PipelineError::InvalidData(format!(
            "TIFF data chunk {index} holds {actual} of {expected} bytes"
        )));
    }
    warn!(chunk = index, expected, actual, "TIFF data chunk short, zero-filling");
    Ok(())
}

impl<R: Read + Seek + Send> RowSource for TiffSource<R> {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn clamp_policy(&self) -> ClampPolicy {
        self.out.policy()
    }

    fn row(&mut self, row: u32) -> Result<&[Sample], PipelineError> {
        if let RowRequest::Produce(row) = self.out.request(row)? {
            self.produce(row)?;
            self.out.commit(row);
        }
        Ok(self.out.as_slice())
    }

    fn embedded_profile(&self) -> Option<&EmbeddedProfile> {
        self.profile.as_ref()
    }

    fn take_embedded_profile(&mut self) -> Option<EmbeddedProfile> {
        self.profile.take()
    }
}

/// Pick the working colour type and the sample mapping for a directory.
fn classify(dir: &ImageDirectory) -> Result<(ColorType, SampleMap), PipelineError> {
    let spp = usize::from(dir.samples_per_pixel);
    let bits = dir.bits_per_sample;
    let unsupported = |what: String| -> Result<(ColorType, SampleMap), PipelineError> {
        Err(PipelineError::UnsupportedVariant(what))
    };
    let direct = |invert_first: bool| SampleMap::Direct {
        bits,
        spp,
        invert_first,
    };

    match dir.photometric {
        PHOTOMETRIC_MIN_IS_WHITE | PHOTOMETRIC_MIN_IS_BLACK => {
            let min_is_black = dir.photometric == PHOTOMETRIC_MIN_IS_BLACK;
            match (bits, spp) {
                (1, 1) => Ok((
                    ColorType::BlackWhite,
                    SampleMap::Bilevel {
                        ink_when_set: !min_is_black,
                    },
                )),
                (1, _) => unsupported(format!("bilevel image with {spp} samples per pixel")),
                (_, 1) => Ok((ColorType::Grey, direct(min_is_black))),
                (_, 2) => Ok((ColorType::GreyAlpha, direct(min_is_black))),
                _ => unsupported(format!("grey image with {spp} samples per pixel")),
            }
        }
        PHOTOMETRIC_RGB => match (bits, spp) {
            (1, _) => unsupported("bilevel RGB".into()),
            (_, 3) => Ok((ColorType::Rgb, direct(false))),
            (_, 4) => Ok((ColorType::Rgba, direct(false))),
            _ => unsupported(format!("RGB image with {spp} samples per pixel")),
        },
        PHOTOMETRIC_PALETTE => classify_palette(dir),
        PHOTOMETRIC_SEPARATED => {
            if bits == 1 {
                return unsupported("bilevel separated image".into());
            }
            let color_type = match spp {
                4 => ColorType::Cmyk,
                5 => ColorType::CmykAlpha,
                n => ColorType::DeviceN(n as u16),
            };
            Ok((color_type, direct(false)))
        }
        other => unsupported(format!("photometric interpretation {other}")),
    }
}

fn classify_palette(dir: &ImageDirectory) -> Result<(ColorType, SampleMap), PipelineError> {
    if dir.samples_per_pixel != 1 || dir.bits_per_sample == 16 {
        return Err(PipelineError::UnsupportedVariant(format!(
            "{}-bit palette with {} samples per pixel",
            dir.bits_per_sample, dir.samples_per_pixel
        )));
    }
    let entries = 1usize << dir.bits_per_sample;
    let map = dir
        .color_map
        .as_deref()
        .filter(|m| m.len() >= entries * 3)
        .ok_or_else(|| PipelineError::InvalidHeader("palette image without colour map".into()))?;
    let (red, rest) = map.split_at(entries);
    let (green, blue) = rest.split_at(entries);
    let grey = |i: usize| -> u8 {
        ((u32::from(red[i] >> 8) + u32::from(green[i] >> 8) + u32::from(blue[i] >> 8)) / 3) as u8
    };

    if dir.bits_per_sample == 1 {
        return Ok(match (grey(0), grey(1)) {
            (0, 255) => (
                ColorType::BlackWhite,
                SampleMap::Bilevel {
                    ink_when_set: false,
                },
            ),
            (255, 0) => (
                ColorType::BlackWhite,
                SampleMap::Bilevel { ink_when_set: true },
            ),
            (g0, g1) => (
                ColorType::Grey,
                SampleMap::BilevelPalette([
                    SAMPLE_MAX - eight_to_sample(g0),
                    SAMPLE_MAX - eight_to_sample(g1),
                ]),
            ),
        });
    }

    let mut table = Box::new([0; 256]);
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = SAMPLE_MAX - eight_to_sample(grey(i));
    }
    Ok((ColorType::Grey, SampleMap::Palette(table)))
}

fn expand_row(
    map: &SampleMap,
    order: ByteOrder,
    src: &[u8],
    scratch: &mut [u8],
    dst: &mut [Sample],
) {
    match map {
        SampleMap::Bilevel { ink_when_set } => {
            let (set, clear) = if *ink_when_set { (255, 0) } else { (0, 255) };
            unpack_bits_msb(src, scratch, set, clear);
            for (d, &s) in dst.iter_mut().zip(scratch.iter()) {
                *d = eight_to_sample(s);
            }
        }
        SampleMap::BilevelPalette(table) => {
            unpack_bits_msb(src, scratch, 1, 0);
            for (d, &s) in dst.iter_mut().zip(scratch.iter()) {
                *d = table[usize::from(s)];
            }
        }
        SampleMap::Palette(table) => {
            for (d, &s) in dst.iter_mut().zip(src) {
                *d = table[usize::from(s)];
            }
        }
        SampleMap::Direct {
            bits,
            spp,
            invert_first,
        } => {
            let flip = |i: usize, v: Sample| {
                if *invert_first && i % spp == 0 {
                    SAMPLE_MAX - v
                } else {
                    v
                }
            };
            if *bits == 16 {
                for (i, (d, s)) in dst.iter_mut().zip(src.chunks_exact(2)).enumerate() {
                    *d = flip(i, order.u16([s[0], s[1]]));
                }
            } else {
                for (i, (d, &s)) in dst.iter_mut().zip(src).enumerate() {
                    *d = flip(i, eight_to_sample(s));
                }
            }
        }
    }
}
