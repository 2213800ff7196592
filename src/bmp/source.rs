use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use tracing::{debug, trace};

use super::header::{BmpHeader, BmpPixels, read_header};
use crate::bits::scale_to_eight;
use crate::error::PipelineError;
use crate::options::{ClampPolicy, DecodeOptions};
use crate::pixel::{Sample, eight_to_sample};
use crate::read::read_at;
use crate::source::{RowBuffer, RowRequest, RowSource, SourceInfo};

/// The rows of the file currently held in memory, in file order.
struct Strip {
    first: u32,
    rows: u32,
    data: Vec<u8>,
}

impl Strip {
    fn contains(&self, file_row: u32) -> bool {
        file_row >= self.first && file_row - self.first < self.rows
    }
}

/// Reads an uncompressed BMP one strip of rows at a time.
///
/// At most one strip is resident. Rows are served top to bottom whatever the
/// storage order, and may be requested in any order.
pub struct BmpSource<R> {
    reader: R,
    header: BmpHeader,
    bytes_per_row: usize,
    strip_height: u32,
    strip: Option<Strip>,
    options: DecodeOptions,
    info: SourceInfo,
    out: RowBuffer,
}

impl BmpSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>, options: &DecodeOptions) -> Result<Self, PipelineError> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::new(file), options)
    }
}

impl BmpSource<Cursor<Vec<u8>>> {
    pub fn from_bytes(data: Vec<u8>, options: &DecodeOptions) -> Result<Self, PipelineError> {
        Self::new(Cursor::new(data), options)
    }
}

impl<R: Read + Seek + Send> BmpSource<R> {
    /// Parse the headers and palette; no pixel data is read yet.
    pub fn new(mut reader: R, options: &DecodeOptions) -> Result<Self, PipelineError> {
        let header = read_header(&mut reader, options.clamp)?;
        options.check_dimensions(header.width, header.height)?;
        let bytes_per_row = header.bytes_per_row()?;

        let mut info = SourceInfo::new(header.width, header.height, header.pixels.color_type());
        info.xres = header.xres;
        info.yres = header.yres;
        info.random_access = true;
        options.check_allocation(
            "BMP row buffer",
            info.row_len() * std::mem::size_of::<Sample>(),
        )?;

        let out = RowBuffer::new(&info, options.clamp, "bmp");
        Ok(Self {
            reader,
            strip_height: options.strip_height.clamp(1, header.height),
            header,
            bytes_per_row,
            strip: None,
            options: options.clone(),
            info,
            out,
        })
    }

    /// Make the strip holding `file_row` resident, dropping any other.
    fn load_strip(&mut self, file_row: u32) -> Result<(), PipelineError> {
        if self.strip.as_ref().is_some_and(|s| s.contains(file_row)) {
            return Ok(());
        }
        if let Some(old) = self.strip.take() {
            trace!(first = old.first, rows = old.rows, "evicting BMP strip");
        }

        let first = file_row / self.strip_height * self.strip_height;
        let rows = self.strip_height.min(self.header.height - first);
        let len = rows as usize * self.bytes_per_row;
        self.options.check_allocation("BMP strip", len)?;

        let mut data = vec![0u8; len];
        let offset = self.header.image_start + u64::from(first) * self.bytes_per_row as u64;
        debug!(first, rows, offset, "reading BMP strip");
        read_at(&mut self.reader, offset, &mut data, self.options.clamp)?;
        self.strip = Some(Strip { first, rows, data });
        Ok(())
    }

    fn produce(&mut self, row: u32) -> Result<(), PipelineError> {
        let file_row = if self.header.top_down {
            row
        } else {
            self.header.height - 1 - row
        };
        self.load_strip(file_row)?;

        let Some(strip) = self.strip.as_ref() else {
            return Err(PipelineError::InvalidData("BMP strip missing".into()));
        };
        let start = (file_row - strip.first) as usize * self.bytes_per_row;
        let src = &strip.data[start..start + self.bytes_per_row];
        expand_row(
            self.header.pixels,
            src,
            self.out.as_mut_slice(),
            &self.header.grey_palette,
        );
        Ok(())
    }
}

impl<R: Read + Seek + Send> RowSource for BmpSource<R> {
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
}

/// Expand one stored row into working samples.
fn expand_row(pixels: BmpPixels, src: &[u8], dst: &mut [Sample], palette: &[Sample; 256]) {
    match pixels {
        BmpPixels::Bgra32 => {
            for (px, out) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
                out[0] = eight_to_sample(px[2]);
                out[1] = eight_to_sample(px[1]);
                out[2] = eight_to_sample(px[0]);
                out[3] = eight_to_sample(px[3]);
            }
        }
        BmpPixels::Bgr24 => {
            for (px, out) in src.chunks_exact(3).zip(dst.chunks_exact_mut(3)) {
                out[0] = eight_to_sample(px[2]);
                out[1] = eight_to_sample(px[1]);
                out[2] = eight_to_sample(px[0]);
            }
        }
        BmpPixels::Rgb565 => {
            for (px, out) in src.chunks_exact(2).zip(dst.chunks_exact_mut(3)) {
                let v = u32::from(u16::from_le_bytes([px[0], px[1]]));
                out[0] = eight_to_sample(scale_to_eight(v >> 11, 5));
                out[1] = eight_to_sample(scale_to_eight(v >> 5, 6));
                out[2] = eight_to_sample(scale_to_eight(v, 5));
            }
        }
        BmpPixels::Palette8 => {
            for (&index, out) in src.iter().zip(dst.iter_mut()) {
                *out = palette[usize::from(index)];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::SAMPLE_MAX;

    #[test]
    fn rgb565_channels() {
        let palette = [0; 256];
        let mut out = [0; 3];
        // Pure red, then pure green.
        expand_row(BmpPixels::Rgb565, &0xf800u16.to_le_bytes(), &mut out, &palette);
        assert_eq!(out, [SAMPLE_MAX, 0, 0]);
        expand_row(BmpPixels::Rgb565, &0x07e0u16.to_le_bytes(), &mut out, &palette);
        assert_eq!(out, [0, SAMPLE_MAX, 0]);
    }

    #[test]
    fn bgra_is_swizzled() {
        let palette = [0; 256];
        let mut out = [0; 4];
        expand_row(BmpPixels::Bgra32, &[1, 2, 3, 4], &mut out, &palette);
        assert_eq!(out, [0x0303, 0x0202, 0x0101, 0x0404]);
    }
}
