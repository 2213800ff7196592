//! TIFF strip and tile decoder.
//!
//! Baseline containers only: either byte order, uncompressed or PackBits,
//! contiguous samples at 1, 8 or 16 bits. Grey, palette, RGB, CMYK and
//! DeviceN photometric interpretations are supported; palette images are
//! reduced to grey.

mod ifd;
mod packbits;
mod source;

pub use source::{InkSet, TiffSource};
