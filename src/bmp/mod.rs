//! Windows bitmap strip decoder.
//!
//! Handles uncompressed 8-bit palette, 16-bit 5-6-5, 24-bit and 32-bit
//! files with the OS/2 (12-byte) or Windows (40, 56, 64-byte) info header.
//! Palette images come out as grey; everything else as RGB or RGBA.

mod header;
mod source;

pub use source::BmpSource;
