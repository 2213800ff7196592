//! # zenrows
//!
//! A demand-driven image row pipeline. Decoders, resamplers and filters are
//! stacked by wrapping one stage around another; the consumer pulls rows from
//! the outermost stage and each stage pulls only the upstream rows it needs.
//!
//! ## Stages
//!
//! ### Decoders
//! - **BMP** (`bmp` feature): 32-bit BGRA, 24-bit BGR, 16-bit 5-6-5 and
//!   8-bit palette (collapsed to grey), read one strip at a time
//! - **TIFF** (`tiff` feature): 1/8/16-bit strips or tiles, uncompressed or
//!   PackBits; the largest sub-image is chosen
//! - **Pixel buffers**: 8-bit RGB/RGBA already in memory
//!
//! ### Filters
//! - Nearest-neighbour, bilinear, box-filter and Lanczos resampling, each as
//!   separate horizontal and vertical stages
//! - Unsharp mask
//! - Colour transforms through any [`ColorTransform`]
//!
//! ## Samples
//!
//! Every stage produces `u16` samples. Grey and black-and-white data use ink
//! polarity (0 is white), as CMYK does.
//!
//! ## Non-Goals
//!
//! - Encoding
//! - Colour-management internals (profiles and transforms come from outside)
//! - Random access through forward-only filters
//!
//! ## Usage
//!
//! ```no_run
//! use zenrows::{DecodeOptions, RowSource, ResampleMethod, Unstoppable, resample};
//!
//! let source = zenrows::open("photo.bmp", &DecodeOptions::default())?;
//! let mut thumb = resample(source, 160, 120, ResampleMethod::Auto)?;
//! for y in 0..thumb.info().height {
//!     let row = thumb.row(y)?;
//!     // copy `row` out before asking for the next one
//!     # let _ = row;
//! }
//!
//! let rgb = zenrows::render_rgb8(&mut thumb, [255, 255, 255], &Unstoppable)?;
//! # let _ = rgb;
//! # Ok::<(), zenrows::PipelineError>(())
//! ```

#![forbid(unsafe_code)]

mod bits;
mod buffer;
mod cms;
mod error;
mod limits;
mod options;
mod pipeline;
mod pixel;
mod read;
mod render;
mod ring;
mod source;
mod unsharp;

pub mod resample;

#[cfg(feature = "bmp")]
pub mod bmp;

#[cfg(feature = "tiff")]
pub mod tiff;

// Re-exports
#[cfg(feature = "bmp")]
pub use bmp::BmpSource;
pub use buffer::{AlphaMode, PixelBufferSource};
pub use cms::{
    ColorProfile, ColorTransform, ColorTransformFilter, RenderingIntent, TransformFactory,
};
pub use enough::{Stop, Unstoppable};
pub use error::PipelineError;
pub use limits::Limits;
pub use options::{ClampPolicy, DEFAULT_STRIP_HEIGHT, DecodeOptions};
pub use pipeline::{Pipeline, open, open_bytes};
pub use pixel::{
    ColorType, ImageFormat, PixelLayout, SAMPLE_MAX, Sample, eight_to_sample, sample_to_eight,
};
#[cfg(feature = "imgref")]
pub use render::render_imgvec;
pub use render::{BackgroundRender, render_rgb8};
pub use resample::{ResampleMethod, resample};
pub use source::{BoxedSource, DEFAULT_RESOLUTION, EmbeddedProfile, RowSource, SourceInfo};
#[cfg(feature = "tiff")]
pub use tiff::{InkSet, TiffSource};
pub use unsharp::UnsharpMask;
