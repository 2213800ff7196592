//! Consumers that pull a whole chain into an 8-bit RGB surface, either in
//! place or on a worker thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use enough::Stop;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::pixel::{ColorType, SAMPLE_MAX, Sample, sample_to_eight};
use crate::source::{BoxedSource, RowSource};

#[inline]
fn over(c: u8, alpha: u8, bg: u8) -> u8 {
    let a = u32::from(alpha);
    ((u32::from(c) * a + u32::from(bg) * (255 - a) + 127) / 255) as u8
}

#[inline]
fn ink_to_eight(v: Sample) -> u8 {
    255 - sample_to_eight(v)
}

#[inline]
fn cmyk_to_rgb(px: &[Sample]) -> [u8; 3] {
    let max = u32::from(SAMPLE_MAX);
    let k = max - u32::from(px[3]);
    let channel = |c: Sample| sample_to_eight(((max - u32::from(c)) * k / max) as Sample);
    [channel(px[0]), channel(px[1]), channel(px[2])]
}

/// Convert one row of samples to packed RGB, compositing alpha over
/// `background`.
fn convert_row(color_type: ColorType, background: [u8; 3], src: &[Sample], dst: &mut [u8]) {
    let spp = color_type.samples_per_pixel();
    for (out, px) in dst.chunks_exact_mut(3).zip(src.chunks_exact(spp)) {
        let rgb = match color_type {
            ColorType::Grey | ColorType::GreyAlpha | ColorType::BlackWhite => {
                let v = ink_to_eight(px[0]);
                [v, v, v]
            }
            ColorType::Rgb | ColorType::Rgba => {
                [sample_to_eight(px[0]), sample_to_eight(px[1]), sample_to_eight(px[2])]
            }
            _ => cmyk_to_rgb(px),
        };
        if color_type.has_alpha() {
            let alpha = sample_to_eight(px[spp - 1]);
            for ((o, c), bg) in out.iter_mut().zip(rgb).zip(background) {
                *o = over(c, alpha, bg);
            }
        } else {
            out.copy_from_slice(&rgb);
        }
    }
}

fn check_renderable(color_type: ColorType) -> Result<(), PipelineError> {
    match color_type {
        ColorType::Grey
        | ColorType::GreyAlpha
        | ColorType::BlackWhite
        | ColorType::Rgb
        | ColorType::Rgba
        | ColorType::Cmyk
        | ColorType::CmykAlpha => Ok(()),
        other => Err(PipelineError::UnsupportedColorSpace(format!(
            "cannot render {other:?} to RGB"
        ))),
    }
}

/// Pull rows `0..height` in order, calling `before_row` at each row boundary.
fn render_with(
    source: &mut dyn RowSource,
    background: [u8; 3],
    mut before_row: impl FnMut(u32) -> Result<(), PipelineError>,
) -> Result<Vec<u8>, PipelineError> {
    let info = source.info().clone();
    check_renderable(info.color_type)?;
    let stride = info.width as usize * 3;
    if stride == 0 {
        return Ok(Vec::new());
    }
    let mut pixels = vec![0u8; stride * info.height as usize];
    for (y, dst) in (0..info.height).zip(pixels.chunks_exact_mut(stride)) {
        before_row(y)?;
        convert_row(info.color_type, background, source.row(y)?, dst);
    }
    Ok(pixels)
}

/// Render the whole image to packed 8-bit RGB, top row first.
///
/// Grey and black-and-white ink are mapped back to light, CMYK is converted
/// naively, and alpha is composited over `background`. `stop` is checked
/// between rows.
pub fn render_rgb8(
    source: &mut dyn RowSource,
    background: [u8; 3],
    stop: &dyn Stop,
) -> Result<Vec<u8>, PipelineError> {
    render_with(source, background, |_| Ok(stop.check()?))
}

/// [`render_rgb8`] into an [`imgref::ImgVec`].
#[cfg(feature = "imgref")]
pub fn render_imgvec(
    source: &mut dyn RowSource,
    background: [u8; 3],
    stop: &dyn Stop,
) -> Result<imgref::ImgVec<rgb::RGB8>, PipelineError> {
    use rgb::AsPixels as _;

    let (width, height) = (source.info().width as usize, source.info().height as usize);
    let bytes = render_rgb8(source, background, stop)?;
    let pixels: &[rgb::RGB8] = bytes.as_pixels();
    Ok(imgref::ImgVec::new(pixels.to_vec(), width, height))
}

#[derive(Default)]
struct Progress {
    rows_done: u32,
    finished: bool,
    result: Option<Result<Vec<u8>, PipelineError>>,
}

struct Shared {
    progress: Mutex<Progress>,
    changed: Condvar,
    cancel: AtomicBool,
}

impl Shared {
    fn update(&self, f: impl FnOnce(&mut Progress)) {
        let mut progress = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut progress);
        self.changed.notify_all();
    }
}

/// Marks the render finished even if the worker unwinds.
struct FinishGuard(Arc<Shared>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.update(|p| p.finished = true);
    }
}

/// A render running on its own thread, which owns the whole chain.
///
/// Cancellation takes effect at the next row boundary; a row already being
/// produced runs to completion. Dropping the handle cancels the render
/// without waiting for it.
pub struct BackgroundRender {
    shared: Arc<Shared>,
    height: u32,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundRender {
    pub fn spawn(mut source: BoxedSource, background: [u8; 3]) -> Result<Self, PipelineError> {
        let height = source.info().height;
        let shared = Arc::new(Shared {
            progress: Mutex::new(Progress::default()),
            changed: Condvar::new(),
            cancel: AtomicBool::new(false),
        });

        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("zenrows-render".to_string())
            .spawn(move || {
                let _finish = FinishGuard(Arc::clone(&worker));
                let result = render_with(&mut source, background, |y| {
                    if worker.cancel.load(Ordering::Relaxed) {
                        return Err(PipelineError::RenderAborted);
                    }
                    worker.update(|p| p.rows_done = y);
                    Ok(())
                });
                match &result {
                    Ok(_) => debug!(rows = height, "background render complete"),
                    Err(PipelineError::RenderAborted) => debug!("background render cancelled"),
                    Err(e) => warn!(error = %e, "background render failed"),
                }
                worker.update(|p| {
                    if result.is_ok() {
                        p.rows_done = height;
                    }
                    p.result = Some(result);
                });
            })?;

        Ok(Self {
            shared,
            height,
            handle: Some(handle),
        })
    }

    /// Ask the worker to stop at the next row boundary.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::Relaxed);
    }

    /// Rows completed so far, and the total.
    pub fn progress(&self) -> (u32, u32) {
        let progress = self.shared.progress.lock().unwrap_or_else(PoisonError::into_inner);
        (progress.rows_done, self.height)
    }

    pub fn is_finished(&self) -> bool {
        self.shared
            .progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finished
    }

    /// Block until the worker finishes and return its pixels.
    ///
    /// A cancelled render, or one whose worker panicked, is `RenderAborted`.
    pub fn wait(mut self) -> Result<Vec<u8>, PipelineError> {
        let result = {
            let mut progress = self.shared.progress.lock().unwrap_or_else(PoisonError::into_inner);
            while !progress.finished {
                progress = self
                    .shared
                    .changed
                    .wait(progress)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            progress.result.take()
        };
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        result.unwrap_or(Err(PipelineError::RenderAborted))
    }
}

impl Drop for BackgroundRender {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel();
        }
    }
}
