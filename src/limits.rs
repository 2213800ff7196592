use crate::error::PipelineError;

/// Resource limits checked when a decoder opens a file and whenever it
/// allocates a strip or band buffer.
///
/// All fields default to `None` (no limit).
#[derive(Clone, Debug, Default)]
pub struct Limits {
    pub max_width: Option<u64>,
    pub max_height: Option<u64>,
    /// Maximum pixel count (width * height).
    pub max_pixels: Option<u64>,
    /// Maximum size of any single strip, band or row buffer.
    pub max_memory_bytes: Option<u64>,
}

impl Limits {
    pub fn with_max_pixels(mut self, pixels: u64) -> Self {
        self.max_pixels = Some(pixels);
        self
    }

    pub fn with_max_memory(mut self, bytes: u64) -> Self {
        self.max_memory_bytes = Some(bytes);
        self
    }

    /// Reject images whose declared size exceeds any dimension limit.
    pub(crate) fn check_dimensions(&self, width: u32, height: u32) -> Result<(), PipelineError> {
        let pixels = u64::from(width) * u64::from(height);
        let checks = [
            ("width", u64::from(width), self.max_width),
            ("height", u64::from(height), self.max_height),
            ("pixel count", pixels, self.max_pixels),
        ];
        for (what, value, limit) in checks {
            if let Some(limit) = limit {
                if value > limit {
                    return Err(PipelineError::LimitExceeded(format!(
                        "{what} {value} exceeds limit {limit}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Reject a buffer allocation of `bytes` if it is over the memory limit.
    pub(crate) fn check_allocation(&self, what: &str, bytes: usize) -> Result<(), PipelineError> {
        match self.max_memory_bytes {
            Some(limit) if bytes as u64 > limit => Err(PipelineError::LimitExceeded(format!(
                "{what} of {bytes} bytes exceeds memory limit {limit}"
            ))),
            _ => Ok(()),
        }
    }
}
