use crate::limits::Limits;

/// Default number of rows a bitmap decoder reads per strip.
pub const DEFAULT_STRIP_HEIGHT: u32 = 512;

/// How a stage reacts to requests and reads it cannot fully satisfy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClampPolicy {
    /// Keep going. A row past the end is served as the last row, a short
    /// read is zero-filled, a backwards request on a forward-only stage is
    /// attempted anyway. Each case logs a warning.
    #[default]
    Lenient,
    /// Fail with `RowOutOfRange`, `ShortRead` or `NonMonotonic` instead.
    Strict,
}

impl ClampPolicy {
    pub fn is_strict(self) -> bool {
        self == ClampPolicy::Strict
    }
}

/// Options shared by the file and buffer decoders.
#[derive(Clone, Debug)]
pub struct DecodeOptions {
    pub limits: Option<Limits>,
    pub clamp: ClampPolicy,
    /// Rows per strip for the bitmap decoder. TIFF files carry their own.
    pub strip_height: u32,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            limits: None,
            clamp: ClampPolicy::default(),
            strip_height: DEFAULT_STRIP_HEIGHT,
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn with_clamp_policy(mut self, clamp: ClampPolicy) -> Self {
        self.clamp = clamp;
        self
    }

    /// Strip height for the bitmap decoder; zero is treated as one row.
    pub fn with_strip_height(mut self, rows: u32) -> Self {
        self.strip_height = rows.max(1);
        self
    }

    pub(crate) fn check_dimensions(
        &self,
        width: u32,
        height: u32,
    ) -> Result<(), crate::PipelineError> {
        match &self.limits {
            Some(limits) => limits.check_dimensions(width, height),
            None => Ok(()),
        }
    }

    pub(crate) fn check_allocation(
        &self,
        what: &str,
        bytes: usize,
    ) -> Result<(), crate::PipelineError> {
        match &self.limits {
            Some(limits) => limits.check_allocation(what, bytes),
            None => Ok(()),
        }
    }
}
