use enough::StopReason;

/// Errors from decoding, filtering and rendering rows.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unrecognized format magic bytes")]
    UnrecognizedFormat,

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("unsupported format variant: {0}")]
    UnsupportedVariant(String),

    #[error("invalid pixel data: {0}")]
    InvalidData(String),

    #[error("dimensions too large: {width}x{height}")]
    DimensionsTooLarge { width: u32, height: u32 },

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("short read at offset {offset}: expected {expected} bytes, got {actual}")]
    ShortRead {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    #[error("buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("row {row} out of range (height {height})")]
    RowOutOfRange { row: u32, height: u32 },

    #[error("row {requested} requested after row {current} from a forward-only source")]
    NonMonotonic { requested: u32, current: u32 },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unsupported colour space: {0}")]
    UnsupportedColorSpace(String),

    #[error("colour transform failed: {0}")]
    ColorTransform(String),

    #[error("operation cancelled")]
    Cancelled(StopReason),

    #[error("background render aborted")]
    RenderAborted,
}

impl From<StopReason> for PipelineError {
    fn from(r: StopReason) -> Self {
        PipelineError::Cancelled(r)
    }
}
