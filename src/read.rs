//! Positioned reads with the crate's short-read policy.

use std::io::{self, Read, Seek, SeekFrom};

use tracing::warn;

use crate::error::PipelineError;
use crate::options::ClampPolicy;

/// Read until `buf` is full or the reader is exhausted; returns bytes read.
pub(crate) fn read_fully<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Seek to `offset` and fill `buf`.
///
/// A short read zero-fills the rest of `buf` and logs a warning under
/// [`ClampPolicy::Lenient`]; under [`ClampPolicy::Strict`] it is an error.
pub(crate) fn read_at<R: Read + Seek + ?Sized>(
    reader: &mut R,
    offset: u64,
    buf: &mut [u8],
    policy: ClampPolicy,
) -> Result<(), PipelineError> {
    reader.seek(SeekFrom::Start(offset))?;
    let actual = read_fully(reader, buf)?;
    if actual < buf.len() {
        if policy.is_strict() {
            return Err(PipelineError::ShortRead {
                offset,
                expected: buf.len(),
                actual,
            });
        }
        warn!(offset, expected = buf.len(), actual, "short read, zero-filling");
        buf[actual..].fill(0);
    }
    Ok(())
}
