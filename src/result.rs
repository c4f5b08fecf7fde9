//! Error types and the related `Result<T>`

use thiserror::Error;

pub type ScanResult<T> = Result<T, ScanError>;

/// Why a scan stopped short of another header
#[derive(Debug, Error)]
pub enum ScanError {
    /// The source ran out of bytes before another header turned up.
    ///
    /// This is how every scan ends, so callers usually treat it as success.
    #[error("End of stream")]
    EndOfStream,

    /// An error from underlying I/O
    #[error("I/O Error")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    /// Returns true if the scan simply ran out of input.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, ScanError::EndOfStream)
    }
}
