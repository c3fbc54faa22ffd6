//! Transfer error type for retry and display classification.

use thiserror::Error;

/// Error returned by a single file transfer. Kept as a structured enum so the
/// retry policy and the user-facing classifier can match on variants before
/// conversion to anyhow.
#[derive(Debug, Error)]
pub enum TransferError {
    /// URL could not be parsed; fails before any network activity.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Final response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),

    /// Stream ended without a transport error but short of the expected
    /// length (e.g. server closed early). Reported as failure, not success.
    #[error("incomplete transfer: expected {expected} bytes, got {received}")]
    Incomplete { expected: u64, received: u64 },

    /// Curl reported an error (connection, DNS, stall, etc.).
    #[error(transparent)]
    Transport(#[from] curl::Error),

    /// Local file create/append failed (disk full, permissions, ...).
    #[error("filesystem: {0}")]
    Filesystem(#[from] std::io::Error),

    /// Transfer was cancelled by the caller. Not a failure; the partial
    /// file is left on disk for a future resume.
    #[error("cancelled")]
    Cancelled,
}
