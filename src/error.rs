use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Errors from frame parsing and encoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("malformed frame: stream ended after {received} of 4 length-prefix bytes")]
    TruncatedLength { received: usize },

    #[error("malformed frame: truncated payload, declared {expected} bytes, got {received}")]
    TruncatedPayload { expected: usize, received: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FrameError {
    /// True for the two malformed-frame cases (short length prefix or short body).
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::TruncatedLength { .. } | Self::TruncatedPayload { .. }
        )
    }
}

/// Errors from encoding or decoding an evidence bundle.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid magic bytes: expected {expected:02X?}, got {actual:02X?}")]
    InvalidMagic { expected: [u8; 4], actual: Vec<u8> },

    #[error("unsupported evidence encoding version: {0}")]
    UnsupportedVersion(u8),

    #[error("truncated evidence encoding: missing {0}")]
    Truncated(&'static str),

    #[error("evidence piece count {count} cannot fit in {remaining} remaining bytes")]
    PieceCountOverflow { count: u32, remaining: usize },

    #[error("{field} too large: {size} bytes")]
    FieldTooLarge { field: &'static str, size: usize },

    #[error("{0} trailing bytes after evidence list")]
    TrailingBytes(usize),

    #[error("{0}")]
    Other(String),
}

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("operation cancelled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("timed out after {0:?} waiting for evidence")]
    Timeout(Duration),

    #[error("failed to connect to {} after {attempts} attempts: {source}", path.display())]
    ConnectFailed {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to listen on {}: {source}", path.display())]
    BindFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Frame(FrameError),

    #[error("failed to encode evidence: {0}")]
    Encode(#[source] CodecError),

    #[error("failed to decode evidence: {0}")]
    Decode(#[source] CodecError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// True if the caller's context ended the operation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// True if the peer sent a frame with a short length prefix or short body.
    pub fn is_malformed_frame(&self) -> bool {
        matches!(self, Self::Frame(e) if e.is_malformed())
    }
}

// Transport failures inside the frame reader surface as `Error::Io`, not as
// frame errors: only protocol violations by the peer are `Error::Frame`.
impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::Io(io) => Self::Io(io),
            other => Self::Frame(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_io_error_maps_to_io() {
        let err: Error = FrameError::Io(io::Error::from(io::ErrorKind::BrokenPipe)).into();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[test]
    fn malformed_classification() {
        let err: Error = FrameError::TruncatedLength { received: 3 }.into();
        assert!(err.is_malformed_frame());

        let err: Error = FrameError::PayloadTooLarge { size: 2, max: 1 }.into();
        assert!(!err.is_malformed_frame());
        assert!(matches!(err, Error::Frame(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn connect_failed_display_mentions_path_and_attempts() {
        let err = Error::ConnectFailed {
            path: PathBuf::from("/tmp/x.sock"),
            attempts: 11,
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/x.sock"), "{msg}");
        assert!(msg.contains("11 attempts"), "{msg}");
    }
}
