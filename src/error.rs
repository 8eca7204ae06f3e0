//! Error types for s-zstream

use std::io;

/// Result type for s-zstream operations
pub type Result<T> = std::result::Result<T, SZStreamError>;

/// Error types that can occur while driving a codec
#[derive(Debug)]
pub enum SZStreamError {
    /// I/O error from the underlying source or sink
    Io(io::Error),
    /// Memory for an output block or buffer could not be obtained
    Allocation(String),
    /// The codec engine reported a failure
    Codec(String),
    /// A segment references memory outside its backing buffer
    BoundsViolation(String),
    /// Operation invoked in the wrong state or with invalid arguments
    Misuse(String),
    /// Operation is not offered by this stream type
    Unsupported(&'static str),
    /// Index outside of a segment container
    IndexOutOfRange { index: usize, len: usize },
}

impl SZStreamError {
    pub(crate) fn misuse(msg: impl Into<String>) -> Self {
        SZStreamError::Misuse(msg.into())
    }

    pub(crate) fn codec(msg: impl Into<String>) -> Self {
        SZStreamError::Codec(msg.into())
    }

    /// Whether this error means "not offered by design" rather than a failure
    pub fn is_unsupported(&self) -> bool {
        matches!(self, SZStreamError::Unsupported(_))
    }
}

impl std::fmt::Display for SZStreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SZStreamError::Io(e) => write!(f, "I/O error: {}", e),
            SZStreamError::Allocation(msg) => write!(f, "Unable to allocate output buffer: {}", msg),
            SZStreamError::Codec(msg) => write!(f, "Codec error: {}", msg),
            SZStreamError::BoundsViolation(msg) => write!(f, "Bounds violation: {}", msg),
            SZStreamError::Misuse(msg) => write!(f, "Invalid operation: {}", msg),
            SZStreamError::Unsupported(op) => write!(f, "Unsupported operation: {}", op),
            SZStreamError::IndexOutOfRange { index, len } => {
                write!(f, "Index {} out of range (length {})", index, len)
            }
        }
    }
}

impl std::error::Error for SZStreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SZStreamError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SZStreamError {
    fn from(err: io::Error) -> Self {
        // Unwrap errors that crossed an `io::Read`/`io::Write` boundary
        if !err.get_ref().map_or(false, |inner| inner.is::<SZStreamError>()) {
            return SZStreamError::Io(err);
        }
        let kind = err.kind();
        match err.into_inner() {
            Some(inner) => match inner.downcast::<SZStreamError>() {
                Ok(ours) => *ours,
                Err(other) => SZStreamError::Io(io::Error::new(kind, other)),
            },
            None => SZStreamError::Io(io::Error::from(kind)),
        }
    }
}

impl From<SZStreamError> for io::Error {
    fn from(err: SZStreamError) -> Self {
        match err {
            SZStreamError::Io(e) => e,
            SZStreamError::Unsupported(_) => io::Error::new(io::ErrorKind::Unsupported, err),
            SZStreamError::Misuse(_) | SZStreamError::IndexOutOfRange { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, err)
            }
            SZStreamError::Allocation(_) => io::Error::new(io::ErrorKind::OutOfMemory, err),
            _ => io::Error::new(io::ErrorKind::Other, err),
        }
    }
}
