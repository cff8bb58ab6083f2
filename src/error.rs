//! Sorting errors.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::io;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// A configuration value is below the minimum needed to make progress.
    ValueTooSmall {
        /// Name of the offending parameter.
        parameter: &'static str,
    },
    /// Run metadata budget exceeded or merge fan-in could not be computed.
    NotEnoughMemory,
    /// Common I/O error.
    IO(io::Error),
    /// Binary stream length is not a multiple of the value width.
    TrailingBytes {
        /// Number of bytes left over after the last complete value.
        count: usize,
    },
    /// Text stream token is not a decimal unsigned 64-bit integer.
    InvalidText {
        /// The token that failed to parse.
        token: String,
    },
    /// Temporary directory or file creation error.
    TempDir(io::Error),
    /// Workers thread pool initialization error.
    ThreadPoolBuildError(rayon::ThreadPoolBuildError),
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::IO(err) => Some(err),
            SortError::TempDir(err) => Some(err),
            SortError::ThreadPoolBuildError(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::ValueTooSmall { parameter } => write!(f, "parameter is too small: {}", parameter),
            SortError::NotEnoughMemory => write!(f, "not enough memory"),
            SortError::IO(err) => write!(f, "I/O operation failed: {}", err),
            SortError::TrailingBytes { count } => write!(
                f,
                "binary stream length is not a multiple of 8 bytes ({} trailing bytes)",
                count
            ),
            SortError::InvalidText { token } => write!(f, "invalid unsigned integer: {:?}", token),
            SortError::TempDir(err) => write!(f, "temporary directory or file not created: {}", err),
            SortError::ThreadPoolBuildError(err) => write!(f, "thread pool initialization failed: {}", err),
        }
    }
}

impl From<io::Error> for SortError {
    fn from(err: io::Error) -> Self {
        SortError::IO(err)
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::io::{self, ErrorKind};

    use super::SortError;

    #[test]
    fn test_io_error_source() {
        let err: SortError = io::Error::new(ErrorKind::Other, "disk gone").into();
        assert!(matches!(err, SortError::IO(_)));
        assert_eq!(err.source().unwrap().to_string(), "disk gone");
        assert_eq!(err.to_string(), "I/O operation failed: disk gone");
    }

    #[test]
    fn test_display() {
        let err = SortError::ValueTooSmall { parameter: "buffer_size" };
        assert_eq!(err.to_string(), "parameter is too small: buffer_size");
        assert!(err.source().is_none());

        let err = SortError::TrailingBytes { count: 3 };
        assert_eq!(
            err.to_string(),
            "binary stream length is not a multiple of 8 bytes (3 trailing bytes)"
        );
    }
}
