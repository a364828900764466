//! Error types for sftpmock

use std::fmt;

/// Unified error type for all sftpmock operations.
///
/// The store variants (`NotFound` through `InvalidPath`) carry the path
/// that triggered the failure; the protocol layer maps each of them to
/// the nearest SFTP status code.
#[derive(Debug)]
pub enum SftpMockError {
    /// Path does not exist
    NotFound(String),

    /// A node already occupies the path
    AlreadyExists(String),

    /// Directory is not empty (non-recursive remove)
    NotEmpty(String),

    /// Expected a file, found a directory
    NotAFile(String),

    /// Expected a directory, found a file
    NotADirectory(String),

    /// Malformed path, or an ancestor segment is a file
    InvalidPath(String),

    /// Authentication failure
    Auth(String),

    /// Protocol violation (SSH or SFTP wire level)
    Protocol(String),

    /// I/O error
    Io(std::io::Error),
}

impl fmt::Display for SftpMockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SftpMockError::NotFound(path) => write!(f, "no such file or directory: {}", path),
            SftpMockError::AlreadyExists(path) => write!(f, "already exists: {}", path),
            SftpMockError::NotEmpty(path) => write!(f, "directory not empty: {}", path),
            SftpMockError::NotAFile(path) => write!(f, "not a file: {}", path),
            SftpMockError::NotADirectory(path) => write!(f, "not a directory: {}", path),
            SftpMockError::InvalidPath(path) => write!(f, "invalid path: {}", path),
            SftpMockError::Auth(msg) => write!(f, "authentication error: {}", msg),
            SftpMockError::Protocol(msg) => write!(f, "protocol error: {}", msg),
            SftpMockError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for SftpMockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SftpMockError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SftpMockError {
    fn from(err: std::io::Error) -> Self {
        SftpMockError::Io(err)
    }
}

/// Result type for sftpmock operations
pub type SftpMockResult<T> = Result<T, SftpMockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SftpMockError::NotFound("/missing.txt".to_string());
        assert_eq!(err.to_string(), "no such file or directory: /missing.txt");

        let err = SftpMockError::NotEmpty("/dir".to_string());
        assert_eq!(err.to_string(), "directory not empty: /dir");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken");
        let err: SftpMockError = io_err.into();
        assert!(matches!(err, SftpMockError::Io(_)));
    }

    #[test]
    fn test_result_type() {
        fn example() -> SftpMockResult<u16> {
            Ok(2222)
        }

        assert_eq!(example().unwrap(), 2222);
    }
}
