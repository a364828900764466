//! SSH identification string exchange (RFC 4253 Section 4.2).
//!
//! Each side opens the connection with one identification line:
//!
//! ```text
//! SSH-protoversion-softwareversion SP comments CR LF
//! ```
//!
//! The mock server announces itself as `SSH-2.0-SftpMock_<version>` and
//! accepts any well-formed SSH 2.0 client string.
//!
//! # Example
//!
//! ```rust
//! use sftpmock_proto::ssh::version::Version;
//!
//! let server = Version::default_mock();
//! assert!(server.to_string().starts_with("SSH-2.0-SftpMock_"));
//!
//! let client = Version::parse("SSH-2.0-OpenSSH_9.6\r\n").unwrap();
//! assert_eq!(client.software(), "OpenSSH_9.6");
//! ```

use sftpmock_platform::{SftpMockError, SftpMockResult};

/// Maximum length of an identification line (RFC 4253 Section 4.2).
pub const MAX_VERSION_LENGTH: usize = 255;

/// A parsed SSH identification string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    proto_version: String,
    software_version: String,
    comments: Option<String>,
}

impl Version {
    /// Creates a protocol 2.0 identification string for `software`.
    pub fn new(software: &str, comments: Option<&str>) -> Self {
        Self {
            proto_version: "2.0".to_string(),
            software_version: software.to_string(),
            comments: comments.map(String::from),
        }
    }

    /// Returns the identification string the mock server announces.
    ///
    /// # Example
    ///
    /// ```rust
    /// use sftpmock_proto::ssh::version::Version;
    ///
    /// let version = Version::default_mock();
    /// assert!(version.to_string().starts_with("SSH-2.0-SftpMock_"));
    /// ```
    pub fn default_mock() -> Self {
        Self::new(&format!("SftpMock_{}", env!("CARGO_PKG_VERSION")), None)
    }

    /// Parses a peer identification line (with or without the CR LF).
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] if the line exceeds
    /// [`MAX_VERSION_LENGTH`], contains a null byte, lacks the `SSH-`
    /// prefix, or announces a protocol other than 2.0 or 1.99.
    pub fn parse(line: &str) -> SftpMockResult<Self> {
        let line = line.trim_end_matches("\r\n").trim_end_matches('\n');

        if line.len() > MAX_VERSION_LENGTH {
            return Err(SftpMockError::Protocol(format!(
                "version string too long: {} bytes (max {})",
                line.len(),
                MAX_VERSION_LENGTH
            )));
        }
        if line.contains('\0') {
            return Err(SftpMockError::Protocol(
                "version string contains null byte".to_string(),
            ));
        }
        if !line.starts_with("SSH-") {
            return Err(SftpMockError::Protocol(format!(
                "version string must start with 'SSH-', got '{}'",
                line
            )));
        }

        let parts: Vec<&str> = line.splitn(3, '-').collect();
        if parts.len() < 3 {
            return Err(SftpMockError::Protocol(format!(
                "malformed version string: '{}'",
                line
            )));
        }

        let proto_version = parts[1];
        let rest = parts[2];

        // 1.99 is the RFC 4253 compatibility marker for 2.0 servers
        if proto_version != "2.0" && proto_version != "1.99" {
            return Err(SftpMockError::Protocol(format!(
                "unsupported protocol version: '{}'",
                proto_version
            )));
        }

        let (software_version, comments) = match rest.find(' ') {
            Some(pos) => (
                rest[..pos].to_string(),
                Some(rest[pos + 1..].trim().to_string()),
            ),
            None => (rest.to_string(), None),
        };

        Ok(Self {
            proto_version: proto_version.to_string(),
            software_version,
            comments,
        })
    }

    /// Returns the protocol version, e.g. "2.0".
    pub fn proto_version(&self) -> &str {
        &self.proto_version
    }

    /// Returns the software version, e.g. "SftpMock_0.1.0".
    pub fn software(&self) -> &str {
        &self.software_version
    }

    /// Returns the comments field, if any.
    pub fn comments(&self) -> Option<&str> {
        self.comments.as_deref()
    }

    /// Serializes the line for the wire, including the CR LF terminator.
    pub fn to_wire_format(&self) -> Vec<u8> {
        format!("{}\r\n", self).into_bytes()
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SSH-{}-{}", self.proto_version, self.software_version)?;
        if let Some(comments) = &self.comments {
            write!(f, " {}", comments)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mock_prefix() {
        let version = Version::default_mock();
        assert_eq!(version.proto_version(), "2.0");
        assert!(version.software().starts_with("SftpMock_"));
    }

    #[test]
    fn test_parse_basic() {
        let version = Version::parse("SSH-2.0-OpenSSH_9.6").unwrap();
        assert_eq!(version.proto_version(), "2.0");
        assert_eq!(version.software(), "OpenSSH_9.6");
        assert_eq!(version.comments(), None);
    }

    #[test]
    fn test_parse_with_comments_and_crlf() {
        let version = Version::parse("SSH-2.0-OpenSSH_9.6 Ubuntu-3ubuntu13\r\n").unwrap();
        assert_eq!(version.software(), "OpenSSH_9.6");
        assert_eq!(version.comments(), Some("Ubuntu-3ubuntu13"));
    }

    #[test]
    fn test_parse_legacy_199() {
        let version = Version::parse("SSH-1.99-Legacy").unwrap();
        assert_eq!(version.proto_version(), "1.99");
    }

    #[test]
    fn test_parse_invalid_prefix() {
        assert!(matches!(
            Version::parse("HTTP/1.1 400 Bad Request"),
            Err(SftpMockError::Protocol(_))
        ));
    }

    #[test]
    fn test_parse_unsupported_protocol() {
        assert!(Version::parse("SSH-1.5-OldClient").is_err());
    }

    #[test]
    fn test_parse_too_long() {
        let line = format!("SSH-2.0-{}", "A".repeat(300));
        assert!(Version::parse(&line).is_err());
    }

    #[test]
    fn test_parse_null_byte() {
        assert!(Version::parse("SSH-2.0-Bad\0Client").is_err());
    }

    #[test]
    fn test_wire_format() {
        let version = Version::new("SftpMock_0.1.0", None);
        assert_eq!(version.to_wire_format(), b"SSH-2.0-SftpMock_0.1.0\r\n");
    }
}
