//! # sftpmock Platform
//!
//! Shared error types for the sftpmock test fixture.
//!
//! This crate provides the unified error enum (`SftpMockError`) and result
//! alias (`SftpMockResult`) used across the workspace. The variants mirror
//! the failure taxonomy of the virtual file store so that the protocol
//! layer can translate each kind to an SFTP status code without string
//! matching.
//!
//! # Examples
//!
//! ```
//! use sftpmock_platform::{SftpMockError, SftpMockResult};
//!
//! fn lookup(path: &str) -> SftpMockResult<Vec<u8>> {
//!     Err(SftpMockError::NotFound(path.to_string()))
//! }
//!
//! assert!(lookup("/missing").is_err());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod error;

pub use error::{SftpMockError, SftpMockResult};

/// Platform version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
