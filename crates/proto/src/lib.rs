//! Embedded mock SFTP server for integration tests.
//!
//! This crate runs a real SSH server with the SFTP subsystem on an
//! ephemeral localhost port, backed by an in-memory filesystem. Tests
//! point their SFTP client at the port, then assert on the store directly,
//! with no disk and no external process involved.
//!
//! # Layers
//!
//! - [`vfs`] - the in-memory file store (files and directories only)
//! - [`ssh`] - SSH-2 server transport: version exchange, curve25519
//!   key exchange, password authentication, session channels
//! - [`sftp`] - the SFTP version 3 request dispatcher
//! - [`fixture`] - [`MockSftpServer`], the lifecycle and inspection wrapper
//!
//! # Example
//!
//! ```rust,no_run
//! use sftpmock_proto::MockSftpServer;
//!
//! # async fn example() -> sftpmock_platform::SftpMockResult<()> {
//! let server = MockSftpServer::builder()
//!     .user("user", "pwd")
//!     .start()
//!     .await?;
//!
//! // Connect any SFTP client to 127.0.0.1:server.port() with the
//! // credentials above, then inspect the results.
//! server.put_file("/input.csv", b"a,b,c\n1,2,3\n").await?;
//! assert!(server.exists_file("/input.csv").await);
//!
//! server.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Security
//!
//! The transport is real but the trust model is not: the host key is
//! freshly generated per server and never pinned, and credentials live in
//! memory for the life of the test. Do not expose the port beyond
//! localhost.
//!
//! - Cryptographic operations use vetted libraries (`ring`, `dalek`)
//! - Password comparison is constant-time
//! - Passwords and key material are zeroized on drop
//!
//! # References
//!
//! - [RFC 4251](https://datatracker.ietf.org/doc/html/rfc4251) - SSH Protocol Architecture
//! - [RFC 4253](https://datatracker.ietf.org/doc/html/rfc4253) - SSH Transport Layer Protocol
//! - [draft-ietf-secsh-filexfer-02](https://datatracker.ietf.org/doc/html/draft-ietf-secsh-filexfer-02) - SFTP version 3

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod fixture;
pub mod sftp;
pub mod ssh;
pub mod vfs;

pub use fixture::{MockSftpServer, MockSftpServerBuilder};
