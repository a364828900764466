//! SFTP version 3 server subset (draft-ietf-secsh-filexfer-02).
//!
//! Serves file transfer requests over an SSH session channel, backed by the
//! in-memory store in [`crate::vfs`]. The subset covers what SFTP client
//! libraries exercise in tests: open/read/write/close, directory listing,
//! stat, remove, mkdir/rmdir, and realpath. Unimplemented request types are
//! answered with SSH_FX_OP_UNSUPPORTED.
//!
//! # Layers
//!
//! - [`message`] - packet framing and SSH_FXP_* type bytes
//! - [`types`] - SSH_FX_* status codes, open flags, attribute blocks
//! - [`server`] - the per-channel request dispatcher
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tokio::sync::Mutex;
//! use sftpmock_proto::sftp::SftpSubsystem;
//! use sftpmock_proto::vfs::Store;
//!
//! # async fn example() -> sftpmock_platform::SftpMockResult<()> {
//! let store = Arc::new(Mutex::new(Store::new()));
//! let mut subsystem = SftpSubsystem::new(store);
//!
//! // INIT version 3, framed with its length prefix.
//! let packet = [0, 0, 0, 5, 1, 0, 0, 0, 3];
//! let responses = subsystem.handle_input(&packet).await?;
//! assert_eq!(responses.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod message;
pub mod server;
pub mod types;

// Re-export main types
pub use message::{SftpMessageType, MAX_SFTP_PACKET_SIZE, SFTP_VERSION};
pub use server::SftpSubsystem;
pub use types::{status_for, FileAttributes, OpenFlags, StatusCode};
