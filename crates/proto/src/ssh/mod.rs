//! SSH server transport (RFC 4251-4254).
//!
//! Implements the server side of the SSH protocol, just enough to carry the
//! SFTP subsystem for a test fixture.
//!
//! # Architecture
//!
//! The implementation is layered:
//!
//! 1. **Packet Layer** ([`packet`]) - Binary packet protocol (RFC 4253 Section 6)
//! 2. **Transport Layer** ([`transport`], [`kex`], [`crypto`]) - Key exchange
//!    and encryption (RFC 4253)
//! 3. **Authentication Layer** ([`auth`]) - Password authentication (RFC 4252)
//! 4. **Connection Layer** ([`connection`]) - Channels and requests (RFC 4254)
//! 5. **Server API** ([`server`]) - Accept loop and session driver
//!
//! # Algorithm Suite
//!
//! One fixed suite keeps the fixture small while staying interoperable with
//! stock OpenSSH and common SFTP client libraries:
//!
//! - Key exchange: curve25519-sha256
//! - Host key: ssh-ed25519 (freshly generated per server)
//! - Cipher: aes128-gcm@openssh.com (AEAD, no separate MAC)
//!
//! # Security Considerations
//!
//! - All packet parsing validates size limits (max 35000 bytes)
//! - Password comparison is constant-time
//! - Passwords and key material are zeroized on drop
//! - No `unsafe` code
//!
//! # Example
//!
//! ```rust
//! use sftpmock_proto::ssh::Packet;
//!
//! let packet = Packet::new(b"payload".to_vec()).unwrap();
//! let bytes = packet.to_bytes();
//!
//! let parsed = Packet::from_bytes(&bytes).unwrap();
//! assert_eq!(parsed.payload(), b"payload");
//! ```
//!
//! # References
//!
//! - [RFC 4251](https://datatracker.ietf.org/doc/html/rfc4251) - SSH Protocol Architecture
//! - [RFC 4252](https://datatracker.ietf.org/doc/html/rfc4252) - SSH Authentication Protocol
//! - [RFC 4253](https://datatracker.ietf.org/doc/html/rfc4253) - SSH Transport Layer Protocol
//! - [RFC 4254](https://datatracker.ietf.org/doc/html/rfc4254) - SSH Connection Protocol

pub mod auth;
pub mod connection;
pub mod crypto;
pub mod hostkey;
pub mod kex;
pub mod kex_dh;
pub mod message;
pub mod packet;
pub mod server;
pub mod transport;
pub mod version;

// Re-export main types
pub use auth::{constant_time_compare, AuthFailure, AuthMethod, AuthRequest, AuthSuccess};
pub use connection::{
    ChannelClose, ChannelData, ChannelEof, ChannelFailure, ChannelOpen, ChannelOpenConfirmation,
    ChannelOpenFailure, ChannelOpenFailureReason, ChannelRequest, ChannelRequestType,
    ChannelSuccess, ChannelType, ChannelWindowAdjust, MAX_CHANNEL_PACKET_SIZE, MAX_WINDOW_SIZE,
};
pub use crypto::{DecryptionKey, EncryptionKey};
pub use hostkey::Ed25519HostKey;
pub use kex::{negotiate_algorithm, KexInit, NewKeys};
pub use kex_dh::{derive_key, Curve25519Exchange};
pub use message::MessageType;
pub use packet::Packet;
pub use server::{AuthCallback, SshServer, SshServerConfig, SshSession};
pub use transport::{SessionKeys, State, TransportState};
pub use version::Version;
