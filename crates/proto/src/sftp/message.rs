//! SFTP message types and packet framing (draft-ietf-secsh-filexfer-02).
//!
//! SFTP packets ride inside SSH channel data with their own length prefix:
//!
//! ```text
//! uint32    length (type byte + data)
//! byte      type
//! byte[n]   data
//! ```
//!
//! All requests except INIT carry a uint32 request id immediately after the
//! type byte, echoed back in the matching response.

use std::fmt;

/// Protocol version spoken by the server.
pub const SFTP_VERSION: u32 = 3;

/// Largest SFTP packet accepted, matching the channel packet cap.
pub const MAX_SFTP_PACKET_SIZE: usize = 256 * 1024;

/// SFTP message type byte.
///
/// Requests are 1-17, responses are 101-105. Types from the v3 draft that
/// the server does not implement (SETSTAT, RENAME, SYMLINK and friends) are
/// answered with SSH_FX_OP_UNSUPPORTED rather than parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SftpMessageType {
    /// SSH_FXP_INIT - version negotiation, first packet from the client.
    Init = 1,
    /// SSH_FXP_VERSION - server's version reply.
    Version = 2,
    /// SSH_FXP_OPEN - open (and possibly create) a file.
    Open = 3,
    /// SSH_FXP_CLOSE - release a file or directory handle.
    Close = 4,
    /// SSH_FXP_READ - read a byte range from an open file.
    Read = 5,
    /// SSH_FXP_WRITE - write a byte range to an open file.
    Write = 6,
    /// SSH_FXP_LSTAT - stat a path without following links.
    Lstat = 7,
    /// SSH_FXP_FSTAT - stat an open handle.
    Fstat = 8,
    /// SSH_FXP_OPENDIR - open a directory for listing.
    Opendir = 11,
    /// SSH_FXP_READDIR - read entries from a directory handle.
    Readdir = 12,
    /// SSH_FXP_REMOVE - delete a file.
    Remove = 13,
    /// SSH_FXP_MKDIR - create a directory.
    Mkdir = 14,
    /// SSH_FXP_RMDIR - delete an empty directory.
    Rmdir = 15,
    /// SSH_FXP_REALPATH - canonicalize a path.
    Realpath = 16,
    /// SSH_FXP_STAT - stat a path.
    Stat = 17,
    /// SSH_FXP_STATUS - status / error response.
    Status = 101,
    /// SSH_FXP_HANDLE - handle response to OPEN and OPENDIR.
    Handle = 102,
    /// SSH_FXP_DATA - data response to READ.
    Data = 103,
    /// SSH_FXP_NAME - name list response to READDIR and REALPATH.
    Name = 104,
    /// SSH_FXP_ATTRS - attributes response to STAT, LSTAT and FSTAT.
    Attrs = 105,
}

impl SftpMessageType {
    /// Converts a raw type byte, returning `None` for unimplemented types.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Init),
            2 => Some(Self::Version),
            3 => Some(Self::Open),
            4 => Some(Self::Close),
            5 => Some(Self::Read),
            6 => Some(Self::Write),
            7 => Some(Self::Lstat),
            8 => Some(Self::Fstat),
            11 => Some(Self::Opendir),
            12 => Some(Self::Readdir),
            13 => Some(Self::Remove),
            14 => Some(Self::Mkdir),
            15 => Some(Self::Rmdir),
            16 => Some(Self::Realpath),
            17 => Some(Self::Stat),
            101 => Some(Self::Status),
            102 => Some(Self::Handle),
            103 => Some(Self::Data),
            104 => Some(Self::Name),
            105 => Some(Self::Attrs),
            _ => None,
        }
    }

    /// Returns the draft name of this message type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "SSH_FXP_INIT",
            Self::Version => "SSH_FXP_VERSION",
            Self::Open => "SSH_FXP_OPEN",
            Self::Close => "SSH_FXP_CLOSE",
            Self::Read => "SSH_FXP_READ",
            Self::Write => "SSH_FXP_WRITE",
            Self::Lstat => "SSH_FXP_LSTAT",
            Self::Fstat => "SSH_FXP_FSTAT",
            Self::Opendir => "SSH_FXP_OPENDIR",
            Self::Readdir => "SSH_FXP_READDIR",
            Self::Remove => "SSH_FXP_REMOVE",
            Self::Mkdir => "SSH_FXP_MKDIR",
            Self::Rmdir => "SSH_FXP_RMDIR",
            Self::Realpath => "SSH_FXP_REALPATH",
            Self::Stat => "SSH_FXP_STAT",
            Self::Status => "SSH_FXP_STATUS",
            Self::Handle => "SSH_FXP_HANDLE",
            Self::Data => "SSH_FXP_DATA",
            Self::Name => "SSH_FXP_NAME",
            Self::Attrs => "SSH_FXP_ATTRS",
        }
    }
}

impl fmt::Display for SftpMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), *self as u8)
    }
}
