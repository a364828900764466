//! SSH message type identifiers (RFC 4253 Section 12).
//!
//! These are the message numbers the mock server sends or accepts over
//! a session: transport generics, algorithm negotiation, the ECDH
//! exchange, password authentication, and the channel subset needed to
//! carry the SFTP subsystem.
//!
//! # Example
//!
//! ```rust
//! use sftpmock_proto::ssh::message::MessageType;
//!
//! assert_eq!(MessageType::KexInit as u8, 20);
//! assert_eq!(MessageType::from_u8(94), Some(MessageType::ChannelData));
//! ```

/// SSH message types by their wire identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    // Transport layer generic (1-19)
    /// Terminates the connection.
    Disconnect = 1,
    /// Ignored by the receiver; keep-alive padding.
    Ignore = 2,
    /// Response to an unrecognized message number.
    Unimplemented = 3,
    /// Debugging information.
    Debug = 4,
    /// Requests a service such as "ssh-userauth".
    ServiceRequest = 5,
    /// Grants a service request.
    ServiceAccept = 6,

    // Algorithm negotiation (20-29)
    /// Algorithm negotiation lists.
    KexInit = 20,
    /// Switches the connection to the negotiated keys.
    NewKeys = 21,

    // Key exchange method specific (30-49)
    /// ECDH ephemeral public key from the client.
    KexdhInit = 30,
    /// ECDH reply carrying host key, server public key and signature.
    KexdhReply = 31,

    // User authentication (50-79)
    /// Authentication attempt.
    UserauthRequest = 50,
    /// Attempt rejected; lists methods that can continue.
    UserauthFailure = 51,
    /// Attempt accepted.
    UserauthSuccess = 52,

    // Connection protocol (80-127)
    /// Global request (clients send these; the server declines).
    GlobalRequest = 80,
    /// Global request granted.
    RequestSuccess = 81,
    /// Global request declined.
    RequestFailure = 82,
    /// Opens a channel.
    ChannelOpen = 90,
    /// Confirms a channel open.
    ChannelOpenConfirmation = 91,
    /// Rejects a channel open.
    ChannelOpenFailure = 92,
    /// Increases the peer's send window.
    ChannelWindowAdjust = 93,
    /// Channel payload data.
    ChannelData = 94,
    /// No more data will be sent on the channel.
    ChannelEof = 96,
    /// Closes the channel.
    ChannelClose = 97,
    /// Channel request, e.g. the "subsystem" request for SFTP.
    ChannelRequest = 98,
    /// Channel request granted.
    ChannelSuccess = 99,
    /// Channel request declined.
    ChannelFailure = 100,
}

impl MessageType {
    /// Converts a wire byte to a message type, if recognized.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(MessageType::Disconnect),
            2 => Some(MessageType::Ignore),
            3 => Some(MessageType::Unimplemented),
            4 => Some(MessageType::Debug),
            5 => Some(MessageType::ServiceRequest),
            6 => Some(MessageType::ServiceAccept),
            20 => Some(MessageType::KexInit),
            21 => Some(MessageType::NewKeys),
            30 => Some(MessageType::KexdhInit),
            31 => Some(MessageType::KexdhReply),
            50 => Some(MessageType::UserauthRequest),
            51 => Some(MessageType::UserauthFailure),
            52 => Some(MessageType::UserauthSuccess),
            80 => Some(MessageType::GlobalRequest),
            81 => Some(MessageType::RequestSuccess),
            82 => Some(MessageType::RequestFailure),
            90 => Some(MessageType::ChannelOpen),
            91 => Some(MessageType::ChannelOpenConfirmation),
            92 => Some(MessageType::ChannelOpenFailure),
            93 => Some(MessageType::ChannelWindowAdjust),
            94 => Some(MessageType::ChannelData),
            96 => Some(MessageType::ChannelEof),
            97 => Some(MessageType::ChannelClose),
            98 => Some(MessageType::ChannelRequest),
            99 => Some(MessageType::ChannelSuccess),
            100 => Some(MessageType::ChannelFailure),
            _ => None,
        }
    }

    /// Returns the RFC name for log output.
    pub fn name(&self) -> &'static str {
        match self {
            MessageType::Disconnect => "SSH_MSG_DISCONNECT",
            MessageType::Ignore => "SSH_MSG_IGNORE",
            MessageType::Unimplemented => "SSH_MSG_UNIMPLEMENTED",
            MessageType::Debug => "SSH_MSG_DEBUG",
            MessageType::ServiceRequest => "SSH_MSG_SERVICE_REQUEST",
            MessageType::ServiceAccept => "SSH_MSG_SERVICE_ACCEPT",
            MessageType::KexInit => "SSH_MSG_KEXINIT",
            MessageType::NewKeys => "SSH_MSG_NEWKEYS",
            MessageType::KexdhInit => "SSH_MSG_KEXDH_INIT",
            MessageType::KexdhReply => "SSH_MSG_KEXDH_REPLY",
            MessageType::UserauthRequest => "SSH_MSG_USERAUTH_REQUEST",
            MessageType::UserauthFailure => "SSH_MSG_USERAUTH_FAILURE",
            MessageType::UserauthSuccess => "SSH_MSG_USERAUTH_SUCCESS",
            MessageType::GlobalRequest => "SSH_MSG_GLOBAL_REQUEST",
            MessageType::RequestSuccess => "SSH_MSG_REQUEST_SUCCESS",
            MessageType::RequestFailure => "SSH_MSG_REQUEST_FAILURE",
            MessageType::ChannelOpen => "SSH_MSG_CHANNEL_OPEN",
            MessageType::ChannelOpenConfirmation => "SSH_MSG_CHANNEL_OPEN_CONFIRMATION",
            MessageType::ChannelOpenFailure => "SSH_MSG_CHANNEL_OPEN_FAILURE",
            MessageType::ChannelWindowAdjust => "SSH_MSG_CHANNEL_WINDOW_ADJUST",
            MessageType::ChannelData => "SSH_MSG_CHANNEL_DATA",
            MessageType::ChannelEof => "SSH_MSG_CHANNEL_EOF",
            MessageType::ChannelClose => "SSH_MSG_CHANNEL_CLOSE",
            MessageType::ChannelRequest => "SSH_MSG_CHANNEL_REQUEST",
            MessageType::ChannelSuccess => "SSH_MSG_CHANNEL_SUCCESS",
            MessageType::ChannelFailure => "SSH_MSG_CHANNEL_FAILURE",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), *self as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_round_trip() {
        for byte in 0u8..=255 {
            if let Some(msg) = MessageType::from_u8(byte) {
                assert_eq!(msg as u8, byte);
            }
        }
    }

    #[test]
    fn test_known_values() {
        assert_eq!(MessageType::KexInit as u8, 20);
        assert_eq!(MessageType::UserauthRequest as u8, 50);
        assert_eq!(MessageType::ChannelData as u8, 94);
        assert_eq!(MessageType::from_u8(255), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(MessageType::KexInit.to_string(), "SSH_MSG_KEXINIT(20)");
    }
}
