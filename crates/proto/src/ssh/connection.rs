//! Channel messages for the connection protocol (RFC 4254).
//!
//! The mock server speaks the smallest channel vocabulary an SFTP
//! session needs: a client opens one "session" channel, requests the
//! "sftp" subsystem on it, and all file transfer bytes flow as channel
//! data until EOF and close. Port forwarding, exec, shell and pty
//! requests are all declined.
//!
//! Unknown channel types and request types parse into their `Other`
//! variants so the server can decline them with the proper failure
//! message instead of dropping the connection.

use bytes::{BufMut, BytesMut};
use sftpmock_platform::{SftpMockError, SftpMockResult};

/// Largest window either side may advertise (16 MB).
pub const MAX_WINDOW_SIZE: u32 = 16 * 1024 * 1024;

/// Largest channel packet either side may advertise (256 KB).
pub const MAX_CHANNEL_PACKET_SIZE: u32 = 256 * 1024;

/// A channel type by wire name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelType {
    /// The "session" channel SFTP runs over.
    Session,
    /// Any other type, kept by name for the rejection message.
    Other(String),
}

impl ChannelType {
    /// Returns the wire name.
    pub fn name(&self) -> &str {
        match self {
            ChannelType::Session => "session",
            ChannelType::Other(name) => name,
        }
    }
}

/// SSH_MSG_CHANNEL_OPEN message (RFC 4254 Section 5.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOpen {
    channel_type: ChannelType,
    sender_channel: u32,
    initial_window_size: u32,
    maximum_packet_size: u32,
}

impl ChannelOpen {
    /// Creates a channel open message.
    pub fn new(
        channel_type: ChannelType,
        sender_channel: u32,
        initial_window_size: u32,
        maximum_packet_size: u32,
    ) -> Self {
        Self {
            channel_type,
            sender_channel,
            initial_window_size,
            maximum_packet_size,
        }
    }

    /// Returns the channel type.
    pub fn channel_type(&self) -> &ChannelType {
        &self.channel_type
    }

    /// Returns the sender's channel number.
    pub fn sender_channel(&self) -> u32 {
        self.sender_channel
    }

    /// Returns the initial window size.
    pub fn initial_window_size(&self) -> u32 {
        self.initial_window_size
    }

    /// Returns the maximum packet size.
    pub fn maximum_packet_size(&self) -> u32 {
        self.maximum_packet_size
    }

    /// Serializes the message payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(90);
        write_string(&mut buf, self.channel_type.name());
        buf.put_u32(self.sender_channel);
        buf.put_u32(self.initial_window_size);
        buf.put_u32(self.maximum_packet_size);

        buf.to_vec()
    }

    /// Parses a CHANNEL_OPEN payload.
    ///
    /// Type-specific trailing data of non-session types is ignored;
    /// those opens only exist to be declined.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] on truncation or when the
    /// advertised window or packet size exceeds the limits.
    pub fn from_bytes(data: &[u8]) -> SftpMockResult<Self> {
        if data.is_empty() || data[0] != 90 {
            return Err(SftpMockError::Protocol(
                "invalid CHANNEL_OPEN message".to_string(),
            ));
        }

        let mut offset = 1;
        let type_name = read_string(data, &mut offset)?;
        let sender_channel = read_u32(data, &mut offset)?;
        let initial_window_size = read_u32(data, &mut offset)?;
        let maximum_packet_size = read_u32(data, &mut offset)?;

        if initial_window_size > MAX_WINDOW_SIZE {
            return Err(SftpMockError::Protocol(format!(
                "initial window size {} exceeds maximum {}",
                initial_window_size, MAX_WINDOW_SIZE
            )));
        }
        if maximum_packet_size > MAX_CHANNEL_PACKET_SIZE {
            return Err(SftpMockError::Protocol(format!(
                "maximum packet size {} exceeds maximum {}",
                maximum_packet_size, MAX_CHANNEL_PACKET_SIZE
            )));
        }

        let channel_type = match type_name.as_str() {
            "session" => ChannelType::Session,
            _ => ChannelType::Other(type_name),
        };

        Ok(Self {
            channel_type,
            sender_channel,
            initial_window_size,
            maximum_packet_size,
        })
    }
}

/// SSH_MSG_CHANNEL_OPEN_CONFIRMATION message (RFC 4254 Section 5.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOpenConfirmation {
    recipient_channel: u32,
    sender_channel: u32,
    initial_window_size: u32,
    maximum_packet_size: u32,
}

impl ChannelOpenConfirmation {
    /// Creates a confirmation for the peer's `recipient_channel`.
    pub fn new(
        recipient_channel: u32,
        sender_channel: u32,
        initial_window_size: u32,
        maximum_packet_size: u32,
    ) -> Self {
        Self {
            recipient_channel,
            sender_channel,
            initial_window_size,
            maximum_packet_size,
        }
    }

    /// Returns the recipient channel number.
    pub fn recipient_channel(&self) -> u32 {
        self.recipient_channel
    }

    /// Returns the sender channel number.
    pub fn sender_channel(&self) -> u32 {
        self.sender_channel
    }

    /// Serializes the message payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(91);
        buf.put_u32(self.recipient_channel);
        buf.put_u32(self.sender_channel);
        buf.put_u32(self.initial_window_size);
        buf.put_u32(self.maximum_packet_size);

        buf.to_vec()
    }

    /// Parses a CHANNEL_OPEN_CONFIRMATION payload.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] on truncation or mistyping.
    pub fn from_bytes(data: &[u8]) -> SftpMockResult<Self> {
        if data.is_empty() || data[0] != 91 {
            return Err(SftpMockError::Protocol(
                "invalid CHANNEL_OPEN_CONFIRMATION message".to_string(),
            ));
        }

        let mut offset = 1;
        Ok(Self {
            recipient_channel: read_u32(data, &mut offset)?,
            sender_channel: read_u32(data, &mut offset)?,
            initial_window_size: read_u32(data, &mut offset)?,
            maximum_packet_size: read_u32(data, &mut offset)?,
        })
    }
}

/// Reason codes for SSH_MSG_CHANNEL_OPEN_FAILURE (RFC 4254 Section 5.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ChannelOpenFailureReason {
    /// Administratively prohibited.
    AdministrativelyProhibited = 1,
    /// Connect failed.
    ConnectFailed = 2,
    /// Unknown channel type.
    UnknownChannelType = 3,
    /// Resource shortage.
    ResourceShortage = 4,
}

impl ChannelOpenFailureReason {
    /// Converts a wire code to a reason, if recognized.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::AdministrativelyProhibited),
            2 => Some(Self::ConnectFailed),
            3 => Some(Self::UnknownChannelType),
            4 => Some(Self::ResourceShortage),
            _ => None,
        }
    }

    /// Returns a human-readable description.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdministrativelyProhibited => "administratively prohibited",
            Self::ConnectFailed => "connect failed",
            Self::UnknownChannelType => "unknown channel type",
            Self::ResourceShortage => "resource shortage",
        }
    }
}

/// SSH_MSG_CHANNEL_OPEN_FAILURE message (RFC 4254 Section 5.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOpenFailure {
    recipient_channel: u32,
    reason_code: ChannelOpenFailureReason,
    description: String,
}

impl ChannelOpenFailure {
    /// Creates a failure with the reason's standard description.
    pub fn new(recipient_channel: u32, reason_code: ChannelOpenFailureReason) -> Self {
        Self {
            recipient_channel,
            reason_code,
            description: reason_code.as_str().to_string(),
        }
    }

    /// Returns the recipient channel number.
    pub fn recipient_channel(&self) -> u32 {
        self.recipient_channel
    }

    /// Returns the reason code.
    pub fn reason_code(&self) -> ChannelOpenFailureReason {
        self.reason_code
    }

    /// Serializes the message payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(92);
        buf.put_u32(self.recipient_channel);
        buf.put_u32(self.reason_code as u32);
        write_string(&mut buf, &self.description);
        write_string(&mut buf, ""); // language tag

        buf.to_vec()
    }
}

/// SSH_MSG_CHANNEL_WINDOW_ADJUST message (RFC 4254 Section 5.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelWindowAdjust {
    recipient_channel: u32,
    bytes_to_add: u32,
}

impl ChannelWindowAdjust {
    /// Creates a window adjustment.
    pub fn new(recipient_channel: u32, bytes_to_add: u32) -> Self {
        Self {
            recipient_channel,
            bytes_to_add,
        }
    }

    /// Returns the recipient channel number.
    pub fn recipient_channel(&self) -> u32 {
        self.recipient_channel
    }

    /// Returns the number of bytes added to the window.
    pub fn bytes_to_add(&self) -> u32 {
        self.bytes_to_add
    }

    /// Serializes the message payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(93);
        buf.put_u32(self.recipient_channel);
        buf.put_u32(self.bytes_to_add);
        buf.to_vec()
    }

    /// Parses a CHANNEL_WINDOW_ADJUST payload.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] on truncation or mistyping.
    pub fn from_bytes(data: &[u8]) -> SftpMockResult<Self> {
        if data.is_empty() || data[0] != 93 {
            return Err(SftpMockError::Protocol(
                "invalid CHANNEL_WINDOW_ADJUST message".to_string(),
            ));
        }

        let mut offset = 1;
        Ok(Self {
            recipient_channel: read_u32(data, &mut offset)?,
            bytes_to_add: read_u32(data, &mut offset)?,
        })
    }
}

/// SSH_MSG_CHANNEL_DATA message (RFC 4254 Section 5.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelData {
    recipient_channel: u32,
    data: Vec<u8>,
}

impl ChannelData {
    /// Creates a data message.
    pub fn new(recipient_channel: u32, data: Vec<u8>) -> Self {
        Self {
            recipient_channel,
            data,
        }
    }

    /// Returns the recipient channel number.
    pub fn recipient_channel(&self) -> u32 {
        self.recipient_channel
    }

    /// Returns the payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the message and returns its payload.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Serializes the message payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(94);
        buf.put_u32(self.recipient_channel);
        buf.put_u32(self.data.len() as u32);
        buf.put_slice(&self.data);
        buf.to_vec()
    }

    /// Parses a CHANNEL_DATA payload.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] on truncation or mistyping.
    pub fn from_bytes(data: &[u8]) -> SftpMockResult<Self> {
        if data.is_empty() || data[0] != 94 {
            return Err(SftpMockError::Protocol(
                "invalid CHANNEL_DATA message".to_string(),
            ));
        }

        let mut offset = 1;
        let recipient_channel = read_u32(data, &mut offset)?;
        let payload = read_bytes(data, &mut offset)?;

        Ok(Self {
            recipient_channel,
            data: payload,
        })
    }
}

/// SSH_MSG_CHANNEL_EOF message (RFC 4254 Section 5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelEof {
    recipient_channel: u32,
}

impl ChannelEof {
    /// Creates an EOF message.
    pub fn new(recipient_channel: u32) -> Self {
        Self { recipient_channel }
    }

    /// Returns the recipient channel number.
    pub fn recipient_channel(&self) -> u32 {
        self.recipient_channel
    }

    /// Serializes the message payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(96);
        buf.put_u32(self.recipient_channel);
        buf.to_vec()
    }

    /// Parses a CHANNEL_EOF payload.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] on truncation or mistyping.
    pub fn from_bytes(data: &[u8]) -> SftpMockResult<Self> {
        if data.is_empty() || data[0] != 96 {
            return Err(SftpMockError::Protocol(
                "invalid CHANNEL_EOF message".to_string(),
            ));
        }
        let mut offset = 1;
        Ok(Self {
            recipient_channel: read_u32(data, &mut offset)?,
        })
    }
}

/// SSH_MSG_CHANNEL_CLOSE message (RFC 4254 Section 5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelClose {
    recipient_channel: u32,
}

impl ChannelClose {
    /// Creates a close message.
    pub fn new(recipient_channel: u32) -> Self {
        Self { recipient_channel }
    }

    /// Returns the recipient channel number.
    pub fn recipient_channel(&self) -> u32 {
        self.recipient_channel
    }

    /// Serializes the message payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(97);
        buf.put_u32(self.recipient_channel);
        buf.to_vec()
    }

    /// Parses a CHANNEL_CLOSE payload.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] on truncation or mistyping.
    pub fn from_bytes(data: &[u8]) -> SftpMockResult<Self> {
        if data.is_empty() || data[0] != 97 {
            return Err(SftpMockError::Protocol(
                "invalid CHANNEL_CLOSE message".to_string(),
            ));
        }
        let mut offset = 1;
        Ok(Self {
            recipient_channel: read_u32(data, &mut offset)?,
        })
    }
}

/// A channel request by wire name (RFC 4254 Section 5.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRequestType {
    /// "subsystem" request naming the subsystem to start.
    Subsystem(String),
    /// Any other request type, kept by name so it can be declined.
    Other(String),
}

impl ChannelRequestType {
    /// Returns the wire name of the request type.
    pub fn name(&self) -> &str {
        match self {
            ChannelRequestType::Subsystem(_) => "subsystem",
            ChannelRequestType::Other(name) => name,
        }
    }
}

/// SSH_MSG_CHANNEL_REQUEST message (RFC 4254 Section 5.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRequest {
    recipient_channel: u32,
    request_type: ChannelRequestType,
    want_reply: bool,
}

impl ChannelRequest {
    /// Creates a channel request.
    pub fn new(recipient_channel: u32, request_type: ChannelRequestType, want_reply: bool) -> Self {
        Self {
            recipient_channel,
            request_type,
            want_reply,
        }
    }

    /// Returns the recipient channel number.
    pub fn recipient_channel(&self) -> u32 {
        self.recipient_channel
    }

    /// Returns the request type.
    pub fn request_type(&self) -> &ChannelRequestType {
        &self.request_type
    }

    /// Returns whether the sender wants a reply.
    pub fn want_reply(&self) -> bool {
        self.want_reply
    }

    /// Serializes the message payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(98);
        buf.put_u32(self.recipient_channel);
        write_string(&mut buf, self.request_type.name());
        buf.put_u8(u8::from(self.want_reply));

        if let ChannelRequestType::Subsystem(name) = &self.request_type {
            write_string(&mut buf, name);
        }

        buf.to_vec()
    }

    /// Parses a CHANNEL_REQUEST payload.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] on truncation or mistyping.
    pub fn from_bytes(data: &[u8]) -> SftpMockResult<Self> {
        if data.is_empty() || data[0] != 98 {
            return Err(SftpMockError::Protocol(
                "invalid CHANNEL_REQUEST message".to_string(),
            ));
        }

        let mut offset = 1;
        let recipient_channel = read_u32(data, &mut offset)?;
        let type_name = read_string(data, &mut offset)?;

        if offset >= data.len() {
            return Err(SftpMockError::Protocol(
                "CHANNEL_REQUEST truncated before want_reply flag".to_string(),
            ));
        }
        let want_reply = data[offset] != 0;
        offset += 1;

        let request_type = match type_name.as_str() {
            "subsystem" => ChannelRequestType::Subsystem(read_string(data, &mut offset)?),
            _ => ChannelRequestType::Other(type_name),
        };

        Ok(Self {
            recipient_channel,
            request_type,
            want_reply,
        })
    }
}

/// SSH_MSG_CHANNEL_SUCCESS message (RFC 4254 Section 5.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSuccess {
    recipient_channel: u32,
}

impl ChannelSuccess {
    /// Creates a success reply.
    pub fn new(recipient_channel: u32) -> Self {
        Self { recipient_channel }
    }

    /// Returns the recipient channel number.
    pub fn recipient_channel(&self) -> u32 {
        self.recipient_channel
    }

    /// Serializes the message payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(99);
        buf.put_u32(self.recipient_channel);
        buf.to_vec()
    }
}

/// SSH_MSG_CHANNEL_FAILURE message (RFC 4254 Section 5.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelFailure {
    recipient_channel: u32,
}

impl ChannelFailure {
    /// Creates a failure reply.
    pub fn new(recipient_channel: u32) -> Self {
        Self { recipient_channel }
    }

    /// Returns the recipient channel number.
    pub fn recipient_channel(&self) -> u32 {
        self.recipient_channel
    }

    /// Serializes the message payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(100);
        buf.put_u32(self.recipient_channel);
        buf.to_vec()
    }
}

fn write_string(buf: &mut BytesMut, s: &str) {
    let bytes = s.as_bytes();
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

fn read_string(data: &[u8], offset: &mut usize) -> SftpMockResult<String> {
    let bytes = read_bytes(data, offset)?;
    String::from_utf8(bytes)
        .map_err(|_| SftpMockError::Protocol("string contains invalid UTF-8".to_string()))
}

fn read_bytes(data: &[u8], offset: &mut usize) -> SftpMockResult<Vec<u8>> {
    let length = read_u32(data, offset)? as usize;

    if *offset + length > data.len() {
        return Err(SftpMockError::Protocol(format!(
            "string truncated: {} bytes declared at offset {}",
            length, offset
        )));
    }

    let bytes = data[*offset..*offset + length].to_vec();
    *offset += length;
    Ok(bytes)
}

fn read_u32(data: &[u8], offset: &mut usize) -> SftpMockResult<u32> {
    if *offset + 4 > data.len() {
        return Err(SftpMockError::Protocol(format!(
            "cannot read uint32 at offset {}",
            offset
        )));
    }

    let value = u32::from_be_bytes([
        data[*offset],
        data[*offset + 1],
        data[*offset + 2],
        data[*offset + 3],
    ]);
    *offset += 4;
    Ok(value)
}
