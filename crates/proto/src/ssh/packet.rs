//! SSH binary packet framing (RFC 4253 Section 6).
//!
//! # Packet Format
//!
//! ```text
//! uint32    packet_length
//! byte      padding_length
//! byte[n1]  payload (n1 = packet_length - padding_length - 1)
//! byte[n2]  random padding (n2 = padding_length)
//! ```
//!
//! # Constraints
//!
//! - Cleartext phase ([`Packet::new`]): `packet_length + 4` is a
//!   multiple of 8
//! - Encrypted phase ([`Packet::new_aead`]): the length field is
//!   excluded from alignment and `packet_length` itself is a multiple
//!   of the 16-byte AES block (RFC 5647 Section 7.2)
//! - Padding is 4 to 255 random bytes
//! - Packets above 35000 bytes are rejected (RFC 4253 Section 6.1)
//!
//! After `SSH_MSG_NEWKEYS` the transport encrypts everything past the
//! length field and appends the AEAD tag; that happens in the session
//! loop, not here. This module only frames and unframes plaintext.
//!
//! # Example
//!
//! ```rust
//! use sftpmock_proto::ssh::Packet;
//!
//! let packet = Packet::new(b"some payload".to_vec()).unwrap();
//! let bytes = packet.to_bytes();
//! let parsed = Packet::from_bytes(&bytes).unwrap();
//! assert_eq!(parsed.payload(), b"some payload");
//! ```

use bytes::{Buf, BufMut, BytesMut};
use rand::RngCore;
use sftpmock_platform::{SftpMockError, SftpMockResult};

/// Maximum packet size in bytes (RFC 4253 Section 6.1).
pub const MAX_PACKET_SIZE: usize = 35000;

/// Minimum padding length in bytes (RFC 4253 Section 6).
pub const MIN_PADDING_LEN: u8 = 4;

/// An SSH binary packet: payload plus its random padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    payload: Vec<u8>,
    padding: Vec<u8>,
}

impl Packet {
    /// Frames `payload` into a packet, generating aligned random padding.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] if the framed packet would
    /// exceed [`MAX_PACKET_SIZE`].
    pub fn new(payload: Vec<u8>) -> SftpMockResult<Self> {
        // 4 bytes packet_length + 1 byte padding_length, both aligned
        Self::with_alignment(payload, 8, 5)
    }

    /// Frames `payload` for an AEAD cipher with a cleartext length field
    /// (RFC 5647 Section 7.2): the length field sits outside the sealed
    /// region, so padding aligns `padding_length || payload || padding`
    /// to the 16-byte AES block on its own.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] if the framed packet would
    /// exceed [`MAX_PACKET_SIZE`].
    pub fn new_aead(payload: Vec<u8>) -> SftpMockResult<Self> {
        Self::with_alignment(payload, 16, 1)
    }

    fn with_alignment(
        payload: Vec<u8>,
        block_size: usize,
        aligned_header_len: usize,
    ) -> SftpMockResult<Self> {
        let unpadded_len = aligned_header_len + payload.len();
        let mut padding_len = MIN_PADDING_LEN as usize;
        while (unpadded_len + padding_len) % block_size != 0 {
            padding_len += 1;
        }

        let total = 5 + payload.len() + padding_len;
        if total > MAX_PACKET_SIZE {
            return Err(SftpMockError::Protocol(format!(
                "packet size {} exceeds maximum {}",
                total, MAX_PACKET_SIZE
            )));
        }

        let mut padding = vec![0u8; padding_len];
        rand::thread_rng().fill_bytes(&mut padding);

        Ok(Self { payload, padding })
    }

    /// Returns the payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the padding bytes.
    pub fn padding(&self) -> &[u8] {
        &self.padding
    }

    /// Serializes the packet to wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let packet_length = 1 + self.payload.len() + self.padding.len();
        let mut buf = BytesMut::with_capacity(4 + packet_length);

        buf.put_u32(packet_length as u32);
        buf.put_u8(self.padding.len() as u8);
        buf.put_slice(&self.payload);
        buf.put_slice(&self.padding);

        buf.to_vec()
    }

    /// Parses a packet from wire format.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] if the buffer is shorter than
    /// its declared length, the declared length breaks the size limits,
    /// or the padding length is inconsistent.
    pub fn from_bytes(data: &[u8]) -> SftpMockResult<Self> {
        if data.len() < 5 {
            return Err(SftpMockError::Protocol(format!(
                "packet too short: {} bytes (minimum 5)",
                data.len()
            )));
        }

        let mut buf = data;
        let packet_length = buf.get_u32() as usize;

        if packet_length > MAX_PACKET_SIZE {
            return Err(SftpMockError::Protocol(format!(
                "packet too large: {} bytes (maximum {})",
                packet_length, MAX_PACKET_SIZE
            )));
        }
        if packet_length < 1 + MIN_PADDING_LEN as usize {
            return Err(SftpMockError::Protocol(format!(
                "packet too small: {} bytes",
                packet_length
            )));
        }
        if buf.len() < packet_length {
            return Err(SftpMockError::Protocol(format!(
                "incomplete packet: declared {} bytes, have {}",
                packet_length,
                buf.len()
            )));
        }

        let padding_length = buf.get_u8() as usize;
        if padding_length < MIN_PADDING_LEN as usize {
            return Err(SftpMockError::Protocol(format!(
                "padding too short: {} bytes (minimum {})",
                padding_length, MIN_PADDING_LEN
            )));
        }
        if packet_length < 1 + padding_length {
            return Err(SftpMockError::Protocol(format!(
                "padding length {} inconsistent with packet length {}",
                padding_length, packet_length
            )));
        }

        let payload_length = packet_length - 1 - padding_length;
        let payload = buf[..payload_length].to_vec();
        buf.advance(payload_length);
        let padding = buf[..padding_length].to_vec();

        Ok(Self { payload, padding })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_bounds() {
        let packet = Packet::new(b"hello".to_vec()).unwrap();
        assert!(packet.padding().len() >= MIN_PADDING_LEN as usize);
        assert!(packet.padding().len() <= 255);
    }

    #[test]
    fn test_alignment() {
        for len in [0, 1, 7, 8, 9, 100, 1000] {
            let packet = Packet::new(vec![0u8; len]).unwrap();
            let total = 4 + 1 + packet.payload().len() + packet.padding().len();
            assert_eq!(total % 8, 0, "payload len {} not aligned", len);
        }
    }

    #[test]
    fn test_aead_alignment_excludes_length_field() {
        for len in [0, 1, 7, 15, 16, 17, 100, 1000] {
            let packet = Packet::new_aead(vec![0u8; len]).unwrap();
            let sealed = 1 + packet.payload().len() + packet.padding().len();
            assert_eq!(sealed % 16, 0, "payload len {} not block aligned", len);
            assert!(packet.padding().len() >= MIN_PADDING_LEN as usize);
        }
    }

    #[test]
    fn test_round_trip() {
        let payload = b"round trip payload".to_vec();
        let bytes = Packet::new(payload.clone()).unwrap().to_bytes();
        let parsed = Packet::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.payload(), &payload[..]);
    }

    #[test]
    fn test_too_short() {
        assert!(Packet::from_bytes(&[0, 0, 0, 10]).is_err());
    }

    #[test]
    fn test_declared_length_too_large() {
        let mut data = vec![0u8; 64];
        data[0..4].copy_from_slice(&(40000u32).to_be_bytes());
        assert!(matches!(
            Packet::from_bytes(&data),
            Err(SftpMockError::Protocol(_))
        ));
    }

    #[test]
    fn test_padding_too_short() {
        let data = vec![
            0, 0, 0, 8, // packet_length = 8
            2, // padding_length below the RFC minimum
            b'H', b'e', b'l', b'l', b'o', 0, 0,
        ];
        assert!(Packet::from_bytes(&data).is_err());
    }

    #[test]
    fn test_incomplete_body() {
        let data = vec![0, 0, 0, 20, 4, b'H', b'e'];
        assert!(Packet::from_bytes(&data).is_err());
    }

    #[test]
    fn test_oversized_payload_rejected() {
        assert!(Packet::new(vec![0u8; MAX_PACKET_SIZE + 1]).is_err());
    }
}
