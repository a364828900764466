//! Transport encryption for the mock server.
//!
//! A single AEAD cipher is supported: AES-128-GCM as negotiated under
//! the name `aes128-gcm@openssh.com` (RFC 5647). The 4-byte packet
//! length field stays cleartext on the wire and is authenticated as
//! associated data; everything after it is sealed, with the 16-byte tag
//! appended. The nonce starts at the 12-byte IV derived during key
//! exchange and its low 8 bytes advance as an invocation counter, one
//! step per packet, so both directions stay in lockstep with the peer.
//!
//! The keys wrap ring's sealing and opening keys, which zeroize their
//! material on drop.

use ring::aead::{
    Aad, BoundKey, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey, AES_128_GCM,
};
use sftpmock_platform::{SftpMockError, SftpMockResult};

/// Cipher key length in bytes.
pub const KEY_SIZE: usize = 16;

/// Initialization vector length in bytes.
pub const IV_SIZE: usize = 12;

/// GCM authentication tag length in bytes.
pub const TAG_SIZE: usize = 16;

/// Per-direction nonce sequence (RFC 5647 Section 7.1): the IV's first
/// 4 bytes are fixed, its last 8 seed a 64-bit invocation counter that
/// increments once per packet.
struct InvocationCounter {
    fixed: [u8; 4],
    invocation: u64,
}

impl InvocationCounter {
    fn new(iv: &[u8; IV_SIZE]) -> Self {
        let mut fixed = [0u8; 4];
        fixed.copy_from_slice(&iv[..4]);
        let mut invocation = [0u8; 8];
        invocation.copy_from_slice(&iv[4..]);
        Self {
            fixed,
            invocation: u64::from_be_bytes(invocation),
        }
    }
}

impl NonceSequence for InvocationCounter {
    fn advance(&mut self) -> Result<Nonce, ring::error::Unspecified> {
        let mut nonce_bytes = [0u8; IV_SIZE];
        nonce_bytes[..4].copy_from_slice(&self.fixed);
        nonce_bytes[4..].copy_from_slice(&self.invocation.to_be_bytes());
        self.invocation = self.invocation.wrapping_add(1);
        Nonce::try_assume_unique_for_key(&nonce_bytes)
    }
}

fn initial_iv(key_material: &[u8], iv_material: &[u8]) -> SftpMockResult<[u8; IV_SIZE]> {
    if key_material.len() < KEY_SIZE {
        return Err(SftpMockError::Protocol(format!(
            "insufficient cipher key material: expected {}, got {}",
            KEY_SIZE,
            key_material.len()
        )));
    }
    if iv_material.len() < IV_SIZE {
        return Err(SftpMockError::Protocol(format!(
            "insufficient iv material: expected {}, got {}",
            IV_SIZE,
            iv_material.len()
        )));
    }
    let mut iv = [0u8; IV_SIZE];
    iv.copy_from_slice(&iv_material[..IV_SIZE]);
    Ok(iv)
}

/// Sealing key for the server-to-client direction.
pub struct EncryptionKey {
    key: SealingKey<InvocationCounter>,
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("key", &"<redacted>")
            .finish()
    }
}

impl EncryptionKey {
    /// Creates a sealing key from derived key and IV material.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] if fewer than [`KEY_SIZE`]
    /// key or [`IV_SIZE`] IV bytes are supplied.
    pub fn new(key_material: &[u8], iv_material: &[u8]) -> SftpMockResult<Self> {
        let iv = initial_iv(key_material, iv_material)?;
        let unbound = UnboundKey::new(&AES_128_GCM, &key_material[..KEY_SIZE])
            .map_err(|_| SftpMockError::Protocol("failed to create cipher key".to_string()))?;

        Ok(Self {
            key: SealingKey::new(unbound, InvocationCounter::new(&iv)),
        })
    }

    /// Encrypts `data` in place, authenticating the cleartext length
    /// field as associated data, and appends the tag.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] on a sealing failure.
    pub fn encrypt(&mut self, length_field: [u8; 4], data: &mut Vec<u8>) -> SftpMockResult<()> {
        self.key
            .seal_in_place_append_tag(Aad::from(length_field), data)
            .map_err(|_| SftpMockError::Protocol("packet encryption failed".to_string()))
    }
}

/// Opening key for the client-to-server direction.
pub struct DecryptionKey {
    key: OpeningKey<InvocationCounter>,
}

impl std::fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptionKey")
            .field("key", &"<redacted>")
            .finish()
    }
}

impl DecryptionKey {
    /// Creates an opening key from derived key and IV material.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] if fewer than [`KEY_SIZE`]
    /// key or [`IV_SIZE`] IV bytes are supplied.
    pub fn new(key_material: &[u8], iv_material: &[u8]) -> SftpMockResult<Self> {
        let iv = initial_iv(key_material, iv_material)?;
        let unbound = UnboundKey::new(&AES_128_GCM, &key_material[..KEY_SIZE])
            .map_err(|_| SftpMockError::Protocol("failed to create cipher key".to_string()))?;

        Ok(Self {
            key: OpeningKey::new(unbound, InvocationCounter::new(&iv)),
        })
    }

    /// Decrypts `data` in place, verifying the tag and the cleartext
    /// length field, then strips the tag.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] if the tag does not verify.
    pub fn decrypt(&mut self, length_field: [u8; 4], data: &mut Vec<u8>) -> SftpMockResult<()> {
        let plaintext_len = self
            .key
            .open_in_place(Aad::from(length_field), data)
            .map_err(|_| {
                SftpMockError::Protocol("decryption failed or tag mismatch".to_string())
            })?
            .len();
        data.truncate(plaintext_len);
        Ok(())
    }
}
