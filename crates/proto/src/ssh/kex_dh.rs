//! Curve25519 ECDH key exchange and key derivation (RFC 8731, RFC 4253
//! Section 7.2).
//!
//! The mock server negotiates exactly one exchange method, so this
//! module carries the X25519 agreement plus the HASH-chain key
//! derivation both directions' cipher keys come from.
//!
//! # Example
//!
//! ```rust
//! use sftpmock_proto::ssh::kex_dh::Curve25519Exchange;
//!
//! let server = Curve25519Exchange::new().unwrap();
//! assert_eq!(server.public_key().len(), 32);
//! ```

use ring::agreement::{agree_ephemeral, EphemeralPrivateKey, UnparsedPublicKey, X25519};
use ring::rand::SystemRandom;
use sftpmock_platform::{SftpMockError, SftpMockResult};
use sha2::{Digest, Sha256};

/// An ephemeral X25519 key pair for one key exchange.
///
/// The private half lives inside ring's [`EphemeralPrivateKey`], which
/// enforces single use: computing the shared secret consumes the
/// exchange.
pub struct Curve25519Exchange {
    private_key: EphemeralPrivateKey,
    public_key: [u8; 32],
}

impl Curve25519Exchange {
    /// Generates a fresh ephemeral key pair.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] if the system RNG fails.
    pub fn new() -> SftpMockResult<Self> {
        let rng = SystemRandom::new();
        let private_key = EphemeralPrivateKey::generate(&X25519, &rng).map_err(|_| {
            SftpMockError::Protocol("failed to generate Curve25519 key".to_string())
        })?;

        let public_key = private_key.compute_public_key().map_err(|_| {
            SftpMockError::Protocol("failed to compute Curve25519 public key".to_string())
        })?;

        let mut public_key_bytes = [0u8; 32];
        public_key_bytes.copy_from_slice(public_key.as_ref());

        Ok(Self {
            private_key,
            public_key: public_key_bytes,
        })
    }

    /// Returns the 32-byte public key to send in the KEXDH reply.
    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    /// Computes the shared secret K against the peer's public key,
    /// consuming the exchange.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] if the agreement fails, e.g.
    /// on a low-order peer key.
    pub fn compute_shared_secret(self, peer_public: &[u8; 32]) -> SftpMockResult<Vec<u8>> {
        let peer_public_key = UnparsedPublicKey::new(&X25519, peer_public);

        agree_ephemeral(self.private_key, &peer_public_key, |key_material| {
            key_material.to_vec()
        })
        .map_err(|_| SftpMockError::Protocol("Curve25519 key agreement failed".to_string()))
    }
}

/// Derives one session key per RFC 4253 Section 7.2:
///
/// ```text
/// key = HASH(K || H || key_type || session_id)
/// ```
///
/// extended as needed with `HASH(K || H || key-so-far)` blocks and
/// truncated to `key_length`. `key_type` is 'A' through 'F'; the
/// AES-GCM transport uses 'A'/'B' for the two IVs and 'C'/'D' for the
/// two cipher keys. K is hashed in its mpint encoding.
pub fn derive_key(
    shared_secret: &[u8],
    exchange_hash: &[u8],
    session_id: &[u8],
    key_type: u8,
    key_length: usize,
) -> Vec<u8> {
    let mut key = Vec::new();
    let mut hasher = Sha256::new();

    let k_mpint = encode_mpint(shared_secret);

    hasher.update(&k_mpint);
    hasher.update(exchange_hash);
    hasher.update([key_type]);
    hasher.update(session_id);
    let block = hasher.finalize_reset();
    key.extend_from_slice(&block);

    while key.len() < key_length {
        hasher.update(&k_mpint);
        hasher.update(exchange_hash);
        hasher.update(&key[key.len() - 32..]);
        let block = hasher.finalize_reset();
        key.extend_from_slice(&block);
    }

    key.truncate(key_length);
    key
}

/// Encodes an unsigned big-endian integer as an SSH mpint: uint32
/// length, leading zeros trimmed, a 0x00 pad when the high bit is set.
pub(crate) fn encode_mpint(data: &[u8]) -> Vec<u8> {
    let trimmed: Vec<u8> = data.iter().skip_while(|&&b| b == 0).copied().collect();

    if trimmed.is_empty() {
        return vec![0, 0, 0, 0];
    }

    let needs_padding = trimmed[0] & 0x80 != 0;
    let length = trimmed.len() + usize::from(needs_padding);

    let mut result = Vec::with_capacity(4 + length);
    result.extend_from_slice(&(length as u32).to_be_bytes());
    if needs_padding {
        result.push(0);
    }
    result.extend_from_slice(&trimmed);

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_secret_agreement() {
        let client = Curve25519Exchange::new().unwrap();
        let server = Curve25519Exchange::new().unwrap();

        let client_public = *client.public_key();
        let server_public = *server.public_key();

        let client_secret = client.compute_shared_secret(&server_public).unwrap();
        let server_secret = server.compute_shared_secret(&client_public).unwrap();

        assert_eq!(client_secret, server_secret);
        assert_eq!(client_secret.len(), 32);
    }

    #[test]
    fn test_derive_key_lengths_and_separation() {
        let shared_secret = vec![0x42; 32];
        let exchange_hash = vec![0x01; 32];
        let session_id = vec![0x02; 32];

        let key_c = derive_key(&shared_secret, &exchange_hash, &session_id, b'C', 32);
        let key_d = derive_key(&shared_secret, &exchange_hash, &session_id, b'D', 32);
        assert_eq!(key_c.len(), 32);
        assert_ne!(key_c, key_d);

        // 64 bytes needs a second hash block
        let long = derive_key(&shared_secret, &exchange_hash, &session_id, b'C', 64);
        assert_eq!(long.len(), 64);
        assert_eq!(&long[..32], &key_c[..]);
    }

    #[test]
    fn test_encode_mpint() {
        assert_eq!(encode_mpint(&[]), vec![0, 0, 0, 0]);
        assert_eq!(encode_mpint(&[0x12, 0x34]), vec![0, 0, 0, 2, 0x12, 0x34]);
        // High bit forces a zero pad byte
        assert_eq!(encode_mpint(&[0x80, 0x00]), vec![0, 0, 0, 3, 0, 0x80, 0x00]);
        assert_eq!(
            encode_mpint(&[0x00, 0x00, 0x12, 0x34]),
            vec![0, 0, 0, 2, 0x12, 0x34]
        );
    }
}
