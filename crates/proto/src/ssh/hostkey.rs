//! Server host key (RFC 4253 Section 6.6).
//!
//! The mock server signs with a single algorithm, `ssh-ed25519`, and
//! generates a fresh key pair at startup. A test fixture has no host
//! identity to preserve across runs, so there is no key persistence;
//! clients are expected to connect with host key checking disabled.
//!
//! # Example
//!
//! ```rust
//! use sftpmock_proto::ssh::hostkey::Ed25519HostKey;
//!
//! let hostkey = Ed25519HostKey::generate();
//! let blob = hostkey.public_key_bytes();
//! let signature = hostkey.sign(b"exchange hash");
//! assert!(Ed25519HostKey::verify(hostkey.raw_public_key(), b"exchange hash", &signature[19..]).unwrap());
//! ```

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH};
use sftpmock_platform::{SftpMockError, SftpMockResult};

/// The host key algorithm name the server advertises.
pub const ALGORITHM_NAME: &str = "ssh-ed25519";

/// An Ed25519 host key pair.
#[derive(Clone)]
pub struct Ed25519HostKey {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl Ed25519HostKey {
    /// Generates a fresh key pair from the thread RNG.
    pub fn generate() -> Self {
        let mut csprng = rand::thread_rng();
        let secret_bytes: [u8; SECRET_KEY_LENGTH] = rand::Rng::gen(&mut csprng);
        let signing_key = SigningKey::from_bytes(&secret_bytes);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Returns the raw 32-byte public key.
    pub fn raw_public_key(&self) -> &[u8] {
        self.verifying_key.as_bytes()
    }

    /// Returns the public key blob in SSH wire format:
    /// `string "ssh-ed25519", string key (32 bytes)`.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();

        let alg_name = ALGORITHM_NAME.as_bytes();
        bytes.extend_from_slice(&(alg_name.len() as u32).to_be_bytes());
        bytes.extend_from_slice(alg_name);

        let public_key = self.verifying_key.as_bytes();
        bytes.extend_from_slice(&(public_key.len() as u32).to_be_bytes());
        bytes.extend_from_slice(public_key);

        bytes
    }

    /// Signs `data` and returns the signature in SSH wire format:
    /// `string "ssh-ed25519", string signature (64 bytes)`.
    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        let signature = self.signing_key.sign(data);

        let mut bytes = Vec::new();

        let alg_name = ALGORITHM_NAME.as_bytes();
        bytes.extend_from_slice(&(alg_name.len() as u32).to_be_bytes());
        bytes.extend_from_slice(alg_name);

        let sig_bytes = signature.to_bytes();
        bytes.extend_from_slice(&(sig_bytes.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&sig_bytes);

        bytes
    }

    /// Verifies a raw 64-byte Ed25519 signature against a raw 32-byte
    /// public key.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] if the key or signature has
    /// the wrong length or the key is not a valid curve point.
    pub fn verify(public_key: &[u8], data: &[u8], signature: &[u8]) -> SftpMockResult<bool> {
        if public_key.len() != 32 {
            return Err(SftpMockError::Protocol(
                "Ed25519 public key must be 32 bytes".to_string(),
            ));
        }
        if signature.len() != 64 {
            return Err(SftpMockError::Protocol(
                "Ed25519 signature must be 64 bytes".to_string(),
            ));
        }

        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(public_key);
        let verifying_key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| SftpMockError::Protocol(format!("invalid Ed25519 public key: {}", e)))?;

        let mut sig_bytes = [0u8; 64];
        sig_bytes.copy_from_slice(signature);
        let signature = Signature::from_bytes(&sig_bytes);

        Ok(verifying_key.verify(data, &signature).is_ok())
    }
}

impl std::fmt::Debug for Ed25519HostKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519HostKey")
            .field("algorithm", &ALGORITHM_NAME)
            .field("public_key", &hex::encode(self.verifying_key.as_bytes()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_blob_format() {
        let hostkey = Ed25519HostKey::generate();
        let blob = hostkey.public_key_bytes();

        // string "ssh-ed25519" + string key
        assert_eq!(&blob[0..4], &11u32.to_be_bytes());
        assert_eq!(&blob[4..15], b"ssh-ed25519");
        assert_eq!(&blob[15..19], &32u32.to_be_bytes());
        assert_eq!(blob.len(), 4 + 11 + 4 + 32);
    }

    #[test]
    fn test_sign_and_verify() {
        let hostkey = Ed25519HostKey::generate();
        let data = b"exchange hash bytes";
        let wire_sig = hostkey.sign(data);

        // Strip the wire framing to get the raw 64-byte signature
        assert_eq!(wire_sig.len(), 4 + 11 + 4 + 64);
        let raw_sig = &wire_sig[19..];

        assert!(Ed25519HostKey::verify(hostkey.raw_public_key(), data, raw_sig).unwrap());
        assert!(!Ed25519HostKey::verify(hostkey.raw_public_key(), b"other data", raw_sig).unwrap());
    }

    #[test]
    fn test_verify_rejects_bad_lengths() {
        assert!(Ed25519HostKey::verify(&[0u8; 16], b"data", &[0u8; 64]).is_err());
        assert!(Ed25519HostKey::verify(&[0u8; 32], b"data", &[0u8; 32]).is_err());
    }

    #[test]
    fn test_fresh_keys_differ() {
        let a = Ed25519HostKey::generate();
        let b = Ed25519HostKey::generate();
        assert_ne!(a.raw_public_key(), b.raw_public_key());
    }

    #[test]
    fn test_debug_hides_secret() {
        let hostkey = Ed25519HostKey::generate();
        let debug = format!("{:?}", hostkey);
        assert!(debug.contains("ssh-ed25519"));
        assert!(!debug.contains("signing"));
    }
}
