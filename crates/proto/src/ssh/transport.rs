//! Transport layer state machine (RFC 4253).
//!
//! Tracks where a connection is in its lifecycle, from the initial version
//! string exchange through to fully encrypted traffic, and holds the AEAD
//! keys once key exchange has installed them.
//!
//! # Transport States
//!
//! 1. **VersionExchange** - Exchange SSH-2.0 version strings
//! 2. **KexInit** - Send/receive SSH_MSG_KEXINIT messages
//! 3. **KeyExchange** - Perform the Curve25519 key exchange
//! 4. **NewKeys** - Send/receive SSH_MSG_NEWKEYS, install keys
//! 5. **Encrypted** - All communication encrypted and authenticated
//!
//! # Example
//!
//! ```rust
//! use sftpmock_proto::ssh::transport::{State, TransportState};
//!
//! let state = TransportState::new();
//! assert!(matches!(state.current(), State::VersionExchange));
//! ```

use crate::ssh::crypto::{DecryptionKey, EncryptionKey};
use crate::ssh::kex::KexInit;
use crate::ssh::version::Version;
use sftpmock_platform::{SftpMockError, SftpMockResult};

/// Connection state.
///
/// The state machine only moves forward. The server never initiates a rekey,
/// so there is no path back out of [`State::Encrypted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    /// Version exchange in progress.
    ///
    /// Both sides exchange "SSH-2.0-..." version strings.
    VersionExchange,

    /// Key exchange initialization.
    ///
    /// Both sides send SSH_MSG_KEXINIT with algorithm preferences.
    KexInit,

    /// Key exchange in progress.
    ///
    /// Performing the Curve25519 Diffie-Hellman exchange.
    KeyExchange,

    /// New keys installation.
    ///
    /// Both sides send SSH_MSG_NEWKEYS and activate encryption.
    NewKeys,

    /// Encrypted communication.
    ///
    /// All packets encrypted and authenticated. This is the normal
    /// operating state for the rest of the session.
    Encrypted,
}

/// Installed AEAD keys for one direction pair.
///
/// Present once key exchange has completed. With AES-GCM there is no
/// separate MAC, so a key pair is all that encryption needs.
#[derive(Debug)]
pub struct SessionKeys {
    /// Key for encrypting outgoing packets (server to client).
    pub encryption_key: EncryptionKey,

    /// Key for decrypting incoming packets (client to server).
    pub decryption_key: DecryptionKey,
}

/// Transport layer state machine.
///
/// Owns the current [`State`], the peer's handshake material, and the
/// session keys once they are installed.
#[derive(Debug)]
pub struct TransportState {
    /// Current state.
    state: State,

    /// Peer's version string (set after version exchange).
    peer_version: Option<Version>,

    /// Peer's KEXINIT message (set after receiving KEXINIT).
    peer_kex_init: Option<KexInit>,

    /// AEAD keys (set after key exchange).
    keys: Option<SessionKeys>,
}

impl TransportState {
    /// Creates a new state machine in the VersionExchange state.
    ///
    /// # Example
    ///
    /// ```rust
    /// use sftpmock_proto::ssh::transport::TransportState;
    ///
    /// let state = TransportState::new();
    /// assert!(!state.is_encrypted());
    /// ```
    pub fn new() -> Self {
        Self {
            state: State::VersionExchange,
            peer_version: None,
            peer_kex_init: None,
            keys: None,
        }
    }

    /// Returns the current state.
    pub fn current(&self) -> &State {
        &self.state
    }

    /// Returns the peer's version string (if received).
    pub fn peer_version(&self) -> Option<&Version> {
        self.peer_version.as_ref()
    }

    /// Returns the peer's KEXINIT message (if received).
    pub fn peer_kex_init(&self) -> Option<&KexInit> {
        self.peer_kex_init.as_ref()
    }

    /// Returns the installed session keys, mutably.
    ///
    /// Encryption and decryption both advance an internal packet counter,
    /// hence the mutable access.
    pub fn keys_mut(&mut self) -> Option<&mut SessionKeys> {
        self.keys.as_mut()
    }

    /// Returns whether the connection is encrypted with keys installed.
    pub fn is_encrypted(&self) -> bool {
        matches!(self.state, State::Encrypted) && self.keys.is_some()
    }

    /// Transitions to the next state.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] if the transition would skip a
    /// step (e.g. VersionExchange straight to Encrypted).
    pub fn transition(&mut self, next_state: State) -> SftpMockResult<()> {
        let valid = match (&self.state, &next_state) {
            (State::VersionExchange, State::KexInit) => true,
            (State::KexInit, State::KeyExchange) => true,
            (State::KeyExchange, State::NewKeys) => true,
            (State::NewKeys, State::Encrypted) => true,
            (s1, s2) if s1 == s2 => true,
            _ => false,
        };

        if !valid {
            return Err(SftpMockError::Protocol(format!(
                "invalid state transition: {:?} -> {:?}",
                self.state, next_state
            )));
        }

        self.state = next_state;
        Ok(())
    }

    /// Sets the peer's version string.
    ///
    /// Called after receiving the peer's version during VersionExchange.
    pub fn set_peer_version(&mut self, version: Version) {
        self.peer_version = Some(version);
    }

    /// Sets the peer's KEXINIT message.
    ///
    /// Called after receiving SSH_MSG_KEXINIT.
    pub fn set_peer_kex_init(&mut self, kex_init: KexInit) {
        self.peer_kex_init = Some(kex_init);
    }

    /// Installs the session keys.
    ///
    /// Called once the Curve25519 exchange has derived keys, before the
    /// transition to [`State::Encrypted`].
    pub fn install_keys(&mut self, keys: SessionKeys) {
        self.keys = Some(keys);
    }
}

impl Default for TransportState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::kex_dh::derive_key;

    #[test]
    fn test_transport_state_new() {
        let state = TransportState::new();
        assert!(matches!(state.current(), State::VersionExchange));
        assert!(!state.is_encrypted());
        assert!(state.peer_version().is_none());
        assert!(state.peer_kex_init().is_none());
    }

    #[test]
    fn test_state_transition_valid() {
        let mut state = TransportState::new();

        assert!(state.transition(State::KexInit).is_ok());
        assert!(matches!(state.current(), State::KexInit));

        assert!(state.transition(State::KeyExchange).is_ok());
        assert!(matches!(state.current(), State::KeyExchange));

        assert!(state.transition(State::NewKeys).is_ok());
        assert!(matches!(state.current(), State::NewKeys));

        assert!(state.transition(State::Encrypted).is_ok());
        assert!(matches!(state.current(), State::Encrypted));
    }

    #[test]
    fn test_state_transition_same_state() {
        let mut state = TransportState::new();
        assert!(state.transition(State::VersionExchange).is_ok());
    }

    #[test]
    fn test_state_transition_invalid() {
        let mut state = TransportState::new();

        let result = state.transition(State::Encrypted);
        match result {
            Err(SftpMockError::Protocol(msg)) => {
                assert!(msg.contains("invalid state transition"));
            }
            _ => panic!("Expected Protocol error"),
        }
    }

    #[test]
    fn test_no_rekey_path() {
        let mut state = TransportState::new();
        state.transition(State::KexInit).unwrap();
        state.transition(State::KeyExchange).unwrap();
        state.transition(State::NewKeys).unwrap();
        state.transition(State::Encrypted).unwrap();

        assert!(state.transition(State::KexInit).is_err());
    }

    #[test]
    fn test_peer_version() {
        let mut state = TransportState::new();
        assert!(state.peer_version().is_none());

        let version = Version::new("OpenSSH_8.0", None);
        state.set_peer_version(version.clone());
        assert_eq!(state.peer_version(), Some(&version));
    }

    #[test]
    fn test_peer_kex_init() {
        let mut state = TransportState::new();
        assert!(state.peer_kex_init().is_none());

        let kex_init = KexInit::new_default();
        state.set_peer_kex_init(kex_init.clone());
        assert_eq!(state.peer_kex_init(), Some(&kex_init));
    }

    #[test]
    fn test_encrypted_requires_keys() {
        let mut state = TransportState::new();
        state.transition(State::KexInit).unwrap();
        state.transition(State::KeyExchange).unwrap();
        state.transition(State::NewKeys).unwrap();
        state.transition(State::Encrypted).unwrap();

        // Encrypted state without installed keys is not usable.
        assert!(!state.is_encrypted());

        let secret = vec![0x42u8; 32];
        let hash = vec![0x17u8; 32];
        let enc = derive_key(&secret, &hash, &hash, b'D', 16);
        let enc_iv = derive_key(&secret, &hash, &hash, b'B', 12);
        let dec = derive_key(&secret, &hash, &hash, b'C', 16);
        let dec_iv = derive_key(&secret, &hash, &hash, b'A', 12);
        state.install_keys(SessionKeys {
            encryption_key: EncryptionKey::new(&enc, &enc_iv).unwrap(),
            decryption_key: DecryptionKey::new(&dec, &dec_iv).unwrap(),
        });
        assert!(state.is_encrypted());
    }
}
