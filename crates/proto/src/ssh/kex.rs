//! Key exchange negotiation messages (RFC 4253 Section 7).
//!
//! Covers SSH_MSG_KEXINIT, SSH_MSG_NEWKEYS and first-match algorithm
//! negotiation. The mock server advertises a single fixed suite:
//!
//! - KEX: `curve25519-sha256` (and the `@libssh.org` alias)
//! - Host key: `ssh-ed25519`
//! - Cipher: `aes128-gcm@openssh.com` (AEAD, so the MAC lists are only
//!   advertised for well-formedness)
//! - Compression: `none`
//!
//! Clients that cannot match the suite fail negotiation and are
//! disconnected; every mainstream SFTP client of the last decade can.
//!
//! # Example
//!
//! ```rust
//! use sftpmock_proto::ssh::kex::KexInit;
//!
//! let kexinit = KexInit::new_default();
//! assert!(kexinit.kex_algorithms().contains(&"curve25519-sha256".to_string()));
//! ```

use bytes::{BufMut, BytesMut};
use rand::RngCore;
use sftpmock_platform::{SftpMockError, SftpMockResult};

/// SSH_MSG_KEXINIT message (RFC 4253 Section 7.1).
///
/// Each algorithm list is ordered by preference, most preferred first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KexInit {
    cookie: [u8; 16],
    kex_algorithms: Vec<String>,
    server_host_key_algorithms: Vec<String>,
    encryption_algorithms_client_to_server: Vec<String>,
    encryption_algorithms_server_to_client: Vec<String>,
    mac_algorithms_client_to_server: Vec<String>,
    mac_algorithms_server_to_client: Vec<String>,
    compression_algorithms_client_to_server: Vec<String>,
    compression_algorithms_server_to_client: Vec<String>,
    languages_client_to_server: Vec<String>,
    languages_server_to_client: Vec<String>,
    first_kex_packet_follows: bool,
}

impl KexInit {
    /// Creates the KEXINIT the mock server advertises.
    pub fn new_default() -> Self {
        let mut cookie = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut cookie);

        Self {
            cookie,
            kex_algorithms: vec![
                "curve25519-sha256".to_string(),
                "curve25519-sha256@libssh.org".to_string(),
            ],
            server_host_key_algorithms: vec!["ssh-ed25519".to_string()],
            encryption_algorithms_client_to_server: vec!["aes128-gcm@openssh.com".to_string()],
            encryption_algorithms_server_to_client: vec!["aes128-gcm@openssh.com".to_string()],
            mac_algorithms_client_to_server: vec!["hmac-sha2-256".to_string()],
            mac_algorithms_server_to_client: vec!["hmac-sha2-256".to_string()],
            compression_algorithms_client_to_server: vec!["none".to_string()],
            compression_algorithms_server_to_client: vec!["none".to_string()],
            languages_client_to_server: vec![],
            languages_server_to_client: vec![],
            first_kex_packet_follows: false,
        }
    }

    /// Returns the random cookie.
    pub fn cookie(&self) -> &[u8; 16] {
        &self.cookie
    }

    /// Returns the key exchange algorithm list.
    pub fn kex_algorithms(&self) -> &[String] {
        &self.kex_algorithms
    }

    /// Returns the host key algorithm list.
    pub fn server_host_key_algorithms(&self) -> &[String] {
        &self.server_host_key_algorithms
    }

    /// Returns the client-to-server cipher list.
    pub fn encryption_algorithms_client_to_server(&self) -> &[String] {
        &self.encryption_algorithms_client_to_server
    }

    /// Returns the server-to-client cipher list.
    pub fn encryption_algorithms_server_to_client(&self) -> &[String] {
        &self.encryption_algorithms_server_to_client
    }

    /// Returns whether a guessed key exchange packet follows.
    pub fn first_kex_packet_follows(&self) -> bool {
        self.first_kex_packet_follows
    }

    /// Serializes the message payload (without packet framing).
    ///
    /// Wire layout (RFC 4253 Section 7.1):
    ///
    /// ```text
    /// byte         SSH_MSG_KEXINIT (20)
    /// byte[16]     cookie
    /// name-list    kex_algorithms
    /// name-list    server_host_key_algorithms
    /// name-list    encryption c->s, s->c
    /// name-list    mac c->s, s->c
    /// name-list    compression c->s, s->c
    /// name-list    languages c->s, s->c
    /// boolean      first_kex_packet_follows
    /// uint32       0 (reserved)
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(20);
        buf.put_slice(&self.cookie);

        write_name_list(&mut buf, &self.kex_algorithms);
        write_name_list(&mut buf, &self.server_host_key_algorithms);
        write_name_list(&mut buf, &self.encryption_algorithms_client_to_server);
        write_name_list(&mut buf, &self.encryption_algorithms_server_to_client);
        write_name_list(&mut buf, &self.mac_algorithms_client_to_server);
        write_name_list(&mut buf, &self.mac_algorithms_server_to_client);
        write_name_list(&mut buf, &self.compression_algorithms_client_to_server);
        write_name_list(&mut buf, &self.compression_algorithms_server_to_client);
        write_name_list(&mut buf, &self.languages_client_to_server);
        write_name_list(&mut buf, &self.languages_server_to_client);

        buf.put_u8(u8::from(self.first_kex_packet_follows));
        buf.put_u32(0);

        buf.to_vec()
    }

    /// Parses a KEXINIT message payload.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] if the message number is not
    /// 20 or any field is truncated.
    pub fn from_bytes(data: &[u8]) -> SftpMockResult<Self> {
        if data.is_empty() {
            return Err(SftpMockError::Protocol("KEXINIT message is empty".to_string()));
        }
        if data[0] != 20 {
            return Err(SftpMockError::Protocol(format!(
                "expected SSH_MSG_KEXINIT (20), got {}",
                data[0]
            )));
        }
        if data.len() < 17 {
            return Err(SftpMockError::Protocol(format!(
                "KEXINIT message too short: {} bytes",
                data.len()
            )));
        }

        let mut cookie = [0u8; 16];
        cookie.copy_from_slice(&data[1..17]);

        let mut offset = 17;
        let kex_algorithms = read_name_list(data, &mut offset)?;
        let server_host_key_algorithms = read_name_list(data, &mut offset)?;
        let encryption_algorithms_client_to_server = read_name_list(data, &mut offset)?;
        let encryption_algorithms_server_to_client = read_name_list(data, &mut offset)?;
        let mac_algorithms_client_to_server = read_name_list(data, &mut offset)?;
        let mac_algorithms_server_to_client = read_name_list(data, &mut offset)?;
        let compression_algorithms_client_to_server = read_name_list(data, &mut offset)?;
        let compression_algorithms_server_to_client = read_name_list(data, &mut offset)?;
        let languages_client_to_server = read_name_list(data, &mut offset)?;
        let languages_server_to_client = read_name_list(data, &mut offset)?;

        if offset >= data.len() {
            return Err(SftpMockError::Protocol(
                "KEXINIT truncated before first_kex_packet_follows".to_string(),
            ));
        }
        let first_kex_packet_follows = data[offset] != 0;
        offset += 1;

        if offset + 4 > data.len() {
            return Err(SftpMockError::Protocol(
                "KEXINIT truncated before reserved field".to_string(),
            ));
        }

        Ok(Self {
            cookie,
            kex_algorithms,
            server_host_key_algorithms,
            encryption_algorithms_client_to_server,
            encryption_algorithms_server_to_client,
            mac_algorithms_client_to_server,
            mac_algorithms_server_to_client,
            compression_algorithms_client_to_server,
            compression_algorithms_server_to_client,
            languages_client_to_server,
            languages_server_to_client,
            first_kex_packet_follows,
        })
    }
}

/// SSH_MSG_NEWKEYS message (RFC 4253 Section 7.3).
///
/// A single byte announcing the switch to the negotiated keys. The
/// packet sequence numbers continue uninterrupted across the switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NewKeys;

impl NewKeys {
    /// Creates the message.
    pub const fn new() -> Self {
        Self
    }

    /// Serializes to its single-byte payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        vec![21]
    }

    /// Parses the message payload.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] if empty or the message
    /// number is not 21.
    pub fn from_bytes(data: &[u8]) -> SftpMockResult<Self> {
        match data.first() {
            Some(21) => Ok(Self),
            Some(other) => Err(SftpMockError::Protocol(format!(
                "expected SSH_MSG_NEWKEYS (21), got {}",
                other
            ))),
            None => Err(SftpMockError::Protocol("NEWKEYS message is empty".to_string())),
        }
    }
}

/// Writes an RFC 4251 name-list: uint32 length, then comma-separated
/// names.
fn write_name_list(buf: &mut BytesMut, names: &[String]) {
    let list = names.join(",");
    buf.put_u32(list.len() as u32);
    buf.put_slice(list.as_bytes());
}

/// Reads an RFC 4251 name-list at `offset`, advancing it.
fn read_name_list(data: &[u8], offset: &mut usize) -> SftpMockResult<Vec<String>> {
    if *offset + 4 > data.len() {
        return Err(SftpMockError::Protocol(format!(
            "cannot read name-list length at offset {}",
            offset
        )));
    }

    let length = u32::from_be_bytes([
        data[*offset],
        data[*offset + 1],
        data[*offset + 2],
        data[*offset + 3],
    ]) as usize;
    *offset += 4;

    if *offset + length > data.len() {
        return Err(SftpMockError::Protocol(format!(
            "name-list truncated: {} bytes declared at offset {}",
            length, offset
        )));
    }

    let list_bytes = &data[*offset..*offset + length];
    *offset += length;

    let list_str = std::str::from_utf8(list_bytes)
        .map_err(|_| SftpMockError::Protocol("name-list is not valid UTF-8".to_string()))?;

    if list_str.is_empty() {
        Ok(vec![])
    } else {
        Ok(list_str.split(',').map(String::from).collect())
    }
}

/// Picks the first algorithm in the client's preference order that the
/// server also supports (RFC 4253 Section 7.1).
///
/// # Errors
///
/// Returns [`SftpMockError::Protocol`] when no algorithm is shared.
pub fn negotiate_algorithm(client_list: &[String], server_list: &[String]) -> SftpMockResult<String> {
    for client_alg in client_list {
        if server_list.contains(client_alg) {
            return Ok(client_alg.clone());
        }
    }

    Err(SftpMockError::Protocol(format!(
        "no common algorithm: client={:?}, server={:?}",
        client_list, server_list
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_suite() {
        let kexinit = KexInit::new_default();
        assert_eq!(kexinit.cookie().len(), 16);
        assert!(kexinit
            .kex_algorithms()
            .contains(&"curve25519-sha256".to_string()));
        assert_eq!(kexinit.server_host_key_algorithms(), ["ssh-ed25519"]);
        assert_eq!(
            kexinit.encryption_algorithms_server_to_client(),
            ["aes128-gcm@openssh.com"]
        );
        assert!(!kexinit.first_kex_packet_follows());
    }

    #[test]
    fn test_kexinit_round_trip() {
        let original = KexInit::new_default();
        let parsed = KexInit::from_bytes(&original.to_bytes()).unwrap();

        assert_eq!(parsed, original);
    }

    #[test]
    fn test_kexinit_wrong_type() {
        let mut data = vec![99];
        data.extend_from_slice(&[0u8; 20]);
        assert!(KexInit::from_bytes(&data).is_err());
    }

    #[test]
    fn test_kexinit_too_short() {
        assert!(KexInit::from_bytes(&[20, 1, 2, 3]).is_err());
    }

    #[test]
    fn test_negotiate_first_client_match() {
        let client = vec!["b".to_string(), "a".to_string()];
        let server = vec!["a".to_string(), "b".to_string()];
        assert_eq!(negotiate_algorithm(&client, &server).unwrap(), "b");
    }

    #[test]
    fn test_negotiate_no_match() {
        let client = vec!["aes256-ctr".to_string()];
        let server = vec!["aes128-gcm@openssh.com".to_string()];
        assert!(matches!(
            negotiate_algorithm(&client, &server),
            Err(SftpMockError::Protocol(_))
        ));
    }

    #[test]
    fn test_name_list_round_trip() {
        let names = vec!["first".to_string(), "second".to_string()];
        let mut buf = BytesMut::new();
        write_name_list(&mut buf, &names);

        let mut offset = 0;
        assert_eq!(read_name_list(&buf, &mut offset).unwrap(), names);
        assert_eq!(offset, buf.len());
    }

    #[test]
    fn test_name_list_empty() {
        let mut buf = BytesMut::new();
        write_name_list(&mut buf, &[]);

        let mut offset = 0;
        assert!(read_name_list(&buf, &mut offset).unwrap().is_empty());
    }

    #[test]
    fn test_newkeys() {
        assert_eq!(NewKeys::new().to_bytes(), vec![21]);
        assert_eq!(NewKeys::from_bytes(&[21]).unwrap(), NewKeys);
        assert!(NewKeys::from_bytes(&[20]).is_err());
        assert!(NewKeys::from_bytes(&[]).is_err());
    }
}
