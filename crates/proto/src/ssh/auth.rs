//! User authentication (RFC 4252).
//!
//! The mock server accepts one method: "password", checked against the
//! credential table the fixture was configured with. "none" probes get
//! the customary failure that lists "password" as the method to
//! continue with, and any other method (publickey, keyboard-interactive
//! and friends) is parsed and rejected the same way rather than
//! treated as a protocol error.
//!
//! Password comparison is constant time even for test credentials;
//! cheap to do and it keeps the wire behavior indistinguishable from a
//! real server's.
//!
//! # Example
//!
//! ```rust
//! use sftpmock_proto::ssh::auth::{AuthMethod, AuthRequest};
//!
//! let request = AuthRequest::new(
//!     "user",
//!     "ssh-connection",
//!     AuthMethod::Password("pwd".to_string()),
//! );
//! let parsed = AuthRequest::from_bytes(&request.to_bytes()).unwrap();
//! assert_eq!(parsed.user_name(), "user");
//! ```

use bytes::{BufMut, BytesMut};
use sftpmock_platform::{SftpMockError, SftpMockResult};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// An authentication method carried in a USERAUTH_REQUEST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// The "none" probe clients use to discover available methods.
    None,
    /// Password authentication with the plaintext password.
    Password(String),
    /// Any method the server does not support, kept by name so the
    /// request still parses and can be declined.
    Other(String),
}

impl AuthMethod {
    /// Returns the method name as it appears on the wire.
    pub fn name(&self) -> &str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::Password(_) => "password",
            AuthMethod::Other(name) => name,
        }
    }
}

impl Drop for AuthMethod {
    fn drop(&mut self) {
        if let AuthMethod::Password(ref mut password) = self {
            password.zeroize();
        }
    }
}

/// SSH_MSG_USERAUTH_REQUEST message (RFC 4252 Section 5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    user_name: String,
    service_name: String,
    method: AuthMethod,
}

impl AuthRequest {
    /// Creates an authentication request.
    pub fn new(user_name: &str, service_name: &str, method: AuthMethod) -> Self {
        Self {
            user_name: user_name.to_string(),
            service_name: service_name.to_string(),
            method,
        }
    }

    /// Returns the user name.
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Returns the requested service, normally "ssh-connection".
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Returns the authentication method.
    pub fn method(&self) -> &AuthMethod {
        &self.method
    }

    /// Serializes the message payload.
    ///
    /// Wire layout (RFC 4252 Section 5, password fields per Section 8):
    ///
    /// ```text
    /// byte      SSH_MSG_USERAUTH_REQUEST (50)
    /// string    user name
    /// string    service name
    /// string    method name
    /// ....      method specific fields
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(50);
        write_string(&mut buf, &self.user_name);
        write_string(&mut buf, &self.service_name);
        write_string(&mut buf, self.method.name());

        match &self.method {
            AuthMethod::None | AuthMethod::Other(_) => {}
            AuthMethod::Password(password) => {
                // boolean FALSE: not a password change request
                buf.put_u8(0);
                write_string(&mut buf, password);
            }
        }

        buf.to_vec()
    }

    /// Parses a USERAUTH_REQUEST payload.
    ///
    /// Unsupported method names parse into [`AuthMethod::Other`]; their
    /// method-specific fields are left unread since the request will be
    /// declined anyway.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] on a wrong message number or
    /// truncated fields.
    pub fn from_bytes(data: &[u8]) -> SftpMockResult<Self> {
        if data.is_empty() {
            return Err(SftpMockError::Protocol(
                "USERAUTH_REQUEST message is empty".to_string(),
            ));
        }
        if data[0] != 50 {
            return Err(SftpMockError::Protocol(format!(
                "expected SSH_MSG_USERAUTH_REQUEST (50), got {}",
                data[0]
            )));
        }

        let mut offset = 1;
        let user_name = read_string(data, &mut offset)?;
        let service_name = read_string(data, &mut offset)?;
        let method_name = read_string(data, &mut offset)?;

        let method = match method_name.as_str() {
            "none" => AuthMethod::None,
            "password" => {
                if offset >= data.len() {
                    return Err(SftpMockError::Protocol(
                        "USERAUTH_REQUEST truncated before password change flag".to_string(),
                    ));
                }
                let _changing = data[offset] != 0;
                offset += 1;

                let password = read_string(data, &mut offset)?;
                AuthMethod::Password(password)
            }
            _ => AuthMethod::Other(method_name),
        };

        Ok(Self {
            user_name,
            service_name,
            method,
        })
    }
}

/// SSH_MSG_USERAUTH_FAILURE message (RFC 4252 Section 5.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFailure {
    methods_can_continue: Vec<String>,
    partial_success: bool,
}

impl AuthFailure {
    /// Creates a failure listing the methods that can continue.
    pub fn new(methods: Vec<String>, partial_success: bool) -> Self {
        Self {
            methods_can_continue: methods,
            partial_success,
        }
    }

    /// The failure the mock server always sends: password only, no
    /// partial success.
    pub fn password_only() -> Self {
        Self::new(vec!["password".to_string()], false)
    }

    /// Returns the methods that can continue.
    pub fn methods_can_continue(&self) -> &[String] {
        &self.methods_can_continue
    }

    /// Returns the partial success flag.
    pub fn partial_success(&self) -> bool {
        self.partial_success
    }

    /// Serializes the message payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(51);
        write_string(&mut buf, &self.methods_can_continue.join(","));
        buf.put_u8(u8::from(self.partial_success));

        buf.to_vec()
    }

    /// Parses a USERAUTH_FAILURE payload.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] on a wrong message number or
    /// truncated fields.
    pub fn from_bytes(data: &[u8]) -> SftpMockResult<Self> {
        if data.is_empty() || data[0] != 51 {
            return Err(SftpMockError::Protocol(
                "invalid USERAUTH_FAILURE message".to_string(),
            ));
        }

        let mut offset = 1;
        let methods_str = read_string(data, &mut offset)?;
        let methods_can_continue: Vec<String> = if methods_str.is_empty() {
            vec![]
        } else {
            methods_str.split(',').map(String::from).collect()
        };

        if offset >= data.len() {
            return Err(SftpMockError::Protocol(
                "USERAUTH_FAILURE truncated before partial success flag".to_string(),
            ));
        }
        let partial_success = data[offset] != 0;

        Ok(Self {
            methods_can_continue,
            partial_success,
        })
    }
}

/// SSH_MSG_USERAUTH_SUCCESS message (RFC 4252 Section 5.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuthSuccess;

impl AuthSuccess {
    /// Creates the message.
    pub fn new() -> Self {
        Self
    }

    /// Serializes to its single-byte payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        vec![52]
    }

    /// Parses a USERAUTH_SUCCESS payload.
    ///
    /// # Errors
    ///
    /// Returns [`SftpMockError::Protocol`] if empty or mistyped.
    pub fn from_bytes(data: &[u8]) -> SftpMockResult<Self> {
        if data.is_empty() || data[0] != 52 {
            return Err(SftpMockError::Protocol(
                "invalid USERAUTH_SUCCESS message".to_string(),
            ));
        }
        Ok(Self)
    }
}

/// Compares two credentials in constant time.
///
/// Both inputs are hashed first so the comparison length is fixed
/// regardless of the input lengths.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    let hash_a = Sha256::digest(a.as_bytes());
    let hash_b = Sha256::digest(b.as_bytes());
    hash_a.ct_eq(&hash_b).into()
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
    if *offset + 4 > data.len() {
        return Err(SftpMockError::Protocol(format!(
            "cannot read string length at offset {}",
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
            "string truncated: {} bytes declared at offset {}",
            length, offset
        )));
    }

    let bytes = data[*offset..*offset + length].to_vec();
    *offset += length;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_request_round_trip() {
        let original = AuthRequest::new(
            "user",
            "ssh-connection",
            AuthMethod::Password("pwd".to_string()),
        );
        let parsed = AuthRequest::from_bytes(&original.to_bytes()).unwrap();

        assert_eq!(parsed.user_name(), "user");
        assert_eq!(parsed.service_name(), "ssh-connection");
        assert_eq!(parsed.method(), &AuthMethod::Password("pwd".to_string()));
    }

    #[test]
    fn test_none_request_round_trip() {
        let original = AuthRequest::new("probe", "ssh-connection", AuthMethod::None);
        let parsed = AuthRequest::from_bytes(&original.to_bytes()).unwrap();
        assert_eq!(parsed.method(), &AuthMethod::None);
    }

    #[test]
    fn test_unknown_method_parses_as_other() {
        let mut buf = BytesMut::new();
        buf.put_u8(50);
        write_string(&mut buf, "alice");
        write_string(&mut buf, "ssh-connection");
        write_string(&mut buf, "publickey");
        // Method-specific fields are ignored for unsupported methods
        buf.put_u8(0);

        let parsed = AuthRequest::from_bytes(&buf).unwrap();
        assert_eq!(
            parsed.method(),
            &AuthMethod::Other("publickey".to_string())
        );
        assert_eq!(parsed.method().name(), "publickey");
    }

    #[test]
    fn test_request_wrong_type() {
        assert!(AuthRequest::from_bytes(&[51, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_request_truncated_password() {
        let mut buf = BytesMut::new();
        buf.put_u8(50);
        write_string(&mut buf, "user");
        write_string(&mut buf, "ssh-connection");
        write_string(&mut buf, "password");
        // Missing change flag and password string
        assert!(AuthRequest::from_bytes(&buf).is_err());
    }

    #[test]
    fn test_failure_round_trip() {
        let original = AuthFailure::password_only();
        let parsed = AuthFailure::from_bytes(&original.to_bytes()).unwrap();

        assert_eq!(parsed.methods_can_continue(), ["password"]);
        assert!(!parsed.partial_success());
    }

    #[test]
    fn test_success_round_trip() {
        let bytes = AuthSuccess::new().to_bytes();
        assert_eq!(bytes, vec![52]);
        assert!(AuthSuccess::from_bytes(&bytes).is_ok());
        assert!(AuthSuccess::from_bytes(&[51]).is_err());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("pwd", "pwd"));
        assert!(!constant_time_compare("pwd", "Pwd"));
        assert!(!constant_time_compare("pwd", "pwd "));
        assert!(constant_time_compare("", ""));
    }
}
