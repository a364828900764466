//! SSH server accept loop and per-connection session driver.
//!
//! [`SshServer`] owns the TCP listener and hands each accepted connection to
//! an [`SshSession`], which drives the full lifecycle:
//!
//! 1. Version exchange ("SSH-2.0-SftpMock_x.y.z")
//! 2. Key exchange (curve25519-sha256, ssh-ed25519 host key)
//! 3. Password authentication against the configured callback
//! 4. Channel loop serving the "sftp" subsystem
//!
//! # Wire Framing After NEWKEYS
//!
//! Once keys are installed, the 4-byte packet length stays cleartext on the
//! wire, authenticated as associated data, and the remainder of each packet
//! is sealed with AES-128-GCM, the 16-byte tag appended after the
//! ciphertext (RFC 5647):
//!
//! ```text
//! uint32    packet_length (cleartext, authenticated as AAD)
//! byte[n]   ciphertext (padding_length || payload || padding)
//! byte[16]  authentication tag
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sftpmock_proto::ssh::server::SshServer;
//!
//! # async fn example() -> sftpmock_platform::SftpMockResult<()> {
//! let mut server = SshServer::bind("127.0.0.1:0").await?;
//! server.set_auth_callback(Arc::new(|user, password| {
//!     user == "user" && password == "pwd"
//! }));
//! let port = server.local_addr()?.port();
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::sftp::SftpSubsystem;
use crate::ssh::auth::{AuthFailure, AuthMethod, AuthRequest, AuthSuccess};
use crate::ssh::connection::{
    ChannelClose, ChannelData, ChannelEof, ChannelFailure, ChannelOpen, ChannelOpenConfirmation,
    ChannelOpenFailure, ChannelOpenFailureReason, ChannelRequest, ChannelRequestType,
    ChannelSuccess, ChannelType, ChannelWindowAdjust, MAX_CHANNEL_PACKET_SIZE, MAX_WINDOW_SIZE,
};
use crate::ssh::crypto::{DecryptionKey, EncryptionKey, IV_SIZE, KEY_SIZE, TAG_SIZE};
use crate::ssh::hostkey::Ed25519HostKey;
use crate::ssh::kex::{negotiate_algorithm, KexInit, NewKeys};
use crate::ssh::kex_dh::{derive_key, encode_mpint, Curve25519Exchange};
use crate::ssh::message::MessageType;
use crate::ssh::packet::{Packet, MAX_PACKET_SIZE};
use crate::ssh::transport::{SessionKeys, State, TransportState};
use crate::ssh::version::{Version, MAX_VERSION_LENGTH};
use crate::vfs::Store;
use sftpmock_platform::{SftpMockError, SftpMockResult};

/// Credential check invoked for each password authentication attempt.
///
/// Receives the user name and the cleartext password, returns whether the
/// pair is accepted.
pub type AuthCallback = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct SshServerConfig {
    /// Version string sent during the version exchange.
    pub server_version: Version,

    /// Authentication attempts allowed before the connection is dropped.
    pub max_auth_attempts: u32,

    /// Timeout applied to each packet read.
    pub read_timeout: Duration,
}

impl Default for SshServerConfig {
    fn default() -> Self {
        Self {
            server_version: Version::default_mock(),
            max_auth_attempts: 3,
            read_timeout: Duration::from_secs(60),
        }
    }
}

/// Listening SSH server.
///
/// Binds a TCP listener, generates a fresh Ed25519 host key, and accepts
/// connections into [`SshSession`]s.
pub struct SshServer {
    listener: TcpListener,
    config: SshServerConfig,
    host_key: Arc<Ed25519HostKey>,
    auth_callback: AuthCallback,
}

impl SshServer {
    /// Binds to the given address with the default configuration.
    ///
    /// Pass port 0 to let the OS pick an ephemeral port; recover it through
    /// [`SshServer::local_addr`]. The default callback rejects everyone, so
    /// call [`SshServer::set_auth_callback`] before accepting.
    pub async fn bind(addr: &str) -> SftpMockResult<Self> {
        Self::bind_with_config(addr, SshServerConfig::default()).await
    }

    /// Binds to the given address with an explicit configuration.
    pub async fn bind_with_config(addr: &str, config: SshServerConfig) -> SftpMockResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "SSH server listening");
        Ok(Self {
            listener,
            config,
            host_key: Arc::new(Ed25519HostKey::generate()),
            auth_callback: Arc::new(|_, _| false),
        })
    }

    /// Replaces the credential check.
    pub fn set_auth_callback(&mut self, callback: AuthCallback) {
        self.auth_callback = callback;
    }

    /// Returns the bound local address.
    pub fn local_addr(&self) -> SftpMockResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts one connection and wraps it in a session.
    ///
    /// The returned session has performed no I/O yet; drive it with
    /// [`SshSession::handshake`], [`SshSession::authenticate`], and
    /// [`SshSession::serve`].
    pub async fn accept(&self) -> SftpMockResult<SshSession> {
        let (stream, peer_addr) = self.listener.accept().await?;
        debug!(%peer_addr, "connection accepted");
        Ok(SshSession::new(
            stream,
            peer_addr,
            self.config.clone(),
            Arc::clone(&self.host_key),
            Arc::clone(&self.auth_callback),
        ))
    }
}

impl std::fmt::Debug for SshServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshServer")
            .field("listener", &self.listener)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// One accepted connection.
///
/// Holds the transport state machine plus the handshake material needed for
/// the exchange hash.
pub struct SshSession {
    stream: TcpStream,
    peer_addr: SocketAddr,
    config: SshServerConfig,
    host_key: Arc<Ed25519HostKey>,
    auth_callback: AuthCallback,
    transport: TransportState,

    /// Client version line without the CRLF, kept for the exchange hash.
    client_version: Option<String>,
    server_version: String,
    client_kexinit_payload: Option<Vec<u8>>,
    server_kexinit_payload: Option<Vec<u8>>,
    session_id: Option<Vec<u8>>,
    authenticated_user: Option<String>,
}

impl SshSession {
    fn new(
        stream: TcpStream,
        peer_addr: SocketAddr,
        config: SshServerConfig,
        host_key: Arc<Ed25519HostKey>,
        auth_callback: AuthCallback,
    ) -> Self {
        let server_version = config.server_version.to_string();
        Self {
            stream,
            peer_addr,
            config,
            host_key,
            auth_callback,
            transport: TransportState::new(),
            client_version: None,
            server_version,
            client_kexinit_payload: None,
            server_kexinit_payload: None,
            session_id: None,
            authenticated_user: None,
        }
    }

    /// Returns the peer address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Returns the authenticated user name, if authentication has succeeded.
    pub fn authenticated_user(&self) -> Option<&str> {
        self.authenticated_user.as_deref()
    }

    /// Runs the version exchange and key exchange.
    ///
    /// On return the transport is in the Encrypted state and all further
    /// packets are sealed.
    pub async fn handshake(&mut self) -> SftpMockResult<()> {
        self.version_exchange().await?;
        self.key_exchange().await?;
        Ok(())
    }

    async fn version_exchange(&mut self) -> SftpMockResult<()> {
        let wire = self.config.server_version.to_wire_format();
        self.stream.write_all(&wire).await?;
        self.stream.flush().await?;

        // Read the client's version line byte by byte until LF. The line
        // cap matches the identification string limit from RFC 4253.
        let mut line = Vec::with_capacity(64);
        loop {
            let byte = self.stream.read_u8().await?;
            if byte == b'\n' {
                break;
            }
            line.push(byte);
            if line.len() > MAX_VERSION_LENGTH {
                return Err(SftpMockError::Protocol(
                    "client version line too long".to_string(),
                ));
            }
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        let text = String::from_utf8(line)
            .map_err(|_| SftpMockError::Protocol("client version is not UTF-8".to_string()))?;
        let version = Version::parse(&text)?;
        debug!(peer_addr = %self.peer_addr, client_version = %text, "version exchange complete");

        self.client_version = Some(text);
        self.transport.set_peer_version(version);
        self.transport.transition(State::KexInit)?;
        Ok(())
    }

    async fn key_exchange(&mut self) -> SftpMockResult<()> {
        // Our KEXINIT first; the exchange hash needs both raw payloads.
        let server_kexinit = KexInit::new_default();
        let server_payload = server_kexinit.to_bytes();
        self.send_packet(server_payload.clone()).await?;
        self.server_kexinit_payload = Some(server_payload);

        let packet = self.receive_packet().await?;
        let payload = packet.payload();
        if payload.first() != Some(&(MessageType::KexInit as u8)) {
            return Err(SftpMockError::Protocol(format!(
                "expected KEXINIT, got message type {:?}",
                payload.first()
            )));
        }
        let client_kexinit = KexInit::from_bytes(payload)?;
        self.client_kexinit_payload = Some(payload.to_vec());

        let kex_alg = negotiate_algorithm(
            client_kexinit.kex_algorithms(),
            server_kexinit.kex_algorithms(),
        )?;
        let hostkey_alg = negotiate_algorithm(
            client_kexinit.server_host_key_algorithms(),
            server_kexinit.server_host_key_algorithms(),
        )?;
        let cipher_alg = negotiate_algorithm(
            client_kexinit.encryption_algorithms_client_to_server(),
            server_kexinit.encryption_algorithms_client_to_server(),
        )?;
        debug!(%kex_alg, %hostkey_alg, %cipher_alg, "algorithms negotiated");
        self.transport.set_peer_kex_init(client_kexinit);
        self.transport.transition(State::KeyExchange)?;

        self.perform_curve25519_kex().await?;
        self.transport.transition(State::NewKeys)?;

        // Client NEWKEYS, then ours. Keys activate after our NEWKEYS is on
        // the wire.
        let packet = self.receive_packet().await?;
        NewKeys::from_bytes(packet.payload())?;
        self.send_packet(NewKeys::new().to_bytes()).await?;

        self.transport.transition(State::Encrypted)?;
        debug!(peer_addr = %self.peer_addr, "key exchange complete, transport encrypted");
        Ok(())
    }

    async fn perform_curve25519_kex(&mut self) -> SftpMockResult<()> {
        let packet = self.receive_packet().await?;
        let payload = packet.payload();
        if payload.first() != Some(&(MessageType::KexdhInit as u8)) {
            return Err(SftpMockError::Protocol(format!(
                "expected KEXDH_INIT, got message type {:?}",
                payload.first()
            )));
        }
        let client_public_bytes = read_string(payload, &mut 1)?;
        let client_public: [u8; 32] = client_public_bytes.as_slice().try_into().map_err(|_| {
            SftpMockError::Protocol(format!(
                "client ephemeral key must be 32 bytes, got {}",
                client_public_bytes.len()
            ))
        })?;

        let exchange = Curve25519Exchange::new()?;
        let server_public = *exchange.public_key();
        let shared_secret = exchange.compute_shared_secret(&client_public)?;

        let host_key_blob = self.host_key.public_key_bytes();
        let exchange_hash = self.compute_exchange_hash(
            &host_key_blob,
            &client_public,
            &server_public,
            &shared_secret,
        )?;

        // First exchange of the connection, so the hash is the session id.
        let session_id = exchange_hash.clone();
        let signature = self.host_key.sign(&exchange_hash);

        let mut reply = Vec::with_capacity(host_key_blob.len() + signature.len() + 64);
        reply.push(MessageType::KexdhReply as u8);
        write_string(&mut reply, &host_key_blob);
        write_string(&mut reply, &server_public);
        write_string(&mut reply, &signature);
        self.send_packet(reply).await?;

        // RFC 4253 section 7.2 letters: IVs 'A' (c2s) / 'B' (s2c), cipher
        // keys 'C' (c2s) / 'D' (s2c).
        let encryption_key = EncryptionKey::new(
            &derive_key(&shared_secret, &exchange_hash, &session_id, b'D', KEY_SIZE),
            &derive_key(&shared_secret, &exchange_hash, &session_id, b'B', IV_SIZE),
        )?;
        let decryption_key = DecryptionKey::new(
            &derive_key(&shared_secret, &exchange_hash, &session_id, b'C', KEY_SIZE),
            &derive_key(&shared_secret, &exchange_hash, &session_id, b'A', IV_SIZE),
        )?;
        self.transport.install_keys(SessionKeys {
            encryption_key,
            decryption_key,
        });
        self.session_id = Some(session_id);
        Ok(())
    }

    /// Exchange hash per RFC 4253 section 8, hashed with SHA-256:
    ///
    /// ```text
    /// H = HASH(V_C || V_S || I_C || I_S || K_S || Q_C || Q_S || K)
    /// ```
    fn compute_exchange_hash(
        &self,
        host_key_blob: &[u8],
        client_public: &[u8; 32],
        server_public: &[u8; 32],
        shared_secret: &[u8],
    ) -> SftpMockResult<Vec<u8>> {
        let client_version = self
            .client_version
            .as_deref()
            .ok_or_else(|| SftpMockError::Protocol("missing client version".to_string()))?;
        let client_kexinit = self
            .client_kexinit_payload
            .as_deref()
            .ok_or_else(|| SftpMockError::Protocol("missing client KEXINIT".to_string()))?;
        let server_kexinit = self
            .server_kexinit_payload
            .as_deref()
            .ok_or_else(|| SftpMockError::Protocol("missing server KEXINIT".to_string()))?;

        let mut hasher = Sha256::new();
        let mut hash_string = |data: &[u8]| {
            hasher.update((data.len() as u32).to_be_bytes());
            hasher.update(data);
        };
        hash_string(client_version.as_bytes());
        hash_string(self.server_version.as_bytes());
        hash_string(client_kexinit);
        hash_string(server_kexinit);
        hash_string(host_key_blob);
        hash_string(client_public);
        hash_string(server_public);
        hasher.update(encode_mpint(shared_secret));
        Ok(hasher.finalize().to_vec())
    }

    /// Runs the RFC 4252 authentication exchange.
    ///
    /// Only the "password" method is accepted; "none" and any method we do
    /// not recognize get a USERAUTH_FAILURE naming "password". The
    /// connection is dropped after `max_auth_attempts` rejections.
    pub async fn authenticate(&mut self) -> SftpMockResult<()> {
        let mut attempts = 0u32;
        loop {
            let packet = self.receive_packet().await?;
            let payload = packet.payload();
            let msg_type = message_type(payload)?;

            match msg_type {
                MessageType::ServiceRequest => {
                    let service = read_string(payload, &mut 1)?;
                    if service != b"ssh-userauth" {
                        return Err(SftpMockError::Protocol(format!(
                            "unsupported service: {}",
                            String::from_utf8_lossy(&service)
                        )));
                    }
                    let mut accept = vec![MessageType::ServiceAccept as u8];
                    write_string(&mut accept, b"ssh-userauth");
                    self.send_packet(accept).await?;
                }
                MessageType::UserauthRequest => {
                    let request = AuthRequest::from_bytes(payload)?;
                    attempts += 1;

                    let accepted = match request.method() {
                        AuthMethod::Password(password) => {
                            (self.auth_callback)(request.user_name(), password)
                        }
                        AuthMethod::None | AuthMethod::Other(_) => false,
                    };

                    if accepted {
                        info!(user = request.user_name(), "authentication succeeded");
                        self.send_packet(AuthSuccess::new().to_bytes()).await?;
                        self.authenticated_user = Some(request.user_name().to_string());
                        return Ok(());
                    }

                    warn!(
                        user = request.user_name(),
                        method = request.method().name(),
                        attempts,
                        "authentication failed"
                    );
                    self.send_packet(AuthFailure::password_only().to_bytes())
                        .await?;
                    if attempts >= self.config.max_auth_attempts {
                        return Err(SftpMockError::Auth(format!(
                            "too many authentication attempts ({})",
                            attempts
                        )));
                    }
                }
                MessageType::Ignore | MessageType::Debug => {}
                MessageType::Disconnect => {
                    return Err(SftpMockError::Protocol(
                        "client disconnected during authentication".to_string(),
                    ));
                }
                other => {
                    return Err(SftpMockError::Protocol(format!(
                        "unexpected message during authentication: {}",
                        other
                    )));
                }
            }
        }
    }

    /// Runs the channel loop until the client closes or disconnects.
    ///
    /// A single session channel is allowed; the "sftp" subsystem request
    /// attaches an [`SftpSubsystem`] over the shared store, and incoming
    /// CHANNEL_DATA is pumped through it.
    pub async fn serve(&mut self, store: Arc<Mutex<Store>>) -> SftpMockResult<()> {
        // Client-side channel id, set once a session channel is open.
        let mut client_channel: Option<u32> = None;
        let mut subsystem: Option<SftpSubsystem> = None;

        loop {
            let packet = match self.receive_packet().await {
                Ok(packet) => packet,
                // An EOF from the peer after the channel finished is a
                // normal teardown, not an error worth surfacing.
                Err(SftpMockError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            let payload = packet.payload();
            let msg_type = message_type(payload)?;

            match msg_type {
                MessageType::ChannelOpen => {
                    let open = ChannelOpen::from_bytes(payload)?;
                    match open.channel_type() {
                        ChannelType::Session if client_channel.is_none() => {
                            debug!(
                                sender_channel = open.sender_channel(),
                                "session channel opened"
                            );
                            client_channel = Some(open.sender_channel());
                            let confirm = ChannelOpenConfirmation::new(
                                open.sender_channel(),
                                0,
                                MAX_WINDOW_SIZE,
                                MAX_CHANNEL_PACKET_SIZE,
                            );
                            self.send_packet(confirm.to_bytes()).await?;
                        }
                        ChannelType::Session => {
                            let failure = ChannelOpenFailure::new(
                                open.sender_channel(),
                                ChannelOpenFailureReason::ResourceShortage,
                            );
                            self.send_packet(failure.to_bytes()).await?;
                        }
                        ChannelType::Other(name) => {
                            debug!(channel_type = %name, "rejecting channel open");
                            let failure = ChannelOpenFailure::new(
                                open.sender_channel(),
                                ChannelOpenFailureReason::UnknownChannelType,
                            );
                            self.send_packet(failure.to_bytes()).await?;
                        }
                    }
                }
                MessageType::ChannelRequest => {
                    let request = ChannelRequest::from_bytes(payload)?;
                    let Some(channel) = client_channel else {
                        return Err(SftpMockError::Protocol(
                            "channel request before channel open".to_string(),
                        ));
                    };
                    match request.request_type() {
                        ChannelRequestType::Subsystem(name) if name == "sftp" => {
                            debug!("sftp subsystem started");
                            subsystem = Some(SftpSubsystem::new(Arc::clone(&store)));
                            if request.want_reply() {
                                self.send_packet(ChannelSuccess::new(channel).to_bytes())
                                    .await?;
                            }
                        }
                        other => {
                            debug!(request_type = other.name(), "rejecting channel request");
                            if request.want_reply() {
                                self.send_packet(ChannelFailure::new(channel).to_bytes())
                                    .await?;
                            }
                        }
                    }
                }
                MessageType::ChannelData => {
                    let data = ChannelData::from_bytes(payload)?;
                    let Some(channel) = client_channel else {
                        return Err(SftpMockError::Protocol(
                            "channel data before channel open".to_string(),
                        ));
                    };
                    let Some(subsystem) = subsystem.as_mut() else {
                        return Err(SftpMockError::Protocol(
                            "channel data before subsystem request".to_string(),
                        ));
                    };
                    let responses = subsystem.handle_input(data.data()).await?;
                    for response in responses {
                        let reply = ChannelData::new(channel, response);
                        self.send_packet(reply.to_bytes()).await?;
                    }
                }
                MessageType::ChannelWindowAdjust => {
                    // Replies are small enough that flow control never binds.
                    let adjust = ChannelWindowAdjust::from_bytes(payload)?;
                    debug!(bytes_to_add = adjust.bytes_to_add(), "window adjust");
                }
                MessageType::ChannelEof => {
                    let eof = ChannelEof::from_bytes(payload)?;
                    if let Some(channel) = client_channel {
                        debug!(recipient_channel = eof.recipient_channel(), "channel EOF");
                        self.send_packet(ChannelEof::new(channel).to_bytes())
                            .await?;
                    }
                }
                MessageType::ChannelClose => {
                    ChannelClose::from_bytes(payload)?;
                    if let Some(channel) = client_channel.take() {
                        self.send_packet(ChannelClose::new(channel).to_bytes())
                            .await?;
                    }
                    subsystem = None;
                    debug!("channel closed");
                }
                MessageType::GlobalRequest => {
                    // No global requests supported. want_reply sits after the
                    // request name string.
                    let mut offset = 1usize;
                    let _name = read_string(payload, &mut offset)?;
                    let want_reply = payload.get(offset).copied().unwrap_or(0) != 0;
                    if want_reply {
                        self.send_packet(vec![MessageType::RequestFailure as u8])
                            .await?;
                    }
                }
                MessageType::Disconnect => {
                    debug!(peer_addr = %self.peer_addr, "client disconnected");
                    return Ok(());
                }
                MessageType::Ignore | MessageType::Debug => {}
                other => {
                    return Err(SftpMockError::Protocol(format!(
                        "unexpected message in channel loop: {}",
                        other
                    )));
                }
            }
        }
    }

    /// Frames and sends one packet, sealing it when the transport is
    /// encrypted.
    async fn send_packet(&mut self, payload: Vec<u8>) -> SftpMockResult<()> {
        if self.transport.is_encrypted() {
            let bytes = Packet::new_aead(payload)?.to_bytes();
            let keys = self
                .transport
                .keys_mut()
                .ok_or_else(|| SftpMockError::Protocol("encryption keys missing".to_string()))?;
            // Length stays cleartext but is authenticated as AAD;
            // everything after it is sealed and the tag lands at the end.
            let length_field: [u8; 4] = bytes[..4]
                .try_into()
                .map_err(|_| SftpMockError::Protocol("malformed packet header".to_string()))?;
            let mut ciphertext = bytes[4..].to_vec();
            keys.encryption_key.encrypt(length_field, &mut ciphertext)?;
            self.stream.write_all(&length_field).await?;
            self.stream.write_all(&ciphertext).await?;
        } else {
            let bytes = Packet::new(payload)?.to_bytes();
            self.stream.write_all(&bytes).await?;
        }
        self.stream.flush().await?;
        Ok(())
    }

    /// Reads one packet, unsealing it when the transport is encrypted.
    async fn receive_packet(&mut self) -> SftpMockResult<Packet> {
        let read_timeout = self.config.read_timeout;
        let read = self.read_packet_inner();
        match tokio::time::timeout(read_timeout, read).await {
            Ok(result) => result,
            Err(_) => Err(SftpMockError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "packet read timed out",
            ))),
        }
    }

    async fn read_packet_inner(&mut self) -> SftpMockResult<Packet> {
        let mut len_bytes = [0u8; 4];
        self.stream.read_exact(&mut len_bytes).await?;
        let packet_length = u32::from_be_bytes(len_bytes) as usize;
        if packet_length == 0 || packet_length > MAX_PACKET_SIZE {
            return Err(SftpMockError::Protocol(format!(
                "invalid packet length: {}",
                packet_length
            )));
        }

        let body_len = if self.transport.is_encrypted() {
            packet_length + TAG_SIZE
        } else {
            packet_length
        };
        let mut body = vec![0u8; body_len];
        self.stream.read_exact(&mut body).await?;

        if self.transport.is_encrypted() {
            let keys = self
                .transport
                .keys_mut()
                .ok_or_else(|| SftpMockError::Protocol("decryption keys missing".to_string()))?;
            keys.decryption_key.decrypt(len_bytes, &mut body)?;
        }

        let mut full = Vec::with_capacity(4 + body.len());
        full.extend_from_slice(&len_bytes);
        full.extend_from_slice(&body);
        Packet::from_bytes(&full)
    }
}

impl std::fmt::Debug for SshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSession")
            .field("peer_addr", &self.peer_addr)
            .field("state", self.transport.current())
            .field("authenticated_user", &self.authenticated_user)
            .finish_non_exhaustive()
    }
}

fn message_type(payload: &[u8]) -> SftpMockResult<MessageType> {
    let byte = payload
        .first()
        .copied()
        .ok_or_else(|| SftpMockError::Protocol("empty packet payload".to_string()))?;
    MessageType::from_u8(byte)
        .ok_or_else(|| SftpMockError::Protocol(format!("unknown message type: {}", byte)))
}

fn write_string(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
    buf.extend_from_slice(data);
}

fn read_string(data: &[u8], offset: &mut usize) -> SftpMockResult<Vec<u8>> {
    if data.len() < *offset + 4 {
        return Err(SftpMockError::Protocol(
            "truncated string length".to_string(),
        ));
    }
    let len = u32::from_be_bytes([
        data[*offset],
        data[*offset + 1],
        data[*offset + 2],
        data[*offset + 3],
    ]) as usize;
    *offset += 4;
    if data.len() < *offset + len {
        return Err(SftpMockError::Protocol("truncated string data".to_string()));
    }
    let value = data[*offset..*offset + len].to_vec();
    *offset += len;
    Ok(value)
}
