//! In-process mock SFTP server for tests.
//!
//! [`MockSftpServer`] binds a real SSH server on an ephemeral localhost
//! port, serves the SFTP subsystem over an in-memory store, and exposes
//! that store for direct inspection and seeding. Typical test flow:
//!
//! ```rust,no_run
//! use sftpmock_proto::fixture::MockSftpServer;
//!
//! # async fn example() -> sftpmock_platform::SftpMockResult<()> {
//! let server = MockSftpServer::builder()
//!     .user("user", "pwd")
//!     .start()
//!     .await?;
//!
//! // Point the client under test at localhost:server.port(), then
//! // inspect what it uploaded.
//! server.put_file("/seed.txt", b"fixture data").await?;
//! assert!(server.exists_file("/seed.txt").await);
//!
//! server.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! Each connection is handled on its own task; the store is shared across
//! connections and with the inspection API, so content written by a client
//! is immediately visible to assertions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::ssh::server::{SshServer, SshSession};
use crate::vfs::Store;
use sftpmock_platform::{SftpMockError, SftpMockResult};

/// Builder for [`MockSftpServer`].
///
/// Collects the accepted credentials before the server starts. With no
/// users registered every authentication attempt is rejected.
#[derive(Debug, Default)]
pub struct MockSftpServerBuilder {
    users: HashMap<String, String>,
}

impl MockSftpServerBuilder {
    /// Registers a user name / password pair.
    ///
    /// May be called multiple times; a repeated user name replaces the
    /// earlier password.
    pub fn user(mut self, name: &str, password: &str) -> Self {
        self.users.insert(name.to_string(), password.to_string());
        self
    }

    /// Binds an ephemeral port and starts accepting connections.
    pub async fn start(self) -> SftpMockResult<MockSftpServer> {
        let users = Arc::new(self.users);
        let mut server = SshServer::bind("127.0.0.1:0").await?;
        let port = server.local_addr()?.port();

        let callback_users = Arc::clone(&users);
        server.set_auth_callback(Arc::new(move |name, password| {
            callback_users
                .get(name)
                .map(|expected| crate::ssh::auth::constant_time_compare(expected, password))
                .unwrap_or(false)
        }));

        let store = Arc::new(Mutex::new(Store::new()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let accept_store = Arc::clone(&store);
        let accept_task = tokio::spawn(accept_loop(server, accept_store, shutdown_rx));
        info!(port, "mock sftp server started");

        Ok(MockSftpServer {
            port,
            store,
            shutdown: shutdown_tx,
            accept_task,
        })
    }
}

async fn accept_loop(
    server: SshServer,
    store: Arc<Mutex<Store>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut sessions = JoinSet::new();
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = server.accept() => {
                match accepted {
                    Ok(session) => {
                        let store = Arc::clone(&store);
                        sessions.spawn(run_session(session, store));
                    }
                    Err(e) => {
                        // Transient accept failures (fd exhaustion, aborted
                        // handshakes) must not kill the fixture; only the
                        // shutdown signal ends the loop. Back off briefly so
                        // a persistent failure cannot spin hot.
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    }
                }
            }
            // Reap finished sessions so the set does not grow unbounded.
            Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
        }
    }
    // Cancel outstanding sessions; the listener drops here, releasing
    // the port.
    sessions.shutdown().await;
    debug!("accept loop finished");
}

async fn run_session(mut session: SshSession, store: Arc<Mutex<Store>>) {
    let peer_addr = session.peer_addr();
    let result = async {
        session.handshake().await?;
        session.authenticate().await?;
        session.serve(store).await
    }
    .await;

    match result {
        Ok(()) => debug!(%peer_addr, "session finished"),
        // Clients dropping the connection mid-handshake is routine in
        // tests; log it and move on.
        Err(e) => debug!(%peer_addr, error = %e, "session ended with error"),
    }
}

/// Running mock SFTP server.
///
/// The inspection methods operate on the same store the protocol serves,
/// with paths resolved by the store's rules (absolute, implicit parent
/// creation on writes).
#[derive(Debug)]
pub struct MockSftpServer {
    port: u16,
    store: Arc<Mutex<Store>>,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl MockSftpServer {
    /// Returns a builder with no users registered.
    pub fn builder() -> MockSftpServerBuilder {
        MockSftpServerBuilder::default()
    }

    /// Returns the port the server listens on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stops accepting connections, cancels open sessions, and releases
    /// the port.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        let _ = (&mut self.accept_task).await;
        info!(port = self.port, "mock sftp server stopped");
    }

    /// Writes a file into the store, creating missing parents.
    ///
    /// Overwrites an existing file at the path.
    pub async fn put_file(&self, path: &str, content: &[u8]) -> SftpMockResult<()> {
        self.store.lock().await.create_file(path, content.to_vec())
    }

    /// Returns the raw content of the file at `path`.
    pub async fn file_bytes(&self, path: &str) -> SftpMockResult<Vec<u8>> {
        self.store.lock().await.read_file(path)
    }

    /// Returns the content of the file at `path` as UTF-8 text.
    ///
    /// # Errors
    ///
    /// [`SftpMockError::Protocol`] if the content is not valid UTF-8, on
    /// top of the usual lookup errors.
    pub async fn file_content(&self, path: &str) -> SftpMockResult<String> {
        let bytes = self.file_bytes(path).await?;
        String::from_utf8(bytes)
            .map_err(|_| SftpMockError::Protocol(format!("file is not UTF-8: {}", path)))
    }

    /// Returns whether a file exists at `path`.
    pub async fn exists_file(&self, path: &str) -> bool {
        self.store.lock().await.is_file(path)
    }

    /// Returns whether a directory exists at `path`.
    pub async fn exists_dir(&self, path: &str) -> bool {
        self.store.lock().await.is_dir(path)
    }

    /// Creates a directory, with missing parents created implicitly.
    pub async fn create_dir(&self, path: &str) -> SftpMockResult<()> {
        self.store.lock().await.make_dir(path)
    }

    /// Removes the node at `path`. Directories require `recursive` unless
    /// empty; `/` is cleared rather than removed.
    pub async fn remove(&self, path: &str, recursive: bool) -> SftpMockResult<()> {
        self.store.lock().await.remove(path, recursive)
    }

    /// Clears every file and directory, leaving an empty root.
    pub async fn delete_all(&self) -> SftpMockResult<()> {
        self.remove("/", true).await
    }

    /// Lists every path under `path` recursively, in depth-first
    /// lexicographic order.
    ///
    /// A missing path yields an empty list rather than an error, so
    /// assertions on "nothing was uploaded" stay one-liners.
    pub async fn list_all(&self, path: &str) -> Vec<String> {
        let store = self.store.lock().await;
        let mut result = Vec::new();
        let mut pending = match store.list(path) {
            Ok(children) => children,
            Err(_) => return result,
        };
        pending.reverse();
        while let Some(current) = pending.pop() {
            if let Ok(children) = store.list(&current) {
                for child in children.into_iter().rev() {
                    pending.push(child);
                }
            }
            result.push(current);
        }
        result
    }
}

impl Drop for MockSftpServer {
    /// Dropping a running fixture aborts the accept loop; after a
    /// completed [`MockSftpServer::stop`] this is a no-op.
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_assigns_ephemeral_port() {
        let server = MockSftpServer::builder().start().await.unwrap();
        assert_ne!(server.port(), 0);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_two_servers_get_distinct_ports() {
        let a = MockSftpServer::builder().start().await.unwrap();
        let b = MockSftpServer::builder().start().await.unwrap();
        assert_ne!(a.port(), b.port());
        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn test_put_and_read_back() {
        let server = MockSftpServer::builder().start().await.unwrap();
        server.put_file("/dir/greeting.txt", b"Hello world!").await.unwrap();

        assert!(server.exists_file("/dir/greeting.txt").await);
        assert!(server.exists_dir("/dir").await);
        assert_eq!(
            server.file_content("/dir/greeting.txt").await.unwrap(),
            "Hello world!"
        );
        server.stop().await;
    }

    #[tokio::test]
    async fn test_file_content_rejects_binary() {
        let server = MockSftpServer::builder().start().await.unwrap();
        server.put_file("/blob", &[0xff, 0xfe]).await.unwrap();

        assert!(server.file_content("/blob").await.is_err());
        assert_eq!(server.file_bytes("/blob").await.unwrap(), vec![0xff, 0xfe]);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_delete_all_keeps_root() {
        let server = MockSftpServer::builder().start().await.unwrap();
        server.put_file("/a/b.txt", b"x").await.unwrap();
        server.create_dir("/c").await.unwrap();

        server.delete_all().await.unwrap();
        assert!(!server.exists_file("/a/b.txt").await);
        assert!(!server.exists_dir("/c").await);
        assert!(server.exists_dir("/").await);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_list_all_recursive_order() {
        let server = MockSftpServer::builder().start().await.unwrap();
        server.put_file("/a/one.txt", b"1").await.unwrap();
        server.put_file("/a/two.txt", b"2").await.unwrap();
        server.put_file("/b.txt", b"3").await.unwrap();

        let all = server.list_all("/").await;
        assert_eq!(all, vec!["/a", "/a/one.txt", "/a/two.txt", "/b.txt"]);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_list_all_missing_path_is_empty() {
        let server = MockSftpServer::builder().start().await.unwrap();
        assert!(server.list_all("/nope").await.is_empty());
        server.stop().await;
    }

    #[tokio::test]
    async fn test_stop_releases_port() {
        let server = MockSftpServer::builder().start().await.unwrap();
        let port = server.port();
        server.stop().await;

        // The port is free again once stop returns.
        let rebound = tokio::net::TcpListener::bind(("127.0.0.1", port)).await;
        assert!(rebound.is_ok());
    }
}
