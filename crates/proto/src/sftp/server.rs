//! SFTP request dispatcher over the in-memory store.
//!
//! [`SftpSubsystem`] sits on the server side of one "sftp" subsystem
//! channel. Channel data arrives in arbitrary chunk sizes, so incoming
//! bytes go through a reassembly buffer and are cut into SFTP packets by
//! their uint32 length prefix. Each request produces exactly one framed
//! response.
//!
//! Store errors never tear the session down; they are translated to
//! SSH_FXP_STATUS responses via [`status_for`]. Only transport-level
//! problems (oversized or unparseable framing) surface as errors to the
//! channel loop.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::sftp::message::{SftpMessageType, MAX_SFTP_PACKET_SIZE, SFTP_VERSION};
use crate::sftp::types::{status_for, FileAttributes, OpenFlags, StatusCode};
use crate::vfs::{normalize_path, NodeKind, Store};
use sftpmock_platform::{SftpMockError, SftpMockResult};

/// Upper bound on an in-memory file, and therefore on any READ or WRITE
/// offset. A request past it gets SSH_FX_FAILURE; a wire-supplied u64
/// never reaches buffer arithmetic unchecked.
const MAX_FILE_SIZE: u64 = 256 * 1024 * 1024;

/// One open file or directory handle.
///
/// File reads and writes go through the handle's buffer; a writable
/// buffer is committed to the store on CLOSE. Directory handles carry a
/// listing snapshot taken at OPENDIR time.
#[derive(Debug)]
enum HandleState {
    File {
        path: String,
        buffer: Vec<u8>,
        readable: bool,
        writable: bool,
        append: bool,
    },
    Dir {
        entries: Vec<(String, FileAttributes)>,
        exhausted: bool,
    },
}

/// Server side of one SFTP subsystem channel.
///
/// Holds the shared store, the packet reassembly buffer, and the open
/// handle table. One instance per channel; handles are scoped to it.
#[derive(Debug)]
pub struct SftpSubsystem {
    store: Arc<Mutex<Store>>,
    buffer: Vec<u8>,
    handles: HashMap<u32, HandleState>,
    next_handle: u32,
}

impl SftpSubsystem {
    /// Creates a subsystem over the shared store.
    pub fn new(store: Arc<Mutex<Store>>) -> Self {
        Self {
            store,
            buffer: Vec::new(),
            handles: HashMap::new(),
            next_handle: 1,
        }
    }

    /// Feeds channel data in and returns the framed responses it produced.
    ///
    /// A chunk may complete zero, one, or several SFTP packets; incomplete
    /// tails are buffered for the next call.
    ///
    /// # Errors
    ///
    /// [`SftpMockError::Protocol`] if a packet claims a zero or oversized
    /// length. Per-request failures become STATUS responses instead.
    pub async fn handle_input(&mut self, data: &[u8]) -> SftpMockResult<Vec<Vec<u8>>> {
        self.buffer.extend_from_slice(data);

        let mut responses = Vec::new();
        loop {
            if self.buffer.len() < 4 {
                break;
            }
            let length = u32::from_be_bytes([
                self.buffer[0],
                self.buffer[1],
                self.buffer[2],
                self.buffer[3],
            ]) as usize;
            if length == 0 || length > MAX_SFTP_PACKET_SIZE {
                return Err(SftpMockError::Protocol(format!(
                    "invalid sftp packet length: {}",
                    length
                )));
            }
            if self.buffer.len() < 4 + length {
                break;
            }

            let body: Vec<u8> = self.buffer.drain(..4 + length).skip(4).collect();
            let response = self.dispatch(&body).await;
            responses.push(frame(response));
        }
        Ok(responses)
    }

    /// Handles one SFTP packet body and builds its response payload.
    async fn dispatch(&mut self, body: &[u8]) -> Vec<u8> {
        let Some(&type_byte) = body.first() else {
            return status_response(0, StatusCode::BadMessage, "empty packet");
        };

        if type_byte == SftpMessageType::Init as u8 {
            debug!("sftp INIT, replying version {}", SFTP_VERSION);
            let mut response = vec![SftpMessageType::Version as u8];
            response.extend_from_slice(&SFTP_VERSION.to_be_bytes());
            return response;
        }

        // Everything past INIT carries a request id.
        let mut offset = 1usize;
        let Ok(request_id) = read_u32(body, &mut offset) else {
            return status_response(0, StatusCode::BadMessage, "missing request id");
        };

        let Some(msg_type) = SftpMessageType::from_u8(type_byte) else {
            trace!(type_byte, request_id, "unimplemented sftp request");
            return status_response(
                request_id,
                StatusCode::OpUnsupported,
                StatusCode::OpUnsupported.default_message(),
            );
        };
        trace!(%msg_type, request_id, "sftp request");

        let result = match msg_type {
            SftpMessageType::Open => self.handle_open(request_id, body, &mut offset).await,
            SftpMessageType::Close => self.handle_close(request_id, body, &mut offset).await,
            SftpMessageType::Read => self.handle_read(request_id, body, &mut offset),
            SftpMessageType::Write => self.handle_write(request_id, body, &mut offset),
            SftpMessageType::Lstat | SftpMessageType::Stat => {
                self.handle_stat(request_id, body, &mut offset).await
            }
            SftpMessageType::Fstat => self.handle_fstat(request_id, body, &mut offset),
            SftpMessageType::Opendir => self.handle_opendir(request_id, body, &mut offset).await,
            SftpMessageType::Readdir => self.handle_readdir(request_id, body, &mut offset),
            SftpMessageType::Remove => self.handle_remove(request_id, body, &mut offset).await,
            SftpMessageType::Mkdir => self.handle_mkdir(request_id, body, &mut offset).await,
            SftpMessageType::Rmdir => self.handle_rmdir(request_id, body, &mut offset).await,
            SftpMessageType::Realpath => self.handle_realpath(request_id, body, &mut offset).await,
            // Response types arriving from a client are nonsense.
            SftpMessageType::Init
            | SftpMessageType::Version
            | SftpMessageType::Status
            | SftpMessageType::Handle
            | SftpMessageType::Data
            | SftpMessageType::Name
            | SftpMessageType::Attrs => Err(SftpMockError::Protocol(format!(
                "unexpected message from client: {}",
                msg_type
            ))),
        };

        match result {
            Ok(response) => response,
            Err(error) => {
                let code = status_for(&error);
                debug!(request_id, %error, ?code, "sftp request failed");
                status_response(request_id, code, &error.to_string())
            }
        }
    }

    async fn handle_open(
        &mut self,
        request_id: u32,
        body: &[u8],
        offset: &mut usize,
    ) -> SftpMockResult<Vec<u8>> {
        let path = read_path(body, offset)?;
        let flags = OpenFlags::new(read_u32(body, offset)?);
        FileAttributes::from_bytes(body, offset)?;

        let mut store = self.store.lock().await;
        if store.is_dir(&path) {
            return Err(SftpMockError::NotAFile(path));
        }
        let exists = store.is_file(&path);
        if exists && flags.exclusive() {
            return Err(SftpMockError::AlreadyExists(path));
        }
        if !exists && !flags.create() {
            return Err(SftpMockError::NotFound(path));
        }

        // The buffer starts from the existing content unless truncated; a
        // created file appears in the store immediately, empty until CLOSE
        // commits the buffer.
        let buffer = if exists && !flags.truncate() {
            store.read_file(&path)?
        } else {
            store.create_file(&path, Vec::new())?;
            Vec::new()
        };
        drop(store);

        let handle = self.allocate_handle(HandleState::File {
            path,
            buffer,
            readable: flags.read(),
            writable: flags.write() || flags.append(),
            append: flags.append(),
        });
        Ok(handle_response(request_id, handle))
    }

    /// CLOSE commits a writable buffer to the store; read-only and
    /// directory handles are simply dropped.
    async fn handle_close(
        &mut self,
        request_id: u32,
        body: &[u8],
        offset: &mut usize,
    ) -> SftpMockResult<Vec<u8>> {
        let handle = read_handle(body, offset)?;
        match self.handles.remove(&handle) {
            Some(HandleState::File {
                path,
                buffer,
                writable: true,
                ..
            }) => {
                self.store.lock().await.create_file(&path, buffer)?;
            }
            Some(_) => {}
            None => {
                return Err(SftpMockError::Protocol(format!(
                    "unknown handle: {}",
                    handle
                )))
            }
        }
        Ok(ok_response(request_id))
    }

    fn handle_read(
        &mut self,
        request_id: u32,
        body: &[u8],
        offset: &mut usize,
    ) -> SftpMockResult<Vec<u8>> {
        let handle = read_handle(body, offset)?;
        let file_offset = read_u64(body, offset)?;
        let length = read_u32(body, offset)? as usize;

        let (buffer, readable) = match self.handles.get(&handle) {
            Some(HandleState::File {
                buffer, readable, ..
            }) => (buffer, *readable),
            Some(HandleState::Dir { .. }) => {
                return Err(SftpMockError::Protocol(
                    "READ on a directory handle".to_string(),
                ))
            }
            None => {
                return Err(SftpMockError::Protocol(format!(
                    "unknown handle: {}",
                    handle
                )))
            }
        };
        if !readable {
            return Err(SftpMockError::Auth("handle not open for reading".to_string()));
        }

        // Offsets compare as u64 before any cast; a buffer never exceeds
        // MAX_FILE_SIZE, so past this check usize is safe.
        if file_offset >= buffer.len() as u64 {
            return Ok(status_response(
                request_id,
                StatusCode::Eof,
                StatusCode::Eof.default_message(),
            ));
        }
        let start = file_offset as usize;
        let end = buffer.len().min(start.saturating_add(length));
        Ok(data_response(request_id, &buffer[start..end]))
    }

    fn handle_write(
        &mut self,
        request_id: u32,
        body: &[u8],
        offset: &mut usize,
    ) -> SftpMockResult<Vec<u8>> {
        let handle = read_handle(body, offset)?;
        let file_offset = read_u64(body, offset)?;
        let data = read_string(body, offset)?;

        let (buffer, writable, append) = match self.handles.get_mut(&handle) {
            Some(HandleState::File {
                buffer,
                writable,
                append,
                ..
            }) => (buffer, *writable, *append),
            Some(HandleState::Dir { .. }) => {
                return Err(SftpMockError::Protocol(
                    "WRITE on a directory handle".to_string(),
                ))
            }
            None => {
                return Err(SftpMockError::Protocol(format!(
                    "unknown handle: {}",
                    handle
                )))
            }
        };
        if !writable {
            return Err(SftpMockError::Auth("handle not open for writing".to_string()));
        }

        if append {
            if buffer.len() as u64 + data.len() as u64 > MAX_FILE_SIZE {
                return Ok(status_response(
                    request_id,
                    StatusCode::Failure,
                    "write exceeds maximum file size",
                ));
            }
            buffer.extend_from_slice(&data);
        } else {
            // The offset and length come straight off the wire; a huge
            // offset must fail as a STATUS, not blow up the arithmetic
            // or the allocator.
            let end = match file_offset.checked_add(data.len() as u64) {
                Some(end) if end <= MAX_FILE_SIZE => end as usize,
                _ => {
                    return Ok(status_response(
                        request_id,
                        StatusCode::Failure,
                        "write exceeds maximum file size",
                    ))
                }
            };
            let start = file_offset as usize;
            // A write past the current end zero-fills the gap.
            if buffer.len() < end {
                buffer.resize(end, 0);
            }
            buffer[start..end].copy_from_slice(&data);
        }
        Ok(ok_response(request_id))
    }

    async fn handle_stat(
        &mut self,
        request_id: u32,
        body: &[u8],
        offset: &mut usize,
    ) -> SftpMockResult<Vec<u8>> {
        let path = read_path(body, offset)?;
        let kind = self.store.lock().await.stat(&path)?;
        Ok(attrs_response(request_id, &attrs_for(&kind)))
    }

    fn handle_fstat(
        &mut self,
        request_id: u32,
        body: &[u8],
        offset: &mut usize,
    ) -> SftpMockResult<Vec<u8>> {
        let handle = read_handle(body, offset)?;
        match self.handles.get(&handle) {
            Some(HandleState::File { buffer, .. }) => Ok(attrs_response(
                request_id,
                &FileAttributes::file(buffer.len() as u64),
            )),
            Some(HandleState::Dir { .. }) => {
                Ok(attrs_response(request_id, &FileAttributes::directory()))
            }
            None => Err(SftpMockError::Protocol(format!(
                "unknown handle: {}",
                handle
            ))),
        }
    }

    async fn handle_opendir(
        &mut self,
        request_id: u32,
        body: &[u8],
        offset: &mut usize,
    ) -> SftpMockResult<Vec<u8>> {
        let path = read_path(body, offset)?;

        let store = self.store.lock().await;
        if !store.is_dir(&path) {
            return if store.is_file(&path) {
                Err(SftpMockError::NotADirectory(path))
            } else {
                Err(SftpMockError::NotFound(path))
            };
        }
        let mut entries = Vec::new();
        for child in store.list(&path)? {
            let kind = store.stat(&child)?;
            let name = child.rsplit('/').next().unwrap_or(&child).to_string();
            entries.push((name, attrs_for(&kind)));
        }
        drop(store);

        let handle = self.allocate_handle(HandleState::Dir {
            entries,
            exhausted: false,
        });
        Ok(handle_response(request_id, handle))
    }

    fn handle_readdir(
        &mut self,
        request_id: u32,
        body: &[u8],
        offset: &mut usize,
    ) -> SftpMockResult<Vec<u8>> {
        let handle = read_handle(body, offset)?;
        match self.handles.get_mut(&handle) {
            Some(HandleState::Dir { entries, exhausted }) => {
                if *exhausted || entries.is_empty() {
                    return Ok(status_response(
                        request_id,
                        StatusCode::Eof,
                        StatusCode::Eof.default_message(),
                    ));
                }
                *exhausted = true;
                Ok(name_response(request_id, entries))
            }
            Some(HandleState::File { .. }) => Err(SftpMockError::Protocol(
                "READDIR on a file handle".to_string(),
            )),
            None => Err(SftpMockError::Protocol(format!(
                "unknown handle: {}",
                handle
            ))),
        }
    }

    async fn handle_remove(
        &mut self,
        request_id: u32,
        body: &[u8],
        offset: &mut usize,
    ) -> SftpMockResult<Vec<u8>> {
        let path = read_path(body, offset)?;
        let mut store = self.store.lock().await;
        // REMOVE is file-only; RMDIR handles directories.
        if store.is_dir(&path) {
            return Err(SftpMockError::NotAFile(path));
        }
        store.remove(&path, false)?;
        Ok(ok_response(request_id))
    }

    async fn handle_mkdir(
        &mut self,
        request_id: u32,
        body: &[u8],
        offset: &mut usize,
    ) -> SftpMockResult<Vec<u8>> {
        let path = read_path(body, offset)?;
        FileAttributes::from_bytes(body, offset)?;
        self.store.lock().await.make_dir(&path)?;
        Ok(ok_response(request_id))
    }

    async fn handle_rmdir(
        &mut self,
        request_id: u32,
        body: &[u8],
        offset: &mut usize,
    ) -> SftpMockResult<Vec<u8>> {
        let path = read_path(body, offset)?;
        let mut store = self.store.lock().await;
        if store.is_file(&path) {
            return Err(SftpMockError::NotADirectory(path));
        }
        store.remove(&path, false)?;
        Ok(ok_response(request_id))
    }

    async fn handle_realpath(
        &mut self,
        request_id: u32,
        body: &[u8],
        offset: &mut usize,
    ) -> SftpMockResult<Vec<u8>> {
        let raw = read_string(body, offset)?;
        let text = String::from_utf8(raw)
            .map_err(|_| SftpMockError::Protocol("path is not UTF-8".to_string()))?;
        let resolved = normalize_path(&text);

        // REALPATH succeeds for paths that do not exist; attrs are empty
        // in that case.
        let attrs = match self.store.lock().await.stat(&resolved) {
            Ok(kind) => attrs_for(&kind),
            Err(_) => FileAttributes::empty(),
        };
        Ok(name_response(request_id, &[(resolved, attrs)]))
    }

    fn allocate_handle(&mut self, state: HandleState) -> u32 {
        let handle = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1);
        self.handles.insert(handle, state);
        handle
    }
}

fn attrs_for(kind: &NodeKind) -> FileAttributes {
    if kind.is_dir() {
        FileAttributes::directory()
    } else {
        FileAttributes::file(kind.size())
    }
}

/// Prepends the uint32 length to a response payload.
fn frame(payload: Vec<u8>) -> Vec<u8> {
    let mut framed = Vec::with_capacity(4 + payload.len());
    framed.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    framed.extend_from_slice(&payload);
    framed
}

fn status_response(request_id: u32, code: StatusCode, message: &str) -> Vec<u8> {
    let mut buf = vec![SftpMessageType::Status as u8];
    buf.extend_from_slice(&request_id.to_be_bytes());
    buf.extend_from_slice(&(code as u32).to_be_bytes());
    write_string(&mut buf, message.as_bytes());
    write_string(&mut buf, b"en");
    buf
}

fn ok_response(request_id: u32) -> Vec<u8> {
    status_response(request_id, StatusCode::Ok, StatusCode::Ok.default_message())
}

fn handle_response(request_id: u32, handle: u32) -> Vec<u8> {
    let mut buf = vec![SftpMessageType::Handle as u8];
    buf.extend_from_slice(&request_id.to_be_bytes());
    write_string(&mut buf, &handle.to_be_bytes());
    buf
}

fn data_response(request_id: u32, data: &[u8]) -> Vec<u8> {
    let mut buf = vec![SftpMessageType::Data as u8];
    buf.extend_from_slice(&request_id.to_be_bytes());
    write_string(&mut buf, data);
    buf
}

fn attrs_response(request_id: u32, attrs: &FileAttributes) -> Vec<u8> {
    let mut buf = vec![SftpMessageType::Attrs as u8];
    buf.extend_from_slice(&request_id.to_be_bytes());
    buf.extend_from_slice(&attrs.to_bytes());
    buf
}

fn name_response(request_id: u32, entries: &[(String, FileAttributes)]) -> Vec<u8> {
    let mut buf = vec![SftpMessageType::Name as u8];
    buf.extend_from_slice(&request_id.to_be_bytes());
    buf.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for (name, attrs) in entries {
        write_string(&mut buf, name.as_bytes());
        write_string(&mut buf, attrs.longname(name).as_bytes());
        buf.extend_from_slice(&attrs.to_bytes());
    }
    buf
}

fn write_string(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
    buf.extend_from_slice(data);
}

fn read_u32(data: &[u8], offset: &mut usize) -> SftpMockResult<u32> {
    if data.len() < *offset + 4 {
        return Err(SftpMockError::Protocol("truncated uint32".to_string()));
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

fn read_u64(data: &[u8], offset: &mut usize) -> SftpMockResult<u64> {
    if data.len() < *offset + 8 {
        return Err(SftpMockError::Protocol("truncated uint64".to_string()));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[*offset..*offset + 8]);
    *offset += 8;
    Ok(u64::from_be_bytes(bytes))
}

fn read_string(data: &[u8], offset: &mut usize) -> SftpMockResult<Vec<u8>> {
    let len = read_u32(data, offset)? as usize;
    if data.len() < *offset + len {
        return Err(SftpMockError::Protocol("truncated string".to_string()));
    }
    let value = data[*offset..*offset + len].to_vec();
    *offset += len;
    Ok(value)
}

fn read_path(data: &[u8], offset: &mut usize) -> SftpMockResult<String> {
    let raw = read_string(data, offset)?;
    let text = String::from_utf8(raw)
        .map_err(|_| SftpMockError::Protocol("path is not UTF-8".to_string()))?;
    Ok(normalize_path(&text))
}

/// Handles are the 4 big-endian bytes of the handle number.
fn read_handle(data: &[u8], offset: &mut usize) -> SftpMockResult<u32> {
    let raw = read_string(data, offset)?;
    let bytes: [u8; 4] = raw
        .as_slice()
        .try_into()
        .map_err(|_| SftpMockError::Protocol("malformed handle".to_string()))?;
    Ok(u32::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subsystem() -> SftpSubsystem {
        SftpSubsystem::new(Arc::new(Mutex::new(Store::new())))
    }

    fn subsystem_with(store: Store) -> SftpSubsystem {
        SftpSubsystem::new(Arc::new(Mutex::new(store)))
    }

    fn request(type_byte: u8, request_id: u32, rest: &[u8]) -> Vec<u8> {
        let mut body = vec![type_byte];
        body.extend_from_slice(&request_id.to_be_bytes());
        body.extend_from_slice(rest);
        frame(body)
    }

    fn path_request(type_byte: u8, request_id: u32, path: &str) -> Vec<u8> {
        let mut rest = Vec::new();
        write_string(&mut rest, path.as_bytes());
        request(type_byte, request_id, &rest)
    }

    /// Strips the length prefix of a single framed response.
    fn unframe(mut response: Vec<u8>) -> Vec<u8> {
        let length = u32::from_be_bytes([response[0], response[1], response[2], response[3]]);
        let body = response.split_off(4);
        assert_eq!(body.len(), length as usize);
        body
    }

    fn parse_status(body: &[u8]) -> (u32, u32) {
        assert_eq!(body[0], SftpMessageType::Status as u8);
        let request_id = u32::from_be_bytes([body[1], body[2], body[3], body[4]]);
        let code = u32::from_be_bytes([body[5], body[6], body[7], body[8]]);
        (request_id, code)
    }

    fn parse_handle(body: &[u8]) -> Vec<u8> {
        assert_eq!(body[0], SftpMessageType::Handle as u8);
        let mut offset = 5;
        read_string(body, &mut offset).unwrap()
    }

    async fn one_response(subsystem: &mut SftpSubsystem, packet: &[u8]) -> Vec<u8> {
        let mut responses = subsystem.handle_input(packet).await.unwrap();
        assert_eq!(responses.len(), 1);
        unframe(responses.remove(0))
    }

    #[tokio::test]
    async fn test_init_version() {
        let mut subsystem = subsystem();
        let mut packet = vec![SftpMessageType::Init as u8];
        packet.extend_from_slice(&3u32.to_be_bytes());
        let body = one_response(&mut subsystem, &frame(packet)).await;

        assert_eq!(body[0], SftpMessageType::Version as u8);
        assert_eq!(u32::from_be_bytes([body[1], body[2], body[3], body[4]]), 3);
    }

    #[tokio::test]
    async fn test_fragmented_packet_reassembly() {
        let mut subsystem = subsystem();
        let mut packet = vec![SftpMessageType::Init as u8];
        packet.extend_from_slice(&3u32.to_be_bytes());
        let framed = frame(packet);

        // First half yields nothing; second half completes the packet.
        let responses = subsystem.handle_input(&framed[..3]).await.unwrap();
        assert!(responses.is_empty());
        let responses = subsystem.handle_input(&framed[3..]).await.unwrap();
        assert_eq!(responses.len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_packet_rejected() {
        let mut subsystem = subsystem();
        let length = (MAX_SFTP_PACKET_SIZE as u32 + 1).to_be_bytes();
        assert!(subsystem.handle_input(&length).await.is_err());
    }

    #[tokio::test]
    async fn test_open_creates_file() {
        let mut subsystem = subsystem();
        let mut rest = Vec::new();
        write_string(&mut rest, b"/new_file.txt");
        rest.extend_from_slice(&(OpenFlags::WRITE | OpenFlags::CREAT).to_be_bytes());
        rest.extend_from_slice(&FileAttributes::empty().to_bytes());
        let body = one_response(&mut subsystem, &request(3, 7, &rest)).await;

        let handle = parse_handle(&body);
        assert_eq!(handle.len(), 4);
        assert!(subsystem.store.lock().await.is_file("/new_file.txt"));
    }

    #[tokio::test]
    async fn test_open_missing_without_creat() {
        let mut subsystem = subsystem();
        let mut rest = Vec::new();
        write_string(&mut rest, b"/missing.txt");
        rest.extend_from_slice(&OpenFlags::READ.to_be_bytes());
        rest.extend_from_slice(&FileAttributes::empty().to_bytes());
        let body = one_response(&mut subsystem, &request(3, 8, &rest)).await;

        let (request_id, code) = parse_status(&body);
        assert_eq!(request_id, 8);
        assert_eq!(code, StatusCode::NoSuchFile as u32);
    }

    #[tokio::test]
    async fn test_open_excl_on_existing() {
        let mut store = Store::new();
        store.create_file("/f.txt", b"x".to_vec()).unwrap();
        let mut subsystem = subsystem_with(store);

        let mut rest = Vec::new();
        write_string(&mut rest, b"/f.txt");
        rest.extend_from_slice(
            &(OpenFlags::WRITE | OpenFlags::CREAT | OpenFlags::EXCL).to_be_bytes(),
        );
        rest.extend_from_slice(&FileAttributes::empty().to_bytes());
        let body = one_response(&mut subsystem, &request(3, 9, &rest)).await;

        let (_, code) = parse_status(&body);
        assert_eq!(code, StatusCode::Failure as u32);
    }

    #[tokio::test]
    async fn test_write_at_huge_offset_reports_failure() {
        let mut subsystem = subsystem();

        let mut rest = Vec::new();
        write_string(&mut rest, b"/big.bin");
        rest.extend_from_slice(&(OpenFlags::WRITE | OpenFlags::CREAT).to_be_bytes());
        rest.extend_from_slice(&FileAttributes::empty().to_bytes());
        let handle = parse_handle(&one_response(&mut subsystem, &request(3, 1, &rest)).await);

        // Offset u64::MAX: the offset arithmetic must not wrap and the
        // session must answer with a STATUS instead of dying.
        let mut rest = Vec::new();
        write_string(&mut rest, &handle);
        rest.extend_from_slice(&u64::MAX.to_be_bytes());
        write_string(&mut rest, b"x");
        let body = one_response(&mut subsystem, &request(6, 2, &rest)).await;
        assert_eq!(parse_status(&body), (2, StatusCode::Failure as u32));

        // A merely large offset is refused before it can allocate.
        let mut rest = Vec::new();
        write_string(&mut rest, &handle);
        rest.extend_from_slice(&(1u64 << 40).to_be_bytes());
        write_string(&mut rest, b"x");
        let body = one_response(&mut subsystem, &request(6, 3, &rest)).await;
        assert_eq!(parse_status(&body), (3, StatusCode::Failure as u32));

        // The handle stays usable afterwards.
        let mut rest = Vec::new();
        write_string(&mut rest, &handle);
        rest.extend_from_slice(&0u64.to_be_bytes());
        write_string(&mut rest, b"ok");
        let body = one_response(&mut subsystem, &request(6, 4, &rest)).await;
        assert_eq!(parse_status(&body), (4, StatusCode::Ok as u32));
    }

    #[tokio::test]
    async fn test_read_at_huge_offset_reports_eof() {
        let mut store = Store::new();
        store.create_file("/r.bin", b"content".to_vec()).unwrap();
        let mut subsystem = subsystem_with(store);

        let mut rest = Vec::new();
        write_string(&mut rest, b"/r.bin");
        rest.extend_from_slice(&OpenFlags::READ.to_be_bytes());
        rest.extend_from_slice(&FileAttributes::empty().to_bytes());
        let handle = parse_handle(&one_response(&mut subsystem, &request(3, 1, &rest)).await);

        let mut rest = Vec::new();
        write_string(&mut rest, &handle);
        rest.extend_from_slice(&u64::MAX.to_be_bytes());
        rest.extend_from_slice(&16u32.to_be_bytes());
        let body = one_response(&mut subsystem, &request(5, 2, &rest)).await;
        assert_eq!(parse_status(&body), (2, StatusCode::Eof as u32));
    }

    #[tokio::test]
    async fn test_write_then_read_through_handles() {
        let mut subsystem = subsystem();

        // OPEN write+creat
        let mut rest = Vec::new();
        write_string(&mut rest, b"/data.bin");
        rest.extend_from_slice(
            &(OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREAT).to_be_bytes(),
        );
        rest.extend_from_slice(&FileAttributes::empty().to_bytes());
        let handle = parse_handle(&one_response(&mut subsystem, &request(3, 1, &rest)).await);

        // WRITE "Hello world!" at offset 0
        let mut rest = Vec::new();
        write_string(&mut rest, &handle);
        rest.extend_from_slice(&0u64.to_be_bytes());
        write_string(&mut rest, b"Hello world!");
        let body = one_response(&mut subsystem, &request(6, 2, &rest)).await;
        assert_eq!(parse_status(&body), (2, StatusCode::Ok as u32));

        // READ it back
        let mut rest = Vec::new();
        write_string(&mut rest, &handle);
        rest.extend_from_slice(&0u64.to_be_bytes());
        rest.extend_from_slice(&1024u32.to_be_bytes());
        let body = one_response(&mut subsystem, &request(5, 3, &rest)).await;
        assert_eq!(body[0], SftpMessageType::Data as u8);
        let mut offset = 5;
        assert_eq!(read_string(&body, &mut offset).unwrap(), b"Hello world!");

        // READ past the end gives EOF
        let mut rest = Vec::new();
        write_string(&mut rest, &handle);
        rest.extend_from_slice(&100u64.to_be_bytes());
        rest.extend_from_slice(&16u32.to_be_bytes());
        let body = one_response(&mut subsystem, &request(5, 4, &rest)).await;
        assert_eq!(parse_status(&body), (4, StatusCode::Eof as u32));

        // CLOSE
        let mut rest = Vec::new();
        write_string(&mut rest, &handle);
        let body = one_response(&mut subsystem, &request(4, 5, &rest)).await;
        assert_eq!(parse_status(&body), (5, StatusCode::Ok as u32));
    }

    #[tokio::test]
    async fn test_write_zero_fills_gap() {
        let mut subsystem = subsystem();

        let mut rest = Vec::new();
        write_string(&mut rest, b"/gap.bin");
        rest.extend_from_slice(&(OpenFlags::WRITE | OpenFlags::CREAT).to_be_bytes());
        rest.extend_from_slice(&FileAttributes::empty().to_bytes());
        let handle = parse_handle(&one_response(&mut subsystem, &request(3, 1, &rest)).await);

        let mut rest = Vec::new();
        write_string(&mut rest, &handle);
        rest.extend_from_slice(&4u64.to_be_bytes());
        write_string(&mut rest, b"ab");
        one_response(&mut subsystem, &request(6, 2, &rest)).await;

        // Uncommitted until CLOSE.
        assert!(subsystem.store.lock().await.read_file("/gap.bin").unwrap().is_empty());

        let mut rest = Vec::new();
        write_string(&mut rest, &handle);
        one_response(&mut subsystem, &request(4, 3, &rest)).await;

        let content = subsystem.store.lock().await.read_file("/gap.bin").unwrap();
        assert_eq!(content, vec![0, 0, 0, 0, b'a', b'b']);
    }

    #[tokio::test]
    async fn test_stat_file_and_directory() {
        let mut store = Store::new();
        store.create_file("/dir/file.txt", b"12345".to_vec()).unwrap();
        let mut subsystem = subsystem_with(store);

        let body = one_response(&mut subsystem, &path_request(17, 1, "/dir/file.txt")).await;
        assert_eq!(body[0], SftpMessageType::Attrs as u8);
        let mut offset = 5;
        let attrs = FileAttributes::from_bytes(&body, &mut offset).unwrap();
        assert_eq!(attrs.size, Some(5));
        assert!(!attrs.is_dir());

        let body = one_response(&mut subsystem, &path_request(7, 2, "/dir")).await;
        let mut offset = 5;
        let attrs = FileAttributes::from_bytes(&body, &mut offset).unwrap();
        assert!(attrs.is_dir());
    }

    #[tokio::test]
    async fn test_stat_missing() {
        let mut subsystem = subsystem();
        let body = one_response(&mut subsystem, &path_request(17, 3, "/nope")).await;
        assert_eq!(parse_status(&body), (3, StatusCode::NoSuchFile as u32));
    }

    #[tokio::test]
    async fn test_readdir_lists_then_eof() {
        let mut store = Store::new();
        store.create_file("/d/a.txt", b"a".to_vec()).unwrap();
        store.make_dir("/d/sub").unwrap();
        let mut subsystem = subsystem_with(store);

        let handle = parse_handle(&one_response(&mut subsystem, &path_request(11, 1, "/d")).await);

        let mut rest = Vec::new();
        write_string(&mut rest, &handle);
        let body = one_response(&mut subsystem, &request(12, 2, &rest)).await;
        assert_eq!(body[0], SftpMessageType::Name as u8);
        let mut offset = 5;
        let count = read_u32(&body, &mut offset).unwrap();
        assert_eq!(count, 2);
        // Lexicographic: a.txt before sub.
        assert_eq!(read_string(&body, &mut offset).unwrap(), b"a.txt");

        let body = one_response(&mut subsystem, &request(12, 3, &rest)).await;
        assert_eq!(parse_status(&body), (3, StatusCode::Eof as u32));
    }

    #[tokio::test]
    async fn test_opendir_on_file() {
        let mut store = Store::new();
        store.create_file("/f", b"x".to_vec()).unwrap();
        let mut subsystem = subsystem_with(store);

        let body = one_response(&mut subsystem, &path_request(11, 1, "/f")).await;
        assert_eq!(parse_status(&body), (1, StatusCode::Failure as u32));
    }

    #[tokio::test]
    async fn test_remove_file_only() {
        let mut store = Store::new();
        store.create_file("/f", b"x".to_vec()).unwrap();
        store.make_dir("/d").unwrap();
        let mut subsystem = subsystem_with(store);

        let body = one_response(&mut subsystem, &path_request(13, 1, "/f")).await;
        assert_eq!(parse_status(&body), (1, StatusCode::Ok as u32));
        assert!(!subsystem.store.lock().await.exists("/f"));

        let body = one_response(&mut subsystem, &path_request(13, 2, "/d")).await;
        assert_eq!(parse_status(&body), (2, StatusCode::Failure as u32));
    }

    #[tokio::test]
    async fn test_mkdir_and_rmdir() {
        let mut subsystem = subsystem();

        let mut rest = Vec::new();
        write_string(&mut rest, b"/fresh");
        rest.extend_from_slice(&FileAttributes::empty().to_bytes());
        let body = one_response(&mut subsystem, &request(14, 1, &rest)).await;
        assert_eq!(parse_status(&body), (1, StatusCode::Ok as u32));
        assert!(subsystem.store.lock().await.is_dir("/fresh"));

        let body = one_response(&mut subsystem, &path_request(15, 2, "/fresh")).await;
        assert_eq!(parse_status(&body), (2, StatusCode::Ok as u32));
        assert!(!subsystem.store.lock().await.exists("/fresh"));
    }

    #[tokio::test]
    async fn test_rmdir_non_empty() {
        let mut store = Store::new();
        store.create_file("/d/f", b"x".to_vec()).unwrap();
        let mut subsystem = subsystem_with(store);

        let body = one_response(&mut subsystem, &path_request(15, 1, "/d")).await;
        assert_eq!(parse_status(&body), (1, StatusCode::Failure as u32));
        assert!(subsystem.store.lock().await.exists("/d/f"));
    }

    #[tokio::test]
    async fn test_realpath_normalizes() {
        let mut subsystem = subsystem();
        let body = one_response(&mut subsystem, &path_request(16, 1, "/a/./b/../c")).await;
        assert_eq!(body[0], SftpMessageType::Name as u8);
        let mut offset = 5;
        let count = read_u32(&body, &mut offset).unwrap();
        assert_eq!(count, 1);
        assert_eq!(read_string(&body, &mut offset).unwrap(), b"/a/c");
    }

    #[tokio::test]
    async fn test_unsupported_request() {
        let mut subsystem = subsystem();
        // SSH_FXP_RENAME is not implemented.
        let body = one_response(&mut subsystem, &request(18, 42, &[])).await;
        assert_eq!(parse_status(&body), (42, StatusCode::OpUnsupported as u32));
    }

    #[tokio::test]
    async fn test_close_unknown_handle() {
        let mut subsystem = subsystem();
        let mut rest = Vec::new();
        write_string(&mut rest, &9u32.to_be_bytes());
        let body = one_response(&mut subsystem, &request(4, 1, &rest)).await;
        assert_eq!(parse_status(&body), (1, StatusCode::BadMessage as u32));
    }

    #[tokio::test]
    async fn test_multiple_packets_in_one_chunk() {
        let mut subsystem = subsystem();
        let mut chunk = Vec::new();
        let mut init = vec![SftpMessageType::Init as u8];
        init.extend_from_slice(&3u32.to_be_bytes());
        chunk.extend_from_slice(&frame(init));
        chunk.extend_from_slice(&path_request(17, 1, "/missing"));

        let responses = subsystem.handle_input(&chunk).await.unwrap();
        assert_eq!(responses.len(), 2);
    }
}
