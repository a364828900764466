//! SFTP status codes, open flags, and file attributes.

use sftpmock_platform::{SftpMockError, SftpMockResult};

/// SSH_FX_* status code carried in SSH_FXP_STATUS responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum StatusCode {
    /// SSH_FX_OK - operation succeeded.
    Ok = 0,
    /// SSH_FX_EOF - no more data (READ past end, READDIR exhausted).
    Eof = 1,
    /// SSH_FX_NO_SUCH_FILE - path does not exist.
    NoSuchFile = 2,
    /// SSH_FX_PERMISSION_DENIED - operation not permitted.
    PermissionDenied = 3,
    /// SSH_FX_FAILURE - catch-all failure.
    Failure = 4,
    /// SSH_FX_BAD_MESSAGE - malformed request.
    BadMessage = 5,
    /// SSH_FX_OP_UNSUPPORTED - request type not implemented.
    OpUnsupported = 8,
}

impl StatusCode {
    /// Default human-readable message for this code.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::Ok => "Success",
            Self::Eof => "End of file",
            Self::NoSuchFile => "No such file",
            Self::PermissionDenied => "Permission denied",
            Self::Failure => "Failure",
            Self::BadMessage => "Bad message",
            Self::OpUnsupported => "Operation unsupported",
        }
    }
}

/// Maps a store or protocol error to the nearest SFTP status code.
///
/// Missing paths and unresolvable ones both read as "no such file" to a
/// client; the kind mismatches and occupancy conflicts have no dedicated
/// v3 code and fall back to SSH_FX_FAILURE.
pub fn status_for(error: &SftpMockError) -> StatusCode {
    match error {
        SftpMockError::NotFound(_) | SftpMockError::InvalidPath(_) => StatusCode::NoSuchFile,
        SftpMockError::AlreadyExists(_)
        | SftpMockError::NotEmpty(_)
        | SftpMockError::NotAFile(_)
        | SftpMockError::NotADirectory(_) => StatusCode::Failure,
        SftpMockError::Auth(_) => StatusCode::PermissionDenied,
        SftpMockError::Protocol(_) => StatusCode::BadMessage,
        SftpMockError::Io(_) => StatusCode::Failure,
    }
}

/// SSH_FXF_* open flags from SSH_FXP_OPEN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags(u32);

impl OpenFlags {
    /// SSH_FXF_READ
    pub const READ: u32 = 0x0000_0001;
    /// SSH_FXF_WRITE
    pub const WRITE: u32 = 0x0000_0002;
    /// SSH_FXF_APPEND
    pub const APPEND: u32 = 0x0000_0004;
    /// SSH_FXF_CREAT
    pub const CREAT: u32 = 0x0000_0008;
    /// SSH_FXF_TRUNC
    pub const TRUNC: u32 = 0x0000_0010;
    /// SSH_FXF_EXCL
    pub const EXCL: u32 = 0x0000_0020;

    /// Wraps a raw pflags value.
    pub fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Whether the handle may be read from.
    pub fn read(&self) -> bool {
        self.0 & Self::READ != 0
    }

    /// Whether the handle may be written to.
    pub fn write(&self) -> bool {
        self.0 & Self::WRITE != 0
    }

    /// Whether writes always land at the end of the file.
    pub fn append(&self) -> bool {
        self.0 & Self::APPEND != 0
    }

    /// Whether a missing file should be created.
    pub fn create(&self) -> bool {
        self.0 & Self::CREAT != 0
    }

    /// Whether an existing file should be truncated.
    pub fn truncate(&self) -> bool {
        self.0 & Self::TRUNC != 0
    }

    /// Whether an existing file makes the open fail.
    pub fn exclusive(&self) -> bool {
        self.0 & Self::EXCL != 0
    }
}

/// File attribute block (the v3 ATTRS encoding).
///
/// Every field is optional; the flags word says which are present:
///
/// ```text
/// uint32    flags
/// uint64    size         (if SSH_FILEXFER_ATTR_SIZE)
/// uint32    uid, gid     (if SSH_FILEXFER_ATTR_UIDGID)
/// uint32    permissions  (if SSH_FILEXFER_ATTR_PERMISSIONS)
/// uint32    atime, mtime (if SSH_FILEXFER_ATTR_ACMODTIME)
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileAttributes {
    /// File size in bytes.
    pub size: Option<u64>,
    /// Owner and group ids.
    pub uid_gid: Option<(u32, u32)>,
    /// POSIX mode bits, including the file type bits.
    pub permissions: Option<u32>,
    /// Access and modification times (Unix seconds).
    pub times: Option<(u32, u32)>,
}

impl FileAttributes {
    const FLAG_SIZE: u32 = 0x0000_0001;
    const FLAG_UIDGID: u32 = 0x0000_0002;
    const FLAG_PERMISSIONS: u32 = 0x0000_0004;
    const FLAG_ACMODTIME: u32 = 0x0000_0008;
    const FLAG_EXTENDED: u32 = 0x8000_0000;

    /// Regular file mode bits (0100644).
    pub const FILE_MODE: u32 = 0o100644;
    /// Directory mode bits (040755).
    pub const DIR_MODE: u32 = 0o40755;

    /// Attributes with no fields present.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Attributes for a regular file of the given size.
    pub fn file(size: u64) -> Self {
        Self {
            size: Some(size),
            permissions: Some(Self::FILE_MODE),
            ..Self::default()
        }
    }

    /// Attributes for a directory.
    pub fn directory() -> Self {
        Self {
            permissions: Some(Self::DIR_MODE),
            ..Self::default()
        }
    }

    /// Whether the permissions mark this as a directory.
    pub fn is_dir(&self) -> bool {
        self.permissions
            .map(|p| p & 0o170000 == 0o40000)
            .unwrap_or(false)
    }

    /// Serializes to the wire encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut flags = 0u32;
        if self.size.is_some() {
            flags |= Self::FLAG_SIZE;
        }
        if self.uid_gid.is_some() {
            flags |= Self::FLAG_UIDGID;
        }
        if self.permissions.is_some() {
            flags |= Self::FLAG_PERMISSIONS;
        }
        if self.times.is_some() {
            flags |= Self::FLAG_ACMODTIME;
        }

        let mut buf = Vec::with_capacity(32);
        buf.extend_from_slice(&flags.to_be_bytes());
        if let Some(size) = self.size {
            buf.extend_from_slice(&size.to_be_bytes());
        }
        if let Some((uid, gid)) = self.uid_gid {
            buf.extend_from_slice(&uid.to_be_bytes());
            buf.extend_from_slice(&gid.to_be_bytes());
        }
        if let Some(permissions) = self.permissions {
            buf.extend_from_slice(&permissions.to_be_bytes());
        }
        if let Some((atime, mtime)) = self.times {
            buf.extend_from_slice(&atime.to_be_bytes());
            buf.extend_from_slice(&mtime.to_be_bytes());
        }
        buf
    }

    /// Parses an attribute block starting at `offset`, advancing it past
    /// the block (extended data included).
    pub fn from_bytes(data: &[u8], offset: &mut usize) -> SftpMockResult<Self> {
        let flags = read_u32(data, offset)?;
        let mut attrs = Self::default();

        if flags & Self::FLAG_SIZE != 0 {
            attrs.size = Some(read_u64(data, offset)?);
        }
        if flags & Self::FLAG_UIDGID != 0 {
            let uid = read_u32(data, offset)?;
            let gid = read_u32(data, offset)?;
            attrs.uid_gid = Some((uid, gid));
        }
        if flags & Self::FLAG_PERMISSIONS != 0 {
            attrs.permissions = Some(read_u32(data, offset)?);
        }
        if flags & Self::FLAG_ACMODTIME != 0 {
            let atime = read_u32(data, offset)?;
            let mtime = read_u32(data, offset)?;
            attrs.times = Some((atime, mtime));
        }
        if flags & Self::FLAG_EXTENDED != 0 {
            // Extended type/data string pairs, skipped.
            let count = read_u32(data, offset)?;
            for _ in 0..count {
                skip_string(data, offset)?;
                skip_string(data, offset)?;
            }
        }
        Ok(attrs)
    }

    /// Builds an `ls -l` style long name for a NAME entry.
    ///
    /// Clients mostly ignore this field, so the owner, group, link count
    /// and date are fixed.
    pub fn longname(&self, name: &str) -> String {
        let mode = self.permissions.unwrap_or(0);
        let kind = if self.is_dir() { 'd' } else { '-' };
        let mut perms = String::with_capacity(10);
        perms.push(kind);
        for shift in [6u32, 3, 0] {
            let bits = (mode >> shift) & 0o7;
            perms.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            perms.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            perms.push(if bits & 0o1 != 0 { 'x' } else { '-' });
        }
        let size = self.size.unwrap_or(0);
        format!("{} 1 mock mock {:>8} Jan  1  1970 {}", perms, size, name)
    }
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

fn skip_string(data: &[u8], offset: &mut usize) -> SftpMockResult<()> {
    let len = read_u32(data, offset)? as usize;
    if data.len() < *offset + len {
        return Err(SftpMockError::Protocol("truncated string".to_string()));
    }
    *offset += len;
    Ok(())
}
