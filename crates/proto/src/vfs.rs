//! In-memory virtual file store.
//!
//! The store is the filesystem the mock server serves in place of a real
//! disk: a single tree of directories and byte-content files, living
//! entirely in process memory and discarded when the server stops.
//!
//! # Paths
//!
//! All store paths are absolute, `/`-separated and normalized: no empty
//! interior segments, no `.` or `..`, no trailing slash except for the
//! root itself. Client-supplied paths are normalized by the protocol
//! layer before they reach the store (see [`normalize_path`]).
//!
//! # Invariants
//!
//! - Every failed operation leaves the store unchanged.
//! - The root directory always exists and can never be removed; a
//!   recursive remove of `/` clears its children only.
//! - Sibling names are unique by construction (`BTreeMap` keyed by name),
//!   and listings come back in lexicographic order.
//!
//! # Example
//!
//! ```
//! use sftpmock_proto::vfs::Store;
//!
//! let mut store = Store::new();
//! store.create_file("/docs/readme.txt", b"hello".to_vec()).unwrap();
//! assert!(store.is_file("/docs/readme.txt"));
//! assert!(store.is_dir("/docs"));
//! assert_eq!(store.read_file("/docs/readme.txt").unwrap(), b"hello");
//! ```

use sftpmock_platform::{SftpMockError, SftpMockResult};
use std::collections::BTreeMap;

/// A node in the store: a file with byte content, or a directory with
/// named children.
#[derive(Debug, Clone)]
pub enum Node {
    /// Regular file owning its content.
    File(Vec<u8>),
    /// Directory owning its children, keyed by name.
    Directory(BTreeMap<String, Node>),
}

impl Node {
    /// Returns true if this node is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory(_))
    }

    /// Returns true if this node is a file.
    pub fn is_file(&self) -> bool {
        matches!(self, Node::File(_))
    }
}

/// Kind and size of a node, as reported by [`Store::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Regular file with its length in bytes.
    File {
        /// Content length in bytes.
        len: u64,
    },
    /// Directory.
    Dir,
}

impl NodeKind {
    /// Returns the file size, or 0 for directories.
    pub fn size(&self) -> u64 {
        match self {
            NodeKind::File { len } => *len,
            NodeKind::Dir => 0,
        }
    }

    /// Returns true for the directory kind.
    pub fn is_dir(&self) -> bool {
        matches!(self, NodeKind::Dir)
    }
}

/// The in-memory file store.
///
/// Owns the root directory. All operations are synchronous; callers that
/// share a store across connections wrap it in a mutex so each operation
/// is atomic with respect to every other.
#[derive(Debug)]
pub struct Store {
    root: BTreeMap<String, Node>,
}

impl Store {
    /// Creates an empty store containing only the root directory.
    pub fn new() -> Self {
        Self {
            root: BTreeMap::new(),
        }
    }

    /// Returns whether a node exists at `path`.
    pub fn exists(&self, path: &str) -> bool {
        path == "/" || self.lookup(path).is_ok()
    }

    /// Returns whether `path` names a file.
    pub fn is_file(&self, path: &str) -> bool {
        self.lookup(path).map(Node::is_file).unwrap_or(false)
    }

    /// Returns whether `path` names a directory.
    pub fn is_dir(&self, path: &str) -> bool {
        path == "/" || self.lookup(path).map(Node::is_dir).unwrap_or(false)
    }

    /// Returns the kind and size of the node at `path`.
    ///
    /// # Errors
    ///
    /// [`SftpMockError::NotFound`] if nothing occupies the path.
    pub fn stat(&self, path: &str) -> SftpMockResult<NodeKind> {
        if path == "/" {
            return Ok(NodeKind::Dir);
        }
        match self.lookup(path)? {
            Node::File(content) => Ok(NodeKind::File {
                len: content.len() as u64,
            }),
            Node::Directory(_) => Ok(NodeKind::Dir),
        }
    }

    /// Creates or overwrites the file at `path` with `content`.
    ///
    /// Missing parent directories are created implicitly, matching the
    /// ergonomics of typical SFTP server mocks.
    ///
    /// # Errors
    ///
    /// - [`SftpMockError::InvalidPath`] if the path is malformed, names
    ///   the root, an ancestor segment is a file, or a directory already
    ///   occupies the path.
    pub fn create_file(&mut self, path: &str, content: Vec<u8>) -> SftpMockResult<()> {
        let (parents, name) = split_path(path)?;
        let dir = ensure_dirs(&mut self.root, &parents, path)?;
        match dir.get(&name) {
            Some(Node::Directory(_)) => Err(SftpMockError::InvalidPath(path.to_string())),
            _ => {
                dir.insert(name, Node::File(content));
                Ok(())
            }
        }
    }

    /// Returns a copy of the content of the file at `path`.
    ///
    /// # Errors
    ///
    /// - [`SftpMockError::NotFound`] if the path does not exist.
    /// - [`SftpMockError::NotAFile`] if it names a directory.
    pub fn read_file(&self, path: &str) -> SftpMockResult<Vec<u8>> {
        if path == "/" {
            return Err(SftpMockError::NotAFile(path.to_string()));
        }
        match self.lookup(path)? {
            Node::File(content) => Ok(content.clone()),
            Node::Directory(_) => Err(SftpMockError::NotAFile(path.to_string())),
        }
    }

    /// Creates the directory at `path`, with missing parents created
    /// implicitly.
    ///
    /// # Errors
    ///
    /// - [`SftpMockError::AlreadyExists`] if a node of either kind
    ///   already occupies the path (including the root).
    /// - [`SftpMockError::InvalidPath`] if a parent segment is a file.
    pub fn make_dir(&mut self, path: &str) -> SftpMockResult<()> {
        if path == "/" {
            return Err(SftpMockError::AlreadyExists(path.to_string()));
        }
        let (parents, name) = split_path(path)?;
        let dir = ensure_dirs(&mut self.root, &parents, path)?;
        if dir.contains_key(&name) {
            return Err(SftpMockError::AlreadyExists(path.to_string()));
        }
        dir.insert(name, Node::Directory(BTreeMap::new()));
        Ok(())
    }

    /// Removes the node at `path`.
    ///
    /// Files are deleted outright. Directories require `recursive` unless
    /// empty. Removing `/` recursively clears the store's contents; the
    /// root node itself always persists.
    ///
    /// # Errors
    ///
    /// - [`SftpMockError::NotFound`] if the path does not exist.
    /// - [`SftpMockError::NotEmpty`] for a non-empty directory without
    ///   `recursive`.
    pub fn remove(&mut self, path: &str, recursive: bool) -> SftpMockResult<()> {
        if path == "/" {
            if !recursive && !self.root.is_empty() {
                return Err(SftpMockError::NotEmpty(path.to_string()));
            }
            self.root.clear();
            return Ok(());
        }

        let (parents, name) = split_path(path)?;
        let dir = self.lookup_dir_mut(&parents, path)?;
        match dir.get(&name) {
            None => Err(SftpMockError::NotFound(path.to_string())),
            Some(Node::Directory(children)) if !children.is_empty() && !recursive => {
                Err(SftpMockError::NotEmpty(path.to_string()))
            }
            Some(_) => {
                dir.remove(&name);
                Ok(())
            }
        }
    }

    /// Lists the children of `path` as absolute paths, in lexicographic
    /// order.
    ///
    /// A file path yields an empty sequence; kind discrimination is the
    /// caller's job via [`Store::stat`].
    ///
    /// # Errors
    ///
    /// [`SftpMockError::NotFound`] if the path does not exist.
    pub fn list(&self, path: &str) -> SftpMockResult<Vec<String>> {
        let children = if path == "/" {
            &self.root
        } else {
            match self.lookup(path)? {
                Node::Directory(children) => children,
                Node::File(_) => return Ok(Vec::new()),
            }
        };

        let prefix = if path == "/" { "" } else { path };
        Ok(children
            .keys()
            .map(|name| format!("{}/{}", prefix, name))
            .collect())
    }

    /// Resolves `path` to its node.
    fn lookup(&self, path: &str) -> SftpMockResult<&Node> {
        let segments = parse_segments(path)?;
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| SftpMockError::InvalidPath(path.to_string()))?;

        let mut dir = &self.root;
        for segment in parents {
            match dir.get(*segment) {
                Some(Node::Directory(children)) => dir = children,
                Some(Node::File(_)) => {
                    return Err(SftpMockError::InvalidPath(path.to_string()))
                }
                None => return Err(SftpMockError::NotFound(path.to_string())),
            }
        }

        dir.get(*last)
            .ok_or_else(|| SftpMockError::NotFound(path.to_string()))
    }

    /// Resolves a parent chain to its mutable child map, without creating
    /// anything.
    fn lookup_dir_mut(
        &mut self,
        parents: &[String],
        path: &str,
    ) -> SftpMockResult<&mut BTreeMap<String, Node>> {
        let mut dir = &mut self.root;
        for segment in parents {
            match dir.get_mut(segment) {
                Some(Node::Directory(children)) => dir = children,
                Some(Node::File(_)) => {
                    return Err(SftpMockError::InvalidPath(path.to_string()))
                }
                None => return Err(SftpMockError::NotFound(path.to_string())),
            }
        }
        Ok(dir)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// Walks `parents` from the root, creating missing directories, and
/// returns the final child map. Traversal through a file is
/// `InvalidPath`.
fn ensure_dirs<'a>(
    root: &'a mut BTreeMap<String, Node>,
    parents: &[String],
    path: &str,
) -> SftpMockResult<&'a mut BTreeMap<String, Node>> {
    let mut dir = root;
    for segment in parents {
        let entry = dir
            .entry(segment.clone())
            .or_insert_with(|| Node::Directory(BTreeMap::new()));
        match entry {
            Node::Directory(children) => dir = children,
            Node::File(_) => return Err(SftpMockError::InvalidPath(path.to_string())),
        }
    }
    Ok(dir)
}

/// Splits a normalized absolute path into its parent segments and final
/// name.
fn split_path(path: &str) -> SftpMockResult<(Vec<String>, String)> {
    let mut segments = parse_segments(path)?;
    let name = segments
        .pop()
        .ok_or_else(|| SftpMockError::InvalidPath(path.to_string()))?
        .to_string();
    Ok((segments.iter().map(|s| s.to_string()).collect(), name))
}

/// Validates a normalized absolute path and returns its segments.
///
/// Rejects relative paths, empty interior segments and `.`/`..`, which
/// the protocol layer is expected to have resolved already.
fn parse_segments(path: &str) -> SftpMockResult<Vec<&str>> {
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| SftpMockError::InvalidPath(path.to_string()))?;
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    let segments: Vec<&str> = rest.split('/').collect();
    if segments
        .iter()
        .any(|s| s.is_empty() || *s == "." || *s == "..")
    {
        return Err(SftpMockError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

/// Normalizes a client-supplied path into a store path.
///
/// Relative paths are resolved against `/`. `.` segments are dropped and
/// `..` pops the previous segment, clamped at the root (SFTP clients
/// routinely send `REALPATH "."` and paths like `./upload.txt`).
///
/// # Example
///
/// ```
/// use sftpmock_proto::vfs::normalize_path;
///
/// assert_eq!(normalize_path("."), "/");
/// assert_eq!(normalize_path("upload.txt"), "/upload.txt");
/// assert_eq!(normalize_path("/a/b/../c//d/"), "/a/c/d");
/// assert_eq!(normalize_path("/../.."), "/");
/// ```
pub fn normalize_path(path: &str) -> String {
    let mut resolved: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                resolved.pop();
            }
            name => resolved.push(name),
        }
    }
    if resolved.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", resolved.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_is_empty() {
        let store = Store::new();
        assert!(store.exists("/"));
        assert!(store.is_dir("/"));
        assert_eq!(store.list("/").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_create_and_read_file() {
        let mut store = Store::new();
        store
            .create_file("/new_file.txt", b"Hello world!".to_vec())
            .unwrap();

        assert!(store.exists("/new_file.txt"));
        assert!(store.is_file("/new_file.txt"));
        assert!(!store.is_dir("/new_file.txt"));
        assert_eq!(store.read_file("/new_file.txt").unwrap(), b"Hello world!");
    }

    #[test]
    fn test_create_file_empty_content() {
        let mut store = Store::new();
        store.create_file("/empty", Vec::new()).unwrap();
        assert_eq!(store.read_file("/empty").unwrap(), Vec::<u8>::new());
        assert_eq!(store.stat("/empty").unwrap(), NodeKind::File { len: 0 });
    }

    #[test]
    fn test_create_file_overwrites() {
        let mut store = Store::new();
        store.create_file("/f", b"one".to_vec()).unwrap();
        store.create_file("/f", b"two".to_vec()).unwrap();
        assert_eq!(store.read_file("/f").unwrap(), b"two");
    }

    #[test]
    fn test_create_file_makes_parents() {
        let mut store = Store::new();
        store.create_file("/a/b/c.txt", b"deep".to_vec()).unwrap();
        assert!(store.is_dir("/a"));
        assert!(store.is_dir("/a/b"));
        assert_eq!(store.read_file("/a/b/c.txt").unwrap(), b"deep");
    }

    #[test]
    fn test_create_file_through_file_fails() {
        let mut store = Store::new();
        store.create_file("/f", b"x".to_vec()).unwrap();

        let result = store.create_file("/f/child.txt", b"y".to_vec());
        assert!(matches!(result, Err(SftpMockError::InvalidPath(_))));
        // Failed operation is a no-op
        assert_eq!(store.read_file("/f").unwrap(), b"x");
    }

    #[test]
    fn test_create_file_over_directory_fails() {
        let mut store = Store::new();
        store.make_dir("/d").unwrap();
        let result = store.create_file("/d", b"x".to_vec());
        assert!(matches!(result, Err(SftpMockError::InvalidPath(_))));
        assert!(store.is_dir("/d"));
    }

    #[test]
    fn test_read_file_not_found() {
        let store = Store::new();
        assert!(matches!(
            store.read_file("/missing"),
            Err(SftpMockError::NotFound(_))
        ));
    }

    #[test]
    fn test_read_file_on_directory() {
        let mut store = Store::new();
        store.make_dir("/d").unwrap();
        assert!(matches!(
            store.read_file("/d"),
            Err(SftpMockError::NotAFile(_))
        ));
    }

    #[test]
    fn test_make_dir() {
        let mut store = Store::new();
        store.make_dir("/new_dir").unwrap();
        assert!(store.is_dir("/new_dir"));
        assert_eq!(store.list("/new_dir").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_make_dir_already_exists() {
        let mut store = Store::new();
        store.make_dir("/new_dir").unwrap();
        assert!(matches!(
            store.make_dir("/new_dir"),
            Err(SftpMockError::AlreadyExists(_))
        ));

        // Same error when a file occupies the path
        store.create_file("/f", Vec::new()).unwrap();
        assert!(matches!(
            store.make_dir("/f"),
            Err(SftpMockError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_make_dir_root_exists() {
        let mut store = Store::new();
        assert!(matches!(
            store.make_dir("/"),
            Err(SftpMockError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_make_dir_under_file_fails() {
        let mut store = Store::new();
        store.create_file("/f", Vec::new()).unwrap();
        assert!(matches!(
            store.make_dir("/f/sub"),
            Err(SftpMockError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_remove_file() {
        let mut store = Store::new();
        store.create_file("/f", b"x".to_vec()).unwrap();
        store.remove("/f", false).unwrap();
        assert!(!store.exists("/f"));
        assert_eq!(store.list("/").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_remove_missing() {
        let mut store = Store::new();
        assert!(matches!(
            store.remove("/missing", false),
            Err(SftpMockError::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_empty_dir() {
        let mut store = Store::new();
        store.make_dir("/d").unwrap();
        store.remove("/d", false).unwrap();
        assert!(!store.exists("/d"));
    }

    #[test]
    fn test_remove_non_empty_dir_fails() {
        let mut store = Store::new();
        store.create_file("/d/f", b"x".to_vec()).unwrap();

        assert!(matches!(
            store.remove("/d", false),
            Err(SftpMockError::NotEmpty(_))
        ));
        // Store unchanged after the failure
        assert!(store.is_file("/d/f"));
    }

    #[test]
    fn test_remove_dir_recursive() {
        let mut store = Store::new();
        store.create_file("/d/sub/f1", b"1".to_vec()).unwrap();
        store.create_file("/d/f2", b"2".to_vec()).unwrap();

        store.remove("/d", true).unwrap();
        assert!(!store.exists("/d"));
        assert!(!store.exists("/d/sub/f1"));
    }

    #[test]
    fn test_remove_root_recursive_keeps_root() {
        let mut store = Store::new();
        store.create_file("/a/f", b"x".to_vec()).unwrap();
        store.make_dir("/b").unwrap();

        store.remove("/", true).unwrap();
        assert_eq!(store.list("/").unwrap(), Vec::<String>::new());

        // Root remains usable
        store.make_dir("/again").unwrap();
        store.create_file("/again/f", b"y".to_vec()).unwrap();
        assert!(store.is_file("/again/f"));
    }

    #[test]
    fn test_remove_root_non_recursive() {
        let mut store = Store::new();
        store.remove("/", false).unwrap(); // Empty root is fine

        store.create_file("/f", Vec::new()).unwrap();
        assert!(matches!(
            store.remove("/", false),
            Err(SftpMockError::NotEmpty(_))
        ));
    }

    #[test]
    fn test_list_ordering_and_idempotence() {
        let mut store = Store::new();
        store.create_file("/b.txt", Vec::new()).unwrap();
        store.create_file("/a.txt", Vec::new()).unwrap();
        store.make_dir("/c").unwrap();

        let first = store.list("/").unwrap();
        assert_eq!(first, vec!["/a.txt", "/b.txt", "/c"]);
        assert_eq!(store.list("/").unwrap(), first);
    }

    #[test]
    fn test_list_nested_paths_are_absolute() {
        let mut store = Store::new();
        store.create_file("/d/f", Vec::new()).unwrap();
        assert_eq!(store.list("/d").unwrap(), vec!["/d/f"]);
    }

    #[test]
    fn test_list_file_path_is_empty() {
        let mut store = Store::new();
        store.create_file("/f", Vec::new()).unwrap();
        assert_eq!(store.list("/f").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_list_missing() {
        let store = Store::new();
        assert!(matches!(
            store.list("/missing"),
            Err(SftpMockError::NotFound(_))
        ));
    }

    #[test]
    fn test_stat() {
        let mut store = Store::new();
        store.create_file("/f", b"12345".to_vec()).unwrap();
        store.make_dir("/d").unwrap();

        assert_eq!(store.stat("/f").unwrap(), NodeKind::File { len: 5 });
        assert_eq!(store.stat("/d").unwrap(), NodeKind::Dir);
        assert_eq!(store.stat("/").unwrap(), NodeKind::Dir);
        assert!(matches!(
            store.stat("/missing"),
            Err(SftpMockError::NotFound(_))
        ));
    }

    #[test]
    fn test_invalid_paths_rejected() {
        let mut store = Store::new();
        for path in ["relative.txt", "/a//b", "/a/./b", "/a/../b", ""] {
            assert!(
                matches!(
                    store.create_file(path, Vec::new()),
                    Err(SftpMockError::InvalidPath(_))
                ),
                "expected InvalidPath for {:?}",
                path
            );
        }
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("."), "/");
        assert_eq!(normalize_path("file.txt"), "/file.txt");
        assert_eq!(normalize_path("/dir/"), "/dir");
        assert_eq!(normalize_path("/a/b/../c"), "/a/c");
        assert_eq!(normalize_path("../../etc/passwd"), "/etc/passwd");
    }

    #[test]
    fn test_round_trip_arbitrary_bytes() {
        let mut store = Store::new();
        let data: Vec<u8> = (0..=255).collect();
        store.create_file("/bin.dat", data.clone()).unwrap();
        assert_eq!(store.read_file("/bin.dat").unwrap(), data);
    }
}
