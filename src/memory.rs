/*!
 * In-memory share
 *
 * A `FileStore` implementation backed by a map instead of a wire. Used by
 * the test suites and as a local emulation target; it honors negotiated
 * size limits by clamping each read and write, and can inject pending
 * bursts or a forced status to exercise the retry and failure paths.
 *
 * `MemoryShare` is the server side and is cheaply cloneable; every
 * [`MemoryShare::store`] call opens an independent session onto the same
 * state, mirroring how separate connections see one real share.
 */

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use bytes::Bytes;

use crate::config::SmbConfig;
use crate::credential::{Connector, Credential};
use crate::error::{Result, SmbError};
use crate::path::SmbPath;
use crate::status::NtStatus;
use crate::store::{
    AccessMask, CreateDisposition, DirEntry, FileHandle, FileInfo, FileStore,
};

const DEFAULT_MAX_IO: u32 = 64 * 1024;

#[derive(Debug)]
enum Node {
    File {
        data: Vec<u8>,
        created: SystemTime,
        modified: SystemTime,
    },
    Directory {
        created: SystemTime,
    },
}

impl Node {
    fn info(&self) -> FileInfo {
        match self {
            Node::File {
                data,
                created,
                modified,
            } => FileInfo {
                size: data.len() as u64,
                is_directory: false,
                created: Some(*created),
                modified: Some(*modified),
                accessed: Some(*modified),
            },
            Node::Directory { created } => FileInfo {
                size: 0,
                is_directory: true,
                created: Some(*created),
                modified: Some(*created),
                accessed: Some(*created),
            },
        }
    }
}

#[derive(Debug)]
struct OpenHandle {
    path: String,
    access: AccessMask,
}

#[derive(Debug)]
struct ShareState {
    nodes: HashMap<String, Node>,
    handles: HashMap<u64, OpenHandle>,
    next_handle: u64,
    max_read_size: u32,
    max_write_size: u32,
    pending_remaining: u32,
    forced_status: Option<NtStatus>,
    close_calls: u32,
    logoff_calls: u32,
}

impl ShareState {
    /// Fault to apply to the next read/write, if any. Pending bursts run
    /// down first; a forced status sticks until cleared.
    fn take_fault(&mut self) -> Option<NtStatus> {
        if self.pending_remaining > 0 {
            self.pending_remaining -= 1;
            return Some(NtStatus::PENDING);
        }
        self.forced_status
    }

    fn parent_exists(&self, path: &str) -> bool {
        match path.rsplit_once('\\') {
            None => true,
            Some((parent, _)) => matches!(self.nodes.get(parent), Some(Node::Directory { .. })),
        }
    }
}

/// Server-side state of one in-memory share.
#[derive(Clone)]
pub struct MemoryShare {
    inner: Arc<Mutex<ShareState>>,
}

impl Default for MemoryShare {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryShare {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ShareState {
                nodes: HashMap::new(),
                handles: HashMap::new(),
                next_handle: 1,
                max_read_size: DEFAULT_MAX_IO,
                max_write_size: DEFAULT_MAX_IO,
                pending_remaining: 0,
                forced_status: None,
                close_calls: 0,
                logoff_calls: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ShareState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the sizes this share "negotiates" for single reads and writes
    pub fn set_limits(&self, max_read_size: u32, max_write_size: u32) {
        let mut state = self.lock();
        state.max_read_size = max_read_size;
        state.max_write_size = max_write_size;
    }

    /// Seed a file, creating intermediate directories
    pub fn put_file(&self, path: &str, data: &[u8]) {
        let mut state = self.lock();
        let now = SystemTime::now();
        if let Some((dir, _)) = path.rsplit_once('\\') {
            let mut partial = String::new();
            for component in dir.split('\\') {
                if !partial.is_empty() {
                    partial.push('\\');
                }
                partial.push_str(component);
                state
                    .nodes
                    .entry(partial.clone())
                    .or_insert(Node::Directory { created: now });
            }
        }
        state.nodes.insert(
            path.to_string(),
            Node::File {
                data: data.to_vec(),
                created: now,
                modified: now,
            },
        );
    }

    /// Current contents of a file, if it exists
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        match self.lock().nodes.get(path) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    /// Make the next `count` reads/writes answer `PENDING`
    pub fn inject_pending(&self, count: u32) {
        self.lock().pending_remaining = count;
    }

    /// Make every following read/write answer `status` until cleared
    pub fn inject_status(&self, status: NtStatus) {
        self.lock().forced_status = Some(status);
    }

    pub fn clear_faults(&self) {
        let mut state = self.lock();
        state.pending_remaining = 0;
        state.forced_status = None;
    }

    /// How many handle closes the share has served
    pub fn close_calls(&self) -> u32 {
        self.lock().close_calls
    }

    /// How many session logoffs the share has served
    pub fn logoff_calls(&self) -> u32 {
        self.lock().logoff_calls
    }

    /// Open a new session onto this share
    pub fn store(&self) -> MemoryFileStore {
        MemoryFileStore {
            share: self.clone(),
        }
    }
}

/// One session onto a [`MemoryShare`].
pub struct MemoryFileStore {
    share: MemoryShare,
}

impl FileStore for MemoryFileStore {
    fn open(
        &mut self,
        path: &str,
        access: AccessMask,
        disposition: CreateDisposition,
    ) -> std::result::Result<FileHandle, NtStatus> {
        let mut state = self.share.lock();
        let now = SystemTime::now();

        enum Kind {
            File,
            Directory,
            Missing,
        }
        let kind = if path.is_empty() {
            Kind::Directory
        } else {
            match state.nodes.get(path) {
                Some(Node::File { .. }) => Kind::File,
                Some(Node::Directory { .. }) => Kind::Directory,
                None => Kind::Missing,
            }
        };

        match kind {
            Kind::Directory => {
                if disposition == CreateDisposition::CreateAlways {
                    return Err(NtStatus::FILE_IS_A_DIRECTORY);
                }
            }
            Kind::File => {
                if disposition == CreateDisposition::CreateAlways {
                    if let Some(Node::File { data, modified, .. }) = state.nodes.get_mut(path) {
                        data.clear();
                        *modified = now;
                    }
                }
            }
            Kind::Missing => {
                if disposition == CreateDisposition::OpenExisting {
                    return Err(NtStatus::OBJECT_NAME_NOT_FOUND);
                }
                if !state.parent_exists(path) {
                    return Err(NtStatus::OBJECT_PATH_NOT_FOUND);
                }
                state.nodes.insert(
                    path.to_string(),
                    Node::File {
                        data: Vec::new(),
                        created: now,
                        modified: now,
                    },
                );
            }
        }

        let id = state.next_handle;
        state.next_handle += 1;
        state.handles.insert(
            id,
            OpenHandle {
                path: path.to_string(),
                access,
            },
        );
        Ok(FileHandle(id))
    }

    fn read(
        &mut self,
        handle: FileHandle,
        offset: u64,
        count: u32,
    ) -> std::result::Result<Bytes, NtStatus> {
        let mut state = self.share.lock();
        if let Some(status) = state.take_fault() {
            return Err(status);
        }
        let open = state.handles.get(&handle.0).ok_or(NtStatus::INVALID_HANDLE)?;
        if !open.access.contains(AccessMask::READ) {
            return Err(NtStatus::ACCESS_DENIED);
        }
        let path = open.path.clone();
        let max = state.max_read_size;
        match state.nodes.get(&path) {
            Some(Node::File { data, .. }) => {
                let len = data.len() as u64;
                if offset >= len {
                    return Err(NtStatus::END_OF_FILE);
                }
                let n = u64::from(count.min(max)).min(len - offset) as usize;
                let start = offset as usize;
                Ok(Bytes::copy_from_slice(&data[start..start + n]))
            }
            Some(Node::Directory { .. }) => Err(NtStatus::FILE_IS_A_DIRECTORY),
            None => Err(NtStatus::OBJECT_NAME_NOT_FOUND),
        }
    }

    fn write(
        &mut self,
        handle: FileHandle,
        offset: u64,
        data: &[u8],
    ) -> std::result::Result<u32, NtStatus> {
        let mut state = self.share.lock();
        if let Some(status) = state.take_fault() {
            return Err(status);
        }
        let open = state.handles.get(&handle.0).ok_or(NtStatus::INVALID_HANDLE)?;
        if !open.access.contains(AccessMask::WRITE) {
            return Err(NtStatus::ACCESS_DENIED);
        }
        let path = open.path.clone();
        let max = state.max_write_size as usize;
        match state.nodes.get_mut(&path) {
            Some(Node::File {
                data: contents,
                modified,
                ..
            }) => {
                let n = data.len().min(max);
                let start = offset as usize;
                let end = start + n;
                if contents.len() < end {
                    contents.resize(end, 0);
                }
                contents[start..end].copy_from_slice(&data[..n]);
                *modified = SystemTime::now();
                Ok(n as u32)
            }
            Some(Node::Directory { .. }) => Err(NtStatus::FILE_IS_A_DIRECTORY),
            None => Err(NtStatus::OBJECT_NAME_NOT_FOUND),
        }
    }

    fn close(&mut self, handle: FileHandle) -> std::result::Result<(), NtStatus> {
        let mut state = self.share.lock();
        if state.handles.remove(&handle.0).is_none() {
            return Err(NtStatus::INVALID_HANDLE);
        }
        state.close_calls += 1;
        Ok(())
    }

    fn query_info(&mut self, handle: FileHandle) -> std::result::Result<FileInfo, NtStatus> {
        let state = self.share.lock();
        let open = state.handles.get(&handle.0).ok_or(NtStatus::INVALID_HANDLE)?;
        if open.path.is_empty() {
            return Ok(FileInfo::directory());
        }
        match state.nodes.get(&open.path) {
            Some(node) => Ok(node.info()),
            None => Err(NtStatus::OBJECT_NAME_NOT_FOUND),
        }
    }

    fn list(&mut self, path: &str) -> std::result::Result<Vec<DirEntry>, NtStatus> {
        let state = self.share.lock();
        if !path.is_empty() {
            match state.nodes.get(path) {
                Some(Node::Directory { .. }) => {}
                Some(Node::File { .. }) => return Err(NtStatus::NOT_A_DIRECTORY),
                None => return Err(NtStatus::OBJECT_NAME_NOT_FOUND),
            }
        }
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}\\")
        };
        let mut entries: Vec<DirEntry> = state
            .nodes
            .iter()
            .filter_map(|(key, node)| {
                let name = key.strip_prefix(&prefix)?;
                if name.is_empty() || name.contains('\\') {
                    return None;
                }
                Some(DirEntry {
                    name: name.to_string(),
                    info: node.info(),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn create_directory(&mut self, path: &str) -> std::result::Result<(), NtStatus> {
        let mut state = self.share.lock();
        if path.is_empty() || state.nodes.contains_key(path) {
            return Err(NtStatus::OBJECT_NAME_COLLISION);
        }
        if !state.parent_exists(path) {
            return Err(NtStatus::OBJECT_PATH_NOT_FOUND);
        }
        state.nodes.insert(
            path.to_string(),
            Node::Directory {
                created: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn delete(&mut self, path: &str) -> std::result::Result<(), NtStatus> {
        let mut state = self.share.lock();
        if path.is_empty() {
            return Err(NtStatus::ACCESS_DENIED);
        }
        match state.nodes.get(path) {
            None => return Err(NtStatus::OBJECT_NAME_NOT_FOUND),
            Some(Node::Directory { .. }) => {
                let prefix = format!("{path}\\");
                if state.nodes.keys().any(|key| key.starts_with(&prefix)) {
                    return Err(NtStatus::DIRECTORY_NOT_EMPTY);
                }
            }
            Some(Node::File { .. }) => {}
        }
        state.nodes.remove(path);
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> std::result::Result<(), NtStatus> {
        let mut state = self.share.lock();
        if from.is_empty() || to.is_empty() {
            return Err(NtStatus::ACCESS_DENIED);
        }
        if !state.nodes.contains_key(from) {
            return Err(NtStatus::OBJECT_NAME_NOT_FOUND);
        }
        if state.nodes.contains_key(to) {
            return Err(NtStatus::OBJECT_NAME_COLLISION);
        }
        if !state.parent_exists(to) {
            return Err(NtStatus::OBJECT_PATH_NOT_FOUND);
        }
        let node = match state.nodes.remove(from) {
            Some(node) => node,
            None => return Err(NtStatus::OBJECT_NAME_NOT_FOUND),
        };
        let is_directory = matches!(node, Node::Directory { .. });
        state.nodes.insert(to.to_string(), node);
        if is_directory {
            let prefix = format!("{from}\\");
            let moved: Vec<String> = state
                .nodes
                .keys()
                .filter(|key| key.starts_with(&prefix))
                .cloned()
                .collect();
            for old_key in moved {
                if let Some(child) = state.nodes.remove(&old_key) {
                    let new_key = format!("{to}\\{}", &old_key[prefix.len()..]);
                    state.nodes.insert(new_key, child);
                }
            }
        }
        Ok(())
    }

    fn max_read_size(&self) -> u32 {
        self.share.lock().max_read_size
    }

    fn max_write_size(&self) -> u32 {
        self.share.lock().max_write_size
    }

    fn logoff(&mut self) -> std::result::Result<(), NtStatus> {
        self.share.lock().logoff_calls += 1;
        Ok(())
    }
}

struct RegisteredShare {
    share: MemoryShare,
    auth: Option<(String, String)>,
}

/// Connector serving in-memory shares, keyed by (server, share name).
#[derive(Default)]
pub struct MemoryConnector {
    shares: Mutex<HashMap<(String, String), RegisteredShare>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, server: &str, name: &str, auth: Option<(String, String)>) -> MemoryShare {
        let share = MemoryShare::new();
        self.shares
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                (server.to_ascii_lowercase(), name.to_ascii_lowercase()),
                RegisteredShare {
                    share: share.clone(),
                    auth,
                },
            );
        share
    }

    /// Register a share anyone may connect to
    pub fn add_share(&self, server: &str, name: &str) -> MemoryShare {
        self.register(server, name, None)
    }

    /// Register a share requiring matching username and password
    pub fn add_share_with_auth(
        &self,
        server: &str,
        name: &str,
        username: &str,
        password: &str,
    ) -> MemoryShare {
        self.register(
            server,
            name,
            Some((username.to_string(), password.to_string())),
        )
    }
}

impl Connector for MemoryConnector {
    fn connect(
        &self,
        target: &SmbPath,
        credential: &Credential,
        _config: &SmbConfig,
    ) -> Result<Box<dyn FileStore>> {
        let shares = self.shares.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (
            target.server().to_ascii_lowercase(),
            target.share().to_ascii_lowercase(),
        );
        let registered = shares.get(&key).ok_or_else(|| {
            SmbError::Connection(format!(
                "no share {} on server {}",
                target.share(),
                target.server()
            ))
        })?;
        if let Some((username, password)) = &registered.auth {
            if credential.username() != username || credential.password().expose() != password {
                return Err(SmbError::Auth);
            }
        }
        Ok(Box::new(registered.share.store()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_rw(store: &mut MemoryFileStore, path: &str) -> FileHandle {
        store
            .open(
                path,
                AccessMask::READ | AccessMask::WRITE,
                CreateDisposition::OpenOrCreate,
            )
            .unwrap()
    }

    #[test]
    fn test_open_missing_file() {
        let share = MemoryShare::new();
        let mut store = share.store();
        let err = store
            .open("nope.txt", AccessMask::READ, CreateDisposition::OpenExisting)
            .unwrap_err();
        assert_eq!(err, NtStatus::OBJECT_NAME_NOT_FOUND);
    }

    #[test]
    fn test_create_requires_parent_directory() {
        let share = MemoryShare::new();
        let mut store = share.store();
        let err = store
            .open(
                r"missing\f.txt",
                AccessMask::WRITE,
                CreateDisposition::OpenOrCreate,
            )
            .unwrap_err();
        assert_eq!(err, NtStatus::OBJECT_PATH_NOT_FOUND);
    }

    #[test]
    fn test_write_then_read_back() {
        let share = MemoryShare::new();
        let mut store = share.store();
        let handle = open_rw(&mut store, "f.bin");

        assert_eq!(store.write(handle, 0, b"hello"), Ok(5));
        let data = store.read(handle, 0, 16).unwrap();
        assert_eq!(&data[..], b"hello");
        assert_eq!(store.read(handle, 5, 16), Err(NtStatus::END_OF_FILE));
    }

    #[test]
    fn test_read_and_write_clamped_to_limits() {
        let share = MemoryShare::new();
        share.set_limits(4, 3);
        let mut store = share.store();
        let handle = open_rw(&mut store, "f.bin");

        assert_eq!(store.write(handle, 0, b"abcdefgh"), Ok(3));
        assert_eq!(share.file("f.bin").unwrap(), b"abc");

        share.put_file("g.bin", b"0123456789");
        let g = open_rw(&mut store, "g.bin");
        assert_eq!(&store.read(g, 0, 100).unwrap()[..], b"0123");
    }

    #[test]
    fn test_access_enforcement() {
        let share = MemoryShare::new();
        share.put_file("f.bin", b"data");
        let mut store = share.store();
        let read_only = store
            .open("f.bin", AccessMask::READ, CreateDisposition::OpenExisting)
            .unwrap();
        assert_eq!(store.write(read_only, 0, b"x"), Err(NtStatus::ACCESS_DENIED));
    }

    #[test]
    fn test_create_always_truncates() {
        let share = MemoryShare::new();
        share.put_file("f.bin", b"previous contents");
        let mut store = share.store();
        let handle = store
            .open("f.bin", AccessMask::WRITE, CreateDisposition::CreateAlways)
            .unwrap();
        let info = store.query_info(handle).unwrap();
        assert_eq!(info.size, 0);
    }

    #[test]
    fn test_sparse_write_zero_fills() {
        let share = MemoryShare::new();
        let mut store = share.store();
        let handle = open_rw(&mut store, "f.bin");
        store.write(handle, 4, b"xy").unwrap();
        assert_eq!(share.file("f.bin").unwrap(), vec![0, 0, 0, 0, b'x', b'y']);
    }

    #[test]
    fn test_pending_burst_then_normal() {
        let share = MemoryShare::new();
        share.put_file("f.bin", b"data");
        let mut store = share.store();
        let handle = store
            .open("f.bin", AccessMask::READ, CreateDisposition::OpenExisting)
            .unwrap();

        share.inject_pending(2);
        assert_eq!(store.read(handle, 0, 4), Err(NtStatus::PENDING));
        assert_eq!(store.read(handle, 0, 4), Err(NtStatus::PENDING));
        assert_eq!(&store.read(handle, 0, 4).unwrap()[..], b"data");
    }

    #[test]
    fn test_forced_status_sticks_until_cleared() {
        let share = MemoryShare::new();
        share.put_file("f.bin", b"data");
        let mut store = share.store();
        let handle = store
            .open("f.bin", AccessMask::READ, CreateDisposition::OpenExisting)
            .unwrap();

        share.inject_status(NtStatus::ACCESS_DENIED);
        assert_eq!(store.read(handle, 0, 4), Err(NtStatus::ACCESS_DENIED));
        assert_eq!(store.read(handle, 0, 4), Err(NtStatus::ACCESS_DENIED));
        share.clear_faults();
        assert!(store.read(handle, 0, 4).is_ok());
    }

    #[test]
    fn test_list_direct_children_only() {
        let share = MemoryShare::new();
        share.put_file(r"docs\a.txt", b"a");
        share.put_file(r"docs\sub\b.txt", b"b");
        share.put_file("root.txt", b"r");
        let mut store = share.store();

        let names: Vec<String> = store
            .list("docs")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a.txt", "sub"]);

        let root: Vec<String> = store.list("").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(root, vec!["docs", "root.txt"]);
    }

    #[test]
    fn test_delete_refuses_nonempty_directory() {
        let share = MemoryShare::new();
        share.put_file(r"docs\a.txt", b"a");
        let mut store = share.store();
        assert_eq!(store.delete("docs"), Err(NtStatus::DIRECTORY_NOT_EMPTY));
        store.delete(r"docs\a.txt").unwrap();
        store.delete("docs").unwrap();
        assert_eq!(store.list(""), Ok(vec![]));
    }

    #[test]
    fn test_rename_moves_directory_contents() {
        let share = MemoryShare::new();
        share.put_file(r"old\deep\f.txt", b"f");
        let mut store = share.store();
        store.rename("old", "new").unwrap();
        assert!(share.file(r"new\deep\f.txt").is_some());
        assert!(share.file(r"old\deep\f.txt").is_none());
        assert_eq!(
            store.rename("old", "elsewhere"),
            Err(NtStatus::OBJECT_NAME_NOT_FOUND)
        );
    }

    #[test]
    fn test_close_unknown_handle() {
        let share = MemoryShare::new();
        let mut store = share.store();
        assert_eq!(store.close(FileHandle(99)), Err(NtStatus::INVALID_HANDLE));
        assert_eq!(share.close_calls(), 0);
    }

    #[test]
    fn test_sessions_share_state() {
        let share = MemoryShare::new();
        let mut first = share.store();
        let mut second = share.store();
        let handle = open_rw(&mut first, "f.bin");
        first.write(handle, 0, b"from first").unwrap();

        let other = second
            .open("f.bin", AccessMask::READ, CreateDisposition::OpenExisting)
            .unwrap();
        assert_eq!(&second.read(other, 0, 32).unwrap()[..], b"from first");
    }

    #[test]
    fn test_connector_auth() {
        let connector = MemoryConnector::new();
        connector.add_share_with_auth("host", "secure", "jdoe", "hunter2");
        let target = SmbPath::parse(r"\\host\secure\f").unwrap();
        let config = SmbConfig::default();

        let good = Credential::new("", "jdoe", crate::credential::Secret::new("hunter2"));
        assert!(connector.connect(&target, &good, &config).is_ok());

        let bad = Credential::new("", "jdoe", crate::credential::Secret::new("wrong"));
        assert!(matches!(
            connector.connect(&target, &bad, &config),
            Err(SmbError::Auth)
        ));
    }
}
