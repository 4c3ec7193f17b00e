/*!
 * Protocol client contract
 *
 * The stream engine and metadata operations never speak SMB themselves;
 * they drive an already-negotiated session through the [`FileStore`]
 * trait. A store reports every primitive's outcome as an `NtStatus`:
 * end-of-file and pending travel in the error channel exactly as they do
 * on the wire, and the caller decides which of them are errors.
 */

use std::time::SystemTime;

use bitflags::bitflags;
use bytes::Bytes;

use crate::status::NtStatus;

/// Opaque token for an open file on the server. Only meaningful to the
/// store that issued it; invalid after close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(pub u64);

bitflags! {
    /// Desired access for an open request
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessMask: u32 {
        const READ            = 0x0001;
        const WRITE           = 0x0002;
        const DELETE          = 0x0004;
        const READ_ATTRIBUTES = 0x0008;
    }
}

/// What to do when the target does or does not already exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateDisposition {
    /// Fail with `OBJECT_NAME_NOT_FOUND` unless the file exists
    OpenExisting,
    /// Open the existing file, or create an empty one
    OpenOrCreate,
    /// Always start from an empty file, truncating any existing content
    CreateAlways,
}

/// Metadata for one file or directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Stream size in bytes (0 for directories)
    pub size: u64,
    pub is_directory: bool,
    pub created: Option<SystemTime>,
    pub modified: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
}

impl FileInfo {
    pub fn file(size: u64) -> Self {
        Self {
            size,
            is_directory: false,
            created: None,
            modified: None,
            accessed: None,
        }
    }

    pub fn directory() -> Self {
        Self {
            size: 0,
            is_directory: true,
            created: None,
            modified: None,
            accessed: None,
        }
    }
}

/// One entry from a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub info: FileInfo,
}

/// One authenticated, tree-connected session against a single share.
///
/// Paths are share-relative, backslash-separated, with no leading
/// separator (the form [`crate::path::SmbPath::relative`] produces).
/// Offsets are explicit on every read and write; the server keeps no
/// cursor for us.
///
/// Implementations are driven by exactly one owner at a time and are not
/// required to tolerate interleaved requests from multiple threads, which
/// is why every method takes `&mut self`.
pub trait FileStore: Send {
    /// Open (or create, per `disposition`) a file or directory
    fn open(
        &mut self,
        path: &str,
        access: AccessMask,
        disposition: CreateDisposition,
    ) -> Result<FileHandle, NtStatus>;

    /// Read up to `count` bytes at `offset`. May return fewer bytes than
    /// requested; `END_OF_FILE` signals nothing left at that offset.
    fn read(&mut self, handle: FileHandle, offset: u64, count: u32) -> Result<Bytes, NtStatus>;

    /// Write `data` at `offset`, returning how many bytes the server
    /// accepted, possibly fewer than `data.len()`.
    fn write(&mut self, handle: FileHandle, offset: u64, data: &[u8]) -> Result<u32, NtStatus>;

    /// Close an open handle
    fn close(&mut self, handle: FileHandle) -> Result<(), NtStatus>;

    /// Query size, kind, and timestamps for an open handle
    fn query_info(&mut self, handle: FileHandle) -> Result<FileInfo, NtStatus>;

    /// List a directory
    fn list(&mut self, path: &str) -> Result<Vec<DirEntry>, NtStatus>;

    /// Create a directory
    fn create_directory(&mut self, path: &str) -> Result<(), NtStatus>;

    /// Delete a file or an empty directory
    fn delete(&mut self, path: &str) -> Result<(), NtStatus>;

    /// Rename a file or directory within the share
    fn rename(&mut self, from: &str, to: &str) -> Result<(), NtStatus>;

    /// Largest read the server agreed to serve in one request.
    /// Negotiated at session establishment, constant afterwards.
    fn max_read_size(&self) -> u32;

    /// Largest write the server agreed to accept in one request
    fn max_write_size(&self) -> u32;

    /// Log off the session and release the transport
    fn logoff(&mut self) -> Result<(), NtStatus>;
}
