/*!
 * The stream engine
 *
 * `SmbStream` turns one remote file handle into a seekable byte stream.
 * Every read and write is a single request at an explicit offset (the
 * protocol keeps no cursor for us), with pending replies retried under
 * the connection's session-timeout budget. The stream owns its
 * connection: constructing a stream consumes the `Connection`, and
 * closing the stream closes the handle and disposes the connection.
 */

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::connection::Connection;
use crate::credential::CredentialScope;
use crate::error::{Result, SmbError};
use crate::path::SmbPath;
use crate::retry::{RetryError, RetryPolicy};
use crate::status::NtStatus;
use crate::store::{AccessMask, CreateDisposition, FileHandle};

/// How to open a remote file for streaming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing file, read access
    Read,
    /// Fresh file, truncating any existing content
    Write,
    /// Open or create, read and write access
    ReadWrite,
}

impl OpenMode {
    fn access(self) -> AccessMask {
        match self {
            OpenMode::Read => AccessMask::READ | AccessMask::READ_ATTRIBUTES,
            OpenMode::Write => AccessMask::WRITE | AccessMask::READ_ATTRIBUTES,
            OpenMode::ReadWrite => {
                AccessMask::READ | AccessMask::WRITE | AccessMask::READ_ATTRIBUTES
            }
        }
    }

    fn disposition(self) -> CreateDisposition {
        match self {
            OpenMode::Read => CreateDisposition::OpenExisting,
            OpenMode::Write => CreateDisposition::CreateAlways,
            OpenMode::ReadWrite => CreateDisposition::OpenOrCreate,
        }
    }
}

/// Seekable, retrying byte stream over one open remote file.
///
/// Standard `std::io` semantics apply: reads and writes may transfer
/// fewer bytes than requested (the position advances by what actually
/// transferred), and `Seek` follows the conventional three-origin
/// contract, with the end origin resolved against the server-reported
/// stream size at the moment of the call.
///
/// One instance is not internally synchronized; callers that share a
/// stream across threads must serialize access themselves.
pub struct SmbStream {
    connection: Connection,
    handle: FileHandle,
    position: u64,
    length: u64,
    retry: RetryPolicy,
    closed: bool,
}

impl SmbStream {
    /// Resolve a connection through `scope` and open `path` on it.
    pub fn open(scope: &CredentialScope, path: &SmbPath, mode: OpenMode) -> Result<SmbStream> {
        let connection = scope.connect(path)?;
        Self::from_connection(connection, path.relative(), mode)
    }

    /// Open `relative` on an already-established connection.
    ///
    /// The connection moves into the stream, which becomes its sole
    /// disposer, including when the open itself fails.
    pub fn from_connection(
        mut connection: Connection,
        relative: &str,
        mode: OpenMode,
    ) -> Result<SmbStream> {
        let opened = Self::open_handle(&mut connection, relative, mode);
        match opened {
            Ok((handle, length)) => {
                tracing::debug!(share = %connection.target(), path = relative, length, "stream opened");
                Ok(SmbStream {
                    retry: RetryPolicy::new(connection.session_timeout()),
                    handle,
                    position: 0,
                    length,
                    closed: false,
                    connection,
                })
            }
            Err(error) => {
                connection.dispose();
                Err(error)
            }
        }
    }

    fn open_handle(
        connection: &mut Connection,
        relative: &str,
        mode: OpenMode,
    ) -> Result<(FileHandle, u64)> {
        let store = connection.store_mut()?;
        let handle = store
            .open(relative, mode.access(), mode.disposition())
            .map_err(|status| SmbError::from_status("open", status, relative))?;
        let info = match store.query_info(handle) {
            Ok(info) => info,
            Err(status) => {
                store.close(handle).ok();
                return Err(SmbError::from_status("query_info", status, relative));
            }
        };
        if info.is_directory {
            store.close(handle).ok();
            return Err(SmbError::Protocol {
                op: "open",
                status: NtStatus::FILE_IS_A_DIRECTORY,
            });
        }
        Ok((handle, info.size))
    }

    /// Declared stream length. Tracks the size reported when the stream
    /// was opened, plus any [`SmbStream::set_len`] override; writes do
    /// not move it.
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Override the declared length. A logical override only; no
    /// truncate or extend request is sent to the server.
    pub fn set_len(&mut self, length: u64) -> Result<()> {
        if self.closed {
            return Err(SmbError::Closed);
        }
        self.length = length;
        Ok(())
    }

    /// Current logical position
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Move the logical position without touching the server
    pub fn set_position(&mut self, position: u64) {
        self.position = position;
    }

    fn read_inner(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(SmbError::Closed);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let count = buf.len().min(u32::MAX as usize) as u32;
        let offset = self.position;
        let handle = self.handle;
        let retry = self.retry;
        let store = self.connection.store_mut()?;

        match retry.run(|| store.read(handle, offset, count)) {
            Ok(data) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                self.position += n as u64;
                Ok(n)
            }
            Err(RetryError::Status(status)) if status.is_eof() => Ok(0),
            Err(RetryError::Status(status)) => Err(SmbError::Protocol { op: "read", status }),
            Err(RetryError::Timeout { budget, .. }) => Err(SmbError::Timeout { op: "read", budget }),
        }
    }

    fn write_inner(&mut self, buf: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(SmbError::Closed);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let offset = self.position;
        let handle = self.handle;
        let retry = self.retry;
        let store = self.connection.store_mut()?;

        match retry.run(|| store.write(handle, offset, buf)) {
            Ok(written) => {
                self.position += u64::from(written);
                Ok(written as usize)
            }
            Err(RetryError::Status(status)) => Err(SmbError::Protocol { op: "write", status }),
            Err(RetryError::Timeout { budget, .. }) => {
                Err(SmbError::Timeout { op: "write", budget })
            }
        }
    }

    fn seek_inner(&mut self, pos: SeekFrom) -> Result<u64> {
        if self.closed {
            return Err(SmbError::Closed);
        }
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.position) + i128::from(delta),
            SeekFrom::End(delta) => {
                // The end origin resolves against the server's view of the
                // stream, not the declared length.
                let handle = self.handle;
                let store = self.connection.store_mut()?;
                let info = store
                    .query_info(handle)
                    .map_err(|status| SmbError::from_status("query_info", status, ""))?;
                i128::from(info.size) + i128::from(delta)
            }
        };
        if target < 0 || target > i128::from(u64::MAX) {
            return Err(SmbError::InvalidSeek);
        }
        self.position = target as u64;
        Ok(self.position)
    }

    /// Copy from the current position to `dest` until end of file.
    ///
    /// Transfers run through a buffer clamped to the smaller of the
    /// connection's negotiated read and write sizes (or `buffer_size`,
    /// when given and smaller), so arbitrarily large files move in
    /// protocol-sized chunks. Returns the number of bytes copied.
    pub fn copy_to<W: Write>(&mut self, dest: &mut W, buffer_size: Option<usize>) -> Result<u64> {
        if self.closed {
            return Err(SmbError::Closed);
        }
        let clamp = self
            .connection
            .max_read_size()
            .min(self.connection.max_write_size()) as usize;
        let size = match buffer_size {
            Some(requested) if requested > 0 && requested < clamp => requested,
            _ => clamp,
        };
        let mut buf = vec![0u8; size];
        let mut total = 0u64;
        loop {
            let n = self.read_inner(&mut buf)?;
            if n == 0 {
                break;
            }
            dest.write_all(&buf[..n])?;
            total += n as u64;
        }
        Ok(total)
    }

    /// Close the remote handle and dispose the owning connection.
    ///
    /// Idempotent: the first call does the work, every later call is a
    /// no-op. Also invoked on drop, where failures are logged instead of
    /// surfaced so teardown never masks an earlier error.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut result = Ok(());
        if let Ok(store) = self.connection.store_mut() {
            if let Err(status) = store.close(self.handle) {
                result = Err(SmbError::Protocol {
                    op: "close",
                    status,
                });
            }
        }
        self.connection.dispose();
        result
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Read for SmbStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_inner(buf).map_err(Into::into)
    }
}

impl Write for SmbStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_inner(buf).map_err(Into::into)
    }

    /// Writes are not buffered client-side; there is nothing to flush.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for SmbStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.seek_inner(pos).map_err(Into::into)
    }
}

impl Drop for SmbStream {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(error) = self.close() {
                tracing::warn!(%error, "stream cleanup failed during drop");
            }
        }
    }
}

impl std::fmt::Debug for SmbStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmbStream")
            .field("connection", &self.connection)
            .field("handle", &self.handle)
            .field("position", &self.position)
            .field("length", &self.length)
            .field("closed", &self.closed)
            .finish()
    }
}
