//! Native SMB2/3 sessions via the pure-Rust `smb` crate
//!
//! Adapts the async `smb` client onto the synchronous [`FileStore`]
//! contract by driving each request to completion on a private
//! current-thread Tokio runtime. Gated behind the `smb-native` feature
//! and disabled by default.
//!
//! The `smb` crate manages durable wire handles and pending replies
//! internally, so this adapter keys its handles by path and re-opens the
//! remote file per request; it never surfaces `PENDING` itself.

use std::collections::HashMap;
use std::str::FromStr;

use bytes::Bytes;
use smb::{Client, ClientConfig, FileAccessMask, FileCreateArgs, Resource, UncPath};
use tokio::runtime::Runtime;

use crate::config::SmbConfig;
use crate::credential::{Connector, Credential};
use crate::error::{Result, SmbError};
use crate::path::SmbPath;
use crate::status::NtStatus;
use crate::store::{
    AccessMask, CreateDisposition, DirEntry, FileHandle, FileInfo, FileStore,
};

/// Kept safely below every server's negotiated ceiling; the `smb` crate
/// splits larger transfers itself when the session allows more.
const NATIVE_MAX_IO: u32 = 1 << 20;

/// Establishes real sessions over TCP/NetBIOS transports.
pub struct NativeConnector;

impl Connector for NativeConnector {
    fn connect(
        &self,
        target: &SmbPath,
        credential: &Credential,
        _config: &SmbConfig,
    ) -> Result<Box<dyn FileStore>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(SmbError::Io)?;
        let client = Client::new(ClientConfig::default());

        let unc_path_str = format!(r"\\{}\{}", target.server(), target.share());
        let unc_path = UncPath::from_str(&unc_path_str)
            .map_err(|_| SmbError::InvalidPath(unc_path_str.clone()))?;

        let username = if credential.domain().is_empty() {
            credential.username().to_string()
        } else {
            format!(r"{}\{}", credential.domain(), credential.username())
        };

        runtime
            .block_on(client.share_connect(
                &unc_path,
                username.as_str(),
                credential.password().expose().to_string(),
            ))
            .map_err(|e| {
                tracing::error!(share = %unc_path_str, "SMB connection failed: {e:?}");
                SmbError::Connection(format!("failed to connect to {unc_path_str}: {e:?}"))
            })?;

        tracing::info!(share = %unc_path_str, "connected");
        Ok(Box::new(NativeFileStore {
            runtime,
            client,
            server: target.server().to_string(),
            share: target.share().to_string(),
            handles: HashMap::new(),
            next_handle: 1,
        }))
    }
}

struct NativeHandle {
    path: String,
    access: AccessMask,
}

/// One wire-backed session against one share.
pub struct NativeFileStore {
    runtime: Runtime,
    client: Client,
    server: String,
    share: String,
    handles: HashMap<u64, NativeHandle>,
    next_handle: u64,
}

impl NativeFileStore {
    fn unc(&self, path: &str) -> std::result::Result<UncPath, NtStatus> {
        let full = if path.is_empty() {
            format!(r"\\{}\{}", self.server, self.share)
        } else {
            format!(r"\\{}\{}\{}", self.server, self.share, path)
        };
        UncPath::from_str(&full).map_err(|_| NtStatus::OBJECT_PATH_NOT_FOUND)
    }

    fn wire_access(access: AccessMask) -> FileAccessMask {
        let mut mask = FileAccessMask::new();
        if access.contains(AccessMask::READ) || access.contains(AccessMask::READ_ATTRIBUTES) {
            mask = mask.with_generic_read(true);
        }
        if access.contains(AccessMask::WRITE) {
            mask = mask.with_generic_write(true);
        }
        if access.contains(AccessMask::DELETE) {
            mask = mask.with_delete(true);
        }
        mask
    }

    fn open_resource(
        &self,
        path: &str,
        args: &FileCreateArgs,
    ) -> std::result::Result<Resource, NtStatus> {
        let unc = self.unc(path)?;
        self.runtime
            .block_on(self.client.create_file(&unc, args))
            .map_err(|e| {
                tracing::debug!(path, "create_file failed: {e:?}");
                NtStatus::OBJECT_NAME_NOT_FOUND
            })
    }

    fn handle_path(&self, handle: FileHandle) -> std::result::Result<&NativeHandle, NtStatus> {
        self.handles.get(&handle.0).ok_or(NtStatus::INVALID_HANDLE)
    }

    fn path_info(&self, path: &str) -> std::result::Result<FileInfo, NtStatus> {
        let args =
            FileCreateArgs::make_open_existing(FileAccessMask::new().with_generic_read(true));
        let resource = self.open_resource(path, &args)?;
        match resource {
            Resource::File(file) => {
                let size = self
                    .runtime
                    .block_on(file.get_len())
                    .map_err(|_| NtStatus::UNSUCCESSFUL)?;
                self.runtime.block_on(file.close()).ok();
                Ok(FileInfo::file(size))
            }
            Resource::Directory(dir) => {
                self.runtime.block_on(dir.close()).ok();
                Ok(FileInfo::directory())
            }
            Resource::Pipe(pipe) => {
                self.runtime.block_on(pipe.close()).ok();
                Ok(FileInfo::file(0))
            }
        }
    }
}

impl FileStore for NativeFileStore {
    fn open(
        &mut self,
        path: &str,
        access: AccessMask,
        disposition: CreateDisposition,
    ) -> std::result::Result<FileHandle, NtStatus> {
        // Probe (and create/truncate) now so a bad path fails at open time;
        // reads and writes re-open through the smb client per request.
        let probe = match disposition {
            CreateDisposition::OpenExisting => {
                FileCreateArgs::make_open_existing(Self::wire_access(access))
            }
            CreateDisposition::CreateAlways => {
                FileCreateArgs::make_create_always(Self::wire_access(access))
            }
            CreateDisposition::OpenOrCreate => {
                let existing =
                    FileCreateArgs::make_open_existing(Self::wire_access(access));
                match self.open_resource(path, &existing) {
                    Ok(resource) => {
                        close_resource(&self.runtime, resource);
                        let id = self.next_handle;
                        self.next_handle += 1;
                        self.handles.insert(
                            id,
                            NativeHandle {
                                path: path.to_string(),
                                access,
                            },
                        );
                        return Ok(FileHandle(id));
                    }
                    Err(_) => FileCreateArgs::make_create_always(Self::wire_access(access)),
                }
            }
        };
        let resource = self.open_resource(path, &probe)?;
        close_resource(&self.runtime, resource);

        let id = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(
            id,
            NativeHandle {
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
        let entry = self.handle_path(handle)?;
        if !entry.access.contains(AccessMask::READ) {
            return Err(NtStatus::ACCESS_DENIED);
        }
        let path = entry.path.clone();

        let args =
            FileCreateArgs::make_open_existing(FileAccessMask::new().with_generic_read(true));
        let file = match self.open_resource(&path, &args)? {
            Resource::File(file) => file,
            other => {
                close_resource(&self.runtime, other);
                return Err(NtStatus::FILE_IS_A_DIRECTORY);
            }
        };

        let want = count.min(NATIVE_MAX_IO) as usize;
        let mut chunk = vec![0u8; want];
        let read = self
            .runtime
            .block_on(file.read_at(&mut chunk, offset))
            .map_err(|e| {
                tracing::debug!(path, offset, "read failed: {e:?}");
                NtStatus::UNSUCCESSFUL
            });
        self.runtime.block_on(file.close()).ok();

        let read = read?;
        if read == 0 && want > 0 {
            return Err(NtStatus::END_OF_FILE);
        }
        chunk.truncate(read);
        Ok(Bytes::from(chunk))
    }

    fn write(
        &mut self,
        handle: FileHandle,
        offset: u64,
        data: &[u8],
    ) -> std::result::Result<u32, NtStatus> {
        let entry = self.handle_path(handle)?;
        if !entry.access.contains(AccessMask::WRITE) {
            return Err(NtStatus::ACCESS_DENIED);
        }
        let path = entry.path.clone();

        let args =
            FileCreateArgs::make_open_existing(FileAccessMask::new().with_generic_write(true));
        let file = match self.open_resource(&path, &args)? {
            Resource::File(file) => file,
            other => {
                close_resource(&self.runtime, other);
                return Err(NtStatus::FILE_IS_A_DIRECTORY);
            }
        };

        let chunk = &data[..data.len().min(NATIVE_MAX_IO as usize)];
        let written = self
            .runtime
            .block_on(file.write_at(chunk, offset))
            .map(|_| chunk.len() as u32)
            .map_err(|e| {
                tracing::debug!(path, offset, "write failed: {e:?}");
                NtStatus::UNSUCCESSFUL
            });
        self.runtime.block_on(file.close()).ok();
        written
    }

    fn close(&mut self, handle: FileHandle) -> std::result::Result<(), NtStatus> {
        match self.handles.remove(&handle.0) {
            Some(_) => Ok(()),
            None => Err(NtStatus::INVALID_HANDLE),
        }
    }

    fn query_info(&mut self, handle: FileHandle) -> std::result::Result<FileInfo, NtStatus> {
        let path = self.handle_path(handle)?.path.clone();
        self.path_info(&path)
    }

    fn list(&mut self, path: &str) -> std::result::Result<Vec<DirEntry>, NtStatus> {
        let args =
            FileCreateArgs::make_open_existing(FileAccessMask::new().with_generic_read(true));
        let dir = match self.open_resource(path, &args)? {
            Resource::Directory(dir) => dir,
            other => {
                close_resource(&self.runtime, other);
                return Err(NtStatus::NOT_A_DIRECTORY);
            }
        };

        let listed = self.runtime.block_on(dir.list()).map_err(|e| {
            tracing::debug!(path, "list failed: {e:?}");
            NtStatus::UNSUCCESSFUL
        });
        self.runtime.block_on(dir.close()).ok();

        let mut entries = Vec::new();
        for entry in listed? {
            let name = entry.file_name;
            if name == "." || name == ".." {
                continue;
            }
            let child = if path.is_empty() {
                name.clone()
            } else {
                format!(r"{path}\{name}")
            };
            let info = self.path_info(&child).unwrap_or_else(|_| FileInfo::file(0));
            entries.push(DirEntry { name, info });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn create_directory(&mut self, path: &str) -> std::result::Result<(), NtStatus> {
        let args = FileCreateArgs::make_create_directory();
        let resource = self.open_resource(path, &args)?;
        close_resource(&self.runtime, resource);
        Ok(())
    }

    fn delete(&mut self, path: &str) -> std::result::Result<(), NtStatus> {
        // Deletion on close: open with DELETE access, then close.
        let args = FileCreateArgs::make_open_existing(FileAccessMask::new().with_delete(true));
        let resource = self.open_resource(path, &args)?;
        close_resource(&self.runtime, resource);
        Ok(())
    }

    fn rename(&mut self, _from: &str, _to: &str) -> std::result::Result<(), NtStatus> {
        tracing::warn!("rename is not supported by the native adapter");
        Err(NtStatus::NOT_SUPPORTED)
    }

    fn max_read_size(&self) -> u32 {
        NATIVE_MAX_IO
    }

    fn max_write_size(&self) -> u32 {
        NATIVE_MAX_IO
    }

    fn logoff(&mut self) -> std::result::Result<(), NtStatus> {
        // The smb client releases the session and transport on drop.
        self.handles.clear();
        Ok(())
    }
}

fn close_resource(runtime: &Runtime, resource: Resource) {
    match resource {
        Resource::File(file) => {
            runtime.block_on(file.close()).ok();
        }
        Resource::Directory(dir) => {
            runtime.block_on(dir.close()).ok();
        }
        Resource::Pipe(pipe) => {
            runtime.block_on(pipe.close()).ok();
        }
    }
}
