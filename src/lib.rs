/*!
 * smbfs - SMB/CIFS shares behind a standard filesystem-style interface
 *
 * Open, read, write, seek, enumerate, and manage files on remote shares
 * with ordinary path-based calls:
 * - Seekable, retrying byte streams over remote file handles
 * - Per-share connection and credential lifecycle management
 * - UNC and smb:// path resolution
 * - std::fs-shaped metadata operations (stat, list, create, delete, rename)
 * - Pluggable protocol sessions: in-memory shares for tests and emulation,
 *   a native SMB2/3 wire client behind the `smb-native` feature
 */

pub mod config;
pub mod connection;
pub mod credential;
pub mod error;
pub mod fs;
pub mod logging;
pub mod memory;
pub mod path;
pub mod retry;
pub mod status;
pub mod store;
pub mod stream;

#[cfg(feature = "smb-native")]
pub mod native;


// Re-export commonly used types
pub use config::SmbConfig;
pub use connection::Connection;
pub use credential::{Connector, Credential, CredentialScope, Secret};
pub use error::{Result, SmbError};
pub use memory::{MemoryConnector, MemoryShare};
pub use path::SmbPath;
pub use status::NtStatus;
pub use store::{AccessMask, CreateDisposition, DirEntry, FileHandle, FileInfo, FileStore};
pub use stream::{OpenMode, SmbStream};

#[cfg(feature = "smb-native")]
pub use native::NativeConnector;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod version_tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
