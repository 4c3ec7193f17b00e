/*!
 * Path-based metadata operations
 *
 * Thin `std::fs`-shaped calls over shares: each one resolves a
 * connection through the caller's credential scope, performs a direct
 * protocol request, closes whatever handle it opened, and disposes the
 * connection before returning.
 */

use crate::connection::Connection;
use crate::credential::CredentialScope;
use crate::error::{Result, SmbError};
use crate::path::SmbPath;
use crate::status::NtStatus;
use crate::store::{AccessMask, CreateDisposition, DirEntry, FileInfo};

fn with_connection<T>(
    scope: &CredentialScope,
    path: &SmbPath,
    f: impl FnOnce(&mut Connection) -> Result<T>,
) -> Result<T> {
    let mut connection = scope.connect(path)?;
    let result = f(&mut connection);
    connection.dispose();
    result
}

fn query_info(connection: &mut Connection, relative: &str) -> Result<FileInfo> {
    let store = connection.store_mut()?;
    let handle = store
        .open(
            relative,
            AccessMask::READ_ATTRIBUTES,
            CreateDisposition::OpenExisting,
        )
        .map_err(|status| SmbError::from_status("open", status, relative))?;
    let info = store.query_info(handle);
    store.close(handle).ok();
    info.map_err(|status| SmbError::from_status("query_info", status, relative))
}

/// Size, kind, and timestamps of a file or directory
pub fn metadata(scope: &CredentialScope, path: &SmbPath) -> Result<FileInfo> {
    with_connection(scope, path, |connection| {
        query_info(connection, path.relative())
    })
}

/// Whether the path names an existing file or directory
pub fn exists(scope: &CredentialScope, path: &SmbPath) -> Result<bool> {
    match metadata(scope, path) {
        Ok(_) => Ok(true),
        Err(error) if error.is_not_found() => Ok(false),
        Err(error) => Err(error),
    }
}

/// List a directory's immediate children
pub fn read_dir(scope: &CredentialScope, path: &SmbPath) -> Result<Vec<DirEntry>> {
    with_connection(scope, path, |connection| {
        connection
            .store_mut()?
            .list(path.relative())
            .map_err(|status| SmbError::from_status("list", status, path.relative()))
    })
}

/// Create a directory. The parent must already exist.
pub fn create_dir(scope: &CredentialScope, path: &SmbPath) -> Result<()> {
    with_connection(scope, path, |connection| {
        connection
            .store_mut()?
            .create_directory(path.relative())
            .map_err(|status| SmbError::from_status("create_directory", status, path.relative()))
    })
}

/// Delete a file
pub fn remove_file(scope: &CredentialScope, path: &SmbPath) -> Result<()> {
    with_connection(scope, path, |connection| {
        let info = query_info(connection, path.relative())?;
        if info.is_directory {
            return Err(SmbError::Protocol {
                op: "delete",
                status: NtStatus::FILE_IS_A_DIRECTORY,
            });
        }
        connection
            .store_mut()?
            .delete(path.relative())
            .map_err(|status| SmbError::from_status("delete", status, path.relative()))
    })
}

/// Delete an empty directory
pub fn remove_dir(scope: &CredentialScope, path: &SmbPath) -> Result<()> {
    with_connection(scope, path, |connection| {
        let info = query_info(connection, path.relative())?;
        if !info.is_directory {
            return Err(SmbError::Protocol {
                op: "delete",
                status: NtStatus::NOT_A_DIRECTORY,
            });
        }
        connection
            .store_mut()?
            .delete(path.relative())
            .map_err(|status| SmbError::from_status("delete", status, path.relative()))
    })
}

/// Rename within one share
pub fn rename(scope: &CredentialScope, from: &SmbPath, to: &SmbPath) -> Result<()> {
    if !from.server().eq_ignore_ascii_case(to.server())
        || !from.share().eq_ignore_ascii_case(to.share())
    {
        return Err(SmbError::Unsupported("rename across shares"));
    }
    with_connection(scope, from, |connection| {
        connection
            .store_mut()?
            .rename(from.relative(), to.relative())
            .map_err(|status| SmbError::from_status("rename", status, from.relative()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmbConfig;
    use crate::credential::Credential;
    use crate::memory::{MemoryConnector, MemoryShare};
    use std::sync::Arc;

    fn setup() -> (MemoryShare, CredentialScope) {
        let connector = Arc::new(MemoryConnector::new());
        let share = connector.add_share("host", "data");
        let scope = CredentialScope::new(
            Credential::anonymous(),
            SmbPath::parse(r"\\host\data").unwrap(),
            connector,
            SmbConfig::default(),
        );
        (share, scope)
    }

    fn p(path: &str) -> SmbPath {
        SmbPath::parse(path).unwrap()
    }

    #[test]
    fn test_metadata_of_file_and_directory() {
        let (share, scope) = setup();
        share.put_file(r"docs\a.txt", b"hello");

        let info = metadata(&scope, &p(r"\\host\data\docs\a.txt")).unwrap();
        assert_eq!(info.size, 5);
        assert!(!info.is_directory);
        assert!(info.modified.is_some());

        let info = metadata(&scope, &p(r"\\host\data\docs")).unwrap();
        assert!(info.is_directory);
    }

    #[test]
    fn test_metadata_missing_is_not_found() {
        let (_share, scope) = setup();
        let err = metadata(&scope, &p(r"\\host\data\nope")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_exists() {
        let (share, scope) = setup();
        share.put_file("f.txt", b"x");
        assert!(exists(&scope, &p(r"\\host\data\f.txt")).unwrap());
        assert!(!exists(&scope, &p(r"\\host\data\g.txt")).unwrap());
    }

    #[test]
    fn test_read_dir() {
        let (share, scope) = setup();
        share.put_file(r"docs\a.txt", b"a");
        share.put_file(r"docs\b.txt", b"bb");

        let entries = read_dir(&scope, &p(r"\\host\data\docs")).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert_eq!(entries[1].info.size, 2);
    }

    #[test]
    fn test_create_and_remove_dir() {
        let (_share, scope) = setup();
        let dir = p(r"\\host\data\new");
        create_dir(&scope, &dir).unwrap();
        assert!(exists(&scope, &dir).unwrap());

        // Creating it again collides
        assert!(matches!(
            create_dir(&scope, &dir),
            Err(SmbError::Protocol { .. })
        ));

        remove_dir(&scope, &dir).unwrap();
        assert!(!exists(&scope, &dir).unwrap());
    }

    #[test]
    fn test_remove_file_rejects_directory() {
        let (share, scope) = setup();
        share.put_file(r"docs\a.txt", b"a");

        let err = remove_file(&scope, &p(r"\\host\data\docs")).unwrap_err();
        assert!(matches!(err, SmbError::Protocol { op: "delete", .. }));

        remove_file(&scope, &p(r"\\host\data\docs\a.txt")).unwrap();
        assert!(!exists(&scope, &p(r"\\host\data\docs\a.txt")).unwrap());
    }

    #[test]
    fn test_remove_dir_rejects_file() {
        let (share, scope) = setup();
        share.put_file("f.txt", b"x");
        let err = remove_dir(&scope, &p(r"\\host\data\f.txt")).unwrap_err();
        assert!(matches!(err, SmbError::Protocol { op: "delete", .. }));
    }

    #[test]
    fn test_rename() {
        let (share, scope) = setup();
        share.put_file("old.txt", b"contents");
        rename(
            &scope,
            &p(r"\\host\data\old.txt"),
            &p(r"\\host\data\new.txt"),
        )
        .unwrap();
        assert_eq!(share.file("new.txt").unwrap(), b"contents");
        assert!(share.file("old.txt").is_none());
    }

    #[test]
    fn test_rename_across_shares_unsupported() {
        let (_share, scope) = setup();
        let err = rename(
            &scope,
            &p(r"\\host\data\f"),
            &p(r"\\host\other\f"),
        )
        .unwrap_err();
        assert!(matches!(err, SmbError::Unsupported(_)));
    }

    #[test]
    fn test_each_operation_disposes_its_connection() {
        let (share, scope) = setup();
        share.put_file("f.txt", b"x");
        metadata(&scope, &p(r"\\host\data\f.txt")).unwrap();
        read_dir(&scope, &p(r"\\host\data")).unwrap();
        assert_eq!(share.logoff_calls(), 2);
    }
}
