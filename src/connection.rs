/*!
 * Connection lifecycle
 *
 * A `Connection` binds one authenticated session and tree connect to one
 * share. It is created by a `CredentialScope`, then handed whole to the
 * stream or metadata operation that uses it; whoever holds it last
 * disposes it, exactly once.
 */

use std::time::Duration;

use crate::error::{Result, SmbError};
use crate::path::SmbPath;
use crate::store::FileStore;

/// One live session against one share.
///
/// The negotiated maximum read/write sizes are queried once at
/// establishment and cached for the connection's lifetime. Disposal logs
/// off and releases the transport; it is idempotent, runs on drop as a
/// fallback, and a logoff failure is reported to the log rather than to
/// the caller (teardown must never mask the error that triggered it).
pub struct Connection {
    target: SmbPath,
    store: Box<dyn FileStore>,
    max_read_size: u32,
    max_write_size: u32,
    session_timeout: Duration,
    disposed: bool,
}

impl Connection {
    /// Wrap an established session. `target` identifies the share; the
    /// relative part of the path is ignored.
    pub fn establish(
        target: &SmbPath,
        store: Box<dyn FileStore>,
        session_timeout: Duration,
    ) -> Result<Connection> {
        let target = SmbPath::from_parts(target.server(), target.share(), "")?;
        let max_read_size = store.max_read_size();
        let max_write_size = store.max_write_size();
        tracing::debug!(
            share = %target,
            max_read_size,
            max_write_size,
            "session established"
        );
        Ok(Connection {
            target,
            store,
            max_read_size,
            max_write_size,
            session_timeout,
            disposed: false,
        })
    }

    /// Share this connection is bound to (always a share root)
    pub fn target(&self) -> &SmbPath {
        &self.target
    }

    /// Negotiated maximum single-read size, in bytes
    pub fn max_read_size(&self) -> u32 {
        self.max_read_size
    }

    /// Negotiated maximum single-write size, in bytes
    pub fn max_write_size(&self) -> u32 {
        self.max_write_size
    }

    /// Pending-retry budget for operations on this connection
    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Access the underlying session; fails fast once disposed.
    pub(crate) fn store_mut(&mut self) -> Result<&mut dyn FileStore> {
        if self.disposed {
            return Err(SmbError::Closed);
        }
        Ok(self.store.as_mut())
    }

    /// Log off and release the transport. Safe to call more than once;
    /// every call after the first is a no-op.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        match self.store.logoff() {
            Ok(()) => tracing::debug!(share = %self.target, "session disposed"),
            Err(status) => {
                tracing::warn!(share = %self.target, %status, "logoff failed during dispose");
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("target", &self.target)
            .field("max_read_size", &self.max_read_size)
            .field("max_write_size", &self.max_write_size)
            .field("session_timeout", &self.session_timeout)
            .field("disposed", &self.disposed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryShare;

    fn test_connection(share: &MemoryShare) -> Connection {
        let target = SmbPath::parse(r"\\host\data").unwrap();
        Connection::establish(&target, Box::new(share.store()), Duration::from_secs(45)).unwrap()
    }

    #[test]
    fn test_limits_cached_at_establishment() {
        let share = MemoryShare::new();
        share.set_limits(4096, 2048);
        let connection = test_connection(&share);
        assert_eq!(connection.max_read_size(), 4096);
        assert_eq!(connection.max_write_size(), 2048);

        // Later server-side changes don't reach an established connection
        share.set_limits(1, 1);
        assert_eq!(connection.max_read_size(), 4096);
    }

    #[test]
    fn test_target_is_share_root() {
        let share = MemoryShare::new();
        let target = SmbPath::parse(r"\\host\data\deep\file.txt").unwrap();
        let connection =
            Connection::establish(&target, Box::new(share.store()), Duration::from_secs(1))
                .unwrap();
        assert_eq!(connection.target().unc(), r"\\host\data");
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let share = MemoryShare::new();
        let mut connection = test_connection(&share);
        assert!(!connection.is_disposed());

        connection.dispose();
        assert!(connection.is_disposed());
        connection.dispose();
        assert!(connection.is_disposed());
        assert_eq!(share.logoff_calls(), 1);
    }

    #[test]
    fn test_store_access_fails_after_dispose() {
        let share = MemoryShare::new();
        let mut connection = test_connection(&share);
        connection.dispose();
        assert!(matches!(connection.store_mut(), Err(SmbError::Closed)));
    }

    #[test]
    fn test_drop_logs_off() {
        let share = MemoryShare::new();
        {
            let _connection = test_connection(&share);
        }
        assert_eq!(share.logoff_calls(), 1);
    }
}
