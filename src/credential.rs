/*!
 * Credentials and their authorization scope
 *
 * A `CredentialScope` binds a credential to the path prefix it
 * authenticates and to a `Connector` that can establish sessions. Every
 * operation under that prefix resolves its connection through the scope;
 * disposing the scope ends its authority to mint new connections, while
 * connections already handed off finish under their owner's lifecycle.
 */

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use zeroize::Zeroize;

use crate::config::SmbConfig;
use crate::connection::Connection;
use crate::error::{Result, SmbError};
use crate::path::SmbPath;
use crate::store::FileStore;

/// Password material with a redacted `Debug` and memory zeroed on drop.
#[derive(Clone, Default)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Domain, username, and password identifying who connects.
#[derive(Debug, Clone, Default)]
pub struct Credential {
    domain: String,
    username: String,
    password: Secret,
}

impl Credential {
    pub fn new(domain: impl Into<String>, username: impl Into<String>, password: Secret) -> Self {
        Self {
            domain: domain.into(),
            username: username.into(),
            password,
        }
    }

    /// Guest access: empty domain, user, and password
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &Secret {
        &self.password
    }
}

/// Locates or establishes an authenticated, tree-connected session for a
/// share target. This is the seam where a wire client plugs in; tests and
/// local emulation use [`crate::memory::MemoryConnector`].
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        target: &SmbPath,
        credential: &Credential,
        config: &SmbConfig,
    ) -> Result<Box<dyn FileStore>>;
}

/// A credential bound to the path prefix it authenticates.
///
/// Each [`CredentialScope::connect`] call yields an independent
/// [`Connection`]; the scope imposes no pooling. Connections transfer to
/// their consumer (stream or metadata call), which disposes them exactly
/// once; the scope never disposes a connection it handed off.
pub struct CredentialScope {
    credential: Credential,
    prefix: SmbPath,
    connector: Arc<dyn Connector>,
    config: SmbConfig,
    disposed: AtomicBool,
}

impl CredentialScope {
    pub fn new(
        credential: Credential,
        prefix: SmbPath,
        connector: Arc<dyn Connector>,
        config: SmbConfig,
    ) -> Self {
        Self {
            credential,
            prefix,
            connector,
            config,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn prefix(&self) -> &SmbPath {
        &self.prefix
    }

    pub fn config(&self) -> &SmbConfig {
        &self.config
    }

    /// Whether `path` falls under this scope's authenticated prefix
    pub fn covers(&self, path: &SmbPath) -> bool {
        self.prefix.is_prefix_of(path)
    }

    /// Establish a fresh connection for the share `path` lives on.
    ///
    /// Ownership of the returned connection moves to the caller.
    pub fn connect(&self, path: &SmbPath) -> Result<Connection> {
        if self.is_disposed() {
            return Err(SmbError::Closed);
        }
        if !self.covers(path) {
            return Err(SmbError::Permission(format!(
                "{path} is outside the credential scope for {}",
                self.prefix
            )));
        }
        let store = self
            .connector
            .connect(path, &self.credential, &self.config)?;
        Connection::establish(path, store, self.config.session_timeout())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// End this scope's authority to create connections. Idempotent.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }
}

impl fmt::Debug for CredentialScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialScope")
            .field("credential", &self.credential)
            .field("prefix", &self.prefix)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
