//! Remote file access seams.
//!
//! The engine talks to the remote store through two traits:
//! [`RemoteFileSystem`] for file operations and [`EndpointRegistry`] for the
//! credentials those operations authenticate with.

use crate::endpoint::{Authority, RemoteLocation};
use crate::error::SyncResult;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Credentialed connection descriptor registered for the duration of a sync.
#[derive(Clone)]
pub struct TransientEndpoint {
    pub authority: Authority,
    pub password: String,
    pub relative_path: String,
    pub name: String,
}

impl fmt::Debug for TransientEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientEndpoint")
            .field("authority", &self.authority)
            .field("password", &"<redacted>")
            .field("relative_path", &self.relative_path)
            .field("name", &self.name)
            .finish()
    }
}

/// Registry of endpoints the transport may authenticate against.
pub trait EndpointRegistry: Send + Sync {
    fn add_transient(&self, endpoint: TransientEndpoint);
    fn remove_transient(&self, authority: &Authority);
}

/// Keeps a transient endpoint registered until dropped.
pub struct EndpointRegistration {
    registry: Arc<dyn EndpointRegistry>,
    authority: Authority,
}

impl EndpointRegistration {
    pub fn register(registry: Arc<dyn EndpointRegistry>, endpoint: TransientEndpoint) -> Self {
        let authority = endpoint.authority.clone();
        debug!("registering transient endpoint {}", authority.base_url());
        registry.add_transient(endpoint);
        Self {
            registry,
            authority,
        }
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }
}

impl Drop for EndpointRegistration {
    fn drop(&mut self) {
        self.registry.remove_transient(&self.authority);
        debug!("removed transient endpoint {}", self.authority.base_url());
    }
}

/// File operations on the remote store.
#[async_trait]
pub trait RemoteFileSystem: Send + Sync {
    async fn exists(&self, location: &RemoteLocation) -> SyncResult<bool>;

    /// Creates `location` and any missing parents.
    async fn create_directories(&self, location: &RemoteLocation) -> SyncResult<()>;

    async fn read_all_bytes(&self, location: &RemoteLocation) -> SyncResult<Vec<u8>>;

    /// Replaces the whole file.
    async fn write(&self, location: &RemoteLocation, bytes: Vec<u8>) -> SyncResult<()>;
}
