//! WebDAV implementation of the remote file seams.

use crate::endpoint::{Authority, RemoteLocation};
use crate::error::{SyncError, SyncResult};
use crate::transport::{EndpointRegistry, RemoteFileSystem, TransientEndpoint};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// WebDAV client over reqwest.
///
/// Requests carry HTTP Basic credentials from the transient endpoint
/// registered for the location's authority, if any.
pub struct WebDavTransport {
    client: Client,
    endpoints: RwLock<HashMap<Authority, TransientEndpoint>>,
}

impl WebDavTransport {
    pub fn new() -> SyncResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            endpoints: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_registered(&self, authority: &Authority) -> bool {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(authority)
    }

    pub fn registered_count(&self) -> usize {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn request(&self, method: Method, location: &RemoteLocation, url: String) -> RequestBuilder {
        let builder = self.client.request(method, url);
        let endpoints = self.endpoints.read().unwrap_or_else(PoisonError::into_inner);
        match endpoints.get(location.authority()) {
            Some(endpoint) => {
                builder.basic_auth(&endpoint.authority.username, Some(&endpoint.password))
            }
            None => builder,
        }
    }
}

fn dav_method(name: &str) -> SyncResult<Method> {
    Method::from_bytes(name.as_bytes())
        .map_err(|e| SyncError::Transport(format!("invalid method {name}: {e}")))
}

fn unexpected(op: &str, location: &RemoteLocation, status: StatusCode) -> SyncError {
    SyncError::Transport(format!("{op} {location} failed with status {status}"))
}

impl EndpointRegistry for WebDavTransport {
    fn add_transient(&self, endpoint: TransientEndpoint) {
        self.endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(endpoint.authority.clone(), endpoint);
    }

    fn remove_transient(&self, authority: &Authority) {
        self.endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(authority);
    }
}

#[async_trait]
impl RemoteFileSystem for WebDavTransport {
    async fn exists(&self, location: &RemoteLocation) -> SyncResult<bool> {
        let resp = self
            .request(dav_method("PROPFIND")?, location, location.url())
            .header("Depth", "0")
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(unexpected("PROPFIND", location, s)),
        }
    }

    /// Creates the missing tail of `location`.
    ///
    /// Walks up with PROPFIND to the nearest existing collection and sends
    /// MKCOL only below it, so nothing is created above a base path the
    /// account cannot write to.
    async fn create_directories(&self, location: &RemoteLocation) -> SyncResult<()> {
        let mut missing = Vec::new();
        let chain: Vec<RemoteLocation> = location.ancestors_and_self().collect();
        for (depth, dir) in chain.into_iter().rev().enumerate() {
            match self.exists(&dir).await {
                Ok(true) => break,
                Ok(false) => missing.push(dir),
                Err(e) if depth == 0 => return Err(e),
                Err(e) => {
                    debug!("treating {dir} as existing, cannot inspect it: {e}");
                    break;
                }
            }
        }

        for dir in missing.into_iter().rev() {
            let resp = self
                .request(dav_method("MKCOL")?, &dir, dir.collection_url())
                .send()
                .await?;

            match resp.status() {
                s if s.is_success() => debug!("created remote directory {dir}"),
                // Collection already exists
                StatusCode::METHOD_NOT_ALLOWED => {}
                s => return Err(unexpected("MKCOL", &dir, s)),
            }
        }
        Ok(())
    }

    async fn read_all_bytes(&self, location: &RemoteLocation) -> SyncResult<Vec<u8>> {
        let resp = self
            .request(Method::GET, location, location.url())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(unexpected("GET", location, status));
        }

        let bytes = resp.bytes().await?.to_vec();
        debug!("downloaded {} bytes from {location}", bytes.len());
        Ok(bytes)
    }

    async fn write(&self, location: &RemoteLocation, bytes: Vec<u8>) -> SyncResult<()> {
        let size = bytes.len();
        let resp = self
            .request(Method::PUT, location, location.url())
            .body(bytes)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(unexpected("PUT", location, status));
        }

        debug!("uploaded {size} bytes to {location}");
        Ok(())
    }
}
