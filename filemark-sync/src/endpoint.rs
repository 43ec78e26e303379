//! Remote endpoint parsing and path resolution.

use crate::error::{SyncError, SyncResult};
use reqwest::Url;
use std::fmt;

/// WebDAV transfer protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Plain HTTP.
    Dav,
    /// HTTP over TLS.
    Davs,
}

impl Protocol {
    /// Maps a URL scheme to a protocol, case-insensitively.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "https" | "webdavs" | "davs" => Some(Protocol::Davs),
            "http" | "webdav" | "dav" => Some(Protocol::Dav),
            _ => None,
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Dav => 80,
            Protocol::Davs => 443,
        }
    }

    pub fn http_scheme(self) -> &'static str {
        match self {
            Protocol::Dav => "http",
            Protocol::Davs => "https",
        }
    }
}

/// Server identity credentials are registered under.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Authority {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    pub username: String,
}

impl Authority {
    /// `scheme://host[:port]`, omitting the protocol's default port.
    pub fn base_url(&self) -> String {
        let scheme = self.protocol.http_scheme();
        if self.port == self.protocol.default_port() {
            format!("{scheme}://{}", self.host)
        } else {
            format!("{scheme}://{}:{}", self.host, self.port)
        }
    }
}

/// Parsed form of the configured WebDAV URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub authority: Authority,
    /// Decoded URL path without leading or trailing slashes.
    pub base_path: String,
}

impl RemoteEndpoint {
    /// Directory holding the sync files: `<base path>/<sync path>`.
    pub fn sync_dir(&self, sync_path: &str) -> RemoteLocation {
        RemoteLocation::root(self.authority.clone())
            .resolve(&self.base_path)
            .resolve(sync_path)
    }
}

/// Parses a WebDAV URL. No network access.
///
/// `http`/`webdav`/`dav` map to plain DAV and `https`/`webdavs`/`davs` to
/// DAV over TLS; the port defaults per protocol.
pub fn parse_remote_url(url: &str, username: &str) -> SyncResult<RemoteEndpoint> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| SyncError::InvalidConfig(format!("invalid WebDAV URL {url:?}: {e}")))?;

    let protocol = Protocol::from_scheme(parsed.scheme()).ok_or_else(|| {
        SyncError::InvalidConfig(format!(
            "unsupported WebDAV URL scheme {:?}, use http:// or https://",
            parsed.scheme()
        ))
    })?;

    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| SyncError::InvalidConfig(format!("WebDAV URL {url:?} has no host")))?;

    let port = parsed.port().unwrap_or(protocol.default_port());

    let base_path = parsed
        .path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(|s| urlencoding::decode(s).map(|d| d.into_owned()))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()
        .map_err(|e| SyncError::InvalidConfig(format!("WebDAV URL path is not UTF-8: {e}")))?
        .unwrap_or_default()
        .join("/");

    Ok(RemoteEndpoint {
        authority: Authority {
            protocol,
            host: host.to_string(),
            port,
            username: username.to_string(),
        },
        base_path,
    })
}

/// Absolute location on a WebDAV server, kept as decoded path segments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteLocation {
    authority: Authority,
    segments: Vec<String>,
}

impl RemoteLocation {
    pub fn root(authority: Authority) -> Self {
        Self {
            authority,
            segments: Vec::new(),
        }
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Appends the `/`-separated components of `relative`, ignoring empty ones.
    pub fn resolve(&self, relative: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(
            relative
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        Self {
            authority: self.authority.clone(),
            segments,
        }
    }

    /// Every location from the first segment down to `self`.
    pub fn ancestors_and_self(&self) -> impl Iterator<Item = RemoteLocation> + '_ {
        (1..=self.segments.len()).map(|n| RemoteLocation {
            authority: self.authority.clone(),
            segments: self.segments[..n].to_vec(),
        })
    }

    /// Percent-encoded absolute path, `/` for the root.
    pub fn path(&self) -> String {
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            path.push_str(&urlencoding::encode(segment));
        }
        if path.is_empty() {
            path.push('/');
        }
        path
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.authority.base_url(), self.path())
    }

    /// URL with a trailing slash, as WebDAV expects for collections.
    pub fn collection_url(&self) -> String {
        let url = self.url();
        if url.ends_with('/') { url } else { format!("{url}/") }
    }
}

impl fmt::Display for RemoteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}
