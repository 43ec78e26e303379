//! Sync settings and engine configuration.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Remote sub-directory used when no sync path is configured.
pub const DEFAULT_SYNC_PATH: &str = "/bookmarks/";

/// User-facing sync settings. Read-only to the engine.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub enabled: bool,
    /// WebDAV base URL, e.g. `https://dav.example.com/remote.php/webdav`.
    pub webdav_url: String,
    pub username: String,
    pub password: String,
    /// Sub-path under the base URL holding the sync files.
    pub sync_path: String,
}

impl fmt::Debug for SyncSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSettings")
            .field("enabled", &self.enabled)
            .field("webdav_url", &self.webdav_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("sync_path", &self.sync_path)
            .finish()
    }
}

impl SyncSettings {
    pub fn trimmed_url(&self) -> &str {
        self.webdav_url.trim()
    }

    /// Enabled and pointing somewhere.
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.trimmed_url().is_empty()
    }

    pub fn effective_sync_path(&self) -> &str {
        if self.sync_path.is_empty() {
            DEFAULT_SYNC_PATH
        } else {
            &self.sync_path
        }
    }

    /// Checks the sync preconditions. Failing ones decline the sync.
    pub fn ensure_ready(&self) -> SyncResult<()> {
        if !self.enabled {
            return Err(SyncError::Declined("Sync is not enabled".into()));
        }
        if self.trimmed_url().is_empty() {
            return Err(SyncError::Declined("WebDAV URL is not configured".into()));
        }
        Ok(())
    }
}

/// Source of the current sync settings.
pub trait SettingsProvider: Send + Sync {
    fn current(&self) -> SyncSettings;
}

/// In-memory settings that can be changed at runtime.
#[derive(Debug, Default)]
pub struct StaticSettings {
    inner: RwLock<SyncSettings>,
}

impl StaticSettings {
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    pub fn set(&self, settings: SyncSettings) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    pub fn update(&self, f: impl FnOnce(&mut SyncSettings)) {
        f(&mut self.inner.write().unwrap_or_else(PoisonError::into_inner));
    }
}

impl SettingsProvider for StaticSettings {
    fn current(&self) -> SyncSettings {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Tuning for the sync engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Minimum spacing between automatic sync starts.
    pub auto_sync_debounce: Duration,
    /// How long tombstones survive merges.
    pub tombstone_retention: Duration,
    /// Remote bookmark file name.
    pub bookmarks_file: String,
    /// Remote metadata file name.
    pub metadata_file: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_sync_debounce: Duration::from_secs(5),
            tombstone_retention: crate::merge::TOMBSTONE_RETENTION,
            bookmarks_file: "bookmarks.json".to_string(),
            metadata_file: ".sync_metadata.json".to_string(),
        }
    }
}
