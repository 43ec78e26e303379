//! Per-installation sync metadata.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current schema/protocol version written by this build.
pub const CURRENT_VERSION: u32 = 1;

/// Sync freshness record, one per local store.
///
/// `device_id` is generated once by [`SyncMetadata::create`] and never changes.
/// `last_modified_time` is stamped on every local mutation; `last_sync_time`
/// and `version` are updated after each successful sync.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    /// Epoch millis of the last successful sync (0 = never synced).
    pub last_sync_time: i64,
    pub device_id: String,
    pub version: u32,
    #[serde(default)]
    pub last_modified_time: i64,
}

impl SyncMetadata {
    /// First-run metadata with a fresh device id.
    pub fn create(now_millis: i64) -> Self {
        Self {
            last_sync_time: 0,
            device_id: Uuid::new_v4().to_string(),
            version: CURRENT_VERSION,
            last_modified_time: now_millis,
        }
    }

    pub fn has_synced(&self) -> bool {
        self.last_sync_time > 0
    }

    pub fn with_last_modified(mut self, now_millis: i64) -> Self {
        self.last_modified_time = now_millis;
        self
    }

    pub fn with_last_sync(mut self, now_millis: i64) -> Self {
        self.last_sync_time = now_millis;
        self
    }
}
