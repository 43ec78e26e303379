//! Pure merge of local and remote bookmark state.
//!
//! Conflicts are resolved per bookmark id by last write: the remote copy wins
//! only when its `modified_at` is strictly greater, so ties keep the local
//! copy. Remote tombstones for ids never seen locally are dropped. Other
//! tombstones are carried until they are older than the retention window.

use filemark_types::{Bookmark, SyncMetadata};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Tombstones older than this are dropped by merge.
pub const TOMBSTONE_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Bookmarks plus metadata from one side of a sync.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub bookmarks: Vec<Bookmark>,
    pub metadata: SyncMetadata,
}

/// Merges with the default 30-day tombstone retention.
pub fn merge(local: &SyncSnapshot, remote: Option<&SyncSnapshot>, now_millis: i64) -> SyncSnapshot {
    merge_with_retention(local, remote, now_millis, TOMBSTONE_RETENTION)
}

/// Merges `remote` into `local` as of `now_millis`.
///
/// Output order is remote order first, then local-only bookmarks in local
/// order. The first occurrence of a duplicated id wins. An absent remote
/// returns `local` unchanged.
pub fn merge_with_retention(
    local: &SyncSnapshot,
    remote: Option<&SyncSnapshot>,
    now_millis: i64,
    retention: Duration,
) -> SyncSnapshot {
    let Some(remote) = remote else {
        return local.clone();
    };

    let retention_millis = i64::try_from(retention.as_millis()).unwrap_or(i64::MAX);
    let cutoff = now_millis.saturating_sub(retention_millis);
    let retained = |b: &Bookmark| !b.is_deleted || b.modified_at > cutoff;

    let mut local_by_id: HashMap<&str, &Bookmark> = HashMap::with_capacity(local.bookmarks.len());
    for bookmark in &local.bookmarks {
        local_by_id.entry(bookmark.id.as_str()).or_insert(bookmark);
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(local.bookmarks.len() + remote.bookmarks.len());
    let mut merged = Vec::with_capacity(local.bookmarks.len().max(remote.bookmarks.len()));

    for theirs in &remote.bookmarks {
        if !seen.insert(theirs.id.as_str()) {
            continue;
        }
        match local_by_id.get(theirs.id.as_str()) {
            None => {
                if !theirs.is_deleted {
                    merged.push(theirs.clone());
                }
            }
            Some(ours) => {
                let winner = if theirs.modified_at > ours.modified_at {
                    theirs
                } else {
                    *ours
                };
                if retained(winner) {
                    merged.push(winner.clone());
                }
            }
        }
    }

    for ours in &local.bookmarks {
        if seen.insert(ours.id.as_str()) && retained(ours) {
            merged.push(ours.clone());
        }
    }

    SyncSnapshot {
        bookmarks: merged,
        metadata: SyncMetadata {
            last_modified_time: now_millis,
            version: local.metadata.version.max(remote.metadata.version),
            ..local.metadata.clone()
        },
    }
}
