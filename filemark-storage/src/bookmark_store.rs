//! Authoritative local bookmark store.
//!
//! Every mutation, from a single `add` to a whole-collection sync commit, runs
//! inside one critical section that persists the `bookmarks` and
//! `sync_metadata` blobs in one write, swaps the in-memory state and publishes
//! a new immutable snapshot. Readers never observe a partially written
//! collection, and a failed write leaves both memory and disk untouched.

use crate::error::{StorageError, StorageResult};
use crate::kv::KeyValueStore;
use filemark_types::codec::{self, ExportDocument};
use filemark_types::{Bookmark, Clock, SyncMetadata};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Key of the bookmark collection blob.
pub const KEY_BOOKMARKS: &str = "bookmarks";
/// Key of the sync metadata blob.
pub const KEY_SYNC_METADATA: &str = "sync_metadata";

/// Immutable view of the whole collection, tombstones included.
pub type BookmarkSnapshot = Arc<Vec<Bookmark>>;

struct StoreState {
    bookmarks: BookmarkSnapshot,
    metadata: SyncMetadata,
}

/// Local-first bookmark store over a [`KeyValueStore`].
pub struct BookmarkStore {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    state: Mutex<StoreState>,
    bookmarks_tx: watch::Sender<BookmarkSnapshot>,
    metadata_tx: watch::Sender<SyncMetadata>,
}

impl BookmarkStore {
    /// Creates a store with empty in-memory state. Call [`Self::load`] or
    /// [`Self::spawn_load`] before mutating it.
    pub fn new(kv: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let metadata = SyncMetadata::create(clock.now_millis());
        let bookmarks: BookmarkSnapshot = Arc::new(Vec::new());
        let (bookmarks_tx, _) = watch::channel(Arc::clone(&bookmarks));
        let (metadata_tx, _) = watch::channel(metadata.clone());
        Self {
            kv,
            clock,
            state: Mutex::new(StoreState {
                bookmarks,
                metadata,
            }),
            bookmarks_tx,
            metadata_tx,
        }
    }

    /// Creates a store and loads persisted state on the calling thread.
    pub fn open(kv: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let store = Self::new(kv, clock);
        store.load();
        store
    }

    /// Loads persisted state on the blocking pool. Subscribers receive the
    /// loaded collection through the usual snapshot stream.
    pub fn spawn_load(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || store.load())
    }

    /// Reads both blobs from the key-value store.
    ///
    /// Unreadable bookmarks degrade to an empty collection; the stored blob is
    /// left as is. Missing metadata is created and persisted so the device id
    /// survives restarts.
    pub fn load(&self) {
        let mut state = self.lock_state();
        let bookmarks = self.read_bookmarks();
        let metadata = self.read_metadata();

        info!(
            "loaded {} bookmarks (device {})",
            bookmarks.len(),
            metadata.device_id
        );

        let snapshot = Arc::new(bookmarks);
        state.bookmarks = Arc::clone(&snapshot);
        state.metadata = metadata.clone();
        self.bookmarks_tx.send_replace(snapshot);
        self.metadata_tx.send_replace(metadata);
    }

    fn read_bookmarks(&self) -> Vec<Bookmark> {
        match self.kv.get(KEY_BOOKMARKS) {
            Ok(Some(json)) => match codec::bookmarks_from_json(&json) {
                Ok(bookmarks) => bookmarks.into_iter().map(Bookmark::normalized).collect(),
                Err(e) => {
                    warn!("stored bookmarks are unreadable, starting empty: {e}");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("failed to read stored bookmarks, starting empty: {e}");
                Vec::new()
            }
        }
    }

    fn read_metadata(&self) -> SyncMetadata {
        let now = self.clock.now_millis();
        match self.kv.get(KEY_SYNC_METADATA) {
            Ok(Some(json)) => codec::metadata_from_json(&json).unwrap_or_else(|e| {
                warn!("stored sync metadata is unreadable, using fresh metadata: {e}");
                SyncMetadata::create(now)
            }),
            Ok(None) => {
                let metadata = SyncMetadata::create(now);
                let persisted = codec::metadata_to_json(&metadata)
                    .map_err(StorageError::from)
                    .and_then(|json| self.kv.put(KEY_SYNC_METADATA, &json));
                if let Err(e) = persisted {
                    warn!("failed to persist initial sync metadata: {e}");
                }
                metadata
            }
            Err(e) => {
                warn!("failed to read stored sync metadata: {e}");
                SyncMetadata::create(now)
            }
        }
    }

    // ── Reads ──

    /// Every bookmark, tombstones included.
    pub fn list(&self) -> BookmarkSnapshot {
        Arc::clone(&self.lock_state().bookmarks)
    }

    pub fn list_active(&self) -> Vec<Bookmark> {
        self.list().iter().filter(|b| b.is_active()).cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<Bookmark> {
        self.list().iter().find(|b| b.id == id).cloned()
    }

    pub fn find_active_by_path(&self, path: &str) -> Option<Bookmark> {
        self.list()
            .iter()
            .find(|b| b.is_active() && b.path == path)
            .cloned()
    }

    pub fn metadata(&self) -> SyncMetadata {
        self.lock_state().metadata.clone()
    }

    /// Bookmarks and metadata read under the same lock.
    pub fn snapshot(&self) -> (BookmarkSnapshot, SyncMetadata) {
        let state = self.lock_state();
        (Arc::clone(&state.bookmarks), state.metadata.clone())
    }

    pub fn sidebar_directories(&self) -> Vec<Bookmark> {
        self.list()
            .iter()
            .filter(|b| b.is_sidebar_entry())
            .cloned()
            .collect()
    }

    pub fn file_bookmarks(&self) -> Vec<Bookmark> {
        self.list()
            .iter()
            .filter(|b| b.is_active() && !b.is_directory)
            .cloned()
            .collect()
    }

    pub fn by_tag(&self, tag: &str) -> Vec<Bookmark> {
        self.list()
            .iter()
            .filter(|b| b.is_active() && b.has_tag(tag))
            .cloned()
            .collect()
    }

    pub fn all_tags(&self) -> BTreeSet<String> {
        self.list()
            .iter()
            .filter(|b| b.is_active())
            .flat_map(|b| b.tags.iter().cloned())
            .collect()
    }

    // ── Subscriptions ──

    /// Push-based stream of collection snapshots. The current value is
    /// available immediately through `borrow()`.
    pub fn subscribe(&self) -> watch::Receiver<BookmarkSnapshot> {
        self.bookmarks_tx.subscribe()
    }

    pub fn subscribe_metadata(&self) -> watch::Receiver<SyncMetadata> {
        self.metadata_tx.subscribe()
    }

    // ── Mutations ──

    /// Appends a bookmark. Returns the stored (normalized) record.
    pub fn add(&self, bookmark: Bookmark) -> StorageResult<Bookmark> {
        let bookmark = bookmark.normalized();
        let mut state = self.lock_state();
        let mut bookmarks = state.bookmarks.as_ref().clone();
        bookmarks.push(bookmark.clone());
        self.commit_stamped(&mut state, bookmarks)?;
        debug!("added bookmark {} ({})", bookmark.id, bookmark.path);
        Ok(bookmark)
    }

    /// Replaces the bookmark with the same id, stamping `modified_at = now`.
    ///
    /// `id`, `created_at` and `is_directory` are kept from the stored record.
    /// Returns `None` without touching the store when the id is unknown.
    pub fn update(&self, bookmark: Bookmark) -> StorageResult<Option<Bookmark>> {
        let now = self.clock.now_millis();
        let mut state = self.lock_state();
        let Some(index) = state.bookmarks.iter().position(|b| b.id == bookmark.id) else {
            debug!("update ignored, unknown bookmark {}", bookmark.id);
            return Ok(None);
        };

        let mut bookmarks = state.bookmarks.as_ref().clone();
        let existing = &bookmarks[index];
        let updated = Bookmark {
            created_at: existing.created_at,
            is_directory: existing.is_directory,
            modified_at: now,
            ..bookmark
        }
        .normalized();
        bookmarks[index] = updated.clone();
        self.commit_stamped(&mut state, bookmarks)?;
        Ok(Some(updated))
    }

    /// Marks a bookmark as deleted, leaving the tombstone in place for sync.
    pub fn soft_delete(&self, id: &str) -> StorageResult<bool> {
        let now = self.clock.now_millis();
        let mut state = self.lock_state();
        let Some(index) = state.bookmarks.iter().position(|b| b.id == id) else {
            return Ok(false);
        };

        let mut bookmarks = state.bookmarks.as_ref().clone();
        bookmarks[index] = bookmarks[index].clone().tombstoned(now);
        self.commit_stamped(&mut state, bookmarks)?;
        debug!("soft-deleted bookmark {id}");
        Ok(true)
    }

    /// Physically removes a bookmark. Normal user deletes go through
    /// [`Self::soft_delete`] so the deletion can reach other devices.
    pub fn hard_delete(&self, id: &str) -> StorageResult<bool> {
        let mut state = self.lock_state();
        if !state.bookmarks.iter().any(|b| b.id == id) {
            return Ok(false);
        }

        let bookmarks: Vec<Bookmark> = state
            .bookmarks
            .iter()
            .filter(|b| b.id != id)
            .cloned()
            .collect();
        self.commit_stamped(&mut state, bookmarks)?;
        debug!("hard-deleted bookmark {id}");
        Ok(true)
    }

    /// Replaces the whole collection.
    pub fn save(&self, bookmarks: Vec<Bookmark>) -> StorageResult<()> {
        let mut state = self.lock_state();
        self.commit_stamped(&mut state, bookmarks)
    }

    /// Persists metadata without touching the collection.
    pub fn save_metadata(&self, metadata: SyncMetadata) -> StorageResult<()> {
        let mut state = self.lock_state();
        let json = codec::metadata_to_json(&metadata)?;
        self.kv.put(KEY_SYNC_METADATA, &json)?;
        state.metadata = metadata.clone();
        self.metadata_tx.send_replace(metadata);
        Ok(())
    }

    /// Computes a new collection and metadata from the current state and
    /// commits both inside the critical section. Metadata is stored as
    /// returned; bookmarks are normalized like every other commit.
    pub fn replace_with<F>(&self, f: F) -> StorageResult<(BookmarkSnapshot, SyncMetadata)>
    where
        F: FnOnce(&[Bookmark], &SyncMetadata) -> (Vec<Bookmark>, SyncMetadata),
    {
        let mut state = self.lock_state();
        let (bookmarks, metadata) = f(&state.bookmarks, &state.metadata);
        self.commit(&mut state, bookmarks, metadata)?;
        Ok((Arc::clone(&state.bookmarks), state.metadata.clone()))
    }

    // ── Export / import ──

    /// Pretty-printed backup of bookmarks and metadata.
    pub fn export_json(&self) -> StorageResult<String> {
        let (bookmarks, metadata) = self.snapshot();
        let doc = ExportDocument {
            bookmarks: bookmarks.as_ref().clone(),
            sync_metadata: Some(metadata),
        };
        Ok(doc.to_pretty_json()?)
    }

    /// Replaces the collection with a backup, and the metadata too when the
    /// backup carries it. Returns the number of imported bookmarks.
    pub fn import_json(&self, json: &str) -> StorageResult<usize> {
        let doc = ExportDocument::from_json(json)?;
        let count = doc.bookmarks.len();
        let mut state = self.lock_state();
        let metadata = doc
            .sync_metadata
            .unwrap_or_else(|| state.metadata.clone().with_last_modified(self.clock.now_millis()));
        self.commit(&mut state, doc.bookmarks, metadata)?;
        info!("imported {count} bookmarks");
        Ok(count)
    }

    // ── Critical section ──

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit_stamped(&self, state: &mut StoreState, bookmarks: Vec<Bookmark>) -> StorageResult<()> {
        let metadata = state
            .metadata
            .clone()
            .with_last_modified(self.clock.now_millis());
        self.commit(state, bookmarks, metadata)
    }

    fn commit(
        &self,
        state: &mut StoreState,
        bookmarks: Vec<Bookmark>,
        metadata: SyncMetadata,
    ) -> StorageResult<()> {
        let bookmarks: Vec<Bookmark> = bookmarks.into_iter().map(Bookmark::normalized).collect();
        let bookmarks_json = codec::bookmarks_to_json(&bookmarks)?;
        let metadata_json = codec::metadata_to_json(&metadata)?;

        if let Err(e) = self.kv.put_all(&[
            (KEY_BOOKMARKS, bookmarks_json.as_str()),
            (KEY_SYNC_METADATA, metadata_json.as_str()),
        ]) {
            warn!("commit failed, keeping previous state: {e}");
            return Err(e);
        }

        let snapshot = Arc::new(bookmarks);
        state.bookmarks = Arc::clone(&snapshot);
        state.metadata = metadata.clone();
        self.bookmarks_tx.send_replace(snapshot);
        self.metadata_tx.send_replace(metadata);
        Ok(())
    }
}
