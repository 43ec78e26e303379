//! Shared fakes for sync integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use filemark_storage::{BookmarkStore, MemoryKeyValueStore};
use filemark_sync::{
    Authority, BookmarkSyncEngine, EndpointRegistry, ManualScheduler, RemoteFileSystem,
    RemoteLocation, StaticSettings, SyncError, SyncResult, SyncSettings, TransientEndpoint,
};
use filemark_types::codec::RemoteBookmarks;
use filemark_types::{Bookmark, ManualClock, SyncMetadata};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

pub const T0: i64 = 1_700_000_000_000;
pub const URL: &str = "https://dav.example.com/remote.php/webdav";
pub const REMOTE_DIR: &str = "/remote.php/webdav/bookmarks";
pub const REMOTE_BOOKMARKS: &str = "/remote.php/webdav/bookmarks/bookmarks.json";
pub const REMOTE_METADATA: &str = "/remote.php/webdav/bookmarks/.sync_metadata.json";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("filemark_sync=debug"))
        .with_test_writer()
        .try_init();
}

// ── In-memory remote ────────────────────────────────────────────

/// Remote store keyed by percent-encoded path.
#[derive(Default)]
pub struct MemoryRemote {
    files: Mutex<HashMap<String, Vec<u8>>>,
    dirs: Mutex<HashSet<String>>,
    registered: Mutex<Vec<Authority>>,
    pub registrations: AtomicUsize,
    /// Highest number of endpoints registered at once, i.e. overlapping cycles.
    pub max_concurrent_registrations: AtomicUsize,
    pub operations: AtomicUsize,
    pub writes: AtomicUsize,
    /// Set when any file operation ran without a registered endpoint.
    pub unauthenticated_ops: AtomicBool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    pause: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
}

impl MemoryRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put_file(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        self.files.lock().unwrap().insert(path.to_string(), bytes.into());
    }

    pub fn put_bookmarks(&self, bookmarks: Vec<Bookmark>) {
        let doc = RemoteBookmarks { bookmarks };
        self.put_file(REMOTE_BOOKMARKS, doc.to_pretty_json().unwrap());
    }

    pub fn put_metadata(&self, metadata: &SyncMetadata) {
        self.put_file(REMOTE_METADATA, serde_json::to_vec_pretty(metadata).unwrap());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn remote_bookmarks(&self) -> Vec<Bookmark> {
        let bytes = self.file(REMOTE_BOOKMARKS).expect("remote bookmarks written");
        RemoteBookmarks::from_slice(&bytes).unwrap().bookmarks
    }

    pub fn remote_metadata(&self) -> SyncMetadata {
        let bytes = self.file(REMOTE_METADATA).expect("remote metadata written");
        serde_json::from_slice(&bytes).unwrap()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.dirs.lock().unwrap().contains(path)
    }

    pub fn active_registrations(&self) -> usize {
        self.registered.lock().unwrap().len()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes the next file operation signal `entered` and wait for `release`.
    pub fn pause_next(&self) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.pause.lock().unwrap() = Some((entered.clone(), release.clone()));
        (entered, release)
    }

    async fn enter(&self) {
        self.operations.fetch_add(1, Ordering::SeqCst);
        if self.registered.lock().unwrap().is_empty() {
            self.unauthenticated_ops.store(true, Ordering::SeqCst);
        }
        let pause = self.pause.lock().unwrap().take();
        if let Some((entered, release)) = pause {
            entered.notify_one();
            release.notified().await;
        }
    }
}

impl EndpointRegistry for MemoryRemote {
    fn add_transient(&self, endpoint: TransientEndpoint) {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        let mut registered = self.registered.lock().unwrap();
        registered.push(endpoint.authority);
        self.max_concurrent_registrations
            .fetch_max(registered.len(), Ordering::SeqCst);
    }

    fn remove_transient(&self, authority: &Authority) {
        self.registered.lock().unwrap().retain(|a| a != authority);
    }
}

#[async_trait]
impl RemoteFileSystem for MemoryRemote {
    async fn exists(&self, location: &RemoteLocation) -> SyncResult<bool> {
        self.enter().await;
        let path = location.path();
        Ok(self.files.lock().unwrap().contains_key(&path) || self.dirs.lock().unwrap().contains(&path))
    }

    async fn create_directories(&self, location: &RemoteLocation) -> SyncResult<()> {
        self.enter().await;
        let mut dirs = self.dirs.lock().unwrap();
        for dir in location.ancestors_and_self() {
            dirs.insert(dir.path());
        }
        Ok(())
    }

    async fn read_all_bytes(&self, location: &RemoteLocation) -> SyncResult<Vec<u8>> {
        self.enter().await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SyncError::Transport(format!("connection reset reading {location}")));
        }
        self.file(&location.path())
            .ok_or_else(|| SyncError::Transport(format!("{location} not found")))
    }

    async fn write(&self, location: &RemoteLocation, bytes: Vec<u8>) -> SyncResult<()> {
        self.enter().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SyncError::Transport(format!("disk full writing {location}")));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.put_file(&location.path(), bytes);
        Ok(())
    }
}

// ── Wiring ──────────────────────────────────────────────────────

pub fn enabled_settings(url: &str) -> SyncSettings {
    SyncSettings {
        enabled: true,
        webdav_url: url.to_string(),
        username: "alice".to_string(),
        password: "s3cret".to_string(),
        sync_path: String::new(),
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<BookmarkStore>,
    pub remote: Arc<MemoryRemote>,
    pub settings: Arc<StaticSettings>,
    pub scheduler: Arc<ManualScheduler>,
    pub engine: Arc<BookmarkSyncEngine>,
}

impl Harness {
    pub fn new(settings: SyncSettings) -> Self {
        init_tracing();
        let clock = Arc::new(ManualClock::new(T0));
        let kv = Arc::new(MemoryKeyValueStore::new());
        let store = Arc::new(BookmarkStore::open(kv, clock.clone()));
        let remote = MemoryRemote::new();
        let settings = Arc::new(StaticSettings::new(settings));
        let scheduler = Arc::new(ManualScheduler::new(clock.clone()));
        let engine = Arc::new(
            BookmarkSyncEngine::new(store.clone(), remote.clone(), settings.clone())
                .with_clock(clock.clone())
                .with_scheduler(scheduler.clone()),
        );
        Self {
            clock,
            store,
            remote,
            settings,
            scheduler,
            engine,
        }
    }

    pub fn configured() -> Self {
        Self::new(enabled_settings(URL))
    }
}

pub fn bookmark(id: &str, modified_at: i64) -> Bookmark {
    Bookmark {
        id: id.to_string(),
        name: id.to_uppercase(),
        path: format!("/storage/{id}"),
        is_directory: true,
        tags: Vec::new(),
        notes: None,
        created_at: modified_at.min(1),
        modified_at,
        show_in_sidebar: false,
        is_deleted: false,
    }
}

pub fn tombstone(id: &str, modified_at: i64) -> Bookmark {
    Bookmark {
        is_deleted: true,
        ..bookmark(id, modified_at)
    }
}
