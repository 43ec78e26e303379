//! Sync orchestrator: drives one sync cycle end to end and owns the
//! auto-sync debounce policy.
//!
//! A cycle runs strictly in order: parse the URL, register the transient
//! endpoint, ensure the remote directory, read remote state, merge and commit
//! locally, write remote state. Every failure is turned into a
//! [`SyncReport`] at this boundary.
//!
//! At most one cycle is in flight. A manual [`BookmarkSyncEngine::sync`] that
//! arrives while another cycle runs is rejected with [`SyncError::Busy`];
//! automatic runs wait their turn instead.

use crate::config::{EngineConfig, SettingsProvider, SyncSettings};
use crate::endpoint::{RemoteLocation, parse_remote_url};
use crate::error::{SyncError, SyncReport, SyncResult};
use crate::merge::{SyncSnapshot, merge_with_retention};
use crate::scheduler::{ScheduledTask, Scheduler, TokioScheduler};
use crate::transport::{EndpointRegistration, EndpointRegistry, RemoteFileSystem, TransientEndpoint};
use filemark_storage::BookmarkStore;
use filemark_types::codec::{self, RemoteBookmarks};
use filemark_types::{Clock, SyncMetadata, SystemClock};
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const TRANSIENT_ENDPOINT_NAME: &str = "Bookmark Sync";

/// Engine phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Syncing,
}

/// Published on every phase change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    /// Report of the most recent completed cycle.
    pub last_report: Option<SyncReport>,
}

/// Snapshot for settings screens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncStatusInfo {
    pub enabled: bool,
    pub last_sync_time: i64,
    pub device_id: String,
    pub phase: SyncPhase,
}

/// What [`BookmarkSyncEngine::trigger_auto_sync`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutoSyncDecision {
    /// Sync is disabled or has no URL.
    Skipped,
    /// A sync was scheduled to run now.
    Started,
    /// Inside the debounce window; one sync was scheduled for its end.
    Deferred,
    /// Inside the debounce window with a deferred sync already queued.
    AlreadyPending,
}

#[derive(Default)]
struct AutoSyncState {
    last_sync_start: Option<i64>,
    pending: Option<ScheduledTask>,
}

/// Bookmark sync engine. Construct once at startup and share via `Arc`.
pub struct BookmarkSyncEngine {
    store: Arc<BookmarkStore>,
    files: Arc<dyn RemoteFileSystem>,
    registry: Arc<dyn EndpointRegistry>,
    settings: Arc<dyn SettingsProvider>,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    config: EngineConfig,
    in_flight: tokio::sync::Mutex<()>,
    auto: Mutex<AutoSyncState>,
    status_tx: watch::Sender<SyncStatus>,
}

impl BookmarkSyncEngine {
    /// Creates an engine over a transport that provides both remote file
    /// access and endpoint registration (e.g. `WebDavTransport`).
    pub fn new<T>(store: Arc<BookmarkStore>, transport: Arc<T>, settings: Arc<dyn SettingsProvider>) -> Self
    where
        T: RemoteFileSystem + EndpointRegistry + 'static,
    {
        let files: Arc<dyn RemoteFileSystem> = transport.clone();
        let registry: Arc<dyn EndpointRegistry> = transport;
        Self::with_parts(store, files, registry, settings)
    }

    pub fn with_parts(
        store: Arc<BookmarkStore>,
        files: Arc<dyn RemoteFileSystem>,
        registry: Arc<dyn EndpointRegistry>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        let (status_tx, _) = watch::channel(SyncStatus {
            phase: SyncPhase::Idle,
            last_report: None,
        });
        Self {
            store,
            files,
            registry,
            settings,
            clock: Arc::new(SystemClock),
            scheduler: Arc::new(TokioScheduler::new()),
            config: EngineConfig::default(),
            in_flight: tokio::sync::Mutex::new(()),
            auto: Mutex::new(AutoSyncState::default()),
            status_tx,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &Arc<BookmarkStore> {
        &self.store
    }

    // ── Status ──

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    pub fn is_syncing(&self) -> bool {
        self.status_tx.borrow().phase == SyncPhase::Syncing
    }

    pub fn status_info(&self) -> SyncStatusInfo {
        let metadata = self.store.metadata();
        SyncStatusInfo {
            enabled: self.settings.current().enabled,
            last_sync_time: metadata.last_sync_time,
            device_id: metadata.device_id,
            phase: self.status_tx.borrow().phase,
        }
    }

    // ── Manual sync ──

    /// Runs one sync cycle now.
    ///
    /// Declined when sync is disabled or unconfigured, without touching the
    /// phase. Rejected with `Busy` while another cycle is in flight.
    pub async fn sync(&self) -> SyncReport {
        let settings = self.settings.current();
        if let Err(e) = settings.ensure_ready() {
            debug!("sync declined: {e}");
            return SyncReport::failed(&e);
        }

        let Ok(guard) = self.in_flight.try_lock() else {
            debug!("sync rejected, another sync is in flight");
            return SyncReport::failed(&SyncError::Busy);
        };
        self.run_cycle(guard, settings).await
    }

    /// Runs [`Self::sync`] on the scheduler and hands the report to `callback`.
    pub fn sync_with_callback<F>(self: &Arc<Self>, callback: F) -> ScheduledTask
    where
        F: FnOnce(SyncReport) + Send + 'static,
    {
        let engine = Arc::clone(self);
        self.scheduler.schedule(
            Duration::ZERO,
            Box::pin(async move {
                let report = engine.sync().await;
                callback(report);
            }),
        )
    }

    // ── Auto sync ──

    /// Startup hook: one auto-sync attempt.
    pub fn initialize(self: &Arc<Self>) -> AutoSyncDecision {
        info!("bookmark sync engine initialized");
        self.trigger_auto_sync()
    }

    /// Requests a sync after a local change, coalescing bursts.
    ///
    /// Outside the debounce window of the last sync start the sync is started
    /// right away. Inside it, a single deferred sync is scheduled for the end
    /// of the window; further calls while it is queued do nothing.
    pub fn trigger_auto_sync(self: &Arc<Self>) -> AutoSyncDecision {
        if !self.settings.current().is_configured() {
            return AutoSyncDecision::Skipped;
        }

        let now = self.clock.now_millis();
        let debounce = millis(self.config.auto_sync_debounce);
        let mut auto = self.lock_auto();

        if let Some(last) = auto.last_sync_start {
            let elapsed = now.saturating_sub(last);
            if elapsed < debounce {
                if auto.pending.as_ref().is_some_and(ScheduledTask::is_pending) {
                    return AutoSyncDecision::AlreadyPending;
                }
                let delay = Duration::from_millis(u64::try_from(debounce - elapsed).unwrap_or(0));
                debug!("auto sync deferred by {delay:?}");
                auto.pending = Some(self.scheduler.schedule(delay, self.auto_sync_task(true)));
                return AutoSyncDecision::Deferred;
            }
        }

        auto.last_sync_start = Some(now);
        drop(auto);
        self.scheduler.schedule(Duration::ZERO, self.auto_sync_task(false));
        AutoSyncDecision::Started
    }

    /// Cancels the deferred auto sync if it has not started yet.
    pub fn cancel_pending_auto_sync(&self) -> bool {
        match self.lock_auto().pending.take() {
            Some(task) => task.cancel(),
            None => false,
        }
    }

    fn auto_sync_task(self: &Arc<Self>, deferred: bool) -> BoxFuture<'static, ()> {
        let engine = Arc::clone(self);
        Box::pin(async move {
            if deferred {
                let mut auto = engine.lock_auto();
                auto.pending = None;
                auto.last_sync_start = Some(engine.clock.now_millis());
            }
            let report = engine.run_auto_sync().await;
            if !report.success {
                debug!("auto sync did not succeed: {:?}", report.message);
            }
        })
    }

    async fn run_auto_sync(&self) -> SyncReport {
        let settings = self.settings.current();
        if let Err(e) = settings.ensure_ready() {
            return SyncReport::failed(&e);
        }
        let guard = self.in_flight.lock().await;
        self.run_cycle(guard, settings).await
    }

    // ── Cycle ──

    async fn run_cycle(&self, _guard: tokio::sync::MutexGuard<'_, ()>, settings: SyncSettings) -> SyncReport {
        self.lock_auto().last_sync_start = Some(self.clock.now_millis());
        self.status_tx.send_modify(|s| s.phase = SyncPhase::Syncing);
        info!("bookmark sync started");

        let result = self.perform_sync(&settings).await;
        let report = SyncReport::from(&result);
        match &result {
            Ok(()) => info!("bookmark sync completed"),
            Err(e) => warn!("bookmark sync failed: {e}"),
        }

        self.status_tx.send_replace(SyncStatus {
            phase: SyncPhase::Idle,
            last_report: Some(report.clone()),
        });
        report
    }

    async fn perform_sync(&self, settings: &SyncSettings) -> SyncResult<()> {
        let endpoint = parse_remote_url(settings.trimmed_url(), &settings.username)?;

        let _registration = EndpointRegistration::register(
            Arc::clone(&self.registry),
            TransientEndpoint {
                authority: endpoint.authority.clone(),
                password: settings.password.clone(),
                relative_path: endpoint.base_path.clone(),
                name: TRANSIENT_ENDPOINT_NAME.to_string(),
            },
        );

        let dir = endpoint.sync_dir(settings.effective_sync_path());
        if !self.files.exists(&dir).await? {
            info!("creating remote sync directory {dir}");
            self.files.create_directories(&dir).await?;
        }

        let bookmarks_file = dir.resolve(&self.config.bookmarks_file);
        let metadata_file = dir.resolve(&self.config.metadata_file);

        let remote = self.read_remote(&bookmarks_file, &metadata_file).await?;
        debug!(
            "remote state: {}",
            remote
                .as_ref()
                .map_or_else(|| "absent".to_string(), |r| format!("{} bookmarks", r.bookmarks.len()))
        );

        let now = self.clock.now_millis();
        let retention = self.config.tombstone_retention;
        let store = Arc::clone(&self.store);
        let (bookmarks, metadata) = tokio::task::spawn_blocking(move || {
            store.replace_with(|bookmarks, metadata| {
                let local = SyncSnapshot {
                    bookmarks: bookmarks.to_vec(),
                    metadata: metadata.clone(),
                };
                let merged = merge_with_retention(&local, remote.as_ref(), now, retention);
                (merged.bookmarks, merged.metadata.with_last_sync(now))
            })
        })
        .await??;
        debug!("committed {} merged bookmarks locally", bookmarks.len());

        let document = RemoteBookmarks {
            bookmarks: bookmarks.as_ref().clone(),
        };
        self.files
            .write(&bookmarks_file, document.to_pretty_json()?.into_bytes())
            .await?;
        self.files
            .write(&metadata_file, serde_json::to_vec_pretty(&metadata)?)
            .await?;

        Ok(())
    }

    /// Reads the remote snapshot.
    ///
    /// A missing bookmarks file or undecodable content yields `None`; a
    /// missing metadata file yields fresh metadata. Transport errors propagate.
    async fn read_remote(
        &self,
        bookmarks_file: &RemoteLocation,
        metadata_file: &RemoteLocation,
    ) -> SyncResult<Option<SyncSnapshot>> {
        if !self.files.exists(bookmarks_file).await? {
            debug!("no remote bookmarks at {bookmarks_file}");
            return Ok(None);
        }

        let bytes = self.files.read_all_bytes(bookmarks_file).await?;
        let bookmarks = match RemoteBookmarks::from_slice(&bytes) {
            Ok(doc) => doc.bookmarks,
            Err(e) => {
                warn!("remote bookmarks at {bookmarks_file} are unreadable, syncing local state only: {e}");
                return Ok(None);
            }
        };

        let metadata = if self.files.exists(metadata_file).await? {
            let bytes = self.files.read_all_bytes(metadata_file).await?;
            match codec::metadata_from_json(&String::from_utf8_lossy(&bytes)) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("remote metadata at {metadata_file} is unreadable, syncing local state only: {e}");
                    return Ok(None);
                }
            }
        } else {
            SyncMetadata::create(self.clock.now_millis())
        };

        Ok(Some(SyncSnapshot {
            bookmarks,
            metadata,
        }))
    }

    fn lock_auto(&self) -> MutexGuard<'_, AutoSyncState> {
        self.auto.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
