//! Bookmark sync for Filemark.
//!
//! Synchronizes the local [`filemark_storage::BookmarkStore`] with two files
//! on a WebDAV server: `bookmarks.json` and `.sync_metadata.json`.
//!
//! # Architecture
//!
//! - [`merge()`] is a pure last-write-wins merge with tombstone expiry
//! - [`BookmarkSyncEngine`] runs one cycle at a time and debounces
//!   automatic triggers through a [`Scheduler`]
//! - [`RemoteFileSystem`] and [`EndpointRegistry`] are the remote seams;
//!   [`WebDavTransport`] implements both over reqwest
//! - [`BookmarkManager`] is the CRUD facade that requests auto syncs

pub mod config;
pub mod endpoint;
pub mod error;
pub mod manager;
pub mod merge;
pub mod orchestrator;
pub mod scheduler;
pub mod transport;
pub mod webdav;

pub use config::{DEFAULT_SYNC_PATH, EngineConfig, SettingsProvider, StaticSettings, SyncSettings};
pub use endpoint::{Authority, Protocol, RemoteEndpoint, RemoteLocation, parse_remote_url};
pub use error::{SyncError, SyncFailureKind, SyncReport, SyncResult};
pub use manager::{BookmarkFilter, BookmarkManager, BookmarkPatch};
pub use merge::{SyncSnapshot, TOMBSTONE_RETENTION, merge, merge_with_retention};
pub use orchestrator::{AutoSyncDecision, BookmarkSyncEngine, SyncPhase, SyncStatus, SyncStatusInfo};
pub use scheduler::{ManualScheduler, ScheduledTask, Scheduler, TokioScheduler};
pub use transport::{EndpointRegistration, EndpointRegistry, RemoteFileSystem, TransientEndpoint};
pub use webdav::WebDavTransport;
