//! Core types for Filemark.
//!
//! Provides the data shared by every other crate in the workspace:
//! - [`Bookmark`]: one saved file-system location, with tombstone support
//! - [`SyncMetadata`]: per-installation sync freshness record
//! - [`codec`]: lossless JSON encoding for local blobs and remote files
//! - [`Clock`]: injectable wall clock in epoch milliseconds

pub mod bookmark;
pub mod clock;
pub mod codec;
pub mod error;
pub mod metadata;

pub use bookmark::Bookmark;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CodecError, CodecResult};
pub use metadata::{SyncMetadata, CURRENT_VERSION};
