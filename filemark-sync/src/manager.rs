//! Application-facing bookmark operations.

use crate::orchestrator::BookmarkSyncEngine;
use filemark_storage::{BookmarkStore, StorageResult};
use filemark_types::{Bookmark, Clock};
use std::collections::BTreeSet;
use std::sync::Arc;

/// List filter for bookmark views. Tombstones are always excluded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BookmarkFilter {
    All,
    Files,
    Directories,
    ByTag(String),
}

impl BookmarkFilter {
    pub fn matches(&self, bookmark: &Bookmark) -> bool {
        if !bookmark.is_active() {
            return false;
        }
        match self {
            BookmarkFilter::All => true,
            BookmarkFilter::Files => !bookmark.is_directory,
            BookmarkFilter::Directories => bookmark.is_directory,
            BookmarkFilter::ByTag(tag) => bookmark.has_tag(tag),
        }
    }
}

/// Partial update. `None` fields are left unchanged; `notes: Some("")`
/// clears the notes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BookmarkPatch {
    pub name: Option<String>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
    pub show_in_sidebar: Option<bool>,
}

/// Bookmark CRUD that requests an auto sync after every change.
pub struct BookmarkManager {
    store: Arc<BookmarkStore>,
    clock: Arc<dyn Clock>,
    engine: Option<Arc<BookmarkSyncEngine>>,
}

impl BookmarkManager {
    pub fn new(store: Arc<BookmarkStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            engine: None,
        }
    }

    pub fn with_sync(mut self, engine: Arc<BookmarkSyncEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn store(&self) -> &Arc<BookmarkStore> {
        &self.store
    }

    /// Active bookmarks.
    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.store.list_active()
    }

    pub fn get(&self, id: &str) -> Option<Bookmark> {
        self.store.get(id)
    }

    pub fn add(
        &self,
        name: &str,
        path: &str,
        is_directory: bool,
        show_in_sidebar: bool,
    ) -> StorageResult<Bookmark> {
        let bookmark = Bookmark::new(name, path, is_directory, self.clock.now_millis())
            .with_sidebar(show_in_sidebar);
        self.add_bookmark(bookmark)
    }

    pub fn add_bookmark(&self, bookmark: Bookmark) -> StorageResult<Bookmark> {
        let stored = self.store.add(bookmark)?;
        self.request_sync();
        Ok(stored)
    }

    /// Applies `patch` to the bookmark with `id`. Unknown ids are ignored.
    pub fn update(&self, id: &str, patch: BookmarkPatch) -> StorageResult<Option<Bookmark>> {
        let Some(mut bookmark) = self.store.get(id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            bookmark.name = name;
        }
        if let Some(tags) = patch.tags {
            bookmark.tags = tags;
        }
        if let Some(notes) = patch.notes {
            bookmark.notes = Some(notes);
        }
        if let Some(show) = patch.show_in_sidebar {
            bookmark.show_in_sidebar = show;
        }
        self.update_bookmark(bookmark)
    }

    pub fn update_bookmark(&self, bookmark: Bookmark) -> StorageResult<Option<Bookmark>> {
        let updated = self.store.update(bookmark)?;
        if updated.is_some() {
            self.request_sync();
        }
        Ok(updated)
    }

    /// Soft-deletes so the deletion reaches other devices.
    pub fn delete(&self, id: &str) -> StorageResult<bool> {
        let deleted = self.store.soft_delete(id)?;
        if deleted {
            self.request_sync();
        }
        Ok(deleted)
    }

    /// Bookmarks `path` if it is not bookmarked, otherwise deletes its
    /// bookmark. Returns whether the path is bookmarked afterwards.
    pub fn toggle(
        &self,
        name: &str,
        path: &str,
        is_directory: bool,
        show_in_sidebar: bool,
    ) -> StorageResult<bool> {
        match self.store.find_active_by_path(path) {
            Some(existing) => {
                self.delete(&existing.id)?;
                Ok(false)
            }
            None => {
                self.add(name, path, is_directory, show_in_sidebar)?;
                Ok(true)
            }
        }
    }

    pub fn is_bookmarked(&self, path: &str) -> bool {
        self.store.find_active_by_path(path).is_some()
    }

    pub fn get_by_path(&self, path: &str) -> Option<Bookmark> {
        self.store.find_active_by_path(path)
    }

    pub fn filtered(&self, filter: &BookmarkFilter) -> Vec<Bookmark> {
        self.store
            .list()
            .iter()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect()
    }

    pub fn search(&self, query: &str) -> Vec<Bookmark> {
        self.store
            .list()
            .iter()
            .filter(|b| b.is_active() && b.matches_query(query))
            .cloned()
            .collect()
    }

    pub fn sidebar_directories(&self) -> Vec<Bookmark> {
        self.store.sidebar_directories()
    }

    pub fn file_bookmarks(&self) -> Vec<Bookmark> {
        self.store.file_bookmarks()
    }

    pub fn all_tags(&self) -> BTreeSet<String> {
        self.store.all_tags()
    }

    pub fn export_json(&self) -> StorageResult<String> {
        self.store.export_json()
    }

    pub fn import_json(&self, json: &str) -> StorageResult<usize> {
        let count = self.store.import_json(json)?;
        self.request_sync();
        Ok(count)
    }

    fn request_sync(&self) {
        if let Some(engine) = &self.engine {
            engine.trigger_auto_sync();
        }
    }
}
