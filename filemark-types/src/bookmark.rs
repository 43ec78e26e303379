//! The bookmark entity.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// One saved file-system location.
///
/// Deletion is soft: `is_deleted` marks a tombstone that sync propagates to
/// other devices before it expires. `show_in_sidebar` only applies to
/// directories; [`Bookmark::normalized`] clears it for files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub id: String,
    pub name: String,
    /// Canonical string form of the location; identity key for toggling.
    pub path: String,
    pub is_directory: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "is_blank"
    )]
    pub notes: Option<String>,
    pub created_at: i64,
    pub modified_at: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub show_in_sidebar: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_deleted: bool,
}

impl Bookmark {
    /// Creates a new active bookmark with a fresh id, stamped at `now_millis`.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        is_directory: bool,
        now_millis: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            path: path.into(),
            is_directory,
            tags: Vec::new(),
            notes: None,
            created_at: now_millis,
            modified_at: now_millis,
            show_in_sidebar: false,
            is_deleted: false,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        let notes = notes.into();
        self.notes = if notes.is_empty() { None } else { Some(notes) };
        self
    }

    /// Pins a directory to the sidebar. Ignored for files.
    pub fn with_sidebar(mut self, show_in_sidebar: bool) -> Self {
        self.show_in_sidebar = show_in_sidebar && self.is_directory;
        self
    }

    /// Re-establishes the entity invariants: files never show in the sidebar,
    /// `modified_at >= created_at`, and blank notes are absent.
    pub fn normalized(mut self) -> Self {
        if !self.is_directory {
            self.show_in_sidebar = false;
        }
        if self.modified_at < self.created_at {
            self.modified_at = self.created_at;
        }
        if self.notes.as_deref().is_some_and(str::is_empty) {
            self.notes = None;
        }
        self
    }

    /// Marks the bookmark as a tombstone at `now_millis`.
    pub fn tombstoned(mut self, now_millis: i64) -> Self {
        self.is_deleted = true;
        self.modified_at = now_millis.max(self.created_at);
        self
    }

    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Directory pinned to the navigation sidebar.
    pub fn is_sidebar_entry(&self) -> bool {
        self.is_active() && self.is_directory && self.show_in_sidebar
    }

    /// Case-insensitive match against name, path, tags and notes.
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.name.to_lowercase().contains(&needle)
            || self.path.to_lowercase().contains(&needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&needle))
            || self
                .notes
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&needle))
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let notes = Option::<String>::deserialize(deserializer)?;
    Ok(notes.filter(|n| !n.is_empty()))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn is_blank(notes: &Option<String>) -> bool {
    notes.as_deref().is_none_or(str::is_empty)
}
