//! JSON codec for bookmarks and sync metadata.
//!
//! The same record shape is used for the local key-value blobs, the remote
//! `bookmarks.json` / `.sync_metadata.json` files and the export document:
//!
//! ```json
//! {
//!   "id": "…", "name": "Downloads", "path": "/sdcard/Download",
//!   "isDirectory": true, "tags": ["work"], "notes": "optional",
//!   "createdAt": 1700000000000, "modifiedAt": 1700000000000,
//!   "showInSidebar": true, "isDeleted": false
//! }
//! ```

use crate::bookmark::Bookmark;
use crate::error::{CodecError, CodecResult};
use crate::metadata::SyncMetadata;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Encodes a bookmark as a JSON record. Blank notes are omitted.
pub fn encode(bookmark: &Bookmark) -> Value {
    // Serializing a plain struct of strings, bools and integers cannot fail.
    serde_json::to_value(bookmark).unwrap_or(Value::Null)
}

/// Decodes a bookmark record.
///
/// Missing `tags` decode to an empty list, empty `notes` to `None`, and
/// missing `showInSidebar`/`isDeleted` to `false`. Anything else missing or
/// mistyped is a [`CodecError::MalformedRecord`].
pub fn decode(record: &Value) -> CodecResult<Bookmark> {
    if !record.is_object() {
        return Err(CodecError::MalformedRecord(format!(
            "expected bookmark object, found {}",
            kind_of(record)
        )));
    }
    Ok(Bookmark::deserialize(record)?)
}

pub fn encode_list(bookmarks: &[Bookmark]) -> Value {
    Value::Array(bookmarks.iter().map(encode).collect())
}

pub fn decode_list(records: &Value) -> CodecResult<Vec<Bookmark>> {
    let items = records.as_array().ok_or_else(|| {
        CodecError::MalformedRecord(format!(
            "expected bookmark array, found {}",
            kind_of(records)
        ))
    })?;
    items.iter().map(decode).collect()
}

pub fn encode_metadata(metadata: &SyncMetadata) -> Value {
    serde_json::to_value(metadata).unwrap_or(Value::Null)
}

/// Decodes a metadata record; `lastModifiedTime` defaults to 0.
pub fn decode_metadata(record: &Value) -> CodecResult<SyncMetadata> {
    Ok(SyncMetadata::deserialize(record)?)
}

/// Serializes the local `bookmarks` blob (a bare JSON array).
pub fn bookmarks_to_json(bookmarks: &[Bookmark]) -> CodecResult<String> {
    Ok(serde_json::to_string(bookmarks)?)
}

pub fn bookmarks_from_json(json: &str) -> CodecResult<Vec<Bookmark>> {
    let value: Value = serde_json::from_str(json)?;
    decode_list(&value)
}

pub fn metadata_to_json(metadata: &SyncMetadata) -> CodecResult<String> {
    Ok(serde_json::to_string(metadata)?)
}

pub fn metadata_from_json(json: &str) -> CodecResult<SyncMetadata> {
    let value: Value = serde_json::from_str(json)?;
    decode_metadata(&value)
}

/// Body of the remote `bookmarks.json` file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBookmarks {
    pub bookmarks: Vec<Bookmark>,
}

impl RemoteBookmarks {
    pub fn to_pretty_json(&self) -> CodecResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_slice(bytes: &[u8]) -> CodecResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// User-initiated backup containing the whole local state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub bookmarks: Vec<Bookmark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_metadata: Option<SyncMetadata>,
}

impl ExportDocument {
    pub fn to_pretty_json(&self) -> CodecResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> CodecResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
