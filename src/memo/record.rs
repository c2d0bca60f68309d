//! Memo record data types
//!
//! A `MemoRecord` is the unit of storage: one block of text inside a storage
//! unit. Records link to each other only through `parent_id`, so a thread is
//! a flat list plus the derived maps in [`crate::memo::thread`].

use crate::error::{Error, Result};
use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body written in place of a permanently deleted memo.
pub const DELETED_PLACEHOLDER: &str = "*This memo has been deleted.*";

/// A single memo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoRecord {
    /// Time-sortable unique identifier, immutable once created
    pub id: String,
    /// Logical group inside the storage unit
    pub category: String,
    /// ISO-8601 creation time, possibly with an offset
    pub timestamp: String,
    /// Free text body
    pub content: String,
    /// Referenced file names, in order (weak references)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    /// Per-record formatting template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Id of the memo this one replies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Set while the memo is in the trash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trashed_at: Option<String>,
    /// Set while the memo is pinned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_at: Option<String>,
    /// Terminal deletion state; the id survives, the content does not
    #[serde(default)]
    pub permanently_deleted: bool,
}

impl MemoRecord {
    /// Neither trashed nor permanently deleted.
    pub fn is_active(&self) -> bool {
        self.trashed_at.is_none() && !self.permanently_deleted
    }

    /// Currently in the trash (reversible).
    pub fn is_trashed(&self) -> bool {
        self.trashed_at.is_some()
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned_at.is_some()
    }

    /// Has no parent link.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Move the record into the permanently deleted state.
    ///
    /// Content becomes the fixed placeholder; template, attachments, pin and
    /// trash state are discarded. `id`, `timestamp`, `category` and
    /// `parent_id` are kept so references keep resolving.
    pub fn mark_permanently_deleted(&mut self) {
        self.content = DELETED_PLACEHOLDER.to_string();
        self.template = None;
        self.attachments.clear();
        self.trashed_at = None;
        self.pinned_at = None;
        self.permanently_deleted = true;
    }
}

/// Generate a fresh time-sortable memo id.
pub fn new_memo_id() -> String {
    Uuid::now_v7().to_string()
}

/// Current local time as an ISO-8601 string with offset.
pub fn now_timestamp() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Builder for constructing `MemoRecord` instances
pub struct MemoBuilder {
    id: Option<String>,
    category: String,
    timestamp: Option<String>,
    content: String,
    attachments: Vec<String>,
    template: Option<String>,
    parent_id: Option<String>,
    pinned_at: Option<String>,
}

impl MemoBuilder {
    /// Create a new builder with the memo body
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: None,
            category: String::new(),
            timestamp: None,
            content: content.into(),
            attachments: Vec::new(),
            template: None,
            parent_id: None,
            pinned_at: None,
        }
    }

    /// Use an explicit id instead of generating one
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Use an explicit creation time instead of now
    pub fn timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn attachment(mut self, name: impl Into<String>) -> Self {
        self.attachments.push(name.into());
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Make the memo a reply to `parent_id`
    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn pinned_at(mut self, pinned_at: impl Into<String>) -> Self {
        self.pinned_at = Some(pinned_at.into());
        self
    }

    /// Build the record, assigning id and timestamp if not set
    pub fn build(self) -> Result<MemoRecord> {
        let id = self.id.unwrap_or_else(new_memo_id);
        if id.trim().is_empty() {
            return Err(Error::invalid_state("memo id must not be empty"));
        }
        if self.parent_id.as_deref() == Some(id.as_str()) {
            return Err(Error::invalid_state(format!(
                "memo {} cannot reply to itself",
                id
            )));
        }

        Ok(MemoRecord {
            id,
            category: self.category,
            timestamp: self.timestamp.unwrap_or_else(now_timestamp),
            content: self.content,
            attachments: self.attachments,
            template: self.template,
            parent_id: self.parent_id,
            trashed_at: None,
            pinned_at: self.pinned_at,
            permanently_deleted: false,
        })
    }
}
