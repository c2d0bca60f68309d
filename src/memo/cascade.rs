//! Thread-aware mutations
//!
//! Cascade delete, cascade restore and reply creation. Each one decodes the
//! whole buffer, builds a fresh [`ThreadIndex`] over the unfiltered record
//! set and then applies plain store mutations block by block.

use super::record::{MemoBuilder, MemoRecord};
use super::store::{InsertOrder, MemoStore};
use super::thread::ThreadIndex;
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Result of a cascading mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeOutcome {
    /// The complete new buffer
    pub buffer: String,
    /// Ids whose blocks were changed or removed, target first
    pub affected: Vec<String>,
}

/// Delete `id` together with its replies.
///
/// A memo without replies is removed outright. A memo with replies becomes a
/// permanently deleted marker and every descendant block is removed.
/// Returns `None` when `id` is not in the buffer.
pub fn delete_with_descendants(
    store: &MemoStore,
    buffer: &str,
    id: &str,
) -> Option<CascadeOutcome> {
    let records = store.list(buffer, "");
    if !records.iter().any(|memo| memo.id == id) {
        return None;
    }

    let index = ThreadIndex::build(&records);
    let descendants = index.descendants(id);

    if descendants.is_empty() {
        let buffer = store.remove(buffer, id)?;
        return Some(CascadeOutcome {
            buffer,
            affected: vec![id.to_string()],
        });
    }

    let mut out = store.replace_with_deletion_marker(buffer, id)?;
    let mut affected = Vec::with_capacity(descendants.len() + 1);
    affected.push(id.to_string());
    for descendant in descendants {
        if let Some(next) = store.remove(&out, &descendant) {
            out = next;
            affected.push(descendant);
        }
    }

    Some(CascadeOutcome {
        buffer: out,
        affected,
    })
}

/// Restore `id` from the trash along with its trashed descendants.
///
/// Descendants that are active or permanently deleted are left alone.
/// Returns `Ok(None)` when `id` is not in the buffer, and an invalid-state
/// error when it is permanently deleted or not trashed.
pub fn restore_with_descendants(
    store: &MemoStore,
    buffer: &str,
    id: &str,
) -> Result<Option<CascadeOutcome>> {
    let records = store.list(buffer, "");
    let Some(target) = records.iter().find(|memo| memo.id == id) else {
        return Ok(None);
    };
    if target.permanently_deleted {
        return Err(Error::invalid_state(format!(
            "memo {} is permanently deleted",
            id
        )));
    }
    if !target.is_trashed() {
        return Err(Error::invalid_state(format!("memo {} is not in the trash", id)));
    }

    let Some(mut out) = store.restore(buffer, id) else {
        return Ok(None);
    };
    let mut affected = vec![id.to_string()];

    let index = ThreadIndex::build(&records);
    let by_id: HashMap<&str, &MemoRecord> =
        records.iter().map(|memo| (memo.id.as_str(), memo)).collect();

    for descendant in index.descendants(id) {
        let restorable = by_id
            .get(descendant.as_str())
            .is_some_and(|memo| memo.is_trashed() && !memo.permanently_deleted);
        if !restorable {
            continue;
        }
        if let Some(next) = store.restore(&out, &descendant) {
            out = next;
            affected.push(descendant);
        }
    }

    Ok(Some(CascadeOutcome {
        buffer: out,
        affected,
    }))
}

/// Append a reply to `parent_id`.
///
/// The reply inherits the parent's category. A `category` given by the
/// caller must match it. Returns the new buffer and the stored record.
pub fn add_reply(
    store: &MemoStore,
    buffer: &str,
    parent_id: &str,
    reply: MemoBuilder,
    category: Option<&str>,
    order: InsertOrder,
) -> Result<(String, MemoRecord)> {
    let parent = store
        .find(buffer, parent_id)
        .ok_or_else(|| Error::invalid_state(format!("parent memo {} not found", parent_id)))?;

    if let Some(requested) = category {
        if requested != parent.category {
            return Err(Error::invalid_state(format!(
                "reply category '{}' does not match parent category '{}'",
                requested, parent.category
            )));
        }
    }

    let record = reply
        .category(parent.category.clone())
        .parent(parent_id)
        .build()?;
    let buffer = store.append(buffer, &record, order);
    Ok((buffer, record))
}
