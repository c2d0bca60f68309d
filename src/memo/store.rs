//! Flat memo store over a text buffer
//!
//! A storage unit is one text buffer holding any number of blocks. Every
//! operation here is a pure function of its inputs: buffer in, buffer out.
//! Mutations either return the complete new buffer or `None`, in which case
//! the caller's buffer is untouched. Serializing concurrent writers is the
//! job of the storage backend.

use super::codec::{decode_with_default, encode};
use super::header::{Header, BLOCK_MARKER, KEY_DELETED};
use super::record::MemoRecord;
use super::template::parse_timestamp;
use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

/// Where `append` puts new blocks in the persisted layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOrder {
    /// Oldest first: new blocks go to the end
    Ascending,
    /// Newest first: new blocks go before the first block
    #[default]
    Descending,
}

/// Split a buffer into blocks.
///
/// A block starts at every line beginning with the header marker. Text
/// before the first marker is returned as its own segment, so the segments
/// always concatenate back to the original buffer. An empty or
/// whitespace-only buffer yields no segments.
pub fn split_blocks(buffer: &str) -> Vec<&str> {
    if buffer.trim().is_empty() {
        return Vec::new();
    }

    let bytes = buffer.as_bytes();
    let mut starts: Vec<usize> = buffer
        .match_indices(BLOCK_MARKER)
        .map(|(i, _)| i)
        .filter(|&i| i == 0 || bytes[i - 1] == b'\n')
        .collect();
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }

    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(buffer.len());
            &buffer[start..end]
        })
        .collect()
}

/// Id in the header of `block`, if it has one.
pub fn block_id(block: &str) -> Option<String> {
    Header::parse(block).and_then(|(header, _)| header.id().map(str::to_string))
}

/// CRUD over the blocks of one buffer
#[derive(Debug, Clone, Default)]
pub struct MemoStore {
    default_template: Option<String>,
    todo_mode: bool,
}

impl MemoStore {
    /// Create a store with the fallback template and no todo wrapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Template used for records that carry none of their own
    pub fn with_default_template(mut self, template: impl Into<String>) -> Self {
        self.default_template = Some(template.into());
        self
    }

    /// Wrap newly appended content as an unchecked todo line
    pub fn with_todo_mode(mut self, todo_mode: bool) -> Self {
        self.todo_mode = todo_mode;
        self
    }

    pub fn default_template(&self) -> Option<&str> {
        self.default_template.as_deref()
    }

    /// Decode every block, keeping those in `category` (empty = all), in
    /// file order. Blocks without a category belong to the requested one.
    pub fn list(&self, buffer: &str, category: &str) -> Vec<MemoRecord> {
        split_blocks(buffer)
            .into_iter()
            .filter_map(|block| {
                decode_with_default(block, category, self.default_template())
            })
            .filter(|memo| category.is_empty() || memo.category == category)
            .collect()
    }

    /// Decode the block with the given id.
    pub fn find(&self, buffer: &str, id: &str) -> Option<MemoRecord> {
        let blocks = split_blocks(buffer);
        let index = position(&blocks, id)?;
        decode_with_default(blocks[index], "", self.default_template())
    }

    /// Encode `record` and insert it according to `order`.
    ///
    /// Descending order inserts before the first block that has a header,
    /// so any leading host-document text stays on top.
    pub fn append(&self, buffer: &str, record: &MemoRecord, order: InsertOrder) -> String {
        let encoded = encode(record, self.default_template(), self.todo_mode);

        match order {
            InsertOrder::Ascending => {
                let mut out = String::with_capacity(buffer.len() + encoded.len() + 1);
                out.push_str(buffer);
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&encoded);
                out
            }
            InsertOrder::Descending => {
                let blocks = split_blocks(buffer);
                let first = blocks.iter().position(|b| block_id(b).is_some());
                let mut out = String::with_capacity(buffer.len() + encoded.len() + 1);
                match first {
                    Some(index) => {
                        for block in &blocks[..index] {
                            out.push_str(block);
                        }
                        if !out.is_empty() && !out.ends_with('\n') {
                            out.push('\n');
                        }
                        out.push_str(&encoded);
                        for block in &blocks[index..] {
                            out.push_str(block);
                        }
                    }
                    None => {
                        out.push_str(buffer);
                        if !out.is_empty() && !out.ends_with('\n') {
                            out.push('\n');
                        }
                        out.push_str(&encoded);
                    }
                }
                out
            }
        }
    }

    /// Replace the content of `id` with `mutate(content)`.
    pub fn update<F>(&self, buffer: &str, id: &str, mutate: F) -> Option<String>
    where
        F: FnOnce(&str) -> String,
    {
        self.rewrite(buffer, id, |memo| {
            if memo.permanently_deleted {
                return false;
            }
            memo.content = mutate(&memo.content);
            true
        })
    }

    /// Hard-delete the block of `id`.
    pub fn remove(&self, buffer: &str, id: &str) -> Option<String> {
        let blocks = split_blocks(buffer);
        let index = position(&blocks, id)?;
        Some(join_except(&blocks, index, None))
    }

    /// Soft-delete `id`, stamping `trashed_at = now`.
    ///
    /// Trashing an already trashed memo succeeds and refreshes the stamp.
    /// Permanently deleted memos cannot be trashed.
    pub fn move_to_trash(&self, buffer: &str, id: &str, now: &str) -> Option<String> {
        self.rewrite(buffer, id, |memo| {
            if memo.permanently_deleted {
                return false;
            }
            memo.trashed_at = Some(now.to_string());
            true
        })
    }

    /// Take `id` out of the trash; fails unless it is currently trashed.
    pub fn restore(&self, buffer: &str, id: &str) -> Option<String> {
        self.rewrite(buffer, id, |memo| {
            if !memo.is_trashed() {
                return false;
            }
            memo.trashed_at = None;
            true
        })
    }

    /// Replace `id` with a permanently deleted marker. Irreversible.
    pub fn replace_with_deletion_marker(&self, buffer: &str, id: &str) -> Option<String> {
        self.rewrite(buffer, id, |memo| {
            memo.mark_permanently_deleted();
            true
        })
    }

    /// Set or clear the pin of `id`.
    pub fn set_pinned(&self, buffer: &str, id: &str, pinned_at: Option<&str>) -> Option<String> {
        self.rewrite(buffer, id, |memo| {
            if memo.permanently_deleted {
                return false;
            }
            memo.pinned_at = pinned_at.map(str::to_string);
            true
        })
    }

    /// Hard-remove every trashed block older than `retention_days`.
    ///
    /// A block flagged `deleted` whose `trashedAt` cannot be parsed is kept:
    /// corrupt trash metadata is never grounds for purging.
    pub fn cleanup_expired(
        &self,
        buffer: &str,
        retention_days: u32,
        now: DateTime<FixedOffset>,
    ) -> (String, usize) {
        let retention = Duration::days(i64::from(retention_days));
        let mut out = String::with_capacity(buffer.len());
        let mut removed = 0;

        for block in split_blocks(buffer) {
            let expired = match decode_with_default(block, "", self.default_template()) {
                Some(memo) => match memo.trashed_at.as_deref().and_then(parse_timestamp) {
                    Some(trashed_at) => now.signed_duration_since(trashed_at) >= retention,
                    None => {
                        if let Some((header, _)) = Header::parse(block) {
                            if header.flag(KEY_DELETED) {
                                tracing::warn!(
                                    "Keeping trashed memo {} with unreadable trashedAt",
                                    memo.id
                                );
                            }
                        }
                        false
                    }
                },
                None => false,
            };

            if expired {
                removed += 1;
            } else {
                out.push_str(block);
            }
        }

        if removed == 0 {
            return (buffer.to_string(), 0);
        }
        (out, removed)
    }

    /// Decode the block of `id`, let `apply` change it, and re-encode it in
    /// place. `apply` returning false aborts without touching the buffer.
    fn rewrite<F>(&self, buffer: &str, id: &str, apply: F) -> Option<String>
    where
        F: FnOnce(&mut MemoRecord) -> bool,
    {
        let blocks = split_blocks(buffer);
        let index = position(&blocks, id)?;
        let original = blocks[index];
        let mut memo = decode_with_default(original, "", self.default_template())?;
        if !apply(&mut memo) {
            return None;
        }

        let encoded = encode(&memo, self.default_template(), false);
        let trailing = &original[original.trim_end().len()..];
        let replacement = format!("{}{}", encoded.trim_end(), trailing);
        Some(join_except(&blocks, index, Some(&replacement)))
    }
}

fn position(blocks: &[&str], id: &str) -> Option<usize> {
    blocks
        .iter()
        .position(|block| block_id(block).as_deref() == Some(id))
}

/// Concatenate `blocks`, replacing (or dropping) the one at `index`.
fn join_except(blocks: &[&str], index: usize, replacement: Option<&str>) -> String {
    let mut out = String::new();
    for (i, block) in blocks.iter().enumerate() {
        if i == index {
            if let Some(replacement) = replacement {
                out.push_str(replacement);
            }
        } else {
            out.push_str(block);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memo::record::{MemoBuilder, DELETED_PLACEHOLDER};

    fn memo(id: &str, content: &str) -> MemoRecord {
        MemoBuilder::new(content)
            .id(id)
            .category("work")
            .timestamp("2025-01-01T10:00:00Z")
            .build()
            .unwrap()
    }

    fn buffer_of(ids: &[&str]) -> String {
        let store = MemoStore::new();
        ids.iter().fold(String::new(), |buf, id| {
            store.append(&buf, &memo(id, &format!("memo {}", id)), InsertOrder::Ascending)
        })
    }

    fn ids(store: &MemoStore, buffer: &str) -> Vec<String> {
        store.list(buffer, "").into_iter().map(|m| m.id).collect()
    }

    #[test]
    fn test_split_blocks_is_lossless() {
        let buffer = format!("# Journal\n\nintro\n{}", buffer_of(&["1", "2"]));
        let blocks = split_blocks(&buffer);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], "# Journal\n\nintro\n");
        assert_eq!(blocks.concat(), buffer);
    }

    #[test]
    fn test_split_blocks_empty() {
        assert!(split_blocks("").is_empty());
        assert!(split_blocks(" \n\n").is_empty());
    }

    #[test]
    fn test_marker_must_start_a_line() {
        let buffer = "<!-- id:1, ts:2025-01-01T10:00:00Z -->\n## h\nsee <!-- id:2 --> inline\n";
        assert_eq!(split_blocks(buffer).len(), 1);
    }

    #[test]
    fn test_append_ascending_and_descending() {
        let store = MemoStore::new();
        let asc = store.append("", &memo("1", "a"), InsertOrder::Ascending);
        let asc = store.append(&asc, &memo("2", "b"), InsertOrder::Ascending);
        assert_eq!(ids(&store, &asc), vec!["1", "2"]);

        let desc = store.append("", &memo("1", "a"), InsertOrder::Descending);
        let desc = store.append(&desc, &memo("2", "b"), InsertOrder::Descending);
        assert_eq!(ids(&store, &desc), vec!["2", "1"]);
    }

    #[test]
    fn test_descending_keeps_preamble_on_top() {
        let store = MemoStore::new();
        let buffer = format!("# Journal\n{}", buffer_of(&["1"]));
        let out = store.append(&buffer, &memo("2", "b"), InsertOrder::Descending);
        assert!(out.starts_with("# Journal\n<!-- id:2,"));
    }

    #[test]
    fn test_list_filters_by_category() {
        let store = MemoStore::new();
        let mut other = memo("2", "personal");
        other.category = "life".to_string();
        let buffer = store.append(&buffer_of(&["1"]), &other, InsertOrder::Ascending);

        assert_eq!(store.list(&buffer, "").len(), 2);
        assert_eq!(store.list(&buffer, "life")[0].id, "2");
        assert_eq!(store.list(&buffer, "work")[0].id, "1");
        assert!(store.list(&buffer, "none").is_empty());
    }

    #[test]
    fn test_update_content_in_place() {
        let store = MemoStore::new();
        let buffer = buffer_of(&["1", "2", "3"]);
        let out = store
            .update(&buffer, "2", |c| format!("{} (edited)", c))
            .unwrap();
        assert_eq!(store.find(&out, "2").unwrap().content, "memo 2 (edited)");
        assert_eq!(ids(&store, &out), vec!["1", "2", "3"]);
        assert!(store.update(&buffer, "missing", |c| c.to_string()).is_none());
    }

    #[test]
    fn test_update_preserves_block_spacing() {
        let store = MemoStore::new();
        let buffer = buffer_of(&["1", "2"]).replace("memo 1\n", "memo 1\n\n\n");
        let out = store.update(&buffer, "1", |_| "x".to_string()).unwrap();
        assert!(out.contains("\nx\n\n\n<!-- id:2,"));
    }

    #[test]
    fn test_remove() {
        let store = MemoStore::new();
        let buffer = buffer_of(&["1", "2"]);
        let out = store.remove(&buffer, "1").unwrap();
        assert_eq!(ids(&store, &out), vec!["2"]);
        assert!(store.remove(&buffer, "9").is_none());
    }

    #[test]
    fn test_trash_and_restore() {
        let store = MemoStore::new();
        let buffer = buffer_of(&["1"]);

        let trashed = store
            .move_to_trash(&buffer, "1", "2025-01-02T00:00:00Z")
            .unwrap();
        assert!(trashed.contains("deleted:true"));
        assert!(trashed.contains("<!--\nmemo 1\n-->"));
        let memo = store.find(&trashed, "1").unwrap();
        assert_eq!(memo.trashed_at.as_deref(), Some("2025-01-02T00:00:00Z"));
        assert_eq!(memo.content, "memo 1");

        let restored = store.restore(&trashed, "1").unwrap();
        assert_eq!(restored, buffer);
    }

    #[test]
    fn test_trash_twice_refreshes_timestamp() {
        let store = MemoStore::new();
        let buffer = buffer_of(&["1"]);
        let once = store.move_to_trash(&buffer, "1", "2025-01-02T00:00:00Z").unwrap();
        let twice = store.move_to_trash(&once, "1", "2025-01-03T00:00:00Z").unwrap();
        let memo = store.find(&twice, "1").unwrap();
        assert_eq!(memo.trashed_at.as_deref(), Some("2025-01-03T00:00:00Z"));
        assert_eq!(memo.content, "memo 1");
    }

    #[test]
    fn test_restore_active_is_noop_failure() {
        let store = MemoStore::new();
        let buffer = buffer_of(&["1"]);
        assert!(store.restore(&buffer, "1").is_none());
        assert!(store.restore(&buffer, "2").is_none());
    }

    #[test]
    fn test_deletion_marker() {
        let store = MemoStore::new();
        let mut child = memo("2", "reply");
        child.parent_id = Some("1".to_string());
        child.attachments = vec!["a.png".to_string()];
        let buffer = store.append(&buffer_of(&["1"]), &child, InsertOrder::Ascending);

        let out = store.replace_with_deletion_marker(&buffer, "2").unwrap();
        let memo = store.find(&out, "2").unwrap();
        assert!(memo.permanently_deleted);
        assert_eq!(memo.parent_id.as_deref(), Some("1"));
        assert_eq!(memo.content, DELETED_PLACEHOLDER);
        assert!(memo.attachments.is_empty());
        assert!(!out.contains("a.png"));

        assert!(store.move_to_trash(&out, "2", "2025-01-02T00:00:00Z").is_none());
        assert!(store.restore(&out, "2").is_none());
    }

    #[test]
    fn test_pin_and_unpin() {
        let store = MemoStore::new();
        let buffer = buffer_of(&["1"]);
        let pinned = store
            .set_pinned(&buffer, "1", Some("2025-01-05T00:00:00Z"))
            .unwrap();
        assert!(store.find(&pinned, "1").unwrap().is_pinned());
        let unpinned = store.set_pinned(&pinned, "1", None).unwrap();
        assert_eq!(unpinned, buffer);
    }

    #[test]
    fn test_cleanup_expired() {
        let store = MemoStore::new();
        let now = parse_timestamp("2025-01-10T00:00:00Z").unwrap();
        let buffer = buffer_of(&["1", "2", "3"]);
        let buffer = store
            .move_to_trash(&buffer, "1", "2025-01-09T23:59:59Z")
            .unwrap();
        let buffer = store
            .move_to_trash(&buffer, "2", "2025-01-01T00:00:00Z")
            .unwrap();

        let (kept, removed) = store.cleanup_expired(&buffer, 7, now);
        assert_eq!(removed, 1);
        assert_eq!(ids(&store, &kept), vec!["1", "3"]);

        let (kept, removed) = store.cleanup_expired(&buffer, 0, now);
        assert_eq!(removed, 2);
        assert_eq!(ids(&store, &kept), vec!["3"]);
    }

    #[test]
    fn test_cleanup_keeps_corrupt_trash_metadata() {
        let store = MemoStore::new();
        let now = parse_timestamp("2025-01-10T00:00:00Z").unwrap();
        let buffer = "<!-- id:1, ts:2025-01-01T10:00:00Z, deleted:true -->\n## h\n<!--\nbody\n-->\n";
        let (kept, removed) = store.cleanup_expired(buffer, 0, now);
        assert_eq!(removed, 0);
        assert_eq!(kept, buffer);
    }

    #[test]
    fn test_default_template_is_used_on_rewrite() {
        let store = MemoStore::new().with_default_template("### YYYY");
        let buffer = store.append("", &memo("1", "x"), InsertOrder::Ascending);
        assert!(buffer.contains("\n### 2025\nx\n"));
        let out = store.update(&buffer, "1", |_| "y".to_string()).unwrap();
        assert!(out.contains("\n### 2025\ny\n"));
    }

    #[test]
    fn test_todo_mode_applies_on_append_only() {
        let store = MemoStore::new().with_todo_mode(true);
        let buffer = store.append("", &memo("1", "task"), InsertOrder::Ascending);
        assert_eq!(store.find(&buffer, "1").unwrap().content, "- [ ] task");
        let trashed = store.move_to_trash(&buffer, "1", "2025-01-02T00:00:00Z").unwrap();
        assert_eq!(store.find(&trashed, "1").unwrap().content, "- [ ] task");
    }

    #[test]
    fn test_inline_default_template_keeps_content() {
        let store = MemoStore::new().with_default_template("- HH:mm {{content}}");
        let buffer = store.append("", &memo("1", "important"), InsertOrder::Ascending);
        assert!(buffer.contains("\n- 10:00 important\n"));
        assert_eq!(store.find(&buffer, "1").unwrap().content, "important");

        let trashed = store.move_to_trash(&buffer, "1", "2025-01-02T00:00:00Z").unwrap();
        assert_eq!(store.find(&trashed, "1").unwrap().content, "important");
        let restored = store.restore(&trashed, "1").unwrap();
        assert_eq!(store.find(&restored, "1").unwrap().content, "important");
        assert!(restored.contains("\n- 10:00 important\n"));
        assert_eq!(store.list(&restored, "work")[0].content, "important");
    }

    #[test]
    fn test_multi_line_default_heading_is_stable_across_rewrites() {
        let store = MemoStore::new().with_default_template("## YYYY\n---");
        let buffer = store.append("", &memo("1", "body"), InsertOrder::Ascending);
        let pinned = store.set_pinned(&buffer, "1", Some("2025-01-02T00:00:00Z")).unwrap();
        let unpinned = store.set_pinned(&pinned, "1", None).unwrap();

        assert_eq!(unpinned.matches("---").count(), 1);
        assert!(unpinned.ends_with("\n## 2025\n---\nbody\n"));
        assert_eq!(store.find(&unpinned, "1").unwrap().content, "body");
    }

    #[test]
    fn test_multi_line_default_heading_with_empty_content() {
        let store = MemoStore::new().with_default_template("## YYYY\n---");
        let buffer = store.append("", &memo("1", ""), InsertOrder::Ascending);
        assert_eq!(store.find(&buffer, "1").unwrap().content, "");
    }
}
