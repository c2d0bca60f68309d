//! Visibility rules for presenting memos
//!
//! Which records a flat list, the trash tab or a threaded view shows, and
//! the order they are shown in. None of this touches the persisted layout.

use super::record::MemoRecord;
use super::store::InsertOrder;
use super::template::parse_timestamp;
use super::thread::ThreadIndex;
use chrono::{DateTime, FixedOffset};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Active root-level records, for non-threaded lists.
pub fn flat_view(records: &[MemoRecord]) -> Vec<&MemoRecord> {
    records
        .iter()
        .filter(|memo| memo.is_active() && memo.is_root())
        .collect()
}

/// Records currently in the trash.
pub fn trash_view(records: &[MemoRecord]) -> Vec<&MemoRecord> {
    records
        .iter()
        .filter(|memo| memo.is_trashed() && !memo.permanently_deleted)
        .collect()
}

/// True if some direct reply to `id` is active.
pub fn has_active_replies(id: &str, records: &[MemoRecord]) -> bool {
    records
        .iter()
        .any(|memo| memo.parent_id.as_deref() == Some(id) && memo.is_active())
}

/// Whether a non-active node must still render as a placeholder so its live
/// replies stay attached to the tree.
pub fn should_show_deleted_placeholder(
    node: &MemoRecord,
    records: &[MemoRecord],
    in_thread_view: bool,
    in_trash_tab: bool,
) -> bool {
    in_thread_view && !in_trash_tab && !node.is_active() && has_active_replies(&node.id, records)
}

/// One row of a threaded listing
#[derive(Debug, Clone, Copy)]
pub struct ThreadRow<'a> {
    pub memo: &'a MemoRecord,
    pub depth: usize,
    /// Rendered as the deleted placeholder rather than its content
    pub placeholder: bool,
}

/// Pre-order rows of every thread, skipping nodes that are neither active
/// nor needed as placeholders.
pub fn thread_view<'a>(index: &ThreadIndex, records: &'a [MemoRecord]) -> Vec<ThreadRow<'a>> {
    let by_id: HashMap<&str, &MemoRecord> =
        records.iter().map(|memo| (memo.id.as_str(), memo)).collect();

    index
        .flatten()
        .into_iter()
        .filter_map(|entry| {
            let memo = *by_id.get(entry.id)?;
            if memo.is_active() {
                return Some(ThreadRow {
                    memo,
                    depth: entry.depth,
                    placeholder: false,
                });
            }
            should_show_deleted_placeholder(memo, records, true, false).then_some(ThreadRow {
                memo,
                depth: entry.depth,
                placeholder: true,
            })
        })
        .collect()
}

fn instant(raw: Option<&str>) -> Option<DateTime<FixedOffset>> {
    raw.and_then(parse_timestamp)
}

/// Readable timestamps by instant, then unreadable ones by text. Only the
/// order within each group follows `order`.
fn compare_times(a: &str, b: &str, order: InsertOrder) -> Ordering {
    let directed = |ord: Ordering| match order {
        InsertOrder::Ascending => ord,
        InsertOrder::Descending => ord.reverse(),
    };
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Some(x), Some(y)) => directed(x.cmp(&y).then_with(|| a.cmp(b))),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => directed(a.cmp(b)),
    }
}

/// Sort for display: pinned records first, most recently pinned on top,
/// then everything else by timestamp in `order`. Records whose timestamp
/// cannot be read go last.
pub fn sort_for_display(records: &mut [MemoRecord], order: InsertOrder) {
    records.sort_by(|a, b| match (a.is_pinned(), b.is_pinned()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => instant(b.pinned_at.as_deref()).cmp(&instant(a.pinned_at.as_deref())),
        (false, false) => compare_times(&a.timestamp, &b.timestamp, order),
    });
}
