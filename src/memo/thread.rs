//! Thread index: reply trees rebuilt from flat `parent_id` links
//!
//! Records never own their replies. The index is an arena-style set of
//! id-keyed maps derived from a snapshot of records, immutable once built.
//! Any mutation of the source buffer discards it; there is no incremental
//! update.
//!
//! Inconsistent data is tolerated:
//! - a parent missing from the snapshot (dangling link) makes the child a root
//! - a cycle is broken by promoting its earliest member (in input order) to a root

use super::record::MemoRecord;
use crate::cache::CacheKey;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One row of a flattened thread view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadEntry<'a> {
    pub id: &'a str,
    pub depth: usize,
}

/// Derived reply tree over one record snapshot
#[derive(Debug, Clone, Default)]
pub struct ThreadIndex {
    children: HashMap<String, Vec<String>>,
    parents: HashMap<String, String>,
    roots: Vec<String>,
    root_set: HashSet<String>,
    depth: HashMap<String, usize>,
    descendant_count: HashMap<String, usize>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    OnPath,
    Done,
}

impl ThreadIndex {
    /// Build the index from a flat record list.
    ///
    /// Duplicate ids keep their first occurrence.
    pub fn build(records: &[MemoRecord]) -> Self {
        let mut order: Vec<&str> = Vec::with_capacity(records.len());
        let mut rank: HashMap<&str, usize> = HashMap::with_capacity(records.len());
        let mut declared: Vec<Option<&str>> = Vec::with_capacity(records.len());
        for record in records {
            if rank.contains_key(record.id.as_str()) {
                continue;
            }
            rank.insert(&record.id, order.len());
            order.push(&record.id);
            declared.push(record.parent_id.as_deref());
        }

        // Links to parents outside the snapshot are dropped: those ids are roots
        let mut parents: HashMap<&str, &str> = HashMap::with_capacity(order.len());
        for (&id, parent) in order.iter().zip(&declared) {
            if let Some(parent) = parent.filter(|p| rank.contains_key(p)) {
                parents.insert(id, parent);
            }
        }

        break_cycles(&order, &rank, &mut parents);

        let mut index = ThreadIndex::default();
        for &id in &order {
            match parents.get(id) {
                Some(&parent) => {
                    index
                        .children
                        .entry(parent.to_string())
                        .or_default()
                        .push(id.to_string());
                    index.parents.insert(id.to_string(), parent.to_string());
                }
                None => {
                    index.roots.push(id.to_string());
                    index.root_set.insert(id.to_string());
                }
            }
        }
        index.compute_depths();
        index
    }

    /// Post-order walk from every root; iterative so deep threads cannot
    /// overflow the stack.
    fn compute_depths(&mut self) {
        let mut depth = HashMap::with_capacity(self.parents.len() + self.roots.len());
        let mut counts = HashMap::with_capacity(depth.capacity());

        for root in &self.roots {
            let mut stack: Vec<(&str, usize, bool)> = vec![(root.as_str(), 0, false)];
            while let Some((id, d, expanded)) = stack.pop() {
                let children = self.children.get(id).map(Vec::as_slice).unwrap_or(&[]);
                if expanded {
                    let total = children
                        .iter()
                        .map(|c| 1 + counts.get(c.as_str()).copied().unwrap_or(0))
                        .sum::<usize>();
                    counts.insert(id, total);
                    continue;
                }
                depth.insert(id, d);
                stack.push((id, d, true));
                for child in children.iter().rev() {
                    stack.push((child.as_str(), d + 1, false));
                }
            }
        }

        self.depth = depth.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        self.descendant_count = counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    }

    /// Number of ids in the index.
    pub fn len(&self) -> usize {
        self.depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.depth.contains_key(id)
    }

    /// Root ids in input order.
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn is_root(&self, id: &str) -> bool {
        self.root_set.contains(id)
    }

    /// Direct replies of `id`, in input order.
    pub fn children(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Effective parent of `id` (after dangling links and cycles are cut).
    pub fn parent(&self, id: &str) -> Option<&str> {
        self.parents.get(id).map(String::as_str)
    }

    /// Every `(child, parent)` link in the effective tree.
    pub fn links(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parents.iter().map(|(c, p)| (c.as_str(), p.as_str()))
    }

    /// Root = 0, reply = parent + 1.
    pub fn depth(&self, id: &str) -> Option<usize> {
        self.depth.get(id).copied()
    }

    /// Number of ids transitively below `id`, not counting itself.
    pub fn descendant_count(&self, id: &str) -> usize {
        self.descendant_count.get(id).copied().unwrap_or(0)
    }

    /// All ids below `id`, in pre-order.
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let mut out = Vec::with_capacity(self.descendant_count(id));
        let mut stack: Vec<&str> = self.children(id).iter().rev().map(String::as_str).collect();
        while let Some(next) = stack.pop() {
            out.push(next.to_string());
            stack.extend(self.children(next).iter().rev().map(String::as_str));
        }
        out
    }

    /// Root of the tree containing `id`.
    pub fn thread_root<'a>(&'a self, id: &'a str) -> Option<&'a str> {
        if !self.contains(id) {
            return None;
        }
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        Some(current)
    }

    /// Every tree in pre-order with its depth, roots in input order.
    pub fn flatten(&self) -> Vec<ThreadEntry<'_>> {
        let mut out = Vec::with_capacity(self.len());
        for root in &self.roots {
            out.push(ThreadEntry { id: root, depth: 0 });
            for id in self.descendants(root) {
                if let Some((id, &depth)) = self.depth.get_key_value(id.as_str()) {
                    out.push(ThreadEntry { id, depth });
                }
            }
        }
        out
    }
}

/// Cut every parent cycle by promoting its earliest member to a root.
fn break_cycles<'a>(
    order: &[&'a str],
    rank: &HashMap<&'a str, usize>,
    parents: &mut HashMap<&'a str, &'a str>,
) {
    let mut state: HashMap<&str, Visit> = HashMap::with_capacity(order.len());

    for &start in order {
        let mut path: Vec<&str> = Vec::new();
        let mut current = start;
        loop {
            match state.get(current) {
                Some(Visit::Done) => break,
                Some(Visit::OnPath) => {
                    let from = path.iter().position(|&id| id == current).unwrap_or(0);
                    let earliest = path[from..]
                        .iter()
                        .min_by_key(|id| rank.get(*id).copied().unwrap_or(usize::MAX))
                        .copied();
                    if let Some(earliest) = earliest {
                        tracing::debug!("Breaking reply cycle at memo {}", earliest);
                        parents.remove(earliest);
                    }
                    break;
                }
                None => {
                    state.insert(current, Visit::OnPath);
                    path.push(current);
                    match parents.get(current) {
                        Some(&parent) => current = parent,
                        None => break,
                    }
                }
            }
        }
        for id in path {
            state.insert(id, Visit::Done);
        }
    }
}

/// Built thread indexes keyed by storage unit and category
#[derive(Debug, Default)]
pub struct ThreadIndexCache {
    indexes: HashMap<CacheKey, Arc<ThreadIndex>>,
}

impl ThreadIndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<ThreadIndex>> {
        self.indexes.get(key).cloned()
    }

    /// Cached index for `key`, building it from `records` on a miss.
    pub fn get_or_build(&mut self, key: &CacheKey, records: &[MemoRecord]) -> Arc<ThreadIndex> {
        if let Some(index) = self.indexes.get(key) {
            return Arc::clone(index);
        }
        tracing::debug!("Building thread index for {}", key);
        let index = Arc::new(ThreadIndex::build(records));
        self.indexes.insert(key.clone(), Arc::clone(&index));
        index
    }

    /// Drop every index built from `unit_id`.
    pub fn invalidate_unit(&mut self, unit_id: &str) {
        self.indexes.retain(|key, _| key.unit_id() != unit_id);
    }

    pub fn clear(&mut self) {
        self.indexes.clear();
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}
