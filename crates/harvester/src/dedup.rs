use dashmap::DashSet;
use std::sync::Arc;

/// Run-scoped set of tournament ids already claimed by some domain worker.
/// Cloning shares the underlying set.
#[derive(Debug, Clone, Default)]
pub struct DedupSet {
    ids: Arc<DashSet<i64>>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic check-and-set: exactly one caller wins for a given id.
    pub fn insert_if_absent(&self, id: i64) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    /// True when `ids` is non-empty and every id is already claimed.
    pub fn all_known(&self, ids: impl IntoIterator<Item = i64>) -> bool {
        let mut any = false;
        for id in ids {
            any = true;
            if !self.contains(id) {
                return false;
            }
        }
        any
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
