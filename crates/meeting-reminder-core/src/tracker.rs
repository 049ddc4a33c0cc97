//! Set of event ids that have already been notified in this process.

use std::collections::HashSet;

/// Monotonically growing record of handled event ids.
///
/// There is no eviction: once an id is marked it stays excluded for the
/// lifetime of the owning scheduler. Nothing here is persisted.
#[derive(Debug, Default, Clone)]
pub struct NotifiedSet {
    ids: HashSet<String>,
}

impl NotifiedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Record `id`. Returns `false` if it was already present.
    pub fn mark_notified(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        self.ids.insert(id.to_owned())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
