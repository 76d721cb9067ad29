use std::collections::HashMap;

use crate::model::DiscoveryItem;

/// Result of offering an item to a [`DedupAggregator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// First item seen for this identity.
    Inserted,
    /// Replaced an entry with an older post.
    Replaced,
    /// An entry at least as recent already exists.
    Kept,
}

impl Insertion {
    pub fn is_stored(self) -> bool {
        matches!(self, Insertion::Inserted | Insertion::Replaced)
    }
}

/// One entry per canonical identity, keeping the most recent post.
///
/// Entries remember the order in which identities were first seen so that the
/// final sort is stable for equal timestamps.
#[derive(Debug, Clone, Default)]
pub struct DedupAggregator {
    slots: HashMap<String, usize>,
    items: Vec<DiscoveryItem>,
}

impl DedupAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: DiscoveryItem) -> Insertion {
        let key = item.key();
        match self.slots.get(&key) {
            Some(&slot) => {
                if self.items[slot].is_superseded_by(&item) {
                    self.items[slot] = item;
                    Insertion::Replaced
                } else {
                    Insertion::Kept
                }
            }
            None => {
                self.slots.insert(key, self.items.len());
                self.items.push(item);
                Insertion::Inserted
            }
        }
    }

    /// Entries in the order their identities were first seen. A replaced
    /// entry keeps its original position.
    pub fn into_items(self) -> Vec<DiscoveryItem> {
        self.items
    }

    /// Entries sorted by post time, newest first.
    pub fn into_sorted(self) -> Vec<DiscoveryItem> {
        let mut items = self.items;
        items.sort_by(|a, b| b.post.created_at.cmp(&a.post.created_at));
        items
    }
}

impl FromIterator<DiscoveryItem> for DedupAggregator {
    fn from_iter<I: IntoIterator<Item = DiscoveryItem>>(iter: I) -> Self {
        let mut aggregator = DedupAggregator::new();
        for item in iter {
            aggregator.insert(item);
        }
        aggregator
    }
}
