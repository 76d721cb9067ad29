use std::collections::HashSet;

use crate::identity::identity_key;

/// Read-only oracle answering "does the caller already follow this?".
///
/// Keys are canonical handles or home-instance-local account ids.
pub trait FollowRegistry: Send + Sync {
    fn is_followed(&self, key: &str) -> bool;
}

/// In-memory registry of followed handles and ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowSet {
    keys: HashSet<String>,
}

impl FollowSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one followed account by canonical handle and, when known, local id.
    pub fn insert(&mut self, identity: &str, id: Option<&str>) {
        self.keys.insert(identity_key(identity));
        if let Some(id) = id {
            self.keys.insert(id.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FollowRegistry for FollowSet {
    fn is_followed(&self, key: &str) -> bool {
        self.keys.contains(key) || self.keys.contains(&identity_key(key))
    }
}
