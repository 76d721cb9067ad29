use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::identity_key;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Canonical `localpart@host`; compared case-insensitively.
    pub identity: String,
    /// Home-instance-local id, known once the account was resolved at home.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Opaque presentation data as returned by the server.
    #[serde(default)]
    pub display: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discoverable: Option<bool>,
}

impl Account {
    pub fn key(&self) -> String {
        identity_key(&self.identity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryItem {
    pub account: Account,
    pub post: Post,
}

impl DiscoveryItem {
    pub fn new(account: Account, post: Post) -> Self {
        Self { account, post }
    }

    pub fn key(&self) -> String {
        self.account.key()
    }

    /// Recency rule shared by every merge: strictly later wins, ties keep `self`.
    pub fn is_superseded_by(&self, other: &DiscoveryItem) -> bool {
        other.post.created_at > self.post.created_at
    }
}
