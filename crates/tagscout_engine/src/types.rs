use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tagscout_core::{canonical_identity, Account, Post};

/// A post as returned by a tag timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    pub account: RemoteAccount,
}

impl Status {
    /// Public URL of the post, falling back to its ActivityPub id.
    pub fn canonical_url(&self) -> Option<&str> {
        self.url.as_deref().or(self.uri.as_deref())
    }

    pub fn to_post(&self) -> Post {
        Post {
            id: self.id.clone(),
            created_at: self.created_at,
            url: self.canonical_url().map(str::to_string),
        }
    }
}

/// An account record from any server. Fields the engine does not interpret
/// are kept verbatim in `extra` and handed on as display data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteAccount {
    pub id: String,
    pub acct: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub discoverable: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RemoteAccount {
    /// Canonical identity of this record as seen from `host`.
    pub fn canonical(&self, host: &str) -> String {
        canonical_identity(&self.acct, self.url.as_deref(), host)
    }

    pub fn to_account(&self, identity: String, id: Option<String>) -> Account {
        Account {
            identity,
            id,
            display: Value::Object(self.extra.clone()),
            discoverable: self.discoverable,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub accounts: Vec<RemoteAccount>,
    #[serde(default)]
    pub statuses: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Accounts,
    Statuses,
}

impl SearchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchKind::Accounts => "accounts",
            SearchKind::Statuses => "statuses",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    #[serde(default)]
    pub following: bool,
    #[serde(default)]
    pub requested: bool,
    #[serde(default)]
    pub followed_by: bool,
}

/// One server from the public directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub domain: String,
    #[serde(default, alias = "users")]
    pub total_users: u64,
}

/// A page of a `Link`-paginated collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}
