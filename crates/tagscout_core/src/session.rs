use serde::{Deserialize, Serialize};

use crate::identity::{identity_key, server_base_url, server_host};

/// The caller's own account on the home instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfIdentity {
    /// Canonical `localpart@host`.
    pub identity: String,
    pub id: String,
}

/// What the identity provider hands the engine: where home is and how to
/// authenticate there. Read-only from the engine's point of view.
#[derive(Clone, PartialEq, Eq)]
pub struct HomeSession {
    base_url: String,
    token: String,
    me: Option<SelfIdentity>,
}

impl HomeSession {
    pub fn new(instance: &str, token: impl Into<String>) -> Self {
        Self {
            base_url: server_base_url(instance),
            token: token.into(),
            me: None,
        }
    }

    pub fn with_identity(mut self, me: SelfIdentity) -> Self {
        self.me = Some(me);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn host(&self) -> String {
        server_host(&self.base_url)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn me(&self) -> Option<&SelfIdentity> {
        self.me.as_ref()
    }

    /// True if `identity` or `id` names the caller.
    pub fn is_me(&self, identity: &str, id: Option<&str>) -> bool {
        match &self.me {
            Some(me) => {
                identity_key(&me.identity) == identity_key(identity) || id == Some(me.id.as_str())
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for HomeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeSession")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("me", &self.me)
            .finish()
    }
}
