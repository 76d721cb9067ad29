use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use scout_logging::{scout_debug, scout_warn};
use tagscout_core::{identity_key, same_identity};
use tokio::time::Instant;

use crate::gate::{ThrottleGate, KNOWN_CHECK_SPACING};
use crate::types::SearchKind;
use crate::{DiscoveryError, MastodonApi};

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Entries kept per kind (accounts, statuses); oldest are evicted first.
    pub max_entries: usize,
    pub ttl: Duration,
    pub min_spacing: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(30 * 60),
            min_spacing: KNOWN_CHECK_SPACING,
        }
    }
}

/// Remembers whether accounts and posts are already known to the home
/// instance. One cache belongs to one home session; every lookup it makes
/// goes through a single [`ThrottleGate`].
#[derive(Debug)]
pub struct KnownEntityCache {
    gate: ThrottleGate,
    accounts: Mutex<Memo>,
    statuses: Mutex<Memo>,
}

impl KnownEntityCache {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            gate: ThrottleGate::new(settings.min_spacing),
            accounts: Mutex::new(Memo::new(settings.max_entries, settings.ttl)),
            statuses: Mutex::new(Memo::new(settings.max_entries, settings.ttl)),
        }
    }

    /// Does the home instance already know `identity`? Results of local
    /// accounts (no `@` in their acct) are canonicalized with `home_host`.
    pub async fn is_account_known(
        &self,
        api: &dyn MastodonApi,
        home_host: &str,
        identity: &str,
    ) -> Result<bool, DiscoveryError> {
        let key = identity_key(identity);
        self.check(&self.accounts, key, move || async move {
            let results = api.search(identity, SearchKind::Accounts).await?;
            Ok(results
                .accounts
                .iter()
                .any(|account| same_identity(&account.canonical(home_host), identity)))
        })
        .await
    }

    /// Does the home instance already know the post at `url`?
    pub async fn is_status_known(
        &self,
        api: &dyn MastodonApi,
        url: &str,
    ) -> Result<bool, DiscoveryError> {
        let key = url.trim().to_string();
        self.check(&self.statuses, key, move || async move {
            let results = api.search(url, SearchKind::Statuses).await?;
            Ok(!results.statuses.is_empty())
        })
        .await
    }

    pub fn cached_accounts(&self) -> usize {
        lock(&self.accounts).len()
    }

    pub fn cached_statuses(&self) -> usize {
        lock(&self.statuses).len()
    }

    async fn check<F, Fut>(
        &self,
        memo: &Mutex<Memo>,
        key: String,
        lookup: F,
    ) -> Result<bool, DiscoveryError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<bool, DiscoveryError>>,
    {
        let cached = lock(memo).get(&key);
        if let Some(known) = cached {
            return Ok(known);
        }

        let checked = self
            .gate
            .run_unless(
                // Another caller may have filled the entry while we queued.
                || lock(memo).get(&key).map(Checked::Cached),
                async {
                    let outcome = lookup().await;
                    if let Ok(known) = &outcome {
                        lock(memo).insert(key.clone(), *known);
                    }
                    Checked::Fetched(outcome)
                },
            )
            .await;

        match checked {
            Checked::Cached(known) => Ok(known),
            Checked::Fetched(Ok(known)) => {
                scout_debug!("known check {} -> {}", key, known);
                Ok(known)
            }
            Checked::Fetched(Err(DiscoveryError::Permission { status })) => {
                // Scope problems are not facts about the entity: do not cache.
                scout_warn!(
                    "known check for {} denied (status {}); treating as unknown",
                    key,
                    status
                );
                Ok(false)
            }
            Checked::Fetched(Err(err)) => Err(err),
        }
    }
}

enum Checked {
    Cached(bool),
    Fetched(Result<bool, DiscoveryError>),
}

impl Default for KnownEntityCache {
    fn default() -> Self {
        Self::new(CacheSettings::default())
    }
}

fn lock(memo: &Mutex<Memo>) -> std::sync::MutexGuard<'_, Memo> {
    memo.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bounded map with per-entry expiry and oldest-first eviction.
#[derive(Debug)]
struct Memo {
    max_entries: usize,
    ttl: Duration,
    entries: HashMap<String, (bool, Instant)>,
    order: VecDeque<String>,
}

impl Memo {
    fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            max_entries: max_entries.max(1),
            ttl,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&mut self, key: &str) -> Option<bool> {
        let (known, stored_at) = *self.entries.get(key)?;
        if stored_at.elapsed() >= self.ttl {
            self.entries.remove(key);
            self.order.retain(|queued| queued != key);
            return None;
        }
        Some(known)
    }

    fn insert(&mut self, key: String, known: bool) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, (known, Instant::now()));
            return;
        }
        while self.entries.len() >= self.max_entries {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, (known, Instant::now()));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
