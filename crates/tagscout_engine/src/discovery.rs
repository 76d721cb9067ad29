use std::collections::HashMap;
use std::sync::Arc;

use scout_logging::scout_info;
use tagscout_core::{
    normalize_hashtags, shuffle_seeded, wall_clock_seed, CrawlState, DiscoveryItem,
    FollowRegistry, FollowSet, HomeSession, OptionsError, SearchOptions, SelfIdentity,
};
use tokio_util::sync::CancellationToken;

use crate::directory::{fetch_ranked, select_servers};
use crate::scheduler::run_pass;
use crate::types::{DirectoryEntry, Relationship};
use crate::worker::SearchContext;
use crate::{home, CrawlSink, DiscoveryError, KnownEntityCache, MastodonApi};

/// Result of a crawl pass: items newest first, the state to continue from,
/// and the servers that failed.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlOutcome {
    pub items: Vec<DiscoveryItem>,
    pub state: CrawlState,
    pub failed: Vec<String>,
}

impl CrawlOutcome {
    /// No server has anything left to page through.
    pub fn is_exhausted(&self) -> bool {
        self.state.is_exhausted()
    }
}

/// Entry point for one home session.
///
/// The known-entity cache is shared, so passes started from clones of the
/// same `Discovery` reuse each other's answers and the same throttle.
#[derive(Clone)]
pub struct Discovery {
    api: Arc<dyn MastodonApi>,
    session: HomeSession,
    known: Arc<KnownEntityCache>,
}

impl Discovery {
    pub fn new(
        api: Arc<dyn MastodonApi>,
        session: HomeSession,
        known: Arc<KnownEntityCache>,
    ) -> Self {
        Self {
            api,
            session,
            known,
        }
    }

    pub fn session(&self) -> &HomeSession {
        &self.session
    }

    pub fn known(&self) -> &KnownEntityCache {
        &self.known
    }

    /// Starts a fresh crawl: ranks the directory, takes the top
    /// `max_servers`, optionally shuffles them, then runs the first pass.
    pub async fn search<S: AsRef<str>>(
        &self,
        hashtags: &[S],
        options: &SearchOptions,
        follows: &dyn FollowRegistry,
        sink: &dyn CrawlSink,
        cancel: &CancellationToken,
    ) -> Result<CrawlOutcome, DiscoveryError> {
        options.validate()?;
        let hashtags = normalize_hashtags(hashtags)?;

        let ranked = fetch_ranked(self.api.as_ref()).await?;
        let mut servers = select_servers(&ranked, options.max_servers);
        if options.randomize {
            let seed = options.seed.unwrap_or_else(wall_clock_seed);
            shuffle_seeded(&mut servers, seed);
            scout_info!("shuffled {} servers with seed {}", servers.len(), seed);
        }

        let state = CrawlState::new(servers, hashtags, options);
        Ok(self
            .run(&state, options.concurrency, follows, sink, cancel)
            .await)
    }

    /// Continues a crawl from `state`. Exhausted servers are not contacted.
    pub async fn next_page(
        &self,
        state: &CrawlState,
        concurrency: usize,
        follows: &dyn FollowRegistry,
        sink: &dyn CrawlSink,
        cancel: &CancellationToken,
    ) -> Result<CrawlOutcome, DiscoveryError> {
        if concurrency == 0 {
            return Err(OptionsError::NoConcurrency.into());
        }
        Ok(self.run(state, concurrency, follows, sink, cancel).await)
    }

    pub async fn rank_servers(&self) -> Result<Vec<DirectoryEntry>, DiscoveryError> {
        fetch_ranked(self.api.as_ref()).await
    }

    pub async fn load_follows(&self) -> Result<FollowSet, DiscoveryError> {
        home::load_follows(self.api.as_ref(), &self.session.host()).await
    }

    pub async fn follow(&self, identity: &str) -> Result<Relationship, DiscoveryError> {
        home::follow_account(self.api.as_ref(), identity).await
    }

    pub async fn relationships(
        &self,
        identities: &[String],
    ) -> Result<HashMap<String, Option<Relationship>>, DiscoveryError> {
        home::relationships_for(self.api.as_ref(), identities).await
    }

    pub async fn current_identity(&self) -> Result<SelfIdentity, DiscoveryError> {
        home::current_identity(self.api.as_ref(), &self.session.host()).await
    }

    async fn run(
        &self,
        state: &CrawlState,
        concurrency: usize,
        follows: &dyn FollowRegistry,
        sink: &dyn CrawlSink,
        cancel: &CancellationToken,
    ) -> CrawlOutcome {
        let ctx = SearchContext {
            api: self.api.as_ref(),
            session: &self.session,
            follows,
            known: &self.known,
            hashtags: &state.hashtags,
            options: state.pass_options(),
        };
        scout_info!(
            "pass over {} servers for {:?} (deep: {})",
            state.servers.len(),
            state.hashtags,
            state.deep_mode
        );

        let report = run_pass(&ctx, state, concurrency, sink, cancel).await;
        if !report.failed.is_empty() {
            scout_info!("{} servers failed this pass", report.failed.len());
        }
        CrawlOutcome {
            items: report.aggregator.into_sorted(),
            state: report.state,
            failed: report.failed,
        }
    }
}

impl std::fmt::Debug for Discovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discovery")
            .field("session", &self.session)
            .field("known", &self.known)
            .finish_non_exhaustive()
    }
}
