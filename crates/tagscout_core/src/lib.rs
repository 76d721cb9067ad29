//! Tagscout core: pure discovery model, identity rules and crawl bookkeeping.
mod aggregate;
mod follows;
mod identity;
mod link_header;
mod model;
mod options;
mod plan;
mod rate_limit;
mod session;
mod shuffle;
mod state;

pub use aggregate::{DedupAggregator, Insertion};
pub use follows::{FollowRegistry, FollowSet};
pub use identity::{
    canonical_identity, identity_key, same_identity, same_server, server_base_url, server_host,
};
pub use link_header::next_link;
pub use model::{Account, DiscoveryItem, Post};
pub use options::{normalize_hashtags, OptionsError, SearchOptions, MAX_PER_SERVER_LIMIT};
pub use plan::{plan_pass, ServerStep};
pub use rate_limit::RateLimitSignal;
pub use session::{HomeSession, SelfIdentity};
pub use shuffle::{shuffle_seeded, wall_clock_seed, Lcg};
pub use state::{CrawlState, CursorState, PassOptions};
