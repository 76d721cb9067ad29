//! Tagscout engine: remote calls, throttled known-entity checks and the
//! bounded crawl over many servers.
mod api;
mod directory;
mod discovery;
mod error;
mod events;
mod gate;
mod home;
mod known;
mod scheduler;
mod types;
mod worker;

pub use api::{ClientSettings, MastodonApi, ReqwestMastodon};
pub use directory::{fetch_ranked, rank, select_servers};
pub use discovery::{CrawlOutcome, Discovery};
pub use error::DiscoveryError;
pub use events::{ChannelSink, CrawlEvent, CrawlSink, NullSink};
pub use gate::{ThrottleGate, KNOWN_CHECK_SPACING};
pub use home::{current_identity, follow_account, load_follows, relationships_for};
pub use known::{CacheSettings, KnownEntityCache};
pub use scheduler::{run_pass, PassReport};
pub use types::{
    DirectoryEntry, Page, Relationship, RemoteAccount, SearchKind, SearchResults, Status,
};
pub use worker::{search_server, ResolveMemo, SearchContext, ServerPage};
