use std::sync::mpsc;

use tagscout_core::DiscoveryItem;

use crate::DiscoveryError;

#[derive(Debug, Clone, PartialEq)]
pub enum CrawlEvent {
    /// One more server finished (searched, failed or skipped).
    Progress { completed: usize, total: usize },
    /// An item entered the pass-wide dedup map, possibly replacing an older post.
    Discovered { item: DiscoveryItem, replaced: bool },
    /// A server contributed nothing this pass and will not be asked again.
    ServerFailed {
        server: String,
        error: DiscoveryError,
    },
}

/// Receives crawl events as they happen. Completion order across servers is
/// unspecified; only `Progress` counts are monotonic.
pub trait CrawlSink: Send + Sync {
    fn emit(&self, event: CrawlEvent);
}

/// Forwards events over a standard channel; a dropped receiver is ignored.
pub struct ChannelSink {
    tx: mpsc::Sender<CrawlEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<CrawlEvent>) -> Self {
        Self { tx }
    }
}

impl CrawlSink for ChannelSink {
    fn emit(&self, event: CrawlEvent) {
        let _ = self.tx.send(event);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl CrawlSink for NullSink {
    fn emit(&self, _event: CrawlEvent) {}
}
