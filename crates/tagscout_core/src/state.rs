use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::options::SearchOptions;

/// Resumable snapshot of a crawl, owned by the caller between passes.
///
/// A server with no entry in `cursors` has not been visited yet. An entry of
/// `None` means the server is exhausted (or failed) and is never asked again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlState {
    pub servers: Vec<String>,
    #[serde(default)]
    pub cursors: BTreeMap<String, Option<String>>,
    pub deep_mode: bool,
    pub filter_statuses: bool,
    pub hashtags: Vec<String>,
    pub per_server_limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState<'a> {
    Fresh,
    Resume(&'a str),
    Exhausted,
}

/// The subset of a crawl's settings that every server call needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassOptions {
    pub deep_mode: bool,
    pub filter_statuses: bool,
    pub per_server_limit: u32,
}

impl CrawlState {
    pub fn new(servers: Vec<String>, hashtags: Vec<String>, options: &SearchOptions) -> Self {
        Self {
            servers,
            cursors: BTreeMap::new(),
            deep_mode: options.deep_mode,
            filter_statuses: options.filter_statuses,
            hashtags,
            per_server_limit: options.per_server_limit,
        }
    }

    pub fn cursor(&self, server: &str) -> CursorState<'_> {
        match self.cursors.get(server) {
            None => CursorState::Fresh,
            Some(Some(cursor)) => CursorState::Resume(cursor),
            Some(None) => CursorState::Exhausted,
        }
    }

    pub fn record(&mut self, server: &str, cursor: Option<String>) {
        self.cursors.insert(server.to_string(), cursor);
    }

    /// True once every server has reported an exhausted cursor.
    pub fn is_exhausted(&self) -> bool {
        self.servers
            .iter()
            .all(|server| self.cursor(server) == CursorState::Exhausted)
    }

    pub fn pass_options(&self) -> PassOptions {
        PassOptions {
            deep_mode: self.deep_mode,
            filter_statuses: self.filter_statuses,
            per_server_limit: self.per_server_limit,
        }
    }
}
