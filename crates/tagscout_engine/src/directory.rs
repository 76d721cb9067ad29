use std::collections::HashSet;

use scout_logging::scout_info;
use tagscout_core::server_host;

use crate::types::DirectoryEntry;
use crate::{DiscoveryError, MastodonApi};

/// Directory entries, most users first. Equal counts keep directory order and
/// a domain listed twice keeps its first entry.
pub async fn fetch_ranked(api: &dyn MastodonApi) -> Result<Vec<DirectoryEntry>, DiscoveryError> {
    let entries = api.fetch_directory().await?;
    let ranked = rank(entries);
    scout_info!("directory lists {} servers", ranked.len());
    Ok(ranked)
}

pub fn rank(entries: Vec<DirectoryEntry>) -> Vec<DirectoryEntry> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<DirectoryEntry> = entries
        .into_iter()
        .filter(|entry| !entry.domain.trim().is_empty())
        .filter(|entry| seen.insert(server_host(&entry.domain)))
        .collect();
    ranked.sort_by(|a, b| b.total_users.cmp(&a.total_users));
    ranked
}

/// Domains of the first `max` ranked entries.
pub fn select_servers(ranked: &[DirectoryEntry], max: usize) -> Vec<String> {
    ranked
        .iter()
        .take(max)
        .map(|entry| entry.domain.trim().to_string())
        .collect()
}
