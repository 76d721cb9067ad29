use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound accepted by the tag timeline endpoint.
pub const MAX_PER_SERVER_LIMIT: u32 = 40;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub max_servers: usize,
    pub concurrency: usize,
    pub per_server_limit: u32,
    pub deep_mode: bool,
    pub filter_statuses: bool,
    pub randomize: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_servers: 20,
            concurrency: 4,
            per_server_limit: MAX_PER_SERVER_LIMIT,
            deep_mode: true,
            filter_statuses: false,
            randomize: false,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("max_servers must be at least 1")]
    NoServers,
    #[error("concurrency must be at least 1")]
    NoConcurrency,
    #[error("per_server_limit must be between 1 and {MAX_PER_SERVER_LIMIT}, got {0}")]
    PerServerLimit(u32),
    #[error("no usable hashtags in {0:?}")]
    NoHashtags(Vec<String>),
}

impl SearchOptions {
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.max_servers == 0 {
            return Err(OptionsError::NoServers);
        }
        if self.concurrency == 0 {
            return Err(OptionsError::NoConcurrency);
        }
        if self.per_server_limit == 0 || self.per_server_limit > MAX_PER_SERVER_LIMIT {
            return Err(OptionsError::PerServerLimit(self.per_server_limit));
        }
        Ok(())
    }
}

/// Trims, strips a leading `#` and drops empty or repeated tags (case-insensitive).
pub fn normalize_hashtags<S: AsRef<str>>(raw: &[S]) -> Result<Vec<String>, OptionsError> {
    let mut seen = HashSet::new();
    let tags: Vec<String> = raw
        .iter()
        .map(|tag| tag.as_ref().trim().trim_start_matches('#').trim().to_string())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.to_lowercase()))
        .collect();

    if tags.is_empty() {
        return Err(OptionsError::NoHashtags(
            raw.iter().map(|tag| tag.as_ref().to_string()).collect(),
        ));
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::{normalize_hashtags, OptionsError, SearchOptions};

    #[test]
    fn hashtags_are_trimmed_and_deduped() {
        let tags = normalize_hashtags(&["#Rust", " rust ", "", "#fediverse"]).unwrap();
        assert_eq!(tags, vec!["Rust".to_string(), "fediverse".to_string()]);
    }

    #[test]
    fn only_empty_hashtags_is_an_error() {
        let err = normalize_hashtags(&["#", "  "]).unwrap_err();
        assert!(matches!(err, OptionsError::NoHashtags(_)));
    }

    #[test]
    fn zero_concurrency_rejected() {
        let options = SearchOptions {
            concurrency: 0,
            ..SearchOptions::default()
        };
        assert_eq!(options.validate(), Err(OptionsError::NoConcurrency));
    }
}
