use std::collections::HashMap;

use scout_logging::{scout_debug, scout_warn};
use tagscout_core::{
    server_host, DedupAggregator, DiscoveryItem, FollowRegistry, HomeSession, PassOptions,
};

use crate::types::{RemoteAccount, Status};
use crate::{DiscoveryError, KnownEntityCache, MastodonApi};

/// Everything one server call needs, borrowed from the crawl.
pub struct SearchContext<'a> {
    pub api: &'a dyn MastodonApi,
    pub session: &'a HomeSession,
    pub follows: &'a dyn FollowRegistry,
    pub known: &'a KnownEntityCache,
    pub hashtags: &'a [String],
    pub options: PassOptions,
}

/// One server's contribution to a pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerPage {
    pub items: Vec<DiscoveryItem>,
    /// Post id of the last kept item in receipt order; `None` when nothing
    /// was kept, after which the server is never asked again.
    pub cursor: Option<String>,
}

/// Home-instance lookups made during one server call, keyed by identity.
/// A `None` entry remembers a lookup that failed.
pub type ResolveMemo = HashMap<String, Option<RemoteAccount>>;

/// Fetches one page of every hashtag from `server` and keeps the posts worth
/// showing. Post-level failures skip the post; a failed timeline fetch fails
/// the whole server.
pub async fn search_server(
    ctx: &SearchContext<'_>,
    server: &str,
    cursor: Option<&str>,
) -> Result<ServerPage, DiscoveryError> {
    let host = server_host(server);
    if ctx.options.deep_mode && host == ctx.session.host() {
        scout_debug!("skipping home instance {} in deep mode", host);
        return Ok(ServerPage::default());
    }

    let mut page = DedupAggregator::new();
    let mut resolved = ResolveMemo::new();

    for tag in ctx.hashtags {
        let entries = ctx
            .api
            .tag_timeline(server, tag, ctx.options.per_server_limit, cursor)
            .await?;
        scout_debug!("{} returned {} posts for #{}", host, entries.len(), tag);

        for entry in entries {
            let status: Status = match serde_json::from_value(entry) {
                Ok(status) => status,
                Err(err) => {
                    scout_warn!("skipping malformed post from {}: {}", host, err);
                    continue;
                }
            };
            match accept_status(ctx, &host, &status, &mut resolved).await {
                Ok(Some(item)) => {
                    page.insert(item);
                }
                Ok(None) => {}
                Err(err) => {
                    scout_warn!("skipping post {} from {}: {}", status.id, host, err);
                }
            }
        }
    }

    let items = page.into_items();
    let cursor = items.last().map(|item| item.post.id.clone());
    Ok(ServerPage { items, cursor })
}

async fn accept_status(
    ctx: &SearchContext<'_>,
    host: &str,
    status: &Status,
    resolved: &mut ResolveMemo,
) -> Result<Option<DiscoveryItem>, DiscoveryError> {
    let account = &status.account;
    let identity = account.canonical(host);

    if ctx.session.is_me(&identity, None) || ctx.follows.is_followed(&identity) {
        return Ok(None);
    }

    if ctx.options.deep_mode {
        return accept_deep(ctx, status, identity).await;
    }

    let home = resolve(ctx, &identity, resolved).await?;
    let home_identity = home.canonical(&ctx.session.host());
    if ctx.session.is_me(&home_identity, Some(home.id.as_str()))
        || ctx.follows.is_followed(&home_identity)
        || ctx.follows.is_followed(&home.id)
    {
        return Ok(None);
    }
    // Stricter than deep mode: a missing flag counts as not discoverable.
    if home.discoverable != Some(true) {
        return Ok(None);
    }

    let account = home.to_account(home_identity, Some(home.id.clone()));
    Ok(Some(DiscoveryItem::new(account, status.to_post())))
}

async fn accept_deep(
    ctx: &SearchContext<'_>,
    status: &Status,
    identity: String,
) -> Result<Option<DiscoveryItem>, DiscoveryError> {
    let home_host = ctx.session.host();
    if ctx
        .known
        .is_account_known(ctx.api, &home_host, &identity)
        .await?
    {
        return Ok(None);
    }

    if ctx.options.filter_statuses {
        if let Some(url) = status.canonical_url() {
            if ctx.known.is_status_known(ctx.api, url).await? {
                return Ok(None);
            }
        }
    }

    if status.account.discoverable == Some(false) {
        return Ok(None);
    }

    let account = status.account.to_account(identity, None);
    Ok(Some(DiscoveryItem::new(account, status.to_post())))
}

async fn resolve(
    ctx: &SearchContext<'_>,
    identity: &str,
    resolved: &mut ResolveMemo,
) -> Result<RemoteAccount, DiscoveryError> {
    let key = tagscout_core::identity_key(identity);
    if let Some(entry) = resolved.get(&key) {
        return entry.clone().ok_or_else(|| DiscoveryError::Resolution {
            acct: identity.to_string(),
            message: "lookup already failed on this server".to_string(),
        });
    }

    match ctx.api.lookup_account(identity).await {
        Ok(account) => {
            resolved.insert(key, Some(account.clone()));
            Ok(account)
        }
        Err(err @ DiscoveryError::Resolution { .. }) => {
            resolved.insert(key, None);
            Err(err)
        }
        Err(err) => Err(err),
    }
}
