//! Calls against the caller's own instance that sit outside a crawl pass.
use std::collections::HashMap;

use scout_logging::{scout_debug, scout_info, scout_warn};
use tagscout_core::{identity_key, FollowSet, SelfIdentity};

use crate::types::Relationship;
use crate::{DiscoveryError, MastodonApi};

/// Enumerates everything the caller follows, following `Link` pages to the end.
///
/// Local accounts are canonicalized with `home_host`. A rate limit anywhere in
/// the enumeration fails the whole call; no partial set is returned.
pub async fn load_follows(
    api: &dyn MastodonApi,
    home_host: &str,
) -> Result<FollowSet, DiscoveryError> {
    let mut follows = FollowSet::new();
    let mut next: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = api.following_page(next.as_deref()).await?;
        pages += 1;
        if page.items.is_empty() {
            break;
        }
        for account in &page.items {
            follows.insert(&account.canonical(home_host), Some(account.id.as_str()));
        }
        match page.next {
            Some(link) if next.as_deref() != Some(link.as_str()) => next = Some(link),
            _ => break,
        }
    }

    scout_info!("loaded {} follow keys over {} pages", follows.len(), pages);
    Ok(follows)
}

/// Resolves `identity` on the home instance and follows it.
pub async fn follow_account(
    api: &dyn MastodonApi,
    identity: &str,
) -> Result<Relationship, DiscoveryError> {
    let account = api.lookup_account(identity).await?;
    scout_debug!("following {} (local id {})", identity, account.id);
    api.follow(&account.id).await
}

/// Relationship of the caller to each of `identities`, keyed by the identity
/// as given. Handles that cannot be resolved map to `None`.
pub async fn relationships_for(
    api: &dyn MastodonApi,
    identities: &[String],
) -> Result<HashMap<String, Option<Relationship>>, DiscoveryError> {
    let mut resolved = Vec::new();
    let mut result = HashMap::new();

    for identity in identities {
        match api.lookup_account(identity).await {
            Ok(account) => resolved.push((identity.clone(), account.id)),
            Err(err @ DiscoveryError::RateLimited(_)) => return Err(err),
            Err(err) => {
                scout_warn!("no relationship for {}: {}", identity, err);
                result.insert(identity.clone(), None);
            }
        }
    }

    let ids: Vec<String> = resolved.iter().map(|(_, id)| id.clone()).collect();
    let mut by_id: HashMap<String, Relationship> = api
        .relationships(&ids)
        .await?
        .into_iter()
        .map(|relationship| (relationship.id.clone(), relationship))
        .collect();

    for (identity, id) in resolved {
        result.insert(identity, by_id.remove(&id));
    }
    Ok(result)
}

/// The caller's own canonical identity and local id.
pub async fn current_identity(
    api: &dyn MastodonApi,
    home_host: &str,
) -> Result<SelfIdentity, DiscoveryError> {
    let account = api.verify_credentials().await?;
    let identity = account.canonical(home_host);
    scout_debug!("signed in as {}", identity_key(&identity));
    Ok(SelfIdentity {
        identity,
        id: account.id,
    })
}
