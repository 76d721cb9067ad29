use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, LINK, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode};
use scout_logging::scout_debug;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tagscout_core::{next_link, server_base_url, HomeSession, RateLimitSignal};
use url::Url;

use crate::types::{
    DirectoryEntry, Page, Relationship, RemoteAccount, SearchKind, SearchResults,
};
use crate::DiscoveryError;

const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: String,
    pub directory_url: String,
    pub following_page_size: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            user_agent: concat!("tagscout/", env!("CARGO_PKG_VERSION")).to_string(),
            directory_url: "https://api.joinmastodon.org/servers".to_string(),
            following_page_size: 80,
        }
    }
}

/// The remote calls the engine makes. Tag timelines go to arbitrary servers
/// without credentials; everything else goes to the home instance.
#[async_trait::async_trait]
pub trait MastodonApi: Send + Sync {
    async fn fetch_directory(&self) -> Result<Vec<DirectoryEntry>, DiscoveryError>;

    /// Raw timeline entries, in the order the server sent them. Each one is
    /// decoded into a [`Status`](crate::Status) on its own by the caller.
    async fn tag_timeline(
        &self,
        server: &str,
        tag: &str,
        limit: u32,
        max_id: Option<&str>,
    ) -> Result<Vec<Value>, DiscoveryError>;

    async fn lookup_account(&self, acct: &str) -> Result<RemoteAccount, DiscoveryError>;

    async fn relationships(&self, ids: &[String]) -> Result<Vec<Relationship>, DiscoveryError>;

    async fn search(&self, query: &str, kind: SearchKind)
        -> Result<SearchResults, DiscoveryError>;

    async fn follow(&self, account_id: &str) -> Result<Relationship, DiscoveryError>;

    /// First page when `next` is `None`, otherwise the page behind a `rel="next"` link.
    async fn following_page(
        &self,
        next: Option<&str>,
    ) -> Result<Page<RemoteAccount>, DiscoveryError>;

    async fn verify_credentials(&self) -> Result<RemoteAccount, DiscoveryError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestMastodon {
    settings: ClientSettings,
    session: HomeSession,
    client: reqwest::Client,
}

impl ReqwestMastodon {
    pub fn new(settings: ClientSettings, session: HomeSession) -> Result<Self, DiscoveryError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|err| DiscoveryError::network(err.to_string()))?;

        Ok(Self {
            settings,
            session,
            client,
        })
    }

    pub fn session(&self) -> &HomeSession {
        &self.session
    }

    fn home_url(&self, segments: &[&str]) -> Result<Url, DiscoveryError> {
        endpoint(self.session.base_url(), segments)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.session.token())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, DiscoveryError> {
        let response = request.send().await?;
        check_status(response)
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response) -> Result<T, DiscoveryError> {
        let bytes = self.read_body(response).await?;
        serde_json::from_slice(&bytes)
            .map_err(|err| DiscoveryError::network(format!("invalid response body: {err}")))
    }

    async fn read_body(&self, response: Response) -> Result<Vec<u8>, DiscoveryError> {
        let max_bytes = self.settings.max_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(DiscoveryError::TooLarge { max_bytes });
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if bytes.len() as u64 + chunk.len() as u64 > max_bytes {
                return Err(DiscoveryError::TooLarge { max_bytes });
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }

    async fn get_home<T: DeserializeOwned>(&self, url: Url) -> Result<T, DiscoveryError> {
        let response = self.send(self.authed(self.client.get(url))).await?;
        self.read_json(response).await
    }
}

#[async_trait::async_trait]
impl MastodonApi for ReqwestMastodon {
    async fn fetch_directory(&self) -> Result<Vec<DirectoryEntry>, DiscoveryError> {
        let url = Url::parse(&self.settings.directory_url).map_err(|err| {
            DiscoveryError::Directory(format!("{}: {err}", self.settings.directory_url))
        })?;
        let fetched: Result<Vec<DirectoryEntry>, DiscoveryError> = async {
            let response = self.send(self.client.get(url)).await?;
            self.read_json(response).await
        }
        .await;
        fetched.map_err(|err| DiscoveryError::Directory(err.to_string()))
    }

    async fn tag_timeline(
        &self,
        server: &str,
        tag: &str,
        limit: u32,
        max_id: Option<&str>,
    ) -> Result<Vec<Value>, DiscoveryError> {
        let mut url = endpoint(
            &server_base_url(server),
            &["api", "v1", "timelines", "tag", tag],
        )?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &limit.to_string());
            if let Some(max_id) = max_id {
                query.append_pair("max_id", max_id);
            }
        }
        scout_debug!("GET {}", url);
        let response = self.send(self.client.get(url)).await?;
        self.read_json(response).await
    }

    async fn lookup_account(&self, acct: &str) -> Result<RemoteAccount, DiscoveryError> {
        let mut url = self.home_url(&["api", "v1", "accounts", "lookup"])?;
        url.query_pairs_mut()
            .append_pair("acct", acct)
            .append_pair("resolve", "true");

        self.get_home(url).await.map_err(|err| match err {
            DiscoveryError::RateLimited(signal) => DiscoveryError::RateLimited(signal),
            other => DiscoveryError::Resolution {
                acct: acct.to_string(),
                message: other.to_string(),
            },
        })
    }

    async fn relationships(&self, ids: &[String]) -> Result<Vec<Relationship>, DiscoveryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut url = self.home_url(&["api", "v1", "accounts", "relationships"])?;
        {
            let mut query = url.query_pairs_mut();
            for id in ids {
                query.append_pair("id[]", id);
            }
        }
        self.get_home(url).await
    }

    async fn search(
        &self,
        query: &str,
        kind: SearchKind,
    ) -> Result<SearchResults, DiscoveryError> {
        let mut url = self.home_url(&["api", "v2", "search"])?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("type", kind.as_str())
            .append_pair("resolve", "false");
        self.get_home(url).await
    }

    async fn follow(&self, account_id: &str) -> Result<Relationship, DiscoveryError> {
        let url = self.home_url(&["api", "v1", "accounts", account_id, "follow"])?;
        let response = self.send(self.authed(self.client.post(url))).await?;
        self.read_json(response).await
    }

    async fn following_page(
        &self,
        next: Option<&str>,
    ) -> Result<Page<RemoteAccount>, DiscoveryError> {
        let url = match next {
            Some(next) => Url::parse(next).map_err(|err| DiscoveryError::InvalidUrl {
                url: next.to_string(),
                message: err.to_string(),
            })?,
            None => {
                let me = self.session.me().ok_or(DiscoveryError::MissingIdentity)?;
                let mut url = self.home_url(&["api", "v1", "accounts", &me.id, "following"])?;
                url.query_pairs_mut()
                    .append_pair("limit", &self.settings.following_page_size.to_string());
                url
            }
        };

        let response = self.send(self.authed(self.client.get(url))).await?;
        let next = link_next(response.headers());
        let items = self.read_json(response).await?;
        Ok(Page { items, next })
    }

    async fn verify_credentials(&self) -> Result<RemoteAccount, DiscoveryError> {
        let url = self.home_url(&["api", "v1", "accounts", "verify_credentials"])?;
        self.get_home(url).await
    }
}

/// `base` with `segments` appended as percent-encoded path segments.
fn endpoint(base: &str, segments: &[&str]) -> Result<Url, DiscoveryError> {
    let invalid = |message: String| DiscoveryError::InvalidUrl {
        url: base.to_string(),
        message,
    };
    let mut url = Url::parse(base).map_err(|err| invalid(err.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn check_status(response: Response) -> Result<Response, DiscoveryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let headers = response.headers();
    match status {
        StatusCode::TOO_MANY_REQUESTS => Err(DiscoveryError::RateLimited(
            RateLimitSignal::from_headers(
                header_str(headers, RETRY_AFTER.as_str()),
                header_str(headers, RATE_LIMIT_RESET),
                Utc::now(),
            ),
        )),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(DiscoveryError::Permission {
            status: status.as_u16(),
        }),
        _ => Err(DiscoveryError::Network {
            status: Some(status.as_u16()),
            message: status.to_string(),
        }),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn link_next(headers: &HeaderMap) -> Option<String> {
    header_str(headers, LINK.as_str()).and_then(next_link)
}
