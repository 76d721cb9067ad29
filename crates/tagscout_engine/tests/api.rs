use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tagscout_core::{
    CrawlState, FollowRegistry, FollowSet, HomeSession, SearchOptions, SelfIdentity,
};
use tagscout_engine::{
    current_identity, fetch_ranked, follow_account, load_follows, relationships_for,
    CacheSettings, ClientSettings, Discovery, DiscoveryError, KnownEntityCache, MastodonApi,
    NullSink, ReqwestMastodon,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{bearer_token, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ReqwestMastodon {
    client_with(server, ClientSettings::default())
}

fn client_with(server: &MockServer, settings: ClientSettings) -> ReqwestMastodon {
    ReqwestMastodon::new(settings, session(server)).expect("client builds")
}

fn session(server: &MockServer) -> HomeSession {
    HomeSession::new(&server.uri(), "secret-token").with_identity(SelfIdentity {
        identity: "me@home.example".to_string(),
        id: "1".to_string(),
    })
}

fn status(id: &str, acct: &str, created_at: &str) -> serde_json::Value {
    json!({
        "id": id,
        "created_at": created_at,
        "url": format!("https://remote.example/@{acct}/{id}"),
        "account": {
            "id": format!("r-{acct}"),
            "acct": acct,
            "url": format!("https://remote.example/@{acct}"),
            "discoverable": true,
            "display_name": acct.to_uppercase(),
        }
    })
}

#[tokio::test]
async fn tag_timeline_sends_limit_and_cursor_without_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/timelines/tag/rust"))
        .and(query_param("limit", "20"))
        .and(query_param("max_id", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            status("499", "alice", "2024-05-01T12:00:00.000Z"),
            status("498", "bob", "2024-05-01T11:00:00.000Z"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server);
    let statuses = api
        .tag_timeline(&server.uri(), "rust", 20, Some("500"))
        .await
        .expect("timeline ok");

    let ids: Vec<_> = statuses.iter().map(|status| status["id"].clone()).collect();
    assert_eq!(ids, vec![json!("499"), json!("498")]);
    assert_eq!(statuses[0]["account"]["acct"], json!("alice"));

    let requests = server.received_requests().await.expect("recording on");
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn malformed_timeline_entry_is_skipped() {
    let home = MockServer::start().await;
    let remote = MockServer::start().await;
    let mut broken = status("498", "bob", "2024-05-01T11:30:00.000Z");
    broken.as_object_mut().expect("object").remove("created_at");
    Mock::given(method("GET"))
        .and(path("/api/v1/timelines/tag/rust"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            status("499", "alice", "2024-05-01T12:00:00.000Z"),
            broken,
            status("497", "carol", "2024-05-01T11:00:00.000Z"),
        ])))
        .expect(1)
        .mount(&remote)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accounts": [] })))
        .mount(&home)
        .await;

    let known = KnownEntityCache::new(CacheSettings {
        min_spacing: Duration::from_millis(1),
        ..CacheSettings::default()
    });
    let discovery = Discovery::new(Arc::new(client(&home)), session(&home), Arc::new(known));
    let state = CrawlState::new(
        vec![remote.uri()],
        vec!["rust".to_string()],
        &SearchOptions::default(),
    );

    let outcome = discovery
        .next_page(&state, 1, &FollowSet::new(), &NullSink, &CancellationToken::new())
        .await
        .expect("pass runs");

    let ids: Vec<_> = outcome.items.iter().map(|item| item.post.id.as_str()).collect();
    assert_eq!(ids, vec!["499", "497"]);
    assert!(outcome.failed.is_empty());
    assert_eq!(outcome.state.cursors.get(&remote.uri()), Some(&Some("497".to_string())));
}

#[tokio::test]
async fn first_timeline_page_has_no_max_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/timelines/tag/rust"))
        .and(query_param_is_missing("max_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let statuses = client(&server)
        .tag_timeline(&server.uri(), "rust", 40, None)
        .await
        .expect("timeline ok");
    assert!(statuses.is_empty());
}

#[tokio::test]
async fn too_many_requests_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/timelines/tag/rust"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "120"))
        .mount(&server)
        .await;

    let err = client(&server)
        .tag_timeline(&server.uri(), "rust", 40, None)
        .await
        .expect_err("rate limited");

    let signal = err.rate_limit().expect("rate limit signal");
    assert_eq!(signal.status, 429);
    assert_eq!(signal.retry_after_seconds, Some(120));
    assert!(signal.retry_at.is_some());
}

#[tokio::test]
async fn too_many_requests_without_hints_has_no_retry_time() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/timelines/tag/rust"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = client(&server)
        .tag_timeline(&server.uri(), "rust", 40, None)
        .await
        .expect_err("rate limited");
    assert_eq!(err.rate_limit().and_then(|signal| signal.retry_at), None);
}

#[tokio::test]
async fn forbidden_is_a_permission_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/search"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client(&server)
        .search("alice@remote.example", tagscout_engine::SearchKind::Accounts)
        .await
        .expect_err("forbidden");
    assert_eq!(err, DiscoveryError::Permission { status: 403 });
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/timelines/tag/rust"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
        .mount(&server)
        .await;

    let settings = ClientSettings {
        max_bytes: 1024,
        ..ClientSettings::default()
    };
    let err = client_with(&server, settings)
        .tag_timeline(&server.uri(), "rust", 40, None)
        .await
        .expect_err("too large");
    assert_eq!(err, DiscoveryError::TooLarge { max_bytes: 1024 });
}

#[tokio::test]
async fn directory_is_ranked_by_users() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/servers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "domain": "b.example", "total_users": 5000 },
            { "domain": "c.example", "users": 12 },
            { "domain": "a.example", "total_users": 10000 },
        ])))
        .mount(&server)
        .await;

    let settings = ClientSettings {
        directory_url: format!("{}/servers", server.uri()),
        ..ClientSettings::default()
    };
    let ranked = fetch_ranked(&client_with(&server, settings))
        .await
        .expect("directory ok");
    let domains: Vec<_> = ranked.iter().map(|entry| entry.domain.as_str()).collect();
    assert_eq!(domains, vec!["a.example", "b.example", "c.example"]);
    assert_eq!(ranked[2].total_users, 12);
}

#[tokio::test]
async fn directory_failure_is_a_directory_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/servers"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let settings = ClientSettings {
        directory_url: format!("{}/servers", server.uri()),
        ..ClientSettings::default()
    };
    let err = fetch_ranked(&client_with(&server, settings))
        .await
        .expect_err("directory down");
    assert!(matches!(err, DiscoveryError::Directory(_)), "{err:?}");
}

#[tokio::test]
async fn lookup_failure_is_a_resolution_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/lookup"))
        .and(query_param("acct", "ghost@gone.example"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client(&server)
        .lookup_account("ghost@gone.example")
        .await
        .expect_err("not found");
    assert!(
        matches!(&err, DiscoveryError::Resolution { acct, .. } if acct == "ghost@gone.example"),
        "{err:?}"
    );
}

#[tokio::test]
async fn following_walks_link_pages() {
    let server = MockServer::start().await;
    let next = format!(
        "<{}/api/v1/accounts/1/following?max_id=50>; rel=\"next\", <{}/api/v1/accounts/1/following?min_id=90>; rel=\"prev\"",
        server.uri(),
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/1/following"))
        .and(query_param("limit", "80"))
        .and(bearer_token("secret-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", next.as_str())
                .set_body_json(json!([
                    { "id": "90", "acct": "Alice@remote.example" },
                    { "id": "91", "acct": "bob", "url": "https://home.example/@bob" },
                ])),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/1/following"))
        .and(query_param("max_id", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "40", "acct": "carol@far.example" },
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let follows = load_follows(&client(&server), "home.example")
        .await
        .expect("follows load");

    assert!(follows.is_followed("alice@remote.example"));
    assert!(follows.is_followed("bob@home.example"));
    assert!(follows.is_followed("carol@far.example"));
    assert!(follows.is_followed("91"));
    assert!(!follows.is_followed("dave@remote.example"));
}

#[tokio::test]
async fn following_rate_limit_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/1/following"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let err = load_follows(&client(&server), "home.example")
        .await
        .expect_err("rate limited");
    assert!(err.is_rate_limited());
}

#[tokio::test]
async fn follow_resolves_then_posts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/lookup"))
        .and(query_param("acct", "alice@remote.example"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": "77", "acct": "alice@remote.example" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/accounts/77/follow"))
        .and(bearer_token("secret-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "77", "following": true })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let relationship = follow_account(&client(&server), "alice@remote.example")
        .await
        .expect("follow ok");
    assert_eq!(relationship.id, "77");
    assert!(relationship.following);
}

#[tokio::test]
async fn follow_rate_limit_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/lookup"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": "77", "acct": "alice@remote.example" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/accounts/77/follow"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "60"))
        .mount(&server)
        .await;

    let err = follow_account(&client(&server), "alice@remote.example")
        .await
        .expect_err("rate limited");
    assert_eq!(
        err.rate_limit().and_then(|signal| signal.retry_after_seconds),
        Some(60)
    );
}

#[tokio::test]
async fn relationships_map_unresolved_handles_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/lookup"))
        .and(query_param("acct", "alice@remote.example"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": "77", "acct": "alice@remote.example" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/lookup"))
        .and(query_param("acct", "ghost@gone.example"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/relationships"))
        .and(query_param("id[]", "77"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "77", "following": true, "followed_by": true },
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let identities = vec![
        "alice@remote.example".to_string(),
        "ghost@gone.example".to_string(),
    ];
    let relationships = relationships_for(&client(&server), &identities)
        .await
        .expect("relationships ok");

    assert_eq!(relationships.len(), 2);
    let alice = relationships["alice@remote.example"]
        .as_ref()
        .expect("alice resolved");
    assert!(alice.following && alice.followed_by);
    assert_eq!(relationships["ghost@gone.example"], None);
}

#[tokio::test]
async fn verify_credentials_gives_own_identity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/verify_credentials"))
        .and(bearer_token("secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "1",
            "acct": "me",
            "url": "https://home.example/@me",
        })))
        .mount(&server)
        .await;

    let me = current_identity(&client(&server), "home.example")
        .await
        .expect("credentials ok");
    assert_eq!(
        me,
        SelfIdentity {
            identity: "me@home.example".to_string(),
            id: "1".to_string(),
        }
    );
}
