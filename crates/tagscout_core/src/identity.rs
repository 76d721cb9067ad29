use url::Url;

/// Canonical `localpart@host` identity for an account reference.
///
/// A reference that already carries `@` encodes its origin and is kept as-is
/// (minus a leading `@`). Otherwise the host comes from the profile URL, and
/// failing that from the server the reference was read from.
pub fn canonical_identity(raw: &str, profile_url: Option<&str>, server_host: &str) -> String {
    let raw = raw.trim().trim_start_matches('@');
    if raw.contains('@') {
        return raw.to_string();
    }

    let host = profile_url
        .and_then(|url| Url::parse(url).ok())
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_else(|| server_host.to_ascii_lowercase());

    format!("{raw}@{host}")
}

/// Key used for every identity comparison: dedup, self filter and follow checks.
pub fn identity_key(identity: &str) -> String {
    identity.trim().trim_start_matches('@').to_lowercase()
}

pub fn same_identity(a: &str, b: &str) -> bool {
    identity_key(a) == identity_key(b)
}

/// Reduces a server reference (`example.social`, `https://example.social/`)
/// to its lowercase host, keeping an explicit port.
pub fn server_host(server: &str) -> String {
    let trimmed = server.trim();
    let parsed = if trimmed.contains("://") {
        Url::parse(trimmed).ok()
    } else {
        Url::parse(&format!("https://{trimmed}")).ok()
    };

    match parsed {
        Some(url) => match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{port}", host.to_ascii_lowercase()),
            (Some(host), None) => host.to_ascii_lowercase(),
            _ => trimmed.trim_end_matches('/').to_ascii_lowercase(),
        },
        None => trimmed.trim_end_matches('/').to_ascii_lowercase(),
    }
}

/// Base URL used for requests against a server; bare domains default to https.
pub fn server_base_url(server: &str) -> String {
    let trimmed = server.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

pub fn same_server(a: &str, b: &str) -> bool {
    server_host(a) == server_host(b)
}
