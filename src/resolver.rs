//! Normalization of configured feed / stoplist references into AT-URIs.
//!
//! A reference is either already canonical (`at://did/<collection>/<rkey>`)
//! or a human-facing `bsky.app` URL whose actor segment must be resolved to
//! a DID. Resolution failures drop the single reference, never the run.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::api::BskyClient;

const FEED_COLLECTION: &str = "app.bsky.feed.generator";
const LIST_COLLECTION: &str = "app.bsky.graph.list";

static FEED_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://(www\.)?bsky\.app/profile/([^/]+)/feed/([^/?#]+)")
        .expect("valid feed URL regex")
});

static LIST_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://(www\.)?bsky\.app/profile/([^/]+)/lists/([^/?#]+)")
        .expect("valid list URL regex")
});

/// Parse the actor and record key out of a `bsky.app` feed URL.
#[must_use]
pub fn parse_feed_url(link: &str) -> Option<(String, String)> {
    parse_url(&FEED_URL_RE, link)
}

/// Parse the actor and record key out of a `bsky.app` list URL.
#[must_use]
pub fn parse_list_url(link: &str) -> Option<(String, String)> {
    parse_url(&LIST_URL_RE, link)
}

fn parse_url(re: &Regex, link: &str) -> Option<(String, String)> {
    re.captures(link.trim()).map(|caps| {
        let actor = caps.get(2).map_or("", |m| m.as_str()).to_string();
        let rkey = caps.get(3).map_or("", |m| m.as_str()).to_string();
        (actor, rkey)
    })
}

/// Normalize a configured feed reference into an `at://` feed generator URI.
///
/// Returns `None` for blank, malformed or unresolvable references.
pub async fn normalize_feed_uri(client: &BskyClient, link: &str) -> Option<String> {
    normalize_uri(client, link, FEED_COLLECTION, &FEED_URL_RE).await
}

/// Normalize a configured stoplist reference into an `at://` list URI.
///
/// Returns `None` for blank, malformed or unresolvable references.
pub async fn normalize_list_uri(client: &BskyClient, link: &str) -> Option<String> {
    normalize_uri(client, link, LIST_COLLECTION, &LIST_URL_RE).await
}

async fn normalize_uri(
    client: &BskyClient,
    link: &str,
    collection: &str,
    re: &Regex,
) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }
    if link.starts_with("at://") && link.contains(&format!("/{collection}/")) {
        return Some(link.to_string());
    }
    let (actor, rkey) = parse_url(re, link)?;
    let did = resolve_actor(client, &actor).await?;
    Some(format!("at://{did}/{collection}/{rkey}"))
}

/// Resolve an actor reference to a DID. DID-form actors pass through.
async fn resolve_actor(client: &BskyClient, actor: &str) -> Option<String> {
    if actor.starts_with("did:") {
        return Some(actor.to_string());
    }
    match client.resolve_handle(actor).await {
        Ok(did) => Some(did),
        Err(e) => {
            warn!(handle = %actor, "Failed to resolve handle: {e:#}");
            None
        }
    }
}

/// Normalize every configured feed reference, preserving configuration order
/// and dropping entries that cannot be normalized.
pub async fn resolve_feed_uris(client: &BskyClient, links: &[String]) -> Vec<String> {
    let mut uris = Vec::new();
    for link in links {
        match normalize_feed_uri(client, link).await {
            Some(uri) => uris.push(uri),
            None => warn!(link = %link, "Skipping unresolvable feed reference"),
        }
    }
    uris
}

/// Normalize every configured stoplist reference, preserving configuration
/// order and dropping entries that cannot be normalized.
pub async fn resolve_list_uris(client: &BskyClient, links: &[String]) -> Vec<String> {
    let mut uris = Vec::new();
    for link in links {
        match normalize_list_uri(client, link).await {
            Some(uri) => uris.push(uri),
            None => warn!(link = %link, "Skipping unresolvable stoplist reference"),
        }
    }
    uris
}
