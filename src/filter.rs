//! The candidate selection predicate chain.
//!
//! Every raw feed item passes through the same ordered filters; survivors
//! become [`Candidate`]s. Evaluation is a pure function of the item, the
//! ledger, the block-set and the cutoff timestamp: no side effects, no
//! network.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::api::types::FeedItem;

/// An item that has survived the filter chain and is eligible for
/// scheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub uri: String,
    pub cid: String,
    pub author_did: String,
    pub created_at: DateTime<Utc>,
}

/// Apply the filter chain to one feed item.
///
/// Filters, in order: already-acted, boost, quote, media, reply, recency,
/// block. All must pass for the item to become a candidate.
#[must_use]
pub fn evaluate(
    item: &FeedItem,
    ledger: &HashSet<String>,
    block_set: &HashSet<String>,
    cutoff: DateTime<Utc>,
) -> Option<Candidate> {
    if ledger.contains(&item.post.uri) {
        return None;
    }
    if item.is_boost() {
        return None;
    }
    if item.post.is_quote() {
        return None;
    }
    if !item.post.has_media() {
        return None;
    }
    if item.post.is_reply() {
        return None;
    }
    let created_at = item_created_at(item)?;
    if created_at < cutoff {
        return None;
    }
    let author_did = item.post.author_did()?;
    if block_set.contains(author_did) {
        return None;
    }

    Some(Candidate {
        uri: item.post.uri.clone(),
        cid: item.post.cid.clone(),
        author_did: author_did.to_string(),
        created_at,
    })
}

/// Probe the item's timestamp-bearing fields in order; the first present,
/// parseable value wins. Malformed values are treated as absent.
#[must_use]
pub fn item_created_at(item: &FeedItem) -> Option<DateTime<Utc>> {
    item.timestamp_candidates().find_map(parse_timestamp)
}

/// Best-effort RFC 3339 parse. Never panics on malformed input.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn media_item(uri: &str, author: &str, created_at: &str) -> FeedItem {
        serde_json::from_value(json!({
            "post": {
                "uri": uri,
                "cid": format!("cid-{uri}"),
                "author": {"did": author, "handle": "user.bsky.social"},
                "record": {
                    "createdAt": created_at,
                    "embed": {"$type": "app.bsky.embed.images", "images": [{"alt": ""}]}
                },
                "indexedAt": created_at
            }
        }))
        .unwrap()
    }

    fn cutoff() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn empty() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn test_media_post_within_window_passes() {
        let item = media_item("at://a/app.bsky.feed.post/1", "did:plc:alice", "2024-06-01T13:00:00Z");
        let candidate = evaluate(&item, &empty(), &empty(), cutoff()).unwrap();
        assert_eq!(candidate.uri, "at://a/app.bsky.feed.post/1");
        assert_eq!(candidate.author_did, "did:plc:alice");
    }

    #[test]
    fn test_already_acted_rejected() {
        let item = media_item("at://a/app.bsky.feed.post/1", "did:plc:alice", "2024-06-01T13:00:00Z");
        let ledger: HashSet<String> =
            ["at://a/app.bsky.feed.post/1".to_string()].into_iter().collect();
        assert!(evaluate(&item, &ledger, &empty(), cutoff()).is_none());
    }

    #[test]
    fn test_boost_rejected() {
        let mut item =
            media_item("at://a/app.bsky.feed.post/1", "did:plc:alice", "2024-06-01T13:00:00Z");
        item.reason = Some(json!({"$type": "app.bsky.feed.defs#reasonRepost"}));
        assert!(evaluate(&item, &empty(), &empty(), cutoff()).is_none());
    }

    #[test]
    fn test_quote_rejected() {
        let item: FeedItem = serde_json::from_value(json!({
            "post": {
                "uri": "at://a/app.bsky.feed.post/1",
                "cid": "c1",
                "author": {"did": "did:plc:alice"},
                "record": {
                    "createdAt": "2024-06-01T13:00:00Z",
                    "embed": {"$type": "app.bsky.embed.recordWithMedia", "media": {}}
                }
            }
        }))
        .unwrap();
        assert!(evaluate(&item, &empty(), &empty(), cutoff()).is_none());
    }

    #[test]
    fn test_text_only_post_rejected() {
        let item: FeedItem = serde_json::from_value(json!({
            "post": {
                "uri": "at://a/app.bsky.feed.post/1",
                "cid": "c1",
                "author": {"did": "did:plc:alice"},
                "record": {"createdAt": "2024-06-01T13:00:00Z"}
            }
        }))
        .unwrap();
        assert!(evaluate(&item, &empty(), &empty(), cutoff()).is_none());
    }

    #[test]
    fn test_reply_rejected() {
        let item: FeedItem = serde_json::from_value(json!({
            "post": {
                "uri": "at://a/app.bsky.feed.post/1",
                "cid": "c1",
                "author": {"did": "did:plc:alice"},
                "record": {
                    "createdAt": "2024-06-01T13:00:00Z",
                    "reply": {"parent": {"uri": "at://p"}},
                    "embed": {"$type": "app.bsky.embed.images", "images": [{}]}
                }
            }
        }))
        .unwrap();
        assert!(evaluate(&item, &empty(), &empty(), cutoff()).is_none());
    }

    #[test]
    fn test_stale_post_rejected() {
        let item = media_item("at://a/app.bsky.feed.post/1", "did:plc:alice", "2024-06-01T11:59:59Z");
        assert!(evaluate(&item, &empty(), &empty(), cutoff()).is_none());
    }

    #[test]
    fn test_unparseable_timestamp_rejected() {
        let item = media_item("at://a/app.bsky.feed.post/1", "did:plc:alice", "yesterday-ish");
        // Both record and wrapper carry the malformed value
        assert!(evaluate(&item, &empty(), &empty(), cutoff()).is_none());
    }

    #[test]
    fn test_malformed_record_timestamp_falls_back_to_wrapper() {
        let item: FeedItem = serde_json::from_value(json!({
            "post": {
                "uri": "at://a/app.bsky.feed.post/1",
                "cid": "c1",
                "author": {"did": "did:plc:alice"},
                "record": {
                    "createdAt": "not-a-timestamp",
                    "embed": {"$type": "app.bsky.embed.images", "images": [{}]}
                },
                "indexedAt": "2024-06-01T13:00:00Z"
            }
        }))
        .unwrap();
        let candidate = evaluate(&item, &empty(), &empty(), cutoff()).unwrap();
        assert_eq!(
            candidate.created_at,
            Utc.with_ymd_and_hms(2024, 6, 1, 13, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_blocked_author_rejected() {
        let item = media_item("at://a/app.bsky.feed.post/1", "did:plc:blocked", "2024-06-01T13:00:00Z");
        let block_set: HashSet<String> = ["did:plc:blocked".to_string()].into_iter().collect();
        assert!(evaluate(&item, &empty(), &block_set, cutoff()).is_none());
    }

    #[test]
    fn test_missing_author_rejected() {
        let item: FeedItem = serde_json::from_value(json!({
            "post": {
                "uri": "at://a/app.bsky.feed.post/1",
                "cid": "c1",
                "record": {
                    "createdAt": "2024-06-01T13:00:00Z",
                    "embed": {"$type": "app.bsky.embed.video", "video": {}}
                }
            }
        }))
        .unwrap();
        assert!(evaluate(&item, &empty(), &empty(), cutoff()).is_none());
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let item = media_item("at://a/app.bsky.feed.post/1", "did:plc:alice", "2024-06-01T13:00:00Z");
        let first = evaluate(&item, &empty(), &empty(), cutoff());
        let second = evaluate(&item, &empty(), &empty(), cutoff());
        assert_eq!(first, second);
    }

    #[test]
    fn test_offset_timezone_parses() {
        let item = media_item(
            "at://a/app.bsky.feed.post/1",
            "did:plc:alice",
            "2024-06-01T15:00:00+02:00",
        );
        let candidate = evaluate(&item, &empty(), &empty(), cutoff()).unwrap();
        assert_eq!(
            candidate.created_at,
            Utc.with_ymd_and_hms(2024, 6, 1, 13, 0, 0).unwrap()
        );
    }
}
