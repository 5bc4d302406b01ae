//! Paging feed and stoplist resources into memory.
//!
//! Each resource is paged through an opaque continuation cursor until the
//! source reports no further cursor, the configured cap is reached, or a
//! page stops making progress (liveness guard). A failing resource is
//! logged and skipped; it never aborts the run.

use std::collections::HashSet;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::api::types::FeedItem;
use crate::api::BskyClient;

/// Fetch up to `max_items` entries from one feed resource.
///
/// # Errors
///
/// Returns an error if a page fetch fails; items accumulated before the
/// failure are lost for this resource (the caller decides whether to
/// continue with other resources).
pub async fn fetch_feed_items(
    client: &BskyClient,
    feed_uri: &str,
    max_items: usize,
) -> Result<Vec<FeedItem>> {
    let mut items: Vec<FeedItem> = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = client.get_feed(feed_uri, cursor.as_deref()).await?;
        let batch_len = page.feed.len();
        items.extend(page.feed);

        let Some(next) = page.cursor else {
            break;
        };
        if batch_len == 0 {
            // Cursor without progress: stop rather than spin until the cap.
            debug!(feed = %feed_uri, "Feed returned a cursor but no items, stopping");
            break;
        }
        if items.len() >= max_items {
            break;
        }
        cursor = Some(next);
    }

    items.truncate(max_items);
    Ok(items)
}

/// Fetch up to `member_limit` member DIDs from one list resource.
///
/// # Errors
///
/// Returns an error if a page fetch fails.
pub async fn fetch_list_members(
    client: &BskyClient,
    list_uri: &str,
    member_limit: usize,
) -> Result<HashSet<String>> {
    let mut members: HashSet<String> = HashSet::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = client.get_list(list_uri, cursor.as_deref()).await?;
        let batch_len = page.items.len();
        for item in page.items {
            if let Some(did) = item.subject.and_then(|s| s.did) {
                members.insert(did);
                if members.len() >= member_limit {
                    return Ok(members);
                }
            }
        }

        let Some(next) = page.cursor else {
            break;
        };
        if batch_len == 0 {
            debug!(list = %list_uri, "List returned a cursor but no items, stopping");
            break;
        }
        cursor = Some(next);
    }

    Ok(members)
}

/// Pull items from every resolved feed, pooling them in configuration
/// order. A feed that fails to fetch is skipped with a warning.
pub async fn collect_feed_items(
    client: &BskyClient,
    feed_uris: &[String],
    max_items: usize,
) -> Vec<FeedItem> {
    let mut pooled = Vec::new();
    for feed_uri in feed_uris {
        info!(feed = %feed_uri, "Fetching feed");
        match fetch_feed_items(client, feed_uri, max_items).await {
            Ok(items) => {
                debug!(feed = %feed_uri, count = items.len(), "Feed fetched");
                pooled.extend(items);
            }
            Err(e) => warn!(feed = %feed_uri, "Failed to fetch feed, skipping: {e:#}"),
        }
    }
    pooled
}

/// Collect member DIDs from every resolved stoplist into one combined
/// block-set. A stoplist that fails to fetch is skipped with a warning.
pub async fn collect_block_set(
    client: &BskyClient,
    list_uris: &[String],
    member_limit: usize,
) -> HashSet<String> {
    let mut block_set = HashSet::new();
    for list_uri in list_uris {
        match fetch_list_members(client, list_uri, member_limit).await {
            Ok(members) => {
                debug!(list = %list_uri, count = members.len(), "Stoplist fetched");
                block_set.extend(members);
            }
            Err(e) => warn!(list = %list_uri, "Failed to fetch stoplist, skipping: {e:#}"),
        }
    }
    block_set
}
