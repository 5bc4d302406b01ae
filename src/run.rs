//! One curation pass: resolve, aggregate, filter, schedule, persist.

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::api::BskyClient;
use crate::config::Config;
use crate::filter::Candidate;
use crate::scheduler::RunStats;
use crate::{aggregator, filter, ledger, resolver, scheduler};

/// Execute a single run against the network.
///
/// Returns without acting when no configured feed reference resolves. The
/// ledger is saved once, at the end; an interrupted run loses only its own
/// additions.
///
/// # Errors
///
/// Returns an error if the ledger cannot be read or written. Per-resource
/// fetch failures and per-candidate action failures are logged and
/// recovered from instead.
pub async fn run_once(client: &BskyClient, config: &Config) -> Result<RunStats> {
    let cutoff = Utc::now() - chrono::Duration::hours(i64::from(config.hours_back));
    let mut acted = ledger::load(&config.repost_log_file).await?;

    let feed_uris = resolver::resolve_feed_uris(client, &config.feed_links).await;
    if feed_uris.is_empty() {
        info!("No resolvable feeds configured, nothing to do");
        return Ok(RunStats::default());
    }

    let list_uris = resolver::resolve_list_uris(client, &config.stoplist_links).await;
    let block_set =
        aggregator::collect_block_set(client, &list_uris, config.list_member_limit).await;
    if !block_set.is_empty() {
        info!(count = block_set.len(), "Stoplist members loaded");
    }

    let items = aggregator::collect_feed_items(client, &feed_uris, config.feed_max_items).await;
    let candidates: Vec<Candidate> = items
        .iter()
        .filter_map(|item| filter::evaluate(item, &acted, &block_set, cutoff))
        .collect();
    info!(
        items = items.len(),
        candidates = candidates.len(),
        "Filtered feed items"
    );

    let stats = scheduler::schedule(client, config, candidates, &mut acted).await;

    ledger::save(&config.repost_log_file, &acted).await?;
    Ok(stats)
}
