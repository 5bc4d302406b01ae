//! Ordering and rate limiting of engagement actions.
//!
//! Candidates from all feeds are pooled and processed oldest-first so the
//! backlog drains in chronological order regardless of which feed surfaced
//! an item. The scheduler owns the run's rate state: a global action count
//! and per-author counters, both reset every run.

use std::collections::{HashMap, HashSet};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::api::Engagement;
use crate::config::Config;
use crate::filter::Candidate;

/// Successful action counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub reposted: usize,
    pub liked: usize,
    pub followed: usize,
}

/// Process candidates in commit order, reposting each accepted one and
/// recording it in the ledger.
///
/// Candidates are sorted ascending by creation time with a stable sort, so
/// equal timestamps keep their input order. Iteration stops once
/// `max_per_run` reposts succeeded; a candidate whose author already
/// reached `max_per_user` is skipped while scanning continues.
///
/// A failed repost is logged, followed by the error cooldown, and leaves
/// the ledger and all counters untouched - the URI stays eligible for a
/// future run. Like and follow are best-effort: their failures never roll
/// back the repost.
pub async fn schedule(
    api: &dyn Engagement,
    config: &Config,
    mut candidates: Vec<Candidate>,
    ledger: &mut HashSet<String>,
) -> RunStats {
    candidates.sort_by_key(|c| c.created_at);
    info!(count = candidates.len(), "Scheduling candidates");

    let mut stats = RunStats::default();
    let mut per_user: HashMap<String, usize> = HashMap::new();

    for candidate in candidates {
        if stats.reposted >= config.max_per_run {
            info!(max_per_run = config.max_per_run, "Run cap reached, stopping");
            break;
        }

        let author_count = per_user.get(&candidate.author_did).copied().unwrap_or(0);
        if author_count >= config.max_per_user {
            debug!(author = %candidate.author_did, uri = %candidate.uri, "Author cap reached, skipping");
            continue;
        }

        match api.create_repost(&candidate.uri, &candidate.cid).await {
            Ok(()) => {
                ledger.insert(candidate.uri.clone());
                *per_user.entry(candidate.author_did.clone()).or_insert(0) += 1;
                stats.reposted += 1;
                debug!(uri = %candidate.uri, "Reposted");

                match api.create_like(&candidate.uri, &candidate.cid).await {
                    Ok(()) => stats.liked += 1,
                    Err(e) => warn!(uri = %candidate.uri, "Like failed: {e:#}"),
                }

                if config.follow_on_repost && follow_if_needed(api, &candidate.author_did).await {
                    stats.followed += 1;
                }

                sleep(config.post_delay).await;
            }
            Err(e) => {
                warn!(uri = %candidate.uri, "Repost failed: {e:#}");
                sleep(config.error_cooldown).await;
            }
        }
    }

    stats
}

/// Follow the author unless the session account already follows them.
///
/// Returns whether a follow was created. The profile check and the follow
/// are not atomic against external changes; the worst case is a harmless
/// duplicate-follow no-op or a missed follow.
async fn follow_if_needed(api: &dyn Engagement, author_did: &str) -> bool {
    let profile = match api.get_profile(author_did).await {
        Ok(profile) => profile,
        Err(e) => {
            warn!(author = %author_did, "Profile fetch failed, skipping follow: {e:#}");
            return false;
        }
    };
    if profile.is_followed_by_viewer() {
        return false;
    }
    match api.create_follow(author_did).await {
        Ok(()) => true,
        Err(e) => {
            warn!(author = %author_did, "Follow failed: {e:#}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::api::types::{ProfileView, ViewerState};

    /// Recording engagement double: every call is appended to `calls`;
    /// repost failures and existing follows are configurable per test.
    #[derive(Default)]
    struct MockApi {
        calls: Mutex<Vec<String>>,
        fail_reposts: HashSet<String>,
        fail_likes: bool,
        already_following: HashSet<String>,
    }

    impl MockApi {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl Engagement for MockApi {
        async fn create_repost(&self, uri: &str, _cid: &str) -> anyhow::Result<()> {
            self.record(format!("repost {uri}"));
            if self.fail_reposts.contains(uri) {
                return Err(anyhow!("rate limited"));
            }
            Ok(())
        }

        async fn create_like(&self, uri: &str, _cid: &str) -> anyhow::Result<()> {
            self.record(format!("like {uri}"));
            if self.fail_likes {
                return Err(anyhow!("like rejected"));
            }
            Ok(())
        }

        async fn get_profile(&self, actor: &str) -> anyhow::Result<ProfileView> {
            self.record(format!("profile {actor}"));
            let following = self
                .already_following
                .contains(actor)
                .then(|| "at://viewer/app.bsky.graph.follow/1".to_string());
            Ok(ProfileView {
                did: Some(actor.to_string()),
                viewer: Some(ViewerState { following }),
            })
        }

        async fn create_follow(&self, did: &str) -> anyhow::Result<()> {
            self.record(format!("follow {did}"));
            Ok(())
        }
    }

    fn candidate(uri: &str, author: &str, minute: u32) -> Candidate {
        Candidate {
            uri: uri.to_string(),
            cid: format!("cid-{uri}"),
            author_did: author.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, minute, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_processes_oldest_first() {
        let api = MockApi::default();
        let mut ledger = HashSet::new();
        let candidates = vec![
            candidate("at://b", "did:plc:bob", 30),
            candidate("at://a", "did:plc:alice", 10),
            candidate("at://c", "did:plc:carol", 20),
        ];

        let stats = schedule(&api, &Config::for_testing(), candidates, &mut ledger).await;

        assert_eq!(stats.reposted, 3);
        let reposts: Vec<String> = api
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("repost"))
            .collect();
        assert_eq!(reposts, vec!["repost at://a", "repost at://c", "repost at://b"]);
    }

    #[tokio::test]
    async fn test_equal_timestamps_keep_input_order() {
        let api = MockApi::default();
        let mut ledger = HashSet::new();
        let candidates = vec![
            candidate("at://first", "did:plc:a", 10),
            candidate("at://second", "did:plc:b", 10),
        ];

        schedule(&api, &Config::for_testing(), candidates, &mut ledger).await;

        let reposts: Vec<String> = api
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("repost"))
            .collect();
        assert_eq!(reposts, vec!["repost at://first", "repost at://second"]);
    }

    #[tokio::test]
    async fn test_global_cap_stops_run() {
        let api = MockApi::default();
        let mut ledger = HashSet::new();
        let mut config = Config::for_testing();
        config.max_per_run = 2;
        let candidates = vec![
            candidate("at://a", "did:plc:a", 1),
            candidate("at://b", "did:plc:b", 2),
            candidate("at://c", "did:plc:c", 3),
        ];

        let stats = schedule(&api, &config, candidates, &mut ledger).await;

        assert_eq!(stats.reposted, 2);
        assert_eq!(ledger.len(), 2);
        assert!(!api.calls().contains(&"repost at://c".to_string()));
    }

    #[tokio::test]
    async fn test_author_cap_skips_not_stops() {
        let api = MockApi::default();
        let mut ledger = HashSet::new();
        let mut config = Config::for_testing();
        config.max_per_user = 1;
        let candidates = vec![
            candidate("at://a1", "did:plc:alice", 1),
            candidate("at://a2", "did:plc:alice", 2),
            candidate("at://b1", "did:plc:bob", 3),
        ];

        let stats = schedule(&api, &config, candidates, &mut ledger).await;

        // Alice's second post is skipped, Bob's still processed
        assert_eq!(stats.reposted, 2);
        assert!(ledger.contains("at://a1"));
        assert!(!ledger.contains("at://a2"), "skipped candidate is not ledgered");
        assert!(ledger.contains("at://b1"));
    }

    #[tokio::test]
    async fn test_repost_failure_keeps_uri_eligible() {
        let api = MockApi {
            fail_reposts: ["at://bad".to_string()].into_iter().collect(),
            ..MockApi::default()
        };
        let mut ledger = HashSet::new();
        let candidates = vec![
            candidate("at://bad", "did:plc:alice", 1),
            candidate("at://good", "did:plc:bob", 2),
        ];

        let stats = schedule(&api, &Config::for_testing(), candidates, &mut ledger).await;

        assert_eq!(stats.reposted, 1);
        assert!(!ledger.contains("at://bad"), "failed repost must not be ledgered");
        assert!(ledger.contains("at://good"), "next candidate still processed");
        // No like is attempted for the failed repost
        assert!(!api.calls().contains(&"like at://bad".to_string()));
    }

    #[tokio::test]
    async fn test_failed_repost_does_not_count_against_author_cap() {
        let api = MockApi {
            fail_reposts: ["at://a1".to_string()].into_iter().collect(),
            ..MockApi::default()
        };
        let mut ledger = HashSet::new();
        let mut config = Config::for_testing();
        config.max_per_user = 1;
        let candidates = vec![
            candidate("at://a1", "did:plc:alice", 1),
            candidate("at://a2", "did:plc:alice", 2),
        ];

        let stats = schedule(&api, &config, candidates, &mut ledger).await;

        assert_eq!(stats.reposted, 1);
        assert!(ledger.contains("at://a2"));
    }

    #[tokio::test]
    async fn test_like_failure_does_not_roll_back_repost() {
        let api = MockApi {
            fail_likes: true,
            ..MockApi::default()
        };
        let mut ledger = HashSet::new();
        let candidates = vec![candidate("at://a", "did:plc:alice", 1)];

        let stats = schedule(&api, &Config::for_testing(), candidates, &mut ledger).await;

        assert_eq!(stats.reposted, 1);
        assert_eq!(stats.liked, 0);
        assert!(ledger.contains("at://a"));
    }

    #[tokio::test]
    async fn test_follow_skipped_when_already_following() {
        let api = MockApi {
            already_following: ["did:plc:alice".to_string()].into_iter().collect(),
            ..MockApi::default()
        };
        let mut ledger = HashSet::new();
        let mut config = Config::for_testing();
        config.follow_on_repost = true;
        let candidates = vec![
            candidate("at://a", "did:plc:alice", 1),
            candidate("at://b", "did:plc:bob", 2),
        ];

        let stats = schedule(&api, &config, candidates, &mut ledger).await;

        assert_eq!(stats.followed, 1);
        let calls = api.calls();
        assert!(!calls.contains(&"follow did:plc:alice".to_string()));
        assert!(calls.contains(&"follow did:plc:bob".to_string()));
    }

    #[tokio::test]
    async fn test_no_follow_when_disabled() {
        let api = MockApi::default();
        let mut ledger = HashSet::new();
        let candidates = vec![candidate("at://a", "did:plc:alice", 1)];

        let stats = schedule(&api, &Config::for_testing(), candidates, &mut ledger).await;

        assert_eq!(stats.followed, 0);
        assert!(api.calls().iter().all(|c| !c.starts_with("profile")));
    }
}
