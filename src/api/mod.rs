//! Minimal XRPC client for the AT Protocol endpoints this bot consumes.

pub mod types;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};

use types::{
    CreateRecordRequest, CreateSessionRequest, FeedPage, FollowRecord, ListPage, ProfileView,
    ResolveHandleResponse, SessionResponse, SubjectRecord, SubjectRef,
};

/// User agent sent with every XRPC request.
const USER_AGENT: &str = concat!("bluesky-feed-reposter/", env!("CARGO_PKG_VERSION"));

/// Page size requested from paginated endpoints.
pub const PAGE_LIMIT: usize = 100;

/// Engagement actions the scheduler performs against the network.
///
/// The scheduler depends on this seam rather than the concrete client so
/// rate-limiting policy can be exercised without a server.
#[async_trait]
pub trait Engagement: Send + Sync {
    /// Repost the referenced post from the session account.
    async fn create_repost(&self, uri: &str, cid: &str) -> Result<()>;

    /// Like the referenced post. Best-effort from the caller's perspective.
    async fn create_like(&self, uri: &str, cid: &str) -> Result<()>;

    /// Fetch a profile including the viewer relationship state.
    async fn get_profile(&self, actor: &str) -> Result<ProfileView>;

    /// Follow the given account from the session account.
    async fn create_follow(&self, did: &str) -> Result<()>;
}

/// Authenticated session state returned by `createSession`.
#[derive(Debug, Clone)]
struct Session {
    access_jwt: String,
    did: String,
}

/// XRPC client bound to a single PDS service URL.
#[derive(Debug, Clone)]
pub struct BskyClient {
    client: reqwest::Client,
    base_url: String,
    session: Option<Session>,
}

impl BskyClient {
    /// Create a client for the given service URL (e.g. `https://bsky.social`).
    #[must_use]
    pub fn new(service_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: format!("{}/xrpc", service_url.trim_end_matches('/')),
            session: None,
        }
    }

    /// Create an authenticated session for the given account.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected or the request fails.
    pub async fn login(&mut self, identifier: &str, password: &str) -> Result<()> {
        let url = format!("{}/com.atproto.server.createSession", self.base_url);
        let response: SessionResponse = self
            .client
            .post(&url)
            .json(&CreateSessionRequest {
                identifier,
                password,
            })
            .send()
            .await
            .context("Failed to reach createSession")?
            .error_for_status()
            .context("Login rejected")?
            .json()
            .await
            .context("Failed to parse session response")?;

        self.session = Some(Session {
            access_jwt: response.access_jwt,
            did: response.did,
        });
        Ok(())
    }

    /// DID of the logged-in account.
    ///
    /// # Errors
    ///
    /// Returns an error if `login` has not succeeded yet.
    pub fn session_did(&self) -> Result<&str> {
        self.require_session().map(|s| s.did.as_str())
    }

    fn require_session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .context("Client is not logged in")
    }

    fn get(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let builder = self.client.get(format!("{}/{endpoint}", self.base_url));
        match &self.session {
            Some(session) => builder.bearer_auth(&session.access_jwt),
            None => builder,
        }
    }

    /// Resolve a handle to its DID.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown or the request fails.
    pub async fn resolve_handle(&self, handle: &str) -> Result<String> {
        let endpoint = format!(
            "com.atproto.identity.resolveHandle?handle={}",
            urlencoding::encode(handle)
        );
        let response: ResolveHandleResponse = self
            .get(&endpoint)
            .send()
            .await
            .context("Failed to resolve handle")?
            .error_for_status()
            .context("Handle resolution returned error")?
            .json()
            .await
            .context("Failed to parse handle resolution response")?;
        Ok(response.did)
    }

    /// Fetch one page of a feed generator's output.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails or the body does not parse.
    pub async fn get_feed(&self, feed_uri: &str, cursor: Option<&str>) -> Result<FeedPage> {
        let mut endpoint = format!(
            "app.bsky.feed.getFeed?feed={}&limit={PAGE_LIMIT}",
            urlencoding::encode(feed_uri)
        );
        if let Some(cursor) = cursor {
            endpoint.push_str(&format!("&cursor={}", urlencoding::encode(cursor)));
        }
        self.get(&endpoint)
            .send()
            .await
            .context("Failed to fetch feed page")?
            .error_for_status()
            .context("Feed fetch returned error")?
            .json()
            .await
            .context("Failed to parse feed page")
    }

    /// Fetch one page of a list's members.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails or the body does not parse.
    pub async fn get_list(&self, list_uri: &str, cursor: Option<&str>) -> Result<ListPage> {
        let mut endpoint = format!(
            "app.bsky.graph.getList?list={}&limit={PAGE_LIMIT}",
            urlencoding::encode(list_uri)
        );
        if let Some(cursor) = cursor {
            endpoint.push_str(&format!("&cursor={}", urlencoding::encode(cursor)));
        }
        self.get(&endpoint)
            .send()
            .await
            .context("Failed to fetch list page")?
            .error_for_status()
            .context("List fetch returned error")?
            .json()
            .await
            .context("Failed to parse list page")
    }

    async fn create_record<T: serde::Serialize + Send + Sync>(
        &self,
        collection: &str,
        record: T,
    ) -> Result<()> {
        let session = self.require_session()?;
        let url = format!("{}/com.atproto.repo.createRecord", self.base_url);
        self.client
            .post(&url)
            .bearer_auth(&session.access_jwt)
            .json(&CreateRecordRequest {
                repo: &session.did,
                collection,
                record,
            })
            .send()
            .await
            .with_context(|| format!("Failed to create {collection} record"))?
            .error_for_status()
            .with_context(|| format!("{collection} creation returned error"))?;
        Ok(())
    }
}

/// Wall-clock timestamp in the `createdAt` wire format.
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl Engagement for BskyClient {
    async fn create_repost(&self, uri: &str, cid: &str) -> Result<()> {
        self.create_record(
            "app.bsky.feed.repost",
            SubjectRecord {
                record_type: "app.bsky.feed.repost",
                subject: SubjectRef { uri, cid },
                created_at: now_timestamp(),
            },
        )
        .await
    }

    async fn create_like(&self, uri: &str, cid: &str) -> Result<()> {
        self.create_record(
            "app.bsky.feed.like",
            SubjectRecord {
                record_type: "app.bsky.feed.like",
                subject: SubjectRef { uri, cid },
                created_at: now_timestamp(),
            },
        )
        .await
    }

    async fn get_profile(&self, actor: &str) -> Result<ProfileView> {
        let endpoint = format!(
            "app.bsky.actor.getProfile?actor={}",
            urlencoding::encode(actor)
        );
        self.get(&endpoint)
            .send()
            .await
            .context("Failed to fetch profile")?
            .error_for_status()
            .context("Profile fetch returned error")?
            .json()
            .await
            .context("Failed to parse profile response")
    }

    async fn create_follow(&self, did: &str) -> Result<()> {
        self.create_record(
            "app.bsky.graph.follow",
            FollowRecord {
                record_type: "app.bsky.graph.follow",
                subject: did,
                created_at: now_timestamp(),
            },
        )
        .await
    }
}
