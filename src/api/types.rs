//! Wire types for the XRPC endpoints this bot consumes.
//!
//! Response shapes are modeled loosely: any field the server may omit or
//! null out depending on API version is an `Option`, and accessors handle
//! absence explicitly rather than assuming presence.

use serde::{Deserialize, Serialize};

/// Response from `com.atproto.server.createSession`.
#[derive(Debug, Deserialize)]
pub struct SessionResponse {
    #[serde(rename = "accessJwt")]
    pub access_jwt: String,
    pub did: String,
    pub handle: Option<String>,
}

/// Response from `com.atproto.identity.resolveHandle`.
#[derive(Debug, Deserialize)]
pub struct ResolveHandleResponse {
    pub did: String,
}

/// One page of `app.bsky.feed.getFeed`.
#[derive(Debug, Deserialize)]
pub struct FeedPage {
    #[serde(default)]
    pub feed: Vec<FeedItem>,
    pub cursor: Option<String>,
}

/// A feed entry: the post plus an optional reason wrapper.
///
/// A populated `reason` means the feed surfaced someone's boost of the post,
/// not the original post itself.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedItem {
    pub post: PostView,
    #[serde(default)]
    pub reason: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostView {
    pub uri: String,
    pub cid: String,
    #[serde(default)]
    pub author: Option<AuthorView>,
    #[serde(default)]
    pub record: Option<PostRecord>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "indexedAt", default)]
    pub indexed_at: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorView {
    #[serde(default)]
    pub did: Option<String>,
    #[serde(default)]
    pub handle: Option<String>,
}

/// The post record as written to the author's repo.
#[derive(Debug, Clone, Deserialize)]
pub struct PostRecord {
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "indexedAt", default)]
    pub indexed_at: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub reply: Option<serde_json::Value>,
    #[serde(default)]
    pub embed: Option<RecordEmbed>,
}

/// Embed variants found on post records.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "$type")]
pub enum RecordEmbed {
    #[serde(rename = "app.bsky.embed.images")]
    Images {
        #[serde(default)]
        images: Vec<serde_json::Value>,
    },
    #[serde(rename = "app.bsky.embed.video")]
    Video {
        #[serde(default)]
        video: Option<serde_json::Value>,
    },
    #[serde(rename = "app.bsky.embed.external")]
    External {
        #[serde(default)]
        external: Option<serde_json::Value>,
    },
    #[serde(rename = "app.bsky.embed.record")]
    Record {
        #[serde(default)]
        record: Option<serde_json::Value>,
    },
    #[serde(rename = "app.bsky.embed.recordWithMedia")]
    RecordWithMedia {
        #[serde(default)]
        media: Option<serde_json::Value>,
    },
    #[serde(other)]
    Unknown,
}

impl FeedItem {
    /// Whether the feed surfaced this entry as a boost of someone's post.
    #[must_use]
    pub fn is_boost(&self) -> bool {
        self.reason.is_some()
    }

    /// Timestamp-bearing fields in probe order: the record's fields first,
    /// then the same fields on the feed-wrapper post view.
    pub fn timestamp_candidates(&self) -> impl Iterator<Item = &str> {
        let record = self.post.record.as_ref();
        [
            record.and_then(|r| r.created_at.as_deref()),
            record.and_then(|r| r.indexed_at.as_deref()),
            record.and_then(|r| r.timestamp.as_deref()),
            self.post.created_at.as_deref(),
            self.post.indexed_at.as_deref(),
            self.post.timestamp.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

impl PostView {
    #[must_use]
    pub fn author_did(&self) -> Option<&str> {
        self.author.as_ref().and_then(|a| a.did.as_deref())
    }

    /// Whether the record embeds at least one image or a video.
    #[must_use]
    pub fn has_media(&self) -> bool {
        match self.record.as_ref().and_then(|r| r.embed.as_ref()) {
            Some(RecordEmbed::Images { images }) => !images.is_empty(),
            Some(RecordEmbed::Video { .. }) => true,
            _ => false,
        }
    }

    /// Whether the record embeds a quoted reference to another post.
    #[must_use]
    pub fn is_quote(&self) -> bool {
        matches!(
            self.record.as_ref().and_then(|r| r.embed.as_ref()),
            Some(RecordEmbed::Record { .. } | RecordEmbed::RecordWithMedia { .. })
        )
    }

    #[must_use]
    pub fn is_reply(&self) -> bool {
        self.record.as_ref().is_some_and(|r| r.reply.is_some())
    }
}

/// One page of `app.bsky.graph.getList`.
#[derive(Debug, Deserialize)]
pub struct ListPage {
    #[serde(default)]
    pub items: Vec<ListItemView>,
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListItemView {
    #[serde(default)]
    pub subject: Option<ListSubject>,
}

#[derive(Debug, Deserialize)]
pub struct ListSubject {
    #[serde(default)]
    pub did: Option<String>,
}

/// Response from `app.bsky.actor.getProfile`.
#[derive(Debug, Deserialize)]
pub struct ProfileView {
    #[serde(default)]
    pub did: Option<String>,
    #[serde(default)]
    pub viewer: Option<ViewerState>,
}

/// Relationship between the session account and a profile.
#[derive(Debug, Deserialize)]
pub struct ViewerState {
    /// AT-URI of the session account's follow record, when following.
    #[serde(default)]
    pub following: Option<String>,
}

impl ProfileView {
    #[must_use]
    pub fn is_followed_by_viewer(&self) -> bool {
        self.viewer.as_ref().is_some_and(|v| v.following.is_some())
    }
}

/// Request body for `com.atproto.server.createSession`.
#[derive(Debug, Serialize)]
pub struct CreateSessionRequest<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
}

/// Request body for `com.atproto.repo.createRecord`.
#[derive(Debug, Serialize)]
pub struct CreateRecordRequest<'a, T: Serialize> {
    pub repo: &'a str,
    pub collection: &'a str,
    pub record: T,
}

/// A strong reference to a post, used by repost and like records.
#[derive(Debug, Serialize)]
pub struct SubjectRef<'a> {
    pub uri: &'a str,
    pub cid: &'a str,
}

/// Record for `app.bsky.feed.repost` and `app.bsky.feed.like`.
#[derive(Debug, Serialize)]
pub struct SubjectRecord<'a> {
    #[serde(rename = "$type")]
    pub record_type: &'a str,
    pub subject: SubjectRef<'a>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// Record for `app.bsky.graph.follow`.
#[derive(Debug, Serialize)]
pub struct FollowRecord<'a> {
    #[serde(rename = "$type")]
    pub record_type: &'a str,
    pub subject: &'a str,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}
