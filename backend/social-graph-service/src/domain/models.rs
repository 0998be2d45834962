use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reference to a binary blob held by the media store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRef(pub Uuid);

impl std::fmt::Display for MediaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User entity - account plus every denormalized list the graph maintains
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    /// Lower-cased username used for lookups and mentions
    pub username_normalized: String,
    pub screen_name: String,
    pub password_hash: String,
    pub session_token: String,
    pub is_online: bool,
    pub device_token: Option<String>,
    pub avatar: Option<MediaRef>,
    /// Authored post ids, newest first
    pub posts: Vec<Uuid>,
    /// Liked post ids, most recent first
    pub likes: Vec<Uuid>,
    pub comments: Vec<Uuid>,
    /// Notification ids, newest first
    pub notifications: Vec<Uuid>,
    pub following: Vec<Uuid>,
    pub followers: Vec<Uuid>,
    /// Own and followed users' post ids, newest first by post creation time
    pub timeline: Vec<Uuid>,
    /// Hashtag ids from liked posts, most recent first
    pub recommended_hashtags: Vec<Uuid>,
    /// Post ids already served in the current recommendation session
    pub recommended_posts: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn normalize_username(username: &str) -> String {
        username.trim().to_lowercase()
    }

    pub fn is_following(&self, other: Uuid) -> bool {
        self.following.contains(&other)
    }
}

/// One liker of a post, with the notification the like produced (if any)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeEntry {
    pub user_id: Uuid,
    pub notification_id: Option<Uuid>,
}

/// Post entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub image: MediaRef,
    pub created_at: DateTime<Utc>,
    pub description: Option<String>,
    /// Likers, most recent first
    pub likes: Vec<LikeEntry>,
    /// Comment ids, newest first
    pub comments: Vec<Uuid>,
    pub hashtags: Vec<Uuid>,
}

impl Post {
    pub fn is_liked_by(&self, user_id: Uuid) -> bool {
        self.likes.iter().any(|like| like.user_id == user_id)
    }
}

/// Comment entity - represents a comment on a post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub author_id: Uuid,
    pub post_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Mention and post-owner notifications raised by this comment
    pub notification_ids: Vec<Uuid>,
}

/// Hashtag index entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hashtag {
    pub id: Uuid,
    /// Lower-cased tag text without the leading `#`
    pub tag: String,
    /// Post ids, newest first
    pub post_ids: Vec<Uuid>,
}

impl Hashtag {
    pub fn normalize_tag(tag: &str) -> String {
        tag.trim().trim_start_matches('#').to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interaction {
    Like,
    Comment,
}

/// Notification kind discriminator and kind-specific references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationKind {
    /// Like or comment on the recipient's post
    PostInteraction {
        post_id: Uuid,
        comment_id: Option<Uuid>,
        interaction: Interaction,
    },
    /// Recipient was tagged in a post or a comment
    Mention {
        post_id: Uuid,
        comment_id: Option<Uuid>,
    },
    /// Recipient gained a follower (the actor)
    Follow,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::PostInteraction { .. } => "post_interaction",
            NotificationKind::Mention { .. } => "mention",
            NotificationKind::Follow => "follow",
        }
    }

    pub fn post_id(&self) -> Option<Uuid> {
        match self {
            NotificationKind::PostInteraction { post_id, .. }
            | NotificationKind::Mention { post_id, .. } => Some(*post_id),
            NotificationKind::Follow => None,
        }
    }
}

/// Notification entity, denormalized enough to render without joins
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub actor_id: Uuid,
    pub actor_username: String,
    pub actor_screen_name: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub kind: NotificationKind,
}
