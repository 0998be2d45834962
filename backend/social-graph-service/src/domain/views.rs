//! Read models handed back to callers.
//!
//! Each view carries the author/actor display fields so a client can render it
//! without further lookups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::models::{Comment, Hashtag, MediaRef, Notification, NotificationKind, Post, User};

/// Public URL of a stored blob
pub fn media_url(prefix: &str, media: MediaRef) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), media)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub id: Uuid,
    pub author_id: Uuid,
    pub username: String,
    pub user_screen_name: String,
    pub user_avatar: Option<String>,
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub description: Option<String>,
    pub likes: Vec<Uuid>,
    pub comments: Vec<Uuid>,
    pub hashtags: Vec<Uuid>,
}

impl PostView {
    pub fn new(post: &Post, author: &User, media_prefix: &str) -> Self {
        Self {
            id: post.id,
            author_id: post.author_id,
            username: author.username.clone(),
            user_screen_name: author.screen_name.clone(),
            user_avatar: author.avatar.map(|a| media_url(media_prefix, a)),
            image: media_url(media_prefix, post.image),
            created_at: post.created_at,
            description: post.description.clone(),
            likes: post.likes.iter().map(|like| like.user_id).collect(),
            comments: post.comments.clone(),
            hashtags: post.hashtags.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub username: String,
    pub user_screen_name: String,
    pub user_avatar: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl CommentView {
    pub fn new(comment: &Comment, author: &User, media_prefix: &str) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            username: author.username.clone(),
            user_screen_name: author.screen_name.clone(),
            user_avatar: author.avatar.map(|a| media_url(media_prefix, a)),
            text: comment.text.clone(),
            created_at: comment.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationView {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub actor_id: Uuid,
    pub actor_username: String,
    pub actor_screen_name: String,
    pub actor_avatar: Option<String>,
    pub post_image: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl NotificationView {
    pub fn new(
        notification: &Notification,
        actor: Option<&User>,
        post: Option<&Post>,
        media_prefix: &str,
    ) -> Self {
        Self {
            id: notification.id,
            kind: notification.kind.clone(),
            actor_id: notification.actor_id,
            actor_username: notification.actor_username.clone(),
            actor_screen_name: notification.actor_screen_name.clone(),
            actor_avatar: actor
                .and_then(|u| u.avatar)
                .map(|a| media_url(media_prefix, a)),
            post_image: post.map(|p| media_url(media_prefix, p.image)),
            message: notification.message.clone(),
            created_at: notification.created_at,
        }
    }
}

/// Public part of a user record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub screen_name: String,
    pub avatar: Option<String>,
    pub posts: Vec<Uuid>,
    pub likes: Vec<Uuid>,
    pub following: Vec<Uuid>,
    pub followers: Vec<Uuid>,
}

impl UserProfile {
    pub fn new(user: &User, media_prefix: &str) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            screen_name: user.screen_name.clone(),
            avatar: user.avatar.map(|a| media_url(media_prefix, a)),
            posts: user.posts.clone(),
            likes: user.likes.clone(),
            following: user.following.clone(),
            followers: user.followers.clone(),
        }
    }
}

/// Returned by signup and login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSession {
    pub user_id: Uuid,
    pub username: String,
    pub screen_name: String,
    pub session_token: String,
}

impl From<&User> for UserSession {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            screen_name: user.screen_name.clone(),
            session_token: user.session_token.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashtagSummary {
    pub id: Uuid,
    pub tag: String,
    pub post_count: usize,
}

impl From<&Hashtag> for HashtagSummary {
    fn from(hashtag: &Hashtag) -> Self {
        Self {
            id: hashtag.id,
            tag: hashtag.tag.clone(),
            post_count: hashtag.post_ids.len(),
        }
    }
}
