//! Content lifecycle: posts, likes and comments.
//!
//! Each mutation runs in one unit of work. Creation writes every
//! denormalized reference (timelines, hashtag index, inboxes); deletion
//! strips every one of them again before removing the record itself.

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::mention_parser::{extract_hashtags, extract_mentions};
use super::notifications::NotificationFanout;
use crate::context::ServiceContext;
use crate::domain::models::{
    Comment, Hashtag, Interaction, LikeEntry, MediaRef, Notification, NotificationKind, Post, User,
};
use crate::domain::views::{CommentView, PostView};
use crate::error::{ServiceError, ServiceResult};
use crate::push::PushRequest;
use crate::repository::{RecordFilter, UnitOfWork};

fn strip(list: &mut Vec<Uuid>, id: Uuid) -> bool {
    let before = list.len();
    list.retain(|entry| *entry != id);
    list.len() != before
}

#[derive(Clone)]
pub struct ContentService {
    ctx: ServiceContext,
    fanout: NotificationFanout,
}

impl ContentService {
    pub fn new(ctx: ServiceContext) -> Self {
        let fanout = NotificationFanout::new(&ctx.config);
        Self { ctx, fanout }
    }

    /// Users mentioned in `text` that exist, excluding `skip`
    async fn mentioned_users(
        uow: &mut UnitOfWork,
        text: &str,
        skip: &[Uuid],
    ) -> ServiceResult<Vec<User>> {
        let mut users = Vec::new();
        for username in extract_mentions(text) {
            let found: Vec<User> = uow.find(RecordFilter::UserByUsername(username)).await?;
            users.extend(found.into_iter().filter(|u| !skip.contains(&u.id)));
        }
        Ok(users)
    }

    // ========== Posts ==========

    /// Publish a post. The image is stored first and removed again if the
    /// post cannot be committed.
    pub async fn create_post(
        &self,
        author_id: Uuid,
        image: Vec<u8>,
        description: Option<String>,
    ) -> ServiceResult<PostView> {
        if image.is_empty() {
            return Err(ServiceError::Validation("Image payload is empty".to_string()));
        }
        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let media = self
            .ctx
            .media
            .put(image)
            .await
            .map_err(|e| ServiceError::Media(e.to_string()))?;

        let result = self
            .ctx
            .transact("create_post", move || {
                self.try_create_post(author_id, media, description.clone())
            })
            .await;

        match result {
            Ok((view, pushes)) => {
                info!(post_id = %view.id, author_id = %author_id, "Post created");
                self.ctx.dispatch(pushes);
                Ok(view)
            }
            Err(e) => {
                if let Err(cleanup) = self.ctx.media.delete(media).await {
                    warn!(%media, "Failed to remove image of unpublished post: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    async fn try_create_post(
        &self,
        author_id: Uuid,
        image: MediaRef,
        description: Option<String>,
    ) -> ServiceResult<(PostView, Vec<PushRequest>)> {
        let mut uow = self.ctx.begin();
        let mut author: User = uow.require(author_id, "User").await?;

        let post_id = uow.new_id();
        let text = description.clone().unwrap_or_default();

        let mut hashtag_ids = Vec::new();
        for tag in extract_hashtags(&text) {
            let existing: Vec<Hashtag> = uow.find(RecordFilter::HashtagByTag(tag.clone())).await?;
            let mut hashtag = match existing.into_iter().next() {
                Some(hashtag) => hashtag,
                None => Hashtag {
                    id: uow.new_id(),
                    tag,
                    post_ids: Vec::new(),
                },
            };
            hashtag.post_ids.insert(0, post_id);
            hashtag_ids.push(hashtag.id);
            uow.put(hashtag);
        }

        let post = Post {
            id: post_id,
            author_id,
            image,
            created_at: Utc::now(),
            description,
            likes: Vec::new(),
            comments: Vec::new(),
            hashtags: hashtag_ids,
        };

        author.posts.insert(0, post_id);
        author.timeline.insert(0, post_id);
        uow.put(author.clone());

        // Fan-out on write: a new post is always the newest entry
        for follower_id in &author.followers {
            if let Some(mut follower) = uow.get::<User>(*follower_id).await? {
                follower.timeline.insert(0, post_id);
                uow.put(follower);
            }
        }

        for mentioned in Self::mentioned_users(&mut uow, &text, &[author_id]).await? {
            self.fanout
                .notify(
                    &mut uow,
                    mentioned.id,
                    &author,
                    NotificationKind::Mention {
                        post_id,
                        comment_id: None,
                    },
                )
                .await?;
        }

        let view = PostView::new(&post, &author, self.ctx.media_prefix());
        uow.put(post);
        let pushes = uow.commit().await?;
        Ok((view, pushes))
    }

    /// Delete a post authored by `user_id` together with everything that
    /// points at it
    pub async fn delete_post(&self, user_id: Uuid, post_id: Uuid) -> ServiceResult<bool> {
        let image = self
            .ctx
            .transact("delete_post", move || self.try_delete_post(user_id, post_id))
            .await?;

        if let Err(e) = self.ctx.media.delete(image).await {
            warn!(%post_id, media = %image, "Failed to delete post image: {}", e);
        }
        info!(%post_id, user_id = %user_id, "Post deleted");
        Ok(true)
    }

    async fn try_delete_post(&self, user_id: Uuid, post_id: Uuid) -> ServiceResult<MediaRef> {
        let mut uow = self.ctx.begin();
        let post: Post = uow.require(post_id, "Post").await?;
        if post.author_id != user_id {
            return Err(ServiceError::NotFound("Post not found".to_string()));
        }

        let mut author: User = uow.require(user_id, "User").await?;
        strip(&mut author.posts, post_id);
        strip(&mut author.timeline, post_id);
        let followers = author.followers.clone();
        uow.put(author);

        for follower_id in followers {
            if let Some(mut follower) = uow.get::<User>(follower_id).await? {
                if strip(&mut follower.timeline, post_id) {
                    uow.put(follower);
                }
            }
        }

        for hashtag_id in &post.hashtags {
            if let Some(mut hashtag) = uow.get::<Hashtag>(*hashtag_id).await? {
                if strip(&mut hashtag.post_ids, post_id) {
                    uow.put(hashtag);
                }
            }
        }

        for comment_id in &post.comments {
            let Some(comment) = uow.get::<Comment>(*comment_id).await? else {
                continue;
            };
            if let Some(mut commenter) = uow.get::<User>(comment.author_id).await? {
                if strip(&mut commenter.comments, comment.id) {
                    uow.put(commenter);
                }
            }
            for notification_id in &comment.notification_ids {
                self.fanout.retract(&mut uow, *notification_id).await?;
            }
            uow.delete::<Comment>(comment.id);
        }

        for like in &post.likes {
            if let Some(mut liker) = uow.get::<User>(like.user_id).await? {
                if strip(&mut liker.likes, post_id) {
                    uow.put(liker);
                }
            }
            if let Some(notification_id) = like.notification_id {
                self.fanout.retract(&mut uow, notification_id).await?;
            }
        }

        // Anything still pointing at the post, e.g. mentions in its description
        let leftovers: Vec<Notification> =
            uow.find(RecordFilter::NotificationsForPost(post_id)).await?;
        for notification in leftovers {
            self.fanout.retract(&mut uow, notification.id).await?;
        }

        uow.delete::<Post>(post_id);
        uow.commit().await?;
        Ok(post.image)
    }

    // ========== Likes ==========

    /// Like a post. Returns `false` when the user already likes it.
    pub async fn like_post(&self, user_id: Uuid, post_id: Uuid) -> ServiceResult<bool> {
        let (liked, pushes) = self
            .ctx
            .transact("like_post", move || self.try_like_post(user_id, post_id))
            .await?;

        if liked {
            debug!(%post_id, user_id = %user_id, "Post liked");
            self.ctx.dispatch(pushes);
        }
        Ok(liked)
    }

    async fn try_like_post(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> ServiceResult<(bool, Vec<PushRequest>)> {
        let mut uow = self.ctx.begin();
        let mut post: Post = uow.require(post_id, "Post").await?;
        if post.is_liked_by(user_id) {
            return Ok((false, Vec::new()));
        }

        let mut user: User = uow.require(user_id, "User").await?;
        user.likes.insert(0, post_id);

        let cap = self.ctx.config.recommendations.max_recommended_hashtags;
        for hashtag_id in post.hashtags.iter().rev() {
            strip(&mut user.recommended_hashtags, *hashtag_id);
            user.recommended_hashtags.insert(0, *hashtag_id);
        }
        user.recommended_hashtags.truncate(cap);
        uow.put(user.clone());

        let notification_id = if post.author_id != user_id {
            let id = self
                .fanout
                .notify(
                    &mut uow,
                    post.author_id,
                    &user,
                    NotificationKind::PostInteraction {
                        post_id,
                        comment_id: None,
                        interaction: Interaction::Like,
                    },
                )
                .await?;
            Some(id)
        } else {
            None
        };

        post.likes.insert(
            0,
            LikeEntry {
                user_id,
                notification_id,
            },
        );
        uow.put(post);

        let pushes = uow.commit().await?;
        Ok((true, pushes))
    }

    /// Remove a like. Returns `false` when the user did not like the post.
    pub async fn unlike_post(&self, user_id: Uuid, post_id: Uuid) -> ServiceResult<bool> {
        let unliked = self
            .ctx
            .transact("unlike_post", move || self.try_unlike_post(user_id, post_id))
            .await?;
        if unliked {
            debug!(%post_id, user_id = %user_id, "Post unliked");
        }
        Ok(unliked)
    }

    async fn try_unlike_post(&self, user_id: Uuid, post_id: Uuid) -> ServiceResult<bool> {
        let mut uow = self.ctx.begin();
        let mut post: Post = uow.require(post_id, "Post").await?;
        let Some(position) = post.likes.iter().position(|like| like.user_id == user_id) else {
            return Ok(false);
        };
        let like = post.likes.remove(position);
        uow.put(post);

        if let Some(mut user) = uow.get::<User>(user_id).await? {
            strip(&mut user.likes, post_id);
            uow.put(user);
        }

        if let Some(notification_id) = like.notification_id {
            self.fanout.retract(&mut uow, notification_id).await?;
        }

        uow.commit().await?;
        Ok(true)
    }

    // ========== Comments ==========

    /// Comment on a post, notifying mentioned users and the post owner
    pub async fn add_comment(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        text: String,
    ) -> ServiceResult<CommentView> {
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(ServiceError::Validation("Comment text is empty".to_string()));
        }

        let (view, pushes) = self
            .ctx
            .transact("add_comment", move || {
                self.try_add_comment(user_id, post_id, text.clone())
            })
            .await?;

        info!(comment_id = %view.id, %post_id, user_id = %user_id, "Comment added");
        self.ctx.dispatch(pushes);
        Ok(view)
    }

    async fn try_add_comment(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        text: String,
    ) -> ServiceResult<(CommentView, Vec<PushRequest>)> {
        let mut uow = self.ctx.begin();
        let mut post: Post = uow.require(post_id, "Post").await?;
        let mut user: User = uow.require(user_id, "User").await?;
        let comment_id = uow.new_id();

        user.comments.insert(0, comment_id);
        uow.put(user.clone());
        post.comments.insert(0, comment_id);
        let owner_id = post.author_id;
        uow.put(post);

        let mut notification_ids = Vec::new();
        for mentioned in Self::mentioned_users(&mut uow, &text, &[user_id, owner_id]).await? {
            let id = self
                .fanout
                .notify(
                    &mut uow,
                    mentioned.id,
                    &user,
                    NotificationKind::Mention {
                        post_id,
                        comment_id: Some(comment_id),
                    },
                )
                .await?;
            notification_ids.push(id);
        }

        if owner_id != user_id {
            let id = self
                .fanout
                .notify(
                    &mut uow,
                    owner_id,
                    &user,
                    NotificationKind::PostInteraction {
                        post_id,
                        comment_id: Some(comment_id),
                        interaction: Interaction::Comment,
                    },
                )
                .await?;
            notification_ids.push(id);
        }

        let comment = Comment {
            id: comment_id,
            author_id: user_id,
            post_id,
            text,
            created_at: Utc::now(),
            notification_ids,
        };
        let view = CommentView::new(&comment, &user, self.ctx.media_prefix());
        uow.put(comment);

        let pushes = uow.commit().await?;
        Ok((view, pushes))
    }

    /// Delete a comment. Returns `false` when `user_id` is not its author.
    pub async fn delete_comment(&self, user_id: Uuid, comment_id: Uuid) -> ServiceResult<bool> {
        let deleted = self
            .ctx
            .transact("delete_comment", move || {
                self.try_delete_comment(user_id, comment_id)
            })
            .await?;
        if deleted {
            info!(%comment_id, user_id = %user_id, "Comment deleted");
        }
        Ok(deleted)
    }

    async fn try_delete_comment(&self, user_id: Uuid, comment_id: Uuid) -> ServiceResult<bool> {
        let mut uow = self.ctx.begin();
        let comment: Comment = uow.require(comment_id, "Comment").await?;
        if comment.author_id != user_id {
            return Ok(false);
        }

        if let Some(mut post) = uow.get::<Post>(comment.post_id).await? {
            if strip(&mut post.comments, comment_id) {
                uow.put(post);
            }
        }
        if let Some(mut author) = uow.get::<User>(user_id).await? {
            if strip(&mut author.comments, comment_id) {
                uow.put(author);
            }
        }
        for notification_id in &comment.notification_ids {
            self.fanout.retract(&mut uow, *notification_id).await?;
        }
        uow.delete::<Comment>(comment_id);

        uow.commit().await?;
        Ok(true)
    }
}
