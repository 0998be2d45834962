//! Read-side queries.
//!
//! Reads go through a unit of work that is never committed, so author and
//! post lookups are cached per request.

use uuid::Uuid;

use super::paging::PageRange;
use crate::context::ServiceContext;
use crate::domain::models::{Comment, Hashtag, Notification, Post, User};
use crate::domain::views::{CommentView, HashtagSummary, NotificationView, PostView, UserProfile};
use crate::error::{ServiceError, ServiceResult};
use crate::repository::{RecordFilter, UnitOfWork};

#[derive(Clone)]
pub struct QueryService {
    ctx: ServiceContext,
}

impl QueryService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    async fn post_views(&self, uow: &mut UnitOfWork, ids: &[Uuid]) -> ServiceResult<Vec<PostView>> {
        let posts: Vec<Post> = uow.get_many(ids).await?;
        let mut views = Vec::with_capacity(posts.len());
        for post in &posts {
            if let Some(author) = uow.get::<User>(post.author_id).await? {
                views.push(PostView::new(post, &author, self.ctx.media_prefix()));
            }
        }
        Ok(views)
    }

    async fn user_by_name(uow: &mut UnitOfWork, username: &str) -> ServiceResult<User> {
        let normalized = User::normalize_username(username);
        let found: Vec<User> = uow.find(RecordFilter::UserByUsername(normalized)).await?;
        found
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    /// Page of the user's timeline, newest first
    pub async fn user_timeline(&self, user_id: Uuid, range: PageRange) -> ServiceResult<Vec<PostView>> {
        let mut uow = self.ctx.begin();
        let user: User = uow.require(user_id, "User").await?;
        self.post_views(&mut uow, range.slice(&user.timeline)).await
    }

    /// Page of the user's inbox with actor avatars and post images resolved
    pub async fn user_notifications(
        &self,
        user_id: Uuid,
        range: PageRange,
    ) -> ServiceResult<Vec<NotificationView>> {
        let mut uow = self.ctx.begin();
        let user: User = uow.require(user_id, "User").await?;
        let notifications: Vec<Notification> =
            uow.get_many(range.slice(&user.notifications)).await?;

        let mut views = Vec::with_capacity(notifications.len());
        for notification in &notifications {
            let actor: Option<User> = uow.get(notification.actor_id).await?;
            let post: Option<Post> = match notification.kind.post_id() {
                Some(post_id) => uow.get(post_id).await?,
                None => None,
            };
            views.push(NotificationView::new(
                notification,
                actor.as_ref(),
                post.as_ref(),
                self.ctx.media_prefix(),
            ));
        }
        Ok(views)
    }

    /// Posts indexed under a tag; the leading `#` is optional
    pub async fn posts_by_hashtag(&self, tag: &str) -> ServiceResult<Vec<PostView>> {
        let tag = Hashtag::normalize_tag(tag);
        if tag.is_empty() {
            return Err(ServiceError::Validation("Hashtag is empty".to_string()));
        }

        let mut uow = self.ctx.begin();
        let found: Vec<Hashtag> = uow.find(RecordFilter::HashtagByTag(tag)).await?;
        let hashtag = found
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound("Hashtag not found".to_string()))?;
        self.post_views(&mut uow, &hashtag.post_ids).await
    }

    pub async fn user_posts(&self, username: &str, range: PageRange) -> ServiceResult<Vec<PostView>> {
        let mut uow = self.ctx.begin();
        let user = Self::user_by_name(&mut uow, username).await?;
        self.post_views(&mut uow, range.slice(&user.posts)).await
    }

    pub async fn post(&self, post_id: Uuid) -> ServiceResult<PostView> {
        let mut uow = self.ctx.begin();
        let post: Post = uow.require(post_id, "Post").await?;
        let author: User = uow.require(post.author_id, "User").await?;
        Ok(PostView::new(&post, &author, self.ctx.media_prefix()))
    }

    /// Page of a post's comments, newest first
    pub async fn post_comments(
        &self,
        post_id: Uuid,
        range: PageRange,
    ) -> ServiceResult<Vec<CommentView>> {
        let mut uow = self.ctx.begin();
        let post: Post = uow.require(post_id, "Post").await?;
        let comments: Vec<Comment> = uow.get_many(range.slice(&post.comments)).await?;

        let mut views = Vec::with_capacity(comments.len());
        for comment in &comments {
            if let Some(author) = uow.get::<User>(comment.author_id).await? {
                views.push(CommentView::new(comment, &author, self.ctx.media_prefix()));
            }
        }
        Ok(views)
    }

    /// Users whose username contains `fragment`, case-insensitive
    pub async fn search_users(&self, fragment: &str) -> ServiceResult<Vec<UserProfile>> {
        let fragment = User::normalize_username(fragment);
        if fragment.is_empty() {
            return Ok(Vec::new());
        }

        let mut uow = self.ctx.begin();
        let mut users: Vec<User> = uow.find(RecordFilter::UsersMatching(fragment)).await?;
        users.sort_by(|a, b| a.username_normalized.cmp(&b.username_normalized));
        Ok(users
            .iter()
            .map(|u| UserProfile::new(u, self.ctx.media_prefix()))
            .collect())
    }

    /// Tags containing `fragment` that still index at least one post
    pub async fn search_hashtags(&self, fragment: &str) -> ServiceResult<Vec<HashtagSummary>> {
        let fragment = Hashtag::normalize_tag(fragment);
        if fragment.is_empty() {
            return Ok(Vec::new());
        }

        let mut uow = self.ctx.begin();
        let hashtags: Vec<Hashtag> = uow.find(RecordFilter::HashtagsMatching(fragment)).await?;
        let mut summaries: Vec<HashtagSummary> = hashtags
            .iter()
            .filter(|h| !h.post_ids.is_empty())
            .map(HashtagSummary::from)
            .collect();
        summaries.sort_by(|a, b| a.tag.cmp(&b.tag));
        Ok(summaries)
    }

    /// Public profiles for follower/following lists; unknown ids are skipped
    /// and the input order is kept
    pub async fn users_by_ids(&self, user_ids: &[Uuid]) -> ServiceResult<Vec<UserProfile>> {
        let mut uow = self.ctx.begin();
        let users: Vec<User> = uow.get_many(user_ids).await?;
        Ok(users
            .iter()
            .map(|u| UserProfile::new(u, self.ctx.media_prefix()))
            .collect())
    }

    pub async fn user_profile(&self, user_id: Uuid) -> ServiceResult<UserProfile> {
        let mut uow = self.ctx.begin();
        let user: User = uow.require(user_id, "User").await?;
        Ok(UserProfile::new(&user, self.ctx.media_prefix()))
    }

    pub async fn user_profile_by_name(&self, username: &str) -> ServiceResult<UserProfile> {
        let mut uow = self.ctx.begin();
        let user = Self::user_by_name(&mut uow, username).await?;
        Ok(UserProfile::new(&user, self.ctx.media_prefix()))
    }
}
