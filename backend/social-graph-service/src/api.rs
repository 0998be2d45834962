//! Remote-procedure surface of the engine.
//!
//! One async method per operation, each taking a deserializable request.
//! Privileged operations check the session token before doing anything
//! else; range checks run first of all.

use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::context::ServiceContext;
use crate::domain::views::{
    CommentView, HashtagSummary, NotificationView, PostView, UserProfile, UserSession,
};
use crate::error::ServiceResult;
use crate::services::{
    AccountService, ContentService, FollowService, PageRange, QueryService,
    RecommendationService, SignupInput,
};

// ========== Requests ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowRequest {
    pub user_id: Uuid,
    pub session_token: String,
    pub target_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub user_id: Uuid,
    pub session_token: String,
    pub image: Vec<u8>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Delete, like and unlike all address a single post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostActionRequest {
    pub user_id: Uuid,
    pub session_token: String,
    pub post_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddCommentRequest {
    pub user_id: Uuid,
    pub session_token: String,
    pub post_id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteCommentRequest {
    pub user_id: Uuid,
    pub session_token: String,
    pub comment_id: Uuid,
}

/// Page of one of the caller's own lists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRequest {
    pub user_id: Uuid,
    pub session_token: String,
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub device_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub user_id: Uuid,
    pub session_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceTokenRequest {
    pub user_id: Uuid,
    pub session_token: String,
    pub device_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarRequest {
    pub user_id: Uuid,
    pub session_token: String,
    pub image: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPostsRequest {
    pub username: String,
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostCommentsRequest {
    pub post_id: Uuid,
    pub start: i64,
    pub end: i64,
}

// ========== Facade ==========

#[derive(Clone)]
pub struct SocialApi {
    accounts: AccountService,
    content: ContentService,
    follows: FollowService,
    queries: QueryService,
    recommendations: RecommendationService,
}

impl SocialApi {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            accounts: AccountService::new(ctx.clone()),
            content: ContentService::new(ctx.clone()),
            follows: FollowService::new(ctx.clone()),
            queries: QueryService::new(ctx.clone()),
            recommendations: RecommendationService::new(ctx),
        }
    }

    async fn authenticate(&self, user_id: Uuid, session_token: &str) -> ServiceResult<()> {
        self.accounts.authenticate(user_id, session_token).await.map(|_| ())
    }

    // ----- social graph -----

    #[instrument(skip(self, req), fields(user_id = %req.user_id, target_id = %req.target_id))]
    pub async fn follow(&self, req: FollowRequest) -> ServiceResult<bool> {
        self.authenticate(req.user_id, &req.session_token).await?;
        self.follows.follow(req.user_id, req.target_id).await
    }

    #[instrument(skip(self, req), fields(user_id = %req.user_id, target_id = %req.target_id))]
    pub async fn unfollow(&self, req: FollowRequest) -> ServiceResult<bool> {
        self.authenticate(req.user_id, &req.session_token).await?;
        self.follows.unfollow(req.user_id, req.target_id).await
    }

    // ----- content -----

    #[instrument(skip(self, req), fields(user_id = %req.user_id))]
    pub async fn create_post(&self, req: CreatePostRequest) -> ServiceResult<PostView> {
        self.authenticate(req.user_id, &req.session_token).await?;
        self.content
            .create_post(req.user_id, req.image, req.description)
            .await
    }

    #[instrument(skip(self, req), fields(user_id = %req.user_id, post_id = %req.post_id))]
    pub async fn delete_post(&self, req: PostActionRequest) -> ServiceResult<bool> {
        self.authenticate(req.user_id, &req.session_token).await?;
        self.content.delete_post(req.user_id, req.post_id).await
    }

    #[instrument(skip(self, req), fields(user_id = %req.user_id, post_id = %req.post_id))]
    pub async fn like_post(&self, req: PostActionRequest) -> ServiceResult<bool> {
        self.authenticate(req.user_id, &req.session_token).await?;
        self.content.like_post(req.user_id, req.post_id).await
    }

    #[instrument(skip(self, req), fields(user_id = %req.user_id, post_id = %req.post_id))]
    pub async fn unlike_post(&self, req: PostActionRequest) -> ServiceResult<bool> {
        self.authenticate(req.user_id, &req.session_token).await?;
        self.content.unlike_post(req.user_id, req.post_id).await
    }

    #[instrument(skip(self, req), fields(user_id = %req.user_id, post_id = %req.post_id))]
    pub async fn add_comment(&self, req: AddCommentRequest) -> ServiceResult<CommentView> {
        self.authenticate(req.user_id, &req.session_token).await?;
        self.content
            .add_comment(req.user_id, req.post_id, req.text)
            .await
    }

    #[instrument(skip(self, req), fields(user_id = %req.user_id, comment_id = %req.comment_id))]
    pub async fn delete_comment(&self, req: DeleteCommentRequest) -> ServiceResult<bool> {
        self.authenticate(req.user_id, &req.session_token).await?;
        self.content
            .delete_comment(req.user_id, req.comment_id)
            .await
    }

    // ----- feeds -----

    #[instrument(skip(self, req), fields(user_id = %req.user_id))]
    pub async fn user_timeline(&self, req: PageRequest) -> ServiceResult<Vec<PostView>> {
        let range = PageRange::new(req.start, req.end)?;
        self.authenticate(req.user_id, &req.session_token).await?;
        self.queries.user_timeline(req.user_id, range).await
    }

    #[instrument(skip(self, req), fields(user_id = %req.user_id))]
    pub async fn post_recommendations(&self, req: PageRequest) -> ServiceResult<Vec<PostView>> {
        let range = PageRange::new(req.start, req.end)?;
        self.authenticate(req.user_id, &req.session_token).await?;
        self.recommendations
            .post_recommendations(req.user_id, range)
            .await
    }

    #[instrument(skip(self, req), fields(user_id = %req.user_id))]
    pub async fn user_notifications(&self, req: PageRequest) -> ServiceResult<Vec<NotificationView>> {
        let range = PageRange::new(req.start, req.end)?;
        self.authenticate(req.user_id, &req.session_token).await?;
        self.queries.user_notifications(req.user_id, range).await
    }

    pub async fn posts_by_hashtag(&self, tag: &str) -> ServiceResult<Vec<PostView>> {
        self.queries.posts_by_hashtag(tag).await
    }

    pub async fn user_posts(&self, req: UserPostsRequest) -> ServiceResult<Vec<PostView>> {
        let range = PageRange::new(req.start, req.end)?;
        self.queries.user_posts(&req.username, range).await
    }

    pub async fn post(&self, post_id: Uuid) -> ServiceResult<PostView> {
        self.queries.post(post_id).await
    }

    pub async fn post_comments(&self, req: PostCommentsRequest) -> ServiceResult<Vec<CommentView>> {
        let range = PageRange::new(req.start, req.end)?;
        self.queries.post_comments(req.post_id, range).await
    }

    pub async fn search_users(&self, fragment: &str) -> ServiceResult<Vec<UserProfile>> {
        self.queries.search_users(fragment).await
    }

    pub async fn search_hashtags(&self, fragment: &str) -> ServiceResult<Vec<HashtagSummary>> {
        self.queries.search_hashtags(fragment).await
    }

    pub async fn user_profile(&self, user_id: Uuid) -> ServiceResult<UserProfile> {
        self.queries.user_profile(user_id).await
    }

    pub async fn users_by_ids(&self, user_ids: &[Uuid]) -> ServiceResult<Vec<UserProfile>> {
        self.queries.users_by_ids(user_ids).await
    }

    pub async fn user_profile_by_name(&self, username: &str) -> ServiceResult<UserProfile> {
        self.queries.user_profile_by_name(username).await
    }

    // ----- accounts -----

    #[instrument(skip(self, req), fields(username = %req.username))]
    pub async fn signup(&self, req: SignupInput) -> ServiceResult<UserSession> {
        self.accounts.signup(req).await
    }

    #[instrument(skip(self, req), fields(username = %req.username))]
    pub async fn login(&self, req: LoginRequest) -> ServiceResult<UserSession> {
        self.accounts
            .login(&req.username, &req.password, req.device_token)
            .await
    }

    #[instrument(skip(self, req), fields(user_id = %req.user_id))]
    pub async fn logout(&self, req: SessionRequest) -> ServiceResult<bool> {
        self.authenticate(req.user_id, &req.session_token).await?;
        self.accounts.logout(req.user_id).await
    }

    #[instrument(skip(self, req), fields(user_id = %req.user_id))]
    pub async fn update_device_token(&self, req: DeviceTokenRequest) -> ServiceResult<bool> {
        self.authenticate(req.user_id, &req.session_token).await?;
        self.accounts
            .update_device_token(req.user_id, &req.device_token)
            .await
    }

    #[instrument(skip(self, req), fields(user_id = %req.user_id))]
    pub async fn upload_avatar(&self, req: AvatarRequest) -> ServiceResult<UserProfile> {
        self.authenticate(req.user_id, &req.session_token).await?;
        self.accounts.upload_avatar(req.user_id, req.image).await
    }

    #[instrument(skip(self, req), fields(user_id = %req.user_id))]
    pub async fn delete_avatar(&self, req: SessionRequest) -> ServiceResult<bool> {
        self.authenticate(req.user_id, &req.session_token).await?;
        self.accounts.delete_avatar(req.user_id).await
    }
}
