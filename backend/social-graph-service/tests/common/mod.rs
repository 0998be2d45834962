use std::sync::{Arc, Once};
use std::time::Duration;

use social_graph_service::api::{CreatePostRequest, FollowRequest, PostActionRequest};
use social_graph_service::domain::models::{Comment, Hashtag, Notification, Post, User};
use social_graph_service::domain::views::{PostView, UserSession};
use social_graph_service::media::InMemoryMediaStore;
use social_graph_service::push::RecordingPushSender;
use social_graph_service::repository::{Entity, InMemoryStore, RecordFilter, SocialStore};
use social_graph_service::services::SignupInput;
use social_graph_service::{Config, ServiceContext, SocialApi};
use uuid::Uuid;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Engine wired to in-memory collaborators that tests can inspect
#[allow(dead_code)]
pub struct Harness {
    pub api: SocialApi,
    pub store: Arc<InMemoryStore>,
    pub media: Arc<InMemoryMediaStore>,
    pub push: Arc<RecordingPushSender>,
    pub config: Config,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(mut config: Config) -> Self {
        init_tracing();
        config.store.retry_backoff_ms = 1;

        let store = Arc::new(InMemoryStore::new());
        let media = Arc::new(InMemoryMediaStore::new());
        let push = Arc::new(RecordingPushSender::new());
        let ctx = ServiceContext::new(store.clone(), media.clone(), push.clone(), config.clone());

        Self {
            api: SocialApi::new(ctx),
            store,
            media,
            push,
            config,
        }
    }

    pub async fn signup(&self, username: &str) -> UserSession {
        self.api
            .signup(SignupInput {
                email: format!("{}@example.com", username.to_lowercase()),
                username: username.to_string(),
                screen_name: format!("{} Screen", username),
                password: "secret123".to_string(),
                device_token: Some(format!("device-{}", username.to_lowercase())),
            })
            .await
            .expect("signup failed")
    }

    pub async fn create_post(&self, session: &UserSession, description: &str) -> PostView {
        self.api
            .create_post(CreatePostRequest {
                user_id: session.user_id,
                session_token: session.session_token.clone(),
                image: vec![0xFF, 0xD8, 0xFF],
                description: Some(description.to_string()),
            })
            .await
            .expect("create_post failed")
    }

    pub async fn follow(&self, session: &UserSession, target: &UserSession) -> bool {
        self.api
            .follow(follow_request(session, target))
            .await
            .expect("follow failed")
    }

    pub async fn like(&self, session: &UserSession, post_id: Uuid) -> bool {
        self.api
            .like_post(post_action(session, post_id))
            .await
            .expect("like failed")
    }

    pub async fn load<E: Entity>(&self, id: Uuid) -> Option<E> {
        self.store
            .fetch(E::key_of(id))
            .await
            .expect("fetch failed")
            .and_then(|versioned| E::from_record(versioned.value))
    }

    pub async fn user(&self, id: Uuid) -> User {
        self.load::<User>(id).await.expect("user missing")
    }

    pub async fn post(&self, id: Uuid) -> Option<Post> {
        self.load::<Post>(id).await
    }

    pub async fn comment(&self, id: Uuid) -> Option<Comment> {
        self.load::<Comment>(id).await
    }

    pub async fn notification(&self, id: Uuid) -> Option<Notification> {
        self.load::<Notification>(id).await
    }

    pub async fn hashtag(&self, tag: &str) -> Option<Hashtag> {
        self.store
            .scan(&RecordFilter::HashtagByTag(tag.to_string()))
            .await
            .expect("scan failed")
            .into_iter()
            .find_map(|versioned| Hashtag::from_record(versioned.value))
    }

    /// Let spawned push deliveries run to completion
    pub async fn settle_pushes(&self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[allow(dead_code)]
pub fn follow_request(session: &UserSession, target: &UserSession) -> FollowRequest {
    FollowRequest {
        user_id: session.user_id,
        session_token: session.session_token.clone(),
        target_id: target.user_id,
    }
}

#[allow(dead_code)]
pub fn post_action(session: &UserSession, post_id: Uuid) -> PostActionRequest {
    PostActionRequest {
        user_id: session.user_id,
        session_token: session.session_token.clone(),
        post_id,
    }
}
