//! Accounts and sessions.
//!
//! Passwords are hashed with Argon2id; a session is a random 32-byte hex
//! token stored on the user record and rotated on every login.

use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use chrono::Utc;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::ServiceContext;
use crate::domain::models::{MediaRef, User};
use crate::domain::views::{UserProfile, UserSession};
use crate::error::{ServiceError, ServiceResult};
use crate::repository::RecordFilter;

static USERNAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]{2,29}$").expect("Invalid username regex")
});

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid email regex")
});

const MIN_PASSWORD_LEN: usize = 6;

/// Hash a password using Argon2id
fn hash_password(password: &str) -> ServiceResult<String> {
    let salt = SaltString::generate(rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| ServiceError::Internal("Failed to hash password".to_string()))
}

fn verify_password(password: &str, hash: &str) -> ServiceResult<()> {
    let parsed = PasswordHash::new(hash)
        .map_err(|_| ServiceError::Internal("Invalid password hash format".to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| ServiceError::Authentication("Invalid username or password".to_string()))
}

fn generate_session_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    hex::encode(bytes)
}

fn non_blank(value: &str, field: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupInput {
    pub email: String,
    pub username: String,
    pub screen_name: String,
    pub password: String,
    pub device_token: Option<String>,
}

impl SignupInput {
    fn validate(&self) -> ServiceResult<()> {
        let email = non_blank(&self.email, "Email")?;
        let username = non_blank(&self.username, "Username")?;
        non_blank(&self.screen_name, "Screen name")?;
        if self.password.trim().is_empty() {
            return Err(ServiceError::Validation("Password is required".to_string()));
        }

        if !USERNAME_REGEX.is_match(&username) {
            return Err(ServiceError::Validation(
                "Username must be 3-30 letters, digits or underscores and start with a letter"
                    .to_string(),
            ));
        }
        if !EMAIL_REGEX.is_match(&email) {
            return Err(ServiceError::Validation("Invalid email address".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServiceError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct AccountService {
    ctx: ServiceContext,
}

impl AccountService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Check that `session_token` is the user's current session
    pub async fn authenticate(&self, user_id: Uuid, session_token: &str) -> ServiceResult<User> {
        let mut uow = self.ctx.begin();
        let user: Option<User> = uow.get(user_id).await?;
        match user {
            Some(user) if !session_token.is_empty() && user.session_token == session_token => {
                Ok(user)
            }
            _ => Err(ServiceError::Authentication("Invalid session".to_string())),
        }
    }

    // ========== Sign up / log in ==========

    pub async fn signup(&self, input: SignupInput) -> ServiceResult<UserSession> {
        input.validate()?;
        let password_hash = hash_password(&input.password)?;

        let session = self
            .ctx
            .transact("signup", || self.try_signup(&input, password_hash.clone()))
            .await?;

        info!(user_id = %session.user_id, username = %session.username, "User signed up");
        Ok(session)
    }

    async fn try_signup(&self, input: &SignupInput, password_hash: String) -> ServiceResult<UserSession> {
        let mut uow = self.ctx.begin();
        let username = input.username.trim().to_string();
        let username_normalized = User::normalize_username(&username);
        let email = input.email.trim().to_lowercase();

        let taken: Vec<User> = uow
            .find(RecordFilter::UserByUsername(username_normalized.clone()))
            .await?;
        if !taken.is_empty() {
            return Err(ServiceError::Conflict("Username already taken".to_string()));
        }
        let registered: Vec<User> = uow.find(RecordFilter::UserByEmail(email.clone())).await?;
        if !registered.is_empty() {
            return Err(ServiceError::Conflict("Email already registered".to_string()));
        }

        let user = User {
            id: uow.new_id(),
            email,
            username,
            username_normalized,
            screen_name: input.screen_name.trim().to_string(),
            password_hash,
            session_token: generate_session_token(),
            is_online: true,
            device_token: input
                .device_token
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            avatar: None,
            posts: Vec::new(),
            likes: Vec::new(),
            comments: Vec::new(),
            notifications: Vec::new(),
            following: Vec::new(),
            followers: Vec::new(),
            timeline: Vec::new(),
            recommended_hashtags: Vec::new(),
            recommended_posts: Vec::new(),
            created_at: Utc::now(),
        };
        let session = UserSession::from(&user);
        uow.put(user);
        uow.commit().await?;
        Ok(session)
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
        device_token: Option<String>,
    ) -> ServiceResult<UserSession> {
        let session = self
            .ctx
            .transact("login", || self.try_login(username, password, device_token.clone()))
            .await?;
        info!(user_id = %session.user_id, "User logged in");
        Ok(session)
    }

    async fn try_login(
        &self,
        username: &str,
        password: &str,
        device_token: Option<String>,
    ) -> ServiceResult<UserSession> {
        let mut uow = self.ctx.begin();
        let found: Vec<User> = uow
            .find(RecordFilter::UserByUsername(User::normalize_username(username)))
            .await?;
        let Some(mut user) = found.into_iter().next() else {
            return Err(ServiceError::Authentication(
                "Invalid username or password".to_string(),
            ));
        };
        verify_password(password, &user.password_hash)?;

        user.session_token = generate_session_token();
        user.is_online = true;
        if let Some(token) = device_token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            user.device_token = Some(token);
        }

        let session = UserSession::from(&user);
        uow.put(user);
        uow.commit().await?;
        Ok(session)
    }

    pub async fn logout(&self, user_id: Uuid) -> ServiceResult<bool> {
        self.ctx
            .transact("logout", move || self.try_update(user_id, |user| user.is_online = false))
            .await?;
        info!(user_id = %user_id, "User logged out");
        Ok(true)
    }

    pub async fn update_device_token(&self, user_id: Uuid, device_token: &str) -> ServiceResult<bool> {
        let device_token = non_blank(device_token, "Device token")?;
        self.ctx
            .transact("update_device_token", || {
                let device_token = device_token.clone();
                self.try_update(user_id, move |user| user.device_token = Some(device_token))
            })
            .await?;
        Ok(true)
    }

    async fn try_update<F>(&self, user_id: Uuid, edit: F) -> ServiceResult<()>
    where
        F: FnOnce(&mut User),
    {
        let mut uow = self.ctx.begin();
        let mut user: User = uow.require(user_id, "User").await?;
        edit(&mut user);
        uow.put(user);
        uow.commit().await?;
        Ok(())
    }

    // ========== Avatar ==========

    /// Store a new avatar, replacing (and deleting) any previous one
    pub async fn upload_avatar(&self, user_id: Uuid, image: Vec<u8>) -> ServiceResult<UserProfile> {
        if image.is_empty() {
            return Err(ServiceError::Validation("Image payload is empty".to_string()));
        }
        let media = self
            .ctx
            .media
            .put(image)
            .await
            .map_err(|e| ServiceError::Media(e.to_string()))?;

        let result = self
            .ctx
            .transact("upload_avatar", move || self.try_set_avatar(user_id, Some(media)))
            .await;

        match result {
            Ok((profile, previous)) => {
                if let Some(previous) = previous {
                    self.remove_blob(previous).await;
                }
                Ok(profile)
            }
            Err(e) => {
                self.remove_blob(media).await;
                Err(e)
            }
        }
    }

    pub async fn delete_avatar(&self, user_id: Uuid) -> ServiceResult<bool> {
        let (_, previous) = self
            .ctx
            .transact("delete_avatar", move || self.try_set_avatar(user_id, None))
            .await?;
        match previous {
            Some(previous) => {
                self.remove_blob(previous).await;
                Ok(true)
            }
            None => Err(ServiceError::NotFound("Avatar not found".to_string())),
        }
    }

    async fn try_set_avatar(
        &self,
        user_id: Uuid,
        avatar: Option<MediaRef>,
    ) -> ServiceResult<(UserProfile, Option<MediaRef>)> {
        let mut uow = self.ctx.begin();
        let mut user: User = uow.require(user_id, "User").await?;
        if avatar.is_none() && user.avatar.is_none() {
            return Ok((UserProfile::new(&user, self.ctx.media_prefix()), None));
        }

        let previous = std::mem::replace(&mut user.avatar, avatar);
        let profile = UserProfile::new(&user, self.ctx.media_prefix());
        uow.put(user);
        uow.commit().await?;
        Ok((profile, previous))
    }

    async fn remove_blob(&self, media: MediaRef) {
        if let Err(e) = self.ctx.media.delete(media).await {
            warn!(%media, "Failed to delete avatar blob: {}", e);
        }
    }
}
