use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

use super::notifications::NotificationFanout;
use super::ordering::merge_newest_first;
use crate::context::ServiceContext;
use crate::domain::models::{Notification, NotificationKind, Post, User};
use crate::error::{ServiceError, ServiceResult};
use crate::push::PushRequest;
use crate::repository::RecordFilter;

#[derive(Clone)]
pub struct FollowService {
    ctx: ServiceContext,
    fanout: NotificationFanout,
}

impl FollowService {
    pub fn new(ctx: ServiceContext) -> Self {
        let fanout = NotificationFanout::new(&ctx.config);
        Self { ctx, fanout }
    }

    /// Create a follow edge; returns true if it did not exist yet.
    ///
    /// The follower's timeline absorbs the followee's posts in creation
    /// order and the followee gets a follow notification.
    pub async fn follow(&self, user_id: Uuid, target_id: Uuid) -> ServiceResult<bool> {
        if user_id == target_id {
            return Err(ServiceError::Validation("Cannot follow yourself".to_string()));
        }

        let (created, pushes) = self
            .ctx
            .transact("follow", move || self.try_follow(user_id, target_id))
            .await?;

        if created {
            info!(follower_id = %user_id, followee_id = %target_id, "Follow created");
            self.ctx.dispatch(pushes);
        }
        Ok(created)
    }

    async fn try_follow(
        &self,
        user_id: Uuid,
        target_id: Uuid,
    ) -> ServiceResult<(bool, Vec<PushRequest>)> {
        let mut uow = self.ctx.begin();
        let mut target: User = uow.require(target_id, "User").await?;
        let mut user: User = uow.require(user_id, "User").await?;
        if user.is_following(target_id) {
            return Ok((false, Vec::new()));
        }

        user.following.push(target_id);
        if !target.followers.contains(&user_id) {
            target.followers.push(user_id);
        }

        // Creation times never change; the two user records guard the lists.
        let current: Vec<Post> = uow.peek_many(&user.timeline).await?;
        let theirs: Vec<Post> = uow.peek_many(&target.posts).await?;
        user.timeline = merge_newest_first(&current, &theirs);

        uow.put(user.clone());
        uow.put(target);
        self.fanout
            .notify(&mut uow, target_id, &user, NotificationKind::Follow)
            .await?;

        let pushes = uow.commit().await?;
        Ok((true, pushes))
    }

    /// Remove a follow edge; returns true if one was removed.
    pub async fn unfollow(&self, user_id: Uuid, target_id: Uuid) -> ServiceResult<bool> {
        if user_id == target_id {
            return Err(ServiceError::Validation("Cannot unfollow yourself".to_string()));
        }

        let removed = self
            .ctx
            .transact("unfollow", move || self.try_unfollow(user_id, target_id))
            .await?;

        if removed {
            info!(follower_id = %user_id, followee_id = %target_id, "Follow removed");
        }
        Ok(removed)
    }

    async fn try_unfollow(&self, user_id: Uuid, target_id: Uuid) -> ServiceResult<bool> {
        let mut uow = self.ctx.begin();
        let mut target: User = uow.require(target_id, "User").await?;
        let mut user: User = uow.require(user_id, "User").await?;
        if !user.is_following(target_id) {
            return Ok(false);
        }

        user.following.retain(|id| *id != target_id);
        target.followers.retain(|id| *id != user_id);

        let theirs: HashSet<Uuid> = target.posts.iter().copied().collect();
        user.timeline.retain(|id| !theirs.contains(id));

        uow.put(user);
        uow.put(target);

        let notifications: Vec<Notification> = uow
            .find(RecordFilter::FollowNotification {
                recipient_id: target_id,
                actor_id: user_id,
            })
            .await?;
        for notification in notifications {
            self.fanout.retract(&mut uow, notification.id).await?;
        }

        uow.commit().await?;
        Ok(true)
    }
}
