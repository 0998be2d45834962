//! Notification fan-out.
//!
//! Every notification kind goes through the same sequence: build the record,
//! stage it, prepend its id to the recipient's inbox and, when the recipient
//! is online, queue a push on the unit of work. Retraction is the mirror
//! image and tolerates records or back-references that are already gone.

use chrono::Utc;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::models::{Interaction, Notification, NotificationKind, User};
use crate::error::ServiceResult;
use crate::push::PushRequest;
use crate::repository::UnitOfWork;

#[derive(Debug, Clone)]
pub struct NotificationFanout {
    push_title: String,
}

impl NotificationFanout {
    pub fn new(config: &Config) -> Self {
        Self {
            push_title: config.delivery.push_title.clone(),
        }
    }

    fn message_for(kind: &NotificationKind, actor: &User) -> String {
        let name = &actor.screen_name;
        match kind {
            NotificationKind::PostInteraction {
                interaction: Interaction::Like,
                ..
            } => format!("{} has liked your post", name),
            NotificationKind::PostInteraction {
                interaction: Interaction::Comment,
                ..
            } => format!("{} has commented on your post", name),
            NotificationKind::Mention {
                comment_id: None, ..
            } => format!("{} has mentioned you on their post", name),
            NotificationKind::Mention {
                comment_id: Some(_),
                ..
            } => format!("{} has mentioned you in a comment", name),
            NotificationKind::Follow => format!("{} has followed you", name),
        }
    }

    fn payload_for(kind: &NotificationKind, actor: &User) -> serde_json::Value {
        match kind {
            NotificationKind::PostInteraction {
                post_id,
                comment_id,
                ..
            }
            | NotificationKind::Mention {
                post_id,
                comment_id,
            } => json!({
                "kind": kind.as_str(),
                "post_id": post_id,
                "comment_id": comment_id,
            }),
            NotificationKind::Follow => json!({
                "kind": kind.as_str(),
                "follower_id": actor.id,
                "follower_username": actor.username,
            }),
        }
    }

    /// Create a notification for `recipient_id` inside `uow`.
    ///
    /// The recipient is read through the unit, so callers must stage their
    /// own edits to that user before calling and re-read it afterwards.
    pub async fn notify(
        &self,
        uow: &mut UnitOfWork,
        recipient_id: Uuid,
        actor: &User,
        kind: NotificationKind,
    ) -> ServiceResult<Uuid> {
        let mut recipient: User = uow.require(recipient_id, "User").await?;

        let notification = Notification {
            id: uow.new_id(),
            recipient_id,
            actor_id: actor.id,
            actor_username: actor.username.clone(),
            actor_screen_name: actor.screen_name.clone(),
            message: Self::message_for(&kind, actor),
            created_at: Utc::now(),
            kind,
        };
        let notification_id = notification.id;

        recipient.notifications.insert(0, notification_id);

        if recipient.is_online {
            if let Some(device_token) = recipient.device_token.clone() {
                uow.enqueue_push(PushRequest {
                    notification_id,
                    device_token,
                    title: self.push_title.clone(),
                    body: notification.message.clone(),
                    payload: Self::payload_for(&notification.kind, actor),
                });
            }
        }

        debug!(
            %notification_id,
            recipient_id = %recipient_id,
            kind = notification.kind.as_str(),
            "Staged notification"
        );

        uow.put(notification);
        uow.put(recipient);
        Ok(notification_id)
    }

    /// Remove a notification and its inbox entry. Returns whether a record
    /// was actually removed.
    pub async fn retract(&self, uow: &mut UnitOfWork, notification_id: Uuid) -> ServiceResult<bool> {
        let Some(notification) = uow.get::<Notification>(notification_id).await? else {
            debug!(%notification_id, "Notification already gone");
            return Ok(false);
        };

        if let Some(mut recipient) = uow.get::<User>(notification.recipient_id).await? {
            let before = recipient.notifications.len();
            recipient.notifications.retain(|id| *id != notification_id);
            if recipient.notifications.len() != before {
                uow.put(recipient);
            }
        }

        uow.delete::<Notification>(notification_id);
        Ok(true)
    }
}
