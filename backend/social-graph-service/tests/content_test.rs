//! Integration Tests: Content Lifecycle - posts, likes, comments
//!
//! Coverage:
//! - New posts lead the author's and every follower's timeline
//! - Hashtag indexing and mention notifications on create
//! - delete_post removes every trace of the post and its comments
//! - Likes are unique; like notifications are retracted on unlike
//! - Comment notifications for mentions and the post owner, and their
//!   retraction when the comment is deleted
//! - Validation failures leave nothing behind

mod common;

use common::{post_action, Harness};
use social_graph_service::api::{AddCommentRequest, CreatePostRequest, DeleteCommentRequest};
use social_graph_service::domain::models::{Interaction, NotificationKind};
use social_graph_service::domain::views::{CommentView, UserSession};
use social_graph_service::ServiceError;
use uuid::Uuid;

async fn comment(h: &Harness, session: &UserSession, post_id: Uuid, text: &str) -> CommentView {
    h.api
        .add_comment(AddCommentRequest {
            user_id: session.user_id,
            session_token: session.session_token.clone(),
            post_id,
            text: text.to_string(),
        })
        .await
        .expect("add_comment failed")
}

fn delete_comment_request(session: &UserSession, comment_id: Uuid) -> DeleteCommentRequest {
    DeleteCommentRequest {
        user_id: session.user_id,
        session_token: session.session_token.clone(),
        comment_id,
    }
}

// ========== Posts ==========

#[tokio::test]
async fn test_new_post_leads_every_follower_timeline() {
    let h = Harness::new();
    let author = h.signup("author").await;
    let f1 = h.signup("fan_one").await;
    let f2 = h.signup("fan_two").await;
    h.follow(&f1, &author).await;
    h.follow(&f2, &author).await;
    h.create_post(&f1, "older post of a follower").await;

    let post = h.create_post(&author, "fresh").await;

    assert_eq!(h.user(author.user_id).await.posts[0], post.id);
    assert_eq!(h.user(author.user_id).await.timeline[0], post.id);
    assert_eq!(h.user(f1.user_id).await.timeline[0], post.id);
    assert_eq!(h.user(f2.user_id).await.timeline[0], post.id);
}

#[tokio::test]
async fn test_hashtag_and_mention_scenario() {
    let h = Harness::new();
    let a = h.signup("Alice").await;
    let b = h.signup("Bob").await;

    let post = h.create_post(&a, "hello #sun @Bob").await;
    h.settle_pushes().await;

    let bob = h.user(b.user_id).await;
    assert_eq!(bob.notifications.len(), 1);
    let notification = h.notification(bob.notifications[0]).await.unwrap();
    assert_eq!(
        notification.kind,
        NotificationKind::Mention {
            post_id: post.id,
            comment_id: None
        }
    );
    assert_eq!(notification.message, "Alice Screen has mentioned you on their post");

    let sun = h.hashtag("sun").await.expect("hashtag indexed");
    assert_eq!(sun.post_ids, vec![post.id]);
    assert_eq!(h.user(a.user_id).await.timeline, vec![post.id]);

    let by_tag = h.api.posts_by_hashtag("#SUN").await.unwrap();
    assert_eq!(by_tag.len(), 1);
    assert_eq!(by_tag[0].id, post.id);

    let sent = h.push.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].device_token, "device-bob");
    assert_eq!(sent[0].payload["post_id"], post.id.to_string());
}

#[tokio::test]
async fn test_repeated_mentions_and_self_mention_notify_once() {
    let h = Harness::new();
    let a = h.signup("alice").await;
    let b = h.signup("bob").await;

    h.create_post(&a, "@bob @BOB @alice @nobody #x #X").await;

    assert_eq!(h.user(b.user_id).await.notifications.len(), 1);
    assert!(h.user(a.user_id).await.notifications.is_empty());
    assert_eq!(h.hashtag("x").await.unwrap().post_ids.len(), 1);
}

#[tokio::test]
async fn test_existing_hashtag_is_reused() {
    let h = Harness::new();
    let a = h.signup("alice").await;

    let first = h.create_post(&a, "#sun one").await;
    let second = h.create_post(&a, "#Sun two").await;

    assert_eq!(h.hashtag("sun").await.unwrap().post_ids, vec![second.id, first.id]);
    assert_eq!(first.hashtags, second.hashtags);
}

#[tokio::test]
async fn test_empty_image_is_rejected() {
    let h = Harness::new();
    let a = h.signup("alice").await;

    let result = h
        .api
        .create_post(CreatePostRequest {
            user_id: a.user_id,
            session_token: a.session_token.clone(),
            image: Vec::new(),
            description: Some("#sun".to_string()),
        })
        .await;

    assert!(matches!(result, Err(ServiceError::Validation(_))));
    assert!(h.media.is_empty());
    assert!(h.hashtag("sun").await.is_none());
}

#[tokio::test]
async fn test_failed_create_removes_stored_image() {
    let h = Harness::new();
    let a = h.signup("alice").await;

    h.store.inject_conflicts(100);
    let result = h
        .api
        .create_post(CreatePostRequest {
            user_id: a.user_id,
            session_token: a.session_token.clone(),
            image: vec![1, 2, 3],
            description: None,
        })
        .await;
    h.store.inject_conflicts(0);

    assert!(result.unwrap_err().is_retryable());
    assert!(h.media.is_empty());
    assert!(h.user(a.user_id).await.posts.is_empty());
}

#[tokio::test]
async fn test_delete_post_removes_every_trace() {
    let h = Harness::new();
    let author = h.signup("author").await;
    let fan = h.signup("fan").await;
    let other = h.signup("other").await;
    h.follow(&fan, &author).await;

    let post = h.create_post(&author, "look #sun @other").await;
    h.like(&fan, post.id).await;
    let c = comment(&h, &fan, post.id, "nice @other").await;
    // follow + like + comment
    assert_eq!(h.user(author.user_id).await.notifications.len(), 3);
    assert_eq!(h.user(other.user_id).await.notifications.len(), 2);

    let image_blobs = h.media.len();
    assert!(h.api.delete_post(post_action(&author, post.id)).await.unwrap());

    assert!(h.post(post.id).await.is_none());
    assert!(h.comment(c.id).await.is_none());

    let author_after = h.user(author.user_id).await;
    assert!(author_after.posts.is_empty());
    assert!(author_after.timeline.is_empty());
    assert_eq!(author_after.notifications.len(), 1);
    let remaining = h.notification(author_after.notifications[0]).await.unwrap();
    assert_eq!(remaining.kind, NotificationKind::Follow);

    let fan_after = h.user(fan.user_id).await;
    assert!(fan_after.timeline.is_empty());
    assert!(fan_after.likes.is_empty());
    assert!(fan_after.comments.is_empty());

    assert!(h.user(other.user_id).await.notifications.is_empty());
    assert!(h.hashtag("sun").await.unwrap().post_ids.is_empty());
    assert!(h.api.search_hashtags("sun").await.unwrap().is_empty());
    assert_eq!(h.media.len(), image_blobs - 1);
}

#[tokio::test]
async fn test_delete_post_by_non_author_is_not_found() {
    let h = Harness::new();
    let author = h.signup("author").await;
    let intruder = h.signup("intruder").await;
    let post = h.create_post(&author, "mine").await;

    let result = h.api.delete_post(post_action(&intruder, post.id)).await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
    assert!(h.post(post.id).await.is_some());

    let result = h.api.delete_post(post_action(&author, Uuid::new_v4())).await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

// ========== Likes ==========

#[tokio::test]
async fn test_like_twice_is_idempotent() {
    let h = Harness::new();
    let author = h.signup("author").await;
    let fan = h.signup("fan").await;
    let post = h.create_post(&author, "#sun #sea").await;

    assert!(h.like(&fan, post.id).await);
    assert!(!h.like(&fan, post.id).await);

    let stored = h.post(post.id).await.unwrap();
    assert_eq!(stored.likes.len(), 1);
    assert_eq!(stored.likes[0].user_id, fan.user_id);
    assert_eq!(h.user(fan.user_id).await.likes, vec![post.id]);
    assert_eq!(h.user(fan.user_id).await.recommended_hashtags, stored.hashtags);
    assert_eq!(h.user(author.user_id).await.notifications.len(), 1);
}

#[tokio::test]
async fn test_like_notification_round_trip() {
    let h = Harness::new();
    let author = h.signup("author").await;
    let fan = h.signup("fan").await;
    let post = h.create_post(&author, "pic").await;

    h.like(&fan, post.id).await;
    let stored = h.post(post.id).await.unwrap();
    let notification_id = stored.likes[0].notification_id.expect("like notified");
    let notification = h.notification(notification_id).await.unwrap();
    assert_eq!(
        notification.kind,
        NotificationKind::PostInteraction {
            post_id: post.id,
            comment_id: None,
            interaction: Interaction::Like,
        }
    );
    assert_eq!(notification.message, "fan Screen has liked your post");

    assert!(h.api.unlike_post(post_action(&fan, post.id)).await.unwrap());
    assert!(!h.api.unlike_post(post_action(&fan, post.id)).await.unwrap());

    assert!(h.notification(notification_id).await.is_none());
    assert!(h.user(author.user_id).await.notifications.is_empty());
    assert!(h.user(fan.user_id).await.likes.is_empty());
    assert!(h.post(post.id).await.unwrap().likes.is_empty());
}

#[tokio::test]
async fn test_self_like_does_not_notify() {
    let h = Harness::new();
    let author = h.signup("author").await;
    let post = h.create_post(&author, "me").await;

    assert!(h.like(&author, post.id).await);
    assert!(h.post(post.id).await.unwrap().likes[0].notification_id.is_none());
    assert!(h.user(author.user_id).await.notifications.is_empty());
}

#[tokio::test]
async fn test_like_unknown_post_is_not_found() {
    let h = Harness::new();
    let fan = h.signup("fan").await;
    let result = h.api.like_post(post_action(&fan, Uuid::new_v4())).await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

// ========== Comments ==========

#[tokio::test]
async fn test_comment_notifies_owner_and_mentions() {
    let h = Harness::new();
    let owner = h.signup("owner").await;
    let commenter = h.signup("commenter").await;
    let friend = h.signup("friend").await;
    let post = h.create_post(&owner, "pic").await;

    let view = comment(&h, &commenter, post.id, "  @friend @owner @commenter look  ").await;
    assert_eq!(view.text, "@friend @owner @commenter look");
    assert_eq!(view.username, "commenter");

    let stored = h.comment(view.id).await.unwrap();
    assert_eq!(stored.notification_ids.len(), 2);
    assert_eq!(h.post(post.id).await.unwrap().comments, vec![view.id]);
    assert_eq!(h.user(commenter.user_id).await.comments, vec![view.id]);

    let owner_inbox = h.user(owner.user_id).await.notifications;
    assert_eq!(owner_inbox.len(), 1);
    let owner_note = h.notification(owner_inbox[0]).await.unwrap();
    assert_eq!(owner_note.message, "commenter Screen has commented on your post");

    let friend_inbox = h.user(friend.user_id).await.notifications;
    let friend_note = h.notification(friend_inbox[0]).await.unwrap();
    assert_eq!(friend_note.message, "commenter Screen has mentioned you in a comment");
    assert!(h.user(commenter.user_id).await.notifications.is_empty());
}

#[tokio::test]
async fn test_blank_comment_is_rejected() {
    let h = Harness::new();
    let owner = h.signup("owner").await;
    let post = h.create_post(&owner, "pic").await;

    let result = h
        .api
        .add_comment(AddCommentRequest {
            user_id: owner.user_id,
            session_token: owner.session_token.clone(),
            post_id: post.id,
            text: "   ".to_string(),
        })
        .await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
    assert!(h.post(post.id).await.unwrap().comments.is_empty());
}

#[tokio::test]
async fn test_delete_comment_only_by_author() {
    let h = Harness::new();
    let owner = h.signup("owner").await;
    let commenter = h.signup("commenter").await;
    let post = h.create_post(&owner, "pic").await;
    let view = comment(&h, &commenter, post.id, "hi").await;

    let denied = h
        .api
        .delete_comment(delete_comment_request(&owner, view.id))
        .await
        .unwrap();
    assert!(!denied);
    assert!(h.comment(view.id).await.is_some());

    let deleted = h
        .api
        .delete_comment(delete_comment_request(&commenter, view.id))
        .await
        .unwrap();
    assert!(deleted);
    assert!(h.comment(view.id).await.is_none());
    assert!(h.post(post.id).await.unwrap().comments.is_empty());
    assert!(h.user(commenter.user_id).await.comments.is_empty());
    assert!(h.user(owner.user_id).await.notifications.is_empty());

    let missing = h
        .api
        .delete_comment(delete_comment_request(&commenter, view.id))
        .await;
    assert!(matches!(missing, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn test_delete_comment_retracts_mention_and_owner_notifications() {
    let h = Harness::new();
    let owner = h.signup("owner").await;
    let commenter = h.signup("commenter").await;
    let friend = h.signup("friend").await;
    let post = h.create_post(&owner, "pic").await;

    let view = comment(&h, &commenter, post.id, "@friend nice").await;
    let notification_ids = h.comment(view.id).await.unwrap().notification_ids;
    assert_eq!(notification_ids.len(), 2);
    assert_eq!(h.user(friend.user_id).await.notifications.len(), 1);
    assert_eq!(h.user(owner.user_id).await.notifications.len(), 1);

    assert!(h
        .api
        .delete_comment(delete_comment_request(&commenter, view.id))
        .await
        .unwrap());

    assert!(h.user(friend.user_id).await.notifications.is_empty());
    assert!(h.user(owner.user_id).await.notifications.is_empty());
    for id in notification_ids {
        assert!(h.notification(id).await.is_none());
    }
}
