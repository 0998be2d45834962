//! Integration Tests: Concurrency and resilience
//!
//! Coverage:
//! - Commit conflicts are retried transparently
//! - Concurrent likes and follows resolve to the serial outcome
//! - A like racing a post deletion leaves no dangling references
//! - Recommendation pages are not invalidated by likes elsewhere
//! - Slow stores surface as timeouts

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{follow_request, post_action, Harness};
use social_graph_service::api::{CreatePostRequest, PageRequest};
use social_graph_service::domain::views::UserSession;
use social_graph_service::{Config, ServiceError};

fn patient_config() -> Config {
    let mut config = Config::default();
    config.store.max_retries = 30;
    config
}

#[tokio::test]
async fn test_injected_conflicts_are_retried() {
    let h = Harness::new();
    let author = h.signup("author").await;
    let fan = h.signup("fan").await;
    let post = h.create_post(&author, "pic").await;

    h.store.inject_conflicts(3);
    assert!(h.like(&fan, post.id).await);

    let stored = h.post(post.id).await.unwrap();
    assert_eq!(stored.likes.len(), 1);
    assert_eq!(h.user(author.user_id).await.notifications.len(), 1);
}

#[tokio::test]
async fn test_conflicts_beyond_budget_fail_cleanly() {
    let h = Harness::new();
    let author = h.signup("author").await;
    let fan = h.signup("fan").await;
    let post = h.create_post(&author, "pic").await;

    h.store.inject_conflicts(100);
    let result = h.api.like_post(post_action(&fan, post.id)).await;
    h.store.inject_conflicts(0);

    assert!(matches!(result, Err(ServiceError::Store(_))));
    assert!(h.post(post.id).await.unwrap().likes.is_empty());
    assert!(h.user(fan.user_id).await.likes.is_empty());
    assert!(h.user(author.user_id).await.notifications.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_likes_all_land() {
    let h = Harness::with_config(patient_config());
    let author = h.signup("author").await;
    let post = h.create_post(&author, "popular").await;

    let mut fans = Vec::new();
    for i in 0..6 {
        fans.push(h.signup(&format!("fan_{}", i)).await);
    }

    let handles: Vec<_> = fans
        .iter()
        .map(|fan| {
            let api = h.api.clone();
            let request = post_action(fan, post.id);
            tokio::spawn(async move { api.like_post(request).await })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().unwrap());
    }

    let stored = h.post(post.id).await.unwrap();
    assert_eq!(stored.likes.len(), fans.len());
    assert_eq!(h.user(author.user_id).await.notifications.len(), fans.len());
    for fan in &fans {
        assert_eq!(h.user(fan.user_id).await.likes, vec![post.id]);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_double_follow_counts_once() {
    let h = Harness::with_config(patient_config());
    let a = h.signup("alice").await;
    let b = h.signup("bob").await;

    let first = {
        let api = h.api.clone();
        let request = follow_request(&a, &b);
        tokio::spawn(async move { api.follow(request).await })
    };
    let second = {
        let api = h.api.clone();
        let request = follow_request(&a, &b);
        tokio::spawn(async move { api.follow(request).await })
    };

    let outcomes = [first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];
    assert_eq!(outcomes.iter().filter(|created| **created).count(), 1);
    assert_eq!(h.user(a.user_id).await.following, vec![b.user_id]);
    assert_eq!(h.user(b.user_id).await.followers, vec![a.user_id]);
    assert_eq!(h.user(b.user_id).await.notifications.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_like_racing_delete_leaves_no_dangling_references() {
    let h = Harness::with_config(patient_config());
    let author = h.signup("author").await;
    let fan = h.signup("fan").await;
    let post = h.create_post(&author, "short lived").await;

    let like = {
        let api = h.api.clone();
        let request = post_action(&fan, post.id);
        tokio::spawn(async move { api.like_post(request).await })
    };
    let delete = {
        let api = h.api.clone();
        let request = post_action(&author, post.id);
        tokio::spawn(async move { api.delete_post(request).await })
    };

    assert!(delete.await.unwrap().unwrap());
    match like.await.unwrap() {
        Ok(liked) => assert!(liked),
        Err(e) => assert!(matches!(e, ServiceError::NotFound(_))),
    }

    assert!(h.post(post.id).await.is_none());
    assert!(h.user(fan.user_id).await.likes.is_empty());
    assert!(h.user(author.user_id).await.notifications.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_recommendations_unaffected_by_concurrent_likes() {
    let h = Harness::new();
    let viewer = h.signup("viewer").await;

    // Each fan likes and unlikes their own post, so the fans never contend
    // with each other; only the viewer's page reads overlap their writes.
    let mut workers = Vec::new();
    let stop = Arc::new(AtomicBool::new(false));
    h.store.set_latency(Some(Duration::from_millis(3)));
    for i in 0..4 {
        let fan = h.signup(&format!("fan_{}", i)).await;
        let post = h.create_post(&fan, &format!("post {}", i)).await;
        let api = h.api.clone();
        let request = post_action(&fan, post.id);
        let stop = stop.clone();
        workers.push(tokio::spawn(async move {
            while !stop.load(Ordering::SeqCst) {
                assert!(api.like_post(request.clone()).await.unwrap());
                assert!(api.unlike_post(request.clone()).await.unwrap());
            }
        }));
    }

    for _ in 0..10 {
        let views = h
            .api
            .post_recommendations(PageRequest {
                user_id: viewer.user_id,
                session_token: viewer.session_token.clone(),
                start: 0,
                end: 2,
            })
            .await
            .expect("recommendation page failed");
        assert_eq!(views.len(), 2);
    }

    stop.store(true, Ordering::SeqCst);
    for worker in workers {
        worker.await.unwrap();
    }
    h.store.set_latency(None);
    assert_eq!(h.user(viewer.user_id).await.recommended_posts.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_follow_unaffected_by_likes_on_timeline_posts() {
    let h = Harness::new();
    let fan = h.signup("fan").await;
    let author = h.signup("author").await;
    let follower = h.signup("follower").await;
    let busy = h.create_post(&fan, "busy").await;
    let fresh = h.create_post(&author, "fresh").await;
    h.follow(&follower, &fan).await;

    // The fan's own likes touch only the fan and the busy post, which the
    // follower's timeline merge reads.
    let stop = Arc::new(AtomicBool::new(false));
    h.store.set_latency(Some(Duration::from_millis(3)));
    let worker = {
        let api = h.api.clone();
        let request = post_action(&fan, busy.id);
        let stop = stop.clone();
        tokio::spawn(async move {
            while !stop.load(Ordering::SeqCst) {
                assert!(api.like_post(request.clone()).await.unwrap());
                assert!(api.unlike_post(request.clone()).await.unwrap());
            }
        })
    };

    for _ in 0..5 {
        assert!(h.follow(&follower, &author).await);
        assert!(h
            .api
            .unfollow(follow_request(&follower, &author))
            .await
            .expect("unfollow failed"));
    }
    assert!(h.follow(&follower, &author).await);

    stop.store(true, Ordering::SeqCst);
    worker.await.unwrap();
    h.store.set_latency(None);
    assert_eq!(h.user(follower.user_id).await.timeline, vec![fresh.id, busy.id]);
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let mut config = Config::default();
    config.store.timeout_ms = 20;
    config.store.max_retries = 1;
    let h = Harness::with_config(config);
    let author = h.signup("author").await;

    h.store.set_latency(Some(Duration::from_millis(200)));
    let result = h.api.create_post(image_post(&author)).await;
    h.store.set_latency(None);

    assert!(matches!(result, Err(ServiceError::Timeout(_))));
    assert!(h.media.is_empty());
}

fn image_post(session: &UserSession) -> CreatePostRequest {
    CreatePostRequest {
        user_id: session.user_id,
        session_token: session.session_token.clone(),
        image: vec![1, 2, 3],
        description: None,
    }
}
