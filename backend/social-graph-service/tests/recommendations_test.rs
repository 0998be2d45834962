//! Integration Tests: Recommendation Engine
//!
//! Coverage:
//! - Pages within one session never repeat a post
//! - Offset 0 starts a new session
//! - Posts tagged like the user's liked posts come first
//! - The user's own posts are never used to top up a page
//! - Invalid ranges fail before anything is touched

mod common;

use std::collections::HashSet;

use common::Harness;
use social_graph_service::api::PageRequest;
use social_graph_service::domain::views::{PostView, UserSession};
use social_graph_service::ServiceError;
use uuid::Uuid;

fn page(session: &UserSession, start: i64, end: i64) -> PageRequest {
    PageRequest {
        user_id: session.user_id,
        session_token: session.session_token.clone(),
        start,
        end,
    }
}

async fn recommend(h: &Harness, session: &UserSession, start: i64, end: i64) -> Vec<PostView> {
    h.api
        .post_recommendations(page(session, start, end))
        .await
        .expect("recommendations failed")
}

#[tokio::test]
async fn test_session_pages_never_repeat() {
    let h = Harness::new();
    let author = h.signup("author").await;
    let viewer = h.signup("viewer").await;
    for i in 0..10 {
        h.create_post(&author, &format!("post {}", i)).await;
    }

    let mut seen = HashSet::new();
    let mut total = 0;
    for start in (0..12).step_by(3) {
        let views = recommend(&h, &viewer, start, start + 3).await;
        total += views.len();
        for view in views {
            assert!(seen.insert(view.id), "post {} served twice", view.id);
            assert_eq!(view.username, "author");
        }
    }
    assert_eq!(total, 10);
    assert_eq!(h.user(viewer.user_id).await.recommended_posts.len(), 10);

    // Exhausted session yields nothing more
    assert!(recommend(&h, &viewer, 12, 15).await.is_empty());
}

#[tokio::test]
async fn test_offset_zero_resets_session() {
    let h = Harness::new();
    let author = h.signup("author").await;
    let viewer = h.signup("viewer").await;
    for i in 0..4 {
        h.create_post(&author, &format!("post {}", i)).await;
    }

    assert_eq!(recommend(&h, &viewer, 0, 4).await.len(), 4);
    assert!(recommend(&h, &viewer, 4, 8).await.is_empty());
    assert_eq!(recommend(&h, &viewer, 0, 2).await.len(), 2);
    assert_eq!(h.user(viewer.user_id).await.recommended_posts.len(), 2);
}

#[tokio::test]
async fn test_liked_hashtags_lead_the_page() {
    let h = Harness::new();
    let author = h.signup("author").await;
    let other = h.signup("other").await;
    let viewer = h.signup("viewer").await;

    let mut tagged = HashSet::new();
    for i in 0..3 {
        tagged.insert(h.create_post(&other, &format!("#sun {}", i)).await.id);
    }
    for i in 0..6 {
        h.create_post(&author, &format!("plain {}", i)).await;
    }
    let liked = *tagged.iter().next().unwrap();
    h.like(&viewer, liked).await;

    let first: HashSet<Uuid> = recommend(&h, &viewer, 0, 3)
        .await
        .into_iter()
        .map(|v| v.id)
        .collect();
    assert_eq!(first, tagged);

    let second = recommend(&h, &viewer, 3, 9).await;
    assert_eq!(second.len(), 6);
    assert!(second.iter().all(|v| !tagged.contains(&v.id)));
}

#[tokio::test]
async fn test_own_posts_do_not_top_up() {
    let h = Harness::new();
    let viewer = h.signup("viewer").await;
    let author = h.signup("author").await;
    for i in 0..3 {
        h.create_post(&viewer, &format!("mine {}", i)).await;
    }
    let theirs = h.create_post(&author, "theirs").await;

    let views = recommend(&h, &viewer, 0, 10).await;
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].id, theirs.id);
}

#[tokio::test]
async fn test_invalid_range_mutates_nothing() {
    let h = Harness::new();
    let author = h.signup("author").await;
    let viewer = h.signup("viewer").await;
    h.create_post(&author, "one").await;
    recommend(&h, &viewer, 0, 1).await;
    let before = h.user(viewer.user_id).await.recommended_posts;

    let result = h.api.post_recommendations(page(&viewer, 5, 2)).await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
    let result = h.api.post_recommendations(page(&viewer, -1, 2)).await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));

    assert_eq!(h.user(viewer.user_id).await.recommended_posts, before);
}

#[tokio::test]
async fn test_invalid_range_checked_before_session() {
    let h = Harness::new();
    let viewer = h.signup("viewer").await;
    let mut request = page(&viewer, 5, 2);
    request.session_token = "stale".to_string();

    let result = h.api.post_recommendations(request).await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
}
