//! Paginated post recommendations.
//!
//! A page is drawn first from posts carrying hashtags the user recently
//! liked, then topped up with other users' posts. Everything served since the
//! last page starting at offset 0 is remembered on the user record so a
//! session never sees the same post twice.
//!
//! Only the viewer's own record is version-checked at commit. Candidate
//! posts, hashtags and authors are peeked, so likes and comments landing
//! elsewhere do not invalidate a page.

use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use super::ordering::shuffle;
use super::paging::PageRange;
use crate::context::ServiceContext;
use crate::domain::models::{Hashtag, Post, User};
use crate::domain::views::PostView;
use crate::error::ServiceResult;
use crate::repository::{RecordFilter, UnitOfWork};

fn unique(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[derive(Clone)]
pub struct RecommendationService {
    ctx: ServiceContext,
}

impl RecommendationService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn post_recommendations(
        &self,
        user_id: Uuid,
        range: PageRange,
    ) -> ServiceResult<Vec<PostView>> {
        self.ctx
            .transact("post_recommendations", move || self.try_page(user_id, range))
            .await
    }

    async fn hashtag_candidates(
        uow: &UnitOfWork,
        user: &User,
        shown: &HashSet<Uuid>,
        wanted: usize,
    ) -> ServiceResult<Vec<Post>> {
        let mut tags = unique(&user.recommended_hashtags);
        shuffle(&mut tags);

        let mut pool = Vec::new();
        for hashtag in uow.peek_many::<Hashtag>(&tags).await? {
            pool.extend(hashtag.post_ids);
        }
        let mut pool = unique(&pool);
        shuffle(&mut pool);

        let mut picked = Vec::new();
        for post_id in pool {
            if picked.len() >= wanted {
                break;
            }
            if shown.contains(&post_id) {
                continue;
            }
            if let Some(post) = uow.peek::<Post>(post_id).await? {
                picked.push(post);
            }
        }
        Ok(picked)
    }

    async fn try_page(&self, user_id: Uuid, range: PageRange) -> ServiceResult<Vec<PostView>> {
        let mut uow = self.ctx.begin();
        let mut user: User = uow.require(user_id, "User").await?;

        if range.start == 0 {
            user.recommended_posts.clear();
        }
        let mut shown: HashSet<Uuid> = user.recommended_posts.iter().copied().collect();
        let wanted = range.len();

        let mut page = if user.recommended_hashtags.is_empty() {
            Vec::new()
        } else {
            Self::hashtag_candidates(&uow, &user, &shown, wanted).await?
        };
        shown.extend(page.iter().map(|p| p.id));

        if page.len() < wanted {
            let mut others: Vec<Post> = uow
                .find_untracked::<Post>(RecordFilter::PostsNotAuthoredBy(user_id))
                .await?
                .into_iter()
                .filter(|p| !shown.contains(&p.id))
                .collect();
            shuffle(&mut others);
            others.truncate(wanted - page.len());
            page.extend(others);
        }

        user.recommended_posts.extend(page.iter().map(|p| p.id));

        let prefix = self.ctx.media_prefix().to_string();
        let mut views = Vec::with_capacity(page.len());
        for post in &page {
            if post.author_id == user_id {
                views.push(PostView::new(post, &user, &prefix));
            } else if let Some(author) = uow.peek::<User>(post.author_id).await? {
                views.push(PostView::new(post, &author, &prefix));
            }
        }

        debug!(
            user_id = %user_id,
            start = range.start,
            served = views.len(),
            "Recommendations served"
        );
        uow.put(user);
        uow.commit().await?;
        Ok(views)
    }
}
