//! Ordering helpers for timelines and recommendations.

use rand::Rng;
use std::borrow::Cow;
use std::collections::HashSet;
use uuid::Uuid;

use crate::domain::models::Post;

pub fn is_newest_first(posts: &[Post]) -> bool {
    posts.windows(2).all(|w| w[0].created_at >= w[1].created_at)
}

/// Stable newest-first sort: creation time descending, ties keep their
/// relative order
pub fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

fn newest_first(posts: &[Post]) -> Cow<'_, [Post]> {
    if is_newest_first(posts) {
        Cow::Borrowed(posts)
    } else {
        let mut sorted = posts.to_vec();
        sort_newest_first(&mut sorted);
        Cow::Owned(sorted)
    }
}

/// Merge two newest-first post sequences into one newest-first id list.
///
/// O(n) merge; on equal timestamps the entry from `left` comes first. An id
/// present in both inputs is emitted once. Inputs that are not already
/// ordered are stably sorted first.
pub fn merge_newest_first(left: &[Post], right: &[Post]) -> Vec<Uuid> {
    let left = newest_first(left);
    let right = newest_first(right);

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut seen = HashSet::with_capacity(left.len() + right.len());
    let (mut i, mut j) = (0, 0);

    while i < left.len() || j < right.len() {
        let take_left = match (left.get(i), right.get(j)) {
            (Some(l), Some(r)) => l.created_at >= r.created_at,
            (Some(_), None) => true,
            _ => false,
        };
        let next = if take_left {
            i += 1;
            &left[i - 1]
        } else {
            j += 1;
            &right[j - 1]
        };
        if seen.insert(next.id) {
            merged.push(next.id);
        }
    }

    merged
}

/// Shuffle in place using the thread-local RNG
pub fn shuffle<T>(items: &mut [T]) {
    shuffle_with(items, &mut rand::thread_rng());
}

/// Fisher–Yates shuffle.
///
/// The partner for index `i` is drawn from `[0, i]` inclusive, which gives
/// every permutation equal probability. Drawing from `[0, i)` instead only
/// ever yields cyclic permutations, so no element can stay where it was.
pub fn shuffle_with<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}
