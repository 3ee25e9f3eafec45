use crate::{
    model::{
        Id,
        post::{FeedEntry, Post, PostMarker},
        user::{UserMarker, Username},
    },
    store::{ContentStore, FollowGraph, StoreResult},
};
use std::{
    cmp::{Ordering, Reverse},
    collections::{BinaryHeap, HashMap},
};
use time::UtcDateTime;
use tracing::debug;

pub const DEFAULT_FEED_LIMIT: usize = 4;

/// Builds a viewer's timeline from the posts of the accounts they follow.
///
/// Entries are ordered newest first; posts with equal timestamps are ordered
/// by id, higher first. The viewer's own posts never appear.
#[derive(Copy, Clone)]
pub struct FeedAssembler<'a> {
    graph: &'a dyn FollowGraph,
    content: &'a dyn ContentStore,
}

impl<'a> FeedAssembler<'a> {
    #[must_use]
    pub fn new(graph: &'a dyn FollowGraph, content: &'a dyn ContentStore) -> Self {
        Self { graph, content }
    }

    pub async fn build_feed(
        &self,
        viewer: Id<UserMarker>,
        limit: usize,
    ) -> StoreResult<Vec<FeedEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let authors: HashMap<Id<UserMarker>, Username> = self
            .graph
            .list_followed(viewer)
            .await?
            .into_iter()
            .filter(|user| user.id != viewer)
            .map(|user| (user.id, user.username))
            .collect();

        if authors.is_empty() {
            debug!(%viewer, "Viewer follows nobody, feed is empty");
            return Ok(Vec::new());
        }

        let author_ids: Vec<Id<UserMarker>> = authors.keys().copied().collect();
        let candidates = self
            .content
            .recent_posts_by_authors(&author_ids, limit)
            .await?
            .into_iter()
            .filter(|post| authors.contains_key(&post.author));

        let entries = newest(candidates, limit)
            .into_iter()
            .filter_map(|post| {
                let author_username = authors.get(&post.author)?.clone();
                Some(FeedEntry {
                    content: post.content,
                    author_username,
                    created_at: post.created_at,
                })
            })
            .collect();

        Ok(entries)
    }
}

/// Orders posts by recency: later timestamp first, then higher id.
struct Recency(Post);

impl Recency {
    fn key(&self) -> (UtcDateTime, Id<PostMarker>) {
        (self.0.created_at, self.0.id)
    }
}

impl PartialEq for Recency {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Recency {}

impl PartialOrd for Recency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Recency {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// The `limit` most recent posts, newest first, in `O(n log limit)`.
///
/// Memory is bounded by the number of posts, whatever `limit` is.
fn newest(posts: impl IntoIterator<Item = Post>, limit: usize) -> Vec<Post> {
    // Min-heap on recency: the top is the oldest post kept so far.
    let mut kept = BinaryHeap::new();
    for post in posts {
        kept.push(Reverse(Recency(post)));
        if kept.len() > limit {
            kept.pop();
        }
    }

    kept.into_sorted_vec()
        .into_iter()
        .map(|Reverse(Recency(post))| post)
        .collect()
}
