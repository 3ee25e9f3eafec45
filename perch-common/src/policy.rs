//! Who may read, engage with, or delete a post.
//!
//! Viewing is granted to the author and to followers of the author.
//! Engaging (liking or replying) is granted to followers of the author only:
//! authorship alone does not allow it, so an author cannot like or reply to
//! their own post unless they follow themselves, which the follow graph never
//! allows. This asymmetry is deliberate and part of the public behaviour.
//! Deleting is granted to the author only.

use crate::{
    model::{Id, post::Post, user::UserMarker},
    store::{FollowGraph, StoreResult},
};

/// The facts about a viewer and a post's author that every decision depends on.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct Relationship {
    pub viewer: Id<UserMarker>,
    pub author: Id<UserMarker>,
    pub viewer_follows_author: bool,
}

impl Relationship {
    #[must_use]
    pub fn is_author(self) -> bool {
        self.viewer == self.author
    }

    #[must_use]
    pub fn can_view(self) -> bool {
        self.is_author() || self.viewer_follows_author
    }

    #[must_use]
    pub fn can_engage(self) -> bool {
        self.viewer_follows_author
    }

    #[must_use]
    pub fn can_delete(self) -> bool {
        self.is_author()
    }
}

#[derive(Copy, Clone)]
pub struct AccessPolicy<'a> {
    graph: &'a dyn FollowGraph,
}

impl<'a> AccessPolicy<'a> {
    #[must_use]
    pub fn new(graph: &'a dyn FollowGraph) -> Self {
        Self { graph }
    }

    /// One follow-graph lookup.
    pub async fn relationship(
        &self,
        viewer: Id<UserMarker>,
        post: &Post,
    ) -> StoreResult<Relationship> {
        let viewer_follows_author = self.graph.is_following(viewer, post.author).await?;

        Ok(Relationship {
            viewer,
            author: post.author,
            viewer_follows_author,
        })
    }

    pub async fn can_view(&self, viewer: Id<UserMarker>, post: &Post) -> StoreResult<bool> {
        if viewer == post.author {
            return Ok(true);
        }

        Ok(self.relationship(viewer, post).await?.can_view())
    }

    pub async fn can_engage(&self, viewer: Id<UserMarker>, post: &Post) -> StoreResult<bool> {
        Ok(self.relationship(viewer, post).await?.can_engage())
    }

    #[must_use]
    pub fn can_delete(&self, viewer: Id<UserMarker>, post: &Post) -> bool {
        Relationship {
            viewer,
            author: post.author,
            viewer_follows_author: false,
        }
        .can_delete()
    }
}
