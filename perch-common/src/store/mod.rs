//! Storage contracts consumed by the access policy, the feed and [`crate::social::Social`].
//!
//! Every call resolves to exactly one `Result`. Reads return empty or `None`
//! instead of failing when nothing matches.

#[cfg(any(test, feature = "memory"))]
pub mod memory;

use crate::model::{
    Id,
    post::{
        CreatePost, CreateReply, LikeMarker, Post, PostDetail, PostMarker, ReplyMarker, ReplyView,
    },
    user::{Account, CreateAccount, DisplayName, User, UserMarker, Username},
};
use async_trait::async_trait;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Username {0} is already taken")]
    UsernameTaken(Username),
    #[error("Storage backend failed: {0}")]
    Backend(#[source] BoxedError),
}

impl StoreError {
    pub fn backend(err: impl Into<BoxedError>) -> Self {
        Self::Backend(err.into())
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum DeleteOutcome {
    Deleted,
    /// No post with that id is authored by the requester.
    Forbidden,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &Username) -> StoreResult<Option<Account>>;

    /// Fails with [`StoreError::UsernameTaken`] when the username exists.
    async fn create_account(&self, account: &CreateAccount) -> StoreResult<Id<UserMarker>>;
}

/// Directed "follower -> followed" edges. Lists are ordered by username.
#[async_trait]
pub trait FollowGraph: Send + Sync {
    async fn is_following(
        &self,
        viewer: Id<UserMarker>,
        target: Id<UserMarker>,
    ) -> StoreResult<bool>;

    async fn list_followed(&self, viewer: Id<UserMarker>) -> StoreResult<Vec<User>>;

    async fn list_followers(&self, viewer: Id<UserMarker>) -> StoreResult<Vec<User>>;

    async fn list_followed_names(&self, viewer: Id<UserMarker>) -> StoreResult<Vec<DisplayName>> {
        let followed = self.list_followed(viewer).await?;
        Ok(followed.into_iter().map(|user| user.name).collect())
    }

    async fn list_follower_names(&self, viewer: Id<UserMarker>) -> StoreResult<Vec<DisplayName>> {
        let followers = self.list_followers(viewer).await?;
        Ok(followers.into_iter().map(|user| user.name).collect())
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn create_post(&self, post: &CreatePost) -> StoreResult<Id<PostMarker>>;

    /// Removes the post only if `requester` authored it, in one conditional operation.
    async fn delete_post(
        &self,
        post: Id<PostMarker>,
        requester: Id<UserMarker>,
    ) -> StoreResult<DeleteOutcome>;

    async fn create_like(
        &self,
        post: Id<PostMarker>,
        author: Id<UserMarker>,
    ) -> StoreResult<Id<LikeMarker>>;

    async fn create_reply(&self, reply: &CreateReply) -> StoreResult<Id<ReplyMarker>>;

    async fn get_post(&self, post: Id<PostMarker>) -> StoreResult<Option<Post>>;

    async fn get_post_with_counts(&self, post: Id<PostMarker>) -> StoreResult<Option<PostDetail>>;

    /// Usernames of the likers, in like order.
    async fn list_liker_names(&self, post: Id<PostMarker>) -> StoreResult<Vec<Username>>;

    /// Replies in the order they were made.
    async fn list_replies(&self, post: Id<PostMarker>) -> StoreResult<Vec<ReplyView>>;

    /// The author's posts, newest first.
    async fn list_own_posts(&self, author: Id<UserMarker>) -> StoreResult<Vec<PostDetail>>;

    /// Candidate posts for a feed: at least the `limit` newest posts by any of
    /// `authors`, in no particular order.
    async fn recent_posts_by_authors(
        &self,
        authors: &[Id<UserMarker>],
        limit: usize,
    ) -> StoreResult<Vec<Post>>;
}
