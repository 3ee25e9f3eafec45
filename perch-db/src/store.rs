use crate::client::{DbClient, DbError};
use async_trait::async_trait;
use perch_common::{
    model::{
        Id,
        post::{
            CreatePost, CreateReply, LikeMarker, Post, PostDetail, PostMarker, ReplyMarker,
            ReplyView,
        },
        user::{Account, CreateAccount, User, UserMarker, Username},
    },
    store::{ContentStore, CredentialStore, DeleteOutcome, FollowGraph, StoreError, StoreResult},
};

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::UsernameTaken(username) => StoreError::UsernameTaken(username),
            other => StoreError::backend(other),
        }
    }
}

#[async_trait]
impl CredentialStore for DbClient {
    async fn find_by_username(&self, username: &Username) -> StoreResult<Option<Account>> {
        Ok(self.fetch_account_by_username(username).await?)
    }

    async fn create_account(&self, account: &CreateAccount) -> StoreResult<Id<UserMarker>> {
        Ok(self.insert_account(account).await?)
    }
}

#[async_trait]
impl FollowGraph for DbClient {
    async fn is_following(
        &self,
        viewer: Id<UserMarker>,
        target: Id<UserMarker>,
    ) -> StoreResult<bool> {
        Ok(self.fetch_is_following(viewer, target).await?)
    }

    async fn list_followed(&self, viewer: Id<UserMarker>) -> StoreResult<Vec<User>> {
        Ok(self.fetch_followed(viewer).await?)
    }

    async fn list_followers(&self, viewer: Id<UserMarker>) -> StoreResult<Vec<User>> {
        Ok(self.fetch_followers(viewer).await?)
    }
}

#[async_trait]
impl ContentStore for DbClient {
    async fn create_post(&self, post: &CreatePost) -> StoreResult<Id<PostMarker>> {
        Ok(self.insert_post(post).await?)
    }

    async fn delete_post(
        &self,
        post: Id<PostMarker>,
        requester: Id<UserMarker>,
    ) -> StoreResult<DeleteOutcome> {
        Ok(self.delete_authored_post(post, requester).await?)
    }

    async fn create_like(
        &self,
        post: Id<PostMarker>,
        author: Id<UserMarker>,
    ) -> StoreResult<Id<LikeMarker>> {
        Ok(self.insert_like(post, author).await?)
    }

    async fn create_reply(&self, reply: &CreateReply) -> StoreResult<Id<ReplyMarker>> {
        Ok(self.insert_reply(reply).await?)
    }

    async fn get_post(&self, post: Id<PostMarker>) -> StoreResult<Option<Post>> {
        Ok(self.fetch_post(post).await?)
    }

    async fn get_post_with_counts(&self, post: Id<PostMarker>) -> StoreResult<Option<PostDetail>> {
        Ok(self.fetch_post_detail(post).await?)
    }

    async fn list_liker_names(&self, post: Id<PostMarker>) -> StoreResult<Vec<Username>> {
        Ok(self.fetch_liker_names(post).await?)
    }

    async fn list_replies(&self, post: Id<PostMarker>) -> StoreResult<Vec<ReplyView>> {
        Ok(self.fetch_replies(post).await?)
    }

    async fn list_own_posts(&self, author: Id<UserMarker>) -> StoreResult<Vec<PostDetail>> {
        Ok(self.fetch_posts_by_author(author).await?)
    }

    async fn recent_posts_by_authors(
        &self,
        authors: &[Id<UserMarker>],
        limit: usize,
    ) -> StoreResult<Vec<Post>> {
        Ok(self.fetch_recent_posts_by_authors(authors, limit).await?)
    }
}
