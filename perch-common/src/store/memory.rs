use crate::{
    model::{
        Id, PerchSnowflakeGenerator,
        post::{
            CreatePost, CreateReply, LikeMarker, Post, PostContent, PostDetail, PostMarker,
            ReplyMarker, ReplyView,
        },
        user::{Account, CreateAccount, User, UserMarker, Username},
    },
    snowflake::{ProcessId, WorkerId},
    store::{ContentStore, CredentialStore, DeleteOutcome, FollowGraph, StoreError, StoreResult},
};
use async_trait::async_trait;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use thiserror::Error;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum MemoryStoreError {
    #[error("An account cannot follow itself")]
    SelfFollow,
    #[error("Account {0} does not exist")]
    UnknownAccount(Id<UserMarker>),
    #[error("Post {0} does not exist")]
    UnknownPost(Id<PostMarker>),
}

#[derive(Clone, Debug)]
struct LikeRow {
    id: Id<LikeMarker>,
    post: Id<PostMarker>,
    author: Id<UserMarker>,
}

#[derive(Clone, Debug)]
struct ReplyRow {
    id: Id<ReplyMarker>,
    post: Id<PostMarker>,
    author: Id<UserMarker>,
    content: PostContent,
}

#[derive(Default, Debug)]
struct Tables {
    accounts: BTreeMap<Id<UserMarker>, Account>,
    /// (follower, followed)
    follows: BTreeSet<(Id<UserMarker>, Id<UserMarker>)>,
    posts: BTreeMap<Id<PostMarker>, Post>,
    likes: Vec<LikeRow>,
    replies: Vec<ReplyRow>,
}

/// All three store contracts over process memory, with the same edge policy
/// as the database schema: edges are unique and self-edges are rejected.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    snowflake_generator: Mutex<PerchSnowflakeGenerator>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::default(),
            snowflake_generator: Mutex::new(PerchSnowflakeGenerator::new(
                WorkerId::default(),
                ProcessId::default(),
            )),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id<Marker>(&self, at: UtcDateTime) -> StoreResult<Id<Marker>> {
        let snowflake = self
            .snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate_at(at)
            .map_err(StoreError::backend)?;

        Ok(Id::new(snowflake))
    }

    /// Adds the edge `follower -> followed`. Returns `false` if it already existed.
    pub fn follow(
        &self,
        follower: Id<UserMarker>,
        followed: Id<UserMarker>,
    ) -> Result<bool, MemoryStoreError> {
        if follower == followed {
            return Err(MemoryStoreError::SelfFollow);
        }

        let mut tables = self.write();
        for id in [follower, followed] {
            if !tables.accounts.contains_key(&id) {
                return Err(MemoryStoreError::UnknownAccount(id));
            }
        }

        Ok(tables.follows.insert((follower, followed)))
    }

    fn users_sorted(tables: &Tables, ids: impl Iterator<Item = Id<UserMarker>>) -> Vec<User> {
        let mut users: Vec<User> = ids
            .filter_map(|id| tables.accounts.get(&id).cloned().map(User::from))
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }

    fn detail(tables: &Tables, post: &Post) -> PostDetail {
        let like_count = tables.likes.iter().filter(|like| like.post == post.id).count();
        let reply_count = tables
            .replies
            .iter()
            .filter(|reply| reply.post == post.id)
            .count();

        PostDetail {
            post: post.clone(),
            like_count: like_count as u64,
            reply_count: reply_count as u64,
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_username(&self, username: &Username) -> StoreResult<Option<Account>> {
        let tables = self.read();
        let account = tables
            .accounts
            .values()
            .find(|account| &account.username == username)
            .cloned();

        Ok(account)
    }

    async fn create_account(&self, account: &CreateAccount) -> StoreResult<Id<UserMarker>> {
        let id = self.next_id(UtcDateTime::now())?;

        let mut tables = self.write();
        if tables
            .accounts
            .values()
            .any(|existing| existing.username == account.username)
        {
            return Err(StoreError::UsernameTaken(account.username.clone()));
        }

        tables.accounts.insert(
            id,
            Account {
                id,
                username: account.username.clone(),
                password_hash: account.password_hash.clone(),
                name: account.name.clone(),
                gender: account.gender,
            },
        );

        Ok(id)
    }
}

#[async_trait]
impl FollowGraph for MemoryStore {
    async fn is_following(
        &self,
        viewer: Id<UserMarker>,
        target: Id<UserMarker>,
    ) -> StoreResult<bool> {
        Ok(self.read().follows.contains(&(viewer, target)))
    }

    async fn list_followed(&self, viewer: Id<UserMarker>) -> StoreResult<Vec<User>> {
        let tables = self.read();
        let followed = tables
            .follows
            .iter()
            .filter(|(follower, _)| *follower == viewer)
            .map(|(_, followed)| *followed);

        Ok(Self::users_sorted(&tables, followed))
    }

    async fn list_followers(&self, viewer: Id<UserMarker>) -> StoreResult<Vec<User>> {
        let tables = self.read();
        let followers = tables
            .follows
            .iter()
            .filter(|(_, followed)| *followed == viewer)
            .map(|(follower, _)| *follower);

        Ok(Self::users_sorted(&tables, followers))
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn create_post(&self, post: &CreatePost) -> StoreResult<Id<PostMarker>> {
        let id = self.next_id(post.created_at)?;

        let mut tables = self.write();
        if !tables.accounts.contains_key(&post.author) {
            return Err(StoreError::backend(MemoryStoreError::UnknownAccount(
                post.author,
            )));
        }

        tables.posts.insert(
            id,
            Post {
                id,
                author: post.author,
                content: post.content.clone(),
                created_at: post.created_at,
            },
        );

        Ok(id)
    }

    async fn delete_post(
        &self,
        post: Id<PostMarker>,
        requester: Id<UserMarker>,
    ) -> StoreResult<DeleteOutcome> {
        let mut tables = self.write();
        if tables
            .posts
            .get(&post)
            .is_none_or(|existing| existing.author != requester)
        {
            return Ok(DeleteOutcome::Forbidden);
        }

        tables.posts.remove(&post);
        tables.likes.retain(|like| like.post != post);
        tables.replies.retain(|reply| reply.post != post);

        Ok(DeleteOutcome::Deleted)
    }

    async fn create_like(
        &self,
        post: Id<PostMarker>,
        author: Id<UserMarker>,
    ) -> StoreResult<Id<LikeMarker>> {
        let id = self.next_id(UtcDateTime::now())?;

        let mut tables = self.write();
        if !tables.posts.contains_key(&post) {
            return Err(StoreError::backend(MemoryStoreError::UnknownPost(post)));
        }
        tables.likes.push(LikeRow { id, post, author });

        Ok(id)
    }

    async fn create_reply(&self, reply: &CreateReply) -> StoreResult<Id<ReplyMarker>> {
        let id = self.next_id(UtcDateTime::now())?;

        let mut tables = self.write();
        if !tables.posts.contains_key(&reply.post) {
            return Err(StoreError::backend(MemoryStoreError::UnknownPost(
                reply.post,
            )));
        }
        tables.replies.push(ReplyRow {
            id,
            post: reply.post,
            author: reply.author,
            content: reply.content.clone(),
        });

        Ok(id)
    }

    async fn get_post(&self, post: Id<PostMarker>) -> StoreResult<Option<Post>> {
        Ok(self.read().posts.get(&post).cloned())
    }

    async fn get_post_with_counts(&self, post: Id<PostMarker>) -> StoreResult<Option<PostDetail>> {
        let tables = self.read();
        Ok(tables
            .posts
            .get(&post)
            .map(|post| Self::detail(&tables, post)))
    }

    async fn list_liker_names(&self, post: Id<PostMarker>) -> StoreResult<Vec<Username>> {
        let tables = self.read();
        let mut likes: Vec<&LikeRow> = tables
            .likes
            .iter()
            .filter(|like| like.post == post)
            .collect();
        likes.sort_by_key(|like| like.id);

        Ok(likes
            .into_iter()
            .filter_map(|like| tables.accounts.get(&like.author))
            .map(|account| account.username.clone())
            .collect())
    }

    async fn list_replies(&self, post: Id<PostMarker>) -> StoreResult<Vec<ReplyView>> {
        let tables = self.read();
        let mut replies: Vec<&ReplyRow> = tables
            .replies
            .iter()
            .filter(|reply| reply.post == post)
            .collect();
        replies.sort_by_key(|reply| reply.id);

        Ok(replies
            .into_iter()
            .filter_map(|reply| {
                let author = tables.accounts.get(&reply.author)?;
                Some(ReplyView {
                    author_name: author.name.clone(),
                    content: reply.content.clone(),
                })
            })
            .collect())
    }

    async fn list_own_posts(&self, author: Id<UserMarker>) -> StoreResult<Vec<PostDetail>> {
        let tables = self.read();
        let mut posts: Vec<&Post> = tables
            .posts
            .values()
            .filter(|post| post.author == author)
            .collect();
        posts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        Ok(posts
            .into_iter()
            .map(|post| Self::detail(&tables, post))
            .collect())
    }

    async fn recent_posts_by_authors(
        &self,
        authors: &[Id<UserMarker>],
        _limit: usize,
    ) -> StoreResult<Vec<Post>> {
        let tables = self.read();
        Ok(tables
            .posts
            .values()
            .filter(|post| authors.contains(&post.author))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        model::{
            auth::PasswordHash,
            post::{CreatePost, PostContent},
            user::{CreateAccount, DisplayName, Gender, Username},
        },
        store::{
            ContentStore, CredentialStore, DeleteOutcome, FollowGraph, StoreError,
            memory::{MemoryStore, MemoryStoreError},
        },
    };
    use time::macros::utc_datetime;

    fn account(username: &str) -> CreateAccount {
        CreateAccount {
            username: Username::new(username.to_owned()).unwrap(),
            password_hash: PasswordHash::from_stored(String::new()),
            name: DisplayName::new(username.to_uppercase()).unwrap(),
            gender: Gender::Other,
        }
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let store = MemoryStore::new();
        store.create_account(&account("ada")).await.unwrap();

        assert!(matches!(
            store.create_account(&account("ada")).await,
            Err(StoreError::UsernameTaken(_))
        ));
    }

    #[tokio::test]
    async fn follow_edges_are_unique_and_never_self_referencing() {
        let store = MemoryStore::new();
        let ada = store.create_account(&account("ada")).await.unwrap();
        let bob = store.create_account(&account("bob")).await.unwrap();

        assert_eq!(store.follow(ada, bob), Ok(true));
        assert_eq!(store.follow(ada, bob), Ok(false));
        assert_eq!(store.follow(ada, ada), Err(MemoryStoreError::SelfFollow));

        assert!(store.is_following(ada, bob).await.unwrap());
        assert!(!store.is_following(bob, ada).await.unwrap());
        assert_eq!(store.list_followers(bob).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_post_checks_ownership_and_cascades() {
        let store = MemoryStore::new();
        let ada = store.create_account(&account("ada")).await.unwrap();
        let bob = store.create_account(&account("bob")).await.unwrap();
        let post = store
            .create_post(&CreatePost {
                author: ada,
                content: PostContent::new("p1".to_owned()).unwrap(),
                created_at: utc_datetime!(2026-01-01 00:00),
            })
            .await
            .unwrap();
        store.create_like(post, bob).await.unwrap();

        assert_eq!(
            store.delete_post(post, bob).await.unwrap(),
            DeleteOutcome::Forbidden
        );
        assert_eq!(
            store.get_post_with_counts(post).await.unwrap().unwrap().like_count,
            1
        );

        assert_eq!(
            store.delete_post(post, ada).await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert!(store.get_post(post).await.unwrap().is_none());
        assert!(store.list_liker_names(post).await.unwrap().is_empty());
        assert_eq!(
            store.delete_post(post, ada).await.unwrap(),
            DeleteOutcome::Forbidden
        );
    }
}
