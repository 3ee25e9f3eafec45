//! The request-scoped operations, one per endpoint.

use crate::{
    feed::FeedAssembler,
    model::{
        Id,
        auth::{
            CredentialIssueError, IdentityVerifier, InvalidCredentialError, PASSWORD_MIN_LEN,
            PasswordHashError,
        },
        post::{
            CreatePost, CreateReply, FeedEntry, LikeMarker, Post, PostContent, PostDetail,
            PostMarker, ReplyMarker, ReplyView,
        },
        user::{CreateAccount, DisplayName, Login, Registration, UserMarker, Username},
    },
    policy::AccessPolicy,
    store::{ContentStore, CredentialStore, DeleteOutcome, FollowGraph, StoreError},
};
use std::sync::Arc;
use thiserror::Error;
use time::UtcDateTime;
use tracing::debug;

pub type Result<T, E = SocialError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SocialError {
    #[error("The password must have at least {PASSWORD_MIN_LEN} characters")]
    PasswordTooShort,
    #[error("Username {0} is already taken")]
    UsernameTaken(Username),
    #[error("Unknown username or wrong password")]
    InvalidLogin,
    #[error(transparent)]
    InvalidCredential(#[from] InvalidCredentialError),
    #[error("The credential names unknown account {0}")]
    UnknownAccount(Username),
    /// Also covers posts that do not exist, so that existence cannot be probed.
    #[error("The caller may not access post {0}")]
    Forbidden(Id<PostMarker>),
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error(transparent)]
    CredentialIssue(#[from] CredentialIssueError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for SocialError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UsernameTaken(username) => SocialError::UsernameTaken(username),
            other @ StoreError::Backend(_) => SocialError::Store(other),
        }
    }
}

/// Store handles, the credential key and the feed size, injected once at startup.
pub struct Social {
    accounts: Arc<dyn CredentialStore>,
    graph: Arc<dyn FollowGraph>,
    content: Arc<dyn ContentStore>,
    verifier: IdentityVerifier,
    feed_limit: usize,
}

impl Social {
    #[must_use]
    pub fn new(
        accounts: Arc<dyn CredentialStore>,
        graph: Arc<dyn FollowGraph>,
        content: Arc<dyn ContentStore>,
        verifier: IdentityVerifier,
        feed_limit: usize,
    ) -> Self {
        Self {
            accounts,
            graph,
            content,
            verifier,
            feed_limit,
        }
    }

    fn policy(&self) -> AccessPolicy<'_> {
        AccessPolicy::new(&*self.graph)
    }

    pub async fn register(&self, registration: Registration) -> Result<Id<UserMarker>> {
        if registration.password.char_count() < PASSWORD_MIN_LEN {
            return Err(SocialError::PasswordTooShort);
        }

        if self
            .accounts
            .find_by_username(&registration.username)
            .await?
            .is_some()
        {
            return Err(SocialError::UsernameTaken(registration.username));
        }

        let account = CreateAccount {
            password_hash: registration.password.hash()?,
            username: registration.username,
            name: registration.name,
            gender: registration.gender,
        };

        // A concurrent registration can still win; the store reports it as UsernameTaken.
        Ok(self.accounts.create_account(&account).await?)
    }

    /// Returns a bearer credential for the account.
    pub async fn login(&self, login: Login) -> Result<String> {
        let account = self
            .accounts
            .find_by_username(&login.username)
            .await?
            .ok_or(SocialError::InvalidLogin)?;

        if !account.password_hash.verify(&login.password)? {
            return Err(SocialError::InvalidLogin);
        }

        Ok(self.verifier.issue(&account.username)?)
    }

    /// Verifies a bearer credential and resolves it to the caller's account id.
    pub async fn resolve_identity(&self, credential: &str) -> Result<Id<UserMarker>> {
        let identity = self.verifier.verify(credential)?;

        let account = self
            .accounts
            .find_by_username(&identity.username)
            .await?
            .ok_or(SocialError::UnknownAccount(identity.username))?;

        Ok(account.id)
    }

    pub async fn feed(&self, viewer: Id<UserMarker>) -> Result<Vec<FeedEntry>> {
        let feed = FeedAssembler::new(&*self.graph, &*self.content)
            .build_feed(viewer, self.feed_limit)
            .await?;

        Ok(feed)
    }

    pub async fn following(&self, viewer: Id<UserMarker>) -> Result<Vec<DisplayName>> {
        Ok(self.graph.list_followed_names(viewer).await?)
    }

    pub async fn followers(&self, viewer: Id<UserMarker>) -> Result<Vec<DisplayName>> {
        Ok(self.graph.list_follower_names(viewer).await?)
    }

    pub async fn post_detail(
        &self,
        viewer: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<PostDetail> {
        let detail = self
            .content
            .get_post_with_counts(post_id)
            .await?
            .ok_or(SocialError::Forbidden(post_id))?;

        if !self.policy().can_view(viewer, &detail.post).await? {
            debug!(%viewer, %post_id, "Refusing to show post");
            return Err(SocialError::Forbidden(post_id));
        }

        Ok(detail)
    }

    pub async fn likers(
        &self,
        viewer: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<Vec<Username>> {
        let post = self.visible_post(viewer, post_id).await?;
        Ok(self.content.list_liker_names(post.id).await?)
    }

    pub async fn replies(
        &self,
        viewer: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<Vec<ReplyView>> {
        let post = self.visible_post(viewer, post_id).await?;
        Ok(self.content.list_replies(post.id).await?)
    }

    pub async fn own_posts(&self, viewer: Id<UserMarker>) -> Result<Vec<PostDetail>> {
        Ok(self.content.list_own_posts(viewer).await?)
    }

    pub async fn create_post(
        &self,
        viewer: Id<UserMarker>,
        content: PostContent,
    ) -> Result<Id<PostMarker>> {
        let post = CreatePost {
            author: viewer,
            content,
            created_at: UtcDateTime::now(),
        };

        Ok(self.content.create_post(&post).await?)
    }

    pub async fn delete_post(&self, viewer: Id<UserMarker>, post_id: Id<PostMarker>) -> Result<()> {
        match self.content.delete_post(post_id, viewer).await? {
            DeleteOutcome::Deleted => {
                debug!(%viewer, %post_id, "Deleted post");
                Ok(())
            }
            DeleteOutcome::Forbidden => Err(SocialError::Forbidden(post_id)),
        }
    }

    pub async fn like_post(
        &self,
        viewer: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<Id<LikeMarker>> {
        let post = self.engageable_post(viewer, post_id).await?;
        Ok(self.content.create_like(post.id, viewer).await?)
    }

    pub async fn reply_to_post(
        &self,
        viewer: Id<UserMarker>,
        post_id: Id<PostMarker>,
        content: PostContent,
    ) -> Result<Id<ReplyMarker>> {
        let post = self.engageable_post(viewer, post_id).await?;
        let reply = CreateReply {
            post: post.id,
            author: viewer,
            content,
        };

        Ok(self.content.create_reply(&reply).await?)
    }

    async fn visible_post(&self, viewer: Id<UserMarker>, post_id: Id<PostMarker>) -> Result<Post> {
        let post = self
            .content
            .get_post(post_id)
            .await?
            .ok_or(SocialError::Forbidden(post_id))?;

        if self.policy().can_view(viewer, &post).await? {
            Ok(post)
        } else {
            debug!(%viewer, %post_id, "Refusing to show post");
            Err(SocialError::Forbidden(post_id))
        }
    }

    async fn engageable_post(
        &self,
        viewer: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<Post> {
        let post = self
            .content
            .get_post(post_id)
            .await?
            .ok_or(SocialError::Forbidden(post_id))?;

        if self.policy().can_engage(viewer, &post).await? {
            Ok(post)
        } else {
            debug!(%viewer, %post_id, "Refusing engagement with post");
            Err(SocialError::Forbidden(post_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        feed::DEFAULT_FEED_LIMIT,
        model::{
            Id,
            auth::{IdentityVerifier, Password},
            post::{CreatePost, PostContent},
            user::{DisplayName, Gender, Login, Registration, UserMarker, Username},
        },
        social::{Social, SocialError},
        store::{ContentStore, memory::MemoryStore},
    };
    use secrecy::SecretString;
    use std::sync::Arc;
    use time::{Duration, UtcDateTime, macros::utc_datetime};

    const T0: UtcDateTime = utc_datetime!(2026-04-01 08:00);

    fn social(store: &Arc<MemoryStore>) -> Social {
        Social::new(
            store.clone(),
            store.clone(),
            store.clone(),
            IdentityVerifier::new(&SecretString::from("social-tests".to_owned())),
            DEFAULT_FEED_LIMIT,
        )
    }

    fn registration(username: &str, password: &str) -> Registration {
        Registration {
            username: Username::new(username.to_owned()).unwrap(),
            password: Password::new(password.to_owned()),
            name: DisplayName::new(format!("{username} display")).unwrap(),
            gender: Gender::Other,
        }
    }

    fn content(text: &str) -> PostContent {
        PostContent::new(text.to_owned()).unwrap()
    }

    async fn register(social: &Social, username: &str) -> Id<UserMarker> {
        social
            .register(registration(username, "long enough"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let social = social(&store);
        register(&social, "ada").await;

        assert!(matches!(
            social.register(registration("ada", "other password")).await,
            Err(SocialError::UsernameTaken(_))
        ));
    }

    #[tokio::test]
    async fn short_password_is_rejected_regardless_of_other_fields() {
        let store = Arc::new(MemoryStore::new());
        let social = social(&store);
        register(&social, "ada").await;

        for username in ["ada", "fresh"] {
            assert!(matches!(
                social.register(registration(username, "12345")).await,
                Err(SocialError::PasswordTooShort)
            ));
        }
        assert!(social.register(registration("fresh", "123456")).await.is_ok());
    }

    #[tokio::test]
    async fn login_issues_a_credential_that_authenticates() {
        let store = Arc::new(MemoryStore::new());
        let social = social(&store);
        let ada = register(&social, "ada").await;

        let token = social
            .login(Login {
                username: Username::new("ada".to_owned()).unwrap(),
                password: Password::new("long enough".to_owned()),
            })
            .await
            .unwrap();
        assert_eq!(social.resolve_identity(&token).await.unwrap(), ada);

        let wrong_password = social
            .login(Login {
                username: Username::new("ada".to_owned()).unwrap(),
                password: Password::new("wrong".to_owned()),
            })
            .await;
        assert!(matches!(wrong_password, Err(SocialError::InvalidLogin)));

        assert!(matches!(
            social.resolve_identity("garbage").await,
            Err(SocialError::InvalidCredential(_))
        ));
    }

    #[tokio::test]
    async fn credential_for_unknown_account_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let social = social(&store);
        let token = IdentityVerifier::new(&SecretString::from("social-tests".to_owned()))
            .issue(&Username::new("ghost".to_owned()).unwrap())
            .unwrap();

        assert!(matches!(
            social.resolve_identity(&token).await,
            Err(SocialError::UnknownAccount(_))
        ));
    }

    #[tokio::test]
    async fn stranger_cannot_view_and_missing_post_looks_the_same() {
        let store = Arc::new(MemoryStore::new());
        let social = social(&store);
        let a = register(&social, "a").await;
        let d = register(&social, "d").await;
        let p1 = social.create_post(a, content("p1")).await.unwrap();
        let missing: Id<_> = 1_u64.into();

        assert!(matches!(
            social.post_detail(d, p1).await,
            Err(SocialError::Forbidden(_))
        ));
        assert!(matches!(
            social.post_detail(d, missing).await,
            Err(SocialError::Forbidden(_))
        ));
        assert!(matches!(
            social.likers(d, p1).await,
            Err(SocialError::Forbidden(_))
        ));
        assert!(matches!(
            social.replies(d, p1).await,
            Err(SocialError::Forbidden(_))
        ));

        let own = social.post_detail(a, p1).await.unwrap();
        assert_eq!(own.post.content.get(), "p1");
    }

    #[tokio::test]
    async fn author_cannot_like_own_post_without_following_themselves() {
        let store = Arc::new(MemoryStore::new());
        let social = social(&store);
        let a = register(&social, "a").await;
        let p1 = social.create_post(a, content("p1")).await.unwrap();

        assert!(matches!(
            social.like_post(a, p1).await,
            Err(SocialError::Forbidden(_))
        ));
        assert!(matches!(
            social.reply_to_post(a, p1, content("me too")).await,
            Err(SocialError::Forbidden(_))
        ));
        assert_eq!(social.post_detail(a, p1).await.unwrap().like_count, 0);
    }

    #[tokio::test]
    async fn follower_engagement_is_counted_and_listed() {
        let store = Arc::new(MemoryStore::new());
        let social = social(&store);
        let a = register(&social, "a").await;
        let b = register(&social, "b").await;
        store.follow(b, a).unwrap();
        let p1 = social.create_post(a, content("p1")).await.unwrap();

        social.like_post(b, p1).await.unwrap();
        social.like_post(b, p1).await.unwrap();
        social.reply_to_post(b, p1, content("nice")).await.unwrap();

        let detail = social.post_detail(a, p1).await.unwrap();
        assert_eq!((detail.like_count, detail.reply_count), (2, 1));

        let likers = social.likers(b, p1).await.unwrap();
        assert_eq!(likers.len(), 2);
        assert!(likers.iter().all(|name| name.get() == "b"));

        let replies = social.replies(a, p1).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].author_name.get(), "b display");
        assert_eq!(replies[0].content.get(), "nice");
    }

    #[tokio::test]
    async fn only_the_author_can_delete() {
        let store = Arc::new(MemoryStore::new());
        let social = social(&store);
        let a = register(&social, "a").await;
        let b = register(&social, "b").await;
        store.follow(b, a).unwrap();
        let p1 = social.create_post(a, content("p1")).await.unwrap();

        assert!(matches!(
            social.delete_post(b, p1).await,
            Err(SocialError::Forbidden(_))
        ));
        assert!(social.post_detail(b, p1).await.is_ok());

        social.delete_post(a, p1).await.unwrap();
        assert!(matches!(
            social.post_detail(a, p1).await,
            Err(SocialError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn feed_and_follow_lists() {
        let store = Arc::new(MemoryStore::new());
        let social = social(&store);
        let a = register(&social, "a").await;
        let b = register(&social, "b").await;
        let c = register(&social, "c").await;
        store.follow(a, b).unwrap();
        store.follow(a, c).unwrap();
        store.follow(c, a).unwrap();

        for (author, text, minutes) in [(b, "hello", 1), (c, "world", 2), (a, "mine", 3)] {
            store
                .create_post(&CreatePost {
                    author,
                    content: content(text),
                    created_at: T0 + Duration::minutes(minutes),
                })
                .await
                .unwrap();
        }

        let feed = social.feed(a).await.unwrap();
        let texts: Vec<&str> = feed.iter().map(|entry| entry.content.get()).collect();
        assert_eq!(texts, ["world", "hello"]);

        let following = social.following(a).await.unwrap();
        let following: Vec<&str> = following.iter().map(DisplayName::get).collect();
        assert_eq!(following, ["b display", "c display"]);

        let followers = social.followers(a).await.unwrap();
        let followers: Vec<&str> = followers.iter().map(DisplayName::get).collect();
        assert_eq!(followers, ["c display"]);

        assert_eq!(social.own_posts(a).await.unwrap().len(), 1);
        assert!(social.feed(b).await.unwrap().is_empty());
    }
}
