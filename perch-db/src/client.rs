use crate::record::{
    AccountRecord, PostDetailRecord, PostRecord, ReplyRecord, UserRecord, to_primitive,
};
use perch_common::{
    model::{
        Id, ModelValidationError, PerchSnowflakeGenerator,
        post::{
            CreatePost, CreateReply, LikeMarker, Post, PostDetail, PostMarker, ReplyMarker,
            ReplyView,
        },
        user::{Account, CreateAccount, User, UserMarker, Username},
    },
    snowflake::{ProcessId, SnowflakeTimeError, WorkerId},
    store::DeleteOutcome,
};
use sqlx::{PgPool, migrate::MigrateError, query, query_as, query_scalar};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use time::UtcDateTime;
use tracing::info;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] MigrateError),
    #[error("Could not generate an id: {0}")]
    Snowflake(#[from] SnowflakeTimeError),
    #[error("Username {0} is already taken")]
    UsernameTaken(Username),
}

const POST_DETAIL_COLUMNS: &str = "
    posts.post_snowflake,
    posts.user_snowflake,
    posts.content,
    posts.created_at,
    (
        SELECT COUNT(*) FROM posts.likes WHERE likes.post_snowflake = posts.post_snowflake
    ) AS like_count,
    (
        SELECT COUNT(*) FROM posts.replies WHERE replies.post_snowflake = posts.post_snowflake
    ) AS reply_count
";

pub struct DbClient {
    pool: PgPool,
    snowflake_generator: Mutex<PerchSnowflakeGenerator>,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId, process_id: ProcessId) -> Self {
        let snowflake_generator = Mutex::new(PerchSnowflakeGenerator::new(worker_id, process_id));

        Self {
            pool,
            snowflake_generator,
        }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!().run(&self.pool).await?;
        info!("Database migrations are up to date");
        Ok(())
    }

    fn next_snowflake(&self) -> Result<i64> {
        let snowflake = self
            .snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()?;

        Ok(snowflake.get().cast_signed())
    }

    /// Post ids carry their creation time so that id order follows time order.
    fn snowflake_at(&self, at: UtcDateTime) -> Result<i64> {
        let snowflake = self
            .snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate_at(at)?;

        Ok(snowflake.get().cast_signed())
    }

    pub async fn fetch_account_by_username(&self, username: &Username) -> Result<Option<Account>> {
        let record = query_as::<_, AccountRecord>(
            "
            SELECT
                users.user_snowflake,
                users.username,
                users.password_hash,
                users.name,
                users.gender
            FROM
                users.users
            WHERE
                users.username = $1
            ",
        )
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        let account = record.map(Account::try_from).transpose()?;
        Ok(account)
    }

    pub async fn insert_account(&self, account: &CreateAccount) -> Result<Id<UserMarker>> {
        let user_snowflake = self.next_snowflake()?;

        let returned_snowflake = query_scalar::<_, i64>(
            "
            INSERT INTO users.users (user_snowflake, username, password_hash, name, gender)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING users.user_snowflake
            ",
        )
        .bind(user_snowflake)
        .bind(account.username.get())
        .bind(account.password_hash.get())
        .bind(account.name.get())
        .bind(account.gender.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                DbError::UsernameTaken(account.username.clone())
            } else {
                DbError::Sqlx(err)
            }
        })?;

        Ok(returned_snowflake.cast_unsigned().into())
    }

    /// Adds the edge `follower -> followed`. Returns `false` if it already existed.
    pub async fn follow(&self, follower: Id<UserMarker>, followed: Id<UserMarker>) -> Result<bool> {
        let result = query(
            "
            INSERT INTO users.follows (follower_snowflake, followed_snowflake)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(snowflake(follower))
        .bind(snowflake(followed))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn fetch_is_following(
        &self,
        viewer: Id<UserMarker>,
        target: Id<UserMarker>,
    ) -> Result<bool> {
        let following = query_scalar::<_, bool>(
            "
            SELECT EXISTS (
                SELECT 1
                FROM users.follows
                WHERE follows.follower_snowflake = $1 AND follows.followed_snowflake = $2
            )
            ",
        )
        .bind(snowflake(viewer))
        .bind(snowflake(target))
        .fetch_one(&self.pool)
        .await?;

        Ok(following)
    }

    pub async fn fetch_followed(&self, viewer: Id<UserMarker>) -> Result<Vec<User>> {
        let records = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_snowflake,
                users.username,
                users.name
            FROM
                users.follows
                JOIN users.users ON users.user_snowflake = follows.followed_snowflake
            WHERE
                follows.follower_snowflake = $1
            ORDER BY
                users.username
            ",
        )
        .bind(snowflake(viewer))
        .fetch_all(&self.pool)
        .await?;

        let users = records
            .into_iter()
            .map(User::try_from)
            .collect::<Result<_, _>>()?;
        Ok(users)
    }

    pub async fn fetch_followers(&self, viewer: Id<UserMarker>) -> Result<Vec<User>> {
        let records = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_snowflake,
                users.username,
                users.name
            FROM
                users.follows
                JOIN users.users ON users.user_snowflake = follows.follower_snowflake
            WHERE
                follows.followed_snowflake = $1
            ORDER BY
                users.username
            ",
        )
        .bind(snowflake(viewer))
        .fetch_all(&self.pool)
        .await?;

        let users = records
            .into_iter()
            .map(User::try_from)
            .collect::<Result<_, _>>()?;
        Ok(users)
    }

    pub async fn insert_post(&self, post: &CreatePost) -> Result<Id<PostMarker>> {
        let post_snowflake = self.snowflake_at(post.created_at)?;

        let returned_snowflake = query_scalar::<_, i64>(
            "
            INSERT INTO posts.posts (post_snowflake, user_snowflake, content, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING posts.post_snowflake
            ",
        )
        .bind(post_snowflake)
        .bind(snowflake(post.author))
        .bind(post.content.get())
        .bind(to_primitive(post.created_at))
        .fetch_one(&self.pool)
        .await?;

        Ok(returned_snowflake.cast_unsigned().into())
    }

    /// Likes and replies go with the post through `ON DELETE CASCADE`.
    pub async fn delete_authored_post(
        &self,
        post: Id<PostMarker>,
        requester: Id<UserMarker>,
    ) -> Result<DeleteOutcome> {
        let result = query(
            "
            DELETE FROM posts.posts
            WHERE posts.post_snowflake = $1 AND posts.user_snowflake = $2
            ",
        )
        .bind(snowflake(post))
        .bind(snowflake(requester))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(DeleteOutcome::Forbidden)
        } else {
            Ok(DeleteOutcome::Deleted)
        }
    }

    pub async fn insert_like(
        &self,
        post: Id<PostMarker>,
        author: Id<UserMarker>,
    ) -> Result<Id<LikeMarker>> {
        let like_snowflake = self.next_snowflake()?;

        let returned_snowflake = query_scalar::<_, i64>(
            "
            INSERT INTO posts.likes (like_snowflake, post_snowflake, user_snowflake)
            VALUES ($1, $2, $3)
            RETURNING likes.like_snowflake
            ",
        )
        .bind(like_snowflake)
        .bind(snowflake(post))
        .bind(snowflake(author))
        .fetch_one(&self.pool)
        .await?;

        Ok(returned_snowflake.cast_unsigned().into())
    }

    pub async fn insert_reply(&self, reply: &CreateReply) -> Result<Id<ReplyMarker>> {
        let reply_snowflake = self.next_snowflake()?;

        let returned_snowflake = query_scalar::<_, i64>(
            "
            INSERT INTO posts.replies (reply_snowflake, post_snowflake, user_snowflake, content)
            VALUES ($1, $2, $3, $4)
            RETURNING replies.reply_snowflake
            ",
        )
        .bind(reply_snowflake)
        .bind(snowflake(reply.post))
        .bind(snowflake(reply.author))
        .bind(reply.content.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(returned_snowflake.cast_unsigned().into())
    }

    pub async fn fetch_post(&self, post: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(
            "
            SELECT
                posts.post_snowflake,
                posts.user_snowflake,
                posts.content,
                posts.created_at
            FROM
                posts.posts
            WHERE
                posts.post_snowflake = $1
            ",
        )
        .bind(snowflake(post))
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    pub async fn fetch_post_detail(&self, post: Id<PostMarker>) -> Result<Option<PostDetail>> {
        let sql = format!(
            "SELECT {POST_DETAIL_COLUMNS} FROM posts.posts WHERE posts.post_snowflake = $1"
        );
        let record = query_as::<_, PostDetailRecord>(&sql)
            .bind(snowflake(post))
            .fetch_optional(&self.pool)
            .await?;

        let detail = record.map(PostDetail::try_from).transpose()?;
        Ok(detail)
    }

    pub async fn fetch_liker_names(&self, post: Id<PostMarker>) -> Result<Vec<Username>> {
        let names = query_scalar::<_, String>(
            "
            SELECT
                users.username
            FROM
                posts.likes
                JOIN users.users ON users.user_snowflake = likes.user_snowflake
            WHERE
                likes.post_snowflake = $1
            ORDER BY
                likes.like_snowflake
            ",
        )
        .bind(snowflake(post))
        .fetch_all(&self.pool)
        .await?;

        let names = names
            .into_iter()
            .map(Username::new)
            .collect::<Result<_, _>>()
            .map_err(ModelValidationError::from)?;
        Ok(names)
    }

    pub async fn fetch_replies(&self, post: Id<PostMarker>) -> Result<Vec<ReplyView>> {
        let records = query_as::<_, ReplyRecord>(
            "
            SELECT
                users.name,
                replies.content
            FROM
                posts.replies
                JOIN users.users ON users.user_snowflake = replies.user_snowflake
            WHERE
                replies.post_snowflake = $1
            ORDER BY
                replies.reply_snowflake
            ",
        )
        .bind(snowflake(post))
        .fetch_all(&self.pool)
        .await?;

        let replies = records
            .into_iter()
            .map(ReplyView::try_from)
            .collect::<Result<_, _>>()?;
        Ok(replies)
    }

    pub async fn fetch_posts_by_author(&self, author: Id<UserMarker>) -> Result<Vec<PostDetail>> {
        let sql = format!(
            "
            SELECT {POST_DETAIL_COLUMNS}
            FROM posts.posts
            WHERE posts.user_snowflake = $1
            ORDER BY posts.created_at DESC, posts.post_snowflake DESC
            "
        );
        let records = query_as::<_, PostDetailRecord>(&sql)
            .bind(snowflake(author))
            .fetch_all(&self.pool)
            .await?;

        let posts = records
            .into_iter()
            .map(PostDetail::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    /// Already ordered and truncated; callers may still re-rank.
    pub async fn fetch_recent_posts_by_authors(
        &self,
        authors: &[Id<UserMarker>],
        limit: usize,
    ) -> Result<Vec<Post>> {
        let author_snowflakes: Vec<i64> = authors.iter().copied().map(snowflake).collect();

        let records = query_as::<_, PostRecord>(
            "
            SELECT
                posts.post_snowflake,
                posts.user_snowflake,
                posts.content,
                posts.created_at
            FROM
                posts.posts
            WHERE
                posts.user_snowflake = ANY($1)
            ORDER BY
                posts.created_at DESC,
                posts.post_snowflake DESC
            LIMIT $2
            ",
        )
        .bind(author_snowflakes)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }
}

fn snowflake<Marker>(id: Id<Marker>) -> i64 {
    id.snowflake().get().cast_signed()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use crate::client::{DbClient, DbError};
    use perch_common::{
        feed::FeedAssembler,
        model::{
            Id,
            auth::PasswordHash,
            post::{CreatePost, PostContent, PostMarker},
            user::{CreateAccount, DisplayName, Gender, UserMarker, Username},
        },
        snowflake::{ProcessId, WorkerId},
        store::DeleteOutcome,
    };
    use sqlx::PgPool;
    use time::{UtcDateTime, macros::utc_datetime};

    const T0: UtcDateTime = utc_datetime!(2026-03-01 12:00);

    fn client(pool: PgPool) -> DbClient {
        DbClient::new(pool, WorkerId::default(), ProcessId::default())
    }

    async fn account(db: &DbClient, username: &str) -> Id<UserMarker> {
        db.insert_account(&CreateAccount {
            username: Username::new(username.to_owned()).unwrap(),
            password_hash: PasswordHash::from_stored("$argon2id$stub".to_owned()),
            name: DisplayName::new(format!("{username} display")).unwrap(),
            gender: Gender::Other,
        })
        .await
        .unwrap()
    }

    async fn post_at(
        db: &DbClient,
        author: Id<UserMarker>,
        content: &str,
        created_at: UtcDateTime,
    ) -> Id<PostMarker> {
        db.insert_post(&CreatePost {
            author,
            content: PostContent::new(content.to_owned()).unwrap(),
            created_at,
        })
        .await
        .unwrap()
    }

    #[sqlx::test]
    #[ignore = "needs a PostgreSQL server in DATABASE_URL"]
    async fn duplicate_username_is_reported(pool: PgPool) {
        let db = client(pool);
        account(&db, "ada").await;

        let duplicate = db
            .insert_account(&CreateAccount {
                username: Username::new("ada".to_owned()).unwrap(),
                password_hash: PasswordHash::from_stored(String::new()),
                name: DisplayName::new("Other Ada".to_owned()).unwrap(),
                gender: Gender::Female,
            })
            .await;

        assert!(matches!(duplicate, Err(DbError::UsernameTaken(_))));
        let stored = db
            .fetch_account_by_username(&Username::new("ada".to_owned()).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.name.get(), "ada display");
    }

    #[sqlx::test]
    #[ignore = "needs a PostgreSQL server in DATABASE_URL"]
    async fn follow_edges_are_unique_and_never_self_referencing(pool: PgPool) {
        let db = client(pool);
        let a = account(&db, "a").await;
        let b = account(&db, "b").await;

        assert!(db.follow(a, b).await.unwrap());
        assert!(!db.follow(a, b).await.unwrap());
        assert!(matches!(db.follow(a, a).await, Err(DbError::Sqlx(_))));

        assert!(db.fetch_is_following(a, b).await.unwrap());
        assert!(!db.fetch_is_following(b, a).await.unwrap());
        assert!(!db.fetch_is_following(a, a).await.unwrap());
        assert_eq!(db.fetch_followers(b).await.unwrap().len(), 1);
    }

    #[sqlx::test]
    #[ignore = "needs a PostgreSQL server in DATABASE_URL"]
    async fn only_the_author_deletes_and_engagement_goes_with_the_post(pool: PgPool) {
        let db = client(pool);
        let a = account(&db, "a").await;
        let b = account(&db, "b").await;
        let p1 = post_at(&db, a, "p1", T0).await;
        db.insert_like(p1, b).await.unwrap();

        assert_eq!(
            db.delete_authored_post(p1, b).await.unwrap(),
            DeleteOutcome::Forbidden
        );
        let detail = db.fetch_post_detail(p1).await.unwrap().unwrap();
        assert_eq!(detail.post.content.get(), "p1");
        assert_eq!(detail.like_count, 1);

        assert_eq!(
            db.delete_authored_post(p1, a).await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert!(db.fetch_post(p1).await.unwrap().is_none());
        assert!(db.fetch_liker_names(p1).await.unwrap().is_empty());
        assert_eq!(
            db.delete_authored_post(p1, a).await.unwrap(),
            DeleteOutcome::Forbidden
        );
    }

    #[sqlx::test]
    #[ignore = "needs a PostgreSQL server in DATABASE_URL"]
    async fn recent_posts_break_timestamp_ties_by_id(pool: PgPool) {
        let db = client(pool);
        let a = account(&db, "a").await;
        let b = account(&db, "b").await;
        let first = post_at(&db, b, "first", T0).await;
        let second = post_at(&db, b, "second", T0).await;
        let older = post_at(&db, b, "older", utc_datetime!(2026-02-01 12:00)).await;

        let recent = db.fetch_recent_posts_by_authors(&[b], 2).await.unwrap();
        let ids: Vec<Id<PostMarker>> = recent.iter().map(|post| post.id).collect();
        assert_eq!(ids, [second, first]);
        assert_eq!(recent[0].created_at, T0);

        let all = db.fetch_recent_posts_by_authors(&[b], usize::MAX).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].id, older);

        db.follow(a, b).await.unwrap();
        let feed = FeedAssembler::new(&db, &db).build_feed(a, 2).await.unwrap();
        let contents: Vec<&str> = feed.iter().map(|entry| entry.content.get()).collect();
        assert_eq!(contents, ["second", "first"]);
    }
}
