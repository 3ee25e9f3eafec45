use perch_common::model::{
    ModelValidationError,
    auth::PasswordHash,
    post::{Post, PostContent, PostDetail, ReplyView},
    user::{Account, DisplayName, User, Username},
};
use time::{PrimitiveDateTime, UtcDateTime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, sqlx::FromRow)]
pub(crate) struct AccountRecord {
    pub user_snowflake: i64,
    pub username: String,
    pub password_hash: String,
    pub name: String,
    pub gender: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, sqlx::FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub username: String,
    pub name: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, sqlx::FromRow)]
pub(crate) struct PostRecord {
    pub post_snowflake: i64,
    pub user_snowflake: i64,
    pub content: String,
    pub created_at: PrimitiveDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, sqlx::FromRow)]
pub(crate) struct PostDetailRecord {
    #[sqlx(flatten)]
    pub post: PostRecord,
    pub like_count: i64,
    pub reply_count: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, sqlx::FromRow)]
pub(crate) struct ReplyRecord {
    pub name: String,
    pub content: String,
}

/// `TIMESTAMP` columns hold UTC wall-clock time.
pub(crate) fn to_primitive(time: UtcDateTime) -> PrimitiveDateTime {
    PrimitiveDateTime::new(time.date(), time.time())
}

impl TryFrom<AccountRecord> for Account {
    type Error = ModelValidationError;

    fn try_from(value: AccountRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_snowflake.cast_unsigned().into(),
            username: Username::new(value.username)?,
            password_hash: PasswordHash::from_stored(value.password_hash),
            name: DisplayName::new(value.name)?,
            gender: value.gender.parse()?,
        })
    }
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_snowflake.cast_unsigned().into(),
            username: Username::new(value.username)?,
            name: DisplayName::new(value.name)?,
        })
    }
}

impl TryFrom<PostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.post_snowflake.cast_unsigned().into(),
            author: value.user_snowflake.cast_unsigned().into(),
            content: PostContent::new(value.content)?,
            created_at: value.created_at.as_utc(),
        })
    }
}

impl TryFrom<PostDetailRecord> for PostDetail {
    type Error = ModelValidationError;

    fn try_from(value: PostDetailRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            post: value.post.try_into()?,
            like_count: value.like_count.cast_unsigned(),
            reply_count: value.reply_count.cast_unsigned(),
        })
    }
}

impl TryFrom<ReplyRecord> for ReplyView {
    type Error = ModelValidationError;

    fn try_from(value: ReplyRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            author_name: DisplayName::new(value.name)?,
            content: PostContent::new(value.content)?,
        })
    }
}
