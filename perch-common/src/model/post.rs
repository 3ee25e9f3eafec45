use crate::{
    model::{
        Id, bounded_text,
        user::{DisplayName, UserMarker, Username},
    },
    util::timestamp,
};
use serde::{Deserialize, Serialize};
use time::UtcDateTime;

pub const POST_CONTENT_MAX_LEN: usize = 280;

bounded_text!(
    PostContent,
    InvalidPostContentError,
    "post content",
    max = POST_CONTENT_MAX_LEN
);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct ReplyMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct LikeMarker;

#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author: Id<UserMarker>,
    pub content: PostContent,
    #[serde(with = "timestamp")]
    pub created_at: UtcDateTime,
}

/// A post with its engagement counts.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub like_count: u64,
    pub reply_count: u64,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct CreatePost {
    pub author: Id<UserMarker>,
    pub content: PostContent,
    pub created_at: UtcDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct CreateReply {
    pub post: Id<PostMarker>,
    pub author: Id<UserMarker>,
    pub content: PostContent,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct ReplyView {
    pub author_name: DisplayName,
    pub content: PostContent,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct FeedEntry {
    pub content: PostContent,
    pub author_username: Username,
    #[serde(with = "timestamp")]
    pub created_at: UtcDateTime,
}

/// Request body for posts and replies.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct ContentBody {
    pub content: PostContent,
}
