use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Created, Json},
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use perch_common::{
    model::{
        Id,
        post::{ContentBody, LikeMarker, PostDetail, PostMarker, ReplyMarker, ReplyView},
        user::Username,
    },
    social::Social,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_post)
        .typed_delete(delete_post)
        .typed_get(get_likes)
        .typed_post(like_post)
        .typed_get(get_replies)
        .typed_post(reply_to_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(social): State<Arc<Social>>,
    user: AuthenticatedUser,
) -> Result<Json<PostDetail>> {
    let post = social.post_detail(user.user_id(), id).await?;

    Ok(Json(post))
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(social): State<Arc<Social>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    social.delete_post(user.user_id(), id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/likes", rejection(ServerError))]
struct PostLikesPath {
    id: Id<PostMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct Likes {
    likes: Vec<Username>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct LikeCreated {
    id: Id<LikeMarker>,
}

async fn get_likes(
    PostLikesPath { id }: PostLikesPath,
    State(social): State<Arc<Social>>,
    user: AuthenticatedUser,
) -> Result<Json<Likes>> {
    let likes = social.likers(user.user_id(), id).await?;

    Ok(Json(Likes { likes }))
}

async fn like_post(
    PostLikesPath { id }: PostLikesPath,
    State(social): State<Arc<Social>>,
    user: AuthenticatedUser,
) -> Result<Created<LikeCreated>> {
    let id = social.like_post(user.user_id(), id).await?;

    Ok(Created(LikeCreated { id }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/replies", rejection(ServerError))]
struct PostRepliesPath {
    id: Id<PostMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct Replies {
    replies: Vec<ReplyView>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct ReplyCreated {
    id: Id<ReplyMarker>,
}

async fn get_replies(
    PostRepliesPath { id }: PostRepliesPath,
    State(social): State<Arc<Social>>,
    user: AuthenticatedUser,
) -> Result<Json<Replies>> {
    let replies = social.replies(user.user_id(), id).await?;

    Ok(Json(Replies { replies }))
}

async fn reply_to_post(
    PostRepliesPath { id }: PostRepliesPath,
    State(social): State<Arc<Social>>,
    user: AuthenticatedUser,
    Json(ContentBody { content }): Json<ContentBody>,
) -> Result<Created<ReplyCreated>> {
    let id = social.reply_to_post(user.user_id(), id, content).await?;

    Ok(Created(ReplyCreated { id }))
}
