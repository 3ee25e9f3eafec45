use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Created, Json},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use perch_common::{
    model::{
        Id,
        post::{ContentBody, FeedEntry, PostDetail, PostMarker},
        user::DisplayName,
    },
    social::Social,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_feed)
        .typed_get(get_following)
        .typed_get(get_followers)
        .typed_get(get_own_posts)
        .typed_post(create_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/user/posts/feed", rejection(ServerError))]
struct FeedPath();

async fn get_feed(
    FeedPath(): FeedPath,
    State(social): State<Arc<Social>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<FeedEntry>>> {
    let feed = social.feed(user.user_id()).await?;

    Ok(Json(feed))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/user/following", rejection(ServerError))]
struct FollowingPath();

async fn get_following(
    FollowingPath(): FollowingPath,
    State(social): State<Arc<Social>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<DisplayName>>> {
    let names = social.following(user.user_id()).await?;

    Ok(Json(names))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/user/followers", rejection(ServerError))]
struct FollowersPath();

async fn get_followers(
    FollowersPath(): FollowersPath,
    State(social): State<Arc<Social>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<DisplayName>>> {
    let names = social.followers(user.user_id()).await?;

    Ok(Json(names))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/user/posts", rejection(ServerError))]
struct OwnPostsPath();

async fn get_own_posts(
    OwnPostsPath(): OwnPostsPath,
    State(social): State<Arc<Social>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<PostDetail>>> {
    let posts = social.own_posts(user.user_id()).await?;

    Ok(Json(posts))
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct PostCreated {
    id: Id<PostMarker>,
}

async fn create_post(
    OwnPostsPath(): OwnPostsPath,
    State(social): State<Arc<Social>>,
    user: AuthenticatedUser,
    Json(ContentBody { content }): Json<ContentBody>,
) -> Result<Created<PostCreated>> {
    let id = social.create_post(user.user_id(), content).await?;

    Ok(Created(PostCreated { id }))
}

#[cfg(test)]
mod tests {
    use crate::server::tests::{send, sign_up, test_app};
    use axum::http::StatusCode;
    use perch_common::{
        model::{Id, user::UserMarker},
        store::{CredentialStore, memory::MemoryStore},
    };
    use serde_json::json;

    async fn id_of(store: &MemoryStore, username: &str) -> Id<UserMarker> {
        store
            .find_by_username(&username.parse().unwrap())
            .await
            .unwrap()
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn feed_shows_followed_posts_newest_first() {
        let (app, store) = test_app();
        let a = sign_up(&app, "a").await;
        let b = sign_up(&app, "b").await;
        let c = sign_up(&app, "c").await;
        store
            .follow(id_of(&store, "a").await, id_of(&store, "b").await)
            .unwrap();
        store
            .follow(id_of(&store, "a").await, id_of(&store, "c").await)
            .unwrap();

        for (token, content) in [(&b, "hello"), (&c, "world"), (&a, "mine")] {
            let (status, body) = send(
                &app,
                "POST",
                "/user/posts",
                Some(token),
                Some(json!({ "content": content })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            assert!(body["id"].is_u64());
        }

        let (status, feed) = send(&app, "GET", "/user/posts/feed", Some(&a), None).await;
        assert_eq!(status, StatusCode::OK);

        let feed = feed.as_array().unwrap();
        let contents: Vec<&str> = feed
            .iter()
            .map(|entry| entry["content"].as_str().unwrap())
            .collect();
        let authors: Vec<&str> = feed
            .iter()
            .map(|entry| entry["author_username"].as_str().unwrap())
            .collect();
        // Both posts may share a millisecond, in which case the id decides.
        assert_eq!(contents, ["world", "hello"]);
        assert_eq!(authors, ["c", "b"]);
    }

    #[tokio::test]
    async fn follow_lists_use_display_names() {
        let (app, store) = test_app();
        let a = sign_up(&app, "a").await;
        let b = sign_up(&app, "b").await;
        store
            .follow(id_of(&store, "b").await, id_of(&store, "a").await)
            .unwrap();

        let (_, following) = send(&app, "GET", "/user/following", Some(&b), None).await;
        let (_, followers) = send(&app, "GET", "/user/followers", Some(&a), None).await;

        assert_eq!(following, json!(["a display"]));
        assert_eq!(followers, json!(["b display"]));
    }

    #[tokio::test]
    async fn own_posts_carry_counts() {
        let (app, _) = test_app();
        let a = sign_up(&app, "a").await;

        let (status, _) = send(
            &app,
            "POST",
            "/user/posts",
            Some(&a),
            Some(json!({ "content": "p1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, posts) = send(&app, "GET", "/user/posts", Some(&a), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(posts[0]["content"], "p1");
        assert_eq!(posts[0]["like_count"], 0);
        assert_eq!(posts[0]["reply_count"], 0);
    }

    #[tokio::test]
    async fn empty_or_overlong_content_is_rejected() {
        let (app, _) = test_app();
        let a = sign_up(&app, "a").await;

        for content in [String::new(), "x".repeat(281)] {
            let (status, _) = send(
                &app,
                "POST",
                "/user/posts",
                Some(&a),
                Some(json!({ "content": content })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }
}
