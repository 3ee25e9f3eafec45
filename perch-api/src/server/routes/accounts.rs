use crate::server::{
    Result, ServerError, ServerRouter,
    json::{Created, Json},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use perch_common::{
    model::{
        Id,
        user::{Login, Registration, UserMarker},
    },
    social::Social,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_post(register).typed_post(login)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/register", rejection(ServerError))]
struct RegisterPath();

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct AccountCreated {
    id: Id<UserMarker>,
}

async fn register(
    RegisterPath(): RegisterPath,
    State(social): State<Arc<Social>>,
    Json(registration): Json<Registration>,
) -> Result<Created<AccountCreated>> {
    let id = social.register(registration).await?;

    Ok(Created(AccountCreated { id }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/login", rejection(ServerError))]
struct LoginPath();

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    jwt_token: String,
}

async fn login(
    LoginPath(): LoginPath,
    State(social): State<Arc<Social>>,
    Json(login): Json<Login>,
) -> Result<Json<LoginResponse>> {
    let jwt_token = social.login(login).await?;

    Ok(Json(LoginResponse { jwt_token }))
}

#[cfg(test)]
mod tests {
    use crate::server::tests::{send, sign_up, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    fn registration(username: &str, password: &str) -> serde_json::Value {
        json!({
            "username": username,
            "password": password,
            "name": "Someone",
            "gender": "female",
        })
    }

    #[tokio::test]
    async fn register_validates_before_creating() {
        let (app, _) = test_app();
        sign_up(&app, "ada").await;

        for body in [
            registration("ada", "another password"),
            registration("bob", "12345"),
            registration("", "long enough"),
            json!({
                "username": "bob",
                "password": "long enough",
                "name": "Bob",
                "gender": "robot",
            }),
        ] {
            let (status, response) = send(&app, "POST", "/register", None, Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(response, json!({ "status": 400 }));
        }

        let (status, response) = send(
            &app,
            "POST",
            "/register",
            None,
            Some(registration("bob", "123456")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(response["id"].is_u64());
    }

    #[tokio::test]
    async fn login_rejects_wrong_credentials() {
        let (app, _) = test_app();
        sign_up(&app, "ada").await;

        for body in [
            json!({ "username": "ada", "password": "wrong password" }),
            json!({ "username": "nobody", "password": "secret password" }),
        ] {
            let (status, _) = send(&app, "POST", "/login", None, Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn issued_token_authenticates() {
        let (app, _) = test_app();
        let token = sign_up(&app, "ada").await;

        let (status, body) = send(&app, "GET", "/user/following", Some(&token), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }
}
