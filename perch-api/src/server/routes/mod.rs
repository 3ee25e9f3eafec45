use crate::server::ServerRouter;

mod accounts;
mod posts;
mod user;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(accounts::routes())
        .merge(user::routes())
        .merge(posts::routes())
}
