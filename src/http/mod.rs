use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;

pub use auth::{AdminToken, AuthUser};
pub use error::{AppError, FieldErrors};

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::auth())
        .merge(routes::users())
        .merge(routes::articles())
        .merge(routes::engagement())
        .merge(routes::bookmarks())
        .merge(routes::categories())
        .merge(routes::search());

    Router::new()
        .merge(routes::health())
        .nest("/v1", api)
        .with_state(state)
}
