use axum::{routing::delete, routing::get, routing::patch, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route("/auth/revoke", post(handlers::revoke_token))
        .route("/auth/me", get(handlers::get_current_user))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/users", post(handlers::register_user))
        .route("/users/:id", get(handlers::get_user))
        .route("/users/:id/articles", get(handlers::list_user_articles))
}

pub fn articles() -> Router<AppState> {
    Router::new()
        .route("/articles", get(handlers::list_articles))
        .route("/articles", post(handlers::create_article))
        .route("/articles/photos", post(handlers::create_photo_upload))
        .route("/articles/:id", get(handlers::get_article_detail))
        .route("/articles/:id", patch(handlers::update_article))
        .route("/articles/:id", delete(handlers::delete_article))
        .route("/articles/:id/comments", get(handlers::list_comments))
        .route("/articles/:id/comments", post(handlers::create_comment))
}

pub fn engagement() -> Router<AppState> {
    Router::new()
        // Any other method on a reaction endpoint is a generic bad request.
        .route(
            "/articles/:id/like",
            post(handlers::like_article).fallback(handlers::reaction_bad_request),
        )
        .route(
            "/articles/:id/dislike",
            post(handlers::dislike_article).fallback(handlers::reaction_bad_request),
        )
        .route("/articles/:id/reactions", get(handlers::article_reaction_counts))
        .route("/reactions", get(handlers::my_reaction_totals))
}

pub fn bookmarks() -> Router<AppState> {
    Router::new()
        .route("/articles/:id/bookmark", post(handlers::add_bookmark))
        .route("/articles/:id/bookmark", delete(handlers::remove_bookmark))
        .route("/bookmarks", get(handlers::list_bookmarks))
}

pub fn categories() -> Router<AppState> {
    Router::new()
        .route("/categories", get(handlers::list_categories))
        .route("/categories/used", get(handlers::list_used_categories))
        .route("/categories/:id", delete(handlers::delete_category))
        .route("/categories/:id/articles", get(handlers::list_category_articles))
}

pub fn search() -> Router<AppState> {
    Router::new().route("/search", get(handlers::search_articles))
}
