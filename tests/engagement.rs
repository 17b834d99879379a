//! Engagement Tests
//!
//! Covers like/dislike exclusivity, reaction totals, and view counting.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

// ===========================================================================
// Reactions
// ===========================================================================

#[tokio::test]
async fn like_returns_counts_and_flags() {
    let app = app().await;
    let author = app.create_user("like_author").await;
    let reader = app.create_user("like_reader").await;
    let article = app.create_article_for_user(author.id, "like_basic").await;

    let resp = app
        .post(&format!("/v1/articles/{}/like", article), Some(&reader.access_token))
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        resp.json(),
        json!({ "likes": 1, "dislikes": 0, "is_liked": true, "is_disliked": false })
    );
}

#[tokio::test]
async fn like_is_idempotent() {
    let app = app().await;
    let author = app.create_user("like_twice_author").await;
    let reader = app.create_user("like_twice_reader").await;
    let article = app.create_article_for_user(author.id, "like_twice").await;
    let path = format!("/v1/articles/{}/like", article);

    app.post(&path, Some(&reader.access_token)).await;
    let resp = app.post(&path, Some(&reader.access_token)).await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["likes"].as_i64().unwrap(), 1);
    assert_eq!(body["is_liked"].as_bool().unwrap(), true);
}

#[tokio::test]
async fn dislike_moves_user_out_of_likers() {
    let app = app().await;
    let author = app.create_user("switch_author").await;
    let reader = app.create_user("switch_reader").await;
    let article = app.create_article_for_user(author.id, "switch").await;

    app.post(&format!("/v1/articles/{}/like", article), Some(&reader.access_token))
        .await;
    let resp = app
        .post(&format!("/v1/articles/{}/dislike", article), Some(&reader.access_token))
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        resp.json(),
        json!({ "likes": 0, "dislikes": 1, "is_liked": false, "is_disliked": true })
    );

    let resp = app
        .post(&format!("/v1/articles/{}/like", article), Some(&reader.access_token))
        .await;
    assert_eq!(
        resp.json(),
        json!({ "likes": 1, "dislikes": 0, "is_liked": true, "is_disliked": false })
    );
}

#[tokio::test]
async fn reactions_from_several_users_are_counted() {
    let app = app().await;
    let author = app.create_user("multi_author").await;
    let a = app.create_user("multi_a").await;
    let b = app.create_user("multi_b").await;
    let c = app.create_user("multi_c").await;
    let article = app.create_article_for_user(author.id, "multi").await;

    app.post(&format!("/v1/articles/{}/like", article), Some(&a.access_token))
        .await;
    app.post(&format!("/v1/articles/{}/like", article), Some(&b.access_token))
        .await;
    let resp = app
        .post(&format!("/v1/articles/{}/dislike", article), Some(&c.access_token))
        .await;

    assert_eq!(
        resp.json(),
        json!({ "likes": 2, "dislikes": 1, "is_liked": false, "is_disliked": true })
    );
}

#[tokio::test]
async fn reaction_requires_auth() {
    let app = app().await;
    let author = app.create_user("react_noauth_author").await;
    let article = app.create_article_for_user(author.id, "react_noauth").await;

    let resp = app.post(&format!("/v1/articles/{}/like", article), None).await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reaction_on_missing_article() {
    let app = app().await;
    let reader = app.create_user("react_missing").await;

    let resp = app
        .post(
            &format!("/v1/articles/{}/dislike", Uuid::new_v4()),
            Some(&reader.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "article not found");
}

#[tokio::test]
async fn reaction_with_other_methods_is_bad_request() {
    let app = app().await;
    let author = app.create_user("react_get_author").await;
    let reader = app.create_user("react_get_reader").await;
    let article = app.create_article_for_user(author.id, "react_get").await;

    let resp = app
        .get(&format!("/v1/articles/{}/like", article), Some(&reader.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json(), json!({ "error": "invalid request" }));

    let resp = app
        .put(&format!("/v1/articles/{}/dislike", article), Some(&reader.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    // Nothing was recorded.
    let resp = app
        .get(&format!("/v1/articles/{}/reactions", article), Some(&reader.access_token))
        .await;
    assert_eq!(resp.json()["likes"].as_i64().unwrap(), 0);
    assert_eq!(resp.json()["dislikes"].as_i64().unwrap(), 0);
}

#[tokio::test]
async fn article_reaction_counts() {
    let app = app().await;
    let author = app.create_user("counts_author").await;
    let reader = app.create_user("counts_reader").await;
    let article = app.create_article_for_user(author.id, "counts").await;

    app.post(&format!("/v1/articles/{}/like", article), Some(&reader.access_token))
        .await;
    let resp = app
        .get(&format!("/v1/articles/{}/reactions", article), Some(&author.access_token))
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        resp.json(),
        json!({ "likes": 1, "dislikes": 0, "total_likes": 1, "total_dislikes": 0 })
    );
}

#[tokio::test]
async fn author_totals_span_all_articles() {
    let app = app().await;
    let author = app.create_user("totals_author").await;
    let reader = app.create_user("totals_reader").await;
    let first = app.create_article_for_user(author.id, "totals_first").await;
    let second = app.create_article_for_user(author.id, "totals_second").await;

    app.post(&format!("/v1/articles/{}/like", first), Some(&reader.access_token))
        .await;
    app.post(&format!("/v1/articles/{}/dislike", second), Some(&reader.access_token))
        .await;
    app.post(&format!("/v1/articles/{}/like", second), Some(&author.access_token))
        .await;

    let resp = app.get("/v1/reactions", Some(&author.access_token)).await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["total_likes"].as_i64().unwrap(), 2);
    assert_eq!(body["total_dislikes"].as_i64().unwrap(), 1);
}

#[tokio::test]
async fn detail_shows_viewer_reaction() {
    let app = app().await;
    let author = app.create_user("detail_react_author").await;
    let reader = app.create_user("detail_react_reader").await;
    let article = app.create_article_for_user(author.id, "detail_react").await;

    app.post(&format!("/v1/articles/{}/dislike", article), Some(&reader.access_token))
        .await;

    let resp = app
        .get(&format!("/v1/articles/{}", article), Some(&reader.access_token))
        .await;
    let body = resp.json();
    assert_eq!(body["article"]["dislikes"].as_i64().unwrap(), 1);
    assert_eq!(body["viewer"]["is_disliked"].as_bool().unwrap(), true);
    assert_eq!(body["viewer"]["is_liked"].as_bool().unwrap(), false);

    let resp = app.get(&format!("/v1/articles/{}", article), None).await;
    let body = resp.json();
    assert_eq!(body["viewer"]["is_disliked"].as_bool().unwrap(), false);
}

// ===========================================================================
// Views
// ===========================================================================

#[tokio::test]
async fn view_counts_once_per_reader() {
    let app = app().await;
    let author = app.create_user("views_author").await;
    let reader = app.create_user("views_reader").await;
    let article = app.create_article_for_user(author.id, "views").await;
    let path = format!("/v1/articles/{}", article);

    let resp = app.get(&path, Some(&reader.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["article"]["view_count"].as_i64().unwrap(), 1);

    app.get(&path, Some(&reader.access_token)).await;
    assert_eq!(app.view_count(article).await, 1);
}

#[tokio::test]
async fn author_and_anonymous_views_do_not_count() {
    let app = app().await;
    let author = app.create_user("views_self_author").await;
    let article = app.create_article_for_user(author.id, "views_self").await;
    let path = format!("/v1/articles/{}", article);

    let resp = app.get(&path, Some(&author.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["viewer"]["is_author"].as_bool().unwrap(), true);

    let resp = app.get(&path, None).await;
    assert_eq!(resp.status, StatusCode::OK);

    assert_eq!(app.view_count(article).await, 0);
}

#[tokio::test]
async fn view_of_missing_article() {
    let app = app().await;
    let reader = app.create_user("views_missing").await;

    let resp = app
        .get(&format!("/v1/articles/{}", Uuid::new_v4()), Some(&reader.access_token))
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// End to end
// ===========================================================================

#[tokio::test]
async fn publish_then_like_then_dislike() {
    let app = app().await;
    let writer = app.create_user("e2e_writer").await;
    let reader = app.create_user("e2e_reader").await;

    let resp = app
        .post_json(
            "/v1/articles",
            json!({ "title": "Rust ownership", "content": "<p>Borrowing</p>", "category": "Tech" }),
            Some(&writer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let article = resp.json()["id"].as_str().unwrap().to_string();

    let resp = app
        .post(&format!("/v1/articles/{}/like", article), Some(&reader.access_token))
        .await;
    assert_eq!(
        resp.json(),
        json!({ "likes": 1, "dislikes": 0, "is_liked": true, "is_disliked": false })
    );

    let resp = app
        .post(&format!("/v1/articles/{}/dislike", article), Some(&reader.access_token))
        .await;
    assert_eq!(
        resp.json(),
        json!({ "likes": 0, "dislikes": 1, "is_liked": false, "is_disliked": true })
    );
}
