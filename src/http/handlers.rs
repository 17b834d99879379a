use std::collections::HashSet;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::{NewAccount, Session};
use crate::app::bookmarks::BookmarkService;
use crate::app::catalog::{ArticlePage, ArticleUpdate, AuthorOnly, CatalogService};
use crate::app::content::{has_visible_text, sanitize_rich_text};
use crate::app::categories::{CategoryDeletion, CategoryService};
use crate::app::comments::CommentService;
use crate::app::engagement::EngagementService;
use crate::app::pagination::PageWindow;
use crate::app::photos::{is_owned_photo_key, is_supported_content_type, UploadIntent};
use crate::app::search::SearchService;
use crate::app::users::UserService;
use crate::domain::article::{detail_path, Article, ArticleChanges, NewArticle};
use crate::domain::bookmark::Bookmark;
use crate::domain::category::Category;
use crate::domain::comment::Comment;
use crate::domain::engagement::{Reaction, ReactionState, ReactionTotals};
use crate::domain::user::{PublicUser, User};
use crate::http::{AdminToken, AppError, AuthUser, FieldErrors};
use crate::infra::db::{violated_constraint, UNIQUE_VIOLATION};
use crate::AppState;

const MAX_USERNAME_LEN: usize = 150;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;
const MAX_TITLE_LEN: usize = 200;
const MAX_CATEGORY_LEN: usize = 100;
const MAX_CONTENT_LEN: usize = 100_000;
const MAX_COMMENT_LEN: usize = 2000;
const SEARCH_RESULT_LIMIT: i64 = 100;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = match state.db.ping().await {
        Ok(()) => "ok",
        Err(err) => {
            tracing::warn!(error = ?err, "database ping failed");
            "degraded"
        }
    };

    Json(HealthResponse { status })
}

fn parse_uuid_param(raw: &str, name: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::bad_request(format!("invalid {}", name)))
}

fn into_result(errors: FieldErrors) -> Result<(), AppError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(errors))
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

fn validate_registration(payload: &RegisterRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();

    let username = payload.username.trim();
    if username.is_empty() {
        errors.insert("username", "username is required".into());
    } else if username.chars().count() > MAX_USERNAME_LEN {
        errors.insert("username", "username must be at most 150 characters".into());
    } else if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '@' | '+'))
    {
        errors.insert(
            "username",
            "username may contain only letters, digits and @.+-_".into(),
        );
    }

    let email = payload.email.trim();
    if email.is_empty() {
        errors.insert("email", "email is required".into());
    } else if !email
        .split_once('@')
        .map_or(false, |(local, domain)| !local.is_empty() && domain.contains('.'))
    {
        errors.insert("email", "email is invalid".into());
    }

    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        errors.insert("password", "password must be at least 8 characters".into());
    } else if payload.password.len() > MAX_PASSWORD_LEN {
        errors.insert("password", "password must be at most 128 characters".into());
    }

    errors
}

pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    into_result(validate_registration(&payload))?;

    let user = state
        .identity()
        .sign_up(NewAccount {
            username: payload.username.trim().to_string(),
            email: payload.email.trim().to_lowercase(),
            password: payload.password,
        })
        .await
        .map_err(|err| {
            if let Some(sqlx_err) = err.downcast_ref::<sqlx::Error>() {
                if let Some(constraint) = violated_constraint(sqlx_err, UNIQUE_VIOLATION) {
                    if constraint.contains("users_username_key") {
                        return AppError::conflict("username already taken");
                    }
                    if constraint.contains("users_email_key") {
                        return AppError::conflict("email already taken");
                    }
                }
            }
            tracing::error!(error = ?err, "failed to register user");
            AppError::internal("failed to register user")
        })?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    pub login: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

impl From<Session> for AuthTokenResponse {
    fn from(session: Session) -> Self {
        Self {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            access_expires_at: session.access_expires_at,
            refresh_expires_at: session.refresh_expires_at,
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.login.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("login and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let tokens = state
        .identity()
        .sign_in(payload.login.trim(), &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(tokens.into())),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let tokens = state
        .identity()
        .rotate(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to refresh token");
            AppError::internal("failed to refresh token")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(tokens.into())),
        None => Err(AppError::unauthorized("invalid refresh token")),
    }
}

pub async fn revoke_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<StatusCode, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let revoked = state
        .identity()
        .sign_out(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to revoke token");
            AppError::internal("failed to revoke token")
        })?;

    tracing::debug!(revoked, "refresh token revocation processed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let user = UserService::new(state.db.clone())
        .get_user(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch current user");
            AppError::internal("failed to fetch current user")
        })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

pub async fn get_user(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<PublicUser>, AppError> {
    let profile = UserService::new(state.db.clone())
        .get_public_profile(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to fetch user");
            AppError::internal("failed to fetch user")
        })?;

    match profile {
        Some(profile) => Ok(Json(profile)),
        None => Err(AppError::not_found("user not found")),
    }
}

pub async fn list_user_articles(
    Path(id): Path<Uuid>,
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Article>>, AppError> {
    let exists = UserService::new(state.db.clone())
        .exists(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to fetch user");
            AppError::internal("failed to fetch user")
        })?;
    if !exists {
        return Err(AppError::not_found("user not found"));
    }

    let mut articles = CatalogService::new(state.db.clone())
        .list_by_author(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to list user articles");
            AppError::internal("failed to list user articles")
        })?;
    state.photo_service().populate_photo_urls(&mut articles).await;

    Ok(Json(ListResponse { items: articles }))
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CatalogQuery {
    pub page: Option<String>,
    pub category: Option<String>,
}

/// A listed article with the caller's bookmark flag.
#[derive(Serialize)]
pub struct CatalogItem {
    #[serde(flatten)]
    pub article: Article,
    pub is_bookmarked: bool,
}

#[derive(Serialize)]
pub struct CatalogResponse {
    #[serde(flatten)]
    pub window: PageWindow,
    pub items: Vec<CatalogItem>,
    /// Whether the caller bookmarked anything on this page.
    pub has_bookmarks: bool,
    /// Categories that have at least one article.
    pub categories: Vec<Category>,
}

/// Resolves photo URLs and the viewer's bookmarks for one page of articles.
async fn catalog_items(
    state: &AppState,
    viewer: Option<&AuthUser>,
    mut articles: Vec<Article>,
) -> Result<Vec<CatalogItem>, AppError> {
    state.photo_service().populate_photo_urls(&mut articles).await;

    let marked = match viewer {
        Some(viewer) => {
            let ids: Vec<Uuid> = articles.iter().map(|article| article.id).collect();
            BookmarkService::new(state.db.clone())
                .bookmarked_among(viewer.user_id, &ids)
                .await
                .map_err(|err| {
                    tracing::error!(error = ?err, user_id = %viewer.user_id, "failed to fetch bookmark state");
                    AppError::internal("failed to list articles")
                })?
        }
        None => HashSet::new(),
    };

    Ok(articles
        .into_iter()
        .map(|article| CatalogItem {
            is_bookmarked: marked.contains(&article.id),
            article,
        })
        .collect())
}

pub async fn list_articles(
    auth: Option<AuthUser>,
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<CatalogResponse>, AppError> {
    let category_id = match query.category.as_deref().filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => Some(parse_uuid_param(raw, "category")?),
        None => None,
    };

    let ArticlePage { window, items } = CatalogService::new(state.db.clone())
        .list_articles(query.page.as_deref(), category_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list articles");
            AppError::internal("failed to list articles")
        })?;
    let items = catalog_items(&state, auth.as_ref(), items).await?;

    let categories = CategoryService::new(state.db.clone())
        .used_categories()
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list used categories");
            AppError::internal("failed to list categories")
        })?;

    Ok(Json(CatalogResponse {
        window,
        has_bookmarks: items.iter().any(|item| item.is_bookmarked),
        items,
        categories,
    }))
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Serialize)]
pub struct CategoryArticlesResponse {
    pub category: Category,
    #[serde(flatten)]
    pub window: PageWindow,
    pub items: Vec<CatalogItem>,
    pub has_bookmarks: bool,
    pub categories: Vec<Category>,
}

pub async fn list_category_articles(
    Path(id): Path<Uuid>,
    auth: Option<AuthUser>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<CategoryArticlesResponse>, AppError> {
    let categories = CategoryService::new(state.db.clone());
    let category = categories
        .get_category(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, category_id = %id, "failed to fetch category");
            AppError::internal("failed to fetch category")
        })?
        .ok_or_else(|| AppError::not_found("category not found"))?;

    let ArticlePage { window, items } = CatalogService::new(state.db.clone())
        .list_articles(query.page.as_deref(), Some(category.id))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, category_id = %id, "failed to list category articles");
            AppError::internal("failed to list articles")
        })?;
    let items = catalog_items(&state, auth.as_ref(), items).await?;

    let all = categories.list_categories().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list categories");
        AppError::internal("failed to list categories")
    })?;

    Ok(Json(CategoryArticlesResponse {
        category,
        window,
        has_bookmarks: items.iter().any(|item| item.is_bookmarked),
        items,
        categories: all,
    }))
}

#[derive(Deserialize)]
pub struct CreateArticleRequest {
    pub title: String,
    pub content: String,
    pub category: String,
    pub photo_key: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    /// Absent keeps the photo, `null` removes it.
    #[serde(default, deserialize_with = "present")]
    pub photo_key: Option<Option<String>>,
}

/// Tells an explicit `null` apart from a missing field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn check_title(title: &str, errors: &mut FieldErrors) {
    if title.trim().is_empty() {
        errors.insert("title", "title is required".into());
    } else if title.trim().chars().count() > MAX_TITLE_LEN {
        errors.insert("title", "title must be at most 200 characters".into());
    }
}

/// Sanitizes article markup and requires that readable text survives.
fn clean_content(raw: &str, errors: &mut FieldErrors) -> String {
    if raw.len() > MAX_CONTENT_LEN {
        errors.insert("content", "content is too long".into());
        return String::new();
    }
    let cleaned = sanitize_rich_text(raw);
    if !has_visible_text(&cleaned) {
        errors.insert("content", "content is required".into());
    }
    cleaned
}

fn check_category(category: &str, errors: &mut FieldErrors) {
    if category.trim().is_empty() {
        errors.insert("category", "category is required".into());
    } else if category.trim().chars().count() > MAX_CATEGORY_LEN {
        errors.insert("category", "category must be at most 100 characters".into());
    }
}

fn check_photo_key(author_id: Uuid, photo_key: &str, errors: &mut FieldErrors) {
    if !is_owned_photo_key(author_id, photo_key) {
        errors.insert("photo_key", "unknown photo".into());
    }
}

pub async fn create_article(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateArticleRequest>,
) -> Result<(StatusCode, Json<Article>), AppError> {
    let mut errors = FieldErrors::new();
    check_title(&payload.title, &mut errors);
    let content = clean_content(&payload.content, &mut errors);
    check_category(&payload.category, &mut errors);
    if let Some(key) = payload.photo_key.as_deref() {
        check_photo_key(auth.user_id, key, &mut errors);
    }
    into_result(errors)?;

    let new = NewArticle {
        title: payload.title.trim().to_string(),
        content,
        category_name: payload.category.trim().to_string(),
        photo_key: payload.photo_key,
    };

    let mut article = CatalogService::new(state.db.clone())
        .create_article(auth.user_id, new)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, author_id = %auth.user_id, "failed to create article");
            AppError::internal("failed to create article")
        })?;
    state.photo_service().populate_photo_url(&mut article).await;

    tracing::info!(article_id = %article.id, author_id = %auth.user_id, "article created");
    Ok((StatusCode::CREATED, Json(article)))
}

#[derive(Serialize)]
pub struct ViewerState {
    pub is_author: bool,
    pub is_bookmarked: bool,
    pub is_liked: bool,
    pub is_disliked: bool,
}

#[derive(Serialize)]
pub struct ArticleDetailResponse {
    pub article: Article,
    pub comments: Vec<Comment>,
    pub viewer: ViewerState,
}

/// Article detail. Counts a view for authenticated readers other than the author.
pub async fn get_article_detail(
    Path(id): Path<Uuid>,
    auth: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Json<ArticleDetailResponse>, AppError> {
    let viewer_id = auth.map(|user| user.user_id);

    if let Some(viewer_id) = viewer_id {
        EngagementService::new(state.db.clone())
            .record_view(id, viewer_id)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, article_id = %id, viewer_id = %viewer_id, "failed to record view");
                AppError::internal("failed to fetch article")
            })?;
    }

    let mut article = CatalogService::new(state.db.clone())
        .get_article(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, article_id = %id, "failed to fetch article");
            AppError::internal("failed to fetch article")
        })?
        .ok_or_else(|| AppError::not_found("article not found"))?;
    state.photo_service().populate_photo_url(&mut article).await;

    let comments = CommentService::new(state.db.clone())
        .list_comments(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, article_id = %id, "failed to list comments");
            AppError::internal("failed to fetch article")
        })?;

    let reactions = EngagementService::new(state.db.clone())
        .reaction_state(id, viewer_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, article_id = %id, "failed to fetch reactions");
            AppError::internal("failed to fetch article")
        })?;

    let is_bookmarked = match viewer_id {
        Some(viewer_id) => BookmarkService::new(state.db.clone())
            .is_bookmarked(viewer_id, id)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, article_id = %id, "failed to fetch bookmark state");
                AppError::internal("failed to fetch article")
            })?,
        None => false,
    };

    let viewer = ViewerState {
        is_author: viewer_id.map_or(false, |viewer_id| article.is_authored_by(viewer_id)),
        is_bookmarked,
        is_liked: reactions.is_liked,
        is_disliked: reactions.is_disliked,
    };

    Ok(Json(ArticleDetailResponse {
        article,
        comments,
        viewer,
    }))
}

pub async fn update_article(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateArticleRequest>,
) -> Result<Json<Article>, AppError> {
    let mut errors = FieldErrors::new();
    if let Some(title) = payload.title.as_deref() {
        check_title(title, &mut errors);
    }
    let content = payload
        .content
        .as_deref()
        .map(|raw| clean_content(raw, &mut errors));
    if let Some(category) = payload.category.as_deref() {
        check_category(category, &mut errors);
    }
    if let Some(Some(key)) = &payload.photo_key {
        check_photo_key(auth.user_id, key, &mut errors);
    }
    into_result(errors)?;

    let changes = ArticleChanges {
        title: payload.title.map(|title| title.trim().to_string()),
        content,
        category_name: payload.category.map(|name| name.trim().to_string()),
        photo_key: payload.photo_key,
    };
    if changes.is_empty() {
        return Err(AppError::bad_request("no changes supplied"));
    }

    let outcome = CatalogService::new(state.db.clone())
        .update_article(id, auth.user_id, changes)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, article_id = %id, "failed to update article");
            AppError::internal("failed to update article")
        })?;

    match outcome {
        AuthorOnly::Done(ArticleUpdate {
            mut article,
            detached_photo,
        }) => {
            let photos = state.photo_service();
            if let Some(key) = detached_photo {
                photos.delete_photo(&key).await;
            }
            photos.populate_photo_url(&mut article).await;
            Ok(Json(article))
        }
        AuthorOnly::NotFound => Err(AppError::not_found("article not found")),
        AuthorOnly::NotAuthor => Err(AppError::forbidden("only the author can edit this article")),
    }
}

pub async fn delete_article(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let outcome = CatalogService::new(state.db.clone())
        .delete_article(id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, article_id = %id, "failed to delete article");
            AppError::internal("failed to delete article")
        })?;

    match outcome {
        AuthorOnly::Done(photo_key) => {
            if let Some(key) = photo_key {
                state.photo_service().delete_photo(&key).await;
            }
            tracing::info!(article_id = %id, author_id = %auth.user_id, "article deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        AuthorOnly::NotFound => Err(AppError::not_found("article not found")),
        AuthorOnly::NotAuthor => {
            Err(AppError::forbidden("only the author can delete this article"))
        }
    }
}

#[derive(Deserialize)]
pub struct PhotoUploadRequest {
    pub content_type: String,
    pub bytes: i64,
}

pub async fn create_photo_upload(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PhotoUploadRequest>,
) -> Result<Json<UploadIntent>, AppError> {
    if payload.bytes <= 0 {
        return Err(AppError::bad_request("bytes must be greater than 0"));
    }
    if payload.bytes > state.upload_max_bytes {
        return Err(AppError::bad_request("upload exceeds max size"));
    }
    if !is_supported_content_type(&payload.content_type) {
        return Err(AppError::bad_request("unsupported content type"));
    }

    let intent = state
        .photo_service()
        .create_upload(
            auth.user_id,
            &payload.content_type,
            payload.bytes,
            state.upload_url_ttl_seconds,
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to create photo upload");
            AppError::internal("failed to create upload")
        })?;

    Ok(Json(intent))
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub body: String,
}

pub async fn create_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let body = payload.body.trim();
    let mut errors = FieldErrors::new();
    if body.is_empty() {
        errors.insert("body", "comment cannot be empty".into());
    } else if body.chars().count() > MAX_COMMENT_LEN {
        errors.insert("body", "comment must be at most 2000 characters".into());
    }
    into_result(errors)?;

    let comment = CommentService::new(state.db.clone())
        .create_comment(id, auth.user_id, body.to_string())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, article_id = %id, user_id = %auth.user_id, "failed to create comment");
            AppError::internal("failed to create comment")
        })?
        .ok_or_else(|| AppError::not_found("article not found"))?;

    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn list_comments(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Comment>>, AppError> {
    let exists = CatalogService::new(state.db.clone())
        .article_exists(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, article_id = %id, "failed to fetch article");
            AppError::internal("failed to list comments")
        })?;
    if !exists {
        return Err(AppError::not_found("article not found"));
    }

    let comments = CommentService::new(state.db.clone())
        .list_comments(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, article_id = %id, "failed to list comments");
            AppError::internal("failed to list comments")
        })?;

    Ok(Json(ListResponse { items: comments }))
}

// ---------------------------------------------------------------------------
// Engagement
// ---------------------------------------------------------------------------

async fn react(
    state: &AppState,
    article_id: Uuid,
    user_id: Uuid,
    reaction: Reaction,
) -> Result<Json<ReactionState>, AppError> {
    let reaction_state = EngagementService::new(state.db.clone())
        .set_reaction(article_id, user_id, reaction)
        .await
        .map_err(|err| {
            tracing::error!(
                error = ?err,
                article_id = %article_id,
                user_id = %user_id,
                reaction = reaction.as_db(),
                "failed to set reaction"
            );
            AppError::internal("failed to set reaction")
        })?;

    reaction_state
        .map(Json)
        .ok_or_else(|| AppError::not_found("article not found"))
}

pub async fn like_article(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ReactionState>, AppError> {
    react(&state, id, auth.user_id, Reaction::Like).await
}

pub async fn dislike_article(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ReactionState>, AppError> {
    react(&state, id, auth.user_id, Reaction::Dislike).await
}

/// Reaction endpoints only accept POST; authentication is still checked first.
pub async fn reaction_bad_request(_auth: AuthUser) -> AppError {
    AppError::bad_request("invalid request")
}

#[derive(Serialize)]
pub struct ReactionCountsResponse {
    pub likes: i64,
    pub dislikes: i64,
    pub total_likes: i64,
    pub total_dislikes: i64,
}

impl From<ReactionTotals> for ReactionCountsResponse {
    fn from(totals: ReactionTotals) -> Self {
        Self {
            likes: totals.likes,
            dislikes: totals.dislikes,
            total_likes: totals.likes,
            total_dislikes: totals.dislikes,
        }
    }
}

pub async fn article_reaction_counts(
    Path(id): Path<Uuid>,
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ReactionCountsResponse>, AppError> {
    let totals = EngagementService::new(state.db.clone())
        .reaction_counts(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, article_id = %id, "failed to count reactions");
            AppError::internal("failed to count reactions")
        })?
        .ok_or_else(|| AppError::not_found("article not found"))?;

    Ok(Json(totals.into()))
}

/// Totals across every article written by the caller.
pub async fn my_reaction_totals(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ReactionCountsResponse>, AppError> {
    let totals = EngagementService::new(state.db.clone())
        .author_reaction_totals(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to count reactions");
            AppError::internal("failed to count reactions")
        })?;

    Ok(Json(totals.into()))
}

// ---------------------------------------------------------------------------
// Bookmarks
// ---------------------------------------------------------------------------

pub async fn add_bookmark(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let created = BookmarkService::new(state.db.clone())
        .add_bookmark(auth.user_id, id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, article_id = %id, user_id = %auth.user_id, "failed to add bookmark");
            AppError::internal("failed to add bookmark")
        })?
        .ok_or_else(|| AppError::not_found("article not found"))?;

    tracing::debug!(article_id = %id, user_id = %auth.user_id, created, "bookmark add");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_bookmark(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let removed = BookmarkService::new(state.db.clone())
        .remove_bookmark(auth.user_id, id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, article_id = %id, user_id = %auth.user_id, "failed to remove bookmark");
            AppError::internal("failed to remove bookmark")
        })?
        .ok_or_else(|| AppError::not_found("article not found"))?;

    tracing::debug!(article_id = %id, user_id = %auth.user_id, removed, "bookmark remove");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_bookmarks(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Bookmark>>, AppError> {
    let mut bookmarks = BookmarkService::new(state.db.clone())
        .list_bookmarks(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list bookmarks");
            AppError::internal("failed to list bookmarks")
        })?;
    state
        .photo_service()
        .populate_photo_urls(bookmarks.iter_mut().map(|bookmark| &mut bookmark.article))
        .await;

    Ok(Json(ListResponse { items: bookmarks }))
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Category>>, AppError> {
    let categories = CategoryService::new(state.db.clone())
        .list_categories()
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list categories");
            AppError::internal("failed to list categories")
        })?;

    Ok(Json(ListResponse { items: categories }))
}

pub async fn list_used_categories(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Category>>, AppError> {
    let categories = CategoryService::new(state.db.clone())
        .used_categories()
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list used categories");
            AppError::internal("failed to list categories")
        })?;

    Ok(Json(ListResponse { items: categories }))
}

pub async fn delete_category(
    Path(id): Path<Uuid>,
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let outcome = CategoryService::new(state.db.clone())
        .delete_category(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, category_id = %id, "failed to delete category");
            AppError::internal("failed to delete category")
        })?;

    match outcome {
        CategoryDeletion::Deleted => {
            tracing::info!(category_id = %id, "category deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        CategoryDeletion::NotFound => Err(AppError::not_found("category not found")),
        CategoryDeletion::InUse => Err(AppError::conflict("category is used by articles")),
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

#[derive(Serialize)]
pub struct SearchResult {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author: String,
    pub photo: Option<String>,
    pub url: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

pub async fn search_articles(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = query.query.unwrap_or_default();

    let mut articles = SearchService::new(state.db.clone())
        .search_articles(&query, SEARCH_RESULT_LIMIT)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to search articles");
            AppError::internal("failed to search articles")
        })?;
    state.photo_service().populate_photo_urls(&mut articles).await;

    let results = articles
        .into_iter()
        .map(|article| SearchResult {
            url: detail_path(article.id),
            id: article.id,
            title: article.title,
            content: article.content,
            author: article.author_username,
            photo: article.photo_url,
        })
        .collect();

    Ok(Json(SearchResponse { results }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn valid_registration_has_no_errors() {
        let errors = validate_registration(&registration("ada", "ada@example.com", "longenough"));
        assert!(errors.is_empty());
    }

    #[test]
    fn registration_reports_every_bad_field() {
        let errors = validate_registration(&registration("bad name", "nope", "short"));
        assert_eq!(errors.len(), 3);
        assert!(errors.contains_key("username"));
        assert!(errors.contains_key("email"));
        assert!(errors.contains_key("password"));
    }

    #[test]
    fn article_field_checks() {
        let mut errors = FieldErrors::new();
        check_title("   ", &mut errors);
        clean_content("", &mut errors);
        check_category(&"x".repeat(MAX_CATEGORY_LEN + 1), &mut errors);
        assert_eq!(errors["title"], "title is required");
        assert_eq!(errors["content"], "content is required");
        assert_eq!(errors["category"], "category must be at most 100 characters");
    }

    #[test]
    fn content_is_checked_after_sanitizing() {
        let mut errors = FieldErrors::new();
        assert_eq!(clean_content("<script>alert(1)</script>", &mut errors), "");
        assert_eq!(errors["content"], "content is required");

        let mut errors = FieldErrors::new();
        let cleaned = clean_content(r#"<p onclick="x()">Hi</p>"#, &mut errors);
        assert!(errors.is_empty());
        assert_eq!(cleaned, "<p>Hi</p>");

        let mut errors = FieldErrors::new();
        clean_content(&"a".repeat(MAX_CONTENT_LEN + 1), &mut errors);
        assert_eq!(errors["content"], "content is too long");
    }

    #[test]
    fn photo_key_null_differs_from_absent() {
        let absent: UpdateArticleRequest = serde_json::from_str(r#"{"title":"t"}"#).unwrap();
        assert_eq!(absent.photo_key, None);
        let cleared: UpdateArticleRequest = serde_json::from_str(r#"{"photo_key":null}"#).unwrap();
        assert_eq!(cleared.photo_key, Some(None));
        let set: UpdateArticleRequest =
            serde_json::from_str(r#"{"photo_key":"articles/x/a.jpg"}"#).unwrap();
        assert_eq!(set.photo_key, Some(Some("articles/x/a.jpg".to_string())));
        assert_eq!(errors["category"], "category must be at most 100 characters");
    }

    #[test]
    fn uuid_params_are_trimmed() {
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid_param(&format!(" {} ", id), "category").unwrap(), id);
        assert!(parse_uuid_param("abc", "category").is_err());
    }
}
