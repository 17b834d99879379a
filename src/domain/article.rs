use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::category::Category;

#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author_id: Uuid,
    pub author_username: String,
    pub category: Category,
    #[serde(skip_serializing)]
    pub photo_key: Option<String>,
    /// Presigned URL for the photo (populated at response time)
    pub photo_url: Option<String>,
    pub view_count: i64,
    pub likes: i64,
    pub dislikes: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Article {
    pub fn is_authored_by(&self, user_id: Uuid) -> bool {
        self.author_id == user_id
    }
}

/// Public URL path of an article's detail page.
pub fn detail_path(article_id: Uuid) -> String {
    format!("/v1/articles/{}", article_id)
}

/// `content` is expected to be sanitized markup.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub category_name: String,
    pub photo_key: Option<String>,
}

/// Partial update; `None` leaves the field unchanged. `photo_key` of
/// `Some(None)` detaches the photo.
#[derive(Debug, Clone, Default)]
pub struct ArticleChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category_name: Option<String>,
    pub photo_key: Option<Option<String>>,
}

impl ArticleChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.category_name.is_none()
            && self.photo_key.is_none()
    }
}
