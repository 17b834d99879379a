use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::article::Article;

#[derive(Debug, Clone, Serialize)]
pub struct Bookmark {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub article: Article,
}
