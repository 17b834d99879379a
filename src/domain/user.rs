use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Profile fields safe to show to other users.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub articles_count: i64,
}

impl PublicUser {
    pub fn with_articles_count(user: User, articles_count: i64) -> Self {
        Self {
            id: user.id,
            username: user.username,
            created_at: user.created_at,
            articles_count,
        }
    }
}
