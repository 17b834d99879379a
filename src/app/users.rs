use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::user::{PublicUser, User};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, created_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        let user = row.map(|row| User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            created_at: row.get("created_at"),
        });

        Ok(user)
    }

    pub async fn get_public_profile(&self, user_id: Uuid) -> Result<Option<PublicUser>> {
        let row = sqlx::query(
            "SELECT u.id, u.username, u.email, u.created_at, \
                    (SELECT COUNT(*) FROM articles a WHERE a.author_id = u.id) AS articles_count \
             FROM users u WHERE u.id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        let profile = row.map(|row| {
            let user = User {
                id: row.get("id"),
                username: row.get("username"),
                email: row.get("email"),
                created_at: row.get("created_at"),
            };
            PublicUser::with_articles_count(user, row.get("articles_count"))
        });

        Ok(profile)
    }

    pub async fn exists(&self, user_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(exists)
    }
}
