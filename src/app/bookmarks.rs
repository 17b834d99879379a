use std::collections::HashSet;

use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::app::catalog::{article_from_row, ARTICLE_COLUMNS, ARTICLE_JOINS};
use crate::domain::bookmark::Bookmark;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct BookmarkService {
    db: Db,
}

impl BookmarkService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Idempotent. Returns `None` when the article does not exist, otherwise
    /// whether a bookmark row was created.
    pub async fn add_bookmark(&self, user_id: Uuid, article_id: Uuid) -> Result<Option<bool>> {
        let mut tx = self.db.pool().begin().await?;

        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM articles WHERE id = $1 FOR KEY SHARE")
                .bind(article_id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let result = sqlx::query(
            "INSERT INTO bookmarks (user_id, article_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, article_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(article_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(result.rows_affected() > 0))
    }

    /// Idempotent. Returns `None` when the article does not exist, otherwise
    /// whether a bookmark row was removed.
    pub async fn remove_bookmark(&self, user_id: Uuid, article_id: Uuid) -> Result<Option<bool>> {
        let row = sqlx::query(
            "WITH removed AS ( \
                DELETE FROM bookmarks WHERE user_id = $1 AND article_id = $2 \
                RETURNING id \
             ) \
             SELECT EXISTS(SELECT 1 FROM articles WHERE id = $2) AS article_exists, \
                    (SELECT COUNT(*) FROM removed) AS removed",
        )
        .bind(user_id)
        .bind(article_id)
        .fetch_one(self.db.pool())
        .await?;

        let article_exists: bool = row.get("article_exists");
        let removed: i64 = row.get("removed");
        if !article_exists {
            return Ok(None);
        }
        Ok(Some(removed > 0))
    }

    pub async fn is_bookmarked(&self, user_id: Uuid, article_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM bookmarks WHERE user_id = $1 AND article_id = $2)",
        )
        .bind(user_id)
        .bind(article_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(exists)
    }

    /// Which of `article_ids` the user has bookmarked.
    pub async fn bookmarked_among(
        &self,
        user_id: Uuid,
        article_ids: &[Uuid],
    ) -> Result<HashSet<Uuid>> {
        if article_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let marked: Vec<Uuid> = sqlx::query_scalar(
            "SELECT article_id FROM bookmarks WHERE user_id = $1 AND article_id = ANY($2)",
        )
        .bind(user_id)
        .bind(article_ids)
        .fetch_all(self.db.pool())
        .await?;
        Ok(marked.into_iter().collect())
    }

    /// Newest bookmark first.
    pub async fn list_bookmarks(&self, user_id: Uuid) -> Result<Vec<Bookmark>> {
        let sql = format!(
            "SELECT b.id AS bookmark_id, b.user_id AS bookmark_user_id, \
                    b.created_at AS bookmarked_at, {ARTICLE_COLUMNS} \
             FROM bookmarks b \
             JOIN articles a ON a.id = b.article_id \
             {ARTICLE_JOINS} \
             WHERE b.user_id = $1 \
             ORDER BY b.created_at DESC, b.id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;

        let bookmarks = rows
            .iter()
            .map(|row| Bookmark {
                id: row.get("bookmark_id"),
                user_id: row.get("bookmark_user_id"),
                created_at: row.get("bookmarked_at"),
                article: article_from_row(row),
            })
            .collect();

        Ok(bookmarks)
    }
}
