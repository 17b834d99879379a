use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::comment::Comment;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct CommentService {
    db: Db,
}

impl CommentService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Returns `None` when the article does not exist.
    pub async fn create_comment(
        &self,
        article_id: Uuid,
        author_id: Uuid,
        body: String,
    ) -> Result<Option<Comment>> {
        let row = sqlx::query(
            "WITH inserted AS ( \
                INSERT INTO comments (article_id, author_id, body) \
                SELECT a.id, $2, $3 FROM articles a WHERE a.id = $1 \
                RETURNING id, article_id, author_id, body, created_at \
             ) \
             SELECT i.*, u.username AS author_username \
             FROM inserted i \
             JOIN users u ON u.id = i.author_id",
        )
        .bind(article_id)
        .bind(author_id)
        .bind(body)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(comment_from_row))
    }

    /// Oldest first.
    pub async fn list_comments(&self, article_id: Uuid) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT c.id, c.article_id, c.author_id, u.username AS author_username, \
                    c.body, c.created_at \
             FROM comments c \
             JOIN users u ON u.id = c.author_id \
             WHERE c.article_id = $1 \
             ORDER BY c.created_at ASC, c.id ASC",
        )
        .bind(article_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }
}

fn comment_from_row(row: &PgRow) -> Comment {
    Comment {
        id: row.get("id"),
        article_id: row.get("article_id"),
        author_id: row.get("author_id"),
        author_username: row.get("author_username"),
        body: row.get("body"),
        created_at: row.get("created_at"),
    }
}
