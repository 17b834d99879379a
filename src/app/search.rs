use anyhow::Result;

use crate::app::catalog::{article_from_row, ARTICLE_COLUMNS, ARTICLE_JOINS};
use crate::app::content::escape_like_pattern;
use crate::domain::article::Article;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct SearchService {
    db: Db,
}

impl SearchService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Case-insensitive substring match on titles, newest first.
    ///
    /// A blank query matches nothing.
    pub async fn search_articles(&self, query: &str, limit: i64) -> Result<Vec<Article>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let pattern = format!("%{}%", escape_like_pattern(query));
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles a {ARTICLE_JOINS} \
             WHERE a.title ILIKE $1 ESCAPE '\\' \
             ORDER BY a.created_at DESC, a.id DESC \
             LIMIT $2"
        );
        let rows = sqlx::query(&sql)
            .bind(&pattern)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(article_from_row).collect())
    }
}
