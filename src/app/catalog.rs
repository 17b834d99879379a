use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::categories::get_or_create_with_conn;
use crate::app::pagination::{PageWindow, PAGE_SIZE};
use crate::domain::article::{Article, ArticleChanges, NewArticle};
use crate::domain::category::Category;
use crate::infra::db::Db;

/// Columns decoded by [`article_from_row`]; pair with [`ARTICLE_JOINS`].
pub(crate) const ARTICLE_COLUMNS: &str = "a.id, a.title, a.content, a.author_id, \
     u.username AS author_username, a.category_id, c.name AS category_name, \
     a.photo_key, a.view_count, a.created_at, a.updated_at, \
     (SELECT COUNT(*) FROM article_reactions r \
       WHERE r.article_id = a.id AND r.reaction = 'like') AS likes, \
     (SELECT COUNT(*) FROM article_reactions r \
       WHERE r.article_id = a.id AND r.reaction = 'dislike') AS dislikes";

pub(crate) const ARTICLE_JOINS: &str = "JOIN users u ON u.id = a.author_id \
     JOIN categories c ON c.id = a.category_id";

pub(crate) fn article_from_row(row: &PgRow) -> Article {
    Article {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        author_id: row.get("author_id"),
        author_username: row.get("author_username"),
        category: Category {
            id: row.get("category_id"),
            name: row.get("category_name"),
        },
        photo_key: row.get("photo_key"),
        photo_url: None,
        view_count: row.get("view_count"),
        likes: row.get("likes"),
        dislikes: row.get("dislikes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[derive(Debug, Clone)]
pub struct ArticlePage {
    pub window: PageWindow,
    pub items: Vec<Article>,
}

#[derive(Debug)]
pub struct ArticleUpdate {
    pub article: Article,
    /// Photo key that is no longer referenced by the article.
    pub detached_photo: Option<String>,
}

/// The stored photo is detached when the update names a different one or none.
fn detached_photo(current: Option<String>, requested: &Option<Option<String>>) -> Option<String> {
    match requested {
        Some(next) if next.as_ref() != current.as_ref() => current,
        _ => None,
    }
}

/// Outcome of a write that only the article's author may perform.
#[derive(Debug)]
pub enum AuthorOnly<T> {
    Done(T),
    NotFound,
    NotAuthor,
}

#[derive(Clone)]
pub struct CatalogService {
    db: Db,
}

impl CatalogService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Newest-first page of articles, optionally limited to one category.
    ///
    /// `page` is the raw query value; anything unusable resolves to page 1.
    pub async fn list_articles(
        &self,
        page: Option<&str>,
        category_id: Option<Uuid>,
    ) -> Result<ArticlePage> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM articles WHERE ($1::uuid IS NULL OR category_id = $1)",
        )
        .bind(category_id)
        .fetch_one(self.db.pool())
        .await?;

        let window = PageWindow::resolve(page, total, PAGE_SIZE);

        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles a {ARTICLE_JOINS} \
             WHERE ($1::uuid IS NULL OR a.category_id = $1) \
             ORDER BY a.created_at DESC, a.id DESC \
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&sql)
            .bind(category_id)
            .bind(window.limit())
            .bind(window.offset())
            .fetch_all(self.db.pool())
            .await?;

        Ok(ArticlePage {
            window,
            items: rows.iter().map(article_from_row).collect(),
        })
    }

    pub async fn get_article(&self, article_id: Uuid) -> Result<Option<Article>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles a {ARTICLE_JOINS} WHERE a.id = $1");
        let row = sqlx::query(&sql)
            .bind(article_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(article_from_row))
    }

    pub async fn article_exists(&self, article_id: Uuid) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM articles WHERE id = $1)")
                .bind(article_id)
                .fetch_one(self.db.pool())
                .await?;
        Ok(exists)
    }

    pub async fn create_article(&self, author_id: Uuid, new: NewArticle) -> Result<Article> {
        let mut tx = self.db.pool().begin().await?;
        let category = get_or_create_with_conn(&new.category_name, &mut tx).await?;

        let article_id: Uuid = sqlx::query_scalar(
            "INSERT INTO articles (author_id, category_id, title, content, photo_key) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(author_id)
        .bind(category.id)
        .bind(&new.title)
        .bind(&new.content)
        .bind(&new.photo_key)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_article(article_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("article {} vanished after insert", article_id))
    }

    /// Applies `changes` for the author. When the photo is replaced or
    /// cleared, the old key comes back in [`ArticleUpdate::detached_photo`].
    pub async fn update_article(
        &self,
        article_id: Uuid,
        actor_id: Uuid,
        changes: ArticleChanges,
    ) -> Result<AuthorOnly<ArticleUpdate>> {
        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query("SELECT author_id, photo_key FROM articles WHERE id = $1 FOR UPDATE")
            .bind(article_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(AuthorOnly::NotFound);
        };
        if row.get::<Uuid, _>("author_id") != actor_id {
            return Ok(AuthorOnly::NotAuthor);
        }
        let detached_photo = detached_photo(row.get("photo_key"), &changes.photo_key);

        let category_id = match changes.category_name.as_deref() {
            Some(name) => Some(get_or_create_with_conn(name, &mut tx).await?.id),
            None => None,
        };

        sqlx::query(
            "UPDATE articles \
             SET title = COALESCE($2, title), \
                 content = COALESCE($3, content), \
                 category_id = COALESCE($4, category_id), \
                 photo_key = CASE WHEN $5 THEN $6 ELSE photo_key END, \
                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(article_id)
        .bind(changes.title)
        .bind(changes.content)
        .bind(category_id)
        .bind(changes.photo_key.is_some())
        .bind(changes.photo_key.flatten())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        match self.get_article(article_id).await? {
            Some(article) => Ok(AuthorOnly::Done(ArticleUpdate {
                article,
                detached_photo,
            })),
            None => Ok(AuthorOnly::NotFound),
        }
    }

    /// Deletes the article with its comments, bookmarks, reactions and views.
    ///
    /// Returns the photo key that was attached, if any.
    pub async fn delete_article(
        &self,
        article_id: Uuid,
        actor_id: Uuid,
    ) -> Result<AuthorOnly<Option<String>>> {
        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query("SELECT author_id, photo_key FROM articles WHERE id = $1 FOR UPDATE")
            .bind(article_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Ok(AuthorOnly::NotFound);
        };
        let author_id: Uuid = row.get("author_id");
        if author_id != actor_id {
            return Ok(AuthorOnly::NotAuthor);
        }
        let photo_key: Option<String> = row.get("photo_key");

        sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(article_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(AuthorOnly::Done(photo_key))
    }

    pub async fn list_by_author(&self, author_id: Uuid) -> Result<Vec<Article>> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles a {ARTICLE_JOINS} \
             WHERE a.author_id = $1 \
             ORDER BY a.created_at DESC, a.id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(author_id)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(article_from_row).collect())
    }
}
