use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use crate::domain::category::Category;
use crate::infra::db::{violated_constraint, Db, FOREIGN_KEY_VIOLATION};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryDeletion {
    Deleted,
    NotFound,
    /// At least one article still references the category.
    InUse,
}

#[derive(Clone)]
pub struct CategoryService {
    db: Db,
}

impl CategoryService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_category(&self, category_id: Uuid) -> Result<Option<Category>> {
        let row = sqlx::query("SELECT id, name FROM categories WHERE id = $1")
            .bind(category_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(category_from_row))
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name FROM categories ORDER BY name, id")
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(category_from_row).collect())
    }

    /// Categories referenced by at least one article.
    pub async fn used_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query(
            "SELECT c.id, c.name \
             FROM categories c \
             WHERE EXISTS (SELECT 1 FROM articles a WHERE a.category_id = c.id) \
             ORDER BY c.name, c.id",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(category_from_row).collect())
    }

    pub async fn delete_category(&self, category_id: Uuid) -> Result<CategoryDeletion> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(category_id)
            .execute(self.db.pool())
            .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => Ok(CategoryDeletion::Deleted),
            Ok(_) => Ok(CategoryDeletion::NotFound),
            Err(err) if violated_constraint(&err, FOREIGN_KEY_VIOLATION).is_some() => {
                Ok(CategoryDeletion::InUse)
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Returns the category called `name`, creating it if needed.
///
/// Safe under concurrent creation of the same name.
pub(crate) async fn get_or_create_with_conn(name: &str, conn: &mut PgConnection) -> Result<Category> {
    let row = sqlx::query(
        "INSERT INTO categories (name) VALUES ($1) \
         ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
         RETURNING id, name",
    )
    .bind(name)
    .fetch_one(conn)
    .await?;

    Ok(category_from_row(&row))
}

fn category_from_row(row: &PgRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
    }
}
