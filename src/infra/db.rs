use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;
use std::time::Duration;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(config.db_connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.db_idle_timeout_seconds))
            .max_lifetime(Duration::from_secs(config.db_max_lifetime_seconds))
            .connect(&config.database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Applies every `*.sql` file in `dir` in filename order.
    ///
    /// The scripts are written to be re-runnable (`IF NOT EXISTS` guards).
    pub async fn apply_migrations(&self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let mut files: Vec<_> = std::fs::read_dir(dir)
            .with_context(|| format!("cannot read {}", dir.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().map_or(false, |ext| ext == "sql"))
            .collect();
        files.sort();

        for path in &files {
            let sql = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            sqlx::raw_sql(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("migration {} failed", path.display()))?;
            tracing::info!(migration = %path.display(), "applied migration");
        }

        Ok(files.len())
    }
}

pub const UNIQUE_VIOLATION: &str = "23505";
pub const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Name of the constraint behind a database error with the given SQLSTATE.
///
/// Returns `Some("")` when the driver reports the code without a constraint name.
pub fn violated_constraint<'a>(err: &'a sqlx::Error, sqlstate: &str) -> Option<&'a str> {
    let db_err = err.as_database_error()?;
    if db_err.code().as_deref() != Some(sqlstate) {
        return None;
    }
    Some(db_err.constraint().unwrap_or_default())
}
