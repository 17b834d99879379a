use anyhow::Result;
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use crate::domain::engagement::{Reaction, ReactionState, ReactionTotals};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct EngagementService {
    db: Db,
}

impl EngagementService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Puts `user_id` in the like or dislike set of the article.
    ///
    /// Holding the requested reaction already is a no-op. Switching moves the
    /// user out of the opposite set in the same statement; the
    /// (article_id, user_id) primary key keeps the two sets disjoint.
    /// Returns `None` when the article does not exist.
    pub async fn set_reaction(
        &self,
        article_id: Uuid,
        user_id: Uuid,
        reaction: Reaction,
    ) -> Result<Option<ReactionState>> {
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

        let changed = sqlx::query(
            "INSERT INTO article_reactions (article_id, user_id, reaction) \
             VALUES ($1, $2, $3::reaction_kind) \
             ON CONFLICT (article_id, user_id) DO UPDATE \
                SET reaction = EXCLUDED.reaction, created_at = now() \
                WHERE article_reactions.reaction <> EXCLUDED.reaction",
        )
        .bind(article_id)
        .bind(user_id)
        .bind(reaction.as_db())
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        let state = reaction_state_with_conn(article_id, Some(user_id), &mut tx).await?;
        tx.commit().await?;

        tracing::debug!(
            article_id = %article_id,
            user_id = %user_id,
            reaction = reaction.as_db(),
            changed,
            "reaction set"
        );

        Ok(Some(state))
    }

    /// Counts and the viewer's own reaction; anonymous viewers get both flags false.
    pub async fn reaction_state(
        &self,
        article_id: Uuid,
        viewer_id: Option<Uuid>,
    ) -> Result<ReactionState> {
        let mut conn = self.db.pool().acquire().await?;
        reaction_state_with_conn(article_id, viewer_id, &mut conn).await
    }

    pub async fn reaction_counts(&self, article_id: Uuid) -> Result<Option<ReactionTotals>> {
        let row = sqlx::query(
            "SELECT \
                (SELECT COUNT(*) FROM article_reactions r \
                  WHERE r.article_id = a.id AND r.reaction = 'like') AS likes, \
                (SELECT COUNT(*) FROM article_reactions r \
                  WHERE r.article_id = a.id AND r.reaction = 'dislike') AS dislikes \
             FROM articles a WHERE a.id = $1",
        )
        .bind(article_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| ReactionTotals {
            likes: row.get("likes"),
            dislikes: row.get("dislikes"),
        }))
    }

    /// Likes and dislikes summed over every article written by `author_id`.
    pub async fn author_reaction_totals(&self, author_id: Uuid) -> Result<ReactionTotals> {
        let row = sqlx::query(
            "SELECT \
                COUNT(*) FILTER (WHERE r.reaction = 'like') AS likes, \
                COUNT(*) FILTER (WHERE r.reaction = 'dislike') AS dislikes \
             FROM article_reactions r \
             JOIN articles a ON a.id = r.article_id \
             WHERE a.author_id = $1",
        )
        .bind(author_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(ReactionTotals {
            likes: row.get("likes"),
            dislikes: row.get("dislikes"),
        })
    }

    /// Counts a view once per (article, viewer). The author's own views never count.
    ///
    /// Returns whether the view count was incremented.
    pub async fn record_view(&self, article_id: Uuid, viewer_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "WITH fresh AS ( \
                INSERT INTO article_views (article_id, user_id) \
                SELECT a.id, $2 FROM articles a \
                WHERE a.id = $1 AND a.author_id <> $2 \
                ON CONFLICT (article_id, user_id) DO NOTHING \
                RETURNING article_id \
             ) \
             UPDATE articles SET view_count = view_count + 1 \
             WHERE id IN (SELECT article_id FROM fresh)",
        )
        .bind(article_id)
        .bind(viewer_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

async fn reaction_state_with_conn(
    article_id: Uuid,
    viewer_id: Option<Uuid>,
    conn: &mut PgConnection,
) -> Result<ReactionState> {
    let row = sqlx::query(
        "SELECT \
            COUNT(*) FILTER (WHERE reaction = 'like') AS likes, \
            COUNT(*) FILTER (WHERE reaction = 'dislike') AS dislikes, \
            COALESCE(BOOL_OR(user_id = $2 AND reaction = 'like'), false) AS is_liked, \
            COALESCE(BOOL_OR(user_id = $2 AND reaction = 'dislike'), false) AS is_disliked \
         FROM article_reactions \
         WHERE article_id = $1",
    )
    .bind(article_id)
    .bind(viewer_id)
    .fetch_one(conn)
    .await?;

    Ok(ReactionState {
        likes: row.get("likes"),
        dislikes: row.get("dislikes"),
        is_liked: row.get("is_liked"),
        is_disliked: row.get("is_disliked"),
    })
}
