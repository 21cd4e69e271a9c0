use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::config::DatabaseSettings;
use crate::models::{
    Candidate, ConversationRecord, ConversationState, CriteriaDraft, ExclusionEntry,
    ExclusionKind, PhotoRef, RatingKind, UserCriteria,
};
use crate::services::store::{PersistenceStore, StoreError};

/// Rating kinds as stored in PostgreSQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "rating_kind", rename_all = "lowercase")]
pub enum PgRatingKind {
    Liked,
    Disliked,
    Blacklisted,
}

impl From<RatingKind> for PgRatingKind {
    fn from(value: RatingKind) -> Self {
        match value {
            RatingKind::Liked => PgRatingKind::Liked,
            RatingKind::Disliked => PgRatingKind::Disliked,
            RatingKind::Blacklisted => PgRatingKind::Blacklisted,
        }
    }
}

fn exclusion_kind(raw: &str) -> Result<ExclusionKind, StoreError> {
    match raw {
        "viewed" => Ok(ExclusionKind::Viewed),
        "liked" => Ok(ExclusionKind::Liked),
        "disliked" => Ok(ExclusionKind::Disliked),
        "blacklisted" => Ok(ExclusionKind::Blacklisted),
        other => Err(StoreError::Corrupt(format!("unknown exclusion kind {:?}", other))),
    }
}

/// PostgreSQL-backed persistence.
///
/// Every trait method is one statement or one transaction, so a cancelled
/// caller never leaves a half-written row behind.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and run migrations
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, StoreError> {
        tracing::info!(
            "Connecting to PostgreSQL (max {} connections)",
            settings.max_connections
        );

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(settings.idle_timeout_secs))
            .test_before_acquire(true)
            .connect(&settings.url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    async fn photos_for(&self, ids: &[i64]) -> Result<HashMap<i64, Vec<PhotoRef>>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT candidate_id, attachment_ref, like_count
            FROM candidate_photos
            WHERE candidate_id = ANY($1)
            ORDER BY candidate_id, position
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut photos: HashMap<i64, Vec<PhotoRef>> = HashMap::new();
        for row in rows {
            let candidate_id: i64 = row.try_get("candidate_id")?;
            photos.entry(candidate_id).or_default().push(PhotoRef::new(
                row.try_get::<String, _>("attachment_ref")?,
                row.try_get::<i64, _>("like_count")?,
            ));
        }
        Ok(photos)
    }
}

fn candidate_from_row(row: &PgRow, photos: Vec<PhotoRef>) -> Result<Candidate, StoreError> {
    let Json(source_criteria): Json<UserCriteria> = row.try_get("source_criteria")?;
    Ok(Candidate {
        external_id: row.try_get("external_id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        profile_link: row.try_get("profile_link")?,
        photos,
        source_criteria,
    })
}

#[async_trait]
impl PersistenceStore for PgStore {
    async fn upsert_candidate(&self, candidate: &Candidate) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO candidates (external_id, first_name, last_name, profile_link, source_criteria)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (external_id)
            DO UPDATE SET
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                profile_link = EXCLUDED.profile_link,
                source_criteria = EXCLUDED.source_criteria,
                updated_at = NOW()
            "#,
        )
        .bind(candidate.external_id)
        .bind(&candidate.first_name)
        .bind(&candidate.last_name)
        .bind(&candidate.profile_link)
        .bind(Json(&candidate.source_criteria))
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM candidate_photos WHERE candidate_id = $1")
            .bind(candidate.external_id)
            .execute(&mut *tx)
            .await?;

        for (position, photo) in candidate.photos.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO candidate_photos (candidate_id, position, attachment_ref, like_count)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(candidate.external_id)
            .bind(position as i32)
            .bind(&photo.attachment_ref)
            .bind(photo.like_count)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            "Stored candidate {} with {} photos",
            candidate.external_id,
            candidate.photos.len()
        );
        Ok(())
    }

    async fn get_candidate(&self, candidate_id: i64) -> Result<Option<Candidate>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT external_id, first_name, last_name, profile_link, source_criteria
            FROM candidates
            WHERE external_id = $1
            "#,
        )
        .bind(candidate_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut photos = self.photos_for(&[candidate_id]).await?;
        let candidate = candidate_from_row(&row, photos.remove(&candidate_id).unwrap_or_default())?;
        Ok(Some(candidate))
    }

    async fn record_viewed(&self, viewer_id: i64, candidate_id: i64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO viewed_profiles (viewer_id, candidate_id, viewed_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (viewer_id, candidate_id)
            DO UPDATE SET viewed_at = EXCLUDED.viewed_at
            "#,
        )
        .bind(viewer_id)
        .bind(candidate_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_rating(
        &self,
        viewer_id: i64,
        candidate_id: i64,
        kind: RatingKind,
    ) -> Result<(), StoreError> {
        let kind = PgRatingKind::from(kind);
        sqlx::query(
            r#"
            INSERT INTO candidate_ratings (viewer_id, candidate_id, kind, rated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (viewer_id, candidate_id)
            DO UPDATE SET
                kind = EXCLUDED.kind,
                rated_at = EXCLUDED.rated_at
            "#,
        )
        .bind(viewer_id)
        .bind(candidate_id)
        .bind(kind)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Recorded rating {} -> {} ({:?})", viewer_id, candidate_id, kind);
        Ok(())
    }

    async fn get_exclusion_set(&self, viewer_id: i64) -> Result<HashSet<i64>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT candidate_id FROM viewed_profiles WHERE viewer_id = $1
            UNION
            SELECT candidate_id FROM candidate_ratings WHERE viewer_id = $1
            "#,
        )
        .bind(viewer_id)
        .fetch_all(&self.pool)
        .await?;

        let ids = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("candidate_id"))
            .collect::<Result<HashSet<_>, _>>()?;

        tracing::debug!("Viewer {} has {} excluded profiles", viewer_id, ids.len());
        Ok(ids)
    }

    async fn get_exclusion_entries(&self, viewer_id: i64) -> Result<Vec<ExclusionEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT candidate_id, 'viewed' AS kind, viewed_at AS at
            FROM viewed_profiles WHERE viewer_id = $1
            UNION ALL
            SELECT candidate_id, kind::text AS kind, rated_at AS at
            FROM candidate_ratings WHERE viewer_id = $1
            ORDER BY at, candidate_id
            "#,
        )
        .bind(viewer_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ExclusionEntry {
                    viewer_id,
                    candidate_id: row.try_get("candidate_id")?,
                    kind: exclusion_kind(row.try_get::<&str, _>("kind")?)?,
                    timestamp: row.try_get("at")?,
                })
            })
            .collect()
    }

    async fn add_favorite(&self, viewer_id: i64, candidate_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO favorites (viewer_id, candidate_id)
            VALUES ($1, $2)
            ON CONFLICT (viewer_id, candidate_id) DO NOTHING
            "#,
        )
        .bind(viewer_id)
        .bind(candidate_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_favorite(&self, viewer_id: i64, candidate_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM favorites WHERE viewer_id = $1 AND candidate_id = $2")
            .bind(viewer_id)
            .bind(candidate_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_favorites(&self, viewer_id: i64) -> Result<Vec<Candidate>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT c.external_id, c.first_name, c.last_name, c.profile_link, c.source_criteria
            FROM favorites f
            JOIN candidates c ON c.external_id = f.candidate_id
            WHERE f.viewer_id = $1
            ORDER BY f.id
            "#,
        )
        .bind(viewer_id)
        .fetch_all(&self.pool)
        .await?;

        let ids = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("external_id"))
            .collect::<Result<Vec<_>, _>>()?;
        let mut photos = self.photos_for(&ids).await?;

        rows.iter()
            .zip(ids.iter())
            .map(|(row, id)| candidate_from_row(row, photos.remove(id).unwrap_or_default()))
            .collect()
    }

    async fn upsert_conversation_state(&self, record: &ConversationRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO conversation_states (user_id, state, criteria, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id)
            DO UPDATE SET
                state = EXCLUDED.state,
                criteria = EXCLUDED.criteria,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.user_id)
        .bind(Json(&record.state))
        .bind(Json(&record.criteria))
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_conversation_state(&self, user_id: i64) -> Result<Option<ConversationRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, state, criteria, updated_at
            FROM conversation_states
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let Json(state): Json<ConversationState> = row.try_get("state")?;
        let Json(criteria): Json<CriteriaDraft> = row.try_get("criteria")?;
        Ok(Some(ConversationRecord {
            user_id: row.try_get("user_id")?,
            state,
            criteria,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}
