use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

use crate::models::{Candidate, ConversationRecord, ExclusionEntry, RatingKind};

/// Errors that can occur when talking to the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

/// Atomic persistence operations consumed by the core.
///
/// Every method is a single atomic write or read; the core never spans a
/// transaction across calls.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn upsert_candidate(&self, candidate: &Candidate) -> Result<(), StoreError>;

    async fn get_candidate(&self, candidate_id: i64) -> Result<Option<Candidate>, StoreError>;

    /// Idempotent; repeating only refreshes the timestamp
    async fn record_viewed(&self, viewer_id: i64, candidate_id: i64) -> Result<(), StoreError>;

    /// Upsert: a candidate carries at most one rating per viewer
    async fn record_rating(
        &self,
        viewer_id: i64,
        candidate_id: i64,
        kind: RatingKind,
    ) -> Result<(), StoreError>;

    /// Union of viewed and rated candidate ids
    async fn get_exclusion_set(&self, viewer_id: i64) -> Result<HashSet<i64>, StoreError>;

    async fn get_exclusion_entries(&self, viewer_id: i64) -> Result<Vec<ExclusionEntry>, StoreError>;

    /// Returns true if the favorite was newly added
    async fn add_favorite(&self, viewer_id: i64, candidate_id: i64) -> Result<bool, StoreError>;

    /// Returns true if a favorite was removed
    async fn remove_favorite(&self, viewer_id: i64, candidate_id: i64) -> Result<bool, StoreError>;

    /// Favorites in insertion order
    async fn list_favorites(&self, viewer_id: i64) -> Result<Vec<Candidate>, StoreError>;

    async fn upsert_conversation_state(&self, record: &ConversationRecord) -> Result<(), StoreError>;

    async fn get_conversation_state(&self, user_id: i64) -> Result<Option<ConversationRecord>, StoreError>;

    async fn health_check(&self) -> Result<bool, StoreError>;
}
