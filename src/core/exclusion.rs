use std::collections::HashSet;
use std::sync::Arc;

use crate::models::{ExclusionEntry, ExclusionKind, RatingKind};
use crate::services::store::{PersistenceStore, StoreError};

/// Per-kind counts over a viewer's exclusion history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExclusionCounts {
    pub viewed: usize,
    pub liked: usize,
    pub disliked: usize,
    pub blacklisted: usize,
}

/// Record of candidates a viewer has already been shown or has judged.
///
/// The exclusion set (viewed ∪ rated) is both the dedup set and the source
/// of the search offset, so it is always read from the store rather than
/// cached.
#[derive(Clone)]
pub struct ExclusionStore {
    store: Arc<dyn PersistenceStore>,
}

impl ExclusionStore {
    pub fn new(store: Arc<dyn PersistenceStore>) -> Self {
        Self { store }
    }

    pub async fn record_viewed(&self, viewer_id: i64, candidate_id: i64) -> Result<(), StoreError> {
        tracing::debug!("Recording viewer {} viewed {}", viewer_id, candidate_id);
        self.store.record_viewed(viewer_id, candidate_id).await
    }

    pub async fn record_rating(
        &self,
        viewer_id: i64,
        candidate_id: i64,
        kind: RatingKind,
    ) -> Result<(), StoreError> {
        tracing::debug!("Recording viewer {} rated {} as {:?}", viewer_id, candidate_id, kind);
        self.store.record_rating(viewer_id, candidate_id, kind).await
    }

    pub async fn exclusion_set(&self, viewer_id: i64) -> Result<HashSet<i64>, StoreError> {
        self.store.get_exclusion_set(viewer_id).await
    }

    pub async fn entries(&self, viewer_id: i64) -> Result<Vec<ExclusionEntry>, StoreError> {
        self.store.get_exclusion_entries(viewer_id).await
    }

    pub async fn counts(&self, viewer_id: i64) -> Result<ExclusionCounts, StoreError> {
        let entries = self.entries(viewer_id).await?;
        Ok(count_entries(&entries))
    }
}

pub fn count_entries(entries: &[ExclusionEntry]) -> ExclusionCounts {
    entries
        .iter()
        .fold(ExclusionCounts::default(), |mut counts, entry| {
            match entry.kind {
                ExclusionKind::Viewed => counts.viewed += 1,
                ExclusionKind::Liked => counts.liked += 1,
                ExclusionKind::Disliked => counts.disliked += 1,
                ExclusionKind::Blacklisted => counts.blacklisted += 1,
            }
            counts
        })
}
