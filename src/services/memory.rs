use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};

use crate::models::{Candidate, ConversationRecord, ExclusionEntry, ExclusionKind, RatingKind};
use crate::services::store::{PersistenceStore, StoreError};

/// Process-local store backed by concurrent maps.
///
/// Each operation touches a single map entry, so it is atomic with respect
/// to other callers. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    candidates: DashMap<i64, Candidate>,
    viewed: DashMap<i64, HashMap<i64, DateTime<Utc>>>,
    ratings: DashMap<i64, HashMap<i64, (RatingKind, DateTime<Utc>)>>,
    favorites: DashMap<i64, Vec<i64>>,
    conversations: DashMap<i64, ConversationRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn upsert_candidate(&self, candidate: &Candidate) -> Result<(), StoreError> {
        self.candidates
            .insert(candidate.external_id, candidate.clone());
        Ok(())
    }

    async fn get_candidate(&self, candidate_id: i64) -> Result<Option<Candidate>, StoreError> {
        Ok(self.candidates.get(&candidate_id).map(|c| c.clone()))
    }

    async fn record_viewed(&self, viewer_id: i64, candidate_id: i64) -> Result<(), StoreError> {
        self.viewed
            .entry(viewer_id)
            .or_default()
            .insert(candidate_id, Utc::now());
        Ok(())
    }

    async fn record_rating(
        &self,
        viewer_id: i64,
        candidate_id: i64,
        kind: RatingKind,
    ) -> Result<(), StoreError> {
        self.ratings
            .entry(viewer_id)
            .or_default()
            .insert(candidate_id, (kind, Utc::now()));
        Ok(())
    }

    async fn get_exclusion_set(&self, viewer_id: i64) -> Result<HashSet<i64>, StoreError> {
        let mut set = HashSet::new();
        if let Some(viewed) = self.viewed.get(&viewer_id) {
            set.extend(viewed.keys().copied());
        }
        if let Some(ratings) = self.ratings.get(&viewer_id) {
            set.extend(ratings.keys().copied());
        }
        Ok(set)
    }

    async fn get_exclusion_entries(&self, viewer_id: i64) -> Result<Vec<ExclusionEntry>, StoreError> {
        let mut entries = Vec::new();

        if let Some(viewed) = self.viewed.get(&viewer_id) {
            entries.extend(viewed.iter().map(|(id, ts)| ExclusionEntry {
                viewer_id,
                candidate_id: *id,
                kind: ExclusionKind::Viewed,
                timestamp: *ts,
            }));
        }
        if let Some(ratings) = self.ratings.get(&viewer_id) {
            entries.extend(ratings.iter().map(|(id, (kind, ts))| ExclusionEntry {
                viewer_id,
                candidate_id: *id,
                kind: (*kind).into(),
                timestamp: *ts,
            }));
        }

        entries.sort_by_key(|e| (e.timestamp, e.candidate_id));
        Ok(entries)
    }

    async fn add_favorite(&self, viewer_id: i64, candidate_id: i64) -> Result<bool, StoreError> {
        let mut favorites = self.favorites.entry(viewer_id).or_default();
        if favorites.contains(&candidate_id) {
            return Ok(false);
        }
        favorites.push(candidate_id);
        Ok(true)
    }

    async fn remove_favorite(&self, viewer_id: i64, candidate_id: i64) -> Result<bool, StoreError> {
        let Some(mut favorites) = self.favorites.get_mut(&viewer_id) else {
            return Ok(false);
        };
        let before = favorites.len();
        favorites.retain(|id| *id != candidate_id);
        Ok(favorites.len() != before)
    }

    async fn list_favorites(&self, viewer_id: i64) -> Result<Vec<Candidate>, StoreError> {
        let ids = self
            .favorites
            .get(&viewer_id)
            .map(|f| f.clone())
            .unwrap_or_default();

        Ok(ids
            .iter()
            .filter_map(|id| self.candidates.get(id).map(|c| c.clone()))
            .collect())
    }

    async fn upsert_conversation_state(&self, record: &ConversationRecord) -> Result<(), StoreError> {
        self.conversations.insert(record.user_id, record.clone());
        Ok(())
    }

    async fn get_conversation_state(&self, user_id: i64) -> Result<Option<ConversationRecord>, StoreError> {
        Ok(self.conversations.get(&user_id).map(|r| r.clone()))
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConversationState, PreferredSex, Sex, UserCriteria};

    fn candidate(id: i64) -> Candidate {
        Candidate {
            external_id: id,
            first_name: "Anna".to_string(),
            last_name: "K".to_string(),
            profile_link: format!("https://vk.com/id{}", id),
            photos: vec![crate::models::PhotoRef::new(format!("photo{}_1", id), 5)],
            source_criteria: UserCriteria {
                age: 25,
                city: "Moscow".to_string(),
                sex: Sex::Male,
                preferred_sex: PreferredSex::Any,
            },
        }
    }

    #[tokio::test]
    async fn test_favorites_keep_insertion_order() {
        let store = MemoryStore::new();
        for id in [3, 1, 2] {
            store.upsert_candidate(&candidate(id)).await.unwrap();
        }

        assert!(store.add_favorite(7, 3).await.unwrap());
        assert!(store.add_favorite(7, 1).await.unwrap());
        assert!(!store.add_favorite(7, 3).await.unwrap());
        assert!(store.add_favorite(7, 2).await.unwrap());

        let ids: Vec<i64> = store
            .list_favorites(7)
            .await
            .unwrap()
            .iter()
            .map(|c| c.external_id)
            .collect();
        assert_eq!(ids, vec![3, 1, 2]);

        assert!(store.remove_favorite(7, 1).await.unwrap());
        assert!(!store.remove_favorite(7, 1).await.unwrap());
        assert_eq!(store.list_favorites(7).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_favorites_do_not_exclude() {
        let store = MemoryStore::new();
        store.upsert_candidate(&candidate(5)).await.unwrap();
        store.add_favorite(1, 5).await.unwrap();
        assert!(store.get_exclusion_set(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_conversation_upsert_overwrites() {
        let store = MemoryStore::new();
        let mut record = ConversationRecord::new(9);
        store.upsert_conversation_state(&record).await.unwrap();

        record.state = ConversationState::SettingAge;
        store.upsert_conversation_state(&record).await.unwrap();

        let loaded = store.get_conversation_state(9).await.unwrap().unwrap();
        assert_eq!(loaded.state, ConversationState::SettingAge);
        assert!(store.get_conversation_state(10).await.unwrap().is_none());
    }
}
