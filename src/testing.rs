//! In-process collaborators for tests and benchmarks
//!
//! These stand in for the VK directory and messaging endpoints so the core
//! can be exercised without network I/O.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::models::{DirectoryProfile, PhotoRef, UserSnapshot};
use crate::services::directory::{DirectoryClient, DirectoryError, SearchQuery};
use crate::services::transport::{MessagingTransport, OutboundMessage};

/// Id every known city resolves to
pub const SCRIPTED_CITY_ID: i64 = 1;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Directory with a fixed listing; `search` pages through it by offset
#[derive(Default)]
pub struct ScriptedDirectory {
    listing: Vec<DirectoryProfile>,
    photos: HashMap<i64, Vec<PhotoRef>>,
    users: HashMap<i64, UserSnapshot>,
    unavailable: HashSet<i64>,
    unknown_cities: HashSet<String>,
    search_errors: Mutex<VecDeque<DirectoryError>>,
    photo_errors: Mutex<VecDeque<DirectoryError>>,
    /// Every city name resolved, in order
    pub city_lookups: Mutex<Vec<String>>,
    /// Every search query received, in order
    pub queries: Mutex<Vec<SearchQuery>>,
    /// Every profile id whose photos were requested, in order
    pub photo_requests: Mutex<Vec<i64>>,
}

impl ScriptedDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an open profile with the given number of photos
    pub fn with_profile(mut self, id: i64, photo_count: usize) -> Self {
        self.listing.push(profile(id));
        let photos = (0..photo_count)
            .map(|i| PhotoRef::new(format!("photo{}_{}", id, i + 1), (photo_count - i) as i64 * 10))
            .collect();
        self.photos.insert(id, photos);
        self
    }

    /// Append a closed profile
    pub fn with_closed_profile(mut self, id: i64) -> Self {
        let mut closed = profile(id);
        closed.is_closed = true;
        self.listing.push(closed);
        self.photos.insert(id, vec![PhotoRef::new(format!("photo{}_1", id), 1)]);
        self
    }

    /// Append a profile whose photo listing is denied
    pub fn with_unavailable_profile(mut self, id: i64) -> Self {
        self.listing.push(profile(id));
        self.unavailable.insert(id);
        self
    }

    /// Make `resolve_city` report this name as unknown
    pub fn with_unknown_city(mut self, city: &str) -> Self {
        self.unknown_cities.insert(city.to_lowercase());
        self
    }

    pub fn with_user(mut self, id: i64, snapshot: UserSnapshot) -> Self {
        self.users.insert(id, snapshot);
        self
    }

    /// Fail the next search calls with these errors, in order
    pub fn fail_searches(&self, errors: impl IntoIterator<Item = DirectoryError>) {
        lock(&self.search_errors).extend(errors);
    }

    /// Fail the next photo calls with these errors, in order
    pub fn fail_photos(&self, errors: impl IntoIterator<Item = DirectoryError>) {
        lock(&self.photo_errors).extend(errors);
    }

    pub fn recorded_city_lookups(&self) -> Vec<String> {
        lock(&self.city_lookups).clone()
    }

    pub fn recorded_queries(&self) -> Vec<SearchQuery> {
        lock(&self.queries).clone()
    }

    pub fn recorded_photo_requests(&self) -> Vec<i64> {
        lock(&self.photo_requests).clone()
    }
}

fn profile(id: i64) -> DirectoryProfile {
    DirectoryProfile {
        id,
        first_name: format!("First{}", id),
        last_name: format!("Last{}", id),
        domain: None,
        is_closed: false,
        can_access_closed: true,
    }
}

#[async_trait]
impl DirectoryClient for ScriptedDirectory {
    async fn resolve_city(&self, city: &str) -> Result<i64, DirectoryError> {
        lock(&self.city_lookups).push(city.to_string());
        if self.unknown_cities.contains(&city.to_lowercase()) {
            return Err(DirectoryError::UnknownCity(city.to_string()));
        }
        Ok(SCRIPTED_CITY_ID)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<DirectoryProfile>, DirectoryError> {
        lock(&self.queries).push(query.clone());
        if let Some(error) = lock(&self.search_errors).pop_front() {
            return Err(error);
        }

        Ok(self
            .listing
            .iter()
            .skip(query.offset)
            .take(query.count)
            .cloned()
            .collect())
    }

    async fn top_photos(&self, profile_id: i64) -> Result<Vec<PhotoRef>, DirectoryError> {
        lock(&self.photo_requests).push(profile_id);
        if let Some(error) = lock(&self.photo_errors).pop_front() {
            return Err(error);
        }
        if self.unavailable.contains(&profile_id) {
            return Err(DirectoryError::ProfileUnavailable(profile_id));
        }
        Ok(self.photos.get(&profile_id).cloned().unwrap_or_default())
    }

    async fn lookup_user(&self, user_id: i64) -> Result<Option<UserSnapshot>, DirectoryError> {
        Ok(self.users.get(&user_id).cloned())
    }

    fn profile_link(&self, profile: &DirectoryProfile) -> String {
        format!("https://vk.com/id{}", profile.id)
    }
}

/// Transport that records every message instead of delivering it
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(i64, OutboundMessage)>>,
    failing: Mutex<bool>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends report failure (messages are still recorded)
    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    pub fn sent(&self) -> Vec<(i64, OutboundMessage)> {
        lock(&self.sent).clone()
    }

    pub fn sent_to(&self, user_id: i64) -> Vec<OutboundMessage> {
        lock(&self.sent)
            .iter()
            .filter(|(id, _)| *id == user_id)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn last_to(&self, user_id: i64) -> Option<OutboundMessage> {
        self.sent_to(user_id).pop()
    }

    pub fn clear(&self) {
        lock(&self.sent).clear();
    }
}

#[async_trait]
impl MessagingTransport for RecordingTransport {
    async fn send(&self, user_id: i64, message: &OutboundMessage) -> bool {
        lock(&self.sent).push((user_id, message.clone()));
        !*lock(&self.failing)
    }
}
