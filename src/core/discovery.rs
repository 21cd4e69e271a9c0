use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use crate::core::exclusion::ExclusionStore;
use crate::core::rate_limiter::RateLimiter;
use crate::core::retry::{RetryError, RetryExecutor};
use crate::core::validation::{validate_criteria, ValidationError};
use crate::models::{Candidate, DirectoryProfile, SearchStats, UserCriteria, UserSnapshot};
use crate::services::directory::{DirectoryClient, DirectoryError, SearchQuery};
use crate::services::store::{PersistenceStore, StoreError};

/// Errors surfaced by candidate discovery
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid criteria: {0}")]
    Validation(#[from] ValidationError),

    #[error("directory unavailable after {attempts} attempts: {last}")]
    TransientUpstream { attempts: u32, last: DirectoryError },

    #[error("directory rejected the request: {0}")]
    TerminalUpstream(DirectoryError),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl From<RetryError<DirectoryError>> for DiscoveryError {
    fn from(err: RetryError<DirectoryError>) -> Self {
        match err {
            RetryError::Terminal(e) => DiscoveryError::TerminalUpstream(e),
            RetryError::Exhausted { attempts, last } => {
                DiscoveryError::TransientUpstream { attempts, last }
            }
        }
    }
}

/// Result of one discovery pass
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Found(Candidate),
    /// The current page held no unseen profile with photos
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverySettings {
    /// Years either side of the viewer's age
    pub age_tolerance: u8,
    pub page_size: usize,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            age_tolerance: 5,
            page_size: 100,
        }
    }
}

/// Produces the next unseen, photo-bearing candidate for a viewer
pub struct CandidateDiscoveryEngine {
    directory: Arc<dyn DirectoryClient>,
    store: Arc<dyn PersistenceStore>,
    exclusions: ExclusionStore,
    limiter: Arc<RateLimiter>,
    retry: RetryExecutor,
    settings: DiscoverySettings,
}

impl CandidateDiscoveryEngine {
    pub fn new(
        directory: Arc<dyn DirectoryClient>,
        store: Arc<dyn PersistenceStore>,
        limiter: Arc<RateLimiter>,
        retry: RetryExecutor,
        settings: DiscoverySettings,
    ) -> Self {
        Self {
            directory,
            exclusions: ExclusionStore::new(Arc::clone(&store)),
            store,
            limiter,
            retry,
            settings,
        }
    }

    pub fn exclusions(&self) -> &ExclusionStore {
        &self.exclusions
    }

    pub fn settings(&self) -> DiscoverySettings {
        self.settings
    }

    /// Find the next candidate for `viewer_id`.
    ///
    /// Reads one directory page starting at the size of the viewer's
    /// exclusion set. Profiles without photos are skipped but not excluded,
    /// so they may come back on a later pass.
    pub async fn next_match(
        &self,
        viewer_id: i64,
        criteria: &UserCriteria,
    ) -> Result<MatchOutcome, DiscoveryError> {
        validate_criteria(criteria)?;

        let excluded = self.exclusions.exclusion_set(viewer_id).await?;

        // A lookup of its own, so it is admitted by the limiter like any other call
        let city_id = self
            .call_directory("database.getCities", || self.directory.resolve_city(&criteria.city))
            .await?;

        let query = SearchQuery {
            age_from: criteria.age.saturating_sub(self.settings.age_tolerance),
            age_to: criteria.age.saturating_add(self.settings.age_tolerance),
            sex: criteria.search_sex(),
            city: criteria.city.clone(),
            city_id,
            offset: excluded.len(),
            count: self.settings.page_size,
            has_photo: true,
        };

        tracing::debug!(
            "Searching for viewer {}: ages {}-{}, sex {:?}, city {}, offset {}",
            viewer_id,
            query.age_from,
            query.age_to,
            query.sex,
            query.city,
            query.offset
        );

        let page = self
            .call_directory("users.search", || self.directory.search(&query))
            .await?;
        let page_len = page.len();

        for profile in page {
            if excluded.contains(&profile.id) {
                continue;
            }
            if profile.is_closed {
                tracing::debug!("Skipping closed profile {}", profile.id);
                continue;
            }

            let profile_id = profile.id;
            let photos = match self
                .call_directory("photos.get", || self.directory.top_photos(profile_id))
                .await
            {
                Ok(photos) => photos,
                Err(RetryError::Terminal(DirectoryError::ProfileUnavailable(id))) => {
                    tracing::warn!("Photos of profile {} are not accessible, skipping", id);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if photos.is_empty() {
                tracing::debug!("Profile {} has no photos, skipping", profile_id);
                continue;
            }

            let candidate = self.materialize(&profile, photos, criteria);
            self.store.upsert_candidate(&candidate).await?;
            self.exclusions.record_viewed(viewer_id, candidate.external_id).await?;

            tracing::info!("Matched viewer {} with candidate {}", viewer_id, candidate.external_id);
            return Ok(MatchOutcome::Found(candidate));
        }

        tracing::info!(
            "No acceptable candidate for viewer {} in a page of {} profiles",
            viewer_id,
            page_len
        );
        Ok(MatchOutcome::Exhausted)
    }

    /// What the directory knows about the viewer, for pre-filling criteria
    pub async fn lookup_viewer(&self, user_id: i64) -> Result<Option<UserSnapshot>, DiscoveryError> {
        Ok(self
            .call_directory("users.get", || self.directory.lookup_user(user_id))
            .await?)
    }

    pub async fn stats(&self, viewer_id: i64) -> Result<SearchStats, DiscoveryError> {
        let counts = self.exclusions.counts(viewer_id).await?;
        let favorites = self.store.list_favorites(viewer_id).await?.len();

        let success_rate = if counts.viewed == 0 {
            0.0
        } else {
            favorites as f64 / counts.viewed as f64 * 100.0
        };

        Ok(SearchStats {
            viewer_id,
            viewed: counts.viewed,
            liked: counts.liked,
            disliked: counts.disliked,
            blacklisted: counts.blacklisted,
            favorites,
            success_rate,
        })
    }

    /// Rate limit, then call, under retry. Every attempt takes a slot.
    async fn call_directory<T, F, Fut>(
        &self,
        name: &str,
        mut op: F,
    ) -> Result<T, RetryError<DirectoryError>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DirectoryError>>,
    {
        let limiter = &self.limiter;
        self.retry
            .execute(name, || {
                let call = op();
                async move {
                    limiter.acquire().await;
                    call.await
                }
            })
            .await
    }

    fn materialize(
        &self,
        profile: &DirectoryProfile,
        photos: Vec<crate::models::PhotoRef>,
        criteria: &UserCriteria,
    ) -> Candidate {
        Candidate {
            external_id: profile.id,
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            profile_link: self.directory.profile_link(profile),
            photos,
            source_criteria: criteria.clone(),
        }
    }
}
