use async_trait::async_trait;
use thiserror::Error;

use crate::core::retry::Retryable;
use crate::models::{DirectoryProfile, PhotoRef, Sex, UserSnapshot};

/// Errors reported by a directory service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("upstream quota exceeded: {0}")]
    Quota(String),

    #[error("upstream server error: {0}")]
    Server(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown city: {0}")]
    UnknownCity(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid response format: {0}")]
    InvalidResponse(String),

    #[error("profile {0} is not accessible")]
    ProfileUnavailable(i64),
}

impl Retryable for DirectoryError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            DirectoryError::Network(_)
                | DirectoryError::Timeout
                | DirectoryError::Quota(_)
                | DirectoryError::Server(_)
        )
    }
}

/// Parameters of one directory search page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub age_from: u8,
    pub age_to: u8,
    /// `Sex::Unknown` means "any"
    pub sex: Sex,
    pub city: String,
    /// Directory id of `city`, from [`DirectoryClient::resolve_city`]
    pub city_id: i64,
    pub offset: usize,
    pub count: usize,
    pub has_photo: bool,
}

/// Paginated profile search and photo listing
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Directory id of a city name; `UnknownCity` if there is none
    async fn resolve_city(&self, city: &str) -> Result<i64, DirectoryError>;

    /// One page of profiles in directory order
    async fn search(&self, query: &SearchQuery) -> Result<Vec<DirectoryProfile>, DirectoryError>;

    /// Top photos of a profile, most liked first, capped at the configured limit
    async fn top_photos(&self, profile_id: i64) -> Result<Vec<PhotoRef>, DirectoryError>;

    /// What the directory knows about a user; `None` if the user does not exist
    async fn lookup_user(&self, user_id: i64) -> Result<Option<UserSnapshot>, DirectoryError>;

    /// Public link to a profile
    fn profile_link(&self, profile: &DirectoryProfile) -> String;
}
