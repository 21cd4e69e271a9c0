// Model exports
pub mod conversation;
pub mod domain;
pub mod requests;
pub mod responses;

pub use conversation::{ConversationRecord, ConversationState};
pub use domain::{
    Candidate, CriteriaDraft, CriteriaField, DirectoryProfile, ExclusionEntry, ExclusionKind,
    PhotoRef, PreferredSex, RatingKind, SearchStats, Sex, UserCriteria, UserSnapshot,
};
pub use requests::{CallbackEvent, CallbackMessage, CallbackObject};
pub use responses::{ErrorResponse, HealthResponse};
