// Core exports
pub mod conversation;
pub mod discovery;
pub mod dispatcher;
pub mod exclusion;
pub mod rate_limiter;
pub mod retry;
pub mod validation;

pub use conversation::{Command, ConversationError, ConversationStateMachine, Outcome};
pub use discovery::{CandidateDiscoveryEngine, DiscoveryError, DiscoverySettings, MatchOutcome};
pub use dispatcher::{Dispatcher, InboundMessage};
pub use exclusion::{ExclusionCounts, ExclusionStore};
pub use rate_limiter::{RateLimiter, RateLimiterError};
pub use retry::{RetryError, RetryExecutor, RetryPolicy, Retryable};
pub use validation::ValidationError;
