// Conversation state machine
pub mod command;
pub mod machine;
pub mod prompts;
pub mod transition;

#[cfg(test)]
mod proptests;

pub use command::Command;
pub use machine::{ConversationStateMachine, Outcome};
pub use transition::{plan, Action, Notice};

use thiserror::Error;

use crate::core::discovery::DiscoveryError;
use crate::services::store::StoreError;

/// Failure while handling one message; the persisted state is left as it was
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("store failed: {0}")]
    Store(#[from] StoreError),
}
