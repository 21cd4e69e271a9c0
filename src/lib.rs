//! Lume Matchbot - candidate discovery and conversation engine for a VK dating bot
//!
//! A viewer sets search criteria through a button-driven dialogue; the
//! discovery engine pages through the VK user directory and proposes one
//! candidate at a time, never repeating a profile the viewer has already
//! seen or rated.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;
pub mod testing;

// Re-export commonly used types
pub use core::{CandidateDiscoveryEngine, Command, ConversationStateMachine, Dispatcher, InboundMessage};
pub use models::{Candidate, ConversationState, CriteriaDraft, UserCriteria};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        assert_eq!(Command::parse("next", None), Command::Next);
        assert!(CriteriaDraft::default().complete().is_none());
    }
}
