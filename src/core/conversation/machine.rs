use chrono::Utc;
use std::sync::Arc;

use crate::core::conversation::command::Command;
use crate::core::conversation::prompts;
use crate::core::conversation::transition::{plan, Action, Notice};
use crate::core::conversation::ConversationError;
use crate::core::discovery::{CandidateDiscoveryEngine, MatchOutcome};
use crate::core::validation::{validate_age, validate_city};
use crate::models::{ConversationRecord, ConversationState, CriteriaDraft};
use crate::services::store::PersistenceStore;
use crate::services::transport::{Keyboard, MessagingTransport, OutboundMessage};

/// Result of handling one message
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// State committed for the user; `None` if handling failed and nothing was committed
    pub state: Option<ConversationState>,
    /// Messages handed to the transport, in order
    pub messages: Vec<OutboundMessage>,
}

/// Per-user dialogue controller.
///
/// Each message loads the persisted record, plans the transition, runs its
/// side effects, commits the new state with one upsert and only then talks
/// to the user. Callers must serialise messages of the same user.
pub struct ConversationStateMachine {
    engine: Arc<CandidateDiscoveryEngine>,
    store: Arc<dyn PersistenceStore>,
    transport: Arc<dyn MessagingTransport>,
}

struct Executed {
    state: ConversationState,
    criteria: CriteriaDraft,
    messages: Vec<OutboundMessage>,
}

impl ConversationStateMachine {
    pub fn new(
        engine: Arc<CandidateDiscoveryEngine>,
        store: Arc<dyn PersistenceStore>,
        transport: Arc<dyn MessagingTransport>,
    ) -> Self {
        Self {
            engine,
            store,
            transport,
        }
    }

    pub fn engine(&self) -> &Arc<CandidateDiscoveryEngine> {
        &self.engine
    }

    /// Handle one command. Never fails: errors become a fallback message
    /// and leave the persisted state unchanged.
    pub async fn handle(&self, user_id: i64, command: &Command) -> Outcome {
        let outcome = match self.process(user_id, command).await {
            Ok((state, messages)) => Outcome {
                state: Some(state),
                messages,
            },
            Err(e) => {
                tracing::error!("Failed to handle {:?} for user {}: {}", command, user_id, e);
                Outcome {
                    state: None,
                    messages: vec![prompts::failure(&e)],
                }
            }
        };

        for message in &outcome.messages {
            if !self.transport.send(user_id, message).await {
                tracing::warn!("Message to user {} was not delivered", user_id);
            }
        }

        outcome
    }

    async fn process(
        &self,
        user_id: i64,
        command: &Command,
    ) -> Result<(ConversationState, Vec<OutboundMessage>), ConversationError> {
        let mut record = self.load(user_id).await?;
        let action = plan(&record.state, &record.criteria, command);

        tracing::debug!(
            "User {} in {} sent {:?}: {:?}",
            user_id,
            record.state.name(),
            command,
            action
        );

        let executed = self.execute(user_id, &record, action).await?;

        record.state = executed.state;
        record.criteria = executed.criteria;
        record.updated_at = Utc::now();
        self.store.upsert_conversation_state(&record).await?;

        tracing::info!("User {} is now in {}", user_id, record.state.name());
        Ok((record.state, executed.messages))
    }

    /// Persisted record, or a fresh one pre-filled from the directory
    async fn load(&self, user_id: i64) -> Result<ConversationRecord, ConversationError> {
        if let Some(record) = self.store.get_conversation_state(user_id).await? {
            return Ok(record);
        }

        tracing::info!("First contact from user {}", user_id);
        let mut record = ConversationRecord::new(user_id);
        match self.engine.lookup_viewer(user_id).await {
            Ok(Some(snapshot)) => {
                record.criteria.age = snapshot.age.and_then(|a| validate_age(a as i64).ok());
                record.criteria.city = snapshot.city.and_then(|c| validate_city(&c).ok());
                record.criteria.sex = snapshot.sex;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Could not look up user {}: {}", user_id, e),
        }
        Ok(record)
    }

    async fn execute(
        &self,
        user_id: i64,
        record: &ConversationRecord,
        action: Action,
    ) -> Result<Executed, ConversationError> {
        let criteria = record.criteria.clone();

        match action {
            Action::Transition {
                state,
                criteria,
                notice,
            } => {
                let mut messages: Vec<OutboundMessage> = notice.iter().map(prompts::notice).collect();
                // Missing-criteria notice already carries the setup keyboard
                if !matches!(notice, Some(Notice::MissingCriteria(_))) {
                    messages.push(prompts::screen(&state, &criteria));
                }
                Ok(Executed {
                    state,
                    criteria,
                    messages,
                })
            }

            Action::Discover {
                criteria: search,
                rating,
            } => {
                let mut messages = Vec::new();
                if let Some((candidate_id, kind)) = rating {
                    self.engine
                        .exclusions()
                        .record_rating(user_id, candidate_id, kind)
                        .await?;
                    messages.push(prompts::rated(kind));
                }

                let state = match self.engine.next_match(user_id, &search).await? {
                    MatchOutcome::Found(candidate) => {
                        messages.push(prompts::candidate_card(&candidate, Keyboard::Search));
                        ConversationState::Searching {
                            criteria: search,
                            current: Some(candidate.external_id),
                        }
                    }
                    MatchOutcome::Exhausted => {
                        messages.push(prompts::exhausted());
                        ConversationState::Searching {
                            criteria: search,
                            current: None,
                        }
                    }
                };
                Ok(Executed {
                    state,
                    criteria,
                    messages,
                })
            }

            Action::AddFavorite { candidate_id } => {
                let added = self.store.add_favorite(user_id, candidate_id).await?;
                Ok(Executed {
                    state: record.state.clone(),
                    criteria,
                    messages: vec![prompts::favorite_added(added)],
                })
            }

            Action::ShowFavorites => {
                let (state, list) = self.favorites(user_id).await?;
                Ok(Executed {
                    state,
                    criteria,
                    messages: vec![list],
                })
            }

            Action::OpenFavorite { candidate_id } => {
                match self.store.get_candidate(candidate_id).await? {
                    Some(candidate) => Ok(Executed {
                        state: ConversationState::ViewingProfile { candidate_id },
                        criteria,
                        messages: vec![prompts::candidate_card(&candidate, Keyboard::Profile)],
                    }),
                    None => Ok(Executed {
                        state: record.state.clone(),
                        criteria,
                        messages: vec![prompts::notice(&Notice::NoSuchFavorite)],
                    }),
                }
            }

            Action::RemoveFavorite { candidate_id } => {
                self.store.remove_favorite(user_id, candidate_id).await?;
                let (state, list) = self.favorites(user_id).await?;
                Ok(Executed {
                    state,
                    criteria,
                    messages: vec![prompts::favorite_removed(), list],
                })
            }
        }
    }

    async fn favorites(
        &self,
        user_id: i64,
    ) -> Result<(ConversationState, OutboundMessage), ConversationError> {
        let favorites = self.store.list_favorites(user_id).await?;
        let shown = favorites.iter().map(|c| c.external_id).collect();
        Ok((
            ConversationState::ViewingFavorites { shown },
            prompts::favorites_list(&favorites),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::discovery::DiscoverySettings;
    use crate::core::rate_limiter::RateLimiter;
    use crate::core::retry::{RetryExecutor, RetryPolicy};
    use crate::models::{PreferredSex, Sex, UserCriteria, UserSnapshot};
    use crate::services::directory::DirectoryError;
    use crate::services::memory::MemoryStore;
    use crate::testing::{RecordingTransport, ScriptedDirectory};
    use std::time::Duration;

    struct Harness {
        machine: ConversationStateMachine,
        store: Arc<MemoryStore>,
        transport: Arc<RecordingTransport>,
    }

    fn harness(directory: ScriptedDirectory) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let engine = Arc::new(CandidateDiscoveryEngine::new(
            Arc::new(directory),
            store.clone(),
            Arc::new(RateLimiter::new(3, Duration::from_secs(1)).unwrap()),
            RetryExecutor::new(RetryPolicy::new(3, Duration::from_millis(100), 2.0)),
            DiscoverySettings::default(),
        ));
        Harness {
            machine: ConversationStateMachine::new(engine, store.clone(), transport.clone()),
            store,
            transport,
        }
    }

    fn criteria() -> UserCriteria {
        UserCriteria {
            age: 25,
            city: "Moscow".to_string(),
            sex: Sex::Male,
            preferred_sex: PreferredSex::Female,
        }
    }

    async fn seed(store: &MemoryStore, user_id: i64, state: ConversationState) {
        let mut record = ConversationRecord::new(user_id);
        record.state = state;
        let c = criteria();
        record.criteria = CriteriaDraft {
            age: Some(c.age),
            city: Some(c.city),
            sex: c.sex,
            preferred_sex: c.preferred_sex,
        };
        store.upsert_conversation_state(&record).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_shows_first_profile_with_photos() {
        let h = harness(
            ScriptedDirectory::new()
                .with_profile(1, 0)
                .with_profile(2, 0)
                .with_profile(3, 2),
        );
        seed(
            &h.store,
            100,
            ConversationState::Searching {
                criteria: criteria(),
                current: None,
            },
        )
        .await;

        let outcome = h.machine.handle(100, &Command::Next).await;
        assert_eq!(
            outcome.state,
            Some(ConversationState::Searching {
                criteria: criteria(),
                current: Some(3)
            })
        );
        let card = h.transport.last_to(100).unwrap();
        assert_eq!(card.attachment.as_deref(), Some("photo3_1,photo3_2"));

        let excluded = h.store.get_exclusion_set(100).await.unwrap();
        assert!(excluded.contains(&3));
        assert!(!excluded.contains(&1) && !excluded.contains(&2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dislike_records_rating_and_advances() {
        let h = harness(
            ScriptedDirectory::new()
                .with_profile(777, 1)
                .with_profile(778, 1),
        );
        seed(&h.store, 100, ConversationState::MainMenu).await;

        let first = h.machine.handle(100, &Command::Search).await;
        assert!(matches!(
            first.state,
            Some(ConversationState::Searching { current: Some(777), .. })
        ));

        let second = h.machine.handle(100, &Command::Dislike).await;
        assert!(matches!(
            second.state,
            Some(ConversationState::Searching { current: Some(778), .. })
        ));
        assert_eq!(second.messages.len(), 2);

        let entries = h.store.get_exclusion_entries(100).await.unwrap();
        assert!(entries
            .iter()
            .any(|e| e.candidate_id == 777 && e.kind == crate::models::ExclusionKind::Disliked));

        let third = h.machine.handle(100, &Command::Next).await;
        assert!(matches!(
            third.state,
            Some(ConversationState::Searching { current: None, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_contact_prefills_from_directory() {
        let h = harness(ScriptedDirectory::new().with_user(
            5,
            UserSnapshot {
                age: Some(31),
                city: Some("Kazan".to_string()),
                sex: Sex::Female,
            },
        ));

        let outcome = h.machine.handle(5, &Command::Start).await;
        assert_eq!(outcome.state, Some(ConversationState::MainMenu));

        let record = h.store.get_conversation_state(5).await.unwrap().unwrap();
        assert_eq!(record.criteria.age, Some(31));
        assert_eq!(record.criteria.city.as_deref(), Some("Kazan"));
        assert_eq!(record.criteria.sex, Sex::Female);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_sends_fallback_and_commits_nothing() {
        let directory = ScriptedDirectory::new().with_profile(1, 1);
        directory.fail_searches([DirectoryError::UnknownCity("Moscow".into())]);
        let h = harness(directory);
        seed(&h.store, 100, ConversationState::MainMenu).await;

        let outcome = h.machine.handle(100, &Command::Search).await;
        assert_eq!(outcome.state, None);
        assert!(outcome.messages[0].text.contains("could not find the city"));

        let record = h.store.get_conversation_state(100).await.unwrap().unwrap();
        assert_eq!(record.state, ConversationState::MainMenu);
        assert_eq!(h.transport.sent_to(100).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_send_does_not_roll_back() {
        let h = harness(ScriptedDirectory::new());
        seed(&h.store, 100, ConversationState::MainMenu).await;
        h.transport.set_failing(true);

        let outcome = h.machine.handle(100, &Command::Settings).await;
        assert_eq!(outcome.state, Some(ConversationState::SettingPreferences));
        let record = h.store.get_conversation_state(100).await.unwrap().unwrap();
        assert_eq!(record.state, ConversationState::SettingPreferences);
    }

    #[tokio::test(start_paused = true)]
    async fn test_favorites_flow() {
        let h = harness(ScriptedDirectory::new().with_profile(9, 1));
        seed(&h.store, 100, ConversationState::MainMenu).await;

        h.machine.handle(100, &Command::Search).await;
        h.machine.handle(100, &Command::AddFavorite).await;
        assert!(h.transport.last_to(100).unwrap().text.contains("Added"));

        let list = h.machine.handle(100, &Command::Favorites).await;
        assert_eq!(
            list.state,
            Some(ConversationState::ViewingFavorites { shown: vec![9] })
        );

        let opened = h.machine.handle(100, &Command::Open(1)).await;
        assert_eq!(
            opened.state,
            Some(ConversationState::ViewingProfile { candidate_id: 9 })
        );

        let removed = h.machine.handle(100, &Command::RemoveFavorite).await;
        assert_eq!(
            removed.state,
            Some(ConversationState::ViewingFavorites { shown: vec![] })
        );
        assert!(h.store.list_favorites(100).await.unwrap().is_empty());
    }
}
