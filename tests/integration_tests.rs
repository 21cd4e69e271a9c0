// Integration tests for Lume Matchbot

use lume_matchbot::core::{
    CandidateDiscoveryEngine, Command, ConversationStateMachine, DiscoverySettings, Dispatcher,
    InboundMessage, RateLimiter, RetryExecutor, RetryPolicy,
};
use lume_matchbot::models::{ConversationState, RatingKind, Sex, UserSnapshot};
use lume_matchbot::services::{DirectoryError, MemoryStore, PersistenceStore};
use lume_matchbot::testing::{RecordingTransport, ScriptedDirectory};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const VIEWER: i64 = 1;

struct Harness {
    machine: ConversationStateMachine,
    directory: Arc<ScriptedDirectory>,
    store: Arc<MemoryStore>,
    transport: Arc<RecordingTransport>,
}

fn harness_with_store(directory: ScriptedDirectory, store: Arc<MemoryStore>) -> Harness {
    let directory = Arc::new(directory);
    let transport = Arc::new(RecordingTransport::new());
    let engine = Arc::new(CandidateDiscoveryEngine::new(
        directory.clone(),
        store.clone(),
        Arc::new(RateLimiter::new(3, Duration::from_secs(1)).unwrap()),
        RetryExecutor::new(RetryPolicy::new(3, Duration::from_millis(100), 2.0)),
        DiscoverySettings::default(),
    ));
    let machine = ConversationStateMachine::new(engine, store.clone(), transport.clone());

    Harness {
        machine,
        directory,
        store,
        transport,
    }
}

fn harness(directory: ScriptedDirectory) -> Harness {
    harness_with_store(directory, Arc::new(MemoryStore::new()))
}

fn known_viewer(directory: ScriptedDirectory) -> ScriptedDirectory {
    directory.with_user(
        VIEWER,
        UserSnapshot {
            age: Some(25),
            city: Some("Moscow".to_string()),
            sex: Sex::Male,
        },
    )
}

fn listing() -> ScriptedDirectory {
    known_viewer(
        ScriptedDirectory::new()
            .with_profile(10, 2)
            .with_profile(20, 3)
            .with_profile(30, 1),
    )
}

fn button(keyword: &str) -> Command {
    Command::parse("", Some(&format!(r#"{{"command":"{}"}}"#, keyword)))
}

fn current(state: &Option<ConversationState>) -> Option<i64> {
    match state {
        Some(ConversationState::Searching { current, .. }) => *current,
        _ => None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_integration_dialogue_end_to_end() {
    let h = harness(listing());

    let outcome = h.machine.handle(VIEWER, &Command::parse("start", None)).await;
    assert_eq!(outcome.state, Some(ConversationState::MainMenu));

    // Criteria were pre-filled from the directory, so search starts right away
    let outcome = h.machine.handle(VIEWER, &Command::parse("search", None)).await;
    assert_eq!(current(&outcome.state), Some(10));
    let card = outcome.messages.last().unwrap();
    assert_eq!(card.attachment.as_deref(), Some("photo10_1,photo10_2"));

    let outcome = h.machine.handle(VIEWER, &Command::parse("like", None)).await;
    assert_eq!(current(&outcome.state), Some(20));

    let outcome = h.machine.handle(VIEWER, &button("add_to_favorites")).await;
    assert_eq!(current(&outcome.state), Some(20));

    let outcome = h.machine.handle(VIEWER, &button("favorites")).await;
    assert_eq!(
        outcome.state,
        Some(ConversationState::ViewingFavorites { shown: vec![20] })
    );

    let outcome = h.machine.handle(VIEWER, &Command::parse("open 1", None)).await;
    assert_eq!(
        outcome.state,
        Some(ConversationState::ViewingProfile { candidate_id: 20 })
    );

    let outcome = h.machine.handle(VIEWER, &button("remove_favorite")).await;
    assert_eq!(
        outcome.state,
        Some(ConversationState::ViewingFavorites { shown: vec![] })
    );

    let stats = h.machine.engine().stats(VIEWER).await.unwrap();
    assert_eq!(stats.viewed, 2);
    assert_eq!(stats.liked, 1);
    assert_eq!(stats.favorites, 0);

    // Every handled message produced at least one reply
    assert!(h.transport.sent_to(VIEWER).len() >= 7);
}

#[tokio::test(start_paused = true)]
async fn test_integration_rated_profiles_never_return() {
    let h = harness(listing());
    h.store
        .record_rating(VIEWER, 10, RatingKind::Blacklisted)
        .await
        .unwrap();

    let outcome = h.machine.handle(VIEWER, &Command::Search).await;
    assert_eq!(current(&outcome.state), Some(20));

    let outcome = h.machine.handle(VIEWER, &Command::Dislike).await;
    assert_eq!(current(&outcome.state), Some(30));

    let outcome = h.machine.handle(VIEWER, &Command::Next).await;
    assert_eq!(current(&outcome.state), None);

    let excluded = h.store.get_exclusion_set(VIEWER).await.unwrap();
    assert_eq!(excluded.len(), 3);
    for id in [10, 20, 30] {
        assert!(excluded.contains(&id));
    }
}

#[tokio::test(start_paused = true)]
async fn test_integration_history_survives_restart() {
    let store = Arc::new(MemoryStore::new());

    let first = harness_with_store(listing(), store.clone());
    let outcome = first.machine.handle(VIEWER, &Command::Search).await;
    assert_eq!(current(&outcome.state), Some(10));
    drop(first);

    // A fresh engine over the same store picks up where the last one stopped
    let second = harness_with_store(listing(), store.clone());
    let outcome = second.machine.handle(VIEWER, &Command::Next).await;
    assert_eq!(current(&outcome.state), Some(20));
    assert!(second.directory.recorded_photo_requests().iter().all(|id| *id != 10));
}

#[tokio::test(start_paused = true)]
async fn test_integration_same_inputs_same_outcomes() {
    let script = [
        Command::Start,
        Command::Search,
        Command::Like,
        Command::AddFavorite,
        Command::Next,
        Command::Favorites,
        Command::Settings,
        Command::SetAge,
        Command::Text("31".to_string()),
        Command::MainMenu,
    ];

    let mut runs = Vec::new();
    for _ in 0..2 {
        let h = harness(listing());
        let mut trace = Vec::new();
        for command in &script {
            let outcome = h.machine.handle(VIEWER, command).await;
            trace.push((outcome.state, outcome.messages));
        }
        runs.push(trace);
    }

    assert_eq!(runs[0], runs[1]);
}

#[tokio::test(start_paused = true)]
async fn test_integration_upstream_outage_commits_nothing() {
    let h = harness(listing());
    h.directory.fail_searches([
        DirectoryError::Server("502".into()),
        DirectoryError::Server("502".into()),
        DirectoryError::Server("502".into()),
    ]);

    let outcome = h.machine.handle(VIEWER, &Command::Search).await;
    assert_eq!(outcome.state, None);
    assert_eq!(outcome.messages.len(), 1);
    assert_eq!(h.directory.recorded_queries().len(), 3);
    assert!(h.store.get_exclusion_set(VIEWER).await.unwrap().is_empty());

    // The outage is over; the same request now succeeds
    let outcome = h.machine.handle(VIEWER, &Command::Search).await;
    assert_eq!(current(&outcome.state), Some(10));
}

#[tokio::test(start_paused = true)]
async fn test_integration_unknown_user_is_walked_through_settings() {
    let h = harness(ScriptedDirectory::new().with_profile(10, 1));

    let outcome = h.machine.handle(VIEWER, &Command::Search).await;
    assert_eq!(outcome.state, Some(ConversationState::MainMenu));

    let steps = [
        (Command::Settings, ConversationState::SettingPreferences),
        (Command::SetAge, ConversationState::SettingAge),
        (Command::Text("27".to_string()), ConversationState::SettingCity),
        (Command::Text("Kazan".to_string()), ConversationState::SettingSex),
        (Command::SexSelected(Sex::Female), ConversationState::MainMenu),
    ];
    for (command, expected) in steps {
        let outcome = h.machine.handle(VIEWER, &command).await;
        assert_eq!(outcome.state, Some(expected), "after {:?}", command);
    }

    let outcome = h.machine.handle(VIEWER, &Command::Search).await;
    assert_eq!(current(&outcome.state), Some(10));
    let query = h.directory.recorded_queries().pop().unwrap();
    assert_eq!(query.city, "Kazan");
    assert_eq!((query.age_from, query.age_to), (22, 32));
    assert_eq!(query.sex, Sex::Male);
}

#[tokio::test(start_paused = true)]
async fn test_integration_dispatcher_end_to_end() {
    let h = harness(listing());
    let transport = h.transport.clone();
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(h.machine),
        CancellationToken::new(),
    ));

    let handles: Vec<_> = ["search", "поиск", "find"]
        .into_iter()
        .map(|text| {
            dispatcher.spawn(InboundMessage {
                user_id: VIEWER,
                text: text.to_string(),
                payload: None,
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().is_some());
    }

    let excluded = h.store.get_exclusion_set(VIEWER).await.unwrap();
    assert_eq!(excluded.len(), 3);
    assert_eq!(transport.sent_to(VIEWER).len(), 3);
}
