//! Property-based tests for transition planning
//!
//! `plan` must be total and deterministic over every (state, draft, command).

use super::command::Command;
use super::transition::*;
use crate::models::{
    ConversationState, CriteriaDraft, PreferredSex, RatingKind, Sex, UserCriteria,
};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_sex() -> impl Strategy<Value = Sex> {
    prop_oneof![Just(Sex::Unknown), Just(Sex::Female), Just(Sex::Male)]
}

fn arb_preferred_sex() -> impl Strategy<Value = PreferredSex> {
    prop_oneof![
        Just(PreferredSex::Any),
        Just(PreferredSex::Female),
        Just(PreferredSex::Male)
    ]
}

fn arb_criteria() -> impl Strategy<Value = UserCriteria> {
    (
        18u8..=100,
        "[A-Z][a-z]{1,12}",
        prop_oneof![Just(Sex::Female), Just(Sex::Male)],
        arb_preferred_sex(),
    )
        .prop_map(|(age, city, sex, preferred_sex)| UserCriteria {
            age,
            city,
            sex,
            preferred_sex,
        })
}

fn arb_draft() -> impl Strategy<Value = CriteriaDraft> {
    (
        proptest::option::of(18u8..=100),
        proptest::option::of("[A-Z][a-z]{1,12}"),
        arb_sex(),
        arb_preferred_sex(),
    )
        .prop_map(|(age, city, sex, preferred_sex)| CriteriaDraft {
            age,
            city,
            sex,
            preferred_sex,
        })
}

fn arb_state() -> impl Strategy<Value = ConversationState> {
    prop_oneof![
        Just(ConversationState::MainMenu),
        (arb_criteria(), proptest::option::of(1i64..1_000))
            .prop_map(|(criteria, current)| ConversationState::Searching { criteria, current }),
        (1i64..1_000).prop_map(|candidate_id| ConversationState::ViewingProfile { candidate_id }),
        Just(ConversationState::SettingPreferences),
        Just(ConversationState::SettingAge),
        Just(ConversationState::SettingCity),
        Just(ConversationState::SettingSex),
        Just(ConversationState::SettingPreferredSex),
        proptest::collection::vec(1i64..1_000, 0..5)
            .prop_map(|shown| ConversationState::ViewingFavorites { shown }),
    ]
}

fn arb_navigation() -> impl Strategy<Value = Command> {
    prop_oneof![
        Just(Command::Start),
        Just(Command::MainMenu),
        Just(Command::Back),
        Just(Command::Search),
        Just(Command::Favorites),
        Just(Command::Settings),
        Just(Command::SetAge),
        Just(Command::SetCity),
        Just(Command::SetSex),
        Just(Command::SetPreferredSex),
    ]
}

fn arb_search_command() -> impl Strategy<Value = Command> {
    prop_oneof![
        Just(Command::Next),
        Just(Command::Skip),
        Just(Command::Like),
        Just(Command::Dislike),
        Just(Command::Blacklist),
        Just(Command::AddFavorite),
        Just(Command::RemoveFavorite),
        (0usize..8).prop_map(Command::Open),
    ]
}

fn arb_input() -> impl Strategy<Value = Command> {
    prop_oneof![
        arb_sex().prop_map(Command::SexSelected),
        arb_preferred_sex().prop_map(Command::PreferredSexSelected),
        "[a-zA-Z0-9 .-]{0,20}".prop_map(Command::Text),
    ]
}

fn arb_command() -> impl Strategy<Value = Command> {
    prop_oneof![arb_navigation(), arb_search_command(), arb_input()]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    // Same persisted input, same plan
    #[test]
    fn prop_plan_is_deterministic(
        state in arb_state(),
        draft in arb_draft(),
        command in arb_command()
    ) {
        let first = plan(&state, &draft, &command);
        let second = plan(&state.clone(), &draft.clone(), &command.clone());
        prop_assert_eq!(first, second);
    }

    // Menu and back always reach the main menu without touching criteria
    #[test]
    fn prop_menu_always_reachable(state in arb_state(), draft in arb_draft()) {
        for command in [Command::MainMenu, Command::Back] {
            match plan(&state, &draft, &command) {
                Action::Transition { state: next, criteria, notice } => {
                    prop_assert_eq!(next, ConversationState::MainMenu);
                    prop_assert_eq!(&criteria, &draft);
                    prop_assert!(notice.is_none());
                }
                other => prop_assert!(false, "unexpected action {:?}", other),
            }
        }
    }

    // A rating always targets the candidate on screen
    #[test]
    fn prop_rating_targets_current_candidate(
        state in arb_state(),
        draft in arb_draft(),
        command in prop_oneof![Just(Command::Like), Just(Command::Dislike), Just(Command::Blacklist)]
    ) {
        if let Action::Discover { rating: Some((candidate_id, kind)), .. } = plan(&state, &draft, &command) {
            match &state {
                ConversationState::Searching { current: Some(current), .. } => {
                    prop_assert_eq!(candidate_id, *current);
                }
                other => prop_assert!(false, "rated from {:?}", other),
            }
            let expected = match command {
                Command::Like => RatingKind::Liked,
                Command::Dislike => RatingKind::Disliked,
                _ => RatingKind::Blacklisted,
            };
            prop_assert_eq!(kind, expected);
        }
    }

    // Discovery only runs with complete, valid criteria
    #[test]
    fn prop_discover_needs_complete_criteria(
        state in arb_state(),
        draft in arb_draft(),
        command in arb_command()
    ) {
        if let Action::Discover { criteria, .. } = plan(&state, &draft, &command) {
            prop_assert!(criteria.sex != Sex::Unknown);
            prop_assert!((18..=100).contains(&criteria.age));
            prop_assert!(!criteria.city.trim().is_empty());
        }
    }

    // Unrecognised text outside input states never changes state or criteria
    #[test]
    fn prop_text_is_noop_outside_input_states(
        state in prop_oneof![
            Just(ConversationState::MainMenu),
            Just(ConversationState::SettingPreferences),
            (1i64..1_000).prop_map(|candidate_id| ConversationState::ViewingProfile { candidate_id }),
        ],
        draft in arb_draft(),
        text in "[a-z ]{0,20}"
    ) {
        let action = plan(&state, &draft, &Command::Text(text));
        prop_assert_eq!(action, Action::Transition { state, criteria: draft, notice: None });
    }

    // Accepted setting input keeps the draft inside the valid ranges
    #[test]
    fn prop_setting_input_keeps_draft_valid(
        state in prop_oneof![
            Just(ConversationState::SettingAge),
            Just(ConversationState::SettingCity),
        ],
        draft in arb_draft(),
        text in "[a-zA-Z0-9 ]{0,12}"
    ) {
        if let Action::Transition { criteria, .. } = plan(&state, &draft, &Command::Text(text)) {
            if let Some(age) = criteria.age {
                prop_assert!((18..=100).contains(&age));
            }
            if let Some(city) = criteria.city {
                prop_assert!(city.chars().count() >= 2);
                prop_assert!(city.chars().all(|c| c.is_alphabetic() || c == ' ' || c == '-' || c == '.'));
            }
        }
    }
}
