//! Pure transition planning
//!
//! `plan` looks only at the persisted state, the criteria draft and the
//! command. It performs no I/O; the state machine executes the returned
//! action and commits the result.

use crate::core::conversation::command::Command;
use crate::core::validation::{
    parse_age, parse_preferred_sex, parse_sex, validate_city, ValidationError,
};
use crate::models::{ConversationState, CriteriaDraft, CriteriaField, RatingKind, UserCriteria};

/// Informational message shown before the prompt of the resulting state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Welcome,
    /// Search requested with incomplete criteria
    MissingCriteria(Vec<CriteriaField>),
    Invalid(ValidationError),
    Saved(&'static str),
    /// Rating or favorite command without a profile on screen
    NoActiveProfile,
    NoSuchFavorite,
}

/// What the state machine must do for one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Move to `state` with `criteria`; no collaborator is involved
    Transition {
        state: ConversationState,
        criteria: CriteriaDraft,
        notice: Option<Notice>,
    },
    /// Optionally record a rating, then ask the engine for the next candidate
    Discover {
        criteria: UserCriteria,
        rating: Option<(i64, RatingKind)>,
    },
    AddFavorite { candidate_id: i64 },
    ShowFavorites,
    OpenFavorite { candidate_id: i64 },
    RemoveFavorite { candidate_id: i64 },
}

pub fn plan(state: &ConversationState, draft: &CriteriaDraft, command: &Command) -> Action {
    match command {
        Command::Start => transition(ConversationState::MainMenu, draft, Some(Notice::Welcome)),
        Command::MainMenu | Command::Back => transition(ConversationState::MainMenu, draft, None),
        Command::Search => match state {
            ConversationState::Searching { criteria, .. } => discover(criteria, None),
            _ => start_search(draft),
        },
        Command::Next | Command::Skip => match state {
            ConversationState::Searching { criteria, .. } => discover(criteria, None),
            _ => rerender(state, draft),
        },
        Command::Like => rate(state, draft, RatingKind::Liked),
        Command::Dislike => rate(state, draft, RatingKind::Disliked),
        Command::Blacklist => rate(state, draft, RatingKind::Blacklisted),
        Command::AddFavorite => match state {
            ConversationState::Searching {
                current: Some(candidate_id),
                ..
            }
            | ConversationState::ViewingProfile { candidate_id } => Action::AddFavorite {
                candidate_id: *candidate_id,
            },
            ConversationState::Searching { current: None, .. } => {
                notify(state, draft, Notice::NoActiveProfile)
            }
            _ => rerender(state, draft),
        },
        Command::Favorites => Action::ShowFavorites,
        Command::Settings => transition(ConversationState::SettingPreferences, draft, None),
        Command::SetAge => transition(ConversationState::SettingAge, draft, None),
        Command::SetCity => transition(ConversationState::SettingCity, draft, None),
        Command::SetSex => transition(ConversationState::SettingSex, draft, None),
        Command::SetPreferredSex => {
            transition(ConversationState::SettingPreferredSex, draft, None)
        }
        Command::SexSelected(sex) => match state {
            ConversationState::SettingSex => {
                let mut updated = draft.clone();
                updated.sex = *sex;
                saved(updated, "sex")
            }
            _ => rerender(state, draft),
        },
        Command::PreferredSexSelected(preferred) => match state {
            ConversationState::SettingPreferredSex => {
                let mut updated = draft.clone();
                updated.preferred_sex = *preferred;
                saved(updated, "preferred sex")
            }
            _ => rerender(state, draft),
        },
        Command::Open(index) => match state {
            ConversationState::ViewingFavorites { shown } => open(state, draft, shown, *index),
            _ => rerender(state, draft),
        },
        Command::RemoveFavorite => match state {
            ConversationState::ViewingProfile { candidate_id } => Action::RemoveFavorite {
                candidate_id: *candidate_id,
            },
            _ => rerender(state, draft),
        },
        Command::Text(text) => input(state, draft, text),
    }
}

/// Free text is input in the setting states and an index in the favorites list
fn input(state: &ConversationState, draft: &CriteriaDraft, text: &str) -> Action {
    match state {
        ConversationState::SettingAge => match parse_age(text) {
            Ok(age) => {
                let mut updated = draft.clone();
                updated.age = Some(age);
                saved(updated, "age")
            }
            Err(e) => notify(state, draft, Notice::Invalid(e)),
        },
        ConversationState::SettingCity => match validate_city(text) {
            Ok(city) => {
                let mut updated = draft.clone();
                updated.city = Some(city);
                saved(updated, "city")
            }
            Err(e) => notify(state, draft, Notice::Invalid(e)),
        },
        ConversationState::SettingSex => match parse_sex(text) {
            Ok(sex) => {
                let mut updated = draft.clone();
                updated.sex = sex;
                saved(updated, "sex")
            }
            Err(e) => notify(state, draft, Notice::Invalid(e)),
        },
        ConversationState::SettingPreferredSex => match parse_preferred_sex(text) {
            Ok(preferred) => {
                let mut updated = draft.clone();
                updated.preferred_sex = preferred;
                saved(updated, "preferred sex")
            }
            Err(e) => notify(state, draft, Notice::Invalid(e)),
        },
        ConversationState::ViewingFavorites { shown } => match text.trim().parse::<usize>() {
            Ok(index) => open(state, draft, shown, index),
            Err(_) => rerender(state, draft),
        },
        ConversationState::MainMenu
        | ConversationState::Searching { .. }
        | ConversationState::ViewingProfile { .. }
        | ConversationState::SettingPreferences => rerender(state, draft),
    }
}

/// Incomplete criteria land in the main menu with the missing fields listed
fn start_search(draft: &CriteriaDraft) -> Action {
    match draft.complete() {
        Some(criteria) => discover(&criteria, None),
        None => transition(
            ConversationState::MainMenu,
            draft,
            Some(Notice::MissingCriteria(draft.missing_fields())),
        ),
    }
}

fn rate(state: &ConversationState, draft: &CriteriaDraft, kind: RatingKind) -> Action {
    match state {
        ConversationState::Searching {
            criteria,
            current: Some(candidate_id),
        } => discover(criteria, Some((*candidate_id, kind))),
        ConversationState::Searching { current: None, .. } => {
            notify(state, draft, Notice::NoActiveProfile)
        }
        _ => rerender(state, draft),
    }
}

fn open(state: &ConversationState, draft: &CriteriaDraft, shown: &[i64], index: usize) -> Action {
    match index.checked_sub(1).and_then(|i| shown.get(i)) {
        Some(candidate_id) => Action::OpenFavorite {
            candidate_id: *candidate_id,
        },
        None => notify(state, draft, Notice::NoSuchFavorite),
    }
}

/// After a field is saved: prompt for the next missing field, or go home
fn saved(updated: CriteriaDraft, field: &'static str) -> Action {
    let next = match updated.missing_fields().first() {
        Some(CriteriaField::Age) => ConversationState::SettingAge,
        Some(CriteriaField::City) => ConversationState::SettingCity,
        Some(CriteriaField::Sex) => ConversationState::SettingSex,
        None => ConversationState::MainMenu,
    };
    Action::Transition {
        state: next,
        criteria: updated,
        notice: Some(Notice::Saved(field)),
    }
}

fn discover(criteria: &UserCriteria, rating: Option<(i64, RatingKind)>) -> Action {
    Action::Discover {
        criteria: criteria.clone(),
        rating,
    }
}

fn transition(state: ConversationState, draft: &CriteriaDraft, notice: Option<Notice>) -> Action {
    Action::Transition {
        state,
        criteria: draft.clone(),
        notice,
    }
}

fn notify(state: &ConversationState, draft: &CriteriaDraft, notice: Notice) -> Action {
    transition(state.clone(), draft, Some(notice))
}

/// Unrecognised here: stay put and show the current prompt again
fn rerender(state: &ConversationState, draft: &CriteriaDraft) -> Action {
    transition(state.clone(), draft, None)
}
