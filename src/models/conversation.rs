use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::domain::{CriteriaDraft, UserCriteria};

/// Per-user dialogue state, each variant carrying exactly what it needs
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    MainMenu,
    Searching {
        criteria: UserCriteria,
        /// Candidate currently on screen; `None` after the page was exhausted
        current: Option<i64>,
    },
    ViewingProfile {
        candidate_id: i64,
    },
    SettingPreferences,
    SettingAge,
    SettingCity,
    SettingSex,
    SettingPreferredSex,
    ViewingFavorites {
        /// Favorite ids in the order they were listed to the user
        shown: Vec<i64>,
    },
}

impl ConversationState {
    pub fn name(&self) -> &'static str {
        match self {
            ConversationState::MainMenu => "main_menu",
            ConversationState::Searching { .. } => "searching",
            ConversationState::ViewingProfile { .. } => "viewing_profile",
            ConversationState::SettingPreferences => "setting_preferences",
            ConversationState::SettingAge => "setting_age",
            ConversationState::SettingCity => "setting_city",
            ConversationState::SettingSex => "setting_sex",
            ConversationState::SettingPreferredSex => "setting_preferred_sex",
            ConversationState::ViewingFavorites { .. } => "viewing_favorites",
        }
    }
}

/// Durable conversation row: one per user, overwritten on every transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub state: ConversationState,
    pub criteria: CriteriaDraft,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            state: ConversationState::MainMenu,
            criteria: CriteriaDraft::default(),
            updated_at: Utc::now(),
        }
    }
}
