use crate::core::conversation::transition::Notice;
use crate::core::conversation::ConversationError;
use crate::core::discovery::DiscoveryError;
use crate::models::{Candidate, ConversationState, CriteriaDraft, RatingKind};
use crate::services::directory::DirectoryError;
use crate::services::transport::{Keyboard, OutboundMessage};

/// Prompt shown on entering (or re-rendering) a state
pub fn screen(state: &ConversationState, draft: &CriteriaDraft) -> OutboundMessage {
    match state {
        ConversationState::MainMenu => OutboundMessage::text(
            "🏠 Main menu\n\n\
             • 🔍 Search - find someone new\n\
             • ⭐ Favorites - profiles you saved\n\
             • ⚙️ Settings - change your search criteria",
        )
        .with_keyboard(Keyboard::MainMenu),
        ConversationState::Searching { current, .. } => match current {
            Some(_) => OutboundMessage::text("Rate the profile above or press Next.")
                .with_keyboard(Keyboard::Search),
            None => OutboundMessage::text("Press Next to look further.")
                .with_keyboard(Keyboard::Search),
        },
        ConversationState::ViewingProfile { .. } => {
            OutboundMessage::text("Remove this profile from favorites or go back to the list.")
                .with_keyboard(Keyboard::Profile)
        }
        ConversationState::SettingPreferences => {
            OutboundMessage::text(settings_summary(draft)).with_keyboard(Keyboard::Settings)
        }
        ConversationState::SettingAge => OutboundMessage::text("🎂 How old are you? (18-100)"),
        ConversationState::SettingCity => OutboundMessage::text("🏙 Which city do you live in?"),
        ConversationState::SettingSex => {
            OutboundMessage::text("👤 What is your sex?").with_keyboard(Keyboard::SexChoice)
        }
        ConversationState::SettingPreferredSex => {
            OutboundMessage::text("💕 Who would you like to meet?")
                .with_keyboard(Keyboard::PreferredSexChoice)
        }
        ConversationState::ViewingFavorites { .. } => {
            OutboundMessage::text("Send the number of a profile to open it.")
                .with_keyboard(Keyboard::Favorites)
        }
    }
}

pub fn notice(notice: &Notice) -> OutboundMessage {
    match notice {
        Notice::Welcome => OutboundMessage::text(
            "👋 Hi! I help you meet new people. Fill in your age, city and sex, then start a search.",
        ),
        Notice::MissingCriteria(fields) => {
            let names: Vec<&str> = fields.iter().map(|f| f.label()).collect();
            OutboundMessage::text(format!(
                "⚠️ Before searching, please set your {}.",
                names.join(", ")
            ))
            .with_keyboard(Keyboard::ProfileSetup)
        }
        Notice::Invalid(e) => OutboundMessage::text(format!("❌ {}. Please try again.", capitalize(&e.to_string()))),
        Notice::Saved(field) => OutboundMessage::text(format!("✅ {} saved.", capitalize(field))),
        Notice::NoActiveProfile => {
            OutboundMessage::text("There is no profile on screen. Press Next to find one.")
        }
        Notice::NoSuchFavorite => OutboundMessage::text("There is no favorite with that number."),
    }
}

pub fn candidate_card(candidate: &Candidate, keyboard: Keyboard) -> OutboundMessage {
    OutboundMessage::text(format!("{}\n{}", candidate.full_name(), candidate.profile_link))
        .with_attachment(candidate.attachment())
        .with_keyboard(keyboard)
}

pub fn exhausted() -> OutboundMessage {
    OutboundMessage::text("😔 No new profiles right now. Press Next to look further or change your settings.")
        .with_keyboard(Keyboard::Search)
}

pub fn rated(kind: RatingKind) -> OutboundMessage {
    OutboundMessage::text(match kind {
        RatingKind::Liked => "❤️ Liked.",
        RatingKind::Disliked => "👎 Disliked.",
        RatingKind::Blacklisted => "🚫 Added to blacklist.",
    })
}

pub fn favorite_added(newly_added: bool) -> OutboundMessage {
    OutboundMessage::text(if newly_added {
        "⭐ Added to favorites."
    } else {
        "⭐ Already in favorites."
    })
}

pub fn favorite_removed() -> OutboundMessage {
    OutboundMessage::text("🗑 Removed from favorites.")
}

pub fn favorites_list(favorites: &[Candidate]) -> OutboundMessage {
    if favorites.is_empty() {
        return OutboundMessage::text("⭐ Your favorites list is empty.")
            .with_keyboard(Keyboard::Favorites);
    }

    let lines: Vec<String> = favorites
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {} {}", i + 1, c.full_name(), c.profile_link))
        .collect();
    OutboundMessage::text(format!(
        "⭐ Your favorites:\n\n{}\n\nSend a number to open a profile.",
        lines.join("\n")
    ))
    .with_keyboard(Keyboard::Favorites)
}

/// Fallback shown when handling failed; nothing was committed
pub fn failure(error: &ConversationError) -> OutboundMessage {
    let text = match error {
        ConversationError::Discovery(DiscoveryError::Validation(e)) => {
            format!("⚠️ Your search settings look wrong: {}. Please update them in Settings.", e)
        }
        ConversationError::Discovery(DiscoveryError::TerminalUpstream(
            DirectoryError::UnknownCity(city),
        )) => format!("⚠️ I could not find the city \"{}\". Please change it in Settings.", city),
        ConversationError::Discovery(DiscoveryError::TransientUpstream { .. }) => {
            "⏳ The search service is busy. Please try again in a minute.".to_string()
        }
        _ => "😕 Something went wrong. Please try again later.".to_string(),
    };
    OutboundMessage::text(text).with_keyboard(Keyboard::MainMenu)
}

fn settings_summary(draft: &CriteriaDraft) -> String {
    let age = draft
        .age
        .map(|a| a.to_string())
        .unwrap_or_else(|| "not set".to_string());
    let city = draft.city.clone().unwrap_or_else(|| "not set".to_string());
    format!(
        "⚙️ Search settings\n\n\
         Age: {}\n\
         City: {}\n\
         Sex: {}\n\
         Looking for: {}\n\n\
         Choose what to change.",
        age,
        city,
        draft.sex.label(),
        draft.preferred_sex.label()
    )
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
