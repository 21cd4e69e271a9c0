use serde_json::Value;

use crate::models::{PreferredSex, Sex};

/// An inbound user command, parsed from button payload or free text
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    MainMenu,
    Back,
    Search,
    Next,
    Skip,
    Like,
    Dislike,
    Blacklist,
    AddFavorite,
    Favorites,
    Settings,
    SetAge,
    SetCity,
    SetSex,
    SetPreferredSex,
    SexSelected(Sex),
    PreferredSexSelected(PreferredSex),
    /// Open the n-th (1-based) entry of the favorites list
    Open(usize),
    RemoveFavorite,
    /// Anything else; input for setting states
    Text(String),
}

impl Command {
    /// Parse a message. A recognised button payload wins over the text.
    pub fn parse(text: &str, payload: Option<&str>) -> Self {
        if let Some(command) = payload.and_then(Self::from_payload) {
            return command;
        }
        Self::from_text(text)
    }

    /// Payload keyword used when rendering a button for this command
    pub fn keyword(&self) -> Option<&'static str> {
        let keyword = match self {
            Command::Start => "start",
            Command::MainMenu => "main_menu",
            Command::Back => "back",
            Command::Search => "search",
            Command::Next => "next",
            Command::Skip => "skip",
            Command::Like => "like",
            Command::Dislike => "dislike",
            Command::Blacklist => "blacklist",
            Command::AddFavorite => "add_to_favorites",
            Command::Favorites => "favorites",
            Command::Settings => "settings",
            Command::SetAge => "age",
            Command::SetCity => "city",
            Command::SetSex => "sex",
            Command::SetPreferredSex => "preferred_sex",
            Command::RemoveFavorite => "remove_favorite",
            Command::SexSelected(_)
            | Command::PreferredSexSelected(_)
            | Command::Open(_)
            | Command::Text(_) => return None,
        };
        Some(keyword)
    }

    fn from_payload(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        let object = value.as_object()?;

        if let Some(keyword) = object.get("command").and_then(Value::as_str) {
            return Self::from_keyword(keyword);
        }
        if let Some(code) = object.get("sex").and_then(Value::as_i64) {
            return match Sex::from_code(code)? {
                Sex::Unknown => None,
                sex => Some(Command::SexSelected(sex)),
            };
        }
        if let Some(code) = object.get("preferred_sex").and_then(Value::as_i64) {
            return PreferredSex::from_code(code).map(Command::PreferredSexSelected);
        }
        if let Some(index) = object.get("open").and_then(Value::as_u64) {
            return usize::try_from(index).ok().map(Command::Open);
        }
        None
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        let command = match keyword {
            "start" => Command::Start,
            "main_menu" | "menu" => Command::MainMenu,
            "back" => Command::Back,
            "search" => Command::Search,
            "next" => Command::Next,
            "skip" => Command::Skip,
            "like" => Command::Like,
            "dislike" => Command::Dislike,
            "blacklist" => Command::Blacklist,
            "add_to_favorites" | "add_favorite" => Command::AddFavorite,
            "favorites" => Command::Favorites,
            "settings" | "edit_profile" => Command::Settings,
            "age" => Command::SetAge,
            "city" => Command::SetCity,
            "sex" => Command::SetSex,
            "preferred_sex" => Command::SetPreferredSex,
            "remove_favorite" => Command::RemoveFavorite,
            _ => return None,
        };
        Some(command)
    }

    fn from_text(text: &str) -> Self {
        let normalized = text.trim().trim_start_matches('/').to_lowercase();

        if let Some(rest) = normalized
            .strip_prefix("open ")
            .or_else(|| normalized.strip_prefix("открыть "))
        {
            if let Ok(index) = rest.trim().parse::<usize>() {
                return Command::Open(index);
            }
        }

        match normalized.as_str() {
            "start" | "начать" | "старт" | "привет" | "hello" | "hi" => Command::Start,
            "menu" | "main menu" | "main" | "меню" | "главное меню" | "главная" => {
                Command::MainMenu
            }
            "back" | "назад" => Command::Back,
            "search" | "find" | "поиск" | "найти" | "искать" => Command::Search,
            "next" | "далее" | "дальше" | "следующий" => Command::Next,
            "skip" | "пропустить" => Command::Skip,
            "like" | "лайк" | "нравится" => Command::Like,
            "dislike" | "дизлайк" | "не нравится" => Command::Dislike,
            "blacklist" | "block" | "черный список" | "в черный список" => Command::Blacklist,
            "add" | "add to favorites" | "в избранное" | "добавить" => Command::AddFavorite,
            "favorites" | "fav" | "избранное" | "избранные" => Command::Favorites,
            "settings" | "preferences" | "настройки" => Command::Settings,
            "age" | "set age" | "возраст" => Command::SetAge,
            "city" | "set city" | "город" => Command::SetCity,
            "sex" | "set sex" | "gender" | "пол" => Command::SetSex,
            "preferred sex" | "who to search" | "кого искать" => Command::SetPreferredSex,
            "remove" | "удалить" | "удалить из избранного" => Command::RemoveFavorite,
            _ => Command::Text(text.trim().to_string()),
        }
    }
}
