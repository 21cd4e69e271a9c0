use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use moka::future::Cache;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::VkSettings;
use crate::core::conversation::Command;
use crate::models::{DirectoryProfile, PhotoRef, PreferredSex, Sex, UserSnapshot};
use crate::services::directory::{DirectoryClient, DirectoryError, SearchQuery};
use crate::services::transport::{Keyboard, MessagingTransport, OutboundMessage};

const MIN_SEARCH_AGE: u8 = 18;
const MAX_SEARCH_AGE: u8 = 100;
const PHOTO_PAGE: usize = 100;

/// VK API client
///
/// Searches and photo listings go out with the user token, user lookups and
/// messages with the community token.
pub struct VkClient {
    settings: VkSettings,
    client: Client,
    cities: Cache<String, i64>,
}

impl VkClient {
    pub fn new(settings: VkSettings) -> Result<Self, DirectoryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| DirectoryError::Network(format!("failed to create HTTP client: {}", e)))?;

        let cities = Cache::builder()
            .max_capacity(settings.city_cache_size)
            .time_to_live(Duration::from_secs(settings.city_cache_ttl_secs))
            .build();

        Ok(Self {
            settings,
            client,
            cities,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/method/{}", self.settings.api_base.trim_end_matches('/'), method)
    }

    /// GET a method and unwrap its `response` member
    async fn call(
        &self,
        method: &str,
        token: &str,
        params: &[(&str, String)],
    ) -> Result<Value, DirectoryError> {
        tracing::debug!("VK call {}", method);

        let response = self
            .client
            .get(self.method_url(method))
            .query(&[("access_token", token), ("v", self.settings.api_version.as_str())])
            .query(params)
            .send()
            .await
            .map_err(map_transport_error)?;

        parse_envelope(response).await
    }

    /// Resolve a city name to its directory id, cached by lowercased name
    pub async fn city_id(&self, city: &str) -> Result<i64, DirectoryError> {
        let key = city.trim().to_lowercase();
        if let Some(id) = self.cities.get(&key).await {
            return Ok(id);
        }

        let response = self
            .call(
                "database.getCities",
                &self.settings.user_token,
                &[
                    ("country_id", self.settings.country_id.to_string()),
                    ("q", city.trim().to_string()),
                    ("count", "1".to_string()),
                ],
            )
            .await?;

        let id = response
            .get("items")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .and_then(|item| item.get("id"))
            .and_then(Value::as_i64)
            .ok_or_else(|| DirectoryError::UnknownCity(city.to_string()))?;

        self.cities.insert(key, id).await;
        Ok(id)
    }

    /// Name of a city by id, for the viewer lookup
    fn city_title(user: &Value) -> Option<String> {
        user.get("city")
            .and_then(|c| c.get("title"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[async_trait]
impl DirectoryClient for VkClient {
    async fn resolve_city(&self, city: &str) -> Result<i64, DirectoryError> {
        self.city_id(city).await
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<DirectoryProfile>, DirectoryError> {
        let age_from = query.age_from.clamp(MIN_SEARCH_AGE, MAX_SEARCH_AGE);
        let age_to = query.age_to.clamp(age_from, MAX_SEARCH_AGE);

        let params = [
            ("count", query.count.to_string()),
            ("offset", query.offset.to_string()),
            ("age_from", age_from.to_string()),
            ("age_to", age_to.to_string()),
            ("sex", query.sex.code().to_string()),
            ("city", query.city_id.to_string()),
            ("has_photo", u8::from(query.has_photo).to_string()),
            ("fields", "is_closed,can_access_closed,domain".to_string()),
        ];

        let response = self
            .call("users.search", &self.settings.user_token, &params)
            .await?;

        let items = response
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| DirectoryError::InvalidResponse("users.search without items".to_string()))?;

        let mut profiles = Vec::with_capacity(items.len());
        for item in items {
            let profile: DirectoryProfile = serde_json::from_value(item.clone())
                .map_err(|e| DirectoryError::InvalidResponse(format!("malformed profile: {}", e)))?;
            if !profile.is_closed {
                profiles.push(profile);
            }
        }

        tracing::debug!(
            "users.search offset {} returned {} open profiles of {}",
            query.offset,
            profiles.len(),
            items.len()
        );
        Ok(profiles)
    }

    async fn top_photos(&self, profile_id: i64) -> Result<Vec<PhotoRef>, DirectoryError> {
        let params = [
            ("owner_id", profile_id.to_string()),
            ("album_id", "profile".to_string()),
            ("extended", "1".to_string()),
            ("count", PHOTO_PAGE.to_string()),
        ];

        let response = self
            .call("photos.get", &self.settings.user_token, &params)
            .await
            .map_err(|e| match e {
                DirectoryError::ProfileUnavailable(_) => DirectoryError::ProfileUnavailable(profile_id),
                other => other,
            })?;

        let items = response
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| DirectoryError::InvalidResponse("photos.get without items".to_string()))?;

        let mut photos: Vec<PhotoRef> = items
            .iter()
            .filter_map(|photo| {
                let id = photo.get("id").and_then(Value::as_i64)?;
                let owner = photo.get("owner_id").and_then(Value::as_i64).unwrap_or(profile_id);
                let likes = photo
                    .get("likes")
                    .and_then(|l| l.get("count"))
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                Some(PhotoRef::new(format!("photo{}_{}", owner, id), likes))
            })
            .collect();

        // Stable, so equally liked photos keep album order
        photos.sort_by(|a, b| b.like_count.cmp(&a.like_count));
        photos.truncate(self.settings.photos_limit);
        Ok(photos)
    }

    async fn lookup_user(&self, user_id: i64) -> Result<Option<UserSnapshot>, DirectoryError> {
        let response = self
            .call(
                "users.get",
                &self.settings.group_token,
                &[
                    ("user_ids", user_id.to_string()),
                    ("fields", "city,sex,bdate,domain".to_string()),
                ],
            )
            .await?;

        let Some(user) = response.as_array().and_then(|users| users.first()) else {
            return Ok(None);
        };

        let sex = user
            .get("sex")
            .and_then(Value::as_i64)
            .and_then(Sex::from_code)
            .unwrap_or_default();
        let age = user
            .get("bdate")
            .and_then(Value::as_str)
            .and_then(|bdate| age_from_bdate(bdate, Utc::now().date_naive()));

        Ok(Some(UserSnapshot {
            age,
            city: Self::city_title(user),
            sex,
        }))
    }

    fn profile_link(&self, profile: &DirectoryProfile) -> String {
        match profile.domain.as_deref().filter(|d| !d.is_empty()) {
            Some(domain) => format!("https://vk.com/{}", domain),
            None => format!("https://vk.com/id{}", profile.id),
        }
    }
}

#[async_trait]
impl MessagingTransport for VkClient {
    async fn send(&self, user_id: i64, message: &OutboundMessage) -> bool {
        let mut form = vec![
            ("access_token", self.settings.group_token.clone()),
            ("v", self.settings.api_version.clone()),
            ("user_id", user_id.to_string()),
            ("message", message.text.clone()),
            ("random_id", random_id().to_string()),
        ];
        if let Some(keyboard) = message.keyboard {
            form.push(("keyboard", keyboard_json(keyboard).to_string()));
        }
        if let Some(attachment) = &message.attachment {
            form.push(("attachment", attachment.clone()));
        }

        let result = match self
            .client
            .post(self.method_url("messages.send"))
            .form(&form)
            .send()
            .await
        {
            Ok(response) => parse_envelope(response).await,
            Err(e) => Err(map_transport_error(e)),
        };

        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Failed to send message to user {}: {}", user_id, e);
                false
            }
        }
    }
}

async fn parse_envelope(response: reqwest::Response) -> Result<Value, DirectoryError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(DirectoryError::Quota(format!("HTTP {}", status)));
    }
    if status.is_server_error() {
        return Err(DirectoryError::Server(format!("HTTP {}", status)));
    }
    if !status.is_success() {
        return Err(DirectoryError::InvalidRequest(format!("HTTP {}", status)));
    }

    let mut body: Value = response.json().await.map_err(map_transport_error)?;

    if let Some(error) = body.get("error") {
        return Err(map_api_error(error));
    }

    body.get_mut("response")
        .map(Value::take)
        .ok_or_else(|| DirectoryError::InvalidResponse("missing response member".to_string()))
}

fn map_transport_error(e: reqwest::Error) -> DirectoryError {
    if e.is_timeout() {
        DirectoryError::Timeout
    } else if e.is_decode() {
        DirectoryError::InvalidResponse(e.to_string())
    } else {
        DirectoryError::Network(e.to_string())
    }
}

/// Classify a VK `error` object
fn map_api_error(error: &Value) -> DirectoryError {
    let code = error.get("error_code").and_then(Value::as_i64).unwrap_or(0);
    let message = error
        .get("error_msg")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let detail = format!("{}: {}", code, message);

    match code {
        // Too many requests per second, flood control, rate limit reached
        6 | 9 | 29 => DirectoryError::Quota(detail),
        1 | 10 => DirectoryError::Server(detail),
        5 | 27 | 28 => DirectoryError::Unauthorized(detail),
        15 | 18 | 30 | 200 | 203 => DirectoryError::ProfileUnavailable(owner_from_params(error)),
        _ => DirectoryError::InvalidRequest(detail),
    }
}

/// `owner_id` echoed back in `request_params`, if any
fn owner_from_params(error: &Value) -> i64 {
    error
        .get("request_params")
        .and_then(Value::as_array)
        .and_then(|params| {
            params.iter().find_map(|p| {
                if p.get("key").and_then(Value::as_str) != Some("owner_id") {
                    return None;
                }
                p.get("value").and_then(Value::as_str)?.parse().ok()
            })
        })
        .unwrap_or(0)
}

/// Age in whole years from a `D.M.YYYY` birth date; `None` if the year is hidden
pub fn age_from_bdate(bdate: &str, today: NaiveDate) -> Option<u8> {
    let born = NaiveDate::parse_from_str(bdate, "%d.%m.%Y").ok()?;
    let mut age = today.year() - born.year();
    if (today.month(), today.day()) < (born.month(), born.day()) {
        age -= 1;
    }
    u8::try_from(age).ok()
}

/// Deduplication id for `messages.send`
fn random_id() -> i32 {
    (uuid::Uuid::new_v4().as_u128() & 0x7fff_ffff) as i32
}

fn button(label: &str, payload: Value, color: &str) -> Value {
    json!({
        "action": {
            "type": "text",
            "label": label,
            "payload": payload.to_string(),
        },
        "color": color,
    })
}

fn command_button(label: &str, command: Command, color: &str) -> Value {
    let keyword = command.keyword().unwrap_or("main_menu");
    button(label, json!({ "command": keyword }), color)
}

/// VK keyboard object for a layout
pub fn keyboard_json(keyboard: Keyboard) -> Value {
    let rows = match keyboard {
        Keyboard::MainMenu => vec![
            vec![command_button("🔍 Search", Command::Search, "primary")],
            vec![
                command_button("⭐ Favorites", Command::Favorites, "secondary"),
                command_button("⚙ Settings", Command::Settings, "secondary"),
            ],
        ],
        Keyboard::Search => vec![
            vec![
                command_button("❤ Like", Command::Like, "positive"),
                command_button("👎 Dislike", Command::Dislike, "negative"),
            ],
            vec![
                command_button("⭐ Add to favorites", Command::AddFavorite, "primary"),
                command_button("➡ Next", Command::Next, "secondary"),
            ],
            vec![
                command_button("🚫 Blacklist", Command::Blacklist, "negative"),
                command_button("🏠 Menu", Command::MainMenu, "secondary"),
            ],
        ],
        Keyboard::Favorites => vec![
            vec![command_button("🔍 Search", Command::Search, "primary")],
            vec![command_button("🏠 Menu", Command::MainMenu, "secondary")],
        ],
        Keyboard::Profile => vec![
            vec![command_button("🗑 Remove", Command::RemoveFavorite, "negative")],
            vec![
                command_button("⭐ Favorites", Command::Favorites, "secondary"),
                command_button("🏠 Menu", Command::MainMenu, "secondary"),
            ],
        ],
        Keyboard::Settings => vec![
            vec![
                command_button("Age", Command::SetAge, "primary"),
                command_button("City", Command::SetCity, "primary"),
            ],
            vec![
                command_button("Sex", Command::SetSex, "primary"),
                command_button("Looking for", Command::SetPreferredSex, "primary"),
            ],
            vec![command_button("🏠 Menu", Command::MainMenu, "secondary")],
        ],
        Keyboard::ProfileSetup => vec![
            vec![command_button("⚙ Fill in profile", Command::Settings, "primary")],
            vec![command_button("🏠 Menu", Command::MainMenu, "secondary")],
        ],
        Keyboard::SexChoice => vec![
            vec![
                button("Female", json!({ "sex": Sex::Female.code() }), "primary"),
                button("Male", json!({ "sex": Sex::Male.code() }), "primary"),
            ],
            vec![command_button("⬅ Back", Command::Back, "secondary")],
        ],
        Keyboard::PreferredSexChoice => vec![
            vec![
                button("Women", json!({ "preferred_sex": preferred_code(PreferredSex::Female) }), "primary"),
                button("Men", json!({ "preferred_sex": preferred_code(PreferredSex::Male) }), "primary"),
                button("Anyone", json!({ "preferred_sex": preferred_code(PreferredSex::Any) }), "secondary"),
            ],
            vec![command_button("⬅ Back", Command::Back, "secondary")],
        ],
    };

    json!({ "one_time": false, "buttons": rows })
}

fn preferred_code(preferred: PreferredSex) -> u8 {
    match preferred {
        PreferredSex::Any => 0,
        PreferredSex::Female => 1,
        PreferredSex::Male => 2,
    }
}
