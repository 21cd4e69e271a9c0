use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::core::discovery::DiscoverySettings;
use crate::core::rate_limiter::{RateLimiter, RateLimiterError};
use crate::core::retry::RetryPolicy;

const ENV_PREFIX: &str = "MATCHBOT";

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub vk: VkSettings,
    #[serde(default)]
    pub callback: CallbackSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VkSettings {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub user_token: String,
    #[serde(default)]
    pub group_token: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_photos_limit")]
    pub photos_limit: usize,
    #[serde(default = "default_city_cache_size")]
    pub city_cache_size: u64,
    #[serde(default = "default_city_cache_ttl_secs")]
    pub city_cache_ttl_secs: u64,
    #[serde(default = "default_country_id")]
    pub country_id: i64,
}

fn default_api_base() -> String { "https://api.vk.com".to_string() }
fn default_api_version() -> String { "5.131".to_string() }
fn default_request_timeout_secs() -> u64 { 30 }
fn default_photos_limit() -> usize { 3 }
fn default_city_cache_size() -> u64 { 1024 }
fn default_city_cache_ttl_secs() -> u64 { 86_400 }
fn default_country_id() -> i64 { 1 }

impl Default for VkSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            user_token: String::new(),
            group_token: String::new(),
            api_version: default_api_version(),
            request_timeout_secs: default_request_timeout_secs(),
            photos_limit: default_photos_limit(),
            city_cache_size: default_city_cache_size(),
            city_cache_ttl_secs: default_city_cache_ttl_secs(),
            country_id: default_country_id(),
        }
    }
}

/// VK Callback API handshake
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackSettings {
    #[serde(default)]
    pub confirmation_token: String,
    pub secret: Option<String>,
    /// Community the bot serves; events for any other group are refused
    pub group_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Keep everything in process memory instead of PostgreSQL
    #[serde(default)]
    pub in_memory: bool,
}

fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_acquire_timeout_secs() -> u64 { 5 }
fn default_idle_timeout_secs() -> u64 { 600 }

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_age_tolerance")]
    pub age_tolerance: u8,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_age_tolerance() -> u8 { 5 }
fn default_page_size() -> usize { 100 }

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            age_tolerance: default_age_tolerance(),
            page_size: default_page_size(),
        }
    }
}

impl DiscoveryConfig {
    pub fn to_settings(&self) -> DiscoverySettings {
        DiscoverySettings {
            age_tolerance: self.age_tolerance,
            page_size: self.page_size,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
}

fn default_max_requests() -> usize { 3 }
fn default_period_ms() -> u64 { 1000 }

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            period_ms: default_period_ms(),
        }
    }
}

impl RateLimitSettings {
    pub fn build(&self) -> Result<RateLimiter, RateLimiterError> {
        RateLimiter::new(self.max_requests, Duration::from_millis(self.period_ms))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_max_attempts() -> u32 { 3 }
fn default_initial_delay_ms() -> u64 { 1000 }
fn default_backoff_factor() -> f64 { 2.0 }

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_delay_ms),
            self.backoff_factor,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml, then config/local.toml)
    /// 3. Environment variables (prefixed with MATCHBOT__)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            // Development overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g. MATCHBOT__SERVER__PORT -> server.port
            .add_source(environment())
            .build()?;

        substitute_env_vars(settings)?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        substitute_env_vars(settings)?.try_deserialize()
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Conventional unprefixed variables win over file values
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let overrides = [
        ("DATABASE_URL", "database.url"),
        ("VK_USER_TOKEN", "vk.user_token"),
        ("VK_GROUP_TOKEN", "vk.group_token"),
    ];

    let mut builder = Config::builder().add_source(settings);
    for (var, key) in overrides {
        if let Ok(value) = env::var(var) {
            builder = builder.set_override(key, value)?;
        }
    }

    builder.build()
}
