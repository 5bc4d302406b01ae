use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Maximum number of indexed feed / stoplist references read from the
/// environment (`FEED_1_LINK` .. `FEED_10_LINK`).
pub const MAX_CONFIGURED_SOURCES: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as number: {source}")]
    ParseFloat {
        name: String,
        #[source]
        source: std::num::ParseFloatError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Candidate selection
    pub hours_back: u32,
    pub feed_max_items: usize,
    pub list_member_limit: usize,

    // Rate limiting
    pub max_per_run: usize,
    pub max_per_user: usize,
    pub post_delay: Duration,
    pub error_cooldown: Duration,

    // Actions
    pub follow_on_repost: bool,

    // Ledger
    pub repost_log_file: PathBuf,

    // Sources (configuration order preserved, blank entries skipped)
    pub feed_links: Vec<String>,
    pub stoplist_links: Vec<String>,

    // Account
    pub username: Option<String>,
    pub password: Option<String>,
    pub service_url: String,

    // Declared for operational parity; the selection pipeline does not use it
    pub author_posts_per_member: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable is present but cannot be
    /// parsed as its expected type.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            hours_back: parse_env_u32("HOURS_BACK", 3)?,
            feed_max_items: parse_env_usize("FEED_MAX_ITEMS", 1000)?,
            list_member_limit: parse_env_usize("LIST_MEMBER_LIMIT", 200)?,

            max_per_run: parse_env_usize("MAX_PER_RUN", 100)?,
            max_per_user: parse_env_usize("MAX_PER_USER", 10)?,
            post_delay: parse_env_seconds("POST_DELAY_SECONDS", 3.0)?,
            error_cooldown: Duration::from_secs(5),

            follow_on_repost: parse_env_bool("FOLLOW_ON_REPOST", false)?,

            repost_log_file: PathBuf::from(env_or_default("REPOST_LOG_FILE", "reposted.txt")),

            feed_links: indexed_links("FEED"),
            stoplist_links: indexed_links("STOPLIST"),

            username: optional_env("BSKY_USERNAME"),
            password: optional_env("BSKY_PASSWORD"),
            service_url: env_or_default("BSKY_SERVICE_URL", "https://bsky.social"),

            author_posts_per_member: parse_env_usize("AUTHOR_POSTS_PER_MEMBER", 50)?,
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_per_run == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_PER_RUN".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_per_user == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_PER_USER".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.feed_max_items == 0 {
            return Err(ConfigError::InvalidValue {
                name: "FEED_MAX_ITEMS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.service_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "BSKY_SERVICE_URL".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Whether both credentials are configured.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.is_empty())
            && self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Configuration for tests: defaults with zero pacing delays so
    /// scheduler tests complete immediately.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            hours_back: 3,
            feed_max_items: 1000,
            list_member_limit: 200,
            max_per_run: 100,
            max_per_user: 10,
            post_delay: Duration::ZERO,
            error_cooldown: Duration::ZERO,
            follow_on_repost: false,
            repost_log_file: PathBuf::from("reposted.txt"),
            feed_links: Vec::new(),
            stoplist_links: Vec::new(),
            username: None,
            password: None,
            service_url: "http://localhost".to_string(),
            author_posts_per_member: 50,
        }
    }
}

/// Collect `<prefix>_1_LINK` .. `<prefix>_10_LINK`, skipping unset or blank
/// entries while preserving configuration order.
fn indexed_links(prefix: &str) -> Vec<String> {
    (1..=MAX_CONFIGURED_SOURCES)
        .filter_map(|i| optional_env(&format!("{prefix}_{i}_LINK")))
        .collect()
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    optional_env(name).unwrap_or_else(|| default.to_string())
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

/// Parse a float-valued seconds variable into a `Duration`.
fn parse_env_seconds(name: &str, default: f64) -> Result<Duration, ConfigError> {
    let secs = match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse::<f64>().map_err(|e| ConfigError::ParseFloat {
            name: name.to_string(),
            source: e,
        })?,
        _ => default,
    };
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("must be a non-negative number of seconds, got '{secs}'"),
        });
    }
    Ok(Duration::from_secs_f64(secs))
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}
