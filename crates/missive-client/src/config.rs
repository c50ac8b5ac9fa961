//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so the client can start against a local
//! SQLite store with zero configuration. The one setting with no useful
//! default is the owner id; without it nobody is treated as the owner.

use std::path::PathBuf;
use std::time::Duration;

use missive_shared::constants::{
    ENV_OWNER_USER_ID, MESSAGE_POLLING_INTERVAL_MS, NOTIFICATION_POLLING_INTERVAL_MS,
};
use missive_shared::UserId;

/// Default HTTP request timeout for the hosted backend.
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The single privileged account.
    /// Env: `MISSIVE_OWNER_USER_ID`
    /// Default: none (no user is the owner).
    pub owner_id: Option<UserId>,

    /// Hosted backend project URL. When unset the local store is used.
    /// Env: `MISSIVE_BACKEND_URL`
    pub backend_url: Option<String>,

    /// Public API key of the hosted backend.
    /// Env: `MISSIVE_ANON_KEY`
    pub anon_key: String,

    /// Access token of the signed-in user.
    /// Env: `MISSIVE_ACCESS_TOKEN`
    pub access_token: Option<String>,

    /// Path of the local SQLite store.
    /// Env: `MISSIVE_DB_PATH`
    /// Default: platform data directory.
    pub db_path: Option<PathBuf>,

    /// Signed-in user in local mode, where there is no auth provider.
    /// Env: `MISSIVE_USER_ID`
    pub user_id: Option<UserId>,

    /// Env: `MISSIVE_MESSAGE_POLL_MS`
    /// Default: 3 minutes.
    pub message_poll_interval: Duration,

    /// Env: `MISSIVE_NOTIFICATION_POLL_MS`
    /// Default: 30 seconds.
    pub notification_poll_interval: Duration,

    /// Env: `MISSIVE_HTTP_TIMEOUT_SECS`
    /// Default: 15 seconds.
    pub http_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            owner_id: None,
            backend_url: None,
            anon_key: String::new(),
            access_token: None,
            db_path: None,
            user_id: None,
            message_poll_interval: Duration::from_millis(MESSAGE_POLLING_INTERVAL_MS),
            notification_poll_interval: Duration::from_millis(NOTIFICATION_POLLING_INTERVAL_MS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        // A missing owner is reported once, by `OwnerResolver::new`.
        config.owner_id = get(ENV_OWNER_USER_ID).map(UserId);

        config.backend_url = get("MISSIVE_BACKEND_URL");
        if let Some(key) = get("MISSIVE_ANON_KEY") {
            config.anon_key = key;
        }
        config.access_token = get("MISSIVE_ACCESS_TOKEN");
        config.db_path = get("MISSIVE_DB_PATH").map(PathBuf::from);
        config.user_id = get("MISSIVE_USER_ID").map(UserId);

        if let Some(raw) = get("MISSIVE_MESSAGE_POLL_MS") {
            match parse_positive(&raw) {
                Some(ms) => config.message_poll_interval = Duration::from_millis(ms),
                None => tracing::warn!(
                    value = %raw,
                    "Invalid MISSIVE_MESSAGE_POLL_MS, using default"
                ),
            }
        }

        if let Some(raw) = get("MISSIVE_NOTIFICATION_POLL_MS") {
            match parse_positive(&raw) {
                Some(ms) => config.notification_poll_interval = Duration::from_millis(ms),
                None => tracing::warn!(
                    value = %raw,
                    "Invalid MISSIVE_NOTIFICATION_POLL_MS, using default"
                ),
            }
        }

        if let Some(raw) = get("MISSIVE_HTTP_TIMEOUT_SECS") {
            match parse_positive(&raw) {
                Some(secs) => config.http_timeout = Duration::from_secs(secs),
                None => tracing::warn!(
                    value = %raw,
                    "Invalid MISSIVE_HTTP_TIMEOUT_SECS, using default"
                ),
            }
        }

        config
    }
}

fn parse_positive(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok().filter(|v| *v > 0)
}
