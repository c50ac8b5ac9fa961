//! The Backend Data Service seam.
//!
//! Everything the client knows about persistence goes through
//! [`BackendDataService`]. Two adapters implement it:
//!
//! - [`RestBackend`] talks to the hosted backend over its PostgREST-style
//!   HTTP API.
//! - [`LocalBackend`] runs the same contract against a `missive-store`
//!   SQLite file, for development and tests.
//!
//! Methods return backend row types; turning rows into domain values is the
//! job of `missive_shared::rows`.

mod local;
mod rest;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use missive_shared::rows::{AuthLogRow, MessageViewRow, NotificationRow, UserRow};
use missive_shared::{MessageId, NewMessage, NewUser, NotificationId, Session, UserId};
use missive_store::StoreError;

use crate::config::ClientConfig;

pub use local::LocalBackend;
pub use rest::{RestBackend, RestConfig};

/// Errors produced by a backend adapter.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Transport-level HTTP failure (connect, timeout, body decode).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("Backend responded {status}: {message}")]
    Status { status: u16, message: String },

    /// The response decoded but did not have the expected shape.
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),

    /// Local SQLite store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The local store mutex was poisoned by a panicking holder.
    #[error("Store lock poisoned")]
    LockPoisoned,

    /// Invalid adapter configuration (bad URL, client build failure).
    #[error("Backend configuration error: {0}")]
    Config(String),

    /// The adapter has no source for this data.
    #[error("Not supported by this backend: {0}")]
    Unsupported(&'static str),
}

/// Convenience alias used by the adapters.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Which messages a query returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageFilter {
    /// Every message (owner inbox).
    All,
    /// Messages exchanged between the two users, in either direction.
    Between(UserId, UserId),
}

/// Query and mutation contract of the hosted backend.
///
/// Reads that find nothing return `Ok(None)` / an empty vector; `Err` is
/// reserved for transport, status and decoding failures.
#[async_trait]
pub trait BackendDataService: Send + Sync {
    /// The authenticated principal, if any.
    async fn current_session(&self) -> Result<Option<Session>>;

    async fn select_user(&self, id: &UserId) -> Result<Option<UserRow>>;

    async fn select_user_by_username(&self, username: &str) -> Result<Option<UserRow>>;

    /// Every user, newest first.
    async fn select_users(&self) -> Result<Vec<UserRow>>;

    /// Every user except `id`.
    async fn select_users_except(&self, id: &UserId) -> Result<Vec<UserRow>>;

    async fn insert_user(&self, user: &NewUser) -> Result<UserRow>;

    /// Messages matching `filter`, ascending by `created_at`.
    async fn select_messages(&self, filter: &MessageFilter) -> Result<Vec<MessageViewRow>>;

    async fn insert_message(&self, message: &NewMessage) -> Result<MessageId>;

    /// Notifications of `user`, descending by `created_at`.
    async fn select_notifications(
        &self,
        user: &UserId,
        unread_only: bool,
    ) -> Result<Vec<NotificationRow>>;

    /// Count-only query backing the unread badge.
    async fn count_unread_notifications(&self, user: &UserId) -> Result<u64>;

    async fn select_notification(&self, id: &NotificationId) -> Result<Option<NotificationRow>>;

    /// Set `is_read` / `read_at` on one notification if it is still unread.
    /// Returns whether a row changed; `false` means it was already read or
    /// no longer exists.
    async fn update_notification_read(&self, id: &NotificationId, at: DateTime<Utc>)
        -> Result<bool>;

    /// Set `is_read` / `read_at` on every unread notification of `user`, as a
    /// single backend operation.
    async fn update_all_notifications_read(&self, user: &UserId, at: DateTime<Utc>)
        -> Result<()>;

    async fn delete_notification(&self, id: &NotificationId) -> Result<()>;

    /// Administrative purge of every read notification of `user`.
    async fn delete_read_notifications(&self, user: &UserId) -> Result<()>;

    /// The `limit` most recent auth audit entries, newest first. Hosted
    /// backends refuse this without elevated credentials.
    async fn select_auth_logs(&self, limit: usize) -> Result<Vec<AuthLogRow>>;
}

/// Build the adapter selected by `config`: the hosted backend when a URL is
/// configured, the local SQLite store otherwise.
pub fn connect(config: &ClientConfig) -> Result<Arc<dyn BackendDataService>> {
    if let Some(url) = config.backend_url.as_deref() {
        tracing::info!(url, "using hosted backend");
        let rest = RestBackend::new(RestConfig {
            base_url: url.to_string(),
            anon_key: config.anon_key.clone(),
            access_token: config.access_token.clone(),
            timeout: config.http_timeout,
        })?;
        return Ok(Arc::new(rest));
    }

    let local = match config.db_path.as_deref() {
        Some(path) => LocalBackend::open(path)?,
        None => LocalBackend::open_default()?,
    };
    let local = match config.user_id.clone() {
        Some(user_id) => local.with_session(Session {
            user_id,
            identity: Default::default(),
        }),
        None => local,
    };
    tracing::info!("using local SQLite backend");
    Ok(Arc::new(local))
}
