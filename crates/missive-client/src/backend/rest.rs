//! Reqwest adapter for the hosted backend.
//!
//! The hosted service exposes its tables through a PostgREST-style API under
//! `/rest/v1/<table>` and its auth user endpoint under `/auth/v1/user`. This
//! adapter owns the transport details only: query encoding, headers, status
//! mapping and JSON decoding into row types.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderValue, CONTENT_RANGE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;

use missive_shared::constants::{
    AUTH_SCHEMA, TABLE_AUDIT_LOG, TABLE_MESSAGE, TABLE_NOTIFICATION, TABLE_USER, VIEW_MESSAGE,
};
use missive_shared::rows::{AuthLogRow, InsertedId, MessageViewRow, NotificationRow, UserRow};
use missive_shared::{
    AuthIdentity, MessageId, NewMessage, NewUser, NotificationId, Session, UserId,
};

use super::{BackendDataService, BackendError, MessageFilter, Result};

/// Longest error body kept in [`BackendError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for [`RestBackend`].
#[derive(Clone)]
pub struct RestConfig {
    /// Project URL, e.g. `https://xyz.example.co`.
    pub base_url: String,
    /// Public API key, sent as `apikey` on every request.
    pub anon_key: String,
    /// The signed-in user's access token. Without one, requests run with
    /// the anonymous key and there is no session.
    pub access_token: Option<String>,
    pub timeout: Duration,
}

/// Hosted backend over HTTPS + JSON.
pub struct RestBackend {
    client: Client,
    base: Url,
    anon_key: String,
    access_token: Option<String>,
}

impl RestBackend {
    pub fn new(config: RestConfig) -> Result<Self> {
        let base = normalize_base(&config.base_url)?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base,
            anon_key: config.anon_key,
            access_token: config.access_token.filter(|t| !t.is_empty()),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| BackendError::Config(format!("endpoint {path}: {e}")))
    }

    fn table(&self, name: &str) -> Result<Url> {
        self.endpoint(&format!("rest/v1/{name}"))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn fetch_rows<T: for<'de> Deserialize<'de>>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let req = self.request(Method::GET, self.table(table)?).query(query);
        let resp = send_checked(req).await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl BackendDataService for RestBackend {
    async fn current_session(&self) -> Result<Option<Session>> {
        let Some(token) = self.access_token.as_deref() else {
            return Ok(None);
        };

        let resp = self
            .client
            .get(self.endpoint("auth/v1/user")?)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await?;

        if matches!(resp.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            tracing::debug!(status = %resp.status(), "access token rejected, no session");
            return Ok(None);
        }

        let resp = check_status(resp).await?;
        let user: AuthUserDto = resp.json().await?;
        Ok(Some(user.into_session()))
    }

    async fn select_user(&self, id: &UserId) -> Result<Option<UserRow>> {
        let rows: Vec<UserRow> = self
            .fetch_rows(
                TABLE_USER,
                &[("select", "*".into()), ("id", eq(id.as_str()))],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn select_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        let rows: Vec<UserRow> = self
            .fetch_rows(
                TABLE_USER,
                &[
                    ("select", "*".into()),
                    ("username", eq(username)),
                    ("limit", "1".into()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn select_users(&self) -> Result<Vec<UserRow>> {
        self.fetch_rows(
            TABLE_USER,
            &[("select", "*".into()), ("order", "created_at.desc".into())],
        )
        .await
    }

    async fn select_users_except(&self, id: &UserId) -> Result<Vec<UserRow>> {
        self.fetch_rows(
            TABLE_USER,
            &[
                ("select", "*".into()),
                ("id", format!("neq.{id}")),
                ("order", "created_at.desc".into()),
            ],
        )
        .await
    }

    async fn insert_user(&self, user: &NewUser) -> Result<UserRow> {
        let req = self
            .request(Method::POST, self.table(TABLE_USER)?)
            .header("Prefer", "return=representation")
            .json(user);
        let rows: Vec<UserRow> = send_checked(req).await?.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::InvalidResponse("insert returned no user row".into()))
    }

    async fn select_messages(&self, filter: &MessageFilter) -> Result<Vec<MessageViewRow>> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "created_at.asc".to_string()),
        ];
        if let MessageFilter::Between(a, b) = filter {
            query.push(("or", conversation_filter(a, b)));
        }
        self.fetch_rows(VIEW_MESSAGE, &query).await
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<MessageId> {
        let req = self
            .request(Method::POST, self.table(TABLE_MESSAGE)?)
            .query(&[("select", "id")])
            .header("Prefer", "return=representation")
            .json(message);
        let rows: Vec<InsertedId> = send_checked(req).await?.json().await?;
        rows.into_iter()
            .next()
            .map(|row| MessageId(row.id))
            .ok_or_else(|| BackendError::InvalidResponse("insert returned no message id".into()))
    }

    async fn select_notifications(
        &self,
        user: &UserId,
        unread_only: bool,
    ) -> Result<Vec<NotificationRow>> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("user_id", eq(user.as_str())),
            ("order", "created_at.desc".to_string()),
        ];
        if unread_only {
            query.push(("is_read", "eq.false".to_string()));
        }
        self.fetch_rows(TABLE_NOTIFICATION, &query).await
    }

    async fn count_unread_notifications(&self, user: &UserId) -> Result<u64> {
        let req = self
            .request(Method::HEAD, self.table(TABLE_NOTIFICATION)?)
            .query(&[
                ("select", "id".to_string()),
                ("user_id", eq(user.as_str())),
                ("is_read", "eq.false".to_string()),
            ])
            .header("Prefer", "count=exact");
        let resp = send_checked(req).await?;

        resp.headers()
            .get(CONTENT_RANGE)
            .and_then(|v: &HeaderValue| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| BackendError::InvalidResponse("missing Content-Range count".into()))
    }

    async fn select_notification(&self, id: &NotificationId) -> Result<Option<NotificationRow>> {
        let rows: Vec<NotificationRow> = self
            .fetch_rows(
                TABLE_NOTIFICATION,
                &[("select", "*".into()), ("id", eq(id.as_str()))],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn update_notification_read(
        &self,
        id: &NotificationId,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        // The filter skips rows that are already read, so the returned
        // representation is empty when nothing changed.
        let req = self
            .request(Method::PATCH, self.table(TABLE_NOTIFICATION)?)
            .query(&[
                ("select", "id".to_string()),
                ("id", eq(id.as_str())),
                ("is_read", "eq.false".to_string()),
            ])
            .header("Prefer", "return=representation")
            .json(&json!({ "is_read": true, "read_at": at }));
        let rows: Vec<InsertedId> = send_checked(req).await?.json().await?;
        Ok(!rows.is_empty())
    }

    async fn update_all_notifications_read(
        &self,
        user: &UserId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let req = self
            .request(Method::PATCH, self.table(TABLE_NOTIFICATION)?)
            .query(&[("user_id", eq(user.as_str())), ("is_read", "eq.false".into())])
            .header("Prefer", "return=minimal")
            .json(&json!({ "is_read": true, "read_at": at }));
        send_checked(req).await?;
        Ok(())
    }

    async fn delete_notification(&self, id: &NotificationId) -> Result<()> {
        let req = self
            .request(Method::DELETE, self.table(TABLE_NOTIFICATION)?)
            .query(&[("id", eq(id.as_str()))]);
        send_checked(req).await?;
        Ok(())
    }

    async fn delete_read_notifications(&self, user: &UserId) -> Result<()> {
        let req = self
            .request(Method::DELETE, self.table(TABLE_NOTIFICATION)?)
            .query(&[("user_id", eq(user.as_str())), ("is_read", "eq.true".into())]);
        send_checked(req).await?;
        Ok(())
    }

    async fn select_auth_logs(&self, limit: usize) -> Result<Vec<AuthLogRow>> {
        // The audit log lives outside the public schema.
        let req = self
            .request(Method::GET, self.table(TABLE_AUDIT_LOG)?)
            .header("Accept-Profile", AUTH_SCHEMA)
            .query(&[
                ("select", "*".to_string()),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ]);
        Ok(send_checked(req).await?.json().await?)
    }
}

// ---------------------------------------------------------------------------
// Auth user payload
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AuthUserDto {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadataDto,
    #[serde(default)]
    app_metadata: AppMetadataDto,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadataDto {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AppMetadataDto {
    #[serde(default)]
    provider: Option<String>,
}

impl AuthUserDto {
    fn into_session(self) -> Session {
        Session {
            user_id: UserId(self.id),
            identity: AuthIdentity {
                email: self.email,
                full_name: self.user_metadata.full_name,
                name: self.user_metadata.name,
                avatar_url: self.user_metadata.avatar_url,
                provider: self.app_metadata.provider,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn normalize_base(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&with_slash).map_err(|e| BackendError::Config(format!("base URL {raw:?}: {e}")))
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

/// PostgREST `or` filter for the two directions of a 1:1 conversation.
fn conversation_filter(a: &UserId, b: &UserId) -> String {
    format!(
        "(and(author_id.eq.{a},recipient_id.eq.{b}),and(author_id.eq.{b},recipient_id.eq.{a}))"
    )
}

/// Total from a `Content-Range` header: `0-24/57` or `*/0`.
fn parse_content_range_total(header: &str) -> Option<u64> {
    let (_, total) = header.rsplit_once('/')?;
    total.trim().parse().ok()
}

async fn send_checked(req: RequestBuilder) -> Result<Response> {
    let resp = req.send().await?;
    check_status(resp).await
}

async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let mut message = resp.text().await.unwrap_or_default();
    if message.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|i| message.is_char_boundary(*i))
            .unwrap_or(0);
        message.truncate(cut);
    }

    Err(BackendError::Status {
        status: status.as_u16(),
        message,
    })
}
