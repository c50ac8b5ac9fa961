//! Row shapes returned by the backend, and their translation into domain
//! types.
//!
//! These structs mirror the backend tables and the `v_message` view column
//! for column (snake_case, nullable where the backend allows NULL). The
//! `From` impls below are the only place where row shapes turn into domain
//! types, so schema drift stays contained in this module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{AUTH_ACTION_SIGNED_IN, UNKNOWN_USERNAME};
use crate::types::{
    Message, MessageId, Notification, NotificationId, NotificationKind, User, UserId, UserRef,
};

// ---------------------------------------------------------------------------
// user
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub profile_img: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId(row.id),
            username: row.username,
            profile_img: row.profile_img.unwrap_or_default(),
            email: row.email.unwrap_or_default(),
            provider: row.provider.unwrap_or_default(),
            updated_at: row.updated_at.unwrap_or(row.created_at),
            created_at: row.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// v_message
// ---------------------------------------------------------------------------

/// One row of the denormalized message view. The username / avatar columns
/// come from outer joins and are NULL when the user row is gone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageViewRow {
    pub id: String,
    pub author_id: String,
    #[serde(default)]
    pub author_username: Option<String>,
    #[serde(default)]
    pub author_profile_img: Option<String>,
    pub recipient_id: String,
    #[serde(default)]
    pub recipient_username: Option<String>,
    #[serde(default)]
    pub recipient_profile_img: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

fn party(id: String, username: Option<String>, profile_img: Option<String>) -> UserRef {
    UserRef {
        id: UserId(id),
        username: username
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_USERNAME.to_string()),
        profile_img: profile_img.unwrap_or_default(),
    }
}

impl From<MessageViewRow> for Message {
    fn from(row: MessageViewRow) -> Self {
        Self {
            id: MessageId(row.id),
            author: party(row.author_id, row.author_username, row.author_profile_img),
            recipient: party(
                row.recipient_id,
                row.recipient_username,
                row.recipient_profile_img,
            ),
            body: row.message,
            created_at: row.created_at,
        }
    }
}

/// `{ "id": ... }` as returned by an insert with `select=id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InsertedId {
    pub id: String,
}

// ---------------------------------------------------------------------------
// notification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub related_user_id: Option<String>,
    #[serde(default)]
    pub related_message_id: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        let kind = row.kind.parse().unwrap_or_else(|e| {
            tracing::warn!(id = %row.id, error = %e, "treating unknown notification kind as system");
            NotificationKind::System
        });

        // Keep `is_read <=> read_at.is_some()` even if the backend disagrees.
        let read_at = match (row.is_read, row.read_at) {
            (true, Some(at)) => Some(at),
            (true, None) => Some(row.created_at),
            (false, _) => None,
        };

        Self {
            id: NotificationId(row.id),
            user_id: UserId(row.user_id),
            kind,
            title: row.title,
            content: row.content,
            related_user_id: row.related_user_id.map(UserId),
            related_message_id: row.related_message_id.map(MessageId),
            is_read: row.is_read,
            created_at: row.created_at,
            read_at,
        }
    }
}

// ---------------------------------------------------------------------------
// auth.audit_log_entries
// ---------------------------------------------------------------------------

/// One auth audit entry. The payload is free-form JSON and may be NULL;
/// only the fields used to attribute an entry to a user are decoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthLogRow {
    pub id: String,
    #[serde(default)]
    pub payload: Option<AuthLogPayload>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthLogPayload {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub actor_id: Option<String>,
}

impl AuthLogRow {
    /// Whether the entry names `user` as its subject or its actor.
    pub fn concerns(&self, user: &UserId) -> bool {
        let id = Some(user.as_str());
        self.payload
            .as_ref()
            .is_some_and(|p| p.user_id.as_deref() == id || p.actor_id.as_deref() == id)
    }

    pub fn is_sign_in(&self) -> bool {
        self.payload
            .as_ref()
            .is_some_and(|p| p.action.as_deref() == Some(AUTH_ACTION_SIGNED_IN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_entry_is_attributed_by_subject_or_actor() {
        let json = r#"[
            { "id": "1", "created_at": "2025-03-01T09:00:00Z",
              "payload": { "action": "user_signedin", "actor_id": "u1", "traits": { "provider": "email" } } },
            { "id": "2", "created_at": "2025-03-01T08:00:00Z", "ip_address": "10.0.0.1",
              "payload": { "action": "user_modified", "user_id": "u1" } },
            { "id": "3", "created_at": "2025-03-01T07:00:00Z", "payload": null }
        ]"#;
        let rows: Vec<AuthLogRow> = serde_json::from_str(json).unwrap();
        let u1 = UserId::new("u1");

        assert!(rows[0].concerns(&u1) && rows[0].is_sign_in());
        assert!(rows[1].concerns(&u1) && !rows[1].is_sign_in());
        assert_eq!(rows[1].ip_address.as_deref(), Some("10.0.0.1"));
        assert!(!rows[2].concerns(&u1));
        assert!(!rows[0].concerns(&UserId::new("u2")));
    }

    #[test]
    fn message_view_row_decodes_and_nests_parties() {
        let json = r#"{
            "id": "m1",
            "author_id": "a",
            "author_username": "alice",
            "author_profile_img": "https://img/a.png",
            "recipient_id": "o",
            "recipient_username": "owner",
            "recipient_profile_img": null,
            "message": "hi",
            "created_at": "2024-05-01T10:00:00Z"
        }"#;
        let row: MessageViewRow = serde_json::from_str(json).unwrap();
        let msg = Message::from(row);

        assert_eq!(msg.author.username, "alice");
        assert_eq!(msg.author.profile_img, "https://img/a.png");
        assert_eq!(msg.recipient.id.as_str(), "o");
        assert_eq!(msg.recipient.profile_img, "");
        assert_eq!(msg.body, "hi");
    }

    #[test]
    fn vanished_party_falls_back_to_unknown_user() {
        let json = r#"{
            "id": "m1",
            "author_id": "gone",
            "recipient_id": "o",
            "recipient_username": "owner",
            "message": "still here",
            "created_at": "2024-05-01T10:00:00Z"
        }"#;
        let row: MessageViewRow = serde_json::from_str(json).unwrap();
        let msg = Message::from(row);

        assert_eq!(msg.author.id.as_str(), "gone");
        assert_eq!(msg.author.username, UNKNOWN_USERNAME);
        assert_eq!(msg.author.profile_img, "");
    }

    #[test]
    fn notification_row_maps_type_column() {
        let json = r#"{
            "id": "n1",
            "user_id": "o",
            "type": "message_reply",
            "title": "New message from alice",
            "content": null,
            "related_user_id": "a",
            "related_message_id": "m1",
            "is_read": false,
            "created_at": "2024-05-01T10:00:00Z",
            "read_at": null
        }"#;
        let row: NotificationRow = serde_json::from_str(json).unwrap();
        let n = Notification::from(row);

        assert_eq!(n.kind, NotificationKind::MessageReply);
        assert_eq!(n.related_message_id, Some(MessageId::new("m1")));
        assert!(!n.is_read);
        assert!(n.read_at.is_none());
    }

    #[test]
    fn notification_read_state_is_normalised() {
        let created: DateTime<Utc> = "2024-05-01T10:00:00Z".parse().unwrap();
        let row = NotificationRow {
            id: "n1".into(),
            user_id: "o".into(),
            kind: "carrier_pigeon".into(),
            title: "t".into(),
            content: None,
            related_user_id: None,
            related_message_id: None,
            is_read: true,
            created_at: created,
            read_at: None,
        };
        let n = Notification::from(row);

        assert_eq!(n.kind, NotificationKind::System);
        assert_eq!(n.read_at, Some(created));
    }

    #[test]
    fn user_row_defaults_missing_columns() {
        let json = r#"{
            "id": "u1",
            "username": "bob",
            "created_at": "2024-05-01T10:00:00Z"
        }"#;
        let row: UserRow = serde_json::from_str(json).unwrap();
        let user = User::from(row);

        assert_eq!(user.profile_img, "");
        assert_eq!(user.updated_at, user.created_at);
    }
}
