use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParseKindError;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque user identity issued by the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// First eight characters, for log lines.
    pub fn short(&self) -> String {
        self.0.chars().take(8).collect()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct NotificationId(pub String);

impl NotificationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A user profile row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Avatar URL, empty when the user has none.
    pub profile_img: String,
    pub email: String,
    /// Identity source, e.g. `"email"` or `"google"`.
    pub provider: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn to_ref(&self) -> UserRef {
        UserRef {
            id: self.id.clone(),
            username: self.username.clone(),
            profile_img: self.profile_img.clone(),
        }
    }
}

/// Profile fields supplied when creating a user row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewUser {
    pub id: UserId,
    pub username: String,
    pub profile_img: String,
    pub email: String,
    pub provider: String,
}

/// Denormalized party of a message. Carried on the message itself so a
/// vanished user row still renders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: UserId,
    pub username: String,
    pub profile_img: String,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// An immutable direct message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub author: UserRef,
    pub recipient: UserRef,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// True when `user` is the author or the recipient.
    pub fn involves(&self, user: &UserId) -> bool {
        &self.author.id == user || &self.recipient.id == user
    }

    /// The party that is not `viewer`. For a message the viewer is not part
    /// of, this is the author.
    pub fn counterpart(&self, viewer: &UserId) -> &UserRef {
        if &self.author.id == viewer {
            &self.recipient
        } else {
            &self.author
        }
    }
}

/// Insert payload for a message. Column names follow the backend table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewMessage {
    pub author_id: UserId,
    pub recipient_id: UserId,
    #[serde(rename = "message")]
    pub body: String,
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewMessage,
    MessageReply,
    FriendRequest,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewMessage => "new_message",
            Self::MessageReply => "message_reply",
            Self::FriendRequest => "friend_request",
            Self::System => "system",
        }
    }

    /// Kinds whose target is a message.
    pub fn is_message(&self) -> bool {
        matches!(self, Self::NewMessage | Self::MessageReply)
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new_message" => Ok(Self::NewMessage),
            "message_reply" => Ok(Self::MessageReply),
            "friend_request" => Ok(Self::FriendRequest),
            "system" => Ok(Self::System),
            other => Err(ParseKindError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    /// Owner of this notification.
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub content: Option<String>,
    pub related_user_id: Option<UserId>,
    pub related_message_id: Option<MessageId>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    /// Set exactly once, when the notification transitions to read.
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Apply the one-way `Unread -> Read` transition. Returns `false` when
    /// the notification was already read, leaving `read_at` untouched.
    pub fn mark_read(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_read {
            return false;
        }
        self.is_read = true;
        self.read_at = Some(at);
        true
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Identity metadata reported by the auth provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthIdentity {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    /// e.g. `"google"`; `None` for email/password accounts on some providers.
    pub provider: Option<String>,
}

/// The authenticated principal, as far as this crate cares.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub identity: AuthIdentity,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_ref(id: &str) -> UserRef {
        UserRef {
            id: UserId::new(id),
            username: id.to_uppercase(),
            profile_img: String::new(),
        }
    }

    #[test]
    fn notification_kind_round_trips_through_str() {
        for kind in [
            NotificationKind::NewMessage,
            NotificationKind::MessageReply,
            NotificationKind::FriendRequest,
            NotificationKind::System,
        ] {
            assert_eq!(kind.as_str().parse::<NotificationKind>().unwrap(), kind);
        }
        assert!("poke".parse::<NotificationKind>().is_err());
    }

    #[test]
    fn notification_kind_serializes_snake_case() {
        let json = serde_json::to_string(&NotificationKind::MessageReply).unwrap();
        assert_eq!(json, "\"message_reply\"");
    }

    #[test]
    fn counterpart_picks_the_other_party() {
        let msg = Message {
            id: MessageId::new("m1"),
            author: user_ref("a"),
            recipient: user_ref("owner"),
            body: "hi".into(),
            created_at: Utc::now(),
        };
        assert_eq!(msg.counterpart(&UserId::new("a")).id.as_str(), "owner");
        assert_eq!(msg.counterpart(&UserId::new("owner")).id.as_str(), "a");
        assert!(msg.involves(&UserId::new("a")));
        assert!(!msg.involves(&UserId::new("b")));
    }

    #[test]
    fn mark_read_is_one_way() {
        let first = Utc::now();
        let mut n = Notification {
            id: NotificationId::new("n1"),
            user_id: UserId::new("u"),
            kind: NotificationKind::NewMessage,
            title: "t".into(),
            content: None,
            related_user_id: None,
            related_message_id: None,
            is_read: false,
            created_at: first,
            read_at: None,
        };
        assert!(n.mark_read(first));
        assert!(!n.mark_read(first + chrono::Duration::seconds(5)));
        assert_eq!(n.read_at, Some(first));
    }

    #[test]
    fn short_user_id_handles_short_input() {
        assert_eq!(UserId::new("abc").short(), "abc");
        assert_eq!(UserId::new("0123456789").short(), "01234567");
    }

    #[test]
    fn new_message_uses_backend_column_names() {
        let payload = NewMessage {
            author_id: UserId::new("a"),
            recipient_id: UserId::new("o"),
            body: "hi".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["message"], "hi");
        assert_eq!(json["author_id"], "a");
    }
}
