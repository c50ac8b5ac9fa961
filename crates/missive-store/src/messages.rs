use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use missive_shared::constants::{NOTIFICATION_PREVIEW_LENGTH, UNKNOWN_USERNAME};
use missive_shared::rows::MessageViewRow;
use missive_shared::{validate_message_body, MessageId, NewMessage, NotificationKind, UserId};

use crate::database::{fmt_ts, ts_col, Database};
use crate::error::{not_found, Result};
use crate::notifications::{insert_notification, NewNotification};

const VIEW_COLUMNS: &str = "id, author_id, author_username, author_profile_img, \
     recipient_id, recipient_username, recipient_profile_img, message, created_at";

impl Database {
    /// Insert a message and, in the same transaction, the recipient's
    /// notification for it. Returns the new message id.
    pub fn insert_message(&self, message: &NewMessage) -> Result<MessageId> {
        let body = validate_message_body(&message.body)?;
        let id = MessageId::generate();
        let now = Utc::now();

        let tx = self.conn().unchecked_transaction()?;

        tx.execute(
            "INSERT INTO message (id, author_id, recipient_id, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.as_str(),
                message.author_id.as_str(),
                message.recipient_id.as_str(),
                body,
                fmt_ts(now),
            ],
        )?;

        let notification = notification_for(&tx, &id, message, body)?;
        insert_notification(&tx, &notification, now)?;

        tx.commit()?;

        tracing::debug!(
            msg_id = %id,
            author = %message.author_id.short(),
            recipient = %message.recipient_id.short(),
            "message stored"
        );
        Ok(id)
    }

    /// Every message, oldest first.
    pub fn get_all_messages(&self) -> Result<Vec<MessageViewRow>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {VIEW_COLUMNS} FROM v_message ORDER BY created_at ASC, seq ASC"
        ))?;

        let rows = stmt.query_map([], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Messages exchanged between `a` and `b` in either direction, oldest
    /// first. Messages either party exchanged with anyone else are excluded.
    pub fn get_messages_between(&self, a: &UserId, b: &UserId) -> Result<Vec<MessageViewRow>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {VIEW_COLUMNS} FROM v_message
             WHERE (author_id = ?1 AND recipient_id = ?2)
                OR (author_id = ?2 AND recipient_id = ?1)
             ORDER BY created_at ASC, seq ASC"
        ))?;

        let rows = stmt.query_map(params![a.as_str(), b.as_str()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn get_message_by_id(&self, id: &MessageId) -> Result<MessageViewRow> {
        self.conn()
            .query_row(
                &format!("SELECT {VIEW_COLUMNS} FROM v_message WHERE id = ?1"),
                params![id.as_str()],
                row_to_message,
            )
            .map_err(not_found)
    }
}

/// Build the recipient's notification: a reply when the recipient has
/// written to the author before, otherwise a new message. A note to self
/// is always a new message.
fn notification_for(
    conn: &Connection,
    id: &MessageId,
    message: &NewMessage,
    body: &str,
) -> Result<NewNotification> {
    let author_name: Option<String> = conn
        .query_row(
            r#"SELECT username FROM "user" WHERE id = ?1"#,
            params![message.author_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    let to_self = message.author_id == message.recipient_id;
    let replied_before: bool = !to_self
        && conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM message
             WHERE author_id = ?1 AND recipient_id = ?2 AND id <> ?3)",
            params![
                message.recipient_id.as_str(),
                message.author_id.as_str(),
                id.as_str()
            ],
            |row| row.get(0),
        )?;

    let kind = if replied_before {
        NotificationKind::MessageReply
    } else {
        NotificationKind::NewMessage
    };

    let author_name = author_name.unwrap_or_else(|| UNKNOWN_USERNAME.to_string());

    Ok(NewNotification {
        user_id: message.recipient_id.clone(),
        kind,
        title: format!("New message from {author_name}"),
        content: Some(body.chars().take(NOTIFICATION_PREVIEW_LENGTH).collect()),
        related_user_id: Some(message.author_id.clone()),
        related_message_id: Some(id.clone()),
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageViewRow> {
    Ok(MessageViewRow {
        id: row.get(0)?,
        author_id: row.get(1)?,
        author_username: row.get(2)?,
        author_profile_img: row.get(3)?,
        recipient_id: row.get(4)?,
        recipient_username: row.get(5)?,
        recipient_profile_img: row.get(6)?,
        message: row.get(7)?,
        created_at: ts_col(row, 8)?,
    })
}
