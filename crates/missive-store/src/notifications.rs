use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use missive_shared::rows::NotificationRow;
use missive_shared::{MessageId, NotificationId, NotificationKind, UserId};

use crate::database::{fmt_ts, opt_ts_col, ts_col, Database};
use crate::error::{not_found, Result};

const NOTIFICATION_COLUMNS: &str = "id, user_id, type, title, content, related_user_id, \
     related_message_id, is_read, created_at, read_at";

/// Fields of a notification before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub content: Option<String>,
    pub related_user_id: Option<UserId>,
    pub related_message_id: Option<MessageId>,
}

impl Database {
    /// Store a notification outside of the message flow (system notices).
    pub fn create_notification(&self, notification: &NewNotification) -> Result<NotificationId> {
        insert_notification(self.conn(), notification, Utc::now())
    }

    /// All notifications of `user`, newest first.
    pub fn get_notifications_for_user(&self, user: &UserId) -> Result<Vec<NotificationRow>> {
        self.query_notifications(
            &format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notification
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, seq DESC"
            ),
            user,
        )
    }

    /// Unread notifications of `user`, newest first.
    pub fn get_unread_notifications(&self, user: &UserId) -> Result<Vec<NotificationRow>> {
        self.query_notifications(
            &format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notification
                 WHERE user_id = ?1 AND is_read = 0
                 ORDER BY created_at DESC, seq DESC"
            ),
            user,
        )
    }

    pub fn get_notification(&self, id: &NotificationId) -> Result<NotificationRow> {
        self.conn()
            .query_row(
                &format!("SELECT {NOTIFICATION_COLUMNS} FROM notification WHERE id = ?1"),
                params![id.as_str()],
                row_to_notification,
            )
            .map_err(not_found)
    }

    pub fn count_unread_notifications(&self, user: &UserId) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM notification WHERE user_id = ?1 AND is_read = 0",
            params![user.as_str()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// Mark one notification read. Already-read rows keep their `read_at`;
    /// returns whether a row changed.
    pub fn mark_notification_read(&self, id: &NotificationId, at: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE notification SET is_read = 1, read_at = ?2
             WHERE id = ?1 AND is_read = 0",
            params![id.as_str(), fmt_ts(at)],
        )?;
        Ok(affected > 0)
    }

    /// Mark every unread notification of `user` read in one statement.
    /// Returns the number of rows changed.
    pub fn mark_all_notifications_read(&self, user: &UserId, at: DateTime<Utc>) -> Result<u64> {
        let affected = self.conn().execute(
            "UPDATE notification SET is_read = 1, read_at = ?2
             WHERE user_id = ?1 AND is_read = 0",
            params![user.as_str(), fmt_ts(at)],
        )?;
        Ok(affected as u64)
    }

    pub fn delete_notification(&self, id: &NotificationId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM notification WHERE id = ?1",
            params![id.as_str()],
        )?;
        Ok(affected > 0)
    }

    /// Remove every read notification of `user`.
    pub fn delete_read_notifications(&self, user: &UserId) -> Result<u64> {
        let affected = self.conn().execute(
            "DELETE FROM notification WHERE user_id = ?1 AND is_read = 1",
            params![user.as_str()],
        )?;
        Ok(affected as u64)
    }

    fn query_notifications(&self, sql: &str, user: &UserId) -> Result<Vec<NotificationRow>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params![user.as_str()], row_to_notification)?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }
}

/// Insert on any connection, so message inserts can reuse their transaction.
pub(crate) fn insert_notification(
    conn: &Connection,
    notification: &NewNotification,
    at: DateTime<Utc>,
) -> Result<NotificationId> {
    let id = NotificationId::generate();
    conn.execute(
        "INSERT INTO notification
            (id, user_id, type, title, content, related_user_id, related_message_id,
             is_read, created_at, read_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, NULL)",
        params![
            id.as_str(),
            notification.user_id.as_str(),
            notification.kind.as_str(),
            notification.title,
            notification.content,
            notification.related_user_id.as_ref().map(UserId::as_str),
            notification.related_message_id.as_ref().map(MessageId::as_str),
            fmt_ts(at),
        ],
    )?;
    Ok(id)
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        related_user_id: row.get(5)?,
        related_message_id: row.get(6)?,
        is_read: row.get(7)?,
        created_at: ts_col(row, 8)?,
        read_at: opt_ts_col(row, 9)?,
    })
}
