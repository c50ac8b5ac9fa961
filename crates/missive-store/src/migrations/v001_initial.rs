//! v001 -- Initial schema creation.
//!
//! Creates the `user`, `message` and `notification` tables and the
//! `v_message` view that joins author / recipient profile fields onto each
//! message.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS "user" (
    id          TEXT PRIMARY KEY NOT NULL,    -- auth provider identity
    username    TEXT NOT NULL,
    profile_img TEXT NOT NULL DEFAULT '',
    email       TEXT NOT NULL DEFAULT '',
    provider    TEXT NOT NULL DEFAULT 'email',
    created_at  TEXT NOT NULL,                -- RFC-3339, microseconds
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_user_username ON "user"(username);

-- ----------------------------------------------------------------
-- Messages (no FK on the parties: a message outlives its users)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS message (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,  -- insertion order tie-break
    id           TEXT NOT NULL UNIQUE,               -- UUID v4
    author_id    TEXT NOT NULL,
    recipient_id TEXT NOT NULL,
    message      TEXT NOT NULL CHECK (length(message) BETWEEN 1 AND 1000),
    created_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_message_pair
    ON message(author_id, recipient_id, created_at);

CREATE VIEW IF NOT EXISTS v_message AS
SELECT
    m.seq          AS seq,
    m.id           AS id,
    m.author_id    AS author_id,
    a.username     AS author_username,
    a.profile_img  AS author_profile_img,
    m.recipient_id AS recipient_id,
    r.username     AS recipient_username,
    r.profile_img  AS recipient_profile_img,
    m.message      AS message,
    m.created_at   AS created_at
FROM message m
LEFT JOIN "user" a ON a.id = m.author_id
LEFT JOIN "user" r ON r.id = m.recipient_id;

-- ----------------------------------------------------------------
-- Notifications
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notification (
    seq                INTEGER PRIMARY KEY AUTOINCREMENT,
    id                 TEXT NOT NULL UNIQUE,
    user_id            TEXT NOT NULL,
    type               TEXT NOT NULL
        CHECK (type IN ('new_message', 'message_reply', 'friend_request', 'system')),
    title              TEXT NOT NULL,
    content            TEXT,
    related_user_id    TEXT,
    related_message_id TEXT,
    is_read            INTEGER NOT NULL DEFAULT 0,   -- boolean 0/1
    created_at         TEXT NOT NULL,
    read_at            TEXT,

    CHECK ((is_read = 0 AND read_at IS NULL) OR (is_read = 1 AND read_at IS NOT NULL))
);

CREATE INDEX IF NOT EXISTS idx_notification_user
    ON notification(user_id, is_read, created_at DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
