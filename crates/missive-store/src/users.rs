use chrono::Utc;
use rusqlite::params;

use missive_shared::rows::UserRow;
use missive_shared::NewUser;

use crate::database::{fmt_ts, opt_ts_col, ts_col, Database};
use crate::error::{not_found, Result};

const USER_COLUMNS: &str =
    "id, username, profile_img, email, provider, created_at, updated_at";

impl Database {
    pub fn insert_user(&self, user: &NewUser) -> Result<UserRow> {
        let now = fmt_ts(Utc::now());
        self.conn().execute(
            r#"INSERT INTO "user" (id, username, profile_img, email, provider, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)"#,
            params![
                user.id.as_str(),
                user.username,
                user.profile_img,
                user.email,
                user.provider,
                now,
            ],
        )?;

        tracing::debug!(user = %user.id.short(), "user row created");
        self.get_user(user.id.as_str())
    }

    pub fn get_user(&self, id: &str) -> Result<UserRow> {
        self.conn()
            .query_row(
                &format!(r#"SELECT {USER_COLUMNS} FROM "user" WHERE id = ?1"#),
                params![id],
                row_to_user,
            )
            .map_err(not_found)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<UserRow> {
        self.conn()
            .query_row(
                &format!(
                    r#"SELECT {USER_COLUMNS} FROM "user" WHERE username = ?1
                       ORDER BY created_at ASC LIMIT 1"#
                ),
                params![username],
                row_to_user,
            )
            .map_err(not_found)
    }

    /// Every user, newest first.
    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        let mut stmt = self.conn().prepare(&format!(
            r#"SELECT {USER_COLUMNS} FROM "user" ORDER BY created_at DESC, rowid DESC"#
        ))?;

        let rows = stmt.query_map([], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    /// Every user except `id`, newest first.
    pub fn list_users_except(&self, id: &str) -> Result<Vec<UserRow>> {
        let mut stmt = self.conn().prepare(&format!(
            r#"SELECT {USER_COLUMNS} FROM "user" WHERE id <> ?1 ORDER BY created_at DESC"#
        ))?;

        let rows = stmt.query_map(params![id], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        profile_img: row.get(2)?,
        email: row.get(3)?,
        provider: row.get(4)?,
        created_at: ts_col(row, 5)?,
        updated_at: opt_ts_col(row, 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;
    use missive_shared::UserId;

    fn new_user(id: &str, name: &str) -> NewUser {
        NewUser {
            id: UserId::new(id),
            username: name.to_string(),
            profile_img: String::new(),
            email: format!("{name}@example.com"),
            provider: "email".to_string(),
        }
    }

    #[test]
    fn insert_and_fetch_user() {
        let db = Database::open_in_memory().unwrap();
        let row = db.insert_user(&new_user("u1", "alice")).unwrap();

        assert_eq!(row.username, "alice");
        assert_eq!(row.email.as_deref(), Some("alice@example.com"));
        assert_eq!(db.get_user_by_username("alice").unwrap().id, "u1");
    }

    #[test]
    fn missing_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.get_user("nobody"), Err(StoreError::NotFound)));
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.insert_user(&new_user("u1", "alice")).unwrap();
        assert!(db.insert_user(&new_user("u1", "again")).is_err());
    }

    #[test]
    fn list_is_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.insert_user(&new_user("owner", "owner")).unwrap();
        db.insert_user(&new_user("a", "alice")).unwrap();
        db.insert_user(&new_user("b", "bob")).unwrap();

        let ids: Vec<String> = db.list_users().unwrap().into_iter().map(|u| u.id).collect();
        assert_eq!(ids, vec!["b", "a", "owner"]);
    }

    #[test]
    fn list_excludes_the_caller() {
        let db = Database::open_in_memory().unwrap();
        db.insert_user(&new_user("owner", "owner")).unwrap();
        db.insert_user(&new_user("a", "alice")).unwrap();
        db.insert_user(&new_user("b", "bob")).unwrap();

        let ids: Vec<String> = db
            .list_users_except("owner")
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();

        assert_eq!(ids.len(), 2);
        assert!(!ids.contains(&"owner".to_string()));
    }
}
