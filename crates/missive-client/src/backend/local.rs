use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use missive_shared::rows::{AuthLogRow, MessageViewRow, NotificationRow, UserRow};
use missive_shared::{MessageId, NewMessage, NewUser, NotificationId, Session, UserId};
use missive_store::{Database, NewNotification, StoreError};

use super::{BackendDataService, BackendError, MessageFilter, Result};

/// [`BackendDataService`] over a local `missive-store` database.
///
/// There is no auth provider in local mode; the session is whatever the
/// host configured with [`LocalBackend::with_session`].
pub struct LocalBackend {
    db: Mutex<Database>,
    session: Option<Session>,
}

impl LocalBackend {
    pub fn new(db: Database) -> Self {
        Self {
            db: Mutex::new(db),
            session: None,
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open_at(path)?))
    }

    /// Open the database at the platform data directory.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Database::new()?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Store a notification that is not tied to a message insert, such as
    /// a system notice. The hosted backend creates these server-side.
    pub fn create_notification(&self, notification: &NewNotification) -> Result<NotificationId> {
        self.with_db(|db| db.create_notification(notification))
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> missive_store::Result<T>) -> Result<T> {
        let guard = self.db.lock().map_err(|_| BackendError::LockPoisoned)?;
        Ok(f(&guard)?)
    }

    fn find_one<T>(&self, f: impl FnOnce(&Database) -> missive_store::Result<T>) -> Result<Option<T>> {
        match self.with_db(f) {
            Ok(row) => Ok(Some(row)),
            Err(BackendError::Store(StoreError::NotFound)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl BackendDataService for LocalBackend {
    async fn current_session(&self) -> Result<Option<Session>> {
        Ok(self.session.clone())
    }

    async fn select_user(&self, id: &UserId) -> Result<Option<UserRow>> {
        self.find_one(|db| db.get_user(id.as_str()))
    }

    async fn select_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.find_one(|db| db.get_user_by_username(username))
    }

    async fn select_users(&self) -> Result<Vec<UserRow>> {
        self.with_db(|db| db.list_users())
    }

    async fn select_users_except(&self, id: &UserId) -> Result<Vec<UserRow>> {
        self.with_db(|db| db.list_users_except(id.as_str()))
    }

    async fn insert_user(&self, user: &NewUser) -> Result<UserRow> {
        self.with_db(|db| db.insert_user(user))
    }

    async fn select_messages(&self, filter: &MessageFilter) -> Result<Vec<MessageViewRow>> {
        self.with_db(|db| match filter {
            MessageFilter::All => db.get_all_messages(),
            MessageFilter::Between(a, b) => db.get_messages_between(a, b),
        })
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<MessageId> {
        self.with_db(|db| db.insert_message(message))
    }

    async fn select_notifications(
        &self,
        user: &UserId,
        unread_only: bool,
    ) -> Result<Vec<NotificationRow>> {
        self.with_db(|db| {
            if unread_only {
                db.get_unread_notifications(user)
            } else {
                db.get_notifications_for_user(user)
            }
        })
    }

    async fn count_unread_notifications(&self, user: &UserId) -> Result<u64> {
        self.with_db(|db| db.count_unread_notifications(user))
    }

    async fn select_notification(&self, id: &NotificationId) -> Result<Option<NotificationRow>> {
        self.find_one(|db| db.get_notification(id))
    }

    async fn update_notification_read(
        &self,
        id: &NotificationId,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_db(|db| db.mark_notification_read(id, at))
    }

    async fn update_all_notifications_read(
        &self,
        user: &UserId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_db(|db| db.mark_all_notifications_read(user, at))
            .map(|_| ())
    }

    async fn delete_notification(&self, id: &NotificationId) -> Result<()> {
        self.with_db(|db| db.delete_notification(id)).map(|_| ())
    }

    async fn delete_read_notifications(&self, user: &UserId) -> Result<()> {
        self.with_db(|db| db.delete_read_notifications(user))
            .map(|_| ())
    }

    /// Local mode has no auth provider, hence no audit log.
    async fn select_auth_logs(&self, _limit: usize) -> Result<Vec<AuthLogRow>> {
        Err(BackendError::Unsupported("auth audit log"))
    }
}
