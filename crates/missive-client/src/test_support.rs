//! In-memory backend with a failure switch and call counters.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use missive_shared::rows::{AuthLogRow, MessageViewRow, NotificationRow, UserRow};
use missive_shared::{MessageId, NewMessage, NewUser, NotificationId, Session, UserId};
use missive_store::NewNotification;

use crate::backend::{BackendDataService, BackendError, LocalBackend, MessageFilter, Result};
use crate::identity::OwnerResolver;

pub(crate) const OWNER: &str = "owner";

pub(crate) fn resolver() -> OwnerResolver {
    OwnerResolver::new(Some(UserId::new(OWNER)))
}

pub(crate) struct FlakyBackend {
    inner: LocalBackend,
    failing: AtomicBool,
    message_inserts: AtomicUsize,
    read_updates: AtomicUsize,
    read_all_updates: AtomicUsize,
    gate: Mutex<Option<Arc<LoadGate>>>,
    auth_logs: Mutex<Option<Vec<AuthLogRow>>>,
}

/// Holds list loads (`select_messages`, `select_notifications`) until
/// released.
#[derive(Default)]
pub(crate) struct LoadGate {
    entered: Notify,
    release: Notify,
}

impl LoadGate {
    /// Wait until a load is parked at the gate.
    pub(crate) async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub(crate) fn release(&self) {
        self.release.notify_one();
    }
}

impl FlakyBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: LocalBackend::in_memory().unwrap(),
            failing: AtomicBool::new(false),
            message_inserts: AtomicUsize::new(0),
            read_updates: AtomicUsize::new(0),
            read_all_updates: AtomicUsize::new(0),
            gate: Mutex::new(None),
            auth_logs: Mutex::new(None),
        })
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn message_inserts(&self) -> usize {
        self.message_inserts.load(Ordering::SeqCst)
    }

    pub(crate) fn read_updates(&self) -> usize {
        self.read_updates.load(Ordering::SeqCst)
    }

    pub(crate) fn read_all_updates(&self) -> usize {
        self.read_all_updates.load(Ordering::SeqCst)
    }

    pub(crate) async fn seed_user(&self, id: &str) -> UserId {
        self.inner
            .insert_user(&NewUser {
                id: UserId::new(id),
                username: id.to_string(),
                profile_img: String::new(),
                email: format!("{id}@example.com"),
                provider: "email".to_string(),
            })
            .await
            .unwrap();
        UserId::new(id)
    }

    /// Insert straight into storage, bypassing any send rules.
    pub(crate) async fn insert_raw(&self, from: &UserId, to: &UserId, body: &str) -> MessageId {
        self.inner
            .insert_message(&NewMessage {
                author_id: from.clone(),
                recipient_id: to.clone(),
                body: body.to_string(),
            })
            .await
            .unwrap()
    }

    pub(crate) async fn create_notification(&self, notification: NewNotification) -> NotificationId {
        self.inner.create_notification(&notification).unwrap()
    }

    /// Serve `logs` as the auth audit log instead of refusing the read.
    pub(crate) fn set_auth_logs(&self, logs: Vec<AuthLogRow>) {
        *self.auth_logs.lock().unwrap() = Some(logs);
    }

    /// Park every later list load until the returned gate is released.
    pub(crate) fn hold_loads(&self) -> Arc<LoadGate> {
        let gate = Arc::new(LoadGate::default());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    async fn pass_gate(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 503,
                message: "backend unavailable".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BackendDataService for FlakyBackend {
    async fn current_session(&self) -> Result<Option<Session>> {
        self.check()?;
        self.inner.current_session().await
    }

    async fn select_user(&self, id: &UserId) -> Result<Option<UserRow>> {
        self.check()?;
        self.inner.select_user(id).await
    }

    async fn select_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.check()?;
        self.inner.select_user_by_username(username).await
    }

    async fn select_users(&self) -> Result<Vec<UserRow>> {
        self.check()?;
        self.inner.select_users().await
    }

    async fn select_users_except(&self, id: &UserId) -> Result<Vec<UserRow>> {
        self.check()?;
        self.inner.select_users_except(id).await
    }

    async fn insert_user(&self, user: &NewUser) -> Result<UserRow> {
        self.check()?;
        self.inner.insert_user(user).await
    }

    async fn select_messages(&self, filter: &MessageFilter) -> Result<Vec<MessageViewRow>> {
        self.check()?;
        self.pass_gate().await;
        self.inner.select_messages(filter).await
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<MessageId> {
        self.check()?;
        self.message_inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_message(message).await
    }

    async fn select_notifications(
        &self,
        user: &UserId,
        unread_only: bool,
    ) -> Result<Vec<NotificationRow>> {
        self.check()?;
        self.pass_gate().await;
        self.inner.select_notifications(user, unread_only).await
    }

    async fn count_unread_notifications(&self, user: &UserId) -> Result<u64> {
        self.check()?;
        self.inner.count_unread_notifications(user).await
    }

    async fn select_notification(&self, id: &NotificationId) -> Result<Option<NotificationRow>> {
        self.check()?;
        self.inner.select_notification(id).await
    }

    async fn update_notification_read(
        &self,
        id: &NotificationId,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.check()?;
        self.read_updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_notification_read(id, at).await
    }

    async fn update_all_notifications_read(
        &self,
        user: &UserId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.check()?;
        self.read_all_updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_all_notifications_read(user, at).await
    }

    async fn delete_notification(&self, id: &NotificationId) -> Result<()> {
        self.check()?;
        self.inner.delete_notification(id).await
    }

    async fn delete_read_notifications(&self, user: &UserId) -> Result<()> {
        self.check()?;
        self.inner.delete_read_notifications(user).await
    }

    async fn select_auth_logs(&self, limit: usize) -> Result<Vec<AuthLogRow>> {
        self.check()?;
        let logs = self.auth_logs.lock().unwrap().clone();
        match logs {
            Some(logs) => Ok(logs.into_iter().take(limit).collect()),
            None => self.inner.select_auth_logs(limit).await,
        }
    }
}
