//! Notification read state.
//!
//! A notification only ever moves `Unread -> Read`. Local state changes
//! only after the backend confirms the write, so the list never shows a
//! read state that did not persist.

use std::sync::Arc;

use chrono::Utc;

use missive_shared::{MessageId, Notification, NotificationId, NotificationKind, UserId};

use crate::backend::BackendDataService;
use crate::events::{ClientEvent, EventSink};
use crate::polling::InFlight;

/// What the host should do after a notification is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailAction {
    None,
    /// Scroll to and highlight this message.
    FocusMessage { message_id: MessageId },
    /// Kinds with no detail view yet (friend requests, system notices).
    Unsupported(NotificationKind),
}

/// Read-only notification queries; failures are logged and degrade.
#[derive(Clone)]
pub struct NotificationLoader {
    backend: Arc<dyn BackendDataService>,
}

impl NotificationLoader {
    pub fn new(backend: Arc<dyn BackendDataService>) -> Self {
        Self { backend }
    }

    /// All notifications of `user`, newest first. Empty on failure.
    pub async fn list(&self, user: &UserId) -> Vec<Notification> {
        self.try_list(user).await.unwrap_or_default()
    }

    /// Like [`list`](Self::list) but `None` on failure, so a poller can
    /// keep what it already has.
    pub async fn try_list(&self, user: &UserId) -> Option<Vec<Notification>> {
        self.fetch(user, false).await
    }

    pub async fn unread(&self, user: &UserId) -> Vec<Notification> {
        self.fetch(user, true).await.unwrap_or_default()
    }

    /// Count-only query for the unread badge.
    pub async fn unread_count(&self, user: &UserId) -> Option<u64> {
        match self.backend.count_unread_notifications(user).await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!(user = %user.short(), error = %e, "failed to count unread notifications");
                None
            }
        }
    }

    async fn fetch(&self, user: &UserId, unread_only: bool) -> Option<Vec<Notification>> {
        match self.backend.select_notifications(user, unread_only).await {
            Ok(rows) => Some(rows.into_iter().map(Notification::from).collect()),
            Err(e) => {
                tracing::error!(user = %user.short(), error = %e, "failed to load notifications");
                None
            }
        }
    }
}

/// One user's notification list and the operations on it.
pub struct NotificationCenter {
    backend: Arc<dyn BackendDataService>,
    user: UserId,
    notifications: Vec<Notification>,
    events: EventSink,
    refreshing: InFlight,
    marking: InFlight,
}

impl NotificationCenter {
    pub fn new(backend: Arc<dyn BackendDataService>, user: UserId, events: EventSink) -> Self {
        Self {
            backend,
            user,
            notifications: Vec::new(),
            events,
            refreshing: InFlight::new(),
            marking: InFlight::new(),
        }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn loader(&self) -> NotificationLoader {
        NotificationLoader::new(self.backend.clone())
    }

    pub(crate) fn refreshing_flag(&self) -> InFlight {
        self.refreshing.clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.is_active()
    }

    pub(crate) fn marking_flag(&self) -> InFlight {
        self.marking.clone()
    }

    /// A mark-read or mark-all-read call is in flight.
    pub fn is_marking(&self) -> bool {
        self.marking.is_active()
    }

    /// Reload the list. A failed load keeps the current list.
    pub async fn refresh(&mut self) -> bool {
        let Some(_guard) = self.refreshing.try_begin() else {
            return false;
        };
        match self.loader().try_list(&self.user).await {
            Some(list) => {
                self.apply(list);
                true
            }
            None => false,
        }
    }

    pub fn apply(&mut self, notifications: Vec<Notification>) {
        self.notifications = notifications;
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn get(&self, id: &NotificationId) -> Option<&Notification> {
        self.notifications.iter().find(|n| &n.id == id)
    }

    pub fn unread(&self) -> impl Iterator<Item = &Notification> {
        self.notifications.iter().filter(|n| !n.is_read)
    }

    pub fn local_unread_count(&self) -> u64 {
        self.unread().count() as u64
    }

    /// Fresh count from the backend; `None` on failure.
    pub async fn unread_count(&self) -> Option<u64> {
        self.loader().unread_count(&self.user).await
    }

    /// Mark one notification read. Marking an already-read notification is
    /// a no-op that succeeds without a backend call. Returns `false` on
    /// failure or while another mark is in flight.
    pub async fn mark_read(&mut self, id: &NotificationId) -> bool {
        if self.get(id).is_some_and(|n| n.is_read) {
            return true;
        }
        let Some(_guard) = self.marking.try_begin() else {
            tracing::debug!(id = %id, "mark already in flight");
            return false;
        };

        let now = Utc::now();
        match self.backend.update_notification_read(id, now).await {
            Ok(true) => {
                if let Some(n) = self.notifications.iter_mut().find(|n| &n.id == id) {
                    n.mark_read(now);
                }
                true
            }
            // Read elsewhere since the last refresh, or deleted.
            Ok(false) => self.reload_one(id).await,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "failed to mark notification read");
                false
            }
        }
    }

    /// Replace the local copy of `id` with the stored row. Returns whether
    /// the stored row is read.
    async fn reload_one(&mut self, id: &NotificationId) -> bool {
        match self.backend.select_notification(id).await {
            Ok(Some(row)) => {
                let stored = Notification::from(row);
                let is_read = stored.is_read;
                if let Some(n) = self.notifications.iter_mut().find(|n| &n.id == id) {
                    *n = stored;
                }
                is_read
            }
            Ok(None) => {
                tracing::debug!(id = %id, "notification no longer exists");
                self.notifications.retain(|n| &n.id != id);
                false
            }
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "failed to reload notification");
                false
            }
        }
    }

    /// Mark every unread notification read in one backend call. Already-read
    /// notifications keep their `read_at`.
    pub async fn mark_all_read(&mut self) -> bool {
        let Some(_guard) = self.marking.try_begin() else {
            tracing::debug!(user = %self.user.short(), "mark already in flight");
            return false;
        };

        let now = Utc::now();
        if let Err(e) = self.backend.update_all_notifications_read(&self.user, now).await {
            tracing::warn!(user = %self.user.short(), error = %e, "failed to mark all notifications read");
            return false;
        }

        let changed = self
            .notifications
            .iter_mut()
            .map(|n| n.mark_read(now))
            .filter(|changed| *changed)
            .count();
        tracing::debug!(user = %self.user.short(), changed, "notifications marked read");
        true
    }

    /// Open a notification. One that points at a message is marked read and
    /// the host is asked to focus that message. The notification need not
    /// be in this center's list.
    pub async fn view_detail(&mut self, notification: &Notification) -> DetailAction {
        let id = &notification.id;

        if let Some(message_id) = notification.related_message_id.clone() {
            if !notification.is_read && !self.mark_read(id).await {
                tracing::warn!(id = %id, "opening notification without marking it read");
            }
            self.events.emit(ClientEvent::FocusMessage {
                message_id: message_id.clone(),
            });
            return DetailAction::FocusMessage { message_id };
        }

        if notification.kind.is_message() {
            DetailAction::None
        } else {
            tracing::debug!(kind = %notification.kind, "no detail view for notification kind");
            DetailAction::Unsupported(notification.kind)
        }
    }

    pub async fn delete(&mut self, id: &NotificationId) -> bool {
        if let Err(e) = self.backend.delete_notification(id).await {
            tracing::warn!(id = %id, error = %e, "failed to delete notification");
            return false;
        }
        self.notifications.retain(|n| &n.id != id);
        true
    }

    /// Remove every read notification of the user.
    pub async fn purge_read(&mut self) -> bool {
        if let Err(e) = self.backend.delete_read_notifications(&self.user).await {
            tracing::warn!(user = %self.user.short(), error = %e, "failed to purge read notifications");
            return false;
        }
        self.notifications.retain(|n| !n.is_read);
        true
    }
}
