use serde::Serialize;
use tokio::sync::mpsc;

use missive_shared::{MessageId, UserId};

pub const EVENT_FOCUS_MESSAGE: &str = "focus-message";
pub const EVENT_MESSAGES_REFRESHED: &str = "messages-refreshed";
pub const EVENT_NOTIFICATIONS_REFRESHED: &str = "notifications-refreshed";

/// Something the host shell should react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Scroll to and highlight a message.
    #[serde(rename_all = "camelCase")]
    FocusMessage { message_id: MessageId },

    #[serde(rename_all = "camelCase")]
    MessagesRefreshed { viewer: UserId, count: usize },

    #[serde(rename_all = "camelCase")]
    NotificationsRefreshed { user: UserId, unread: u64 },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FocusMessage { .. } => EVENT_FOCUS_MESSAGE,
            Self::MessagesRefreshed { .. } => EVENT_MESSAGES_REFRESHED,
            Self::NotificationsRefreshed { .. } => EVENT_NOTIFICATIONS_REFRESHED,
        }
    }
}

/// Sending half of the host event channel. A disabled sink drops events.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<ClientEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: ClientEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        let name = event.name();
        if let Err(e) = tx.send(event) {
            tracing::error!(event = name, error = %e, "Failed to emit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_their_name() {
        let event = ClientEvent::FocusMessage {
            message_id: MessageId::new("m1"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], EVENT_FOCUS_MESSAGE);
        assert_eq!(json["messageId"], "m1");
    }

    #[tokio::test]
    async fn channel_delivers_in_order() {
        let (sink, mut rx) = EventSink::channel();
        sink.emit(ClientEvent::MessagesRefreshed {
            viewer: UserId::new("u"),
            count: 2,
        });
        sink.emit(ClientEvent::NotificationsRefreshed {
            user: UserId::new("u"),
            unread: 1,
        });

        assert_eq!(rx.recv().await.unwrap().name(), EVENT_MESSAGES_REFRESHED);
        assert_eq!(rx.recv().await.unwrap().name(), EVENT_NOTIFICATIONS_REFRESHED);
    }

    #[test]
    fn closed_or_disabled_sinks_do_not_panic() {
        EventSink::disabled().emit(ClientEvent::FocusMessage {
            message_id: MessageId::new("m"),
        });

        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.emit(ClientEvent::FocusMessage {
            message_id: MessageId::new("m"),
        });
    }
}
