//! # missive-client
//!
//! Client core of the Missive messenger: owner resolution, role-scoped
//! conversations, the message send policy, notification read state and
//! the polling that keeps them fresh. Persistence goes through
//! [`backend::BackendDataService`].

pub mod backend;
pub mod config;
pub mod conversation;
pub mod events;
pub mod identity;
pub mod notifications;
pub mod polling;
pub mod profile;
pub mod send;
pub mod state;
pub mod user_activity;

#[cfg(test)]
mod test_support;

use tracing_subscriber::{fmt, EnvFilter};

pub use backend::{BackendDataService, BackendError, LocalBackend, MessageFilter, RestBackend};
pub use config::ClientConfig;
pub use conversation::{
    compute_message_counts_by_peer, ConversationAggregator, ConversationLoader,
    ConversationSnapshot, FocusTarget,
};
pub use events::{ClientEvent, EventSink};
pub use identity::{OwnerResolver, Role};
pub use notifications::{DetailAction, NotificationCenter, NotificationLoader};
pub use polling::{InFlight, Poller, UnreadBadge};
pub use profile::ProfileError;
pub use send::{MessageSendPolicy, SendError, SendErrorKind};
pub use state::ClientState;
pub use user_activity::{ActivityError, ActivityReport, UserActivity, UserActivityLoader};

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the
/// default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("missive_client=debug,missive_store=info,warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
