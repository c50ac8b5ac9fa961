//! Client state shared by the host shell.
//!
//! [`ClientState`] holds what is fixed for the lifetime of the process (the
//! configuration, the backend adapter, the owner resolver and the event
//! sink) and hands out the per-view components. It carries no notion of a
//! current user; every component takes the acting user explicitly.

use std::sync::Arc;

use missive_shared::{User, UserId};

use crate::backend::BackendDataService;
use crate::config::ClientConfig;
use crate::conversation::{ConversationAggregator, ConversationLoader};
use crate::events::EventSink;
use crate::identity::OwnerResolver;
use crate::notifications::{NotificationCenter, NotificationLoader};
use crate::profile::{ensure_profile, ProfileError};
use crate::send::MessageSendPolicy;
use crate::user_activity::UserActivityLoader;

pub struct ClientState {
    pub config: ClientConfig,
    pub backend: Arc<dyn BackendDataService>,
    pub resolver: OwnerResolver,
    pub events: EventSink,
}

impl ClientState {
    pub fn new(config: ClientConfig, backend: Arc<dyn BackendDataService>, events: EventSink) -> Self {
        let resolver = OwnerResolver::new(config.owner_id.clone());
        Self {
            config,
            backend,
            resolver,
            events,
        }
    }

    pub fn conversation_loader(&self) -> ConversationLoader {
        ConversationLoader::new(self.backend.clone(), self.resolver.clone())
    }

    pub fn conversations(&self, viewer: UserId) -> ConversationAggregator {
        ConversationAggregator::new(self.conversation_loader(), viewer)
    }

    pub fn sender(&self) -> MessageSendPolicy {
        MessageSendPolicy::new(self.backend.clone(), self.resolver.clone())
    }

    pub fn notification_loader(&self) -> NotificationLoader {
        NotificationLoader::new(self.backend.clone())
    }

    pub fn notifications(&self, user: UserId) -> NotificationCenter {
        NotificationCenter::new(self.backend.clone(), user, self.events.clone())
    }

    pub fn user_activity(&self) -> UserActivityLoader {
        UserActivityLoader::new(self.backend.clone(), self.resolver.clone())
    }

    /// The signed-in user's profile.
    ///
    /// With an auth session the profile is fetched or created on first
    /// sign-in. Without one, the configured local user id is looked up.
    /// `Ok(None)` means there is nobody signed in.
    pub async fn resolve_viewer(&self) -> Result<Option<User>, ProfileError> {
        if let Some(session) = self.backend.current_session().await? {
            return ensure_profile(self.backend.as_ref(), &session).await.map(Some);
        }

        let Some(user_id) = self.config.user_id.as_ref() else {
            return Ok(None);
        };
        Ok(self.backend.select_user(user_id).await?.map(User::from))
    }
}
