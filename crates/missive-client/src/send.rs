//! Outgoing message validation and routing.

use std::sync::Arc;

use thiserror::Error;

use missive_shared::{validate_message_body, BodyError, MessageId, NewMessage, UserId};

use crate::backend::{BackendDataService, BackendError};
use crate::identity::OwnerResolver;
use crate::polling::InFlight;

/// Coarse classification of [`SendError`] for hosts that only need to pick
/// a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendErrorKind {
    EmptyBody,
    TooLong,
    RecipientRequired,
    OwnerNotConfigured,
    AlreadySending,
    SendFailed,
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("Message body is empty")]
    EmptyBody,

    #[error("Message body too long: {len} characters (max {max})")]
    TooLong { len: usize, max: usize },

    /// The owner must name who the message is for.
    #[error("A recipient is required")]
    RecipientRequired,

    /// A regular user can only write to the owner, and there is none.
    #[error("No owner is configured to receive messages")]
    OwnerNotConfigured,

    #[error("A message is already being sent")]
    AlreadySending,

    #[error("Failed to send message: {0}")]
    SendFailed(#[source] BackendError),
}

impl SendError {
    pub fn kind(&self) -> SendErrorKind {
        match self {
            Self::EmptyBody => SendErrorKind::EmptyBody,
            Self::TooLong { .. } => SendErrorKind::TooLong,
            Self::RecipientRequired => SendErrorKind::RecipientRequired,
            Self::OwnerNotConfigured => SendErrorKind::OwnerNotConfigured,
            Self::AlreadySending => SendErrorKind::AlreadySending,
            Self::SendFailed(_) => SendErrorKind::SendFailed,
        }
    }

    /// The input has to change before a retry can succeed.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyBody | Self::TooLong { .. } | Self::RecipientRequired
        )
    }

    /// Trying again with the same input may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SendFailed(_) | Self::AlreadySending)
    }
}

impl From<BodyError> for SendError {
    fn from(e: BodyError) -> Self {
        match e {
            BodyError::Empty => Self::EmptyBody,
            BodyError::TooLong { len, max } => Self::TooLong { len, max },
        }
    }
}

/// Validates and routes outgoing messages.
///
/// Regular users always write to the owner. The owner writes to whoever
/// they name. Sending is not idempotent and does not touch any loaded
/// conversation; callers reload to see the new message.
#[derive(Clone)]
pub struct MessageSendPolicy {
    backend: Arc<dyn BackendDataService>,
    resolver: OwnerResolver,
    sending: InFlight,
}

impl MessageSendPolicy {
    pub fn new(backend: Arc<dyn BackendDataService>, resolver: OwnerResolver) -> Self {
        Self {
            backend,
            resolver,
            sending: InFlight::new(),
        }
    }

    pub fn is_sending(&self) -> bool {
        self.sending.is_active()
    }

    /// Who a message from `author` goes to. A regular author's explicit
    /// recipient is ignored.
    pub fn resolve_recipient(
        &self,
        author: &UserId,
        explicit: Option<&UserId>,
    ) -> Result<UserId, SendError> {
        if self.resolver.is_owner(Some(author)) {
            return explicit
                .filter(|id| !id.is_empty())
                .cloned()
                .ok_or(SendError::RecipientRequired);
        }

        let owner = self
            .resolver
            .owner_id()
            .cloned()
            .ok_or(SendError::OwnerNotConfigured)?;
        if let Some(requested) = explicit.filter(|id| **id != owner) {
            tracing::debug!(
                author = %author.short(),
                requested = %requested.short(),
                "ignoring recipient for regular user, routing to owner"
            );
        }
        Ok(owner)
    }

    /// Validate, route and insert one message.
    pub async fn send(
        &self,
        author: &UserId,
        body: &str,
        explicit_recipient: Option<&UserId>,
    ) -> Result<MessageId, SendError> {
        let body = validate_message_body(body)?;
        let recipient = self.resolve_recipient(author, explicit_recipient)?;

        let Some(_guard) = self.sending.try_begin() else {
            return Err(SendError::AlreadySending);
        };

        let message = NewMessage {
            author_id: author.clone(),
            recipient_id: recipient,
            body: body.to_string(),
        };

        match self.backend.insert_message(&message).await {
            Ok(id) => {
                tracing::info!(
                    msg_id = %id,
                    author = %author.short(),
                    recipient = %message.recipient_id.short(),
                    "message sent"
                );
                Ok(id)
            }
            Err(e) => {
                tracing::warn!(author = %author.short(), error = %e, "message send failed");
                Err(SendError::SendFailed(e))
            }
        }
    }
}
