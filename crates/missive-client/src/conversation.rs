//! Conversation aggregation.
//!
//! The owner sees every message and picks a peer from the roster; a regular
//! user sees only their single conversation with the owner. Either way,
//! conversations are derived from the flat message list on every load and
//! never stored.

use std::collections::HashMap;
use std::sync::Arc;

use missive_shared::{Message, MessageId, User, UserId};

use crate::backend::{BackendDataService, MessageFilter};
use crate::identity::{OwnerResolver, Role};
use crate::polling::InFlight;

/// Result of one load: the viewer's roster and visible messages.
#[derive(Debug, Clone, Default)]
pub struct ConversationSnapshot {
    pub roster: Vec<User>,
    pub messages: Vec<Message>,
}

/// Where a focused message lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusTarget {
    pub peer: UserId,
    pub message_id: MessageId,
    /// Position within the peer's conversation.
    pub index: usize,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Role-scoped reads. Failures are logged and degrade to empty results.
#[derive(Clone)]
pub struct ConversationLoader {
    backend: Arc<dyn BackendDataService>,
    resolver: OwnerResolver,
}

impl ConversationLoader {
    pub fn new(backend: Arc<dyn BackendDataService>, resolver: OwnerResolver) -> Self {
        Self { backend, resolver }
    }

    pub fn resolver(&self) -> &OwnerResolver {
        &self.resolver
    }

    /// Messages `viewer` may see, oldest first.
    ///
    /// The owner gets everything. A regular user gets only messages
    /// exchanged with the owner; the backend query is scoped that way and
    /// the result is filtered again here.
    pub async fn load_visible_messages(&self, viewer: &UserId) -> Vec<Message> {
        let (filter, owner) = match self.resolver.role_of(viewer) {
            Role::Owner => (MessageFilter::All, None),
            Role::Regular => match self.resolver.owner_id() {
                Some(owner) => (
                    MessageFilter::Between(viewer.clone(), owner.clone()),
                    Some(owner),
                ),
                None => {
                    tracing::warn!(viewer = %viewer.short(), "no owner configured, nothing to load");
                    return Vec::new();
                }
            },
        };

        let rows = match self.backend.select_messages(&filter).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(viewer = %viewer.short(), error = %e, "failed to load messages");
                return Vec::new();
            }
        };

        let mut messages: Vec<Message> = rows.into_iter().map(Message::from).collect();
        if let Some(owner) = owner {
            let before = messages.len();
            messages.retain(|m| is_exchange(m, viewer, owner));
            if messages.len() != before {
                tracing::warn!(
                    dropped = before - messages.len(),
                    "backend returned messages outside the viewer's conversation"
                );
            }
        }
        messages.sort_by_key(|m| m.created_at);

        tracing::debug!(viewer = %viewer.short(), count = messages.len(), "messages loaded");
        messages
    }

    /// Users `viewer` can talk to: everyone else for the owner, the owner
    /// alone for a regular user.
    pub async fn load_roster(&self, viewer: &UserId) -> Vec<User> {
        let result = match self.resolver.role_of(viewer) {
            Role::Owner => self.backend.select_users_except(viewer).await,
            Role::Regular => match self.resolver.owner_id() {
                Some(owner) => self
                    .backend
                    .select_user(owner)
                    .await
                    .map(|row| row.into_iter().collect()),
                None => return Vec::new(),
            },
        };

        match result {
            Ok(rows) => rows.into_iter().map(User::from).collect(),
            Err(e) => {
                tracing::error!(viewer = %viewer.short(), error = %e, "failed to load roster");
                Vec::new()
            }
        }
    }

    pub async fn load(&self, viewer: &UserId) -> ConversationSnapshot {
        let (roster, messages) =
            tokio::join!(self.load_roster(viewer), self.load_visible_messages(viewer));
        ConversationSnapshot { roster, messages }
    }
}

fn is_exchange(m: &Message, a: &UserId, b: &UserId) -> bool {
    (&m.author.id == a && &m.recipient.id == b) || (&m.author.id == b && &m.recipient.id == a)
}

// ---------------------------------------------------------------------------
// Pure aggregation
// ---------------------------------------------------------------------------

/// Messages per roster member, counting a message when the peer is its
/// author or recipient. Every peer gets an entry, zero included.
pub fn compute_message_counts_by_peer(
    messages: &[Message],
    peers: &[UserId],
) -> HashMap<UserId, usize> {
    let mut counts: HashMap<UserId, usize> = peers.iter().map(|p| (p.clone(), 0)).collect();

    for m in messages {
        if let Some(n) = counts.get_mut(&m.author.id) {
            *n += 1;
        }
        if m.recipient.id != m.author.id {
            if let Some(n) = counts.get_mut(&m.recipient.id) {
                *n += 1;
            }
        }
    }
    counts
}

/// Messages where `peer` is author or recipient, in input order.
pub fn conversation_with(messages: &[Message], peer: &UserId) -> Vec<Message> {
    messages.iter().filter(|m| m.involves(peer)).cloned().collect()
}

// ---------------------------------------------------------------------------
// View state
// ---------------------------------------------------------------------------

/// Per-viewer conversation state: the last loaded snapshot, the derived
/// counts and the selected peer.
pub struct ConversationAggregator {
    loader: ConversationLoader,
    viewer: UserId,
    roster: Vec<User>,
    messages: Vec<Message>,
    counts: HashMap<UserId, usize>,
    selected: Option<UserId>,
    loading: InFlight,
}

impl ConversationAggregator {
    pub fn new(loader: ConversationLoader, viewer: UserId) -> Self {
        Self {
            loader,
            viewer,
            roster: Vec::new(),
            messages: Vec::new(),
            counts: HashMap::new(),
            selected: None,
            loading: InFlight::new(),
        }
    }

    pub fn viewer(&self) -> &UserId {
        &self.viewer
    }

    pub fn role(&self) -> Role {
        self.loader.resolver().role_of(&self.viewer)
    }

    pub fn loader(&self) -> &ConversationLoader {
        &self.loader
    }

    pub(crate) fn loading_flag(&self) -> InFlight {
        self.loading.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_active()
    }

    /// Reload from the backend. Returns `false` when a reload was already
    /// running and this call did nothing.
    pub async fn refresh(&mut self) -> bool {
        let Some(_guard) = self.loading.try_begin() else {
            tracing::debug!(viewer = %self.viewer.short(), "reload already in flight");
            return false;
        };
        let snapshot = self.loader.load(&self.viewer).await;
        self.apply(snapshot);
        true
    }

    /// Replace state with a loaded snapshot. The selected peer survives.
    pub fn apply(&mut self, snapshot: ConversationSnapshot) {
        let peers: Vec<UserId> = snapshot.roster.iter().map(|u| u.id.clone()).collect();
        self.counts = compute_message_counts_by_peer(&snapshot.messages, &peers);
        self.roster = snapshot.roster;
        self.messages = snapshot.messages;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn roster(&self) -> &[User] {
        &self.roster
    }

    pub fn message_counts(&self) -> &HashMap<UserId, usize> {
        &self.counts
    }

    pub fn count_for(&self, peer: &UserId) -> usize {
        self.counts.get(peer).copied().unwrap_or(0)
    }

    /// Select `peer` and return its conversation. Selecting the peer that is
    /// already selected clears the selection and returns nothing.
    pub fn select_peer(&mut self, peer: &UserId) -> Vec<Message> {
        if self.selected.as_ref() == Some(peer) {
            self.selected = None;
            return Vec::new();
        }
        self.selected = Some(peer.clone());
        self.conversation()
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected_peer(&self) -> Option<&UserId> {
        self.selected.as_ref()
    }

    /// The selected peer's conversation, empty when no peer is selected.
    pub fn conversation(&self) -> Vec<Message> {
        match &self.selected {
            Some(peer) => conversation_with(&self.messages, peer),
            None => Vec::new(),
        }
    }

    /// Select the conversation containing `message_id` (never toggling it
    /// off) and report where the message sits in it.
    pub fn focus_message(&mut self, message_id: &MessageId) -> Option<FocusTarget> {
        let message = self.messages.iter().find(|m| &m.id == message_id)?;
        let peer = message.counterpart(&self.viewer).id.clone();

        self.selected = Some(peer.clone());
        let index = conversation_with(&self.messages, &peer)
            .iter()
            .position(|m| &m.id == message_id)?;

        Some(FocusTarget {
            peer,
            message_id: message_id.clone(),
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use missive_shared::UserRef;

    use crate::test_support::{resolver, FlakyBackend, OWNER};

    fn party(id: &str) -> UserRef {
        UserRef {
            id: UserId::new(id),
            username: id.to_string(),
            profile_img: String::new(),
        }
    }

    fn msg(id: &str, from: &str, to: &str, minute: i64) -> Message {
        Message {
            id: MessageId::new(id),
            author: party(from),
            recipient: party(to),
            body: id.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
                + Duration::minutes(minute),
        }
    }

    fn ids(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn counts_are_total_over_the_roster() {
        let messages = vec![
            msg("m1", "alice", OWNER, 0),
            msg("m2", OWNER, "alice", 1),
            msg("m3", "bob", OWNER, 2),
            msg("m4", "stranger", OWNER, 3),
        ];
        let roster = vec![UserId::new("alice"), UserId::new("bob"), UserId::new("carol")];

        let counts = compute_message_counts_by_peer(&messages, &roster);
        assert_eq!(counts.len(), 3);
        assert_eq!(counts[&UserId::new("alice")], 2);
        assert_eq!(counts[&UserId::new("bob")], 1);
        assert_eq!(counts[&UserId::new("carol")], 0);
    }

    #[test]
    fn empty_roster_gives_empty_counts() {
        let messages = vec![msg("m1", "alice", OWNER, 0)];
        assert!(compute_message_counts_by_peer(&messages, &[]).is_empty());
    }

    #[test]
    fn unknown_peer_has_empty_conversation() {
        let messages = vec![msg("m1", "alice", OWNER, 0)];
        assert!(conversation_with(&messages, &UserId::new("nobody")).is_empty());
    }

    fn aggregator_with(messages: Vec<Message>, viewer: &str) -> ConversationAggregator {
        let loader = ConversationLoader::new(FlakyBackend::new(), resolver());
        let mut agg = ConversationAggregator::new(loader, UserId::new(viewer));
        agg.apply(ConversationSnapshot {
            roster: Vec::new(),
            messages,
        });
        agg
    }

    #[test]
    fn selecting_the_same_peer_twice_toggles_off() {
        let mut agg = aggregator_with(
            vec![msg("m1", "alice", OWNER, 0), msg("m2", "bob", OWNER, 1)],
            OWNER,
        );
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");

        assert_eq!(ids(&agg.select_peer(&alice)), vec!["m1"]);
        assert!(agg.select_peer(&alice).is_empty());
        assert!(agg.selected_peer().is_none());

        agg.select_peer(&alice);
        assert_eq!(ids(&agg.select_peer(&bob)), vec!["m2"]);
        assert_eq!(agg.selected_peer(), Some(&bob));
    }

    #[test]
    fn focus_selects_without_toggling() {
        let mut agg = aggregator_with(
            vec![
                msg("m1", "alice", OWNER, 0),
                msg("m2", "bob", OWNER, 1),
                msg("m3", OWNER, "alice", 2),
            ],
            OWNER,
        );
        let alice = UserId::new("alice");
        agg.select_peer(&alice);

        let target = agg.focus_message(&MessageId::new("m3")).unwrap();
        assert_eq!(target.peer, alice);
        assert_eq!(target.index, 1);
        assert_eq!(agg.selected_peer(), Some(&alice));

        assert!(agg.focus_message(&MessageId::new("missing")).is_none());
    }

    #[tokio::test]
    async fn regular_user_never_sees_other_regular_users() {
        let backend = FlakyBackend::new();
        let owner = backend.seed_user(OWNER).await;
        let alice = backend.seed_user("alice").await;
        let bob = backend.seed_user("bob").await;

        backend.insert_raw(&alice, &owner, "to owner").await;
        backend.insert_raw(&alice, &bob, "side channel").await;
        backend.insert_raw(&bob, &owner, "bob to owner").await;
        backend.insert_raw(&owner, &alice, "reply").await;

        let loader = ConversationLoader::new(backend.clone(), resolver());
        let bodies: Vec<String> = loader
            .load_visible_messages(&alice)
            .await
            .into_iter()
            .map(|m| m.body)
            .collect();
        assert_eq!(bodies, vec!["to owner", "reply"]);

        assert_eq!(loader.load_visible_messages(&owner).await.len(), 4);
    }

    #[tokio::test]
    async fn backend_failure_degrades_to_empty() {
        let backend = FlakyBackend::new();
        let owner = backend.seed_user(OWNER).await;
        let alice = backend.seed_user("alice").await;
        backend.insert_raw(&alice, &owner, "hi").await;
        backend.set_failing(true);

        let loader = ConversationLoader::new(backend.clone(), resolver());
        assert!(loader.load_visible_messages(&owner).await.is_empty());
        assert!(loader.load_roster(&owner).await.is_empty());
    }

    #[tokio::test]
    async fn roster_depends_on_role() {
        let backend = FlakyBackend::new();
        let owner = backend.seed_user(OWNER).await;
        let alice = backend.seed_user("alice").await;
        backend.seed_user("bob").await;

        let loader = ConversationLoader::new(backend.clone(), resolver());

        let owner_roster: Vec<UserId> =
            loader.load_roster(&owner).await.into_iter().map(|u| u.id).collect();
        assert_eq!(owner_roster.len(), 2);
        assert!(!owner_roster.contains(&owner));

        let alice_roster = loader.load_roster(&alice).await;
        assert_eq!(alice_roster.len(), 1);
        assert_eq!(alice_roster[0].id, owner);
    }

    #[tokio::test]
    async fn no_owner_configured_means_nothing_visible() {
        let backend = FlakyBackend::new();
        let alice = backend.seed_user("alice").await;
        let bob = backend.seed_user("bob").await;
        backend.insert_raw(&alice, &bob, "hello").await;

        let loader = ConversationLoader::new(backend.clone(), OwnerResolver::new(None));
        assert!(loader.load_visible_messages(&alice).await.is_empty());
        assert!(loader.load_roster(&alice).await.is_empty());
    }

    #[tokio::test]
    async fn refresh_recomputes_counts() {
        let backend = FlakyBackend::new();
        let owner = backend.seed_user(OWNER).await;
        let alice = backend.seed_user("alice").await;
        let bob = backend.seed_user("bob").await;
        backend.insert_raw(&alice, &owner, "1").await;
        backend.insert_raw(&owner, &alice, "2").await;

        let loader = ConversationLoader::new(backend.clone(), resolver());
        let mut agg = ConversationAggregator::new(loader, owner.clone());
        assert!(agg.refresh().await);

        assert_eq!(agg.role(), Role::Owner);
        assert_eq!(agg.count_for(&alice), 2);
        assert_eq!(agg.count_for(&bob), 0);
        assert_eq!(agg.message_counts().len(), 2);
        assert!(!agg.is_loading());
    }
}
