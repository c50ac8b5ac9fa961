//! # missive
//!
//! Headless Missive client. Resolves the signed-in user, then keeps their
//! conversations and notifications fresh on the configured cadence and
//! logs every refresh until Ctrl+C.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use tokio::sync::Mutex;
use tracing::info;

use missive_client::polling::{
    poll_conversations, poll_notifications, poll_unread_badge, UnreadBadge,
};
use missive_client::{backend, init_tracing, ClientConfig, ClientEvent, ClientState, EventSink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Tracing and configuration
    // -----------------------------------------------------------------------
    init_tracing();
    info!("Starting Missive client v{}", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::from_env();
    info!(
        hosted = config.backend_url.is_some(),
        owner_configured = config.owner_id.is_some(),
        message_poll_ms = config.message_poll_interval.as_millis() as u64,
        notification_poll_ms = config.notification_poll_interval.as_millis() as u64,
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 2. Backend and viewer
    // -----------------------------------------------------------------------
    let backend = backend::connect(&config).context("failed to set up backend")?;
    let (events, mut rx) = EventSink::channel();
    let state = ClientState::new(config, backend, events.clone());

    let viewer = state
        .resolve_viewer()
        .await
        .context("failed to load the signed-in profile")?
        .ok_or_else(|| anyhow!("nobody is signed in; set MISSIVE_ACCESS_TOKEN or MISSIVE_USER_ID"))?;
    info!(
        user = %viewer.id.short(),
        username = %viewer.username,
        role = ?state.resolver.role_of(&viewer.id),
        "Signed in"
    );

    if state.resolver.is_owner(Some(&viewer.id)) {
        match state.user_activity().load(&viewer.id).await {
            Ok(report) => info!(
                users = report.users.len(),
                sign_ins_known = report.logs_available,
                "User activity loaded"
            ),
            Err(e) => tracing::warn!(error = %e, "User activity unavailable"),
        }
    }

    // -----------------------------------------------------------------------
    // 3. Pollers (stopped when dropped at the end of main)
    // -----------------------------------------------------------------------
    let conversations = Arc::new(Mutex::new(state.conversations(viewer.id.clone())));
    let notifications = Arc::new(Mutex::new(state.notifications(viewer.id.clone())));
    let badge = UnreadBadge::new();

    let _pollers = [
        poll_conversations(
            conversations.clone(),
            state.config.message_poll_interval,
            events.clone(),
        ),
        poll_notifications(
            notifications.clone(),
            state.config.notification_poll_interval,
            events.clone(),
        ),
        poll_unread_badge(
            state.notification_loader(),
            viewer.id.clone(),
            badge.clone(),
            state.config.notification_poll_interval,
        ),
    ];

    // -----------------------------------------------------------------------
    // 4. Log events until shutdown
    // -----------------------------------------------------------------------
    loop {
        tokio::select! {
            Some(event) = rx.recv() => match event {
                ClientEvent::MessagesRefreshed { count, .. } => {
                    let view = conversations.lock().await;
                    info!(
                        messages = count,
                        peers = view.roster().len(),
                        "Conversations refreshed"
                    );
                }
                ClientEvent::NotificationsRefreshed { unread, .. } => {
                    info!(unread, badge = badge.get(), "Notifications refreshed");
                }
                ClientEvent::FocusMessage { message_id } => {
                    let mut view = conversations.lock().await;
                    match view.focus_message(&message_id) {
                        Some(target) => info!(
                            msg_id = %message_id,
                            peer = %target.peer.short(),
                            index = target.index,
                            "Focus message"
                        ),
                        None => tracing::warn!(msg_id = %message_id, "Focused message not loaded"),
                    }
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    Ok(())
}
