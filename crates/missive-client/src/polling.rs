//! Interval-driven refresh.
//!
//! A [`Poller`] runs a refresh closure on a fixed cadence in its own tokio
//! task until it is dropped. Dropping it aborts the task and flips its
//! [`Liveness`] flag, so a fetch that was already in flight is discarded
//! instead of being applied to a view that no longer exists.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use missive_shared::UserId;

use crate::conversation::ConversationAggregator;
use crate::events::{ClientEvent, EventSink};
use crate::notifications::{NotificationCenter, NotificationLoader};

/// Shortest accepted period; `tokio::time::interval` panics on zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// In-flight flag
// ---------------------------------------------------------------------------

/// Shared "an operation is running" flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<AtomicBool>);

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Claim the flag. Returns `None` while another holder is active; the
    /// returned guard releases the flag when dropped.
    pub fn try_begin(&self) -> Option<InFlightGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(self.0.clone()))
    }
}

#[derive(Debug)]
pub struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Whether the poller that issued a tick is still running.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Handle to a running poll loop. The loop stops when this is dropped.
pub struct Poller {
    name: &'static str,
    alive: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Poller {
    /// Run `tick` immediately and then every `period`.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut(Liveness) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let alive = Arc::new(AtomicBool::new(true));
        let liveness = Liveness(alive.clone());

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tick(liveness.clone()).await;
            }
        });

        tracing::debug!(poller = name, period_ms = period.as_millis() as u64, "poller started");
        Self {
            name,
            alive,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        self.alive.load(Ordering::Acquire) && !self.handle.is_finished()
    }

    /// Same as dropping the handle.
    pub fn stop(self) {}
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
        self.handle.abort();
        tracing::debug!(poller = self.name, "poller stopped");
    }
}

// ---------------------------------------------------------------------------
// Refresh loops
// ---------------------------------------------------------------------------

/// Reload the viewer's messages and roster every `period`.
///
/// The fetch runs without holding the view lock; the result replaces the
/// view's state only if the poller is still alive when it arrives.
pub fn poll_conversations(
    view: Arc<Mutex<ConversationAggregator>>,
    period: Duration,
    events: EventSink,
) -> Poller {
    Poller::spawn("conversations", period, move |liveness| {
        let view = view.clone();
        let events = events.clone();
        async move {
            let (loader, viewer, loading) = {
                let v = view.lock().await;
                (v.loader().clone(), v.viewer().clone(), v.loading_flag())
            };
            let Some(_guard) = loading.try_begin() else {
                tracing::debug!(viewer = %viewer.short(), "reload already in flight, skipping tick");
                return;
            };

            let snapshot = loader.load(&viewer).await;
            if !liveness.is_alive() {
                return;
            }

            let count = snapshot.messages.len();
            view.lock().await.apply(snapshot);
            events.emit(ClientEvent::MessagesRefreshed { viewer, count });
        }
    })
}

/// Reload the notification list every `period`.
pub fn poll_notifications(
    center: Arc<Mutex<NotificationCenter>>,
    period: Duration,
    events: EventSink,
) -> Poller {
    Poller::spawn("notifications", period, move |liveness| {
        let center = center.clone();
        let events = events.clone();
        async move {
            let (loader, user, refreshing) = {
                let c = center.lock().await;
                (c.loader(), c.user().clone(), c.refreshing_flag())
            };
            let Some(_guard) = refreshing.try_begin() else {
                return;
            };

            let Some(list) = loader.try_list(&user).await else {
                return;
            };
            if !liveness.is_alive() {
                return;
            }

            let unread = {
                let mut c = center.lock().await;
                c.apply(list);
                c.local_unread_count()
            };
            events.emit(ClientEvent::NotificationsRefreshed { user, unread });
        }
    })
}

/// Latest unread count, shared between the badge poller and readers.
#[derive(Debug, Clone, Default)]
pub struct UnreadBadge(Arc<AtomicU64>);

impl UnreadBadge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, count: u64) {
        self.0.store(count, Ordering::Release);
    }
}

/// Keep `badge` current with the count-only query. A failed poll keeps
/// the previous value.
pub fn poll_unread_badge(
    loader: NotificationLoader,
    user: UserId,
    badge: UnreadBadge,
    period: Duration,
) -> Poller {
    Poller::spawn("unread-badge", period, move |liveness| {
        let loader = loader.clone();
        let user = user.clone();
        let badge = badge.clone();
        async move {
            if let Some(count) = loader.unread_count(&user).await {
                if liveness.is_alive() {
                    badge.set(count);
                }
            }
        }
    })
}
