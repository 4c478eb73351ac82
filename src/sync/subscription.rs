//! Live subscription: pull once, then follow the push channel.
//!
//! A [`LiveSubscription`] binds one [`Feed`] to one key (headquarter id or
//! ticket id). Mounting with a key:
//!
//! 1. spawns the pull and records its result with `set_pulled`,
//! 2. opens a transport connection and records every matching frame with
//!    `set_pushed`.
//!
//! Every mount, key change and unmount bumps a generation counter. Late pull
//! results and frames carry the generation they were started under and
//! are discarded when it no longer matches, so nothing from an old key or
//! an unmounted subscription ever reaches the store.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::feed::Feed;
use super::snapshot::{Snapshot, SnapshotStore};
use super::state::LiveState;
use crate::api::Backend;
use crate::domain::PushFrame;
use crate::error::SyncError;
use crate::transport::{ConnectionHandle, FrameHandler, Transport};

/// Bounds every feed payload satisfies.
pub trait FeedValue: DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> FeedValue for T where T: DeserializeOwned + Clone + Send + Sync + 'static {}

/// Shared cell observed by consumers.
#[derive(Debug, Clone)]
struct Cell<T> {
    generation: u64,
    mounted: bool,
    keyed: bool,
    store: SnapshotStore<T>,
    error: Option<String>,
}

impl<T> Cell<T> {
    const fn new() -> Self {
        Self {
            generation: 0,
            mounted: false,
            keyed: false,
            store: SnapshotStore::new(),
            error: None,
        }
    }

    const fn accepts(&self, generation: u64) -> bool {
        self.mounted && self.generation == generation
    }
}

impl<T: Clone> Cell<T> {
    fn view(&self) -> LiveState<T> {
        if !self.mounted || !self.keyed {
            return LiveState::Idle;
        }
        if let Some(value) = self.store.current() {
            return LiveState::Data(value.clone());
        }
        match &self.error {
            Some(message) => LiveState::Error(message.clone()),
            None => LiveState::Loading,
        }
    }
}

/// One subscription-hook instance.
///
/// Owns its snapshot exclusively; dropping it unmounts.
pub struct LiveSubscription<T: FeedValue> {
    feed: Feed<T>,
    backend: Arc<dyn Backend>,
    transport: Arc<dyn Transport>,
    cell: Arc<watch::Sender<Cell<T>>>,
    key: Option<String>,
    connection: Option<ConnectionHandle>,
    pull: Option<JoinHandle<()>>,
}

impl<T: FeedValue> LiveSubscription<T> {
    /// Creates an unmounted subscription.
    #[must_use]
    pub fn new(feed: Feed<T>, backend: Arc<dyn Backend>, transport: Arc<dyn Transport>) -> Self {
        let (cell, _) = watch::channel(Cell::new());
        Self {
            feed,
            backend,
            transport,
            cell: Arc::new(cell),
            key: None,
            connection: None,
            pull: None,
        }
    }

    /// Mounts the subscription for `key`.
    ///
    /// An absent or blank key skips both pull and connection and leaves
    /// the subscription idle. Mounting again with a different key behaves
    /// like [`LiveSubscription::set_key`]. Must be called within a Tokio
    /// runtime.
    pub fn mount(&mut self, key: Option<impl Into<String>>) {
        self.set_key(key);
    }

    /// Switches to a new key, discarding everything from the previous one.
    ///
    /// No-op if already mounted with the same key.
    pub fn set_key(&mut self, key: Option<impl Into<String>>) {
        let key = key
            .map(|k| k.into().trim().to_string())
            .filter(|k| !k.is_empty());
        if self.is_mounted() && self.key == key {
            return;
        }

        self.teardown();
        let generation = self.cell.borrow().generation.wrapping_add(1);
        let keyed = key.is_some();
        self.cell.send_modify(|cell| {
            cell.generation = generation;
            cell.mounted = true;
            cell.keyed = keyed;
            cell.store.reset();
            cell.error = None;
        });
        self.key.clone_from(&key);

        let Some(key) = key else {
            tracing::debug!(feed = self.feed.name(), "no key selected; subscription idle");
            return;
        };
        tracing::debug!(feed = self.feed.name(), %key, generation, "subscription mounted");

        self.start_pull(&key, generation);
        let handler = self.frame_handler(key, generation);
        self.connection = Some(self.transport.open(handler));
    }

    /// Re-issues the pull for the current key.
    ///
    /// The push-wins rule still applies: if a push already arrived the
    /// result only clears a previous error.
    pub fn refresh(&mut self) {
        let Some(key) = self.key.clone() else {
            return;
        };
        if !self.is_mounted() {
            return;
        }
        if let Some(pull) = self.pull.take() {
            pull.abort();
        }
        let generation = self.cell.borrow().generation;
        self.start_pull(&key, generation);
    }

    /// Closes the connection, abandons the in-flight pull, and freezes the
    /// snapshot.
    pub fn unmount(&mut self) {
        self.teardown();
        self.key = None;
        self.cell.send_if_modified(|cell| {
            let was_mounted = cell.mounted;
            cell.generation = cell.generation.wrapping_add(1);
            cell.mounted = false;
            was_mounted
        });
    }

    /// Returns `true` between `mount` and `unmount`.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.cell.borrow().mounted
    }

    /// Current key, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// The feed this subscription follows.
    #[must_use]
    pub const fn feed(&self) -> &Feed<T> {
        &self.feed
    }

    /// Consumer view of the current value.
    #[must_use]
    pub fn state(&self) -> LiveState<T> {
        self.cell.borrow().view()
    }

    /// Reconciled value: pushed, else pulled, else `None`.
    #[must_use]
    pub fn current(&self) -> Option<T> {
        self.cell.borrow().store.current().cloned()
    }

    /// Snapshot including its origin.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<T> {
        self.cell.borrow().store.snapshot().clone()
    }

    /// Receiver that is notified whenever the state changes.
    #[must_use]
    pub fn watch(&self) -> LiveReceiver<T> {
        LiveReceiver {
            rx: self.cell.subscribe(),
        }
    }

    fn teardown(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
        if let Some(pull) = self.pull.take() {
            pull.abort();
        }
    }

    fn start_pull(&mut self, key: &str, generation: u64) {
        let Some(path) = self.feed.pull_path(key) else {
            return;
        };
        let request = self.backend.get(&path);
        let cell = Arc::clone(&self.cell);
        let feed = self.feed.name();
        let key = key.to_string();

        self.pull = Some(tokio::spawn(async move {
            let outcome = request
                .await
                .and_then(|value| serde_json::from_value::<T>(value).map_err(SyncError::from));

            cell.send_if_modified(|cell| {
                if !cell.accepts(generation) {
                    tracing::debug!(feed, %key, "discarding pull for stale subscription");
                    return false;
                }
                match outcome {
                    Ok(value) => {
                        let cleared = cell.error.take().is_some();
                        let applied = cell.store.set_pulled(value);
                        if !applied {
                            tracing::debug!(feed, %key, "pull superseded by pushed value");
                        }
                        applied || cleared
                    }
                    Err(e) => {
                        tracing::warn!(feed, %key, error = %e, "pull failed");
                        cell.error = Some(e.user_message());
                        true
                    }
                }
            });
        }));
    }

    fn frame_handler(&self, key: String, generation: u64) -> FrameHandler {
        let cell = Arc::clone(&self.cell);
        let feed = self.feed.name();
        let tag = self.feed.tag();
        let filter = self.feed.filter().clone();

        Arc::new(move |frame: PushFrame| {
            if frame.tag != tag {
                return;
            }
            if !filter.accepts(&frame.payload, &key) {
                tracing::trace!(feed, %key, "push frame filtered out");
                return;
            }
            let value = match frame.decode::<T>() {
                Ok(value) => value,
                Err(e) => {
                    tracing::debug!(feed, %key, error = %e, "dropping undecodable push payload");
                    return;
                }
            };
            cell.send_if_modified(|cell| {
                if !cell.accepts(generation) {
                    return false;
                }
                cell.store.set_pushed(value);
                true
            });
        })
    }
}

impl<T: FeedValue> Drop for LiveSubscription<T> {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl<T: FeedValue> fmt::Debug for LiveSubscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSubscription")
            .field("feed", &self.feed.name())
            .field("key", &self.key)
            .field("mounted", &self.is_mounted())
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

/// Change notifications for one subscription.
pub struct LiveReceiver<T> {
    rx: watch::Receiver<Cell<T>>,
}

impl<T: Clone> LiveReceiver<T> {
    /// Current state.
    #[must_use]
    pub fn state(&self) -> LiveState<T> {
        self.rx.borrow().view()
    }

    /// Waits for the next change.
    ///
    /// Returns `false` once the subscription has been dropped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Waits until `predicate` holds, returning the matching state.
    ///
    /// Returns `None` if the subscription is dropped first.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&LiveState<T>) -> bool,
    ) -> Option<LiveState<T>> {
        loop {
            let state = self.state();
            if predicate(&state) {
                return Some(state);
            }
            if !self.changed().await {
                return None;
            }
        }
    }
}

impl<T> fmt::Debug for LiveReceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveReceiver").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use futures_util::future::BoxFuture;
    use serde_json::{Value, json};
    use tokio::sync::oneshot;

    use super::*;
    use crate::domain::{FrameTag, PendingTickets, PositionSnapshot, QueueKind};
    use crate::transport::SharedTransport;

    /// Backend whose responses are released by the test.
    #[derive(Debug, Default)]
    struct ScriptedBackend {
        pending: Mutex<HashMap<String, Vec<oneshot::Sender<Result<Value, SyncError>>>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }

        /// Resolves the oldest outstanding request for `path`.
        fn resolve(&self, path: &str, result: Result<Value, SyncError>) {
            let sender = self.pending.lock().ok().and_then(|mut pending| {
                let queue = pending.get_mut(path)?;
                (!queue.is_empty()).then(|| queue.remove(0))
            });
            let Some(sender) = sender else {
                panic!("no outstanding request for {path}");
            };
            let _ = sender.send(result);
        }
    }

    impl Backend for ScriptedBackend {
        fn get(&self, path: &str) -> BoxFuture<'static, Result<Value, SyncError>> {
            let (tx, rx) = oneshot::channel();
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(path.to_string());
            }
            if let Ok(mut pending) = self.pending.lock() {
                pending.entry(path.to_string()).or_default().push(tx);
            }
            Box::pin(async move {
                rx.await
                    .unwrap_or_else(|_| Err(SyncError::InvalidRequest("dropped".to_string())))
            })
        }

        fn get_public(&self, path: &str) -> BoxFuture<'static, Result<Value, SyncError>> {
            self.get(path)
        }

        fn put(&self, path: &str, _body: Value) -> BoxFuture<'static, Result<Value, SyncError>> {
            self.get(path)
        }
    }

    struct Harness {
        backend: Arc<ScriptedBackend>,
        transport: SharedTransport,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                backend: Arc::new(ScriptedBackend::default()),
                transport: SharedTransport::detached(64),
            }
        }

        fn subscribe<T: FeedValue>(&self, feed: Feed<T>) -> LiveSubscription<T> {
            LiveSubscription::new(
                feed,
                Arc::clone(&self.backend) as Arc<dyn Backend>,
                Arc::new(self.transport.clone()),
            )
        }

        fn push(&self, tag: FrameTag, payload: Value) {
            self.transport.publish(PushFrame { tag, payload });
        }
    }

    fn ticket_ids(pending: &PendingTickets) -> Vec<String> {
        pending.tickets.iter().map(|t| t.id.to_string()).collect()
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn wait_until<T: Clone>(
        rx: &mut LiveReceiver<T>,
        predicate: impl FnMut(&LiveState<T>) -> bool,
    ) -> LiveState<T> {
        let Ok(Some(state)) = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate)).await
        else {
            panic!("state never reached");
        };
        state
    }

    #[tokio::test]
    async fn no_data_until_first_value() {
        let h = Harness::new();
        let mut sub = h.subscribe(Feed::pending_tickets(QueueKind::Regular));
        assert_eq!(sub.state(), LiveState::Idle);

        sub.mount(Some("7"));
        assert!(sub.current().is_none());
        assert!(sub.state().is_loading());
        assert_eq!(sub.snapshot(), Snapshot::Empty);
    }

    #[tokio::test]
    async fn absent_key_skips_pull_and_connection() {
        let h = Harness::new();
        let mut sub = h.subscribe(Feed::in_progress_tickets());
        sub.mount(None::<String>);
        sub.mount(Some("   "));
        settle().await;

        assert_eq!(sub.state(), LiveState::Idle);
        assert!(h.backend.calls().is_empty());
        assert_eq!(h.transport.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn pull_then_push_then_stale_pull_keeps_push() {
        let h = Harness::new();
        let mut sub = h.subscribe(Feed::pending_tickets(QueueKind::Regular));
        let mut rx = sub.watch();
        sub.mount(Some("7"));
        settle().await;
        assert_eq!(h.backend.calls(), vec!["/tickets_/row/7".to_string()]);

        h.backend.resolve(
            "/tickets_/row/7",
            Ok(json!({"tickets": [{"id": "A"}], "countPendingTickets": 1})),
        );
        let state = wait_until(&mut rx, |s| s.data().is_some()).await;
        assert_eq!(state.data().map(ticket_ids), Some(vec!["A".to_string()]));

        h.push(
            FrameTag::OnPendingNormalTickets,
            json!({"tickets": [{"id": "A"}, {"id": "B"}], "countPendingTickets": 2}),
        );
        wait_until(&mut rx, |s| s.data().is_some_and(|p| p.tickets.len() == 2)).await;

        sub.refresh();
        settle().await;
        h.backend.resolve(
            "/tickets_/row/7",
            Ok(json!({"tickets": [{"id": "A"}], "countPendingTickets": 1})),
        );
        settle().await;

        let Some(current) = sub.current() else {
            panic!("expected data");
        };
        assert_eq!(ticket_ids(&current), vec!["A".to_string(), "B".to_string()]);
        assert!(matches!(sub.snapshot(), Snapshot::Pushed(_)));
    }

    #[tokio::test]
    async fn pull_resolving_after_push_is_ignored() {
        let h = Harness::new();
        let mut sub = h.subscribe(Feed::ticket_position());
        let mut rx = sub.watch();
        sub.mount(Some("42"));
        settle().await;

        h.push(FrameTag::OnPositionById, json!({"ticketId": "42", "position": 1}));
        wait_until(&mut rx, |s| s.data().is_some()).await;

        h.backend.resolve(
            "/tickets_/position/42",
            Ok(json!({"ticketId": "42", "position": 9})),
        );
        settle().await;
        assert_eq!(sub.current().map(|p| p.position), Some(1));
    }

    #[tokio::test]
    async fn mismatched_ticket_id_is_filtered_out() {
        let h = Harness::new();
        let mut sub = h.subscribe(Feed::ticket_position());
        let mut rx = sub.watch();
        sub.mount(Some("42"));
        settle().await;
        h.backend.resolve(
            "/tickets_/position/42",
            Ok(json!({"ticketId": "42", "position": 5})),
        );
        wait_until(&mut rx, |s| s.data().is_some()).await;

        h.push(FrameTag::OnPositionById, json!({"ticketId": "99", "position": 3}));
        settle().await;
        let before: Option<PositionSnapshot> = sub.current();
        assert_eq!(before.map(|p| p.position), Some(5));
        assert!(matches!(sub.snapshot(), Snapshot::Pulled(_)));
    }

    #[tokio::test]
    async fn non_matching_tag_never_changes_state() {
        let h = Harness::new();
        let mut sub = h.subscribe(Feed::pending_tickets(QueueKind::Priority));
        sub.mount(Some("7"));
        settle().await;

        h.push(
            FrameTag::OnPendingNormalTickets,
            json!({"tickets": [{"id": "X"}], "countPendingTickets": 1}),
        );
        settle().await;
        assert!(sub.current().is_none());
    }

    #[tokio::test]
    async fn undecodable_payload_is_dropped() {
        let h = Harness::new();
        let mut sub = h.subscribe(Feed::ticket_position());
        sub.mount(Some("42"));
        settle().await;

        h.push(FrameTag::OnPositionById, json!({"ticketId": "42", "position": "soon"}));
        settle().await;
        assert!(sub.current().is_none());
    }

    #[tokio::test]
    async fn pull_failure_surfaces_error_without_touching_push_data() {
        let h = Harness::new();
        let mut sub = h.subscribe(Feed::in_progress_tickets());
        let mut rx = sub.watch();
        sub.mount(Some("7"));
        settle().await;

        h.backend.resolve(
            "/tickets_/inprogress/7",
            Err(SyncError::Api {
                status: 500,
                message: "boom".to_string(),
            }),
        );
        let state = wait_until(&mut rx, |s| s.error().is_some()).await;
        assert_eq!(state.error(), Some("boom"));

        h.push(FrameTag::OnInProgressTickets, json!([{"id": 1, "status": "IN_PROGRESS"}]));
        wait_until(&mut rx, |s| s.data().is_some()).await;

        sub.refresh();
        settle().await;
        h.backend.resolve(
            "/tickets_/inprogress/7",
            Err(SyncError::Api {
                status: 500,
                message: "again".to_string(),
            }),
        );
        settle().await;
        assert_eq!(sub.current().map(|t| t.tickets.len()), Some(1));
        assert!(sub.state().data().is_some());
    }

    #[tokio::test]
    async fn nothing_changes_after_unmount() {
        let h = Harness::new();
        let mut sub = h.subscribe(Feed::pending_tickets(QueueKind::Regular));
        sub.mount(Some("7"));
        settle().await;
        h.push(
            FrameTag::OnPendingNormalTickets,
            json!({"tickets": [{"id": "A"}], "countPendingTickets": 1}),
        );
        settle().await;
        let frozen = sub.snapshot();

        sub.unmount();
        assert_eq!(h.transport.subscriber_count(), 0);
        assert_eq!(sub.state(), LiveState::Idle);

        h.push(
            FrameTag::OnPendingNormalTickets,
            json!({"tickets": [{"id": "B"}], "countPendingTickets": 1}),
        );
        settle().await;
        assert_eq!(
            sub.snapshot().value().map(ticket_ids),
            frozen.value().map(ticket_ids)
        );
    }

    #[tokio::test]
    async fn in_flight_pull_is_discarded_after_unmount() {
        let h = Harness::new();
        let mut sub = h.subscribe(Feed::ticket_details());
        sub.mount(Some("5"));
        settle().await;
        let sender = h
            .backend
            .pending
            .lock()
            .ok()
            .and_then(|mut p| p.get_mut("/tickets_/5").and_then(Vec::pop));
        sub.unmount();

        if let Some(sender) = sender {
            let _ = sender.send(Ok(json!({"id": "5"})));
        }
        settle().await;
        assert_eq!(sub.snapshot(), Snapshot::Empty);
    }

    #[tokio::test]
    async fn key_change_drops_data_from_previous_key() {
        let h = Harness::new();
        let mut sub = h.subscribe(Feed::pending_tickets(QueueKind::Regular));
        let mut rx = sub.watch();
        sub.mount(Some("1"));
        settle().await;

        sub.set_key(Some("2"));
        assert_eq!(sub.key(), Some("2"));
        assert!(sub.state().is_loading());

        h.backend.resolve(
            "/tickets_/row/1",
            Ok(json!({"tickets": [{"id": "old"}], "countPendingTickets": 1})),
        );
        settle().await;
        assert!(sub.current().is_none());

        h.backend.resolve(
            "/tickets_/row/2",
            Ok(json!({"tickets": [{"id": "new"}], "countPendingTickets": 1})),
        );
        let state = wait_until(&mut rx, |s| s.data().is_some()).await;
        assert_eq!(state.data().map(ticket_ids), Some(vec!["new".to_string()]));
        assert_eq!(h.transport.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn same_key_mount_is_a_no_op() {
        let h = Harness::new();
        let mut sub = h.subscribe(Feed::in_progress_tickets());
        sub.mount(Some("3"));
        sub.mount(Some("3"));
        settle().await;
        assert_eq!(h.backend.calls().len(), 1);
        assert_eq!(h.transport.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn push_only_feed_waits_for_first_frame() {
        let h = Harness::new();
        let mut sub = h.subscribe(Feed::last_ticket_number());
        let mut rx = sub.watch();
        sub.mount(Some("7"));
        settle().await;
        assert!(h.backend.calls().is_empty());
        assert!(sub.state().is_loading());

        h.push(
            FrameTag::OnLastTicketNumberChanged,
            json!({"headquarterId": 8, "lastNumber": 3}),
        );
        h.push(
            FrameTag::OnLastTicketNumberChanged,
            json!({"headquarterId": 7, "lastNumber": 12}),
        );
        let state = wait_until(&mut rx, |s| s.data().is_some()).await;
        assert_eq!(state.data().map(|n| n.last_number), Some(12));
    }

    #[tokio::test]
    async fn two_subscriptions_filter_independently() {
        let h = Harness::new();
        let mut first = h.subscribe(Feed::ticket_position());
        let mut second = h.subscribe(Feed::ticket_position());
        let mut rx = second.watch();
        first.mount(Some("1"));
        second.mount(Some("2"));
        settle().await;

        h.push(FrameTag::OnPositionById, json!({"ticketId": "2", "position": 4}));
        wait_until(&mut rx, |s| s.data().is_some()).await;
        assert!(first.current().is_none());
        assert_eq!(second.current().map(|p| p.position), Some(4));
    }

    #[tokio::test]
    async fn dropping_the_subscription_ends_the_receiver() {
        let h = Harness::new();
        let mut sub = h.subscribe(Feed::in_progress_tickets());
        let mut rx = sub.watch();
        sub.mount(Some("1"));
        drop(sub);
        let reached = tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|_| false)).await;
        assert!(matches!(reached, Ok(None)));
    }
}
