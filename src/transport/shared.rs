//! One upstream connection shared by every subscriber.
//!
//! [`SharedTransport`] opens its upstream lazily with the first subscriber
//! and closes it with the last one. Frames from the upstream are published
//! into a [`FrameBus`]; each subscriber runs its own listener task, so
//! per-subscriber filtering and arrival order are unchanged compared to a
//! dedicated connection.
//!
//! One difference remains: a subscriber more than `capacity` frames behind
//! skips the oldest frames (logged at `warn`), which a dedicated socket
//! never does. Every feed payload is a full snapshot, so the next frame of
//! the same tag brings that subscriber up to date.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use uuid::Uuid;

use super::bus::FrameBus;
use super::{ConnectionHandle, FrameHandler, Transport};
use crate::domain::PushFrame;

/// Multiplexing transport.
#[derive(Debug, Clone)]
pub struct SharedTransport {
    inner: Arc<SharedInner>,
}

#[derive(Debug)]
struct SharedInner {
    bus: FrameBus,
    upstream: Option<Arc<dyn Transport>>,
    state: Mutex<UpstreamState>,
}

#[derive(Debug, Default)]
struct UpstreamState {
    subscribers: usize,
    connection: Option<ConnectionHandle>,
}

impl SharedTransport {
    /// Shares connections opened through `upstream`.
    #[must_use]
    pub fn new(upstream: Arc<dyn Transport>, capacity: usize) -> Self {
        Self::build(Some(upstream), capacity)
    }

    /// A transport with no upstream; frames arrive only via
    /// [`SharedTransport::publish`].
    #[must_use]
    pub fn detached(capacity: usize) -> Self {
        Self::build(None, capacity)
    }

    fn build(upstream: Option<Arc<dyn Transport>>, capacity: usize) -> Self {
        Self {
            inner: Arc::new(SharedInner {
                bus: FrameBus::new(capacity),
                upstream,
                state: Mutex::new(UpstreamState::default()),
            }),
        }
    }

    /// Injects a frame as if it came from the upstream.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, frame: PushFrame) -> usize {
        self.inner.bus.publish(frame)
    }

    /// The underlying frame bus.
    #[must_use]
    pub fn bus(&self) -> &FrameBus {
        &self.inner.bus
    }

    /// Number of open subscriber handles.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers
    }

    /// Returns `true` while the upstream connection is open.
    #[must_use]
    pub fn is_upstream_open(&self) -> bool {
        self.inner.lock().connection.is_some()
    }
}

impl SharedInner {
    fn lock(&self) -> std::sync::MutexGuard<'_, UpstreamState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(&self) {
        let mut state = self.lock();
        state.subscribers = state.subscribers.saturating_add(1);
        if state.connection.is_none()
            && let Some(upstream) = &self.upstream
        {
            let bus = self.bus.clone();
            let connection = upstream.open(Arc::new(move |frame: PushFrame| {
                bus.publish(frame);
            }));
            tracing::debug!(connection_id = %connection.id(), "shared upstream opened");
            state.connection = Some(connection);
        }
    }

    fn release(&self) {
        let closing = {
            let mut state = self.lock();
            state.subscribers = state.subscribers.saturating_sub(1);
            if state.subscribers == 0 {
                state.connection.take()
            } else {
                None
            }
        };
        if let Some(mut connection) = closing {
            connection.close();
            tracing::debug!(connection_id = %connection.id(), "shared upstream closed");
        }
    }
}

impl Transport for SharedTransport {
    fn open(&self, on_message: FrameHandler) -> ConnectionHandle {
        // Subscribe before the upstream opens so no early frame is missed.
        let id = Uuid::new_v4();
        let mut frames = self.inner.bus.subscribe(id);
        self.inner.acquire();

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    received = frames.recv() => match received {
                        Some(frame) => on_message(frame),
                        None => break,
                    }
                }
            }
        });

        let inner = Arc::clone(&self.inner);
        ConnectionHandle::new(id, shutdown_tx, task).on_close(move || inner.release())
    }
}
