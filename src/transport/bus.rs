//! In-process fan-out of upstream frames for [`super::SharedTransport`].

use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::domain::PushFrame;

/// Ring buffer of upstream frames shared by every subscriber.
///
/// A subscriber that falls more than `capacity` frames behind skips the
/// oldest ones. Feed payloads are full snapshots, so the next frame of the
/// same tag repairs the gap.
#[derive(Debug, Clone)]
pub struct FrameBus {
    sender: broadcast::Sender<PushFrame>,
}

impl FrameBus {
    /// Bus holding up to `capacity` undelivered frames (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Hands `frame` to every current subscriber; returns how many got it.
    pub fn publish(&self, frame: PushFrame) -> usize {
        self.sender.send(frame).unwrap_or(0)
    }

    /// Receiver for frames published from now on.
    #[must_use]
    pub fn subscribe(&self, connection_id: Uuid) -> FrameReceiver {
        FrameReceiver {
            connection_id,
            inner: self.sender.subscribe(),
            skipped: 0,
        }
    }

    /// Number of live receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// One subscriber's view of the bus.
#[derive(Debug)]
pub struct FrameReceiver {
    connection_id: Uuid,
    inner: broadcast::Receiver<PushFrame>,
    skipped: u64,
}

impl FrameReceiver {
    /// Next frame in publish order, or `None` once the bus is gone.
    ///
    /// Overflow is logged and counted, then reading resumes at the oldest
    /// frame still buffered.
    pub async fn recv(&mut self) -> Option<PushFrame> {
        loop {
            match self.inner.recv().await {
                Ok(frame) => return Some(frame),
                Err(RecvError::Lagged(n)) => {
                    self.skipped = self.skipped.saturating_add(n);
                    tracing::warn!(
                        connection_id = %self.connection_id,
                        skipped = n,
                        total_skipped = self.skipped,
                        "subscriber fell behind the frame bus"
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Frames lost to overflow so far.
    #[must_use]
    pub const fn skipped(&self) -> u64 {
        self.skipped
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::FrameTag;

    fn numbered(n: u32) -> PushFrame {
        PushFrame {
            tag: FrameTag::OnPositionById,
            payload: serde_json::json!({ "position": n }),
        }
    }

    #[test]
    fn frames_without_subscribers_are_dropped() {
        let bus = FrameBus::new(4);
        assert_eq!(bus.publish(numbered(1)), 0);
        assert_eq!(bus.receiver_count(), 0);
    }

    #[tokio::test]
    async fn overflow_skips_oldest_and_keeps_going() {
        let bus = FrameBus::new(2);
        let mut rx = bus.subscribe(Uuid::new_v4());
        for n in 1..=5 {
            bus.publish(numbered(n));
        }

        let Some(first) = rx.recv().await else {
            panic!("expected a buffered frame");
        };
        assert_eq!(first.payload["position"], 4);
        assert_eq!(rx.skipped(), 3);

        let Some(last) = rx.recv().await else {
            panic!("expected the newest frame");
        };
        assert_eq!(last.payload["position"], 5);
    }

    #[tokio::test]
    async fn receiver_ends_when_bus_is_dropped() {
        let bus = FrameBus::new(4);
        let mut rx = bus.subscribe(Uuid::new_v4());
        drop(bus);
        assert!(rx.recv().await.is_none());
    }
}
