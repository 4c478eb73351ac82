//! Dedicated WebSocket connection with reconnect-forever semantics.
//!
//! Runs the read loop for a single upstream connection, validating every
//! text frame into a [`PushFrame`] and handing it to the subscriber. On
//! any close or failure the loop waits for the policy delay and
//! reconnects, until the owning [`ConnectionHandle`] is closed.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use uuid::Uuid;

use super::{ConnectionHandle, FrameHandler, ReconnectPolicy, Transport};
use crate::domain::PushFrame;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on the close handshake when a handle is closed.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Opens one WebSocket per subscriber.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: Arc<str>,
    policy: ReconnectPolicy,
}

impl WsTransport {
    /// Creates a transport for the given `ws://` or `wss://` endpoint.
    #[must_use]
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            url: Arc::from(url.into()),
            policy,
        }
    }

    /// Endpoint this transport connects to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for WsTransport {
    fn open(&self, on_message: FrameHandler) -> ConnectionHandle {
        let id = Uuid::new_v4();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_connection(
            Arc::clone(&self.url),
            self.policy,
            on_message,
            shutdown_rx,
            id,
        ));
        ConnectionHandle::new(id, shutdown_tx, task)
    }
}

/// Why a read loop ended.
enum ReadOutcome {
    /// The handle was closed; do not reconnect.
    Shutdown,
    /// The connection dropped; reconnect after the policy delay.
    Lost(String),
}

/// Connect / read / reconnect loop for one subscriber.
async fn run_connection(
    url: Arc<str>,
    policy: ReconnectPolicy,
    handler: FrameHandler,
    mut shutdown: watch::Receiver<bool>,
    id: Uuid,
) {
    let mut attempt: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let connected = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            result = connect_async(&*url) => result,
        };

        match connected {
            Ok((socket, _)) => {
                tracing::debug!(connection_id = %id, url = %url, "push channel connected");
                attempt = 0;
                match read_frames(socket, &handler, &mut shutdown, id).await {
                    ReadOutcome::Shutdown => break,
                    ReadOutcome::Lost(reason) => {
                        tracing::warn!(connection_id = %id, %reason, "push channel lost");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(connection_id = %id, url = %url, error = %e, "push channel connect failed");
            }
        }

        let delay = policy.delay_for(attempt);
        attempt = attempt.saturating_add(1);
        tracing::info!(
            connection_id = %id,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "reconnecting push channel"
        );

        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    tracing::debug!(connection_id = %id, "push channel loop stopped");
}

/// Reads frames until the socket drops or the handle is closed.
async fn read_frames(
    mut socket: Socket,
    handler: &FrameHandler,
    shutdown: &mut watch::Receiver<bool>,
    id: Uuid,
) -> ReadOutcome {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                if tokio::time::timeout(CLOSE_TIMEOUT, socket.close(None)).await.is_err() {
                    tracing::debug!(connection_id = %id, "close handshake timed out");
                }
                return ReadOutcome::Shutdown;
            }
            msg = socket.next() => match msg {
                Some(Ok(Message::Text(text))) => dispatch(text.as_str(), handler, id),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => dispatch(text, handler, id),
                    Err(_) => tracing::debug!(connection_id = %id, "dropping non-utf8 binary frame"),
                },
                Some(Ok(Message::Close(_))) => return ReadOutcome::Lost("closed by server".to_string()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return ReadOutcome::Lost(e.to_string()),
                None => return ReadOutcome::Lost("stream ended".to_string()),
            }
        }
    }
}

/// Validates one raw frame and forwards it; malformed frames are dropped.
fn dispatch(text: &str, handler: &FrameHandler, id: Uuid) {
    match PushFrame::parse(text) {
        Ok(frame) => handler(frame),
        Err(e) => tracing::debug!(connection_id = %id, error = %e, "dropping push frame"),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::domain::FrameTag;

    #[test]
    fn dispatch_forwards_valid_and_drops_malformed() {
        let seen: Arc<Mutex<Vec<FrameTag>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: FrameHandler = Arc::new(move |frame: PushFrame| {
            if let Ok(mut tags) = sink.lock() {
                tags.push(frame.tag);
            }
        });

        dispatch("garbage", &handler, Uuid::new_v4());
        dispatch(r#"{"payload": {}}"#, &handler, Uuid::new_v4());
        dispatch(
            r#"{"type": "on-in-progress-tickets", "payload": []}"#,
            &handler,
            Uuid::new_v4(),
        );

        let tags = seen.lock().map(|t| t.clone()).unwrap_or_default();
        assert_eq!(tags, vec![FrameTag::OnInProgressTickets]);
    }

    #[tokio::test]
    async fn close_before_connect_stops_the_loop() {
        // Nothing listens on port 9; the loop sits in connect/backoff.
        let transport = WsTransport::new(
            "ws://127.0.0.1:9/ws",
            ReconnectPolicy::fixed(Duration::from_millis(10)),
        );
        let mut handle = transport.open(Arc::new(|_frame: PushFrame| {}));
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.close();
        assert!(handle.is_closed());
    }
}
