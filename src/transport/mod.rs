//! Push-channel transport: connections, reconnection, and fan-out.
//!
//! A [`Transport`] opens a connection that delivers validated
//! [`PushFrame`]s to a handler until its [`ConnectionHandle`] is closed.
//! Two implementations exist:
//!
//! - [`WsTransport`] opens one WebSocket per call to [`Transport::open`].
//! - [`SharedTransport`] multiplexes a single upstream connection across
//!   all callers through a [`FrameBus`].

pub mod backoff;
pub mod bus;
pub mod connection;
pub mod shared;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::PushFrame;

pub use backoff::{ReconnectPolicy, ReconnectStrategy};
pub use bus::{FrameBus, FrameReceiver};
pub use connection::WsTransport;
pub use shared::SharedTransport;

/// Callback invoked for every validated inbound frame, in arrival order.
pub type FrameHandler = Arc<dyn Fn(PushFrame) + Send + Sync>;

/// Something that can open push-channel connections.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Opens a connection and starts delivering frames to `on_message`.
    ///
    /// Never fails: connect errors are logged and retried in the
    /// background for as long as the returned handle stays open.
    /// Must be called from within a Tokio runtime.
    fn open(&self, on_message: FrameHandler) -> ConnectionHandle;
}

type ReleaseHook = Box<dyn FnOnce() + Send + Sync>;

/// How long a closed connection task may take to shut down on its own.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Owner of one open connection.
///
/// Closing is idempotent and also happens on drop.
pub struct ConnectionHandle {
    id: Uuid,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    on_close: Option<ReleaseHook>,
}

impl ConnectionHandle {
    /// Wraps a running connection task.
    ///
    /// The task is expected to stop once `shutdown` flips to `true`. A task
    /// still running [`CLOSE_GRACE`] after close is aborted.
    #[must_use]
    pub fn new(id: Uuid, shutdown: watch::Sender<bool>, task: JoinHandle<()>) -> Self {
        Self {
            id,
            shutdown,
            task: Some(task),
            on_close: None,
        }
    }

    /// Runs `hook` exactly once when the handle is closed.
    #[must_use]
    pub fn on_close(mut self, hook: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }

    /// Connection identifier used in logs.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns `true` once [`ConnectionHandle::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Stops the connection. Safe to call repeatedly and before the first
    /// connect attempt has finished.
    pub fn close(&mut self) {
        self.shutdown.send_replace(true);
        if let Some(task) = self.task.take() {
            let id = self.id;
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let abort = task.abort_handle();
                    runtime.spawn(async move {
                        if tokio::time::timeout(CLOSE_GRACE, task).await.is_err() {
                            abort.abort();
                            tracing::debug!(connection_id = %id, "connection task aborted after close");
                        }
                    });
                }
                Err(_) => task.abort(),
            }
            tracing::debug!(connection_id = %id, "push connection closed");
        }
        if let Some(hook) = self.on_close.take() {
            hook();
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
