//! Live-resource synchronization.
//!
//! Each [`LiveSubscription`] follows one [`Feed`] for one key: an initial
//! REST pull, then the push channel. The two sources are reconciled in a
//! [`SnapshotStore`] where a pushed value always wins.

pub mod feed;
pub mod snapshot;
pub mod state;
pub mod subscription;

pub use feed::{Feed, PayloadFilter};
pub use snapshot::{Snapshot, SnapshotStore};
pub use state::LiveState;
pub use subscription::{FeedValue, LiveReceiver, LiveSubscription};
