//! Per-subscription snapshot with push-wins-over-pull precedence.

/// Where the current value came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Snapshot<T> {
    /// Nothing received yet.
    #[default]
    Empty,
    /// Value from the one-shot pull.
    Pulled(T),
    /// Value from the push channel; authoritative from now on.
    Pushed(T),
}

impl<T> Snapshot<T> {
    /// The value, regardless of origin.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Empty => None,
            Self::Pulled(value) | Self::Pushed(value) => Some(value),
        }
    }

    /// Returns `true` once any pushed value has been recorded.
    #[must_use]
    pub const fn is_pushed(&self) -> bool {
        matches!(self, Self::Pushed(_))
    }
}

/// Holds the reconciled value of one subscription.
///
/// Rules:
/// - [`SnapshotStore::set_pulled`] only applies while no push was recorded.
/// - [`SnapshotStore::set_pushed`] always overwrites.
/// - Pushed values never expire; a later pull cannot take precedence back.
///
/// There is no timestamp or sequence comparison: within the push stream the
/// last arrival wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStore<T> {
    snapshot: Snapshot<T>,
}

impl<T> Default for SnapshotStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SnapshotStore<T> {
    /// Creates an empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            snapshot: Snapshot::Empty,
        }
    }

    /// Records a pulled value. Returns `true` if it was applied.
    pub fn set_pulled(&mut self, value: T) -> bool {
        if self.snapshot.is_pushed() {
            return false;
        }
        self.snapshot = Snapshot::Pulled(value);
        true
    }

    /// Records a pushed value; always applied.
    pub fn set_pushed(&mut self, value: T) {
        self.snapshot = Snapshot::Pushed(value);
    }

    /// Pushed value if any, else pulled value, else `None`.
    #[must_use]
    pub const fn current(&self) -> Option<&T> {
        self.snapshot.value()
    }

    /// Full snapshot including its origin.
    #[must_use]
    pub const fn snapshot(&self) -> &Snapshot<T> {
        &self.snapshot
    }

    /// Forgets everything (used when the subscription key changes).
    pub fn reset(&mut self) {
        self.snapshot = Snapshot::Empty;
    }
}
