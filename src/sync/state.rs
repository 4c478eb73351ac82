//! Consumer-facing view of a subscription.

/// What a consumer renders.
///
/// Data always wins over an error: a failed pull never hides a value that
/// already arrived over the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveState<T> {
    /// No key selected (e.g. no headquarter chosen yet), or unmounted.
    Idle,
    /// Key selected, nothing received yet.
    Loading,
    /// The pull failed and no value is available.
    Error(String),
    /// Current reconciled value.
    Data(T),
}

impl<T> LiveState<T> {
    /// The data, if any.
    #[must_use]
    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Data(value) => Some(value),
            _ => None,
        }
    }

    /// The error message, if the state is an error.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }

    /// Returns `true` while waiting for the first value.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Maps the contained data.
    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> LiveState<U> {
        match self {
            Self::Idle => LiveState::Idle,
            Self::Loading => LiveState::Loading,
            Self::Error(message) => LiveState::Error(message),
            Self::Data(value) => LiveState::Data(f(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let data: LiveState<u8> = LiveState::Data(3);
        assert_eq!(data.data(), Some(&3));
        assert!(data.error().is_none());

        let err: LiveState<u8> = LiveState::Error("boom".to_string());
        assert_eq!(err.error(), Some("boom"));
        assert!(LiveState::<u8>::Loading.is_loading());
    }

    #[test]
    fn map_preserves_variant() {
        assert_eq!(LiveState::Data(2).map(|n| n * 2), LiveState::Data(4));
        assert_eq!(LiveState::<u8>::Idle.map(|n| n * 2), LiveState::Idle);
    }
}
