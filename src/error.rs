//! Sync-layer error types with stable numeric codes.
//!
//! [`SyncError`] is the central error type of the crate. Each variant maps to
//! a numeric code and a short user-facing message. Subscriptions never let a
//! `SyncError` escape into rendering: they fold it into
//! [`crate::sync::LiveState::Error`].

use std::time::Duration;

use crate::domain::{ModuleId, TicketId, TicketStatus};

/// Sync-layer error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category          |
/// |-----------|-------------------|
/// | 1000–1999 | Validation / input |
/// | 2000–2999 | Pull (REST)        |
/// | 3000–3999 | Push transport     |
/// | 4000–4999 | Business rules     |
/// | 5000–5999 | Local persistence  |
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Configuration value could not be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Caller supplied an unusable argument.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Backend answered with a non-2xx status.
    #[error("{message} ({status})")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message taken from the body's `message` field, or the raw body.
        message: String,
    },

    /// Network or protocol failure while talking to the REST backend.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A pull did not resolve within the configured timeout.
    #[error("pull timed out after {0:?}")]
    Timeout(Duration),

    /// Response or payload did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Push frame could not be parsed or carried an unknown tag.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The adviser's module already has a ticket in progress.
    #[error("module {module_id} already has ticket {ticket_id} in progress")]
    ModuleBusy {
        /// Module of the adviser.
        module_id: ModuleId,
        /// Ticket currently bound to that module.
        ticket_id: TicketId,
    },

    /// Requested lifecycle transition is not allowed.
    #[error("ticket {ticket_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Ticket being transitioned.
        ticket_id: TicketId,
        /// Current status.
        from: TicketStatus,
        /// Requested status.
        to: TicketStatus,
    },

    /// Settings file could not be read or written.
    #[error("settings error: {0}")]
    Settings(String),

    /// Local I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidConfig(_) => 1001,
            Self::InvalidRequest(_) => 1002,
            Self::Api { .. } => 2001,
            Self::Http(_) => 2002,
            Self::Timeout(_) => 2003,
            Self::Decode(_) => 2004,
            Self::MalformedFrame(_) => 3001,
            Self::ModuleBusy { .. } => 4001,
            Self::InvalidTransition { .. } => 4002,
            Self::Settings(_) => 5001,
            Self::Io(_) => 5002,
        }
    }

    /// Returns `true` for rejections raised by client-side business rules.
    ///
    /// These are surfaced as notifications and never reach the backend.
    #[must_use]
    pub const fn is_business_rule(&self) -> bool {
        matches!(self, Self::ModuleBusy { .. } | Self::InvalidTransition { .. })
    }

    /// Message suitable for a user-visible notification.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            Self::ModuleBusy { .. } => {
                "You already have a ticket in progress at this module".to_string()
            }
            Self::Http(_) | Self::Timeout(_) => "Could not reach the server".to_string(),
            other => other.to_string(),
        }
    }
}
