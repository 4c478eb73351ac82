//! Push frames delivered over the WebSocket channel.
//!
//! Every frame on the wire is `{"type": "<tag>", "payload": <json>}`. Frames
//! are validated into a [`PushFrame`] at the transport boundary; anything
//! that fails validation is dropped there and never reaches a subscription.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Discriminator of a push frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameTag {
    /// Pending tickets of the priority queue changed.
    OnPendingPriorityTickets,
    /// Pending tickets of the regular queue changed.
    OnPendingNormalTickets,
    /// Tickets in progress changed.
    OnInProgressTickets,
    /// A single ticket changed (detail view).
    OnTicketById,
    /// Position of a ticket changed.
    OnPositionById,
    /// Last issued ticket number changed.
    OnLastTicketNumberChanged,
    /// Any ticket changed.
    OnTicketChanged,
    /// The ticket an adviser works on changed.
    OnWorkingOnTicketChanged,
}

impl FrameTag {
    /// Every known tag.
    pub const ALL: [Self; 8] = [
        Self::OnPendingPriorityTickets,
        Self::OnPendingNormalTickets,
        Self::OnInProgressTickets,
        Self::OnTicketById,
        Self::OnPositionById,
        Self::OnLastTicketNumberChanged,
        Self::OnTicketChanged,
        Self::OnWorkingOnTicketChanged,
    ];

    /// Returns the wire string for this tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnPendingPriorityTickets => "on-pending-priority-tickets",
            Self::OnPendingNormalTickets => "on-pending-normal-tickets",
            Self::OnInProgressTickets => "on-in-progress-tickets",
            Self::OnTicketById => "on-ticket-by-id",
            Self::OnPositionById => "on-position-by-id",
            Self::OnLastTicketNumberChanged => "on-last-ticket-number-changed",
            Self::OnTicketChanged => "on-ticket-changed",
            Self::OnWorkingOnTicketChanged => "on-working-on-ticket-changed",
        }
    }
}

impl fmt::Display for FrameTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameTag {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| SyncError::MalformedFrame(format!("unknown frame type `{s}`")))
    }
}

/// A validated push frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushFrame {
    /// Frame discriminator.
    #[serde(rename = "type")]
    pub tag: FrameTag,
    /// Resource-shaped payload; decoded by the subscription that accepts it.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl PushFrame {
    /// Builds a frame from a tag and any serializable payload.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Decode`] if the payload cannot be serialized.
    pub fn new<P: Serialize>(tag: FrameTag, payload: &P) -> Result<Self, SyncError> {
        Ok(Self {
            tag,
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Parses and validates a raw text frame.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MalformedFrame`] when the text is not a JSON
    /// object, the `type` field is missing or not a string, or the tag is
    /// unknown.
    pub fn parse(text: &str) -> Result<Self, SyncError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| SyncError::MalformedFrame(format!("invalid json: {e}")))?;
        let serde_json::Value::Object(mut object) = value else {
            return Err(SyncError::MalformedFrame("frame is not an object".to_string()));
        };
        let tag = match object.get("type") {
            Some(serde_json::Value::String(tag)) => tag.parse::<FrameTag>()?,
            Some(_) => {
                return Err(SyncError::MalformedFrame("`type` is not a string".to_string()));
            }
            None => return Err(SyncError::MalformedFrame("missing `type`".to_string())),
        };
        let payload = object.remove("payload").unwrap_or(serde_json::Value::Null);
        Ok(Self { tag, payload })
    }

    /// Decodes the payload into a resource type.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Decode`] if the payload does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, SyncError> {
        Ok(T::deserialize(&self.payload)?)
    }

    /// Serializes the frame back to its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Decode`] on serialization failure.
    pub fn to_text(&self) -> Result<String, SyncError> {
        Ok(serde_json::to_string(self)?)
    }
}
