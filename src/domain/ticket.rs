//! Ticket record and lifecycle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{HeadquarterId, ModuleId, TicketId, UserId};

/// Lifecycle status of a ticket.
///
/// `PENDING_*` tickets wait in a queue, one adviser moves a ticket to
/// `IN_PROGRESS`, and `COMPLETED` / `CANCELLED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    /// Waiting in the regular queue.
    #[default]
    PendingRegular,
    /// Waiting in the priority queue.
    PendingPriority,
    /// Being served at a module.
    InProgress,
    /// Served.
    Completed,
    /// Abandoned or cancelled by staff.
    Cancelled,
}

impl TicketStatus {
    /// Returns the wire string for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingRegular => "PENDING_REGULAR",
            Self::PendingPriority => "PENDING_PRIORITY",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Returns `true` while the ticket still waits in a queue.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::PendingRegular | Self::PendingPriority)
    }

    /// Returns `true` for `COMPLETED` and `CANCELLED`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether a ticket in this status may move to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::PendingRegular | Self::PendingPriority, Self::InProgress | Self::Cancelled) => {
                true
            }
            (Self::InProgress, Self::Completed | Self::Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a related record, as embedded by the backend.
///
/// Only the id is relied upon; the display name is kept when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef<I> {
    /// Referenced record id.
    pub id: I,
    /// Display name, if the backend embedded one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One medicine handed out while serving a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dispensation {
    /// Medicine name or code.
    #[serde(alias = "medicine")]
    pub medicine_name: String,
    /// Units dispensed.
    #[serde(default)]
    pub quantity: u32,
}

/// Service rating left by the user after completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    /// Score, typically 1–5.
    pub score: u8,
    /// Free-text comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A queue ticket.
///
/// Invariant (enforced by the backend): at most one ticket is `IN_PROGRESS`
/// per module at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// Ticket id.
    pub id: TicketId,
    /// Sequence number shown to the user.
    #[serde(default, alias = "ticketNumber")]
    pub number: u32,
    /// Whether the ticket was requested in the priority queue.
    #[serde(default, alias = "isPriority")]
    pub priority: bool,
    /// Lifecycle status.
    #[serde(default)]
    pub status: TicketStatus,
    /// Owning user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<RecordRef<UserId>>,
    /// Module serving the ticket; `None` until claimed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<RecordRef<ModuleId>>,
    /// Headquarter the ticket belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headquarter: Option<RecordRef<HeadquarterId>>,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Completion time, for terminal tickets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Medicines dispensed while serving.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medicines: Option<Vec<Dispensation>>,
    /// Rating left after completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
}

impl Ticket {
    /// Module id this ticket is bound to, if claimed.
    #[must_use]
    pub fn module_id(&self) -> Option<&ModuleId> {
        self.module.as_ref().map(|m| &m.id)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn status_uses_screaming_snake_case() {
        let json = serde_json::to_string(&TicketStatus::PendingPriority).unwrap_or_default();
        assert_eq!(json, "\"PENDING_PRIORITY\"");
        assert_eq!(TicketStatus::InProgress.to_string(), "IN_PROGRESS");
    }

    #[test]
    fn lifecycle_transitions() {
        use TicketStatus::*;
        assert!(PendingRegular.can_transition_to(InProgress));
        assert!(PendingPriority.can_transition_to(Cancelled));
        assert!(InProgress.can_transition_to(Completed));
        assert!(!PendingRegular.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Cancelled.can_transition_to(Cancelled));
        assert!(Completed.is_terminal());
        assert!(PendingPriority.is_pending());
    }

    #[test]
    fn minimal_ticket_parses_with_defaults() {
        let Ok(ticket) = serde_json::from_str::<Ticket>(r#"{"id": 5}"#) else {
            panic!("minimal ticket should parse");
        };
        assert_eq!(ticket.id, TicketId::from("5"));
        assert_eq!(ticket.status, TicketStatus::PendingRegular);
        assert!(ticket.module.is_none());
    }

    #[test]
    fn full_ticket_parses() {
        let raw = r#"{
            "id": "t-1",
            "number": 17,
            "priority": true,
            "status": "IN_PROGRESS",
            "user": {"id": 3, "name": "Ana"},
            "module": {"id": 2, "name": "Módulo 2"},
            "headquarter": {"id": 7},
            "createdAt": "2024-05-01T10:00:00Z",
            "medicines": [{"medicineName": "Ibuprofeno", "quantity": 2}],
            "rating": {"score": 5}
        }"#;
        let Ok(ticket) = serde_json::from_str::<Ticket>(raw) else {
            panic!("full ticket should parse");
        };
        assert_eq!(ticket.number, 17);
        assert!(ticket.priority);
        assert_eq!(ticket.status, TicketStatus::InProgress);
        assert_eq!(ticket.module_id(), Some(&ModuleId::from("2")));
        assert_eq!(ticket.medicines.map(|m| m.len()), Some(1));
    }
}
