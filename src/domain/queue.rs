//! Queue-level views served by the pull and push interfaces.

use serde::{Deserialize, Serialize};

use super::{HeadquarterId, ModuleId, Ticket, TicketId};

/// Which pending queue a feed follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    /// Priority queue (`/tickets_/priority/...`).
    Priority,
    /// Regular queue (`/tickets_/row/...`).
    Regular,
}

impl QueueKind {
    /// Path segment used by the REST interface.
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Priority => "priority",
            Self::Regular => "row",
        }
    }
}

/// Pending tickets of one queue at one headquarter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTickets {
    /// Tickets in queue order.
    #[serde(default)]
    pub tickets: Vec<Ticket>,
    /// Total pending tickets (may exceed `tickets.len()` when paged).
    #[serde(default)]
    pub count_pending_tickets: u32,
    /// Headquarter the list belongs to, when the backend includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headquarter_id: Option<HeadquarterId>,
    /// Any additional fields, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Tickets currently being served at a headquarter.
///
/// Accepts either `{"tickets": [...]}` or a bare JSON array.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "InProgressWire")]
pub struct InProgressTickets {
    /// Tickets with status `IN_PROGRESS`.
    pub tickets: Vec<Ticket>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InProgressWire {
    List(Vec<Ticket>),
    Wrapped {
        #[serde(default)]
        tickets: Vec<Ticket>,
    },
}

impl From<InProgressWire> for InProgressTickets {
    fn from(wire: InProgressWire) -> Self {
        match wire {
            InProgressWire::List(tickets) | InProgressWire::Wrapped { tickets } => {
                Self { tickets }
            }
        }
    }
}

impl InProgressTickets {
    /// Returns the ticket currently served at `module`, if any.
    ///
    /// Every entry of this view is in progress whether or not it repeats
    /// its `status`; only finished tickets are skipped.
    #[must_use]
    pub fn at_module(&self, module: &ModuleId) -> Option<&Ticket> {
        self.tickets
            .iter()
            .find(|t| t.module_id() == Some(module) && !t.status.is_terminal())
    }
}

/// Position of one ticket in its queue.
///
/// Derived by the backend on every relevant state change; never owned by
/// the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSnapshot {
    /// Ticket this position refers to, when the backend echoes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<TicketId>,
    /// Number of tickets ahead.
    #[serde(alias = "ahead")]
    pub position: u32,
    /// Estimated wait in seconds.
    #[serde(default, alias = "estimatedWaitTime", skip_serializing_if = "Option::is_none")]
    pub estimated_wait_secs: Option<u64>,
}

/// Last ticket number issued at a headquarter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastTicketNumber {
    /// Headquarter, when included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headquarter_id: Option<HeadquarterId>,
    /// Last issued sequence number.
    #[serde(alias = "number", alias = "lastTicketNumber")]
    pub last_number: u32,
}
