//! REST paths of the ticket resources used by the sync layer.

use crate::domain::{HeadquarterId, QueueKind, TicketId};

/// `GET /tickets_/{priority|row}/{headquarterId}`
#[must_use]
pub fn pending_tickets(kind: QueueKind, headquarter: &HeadquarterId) -> String {
    format!("/tickets_/{}/{headquarter}", kind.path_segment())
}

/// `GET /tickets_/inprogress/{headquarterId}`
#[must_use]
pub fn in_progress_tickets(headquarter: &HeadquarterId) -> String {
    format!("/tickets_/inprogress/{headquarter}")
}

/// `GET|PUT /tickets_/{ticketId}`
#[must_use]
pub fn ticket(ticket: &TicketId) -> String {
    format!("/tickets_/{ticket}")
}

/// `GET /tickets_/position/{ticketId}`
#[must_use]
pub fn ticket_position(ticket: &TicketId) -> String {
    format!("/tickets_/position/{ticket}")
}
