//! Domain layer: identifiers, tickets, queue views, and push frames.
//!
//! These are the shapes exchanged with the backend over both the REST pull
//! interface and the WebSocket push channel.

pub mod ids;
pub mod push_frame;
pub mod queue;
pub mod ticket;

pub use ids::{HeadquarterId, ModuleId, TicketId, UserId};
pub use push_frame::{FrameTag, PushFrame};
pub use queue::{InProgressTickets, LastTicketNumber, PendingTickets, PositionSnapshot, QueueKind};
pub use ticket::{Dispensation, Rating, RecordRef, Ticket, TicketStatus};
