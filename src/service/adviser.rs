//! Adviser desk: status transitions guarded by the in-progress snapshot.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};

use crate::api::{Backend, paths};
use crate::domain::{InProgressTickets, ModuleId, RecordRef, Ticket, TicketStatus};
use crate::error::SyncError;

/// Status-transition consumer for one adviser seated at one module.
///
/// The busy-module check is a client-side guard: it reads whatever
/// in-progress snapshot the caller currently holds and is not atomic
/// against the backend. Two desks racing for the same module can both
/// pass it; the backend stays authoritative.
#[derive(Debug, Clone)]
pub struct AdviserDesk {
    backend: Arc<dyn Backend>,
    module_id: ModuleId,
}

impl AdviserDesk {
    /// Creates a desk for the adviser assigned to `module_id`.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, module_id: ModuleId) -> Self {
        Self { backend, module_id }
    }

    /// Module this desk serves from.
    #[must_use]
    pub const fn module_id(&self) -> &ModuleId {
        &self.module_id
    }

    /// Checks whether this module may take a new ticket.
    ///
    /// An unavailable snapshot (`None`) passes; the backend decides.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ModuleBusy`] if a ticket is already in progress
    /// at this module.
    pub fn check_can_start(&self, in_progress: Option<&InProgressTickets>) -> Result<(), SyncError> {
        let Some(busy) = in_progress.and_then(|s| s.at_module(&self.module_id)) else {
            return Ok(());
        };
        tracing::warn!(
            module_id = %self.module_id,
            ticket_id = %busy.id,
            "module already has a ticket in progress"
        );
        Err(SyncError::ModuleBusy {
            module_id: self.module_id.clone(),
            ticket_id: busy.id.clone(),
        })
    }

    /// Calls `ticket` to this module.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ModuleBusy`] without issuing any request when
    /// the snapshot shows this module busy, [`SyncError::InvalidTransition`]
    /// when the ticket is not pending, or the backend error.
    pub async fn start_ticket(
        &self,
        ticket: &Ticket,
        in_progress: Option<&InProgressTickets>,
    ) -> Result<Ticket, SyncError> {
        ensure_transition(ticket, TicketStatus::InProgress)?;
        self.check_can_start(in_progress)?;
        self.transition(ticket, TicketStatus::InProgress).await
    }

    /// Marks `ticket` as completed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidTransition`] unless the ticket is in
    /// progress, or the backend error.
    pub async fn complete_ticket(&self, ticket: &Ticket) -> Result<Ticket, SyncError> {
        self.transition(ticket, TicketStatus::Completed).await
    }

    /// Cancels `ticket`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidTransition`] if the ticket is already
    /// finished, or the backend error.
    pub async fn cancel_ticket(&self, ticket: &Ticket) -> Result<Ticket, SyncError> {
        self.transition(ticket, TicketStatus::Cancelled).await
    }

    /// Issues the status mutation for `ticket`.
    ///
    /// The backend may answer with the updated ticket or with an empty
    /// body; in the latter case the returned ticket is updated locally.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidTransition`] for a transition the
    /// lifecycle forbids, or the backend error.
    pub async fn transition(&self, ticket: &Ticket, to: TicketStatus) -> Result<Ticket, SyncError> {
        ensure_transition(ticket, to)?;

        let body = json!({
            "status": to,
            "moduleId": self.module_id,
        });
        let response = self.backend.put(&paths::ticket(&ticket.id), body).await?;

        let updated = match response {
            Value::Object(_) => serde_json::from_value(response)?,
            _ => self.apply_locally(ticket, to),
        };
        tracing::info!(
            ticket_id = %ticket.id,
            module_id = %self.module_id,
            from = %ticket.status,
            to = %to,
            "ticket transitioned"
        );
        Ok(updated)
    }

    fn apply_locally(&self, ticket: &Ticket, to: TicketStatus) -> Ticket {
        let mut updated = ticket.clone();
        updated.status = to;
        if to == TicketStatus::InProgress {
            updated.module = Some(RecordRef {
                id: self.module_id.clone(),
                name: None,
            });
        }
        if to.is_terminal() {
            updated.completed_at = Some(Utc::now());
        }
        updated
    }
}

fn ensure_transition(ticket: &Ticket, to: TicketStatus) -> Result<(), SyncError> {
    if ticket.status.can_transition_to(to) {
        Ok(())
    } else {
        Err(SyncError::InvalidTransition {
            ticket_id: ticket.id.clone(),
            from: ticket.status,
            to,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Mutex;

    use futures_util::future::BoxFuture;

    use super::*;
    use crate::domain::TicketId;

    #[derive(Debug, Default)]
    struct RecordingBackend {
        puts: Mutex<Vec<(String, Value)>>,
        reply: Value,
    }

    impl RecordingBackend {
        fn replying(reply: Value) -> Arc<Self> {
            Arc::new(Self {
                puts: Mutex::default(),
                reply,
            })
        }

        fn puts(&self) -> Vec<(String, Value)> {
            self.puts.lock().map(|p| p.clone()).unwrap_or_default()
        }
    }

    impl Backend for RecordingBackend {
        fn get(&self, _path: &str) -> BoxFuture<'static, Result<Value, SyncError>> {
            Box::pin(async { Ok(Value::Null) })
        }

        fn get_public(&self, path: &str) -> BoxFuture<'static, Result<Value, SyncError>> {
            self.get(path)
        }

        fn put(&self, path: &str, body: Value) -> BoxFuture<'static, Result<Value, SyncError>> {
            if let Ok(mut puts) = self.puts.lock() {
                puts.push((path.to_string(), body));
            }
            let reply = self.reply.clone();
            Box::pin(async move { Ok(reply) })
        }
    }

    fn ticket(id: &str, status: TicketStatus, module: Option<&str>) -> Ticket {
        let Ok(mut ticket) = serde_json::from_value::<Ticket>(json!({ "id": id })) else {
            panic!("ticket fixture should deserialize");
        };
        ticket.status = status;
        ticket.module = module.map(|m| RecordRef {
            id: ModuleId::from(m),
            name: None,
        });
        ticket
    }

    fn desk(backend: &Arc<RecordingBackend>) -> AdviserDesk {
        AdviserDesk::new(Arc::clone(backend) as Arc<dyn Backend>, ModuleId::from("3"))
    }

    #[tokio::test]
    async fn busy_module_rejects_without_mutation() {
        let backend = RecordingBackend::replying(Value::Null);
        let in_progress = InProgressTickets {
            tickets: vec![ticket("12", TicketStatus::InProgress, Some("3"))],
        };
        let next = ticket("13", TicketStatus::PendingRegular, None);

        let result = desk(&backend).start_ticket(&next, Some(&in_progress)).await;
        let Err(SyncError::ModuleBusy { module_id, ticket_id }) = result else {
            panic!("expected ModuleBusy, got {result:?}");
        };
        assert_eq!(module_id, ModuleId::from("3"));
        assert_eq!(ticket_id, TicketId::from("12"));
        assert!(backend.puts().is_empty());
    }

    #[test]
    fn busy_module_detected_when_snapshot_omits_status() {
        let backend = RecordingBackend::replying(Value::Null);
        let Ok(in_progress) =
            serde_json::from_value::<InProgressTickets>(json!([{"id": 12, "module": {"id": 3}}]))
        else {
            panic!("in-progress fixture should deserialize");
        };
        let next = ticket("13", TicketStatus::PendingRegular, None);

        let result = tokio_test::block_on(desk(&backend).start_ticket(&next, Some(&in_progress)));
        let Err(SyncError::ModuleBusy { ticket_id, .. }) = result else {
            panic!("expected ModuleBusy, got {result:?}");
        };
        assert_eq!(ticket_id, TicketId::from("12"));
        assert!(backend.puts().is_empty());
    }

    #[tokio::test]
    async fn other_modules_do_not_block() {
        let backend = RecordingBackend::replying(Value::Null);
        let in_progress = InProgressTickets {
            tickets: vec![ticket("12", TicketStatus::InProgress, Some("4"))],
        };
        let next = ticket("13", TicketStatus::PendingPriority, None);

        let Ok(updated) = desk(&backend).start_ticket(&next, Some(&in_progress)).await else {
            panic!("start should succeed");
        };
        assert_eq!(updated.status, TicketStatus::InProgress);
        assert_eq!(updated.module_id(), Some(&ModuleId::from("3")));

        let puts = backend.puts();
        assert_eq!(puts.len(), 1);
        let Some((path, body)) = puts.first() else {
            panic!("expected one PUT");
        };
        assert_eq!(path, "/tickets_/13");
        assert_eq!(body, &json!({"status": "IN_PROGRESS", "moduleId": "3"}));
    }

    #[tokio::test]
    async fn missing_snapshot_lets_the_backend_decide() {
        let backend = RecordingBackend::replying(json!({"id": "13", "status": "IN_PROGRESS"}));
        let next = ticket("13", TicketStatus::PendingRegular, None);

        let Ok(updated) = desk(&backend).start_ticket(&next, None).await else {
            panic!("start should succeed");
        };
        assert_eq!(updated.status, TicketStatus::InProgress);
        assert_eq!(backend.puts().len(), 1);
    }

    #[tokio::test]
    async fn lifecycle_is_enforced_before_any_request() {
        let backend = RecordingBackend::replying(Value::Null);
        let done = ticket("9", TicketStatus::Completed, Some("3"));

        let result = desk(&backend).cancel_ticket(&done).await;
        assert!(matches!(result, Err(SyncError::InvalidTransition { .. })));

        let pending = ticket("10", TicketStatus::PendingRegular, None);
        let result = desk(&backend).complete_ticket(&pending).await;
        assert!(matches!(result, Err(SyncError::InvalidTransition { .. })));
        assert!(backend.puts().is_empty());
    }

    #[tokio::test]
    async fn completing_sets_completion_time_locally() {
        let backend = RecordingBackend::replying(Value::Null);
        let serving = ticket("11", TicketStatus::InProgress, Some("3"));

        let Ok(updated) = desk(&backend).complete_ticket(&serving).await else {
            panic!("complete should succeed");
        };
        assert_eq!(updated.status, TicketStatus::Completed);
        assert!(updated.completed_at.is_some());
    }

    #[test]
    fn check_can_start_ignores_finished_tickets_at_module() {
        let backend = RecordingBackend::replying(Value::Null);
        let snapshot = InProgressTickets {
            tickets: vec![ticket("1", TicketStatus::Completed, Some("3"))],
        };
        assert!(desk(&backend).check_can_start(Some(&snapshot)).is_ok());
    }
}
