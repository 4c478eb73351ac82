//! Feed definitions: what each live subscription pulls and listens to.
//!
//! A [`Feed`] binds a resource type to a pull path template, a push
//! [`FrameTag`], and a secondary [`PayloadFilter`]. The built-in family
//! covers pending tickets (per queue), tickets in progress, ticket
//! details, ticket position, and the last issued ticket number.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use crate::api::paths;
use crate::domain::ids::id_from_value;
use crate::domain::{
    FrameTag, HeadquarterId, InProgressTickets, LastTicketNumber, PendingTickets,
    PositionSnapshot, QueueKind, Ticket, TicketId,
};

/// Builds a pull path from a subscription key.
pub type PathBuilder = fn(&str) -> String;

/// Predicate over `(payload, key)`.
pub type PayloadPredicate = Arc<dyn Fn(&Value, &str) -> bool + Send + Sync>;

/// Secondary filter applied to a pushed payload after the tag matched.
#[derive(Clone)]
pub enum PayloadFilter {
    /// Accept every payload.
    Any,
    /// The first present field among the candidates must equal the key;
    /// payloads carrying none of them are rejected.
    KeyField(&'static [&'static str]),
    /// Like [`PayloadFilter::KeyField`], but payloads carrying none of the
    /// fields are accepted.
    KeyFieldIfPresent(&'static [&'static str]),
    /// Arbitrary predicate.
    Custom(PayloadPredicate),
}

impl PayloadFilter {
    /// Returns `true` if the payload belongs to the subscription keyed by `key`.
    #[must_use]
    pub fn accepts(&self, payload: &Value, key: &str) -> bool {
        match self {
            Self::Any => true,
            Self::KeyField(fields) => key_field(payload, fields).is_some_and(|id| id == key),
            Self::KeyFieldIfPresent(fields) => {
                key_field(payload, fields).is_none_or(|id| id == key)
            }
            Self::Custom(predicate) => predicate(payload, key),
        }
    }
}

/// Value of the first candidate field present in `payload`, normalised to
/// its string form. Non-scalar values count as "present but different".
fn key_field(payload: &Value, fields: &[&str]) -> Option<String> {
    let object = payload.as_object()?;
    fields
        .iter()
        .find_map(|field| object.get(*field))
        .map(|value| id_from_value(value).unwrap_or_default())
}

impl fmt::Debug for PayloadFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::KeyField(fields) => f.debug_tuple("KeyField").field(fields).finish(),
            Self::KeyFieldIfPresent(fields) => {
                f.debug_tuple("KeyFieldIfPresent").field(fields).finish()
            }
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Description of one live resource.
pub struct Feed<T> {
    name: &'static str,
    tag: FrameTag,
    pull: Option<PathBuilder>,
    filter: PayloadFilter,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Feed<T> {
    /// A push-only feed listening to `tag`, accepting every payload.
    #[must_use]
    pub const fn new(name: &'static str, tag: FrameTag) -> Self {
        Self {
            name,
            tag,
            pull: None,
            filter: PayloadFilter::Any,
            _payload: PhantomData,
        }
    }

    /// Adds an initial pull built from the subscription key.
    #[must_use]
    pub fn with_pull(mut self, path: PathBuilder) -> Self {
        self.pull = Some(path);
        self
    }

    /// Sets the secondary payload filter.
    #[must_use]
    pub fn with_filter(mut self, filter: PayloadFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Feed name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Push tag this feed listens to.
    #[must_use]
    pub const fn tag(&self) -> FrameTag {
        self.tag
    }

    /// Secondary payload filter.
    #[must_use]
    pub const fn filter(&self) -> &PayloadFilter {
        &self.filter
    }

    /// Pull path for `key`, or `None` for push-only feeds.
    #[must_use]
    pub fn pull_path(&self, key: &str) -> Option<String> {
        self.pull.map(|build| build(key))
    }
}

impl Feed<PendingTickets> {
    /// Pending tickets of one queue at a headquarter (key: headquarter id).
    #[must_use]
    pub fn pending_tickets(kind: QueueKind) -> Self {
        let (name, tag, pull): (_, _, PathBuilder) = match kind {
            QueueKind::Priority => (
                "pending-priority-tickets",
                FrameTag::OnPendingPriorityTickets,
                |hq: &str| paths::pending_tickets(QueueKind::Priority, &HeadquarterId::from(hq)),
            ),
            QueueKind::Regular => (
                "pending-normal-tickets",
                FrameTag::OnPendingNormalTickets,
                |hq: &str| paths::pending_tickets(QueueKind::Regular, &HeadquarterId::from(hq)),
            ),
        };
        Self::new(name, tag)
            .with_pull(pull)
            .with_filter(PayloadFilter::KeyFieldIfPresent(&["headquarterId"]))
    }
}

impl Feed<InProgressTickets> {
    /// Tickets in progress at a headquarter (key: headquarter id).
    #[must_use]
    pub fn in_progress_tickets() -> Self {
        Self::new("in-progress-tickets", FrameTag::OnInProgressTickets)
            .with_pull(|hq: &str| paths::in_progress_tickets(&HeadquarterId::from(hq)))
            .with_filter(PayloadFilter::KeyFieldIfPresent(&["headquarterId"]))
    }
}

impl Feed<Ticket> {
    /// One ticket's details (key: ticket id).
    #[must_use]
    pub fn ticket_details() -> Self {
        Self::new("ticket-details", FrameTag::OnTicketById)
            .with_pull(|id: &str| paths::ticket(&TicketId::from(id)))
            .with_filter(PayloadFilter::KeyField(&["id", "ticketId"]))
    }
}

impl Feed<PositionSnapshot> {
    /// One ticket's queue position (key: ticket id).
    #[must_use]
    pub fn ticket_position() -> Self {
        Self::new("ticket-position", FrameTag::OnPositionById)
            .with_pull(|id: &str| paths::ticket_position(&TicketId::from(id)))
            .with_filter(PayloadFilter::KeyField(&["ticketId"]))
    }
}

impl Feed<LastTicketNumber> {
    /// Last issued ticket number at a headquarter (key: headquarter id).
    ///
    /// Push-only: the backend exposes no pull for it.
    #[must_use]
    pub fn last_ticket_number() -> Self {
        Self::new("last-ticket-number", FrameTag::OnLastTicketNumberChanged)
            .with_filter(PayloadFilter::KeyFieldIfPresent(&["headquarterId"]))
    }
}

impl<T> Clone for Feed<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tag: self.tag,
            pull: self.pull,
            filter: self.filter.clone(),
            _payload: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Feed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feed")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("pulls", &self.pull.is_some())
            .field("filter", &self.filter)
            .finish()
    }
}
