//! Service layer: business rules on top of the sync layer.
//!
//! [`AdviserDesk`] guards status transitions with the in-progress snapshot
//! before mutating through the [`crate::api::Backend`].

pub mod adviser;

pub use adviser::AdviserDesk;
