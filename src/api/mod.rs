//! REST pull interface: backend trait, `reqwest` client, and paths.

pub mod client;
pub mod paths;

pub use client::{Backend, RestClient};
