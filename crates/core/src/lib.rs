//! `eventbroker-core` — broker foundation building blocks.
//!
//! This crate contains the identifiers and error model shared by the
//! registry and its collaborators (no dispatch logic).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{EventName, SubscriberId};
