//! `eventbroker-events` — in-process event registry and synchronous dispatch.
//!
//! Components register named events with the payload shapes they accept,
//! subscribe callbacks, and publish payloads that are delivered to every
//! current subscriber before `publish` returns.

pub mod bus;
pub mod config;
pub mod error;
pub mod history;
pub mod registry;
pub mod shape;
pub mod subscriber;

pub use bus::EventPublisher;
pub use config::{FailurePolicy, HistoryConfig, RegistryConfig};
pub use error::{EventError, EventResult};
pub use history::HistoryEntry;
pub use registry::{EventHistory, EventRegistry};
pub use shape::{AnyPayload, PayloadShape, Tagged, any_payload};
pub use subscriber::{RegistrationHandle, Subscriber, SubscriptionHandle};

pub use eventbroker_core::{EventName, SubscriberId};
