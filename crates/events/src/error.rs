//! Registry error model.

use thiserror::Error;

use eventbroker_core::{EventName, SubscriberId};

/// Result type returned by registry operations.
pub type EventResult<T> = Result<T, EventError>;

/// Failures surfaced by the registry.
///
/// Every variant is returned straight to the caller; the registry never
/// retries or swallows them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The named event has no registered payload shapes.
    #[error("Event \"{0}\" is not registered.")]
    EventNotFound(String),

    /// The payload matched none of the event's registered shapes.
    #[error("Invalid payload type for event \"{0}\".")]
    InvalidPayloadType(EventName),

    /// The subscriber id is not currently subscribed to the event.
    #[error("Subscriber with ID \"{subscriber}\" not found for event \"{event}\".")]
    SubscriberNotFound {
        event: EventName,
        subscriber: SubscriberId,
    },

    /// Event names must be non-empty.
    #[error("invalid event name: {0:?}")]
    InvalidEventName(String),
}

impl EventError {
    pub fn event_not_found(event: impl Into<String>) -> Self {
        Self::EventNotFound(event.into())
    }

    /// Name of the event the error refers to.
    pub fn event(&self) -> &str {
        match self {
            Self::EventNotFound(event) | Self::InvalidEventName(event) => event.as_str(),
            Self::InvalidPayloadType(event) => event.as_str(),
            Self::SubscriberNotFound { event, .. } => event.as_str(),
        }
    }
}
