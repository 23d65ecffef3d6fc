//! Publish-only view of the registry.
//!
//! Components that only emit events can depend on [`EventPublisher`] instead
//! of the full [`EventRegistry`](crate::EventRegistry), which keeps
//! registration and subscription in the hands of whoever owns the registry.

use std::sync::Arc;

use crate::error::EventResult;

/// Synchronous publishing seam.
///
/// `publish` returns once every subscriber of `event` has been invoked, or
/// with the first registry error (unknown event, rejected payload).
pub trait EventPublisher<P>: Send + Sync {
    fn publish(&self, event: &str, payload: P) -> EventResult<()>;
}

impl<P, B> EventPublisher<P> for Arc<B>
where
    B: EventPublisher<P> + ?Sized,
{
    fn publish(&self, event: &str, payload: P) -> EventResult<()> {
        (**self).publish(event, payload)
    }
}
