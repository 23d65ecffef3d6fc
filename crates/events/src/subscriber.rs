//! Subscriber callbacks and the handles returned by registration calls.

use std::sync::Arc;

use eventbroker_core::{EventName, SubscriberId};

/// A subscriber callback.
///
/// Invoked synchronously, once per successful `publish`, with a borrowed
/// payload. Callbacks run outside the registry lock and may call back into
/// the registry.
pub type Subscriber<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Returned by `register_event`; pass it to `unregister` to withdraw the shape.
///
/// Holds only the event name and the shape name, so it can be stored or
/// sent anywhere without borrowing the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationHandle {
    event: EventName,
    shape: String,
}

impl RegistrationHandle {
    pub(crate) fn new(event: EventName, shape: impl Into<String>) -> Self {
        Self {
            event,
            shape: shape.into(),
        }
    }

    pub fn event(&self) -> &EventName {
        &self.event
    }

    pub fn shape(&self) -> &str {
        &self.shape
    }
}

/// Returned by `subscribe_handle`; pass it to `cancel` to drop the subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    event: EventName,
    id: SubscriberId,
}

impl SubscriptionHandle {
    pub(crate) fn new(event: EventName, id: SubscriberId) -> Self {
        Self { event, id }
    }

    pub fn event(&self) -> &EventName {
        &self.event
    }

    pub fn id(&self) -> &SubscriberId {
        &self.id
    }
}
