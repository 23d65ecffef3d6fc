//! Payload shapes: what an event accepts.
//!
//! A shape is a named predicate over the registry's payload type. An event
//! accepts a payload when **any** of its registered shapes matches it.
//!
//! Three ways to build one:
//!
//! - [`PayloadShape::new`] with an explicit validator function
//! - [`PayloadShape::variant`] for closed tagged unions implementing [`Tagged`]
//! - [`PayloadShape::of`] for dynamically typed [`AnyPayload`] values
//!
//! ```ignore
//! #[derive(Clone, Debug)]
//! enum OrderEvent { Created(u64), Cancelled(u64) }
//!
//! impl Tagged for OrderEvent {
//!     fn tag(&self) -> &'static str {
//!         match self {
//!             OrderEvent::Created(_) => "created",
//!             OrderEvent::Cancelled(_) => "cancelled",
//!         }
//!     }
//! }
//!
//! registry.register_event("orders", PayloadShape::variant("created"))?;
//! ```

use std::any::Any;
use std::borrow::Cow;
use std::sync::Arc;

/// Type-erased payload for registries that carry unrelated payload types.
pub type AnyPayload = Arc<dyn Any + Send + Sync>;

/// Wrap a value as an [`AnyPayload`].
pub fn any_payload<T>(value: T) -> AnyPayload
where
    T: Any + Send + Sync,
{
    Arc::new(value)
}

/// Payloads that carry their own discriminant.
pub trait Tagged {
    fn tag(&self) -> &'static str;
}

type Matcher<P> = Arc<dyn Fn(&P) -> bool + Send + Sync>;

/// A named validator for payloads of type `P`.
///
/// Shapes are identified by name: two shapes with the same name are the same
/// shape as far as registration is concerned, regardless of their predicates.
pub struct PayloadShape<P> {
    name: Cow<'static, str>,
    matcher: Matcher<P>,
}

impl<P> PayloadShape<P> {
    pub fn new<F>(name: impl Into<Cow<'static, str>>, matcher: F) -> Self
    where
        F: Fn(&P) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            matcher: Arc::new(matcher),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, payload: &P) -> bool {
        (self.matcher)(payload)
    }
}

impl<P> PayloadShape<P>
where
    P: Tagged + 'static,
{
    /// Accepts payloads whose [`Tagged::tag`] equals `tag`.
    pub fn variant(tag: &'static str) -> Self {
        Self::new(tag, move |payload: &P| payload.tag() == tag)
    }
}

impl PayloadShape<AnyPayload> {
    /// Accepts payloads holding a `T`.
    pub fn of<T>() -> Self
    where
        T: Any + Send + Sync,
    {
        Self::new(std::any::type_name::<T>(), |payload: &AnyPayload| {
            (**payload).is::<T>()
        })
    }
}

impl<P> Clone for PayloadShape<P> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            matcher: Arc::clone(&self.matcher),
        }
    }
}

impl<P> PartialEq for PayloadShape<P> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<P> Eq for PayloadShape<P> {}

impl<P> core::fmt::Debug for PayloadShape<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PayloadShape").field("name", &self.name).finish()
    }
}
