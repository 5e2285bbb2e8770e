//! Type-erased values produced by providers.
//!
//! Providers hand the container an [`Instance`]: either a shared value of
//! any `Send + Sync` type, or one of the two absent markers. Null and
//! undefined are kept distinct because identifiers opt into each separately
//! (see [`Identifier::nullable`](crate::identifier::Identifier::nullable) and
//! [`Identifier::undefinable`](crate::identifier::Identifier::undefinable)).
//!
//! Instances are reference counted, so the same value can be cached in a
//! scope and handed to many consumers. [`Instance::ptr_eq`] compares by
//! identity.

use core::any::{Any, TypeId};
use core::fmt;
use std::sync::Arc;

#[derive(Clone)]
enum Repr {
    Value {
        value: Arc<dyn Any + Send + Sync>,
        type_name: &'static str,
    },
    Null,
    Undefined,
}

/// A value produced by a provider.
///
/// # Example
///
/// ```
/// use haywire_core::instance::Instance;
///
/// struct Port(u16);
///
/// let instance = Instance::new(Port(8080));
/// assert_eq!(instance.downcast_ref::<Port>().map(|port| port.0), Some(8080));
/// assert!(instance.downcast::<String>().is_none());
///
/// assert!(Instance::null().is_null());
/// assert!(Instance::undefined().is_undefined());
/// ```
#[derive(Clone)]
pub struct Instance(Repr);

impl Instance {
    /// Wraps `value` in a new instance.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wraps an already shared value without re-allocating.
    #[must_use]
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self(Repr::Value {
            value,
            type_name: core::any::type_name::<T>(),
        })
    }

    /// The null marker.
    #[must_use]
    pub const fn null() -> Self {
        Self(Repr::Null)
    }

    /// The undefined marker.
    #[must_use]
    pub const fn undefined() -> Self {
        Self(Repr::Undefined)
    }

    /// Returns `true` for the null marker.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self.0, Repr::Null)
    }

    /// Returns `true` for the undefined marker.
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self.0, Repr::Undefined)
    }

    /// Returns `true` if this instance holds a value.
    #[must_use]
    pub fn is_value(&self) -> bool {
        matches!(self.0, Repr::Value { .. })
    }

    /// Returns the [`TypeId`] of the held value.
    #[must_use]
    pub fn value_type_id(&self) -> Option<TypeId> {
        match &self.0 {
            Repr::Value { value, .. } => Some((**value).type_id()),
            Repr::Null | Repr::Undefined => None,
        }
    }

    /// Returns the type name of the held value, or `null`/`undefined`.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match &self.0 {
            Repr::Value { type_name, .. } => type_name,
            Repr::Null => "null",
            Repr::Undefined => "undefined",
        }
    }

    /// Returns the held value as `Arc<T>` if it is a `T`.
    #[must_use]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match &self.0 {
            Repr::Value { value, .. } => Arc::clone(value).downcast::<T>().ok(),
            Repr::Null | Repr::Undefined => None,
        }
    }

    /// Borrows the held value if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match &self.0 {
            Repr::Value { value, .. } => (**value).downcast_ref::<T>(),
            Repr::Null | Repr::Undefined => None,
        }
    }

    /// Returns `true` if both instances hold the same allocation, or are the
    /// same marker.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Repr::Value { value: left, .. }, Repr::Value { value: right, .. }) => {
                Arc::ptr_eq(left, right)
            }
            (Repr::Null, Repr::Null) | (Repr::Undefined, Repr::Undefined) => true,
            _ => false,
        }
    }
}

impl<T: Any + Send + Sync> From<Arc<T>> for Instance {
    fn from(value: Arc<T>) -> Self {
        Self::from_arc(value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Value { type_name, .. } => f.debug_tuple("Instance").field(type_name).finish(),
            Repr::Null => f.write_str("Instance(null)"),
            Repr::Undefined => f.write_str("Instance(undefined)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Counter(u32);

    #[test]
    fn downcast_to_held_type() {
        let instance = Instance::new(Counter(3));

        assert_eq!(instance.downcast::<Counter>().as_deref(), Some(&Counter(3)));
        assert_eq!(instance.value_type_id(), Some(TypeId::of::<Counter>()));
        assert!(instance.type_name().ends_with("Counter"));
        assert!(instance.downcast_ref::<u32>().is_none());
    }

    #[test]
    fn markers_hold_nothing() {
        for marker in [Instance::null(), Instance::undefined()] {
            assert!(!marker.is_value());
            assert!(marker.downcast::<Counter>().is_none());
            assert!(marker.value_type_id().is_none());
        }
        assert_eq!(Instance::null().type_name(), "null");
        assert_eq!(Instance::undefined().type_name(), "undefined");
    }

    #[test]
    fn identity_comparison() {
        let shared = Arc::new(Counter(1));
        let first = Instance::from(Arc::clone(&shared));
        let second = Instance::from_arc(shared);

        assert!(first.ptr_eq(&second));
        assert!(first.ptr_eq(&first.clone()));
        assert!(!first.ptr_eq(&Instance::new(Counter(1))));
        assert!(Instance::null().ptr_eq(&Instance::null()));
        assert!(!Instance::null().ptr_eq(&Instance::undefined()));
    }
}
