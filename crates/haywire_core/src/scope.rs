//! Lifetime policies for resolved instances.

use core::fmt;

/// Governs how long a resolved instance is reused.
///
/// | Scope | Cached in | Eager |
/// |-------|-----------|-------|
/// | [`Transient`](Scope::Transient) | nothing | no |
/// | [`Singleton`](Scope::Singleton) | the container | no |
/// | [`OptimisticSingleton`](Scope::OptimisticSingleton) | the container | on preload |
/// | [`Request`](Scope::Request) | the top-level request | no |
/// | [`OptimisticRequest`](Scope::OptimisticRequest) | the top-level request | at request start |
/// | [`Supplier`](Scope::Supplier) | the current supplier invocation | no |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Scope {
    /// A new instance for every dependency edge.
    #[default]
    Transient,
    /// One instance for the lifetime of the container.
    ///
    /// Concurrent first resolutions share a single provider invocation.
    Singleton,
    /// A singleton instantiated ahead of any request by preloading.
    ///
    /// Synchronous suppliers may depend on asynchronous optimistic singletons,
    /// since the value is always available by the time they are called.
    OptimisticSingleton,
    /// One instance per top-level request.
    Request,
    /// A request-scoped instance created when the request starts, as long as
    /// it is reachable from the requested identifier.
    OptimisticRequest,
    /// Like [`Scope::Request`], but every supplier invocation opens a fresh
    /// cache even when it propagates the caller's request scope.
    Supplier,
}

impl Scope {
    /// Returns `true` for scopes cached for the container lifetime.
    #[must_use]
    pub const fn is_singleton(self) -> bool {
        matches!(self, Self::Singleton | Self::OptimisticSingleton)
    }

    /// Returns the lowercase name of the scope.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Singleton => "singleton",
            Self::OptimisticSingleton => "optimistic-singleton",
            Self::Request => "request",
            Self::OptimisticRequest => "optimistic-request",
            Self::Supplier => "supplier",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_transient() {
        assert_eq!(Scope::default(), Scope::Transient);
    }

    #[test]
    fn classification() {
        assert!(Scope::Singleton.is_singleton());
        assert!(Scope::OptimisticSingleton.is_singleton());
        assert!(!Scope::Request.is_singleton());

        assert_eq!(Scope::OptimisticRequest.to_string(), "optimistic-request");
    }
}
