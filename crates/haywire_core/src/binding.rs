//! Bindings and the binding builder.
//!
//! A [`Binding`] ties one output [`Identifier`] to a provider, the ordered
//! identifiers of the provider's dependencies, and a [`Scope`]. Bindings are
//! built with [`bind`]:
//!
//! ```
//! use std::sync::Arc;
//! use haywire_core::binding::bind;
//! use haywire_core::identifier::Identifier;
//! use haywire_core::instance::Instance;
//! use haywire_core::scope::Scope;
//!
//! struct Config { url: String }
//! struct Pool { url: String }
//!
//! let config = Identifier::of::<Config>();
//! let pool = Identifier::of::<Pool>();
//!
//! let config_binding = bind(config.clone())
//!     .with_instance(Instance::new(Config { url: "postgres://".into() }));
//!
//! let pool_binding = bind(pool.clone())
//!     .with_dependencies([config])
//!     .with_provider(|config: Arc<Config>| Instance::new(Pool { url: config.url.clone() }))
//!     .scoped(Scope::Singleton);
//!
//! assert_eq!(pool_binding.dependency_ids().len(), 1);
//! assert_eq!(config_binding.scope(), Scope::OptimisticSingleton);
//! ```
//!
//! The order of `with_dependencies` and `with_provider` is free; both
//! orders produce the same binding.

use core::fmt;
use std::sync::Arc;

use crate::error::{ResolveError, ValidationError};
use crate::identifier::{Identifier, Name};
use crate::instance::Instance;
use crate::provider::{
    AsyncProviderFn, IntoAsyncProvider, IntoInstance, IntoProvider, SyncProviderFn,
};
use crate::scope::Scope;

// ─────────────────────────────────────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────────────────────────────────────

/// How a binding produces its value.
#[derive(Clone)]
pub enum Provider {
    /// A synchronous function of the dependencies.
    Sync(SyncProviderFn),
    /// An asynchronous function of the dependencies.
    Async(AsyncProviderFn),
    /// A constant.
    Instance(Instance),
    /// A value that will be supplied later, see [`Binding::placeholder`].
    Placeholder,
}

impl Provider {
    /// Returns `true` for asynchronous providers.
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Sync"),
            Self::Async(_) => f.write_str("Async"),
            Self::Instance(instance) => f.debug_tuple("Instance").field(instance).finish(),
            Self::Placeholder => f.write_str("Placeholder"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Binding
// ─────────────────────────────────────────────────────────────────────────────

/// A provider registered for an output identifier.
///
/// Bindings are immutable; every modifier returns a new binding.
#[derive(Debug, Clone)]
pub struct Binding {
    output_id: Identifier,
    dependency_ids: Arc<[Identifier]>,
    provider: Provider,
    scope: Scope,
}

impl Binding {
    fn new(output_id: Identifier, dependency_ids: Arc<[Identifier]>, provider: Provider) -> Self {
        let scope = match provider {
            Provider::Instance(_) => Scope::OptimisticSingleton,
            _ => Scope::Transient,
        };
        Self {
            output_id: output_id.output_id(),
            dependency_ids,
            provider,
            scope,
        }
    }

    /// A binding whose value must be supplied from outside before use.
    ///
    /// Resolving a placeholder fails with [`ValidationError::ProviderMissing`].
    #[must_use]
    pub fn placeholder(output_id: Identifier) -> Self {
        Self::new(output_id, Arc::from([]), Provider::Placeholder)
    }

    /// Returns the output identifier.
    #[must_use]
    pub fn output_id(&self) -> &Identifier {
        &self.output_id
    }

    /// Returns the declared dependencies in provider parameter order.
    #[must_use]
    pub fn dependency_ids(&self) -> &[Identifier] {
        &self.dependency_ids
    }

    /// Returns the provider.
    #[must_use]
    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Returns the lifetime policy.
    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Returns `true` if the provider is asynchronous.
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.provider.is_async()
    }

    /// Returns `true` for bindings created by [`Binding::placeholder`].
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        matches!(self.provider, Provider::Placeholder)
    }

    /// Returns the same binding with a different scope.
    #[must_use]
    pub fn scoped(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Returns the same binding registered under a named output.
    #[must_use]
    pub fn named(mut self, name: impl Into<Name>) -> Self {
        self.output_id = self.output_id.named(name);
        self
    }

    /// Returns the same binding with a nullable output.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.output_id = self.output_id.nullable();
        self
    }

    /// Returns the same binding with an undefinable output.
    #[must_use]
    pub fn undefinable(mut self) -> Self {
        self.output_id = self.output_id.undefinable();
        self
    }

    /// Returns every identifier this binding satisfies.
    #[must_use]
    pub fn expanded_outputs(&self) -> Vec<Identifier> {
        self.output_id.expand_output()
    }

    /// Checks a freshly produced value against the output identifier.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::NullResponse`] for null on a non-nullable output
    /// - [`ResolveError::UndefinedResponse`] for undefined on a non-undefinable output
    /// - [`ResolveError::InstanceOf`] when a type-keyed output receives a value of another type
    pub fn validate_instance(&self, instance: Instance) -> Result<Instance, ResolveError> {
        let output_id = &self.output_id;
        if instance.is_null() && !output_id.is_nullable() {
            return Err(ResolveError::NullResponse {
                output_id: output_id.clone(),
            });
        }
        if instance.is_undefined() && !output_id.is_undefinable() {
            return Err(ResolveError::UndefinedResponse {
                output_id: output_id.clone(),
            });
        }
        if let (Some(tag), Some(actual)) = (output_id.construct(), instance.value_type_id())
            && tag.type_id() != actual
        {
            return Err(ResolveError::InstanceOf {
                output_id: output_id.clone(),
                type_name: instance.type_name(),
            });
        }
        Ok(instance)
    }

    /// Error returned when a placeholder is resolved.
    #[must_use]
    pub fn missing_error(&self) -> ValidationError {
        ValidationError::provider_missing([self.output_id.clone()])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builders
// ─────────────────────────────────────────────────────────────────────────────

/// Starts a binding for `output_id`.
///
/// Supplier and late binding annotations are removed from the output; they
/// only describe how a dependency is delivered.
#[must_use]
pub fn bind(output_id: Identifier) -> BindingBuilder {
    BindingBuilder {
        output_id: output_id.output_id(),
    }
}

/// Builder returned by [`bind`].
#[derive(Debug, Clone)]
#[must_use = "a binding builder does nothing until a provider is chosen"]
pub struct BindingBuilder {
    output_id: Identifier,
}

impl BindingBuilder {
    /// Binds a constant value. The binding defaults to the optimistic
    /// singleton scope.
    pub fn with_instance(self, instance: Instance) -> Binding {
        Binding::new(self.output_id, Arc::from([]), Provider::Instance(instance))
    }

    /// Binds a zero-argument function.
    pub fn with_generator<F, Out>(self, generator: F) -> Binding
    where
        F: Fn() -> Out + Send + Sync + 'static,
        Out: IntoInstance,
    {
        Binding::new(
            self.output_id,
            Arc::from([]),
            Provider::Sync(IntoProvider::<fn() -> Out>::into_provider(generator)),
        )
    }

    /// Binds a zero-argument async function.
    pub fn with_async_generator<F, Fut, Out>(self, generator: F) -> Binding
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Out> + Send + 'static,
        Out: IntoInstance,
    {
        Binding::new(
            self.output_id,
            Arc::from([]),
            Provider::Async(IntoAsyncProvider::<fn() -> Fut>::into_async_provider(
                generator,
            )),
        )
    }

    /// Declares the dependencies passed positionally to the provider.
    pub fn with_dependencies(
        self,
        dependency_ids: impl IntoIterator<Item = Identifier>,
    ) -> DepsBindingBuilder {
        DepsBindingBuilder {
            output_id: self.output_id,
            dependency_ids: dependency_ids.into_iter().collect(),
        }
    }

    /// Chooses a synchronous provider; dependencies follow.
    pub fn with_provider<M>(self, provider: impl IntoProvider<M>) -> ProviderBindingBuilder {
        ProviderBindingBuilder {
            output_id: self.output_id,
            provider: Provider::Sync(provider.into_provider()),
        }
    }

    /// Chooses an asynchronous provider; dependencies follow.
    pub fn with_async_provider<M>(
        self,
        provider: impl IntoAsyncProvider<M>,
    ) -> ProviderBindingBuilder {
        ProviderBindingBuilder {
            output_id: self.output_id,
            provider: Provider::Async(provider.into_async_provider()),
        }
    }
}

/// Builder with dependencies declared, awaiting a provider.
#[derive(Debug, Clone)]
#[must_use = "a binding builder does nothing until a provider is chosen"]
pub struct DepsBindingBuilder {
    output_id: Identifier,
    dependency_ids: Arc<[Identifier]>,
}

impl DepsBindingBuilder {
    /// Completes the binding with a synchronous provider.
    pub fn with_provider<M>(self, provider: impl IntoProvider<M>) -> Binding {
        Binding::new(
            self.output_id,
            self.dependency_ids,
            Provider::Sync(provider.into_provider()),
        )
    }

    /// Completes the binding with an asynchronous provider.
    pub fn with_async_provider<M>(self, provider: impl IntoAsyncProvider<M>) -> Binding {
        Binding::new(
            self.output_id,
            self.dependency_ids,
            Provider::Async(provider.into_async_provider()),
        )
    }
}

/// Builder with a provider chosen, awaiting its dependencies.
#[derive(Debug, Clone)]
#[must_use = "a binding builder does nothing until dependencies are declared"]
pub struct ProviderBindingBuilder {
    output_id: Identifier,
    provider: Provider,
}

impl ProviderBindingBuilder {
    /// Completes the binding.
    pub fn with_dependencies(self, dependency_ids: impl IntoIterator<Item = Identifier>) -> Binding {
        Binding::new(
            self.output_id,
            dependency_ids.into_iter().collect(),
            self.provider,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Engine(u8);

    #[derive(Debug)]
    struct Car;

    #[test]
    fn bind_strips_delivery_annotations() {
        let id = Identifier::new("x");
        let binding = bind(id.sync_supplier(true).late_binding()).with_generator(Instance::null);

        assert_eq!(binding.output_id(), &id);
    }

    #[test]
    fn default_scopes() {
        let id = Identifier::new("x");
        assert_eq!(
            bind(id.clone()).with_instance(Instance::null()).scope(),
            Scope::OptimisticSingleton
        );
        assert_eq!(
            bind(id.clone()).with_generator(Instance::null).scope(),
            Scope::Transient
        );
        assert_eq!(
            bind(id)
                .with_async_generator(|| async { Instance::null() })
                .scope(),
            Scope::Transient
        );
    }

    #[test]
    fn async_flag_follows_provider() {
        let id = Identifier::new("x");
        assert!(!bind(id.clone()).with_generator(Instance::null).is_async());
        assert!(
            bind(id.clone())
                .with_async_generator(|| async { Instance::null() })
                .is_async()
        );
        assert!(
            bind(id)
                .with_dependencies([Identifier::new("y")])
                .with_async_provider(|_y: Instance| async { Instance::null() })
                .is_async()
        );
    }

    #[test]
    fn builder_order_is_free() {
        let output = Identifier::new("out");
        let dependency = Identifier::new("dep");

        let first = bind(output.clone())
            .with_dependencies([dependency.clone()])
            .with_provider(|dep: Instance| dep);
        let second = bind(output)
            .with_provider(|dep: Instance| dep)
            .with_dependencies([dependency.clone()]);

        assert_eq!(first.output_id(), second.output_id());
        assert_eq!(first.dependency_ids(), &[dependency.clone()]);
        assert_eq!(second.dependency_ids(), &[dependency]);
    }

    #[test]
    fn modifiers_change_output() {
        let id = Identifier::new("x");
        let binding = bind(id.clone())
            .with_generator(Instance::null)
            .named("primary")
            .nullable()
            .undefinable()
            .scoped(Scope::Request);

        assert_eq!(binding.output_id(), &id.named("primary").nullable().undefinable());
        assert_eq!(binding.scope(), Scope::Request);
        assert_eq!(binding.expanded_outputs().len(), 1);
    }

    #[test]
    fn validate_instance_checks_absence_and_type() {
        let strict = bind(Identifier::of::<Engine>()).with_generator(Instance::null);
        assert!(matches!(
            strict.validate_instance(Instance::null()),
            Err(ResolveError::NullResponse { .. })
        ));
        assert!(matches!(
            strict.validate_instance(Instance::undefined()),
            Err(ResolveError::UndefinedResponse { .. })
        ));
        assert!(matches!(
            strict.validate_instance(Instance::new(Car)),
            Err(ResolveError::InstanceOf { .. })
        ));
        assert!(strict.validate_instance(Instance::new(Engine(1))).is_ok());

        let loose = strict.clone().nullable();
        assert!(loose.validate_instance(Instance::null()).is_ok());

        let untyped = bind(Identifier::new("any")).with_generator(Instance::null);
        assert!(untyped.validate_instance(Instance::new(Car)).is_ok());
    }

    #[test]
    fn placeholders() {
        let id = Identifier::new("later");
        let binding = Binding::placeholder(id.nullable());

        assert!(binding.is_placeholder());
        assert!(!binding.is_async());
        assert_eq!(
            binding.missing_error().to_string(),
            "Providers missing for container: later(nullable)"
        );
    }
}
