//! Provider functions and dependency injection.
//!
//! A binding's provider is an ordinary Rust closure. Its parameters are
//! produced positionally from the binding's declared dependencies through
//! [`FromDependency`], and its return value is converted back with
//! [`IntoInstance`]. The [`IntoProvider`] and [`IntoAsyncProvider`] traits
//! erase any such closure into a uniform function over a list of
//! [`Dependency`] values.
//!
//! # Parameter types
//!
//! | Parameter | Receives |
//! |-----------|----------|
//! | [`Instance`] | the raw resolved value |
//! | `Arc<T>` | the value downcast to `T`; null or undefined is an error |
//! | `Option<Arc<T>>` | the value downcast to `T`; null or undefined is `None` |
//! | [`Supplier`] | a callback for a `supplier(sync)` dependency |
//! | [`AsyncSupplier`] | a callback for a `supplier(async)` dependency |
//! | [`LateBinding`] | a handle for a `late_binding` dependency |
//! | [`Dependency`] | whatever was resolved |
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use haywire_core::instance::Instance;
//! use haywire_core::provider::{Dependency, IntoProvider};
//!
//! struct Config { port: u16 }
//! struct Server { port: u16 }
//!
//! let provider = (|config: Arc<Config>| Instance::new(Server { port: config.port }))
//!     .into_provider();
//!
//! let server = provider(vec![Dependency::Instance(Instance::new(Config { port: 80 }))]).unwrap();
//! assert_eq!(server.downcast_ref::<Server>().map(|server| server.port), Some(80));
//! ```

use core::any::Any;
use core::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{BoxFuture, Shared};
use variadics_please::all_tuples;

use crate::error::{ProviderError, ResolveError};
use crate::identifier::Identifier;
use crate::instance::Instance;

/// Result of a resolution.
pub type ResolveResult<T = Instance> = Result<T, ResolveError>;

/// Type-erased synchronous provider.
pub type SyncProviderFn = Arc<dyn Fn(Vec<Dependency>) -> ResolveResult + Send + Sync>;

/// Type-erased asynchronous provider.
///
/// The outer result reports injection failures before the future is created.
pub type AsyncProviderFn =
    Arc<dyn Fn(Vec<Dependency>) -> ResolveResult<BoxFuture<'static, ResolveResult>> + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// Suppliers
// ─────────────────────────────────────────────────────────────────────────────

/// Synchronous callback producing a fresh resolution on every call.
#[derive(Clone)]
pub struct Supplier {
    call: Arc<dyn Fn() -> ResolveResult + Send + Sync>,
}

impl Supplier {
    /// Wraps a callback.
    #[must_use]
    pub fn new(call: impl Fn() -> ResolveResult + Send + Sync + 'static) -> Self {
        Self {
            call: Arc::new(call),
        }
    }

    /// Resolves the value.
    ///
    /// # Errors
    ///
    /// Returns any error raised while resolving the value.
    pub fn get(&self) -> ResolveResult {
        (self.call)()
    }

    /// Resolves the value and downcasts it to `T`.
    ///
    /// # Errors
    ///
    /// Returns any error raised while resolving, or [`ResolveError::Injection`]
    /// if the value is not a `T`.
    pub fn get_as<T: Any + Send + Sync>(&self) -> ResolveResult<Arc<T>> {
        downcast_value(0, &self.get()?)
    }
}

impl fmt::Debug for Supplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Supplier")
    }
}

/// Asynchronous callback producing a fresh resolution on every call.
#[derive(Clone)]
pub struct AsyncSupplier {
    call: Arc<dyn Fn() -> BoxFuture<'static, ResolveResult> + Send + Sync>,
}

impl AsyncSupplier {
    /// Wraps a callback.
    #[must_use]
    pub fn new(call: impl Fn() -> BoxFuture<'static, ResolveResult> + Send + Sync + 'static) -> Self {
        Self {
            call: Arc::new(call),
        }
    }

    /// Resolves the value.
    pub fn get(&self) -> BoxFuture<'static, ResolveResult> {
        (self.call)()
    }

    /// Resolves the value and downcasts it to `T`.
    ///
    /// # Errors
    ///
    /// Returns any error raised while resolving, or [`ResolveError::Injection`]
    /// if the value is not a `T`.
    pub async fn get_as<T: Any + Send + Sync>(&self) -> ResolveResult<Arc<T>> {
        downcast_value(0, &self.get().await?)
    }
}

impl fmt::Debug for AsyncSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AsyncSupplier")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Late bindings
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to a dependency resolved after its consumer was built.
///
/// Late bindings break dependency cycles: the consumer receives the handle
/// immediately and the target is resolved once the consumer exists. Clones
/// share the same outcome.
#[derive(Clone)]
pub struct LateBinding {
    id: Identifier,
    outcome: Shared<BoxFuture<'static, ResolveResult<Dependency>>>,
}

/// Completes a [`LateBinding`].
///
/// Dropping the resolver without calling [`LateBindingResolver::resolve`]
/// fails the handle with [`ResolveError::LateBindingAbandoned`].
pub struct LateBindingResolver {
    sender: oneshot::Sender<ResolveResult<Dependency>>,
}

impl LateBinding {
    /// Creates an unresolved handle for `id` and its resolver.
    #[must_use]
    pub fn pending(id: Identifier) -> (Self, LateBindingResolver) {
        let (sender, receiver) = oneshot::channel();
        let abandoned = id.clone();
        let outcome = receiver
            .map(move |received| {
                received.unwrap_or_else(|_| Err(ResolveError::LateBindingAbandoned { id: abandoned }))
            })
            .boxed()
            .shared();
        (Self { id, outcome }, LateBindingResolver { sender })
    }

    /// Returns the identifier being resolved.
    #[must_use]
    pub fn id(&self) -> &Identifier {
        &self.id
    }

    /// Waits for the resolved dependency.
    ///
    /// # Errors
    ///
    /// Returns the error the target failed with.
    pub async fn get(&self) -> ResolveResult<Dependency> {
        self.outcome.clone().await
    }

    /// Waits for the resolved value.
    ///
    /// # Errors
    ///
    /// Returns the error the target failed with, or [`ResolveError::Injection`]
    /// if the target is a supplier rather than a value.
    pub async fn instance(&self) -> ResolveResult {
        Instance::from_dependency(self.get().await?)
    }

    /// Returns the outcome if the target has already been resolved.
    #[must_use]
    pub fn try_get(&self) -> Option<ResolveResult<Dependency>> {
        self.outcome.clone().now_or_never()
    }
}

impl LateBindingResolver {
    /// Completes the handle. Has no effect if every handle was dropped.
    pub fn resolve(self, outcome: ResolveResult<Dependency>) {
        let _ = self.sender.send(outcome);
    }
}

impl fmt::Debug for LateBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LateBinding").field(&self.id).finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dependencies
// ─────────────────────────────────────────────────────────────────────────────

/// A resolved dependency as handed to a provider.
#[derive(Debug, Clone)]
pub enum Dependency {
    /// A plain value.
    Instance(Instance),
    /// A synchronous supplier.
    Supplier(Supplier),
    /// An asynchronous supplier.
    AsyncSupplier(AsyncSupplier),
    /// A late binding handle.
    LateBinding(LateBinding),
}

impl Dependency {
    /// Short description used in injection errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Instance(instance) => instance.type_name(),
            Self::Supplier(_) => "Supplier",
            Self::AsyncSupplier(_) => "AsyncSupplier",
            Self::LateBinding(_) => "LateBinding",
        }
    }
}

fn downcast_value<T: Any + Send + Sync>(index: usize, instance: &Instance) -> ResolveResult<Arc<T>> {
    instance
        .downcast::<T>()
        .ok_or_else(|| ResolveError::Injection {
            index,
            expected: core::any::type_name::<T>(),
            found: instance.type_name(),
        })
}

/// Conversion from a resolved [`Dependency`] into a provider parameter.
pub trait FromDependency: Sized + Send + 'static {
    /// Converts the dependency at position `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Injection`] when the dependency has the wrong shape.
    fn from_dependency_at(index: usize, dependency: Dependency) -> ResolveResult<Self>;

    /// Converts a dependency outside of a parameter list.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Injection`] when the dependency has the wrong shape.
    fn from_dependency(dependency: Dependency) -> ResolveResult<Self> {
        Self::from_dependency_at(0, dependency)
    }
}

fn mismatch<T>(index: usize, expected: &'static str, dependency: &Dependency) -> ResolveResult<T> {
    Err(ResolveError::Injection {
        index,
        expected,
        found: dependency.kind(),
    })
}

impl FromDependency for Dependency {
    fn from_dependency_at(_index: usize, dependency: Dependency) -> ResolveResult<Self> {
        Ok(dependency)
    }
}

impl FromDependency for Instance {
    fn from_dependency_at(index: usize, dependency: Dependency) -> ResolveResult<Self> {
        match dependency {
            Dependency::Instance(instance) => Ok(instance),
            other => mismatch(index, "Instance", &other),
        }
    }
}

impl<T: Any + Send + Sync> FromDependency for Arc<T> {
    fn from_dependency_at(index: usize, dependency: Dependency) -> ResolveResult<Self> {
        match dependency {
            Dependency::Instance(instance) => downcast_value(index, &instance),
            other => mismatch(index, core::any::type_name::<T>(), &other),
        }
    }
}

impl<T: Any + Send + Sync> FromDependency for Option<Arc<T>> {
    fn from_dependency_at(index: usize, dependency: Dependency) -> ResolveResult<Self> {
        match dependency {
            Dependency::Instance(instance) if !instance.is_value() => Ok(None),
            Dependency::Instance(instance) => downcast_value(index, &instance).map(Some),
            other => mismatch(index, core::any::type_name::<T>(), &other),
        }
    }
}

impl FromDependency for Supplier {
    fn from_dependency_at(index: usize, dependency: Dependency) -> ResolveResult<Self> {
        match dependency {
            Dependency::Supplier(supplier) => Ok(supplier),
            other => mismatch(index, "Supplier", &other),
        }
    }
}

impl FromDependency for AsyncSupplier {
    fn from_dependency_at(index: usize, dependency: Dependency) -> ResolveResult<Self> {
        match dependency {
            Dependency::AsyncSupplier(supplier) => Ok(supplier),
            other => mismatch(index, "AsyncSupplier", &other),
        }
    }
}

impl FromDependency for LateBinding {
    fn from_dependency_at(index: usize, dependency: Dependency) -> ResolveResult<Self> {
        match dependency {
            Dependency::LateBinding(late) => Ok(late),
            other => mismatch(index, "LateBinding", &other),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider outputs
// ─────────────────────────────────────────────────────────────────────────────

/// Conversion from a provider's return value into an [`Instance`].
pub trait IntoInstance: Send + 'static {
    /// Performs the conversion.
    ///
    /// # Errors
    ///
    /// Returns the provider's own failure.
    fn into_instance(self) -> ResolveResult;
}

impl IntoInstance for Instance {
    fn into_instance(self) -> ResolveResult {
        Ok(self)
    }
}

impl<E: Into<ProviderError> + Send + 'static> IntoInstance for Result<Instance, E> {
    fn into_instance(self) -> ResolveResult {
        self.map_err(|error| ResolveError::from_provider(error.into()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider conversion
// ─────────────────────────────────────────────────────────────────────────────

/// Hands out dependencies positionally to provider parameters.
struct DependencyCursor {
    dependencies: std::vec::IntoIter<Dependency>,
    index: usize,
}

impl DependencyCursor {
    fn new(dependencies: Vec<Dependency>, arity: usize) -> ResolveResult<Self> {
        if dependencies.len() != arity {
            return Err(ResolveError::Arity {
                expected: arity,
                found: dependencies.len(),
            });
        }
        Ok(Self {
            dependencies: dependencies.into_iter(),
            index: 0,
        })
    }

    fn take<P: FromDependency>(&mut self) -> ResolveResult<P> {
        let index = self.index;
        self.index += 1;
        let dependency = self.dependencies.next().ok_or(ResolveError::Arity {
            expected: index + 1,
            found: index,
        })?;
        P::from_dependency_at(index, dependency)
    }
}

/// Conversion of a closure into a [`SyncProviderFn`].
///
/// Implemented for `Fn(P0, P1, ...) -> Out` with up to twelve
/// [`FromDependency`] parameters, where `Out` is [`IntoInstance`]. The
/// `Marker` parameter only distinguishes the arities.
pub trait IntoProvider<Marker>: Send + Sync + 'static {
    /// Erases the closure.
    fn into_provider(self) -> SyncProviderFn;
}

/// Conversion of an async closure into an [`AsyncProviderFn`].
///
/// Implemented for `Fn(P0, P1, ...) -> Fut` with up to twelve
/// [`FromDependency`] parameters, where `Fut` resolves to an [`IntoInstance`].
pub trait IntoAsyncProvider<Marker>: Send + Sync + 'static {
    /// Erases the closure.
    fn into_async_provider(self) -> AsyncProviderFn;
}

impl<Func, Out> IntoProvider<fn() -> Out> for Func
where
    Func: Fn() -> Out + Send + Sync + 'static,
    Out: IntoInstance,
{
    fn into_provider(self) -> SyncProviderFn {
        Arc::new(move |dependencies| {
            DependencyCursor::new(dependencies, 0)?;
            self().into_instance()
        })
    }
}

impl<Func, Fut, Out> IntoAsyncProvider<fn() -> Fut> for Func
where
    Func: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Out> + Send + 'static,
    Out: IntoInstance,
{
    fn into_async_provider(self) -> AsyncProviderFn {
        Arc::new(move |dependencies| {
            DependencyCursor::new(dependencies, 0)?;
            let future = self();
            Ok(async move { future.await.into_instance() }.boxed())
        })
    }
}

macro_rules! impl_into_provider {
    ($($param:ident),*) => {
        impl<Func, Out, $($param),*> IntoProvider<fn($($param,)*) -> Out> for Func
        where
            Func: Fn($($param),*) -> Out + Send + Sync + 'static,
            Out: IntoInstance,
            $($param: FromDependency,)*
        {
            fn into_provider(self) -> SyncProviderFn {
                let arity = <[&str]>::len(&[$(stringify!($param)),*]);
                Arc::new(move |dependencies| {
                    let mut cursor = DependencyCursor::new(dependencies, arity)?;
                    self($(cursor.take::<$param>()?),*).into_instance()
                })
            }
        }

        impl<Func, Fut, Out, $($param),*> IntoAsyncProvider<fn($($param,)*) -> Fut> for Func
        where
            Func: Fn($($param),*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Out> + Send + 'static,
            Out: IntoInstance,
            $($param: FromDependency,)*
        {
            fn into_async_provider(self) -> AsyncProviderFn {
                let arity = <[&str]>::len(&[$(stringify!($param)),*]);
                Arc::new(move |dependencies| {
                    let mut cursor = DependencyCursor::new(dependencies, arity)?;
                    let future = self($(cursor.take::<$param>()?),*);
                    Ok(async move { future.await.into_instance() }.boxed())
                })
            }
        }
    };
}

// Generate provider conversions for one to twelve parameters
all_tuples!(impl_into_provider, 1, 12, P);
