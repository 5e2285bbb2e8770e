//! Containers: validated modules ready to resolve identifiers.
//!
//! A module with only synchronous bindings becomes a [`SyncContainer`], which
//! can resolve without awaiting. Any asynchronous binding makes it an
//! [`AsyncContainer`], which only offers awaiting resolution. [`Container`]
//! holds either and is what [`create_container`] returns.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use haywire_container::prelude::*;
//!
//! struct Counter(u32);
//!
//! let id = Identifier::of::<Counter>();
//! let module = create_module(
//!     bind(id.clone())
//!         .with_generator(|| Instance::new(Counter(1)))
//!         .scoped(Scope::Singleton),
//! );
//!
//! let container = create_container(&module).unwrap().into_sync().unwrap();
//! let first = container.get_as::<Counter>(&id).unwrap();
//! let second = container.get_as::<Counter>(&id).unwrap();
//! assert!(Arc::ptr_eq(&first, &second));
//! ```

use core::any::Any;
use std::sync::Arc;

use haywire_core::error::ValidationError;
use haywire_core::identifier::Identifier;
use haywire_core::module::Module;
use haywire_core::provider::ResolveResult;

use crate::config::ContainerConfig;
use crate::factory::Factory;
use crate::graph::BindingGraph;
use crate::resolver::{Resolver, downcast};

// ─────────────────────────────────────────────────────────────────────────────
// Creation
// ─────────────────────────────────────────────────────────────────────────────

/// Creates a container for `module` with the default configuration.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found in the graph.
pub fn create_container(module: &Module) -> Result<Container, ValidationError> {
    create_container_with(module, ContainerConfig::default())
}

/// Creates a container for `module`.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found in the graph, unless
/// [`ContainerConfig::validate_on_create`] is off.
pub fn create_container_with(
    module: &Module,
    config: ContainerConfig,
) -> Result<Container, ValidationError> {
    Container::from_graph(BindingGraph::from_module(module), config)
}

/// Extension trait for building containers and factories from modules.
pub trait ModuleExt {
    /// See [`create_container`].
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found in the graph.
    fn to_container(&self) -> Result<Container, ValidationError>;

    /// See [`create_container_with`].
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found in the graph.
    fn to_container_with(&self, config: ContainerConfig) -> Result<Container, ValidationError>;

    /// See [`Factory::new`].
    fn to_factory(&self) -> Factory;
}

impl ModuleExt for Module {
    fn to_container(&self) -> Result<Container, ValidationError> {
        create_container(self)
    }

    fn to_container_with(&self, config: ContainerConfig) -> Result<Container, ValidationError> {
        create_container_with(self, config)
    }

    fn to_factory(&self) -> Factory {
        Factory::new(self)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Container
// ─────────────────────────────────────────────────────────────────────────────

/// A container of either flavor.
#[derive(Debug, Clone)]
pub enum Container {
    /// Only synchronous bindings.
    Sync(SyncContainer),
    /// At least one asynchronous binding.
    Async(AsyncContainer),
}

impl Container {
    pub(crate) fn from_graph(
        graph: BindingGraph,
        config: ContainerConfig,
    ) -> Result<Self, ValidationError> {
        let resolver = Resolver::new(graph, config);
        if resolver.config().validate_on_create() {
            resolver.wire()?;
        }
        tracing::debug!(
            container = %resolver.label(),
            is_async = resolver.is_async(),
            "container created"
        );
        Ok(if resolver.is_async() {
            Self::Async(AsyncContainer { resolver })
        } else {
            Self::Sync(SyncContainer { resolver })
        })
    }

    fn resolver(&self) -> &Resolver {
        match self {
            Self::Sync(container) => &container.resolver,
            Self::Async(container) => &container.resolver,
        }
    }

    /// Returns `true` if any binding is asynchronous.
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.resolver().is_async()
    }

    /// Returns the configured label.
    #[must_use]
    pub fn label(&self) -> &str {
        self.resolver().label()
    }

    /// Returns the synchronous container, if this is one.
    #[must_use]
    pub fn as_sync(&self) -> Option<&SyncContainer> {
        match self {
            Self::Sync(container) => Some(container),
            Self::Async(_) => None,
        }
    }

    /// Converts into the synchronous container, if this is one.
    #[must_use]
    pub fn into_sync(self) -> Option<SyncContainer> {
        match self {
            Self::Sync(container) => Some(container),
            Self::Async(_) => None,
        }
    }

    /// Converts into an awaiting container. Always possible.
    #[must_use]
    pub fn into_async(self) -> AsyncContainer {
        match self {
            Self::Sync(container) => AsyncContainer {
                resolver: container.resolver,
            },
            Self::Async(container) => container,
        }
    }

    /// Validates the graph.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn check(&self) -> Result<(), ValidationError> {
        self.resolver().check()
    }

    /// Validates the graph and plans every request ahead of time.
    ///
    /// A synchronous container also instantiates every optimistic singleton,
    /// see [`SyncContainer::wire`]. An asynchronous one does so on its first
    /// request or on [`Container::preload_async`].
    ///
    /// # Errors
    ///
    /// Returns the first validation error found, or the preload failures.
    pub fn wire(&self) -> ResolveResult<()> {
        match self {
            Self::Sync(container) => container.wire(),
            Self::Async(container) => Ok(container.wire()?),
        }
    }

    /// Instantiates every optimistic singleton without awaiting.
    ///
    /// # Errors
    ///
    /// Returns every failure; the next call retries. In an asynchronous
    /// container an optimistic singleton that needs an asynchronous provider
    /// fails with
    /// [`ResolveError::AsyncInSyncContext`](haywire_core::error::ResolveError::AsyncInSyncContext);
    /// use [`Container::preload_async`] there.
    pub fn preload(&self) -> ResolveResult<()> {
        self.resolver().preload()
    }

    /// Resolves `id`.
    ///
    /// # Errors
    ///
    /// Returns the [`ResolveError`](haywire_core::error::ResolveError) the
    /// resolution failed with.
    pub async fn get_async(&self, id: &Identifier) -> ResolveResult {
        self.resolver().get_async(id).await
    }

    /// Resolves `id` and downcasts the value.
    ///
    /// # Errors
    ///
    /// Fails like [`Container::get_async`], or with
    /// [`ResolveError::Injection`](haywire_core::error::ResolveError::Injection)
    /// if the value is not a `T`.
    pub async fn get_async_as<T: Any + Send + Sync>(&self, id: &Identifier) -> ResolveResult<Arc<T>> {
        downcast(&self.get_async(id).await?)
    }

    /// Instantiates every optimistic singleton.
    ///
    /// # Errors
    ///
    /// Returns every failure; the next call retries.
    pub async fn preload_async(&self) -> ResolveResult<()> {
        self.resolver().preload_async().await
    }
}

impl From<SyncContainer> for Container {
    fn from(container: SyncContainer) -> Self {
        Self::Sync(container)
    }
}

impl From<AsyncContainer> for Container {
    fn from(container: AsyncContainer) -> Self {
        Self::Async(container)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SyncContainer
// ─────────────────────────────────────────────────────────────────────────────

/// A container that resolves without awaiting.
///
/// Clones share every cache.
#[derive(Debug, Clone)]
pub struct SyncContainer {
    resolver: Resolver,
}

impl SyncContainer {
    /// Always `false`.
    #[must_use]
    pub fn is_async(&self) -> bool {
        false
    }

    /// Returns the configured label.
    #[must_use]
    pub fn label(&self) -> &str {
        self.resolver.label()
    }

    /// Resolves `id`.
    ///
    /// Supplier and late binding annotations on `id` are ignored.
    ///
    /// # Errors
    ///
    /// Returns the [`ResolveError`](haywire_core::error::ResolveError) the
    /// resolution failed with.
    pub fn get(&self, id: &Identifier) -> ResolveResult {
        self.resolver.get(id)
    }

    /// Resolves `id` and downcasts the value.
    ///
    /// # Errors
    ///
    /// Fails like [`SyncContainer::get`], or with
    /// [`ResolveError::Injection`](haywire_core::error::ResolveError::Injection)
    /// if the value is not a `T`.
    pub fn get_as<T: Any + Send + Sync>(&self, id: &Identifier) -> ResolveResult<Arc<T>> {
        downcast(&self.get(id)?)
    }

    /// Resolves `id` through the awaiting path.
    ///
    /// # Errors
    ///
    /// Same as [`SyncContainer::get`].
    pub async fn get_async(&self, id: &Identifier) -> ResolveResult {
        self.resolver.get_async(id).await
    }

    /// Instantiates every optimistic singleton.
    ///
    /// # Errors
    ///
    /// Returns every failure; the next call retries.
    pub fn preload(&self) -> ResolveResult<()> {
        self.resolver.preload()
    }

    /// Validates the graph.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn check(&self) -> Result<(), ValidationError> {
        self.resolver.check()
    }

    /// Validates the graph, plans every request ahead of time and
    /// instantiates every optimistic singleton.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found, or the preload failures.
    pub fn wire(&self) -> ResolveResult<()> {
        self.resolver.wire()?;
        self.resolver.preload()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AsyncContainer
// ─────────────────────────────────────────────────────────────────────────────

/// A container whose resolutions must be awaited.
///
/// Clones share every cache.
#[derive(Debug, Clone)]
pub struct AsyncContainer {
    resolver: Resolver,
}

impl AsyncContainer {
    /// Returns `true` if any binding is asynchronous.
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.resolver.is_async()
    }

    /// Returns the configured label.
    #[must_use]
    pub fn label(&self) -> &str {
        self.resolver.label()
    }

    /// Resolves `id`.
    ///
    /// Supplier and late binding annotations on `id` are ignored.
    ///
    /// # Errors
    ///
    /// Returns the [`ResolveError`](haywire_core::error::ResolveError) the
    /// resolution failed with.
    pub async fn get_async(&self, id: &Identifier) -> ResolveResult {
        self.resolver.get_async(id).await
    }

    /// Resolves `id` and downcasts the value.
    ///
    /// # Errors
    ///
    /// Fails like [`AsyncContainer::get_async`], or with
    /// [`ResolveError::Injection`](haywire_core::error::ResolveError::Injection)
    /// if the value is not a `T`.
    pub async fn get_async_as<T: Any + Send + Sync>(&self, id: &Identifier) -> ResolveResult<Arc<T>> {
        downcast(&self.get_async(id).await?)
    }

    /// Instantiates every optimistic singleton.
    ///
    /// # Errors
    ///
    /// Returns every failure; the next call retries.
    pub async fn preload_async(&self) -> ResolveResult<()> {
        self.resolver.preload_async().await
    }

    /// Validates the graph.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn check(&self) -> Result<(), ValidationError> {
        self.resolver.check()
    }

    /// Validates the graph and plans every request ahead of time.
    ///
    /// Optimistic singletons are instantiated by the first request, or
    /// earlier by [`AsyncContainer::preload_async`].
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn wire(&self) -> Result<(), ValidationError> {
        self.resolver.wire()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haywire_core::binding::bind;
    use haywire_core::instance::Instance;
    use haywire_core::module::create_module;

    #[test]
    fn flavor_follows_module() {
        let id = Identifier::new("x");
        let sync = create_container(&create_module(bind(id.clone()).with_generator(Instance::null).nullable()))
            .unwrap();
        assert!(!sync.is_async());
        assert!(sync.as_sync().is_some());

        let asynchronous =
            create_container(&create_module(bind(id).with_async_generator(|| async { Instance::new(1_u8) })))
                .unwrap();
        assert!(asynchronous.is_async());
        assert!(asynchronous.clone().into_sync().is_none());
        assert!(asynchronous.into_async().is_async());
    }

    #[test]
    fn validation_can_be_deferred() {
        let a = Identifier::new("a");
        let module = create_module(
            bind(a.clone())
                .with_dependencies([Identifier::new("missing")])
                .with_provider(|dependency: Instance| dependency),
        );

        assert!(create_container(&module).is_err());

        let config = ContainerConfig::default().with_validate_on_create(false);
        let container = module.to_container_with(config).unwrap().into_sync().unwrap();
        assert!(container.check().is_err());
        assert_eq!(
            container.get(&a).unwrap_err().to_string(),
            "Providers missing for container: missing"
        );
    }

    #[test]
    fn label_is_configurable() {
        let module = create_module(bind(Identifier::new("x")).with_instance(Instance::null()).nullable());
        let container = create_container_with(&module, ContainerConfig::default().with_label("app")).unwrap();
        assert_eq!(container.label(), "app");
    }
}
