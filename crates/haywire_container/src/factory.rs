//! Factories: modules with dependencies supplied at runtime.
//!
//! A [`Factory`] accepts a module whose dependencies are not all provided.
//! Each missing base identifier is filled in with [`Factory::register`],
//! which returns a new factory, and [`Factory::to_container`] succeeds once
//! nothing is missing.
//!
//! ```
//! use std::sync::Arc;
//! use haywire_container::prelude::*;
//!
//! struct Request(&'static str);
//! struct Handler(&'static str);
//!
//! let request = Identifier::of::<Request>();
//! let handler = Identifier::of::<Handler>();
//! let module = create_module(
//!     bind(handler.clone())
//!         .with_dependencies([request.clone()])
//!         .with_provider(|request: Arc<Request>| Instance::new(Handler(request.0))),
//! );
//!
//! let factory = module.to_factory();
//! assert_eq!(factory.missing(), vec![request.clone()]);
//! assert!(factory.to_container().is_err());
//!
//! let container = factory
//!     .register(request, Instance::new(Request("/health")))
//!     .unwrap()
//!     .to_container()
//!     .unwrap()
//!     .into_sync()
//!     .unwrap();
//! assert_eq!(container.get_as::<Handler>(&handler).unwrap().0, "/health");
//! ```

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use haywire_core::binding::{Binding, bind};
use haywire_core::error::ValidationError;
use haywire_core::identifier::Identifier;
use haywire_core::instance::Instance;
use haywire_core::module::Module;

use crate::config::ContainerConfig;
use crate::container::Container;
use crate::graph::BindingGraph;
use crate::resolver::Resolver;

/// A module plus instances registered for its missing dependencies.
///
/// Factories are persistent: [`Factory::register`] leaves the receiver
/// unchanged.
#[derive(Debug, Clone)]
pub struct Factory {
    module: Module,
    config: ContainerConfig,
    /// Missing output ids grouped by base id.
    missing: Arc<HashMap<Identifier, Vec<Identifier>>>,
    /// Base ids the module or a registration already provides.
    provided: Arc<HashSet<Identifier>>,
    registered: Arc<[Arc<Binding>]>,
    /// Module bindings plus a placeholder for every missing base.
    placeholders: Resolver,
}

impl Factory {
    /// Creates a factory for `module` with the default container configuration.
    #[must_use]
    pub fn new(module: &Module) -> Self {
        Self::with_config(module, ContainerConfig::default())
    }

    /// Creates a factory for `module`.
    #[must_use]
    pub fn with_config(module: &Module, config: ContainerConfig) -> Self {
        let mut missing: HashMap<Identifier, Vec<Identifier>> = HashMap::new();
        for id in module.missing_dependencies() {
            missing.entry(id.base_id()).or_default().push(id);
        }
        let provided = module.outputs().map(Identifier::base_id).collect();
        let placeholders = Self::placeholder_resolver(module, &missing, &config);

        Self {
            module: module.clone(),
            config,
            missing: Arc::new(missing),
            provided: Arc::new(provided),
            registered: Arc::from([]),
            placeholders,
        }
    }

    /// One placeholder per missing base, with the loosest output every
    /// missing variant accepts.
    fn placeholder_resolver(
        module: &Module,
        missing: &HashMap<Identifier, Vec<Identifier>>,
        config: &ContainerConfig,
    ) -> Resolver {
        let placeholders = missing.iter().map(|(base, variants)| {
            let mut output = base.clone();
            if variants.iter().all(Identifier::is_nullable) {
                output = output.nullable();
            }
            if variants.iter().all(Identifier::is_undefinable) {
                output = output.undefinable();
            }
            Arc::new(Binding::placeholder(output))
        });
        let graph = BindingGraph::from_bindings(module.bindings().cloned().chain(placeholders));
        Resolver::new(graph, config.clone())
    }

    /// Returns the dependencies still missing, sorted.
    #[must_use]
    pub fn missing(&self) -> Vec<Identifier> {
        let mut missing: Vec<Identifier> = self.missing.values().flatten().cloned().collect();
        missing.sort_by_cached_key(ToString::to_string);
        missing
    }

    /// Returns `true` if every dependency has been registered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Returns a factory with `instance` registered under `id`.
    ///
    /// The registration must satisfy every missing variant of its base
    /// identifier: registering a non-nullable id satisfies both `x` and
    /// `x(nullable)`, while registering `x(nullable)` cannot satisfy `x`.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::DuplicateOutput`] if the base is already provided
    /// - [`ValidationError::ProviderMissing`] naming the variants `id` cannot satisfy
    pub fn register(&self, id: Identifier, instance: Instance) -> Result<Self, ValidationError> {
        let output = id.output_id();
        let base = output.base_id();
        if self.provided.contains(&base) {
            return Err(ValidationError::duplicate_output([output]));
        }

        let satisfied = output.expand_output();
        if let Some(variants) = self.missing.get(&base) {
            let unsatisfied: Vec<Identifier> = variants
                .iter()
                .filter(|variant| !satisfied.contains(variant))
                .cloned()
                .collect();
            if !unsatisfied.is_empty() {
                return Err(ValidationError::provider_missing(unsatisfied));
            }
        }
        tracing::debug!(id = %output, "instance registered with factory");

        let mut missing = (*self.missing).clone();
        missing.remove(&base);
        let mut provided = (*self.provided).clone();
        provided.insert(base);
        let registered = self
            .registered
            .iter()
            .cloned()
            .chain([Arc::new(bind(output).with_instance(instance))])
            .collect();

        Ok(Self {
            module: self.module.clone(),
            config: self.config.clone(),
            missing: Arc::new(missing),
            provided: Arc::new(provided),
            registered,
            placeholders: self.placeholders.clone(),
        })
    }

    /// Validates the module as if every missing dependency were registered.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn check(&self) -> Result<(), ValidationError> {
        self.placeholders.check()
    }

    /// Validates and plans the module as if every missing dependency were
    /// registered.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn wire(&self) -> Result<(), ValidationError> {
        self.placeholders.wire()
    }

    /// Creates a container from the module and the registered instances.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ProviderMissing`] while anything is
    /// missing, or the container's own validation error.
    pub fn to_container(&self) -> Result<Container, ValidationError> {
        if !self.is_complete() {
            return Err(ValidationError::provider_missing(self.missing()));
        }
        let graph = BindingGraph::from_bindings(
            self.module
                .bindings()
                .cloned()
                .chain(self.registered.iter().cloned()),
        );
        Container::from_graph(graph, self.config.clone())
    }
}
