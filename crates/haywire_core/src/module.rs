//! Immutable collections of bindings.
//!
//! A [`Module`] maps every expanded output identifier of its bindings to the
//! binding providing it. Modules are persistent: adding a binding or merging
//! another module returns a new module and leaves the original untouched.
//!
//! No two bindings in a module may satisfy the same identifier. Violations
//! are reported as [`ValidationError::DuplicateOutput`] naming the base
//! identifiers involved.
//!
//! # Example
//!
//! ```
//! use haywire_core::binding::bind;
//! use haywire_core::identifier::Identifier;
//! use haywire_core::instance::Instance;
//! use haywire_core::module::Module;
//!
//! let a = Identifier::new("a");
//! let b = Identifier::new("b");
//!
//! let module = Module::from_binding(bind(a.clone()).with_generator(Instance::null).nullable())
//!     .add_binding(bind(b.clone()).with_instance(Instance::new(1_u8)))
//!     .unwrap();
//!
//! assert_eq!(module.len(), 2);
//! assert!(module.provides(&a.nullable()));
//! assert!(!module.provides(&a));
//!
//! let error = module.add_binding(bind(b).with_generator(Instance::null)).unwrap_err();
//! assert_eq!(error.to_string(), "Duplicate output identifier for module: b");
//! ```

use std::sync::Arc;

use hashbrown::HashMap;

use crate::binding::Binding;
use crate::error::ValidationError;
use crate::identifier::Identifier;

/// A validated, immutable collection of bindings.
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Expanded output identifier to the binding providing it.
    outputs: Arc<HashMap<Identifier, Arc<Binding>>>,
    /// Distinct bindings in insertion order.
    bindings: Arc<[Arc<Binding>]>,
    is_async: bool,
}

impl Module {
    /// Creates a module holding a single binding.
    #[must_use]
    pub fn from_binding(binding: Binding) -> Self {
        let binding = Arc::new(binding);
        let outputs = binding
            .expanded_outputs()
            .into_iter()
            .map(|id| (id, Arc::clone(&binding)))
            .collect();
        Self {
            outputs: Arc::new(outputs),
            is_async: binding.is_async(),
            bindings: Arc::from([binding]),
        }
    }

    /// Returns a module with `binding` added.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateOutput`] if any identifier the
    /// binding satisfies is already provided.
    pub fn add_binding(&self, binding: Binding) -> Result<Self, ValidationError> {
        self.merge_module(&Self::from_binding(binding))
    }

    /// Returns a module holding the bindings of both modules.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateOutput`] naming the base identifier
    /// of every overlapping output, each listed once.
    pub fn merge_module(&self, other: &Self) -> Result<Self, ValidationError> {
        let overlapping: Vec<Identifier> = other
            .outputs
            .keys()
            .filter(|id| self.outputs.contains_key(*id))
            .map(Identifier::base_id)
            .collect();
        if !overlapping.is_empty() {
            tracing::debug!(
                overlapping = overlapping.len(),
                "rejected module merge with duplicate outputs"
            );
            return Err(ValidationError::duplicate_output(overlapping));
        }

        let mut outputs = HashMap::with_capacity(self.outputs.len() + other.outputs.len());
        outputs.extend(
            self.outputs
                .iter()
                .chain(other.outputs.iter())
                .map(|(id, binding)| (id.clone(), Arc::clone(binding))),
        );

        Ok(Self {
            outputs: Arc::new(outputs),
            bindings: self
                .bindings
                .iter()
                .chain(other.bindings.iter())
                .cloned()
                .collect(),
            is_async: self.is_async || other.is_async,
        })
    }

    /// Returns `true` if any binding is asynchronous.
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.is_async
    }

    /// Returns the number of distinct bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if the module holds no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Iterates the distinct bindings in insertion order.
    pub fn bindings(&self) -> impl Iterator<Item = &Arc<Binding>> {
        self.bindings.iter()
    }

    /// Iterates every identifier some binding satisfies.
    pub fn outputs(&self) -> impl Iterator<Item = &Identifier> {
        self.outputs.keys()
    }

    /// Returns `true` if some binding satisfies `id`.
    ///
    /// Supplier and late binding annotations on `id` are ignored.
    #[must_use]
    pub fn provides(&self, id: &Identifier) -> bool {
        self.outputs.contains_key(&id.output_id())
    }

    /// Returns the binding satisfying `id`.
    ///
    /// Supplier and late binding annotations on `id` are ignored.
    #[must_use]
    pub fn binding_for(&self, id: &Identifier) -> Option<&Arc<Binding>> {
        self.outputs.get(&id.output_id())
    }

    /// Returns the dependencies no binding satisfies, stripped of delivery
    /// annotations and listed once each.
    #[must_use]
    pub fn missing_dependencies(&self) -> Vec<Identifier> {
        let mut missing: Vec<Identifier> = Vec::new();
        for binding in self.bindings() {
            for dependency in binding.dependency_ids() {
                let output = dependency.output_id();
                if !self.outputs.contains_key(&output) && !missing.contains(&output) {
                    missing.push(output);
                }
            }
        }
        missing
    }
}

/// Creates a module holding a single binding.
#[must_use]
pub fn create_module(binding: Binding) -> Module {
    Module::from_binding(binding)
}
