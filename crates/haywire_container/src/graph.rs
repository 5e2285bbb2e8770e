//! The binding graph a container resolves against, and its validation.
//!
//! Nodes are bindings; an edge runs from a binding to each binding that
//! satisfies one of its dependencies. Validation runs three passes in order
//! and stops at the first that fails:
//!
//! 1. every dependency has a provider
//! 2. no cycle exists, except through a late binding edge
//! 3. no synchronous supplier reaches an asynchronous provider, except
//!    through a value that is already available when the supplier is called

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use haywire_core::binding::Binding;
use haywire_core::error::{UnsafeSupplier, ValidationError};
use haywire_core::identifier::{Identifier, SupplierMode};
use haywire_core::module::Module;
use haywire_core::scope::Scope;

/// Bindings indexed by every identifier they satisfy.
#[derive(Debug, Default)]
pub(crate) struct BindingGraph {
    outputs: HashMap<Identifier, usize>,
    bindings: Vec<Arc<Binding>>,
    is_async: bool,
}

impl BindingGraph {
    pub(crate) fn from_module(module: &Module) -> Self {
        Self::from_bindings(module.bindings().cloned())
    }

    /// Builds a graph from bindings known not to overlap.
    pub(crate) fn from_bindings(bindings: impl IntoIterator<Item = Arc<Binding>>) -> Self {
        let mut graph = Self::default();
        for binding in bindings {
            let index = graph.bindings.len();
            for output in binding.expanded_outputs() {
                graph.outputs.insert(output, index);
            }
            graph.is_async |= binding.is_async();
            graph.bindings.push(binding);
        }
        graph
    }

    /// Returns the binding satisfying `id`, ignoring delivery annotations.
    pub(crate) fn lookup(&self, id: &Identifier) -> Option<&Arc<Binding>> {
        self.index_of(id).map(|index| &self.bindings[index])
    }

    pub(crate) fn bindings(&self) -> &[Arc<Binding>] {
        &self.bindings
    }

    pub(crate) fn is_async(&self) -> bool {
        self.is_async
    }

    fn index_of(&self, id: &Identifier) -> Option<usize> {
        self.outputs.get(&id.output_id()).copied()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation
    // ─────────────────────────────────────────────────────────────────────────

    /// Validates the graph.
    ///
    /// # Errors
    ///
    /// The first failing pass, as [`ValidationError::ProviderMissing`],
    /// [`ValidationError::CircularDependency`] or
    /// [`ValidationError::SyncSupplier`].
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        let missing = self.missing_dependencies();
        if !missing.is_empty() {
            return Err(ValidationError::provider_missing(missing));
        }

        let cycles = self.cycles();
        if !cycles.is_empty() {
            return Err(ValidationError::circular_dependency(cycles));
        }

        let unsafe_suppliers = self.unsafe_suppliers();
        if !unsafe_suppliers.is_empty() {
            return Err(ValidationError::sync_supplier(unsafe_suppliers));
        }

        Ok(())
    }

    fn missing_dependencies(&self) -> Vec<Identifier> {
        self.bindings
            .iter()
            .flat_map(|binding| binding.dependency_ids())
            .filter(|dependency| self.index_of(dependency).is_none())
            .map(Identifier::output_id)
            .collect()
    }

    /// Enumerates every simple cycle, each as the output ids of its members.
    ///
    /// Late binding edges are left out; supplier edges are kept.
    fn cycles(&self) -> Vec<Vec<Identifier>> {
        let adjacency: Vec<Vec<usize>> = self
            .bindings
            .iter()
            .map(|binding| {
                binding
                    .dependency_ids()
                    .iter()
                    .filter(|dependency| !dependency.is_late_binding())
                    .filter_map(|dependency| self.index_of(dependency))
                    .collect()
            })
            .collect();

        let mut found = Vec::new();
        let mut on_path = vec![false; self.bindings.len()];
        for start in 0..self.bindings.len() {
            let mut path = vec![start];
            on_path[start] = true;
            self.walk_cycles(start, start, &adjacency, &mut path, &mut on_path, &mut found);
            on_path[start] = false;
        }
        found
    }

    /// Depth-first walk restricted to nodes numbered at least `start`, so each
    /// cycle is reported from its lowest member only.
    fn walk_cycles(
        &self,
        start: usize,
        node: usize,
        adjacency: &[Vec<usize>],
        path: &mut Vec<usize>,
        on_path: &mut [bool],
        found: &mut Vec<Vec<Identifier>>,
    ) {
        for &next in &adjacency[node] {
            if next == start {
                found.push(
                    path.iter()
                        .map(|&index| self.bindings[index].output_id().clone())
                        .collect(),
                );
            } else if next > start && !on_path[next] {
                on_path[next] = true;
                path.push(next);
                self.walk_cycles(start, next, adjacency, path, on_path, found);
                path.pop();
                on_path[next] = false;
            }
        }
    }

    /// Finds `supplier(sync)` dependencies whose target may need to await.
    fn unsafe_suppliers(&self) -> Vec<UnsafeSupplier> {
        let mut found = Vec::new();
        for binding in &self.bindings {
            for dependency in binding.dependency_ids() {
                let SupplierMode::Sync { propagate_scope } = dependency.supplier_mode() else {
                    continue;
                };
                let Some(target) = self.index_of(dependency) else {
                    continue;
                };
                if self.reaches_async(target, propagate_scope) {
                    found.push(UnsafeSupplier {
                        binding_output_id: binding.output_id().clone(),
                        supplier_id: dependency.clone(),
                    });
                }
            }
        }
        found
    }

    /// Returns `true` if resolving `root` synchronously could hit an async
    /// provider.
    ///
    /// Optimistic singletons are always preloaded and act as walls. Optimistic
    /// request values are walls only when the supplier shares the caller's
    /// request, which already created them. Nested suppliers are their own
    /// problem and are checked where they are declared.
    fn reaches_async(&self, root: usize, propagate_scope: bool) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            if !visited.insert(index) {
                continue;
            }
            let binding = &self.bindings[index];
            match binding.scope() {
                Scope::OptimisticSingleton => continue,
                Scope::OptimisticRequest if propagate_scope => continue,
                _ => {}
            }
            if binding.is_async() {
                return true;
            }
            stack.extend(
                binding
                    .dependency_ids()
                    .iter()
                    .filter(|dependency| !dependency.supplier_mode().is_supplier())
                    .filter_map(|dependency| self.index_of(dependency)),
            );
        }
        false
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Planning
    // ─────────────────────────────────────────────────────────────────────────

    /// Optimistic request bindings a request for `root` must create up front.
    ///
    /// Follows plain, late binding and scope-propagating supplier edges, since
    /// all of those share the request. Suppliers that open a fresh request are
    /// not followed.
    pub(crate) fn optimistic_requests(&self, root: &Binding) -> Vec<Arc<Binding>> {
        let mut visited: HashSet<usize> = HashSet::new();
        let mut planned = Vec::new();
        let mut stack: Vec<usize> = self.request_edges(root).collect();
        while let Some(index) = stack.pop() {
            if !visited.insert(index) {
                continue;
            }
            let binding = &self.bindings[index];
            if binding.scope() == Scope::OptimisticRequest {
                planned.push(Arc::clone(binding));
            }
            stack.extend(self.request_edges(binding));
        }
        planned
    }

    fn request_edges<'a>(&'a self, binding: &'a Binding) -> impl Iterator<Item = usize> + 'a {
        binding
            .dependency_ids()
            .iter()
            .filter(|dependency| match dependency.supplier_mode() {
                SupplierMode::None => true,
                mode => mode.propagates_scope(),
            })
            .filter_map(|dependency| self.index_of(dependency))
    }
}
