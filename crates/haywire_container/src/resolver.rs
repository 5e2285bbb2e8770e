//! The resolution engine shared by every container flavor.
//!
//! A [`Resolver`] owns the binding graph and the singleton cache. Each
//! top-level request opens a [`RequestScope`] holding the request cache, the
//! supplier cache and the queue of late bindings waiting to be filled.
//!
//! A request runs in four steps:
//!
//! 1. validate the graph (once per container)
//! 2. preload every optimistic singleton (until it succeeds once)
//! 3. create the optimistic request values reachable from the target
//! 4. resolve the target, then fill late bindings until none are left
//!
//! Supplier invocations repeat steps 3 and 4 for their own target. Whether
//! they share the caller's request cache depends on the supplier's
//! `propagate_scope` flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use futures::future::{self, BoxFuture, join_all};
use futures::{FutureExt, TryFutureExt};
use hashbrown::HashMap;
use haywire_core::binding::{Binding, Provider};
use haywire_core::error::{ResolveError, ValidationError};
use haywire_core::identifier::{Identifier, SupplierMode};
use haywire_core::instance::Instance;
use haywire_core::provider::{
    AsyncSupplier, Dependency, LateBinding, LateBindingResolver, ResolveResult, Supplier,
};
use haywire_core::scope::Scope;
use parking_lot::Mutex;
use tracing::Instrument;

use crate::cache::ScopeCache;
use crate::config::ContainerConfig;
use crate::graph::BindingGraph;

// ─────────────────────────────────────────────────────────────────────────────
// Request scope
// ─────────────────────────────────────────────────────────────────────────────

/// Late bindings handed out during one request and not yet filled.
#[derive(Default)]
struct LateQueue {
    /// One handle per target, so cyclic late bindings terminate.
    handles: Mutex<HashMap<Identifier, LateBinding>>,
    pending: Mutex<Vec<(Identifier, LateBindingResolver)>>,
    /// Singletons created during the request, dropped again if a late
    /// binding fails.
    created_singletons: Mutex<Vec<Identifier>>,
}

impl LateQueue {
    fn handle(&self, target: Identifier) -> LateBinding {
        let mut handles = self.handles.lock();
        if let Some(handle) = handles.get(&target) {
            return handle.clone();
        }
        let (handle, resolver) = LateBinding::pending(target.clone());
        self.pending.lock().push((target.clone(), resolver));
        handles.insert(target, handle.clone());
        handle
    }

    fn take_pending(&self) -> Vec<(Identifier, LateBindingResolver)> {
        core::mem::take(&mut *self.pending.lock())
    }

    fn record_singleton(&self, key: Identifier) {
        self.created_singletons.lock().push(key);
    }

    fn take_singletons(&self) -> Vec<Identifier> {
        core::mem::take(&mut *self.created_singletons.lock())
    }
}

/// Caches visible to one request or supplier invocation.
#[derive(Clone)]
struct RequestScope {
    request: Arc<ScopeCache>,
    supplier: Arc<ScopeCache>,
    late: Arc<LateQueue>,
}

impl RequestScope {
    fn root() -> Self {
        Self::invocation(None)
    }

    /// A supplier invocation, sharing `request` when the supplier propagates
    /// its caller's scope.
    fn invocation(request: Option<Arc<ScopeCache>>) -> Self {
        Self {
            request: request.unwrap_or_else(ScopeCache::new),
            supplier: ScopeCache::new(),
            late: Arc::new(LateQueue::default()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolver
// ─────────────────────────────────────────────────────────────────────────────

struct Inner {
    graph: BindingGraph,
    config: ContainerConfig,
    singletons: Arc<ScopeCache>,
    validation: OnceLock<Result<(), ValidationError>>,
    preloaded: AtomicBool,
    /// Optimistic request bindings to create per requested binding.
    plans: Mutex<HashMap<Identifier, Arc<[Arc<Binding>]>>>,
}

/// Resolves identifiers against a binding graph.
///
/// Cheap to clone; clones share every cache.
#[derive(Clone)]
pub(crate) struct Resolver {
    inner: Arc<Inner>,
}

impl Resolver {
    pub(crate) fn new(graph: BindingGraph, config: ContainerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                graph,
                config,
                singletons: ScopeCache::new(),
                validation: OnceLock::new(),
                preloaded: AtomicBool::new(false),
                plans: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn upgrade(inner: &Weak<Inner>, id: &Identifier) -> ResolveResult<Self> {
        inner
            .upgrade()
            .map(|inner| Self { inner })
            .ok_or_else(|| ResolveError::ContainerDropped { id: id.clone() })
    }

    pub(crate) fn is_async(&self) -> bool {
        self.inner.graph.is_async()
    }

    pub(crate) fn label(&self) -> &str {
        self.inner.config.label()
    }

    pub(crate) fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation and planning
    // ─────────────────────────────────────────────────────────────────────────

    /// Validates the graph; the result is computed once and then reused.
    pub(crate) fn check(&self) -> Result<(), ValidationError> {
        self.inner
            .validation
            .get_or_init(|| {
                let outcome = self.inner.graph.validate();
                match &outcome {
                    Ok(()) => tracing::debug!(
                        container = %self.label(),
                        bindings = self.inner.graph.bindings().len(),
                        "container validated"
                    ),
                    Err(error) => tracing::warn!(
                        container = %self.label(),
                        %error,
                        "container failed validation"
                    ),
                }
                outcome
            })
            .clone()
    }

    /// Validates the graph and computes the request plan of every binding.
    pub(crate) fn wire(&self) -> Result<(), ValidationError> {
        self.check()?;
        for binding in self.inner.graph.bindings() {
            self.plan(binding);
        }
        Ok(())
    }

    fn plan(&self, binding: &Binding) -> Arc<[Arc<Binding>]> {
        if let Some(plan) = self.inner.plans.lock().get(binding.output_id()) {
            return Arc::clone(plan);
        }
        let plan: Arc<[Arc<Binding>]> = self.inner.graph.optimistic_requests(binding).into();
        self.inner
            .plans
            .lock()
            .entry(binding.output_id().clone())
            .or_insert(plan)
            .clone()
    }

    fn lookup(&self, id: &Identifier) -> ResolveResult<Arc<Binding>> {
        self.inner
            .graph
            .lookup(id)
            .cloned()
            .ok_or_else(|| ValidationError::provider_missing([id.output_id()]).into())
    }

    fn optimistic_singletons(&self) -> Vec<Arc<Binding>> {
        self.inner
            .graph
            .bindings()
            .iter()
            .filter(|binding| binding.scope() == Scope::OptimisticSingleton)
            .cloned()
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Top-level requests
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolves `id` without awaiting.
    pub(crate) fn get(&self, id: &Identifier) -> ResolveResult {
        let _span = tracing::debug_span!("haywire.request", container = %self.label(), %id).entered();
        self.check()?;
        self.preload()?;
        let binding = self.lookup(id)?;
        self.run(&binding, &RequestScope::root())
            .inspect_err(|error| tracing::debug!(%error, "request failed"))
    }

    /// Resolves `id`.
    pub(crate) async fn get_async(&self, id: &Identifier) -> ResolveResult {
        let span = tracing::debug_span!("haywire.request", container = %self.label(), %id);
        async {
            self.check()?;
            self.preload_async().await?;
            let binding = self.lookup(id)?;
            self.run_async(binding, RequestScope::root())
                .await
                .inspect_err(|error| tracing::debug!(%error, "request failed"))
        }
        .instrument(span)
        .await
    }

    /// Instantiates every optimistic singleton without awaiting.
    ///
    /// Succeeds once; later calls return immediately. A failed preload is
    /// retried by the next call.
    pub(crate) fn preload(&self) -> ResolveResult<()> {
        if self.inner.preloaded.load(Ordering::Acquire) {
            return Ok(());
        }
        self.check()?;
        let optimistic = self.optimistic_singletons();
        tracing::debug!(count = optimistic.len(), "preloading optimistic singletons");

        let scope = RequestScope::root();
        ResolveError::settle(
            optimistic
                .iter()
                .map(|binding| self.resolve_binding(binding, &scope)),
        )?;
        self.drain_late(&scope)?;
        self.inner.preloaded.store(true, Ordering::Release);
        Ok(())
    }

    /// Instantiates every optimistic singleton.
    pub(crate) async fn preload_async(&self) -> ResolveResult<()> {
        if self.inner.preloaded.load(Ordering::Acquire) {
            return Ok(());
        }
        self.check()?;
        let optimistic = self.optimistic_singletons();
        tracing::debug!(count = optimistic.len(), "preloading optimistic singletons");

        let scope = RequestScope::root();
        ResolveError::settle(
            join_all(
                optimistic
                    .iter()
                    .map(|binding| self.resolve_binding_async(binding, &scope)),
            )
            .await,
        )?;
        self.drain_late_async(&scope).await?;
        self.inner.preloaded.store(true, Ordering::Release);
        Ok(())
    }

    /// Creates the planned optimistic request values, the target, then fills
    /// late bindings.
    fn run(&self, binding: &Arc<Binding>, scope: &RequestScope) -> ResolveResult {
        let plan = self.plan(binding);
        ResolveError::settle(plan.iter().map(|planned| self.resolve_binding(planned, scope)))?;
        let instance = self.resolve_binding(binding, scope)?;
        self.drain_late(scope)?;
        Ok(instance)
    }

    async fn run_async(&self, binding: Arc<Binding>, scope: RequestScope) -> ResolveResult {
        let plan = self.plan(&binding);
        ResolveError::settle(
            join_all(
                plan.iter()
                    .map(|planned| self.resolve_binding_async(planned, &scope)),
            )
            .await,
        )?;
        let instance = self.resolve_binding_async(&binding, &scope).await?;
        self.drain_late_async(&scope).await?;
        Ok(instance)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Late bindings
    // ─────────────────────────────────────────────────────────────────────────

    /// Fills queued late bindings in waves until the queue stays empty.
    fn drain_late(&self, scope: &RequestScope) -> ResolveResult<()> {
        let mut failures = Vec::new();
        loop {
            let wave = scope.late.take_pending();
            if wave.is_empty() {
                break;
            }
            for (target, resolver) in wave {
                let outcome = self.resolve_dependency(&target, scope);
                if let Err(error) = &outcome {
                    failures.push(error.clone());
                }
                resolver.resolve(outcome);
            }
        }
        self.finish_late(scope, failures)
    }

    async fn drain_late_async(&self, scope: &RequestScope) -> ResolveResult<()> {
        let mut failures = Vec::new();
        loop {
            let wave = scope.late.take_pending();
            if wave.is_empty() {
                break;
            }
            let outcomes = join_all(wave.into_iter().map(|(target, resolver)| {
                let resolution = self.resolve_dependency_async(&target, scope);
                async move {
                    let outcome = resolution.await;
                    resolver.resolve(outcome.clone());
                    outcome
                }
            }))
            .await;
            failures.extend(outcomes.into_iter().filter_map(Result::err));
        }
        self.finish_late(scope, failures)
    }

    /// A failed late binding leaves its consumers broken, so singletons the
    /// request created are dropped rather than kept holding a failed handle.
    fn finish_late(&self, scope: &RequestScope, failures: Vec<ResolveError>) -> ResolveResult<()> {
        let created = scope.late.take_singletons();
        if failures.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            failures = failures.len(),
            evicted = created.len(),
            "late binding failed, evicting singletons created by the request"
        );
        for key in &created {
            self.inner.singletons.evict(key);
        }
        Err(ResolveError::from_failures(failures))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dependencies
    // ─────────────────────────────────────────────────────────────────────────

    /// Builds the dependency for late binding and supplier edges, which never
    /// need their target resolved up front.
    fn deliver(&self, id: &Identifier, scope: &RequestScope) -> Option<Dependency> {
        if id.is_late_binding() {
            return Some(Dependency::LateBinding(
                scope.late.handle(id.no_late_binding()),
            ));
        }
        let shared_request = |propagate: bool| propagate.then(|| Arc::clone(&scope.request));
        match id.supplier_mode() {
            SupplierMode::None => None,
            SupplierMode::Sync { propagate_scope } => Some(Dependency::Supplier(
                self.supplier(id.no_supplier(), shared_request(propagate_scope)),
            )),
            SupplierMode::Async { propagate_scope } => Some(Dependency::AsyncSupplier(
                self.async_supplier(id.no_supplier(), shared_request(propagate_scope)),
            )),
        }
    }

    fn supplier(&self, target: Identifier, request: Option<Arc<ScopeCache>>) -> Supplier {
        let inner = Arc::downgrade(&self.inner);
        Supplier::new(move || {
            let resolver = Self::upgrade(&inner, &target)?;
            let _span = tracing::trace_span!("haywire.supplier", id = %target).entered();
            let binding = resolver.lookup(&target)?;
            resolver.run(&binding, &RequestScope::invocation(request.clone()))
        })
    }

    fn async_supplier(&self, target: Identifier, request: Option<Arc<ScopeCache>>) -> AsyncSupplier {
        let inner = Arc::downgrade(&self.inner);
        AsyncSupplier::new(move || {
            let span = tracing::trace_span!("haywire.supplier", id = %target);
            let resolver = Self::upgrade(&inner, &target);
            let target = target.clone();
            let request = request.clone();
            async move {
                let resolver = resolver?;
                let binding = resolver.lookup(&target)?;
                resolver
                    .run_async(binding, RequestScope::invocation(request))
                    .await
            }
            .instrument(span)
            .boxed()
        })
    }

    fn resolve_dependency(&self, id: &Identifier, scope: &RequestScope) -> ResolveResult<Dependency> {
        if let Some(dependency) = self.deliver(id, scope) {
            return Ok(dependency);
        }
        let binding = self.lookup(id)?;
        self.resolve_binding(&binding, scope)
            .map(Dependency::Instance)
    }

    fn resolve_dependency_async(
        &self,
        id: &Identifier,
        scope: &RequestScope,
    ) -> BoxFuture<'static, ResolveResult<Dependency>> {
        if let Some(dependency) = self.deliver(id, scope) {
            return future::ready(Ok(dependency)).boxed();
        }
        match self.lookup(id) {
            Ok(binding) => self
                .resolve_binding_async(&binding, scope)
                .map_ok(Dependency::Instance)
                .boxed(),
            Err(error) => future::ready(Err(error)).boxed(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scopes
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_binding(&self, binding: &Arc<Binding>, scope: &RequestScope) -> ResolveResult {
        let key = binding.output_id();
        match binding.scope() {
            Scope::Transient => self.instantiate(binding, scope),
            kind if kind.is_singleton() => {
                self.inner.singletons.get_or_resolve(key, || {
                    let instance = self.instantiate(binding, scope)?;
                    scope.late.record_singleton(key.clone());
                    Ok(instance)
                })
            }
            Scope::Supplier => scope
                .supplier
                .get_or_resolve(key, || self.instantiate(binding, scope)),
            _ => scope
                .request
                .get_or_resolve(key, || self.instantiate(binding, scope)),
        }
    }

    fn resolve_binding_async(
        &self,
        binding: &Arc<Binding>,
        scope: &RequestScope,
    ) -> BoxFuture<'static, ResolveResult> {
        let key = binding.output_id();
        let instantiate = || self.instantiate_async(Arc::clone(binding), scope.clone());
        match binding.scope() {
            Scope::Transient => instantiate(),
            kind if kind.is_singleton() => {
                self.inner.singletons.get_or_spawn(key, || {
                    let instantiating = instantiate();
                    let late = Arc::clone(&scope.late);
                    let key = key.clone();
                    async move {
                        let instance = instantiating.await?;
                        late.record_singleton(key);
                        Ok(instance)
                    }
                    .boxed()
                })
            }
            Scope::Supplier => scope.supplier.get_or_spawn(key, instantiate),
            _ => scope.request.get_or_spawn(key, instantiate),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Providers
    // ─────────────────────────────────────────────────────────────────────────

    fn instantiate(&self, binding: &Binding, scope: &RequestScope) -> ResolveResult {
        let instance = match binding.provider() {
            Provider::Instance(instance) => instance.clone(),
            Provider::Placeholder => return Err(binding.missing_error().into()),
            Provider::Async(_) => {
                return Err(ResolveError::AsyncInSyncContext {
                    output_id: binding.output_id().clone(),
                });
            }
            Provider::Sync(provider) => {
                let dependencies = ResolveError::settle(
                    binding
                        .dependency_ids()
                        .iter()
                        .map(|id| self.resolve_dependency(id, scope)),
                )?;
                provider(dependencies).inspect_err(|error| trace_failure(binding, error))?
            }
        };
        binding.validate_instance(instance)
    }

    /// Builds the future lazily: nothing is resolved until it is first polled.
    fn instantiate_async(
        &self,
        binding: Arc<Binding>,
        scope: RequestScope,
    ) -> BoxFuture<'static, ResolveResult> {
        let resolver = self.clone();
        async move {
            let instance = match binding.provider() {
                Provider::Instance(instance) => instance.clone(),
                Provider::Placeholder => return Err(binding.missing_error().into()),
                Provider::Sync(provider) => {
                    provider(resolver.dependencies_async(&binding, &scope).await?)
                        .inspect_err(|error| trace_failure(&binding, error))?
                }
                Provider::Async(provider) => {
                    provider(resolver.dependencies_async(&binding, &scope).await?)?
                        .await
                        .inspect_err(|error| trace_failure(&binding, error))?
                }
            };
            binding.validate_instance(instance)
        }
        .boxed()
    }

    async fn dependencies_async(
        &self,
        binding: &Binding,
        scope: &RequestScope,
    ) -> ResolveResult<Vec<Dependency>> {
        let resolutions: Vec<_> = binding
            .dependency_ids()
            .iter()
            .map(|id| self.resolve_dependency_async(id, scope))
            .collect();
        ResolveError::settle(join_all(resolutions).await)
    }
}

impl core::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Resolver")
            .field("label", &self.label())
            .field("bindings", &self.inner.graph.bindings().len())
            .field("is_async", &self.is_async())
            .finish_non_exhaustive()
    }
}

fn trace_failure(binding: &Binding, error: &ResolveError) {
    tracing::trace!(
        id = %binding.output_id(),
        scope = %binding.scope(),
        %error,
        "provider failed"
    );
}

/// Returns the value of an instance as `T`.
pub(crate) fn downcast<T: core::any::Any + Send + Sync>(instance: &Instance) -> ResolveResult<Arc<T>> {
    instance.downcast::<T>().ok_or_else(|| ResolveError::Injection {
        index: 0,
        expected: core::any::type_name::<T>(),
        found: instance.type_name(),
    })
}
