//! Lifetime scope tests.
//!
//! Covers how often providers run and which instances are shared for each
//! [`Scope`]: per edge, per container, per request and per supplier
//! invocation, plus the eager optimistic variants.

mod test_utils;

use std::sync::Arc;

use haywire_container::prelude::*;
use test_utils::{Calls, counting, failing, serial, sync_container};

/// A value holding the instance it was built from.
struct Wrapper(Instance);

/// A value holding two dependencies.
struct Pair(Instance, Instance);

fn wrap(id: &Identifier, dependency: &Identifier) -> Binding {
    bind(id.clone())
        .with_dependencies([dependency.clone()])
        .with_provider(|inner: Instance| Instance::new(Wrapper(inner)))
}

fn pair(id: &Identifier, left: &Identifier, right: &Identifier) -> Binding {
    bind(id.clone())
        .with_dependencies([left.clone(), right.clone()])
        .with_provider(|left: Instance, right: Instance| Instance::new(Pair(left, right)))
}

fn unwrap_pair(instance: &Instance) -> (&Instance, &Instance) {
    let pair = instance.downcast_ref::<Pair>().expect("expected a Pair");
    (&pair.0, &pair.1)
}

fn unwrap_wrapper(instance: &Instance) -> &Instance {
    &instance.downcast_ref::<Wrapper>().expect("expected a Wrapper").0
}

fn ids<const N: usize>(labels: [&str; N]) -> [Identifier; N] {
    labels.map(Identifier::new)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSIENT AND SINGLETON
// ═══════════════════════════════════════════════════════════════════════════════

/// Verifies that a transient dependency is created once per edge.
#[test]
fn transient_is_created_per_edge() {
    let [root, value] = ids(["root", "value"]);
    let calls = Calls::default();
    let container = sync_container([pair(&root, &value, &value), counting(&value, &calls)]);

    let resolved = container.get(&root).unwrap();
    let (left, right) = unwrap_pair(&resolved);

    assert_ne!(serial(left), serial(right));
    assert_eq!(calls.count(), 2);
}

/// Verifies that a singleton reached through two paths is one instance, and
/// stays the same across requests while its consumers do not.
#[test]
fn singleton_is_shared_across_paths_and_requests() {
    let [a, b, c, d] = ids(["a", "b", "c", "d"]);
    let calls = Calls::default();
    let container = sync_container([
        pair(&a, &b, &c),
        wrap(&b, &d),
        wrap(&c, &d),
        counting(&d, &calls).scoped(Scope::Singleton),
    ]);

    let first = container.get(&a).unwrap();
    let (b1, c1) = unwrap_pair(&first);
    assert!(unwrap_wrapper(b1).ptr_eq(unwrap_wrapper(c1)));

    let second = container.get(&a).unwrap();
    let (b2, _) = unwrap_pair(&second);
    assert!(unwrap_wrapper(b1).ptr_eq(unwrap_wrapper(b2)));
    assert!(!first.ptr_eq(&second));
    assert_eq!(calls.count(), 1);
}

/// Verifies that a singleton failure is not cached.
#[test]
fn singleton_failure_is_retried() {
    let id = Identifier::new("flaky");
    let calls = Calls::default();
    let provider_calls = calls.clone();
    let container = sync_container([bind(id.clone())
        .with_generator(move || {
            if provider_calls.bump() == 1 {
                Err(ProviderError::msg("first call fails"))
            } else {
                Ok(Instance::new(1_u8))
            }
        })
        .scoped(Scope::Singleton)]);

    assert!(container.get(&id).is_err());
    let value = container.get(&id).unwrap();
    assert!(value.ptr_eq(&container.get(&id).unwrap()));
    assert_eq!(calls.count(), 2);
}

// ═══════════════════════════════════════════════════════════════════════════════
// REQUEST AND SUPPLIER
// ═══════════════════════════════════════════════════════════════════════════════

/// Verifies that a request-scoped value is shared within one request only.
#[test]
fn request_scope_is_per_request() {
    let [root, value] = ids(["root", "value"]);
    let calls = Calls::default();
    let container = sync_container([
        pair(&root, &value, &value),
        counting(&value, &calls).scoped(Scope::Request),
    ]);

    let first = container.get(&root).unwrap();
    let (left, right) = unwrap_pair(&first);
    assert!(left.ptr_eq(right));

    let second = container.get(&root).unwrap();
    assert!(!unwrap_pair(&second).0.ptr_eq(left));
    assert_eq!(calls.count(), 2);
}

/// Verifies that a supplier-scoped value is shared within one supplier call
/// and recreated by the next.
#[test]
fn supplier_scope_is_per_invocation() {
    let [root, target, value] = ids(["root", "target", "value"]);
    let calls = Calls::default();
    let container = sync_container([
        bind(root.clone())
            .with_dependencies([target.sync_supplier(false)])
            .with_provider(|supplier: Supplier| Instance::new(supplier)),
        pair(&target, &value, &value),
        counting(&value, &calls).scoped(Scope::Supplier),
    ]);

    let root_instance = container.get(&root).unwrap();
    let supplier = root_instance.downcast_ref::<Supplier>().unwrap();
    assert_eq!(calls.count(), 0);

    let first = supplier.get().unwrap();
    let (left, right) = unwrap_pair(&first);
    assert!(left.ptr_eq(right));

    let second = supplier.get().unwrap();
    assert!(!unwrap_pair(&second).0.ptr_eq(left));
    assert_eq!(calls.count(), 2);
}

/// Verifies that a propagating supplier shares the caller's request scope and
/// a non-propagating one does not.
#[test]
fn supplier_scope_propagation() {
    let [root, value] = ids(["root", "value"]);
    let calls = Calls::default();
    let container = sync_container([
        bind(root.clone())
            .with_dependencies([
                value.clone(),
                value.sync_supplier(true),
                value.sync_supplier(false),
            ])
            .with_provider(|value: Instance, shared: Supplier, fresh: Supplier| {
                Instance::new((value, shared, fresh))
            }),
        counting(&value, &calls).scoped(Scope::Request),
    ]);

    let resolved = container.get(&root).unwrap();
    let (value, shared, fresh) = resolved
        .downcast_ref::<(Instance, Supplier, Supplier)>()
        .unwrap();

    assert!(shared.get().unwrap().ptr_eq(value));
    assert!(!fresh.get().unwrap().ptr_eq(value));
    assert_eq!(calls.count(), 2);
}

/// Verifies that typed supplier access downcasts the supplied value.
#[test]
fn supplier_get_as_downcasts() {
    let [root, value] = ids(["root", "value"]);
    let calls = Calls::default();
    let container = sync_container([
        bind(root.clone())
            .with_dependencies([value.sync_supplier(false)])
            .with_provider(|supplier: Supplier| Instance::new(supplier)),
        counting(&value, &calls),
    ]);

    let supplier = container.get_as::<Supplier>(&root).unwrap();
    let first: Arc<test_utils::Serial> = supplier.get_as().unwrap();
    let second: Arc<test_utils::Serial> = supplier.get_as().unwrap();
    assert_eq!((first.0, second.0), (1, 2));
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIMISTIC SCOPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Verifies that optimistic singletons are created by the first request even
/// when it does not need them.
#[test]
fn optimistic_singletons_load_on_first_request() {
    let [root, eager] = ids(["root", "eager"]);
    let calls = Calls::default();
    let container = sync_container([
        bind(root.clone()).with_instance(Instance::new(0_u8)),
        counting(&eager, &calls).scoped(Scope::OptimisticSingleton),
    ]);
    assert_eq!(calls.count(), 0);

    container.get(&root).unwrap();
    assert_eq!(calls.count(), 1);

    container.get(&eager).unwrap();
    container.get(&root).unwrap();
    assert_eq!(calls.count(), 1);
}

/// Verifies that explicit preloading creates optimistic singletons once.
#[test]
fn preload_creates_optimistic_singletons() {
    let eager = Identifier::new("eager");
    let calls = Calls::default();
    let container = sync_container([counting(&eager, &calls).scoped(Scope::OptimisticSingleton)]);

    container.preload().unwrap();
    container.preload().unwrap();
    assert_eq!(calls.count(), 1);
    assert_eq!(serial(&container.get(&eager).unwrap()), 1);
}

/// Verifies that wiring a synchronous container creates its optimistic
/// singletons and leaves lazy singletons alone.
#[test]
fn wire_creates_optimistic_singletons() {
    let [eager, lazy] = ids(["eager", "lazy"]);
    let eager_calls = Calls::default();
    let lazy_calls = Calls::default();
    let container = sync_container([
        counting(&eager, &eager_calls).scoped(Scope::OptimisticSingleton),
        counting(&lazy, &lazy_calls).scoped(Scope::Singleton),
    ]);

    container.wire().unwrap();
    assert_eq!(eager_calls.count(), 1);
    assert_eq!(lazy_calls.count(), 0);

    container.get(&eager).unwrap();
    assert_eq!(eager_calls.count(), 1);
}

/// Verifies that a failed preload during wiring is reported and retried.
#[test]
fn wire_reports_preload_failure() {
    let eager = Identifier::new("eager");
    let container = sync_container([failing(&eager, "offline").scoped(Scope::OptimisticSingleton)]);

    assert_eq!(container.wire().unwrap_err().to_string(), "offline");
    assert_eq!(container.wire().unwrap_err().to_string(), "offline");
}

/// Verifies that the container enum preloads without picking a flavor first.
#[test]
fn container_preload_passes_through() {
    let eager = Identifier::new("eager");
    let calls = Calls::default();
    let container: Container =
        sync_container([counting(&eager, &calls).scoped(Scope::OptimisticSingleton)]).into();

    container.preload().unwrap();
    container.wire().unwrap();
    assert_eq!(calls.count(), 1);
}

/// Verifies that instance bindings default to optimistic singletons.
#[test]
fn instance_bindings_are_shared() {
    let id = Identifier::new("constant");
    let container = sync_container([bind(id.clone()).with_instance(Instance::new(5_u8))]);

    assert!(container.get(&id).unwrap().ptr_eq(&container.get(&id).unwrap()));
}

/// Verifies that optimistic request values reachable from the target are
/// created when the request starts, and unreachable ones are not.
#[test]
fn optimistic_request_created_only_when_reachable() {
    let [root, reachable, unreachable] = ids(["root", "reachable", "unreachable"]);
    let reachable_calls = Calls::default();
    let unreachable_calls = Calls::default();
    let container = sync_container([
        bind(root.clone())
            .with_dependencies([reachable.sync_supplier(true)])
            .with_provider(|supplier: Supplier| Instance::new(supplier)),
        counting(&reachable, &reachable_calls).scoped(Scope::OptimisticRequest),
        counting(&unreachable, &unreachable_calls).scoped(Scope::OptimisticRequest),
    ]);

    let resolved = container.get(&root).unwrap();
    assert_eq!(reachable_calls.count(), 1);
    assert_eq!(unreachable_calls.count(), 0);

    // The supplier shares the request, so it sees the eager value.
    let supplier = resolved.downcast_ref::<Supplier>().unwrap();
    assert_eq!(serial(&supplier.get().unwrap()), 1);
    assert_eq!(reachable_calls.count(), 1);
}
