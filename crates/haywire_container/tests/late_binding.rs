//! Late binding tests.
//!
//! A late binding hands its consumer a handle that is filled once the
//! consumer exists, which is what lets two bindings depend on each other.

mod test_utils;

use haywire_container::prelude::*;
use test_utils::{Calls, async_container, counting, counting_async, failing, serial, sync_container};

/// Holds a late handle to its partner.
struct Node {
    partner: LateBinding,
}

fn late_node(id: &Identifier, partner: &Identifier) -> Binding {
    bind(id.clone())
        .with_dependencies([partner.late_binding()])
        .with_provider(|partner: LateBinding| Instance::new(Node { partner }))
}

fn eager_node(id: &Identifier, partner: &Identifier) -> Binding {
    bind(id.clone())
        .with_dependencies([partner.clone()])
        .with_provider(|partner: Instance| Instance::new(partner))
}

fn filled(late: &LateBinding) -> Instance {
    match late.try_get() {
        Some(Ok(Dependency::Instance(instance))) => instance,
        other => panic!("late binding not filled with an instance: {other:?}"),
    }
}

/// Verifies that a late binding is filled by the time the request returns.
#[test]
fn late_binding_filled_after_request() {
    let [a, b] = ["a", "b"].map(Identifier::new);
    let calls = Calls::default();
    let container = sync_container([late_node(&a, &b), counting(&b, &calls)]);

    let resolved = container.get_as::<Node>(&a).unwrap();
    assert_eq!(resolved.partner.id(), &b);
    assert_eq!(serial(&filled(&resolved.partner)), 1);
}

/// Verifies that a cycle through a late binding resolves and terminates.
#[test]
fn mutual_dependency_through_late_binding() {
    let [a, b] = ["a", "b"].map(Identifier::new);
    let container = sync_container([late_node(&a, &b), eager_node(&b, &a)]);

    let resolved = container.get_as::<Node>(&a).unwrap();
    let partner = filled(&resolved.partner);
    let inner = partner
        .downcast_ref::<Instance>()
        .and_then(|inner| inner.downcast_ref::<Node>())
        .expect("partner should wrap another node");

    // Every handle for `b` within one request is the same handle.
    assert!(filled(&inner.partner).ptr_eq(&partner));
}

/// Verifies that singleton cycles through a late binding close on themselves.
#[test]
fn singleton_cycle_through_late_binding() {
    let [a, b] = ["a", "b"].map(Identifier::new);
    let container = sync_container([
        late_node(&a, &b).scoped(Scope::Singleton),
        eager_node(&b, &a).scoped(Scope::Singleton),
    ]);

    let a_instance = container.get(&a).unwrap();
    let b_instance = filled(&a_instance.downcast_ref::<Node>().unwrap().partner);
    let back = b_instance.downcast_ref::<Instance>().unwrap();
    assert!(back.ptr_eq(&a_instance));
}

/// Verifies that a late binding may deliver a supplier.
#[test]
fn late_binding_to_supplier() {
    let [a, b] = ["a", "b"].map(Identifier::new);
    let calls = Calls::default();
    let container = sync_container([
        bind(a.clone())
            .with_dependencies([b.sync_supplier(false).late_binding()])
            .with_provider(|partner: LateBinding| Instance::new(Node { partner })),
        counting(&b, &calls),
    ]);

    let resolved = container.get_as::<Node>(&a).unwrap();
    let Some(Ok(Dependency::Supplier(supplier))) = resolved.partner.try_get() else {
        panic!("expected a supplier");
    };
    assert_eq!(serial(&supplier.get().unwrap()), 1);
}

/// Verifies that a failing late target fails the request and drops
/// singletons the request created.
#[test]
fn late_failure_fails_request_and_evicts_singletons() {
    let [a, b] = ["a", "b"].map(Identifier::new);
    let calls = Calls::default();
    let provider_calls = calls.clone();
    let container = sync_container([
        bind(a.clone())
            .with_dependencies([b.late_binding()])
            .with_provider(move |partner: LateBinding| {
                provider_calls.bump();
                Instance::new(Node { partner })
            })
            .scoped(Scope::Singleton),
        failing(&b, "late target failed"),
    ]);

    assert_eq!(
        container.get(&a).unwrap_err().to_string(),
        "late target failed"
    );
    assert!(container.get(&a).is_err());
    assert_eq!(calls.count(), 2);
}

/// Verifies late bindings in an async container.
#[tokio::test]
async fn async_late_binding() {
    let [a, b] = ["a", "b"].map(Identifier::new);
    let calls = Calls::default();
    let container = async_container([late_node(&a, &b), counting_async(&b, &calls)]);

    let resolved = container.get_async_as::<Node>(&a).await.unwrap();
    let instance = resolved.partner.instance().await.unwrap();
    assert_eq!(serial(&instance), 1);
}
