//! Shared test utilities for `haywire_container` integration tests.
//!
//! Import via `mod test_utils;` in test files.

#![allow(
    dead_code,
    missing_docs,
    reason = "shared test utilities, not all items used in every test binary"
)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use haywire_container::prelude::*;

// ═══════════════════════════════════════════════════════════════════════════════
// CALL COUNTING
// ═══════════════════════════════════════════════════════════════════════════════

/// Counts provider invocations.
#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// A value tagged with the invocation that created it.
#[derive(Debug, PartialEq, Eq)]
pub struct Serial(pub usize);

/// A zero-dependency binding producing a fresh [`Serial`] on every call.
pub fn counting(id: &Identifier, calls: &Calls) -> Binding {
    let calls = calls.clone();
    bind(id.clone()).with_generator(move || Instance::new(Serial(calls.bump())))
}

/// An async zero-dependency binding producing a fresh [`Serial`] per call.
pub fn counting_async(id: &Identifier, calls: &Calls) -> Binding {
    let calls = calls.clone();
    bind(id.clone()).with_async_generator(move || {
        let serial = calls.bump();
        async move {
            tokio::task::yield_now().await;
            Instance::new(Serial(serial))
        }
    })
}

/// A binding that always fails with `message`.
pub fn failing(id: &Identifier, message: &'static str) -> Binding {
    bind(id.clone()).with_generator(move || Err::<Instance, _>(ProviderError::msg(message)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTAINER HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Builds a module from bindings, panicking on duplicates.
pub fn module(bindings: impl IntoIterator<Item = Binding>) -> Module {
    bindings
        .into_iter()
        .try_fold(Module::default(), |module, binding| module.add_binding(binding))
        .expect("bindings should not overlap")
}

/// Creates a synchronous container, panicking if the module is invalid or async.
pub fn sync_container(bindings: impl IntoIterator<Item = Binding>) -> SyncContainer {
    create_container(&module(bindings))
        .expect("module should validate")
        .into_sync()
        .expect("module should be synchronous")
}

/// Creates a container of either flavor as an awaiting container.
pub fn async_container(bindings: impl IntoIterator<Item = Binding>) -> AsyncContainer {
    create_container(&module(bindings))
        .expect("module should validate")
        .into_async()
}

/// Returns the serial of a resolved [`Serial`].
pub fn serial(instance: &Instance) -> usize {
    instance
        .downcast_ref::<Serial>()
        .map(|serial| serial.0)
        .expect("instance should be a Serial")
}
