//! Instance caches backing the singleton, request and supplier scopes.
//!
//! A cache slot is either a finished instance or an in-flight resolution.
//! Every caller that finds a key in flight waits for that one resolution,
//! whether it was started by a synchronous or an asynchronous caller, so a
//! provider runs at most once per key while it succeeds. Failures are shared
//! with the callers already waiting and then cleared: the next caller
//! retries.
//!
//! A resolution that needs its own key again, while it is still being built
//! on the same thread, cannot wait for itself. That nested lookup resolves
//! without the cache instead.

use core::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{self, BoxFuture, Shared};
use hashbrown::HashMap;
use haywire_core::error::ResolveError;
use haywire_core::identifier::Identifier;
use haywire_core::instance::Instance;
use haywire_core::provider::ResolveResult;
use parking_lot::Mutex;

type SharedResolution = Shared<BoxFuture<'static, ResolveResult>>;

/// Tickets are unique across caches, so a thread can tell which in-flight
/// resolutions it is building itself.
static NEXT_TICKET: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static BUILDING: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Marks `ticket` as being built on the current thread until dropped.
struct Building(u64);

impl Building {
    fn enter(ticket: u64) -> Self {
        BUILDING.with(|building| building.borrow_mut().push(ticket));
        Self(ticket)
    }

    fn contains(ticket: u64) -> bool {
        BUILDING.with(|building| building.borrow().contains(&ticket))
    }
}

impl Drop for Building {
    fn drop(&mut self) {
        BUILDING.with(|building| {
            let mut building = building.borrow_mut();
            if let Some(position) = building.iter().rposition(|ticket| *ticket == self.0) {
                building.remove(position);
            }
        });
    }
}

enum Slot {
    Ready(Instance),
    Pending {
        ticket: u64,
        resolution: SharedResolution,
    },
}

/// Instances keyed by binding output identifier.
#[derive(Default)]
pub(crate) struct ScopeCache {
    slots: Mutex<HashMap<Identifier, Slot>>,
}

/// Clears an in-flight slot whose synchronous owner unwound without
/// settling it.
struct Claim<'a> {
    cache: &'a ScopeCache,
    key: &'a Identifier,
    ticket: u64,
    settled: bool,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.cache.release(self.key, self.ticket);
        }
    }
}

impl ScopeCache {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns the cached instance for `key`, running `resolve` on a miss.
    ///
    /// The lock is not held while `resolve` runs, so it may resolve other
    /// keys of the same cache. Callers that find `key` in flight block until
    /// it settles.
    pub(crate) fn get_or_resolve(
        &self,
        key: &Identifier,
        resolve: impl FnOnce() -> ResolveResult,
    ) -> ResolveResult {
        let mut slots = self.slots.lock();
        let in_flight = match slots.get(key) {
            Some(Slot::Ready(instance)) => return Ok(instance.clone()),
            Some(Slot::Pending { ticket, resolution }) => Some((*ticket, resolution.clone())),
            None => None,
        };
        if let Some((ticket, resolution)) = in_flight {
            drop(slots);
            if Building::contains(ticket) {
                return resolve();
            }
            return futures::executor::block_on(resolution);
        }

        let ticket = NEXT_TICKET.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel::<ResolveResult>();
        let abandoned = key.clone();
        let resolution = receiver
            .map(|received| {
                received.unwrap_or_else(|_| Err(ResolveError::ResolutionAbandoned { id: abandoned }))
            })
            .boxed()
            .shared();
        slots.insert(key.clone(), Slot::Pending { ticket, resolution });
        drop(slots);

        let mut claim = Claim {
            cache: self,
            key,
            ticket,
            settled: false,
        };
        let outcome = {
            let _building = Building::enter(ticket);
            resolve()
        };
        self.settle(key, ticket, &outcome);
        claim.settled = true;
        let _ = sender.send(outcome.clone());
        outcome
    }

    /// Returns a future for the cached instance for `key`, starting the
    /// resolution built by `resolve` on a miss.
    ///
    /// `resolve` runs under the cache lock and must only build the future;
    /// the future itself may use the cache freely.
    pub(crate) fn get_or_spawn(
        self: &Arc<Self>,
        key: &Identifier,
        resolve: impl FnOnce() -> BoxFuture<'static, ResolveResult>,
    ) -> BoxFuture<'static, ResolveResult> {
        let mut slots = self.slots.lock();
        match slots.get(key) {
            Some(Slot::Ready(instance)) => return future::ready(Ok(instance.clone())).boxed(),
            Some(Slot::Pending { ticket, .. }) if Building::contains(*ticket) => return resolve(),
            Some(Slot::Pending { resolution, .. }) => return resolution.clone().boxed(),
            None => {}
        }

        let ticket = NEXT_TICKET.fetch_add(1, Ordering::Relaxed);
        let cache = Arc::downgrade(self);
        let settled_key = key.clone();
        let mut pending = resolve();
        let resolution = async move {
            let outcome = future::poll_fn(|cx| {
                let _building = Building::enter(ticket);
                pending.poll_unpin(cx)
            })
            .await;
            if let Some(cache) = cache.upgrade() {
                cache.settle(&settled_key, ticket, &outcome);
            }
            outcome
        }
        .boxed()
        .shared();

        slots.insert(
            key.clone(),
            Slot::Pending {
                ticket,
                resolution: resolution.clone(),
            },
        );
        resolution.boxed()
    }

    /// Replaces the in-flight slot identified by `ticket` with its outcome.
    fn settle(&self, key: &Identifier, ticket: u64, outcome: &ResolveResult) {
        let mut slots = self.slots.lock();
        if !Self::owns(&slots, key, ticket) {
            return;
        }
        match outcome {
            Ok(instance) => {
                slots.insert(key.clone(), Slot::Ready(instance.clone()));
            }
            Err(error) => {
                tracing::debug!(id = %key, %error, "cached resolution failed, slot cleared");
                slots.remove(key);
            }
        }
    }

    fn release(&self, key: &Identifier, ticket: u64) {
        let mut slots = self.slots.lock();
        if Self::owns(&slots, key, ticket) {
            slots.remove(key);
        }
    }

    fn owns(slots: &HashMap<Identifier, Slot>, key: &Identifier, ticket: u64) -> bool {
        matches!(
            slots.get(key),
            Some(Slot::Pending { ticket: current, .. }) if *current == ticket
        )
    }

    /// Drops the finished instance for `key`, if any.
    pub(crate) fn evict(&self, key: &Identifier) {
        let mut slots = self.slots.lock();
        if matches!(slots.get(key), Some(Slot::Ready(_))) {
            slots.remove(key);
        }
    }

    #[cfg(test)]
    fn peek(&self, key: &Identifier) -> Option<Instance> {
        match self.slots.lock().get(key) {
            Some(Slot::Ready(instance)) => Some(instance.clone()),
            _ => None,
        }
    }
}
