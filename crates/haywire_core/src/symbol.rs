//! Process-wide symbols.
//!
//! A [`Symbol`] is an opaque token with a human readable description. Two
//! symbols created with [`Symbol::new`] are never equal, even when their
//! descriptions match. [`Symbol::interned`] instead looks the description up
//! in a global registry, so the same key always yields the same symbol.
//!
//! Symbols back the unique part of every [`Identifier`](crate::identifier::Identifier)
//! and can also be used as the `named` annotation of an identifier when a
//! string name would risk collisions.
//!
//! The registry lives for the whole process. It is guarded by a
//! [`parking_lot::Mutex`] and the serial counter is atomic, so symbols can be
//! created from any thread.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use hashbrown::HashMap;
use parking_lot::Mutex;

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Global table of symbol serials and interned keys.
struct SymbolRegistry {
    next_serial: AtomicU64,
    interned: Mutex<HashMap<Arc<str>, Symbol>>,
}

impl SymbolRegistry {
    fn allocate(&self) -> u64 {
        self.next_serial.fetch_add(1, Ordering::Relaxed)
    }
}

static REGISTRY: LazyLock<SymbolRegistry> = LazyLock::new(|| SymbolRegistry {
    next_serial: AtomicU64::new(0),
    interned: Mutex::new(HashMap::new()),
});

// ─────────────────────────────────────────────────────────────────────────────
// Symbol
// ─────────────────────────────────────────────────────────────────────────────

/// A unique, cheaply cloneable token.
///
/// Equality and hashing only consider the serial allocated at creation, so
/// clones of a symbol compare equal while independently created symbols do
/// not.
///
/// # Example
///
/// ```
/// use haywire_core::symbol::Symbol;
///
/// let a = Symbol::new("db");
/// let b = Symbol::new("db");
/// assert_ne!(a, b);
/// assert_eq!(a, a.clone());
///
/// assert_eq!(Symbol::interned("db"), Symbol::interned("db"));
/// assert_eq!(a.to_string(), "Symbol(db)");
/// ```
#[derive(Clone)]
pub struct Symbol {
    serial: u64,
    description: Arc<str>,
}

impl Symbol {
    /// Creates a new symbol that is distinct from every other symbol.
    #[must_use]
    pub fn new(description: impl Into<Arc<str>>) -> Self {
        Self {
            serial: REGISTRY.allocate(),
            description: description.into(),
        }
    }

    /// Returns the process-wide symbol registered under `key`, creating it on
    /// first use.
    #[must_use]
    pub fn interned(key: &str) -> Self {
        let mut interned = REGISTRY.interned.lock();
        if let Some(symbol) = interned.get(key) {
            return symbol.clone();
        }

        let description: Arc<str> = Arc::from(key);
        let symbol = Self {
            serial: REGISTRY.allocate(),
            description: Arc::clone(&description),
        };
        interned.insert(description, symbol.clone());
        symbol
    }

    /// Returns the description given at creation.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.serial == other.serial
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.serial.hash(state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Symbol")
            .field("serial", &self.serial)
            .field("description", &self.description)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn new_symbols_are_unique() {
        let first = Symbol::new("token");
        let second = Symbol::new("token");

        assert_ne!(first, second);
        assert_eq!(first.description(), second.description());
    }

    #[test]
    fn interned_symbols_are_shared() {
        let first = Symbol::interned("shared-key");
        let second = Symbol::interned("shared-key");

        assert_eq!(first, second);
        assert_eq!(first.description(), "shared-key");
        assert_ne!(first, Symbol::new("shared-key"));
    }

    #[test]
    fn symbols_hash_by_serial() {
        let symbol = Symbol::new("hash");
        let mut set = HashSet::new();
        set.insert(symbol.clone());
        set.insert(symbol.clone());
        set.insert(Symbol::new("hash"));

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn interning_from_many_threads_yields_one_symbol() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| Symbol::interned("threaded")))
            .collect();
        let symbols: HashSet<_> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();

        assert_eq!(symbols.len(), 1);
    }
}
