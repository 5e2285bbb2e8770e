//! # Haywire Internal Library
//!
//! Re-exports the core haywire crates for convenience.

/// Layer 1: Identifiers, bindings and modules.
pub use haywire_core;

/// Layer 2: Containers, scopes and factories.
pub use haywire_container;

/// Subscriber setup for haywire's tracing output.
pub use haywire_tracing;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use haywire_container::prelude::*;
    pub use haywire_tracing::{TracingFormat, TracingSetup};
}
