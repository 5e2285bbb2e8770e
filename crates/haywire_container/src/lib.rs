//! Containers, resolution and scopes for haywire (Layer 2).
//!
//! `haywire_container` turns a [`Module`](haywire_core::module::Module) into
//! live values:
//!
//! - [`container`] - Sync and async containers and their creation
//! - [`factory`] - Modules completed with instances at runtime
//! - [`config`] - Container options
//!
//! Validation runs when a container is created. Providers run lazily, on the
//! first request that needs them, except for optimistic scopes which are
//! created ahead of time.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use haywire_container::prelude::*;
//!
//! struct Database;
//! struct Repository { database: Arc<Database> }
//!
//! let database = Identifier::of::<Database>();
//! let repository = Identifier::of::<Repository>();
//!
//! let module = create_module(
//!     bind(database.clone())
//!         .with_generator(|| Instance::new(Database))
//!         .scoped(Scope::Singleton),
//! )
//! .add_binding(
//!     bind(repository.clone())
//!         .with_dependencies([database])
//!         .with_provider(|database: Arc<Database>| Instance::new(Repository { database })),
//! )
//! .unwrap();
//!
//! let container = module.to_container().unwrap().into_sync().unwrap();
//! let first = container.get_as::<Repository>(&repository).unwrap();
//! let second = container.get_as::<Repository>(&repository).unwrap();
//!
//! assert!(!Arc::ptr_eq(&first, &second));
//! assert!(Arc::ptr_eq(&first.database, &second.database));
//! ```

mod cache;
mod graph;
mod resolver;

/// Container options.
pub mod config;

/// Sync and async containers.
pub mod container;

/// Modules completed with instances at runtime.
pub mod factory;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::config::ContainerConfig;
    pub use crate::container::{
        AsyncContainer, Container, ModuleExt, SyncContainer, create_container,
        create_container_with,
    };
    pub use crate::factory::Factory;
    pub use haywire_core::prelude::*;
}
