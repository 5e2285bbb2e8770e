//! The foundational building blocks of haywire (Layer 1).
//!
//! `haywire_core` describes *what* an object graph is made of. Turning a
//! description into live values is the job of `haywire_container`.
//!
//! - [`identifier`] - Annotatable tokens naming requestable values
//! - [`symbol`] - Process-wide unique tokens and the interned symbol registry
//! - [`instance`] - Type-erased values produced by providers
//! - [`provider`] - Provider closures, suppliers and late bindings
//! - [`binding`] - Bindings and the binding builder
//! - [`module`] - Immutable, validated collections of bindings
//! - [`scope`] - Lifetime policies for resolved instances
//! - [`error`] - Validation and resolution errors
//!
//! # Architecture
//!
//! - **Layer 1** (`haywire_core`): identifiers, bindings, modules (this crate)
//! - **Layer 2** (`haywire_container`): validation, resolution, scopes, factories
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use haywire_core::prelude::*;
//!
//! struct Greeting(String);
//! struct Name(String);
//!
//! let name = Identifier::of::<Name>();
//! let greeting = Identifier::of::<Greeting>();
//!
//! let module = create_module(bind(name.clone()).with_instance(Instance::new(Name("world".into()))))
//!     .add_binding(
//!         bind(greeting)
//!             .with_dependencies([name])
//!             .with_provider(|name: Arc<Name>| Instance::new(Greeting(format!("hello {}", name.0)))),
//!     )
//!     .unwrap();
//!
//! assert_eq!(module.len(), 2);
//! assert!(module.missing_dependencies().is_empty());
//! ```

/// Bindings and the binding builder.
pub mod binding;

/// Validation and resolution errors.
pub mod error;

/// Identifiers naming requestable values.
pub mod identifier;

/// Type-erased provider values.
pub mod instance;

/// Immutable collections of bindings.
pub mod module;

/// Provider functions, suppliers and late bindings.
pub mod provider;

/// Lifetime policies.
pub mod scope;

/// Process-wide symbols.
pub mod symbol;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::binding::{Binding, BindingBuilder, Provider, bind};
    pub use crate::error::{MultiError, ProviderError, ResolveError, UnsafeSupplier, ValidationError};
    pub use crate::identifier::{Identifier, Name, SupplierMode};
    pub use crate::instance::Instance;
    pub use crate::module::{Module, create_module};
    pub use crate::provider::{
        AsyncSupplier, Dependency, FromDependency, IntoAsyncProvider, IntoInstance, IntoProvider,
        LateBinding, ResolveResult, Supplier,
    };
    pub use crate::scope::Scope;
    pub use crate::symbol::Symbol;
}
