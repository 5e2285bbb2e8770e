//! An object-graph dependency injection runtime.
//!
//! Describe how each value is built as a binding, collect bindings into a
//! module, and let a container build the graph on demand with the lifetime
//! each binding asks for.
//!
//! ```
//! use std::sync::Arc;
//! use haywire::prelude::*;
//!
//! struct Settings { greeting: &'static str }
//! struct Greeter { settings: Arc<Settings> }
//!
//! let settings = Identifier::of::<Settings>();
//! let greeter = Identifier::of::<Greeter>();
//!
//! let module = create_module(bind(settings.clone()).with_instance(Instance::new(Settings { greeting: "hi" })))
//!     .add_binding(
//!         bind(greeter.clone())
//!             .with_dependencies([settings])
//!             .with_provider(|settings: Arc<Settings>| Instance::new(Greeter { settings })),
//!     )
//!     .unwrap();
//!
//! let container = module.to_container().unwrap().into_sync().unwrap();
//! assert_eq!(container.get_as::<Greeter>(&greeter).unwrap().settings.greeting, "hi");
//! ```

pub use haywire_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use haywire_internal::prelude::*;
}
