#![forbid(unsafe_code)]

//! watchkit public facade crate.
//!
//! Dirty-checking change detection for plain host data: bind expressions to
//! objects, run passes, and keep computed properties in sync.
//!
//! ```
//! use watchkit::prelude::*;
//!
//! let registry = Registry::new();
//! let person = ObjectRef::from_pairs([
//!     ("firstName", Value::from("Bob")),
//!     ("lastName", Value::from("Smith")),
//! ]);
//! let set = WatchSet::new(&registry, &person);
//! set.computed("fullName", "firstName + ' ' + lastName").unwrap();
//! assert_eq!(person.get("fullName"), Value::from("Bob Smith"));
//!
//! person.insert("firstName", "John");
//! registry.run_now().unwrap();
//! assert_eq!(person.get("fullName"), Value::from("John Smith"));
//! ```

pub use watchkit_core as core;
pub use watchkit_runtime as runtime;

pub mod prelude {
    pub use watchkit_core::{
        ChangeDescription, Deferred, Expression, ExpressionCompiler, ObjectRef, PathCompiler,
        Scope, Value,
    };
    pub use watchkit_runtime::{
        Computed, ComputedProperty, MapProperty, MemberKey, Registry, RegistryConfig, Watch,
        WatchSet,
    };
}
