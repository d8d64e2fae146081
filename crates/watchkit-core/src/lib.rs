#![forbid(unsafe_code)]

//! Core: host value model, value/collection diffing, and the expression
//! compiler seam.
//!
//! - [`value`]: [`Value`], the dynamically-typed host data watches observe.
//! - [`diff`]: [`compare`], producing a [`ChangeDescription`] from a new value
//!   and its baseline.
//! - [`expr`]: [`ExpressionCompiler`] and the default [`PathCompiler`].
//!
//! Nothing here schedules or owns lifecycle; see `watchkit-runtime`.

pub mod diff;
pub mod error;
pub mod expr;
pub mod value;

pub use diff::{
    ChangeDescription, CompareOptions, FieldChange, FieldChangeKind, KeyExtractor, Splice,
    baseline, compare, key_by_field,
};
pub use error::ExprError;
pub use expr::{Expression, ExpressionCompiler, Formatter, Getter, PathCompiler, Scope, Setter};
pub use value::{ArrayRef, Deferred, FunctionRef, ObjectRef, OpaqueRef, Value};
