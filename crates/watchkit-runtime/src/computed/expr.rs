//! Direct assignment of an expression (or literal) to a target property.

use watchkit_core::diff::ChangeDescription;
use watchkit_core::expr::Expression;
use watchkit_core::value::{ObjectRef, Value};

use crate::error::Result;
use crate::registry::Registry;
use crate::watch::Watch;

/// A watch that assigns every new value of `expression` to
/// `target[property]`. `Undefined` removes the key.
pub(crate) fn assign_watch(
    registry: &Registry,
    expression: Expression,
    target: &ObjectRef,
    property: &str,
) -> Result<Watch> {
    let target = target.clone();
    let property = property.to_string();
    registry.create_watch(
        expression,
        move |value: &Value, _: &Value, _: Option<&ChangeDescription>| {
            target.assign(&property, value.clone());
        },
    )
}

/// A watch over a constant. Used where a literal appears below the top level,
/// such as the branch of an `If`.
pub(crate) fn literal_watch(
    registry: &Registry,
    value: Value,
    target: &ObjectRef,
    property: &str,
) -> Result<Watch> {
    let label = format!("{value:?}");
    let expression = Expression::getter(label, move |_| value.clone());
    assign_watch(registry, expression, target, property)
}
