//! Conditional computed property.

use std::rc::Rc;

use watchkit_core::diff::ChangeDescription;
use watchkit_core::expr::Expression;
use watchkit_core::value::{ObjectRef, Value};

use super::{Computed, ComputedProperty};
use crate::error::Result;
use crate::registry::Registry;
use crate::watch::Watch;

/// Derives `target[property]` from `then` only while `condition` is truthy.
///
/// The branch watch stays unbound (property left unset) while the condition
/// is falsy. On a falsy → truthy transition it is bound to the condition's
/// scope, which assigns its current value; on truthy → falsy it is unbound
/// and synced once more, resetting the property to `Undefined`.
#[derive(Clone, Debug)]
pub struct IfProperty {
    condition: Expression,
    then: Box<Computed>,
}

impl IfProperty {
    #[must_use]
    pub fn new(condition: impl Into<Expression>, then: impl Into<Computed>) -> Self {
        Self {
            condition: condition.into(),
            then: Box::new(then.into()),
        }
    }

    #[must_use]
    pub fn condition(&self) -> &Expression {
        &self.condition
    }

    #[must_use]
    pub fn then(&self) -> &Computed {
        &self.then
    }
}

impl ComputedProperty for IfProperty {
    fn attach(&self, registry: &Registry, target: &ObjectRef, property: &str) -> Result<Watch> {
        let branch = self.then.attach(registry, target, property)?;
        let toggled = branch.clone();
        let condition = registry.create_watch_cyclic(self.condition.clone(), move |me| {
            let me = me.clone();
            Rc::new(
                move |value: &Value, _: &Value, _: Option<&ChangeDescription>| {
                    let active = value.truthy();
                    if active && !toggled.is_bound() {
                        if let Some(scope) = me.context() {
                            toggled.bind(scope, false);
                        }
                    } else if !active && toggled.is_bound() {
                        toggled.unbind();
                        toggled.sync();
                    }
                },
            )
        })?;
        condition.on_close(move || branch.close());
        Ok(condition)
    }
}
