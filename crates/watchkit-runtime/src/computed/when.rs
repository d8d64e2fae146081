//! Triggered, possibly asynchronous, computed property.

use std::cell::Cell;
use std::rc::Rc;

use watchkit_core::diff::ChangeDescription;
use watchkit_core::expr::{Expression, Getter};
use watchkit_core::value::{ObjectRef, Value};

use super::ComputedProperty;
use crate::error::Result;
use crate::registry::{Registry, WeakRegistry};
use crate::watch::Watch;

/// Runs `action` whenever `when` becomes truthy and assigns its result to
/// `target[property]`.
///
/// A result that is a [`Deferred`](watchkit_core::value::Deferred), or an
/// object exposing a `then(on_ok, on_err)` function, is assigned when it
/// settles: the resolved value on success, `Undefined` on failure, followed by
/// a registry pass. Anything else is assigned immediately. A falsy `when`
/// assigns `Undefined` at once.
///
/// # Invariants
///
/// 1. Every trigger, falsy transition and close starts a new generation.
/// 2. A continuation from an older generation never writes.
/// 3. Each continuation pair writes at most once.
#[derive(Clone, Debug)]
pub struct WhenProperty {
    when: Expression,
    action: Expression,
}

impl WhenProperty {
    #[must_use]
    pub fn new(when: impl Into<Expression>, action: impl Into<Expression>) -> Self {
        Self {
            when: when.into(),
            action: action.into(),
        }
    }

    /// Trigger on `true`, so the action runs once when bound.
    #[must_use]
    pub fn when_only(action: impl Into<Expression>) -> Self {
        Self::new("true", action)
    }

    #[must_use]
    pub fn when(&self) -> &Expression {
        &self.when
    }

    #[must_use]
    pub fn action(&self) -> &Expression {
        &self.action
    }
}

impl ComputedProperty for WhenProperty {
    fn attach(&self, registry: &Registry, target: &ObjectRef, property: &str) -> Result<Watch> {
        let action = self.action.compile(registry.compiler())?;
        let generation = Rc::new(Cell::new(0_u64));
        let trigger = Trigger {
            registry: registry.downgrade(),
            target: target.clone(),
            property: property.to_string(),
            action,
            generation: Rc::clone(&generation),
        };
        let watch = registry.create_watch_cyclic(self.when.clone(), move |me| {
            let me = me.clone();
            Rc::new(
                move |value: &Value, _: &Value, _: Option<&ChangeDescription>| {
                    let issued = trigger.next_generation();
                    if !value.truthy() {
                        trigger.target.assign(&trigger.property, Value::Undefined);
                        return;
                    }
                    let Some(scope) = me.context() else {
                        return;
                    };
                    let result = (trigger.action)(&scope);
                    trigger.settle(result, issued);
                },
            )
        })?;
        watch.on_close(move || generation.set(generation.get() + 1));
        Ok(watch)
    }
}

struct Trigger {
    registry: WeakRegistry,
    target: ObjectRef,
    property: String,
    action: Getter,
    generation: Rc<Cell<u64>>,
}

impl Trigger {
    fn next_generation(&self) -> u64 {
        let next = self.generation.get() + 1;
        self.generation.set(next);
        next
    }

    fn settle(&self, result: Value, issued: u64) {
        let settle = Settle {
            registry: self.registry.clone(),
            target: self.target.clone(),
            property: self.property.clone(),
            generation: Rc::clone(&self.generation),
            issued,
            done: Rc::new(Cell::new(false)),
        };
        if let Some(deferred) = result.as_deferred() {
            let on_err = settle.clone();
            deferred.then(
                move |value| settle.apply(value),
                move |_| on_err.apply(Value::Undefined),
            );
            return;
        }
        let then = result.get("then");
        if let Some(then) = then.as_function() {
            let on_ok = settle.clone();
            let on_err = settle;
            then.call(&[
                Value::function(move |args: &[Value]| {
                    on_ok.apply(args.first().cloned().unwrap_or_default());
                    Value::Undefined
                }),
                Value::function(move |_: &[Value]| {
                    on_err.apply(Value::Undefined);
                    Value::Undefined
                }),
            ]);
            return;
        }
        self.target.assign(&self.property, result);
    }
}

/// One issued continuation pair.
#[derive(Clone)]
struct Settle {
    registry: WeakRegistry,
    target: ObjectRef,
    property: String,
    generation: Rc<Cell<u64>>,
    issued: u64,
    done: Rc<Cell<bool>>,
}

impl Settle {
    fn apply(&self, value: Value) {
        if self.done.replace(true) {
            return;
        }
        if self.generation.get() != self.issued {
            tracing::trace!(
                message = "watchkit.stale_settlement",
                property = %self.property,
                issued = self.issued,
                current = self.generation.get()
            );
            return;
        }
        self.target.assign(&self.property, value);
        if let Some(registry) = self.registry.upgrade() {
            registry.schedule();
        }
    }
}
