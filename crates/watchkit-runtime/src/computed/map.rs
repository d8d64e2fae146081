//! Keyed projection of a collection into an object.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use watchkit_core::diff::ChangeDescription;
use watchkit_core::expr::{Expression, Getter, Scope};
use watchkit_core::value::{ObjectRef, Value};

use super::{Computed, ComputedProperty};
use crate::error::{ObserveError, Result};
use crate::registry::{Registry, WeakRegistry};
use crate::tracker::{MemberKey, dispatch_members};
use crate::watch::Watch;

/// Projects the members of `source` into an object assigned to
/// `target[property]`, keyed by `key` evaluated against each member
/// (default `id`).
///
/// Without a result declaration the member itself is stored. With one, each
/// member gets its own result watch, evaluated in a
/// [`Scope::Member`] so the result can reach the owning target as `$owner`.
/// Members whose key is null, undefined or empty are skipped; other keys are
/// stringified.
///
/// On removal the member's result watch is closed, the optional `cleanup`
/// expression is evaluated against the target, and the key is deleted.
///
/// The property is only present while the tracker is bound: it is set on the
/// first bound sync and deleted again by a sync while unbound.
#[derive(Clone, Debug)]
pub struct MapProperty {
    source: Expression,
    key: Expression,
    result: Option<Box<Computed>>,
    cleanup: Option<Expression>,
}

impl MapProperty {
    #[must_use]
    pub fn new(source: impl Into<Expression>) -> Self {
        Self {
            source: source.into(),
            key: Expression::source("id"),
            result: None,
            cleanup: None,
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<Expression>) -> Self {
        self.key = key.into();
        self
    }

    #[must_use]
    pub fn with_result(mut self, result: impl Into<Computed>) -> Self {
        self.result = Some(Box::new(result.into()));
        self
    }

    #[must_use]
    pub fn with_cleanup(mut self, cleanup: impl Into<Expression>) -> Self {
        self.cleanup = Some(cleanup.into());
        self
    }

    #[must_use]
    pub fn source(&self) -> &Expression {
        &self.source
    }

    #[must_use]
    pub fn key(&self) -> &Expression {
        &self.key
    }

    pub(crate) fn validate(&self, registry: &Registry) -> Result<()> {
        let compiler = registry.compiler();
        self.source.compile(compiler)?;
        self.key.compile(compiler)?;
        if let Some(cleanup) = &self.cleanup {
            cleanup.compile(compiler)?;
        }
        if let Some(result) = &self.result {
            result.validate(registry)?;
        }
        Ok(())
    }
}

impl ComputedProperty for MapProperty {
    fn attach(&self, registry: &Registry, target: &ObjectRef, property: &str) -> Result<Watch> {
        if let Some(result) = &self.result {
            if matches!(**result, Computed::Value(_)) {
                return Err(ObserveError::InvalidMapResult {
                    property: property.to_string(),
                });
            }
        }
        self.validate(registry)?;

        let compiler = registry.compiler();
        let projection = Rc::new(Projection {
            registry: registry.downgrade(),
            target: target.clone(),
            property: property.to_string(),
            map: ObjectRef::new(),
            key: self.key.compile(compiler)?,
            result: self.result.as_deref().cloned(),
            cleanup: self
                .cleanup
                .as_ref()
                .map(|cleanup| cleanup.compile(compiler))
                .transpose()?,
            members: RefCell::new(HashMap::new()),
        });

        let owned = Rc::clone(&projection);
        let tracker = registry.create_watch_cyclic(self.source.clone(), move |me| {
            let me = me.clone();
            Rc::new(
                move |source: &Value, old: &Value, detail: Option<&ChangeDescription>| {
                    let tracker = me.upgrade();
                    let bound = tracker.as_ref().is_some_and(Watch::is_bound);
                    if bound {
                        projection.publish();
                    }
                    let key = tracker.and_then(|watch| watch.compare_by());
                    dispatch_members(
                        &|member: &Value, _: &MemberKey| projection.add(member),
                        &|member: &Value, _: &MemberKey| projection.remove(member),
                        source,
                        old,
                        detail,
                        key.as_ref(),
                    );
                    if !bound {
                        projection.retract();
                    }
                },
            )
        })?;
        tracker.set_change_records(true);
        tracker.on_close(move || owned.close_all());
        Ok(tracker)
    }
}

/// Live state of one attached map property.
struct Projection {
    registry: WeakRegistry,
    target: ObjectRef,
    property: String,
    map: ObjectRef,
    key: Getter,
    result: Option<Computed>,
    cleanup: Option<Getter>,
    members: RefCell<HashMap<String, Watch>>,
}

impl Projection {
    /// Expose the map on the target while the tracker is bound.
    fn publish(&self) {
        let current = self.target.lookup(&self.property);
        let published = current
            .as_ref()
            .and_then(Value::as_object)
            .is_some_and(|object| object.ptr_eq(&self.map));
        if !published {
            self.target.assign(&self.property, Value::Object(self.map.clone()));
        }
    }

    /// Reset the property after an unbound sync (disable, falsy branch).
    fn retract(&self) {
        self.target.assign(&self.property, Value::Undefined);
    }

    fn key_of(&self, member: &Value) -> Option<String> {
        if member.is_nullish() {
            return None;
        }
        (self.key)(&Scope::Value(member.clone())).to_key_string()
    }

    fn add(&self, member: &Value) {
        let Some(key) = self.key_of(member) else {
            return;
        };
        self.discard(&key);
        let Some(result) = &self.result else {
            self.map.insert(key, member.clone());
            return;
        };
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        match result.attach(&registry, &self.map, &key) {
            Ok(watch) => {
                watch.bind(
                    Scope::Member {
                        item: member.clone(),
                        owner: Value::Object(self.target.clone()),
                    },
                    false,
                );
                self.members.borrow_mut().insert(key, watch);
            }
            Err(err) => {
                tracing::error!(
                    message = "watchkit.map_member_failed",
                    property = %self.property,
                    key = %key,
                    error = %err
                );
            }
        }
    }

    fn remove(&self, member: &Value) {
        let Some(key) = self.key_of(member) else {
            return;
        };
        self.discard(&key);
        if let Some(cleanup) = &self.cleanup {
            cleanup(&Scope::from(self.target.clone()));
        }
        self.map.remove(&key);
    }

    fn discard(&self, key: &str) {
        let stale = self.members.borrow_mut().remove(key);
        if let Some(watch) = stale {
            watch.close();
        }
    }

    fn close_all(&self) {
        let members: Vec<Watch> = self.members.borrow_mut().drain().map(|(_, w)| w).collect();
        for watch in members {
            watch.close();
        }
    }
}
