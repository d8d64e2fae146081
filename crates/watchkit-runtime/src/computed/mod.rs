#![forbid(unsafe_code)]

//! Computed properties: declarations that keep a target object's properties
//! in sync with derived values.
//!
//! A [`Computed`] declaration is stateless. Attaching it to a
//! `(target, property)` pair produces a detached [`Watch`]; the caller binds
//! that watch to the scope the declaration evaluates in (usually the target
//! itself, see [`WatchSet`](crate::WatchSet)).
//!
//! | Variant | Watches | Behavior |
//! |---------|---------|----------|
//! | [`Computed::Expr`] | 1 | Assigns the expression value (`Undefined` deletes the key) |
//! | [`Computed::If`] | 2 | Binds the branch while the condition is truthy, resets it otherwise |
//! | [`Computed::Map`] | 1 + one per member | Keyed projection of a collection into an object |
//! | [`Computed::When`] | 1 | Runs an action on truthy transitions, assigning its (possibly deferred) result |
//! | [`Computed::Value`] | 1 | A literal |
//! | [`Computed::Custom`] | any | User-defined [`ComputedProperty`] |
//!
//! Composite variants tear down the watches they own when their outer watch
//! is closed.

mod cond;
mod expr;
mod map;
mod when;

use std::fmt;
use std::rc::Rc;

use watchkit_core::expr::Expression;
use watchkit_core::value::{ObjectRef, Value};

use crate::error::Result;
use crate::registry::Registry;
use crate::watch::Watch;

pub use cond::IfProperty;
pub use map::MapProperty;
pub use when::WhenProperty;

/// A strategy that derives one property of a target object.
pub trait ComputedProperty {
    /// Create the detached watch that keeps `target[property]` up to date.
    /// Configuration errors are returned here, before anything is bound.
    fn attach(&self, registry: &Registry, target: &ObjectRef, property: &str) -> Result<Watch>;
}

/// A computed-property declaration.
#[derive(Clone)]
pub enum Computed {
    Expr(Expression),
    If(IfProperty),
    Map(MapProperty),
    When(WhenProperty),
    /// A literal. Assigned once, without a watch, at the top level of a
    /// watch set.
    Value(Value),
    Custom(Rc<dyn ComputedProperty>),
}

impl Computed {
    #[must_use]
    pub fn expr(expression: impl Into<Expression>) -> Self {
        Self::Expr(expression.into())
    }

    #[must_use]
    pub fn if_(condition: impl Into<Expression>, then: impl Into<Computed>) -> Self {
        Self::If(IfProperty::new(condition, then))
    }

    /// Keyed projection of `source`, keyed by `key`, holding the members
    /// themselves.
    #[must_use]
    pub fn map(source: impl Into<Expression>, key: impl Into<Expression>) -> Self {
        Self::Map(MapProperty::new(source).with_key(key))
    }

    /// Keyed projection of `source` holding `result` evaluated per member.
    #[must_use]
    pub fn map_to(
        source: impl Into<Expression>,
        key: impl Into<Expression>,
        result: impl Into<Computed>,
    ) -> Self {
        Self::Map(MapProperty::new(source).with_key(key).with_result(result))
    }

    #[must_use]
    pub fn when(when: impl Into<Expression>, action: impl Into<Expression>) -> Self {
        Self::When(WhenProperty::new(when, action))
    }

    /// Run `action` once on bind.
    #[must_use]
    pub fn when_only(action: impl Into<Expression>) -> Self {
        Self::When(WhenProperty::when_only(action))
    }

    #[must_use]
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    #[must_use]
    pub fn custom(property: impl ComputedProperty + 'static) -> Self {
        Self::Custom(Rc::new(property))
    }

    /// Compile every source expression the declaration holds, so that a bad
    /// declaration fails at attach time rather than on first use.
    pub(crate) fn validate(&self, registry: &Registry) -> Result<()> {
        let compiler = registry.compiler();
        match self {
            Self::Expr(expression) => {
                expression.compile(compiler)?;
            }
            Self::If(property) => {
                property.condition().compile(compiler)?;
                property.then().validate(registry)?;
            }
            Self::Map(property) => property.validate(registry)?,
            Self::When(property) => {
                property.when().compile(compiler)?;
                property.action().compile(compiler)?;
            }
            Self::Value(_) | Self::Custom(_) => {}
        }
        Ok(())
    }
}

impl ComputedProperty for Computed {
    fn attach(&self, registry: &Registry, target: &ObjectRef, property: &str) -> Result<Watch> {
        match self {
            Self::Expr(expression) => expr::assign_watch(registry, expression.clone(), target, property),
            Self::If(p) => p.attach(registry, target, property),
            Self::Map(p) => p.attach(registry, target, property),
            Self::When(p) => p.attach(registry, target, property),
            Self::Value(value) => expr::literal_watch(registry, value.clone(), target, property),
            Self::Custom(p) => p.attach(registry, target, property),
        }
    }
}

impl From<&str> for Computed {
    fn from(text: &str) -> Self {
        Self::Expr(text.into())
    }
}

impl From<String> for Computed {
    fn from(text: String) -> Self {
        Self::Expr(text.into())
    }
}

impl From<Expression> for Computed {
    fn from(expression: Expression) -> Self {
        Self::Expr(expression)
    }
}

impl From<IfProperty> for Computed {
    fn from(property: IfProperty) -> Self {
        Self::If(property)
    }
}

impl From<MapProperty> for Computed {
    fn from(property: MapProperty) -> Self {
        Self::Map(property)
    }
}

impl From<WhenProperty> for Computed {
    fn from(property: WhenProperty) -> Self {
        Self::When(property)
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expr(expression) => f.debug_tuple("Expr").field(expression).finish(),
            Self::If(p) => f.debug_tuple("If").field(p).finish(),
            Self::Map(p) => f.debug_tuple("Map").field(p).finish(),
            Self::When(p) => f.debug_tuple("When").field(p).finish(),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
