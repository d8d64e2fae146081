#![forbid(unsafe_code)]

//! Per-target watch sets.
//!
//! A [`WatchSet`] owns every watch attached to one host object through
//! computed declarations or direct `watch`/`track` calls, and turns them on
//! and off together.
//!
//! # Invariants
//!
//! 1. While the set is enabled every watch in it is bound to the target.
//! 2. `disable` leaves every derived property reset to `Undefined`.
//! 3. Dropping the set closes its watches, releasing the registry's
//!    references to them.

use std::cell::{Cell, RefCell};
use std::fmt;

use watchkit_core::diff::ChangeDescription;
use watchkit_core::expr::Expression;
use watchkit_core::value::{ObjectRef, Value};

use crate::computed::{Computed, ComputedProperty};
use crate::error::Result;
use crate::registry::Registry;
use crate::tracker::{MemberCallback, track_members};
use crate::watch::Watch;

/// The watches attached to one target object.
pub struct WatchSet {
    registry: Registry,
    target: ObjectRef,
    watches: RefCell<Vec<Watch>>,
    enabled: Cell<bool>,
}

impl WatchSet {
    /// An enabled, empty set.
    #[must_use]
    pub fn new(registry: &Registry, target: &ObjectRef) -> Self {
        Self::with_enabled(registry, target, true)
    }

    #[must_use]
    pub fn with_enabled(registry: &Registry, target: &ObjectRef, enabled: bool) -> Self {
        Self {
            registry: registry.clone(),
            target: target.clone(),
            watches: RefCell::new(Vec::new()),
            enabled: Cell::new(enabled),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn target(&self) -> &ObjectRef {
        &self.target
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.watches.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.watches.borrow().is_empty()
    }

    /// Attach a batch of declarations in order. Literal values are assigned
    /// directly, without a watch.
    ///
    /// Stops at the first declaration that fails to attach; earlier ones stay
    /// attached.
    pub fn extend<K: Into<String>>(
        &self,
        declarations: impl IntoIterator<Item = (K, Computed)>,
    ) -> Result<()> {
        for (property, declaration) in declarations {
            self.computed(property, declaration)?;
        }
        Ok(())
    }

    /// Attach one declaration to `target[property]`.
    pub fn computed(&self, property: impl Into<String>, declaration: impl Into<Computed>) -> Result<()> {
        let property = property.into();
        match declaration.into() {
            Computed::Value(value) => {
                self.target.assign(&property, value);
            }
            declaration => {
                let watch = declaration.attach(&self.registry, &self.target, &property)?;
                tracing::debug!(
                    message = "watchkit.computed",
                    property = %property,
                    watch = watch.id(),
                    enabled = self.enabled.get()
                );
                self.adopt(watch);
            }
        }
        Ok(())
    }

    /// Watch an expression on the target.
    pub fn watch(
        &self,
        expression: impl Into<Expression>,
        callback: impl Fn(&Value, &Value, Option<&ChangeDescription>) + 'static,
    ) -> Result<Watch> {
        let watch = self.registry.create_watch(expression, callback)?;
        self.adopt(watch.clone());
        Ok(watch)
    }

    /// Track the members of a collection on the target.
    pub fn track(
        &self,
        expression: impl Into<Expression>,
        on_add: MemberCallback,
        on_remove: MemberCallback,
    ) -> Result<Watch> {
        let watch = track_members(&self.registry, expression, on_add, on_remove)?;
        self.adopt(watch.clone());
        Ok(watch)
    }

    fn adopt(&self, watch: Watch) {
        self.watches.borrow_mut().push(watch.clone());
        if self.enabled.get() {
            watch.bind(self.target.clone(), false);
        }
    }

    /// Bind every watch to the target. No-op when already enabled.
    pub fn enable(&self) {
        if self.enabled.replace(true) {
            return;
        }
        tracing::debug!(message = "watchkit.enable", watches = self.len());
        for watch in self.snapshot() {
            watch.bind(self.target.clone(), false);
        }
    }

    /// Unbind every watch and sync it once more, resetting derived
    /// properties.
    pub fn disable(&self) {
        if !self.enabled.replace(false) {
            return;
        }
        tracing::debug!(message = "watchkit.disable", watches = self.len());
        for watch in self.snapshot() {
            watch.unbind();
            watch.sync();
        }
    }

    fn snapshot(&self) -> Vec<Watch> {
        self.watches.borrow().clone()
    }
}

impl Drop for WatchSet {
    fn drop(&mut self) {
        let watches = std::mem::take(&mut *self.watches.borrow_mut());
        for watch in watches {
            watch.close();
        }
    }
}

impl fmt::Debug for WatchSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSet")
            .field("watches", &self.len())
            .field("enabled", &self.enabled.get())
            .finish()
    }
}
