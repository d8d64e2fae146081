#![forbid(unsafe_code)]

//! A single observation unit.
//!
//! A [`Watch`] pairs a compiled getter with a bound [`Scope`], a callback and
//! the last-known value (the baseline). [`Watch::sync`] re-evaluates the
//! getter, diffs against the baseline and calls back when something changed.
//!
//! # Lifecycle
//!
//! ```text
//! detached ──bind──▶ bound (in the registry's live set)
//!    ▲                  │
//!    └─────unbind───────┘        close = unbind + drop callback + close hooks
//! ```
//!
//! # Invariants
//!
//! 1. An unbound watch is never in its registry's live set.
//! 2. `sync` always updates the baseline, whether or not the callback fired.
//! 3. `skip_next_sync` suppresses exactly one callback.
//! 4. A watch whose `sync` is already on the stack ignores nested `sync`
//!    calls.
//! 5. No internal borrow is held while the getter, setter or callback runs.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | No setter | Expression is not assignable | `set` returns `false`, setter never re-derived |
//! | Setter error | Write into a scalar | `set` returns `false`, logged at `trace` |
//! | Registry dropped | Watch outlived its registry | `bind` only stores the context; `set` returns `false` |

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use watchkit_core::diff::{ChangeDescription, CompareOptions, KeyExtractor, baseline, compare};
use watchkit_core::expr::{Expression, Getter, Scope, Setter};
use watchkit_core::value::Value;

use crate::registry::{Registry, RegistryInner};

/// Watch callback: `(new_value, old_value, structural_detail)`.
pub type WatchCallback = Rc<dyn Fn(&Value, &Value, Option<&ChangeDescription>)>;

type CloseHook = Box<dyn FnOnce()>;

enum SetterSlot {
    Unresolved,
    Resolved(Setter),
    Unsettable,
}

struct WatchState {
    context: Option<Scope>,
    old_value: Value,
    skip_next: bool,
    force_update: bool,
}

pub(crate) struct WatchInner {
    id: u64,
    registry: Weak<RegistryInner>,
    expression: Expression,
    getter: Getter,
    setter: RefCell<SetterSlot>,
    state: RefCell<WatchState>,
    callback: RefCell<Option<WatchCallback>>,
    change_records: Cell<bool>,
    compare_by: RefCell<Option<KeyExtractor>>,
    syncing: Cell<bool>,
    close_hooks: RefCell<Vec<CloseHook>>,
}

/// Handle to a watch. Clones share the same watch.
#[derive(Clone)]
pub struct Watch {
    inner: Rc<WatchInner>,
}

/// Non-owning watch handle, used by callbacks that refer to their own watch.
#[derive(Clone)]
pub struct WeakWatch {
    inner: Weak<WatchInner>,
}

impl WeakWatch {
    #[must_use]
    pub fn upgrade(&self) -> Option<Watch> {
        self.inner.upgrade().map(|inner| Watch { inner })
    }

    /// The watch's bound context, if it is alive and bound.
    #[must_use]
    pub fn context(&self) -> Option<Scope> {
        self.upgrade().and_then(|w| w.context())
    }
}

impl fmt::Debug for WeakWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakWatch")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Clears the re-entrancy flag even if the callback panics.
struct SyncGuard<'a>(&'a Cell<bool>);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Watch {
    /// Build a watch whose callback may refer back to the watch itself.
    pub(crate) fn new_cyclic(
        id: u64,
        registry: Weak<RegistryInner>,
        expression: Expression,
        getter: Getter,
        make_callback: impl FnOnce(&WeakWatch) -> Option<WatchCallback>,
    ) -> Self {
        let inner = Rc::new_cyclic(|weak| {
            let me = WeakWatch {
                inner: weak.clone(),
            };
            WatchInner {
                id,
                registry,
                expression,
                getter,
                setter: RefCell::new(SetterSlot::Unresolved),
                state: RefCell::new(WatchState {
                    context: None,
                    old_value: Value::Undefined,
                    skip_next: false,
                    force_update: false,
                }),
                callback: RefCell::new(make_callback(&me)),
                change_records: Cell::new(false),
                compare_by: RefCell::new(None),
                syncing: Cell::new(false),
                close_hooks: RefCell::new(Vec::new()),
            }
        });
        Self { inner }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    #[must_use]
    pub fn expression(&self) -> &Expression {
        &self.inner.expression
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakWatch {
        WeakWatch {
            inner: Rc::downgrade(&self.inner),
        }
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Watch) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn registry(&self) -> Option<Registry> {
        self.inner.registry.upgrade().map(Registry::from_inner)
    }

    // ─── Configuration ───────────────────────────────────────────────────────

    /// Store detached snapshots as baselines so in-place mutation of the live
    /// value is detected. Off by default.
    pub fn set_change_records(&self, enabled: bool) {
        self.inner.change_records.set(enabled);
    }

    #[must_use]
    pub fn change_records(&self) -> bool {
        self.inner.change_records.get()
    }

    /// Compare array elements by extracted key instead of by value.
    pub fn set_compare_by(&self, key: Option<KeyExtractor>) {
        *self.inner.compare_by.borrow_mut() = key;
    }

    #[must_use]
    pub fn compare_by(&self) -> Option<KeyExtractor> {
        self.inner.compare_by.borrow().clone()
    }

    /// Run `hook` when the watch is closed. Used by composite watches to tear
    /// down the watches they own.
    pub fn on_close(&self, hook: impl FnOnce() + 'static) {
        self.inner.close_hooks.borrow_mut().push(Box::new(hook));
    }

    // ─── State ───────────────────────────────────────────────────────────────

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.inner.state.borrow().context.is_some()
    }

    #[must_use]
    pub fn context(&self) -> Option<Scope> {
        self.inner.state.borrow().context.clone()
    }

    /// The stored baseline (the value seen by the last sync).
    #[must_use]
    pub fn value(&self) -> Value {
        self.inner.state.borrow().old_value.clone()
    }

    #[must_use]
    pub fn has_callback(&self) -> bool {
        self.inner.callback.borrow().is_some()
    }

    pub(crate) fn force_next_sync(&self) {
        self.inner.state.borrow_mut().force_update = true;
    }

    // ─── Operations ──────────────────────────────────────────────────────────

    /// Current value of the expression, `Undefined` when unbound.
    #[must_use]
    pub fn get(&self) -> Value {
        match self.context() {
            Some(scope) => (self.inner.getter)(&scope),
            None => Value::Undefined,
        }
    }

    /// Write through the expression. Returns `false` when unbound, not
    /// assignable, or the write failed. On success the watch re-syncs and a
    /// registry pass is scheduled.
    pub fn set(&self, value: Value) -> bool {
        let Some(scope) = self.context() else {
            return false;
        };
        let Some(setter) = self.resolve_setter() else {
            return false;
        };
        if let Err(err) = setter(&scope, value) {
            tracing::trace!(
                message = "watchkit.set_failed",
                watch = self.inner.id,
                expr = self.inner.expression.text(),
                error = %err
            );
            return false;
        }
        self.sync();
        if let Some(registry) = self.registry() {
            registry.schedule();
        }
        true
    }

    fn resolve_setter(&self) -> Option<Setter> {
        match &*self.inner.setter.borrow() {
            SetterSlot::Resolved(setter) => return Some(Rc::clone(setter)),
            SetterSlot::Unsettable => return None,
            SetterSlot::Unresolved => {}
        }
        let registry = self.registry()?;
        let compiled = self.inner.expression.compile_setter(registry.compiler());
        let mut slot = self.inner.setter.borrow_mut();
        match compiled {
            Ok(setter) => {
                *slot = SetterSlot::Resolved(Rc::clone(&setter));
                Some(setter)
            }
            Err(err) => {
                tracing::trace!(
                    message = "watchkit.unsettable",
                    watch = self.inner.id,
                    expr = self.inner.expression.text(),
                    error = %err
                );
                *slot = SetterSlot::Unsettable;
                None
            }
        }
    }

    /// Attach to `context` and register with the registry. Unless
    /// `skip_initial_callback`, the callback fires once immediately.
    pub fn bind(&self, context: impl Into<Scope>, skip_initial_callback: bool) {
        self.inner.state.borrow_mut().context = Some(context.into());
        if !self.has_callback() {
            return;
        }
        if let Some(registry) = self.registry() {
            registry.add(self, skip_initial_callback);
        }
    }

    /// Detach and deregister. No callbacks fire until rebound.
    pub fn unbind(&self) {
        if let Some(registry) = self.registry() {
            registry.remove(self);
        }
        self.inner.state.borrow_mut().context = None;
    }

    /// Unbind, drop the callback and run close hooks.
    pub fn close(&self) {
        self.unbind();
        self.inner.callback.borrow_mut().take();
        let hooks = std::mem::take(&mut *self.inner.close_hooks.borrow_mut());
        for hook in hooks {
            hook();
        }
    }

    /// Suppress the next callback; the baseline still updates.
    pub fn skip_next_sync(&self) {
        self.inner.state.borrow_mut().skip_next = true;
    }

    /// Re-evaluate and call back if the value changed (or a forced update is
    /// pending).
    pub fn sync(&self) {
        if self.inner.syncing.replace(true) {
            return;
        }
        let _guard = SyncGuard(&self.inner.syncing);

        let value = self.get();
        let callback = self.inner.callback.borrow().clone();
        let dispatch = {
            let mut state = self.inner.state.borrow_mut();
            match callback {
                Some(callback) if !state.skip_next => {
                    let options = CompareOptions {
                        key: self.inner.compare_by.borrow().clone(),
                    };
                    let change = compare(&value, &state.old_value, &options);
                    if change.is_unchanged() && !state.force_update {
                        None
                    } else {
                        state.force_update = false;
                        Some((callback, change, state.old_value.clone()))
                    }
                }
                _ => {
                    state.skip_next = false;
                    None
                }
            }
        };

        if let Some((callback, change, old_value)) = dispatch {
            tracing::trace!(
                message = "watchkit.callback",
                watch = self.inner.id,
                expr = self.inner.expression.text()
            );
            let detail = change.is_structural().then_some(&change);
            callback(&value, &old_value, detail);
        }

        let next = baseline(&value, self.inner.change_records.get());
        self.inner.state.borrow_mut().old_value = next;
    }
}

impl PartialEq for Watch {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Watch {}

impl fmt::Debug for Watch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Watch")
            .field("id", &self.inner.id)
            .field("expression", &self.inner.expression)
            .field("bound", &state.context.is_some())
            .field("value", &state.old_value)
            .field("change_records", &self.inner.change_records.get())
            .finish()
    }
}
