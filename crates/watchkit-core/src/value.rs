#![forbid(unsafe_code)]

//! Dynamically-typed host values observed by the engine.
//!
//! Watches evaluate expressions against host data that the application mutates
//! freely between passes. [`Value`] models that data: scalars are plain values,
//! while arrays and objects are shared, interior-mutable handles so that a
//! watch baseline and the live host state may alias the same instance.
//!
//! # Identity vs. equality
//!
//! Two notions of "the same value" are exposed:
//!
//! - [`Value::deep_eq`]: value equality. Arrays and objects compare
//!   structurally (object key order is ignored); functions, deferreds and
//!   opaque handles compare by identity. `NaN` equals `NaN` so a watch over a
//!   NaN-valued expression settles instead of firing on every pass.
//! - [`Value::same`]: strict identity. Primitives compare by value, every
//!   reference variant by pointer.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Cyclic data | An array/object reachable from itself | `deep_eq`/`snapshot` recurse without bound |
//! | Missing key | `get` on an absent field | Returns [`Value::Undefined`] |
//! | Non-navigable | `get` on a scalar | Returns [`Value::Undefined`] |

use std::any::Any;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

/// A host value.
#[derive(Clone, Default)]
pub enum Value {
    /// Absent. Distinct from [`Value::Null`]: assigning it removes a key.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(FunctionRef),
    /// A promise-like value that settles once.
    Deferred(Deferred),
    /// Any other host value, compared by identity.
    Opaque(OpaqueRef),
}

impl Value {
    /// Build an array value from owned elements.
    #[must_use]
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Array(ArrayRef::from_iter(items))
    }

    /// Build an object value from `(key, value)` pairs, keeping their order.
    #[must_use]
    pub fn object<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Object(ObjectRef::from_pairs(pairs))
    }

    /// Build a function value.
    #[must_use]
    pub fn function(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self::Function(FunctionRef::new(f))
    }

    #[inline]
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// `true` for `Undefined` and `Null`.
    #[inline]
    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Conventional truthiness: `Undefined`, `Null`, `false`, `0`, `NaN` and
    /// `""` are falsy.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    /// The promise-like interface, if this value exposes one.
    #[must_use]
    pub fn as_deferred(&self) -> Option<&Deferred> {
        match self {
            Self::Deferred(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_opaque(&self) -> Option<&OpaqueRef> {
        match self {
            Self::Opaque(o) => Some(o),
            _ => None,
        }
    }

    /// Short type label, used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Function(_) => "function",
            Self::Deferred(_) => "deferred",
            Self::Opaque(_) => "opaque",
        }
    }

    /// Read a member: an object field, an array index (`"0"`, `"1"`, ...) or
    /// an array's `"length"`. Anything else yields `Undefined`.
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        self.lookup(key).unwrap_or_default()
    }

    /// Like [`get`](Self::get) but distinguishes "absent" from "present and
    /// undefined".
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<Value> {
        match self {
            Self::Object(o) => o.lookup(key),
            Self::Array(a) => {
                if key == "length" {
                    return Some(Self::Number(a.len() as f64));
                }
                key.parse::<usize>().ok().and_then(|i| a.get(i))
            }
            Self::String(s) if key == "length" => Some(Self::Number(s.chars().count() as f64)),
            _ => None,
        }
    }

    /// Write a member. Returns `false` when this value cannot hold members or
    /// the array index is past the end.
    pub fn set_member(&self, key: &str, value: Value) -> bool {
        match self {
            Self::Object(o) => {
                o.assign(key, value);
                true
            }
            Self::Array(a) => match key.parse::<usize>() {
                Ok(i) if i < a.len() => {
                    a.set(i, value);
                    true
                }
                Ok(i) if i == a.len() => {
                    a.push(value);
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// Stringified form used as a map key. `None` for values that cannot key a
    /// map (`Undefined`, `Null`, the empty string, and reference values).
    #[must_use]
    pub fn to_key_string(&self) -> Option<String> {
        match self {
            Self::String(s) if s.is_empty() => None,
            Self::String(s) => Some(s.to_string()),
            Self::Number(n) => Some(format_number(*n)),
            Self::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Value equality. See the module docs.
    #[must_use]
    pub fn deep_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => {
                if a.ptr_eq(b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.deep_eq(y))
            }
            (Self::Object(a), Self::Object(b)) => {
                if a.ptr_eq(b) {
                    return true;
                }
                let (a, b) = (a.inner.borrow(), b.inner.borrow());
                a.len() == b.len()
                    && a.iter().all(|(key, x)| {
                        b.iter()
                            .find(|(k, _)| k == key)
                            .is_some_and(|(_, y)| x.deep_eq(y))
                    })
            }
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Deferred(a), Self::Deferred(b)) => a.ptr_eq(b),
            (Self::Opaque(a), Self::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Strict identity. See the module docs.
    #[must_use]
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Deferred(a), Self::Deferred(b)) => a.ptr_eq(b),
            (Self::Opaque(a), Self::Opaque(b)) => a.ptr_eq(b),
            (Self::Array(_) | Self::Object(_), _) | (_, Self::Array(_) | Self::Object(_)) => false,
            _ => self.deep_eq(other),
        }
    }

    /// Deep, detached copy of arrays and objects. Other variants are shared.
    ///
    /// Mutating the live value afterwards never changes the snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        match self {
            Self::Array(a) => Self::Array(a.borrow().iter().map(Value::snapshot).collect()),
            Self::Object(o) => Self::Object(ObjectRef::from_pairs(
                o.inner.borrow().iter().map(|(k, v)| (k.clone(), v.snapshot())),
            )),
            other => other.clone(),
        }
    }

    /// Convert to JSON. Functions, deferreds, opaque handles and non-finite
    /// numbers become `null`; `Undefined` object fields are dropped.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Undefined | Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(s) => serde_json::Value::String(s.to_string()),
            Self::Array(a) => serde_json::Value::Array(a.borrow().iter().map(Value::to_json).collect()),
            Self::Object(o) => serde_json::Value::Object(
                o.inner
                    .borrow()
                    .iter()
                    .filter(|(_, v)| !v.is_undefined())
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Function(_) | Self::Deferred(_) | Self::Opaque(_) => serde_json::Value::Null,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Array(a) => f.debug_list().entries(a.borrow().iter()).finish(),
            Self::Object(o) => {
                let fields = o.inner.borrow();
                let mut map = f.debug_map();
                for (k, v) in fields.iter() {
                    map.entry(k, v);
                }
                map.finish()
            }
            Self::Function(_) => f.write_str("<function>"),
            Self::Deferred(d) => write!(f, "<deferred {}>", d.state_label()),
            Self::Opaque(_) => f.write_str("<opaque>"),
        }
    }
}

/// String conversion in the usual dynamic-language manner: arrays join with
/// `,`, objects print as `[object Object]`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => f.write_str(s),
            Self::Array(a) => {
                for (i, item) in a.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if !item.is_nullish() {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
            Self::Object(_) => f.write_str("[object Object]"),
            Self::Function(_) => f.write_str("[function]"),
            Self::Deferred(_) => f.write_str("[deferred]"),
            Self::Opaque(_) => f.write_str("[opaque]"),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(ArrayRef::from_vec(items))
    }
}

impl From<ArrayRef> for Value {
    fn from(a: ArrayRef) -> Self {
        Self::Array(a)
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Self::Object(o)
    }
}

impl From<Deferred> for Value {
    fn from(d: Deferred) -> Self {
        Self::Deferred(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Undefined, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::from(s),
            serde_json::Value::Array(items) => Self::array(items.into_iter().map(Value::from)),
            serde_json::Value::Object(fields) => {
                Self::object(fields.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ArrayRef
// ---------------------------------------------------------------------------

/// Shared, mutable array. Cloning aliases the same instance.
#[derive(Clone, Default)]
pub struct ArrayRef {
    inner: Rc<RefCell<Vec<Value>>>,
}

impl ArrayRef {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(items)),
        }
    }

    /// Borrow the elements.
    ///
    /// # Panics
    ///
    /// Panics if the array is mutably borrowed (a mutation is in progress on
    /// the same instance).
    pub fn borrow(&self) -> Ref<'_, Vec<Value>> {
        self.inner.borrow()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.borrow().get(index).cloned()
    }

    /// Overwrite an element. Out-of-range indexes are ignored.
    pub fn set(&self, index: usize, value: Value) {
        if let Some(slot) = self.inner.borrow_mut().get_mut(index) {
            *slot = value;
        }
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.inner.borrow_mut().push(value.into());
    }

    pub fn pop(&self) -> Option<Value> {
        self.inner.borrow_mut().pop()
    }

    /// Insert at `index`, clamped to the current length.
    pub fn insert(&self, index: usize, value: impl Into<Value>) {
        let mut items = self.inner.borrow_mut();
        let index = index.min(items.len());
        items.insert(index, value.into());
    }

    pub fn remove(&self, index: usize) -> Option<Value> {
        let mut items = self.inner.borrow_mut();
        (index < items.len()).then(|| items.remove(index))
    }

    /// Replace the whole contents in place (identity is preserved).
    pub fn replace(&self, items: Vec<Value>) {
        *self.inner.borrow_mut() = items;
    }

    /// Pointer identity.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl FromIterator<Value> for ArrayRef {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.borrow().iter()).finish()
    }
}

// ---------------------------------------------------------------------------
// ObjectRef
// ---------------------------------------------------------------------------

/// Shared, mutable object with insertion-ordered keys. Cloning aliases the
/// same instance.
#[derive(Clone, Default)]
pub struct ObjectRef {
    inner: Rc<RefCell<Vec<(String, Value)>>>,
}

impl ObjectRef {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_pairs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        let obj = Self::new();
        for (k, v) in pairs {
            obj.insert(k, v);
        }
        obj
    }

    /// Field value, or `Undefined` when absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        self.lookup(key).unwrap_or_default()
    }

    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<Value> {
        self.inner
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.borrow().iter().any(|(k, _)| k == key)
    }

    /// Insert or overwrite, returning the previous value. New keys go last.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        let mut fields = self.inner.borrow_mut();
        if let Some((_, slot)) = fields.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(slot, value));
        }
        fields.push((key, value));
        None
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut fields = self.inner.borrow_mut();
        let index = fields.iter().position(|(k, _)| k == key)?;
        Some(fields.remove(index).1)
    }

    /// Computed-property assignment: `Undefined` deletes the key so that
    /// "absent" stays distinguishable from "present but falsy".
    pub fn assign(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        if value.is_undefined() {
            self.remove(key);
        } else {
            self.insert(key, value);
        }
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().iter().map(|(k, _)| k.clone()).collect()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.inner.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().clear();
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Value::Object(self.clone()), f)
    }
}

// ---------------------------------------------------------------------------
// FunctionRef / OpaqueRef
// ---------------------------------------------------------------------------

/// A host callable.
#[derive(Clone)]
pub struct FunctionRef {
    f: Rc<dyn Fn(&[Value]) -> Value>,
}

impl FunctionRef {
    pub fn new(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self { f: Rc::new(f) }
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.f)(args)
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &FunctionRef) -> bool {
        Rc::ptr_eq(&self.f, &other.f)
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FunctionRef")
    }
}

/// Any other host value, compared by identity.
#[derive(Clone)]
pub struct OpaqueRef {
    inner: Rc<dyn Any>,
}

impl OpaqueRef {
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            inner: Rc::new(value),
        }
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &OpaqueRef) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for OpaqueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OpaqueRef")
    }
}

// ---------------------------------------------------------------------------
// Deferred
// ---------------------------------------------------------------------------

type Continuation = Box<dyn FnOnce(Value)>;

enum DeferredState {
    Pending(Vec<(Continuation, Continuation)>),
    Resolved(Value),
    Rejected(Value),
}

/// Single-threaded promise-like value.
///
/// Settles at most once. Continuations registered with [`then`](Self::then)
/// run on settlement, in registration order, or immediately when the deferred
/// has already settled.
#[derive(Clone)]
pub struct Deferred {
    inner: Rc<RefCell<DeferredState>>,
}

impl Default for Deferred {
    fn default() -> Self {
        Self::new()
    }
}

impl Deferred {
    /// A pending deferred.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(DeferredState::Pending(Vec::new()))),
        }
    }

    #[must_use]
    pub fn resolved(value: impl Into<Value>) -> Self {
        let d = Self::new();
        d.resolve(value);
        d
    }

    #[must_use]
    pub fn rejected(reason: impl Into<Value>) -> Self {
        let d = Self::new();
        d.reject(reason);
        d
    }

    /// Resolve. Returns `false` if already settled.
    pub fn resolve(&self, value: impl Into<Value>) -> bool {
        self.settle(Ok(value.into()))
    }

    /// Reject. Returns `false` if already settled.
    pub fn reject(&self, reason: impl Into<Value>) -> bool {
        self.settle(Err(reason.into()))
    }

    fn settle(&self, outcome: Result<Value, Value>) -> bool {
        let waiters = {
            let mut state = self.inner.borrow_mut();
            let DeferredState::Pending(waiters) = &mut *state else {
                return false;
            };
            let waiters = std::mem::take(waiters);
            *state = match &outcome {
                Ok(v) => DeferredState::Resolved(v.clone()),
                Err(e) => DeferredState::Rejected(e.clone()),
            };
            waiters
        };
        // Continuations run with no borrow held; they may register more.
        for (on_ok, on_err) in waiters {
            match &outcome {
                Ok(v) => on_ok(v.clone()),
                Err(e) => on_err(e.clone()),
            }
        }
        true
    }

    /// Attach success/failure continuations.
    pub fn then(&self, on_ok: impl FnOnce(Value) + 'static, on_err: impl FnOnce(Value) + 'static) {
        let settled = {
            let mut state = self.inner.borrow_mut();
            match &mut *state {
                DeferredState::Pending(waiters) => {
                    waiters.push((Box::new(on_ok), Box::new(on_err)));
                    return;
                }
                DeferredState::Resolved(v) => Ok(v.clone()),
                DeferredState::Rejected(e) => Err(e.clone()),
            }
        };
        match settled {
            Ok(v) => on_ok(v),
            Err(e) => on_err(e),
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(*self.inner.borrow(), DeferredState::Pending(_))
    }

    fn state_label(&self) -> &'static str {
        match *self.inner.borrow() {
            DeferredState::Pending(_) => "pending",
            DeferredState::Resolved(_) => "resolved",
            DeferredState::Rejected(_) => "rejected",
        }
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Deferred) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deferred({})", self.state_label())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
