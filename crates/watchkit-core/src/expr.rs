#![forbid(unsafe_code)]

//! Expression compiler seam.
//!
//! Watches never interpret expression text themselves. They hold an
//! [`Expression`] and ask an [`ExpressionCompiler`] for a [`Getter`] (and, on
//! the first `set`, a [`Setter`]). Hosts with a real expression language plug
//! in their own compiler; [`PathCompiler`] is the small default.
//!
//! # PathCompiler grammar
//!
//! ```text
//! expr    := sum ( '|' name ( ':' term )* )*
//! sum     := unary ( '+' unary )*
//! unary   := '!'* term
//! term    := literal | defined | path [ '()' ]
//! literal := true | false | null | undefined | number | 'text' | "text"
//! path    := segment ( '.' segment )*
//! ```
//!
//! - The first path segment resolves against the scope root, then the
//!   compiler's globals. In a [`Scope::Member`] the root is the item and
//!   `$owner` names the owning target.
//! - A trailing `()` calls the resolved function with no arguments.
//! - `+` concatenates when either side is a string, otherwise adds numbers.
//! - Only a bare path is assignable.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Blank text | `""` or whitespace | [`ExprError::Empty`] |
//! | Bad token | Anything outside the grammar | [`ExprError::Parse`] |
//! | Unknown formatter | `a \| nope` | [`ExprError::UnknownFormatter`] |
//! | Setter on non-path | `compile_setter("!a")` | [`ExprError::NotAssignable`] |
//! | Write into scalar | Parent of the last segment holds no members | [`ExprError::NotWritable`] at call time |

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{ExprError, Result};
use crate::value::{ObjectRef, Value};

/// Evaluation context an expression runs against.
#[derive(Debug, Clone)]
pub enum Scope {
    /// A plain host value, usually a target object.
    Value(Value),
    /// A collection member projected on behalf of an owning target.
    Member { item: Value, owner: Value },
}

impl Scope {
    /// The value bare names resolve against.
    #[must_use]
    pub fn root(&self) -> &Value {
        match self {
            Self::Value(value) => value,
            Self::Member { item, .. } => item,
        }
    }

    #[must_use]
    pub fn owner(&self) -> Option<&Value> {
        match self {
            Self::Value(_) => None,
            Self::Member { owner, .. } => Some(owner),
        }
    }

    /// Identity comparison of the scope's values.
    #[must_use]
    pub fn same(&self, other: &Scope) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a.same(b),
            (
                Self::Member { item: a, owner: oa },
                Self::Member { item: b, owner: ob },
            ) => a.same(b) && oa.same(ob),
            _ => false,
        }
    }
}

impl From<Value> for Scope {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<ObjectRef> for Scope {
    fn from(object: ObjectRef) -> Self {
        Self::Value(Value::Object(object))
    }
}

pub type Getter = Rc<dyn Fn(&Scope) -> Value>;
pub type Setter = Rc<dyn Fn(&Scope, Value) -> Result<()>>;
/// Formatter: receives the piped value and its `:`-separated arguments.
pub type Formatter = Rc<dyn Fn(&Value, &[Value]) -> Value>;

/// Turns expression text into getter and setter closures.
pub trait ExpressionCompiler {
    fn compile(&self, expr: &str) -> Result<Getter>;

    fn compile_setter(&self, expr: &str) -> Result<Setter>;
}

/// An expression as handed to a watch: source text, or closures built by the
/// host.
#[derive(Clone)]
pub enum Expression {
    Source(Rc<str>),
    Compiled {
        label: Rc<str>,
        getter: Getter,
        setter: Option<Setter>,
    },
}

impl Expression {
    #[must_use]
    pub fn source(text: impl Into<Rc<str>>) -> Self {
        Self::Source(text.into())
    }

    /// A host closure. `label` only appears in logs and `Debug` output.
    #[must_use]
    pub fn getter(label: impl Into<Rc<str>>, f: impl Fn(&Scope) -> Value + 'static) -> Self {
        Self::Compiled {
            label: label.into(),
            getter: Rc::new(f),
            setter: None,
        }
    }

    /// Attach a setter to a closure expression. No effect on source text.
    #[must_use]
    pub fn with_setter(self, f: impl Fn(&Scope, Value) -> Result<()> + 'static) -> Self {
        match self {
            Self::Compiled { label, getter, .. } => Self::Compiled {
                label,
                getter,
                setter: Some(Rc::new(f)),
            },
            source => source,
        }
    }

    /// Source text, or the label of a closure expression.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Source(text) => text,
            Self::Compiled { label, .. } => label,
        }
    }

    pub fn compile(&self, compiler: &dyn ExpressionCompiler) -> Result<Getter> {
        match self {
            Self::Source(text) => compiler.compile(text),
            Self::Compiled { getter, .. } => Ok(Rc::clone(getter)),
        }
    }

    pub fn compile_setter(&self, compiler: &dyn ExpressionCompiler) -> Result<Setter> {
        match self {
            Self::Source(text) => compiler.compile_setter(text),
            Self::Compiled {
                setter: Some(setter),
                ..
            } => Ok(Rc::clone(setter)),
            Self::Compiled { label, .. } => Err(ExprError::not_assignable(label.as_ref())),
        }
    }
}

impl From<&str> for Expression {
    fn from(text: &str) -> Self {
        Self::source(text)
    }
}

impl From<String> for Expression {
    fn from(text: String) -> Self {
        Self::source(text)
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(text) => f.debug_tuple("Source").field(text).finish(),
            Self::Compiled { label, setter, .. } => f
                .debug_struct("Compiled")
                .field("label", label)
                .field("settable", &setter.is_some())
                .finish(),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

// ---------------------------------------------------------------------------
// PathCompiler
// ---------------------------------------------------------------------------

/// Default compiler: paths, literals, negation, concatenation, formatters.
#[derive(Clone, Default)]
pub struct PathCompiler {
    globals: ObjectRef,
    formatters: HashMap<String, Formatter>,
    defined: HashMap<String, Getter>,
}

impl PathCompiler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a global. Globals are live: later writes through
    /// [`globals`](Self::globals) are seen by already-compiled expressions.
    #[must_use]
    pub fn with_global(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.globals.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_formatter(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&Value, &[Value]) -> Value + 'static,
    ) -> Self {
        self.formatters.insert(name.into(), Rc::new(f));
        self
    }

    /// Register a named expression implemented by a closure. The name is then
    /// usable as a term anywhere a path is.
    #[must_use]
    pub fn define(mut self, name: impl Into<String>, f: impl Fn(&Scope) -> Value + 'static) -> Self {
        self.defined.insert(name.into(), Rc::new(f));
        self
    }

    #[must_use]
    pub fn globals(&self) -> &ObjectRef {
        &self.globals
    }

    fn compile_term(&self, expr: &str, term: &str) -> Result<Getter> {
        if let Some(value) = parse_literal(term) {
            return Ok(Rc::new(move |_: &Scope| value.clone()));
        }
        if let Some(getter) = self.defined.get(term) {
            return Ok(Rc::clone(getter));
        }
        let (path, call) = match term.strip_suffix("()") {
            Some(path) => (path.trim_end(), true),
            None => (term, false),
        };
        let segments = parse_path(expr, path)?;
        let globals = self.globals.clone();
        Ok(Rc::new(move |scope: &Scope| {
            let value = resolve_path(scope, &globals, &segments);
            match (call, value.as_function()) {
                (true, Some(function)) => function.call(&[]),
                (true, None) => Value::Undefined,
                (false, _) => value,
            }
        }))
    }

    fn compile_unary(&self, expr: &str, text: &str) -> Result<Getter> {
        let trimmed = text.trim();
        let body = trimmed.trim_start_matches('!');
        let negations = trimmed.len() - body.len();
        let body = body.trim();
        if body.is_empty() {
            return Err(ExprError::parse(expr, "missing operand"));
        }
        let term = self.compile_term(expr, body)?;
        if negations == 0 {
            return Ok(term);
        }
        Ok(Rc::new(move |scope: &Scope| {
            let truthy = term(scope).truthy();
            Value::Bool(if negations % 2 == 1 { !truthy } else { truthy })
        }))
    }

    fn compile_sum(&self, expr: &str, text: &str) -> Result<Getter> {
        let parts = split_top_level(text, '+');
        let mut operands = parts
            .iter()
            .map(|part| self.compile_unary(expr, part))
            .collect::<Result<Vec<_>>>()?;
        if operands.len() == 1 {
            return Ok(operands.remove(0));
        }
        Ok(Rc::new(move |scope: &Scope| {
            let mut iter = operands.iter();
            let first = iter.next().map(|g| g(scope)).unwrap_or_default();
            iter.fold(first, |acc, g| add(&acc, &g(scope)))
        }))
    }

    fn compile_formatter(&self, expr: &str, text: &str) -> Result<(Formatter, Vec<Getter>)> {
        let mut pieces = split_top_level(text, ':').into_iter();
        let name = pieces.next().unwrap_or_default().trim().to_string();
        if name.is_empty() {
            return Err(ExprError::parse(expr, "missing formatter name"));
        }
        let formatter = self
            .formatters
            .get(&name)
            .cloned()
            .ok_or(ExprError::UnknownFormatter { name })?;
        let args = pieces
            .map(|arg| self.compile_unary(expr, arg))
            .collect::<Result<Vec<_>>>()?;
        Ok((formatter, args))
    }
}

impl fmt::Debug for PathCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathCompiler")
            .field("globals", &self.globals)
            .field("formatters", &self.formatters.keys().collect::<Vec<_>>())
            .field("defined", &self.defined.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ExpressionCompiler for PathCompiler {
    fn compile(&self, expr: &str) -> Result<Getter> {
        if expr.trim().is_empty() {
            return Err(ExprError::Empty);
        }
        let mut stages = split_top_level(expr, '|').into_iter();
        let head = stages.next().unwrap_or_default();
        let base = self.compile_sum(expr, head)?;
        let pipeline = stages
            .map(|stage| self.compile_formatter(expr, stage))
            .collect::<Result<Vec<_>>>()?;
        if pipeline.is_empty() {
            return Ok(base);
        }
        Ok(Rc::new(move |scope: &Scope| {
            pipeline.iter().fold(base(scope), |value, (formatter, args)| {
                let args: Vec<Value> = args.iter().map(|arg| arg(scope)).collect();
                formatter(&value, &args)
            })
        }))
    }

    fn compile_setter(&self, expr: &str) -> Result<Setter> {
        let text = expr.trim();
        if text.is_empty() {
            return Err(ExprError::Empty);
        }
        let plain_path = !text.contains(['|', '+', '!', '(', '\'', '"'])
            && parse_literal(text).is_none()
            && !self.defined.contains_key(text);
        if !plain_path {
            return Err(ExprError::not_assignable(expr));
        }
        let mut segments = parse_path(expr, text)?;
        let last = segments
            .pop()
            .ok_or_else(|| ExprError::parse(expr, "empty path"))?;
        let globals = self.globals.clone();
        let label = expr.to_string();
        Ok(Rc::new(move |scope: &Scope, value: Value| {
            let parent = if segments.is_empty() {
                scope.root().clone()
            } else {
                resolve_path(scope, &globals, &segments)
            };
            if parent.set_member(&last, value) {
                Ok(())
            } else {
                Err(ExprError::NotWritable {
                    expr: label.clone(),
                })
            }
        }))
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Split on `sep` outside quoted strings.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == sep => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            None => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn parse_literal(term: &str) -> Option<Value> {
    match term {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "null" => return Some(Value::Null),
        "undefined" => return Some(Value::Undefined),
        _ => {}
    }
    let bytes = term.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'\'' || first == b'"') && first == last {
            return Some(Value::from(&term[1..term.len() - 1]));
        }
    }
    let numeric_start = term
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '.');
    if numeric_start {
        return term.parse::<f64>().ok().map(Value::Number);
    }
    None
}

fn parse_path(expr: &str, path: &str) -> Result<Vec<String>> {
    path.split('.')
        .map(|segment| {
            let segment = segment.trim();
            let valid = !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '$');
            if valid {
                Ok(segment.to_string())
            } else {
                Err(ExprError::parse(expr, format!("invalid path segment `{segment}`")))
            }
        })
        .collect()
}

fn resolve_path(scope: &Scope, globals: &ObjectRef, segments: &[String]) -> Value {
    let Some((first, rest)) = segments.split_first() else {
        return scope.root().clone();
    };
    let head = match (first.as_str(), scope.owner()) {
        ("$owner", Some(owner)) => Some(owner.clone()),
        _ => scope.root().lookup(first),
    };
    let head = head.or_else(|| globals.lookup(first)).unwrap_or_default();
    rest.iter().fold(head, |value, segment| value.get(segment))
}

fn add(left: &Value, right: &Value) -> Value {
    if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
        return Value::from(format!("{left}{right}"));
    }
    Value::Number(to_number(left) + to_number(right))
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => *n,
        _ => f64::NAN,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
