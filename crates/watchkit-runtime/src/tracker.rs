#![forbid(unsafe_code)]

//! Collection tracking: per-member add/remove events for a collection-valued
//! expression.
//!
//! A tracker is a watch in change-record mode whose callback turns the
//! change description into member events:
//!
//! | Change | Events |
//! |--------|--------|
//! | Splices | `on_remove` for each removed element no longer present, then `on_add` for each added element not present before |
//! | Field changes | `on_remove(old_value)` unless it was null/undefined, then `on_add(new_value)` unless null/undefined |
//! | No detail (first bind, forced sync, type transition) | `on_remove` for every prior member, then `on_add` for every current member |
//!
//! All removals of a change are reported before any addition, so an element
//! that merely moved inside an array fires neither.
//!
//! "Present" means value-equal, or key-equal when the watch compares by key.

use std::fmt;
use std::rc::Rc;

use watchkit_core::diff::{ChangeDescription, KeyExtractor, Splice};
use watchkit_core::expr::Expression;
use watchkit_core::value::Value;

use crate::error::Result;
use crate::registry::Registry;
use crate::watch::Watch;

/// Position of a member in its collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberKey {
    Index(usize),
    Name(String),
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Member event callback: `(member, key)`.
pub type MemberCallback = Rc<dyn Fn(&Value, &MemberKey)>;

/// A member callback that ignores its events.
#[must_use]
pub fn ignore_members() -> MemberCallback {
    Rc::new(|_: &Value, _: &MemberKey| {})
}

/// Create a detached tracker watch over `expression`.
pub fn track_members(
    registry: &Registry,
    expression: impl Into<Expression>,
    on_add: MemberCallback,
    on_remove: MemberCallback,
) -> Result<Watch> {
    let watch = registry.create_watch_cyclic(expression, move |me| {
        let me = me.clone();
        Rc::new(
            move |source: &Value, old: &Value, detail: Option<&ChangeDescription>| {
                let key = me.upgrade().and_then(|watch| watch.compare_by());
                dispatch_members(&*on_add, &*on_remove, source, old, detail, key.as_ref());
            },
        )
    })?;
    watch.set_change_records(true);
    Ok(watch)
}

/// Turn one tracker callback into member events.
pub(crate) fn dispatch_members(
    on_add: &dyn Fn(&Value, &MemberKey),
    on_remove: &dyn Fn(&Value, &MemberKey),
    source: &Value,
    old: &Value,
    detail: Option<&ChangeDescription>,
    key: Option<&KeyExtractor>,
) {
    let events = MemberEvents { on_add, on_remove };
    match detail {
        Some(ChangeDescription::Splices(splices)) => {
            events.splices(source, old, splices, key);
        }
        Some(ChangeDescription::Fields(changes)) => {
            for change in changes.iter().filter(|c| !c.old_value.is_nullish()) {
                events.remove(&change.old_value, MemberKey::Name(change.key.clone()));
            }
            for change in changes {
                let value = source.get(&change.key);
                if !value.is_nullish() {
                    events.add(&value, MemberKey::Name(change.key.clone()));
                }
            }
        }
        _ => {
            for (member, key) in members(old) {
                events.remove(&member, key);
            }
            for (member, key) in members(source) {
                events.add(&member, key);
            }
        }
    }
}

struct MemberEvents<'a> {
    on_add: &'a dyn Fn(&Value, &MemberKey),
    on_remove: &'a dyn Fn(&Value, &MemberKey),
}

impl MemberEvents<'_> {
    fn add(&self, member: &Value, key: MemberKey) {
        (self.on_add)(member, &key);
    }

    fn remove(&self, member: &Value, key: MemberKey) {
        (self.on_remove)(member, &key);
    }

    fn splices(&self, source: &Value, old: &Value, splices: &[Splice], key: Option<&KeyExtractor>) {
        let new_items = source.as_array().map(|a| a.to_vec()).unwrap_or_default();
        let old_items = old.as_array().map(|a| a.to_vec()).unwrap_or_default();
        let identify = |items: &[Value]| -> Vec<Value> {
            match key {
                Some(key) => items.iter().enumerate().map(|(i, v)| key(v, i)).collect(),
                None => items.to_vec(),
            }
        };
        let new_ids = identify(&new_items);
        let old_ids = identify(&old_items);
        let in_new = |id: &Value| new_ids.iter().any(|n| n.deep_eq(id));
        let in_old = |id: &Value| old_ids.iter().any(|o| o.deep_eq(id));

        // Splice indexes are in new-array coordinates; `shift` converts them
        // back to old-array positions.
        let mut shift: isize = 0;
        for splice in splices {
            let old_start = (splice.index as isize - shift).max(0) as usize;
            for (offset, member) in splice.removed.iter().enumerate() {
                let present = old_ids
                    .get(old_start + offset)
                    .is_some_and(|id| in_new(id));
                if !present {
                    self.remove(member, MemberKey::Index(splice.index + offset));
                }
            }
            shift += splice.added_count as isize - splice.removed.len() as isize;
        }
        for splice in splices {
            for offset in 0..splice.added_count {
                let index = splice.index + offset;
                let (Some(member), Some(id)) = (new_items.get(index), new_ids.get(index)) else {
                    continue;
                };
                if !in_old(id) {
                    self.add(member, MemberKey::Index(index));
                }
            }
        }
    }
}

/// Members of an array (every element) or object (non-null fields).
fn members(value: &Value) -> Vec<(Value, MemberKey)> {
    match value {
        Value::Array(items) => items
            .to_vec()
            .into_iter()
            .enumerate()
            .map(|(i, v)| (v, MemberKey::Index(i)))
            .collect(),
        Value::Object(object) => object
            .entries()
            .into_iter()
            .filter(|(_, v)| !v.is_nullish())
            .map(|(k, v)| (v, MemberKey::Name(k)))
            .collect(),
        _ => Vec::new(),
    }
}
