#![forbid(unsafe_code)]

//! Value and collection diffing.
//!
//! [`compare`] answers "did this watched value change, and how":
//!
//! - two arrays produce an ordered list of [`Splice`]s,
//! - two plain objects produce an ordered list of [`FieldChange`]s,
//! - anything else produces [`ChangeDescription::Changed`] or
//!   [`ChangeDescription::Unchanged`] by value equality.
//!
//! # Invariants
//!
//! 1. Element-equal arrays and key/value-equal objects are `Unchanged`
//!    regardless of instance identity.
//! 2. Splices are ordered by `index`, non-overlapping, and each `index` is a
//!    position in the **new** array. Applying them in order to the old array
//!    (see [`apply_splices`]) yields an array element-equal to the new one.
//! 3. Field changes list updates and deletes in the old object's key order,
//!    followed by adds in the new object's key order.
//! 4. With a [`KeyExtractor`], array elements are compared by extracted key
//!    only; `removed` still carries the original old elements.
//!
//! # Complexity
//!
//! Common prefixes and suffixes are trimmed in linear time; the remaining
//! window is solved with an LCS table, O(n·m) in the window sizes.

use std::fmt;
use std::rc::Rc;

use crate::value::{ObjectRef, Value};

/// Result of comparing a new value against its baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeDescription {
    /// No difference.
    Unchanged,
    /// No difference detected, but the callback must fire anyway.
    Forced,
    /// The value differs and no structural detail applies.
    Changed,
    /// Array edits, old → new.
    Splices(Vec<Splice>),
    /// Object field edits, old → new.
    Fields(Vec<FieldChange>),
}

impl ChangeDescription {
    #[inline]
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }

    /// Whether this carries a splice or field list.
    #[inline]
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Splices(_) | Self::Fields(_))
    }
}

/// An array edit: at `index` (new-array coordinates), `removed` old elements
/// were replaced by `added_count` new ones.
#[derive(Debug, Clone, PartialEq)]
pub struct Splice {
    pub index: usize,
    pub removed: Vec<Value>,
    pub added_count: usize,
}

/// Kind of object field edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldChangeKind {
    Add,
    Update,
    Delete,
}

/// An object field edit. `old_value` is `Undefined` for adds.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub key: String,
    pub kind: FieldChangeKind,
    pub old_value: Value,
}

/// Maps an array element (and its index) to the key it is compared by.
///
/// Arrays are copied before extraction, so an extractor may read or mutate
/// the arrays being compared.
pub type KeyExtractor = Rc<dyn Fn(&Value, usize) -> Value>;

/// Key extractor reading one field of each element (`Undefined` for elements
/// that are not objects).
#[must_use]
pub fn key_by_field(field: impl Into<String>) -> KeyExtractor {
    let field: String = field.into();
    Rc::new(move |item: &Value, _index: usize| item.get(&field))
}

/// Options for [`compare`].
#[derive(Clone, Default)]
pub struct CompareOptions {
    /// Compare array elements by extracted key instead of by value.
    pub key: Option<KeyExtractor>,
}

impl CompareOptions {
    #[must_use]
    pub fn by_key(key: KeyExtractor) -> Self {
        Self { key: Some(key) }
    }
}

impl fmt::Debug for CompareOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompareOptions")
            .field("key", &self.key.is_some())
            .finish()
    }
}

/// Compare `new` against the baseline `old`.
#[must_use]
pub fn compare(new: &Value, old: &Value, options: &CompareOptions) -> ChangeDescription {
    match (new, old) {
        (Value::Array(a), Value::Array(b)) => {
            if a.ptr_eq(b) {
                return ChangeDescription::Unchanged;
            }
            let (new_items, old_items) = (a.to_vec(), b.to_vec());
            let splices = match &options.key {
                Some(key) => diff_arrays_by_key(&new_items, &old_items, key),
                None => diff_arrays(&new_items, &old_items),
            };
            if splices.is_empty() {
                ChangeDescription::Unchanged
            } else {
                ChangeDescription::Splices(splices)
            }
        }
        (Value::Object(a), Value::Object(b)) => {
            if a.ptr_eq(b) {
                return ChangeDescription::Unchanged;
            }
            let fields = diff_objects(a, b);
            if fields.is_empty() {
                ChangeDescription::Unchanged
            } else {
                ChangeDescription::Fields(fields)
            }
        }
        _ if new.deep_eq(old) => ChangeDescription::Unchanged,
        _ => ChangeDescription::Changed,
    }
}

/// The value a watch stores as its next comparison baseline.
///
/// In change-record mode this is a detached snapshot, so in-place mutation of
/// the live value is still detected on the next compare. Otherwise the live
/// reference itself is kept, and in-place mutation goes unnoticed.
#[must_use]
pub fn baseline(value: &Value, change_records: bool) -> Value {
    if change_records {
        value.snapshot()
    } else {
        value.clone()
    }
}

/// Splices turning `old` into `new`, comparing elements by value.
#[must_use]
pub fn diff_arrays(new: &[Value], old: &[Value]) -> Vec<Splice> {
    edit_script(new.len(), old.len(), |n, o| new[n].deep_eq(&old[o]))
        .into_iter()
        .map(|edit| edit.into_splice(old))
        .collect()
}

/// Splices turning `old` into `new`, comparing elements by extracted key.
#[must_use]
pub fn diff_arrays_by_key(new: &[Value], old: &[Value], key: &KeyExtractor) -> Vec<Splice> {
    let new_keys: Vec<Value> = new.iter().enumerate().map(|(i, v)| key(v, i)).collect();
    let old_keys: Vec<Value> = old.iter().enumerate().map(|(i, v)| key(v, i)).collect();
    edit_script(new.len(), old.len(), |n, o| new_keys[n].deep_eq(&old_keys[o]))
        .into_iter()
        .map(|edit| edit.into_splice(old))
        .collect()
}

/// Field edits turning `old` into `new`.
#[must_use]
pub fn diff_objects(new: &ObjectRef, old: &ObjectRef) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    for (key, old_value) in old.entries() {
        match new.lookup(&key) {
            None => changes.push(FieldChange {
                key,
                kind: FieldChangeKind::Delete,
                old_value,
            }),
            Some(new_value) if !new_value.deep_eq(&old_value) => changes.push(FieldChange {
                key,
                kind: FieldChangeKind::Update,
                old_value,
            }),
            Some(_) => {}
        }
    }
    for key in new.keys() {
        if !old.contains_key(&key) {
            changes.push(FieldChange {
                key,
                kind: FieldChangeKind::Add,
                old_value: Value::Undefined,
            });
        }
    }
    changes
}

/// Replay `splices` over `old`, taking inserted elements from `new`.
#[must_use]
pub fn apply_splices(old: &[Value], new: &[Value], splices: &[Splice]) -> Vec<Value> {
    let mut out = old.to_vec();
    for splice in splices {
        let start = splice.index.min(out.len());
        let end = (start + splice.removed.len()).min(out.len());
        let added = new
            .iter()
            .skip(splice.index)
            .take(splice.added_count)
            .cloned();
        out.splice(start..end, added);
    }
    out
}

// ---------------------------------------------------------------------------
// Edit script
// ---------------------------------------------------------------------------

/// One coalesced run of edits: `old[old_start..old_end]` replaced by
/// `added_count` elements starting at `index` in the new array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Edit {
    index: usize,
    old_start: usize,
    old_end: usize,
    added_count: usize,
}

impl Edit {
    fn into_splice(self, old: &[Value]) -> Splice {
        Splice {
            index: self.index,
            removed: old[self.old_start..self.old_end].to_vec(),
            added_count: self.added_count,
        }
    }
}

fn edit_script(new_len: usize, old_len: usize, eq: impl Fn(usize, usize) -> bool) -> Vec<Edit> {
    let mut prefix = 0;
    while prefix < new_len && prefix < old_len && eq(prefix, prefix) {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < new_len - prefix
        && suffix < old_len - prefix
        && eq(new_len - 1 - suffix, old_len - 1 - suffix)
    {
        suffix += 1;
    }

    let new_window = new_len - prefix - suffix;
    let old_window = old_len - prefix - suffix;
    if new_window == 0 && old_window == 0 {
        return Vec::new();
    }
    if new_window == 0 || old_window == 0 {
        return vec![Edit {
            index: prefix,
            old_start: prefix,
            old_end: prefix + old_window,
            added_count: new_window,
        }];
    }

    // lcs[o * cols + n] = LCS length of old[prefix + o..] and new[prefix + n..]
    // within the window.
    let cols = new_window + 1;
    let mut lcs = vec![0u32; (old_window + 1) * cols];
    for o in (0..old_window).rev() {
        for n in (0..new_window).rev() {
            lcs[o * cols + n] = if eq(prefix + n, prefix + o) {
                lcs[(o + 1) * cols + n + 1] + 1
            } else {
                lcs[(o + 1) * cols + n].max(lcs[o * cols + n + 1])
            };
        }
    }

    let mut edits = Vec::new();
    let mut pending: Option<Edit> = None;
    let (mut o, mut n) = (0, 0);
    while o < old_window || n < new_window {
        if o < old_window && n < new_window && eq(prefix + n, prefix + o) {
            edits.extend(pending.take());
            o += 1;
            n += 1;
            continue;
        }
        let edit = pending.get_or_insert(Edit {
            index: prefix + n,
            old_start: prefix + o,
            old_end: prefix + o,
            added_count: 0,
        });
        let insert = n < new_window
            && (o == old_window || lcs[o * cols + n + 1] >= lcs[(o + 1) * cols + n]);
        if insert {
            edit.added_count += 1;
            n += 1;
        } else {
            edit.old_end += 1;
            o += 1;
        }
    }
    edits.extend(pending);
    edits
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(items: &[&str]) -> Vec<Value> {
        items.iter().map(|s| Value::from(*s)).collect()
    }

    fn arr(items: &[&str]) -> Value {
        Value::from(strs(items))
    }

    #[test]
    fn equal_arrays_of_different_instances_are_unchanged() {
        let change = compare(&arr(&["foo"]), &arr(&["foo"]), &CompareOptions::default());
        assert_eq!(change, ChangeDescription::Unchanged);
    }

    #[test]
    fn append_is_one_splice() {
        let change = compare(&arr(&["foo", "bar"]), &arr(&["foo"]), &CompareOptions::default());
        assert_eq!(
            change,
            ChangeDescription::Splices(vec![Splice {
                index: 1,
                removed: vec![],
                added_count: 1,
            }])
        );
    }

    #[test]
    fn full_replacement_is_one_splice() {
        let change = compare(&arr(&["test"]), &arr(&["foo", "bar"]), &CompareOptions::default());
        assert_eq!(
            change,
            ChangeDescription::Splices(vec![Splice {
                index: 0,
                removed: strs(&["foo", "bar"]),
                added_count: 1,
            }])
        );
    }

    #[test]
    fn separated_edits_produce_separate_splices() {
        let old = strs(&["a", "b", "c", "d", "e"]);
        let new = strs(&["a", "x", "c", "d", "y", "z"]);
        let splices = diff_arrays(&new, &old);
        assert_eq!(splices.len(), 2);
        assert_eq!(splices[0].index, 1);
        assert_eq!(splices[0].removed, strs(&["b"]));
        assert_eq!(splices[0].added_count, 1);
        assert_eq!(splices[1].index, 4);
        assert_eq!(splices[1].removed, strs(&["e"]));
        assert_eq!(splices[1].added_count, 2);
        assert_eq!(apply_splices(&old, &new, &splices), new);
    }

    #[test]
    fn moved_element_round_trips() {
        let old = strs(&["a", "b", "c"]);
        let new = strs(&["c", "a", "b"]);
        let splices = diff_arrays(&new, &old);
        assert_eq!(apply_splices(&old, &new, &splices), new);
    }

    #[test]
    fn scalars_compare_by_value() {
        let opts = CompareOptions::default();
        assert!(compare(&1.into(), &1.into(), &opts).is_unchanged());
        assert_eq!(compare(&2.into(), &1.into(), &opts), ChangeDescription::Changed);
        assert_eq!(
            compare(&arr(&[]), &Value::Undefined, &opts),
            ChangeDescription::Changed
        );
    }

    #[test]
    fn object_field_changes_are_ordered() {
        let old = Value::object([("foo", "foo".into()), ("bar", "~bar~".into())]);
        let new = Value::object([("test", "~foo~".into())]);
        let ChangeDescription::Fields(fields) = compare(&new, &old, &CompareOptions::default())
        else {
            panic!("expected field changes");
        };
        let summary: Vec<(&str, FieldChangeKind)> =
            fields.iter().map(|f| (f.key.as_str(), f.kind)).collect();
        assert_eq!(
            summary,
            vec![
                ("foo", FieldChangeKind::Delete),
                ("bar", FieldChangeKind::Delete),
                ("test", FieldChangeKind::Add),
            ]
        );
        assert_eq!(fields[0].old_value, Value::from("foo"));
        assert_eq!(fields[2].old_value, Value::Undefined);
    }

    #[test]
    fn object_update_reports_old_value() {
        let old = Value::object([("first", "test".into()), ("last", "test".into())]);
        let new = Value::object([("first", "test2".into()), ("last", "test2".into())]);
        let ChangeDescription::Fields(fields) = compare(&new, &old, &CompareOptions::default())
        else {
            panic!("expected field changes");
        };
        assert_eq!(fields.len(), 2);
        assert!(fields.iter().all(|f| f.kind == FieldChangeKind::Update));
    }

    #[test]
    fn key_extractor_ignores_non_key_fields() {
        let opts = CompareOptions::by_key(key_by_field("id"));
        let old = Value::from(serde_json::json!([{"id": 1, "name": "Bob"}]));
        let renamed = Value::from(serde_json::json!([{"id": 1, "name": "Bobby"}]));
        let rekeyed = Value::from(serde_json::json!([{"id": 2, "name": "Bobby"}]));
        assert!(compare(&renamed, &old, &opts).is_unchanged());
        let ChangeDescription::Splices(splices) = compare(&rekeyed, &old, &opts) else {
            panic!("expected splices");
        };
        assert_eq!(splices[0].removed[0].get("name"), Value::from("Bob"));
    }

    #[test]
    fn key_extractor_receives_indexes() {
        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let key: KeyExtractor = Rc::new(move |v: &Value, i: usize| {
            s.borrow_mut().push(i);
            v.clone()
        });
        let _ = diff_arrays_by_key(&strs(&["a", "b"]), &strs(&["a"]), &key);
        assert_eq!(*seen.borrow(), vec![0, 1, 0]);
    }

    #[test]
    fn key_extractor_may_mutate_compared_array() {
        let live = crate::value::ArrayRef::from_vec(strs(&["a", "b"]));
        let grown = live.clone();
        let key: KeyExtractor = Rc::new(move |v: &Value, _: usize| {
            grown.push("z");
            v.clone()
        });
        let change = compare(
            &Value::Array(live.clone()),
            &arr(&["a"]),
            &CompareOptions::by_key(key),
        );
        assert_eq!(
            change,
            ChangeDescription::Splices(vec![Splice {
                index: 1,
                removed: vec![],
                added_count: 1,
            }])
        );
        assert!(live.len() > 2);
    }

    #[test]
    fn baseline_modes() {
        let live = crate::value::ArrayRef::from_vec(strs(&["a"]));
        let value = Value::Array(live.clone());
        let aliased = baseline(&value, false);
        let snap = baseline(&value, true);
        live.push("b");
        let opts = CompareOptions::default();
        assert!(compare(&value, &aliased, &opts).is_unchanged());
        assert!(compare(&value, &snap, &opts).is_structural());
    }
}
