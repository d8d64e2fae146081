#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use watchkit_core::diff::{FieldChangeKind, diff_objects};
use watchkit_core::value::{ObjectRef, Value};

#[derive(Arbitrary, Debug)]
struct FuzzField {
    key: u8,
    value: Option<u8>,
}

fn build(fields: &[FuzzField]) -> ObjectRef {
    let object = ObjectRef::new();
    for field in fields.iter().take(64) {
        let value = field.value.map_or(Value::Null, |v| Value::from(u32::from(v % 4)));
        object.insert(format!("k{}", field.key % 16), value);
    }
    object
}

fuzz_target!(|input: (Vec<FuzzField>, Vec<FuzzField>)| {
    let old = build(&input.0);
    let new = build(&input.1);

    let replay = ObjectRef::from_pairs(old.entries());
    for change in diff_objects(&new, &old) {
        match change.kind {
            FieldChangeKind::Delete => {
                replay.remove(&change.key);
            }
            FieldChangeKind::Add | FieldChangeKind::Update => {
                replay.insert(change.key.clone(), new.get(&change.key));
            }
        }
    }
    for key in new.keys() {
        assert!(replay.get(&key).deep_eq(&new.get(&key)));
    }
    assert_eq!(replay.len(), new.len());
});
