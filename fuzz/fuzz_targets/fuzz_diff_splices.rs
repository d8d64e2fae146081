#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use watchkit_core::diff::{apply_splices, diff_arrays};
use watchkit_core::value::Value;

#[derive(Arbitrary, Debug)]
enum FuzzElement {
    Number(u8),
    Text(bool),
    Null,
}

impl FuzzElement {
    fn to_value(&self) -> Value {
        match self {
            FuzzElement::Number(n) => Value::from(u32::from(*n % 8)),
            FuzzElement::Text(b) => Value::from(if *b { "a" } else { "b" }),
            FuzzElement::Null => Value::Null,
        }
    }
}

fuzz_target!(|input: (Vec<FuzzElement>, Vec<FuzzElement>)| {
    let (old, new) = input;
    if old.len() > 256 || new.len() > 256 {
        return;
    }
    let old: Vec<Value> = old.iter().map(FuzzElement::to_value).collect();
    let new: Vec<Value> = new.iter().map(FuzzElement::to_value).collect();

    let splices = diff_arrays(&new, &old);
    let rebuilt = apply_splices(&old, &new, &splices);
    assert_eq!(rebuilt.len(), new.len());
    assert!(rebuilt.iter().zip(&new).all(|(a, b)| a.deep_eq(b)));
});
