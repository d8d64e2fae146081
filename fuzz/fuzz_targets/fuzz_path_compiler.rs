#![no_main]

use libfuzzer_sys::fuzz_target;
use watchkit_core::expr::{ExpressionCompiler, PathCompiler, Scope};
use watchkit_core::value::{ObjectRef, Value};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if text.len() > 512 {
        return;
    }
    let compiler = PathCompiler::new().with_formatter("id", |value: &Value, _: &[Value]| value.clone());
    let scope = Scope::from(ObjectRef::from_pairs([
        ("a", Value::from(1)),
        ("b", Value::object([("c", Value::from("x"))])),
    ]));
    if let Ok(getter) = compiler.compile(text) {
        let _ = getter(&scope);
    }
    if let Ok(setter) = compiler.compile_setter(text) {
        let _ = setter(&scope, Value::Null);
    }
});
