//! End-to-end computed properties on plain host objects.

use std::cell::Cell;
use std::rc::Rc;

use watchkit_core::{ChangeDescription, Deferred, ObjectRef, PathCompiler, Scope, Value};
use watchkit_runtime::{
    Computed, ComputedProperty, MapProperty, ObserveError, Registry, Result, Watch, WatchSet,
};

fn object(json: serde_json::Value) -> ObjectRef {
    match Value::from(json) {
        Value::Object(object) => object,
        other => panic!("expected object, got {other:?}"),
    }
}

fn upper(value: &Value, _: &[Value]) -> Value {
    match value.as_str() {
        Some(text) => Value::from(text.to_uppercase()),
        None => value.clone(),
    }
}

/// `childrenFullNames[children[0].getId()]`, which the path grammar cannot
/// express directly.
fn first_child_full_name(scope: &Scope) -> Value {
    let root = scope.root();
    let first = root
        .get("children")
        .as_array()
        .and_then(|children| children.get(0))
        .unwrap_or_default();
    let id = first
        .get("getId")
        .as_function()
        .map(|get_id| get_id.call(&[]))
        .unwrap_or_default();
    id.to_key_string()
        .map(|key| root.get("childrenFullNames").get(&key))
        .unwrap_or_default()
}

fn child(id: i32, name: &str) -> Value {
    Value::object([
        ("getId", Value::function(move |_| Value::from(id))),
        ("name", Value::from(name)),
    ])
}

#[test]
fn expression_follows_its_inputs() {
    let registry = Registry::new();
    let person = object(serde_json::json!({"firstName": "Bob", "lastName": "Smith"}));
    let set = WatchSet::new(&registry, &person);
    set.computed("fullName", "firstName + ' ' + lastName")
        .expect("attaches");
    assert_eq!(person.get("fullName"), Value::from("Bob Smith"));

    person.insert("firstName", "John");
    registry.run_now().expect("pass");
    assert_eq!(person.get("fullName"), Value::from("John Smith"));
}

#[test]
fn father_and_children() {
    let registry = Registry::builder()
        .compiler(
            PathCompiler::new()
                .with_formatter("upper", upper)
                .define("firstChildFullName", first_child_full_name),
        )
        .build()
        .expect("valid registry");

    let loaded = Rc::new(Cell::new(0));
    let removed = Rc::new(Cell::new(0));
    let father = ObjectRef::from_pairs([
        ("firstName", Value::from("Bob")),
        ("lastName", Value::from("Smith")),
        (
            "children",
            Value::array([child(1, "Joey"), child(3, "Sally"), child(93, "Buddy")]),
        ),
    ]);
    let load_count = Rc::clone(&loaded);
    father.insert(
        "loadData",
        Value::function(move |_| {
            load_count.set(load_count.get() + 1);
            Value::object([(
                "then",
                Value::function(|args: &[Value]| {
                    if let Some(resolve) = args.first().and_then(Value::as_function) {
                        resolve.call(&[Value::from("foobar")]);
                    }
                    Value::Undefined
                }),
            )])
        }),
    );
    let remove_count = Rc::clone(&removed);

    let set = WatchSet::new(&registry, &father);
    set.extend([
        ("test", Computed::expr("!foo")),
        ("fullName", Computed::expr("firstName + ' ' + lastName")),
        ("caps", Computed::expr("fullName | upper")),
        (
            "childrenFullNames",
            MapProperty::new("children")
                .with_key("getId()")
                .with_result("name + ' ' + $owner.lastName")
                .with_cleanup("countRemoved()")
                .into(),
        ),
        ("test2", Computed::if_("!test", "firstChildFullName")),
        ("loadedValue", Computed::when("test", "loadData()")),
        (
            "countRemoved",
            Computed::value(Value::function(move |_| {
                remove_count.set(remove_count.get() + 1);
                Value::Undefined
            })),
        ),
    ])
    .expect("attaches");

    assert_eq!(father.get("test"), Value::from(true));
    assert!(!father.contains_key("test2"));
    assert_eq!(father.get("fullName"), Value::from("Bob Smith"));
    assert_eq!(father.get("caps"), Value::from("BOB SMITH"));
    let names = father.get("childrenFullNames");
    assert_eq!(names.get("1"), Value::from("Joey Smith"));
    assert_eq!(names.get("3"), Value::from("Sally Smith"));
    assert_eq!(names.get("93"), Value::from("Buddy Smith"));
    assert_eq!(loaded.get(), 1);
    assert_eq!(removed.get(), 0);
    assert_eq!(father.get("loadedValue"), Value::from("foobar"));

    father.insert("foo", "Test");
    father.insert("firstName", "John");
    father.insert("lastName", "Gordon");
    registry.run_now().expect("pass");

    assert_eq!(father.get("test"), Value::from(false));
    assert_eq!(father.get("test2"), Value::from("Joey Gordon"));
    assert_eq!(father.get("fullName"), Value::from("John Gordon"));
    assert_eq!(father.get("caps"), Value::from("JOHN GORDON"));
    assert_eq!(names.get("1"), Value::from("Joey Gordon"));
    assert_eq!(names.get("3"), Value::from("Sally Gordon"));
    assert_eq!(names.get("93"), Value::from("Buddy Gordon"));
    assert!(!father.contains_key("loadedValue"));
    assert_eq!(removed.get(), 0);

    father.insert("foo", "Test2");
    registry.run_now().expect("pass");
    assert_eq!(father.get("test2"), Value::from("Joey Gordon"));

    let live = registry.len();
    if let Some(children) = father.get("children").as_array() {
        children.pop();
    }
    registry.run_now().expect("pass");
    let keys = names.as_object().map(ObjectRef::keys).unwrap_or_default();
    assert_eq!(keys, vec!["1".to_string(), "3".to_string()]);
    assert_eq!(removed.get(), 1);
    assert_eq!(registry.len(), live - 1);
}

#[test]
fn map_deletion_tears_down_one_member_watch() {
    let registry = Registry::new();
    let owner = object(serde_json::json!({
        "children": {"1": {"id": 1, "name": "a"}, "2": {"id": 2, "name": "b"}}
    }));
    let set = WatchSet::new(&registry, &owner);
    set.computed("names", Computed::map_to("children", "id", "name"))
        .expect("attaches");
    let before = registry.len();
    assert_eq!(owner.get("names").get("1"), Value::from("a"));

    if let Some(children) = owner.get("children").as_object() {
        children.remove("1");
    }
    registry.run_now().expect("pass");
    assert_eq!(registry.len(), before - 1);
    assert!(owner.get("names").lookup("1").is_none());
    assert_eq!(owner.get("names").get("2"), Value::from("b"));
}

#[test]
fn map_under_falsy_condition_stays_absent() {
    let registry = Registry::new();
    let owner = object(serde_json::json!({
        "ready": false,
        "children": [{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]
    }));
    let set = WatchSet::new(&registry, &owner);
    set.computed("byId", Computed::if_("ready", MapProperty::new("children")))
        .expect("attaches");
    assert!(!owner.contains_key("byId"));

    owner.insert("ready", true);
    registry.run_now().expect("pass");
    assert_eq!(owner.get("byId").get("2").get("name"), Value::from("b"));

    owner.insert("ready", false);
    registry.run_now().expect("pass");
    assert!(!owner.contains_key("byId"));
}

#[test]
fn disable_removes_map_and_enable_restores_it() {
    let registry = Registry::new();
    let owner = object(serde_json::json!({
        "children": [{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]
    }));
    let set = WatchSet::new(&registry, &owner);
    set.computed("names", Computed::map_to("children", "id", "name"))
        .expect("attaches");
    let live = registry.len();
    assert_eq!(owner.get("names").get("1"), Value::from("a"));

    set.disable();
    assert!(!owner.contains_key("names"));
    assert!(registry.is_empty());

    set.enable();
    assert_eq!(owner.get("names").get("2"), Value::from("b"));
    assert_eq!(registry.len(), live);
}

#[test]
fn when_only_runs_once_on_enable() {
    let registry = Registry::new();
    let runs = Rc::new(Cell::new(0));
    let counter = Rc::clone(&runs);
    let target = ObjectRef::from_pairs([(
        "init",
        Value::function(move |_| {
            counter.set(counter.get() + 1);
            Value::from("ready")
        }),
    )]);
    let set = WatchSet::with_enabled(&registry, &target, false);
    set.computed("status", Computed::when_only("init()"))
        .expect("attaches");
    assert_eq!(runs.get(), 0);

    set.enable();
    registry.run_now().expect("pass");
    registry.run_now().expect("pass");
    assert_eq!(runs.get(), 1);
    assert_eq!(target.get("status"), Value::from("ready"));
}

#[test]
fn settlement_after_disable_is_a_no_op() {
    let registry = Registry::new();
    let pending = Deferred::new();
    let source = pending.clone();
    let target = ObjectRef::from_pairs([(
        "load",
        Value::function(move |_| Value::from(source.clone())),
    )]);
    let set = WatchSet::new(&registry, &target);
    set.computed("data", Computed::when_only("load()"))
        .expect("attaches");

    set.disable();
    pending.resolve("late");
    registry.run_now().expect("pass");
    assert!(!target.contains_key("data"));
}

#[test]
fn branch_toggles_with_condition() {
    let registry = Registry::new();
    let target = object(serde_json::json!({"show": false, "label": "hi"}));
    let set = WatchSet::new(&registry, &target);
    set.computed("shown", Computed::if_("show", "label | upper"))
        .expect_err("formatter is not registered");

    set.computed("shown", Computed::if_("show", "label"))
        .expect("attaches");
    assert!(!target.contains_key("shown"));
    target.insert("show", true);
    registry.run_now().expect("pass");
    assert_eq!(target.get("shown"), Value::from("hi"));
}

/// Counts the members of an array into `target[property]`.
struct CountOf(&'static str);

impl ComputedProperty for CountOf {
    fn attach(&self, registry: &Registry, target: &ObjectRef, property: &str) -> Result<Watch> {
        let (target, property) = (target.clone(), property.to_string());
        let watch = registry.create_watch(self.0, move |value: &Value, _: &Value, _: Option<&ChangeDescription>| {
            let count = value.as_array().map_or(0, |items| items.len());
            target.assign(&property, Value::from(count));
        })?;
        watch.set_change_records(true);
        Ok(watch)
    }
}

#[test]
fn custom_property_participates_in_passes() {
    let registry = Registry::new();
    let target = object(serde_json::json!({"items": [1, 2]}));
    let set = WatchSet::new(&registry, &target);
    set.computed("count", Computed::custom(CountOf("items")))
        .expect("attaches");
    assert_eq!(target.get("count"), Value::from(2));

    if let Some(items) = target.get("items").as_array() {
        items.push(3);
    }
    registry.run_now().expect("pass");
    assert_eq!(target.get("count"), Value::from(3));
}

#[test]
fn literal_map_result_is_a_configuration_error() {
    let registry = Registry::new();
    let set = WatchSet::new(&registry, &ObjectRef::new());
    let err = set
        .computed(
            "bad",
            MapProperty::new("items").with_result(Computed::value(0)),
        )
        .expect_err("rejected");
    assert!(matches!(err, ObserveError::InvalidMapResult { .. }));
}
