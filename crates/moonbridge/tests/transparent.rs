//! Transparent pointers and lazy allocation

mod common;

use common::*;
use mlua::Lua;
use moonbridge::{configure, Config, ReflectOptions, Value};

fn root_with_leaf(types: &Transparent, s: &str) -> Value {
    let value = types
        .root
        .zero()
        .with_field("B", Value::new_pointer(types.leaf_with_str(s)))
        .unwrap();
    Value::new_pointer(value)
}

#[test]
fn test_reads_follow_pointers() {
    let lua = Lua::new();
    let types = Transparent::new();
    set(&lua, "a", root_with_leaf(&types, "foo"), ReflectOptions::transparent());

    let text: String = lua.load("return a.B.Str").eval().unwrap();
    assert_eq!(text, "foo");
}

#[test]
fn test_transparent_reads_allocate_nil_fields() {
    let lua = Lua::new();
    let types = Transparent::new();
    let a = Value::new_pointer(types.root.zero());
    set(&lua, "a", a.clone(), ReflectOptions::transparent());

    let (text, ptr, cap): (String, String, i64) = lua
        .load("return a.B.Str, a.Ptr, a.List:capacity()")
        .eval()
        .unwrap();
    assert_eq!(text, "");
    assert_eq!(ptr, "");
    assert_eq!(cap, 10);

    let stored = a.elem().unwrap();
    assert!(!stored.field("B").unwrap().is_nil());
    assert!(!stored.field("Ptr").unwrap().is_nil());
    assert!(!stored.field("List").unwrap().is_nil());

    lua.load("a.B.Num = 3").exec().unwrap();
    let leaf = a.elem().unwrap().field("B").unwrap().elem().unwrap();
    assert_eq!(leaf.field("Num").unwrap().elem().unwrap().as_int(), Some(3));
}

#[test]
fn test_auto_populate_allocates_on_read() {
    let lua = Lua::new();
    let types = Transparent::new();
    let a = Value::new_pointer(types.root.zero());
    set(&lua, "a", a.clone(), ReflectOptions::auto_populated());

    let (text, len, cap): (String, i64, i64) = lua
        .load("return a.B.Str, #a.List, a.List:capacity()")
        .eval()
        .unwrap();
    assert_eq!(text, "");
    assert_eq!(len, 0);
    assert_eq!(cap, 10);

    lua.load("a.B.Num = 5; a.List = a.List:append('x', 'y')")
        .exec()
        .unwrap();
    let stored = a.elem().unwrap();
    let leaf = stored.field("B").unwrap().elem().unwrap();
    assert_eq!(leaf.field("Str").unwrap().elem().unwrap().as_str(), Some(""));
    assert_eq!(leaf.field("Num").unwrap().elem().unwrap().as_int(), Some(5));
    assert_eq!(stored.field("List").unwrap().to_string(), "[x y]");
}

#[test]
fn test_slice_prealloc_follows_config() {
    let lua = Lua::new();
    configure(
        &lua,
        Config {
            slice_prealloc: 3,
            ..Config::default()
        },
    );
    let types = Transparent::new();
    set(&lua, "a", Value::new_pointer(types.root.zero()), ReflectOptions::auto_populated());

    let cap: i64 = lua.load("return a.List:capacity()").eval().unwrap();
    assert_eq!(cap, 3);
}

#[test]
fn test_assignment_copies_pointed_to_value() {
    let lua = Lua::new();
    let types = Transparent::new();
    let a = Value::new_pointer(types.root.zero());
    let source = types.leaf_with_str("foo");
    let pb = Value::new_pointer(types.leaf_with_str("baz"));
    set(&lua, "a", a.clone(), ReflectOptions::transparent());
    set(&lua, "b", source.clone(), ReflectOptions::transparent());
    set(&lua, "pb", pb.clone(), ReflectOptions::transparent());

    lua.load("a.B = b; a.B.Str = 'bar'; a.Ptr = 'hello'").exec().unwrap();
    let (copied, original, ptr): (String, String, String) =
        lua.load("return a.B.Str, b.Str, a.Ptr").eval().unwrap();
    assert_eq!(copied, "bar");
    assert_eq!(original, "foo");
    assert_eq!(ptr, "hello");
    assert_eq!(source.field("Str").unwrap().elem().unwrap().as_str(), Some("foo"));

    lua.load("a.B = -pb; a.B.Str = 'qux'").exec().unwrap();
    let leaf = pb.elem().unwrap();
    assert_eq!(leaf.field("Str").unwrap().elem().unwrap().as_str(), Some("baz"));
    let stored = a.elem().unwrap().field("B").unwrap().elem().unwrap();
    assert_eq!(stored.field("Str").unwrap().elem().unwrap().as_str(), Some("qux"));
}

#[test]
fn test_assignment_type_errors() {
    let lua = Lua::new();
    let types = Transparent::new();
    set(&lua, "a", root_with_leaf(&types, "foo"), ReflectOptions::transparent());

    let err = error_of(&lua, "a.B.Str = a.B");
    assert!(err.contains("could not set field Str: expected type string"), "{err}");
    let err = error_of(&lua, "a.B = 'leaf'");
    assert!(err.contains("could not set field B"), "{err}");
}

#[test]
fn test_no_allocation_without_permission() {
    let types = Transparent::new();
    let immutable = |base: ReflectOptions| ReflectOptions {
        immutable: true,
        ..base
    };

    for options in [
        ReflectOptions::default(),
        immutable(ReflectOptions::transparent()),
        immutable(ReflectOptions::auto_populated()),
    ] {
        let lua = Lua::new();
        let a = Value::new_pointer(types.root.zero());
        set(&lua, "a", a.clone(), options);

        let (b, list): (mlua::Value, mlua::Value) =
            lua.load("return a.B, a.List").eval().unwrap();
        assert!(b.is_nil());
        assert!(list.is_nil());
        let stored = a.elem().unwrap();
        assert!(stored.field("B").unwrap().is_nil());
        assert!(stored.field("List").unwrap().is_nil());
    }
}

#[test]
fn test_unaddressable_struct_never_allocates() {
    let lua = Lua::new();
    let types = Transparent::new();
    set(&lua, "a", types.root.zero(), ReflectOptions::auto_populated());

    let b: mlua::Value = lua.load("return a.B").eval().unwrap();
    assert!(b.is_nil());
}

#[test]
fn test_options_reach_derived_proxies() {
    let lua = Lua::new();
    let types = Transparent::new();
    let leaves = Value::slice(
        &types.leaf,
        vec![types.leaf_with_str("one"), types.leaf_with_str("two")],
    );
    let root = types.root.zero().with_field("Leaves", leaves).unwrap();
    set(&lua, "a", Value::new_pointer(root), ReflectOptions::transparent());

    let (joined, first): (String, String) = lua
        .load(
            r#"
            local out = ""
            for _, leaf in a.Leaves() do out = out .. leaf.Str end
            return out, a.Leaves[1].Str
        "#,
        )
        .eval()
        .unwrap();
    assert_eq!(joined, "onetwo");
    assert_eq!(first, "one");
}

#[test]
fn test_options_are_per_proxy() {
    let lua = Lua::new();
    let types = Transparent::new();
    let root = types
        .root
        .zero()
        .with_field("Ptr", Value::new_pointer("hello".into()))
        .unwrap();
    let shared = Value::new_pointer(root);
    set(&lua, "a", shared.clone(), ReflectOptions::transparent());
    set(&lua, "b", shared, ReflectOptions::default());

    let (plain, through, same): (String, String, bool) = lua
        .load("return a.Ptr, -b.Ptr, a.Ptr == -b.Ptr")
        .eval()
        .unwrap();
    assert_eq!(plain, "hello");
    assert_eq!(through, "hello");
    assert!(same);

    let kind: String = lua.load("return type(b.Ptr)").eval().unwrap();
    assert_eq!(kind, "userdata");
}
