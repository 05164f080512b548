//! Shared fixture types for integration tests
#![allow(dead_code)]

use mlua::{Lua, MultiValue, Value as LuaValue};
use moonbridge::{
    wrap_with, Data, Error, Field, Method, Receiver, ReflectOptions, Signature, Type, Value,
};

/// `Person { Name string; Age int; Friend *Person }` with `Hello`, `String`,
/// `IncreaseAge` (pointer) and `AddNumbers` (pointer, raw)
pub fn person_type() -> Type {
    let person = Type::recursive("Person", |this| {
        Type::structure(vec![
            Field::new("Name", Type::string()),
            Field::new("Age", Type::int()),
            Field::new("Friend", Type::ptr(this)),
        ])
    });

    person.add_method(Method::new(
        "Hello",
        Receiver::Value,
        Signature::new(vec![], vec![Type::string()]),
        |_, this, _| Ok(vec![Value::from(format!("Hello, {}", name_of(this)))]),
    ));
    person.add_method(Method::new(
        "String",
        Receiver::Value,
        Signature::new(vec![], vec![Type::string()]),
        |_, this, _| {
            let age = this.field("Age").and_then(Value::as_int).unwrap_or(0);
            Ok(vec![Value::from(format!("{} ({})", name_of(this), age))])
        },
    ));
    person.add_method(Method::new(
        "IncreaseAge",
        Receiver::Pointer,
        Signature::new(vec![], vec![]),
        |_, this, _| {
            let ptr = this.as_pointer().ok_or(Error::NilDereference)?;
            let current = ptr.get();
            let age = current.field("Age").and_then(Value::as_int).unwrap_or(0);
            ptr.set(current.with_field("Age", Value::from(age + 1))?);
            Ok(vec![])
        },
    ));
    person.add_method(Method::raw("AddNumbers", Receiver::Pointer, |lua, this, args| {
        let name = this.elem().map(|p| name_of(&p)).unwrap_or_default();
        let sum: i64 = args
            .iter()
            .filter_map(|arg| match arg {
                LuaValue::Integer(i) => Some(*i),
                LuaValue::Number(n) => Some(*n as i64),
                _ => None,
            })
            .sum();
        let text = lua.create_string(format!("{name} counts: {sum}"))?;
        Ok(MultiValue::from_vec(vec![LuaValue::String(text)]))
    }));
    person
}

fn name_of(person: &Value) -> String {
    person
        .field("Name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub fn person_value(ty: &Type, name: &str, age: i64) -> Value {
    ty.zero()
        .with_field("Name", name.into())
        .and_then(|p| p.with_field("Age", age.into()))
        .unwrap()
}

/// `Family { Mother Person; Father Person; Children []Person }`
pub fn family_type(person: &Type) -> Type {
    Type::named(
        "Family",
        Type::structure(vec![
            Field::new("Mother", person.clone()),
            Field::new("Father", person.clone()),
            Field::new("Children", Type::slice(person)),
        ]),
    )
}

/// Types for transparent-pointer scenarios
pub struct Transparent {
    /// `Leaf { Str *string; Num *int }`
    pub leaf: Type,
    /// `Root { B *Leaf; List []string; Ptr *string; Leaves []Leaf }`
    pub root: Type,
}

impl Transparent {
    pub fn new() -> Self {
        let leaf = Type::named(
            "Leaf",
            Type::structure(vec![
                Field::new("Str", Type::ptr(&Type::string())),
                Field::new("Num", Type::ptr(&Type::int())),
            ]),
        );
        let root = Type::named(
            "Root",
            Type::structure(vec![
                Field::new("B", Type::ptr(&leaf)),
                Field::new("List", Type::slice(&Type::string())),
                Field::new("Ptr", Type::ptr(&Type::string())),
                Field::new("Leaves", Type::slice(&leaf)),
            ]),
        );
        Self { leaf, root }
    }

    pub fn leaf_with_str(&self, s: &str) -> Value {
        self.leaf
            .zero()
            .with_field("Str", Value::new_pointer(s.into()))
            .unwrap()
    }
}

/// `Hidden { Name string "name"; Name2 string "Name"; Str string; Hidden bool (hidden) }`
pub fn hidden_type() -> Type {
    Type::named(
        "Hidden",
        Type::structure(vec![
            Field::new("Name", Type::string()).rename("name"),
            Field::new("Name2", Type::string()).rename("Name"),
            Field::new("Str", Type::string()),
            Field::new("Hidden", Type::bool()).hidden(),
        ]),
    )
}

/// `SliceAlias []string` with `Len` and pointer method `Append(...string)`
pub fn slice_alias_type() -> Type {
    let alias = Type::named("SliceAlias", Type::slice(&Type::string()));
    alias.add_method(Method::new(
        "Len",
        Receiver::Value,
        Signature::new(vec![], vec![Type::int()]),
        |_, this, _| Ok(vec![Value::from(this.len() as i64)]),
    ));
    alias.add_method(Method::new(
        "Append",
        Receiver::Pointer,
        Signature::new(vec![], vec![]).with_variadic(Type::string()),
        |_, this, args| {
            let ptr = this.as_pointer().ok_or(Error::NilDereference)?;
            let current = ptr.get();
            if let Some(slice) = current.as_slice() {
                let grown = slice.append(&Type::string(), args.to_vec());
                ptr.set(Value::typed(current.ty(), Data::Slice(Some(grown)))?);
            }
            Ok(vec![])
        },
    ));
    alias
}

/// `MapAlias map[string]int` with `Y() int`
pub fn map_alias_type() -> Type {
    let alias = Type::named("MapAlias", Type::map(&Type::string(), &Type::int()));
    alias.add_method(Method::new(
        "Y",
        Receiver::Value,
        Signature::new(vec![], vec![Type::int()]),
        |_, _, _| Ok(vec![Value::from(1)]),
    ));
    alias
}

/// `ChanAlias chan string` with `Test() string`
pub fn chan_alias_type() -> Type {
    let alias = Type::named("ChanAlias", Type::chan(&Type::string()));
    alias.add_method(Method::new(
        "Test",
        Receiver::Value,
        Signature::new(vec![], vec![Type::string()]),
        |_, _, _| Ok(vec![Value::from("Test")]),
    ));
    alias
}

pub fn set(lua: &Lua, name: &str, value: Value, options: ReflectOptions) {
    lua.globals()
        .set(name, wrap_with(lua, value, options).unwrap())
        .unwrap();
}

/// Message of the error raised by `chunk`
pub fn error_of(lua: &Lua, chunk: &str) -> String {
    lua.load(chunk).exec().unwrap_err().to_string()
}
