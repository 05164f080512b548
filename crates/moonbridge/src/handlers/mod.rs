//! Metamethod handlers, one set per value kind
//!
//! The proxy userdata forwards each metamethod here. [`Handler::of`] picks the
//! set from the proxied value's kind: pointers to structs use the struct set,
//! pointers to slices and arrays use the sequence set, other pointers use the
//! pointer set.

mod chans;
mod maps;
mod pointers;
mod slices;
mod structs;

use crate::config::ReflectOptions;
use crate::convert::convert_args;
use crate::descriptor::{describe, MethodEntry, TypeDescriptor};
use crate::error::Error;
use crate::proxy::{wrap_results, Proxy, Target};
use crate::reflect::{Data, Kind, MethodBody, Receiver, Type, Value};
use mlua::{Function, Lua, MultiValue, Value as LuaValue};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Handler {
    Struct,
    Sequence,
    Map,
    Chan,
    Pointer,
    Scalar,
}

impl Handler {
    pub(crate) fn of(proxy: &Proxy) -> Self {
        let ty = proxy.ty();
        match ty.kind() {
            Kind::Struct => Handler::Struct,
            Kind::Slice | Kind::Array => Handler::Sequence,
            Kind::Map => Handler::Map,
            Kind::Chan => Handler::Chan,
            Kind::Ptr => match ty.elem().map(Type::kind) {
                Some(Kind::Struct) => Handler::Struct,
                Some(Kind::Slice | Kind::Array) => Handler::Sequence,
                _ => Handler::Pointer,
            },
            _ => Handler::Scalar,
        }
    }
}

pub(crate) fn index(lua: &Lua, proxy: &Proxy, key: LuaValue) -> Result<LuaValue, Error> {
    match Handler::of(proxy) {
        Handler::Struct => structs::index(lua, proxy, &key),
        Handler::Sequence => slices::index(lua, proxy, &key),
        Handler::Map => maps::index(lua, proxy, &key),
        Handler::Chan | Handler::Pointer => method_or_nil(lua, proxy, &key),
        Handler::Scalar => Err(unsupported("index", proxy)),
    }
}

pub(crate) fn new_index(
    _lua: &Lua,
    proxy: &Proxy,
    key: LuaValue,
    value: LuaValue,
) -> Result<(), Error> {
    match Handler::of(proxy) {
        Handler::Struct => structs::new_index(proxy, &key, &value),
        Handler::Sequence => slices::new_index(proxy, &key, &value),
        Handler::Map => maps::new_index(proxy, &key, &value),
        Handler::Chan | Handler::Pointer | Handler::Scalar => {
            Err(unsupported("assignment", proxy))
        }
    }
}

pub(crate) fn len(proxy: &Proxy) -> Result<usize, Error> {
    match Handler::of(proxy) {
        Handler::Sequence => slices::len(proxy),
        Handler::Map | Handler::Chan => Ok(proxy.value().len()),
        _ => Err(unsupported("#", proxy)),
    }
}

/// `x()`: iteration for sequences and maps
pub(crate) fn call(lua: &Lua, proxy: &Proxy) -> Result<Function, Error> {
    match Handler::of(proxy) {
        Handler::Sequence => slices::iterate(lua, proxy),
        Handler::Map => maps::iterate(lua, proxy),
        _ => Err(unsupported("call", proxy)),
    }
}

pub(crate) fn eq(proxy: &Proxy, other: &Proxy) -> Result<bool, Error> {
    match Handler::of(proxy) {
        Handler::Struct => structs::eq(proxy, other),
        Handler::Sequence => slices::eq(proxy, other),
        Handler::Map => Err(Error::comparison("==", "map")),
        Handler::Chan => chans::eq(proxy, other),
        Handler::Pointer => pointers::eq(proxy, other),
        Handler::Scalar => proxy.value().equals(&other.value()),
    }
}

/// Proxies have no ordering
pub(crate) fn ordering(op: &'static str, proxy: &Proxy) -> Error {
    Error::comparison(op, proxy.ty().kind().name())
}

/// `tostring(x)`: the `String` method when one is callable, otherwise the
/// host formatting of the value
pub(crate) fn to_string(lua: &Lua, proxy: &Proxy) -> Result<String, Error> {
    let options = proxy.options();
    let descriptor = describe(&proxy.base_type(), options);
    let stringer = descriptor.method("String").or_else(|| {
        if proxy.address().is_some() && !options.immutable {
            descriptor.ptr_method("String")
        } else {
            None
        }
    });

    if let Some(entry) = stringer {
        let receiver = receiver_value(proxy, entry)?;
        let results = invoke(lua, entry, &receiver, MultiValue::new(), options)?;
        return Ok(results.front().map(lua_display).unwrap_or_default());
    }

    Ok(match proxy.target() {
        Target::Place(ptr) => Value::pointer(ptr.clone()).to_string(),
        Target::Owned(value) => value.to_string(),
    })
}

pub(crate) fn unm(lua: &Lua, proxy: &Proxy) -> Result<LuaValue, Error> {
    pointers::deref(lua, proxy)
}

pub(crate) fn pow(lua: &Lua, proxy: &Proxy, value: LuaValue) -> Result<LuaValue, Error> {
    pointers::replace(lua, proxy, &value)
}

pub(super) fn unsupported(op: &str, proxy: &Proxy) -> Error {
    Error::Unsupported(format!("{op} on {}", proxy.ty()))
}

/// String keys only; everything else never names a field or method
pub(super) fn key_name(key: &LuaValue) -> Option<String> {
    match key {
        LuaValue::String(s) => Some(s.to_string_lossy()),
        _ => None,
    }
}

fn lua_display(value: &LuaValue) -> String {
    match value {
        LuaValue::String(s) => s.to_string_lossy(),
        LuaValue::Integer(i) => i.to_string(),
        LuaValue::Number(n) => n.to_string(),
        LuaValue::Boolean(b) => b.to_string(),
        LuaValue::Nil => "nil".to_string(),
        other => other.type_name().to_string(),
    }
}

fn method_or_nil(lua: &Lua, proxy: &Proxy, key: &LuaValue) -> Result<LuaValue, Error> {
    let Some(name) = key_name(key) else {
        return Ok(LuaValue::Nil);
    };
    Ok(match lookup_method(lua, proxy, &name)? {
        Some(function) => LuaValue::Function(function),
        None => LuaValue::Nil,
    })
}

/// Method `name` callable through `proxy`, as a script function.
///
/// Pointer-receiver methods are refused outright on immutable proxies.
pub(super) fn lookup_method(
    lua: &Lua,
    proxy: &Proxy,
    name: &str,
) -> Result<Option<Function>, Error> {
    let options = proxy.options();
    let descriptor = describe(&proxy.base_type(), options);

    match descriptor.method(name) {
        Some(entry) => bound_method(lua, &descriptor, entry, false).map(Some),
        None => match descriptor.ptr_method(name) {
            Some(entry) => bound_method(lua, &descriptor, entry, options.immutable).map(Some),
            None => Ok(None),
        },
    }
}

/// Script function for a resolved method. Pointer-receiver methods are refused
/// on immutable proxies.
pub(super) fn bound_method(
    lua: &Lua,
    descriptor: &TypeDescriptor,
    entry: &MethodEntry,
    immutable: bool,
) -> Result<Function, Error> {
    if immutable && entry.receiver() == Receiver::Pointer {
        return Err(Error::ImmutableMethod);
    }
    trace!("Resolved method {} on {}", entry.name(), descriptor.ty());
    method_function(lua, descriptor.ty().clone(), entry.clone())
}

/// Script function calling `entry`. The receiver is the first argument, so
/// both `x:m()` and `x.m(x)` work.
fn method_function(lua: &Lua, ty: Type, entry: MethodEntry) -> Result<Function, Error> {
    Ok(lua.create_function(move |lua, args: MultiValue| {
        let mut args = args.into_iter();
        let receiver = match args.next() {
            Some(LuaValue::UserData(ud)) => ud.borrow::<Proxy>().ok().map(|p| Proxy::clone(&p)),
            _ => None,
        };
        let Some(receiver) = receiver.filter(|p| p.base_type() == ty) else {
            return Err(Error::Unsupported(format!(
                "method {} needs a {} receiver",
                entry.name(),
                ty
            ))
            .into());
        };
        let value = receiver_value(&receiver, &entry)?;
        Ok(invoke(lua, &entry, &value, args.collect(), receiver.options())?)
    })?)
}

/// Receiver passed to a method body: a copy for value receivers, an address
/// for pointer receivers.
fn receiver_value(proxy: &Proxy, entry: &MethodEntry) -> Result<Value, Error> {
    match entry.receiver() {
        Receiver::Value => {
            let base = match proxy.target() {
                Target::Place(ptr) => ptr.get(),
                Target::Owned(value) => match value.data() {
                    Data::Ptr(Some(ptr)) => ptr.get(),
                    Data::Ptr(None) => return Err(Error::NilDereference),
                    _ => value.clone(),
                },
            };
            Ok(base.descend(entry.path()))
        }
        Receiver::Pointer => match proxy.address() {
            Some(ptr) => Ok(Value::pointer(ptr.descend(entry.path()))),
            None if proxy.is_nil_pointer() => Err(Error::NilDereference),
            None => Err(Error::Unsupported(format!(
                "cannot call pointer method {} on unaddressable value",
                entry.name()
            ))),
        },
    }
}

fn invoke(
    lua: &Lua,
    entry: &MethodEntry,
    receiver: &Value,
    args: MultiValue,
    options: ReflectOptions,
) -> Result<MultiValue, Error> {
    match entry.method().body() {
        MethodBody::Typed(signature, f) => {
            let args = convert_args(signature, args)?;
            let results = f(lua, receiver, &args)?;
            Ok(wrap_results(lua, results, options)?)
        }
        MethodBody::Raw(f) => Ok(f(lua, receiver, args)?),
    }
}
