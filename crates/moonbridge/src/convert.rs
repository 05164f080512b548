//! Script value to host value conversion
//!
//! [`convert_for`] is the raising conversion used by every write path: struct
//! fields, slice elements, map entries, method arguments and pointer-replace.
//! Scalars coerce loosely (numbers and booleans become strings, numeric strings
//! become numbers). Map keys are the exception and must already have the right
//! script type.
//!
//! [`extract`] is the best-effort variant for host callers. It never raises and
//! refuses to silently dereference a wrapped pointer.

use crate::config::{self, ReflectOptions};
use crate::descriptor::describe;
use crate::error::Error;
use crate::proxy::{wrap_with, Proxy};
use crate::reflect::{Data, Func, Kind, Signature, Slice, Type, Value};
use mlua::{Function, MultiValue, Table, Value as LuaValue};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coercion {
    Loose,
    Strict,
}

/// Convert `value` into a host value of exactly `ty`, or fail.
pub fn convert_for(value: &LuaValue, ty: &Type) -> Result<Value, Error> {
    coerce(value, ty, Coercion::Loose)
}

/// Best-effort conversion of `value` to `ty`; `None` when no conversion applies.
///
/// Unlike [`convert_for`], a proxy is only accepted when it already holds a
/// value of `ty` (or its address, when `ty` is a pointer type).
pub fn extract(value: &LuaValue, ty: &Type) -> Option<Value> {
    let result = match value {
        LuaValue::UserData(ud) => match ud.borrow::<Proxy>() {
            Ok(proxy) => from_proxy(&proxy, ty, false),
            Err(_) => Err(Error::mismatch(ty, "userdata")),
        },
        other => convert_for(other, ty),
    };
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            trace!("Extraction to {} failed: {}", ty, err);
            None
        }
    }
}

/// Map key conversion: no string/number coercion
pub(crate) fn convert_key(value: &LuaValue, ty: &Type) -> Result<Value, Error> {
    coerce(value, ty, Coercion::Strict)
}

/// Convert call arguments per `signature`. Missing parameters take their zero
/// value; extra arguments are dropped unless the signature is variadic.
pub(crate) fn convert_args(signature: &Signature, args: MultiValue) -> Result<Vec<Value>, Error> {
    let mut args = args.into_iter();
    let mut converted = Vec::with_capacity(signature.params.len());
    for ty in &signature.params {
        converted.push(match args.next() {
            Some(arg) => convert_for(&arg, ty)?,
            None => ty.zero(),
        });
    }
    if let Some(variadic) = &signature.variadic {
        for arg in args {
            converted.push(convert_for(&arg, variadic)?);
        }
    }
    Ok(converted)
}

fn coerce(value: &LuaValue, ty: &Type, mode: Coercion) -> Result<Value, Error> {
    let kind = ty.kind();
    if kind == Kind::Interface {
        return natural(value)?.assign_to(ty);
    }

    match value {
        LuaValue::Nil => {
            if kind.is_nilable() {
                Ok(ty.zero())
            } else {
                Err(Error::mismatch(ty, "nil"))
            }
        }
        LuaValue::Boolean(b) => match kind {
            Kind::Bool => Value::typed(ty, Data::Bool(*b)),
            Kind::String if mode == Coercion::Loose => {
                Value::typed(ty, Data::String(b.to_string()))
            }
            _ => Err(Error::mismatch(ty, "boolean")),
        },
        LuaValue::Integer(i) => from_integer(i128::from(*i), ty, mode),
        LuaValue::Number(n) => from_number(*n, ty, mode),
        LuaValue::String(s) => from_string(&s.to_string_lossy(), ty, mode),
        LuaValue::Table(table) => from_table(table, ty),
        LuaValue::Function(function) if kind == Kind::Func => Ok(from_function(function, ty)),
        LuaValue::UserData(ud) => match ud.borrow::<Proxy>() {
            Ok(proxy) => from_proxy(&proxy, ty, true),
            Err(_) => Err(Error::mismatch(ty, "userdata")),
        },
        other => Err(Error::mismatch(ty, other.type_name())),
    }
}

fn from_proxy(proxy: &Proxy, ty: &Type, widen: bool) -> Result<Value, Error> {
    let host = proxy.value();
    if host.ty() == ty {
        return Ok(host);
    }
    if ty.kind() == Kind::Interface {
        return host.assign_to(ty);
    }
    if let (Some(place), Kind::Ptr) = (proxy.place(), ty.kind()) {
        if ty.elem() == Some(host.ty()) {
            return Ok(Value::pointer(place.clone()));
        }
    }
    if widen && host.ty().underlying_eq(ty) {
        return host.assign_to(ty);
    }
    Err(Error::mismatch(ty, host.ty()))
}

fn in_range(kind: Kind, n: i128) -> bool {
    let (min, max): (i128, i128) = match kind {
        Kind::Int8 => (i8::MIN.into(), i8::MAX.into()),
        Kind::Int16 => (i16::MIN.into(), i16::MAX.into()),
        Kind::Int32 => (i32::MIN.into(), i32::MAX.into()),
        Kind::Int | Kind::Int64 => (i64::MIN.into(), i64::MAX.into()),
        Kind::Uint8 => (0, u8::MAX.into()),
        Kind::Uint16 => (0, u16::MAX.into()),
        Kind::Uint32 => (0, u32::MAX.into()),
        Kind::Uint | Kind::Uint64 => (0, u64::MAX.into()),
        _ => return false,
    };
    (min..=max).contains(&n)
}

fn integer_data(kind: Kind, n: i128) -> Option<Data> {
    if !in_range(kind, n) {
        return None;
    }
    if kind.is_signed() {
        i64::try_from(n).ok().map(Data::Int)
    } else {
        u64::try_from(n).ok().map(Data::Uint)
    }
}

fn float_data(kind: Kind, f: f64) -> Data {
    match kind {
        Kind::Float32 => Data::Float(f64::from(f as f32)),
        _ => Data::Float(f),
    }
}

fn from_integer(n: i128, ty: &Type, mode: Coercion) -> Result<Value, Error> {
    let kind = ty.kind();
    let data = match kind {
        k if k.is_signed() || k.is_unsigned() => integer_data(k, n),
        k if k.is_float() => Some(float_data(k, n as f64)),
        Kind::Complex128 => Some(Data::Complex(n as f64, 0.0)),
        Kind::String if mode == Coercion::Loose => Some(Data::String(n.to_string())),
        _ => None,
    };
    match data {
        Some(data) => Value::typed(ty, data),
        None => Err(Error::mismatch(ty, "number")),
    }
}

fn from_number(f: f64, ty: &Type, mode: Coercion) -> Result<Value, Error> {
    let kind = ty.kind();
    let data = match kind {
        k if k.is_signed() || k.is_unsigned() => {
            let integral = f.is_finite() && f.fract() == 0.0 && f.abs() < 2f64.powi(64);
            if integral {
                integer_data(k, f as i128)
            } else {
                None
            }
        }
        k if k.is_float() => Some(float_data(k, f)),
        Kind::Complex128 => Some(Data::Complex(f, 0.0)),
        Kind::String if mode == Coercion::Loose => Some(Data::String(f.to_string())),
        _ => None,
    };
    match data {
        Some(data) => Value::typed(ty, data),
        None => Err(Error::mismatch(ty, "number")),
    }
}

fn from_string(s: &str, ty: &Type, mode: Coercion) -> Result<Value, Error> {
    let kind = ty.kind();
    if kind == Kind::String {
        return Value::typed(ty, Data::String(s.to_string()));
    }
    if mode == Coercion::Loose && kind.is_numeric() {
        let text = s.trim();
        if let Ok(n) = text.parse::<i128>() {
            return from_integer(n, ty, mode);
        }
        if let Ok(f) = text.parse::<f64>() {
            return from_number(f, ty, mode);
        }
    }
    Err(Error::mismatch(ty, "string"))
}

fn from_table(table: &Table, ty: &Type) -> Result<Value, Error> {
    match ty.kind() {
        Kind::Struct => table_to_struct(table, ty),
        Kind::Ptr => {
            let elem = ty.elem().ok_or_else(|| Error::mismatch(ty, "table"))?;
            let target = from_table(table, elem)?;
            Value::new_pointer(target).assign_to(ty)
        }
        Kind::Slice => {
            let elem = ty.elem().ok_or_else(|| Error::mismatch(ty, "table"))?;
            let items = sequence(table, elem, table.raw_len())?;
            let cap = items.len();
            Value::typed(ty, Data::Slice(Some(Slice::from_items(elem, items, cap))))
        }
        Kind::Array => {
            let (Some(elem), Some(len)) = (ty.elem(), ty.array_len()) else {
                return Err(Error::mismatch(ty, "table"));
            };
            let mut items = sequence(table, elem, table.raw_len().min(len))?;
            items.extend((items.len()..len).map(|_| elem.zero()));
            Value::typed(ty, Data::Array(items))
        }
        Kind::Map => table_to_map(table, ty),
        _ => Err(Error::mismatch(ty, "table")),
    }
}

fn sequence(table: &Table, elem: &Type, len: usize) -> Result<Vec<Value>, Error> {
    (1..=len)
        .map(|index| {
            let item: LuaValue = table.raw_get(index)?;
            coerce(&item, elem, Coercion::Loose)
        })
        .collect()
}

fn table_to_struct(table: &Table, ty: &Type) -> Result<Value, Error> {
    let descriptor = describe(ty, ReflectOptions::default());
    let mut value = ty.zero();
    for pair in table.pairs::<LuaValue, LuaValue>() {
        let (key, item) = pair?;
        let name = match &key {
            LuaValue::String(s) => s.to_string_lossy(),
            other => return Err(Error::mismatch("field name", other.type_name())),
        };
        let field = descriptor
            .field(&name)
            .ok_or_else(|| Error::UnknownField(name.clone()))?;
        let converted = convert_for(&item, field.ty()).map_err(|err| Error::field_set(&name, err))?;
        *value.walk_mut(field.path()) = converted;
    }
    Ok(value)
}

fn table_to_map(table: &Table, ty: &Type) -> Result<Value, Error> {
    let value = Value::make_map(ty)?;
    let (Some(map), Some(key_ty), Some(elem_ty)) = (value.as_map(), ty.key(), ty.elem()) else {
        return Err(Error::mismatch(ty, "table"));
    };
    for pair in table.pairs::<LuaValue, LuaValue>() {
        let (key, item) = pair?;
        let key = match coerce(&key, key_ty, Coercion::Strict) {
            Ok(key) => key,
            Err(err) => {
                trace!("Skipping map entry: {}", err);
                continue;
            }
        };
        if item.is_nil() && !elem_ty.kind().is_nilable() {
            continue;
        }
        map.insert(key, convert_for(&item, elem_ty)?)?;
    }
    Ok(value)
}

fn from_function(function: &Function, ty: &Type) -> Value {
    let signature = ty.signature().cloned().unwrap_or_default();
    let function = function.clone();
    let func = Func::new(move |lua, args| {
        let options = config::current(lua).default_options;
        let args = args
            .iter()
            .map(|arg| wrap_with(lua, arg.clone(), options))
            .collect::<mlua::Result<Vec<_>>>()?;
        let results: MultiValue = function.call(MultiValue::from_vec(args))?;
        signature
            .results
            .iter()
            .enumerate()
            .map(|(index, result_ty)| match results.get(index) {
                Some(result) => convert_for(result, result_ty),
                None => Ok(result_ty.zero()),
            })
            .collect()
    });
    Value::from_parts(ty.clone(), Data::Func(Some(func)))
}

/// Host value a script value maps to when the destination accepts anything
fn natural(value: &LuaValue) -> Result<Value, Error> {
    Ok(match value {
        LuaValue::Nil => Value::nil(),
        LuaValue::Boolean(b) => Value::from(*b),
        LuaValue::Integer(i) => Value::from(*i),
        LuaValue::Number(n) => Value::from(*n),
        LuaValue::String(s) => Value::from(s.to_string_lossy()),
        LuaValue::Table(table) => {
            let len = table.raw_len();
            let any = Type::any();
            if len > 0 && table.pairs::<LuaValue, LuaValue>().count() == len {
                let items = sequence(table, &any, len)?;
                Value::slice(&any, items)
            } else {
                table_to_map(table, &Type::map(&any, &any))?
            }
        }
        LuaValue::UserData(ud) => match ud.borrow::<Proxy>() {
            Ok(proxy) => proxy.value(),
            Err(_) => return Err(Error::mismatch("interface {}", "userdata")),
        },
        other => return Err(Error::mismatch("interface {}", other.type_name())),
    })
}
