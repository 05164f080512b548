//! Maps

use super::{key_name, lookup_method, unsupported};
use crate::convert::{convert_for, convert_key};
use crate::error::Error;
use crate::proxy::{wrap_with, Proxy};
use crate::reflect::{Map, Type};
use mlua::{Function, Lua, MultiValue, Value as LuaValue};
use std::cell::Cell;

fn parts(proxy: &Proxy) -> Result<(Map, Type, Type), Error> {
    let value = proxy.value();
    let ty = value.ty();
    match (value.as_map(), ty.key(), ty.elem()) {
        (Some(map), Some(key), Some(elem)) => Ok((map.clone(), key.clone(), elem.clone())),
        _ => Err(unsupported("index", proxy)),
    }
}

/// Entry lookup first; string keys without an entry fall back to methods
pub(super) fn index(lua: &Lua, proxy: &Proxy, key: &LuaValue) -> Result<LuaValue, Error> {
    let (map, key_ty, _) = parts(proxy)?;
    if let Ok(host_key) = convert_key(key, &key_ty) {
        if let Some(value) = map.get(&host_key)? {
            return Ok(wrap_with(lua, value, proxy.options())?);
        }
    }

    let Some(name) = key_name(key) else {
        return Ok(LuaValue::Nil);
    };
    Ok(match lookup_method(lua, proxy, &name)? {
        Some(function) => LuaValue::Function(function),
        None => LuaValue::Nil,
    })
}

/// Assigning nil deletes the entry
pub(super) fn new_index(proxy: &Proxy, key: &LuaValue, value: &LuaValue) -> Result<(), Error> {
    if proxy.options().immutable {
        return Err(Error::Immutable("map"));
    }
    let (map, key_ty, elem_ty) = parts(proxy)?;
    let host_key = convert_key(key, &key_ty)?;
    if value.is_nil() {
        map.remove(&host_key)?;
        return Ok(());
    }
    map.insert(host_key, convert_for(value, &elem_ty)?)
}

/// Iterator closure over a snapshot of the entries, in key order
pub(super) fn iterate(lua: &Lua, proxy: &Proxy) -> Result<Function, Error> {
    let (map, _, _) = parts(proxy)?;
    let entries = map.entries();
    let options = proxy.options();
    let next = Cell::new(0usize);
    Ok(lua.create_function(move |lua, _: MultiValue| {
        let index = next.get();
        match entries.get(index) {
            Some((key, value)) => {
                next.set(index + 1);
                Ok((
                    wrap_with(lua, key.clone(), options)?,
                    wrap_with(lua, value.clone(), options)?,
                ))
            }
            None => Ok((LuaValue::Nil, LuaValue::Nil)),
        }
    })?)
}
