//! Structs and pointers to structs

use super::{bound_method, key_name, pointers};
use crate::config;
use crate::convert::convert_for;
use crate::descriptor::{describe, FieldEntry, Member};
use crate::error::Error;
use crate::proxy::{wrap_place, wrap_with, Proxy};
use crate::reflect::{Kind, Value};
use mlua::{Lua, Value as LuaValue};
use tracing::debug;

/// Exact-case names before case-insensitive ones; within each, methods before
/// fields. Unknown names read as nil.
pub(super) fn index(lua: &Lua, proxy: &Proxy, key: &LuaValue) -> Result<LuaValue, Error> {
    let Some(name) = key_name(key) else {
        return Ok(LuaValue::Nil);
    };
    let options = proxy.options();
    let descriptor = describe(&proxy.base_type(), options);
    let function = match descriptor.member(&name) {
        Some(Member::Method(entry)) => bound_method(lua, &descriptor, entry, false)?,
        Some(Member::PtrMethod(entry)) => bound_method(lua, &descriptor, entry, options.immutable)?,
        Some(Member::Field(field)) => return read_field(lua, proxy, field),
        None => return Ok(LuaValue::Nil),
    };
    Ok(LuaValue::Function(function))
}

fn read_field(lua: &Lua, proxy: &Proxy, field: &FieldEntry) -> Result<LuaValue, Error> {
    if proxy.is_nil_pointer() {
        return Err(Error::NilDereference);
    }
    let options = proxy.options();
    let slot = proxy.address().map(|base| base.descend(field.path()));
    let current = match &slot {
        Some(slot) => slot.get(),
        None => proxy.value().descend(field.path()),
    };

    match field.ty().kind() {
        Kind::Ptr if options.transparent_pointers => {
            let target = match (current.as_pointer(), &slot, field.ty().elem()) {
                (Some(target), _, _) => target.clone(),
                (None, Some(slot), Some(elem)) if options.may_allocate() => {
                    debug!("Allocating {} for nil field {}", elem, field.name());
                    let fresh = Value::new_pointer(elem.zero()).assign_to(field.ty())?;
                    slot.set(fresh.clone());
                    match fresh.as_pointer() {
                        Some(target) => target.clone(),
                        None => return Ok(LuaValue::Nil),
                    }
                }
                _ => return Ok(LuaValue::Nil),
            };
            Ok(wrap_place(lua, target, options)?)
        }
        Kind::Slice if options.transparent_pointers && current.is_nil() => match &slot {
            Some(slot) if options.may_allocate() => {
                let prealloc = config::current(lua).slice_prealloc;
                debug!("Allocating slice for nil field {}", field.name());
                let fresh = Value::make_slice(field.ty(), 0, prealloc)?;
                slot.set(fresh.clone());
                Ok(wrap_with(lua, fresh, options)?)
            }
            _ => Ok(LuaValue::Nil),
        },
        Kind::Struct | Kind::Array => match slot {
            Some(slot) => Ok(wrap_place(lua, slot, options)?),
            None => Ok(wrap_with(lua, current, options)?),
        },
        _ => Ok(wrap_with(lua, current, options)?),
    }
}

pub(super) fn new_index(proxy: &Proxy, key: &LuaValue, value: &LuaValue) -> Result<(), Error> {
    let options = proxy.options();
    if options.immutable {
        return Err(Error::Immutable("struct"));
    }
    let Some(name) = key_name(key) else {
        return Err(Error::UnknownField(key.type_name().to_string()));
    };
    let descriptor = describe(&proxy.base_type(), options);
    let field = descriptor
        .field(&name)
        .ok_or_else(|| Error::UnknownField(name.clone()))?;
    if proxy.is_nil_pointer() {
        return Err(Error::NilDereference);
    }

    // Transparent pointer fields take the pointed-to type and get fresh storage
    let converted = match (field.ty().kind(), field.ty().elem()) {
        (Kind::Ptr, Some(elem)) if options.transparent_pointers => {
            let target = convert_for(value, elem).map_err(|err| Error::field_set(&name, err))?;
            Value::new_pointer(target).assign_to(field.ty())?
        }
        _ => convert_for(value, field.ty()).map_err(|err| Error::field_set(&name, err))?,
    };

    let base = proxy
        .address()
        .ok_or_else(|| Error::Unaddressable(format!("field {name}")))?;
    base.descend(field.path()).set(converted);
    Ok(())
}

/// Addresses compare by identity, plain values by content. Mixing the two is
/// an error.
pub(super) fn eq(proxy: &Proxy, other: &Proxy) -> Result<bool, Error> {
    match (proxy.is_pointer_form(), other.is_pointer_form()) {
        (true, true) => pointers::eq(proxy, other),
        (false, false) => proxy.value().equals(&other.value()),
        _ => Err(Error::comparison("==", "mixed struct value and pointer")),
    }
}
