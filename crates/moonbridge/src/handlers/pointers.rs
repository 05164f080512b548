//! Pointers to non-aggregates, plus dereference and pointer-replace for every
//! proxy held by address

use super::unsupported;
use crate::convert::convert_for;
use crate::error::Error;
use crate::proxy::{wrap_place, Proxy, Target};
use crate::reflect::Data;
use mlua::{Lua, Value as LuaValue};

/// Both operands must be held by address; they are equal when they point at
/// the same storage.
pub(super) fn eq(proxy: &Proxy, other: &Proxy) -> Result<bool, Error> {
    if !other.is_pointer_form() {
        return Err(Error::comparison(
            "==",
            format!("mixed {} value and pointer", other.ty().kind()),
        ));
    }
    Ok(match (proxy.address(), other.address()) {
        (Some(a), Some(b)) => a.same_address(&b),
        (None, None) => true,
        _ => false,
    })
}

/// `-p`
pub(super) fn deref(lua: &Lua, proxy: &Proxy) -> Result<LuaValue, Error> {
    let options = proxy.options();
    match proxy.target() {
        // A place is already the addressed value
        Target::Place(ptr) => Ok(wrap_place(lua, ptr.clone(), options)?),
        Target::Owned(value) => match value.data() {
            Data::Ptr(Some(ptr)) => Ok(wrap_place(lua, ptr.clone(), options)?),
            Data::Ptr(None) => Err(Error::NilDereference),
            _ => Err(unsupported("unary -", proxy)),
        },
    }
}

/// `p ^ v`: store `v`, converted to the pointed-to type, at the address.
/// Evaluates to `p`.
pub(super) fn replace(lua: &Lua, proxy: &Proxy, value: &LuaValue) -> Result<LuaValue, Error> {
    if !proxy.is_pointer_form() {
        return Err(unsupported("^", proxy));
    }
    if proxy.options().immutable {
        return Err(Error::Immutable("pointer"));
    }
    let target = proxy.address().ok_or(Error::NilDereference)?;
    let converted = convert_for(value, &target.elem_type())
        .map_err(|err| Error::PointerSet(Box::new(err)))?;
    target.set(converted);
    Ok(LuaValue::UserData(lua.create_userdata(proxy.clone())?))
}
