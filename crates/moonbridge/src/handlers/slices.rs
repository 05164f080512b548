//! Slices, arrays and pointers to either
//!
//! Indexing is 1-based on the script side. Reads past the end give nil; writes
//! past the end raise.

use super::{key_name, lookup_method, pointers, unsupported};
use crate::convert::convert_for;
use crate::error::Error;
use crate::proxy::{wrap_place, wrap_with, Proxy, Target};
use crate::reflect::{Data, Kind, Pointer, Slice, Type, Value};
use mlua::{AnyUserData, Function, Lua, MultiValue, Value as LuaValue, Variadic};
use std::cell::Cell;

/// Where a proxied sequence keeps its elements
enum Storage {
    /// A slice header; `None` for a nil slice behind a pointer
    Slice(Option<Slice>),
    /// An array at an address
    Place(Pointer),
    /// An array copy
    Array(Value),
}

enum Element {
    Slot(Pointer),
    Copy(Value),
}

impl Storage {
    fn of(proxy: &Proxy) -> Result<Self, Error> {
        match proxy.target() {
            Target::Place(ptr) => Ok(Storage::Place(ptr.clone())),
            Target::Owned(value) => match value.data() {
                Data::Slice(slice) => Ok(Storage::Slice(slice.clone())),
                Data::Array(_) => Ok(Storage::Array(value.clone())),
                Data::Ptr(Some(ptr)) => match ptr.elem_type().kind() {
                    Kind::Array => Ok(Storage::Place(ptr.clone())),
                    _ => Ok(Storage::Slice(ptr.get().as_slice().cloned())),
                },
                Data::Ptr(None) => Err(Error::NilDereference),
                _ => Err(unsupported("index", proxy)),
            },
        }
    }

    fn len(&self) -> usize {
        match self {
            Storage::Slice(slice) => slice.as_ref().map_or(0, Slice::len),
            Storage::Place(ptr) => ptr.with(Value::len),
            Storage::Array(value) => value.len(),
        }
    }

    fn cap(&self) -> usize {
        match self {
            Storage::Slice(slice) => slice.as_ref().map_or(0, Slice::cap),
            _ => self.len(),
        }
    }

    fn element(&self, index: usize) -> Option<Element> {
        match self {
            Storage::Slice(slice) => slice.as_ref()?.element(index).map(Element::Slot),
            Storage::Place(ptr) => (index < self.len()).then(|| Element::Slot(ptr.child(index))),
            Storage::Array(value) => value.index(index).map(Element::Copy),
        }
    }
}

/// Slice or array type of the proxied sequence, looking through a pointer
fn sequence_type(proxy: &Proxy) -> Type {
    match proxy.target() {
        Target::Place(ptr) => ptr.elem_type(),
        Target::Owned(_) => proxy.base_type(),
    }
}

/// Script key as a 1-based position
fn position(key: &LuaValue) -> Option<i64> {
    match key {
        LuaValue::Integer(i) => Some(*i),
        LuaValue::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
        _ => None,
    }
}

fn offset(position: i64) -> Option<usize> {
    usize::try_from(position.checked_sub(1)?).ok()
}

fn read(lua: &Lua, element: Element, proxy: &Proxy) -> Result<LuaValue, Error> {
    Ok(match element {
        Element::Slot(ptr) => wrap_place(lua, ptr, proxy.options())?,
        Element::Copy(value) => wrap_with(lua, value, proxy.options())?,
    })
}

pub(super) fn index(lua: &Lua, proxy: &Proxy, key: &LuaValue) -> Result<LuaValue, Error> {
    if let Some(position) = position(key) {
        let storage = Storage::of(proxy)?;
        return match offset(position).and_then(|i| storage.element(i)) {
            Some(element) => read(lua, element, proxy),
            None => Ok(LuaValue::Nil),
        };
    }

    let Some(name) = key_name(key) else {
        return Ok(LuaValue::Nil);
    };
    let is_slice = sequence_type(proxy).kind() == Kind::Slice;
    match name.as_str() {
        "capacity" => Ok(LuaValue::Function(capacity_function(lua)?)),
        "append" if is_slice => Ok(LuaValue::Function(append_function(lua)?)),
        _ => Ok(match lookup_method(lua, proxy, &name)? {
            Some(function) => LuaValue::Function(function),
            None => LuaValue::Nil,
        }),
    }
}

pub(super) fn new_index(proxy: &Proxy, key: &LuaValue, value: &LuaValue) -> Result<(), Error> {
    if proxy.options().immutable {
        return Err(Error::Immutable("slice"));
    }
    let ty = sequence_type(proxy);
    let Some(position) = position(key) else {
        return Err(Error::Unsupported(format!(
            "non-integer index {} on {}",
            key.type_name(),
            ty
        )));
    };
    let storage = Storage::of(proxy)?;
    let element = offset(position)
        .and_then(|i| storage.element(i))
        .ok_or(Error::OutOfRange {
            index: position,
            len: storage.len(),
        })?;
    let elem = ty.elem().ok_or_else(|| unsupported("index", proxy))?;
    let converted = convert_for(value, elem)?;
    match element {
        Element::Slot(slot) => slot.set(converted),
        Element::Copy(_) => return Err(Error::Unaddressable("array element".to_string())),
    }
    Ok(())
}

pub(super) fn len(proxy: &Proxy) -> Result<usize, Error> {
    Ok(Storage::of(proxy)?.len())
}

/// Plain slices never compare; arrays compare by content, addresses by identity
pub(super) fn eq(proxy: &Proxy, other: &Proxy) -> Result<bool, Error> {
    let kind = proxy.ty().kind();
    match (proxy.is_pointer_form(), other.is_pointer_form()) {
        (true, _) => pointers::eq(proxy, other),
        (false, _) if kind == Kind::Slice => Err(Error::comparison("==", "slice")),
        (false, true) => Err(Error::comparison("==", "mixed array value and pointer")),
        (false, false) => proxy.value().equals(&other.value()),
    }
}

/// Iterator closure for `for i, v in s() do ... end`
pub(super) fn iterate(lua: &Lua, proxy: &Proxy) -> Result<Function, Error> {
    let proxy = proxy.clone();
    let next = Cell::new(0usize);
    Ok(lua.create_function(move |lua, _: MultiValue| {
        let index = next.get();
        let storage = Storage::of(&proxy)?;
        match storage.element(index) {
            Some(element) => {
                next.set(index + 1);
                let position = i64::try_from(index + 1).unwrap_or(i64::MAX);
                Ok((LuaValue::Integer(position), read(lua, element, &proxy)?))
            }
            None => Ok((LuaValue::Nil, LuaValue::Nil)),
        }
    })?)
}

fn capacity_function(lua: &Lua) -> Result<Function, Error> {
    Ok(lua.create_function(|_, this: AnyUserData| {
        let proxy = this.borrow::<Proxy>()?;
        Ok(Storage::of(&proxy)?.cap())
    })?)
}

fn append_function(lua: &Lua) -> Result<Function, Error> {
    Ok(lua.create_function(|lua, (this, values): (AnyUserData, Variadic<LuaValue>)| {
        let proxy = this.borrow::<Proxy>()?;
        Ok(append(lua, &proxy, &values)?)
    })?)
}

/// `s:append(...)`: a new slice value; `s` itself keeps its length
fn append(lua: &Lua, proxy: &Proxy, values: &[LuaValue]) -> Result<LuaValue, Error> {
    if proxy.options().immutable {
        return Err(Error::Immutable("slice"));
    }
    let ty = sequence_type(proxy);
    let elem = ty.elem().ok_or_else(|| unsupported("append", proxy))?;
    let items = values
        .iter()
        .map(|value| convert_for(value, elem))
        .collect::<Result<Vec<_>, _>>()?;

    let grown = match Storage::of(proxy)? {
        Storage::Slice(Some(slice)) => slice.append(elem, items),
        Storage::Slice(None) => {
            let cap = items.len();
            Slice::from_items(elem, items, cap)
        }
        _ => return Err(unsupported("append", proxy)),
    };
    Ok(wrap_with(
        lua,
        Value::typed(&ty, Data::Slice(Some(grown)))?,
        proxy.options(),
    )?)
}

#[cfg(test)]
mod tests {
    use crate::config::ReflectOptions;
    use crate::proxy::wrap_with;
    use crate::reflect::{Type, Value};
    use mlua::Lua;

    fn words(lua: &Lua, options: ReflectOptions) {
        let value = Value::slice(&Type::string(), vec!["a".into(), "b".into()]);
        lua.globals().set("s", wrap_with(lua, value, options).unwrap()).unwrap();
    }

    #[test]
    fn test_one_based_reads_and_writes() {
        let lua = Lua::new();
        words(&lua, ReflectOptions::default());

        let (first, missing, len): (String, mlua::Value, i64) =
            lua.load("return s[1], s[3], #s").eval().unwrap();
        assert_eq!(first, "a");
        assert!(missing.is_nil());
        assert_eq!(len, 2);

        lua.load("s[2] = 5").exec().unwrap();
        let second: String = lua.load("return s[2]").eval().unwrap();
        assert_eq!(second, "5");

        let err = lua.load("s[3] = 'c'").exec().unwrap_err();
        assert!(err.to_string().contains("index 3 out of range"));
    }

    #[test]
    fn test_append_grows_new_header() {
        let lua = Lua::new();
        words(&lua, ReflectOptions::default());

        let (old_len, new_len, cap, last): (i64, i64, i64, String) = lua
            .load("local t = s:append('c', 'd'); return #s, #t, t:capacity(), t[4]")
            .eval()
            .unwrap();
        assert_eq!(old_len, 2);
        assert_eq!(new_len, 4);
        assert_eq!(cap, 4);
        assert_eq!(last, "d");
    }

    #[test]
    fn test_iterator_stops_at_end() {
        let lua = Lua::new();
        words(&lua, ReflectOptions::default());

        let joined: String = lua
            .load("local out = '' for i, v in s() do out = out .. i .. v end return out")
            .eval()
            .unwrap();
        assert_eq!(joined, "1a2b");
    }

    #[test]
    fn test_slices_do_not_compare() {
        let lua = Lua::new();
        words(&lua, ReflectOptions::default());
        lua.load("t = s").exec().unwrap();

        // Same userdata: Lua never asks the metamethod
        assert!(lua.load("return s == t").eval::<bool>().unwrap());
        lua.load("u = s:append()").exec().unwrap();
        let err = lua.load("return s == u").exec().unwrap_err();
        assert!(err.to_string().contains("invalid operation == on slice"));
    }

    #[test]
    fn test_arrays_have_fixed_length() {
        let lua = Lua::new();
        let array = Type::array(&Type::int(), 3);
        let ptr = Value::new_pointer(array.zero());
        lua.globals()
            .set("a", wrap_with(&lua, ptr.clone(), ReflectOptions::default()).unwrap())
            .unwrap();

        lua.load("a[2] = 7").exec().unwrap();
        assert_eq!(ptr.elem().unwrap().to_string(), "[0 7 0]");
        let (len, cap, append): (i64, i64, mlua::Value) =
            lua.load("return #a, a:capacity(), a.append").eval().unwrap();
        assert_eq!((len, cap), (3, 3));
        assert!(append.is_nil());
    }

    #[test]
    fn test_immutable_slice() {
        let lua = Lua::new();
        words(&lua, ReflectOptions::immutable());

        let first: String = lua.load("return s[1]").eval().unwrap();
        assert_eq!(first, "a");
        for chunk in ["s[1] = 'x'", "s = s:append('x')"] {
            let err = lua.load(chunk).exec().unwrap_err();
            assert!(err.to_string().contains("invalid operation on immutable slice"));
        }
    }
}
