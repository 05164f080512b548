//! Dynamically typed host values

use super::containers::{Chan, Func, Map, Slice};
use super::pointer::Pointer;
use super::types::{Kind, Type};
use crate::error::Error;
use mlua::Lua;
use std::fmt;

/// Payload of a [`Value`].
///
/// Struct and array payloads are stored inline and copied with the value.
/// Everything else that can alias (pointers, slices, maps, chans, funcs) is a
/// shared handle, `None` meaning nil.
#[derive(Clone)]
pub enum Data {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Complex(f64, f64),
    String(String),
    Struct(Vec<Value>),
    Array(Vec<Value>),
    Ptr(Option<Pointer>),
    Slice(Option<Slice>),
    Map(Option<Map>),
    Chan(Option<Chan>),
    Func(Option<Func>),
    Interface(Option<Box<Value>>),
}

/// A host value together with its type
#[derive(Clone)]
pub struct Value {
    ty: Type,
    data: Data,
}

impl Value {
    pub(crate) fn from_parts(ty: Type, data: Data) -> Self {
        Self { ty, data }
    }

    /// The nil interface value
    pub fn nil() -> Self {
        Type::any().zero()
    }

    pub fn complex(re: f64, im: f64) -> Self {
        Self::from_parts(Type::complex128(), Data::Complex(re, im))
    }

    /// Build a value of `ty` from a raw payload, checking that the payload fits
    /// the type's kind.
    pub fn typed(ty: &Type, data: Data) -> Result<Self, Error> {
        let fits = match (&data, ty.kind()) {
            (Data::Bool(_), Kind::Bool) => true,
            (Data::Int(_), kind) => kind.is_signed(),
            (Data::Uint(_), kind) => kind.is_unsigned(),
            (Data::Float(_), kind) => kind.is_float(),
            (Data::Complex(..), Kind::Complex128) => true,
            (Data::String(_), Kind::String) => true,
            (Data::Struct(items), Kind::Struct) => items.len() == ty.fields().len(),
            (Data::Array(items), Kind::Array) => Some(items.len()) == ty.array_len(),
            (Data::Ptr(_), Kind::Ptr)
            | (Data::Slice(_), Kind::Slice)
            | (Data::Map(_), Kind::Map)
            | (Data::Chan(_), Kind::Chan)
            | (Data::Func(_), Kind::Func)
            | (Data::Interface(_), Kind::Interface) => true,
            _ => false,
        };
        if !fits {
            return Err(Error::mismatch(ty, Self::payload_name(&data)));
        }
        Ok(Self::from_parts(ty.clone(), data))
    }

    fn payload_name(data: &Data) -> &'static str {
        match data {
            Data::Bool(_) => "bool",
            Data::Int(_) => "int64",
            Data::Uint(_) => "uint64",
            Data::Float(_) => "float64",
            Data::Complex(..) => "complex128",
            Data::String(_) => "string",
            Data::Struct(_) => "struct",
            Data::Array(_) => "array",
            Data::Ptr(_) => "ptr",
            Data::Slice(_) => "slice",
            Data::Map(_) => "map",
            Data::Chan(_) => "chan",
            Data::Func(_) => "func",
            Data::Interface(_) => "interface",
        }
    }

    /// `[]elem` holding `items`, with capacity equal to its length
    pub fn slice(elem: &Type, items: Vec<Value>) -> Self {
        let cap = items.len();
        Self::from_parts(
            Type::slice(elem),
            Data::Slice(Some(Slice::from_items(elem, items, cap))),
        )
    }

    /// Slice of type `ty` with `len` zero elements and room for `cap`
    pub fn make_slice(ty: &Type, len: usize, cap: usize) -> Result<Self, Error> {
        let elem = ty
            .elem()
            .filter(|_| ty.kind() == Kind::Slice)
            .ok_or_else(|| Error::mismatch("slice", ty))?;
        let items = (0..len).map(|_| elem.zero()).collect();
        Ok(Self::from_parts(
            ty.clone(),
            Data::Slice(Some(Slice::from_items(elem, items, cap))),
        ))
    }

    /// Empty, non-nil map of type `ty`
    pub fn make_map(ty: &Type) -> Result<Self, Error> {
        if ty.kind() != Kind::Map {
            return Err(Error::mismatch("map", ty));
        }
        Ok(Self::from_parts(ty.clone(), Data::Map(Some(Map::new()))))
    }

    /// Map of type `ty` holding `entries`
    pub fn map(ty: &Type, entries: Vec<(Value, Value)>) -> Result<Self, Error> {
        let value = Self::make_map(ty)?;
        if let (Some(map), Some(key_ty), Some(elem_ty)) = (value.as_map(), ty.key(), ty.elem()) {
            for (key, item) in entries {
                map.insert(key.assign_to(key_ty)?, item.assign_to(elem_ty)?)?;
            }
        }
        Ok(value)
    }

    /// Buffered channel of type `ty`
    pub fn chan(ty: &Type, cap: usize) -> Result<Self, Error> {
        if ty.kind() != Kind::Chan {
            return Err(Error::mismatch("chan", ty));
        }
        Ok(Self::from_parts(ty.clone(), Data::Chan(Some(Chan::new(cap)))))
    }

    /// Host function of type `ty`
    pub fn func(
        ty: &Type,
        f: impl Fn(&Lua, &[Value]) -> Result<Vec<Value>, Error> + 'static,
    ) -> Result<Self, Error> {
        if ty.kind() != Kind::Func {
            return Err(Error::mismatch("func", ty));
        }
        Ok(Self::from_parts(ty.clone(), Data::Func(Some(Func::new(f)))))
    }

    /// Move `value` into fresh storage and return a pointer to it
    pub fn new_pointer(value: Value) -> Self {
        let ty = Type::ptr(value.ty());
        Self::from_parts(ty, Data::Ptr(Some(Pointer::alloc(value))))
    }

    /// Pointer value for an existing address
    pub fn pointer(ptr: Pointer) -> Self {
        Self::from_parts(Type::ptr(&ptr.elem_type()), Data::Ptr(Some(ptr)))
    }

    /// Box `value` into the empty interface
    pub fn interface(value: Value) -> Self {
        Self::from_parts(Type::any(), Data::Interface(Some(Box::new(value))))
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn kind(&self) -> Kind {
        self.ty.kind()
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut Data {
        &mut self.data
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.data {
            Data::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.data {
            Data::Int(i) => Some(i),
            Data::Uint(u) => i64::try_from(u).ok(),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self.data {
            Data::Uint(u) => Some(u),
            Data::Int(i) => u64::try_from(i).ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.data {
            Data::Float(f) => Some(f),
            Data::Int(i) => Some(i as f64),
            Data::Uint(u) => Some(u as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.data {
            Data::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<&Pointer> {
        match &self.data {
            Data::Ptr(ptr) => ptr.as_ref(),
            _ => None,
        }
    }

    pub fn as_slice(&self) -> Option<&Slice> {
        match &self.data {
            Data::Slice(slice) => slice.as_ref(),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match &self.data {
            Data::Map(map) => map.as_ref(),
            _ => None,
        }
    }

    pub fn as_chan(&self) -> Option<&Chan> {
        match &self.data {
            Data::Chan(chan) => chan.as_ref(),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<&Func> {
        match &self.data {
            Data::Func(func) => func.as_ref(),
            _ => None,
        }
    }

    /// Dynamic value held by an interface
    pub fn as_interface(&self) -> Option<&Value> {
        match &self.data {
            Data::Interface(inner) => inner.as_deref(),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(
            self.data,
            Data::Ptr(None)
                | Data::Slice(None)
                | Data::Map(None)
                | Data::Chan(None)
                | Data::Func(None)
                | Data::Interface(None)
        )
    }

    /// Field declared as `name`
    pub fn field(&self, name: &str) -> Option<&Value> {
        let index = self.ty.field_index(name)?;
        self.child(index)
    }

    /// Replace the field declared as `name`
    pub fn with_field(mut self, name: &str, value: Value) -> Result<Self, Error> {
        let index = self
            .ty
            .field_index(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))?;
        let field_ty = self.ty.fields()[index].ty().clone();
        let value = value
            .assign_to(&field_ty)
            .map_err(|err| Error::field_set(name, err))?;
        if let Data::Struct(items) = &mut self.data {
            items[index] = value;
        }
        Ok(self)
    }

    /// Value a pointer refers to; `None` for nil or non-pointers
    pub fn elem(&self) -> Option<Value> {
        self.as_pointer().map(Pointer::get)
    }

    /// Length of strings, arrays, slices, maps and chans
    pub fn len(&self) -> usize {
        match &self.data {
            Data::String(s) => s.len(),
            Data::Array(items) | Data::Struct(items) => items.len(),
            Data::Slice(Some(slice)) => slice.len(),
            Data::Map(Some(map)) => map.len(),
            Data::Chan(Some(chan)) => chan.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element `index` of an array or slice
    pub fn index(&self, index: usize) -> Option<Value> {
        match &self.data {
            Data::Array(items) => items.get(index).cloned(),
            Data::Slice(Some(slice)) => slice.get(index),
            _ => None,
        }
    }

    /// Field or element `index` of an inline struct or array payload
    pub fn child(&self, index: usize) -> Option<&Value> {
        match &self.data {
            Data::Struct(items) | Data::Array(items) => items.get(index),
            _ => None,
        }
    }

    /// Follow a path of field/element indices; stops early at a non-aggregate
    pub(crate) fn walk(&self, path: &[usize]) -> &Value {
        let mut current = self;
        for &index in path {
            current = match current.data {
                Data::Struct(ref items) | Data::Array(ref items) => &items[index],
                _ => return current,
            };
        }
        current
    }

    pub(crate) fn walk_mut(&mut self, path: &[usize]) -> &mut Value {
        let mut current = self;
        for &index in path {
            current = match current.data {
                Data::Struct(ref mut items) | Data::Array(ref mut items) => &mut items[index],
                _ => return current,
            };
        }
        current
    }

    /// Copy of the value reached by following `path`
    pub(crate) fn descend(&self, path: &[usize]) -> Value {
        self.walk(path).clone()
    }

    /// Retype `self` for storage in a slot of type `ty`.
    ///
    /// Identical types pass through, anything is boxed into an interface slot,
    /// and basic values move between types of the same kind.
    pub fn assign_to(self, ty: &Type) -> Result<Value, Error> {
        if &self.ty == ty {
            return Ok(self);
        }
        if ty.kind() == Kind::Interface {
            let inner = match self.data {
                Data::Interface(inner) => inner,
                _ => Some(Box::new(self)),
            };
            return Ok(Self::from_parts(ty.clone(), Data::Interface(inner)));
        }
        let basic = !matches!(
            ty.kind(),
            Kind::Struct
                | Kind::Array
                | Kind::Ptr
                | Kind::Slice
                | Kind::Map
                | Kind::Chan
                | Kind::Func
        );
        if basic && self.kind() == ty.kind() {
            return Ok(Self::from_parts(ty.clone(), self.data));
        }
        if self.ty.name().is_none() || ty.name().is_none() {
            if self.ty.underlying_eq(ty) {
                return Ok(Self::from_parts(ty.clone(), self.data));
            }
        }
        Err(Error::mismatch(ty, &self.ty))
    }

    /// Script-level `==`: defined for comparable kinds only
    pub fn equals(&self, other: &Value) -> Result<bool, Error> {
        if self.ty != other.ty {
            return Ok(false);
        }
        Ok(match (&self.data, &other.data) {
            (Data::Bool(a), Data::Bool(b)) => a == b,
            (Data::Int(a), Data::Int(b)) => a == b,
            (Data::Uint(a), Data::Uint(b)) => a == b,
            (Data::Float(a), Data::Float(b)) => a == b,
            (Data::Complex(ar, ai), Data::Complex(br, bi)) => ar == br && ai == bi,
            (Data::String(a), Data::String(b)) => a == b,
            (Data::Struct(a), Data::Struct(b)) | (Data::Array(a), Data::Array(b)) => {
                for (x, y) in a.iter().zip(b) {
                    if !x.equals(y)? {
                        return Ok(false);
                    }
                }
                true
            }
            (Data::Ptr(a), Data::Ptr(b)) => match (a, b) {
                (Some(a), Some(b)) => a.same_address(b),
                (None, None) => true,
                _ => false,
            },
            (Data::Chan(a), Data::Chan(b)) => match (a, b) {
                (Some(a), Some(b)) => a.same(b),
                (None, None) => true,
                _ => false,
            },
            (Data::Interface(a), Data::Interface(b)) => match (a, b) {
                (Some(a), Some(b)) => a.equals(b)?,
                (None, None) => true,
                _ => false,
            },
            _ => {
                return Err(Error::Unsupported(format!(
                    "{} cannot be compared",
                    self.ty
                )))
            }
        })
    }

    fn deep_eq(&self, other: &Value, visited: &mut Vec<(usize, usize)>) -> bool {
        if self.ty != other.ty {
            return false;
        }
        match (&self.data, &other.data) {
            (Data::Struct(a), Data::Struct(b)) | (Data::Array(a), Data::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.deep_eq(y, visited))
            }
            (Data::Ptr(a), Data::Ptr(b)) => match (a, b) {
                (Some(a), Some(b)) => {
                    if a.same_address(b) {
                        return true;
                    }
                    let key = (a.address(), b.address());
                    if visited.contains(&key) {
                        return true;
                    }
                    visited.push(key);
                    a.get().deep_eq(&b.get(), visited)
                }
                (None, None) => true,
                _ => false,
            },
            (Data::Slice(a), Data::Slice(b)) => match (a, b) {
                (Some(a), Some(b)) => {
                    a.len() == b.len()
                        && (a.same_backing(b)
                            || a.to_vec()
                                .iter()
                                .zip(b.to_vec().iter())
                                .all(|(x, y)| x.deep_eq(y, visited)))
                }
                (None, None) => true,
                _ => false,
            },
            (Data::Map(a), Data::Map(b)) => match (a, b) {
                (Some(a), Some(b)) => {
                    if a.same(b) {
                        return true;
                    }
                    a.len() == b.len()
                        && a.entries().iter().all(|(key, x)| match b.get(key) {
                            Ok(Some(y)) => x.deep_eq(&y, visited),
                            _ => false,
                        })
                }
                (None, None) => true,
                _ => false,
            },
            (Data::Chan(a), Data::Chan(b)) => match (a, b) {
                (Some(a), Some(b)) => a.same(b),
                (None, None) => true,
                _ => false,
            },
            (Data::Func(a), Data::Func(b)) => a.is_none() && b.is_none(),
            (Data::Interface(a), Data::Interface(b)) => match (a, b) {
                (Some(a), Some(b)) => a.deep_eq(b, visited),
                (None, None) => true,
                _ => false,
            },
            _ => self.equals(other).unwrap_or(false),
        }
    }

    fn fmt_depth(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        match &self.data {
            Data::Bool(b) => write!(f, "{b}"),
            Data::Int(i) => write!(f, "{i}"),
            Data::Uint(u) => write!(f, "{u}"),
            Data::Float(x) => write!(f, "{x}"),
            Data::Complex(re, im) => {
                let sign = if *im >= 0.0 || im.is_nan() { "+" } else { "" };
                write!(f, "({re}{sign}{im}i)")
            }
            Data::String(s) => f.write_str(s),
            Data::Struct(items) => {
                f.write_str("{")?;
                fmt_items(f, items, depth)?;
                f.write_str("}")
            }
            Data::Array(items) => {
                f.write_str("[")?;
                fmt_items(f, items, depth)?;
                f.write_str("]")
            }
            Data::Slice(None) => f.write_str("[]"),
            Data::Slice(Some(slice)) => {
                f.write_str("[")?;
                fmt_items(f, &slice.to_vec(), depth)?;
                f.write_str("]")
            }
            Data::Map(None) => f.write_str("map[]"),
            Data::Map(Some(map)) => {
                f.write_str("map[")?;
                for (i, (key, value)) in map.entries().iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    key.fmt_depth(f, depth + 1)?;
                    f.write_str(":")?;
                    value.fmt_depth(f, depth + 1)?;
                }
                f.write_str("]")
            }
            Data::Ptr(Some(ptr)) => {
                let shown = matches!(
                    ptr.elem_type().kind(),
                    Kind::Struct | Kind::Array | Kind::Slice | Kind::Map
                );
                if depth == 0 && shown {
                    f.write_str("&")?;
                    ptr.get().fmt_depth(f, depth + 1)
                } else {
                    write!(f, "{:#x}", ptr.address())
                }
            }
            Data::Chan(Some(chan)) => write!(f, "{:#x}", chan.address()),
            Data::Func(Some(func)) => write!(f, "{:#x}", func.address()),
            Data::Interface(Some(inner)) => inner.fmt_depth(f, depth),
            Data::Ptr(None) | Data::Chan(None) | Data::Func(None) | Data::Interface(None) => {
                f.write_str("<nil>")
            }
        }
    }
}

fn fmt_items(f: &mut fmt::Formatter<'_>, items: &[Value], depth: usize) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        item.fmt_depth(f, depth + 1)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_depth(f, 0)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.ty, self)
    }
}

/// Deep equality: pointers, slices and maps compare by what they reference.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other, &mut Vec::new())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::from_parts(Type::bool(), Data::Bool(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::from_parts(Type::int(), Data::Int(value))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::from(i64::from(value))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::from_parts(Type::uint(), Data::Uint(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::from_parts(Type::float64(), Data::Float(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::from_parts(Type::string(), Data::String(value.to_string()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::from_parts(Type::string(), Data::String(value))
    }
}
