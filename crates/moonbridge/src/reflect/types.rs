//! Host type model
//!
//! A [`Type`] is a cheap handle. Named types have identity: two handles are the same
//! named type only if they come from the same constructor call. Unnamed types
//! (`*T`, `[]T`, `map[K]V`, `struct {...}`, basic kinds) compare structurally.

use super::method::Method;
use super::value::{Data, Value};
use std::cell::{OnceCell, Ref, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Structural kind of a host type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Complex128,
    String,
    Struct,
    Ptr,
    Slice,
    Array,
    Map,
    Chan,
    Func,
    Interface,
}

impl Kind {
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Kind::Int | Kind::Int8 | Kind::Int16 | Kind::Int32 | Kind::Int64
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            Kind::Uint | Kind::Uint8 | Kind::Uint16 | Kind::Uint32 | Kind::Uint64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, Kind::Float32 | Kind::Float64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_signed() || self.is_unsigned() || self.is_float() || self == Kind::Complex128
    }

    /// Kinds whose zero value is nil
    pub fn is_nilable(self) -> bool {
        matches!(
            self,
            Kind::Ptr | Kind::Slice | Kind::Map | Kind::Chan | Kind::Func | Kind::Interface
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Int8 => "int8",
            Kind::Int16 => "int16",
            Kind::Int32 => "int32",
            Kind::Int64 => "int64",
            Kind::Uint => "uint",
            Kind::Uint8 => "uint8",
            Kind::Uint16 => "uint16",
            Kind::Uint32 => "uint32",
            Kind::Uint64 => "uint64",
            Kind::Float32 => "float32",
            Kind::Float64 => "float64",
            Kind::Complex128 => "complex128",
            Kind::String => "string",
            Kind::Struct => "struct",
            Kind::Ptr => "ptr",
            Kind::Slice => "slice",
            Kind::Array => "array",
            Kind::Map => "map",
            Kind::Chan => "chan",
            Kind::Func => "func",
            Kind::Interface => "interface",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a struct field is exposed to scripts
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Exposure {
    /// Exposed under its declared name
    Default,
    /// Exposed only under the given name
    Rename(String),
    /// Invisible to reads, writes and conversion
    Hidden,
}

/// A struct field declaration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    name: String,
    ty: Type,
    exposure: Exposure,
    embedded: bool,
    exported: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            exposure: Exposure::Default,
            embedded: false,
            exported: true,
        }
    }

    /// An unnamed field whose fields and methods are promoted into the outer struct.
    /// The field itself is named after its type.
    pub fn embedded(ty: Type) -> Self {
        let name = ty.name().map(str::to_string).unwrap_or_else(|| ty.to_string());
        Self {
            embedded: true,
            ..Self::new(name, ty)
        }
    }

    /// Expose the field under `name` instead of its declared name
    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.exposure = Exposure::Rename(name.into());
        self
    }

    /// Hide the field from scripts
    pub fn hidden(mut self) -> Self {
        self.exposure = Exposure::Hidden;
        self
    }

    /// Mark the field as unexported; it never becomes visible
    pub fn private(mut self) -> Self {
        self.exported = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn exposure(&self) -> &Exposure {
        &self.exposure
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    pub fn is_exported(&self) -> bool {
        self.exported
    }
}

/// Parameter and result types of a function or typed method
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<Type>,
    pub variadic: Option<Type>,
    pub results: Vec<Type>,
}

impl Signature {
    pub fn new(params: Vec<Type>, results: Vec<Type>) -> Self {
        Self {
            params,
            variadic: None,
            results,
        }
    }

    /// Accept any number of trailing arguments of type `elem`
    pub fn with_variadic(mut self, elem: Type) -> Self {
        self.variadic = Some(elem);
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Body {
    Basic(Kind),
    Struct(Vec<Field>),
    Ptr(Type),
    Slice(Type),
    Array(Type, usize),
    Map(Type, Type),
    Chan(Type),
    Func(Signature),
    Interface,
}

const OPAQUE: &Body = &Body::Interface;

struct TypeInner {
    name: Option<String>,
    body: OnceCell<Body>,
    methods: RefCell<Vec<Rc<Method>>>,
}

/// Handle to a host type
#[derive(Clone)]
pub struct Type(Rc<TypeInner>);

impl Type {
    fn unnamed(body: Body) -> Self {
        let body_cell = OnceCell::new();
        let _ = body_cell.set(body);
        Type(Rc::new(TypeInner {
            name: None,
            body: body_cell,
            methods: RefCell::new(Vec::new()),
        }))
    }

    pub fn basic(kind: Kind) -> Self {
        match kind {
            Kind::Struct => Self::structure(Vec::new()),
            Kind::Interface => Self::any(),
            _ => Self::unnamed(Body::Basic(kind)),
        }
    }

    pub fn bool() -> Self {
        Self::basic(Kind::Bool)
    }

    pub fn int() -> Self {
        Self::basic(Kind::Int)
    }

    pub fn int8() -> Self {
        Self::basic(Kind::Int8)
    }

    pub fn int32() -> Self {
        Self::basic(Kind::Int32)
    }

    pub fn int64() -> Self {
        Self::basic(Kind::Int64)
    }

    pub fn uint() -> Self {
        Self::basic(Kind::Uint)
    }

    pub fn uint8() -> Self {
        Self::basic(Kind::Uint8)
    }

    pub fn float32() -> Self {
        Self::basic(Kind::Float32)
    }

    pub fn float64() -> Self {
        Self::basic(Kind::Float64)
    }

    pub fn complex128() -> Self {
        Self::basic(Kind::Complex128)
    }

    pub fn string() -> Self {
        Self::basic(Kind::String)
    }

    /// The empty interface: holds any value
    pub fn any() -> Self {
        Self::unnamed(Body::Interface)
    }

    pub fn ptr(elem: &Type) -> Self {
        Self::unnamed(Body::Ptr(elem.clone()))
    }

    pub fn slice(elem: &Type) -> Self {
        Self::unnamed(Body::Slice(elem.clone()))
    }

    pub fn array(elem: &Type, len: usize) -> Self {
        Self::unnamed(Body::Array(elem.clone(), len))
    }

    pub fn map(key: &Type, value: &Type) -> Self {
        Self::unnamed(Body::Map(key.clone(), value.clone()))
    }

    pub fn chan(elem: &Type) -> Self {
        Self::unnamed(Body::Chan(elem.clone()))
    }

    pub fn func(signature: Signature) -> Self {
        Self::unnamed(Body::Func(signature))
    }

    pub fn structure(fields: Vec<Field>) -> Self {
        Self::unnamed(Body::Struct(fields))
    }

    /// Declare a named type with the same underlying structure as `underlying`
    pub fn named(name: impl Into<String>, underlying: Type) -> Self {
        Self::recursive(name, |_| underlying)
    }

    /// Declare a named type whose definition refers to itself.
    ///
    /// `define` receives the handle being declared (e.g. to build `*Person` inside
    /// `Person`) and returns the underlying type. It must not inspect the handle.
    pub fn recursive(name: impl Into<String>, define: impl FnOnce(&Type) -> Type) -> Self {
        let ty = Type(Rc::new(TypeInner {
            name: Some(name.into()),
            body: OnceCell::new(),
            methods: RefCell::new(Vec::new()),
        }));
        let underlying = define(&ty);
        let _ = ty.0.body.set(underlying.body().clone());
        ty
    }

    /// Attach a method to this type. Register methods before the type is first
    /// wrapped: descriptors are cached on first use.
    pub fn add_method(&self, method: Method) -> &Self {
        self.0.methods.borrow_mut().push(Rc::new(method));
        self
    }

    pub(crate) fn declared_methods(&self) -> Ref<'_, Vec<Rc<Method>>> {
        self.0.methods.borrow()
    }

    pub(crate) fn body(&self) -> &Body {
        self.0.body.get().unwrap_or(OPAQUE)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn kind(&self) -> Kind {
        match self.body() {
            Body::Basic(kind) => *kind,
            Body::Struct(_) => Kind::Struct,
            Body::Ptr(_) => Kind::Ptr,
            Body::Slice(_) => Kind::Slice,
            Body::Array(..) => Kind::Array,
            Body::Map(..) => Kind::Map,
            Body::Chan(_) => Kind::Chan,
            Body::Func(_) => Kind::Func,
            Body::Interface => Kind::Interface,
        }
    }

    /// Element type of pointers, slices, arrays and chans; value type of maps
    pub fn elem(&self) -> Option<&Type> {
        match self.body() {
            Body::Ptr(elem) | Body::Slice(elem) | Body::Array(elem, _) | Body::Chan(elem) => {
                Some(elem)
            }
            Body::Map(_, value) => Some(value),
            _ => None,
        }
    }

    /// Key type of maps
    pub fn key(&self) -> Option<&Type> {
        match self.body() {
            Body::Map(key, _) => Some(key),
            _ => None,
        }
    }

    /// Length of array types
    pub fn array_len(&self) -> Option<usize> {
        match self.body() {
            Body::Array(_, len) => Some(*len),
            _ => None,
        }
    }

    pub fn fields(&self) -> &[Field] {
        match self.body() {
            Body::Struct(fields) => fields,
            _ => &[],
        }
    }

    pub fn signature(&self) -> Option<&Signature> {
        match self.body() {
            Body::Func(signature) => Some(signature),
            _ => None,
        }
    }

    /// Zero value of this type
    pub fn zero(&self) -> Value {
        let data = match self.body() {
            Body::Basic(kind) => match kind {
                Kind::Bool => Data::Bool(false),
                Kind::Float32 | Kind::Float64 => Data::Float(0.0),
                Kind::Complex128 => Data::Complex(0.0, 0.0),
                Kind::String => Data::String(String::new()),
                kind if kind.is_unsigned() => Data::Uint(0),
                _ => Data::Int(0),
            },
            Body::Struct(fields) => Data::Struct(fields.iter().map(|f| f.ty.zero()).collect()),
            Body::Array(elem, len) => Data::Array((0..*len).map(|_| elem.zero()).collect()),
            Body::Ptr(_) => Data::Ptr(None),
            Body::Slice(_) => Data::Slice(None),
            Body::Map(..) => Data::Map(None),
            Body::Chan(_) => Data::Chan(None),
            Body::Func(_) => Data::Func(None),
            Body::Interface => Data::Interface(None),
        };
        Value::from_parts(self.clone(), data)
    }

    /// Index of the field declared as `name` (declared name, no exposure rules)
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields().iter().position(|f| f.name == name)
    }

    fn fmt_body(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.body() {
            Body::Basic(kind) => f.write_str(kind.name()),
            Body::Struct(fields) => {
                f.write_str("struct {")?;
                for (i, field) in fields.iter().enumerate() {
                    let sep = if i == 0 { " " } else { "; " };
                    write!(f, "{sep}{} {}", field.name, field.ty)?;
                }
                if fields.is_empty() {
                    f.write_str("}")
                } else {
                    f.write_str(" }")
                }
            }
            Body::Ptr(elem) => write!(f, "*{elem}"),
            Body::Slice(elem) => write!(f, "[]{elem}"),
            Body::Array(elem, len) => write!(f, "[{len}]{elem}"),
            Body::Map(key, value) => write!(f, "map[{key}]{value}"),
            Body::Chan(elem) => write!(f, "chan {elem}"),
            Body::Func(signature) => {
                f.write_str("func(")?;
                for (i, param) in signature.params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{param}")?;
                }
                if let Some(variadic) = &signature.variadic {
                    if !signature.params.is_empty() {
                        f.write_str(", ")?;
                    }
                    write!(f, "...{variadic}")?;
                }
                f.write_str(")")?;
                match signature.results.as_slice() {
                    [] => Ok(()),
                    [single] => write!(f, " {single}"),
                    many => {
                        f.write_str(" (")?;
                        for (i, result) in many.iter().enumerate() {
                            if i > 0 {
                                f.write_str(", ")?;
                            }
                            write!(f, "{result}")?;
                        }
                        f.write_str(")")
                    }
                }
            }
            Body::Interface => f.write_str("interface {}"),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.name {
            Some(name) => f.write_str(name),
            None => self.fmt_body(f),
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({self})")
    }
}

impl Type {
    /// Whether two types share the same underlying structure, ignoring their names
    pub(crate) fn underlying_eq(&self, other: &Type) -> bool {
        match (self.body(), other.body()) {
            (Body::Basic(a), Body::Basic(b)) => a == b,
            (Body::Struct(a), Body::Struct(b)) => a == b,
            (Body::Ptr(a), Body::Ptr(b))
            | (Body::Slice(a), Body::Slice(b))
            | (Body::Chan(a), Body::Chan(b)) => a == b,
            (Body::Array(a, n), Body::Array(b, m)) => n == m && a == b,
            (Body::Map(ka, va), Body::Map(kb, vb)) => ka == kb && va == vb,
            (Body::Func(a), Body::Func(b)) => a == b,
            (Body::Interface, Body::Interface) => true,
            _ => false,
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        if self.0.name.is_some() || other.0.name.is_some() {
            return false;
        }
        self.underlying_eq(other)
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if let Some(name) = &self.0.name {
            name.hash(state);
            (Rc::as_ptr(&self.0) as usize).hash(state);
            return;
        }
        self.kind().hash(state);
        match self.body() {
            Body::Struct(fields) => fields.hash(state),
            Body::Ptr(elem) | Body::Slice(elem) | Body::Chan(elem) => elem.hash(state),
            Body::Array(elem, len) => {
                elem.hash(state);
                len.hash(state);
            }
            Body::Map(key, value) => {
                key.hash(state);
                value.hash(state);
            }
            Body::Func(signature) => signature.hash(state),
            Body::Basic(_) | Body::Interface => {}
        }
    }
}
