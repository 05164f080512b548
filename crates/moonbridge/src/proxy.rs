//! Wrapping host values for scripts
//!
//! Primitives cross into Lua as native values. Everything with identity or
//! interior structure crosses as a [`Proxy`] userdata whose metamethods dispatch
//! to the handler set for the value's kind.

use crate::config::{self, ReflectOptions};
use crate::handlers;
use crate::reflect::{Data, Func, Kind, Pointer, Type, Value};
use mlua::{
    AnyUserData, FromLua, Function, Lua, MetaMethod, MultiValue, Result as LuaResult, UserData,
    UserDataMethods, Value as LuaValue,
};
use tracing::trace;

#[derive(Clone)]
pub(crate) enum Target {
    /// A copy of the value; not addressable
    Owned(Value),
    /// The value stored at an address; addressable
    Place(Pointer),
}

/// Script-side handle to a host value
#[derive(Clone)]
pub struct Proxy {
    target: Target,
    options: ReflectOptions,
}

impl Proxy {
    pub(crate) fn owned(value: Value, options: ReflectOptions) -> Self {
        Self {
            target: Target::Owned(value),
            options,
        }
    }

    pub(crate) fn at(ptr: Pointer, options: ReflectOptions) -> Self {
        Self {
            target: Target::Place(ptr),
            options,
        }
    }

    /// Current host value behind the proxy
    pub fn value(&self) -> Value {
        match &self.target {
            Target::Owned(value) => value.clone(),
            Target::Place(ptr) => ptr.get(),
        }
    }

    pub fn ty(&self) -> Type {
        match &self.target {
            Target::Owned(value) => value.ty().clone(),
            Target::Place(ptr) => ptr.elem_type(),
        }
    }

    pub fn options(&self) -> ReflectOptions {
        self.options
    }

    /// Whether the proxy refers to storage rather than holding a copy
    pub fn is_addressable(&self) -> bool {
        matches!(self.target, Target::Place(_))
    }

    pub(crate) fn target(&self) -> &Target {
        &self.target
    }

    pub(crate) fn place(&self) -> Option<&Pointer> {
        match &self.target {
            Target::Place(ptr) => Some(ptr),
            Target::Owned(_) => None,
        }
    }

    /// Type whose descriptor applies: the pointed-to type for pointers
    pub(crate) fn base_type(&self) -> Type {
        let ty = self.ty();
        match (ty.kind(), ty.elem()) {
            (Kind::Ptr, Some(elem)) => elem.clone(),
            _ => ty,
        }
    }

    /// Held as an address: either a pointer value or a place
    pub(crate) fn is_pointer_form(&self) -> bool {
        match &self.target {
            Target::Place(_) => true,
            Target::Owned(value) => value.kind() == Kind::Ptr,
        }
    }

    pub(crate) fn is_nil_pointer(&self) -> bool {
        matches!(&self.target, Target::Owned(value) if matches!(value.data(), Data::Ptr(None)))
    }

    /// Storage the proxy reaches through, if any
    pub(crate) fn address(&self) -> Option<Pointer> {
        match &self.target {
            Target::Place(ptr) => Some(ptr.clone()),
            Target::Owned(value) => value.as_pointer().cloned(),
        }
    }
}

impl FromLua for Proxy {
    fn from_lua(value: LuaValue, _lua: &Lua) -> LuaResult<Self> {
        match value {
            LuaValue::UserData(ud) => ud.borrow::<Proxy>().map(|p| Proxy::clone(&p)),
            _ => Err(mlua::Error::FromLuaConversionError {
                from: value.type_name(),
                to: "Proxy".to_string(),
                message: Some("expected a wrapped host value".to_string()),
            }),
        }
    }
}

impl UserData for Proxy {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: LuaValue| {
            Ok(handlers::index(lua, this, key)?)
        });

        methods.add_meta_method(
            MetaMethod::NewIndex,
            |lua, this, (key, value): (LuaValue, LuaValue)| {
                Ok(handlers::new_index(lua, this, key, value)?)
            },
        );

        methods.add_meta_method(MetaMethod::Len, |_, this, ()| Ok(handlers::len(this)?));

        methods.add_meta_method(MetaMethod::Call, |lua, this, _args: MultiValue| {
            Ok(handlers::call(lua, this)?)
        });

        methods.add_meta_method(MetaMethod::Eq, |_, this, other: AnyUserData| {
            // Lua only consults __eq for two userdata; foreign ones never match
            let Ok(other) = other.borrow::<Proxy>() else {
                return Ok(false);
            };
            Ok(handlers::eq(this, &other)?)
        });

        methods.add_meta_method(MetaMethod::Lt, |_, this, _other: LuaValue| {
            Err::<bool, _>(handlers::ordering("<", this).into())
        });

        methods.add_meta_method(MetaMethod::Le, |_, this, _other: LuaValue| {
            Err::<bool, _>(handlers::ordering("<=", this).into())
        });

        methods.add_meta_method(MetaMethod::ToString, |lua, this, ()| {
            Ok(handlers::to_string(lua, this)?)
        });

        // -p dereferences
        methods.add_meta_method(MetaMethod::Unm, |lua, this, ()| Ok(handlers::unm(lua, this)?));

        // p ^ v replaces the pointed-to value
        methods.add_meta_method(MetaMethod::Pow, |lua, this, value: LuaValue| {
            Ok(handlers::pow(lua, this, value)?)
        });
    }
}

/// Wrap `value` with the options configured on `lua` (see [`config::configure`]).
pub fn wrap(lua: &Lua, value: Value) -> LuaResult<LuaValue> {
    wrap_with(lua, value, config::current(lua).default_options)
}

/// Wrap `value` for scripts, attaching `options` to the resulting proxy.
///
/// Booleans, numbers and strings become native Lua values, nil pointers and
/// nil containers become `nil`, and funcs become Lua functions. Anything else
/// becomes a [`Proxy`].
pub fn wrap_with(lua: &Lua, value: Value, options: ReflectOptions) -> LuaResult<LuaValue> {
    trace!("Wrapping {} value", value.ty());
    Ok(match value.data() {
        Data::Bool(b) => LuaValue::Boolean(*b),
        Data::Int(i) => LuaValue::Integer(*i),
        Data::Uint(u) => match i64::try_from(*u) {
            Ok(i) => LuaValue::Integer(i),
            Err(_) => LuaValue::Number(*u as f64),
        },
        Data::Float(f) => LuaValue::Number(*f),
        Data::String(s) => LuaValue::String(lua.create_string(s)?),
        Data::Interface(Some(inner)) => return wrap_with(lua, (**inner).clone(), options),
        Data::Func(Some(func)) => {
            LuaValue::Function(func_to_lua(lua, func.clone(), value.ty(), options)?)
        }
        _ if value.is_nil() => LuaValue::Nil,
        _ => LuaValue::UserData(lua.create_userdata(Proxy::owned(value, options))?),
    })
}

/// Wrap the value stored at `ptr`. Structs and arrays stay addressable; other
/// kinds are wrapped by value.
pub(crate) fn wrap_place(lua: &Lua, ptr: Pointer, options: ReflectOptions) -> LuaResult<LuaValue> {
    match ptr.elem_type().kind() {
        Kind::Struct | Kind::Array => Ok(LuaValue::UserData(
            lua.create_userdata(Proxy::at(ptr, options))?,
        )),
        _ => wrap_with(lua, ptr.get(), options),
    }
}

pub(crate) fn wrap_results(
    lua: &Lua,
    results: Vec<Value>,
    options: ReflectOptions,
) -> LuaResult<MultiValue> {
    results
        .into_iter()
        .map(|value| wrap_with(lua, value, options))
        .collect::<LuaResult<Vec<_>>>()
        .map(MultiValue::from_vec)
}

fn func_to_lua(lua: &Lua, func: Func, ty: &Type, options: ReflectOptions) -> LuaResult<Function> {
    let signature = ty.signature().cloned().unwrap_or_default();
    lua.create_function(move |lua, args: MultiValue| {
        let args = crate::convert::convert_args(&signature, args)?;
        let results = func.call(lua, &args)?;
        wrap_results(lua, results, options)
    })
}
