//! Reflected host values for Lua 5.4
//!
//! This crate lets scripts read and mutate host data without per-type glue:
//! - **Reflection model**: [`Type`] and [`Value`] describe host data at run time
//! - **Proxies**: structs, slices, maps, chans and pointers cross as userdata
//! - **Conversion**: script values convert back to any host type with [`convert_for`]
//! - **Options**: immutable, transparent-pointer and auto-populate flags ride along
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │  Host value (Type + Value)                 │
//! └────────────────────────────────────────────┘
//!             │ wrap / wrap_with
//!             ▼
//! ┌────────────────────────────────────────────┐
//! │  Proxy userdata                            │
//! │  metamethods → handlers by kind            │
//! │  names → cached TypeDescriptor             │
//! └────────────────────────────────────────────┘
//!             │ convert_for / extract
//!             ▼
//! ┌────────────────────────────────────────────┐
//! │  Host value of the requested type          │
//! └────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use moonbridge::{wrap, Field, Type, Value};
//!
//! let person = Type::named(
//!     "Person",
//!     Type::structure(vec![
//!         Field::new("Name", Type::string()),
//!         Field::new("Age", Type::int()),
//!     ]),
//! );
//! let tim = Value::new_pointer(person.zero().with_field("Name", "Tim".into())?);
//!
//! let lua = mlua::Lua::new();
//! lua.globals().set("p", wrap(&lua, tim.clone())?)?;
//! lua.load("p.age = p.Age + 1").exec()?;
//! ```

mod config;
mod convert;
mod descriptor;
mod error;
mod handlers;
mod proxy;
pub mod reflect;

pub use config::{configure, Config, ReflectOptions, DEFAULT_SLICE_PREALLOC};
pub use convert::{convert_for, extract};
pub use descriptor::{describe, FieldEntry, Member, MethodEntry, TypeDescriptor};
pub use error::Error;
pub use proxy::{wrap, wrap_with, Proxy};
pub use reflect::{
    Chan, Data, Exposure, Field, Func, Kind, Map, MapKey, Method, Pointer, Receiver, Signature,
    Slice, Type, Value,
};
