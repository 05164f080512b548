//! Runtime model of host values.
//!
//! Types carry their own field and method tables, so the bridge can discover
//! structure at run time instead of requiring per-type glue code.

mod containers;
mod method;
mod pointer;
mod types;
mod value;

pub use containers::{Chan, Func, Map, MapKey, Slice};
pub use method::{Method, Receiver};
pub use pointer::Pointer;
pub use types::{Exposure, Field, Kind, Signature, Type};
pub use value::{Data, Value};

pub(crate) use method::MethodBody;
