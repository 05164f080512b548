//! Methods declared on host types

use super::types::Signature;
use super::value::Value;
use crate::error::Error;
use mlua::{Lua, MultiValue};
use std::fmt;
use std::rc::Rc;

/// How a method receives its receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Receiver {
    /// Gets a copy of the value; callable through values and pointers
    Value,
    /// Gets a pointer to the value; callable only through addressable storage
    Pointer,
}

type TypedFn = dyn Fn(&Lua, &Value, &[Value]) -> Result<Vec<Value>, Error>;
type RawFn = dyn Fn(&Lua, &Value, MultiValue) -> mlua::Result<MultiValue>;

#[derive(Clone)]
pub(crate) enum MethodBody {
    /// Arguments converted to `Signature::params`, results wrapped back
    Typed(Signature, Rc<TypedFn>),
    /// Script arguments passed through untouched
    Raw(Rc<RawFn>),
}

/// A named method attached to a [`super::Type`]
pub struct Method {
    name: String,
    receiver: Receiver,
    body: MethodBody,
    exported: bool,
}

impl Method {
    /// Method whose arguments are converted per `signature` before `f` runs.
    ///
    /// `f` receives the receiver (a struct copy for [`Receiver::Value`], a
    /// pointer value for [`Receiver::Pointer`]) and the converted arguments.
    pub fn new(
        name: impl Into<String>,
        receiver: Receiver,
        signature: Signature,
        f: impl Fn(&Lua, &Value, &[Value]) -> Result<Vec<Value>, Error> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            receiver,
            body: MethodBody::Typed(signature, Rc::new(f)),
            exported: true,
        }
    }

    /// Method that receives the script arguments as-is and returns script values.
    pub fn raw(
        name: impl Into<String>,
        receiver: Receiver,
        f: impl Fn(&Lua, &Value, MultiValue) -> mlua::Result<MultiValue> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            receiver,
            body: MethodBody::Raw(Rc::new(f)),
            exported: true,
        }
    }

    /// Hide the method from scripts
    pub fn private(mut self) -> Self {
        self.exported = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn receiver(&self) -> Receiver {
        self.receiver
    }

    pub fn is_exported(&self) -> bool {
        self.exported
    }

    pub(crate) fn body(&self) -> &MethodBody {
        &self.body
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("receiver", &self.receiver)
            .field("exported", &self.exported)
            .finish_non_exhaustive()
    }
}
