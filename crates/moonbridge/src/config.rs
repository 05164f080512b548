//! Behavior flags and bridge configuration
//!
//! [`ReflectOptions`] travels with every proxy and is copied unchanged into every
//! value derived from it. [`Config`] holds interpreter-wide defaults and is stored
//! as app data on the Lua state.
//!
//! ## Lua-side configuration
//!
//! ```lua
//! -- a host loader can parse a table like this with Config::from_lua
//! return {
//!     default_options = { transparent_pointers = true, auto_populate = true },
//!     slice_prealloc = 16,
//! }
//! ```

use crate::error::Error;
use mlua::{Lua, LuaSerdeExt, Value as LuaValue};
use serde::{Deserialize, Serialize};

/// Capacity given to nil slice fields that are lazily allocated on read.
pub const DEFAULT_SLICE_PREALLOC: usize = 10;

/// Behavior flags attached to a proxy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectOptions {
    /// Reject every mutating operation on the value and anything reached through it.
    pub immutable: bool,

    /// Pointer fields read and assign as if they were the pointed-to value.
    pub transparent_pointers: bool,

    /// Requests lazy allocation of nil fields. Allocation already follows from
    /// `transparent_pointers` on addressable, mutable structs, so this flag only
    /// travels with the proxy.
    pub auto_populate: bool,
}

impl ReflectOptions {
    /// Options with only `immutable` set
    pub fn immutable() -> Self {
        Self {
            immutable: true,
            ..Self::default()
        }
    }

    /// Options with only `transparent_pointers` set
    pub fn transparent() -> Self {
        Self {
            transparent_pointers: true,
            ..Self::default()
        }
    }

    /// Transparent pointers with lazy allocation
    pub fn auto_populated() -> Self {
        Self {
            transparent_pointers: true,
            auto_populate: true,
            ..Self::default()
        }
    }

    /// Whether a nil field may be allocated during a read.
    ///
    /// The caller still has to check that the containing struct is addressable.
    pub(crate) fn may_allocate(&self) -> bool {
        self.transparent_pointers && !self.immutable
    }
}

/// Interpreter-wide bridge settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Flags used by [`crate::wrap`] when the caller does not pass any.
    pub default_options: ReflectOptions,

    /// Capacity of slices created by lazy field allocation.
    pub slice_prealloc: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_options: ReflectOptions::default(),
            slice_prealloc: DEFAULT_SLICE_PREALLOC,
        }
    }
}

impl Config {
    /// Parse a configuration table produced by a Lua script
    pub fn from_lua(lua: &Lua, value: LuaValue) -> Result<Self, Error> {
        Ok(lua.from_value(value)?)
    }
}

/// Install `config` on the Lua state, replacing any previous configuration
pub fn configure(lua: &Lua, config: Config) {
    lua.set_app_data(config);
}

/// Configuration currently installed on `lua`, or the defaults.
pub(crate) fn current(lua: &Lua) -> Config {
    lua.app_data_ref::<Config>()
        .map(|config| config.clone())
        .unwrap_or_default()
}
