//! Error types for proxy operations and value conversion.

use thiserror::Error;

/// Errors raised by proxy handlers and the value converter.
///
/// Every variant converts into an [`mlua::Error`], so handlers can use `?` and the
/// failure surfaces at the nearest script-level error boundary.
#[derive(Error, Debug)]
pub enum Error {
    /// Mutating operation attempted on a value carrying the immutable flag.
    #[error("invalid operation on immutable {0}")]
    Immutable(&'static str),

    /// Pointer-receiver method requested through an immutable proxy.
    #[error("cannot call pointer methods on immutable objects")]
    ImmutableMethod,

    /// A script value cannot become the required host type.
    #[error("expected type {expected}, got {found}")]
    TypeMismatch { expected: String, found: String },

    /// Field name does not resolve through the type descriptor.
    #[error("unknown field {0}")]
    UnknownField(String),

    /// Equality or ordering across representations that cannot be compared.
    #[error("invalid operation {op} on {subject}")]
    IllegalComparison { op: &'static str, subject: String },

    /// Dereference or pointer-replace on a nil pointer.
    #[error("cannot dereference nil pointer")]
    NilDereference,

    /// Write or pointer-method call on storage that is not addressable.
    #[error("cannot set {0}")]
    Unaddressable(String),

    /// Conversion failure while assigning a struct field.
    #[error("could not set field {field}: {source}")]
    FieldSet {
        field: String,
        #[source]
        source: Box<Error>,
    },

    /// Conversion failure during pointer-replace.
    #[error("unable to set pointer value: {0}")]
    PointerSet(#[source] Box<Error>),

    /// Element write outside the bounds of a sequence.
    #[error("index {index} out of range (length {len})")]
    OutOfRange { index: i64, len: usize },

    /// Operation not defined for the value's kind.
    #[error("invalid operation: {0}")]
    Unsupported(String),

    /// Error raised by the interpreter itself.
    #[error(transparent)]
    Lua(#[from] mlua::Error),
}

impl Error {
    pub(crate) fn mismatch(expected: impl ToString, found: impl ToString) -> Self {
        Error::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub(crate) fn comparison(op: &'static str, subject: impl Into<String>) -> Self {
        Error::IllegalComparison {
            op,
            subject: subject.into(),
        }
    }

    pub(crate) fn field_set(field: &str, source: Error) -> Self {
        Error::FieldSet {
            field: field.to_string(),
            source: Box::new(source),
        }
    }
}

impl From<Error> for mlua::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Lua(inner) => inner,
            other => mlua::Error::external(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_match_script_contract() {
        assert_eq!(
            Error::Immutable("struct").to_string(),
            "invalid operation on immutable struct"
        );
        assert_eq!(
            Error::comparison("==", "mixed chan value and pointer").to_string(),
            "invalid operation == on mixed chan value and pointer"
        );
        assert_eq!(
            Error::field_set("Str", Error::mismatch("string", "*B")).to_string(),
            "could not set field Str: expected type string, got *B"
        );
    }

    #[test]
    fn test_lua_errors_round_trip_unwrapped() {
        let err: mlua::Error = Error::Lua(mlua::Error::runtime("boom")).into();
        assert!(matches!(err, mlua::Error::RuntimeError(ref m) if m == "boom"));
    }
}
