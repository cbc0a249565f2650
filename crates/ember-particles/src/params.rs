//! Named parameter schemas.
//!
//! Systems, emitters and affectors describe their tunable fields with a static
//! table of [`ParamDef`]s so that definition files can configure them through
//! plain `name = "value"` pairs.

use ember_common::ParamError;
use std::fmt;

/// Value type of a parameter, for documentation and tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// `true` / `false`
    Bool,
    /// Real number
    Real,
    /// Unsigned integer
    UnsignedInt,
    /// Free text
    String,
    /// Three reals
    Vector3,
    /// Three or four reals
    Colour,
}

/// One named parameter of a configurable type `T`.
pub struct ParamDef<T> {
    /// Name used in definitions
    pub name: &'static str,
    /// Human readable description
    pub description: &'static str,
    /// Value type
    pub kind: ParamKind,
    /// Reads the current value as text
    pub get: fn(&T) -> String,
    /// Parses and applies a value
    pub set: fn(&mut T, &str) -> Result<(), ParamError>,
}

impl<T> fmt::Debug for ParamDef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Looks up a parameter by name.
#[must_use]
pub fn find<'a, T>(defs: &'a [ParamDef<T>], name: &str) -> Option<&'a ParamDef<T>> {
    defs.iter().find(|def| def.name == name)
}

/// Sets `name` on `target` from a schema.
///
/// Returns `None` when the schema has no such parameter so callers can fall
/// back to another layer.
pub fn set_in<T>(
    defs: &[ParamDef<T>],
    target: &mut T,
    name: &str,
    value: &str,
) -> Option<Result<(), ParamError>> {
    find(defs, name).map(|def| (def.set)(target, value))
}

/// Reads `name` from `target` through a schema.
#[must_use]
pub fn get_in<T>(defs: &[ParamDef<T>], target: &T, name: &str) -> Option<String> {
    find(defs, name).map(|def| (def.get)(target))
}

/// Names of every parameter in a schema, in declaration order.
#[must_use]
pub fn names_of<T>(defs: &[ParamDef<T>]) -> Vec<&'static str> {
    defs.iter().map(|def| def.name).collect()
}

/// The error for a name no layer recognises.
#[must_use]
pub fn unknown(owner: &str, name: &str) -> ParamError {
    ParamError::UnknownParameter {
        owner: owner.to_string(),
        name: name.to_string(),
    }
}
