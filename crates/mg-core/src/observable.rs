//! Observability trait for inspecting component state.
//!
//! Every simulated component exposes its internal state for textual
//! introspection. Queries and dumps never affect simulation state.

use std::collections::HashMap;
use std::fmt;

/// A dynamically-typed value for state queries.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    F64(f64),
    String(String),
    Array(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v:#04X}"),
            Value::U16(v) => write!(f, "{v:#06X}"),
            Value::U32(v) => write!(f, "{v:#010X}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::I8(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

macro_rules! impl_value_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    };
}

impl_value_from!(bool, Bool);
impl_value_from!(u8, U8);
impl_value_from!(u16, U16);
impl_value_from!(u32, U32);
impl_value_from!(u64, U64);
impl_value_from!(i8, I8);
impl_value_from!(f64, F64);
impl_value_from!(String, String);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

/// A component whose state can be inspected without disturbing it.
///
/// `query`/`query_paths` give single-value, machine-friendly access (used
/// by the sampling registry and scripted inspection). `describe`/`dump`
/// give the free-text, human-friendly surface equivalent to the original
/// `Cmd_Info`/`Cmd_Read` commands: a one-time help blurb and a tabular
/// dump of whatever this component considers its primary state.
pub trait Inspect {
    /// Query a specific property by dotted path. `None` if unrecognised.
    fn query(&self, path: &str) -> Option<Value>;

    /// All paths this object accepts in `query`.
    fn query_paths(&self) -> &'static [&'static str];

    /// Short free-text description of what this object is and what
    /// `dump` supports, matching `Cmd_Info`.
    fn describe(&self) -> String {
        String::new()
    }

    /// Renders a tabular dump of this object's primary state into `out`,
    /// matching `Cmd_Read`. `args` are the trailing words of an `inspect`
    /// command (e.g. `["buffers"]`).
    fn dump(&self, out: &mut dyn fmt::Write, args: &[String]) -> fmt::Result {
        let _ = args;
        write!(out, "{}", self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_display_matches_hex_width_per_size() {
        assert_eq!(Value::from(0xABu8).to_string(), "0xAB");
        assert_eq!(Value::from(0x1234u16).to_string(), "0x1234");
    }
}
