//! Loosely typed scalar values as they appear in hand-written tier documents.
//!
//! Profiles and plans are edited by hand and often carry `"4"` for `4` or
//! `"True"` for `true`. Such fields are kept as [`ScalarValue`] until the
//! winning tier is known and are coerced afterwards.

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

/// A YAML scalar whose final type is decided after resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    /// A boolean literal.
    Bool(bool),
    /// An integer literal.
    Int(i64),
    /// A floating point literal.
    Float(f64),
    /// Anything written as a string.
    Text(String),
}

impl ScalarValue {
    /// Coerces the value to a non-negative integer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFieldType` if the value is not a whole, non-negative
    /// number that fits in `u32`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_u32(&self, field: &str) -> Result<u32, ResolveError> {
        const EXPECTED: &str = "an integer";

        match self {
            Self::Int(n) => {
                u32::try_from(*n).map_err(|_| ResolveError::invalid(field, n.to_string(), EXPECTED))
            }
            Self::Float(f) if f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX) => {
                Ok(*f as u32)
            }
            Self::Text(s) => s
                .trim()
                .parse::<u32>()
                .map_err(|_| ResolveError::invalid(field, s.clone(), EXPECTED)),
            other => Err(ResolveError::invalid(field, other.to_string(), EXPECTED)),
        }
    }

    /// Coerces the value to a boolean.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFieldType` for text that is not a recognised boolean
    /// spelling, and for floats.
    pub fn to_bool(&self, field: &str) -> Result<bool, ResolveError> {
        const EXPECTED: &str = "a boolean";

        match self {
            Self::Bool(b) => Ok(*b),
            Self::Int(n) => Ok(*n != 0),
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(ResolveError::invalid(field, s.clone(), EXPECTED)),
            },
            Self::Float(f) => Err(ResolveError::invalid(field, f.to_string(), EXPECTED)),
        }
    }
}

impl std::fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<u32> for ScalarValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}
