//! Typed scalar values exchanged with the device.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The numeric type of every parameter of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamType {
    /// Unsigned 8 bit integer
    UInt8,
    /// Signed 32 bit integer
    Int32,
    /// Unsigned 32 bit integer
    UInt32,
    /// 32 bit float
    Float,
    /// 32 bit float holding an angle in radians
    Radians,
}

impl ParamType {
    /// The bounds the type itself can represent.
    pub fn natural_bounds(self) -> (f64, f64) {
        match self {
            ParamType::UInt8 => (u8::MIN as f64, u8::MAX as f64),
            ParamType::Int32 => (i32::MIN as f64, i32::MAX as f64),
            ParamType::UInt32 => (u32::MIN as f64, u32::MAX as f64),
            ParamType::Float | ParamType::Radians => (f32::MIN as f64, f32::MAX as f64),
        }
    }

    /// Whether values of this type must be whole numbers.
    pub fn is_integral(self) -> bool {
        matches!(self, ParamType::UInt8 | ParamType::Int32 | ParamType::UInt32)
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::UInt8 => "uint8",
            ParamType::Int32 => "int32",
            ParamType::UInt32 => "uint32",
            ParamType::Float => "float",
            ParamType::Radians => "radians",
        };
        write!(f, "{}", name)
    }
}

/// A single parameter value, tagged with its type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// A [`ParamType::UInt8`] value
    UInt8(u8),
    /// A [`ParamType::Int32`] value
    Int32(i32),
    /// A [`ParamType::UInt32`] value
    UInt32(u32),
    /// A [`ParamType::Float`] value
    Float(f32),
    /// A [`ParamType::Radians`] value
    Radians(f32),
}

impl Value {
    /// Converts a raw number into a value of `param_type`. Returns `None`
    /// when the number is not finite, not whole for an integer type, or
    /// outside what the type can hold.
    pub fn coerce(param_type: ParamType, raw: f64) -> Option<Self> {
        if !raw.is_finite() {
            return None;
        }
        if param_type.is_integral() && raw.fract() != 0.0 {
            return None;
        }
        let (min, max) = param_type.natural_bounds();
        if raw < min || raw > max {
            return None;
        }

        Some(match param_type {
            ParamType::UInt8 => Value::UInt8(raw as u8),
            ParamType::Int32 => Value::Int32(raw as i32),
            ParamType::UInt32 => Value::UInt32(raw as u32),
            ParamType::Float => Value::Float(raw as f32),
            ParamType::Radians => Value::Radians(raw as f32),
        })
    }

    /// The type this value carries.
    pub fn param_type(&self) -> ParamType {
        match self {
            Value::UInt8(_) => ParamType::UInt8,
            Value::Int32(_) => ParamType::Int32,
            Value::UInt32(_) => ParamType::UInt32,
            Value::Float(_) => ParamType::Float,
            Value::Radians(_) => ParamType::Radians,
        }
    }

    /// Widens the value for arithmetic and range checks.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::UInt8(v) => v as f64,
            Value::Int32(v) => v as f64,
            Value::UInt32(v) => v as f64,
            Value::Float(v) | Value::Radians(v) => v as f64,
        }
    }
}

/// The argument token handed to `xvf_host`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::UInt8(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::Float(v) | Value::Radians(v) => write!(f, "{}", v),
        }
    }
}
