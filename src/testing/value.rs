//! Literal argument values and their coercion to declared parameter types
//!
//! Data rows are written as loosely typed literals (`1`, `"abc"`, `null`).
//! Before a test is invoked each literal is converted to the declared type
//! of the matching formal parameter through a small, closed set of rules.

use std::fmt;
use thiserror::Error;

/// A literal argument value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    /// A variant of a declared enumeration, by name
    Enum { ty: String, variant: String },
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::UInt(u) => write!(f, "{}", u),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Enum { variant, .. } => write!(f, "{}", variant),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(u: u32) -> Self {
        Value::UInt(u64::from(u))
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::UInt(u)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Build a data row from heterogeneous literals: `row![1, "abc", Value::Null]`
#[macro_export]
macro_rules! row {
    ($($value:expr),* $(,)?) => {
        vec![$($crate::testing::Value::from($value)),*]
    };
}

/// A declared enumeration parameter type
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    pub variants: Vec<String>,
}

impl EnumType {
    pub fn new<S: Into<String>>(name: &str, variants: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.to_string(),
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }
}

/// Declared type of a formal parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    Bool,
    I32,
    I64,
    U32,
    U64,
    F64,
    String,
    Enum(EnumType),
    /// Accepts `null` in addition to the wrapped type
    Nullable(Box<ParamType>),
    /// Passed through without conversion
    Any,
}

impl ParamType {
    pub fn nullable(inner: ParamType) -> Self {
        ParamType::Nullable(Box::new(inner))
    }

    /// The wrapped type for nullable formals, the type itself otherwise
    pub fn unwrap_nullable(&self) -> &ParamType {
        match self {
            ParamType::Nullable(inner) => inner.unwrap_nullable(),
            other => other,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Bool => write!(f, "bool"),
            ParamType::I32 => write!(f, "i32"),
            ParamType::I64 => write!(f, "i64"),
            ParamType::U32 => write!(f, "u32"),
            ParamType::U64 => write!(f, "u64"),
            ParamType::F64 => write!(f, "f64"),
            ParamType::String => write!(f, "string"),
            ParamType::Enum(e) => write!(f, "{}", e.name),
            ParamType::Nullable(inner) => write!(f, "{}?", inner),
            ParamType::Any => write!(f, "any"),
        }
    }
}

/// A literal that cannot be converted to its parameter's declared type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoercionError {
    #[error("cannot convert {value:?} to {target}")]
    Incompatible { value: String, target: String },

    #[error("{value} is out of range for {target}")]
    OutOfRange { value: String, target: String },

    #[error("'{value}' is not a variant of {target}")]
    UnknownVariant { value: String, target: String },
}

impl CoercionError {
    fn incompatible(value: &Value, target: &ParamType) -> Self {
        Self::Incompatible {
            value: value.to_string(),
            target: target.to_string(),
        }
    }
}

/// Convert a literal to the declared parameter type
///
/// `null` bypasses conversion entirely; nullable types are unwrapped first.
pub fn coerce(value: Value, ty: &ParamType) -> Result<Value, CoercionError> {
    if value.is_null() {
        return Ok(value);
    }

    let target = ty.unwrap_nullable();
    match target {
        ParamType::Any => Ok(value),
        ParamType::Bool => match &value {
            Value::Bool(_) => Ok(value),
            Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(CoercionError::incompatible(&value, target)),
            },
            _ => Err(CoercionError::incompatible(&value, target)),
        },
        ParamType::I32 | ParamType::I64 | ParamType::U32 | ParamType::U64 => {
            let n = integral(&value, target)?;
            let (min, max) = match target {
                ParamType::I32 => (i128::from(i32::MIN), i128::from(i32::MAX)),
                ParamType::I64 => (i128::from(i64::MIN), i128::from(i64::MAX)),
                ParamType::U32 => (0, i128::from(u32::MAX)),
                _ => (0, i128::from(u64::MAX)),
            };
            if n < min || n > max {
                return Err(CoercionError::OutOfRange {
                    value: value.to_string(),
                    target: target.to_string(),
                });
            }
            // Range checked above, the casts are lossless
            Ok(match target {
                ParamType::U32 | ParamType::U64 => Value::UInt(n as u64),
                _ => Value::Int(n as i64),
            })
        }
        ParamType::F64 => match &value {
            Value::Float(_) => Ok(value),
            Value::Int(i) => Ok(Value::Float(*i as f64)),
            Value::UInt(u) => Ok(Value::Float(*u as f64)),
            Value::Str(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| CoercionError::incompatible(&value, target)),
            _ => Err(CoercionError::incompatible(&value, target)),
        },
        ParamType::String => match value {
            Value::Str(_) => Ok(value),
            other => Ok(Value::Str(other.to_string())),
        },
        ParamType::Enum(enum_type) => coerce_enum(value, enum_type, target),
        ParamType::Nullable(_) => unreachable!("unwrap_nullable strips every Nullable layer"),
    }
}

fn integral(value: &Value, target: &ParamType) -> Result<i128, CoercionError> {
    match value {
        Value::Int(i) => Ok(i128::from(*i)),
        Value::UInt(u) => Ok(i128::from(*u)),
        // Saturating cast; oversized values fail the caller's range check
        Value::Float(x) if x.is_finite() && x.fract() == 0.0 => Ok(*x as i128),
        Value::Str(s) => s
            .trim()
            .parse::<i128>()
            .map_err(|_| CoercionError::incompatible(value, target)),
        _ => Err(CoercionError::incompatible(value, target)),
    }
}

fn coerce_enum(
    value: Value,
    enum_type: &EnumType,
    target: &ParamType,
) -> Result<Value, CoercionError> {
    let variant = match &value {
        Value::Str(name) | Value::Enum { variant: name, .. } => enum_type
            .variants
            .iter()
            .find(|v| v.as_str() == name.as_str())
            .or_else(|| {
                enum_type
                    .variants
                    .iter()
                    .find(|v| v.eq_ignore_ascii_case(name))
            }),
        Value::Int(i) => usize::try_from(*i)
            .ok()
            .and_then(|index| enum_type.variants.get(index)),
        Value::UInt(u) => usize::try_from(*u)
            .ok()
            .and_then(|index| enum_type.variants.get(index)),
        _ => return Err(CoercionError::incompatible(&value, target)),
    };

    match variant {
        Some(variant) => Ok(Value::Enum {
            ty: enum_type.name.clone(),
            variant: variant.clone(),
        }),
        None => Err(CoercionError::UnknownVariant {
            value: value.to_string(),
            target: enum_type.name.clone(),
        }),
    }
}

/// Types a test body can extract from its argument list
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).and_then(|i| i32::try_from(i).ok())
    }
}

impl FromValue for u64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::UInt(u) => Some(*u),
            Value::Int(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl FromValue for u32 {
    fn from_value(value: &Value) -> Option<Self> {
        u64::from_value(value).and_then(|u| u32::try_from(u).ok())
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(x) => Some(*x),
            Value::Int(i) => Some(*i as f64),
            Value::UInt(u) => Some(*u as f64),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s.clone()),
            Value::Enum { variant, .. } => Some(variant.clone()),
            _ => None,
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// An argument a test body asked for that is missing or of another type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArgumentError {
    #[error("argument {index} was not supplied")]
    Missing { index: usize },

    #[error("argument {index} is {found}, expected {expected}")]
    WrongType {
        index: usize,
        expected: &'static str,
        found: String,
    },
}

/// The coerced, backfilled argument list handed to a test body
#[derive(Debug, Clone, Copy)]
pub struct Arguments<'a> {
    values: &'a [Value],
}

impl<'a> Arguments<'a> {
    pub fn new(values: &'a [Value]) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn raw(&self, index: usize) -> Option<&'a Value> {
        self.values.get(index)
    }

    /// Extract argument `index` as `T`
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T, ArgumentError> {
        let value = self.raw(index).ok_or(ArgumentError::Missing { index })?;
        T::from_value(value).ok_or_else(|| ArgumentError::WrongType {
            index,
            expected: std::any::type_name::<T>(),
            found: format!("{:?}", value),
        })
    }
}
