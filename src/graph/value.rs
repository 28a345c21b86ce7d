//! Attribute value types
//!
//! Every attribute column has an [`AttributeType`]; values travel through the
//! graph surface as [`AttributeValue`]s and are converted between types the
//! way the typed accessors expect (numeric widening and narrowing, string
//! parsing and formatting).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The native type of an attribute column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    Byte,
    Short,
    Integer,
    Long,
    Float,
    Double,
    Boolean,
    Char,
    String,
    Color,
    Object,
}

impl AttributeType {
    pub const ALL: [AttributeType; 11] = [
        AttributeType::Byte,
        AttributeType::Short,
        AttributeType::Integer,
        AttributeType::Long,
        AttributeType::Float,
        AttributeType::Double,
        AttributeType::Boolean,
        AttributeType::Char,
        AttributeType::String,
        AttributeType::Color,
        AttributeType::Object,
    ];

    /// Registered name of the type
    pub fn name(&self) -> &'static str {
        match self {
            AttributeType::Byte => "byte",
            AttributeType::Short => "short",
            AttributeType::Integer => "integer",
            AttributeType::Long => "long",
            AttributeType::Float => "float",
            AttributeType::Double => "double",
            AttributeType::Boolean => "boolean",
            AttributeType::Char => "char",
            AttributeType::String => "string",
            AttributeType::Color => "color",
            AttributeType::Object => "object",
        }
    }

    /// Look a type up by its registered name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Value an attribute of this type holds when no default is given
    pub fn native_default(&self) -> AttributeValue {
        match self {
            AttributeType::Byte => AttributeValue::Byte(0),
            AttributeType::Short => AttributeValue::Short(0),
            AttributeType::Integer => AttributeValue::Integer(0),
            AttributeType::Long => AttributeValue::Long(0),
            AttributeType::Float => AttributeValue::Float(0.0),
            AttributeType::Double => AttributeValue::Double(0.0),
            AttributeType::Boolean => AttributeValue::Boolean(false),
            AttributeType::Char => AttributeValue::Char('\0'),
            AttributeType::String => AttributeValue::String(String::new()),
            AttributeType::Color => AttributeValue::Color(Color::BLACK),
            AttributeType::Object => AttributeValue::Object(serde_json::Value::Null),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// RGBA color with components in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    pub alpha: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);

    pub const fn rgba(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Color { red, green, blue, alpha }
    }

    fn bits(&self) -> [u32; 4] {
        [self.red, self.green, self.blue, self.alpha].map(f32::to_bits)
    }

    fn packed(&self) -> u32 {
        let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
        (channel(self.red) << 24) | (channel(self.green) << 16) | (channel(self.blue) << 8) | channel(self.alpha)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.packed())
    }
}

impl FromStr for Color {
    type Err = String;

    /// Parses `#RRGGBB` or `#RRGGBBAA`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map(|v| f32::from(v) / 255.0)
                .map_err(|e| format!("invalid color '{}': {}", s, e))
        };
        if !hex.is_ascii() {
            return Err(format!("invalid color '{}'", s));
        }
        match hex.len() {
            6 => Ok(Color::rgba(channel(0)?, channel(2)?, channel(4)?, 1.0)),
            8 => Ok(Color::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => Err(format!("invalid color '{}': expected #RRGGBB or #RRGGBBAA", s)),
        }
    }
}

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Byte(i8),
    Short(i16),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Char(char),
    String(String),
    Color(Color),
    Object(serde_json::Value),
}

/// Hashable projection of a value used to group elements by primary key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyFragment {
    Int(i64),
    Bits(u64),
    Bool(bool),
    Char(char),
    Text(String),
}

/// Failure to convert a value into another attribute type
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionFailure {
    pub from: &'static str,
    pub to: AttributeType,
    pub detail: String,
}

impl fmt::Display for ConversionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot convert {} to {}: {}", self.from, self.to, self.detail)
    }
}

impl AttributeValue {
    /// The attribute type this value natively belongs to
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            AttributeValue::Byte(_) => AttributeType::Byte,
            AttributeValue::Short(_) => AttributeType::Short,
            AttributeValue::Integer(_) => AttributeType::Integer,
            AttributeValue::Long(_) => AttributeType::Long,
            AttributeValue::Float(_) => AttributeType::Float,
            AttributeValue::Double(_) => AttributeType::Double,
            AttributeValue::Boolean(_) => AttributeType::Boolean,
            AttributeValue::Char(_) => AttributeType::Char,
            AttributeValue::String(_) => AttributeType::String,
            AttributeValue::Color(_) => AttributeType::Color,
            AttributeValue::Object(_) => AttributeType::Object,
        }
    }

    /// Equality that compares floating point payloads bit for bit, so NaN
    /// matches itself and `-0.0` differs from `0.0`
    pub fn same_as(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::Float(a), AttributeValue::Float(b)) => a.to_bits() == b.to_bits(),
            (AttributeValue::Double(a), AttributeValue::Double(b)) => a.to_bits() == b.to_bits(),
            (AttributeValue::Color(a), AttributeValue::Color(b)) => a.bits() == b.bits(),
            _ => self == other,
        }
    }

    /// Get type name as string
    pub fn type_name(&self) -> &'static str {
        self.attribute_type().name()
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Byte(v) => Some(i64::from(*v)),
            AttributeValue::Short(v) => Some(i64::from(*v)),
            AttributeValue::Integer(v) => Some(i64::from(*v)),
            AttributeValue::Long(v) => Some(*v),
            AttributeValue::Float(v) => Some(*v as i64),
            AttributeValue::Double(v) => Some(*v as i64),
            AttributeValue::Boolean(v) => Some(i64::from(*v)),
            AttributeValue::Char(v) => Some(i64::from(u32::from(*v))),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Float(v) => Some(f64::from(*v)),
            AttributeValue::Double(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    fn failure(&self, to: AttributeType, detail: impl Into<String>) -> ConversionFailure {
        ConversionFailure {
            from: self.type_name(),
            to,
            detail: detail.into(),
        }
    }

    fn narrow<T: TryFrom<i64>>(&self, to: AttributeType) -> Result<T, ConversionFailure> {
        let wide = match self {
            AttributeValue::String(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|e| self.failure(to, format!("'{}': {}", s, e)))?,
            other => other
                .as_i64()
                .ok_or_else(|| other.failure(to, "not numeric"))?,
        };
        T::try_from(wide).map_err(|_| self.failure(to, format!("{} out of range", wide)))
    }

    fn float(&self, to: AttributeType) -> Result<f64, ConversionFailure> {
        match self {
            AttributeValue::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| self.failure(to, format!("'{}': {}", s, e))),
            other => other.as_f64().ok_or_else(|| other.failure(to, "not numeric")),
        }
    }

    /// Convert this value into the given attribute type
    pub fn convert(&self, to: AttributeType) -> Result<AttributeValue, ConversionFailure> {
        if self.attribute_type() == to {
            return Ok(self.clone());
        }
        let converted = match to {
            AttributeType::Byte => AttributeValue::Byte(self.narrow(to)?),
            AttributeType::Short => AttributeValue::Short(self.narrow(to)?),
            AttributeType::Integer => AttributeValue::Integer(self.narrow(to)?),
            AttributeType::Long => AttributeValue::Long(self.narrow(to)?),
            AttributeType::Float => AttributeValue::Float(self.float(to)? as f32),
            AttributeType::Double => AttributeValue::Double(self.float(to)?),
            AttributeType::Boolean => match self {
                AttributeValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" => AttributeValue::Boolean(true),
                    "false" | "" => AttributeValue::Boolean(false),
                    other => return Err(self.failure(to, format!("'{}'", other))),
                },
                other => AttributeValue::Boolean(
                    other
                        .as_f64()
                        .ok_or_else(|| other.failure(to, "not numeric"))?
                        != 0.0,
                ),
            },
            AttributeType::Char => match self {
                AttributeValue::String(s) => {
                    let mut chars = s.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => AttributeValue::Char(c),
                        (None, _) => AttributeValue::Char('\0'),
                        _ => return Err(self.failure(to, format!("'{}' is not a single char", s))),
                    }
                }
                other => {
                    let code: u32 = other.narrow(to)?;
                    AttributeValue::Char(
                        char::from_u32(code)
                            .ok_or_else(|| other.failure(to, format!("{} is not a char", code)))?,
                    )
                }
            },
            AttributeType::String => AttributeValue::String(self.to_string()),
            AttributeType::Color => match self {
                AttributeValue::String(s) => {
                    AttributeValue::Color(s.parse().map_err(|e: String| self.failure(to, e))?)
                }
                other => return Err(other.failure(to, "only strings convert to colors")),
            },
            AttributeType::Object => AttributeValue::Object(self.to_json()),
        };
        Ok(converted)
    }

    /// Hashable projection used for primary-key grouping
    pub fn key_fragment(&self) -> KeyFragment {
        match self {
            AttributeValue::Byte(_)
            | AttributeValue::Short(_)
            | AttributeValue::Integer(_)
            | AttributeValue::Long(_) => KeyFragment::Int(self.as_i64().unwrap_or_default()),
            AttributeValue::Float(v) => KeyFragment::Bits(u64::from(v.to_bits())),
            AttributeValue::Double(v) => KeyFragment::Bits(v.to_bits()),
            AttributeValue::Boolean(v) => KeyFragment::Bool(*v),
            AttributeValue::Char(v) => KeyFragment::Char(*v),
            AttributeValue::String(v) => KeyFragment::Text(v.clone()),
            AttributeValue::Color(c) => KeyFragment::Bits(u64::from(c.packed())),
            AttributeValue::Object(v) => KeyFragment::Text(v.to_string()),
        }
    }

    /// Plain JSON form of the value, scalars unwrapped
    fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            AttributeValue::Float(v) => serde_json::Number::from_f64(f64::from(*v)).map_or(Value::Null, Value::Number),
            AttributeValue::Double(v) => serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number),
            AttributeValue::Boolean(v) => Value::Bool(*v),
            AttributeValue::String(v) => Value::String(v.clone()),
            AttributeValue::Char(_) | AttributeValue::Color(_) => Value::String(self.to_string()),
            AttributeValue::Object(v) => v.clone(),
            other => other.as_i64().map_or(Value::Null, Value::from),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Byte(v) => write!(f, "{}", v),
            AttributeValue::Short(v) => write!(f, "{}", v),
            AttributeValue::Integer(v) => write!(f, "{}", v),
            AttributeValue::Long(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::Double(v) => write!(f, "{}", v),
            AttributeValue::Boolean(v) => write!(f, "{}", v),
            AttributeValue::Char(v) => write!(f, "{}", v),
            AttributeValue::String(v) => write!(f, "{}", v),
            AttributeValue::Color(v) => write!(f, "{}", v),
            AttributeValue::Object(serde_json::Value::String(s)) => write!(f, "{}", s),
            AttributeValue::Object(v) => write!(f, "{}", v),
        }
    }
}

// Convenience conversions
impl From<i8> for AttributeValue {
    fn from(v: i8) -> Self {
        AttributeValue::Byte(v)
    }
}

impl From<i16> for AttributeValue {
    fn from(v: i16) -> Self {
        AttributeValue::Short(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Long(v)
    }
}

impl From<f32> for AttributeValue {
    fn from(v: f32) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Double(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Boolean(v)
    }
}

impl From<char> for AttributeValue {
    fn from(v: char) -> Self {
        AttributeValue::Char(v)
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<Color> for AttributeValue {
    fn from(v: Color) -> Self {
        AttributeValue::Color(v)
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(v: serde_json::Value) -> Self {
        AttributeValue::Object(v)
    }
}
