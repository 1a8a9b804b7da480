//! Decode results: typed packets, the unresolved fallback, and typed field access.

use crate::catalogue::PacketId;
use crate::error::{AccessError, BindError};
use crate::validate::ValidationResult;
use crate::value::{EnumValue, Value, Version};
use uuid::Uuid;

/// Result of decoding one line. Malformed input never produces an error, only
/// the `Unresolved` variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Decoded(DecodedPacket),
    Unresolved(UnresolvedPacket),
}

impl Packet {
    pub fn header(&self) -> &str {
        match self {
            Packet::Decoded(p) => &p.header,
            Packet::Unresolved(p) => &p.header,
        }
    }

    pub fn keep_alive_id(&self) -> Option<u16> {
        match self {
            Packet::Decoded(p) => p.keep_alive_id,
            Packet::Unresolved(p) => p.keep_alive_id,
        }
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self, Packet::Decoded(_))
    }

    pub fn as_decoded(&self) -> Option<&DecodedPacket> {
        match self {
            Packet::Decoded(p) => Some(p),
            Packet::Unresolved(_) => None,
        }
    }

    pub fn as_unresolved(&self) -> Option<&UnresolvedPacket> {
        match self {
            Packet::Unresolved(p) => Some(p),
            Packet::Decoded(_) => None,
        }
    }

    pub fn into_decoded(self) -> Option<DecodedPacket> {
        match self {
            Packet::Decoded(p) => Some(p),
            Packet::Unresolved(_) => None,
        }
    }

    /// Build `T` when this packet was decoded with `T::HEADER`.
    pub fn typed<T: FromPacket>(&self) -> Option<Result<T, AccessError>> {
        match self {
            Packet::Decoded(p) if p.header == T::HEADER => Some(T::from_packet(p)),
            _ => None,
        }
    }
}

/// A line bound to its packet definition.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPacket {
    pub(crate) id: PacketId,
    pub(crate) name: String,
    pub(crate) header: String,
    pub(crate) keep_alive_id: Option<u16>,
    pub(crate) fields: Vec<BoundField>,
    pub(crate) validation: Option<ValidationResult>,
}

impl DecodedPacket {
    pub fn id(&self) -> PacketId {
        self.id
    }

    /// Definition name, e.g. `FinsPacket`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn keep_alive_id(&self) -> Option<u16> {
        self.keep_alive_id
    }

    pub fn fields(&self) -> &[BoundField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&BoundField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Value of a field; `None` for unknown or absent fields.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.field(name).and_then(|f| f.value.as_ref())
    }

    pub fn get_as<T: FromValue>(&self, name: &str) -> Result<T, AccessError> {
        let field = self
            .field(name)
            .ok_or_else(|| AccessError::UnknownField(name.to_string()))?;
        match &field.value {
            Some(v) => T::from_value(name, v),
            None => T::from_absent(name),
        }
    }

    /// `None` when no field of the definition is constrained.
    pub fn validation(&self) -> Option<&ValidationResult> {
        self.validation.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.validation.as_ref().map_or(true, ValidationResult::is_valid)
    }
}

/// One bound field. `value` is `None` only for an absent optional field.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundField {
    pub index: usize,
    pub name: String,
    pub value: Option<Value>,
    /// Input consumed for this field, verbatim.
    pub raw: String,
}

/// Fallback for lines that could not be bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedPacket {
    pub header: String,
    /// Remainder of the line after the header, untouched.
    pub body: String,
    pub keep_alive_id: Option<u16>,
    pub reason: UnresolvedReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    UnknownHeader,
    Binding(BindError),
    DepthExceeded,
    /// An embedded packet carried a different header than declared.
    HeaderMismatch { expected: String },
}

/// Typed assembly from a decoded packet with a known header.
pub trait FromPacket: Sized {
    const HEADER: &'static str;

    fn from_packet(packet: &DecodedPacket) -> Result<Self, AccessError>;
}

/// Conversion of a bound value into a Rust type.
pub trait FromValue: Sized {
    fn from_value(field: &str, value: &Value) -> Result<Self, AccessError>;

    fn from_absent(field: &str) -> Result<Self, AccessError> {
        Err(AccessError::Absent(field.to_string()))
    }
}

macro_rules! impl_from_value_int {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(field: &str, value: &Value) -> Result<Self, AccessError> {
                    let converted = match value {
                        Value::U64(v) => <$ty>::try_from(*v).ok(),
                        other => other.as_i64().and_then(|v| <$ty>::try_from(v).ok()),
                    };
                    converted.ok_or_else(|| AccessError::type_mismatch(field, stringify!($ty)))
                }
            }
        )*
    };
}

impl_from_value_int!(u8, u16, u32, u64, i8, i16, i32, i64, usize);

impl FromValue for f64 {
    fn from_value(field: &str, value: &Value) -> Result<Self, AccessError> {
        value.as_f64().ok_or_else(|| AccessError::type_mismatch(field, "f64"))
    }
}

impl FromValue for f32 {
    fn from_value(field: &str, value: &Value) -> Result<Self, AccessError> {
        match value {
            Value::Float(x) => Ok(*x),
            other => other
                .as_f64()
                .map(|x| x as f32)
                .ok_or_else(|| AccessError::type_mismatch(field, "f32")),
        }
    }
}

impl FromValue for bool {
    fn from_value(field: &str, value: &Value) -> Result<Self, AccessError> {
        value.as_bool().ok_or_else(|| AccessError::type_mismatch(field, "bool"))
    }
}

impl FromValue for String {
    fn from_value(field: &str, value: &Value) -> Result<Self, AccessError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AccessError::type_mismatch(field, "string"))
    }
}

impl FromValue for Uuid {
    fn from_value(field: &str, value: &Value) -> Result<Self, AccessError> {
        value.as_guid().ok_or_else(|| AccessError::type_mismatch(field, "guid"))
    }
}

impl FromValue for Version {
    fn from_value(field: &str, value: &Value) -> Result<Self, AccessError> {
        value
            .as_version()
            .copied()
            .ok_or_else(|| AccessError::type_mismatch(field, "version"))
    }
}

impl FromValue for EnumValue {
    fn from_value(field: &str, value: &Value) -> Result<Self, AccessError> {
        value
            .as_enum()
            .cloned()
            .ok_or_else(|| AccessError::type_mismatch(field, "enum"))
    }
}

impl FromValue for Packet {
    fn from_value(field: &str, value: &Value) -> Result<Self, AccessError> {
        value
            .as_packet()
            .cloned()
            .ok_or_else(|| AccessError::type_mismatch(field, "packet"))
    }
}

impl FromValue for Value {
    fn from_value(_field: &str, value: &Value) -> Result<Self, AccessError> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(field: &str, value: &Value) -> Result<Self, AccessError> {
        value
            .as_list()
            .ok_or_else(|| AccessError::type_mismatch(field, "list"))?
            .iter()
            .map(|item| T::from_value(field, item))
            .collect()
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(field: &str, value: &Value) -> Result<Self, AccessError> {
        T::from_value(field, value).map(Some)
    }

    fn from_absent(_field: &str) -> Result<Self, AccessError> {
        Ok(None)
    }
}
