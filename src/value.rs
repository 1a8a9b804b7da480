//! Runtime values bound from protocol tokens.

use crate::packet::Packet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A single bound value (field, list item or group).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Str(String),
    Guid(Uuid),
    Version(Version),
    Enum(EnumValue),
    /// Group fields in declaration order.
    Group(Vec<(String, Value)>),
    List(Vec<Value>),
    Packet(Box<Packet>),
}

impl Value {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U8(x) => Some(*x as u64),
            Value::U16(x) => Some(*x as u64),
            Value::U32(x) => Some(*x as u64),
            Value::U64(x) => Some(*x),
            Value::I8(x) => u64::try_from(*x).ok(),
            Value::I16(x) => u64::try_from(*x).ok(),
            Value::I32(x) => u64::try_from(*x).ok(),
            Value::I64(x) => u64::try_from(*x).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I8(x) => Some(*x as i64),
            Value::I16(x) => Some(*x as i64),
            Value::I32(x) => Some(*x as i64),
            Value::I64(x) => Some(*x),
            Value::U8(x) => Some(*x as i64),
            Value::U16(x) => Some(*x as i64),
            Value::U32(x) => Some(*x as i64),
            Value::U64(x) => i64::try_from(*x).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x as f64),
            Value::Double(x) => Some(*x),
            Value::U64(x) => Some(*x as f64),
            other => other.as_i64().map(|x| x as f64),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_guid(&self) -> Option<Uuid> {
        match self {
            Value::Guid(g) => Some(*g),
            _ => None,
        }
    }

    pub fn as_version(&self) -> Option<&Version> {
        match self {
            Value::Version(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumValue> {
        match self {
            Value::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Group(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_packet(&self) -> Option<&Packet> {
        match self {
            Value::Packet(p) => Some(p),
            _ => None,
        }
    }

    /// Field of a group value by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.as_group()?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// Renders the value the way it appears on the wire (booleans as `1`/`0`).
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::U8(x) => write!(f, "{}", x),
            Value::U16(x) => write!(f, "{}", x),
            Value::U32(x) => write!(f, "{}", x),
            Value::U64(x) => write!(f, "{}", x),
            Value::I8(x) => write!(f, "{}", x),
            Value::I16(x) => write!(f, "{}", x),
            Value::I32(x) => write!(f, "{}", x),
            Value::I64(x) => write!(f, "{}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Double(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", if *b { 1 } else { 0 }),
            Value::Str(s) => f.write_str(s),
            Value::Guid(g) => write!(f, "{}", g.hyphenated()),
            Value::Version(v) => write!(f, "{}", v),
            Value::Enum(e) => write!(f, "{}", e.ordinal),
            Value::Group(fields) => {
                for (i, (_, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    write!(f, "{}", v)?;
                }
                Ok(())
            }
            Value::List(items) => {
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", v)?;
                }
                Ok(())
            }
            Value::Packet(p) => f.write_str(p.header()),
        }
    }
}

/// Bound enumeration value. `member` is `None` when the ordinal is not declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub ordinal: i64,
    pub member: Option<String>,
}

impl EnumValue {
    pub fn is_known(&self) -> bool {
        self.member.is_some()
    }

    pub fn is(&self, member: &str) -> bool {
        self.member.as_deref() == Some(member)
    }
}

/// Dotted client version, e.g. `0.9.3.3097`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub build: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version {0:?}: expected major.minor.patch[.build]")]
pub struct VersionParseError(pub String);

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || VersionParseError(s.to_string());
        let parts = s
            .split('.')
            .map(|p| p.parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| err())?;
        match parts.as_slice() {
            [major, minor, patch] => Ok(Version { major: *major, minor: *minor, patch: *patch, build: None }),
            [major, minor, patch, build] => Ok(Version {
                major: *major,
                minor: *minor,
                patch: *patch,
                build: Some(*build),
            }),
            _ => Err(err()),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(build) = self.build {
            write!(f, ".{}", build)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_with_build() {
        let v: Version = "0.9.3.3097".parse().unwrap();
        assert_eq!((v.major, v.minor, v.patch, v.build), (0, 9, 3, Some(3097)));
        assert_eq!(v.to_string(), "0.9.3.3097");
    }

    #[test]
    fn version_rejects_short_and_garbage() {
        assert!("1.2".parse::<Version>().is_err());
        assert!("1.2.x".parse::<Version>().is_err());
        assert!("".parse::<Version>().is_err());
    }

    #[test]
    fn signed_to_unsigned_does_not_wrap() {
        assert_eq!(Value::I16(-1).as_u64(), None);
        assert_eq!(Value::U64(u64::MAX).as_i64(), None);
        assert_eq!(Value::I8(-3).as_i64(), Some(-3));
    }

    #[test]
    fn group_field_lookup() {
        let g = Value::Group(vec![
            ("character_id".to_string(), Value::I64(2)),
            ("is_connected".to_string(), Value::Bool(true)),
        ]);
        assert_eq!(g.field("character_id").and_then(Value::as_i64), Some(2));
        assert_eq!(g.to_string(), "2.1");
        assert!(g.field("missing").is_none());
    }
}
