//! Attribute value typing over the closed five-kind value set.
//!
//! An attribute type declares one of five value kinds and its instances carry
//! a decoded value of that kind. Values travel on the wire as
//! [`crate::codec::WireValue`] scalars; encode and decode round-trip exactly,
//! with datetimes carried as epoch milliseconds (the protocol's declared
//! resolution).

// used for the datetime value kind
use chrono::{DateTime, NaiveDateTime};
// used to print out readable forms of a data type
use std::fmt;

use crate::codec::WireValue;
use crate::error::{GraphlingError, Result};

// ------------- DataType -------------

/// The value kind declared by an attribute type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    Long,
    Double,
    String,
    DateTime,
}

impl DataType {
    pub const ALL: [DataType; 5] = [
        DataType::Boolean,
        DataType::Long,
        DataType::Double,
        DataType::String,
        DataType::DateTime,
    ];

    /// The stable discriminant used on the wire.
    pub fn uid(&self) -> u8 {
        match self {
            DataType::Boolean => 1,
            DataType::Long => 2,
            DataType::Double => 3,
            DataType::String => 4,
            DataType::DateTime => 5,
        }
    }

    pub fn from_uid(uid: u8) -> Result<DataType> {
        match uid {
            1 => Ok(DataType::Boolean),
            2 => Ok(DataType::Long),
            3 => Ok(DataType::Double),
            4 => Ok(DataType::String),
            5 => Ok(DataType::DateTime),
            unknown => Err(GraphlingError::ProtocolViolation(format!(
                "unrecognized data type uid {unknown}"
            ))),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            DataType::Boolean => "Boolean",
            DataType::Long => "Long",
            DataType::Double => "Double",
            DataType::String => "String",
            DataType::DateTime => "DateTime",
        };
        write!(f, "{name}")
    }
}

// ------------- Value -------------

/// A decoded attribute value, tagged by its data type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Long(i64),
    Double(f64),
    String(String),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Boolean(_) => DataType::Boolean,
            Value::Long(_) => DataType::Long,
            Value::Double(_) => DataType::Double,
            Value::String(_) => DataType::String,
            Value::DateTime(_) => DataType::DateTime,
        }
    }

    /// Encode for the wire. Datetimes are truncated to millisecond
    /// resolution, which is exactly what the protocol preserves.
    pub fn encode(&self) -> WireValue {
        match self {
            Value::Boolean(b) => WireValue::Boolean(*b),
            Value::Long(l) => WireValue::Long(*l),
            Value::Double(d) => WireValue::Double(*d),
            Value::String(s) => WireValue::String(s.clone()),
            Value::DateTime(dt) => WireValue::DateTime(dt.and_utc().timestamp_millis()),
        }
    }

    pub fn decode(wire: &WireValue) -> Result<Value> {
        match wire {
            WireValue::Boolean(b) => Ok(Value::Boolean(*b)),
            WireValue::Long(l) => Ok(Value::Long(*l)),
            WireValue::Double(d) => Ok(Value::Double(*d)),
            WireValue::String(s) => Ok(Value::String(s.clone())),
            WireValue::DateTime(millis) => {
                let dt = DateTime::from_timestamp_millis(*millis).ok_or_else(|| {
                    GraphlingError::ProtocolViolation(format!(
                        "datetime value {millis} out of representable range"
                    ))
                })?;
                Ok(Value::DateTime(dt.naive_utc()))
            }
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}
impl From<i64> for Value {
    fn from(l: i64) -> Self {
        Value::Long(l)
    }
}
impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Long(l) => write!(f, "{l}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::String(s) => write!(f, "{s}"),
            Value::DateTime(dt) => write!(f, "{dt}"),
        }
    }
}
