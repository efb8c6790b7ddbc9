//! Typed ABI values and their JSON mapping.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{ToPrimitive, Zero};
use serde_json::Value;

use crate::error::AbiError;
use crate::types::Address;

use super::ParamType;

/// A value that can be ABI-encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Bool(bool),
    Uint(BigUint),
    Int(BigInt),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<AbiValue>),
    FixedArray(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    /// Convert a JSON argument into a value of the given type.
    ///
    /// Integers accept JSON numbers, decimal strings and `0x` hex strings.
    /// Addresses accept the base58, prefixed hex and `0x` forms. Byte types
    /// take `0x` hex strings.
    pub fn from_json(ty: &ParamType, value: &Value) -> Result<Self, AbiError> {
        let invalid = || AbiError::InvalidValue {
            kind: ty.to_string(),
            value: value.to_string(),
        };

        match ty {
            ParamType::Address => {
                let s = value.as_str().ok_or_else(invalid)?;
                s.parse::<Address>().map(AbiValue::Address).map_err(|_| invalid())
            }
            ParamType::Bool => match value {
                Value::Bool(b) => Ok(AbiValue::Bool(*b)),
                Value::String(s) if s == "true" => Ok(AbiValue::Bool(true)),
                Value::String(s) if s == "false" => Ok(AbiValue::Bool(false)),
                _ => Err(invalid()),
            },
            ParamType::Uint(bits) => {
                let n = json_to_bigint(value).ok_or_else(invalid)?;
                let n = n.to_biguint().ok_or_else(invalid)?;
                if n.bits() > *bits as u64 {
                    return Err(invalid());
                }
                Ok(AbiValue::Uint(n))
            }
            ParamType::Int(bits) => {
                let n = json_to_bigint(value).ok_or_else(invalid)?;
                let limit = BigInt::from(1) << (bits - 1);
                if n >= limit || n < -limit {
                    return Err(invalid());
                }
                Ok(AbiValue::Int(n))
            }
            ParamType::FixedBytes(len) => {
                let bytes = json_to_bytes(value).ok_or_else(invalid)?;
                if bytes.len() != *len {
                    return Err(invalid());
                }
                Ok(AbiValue::FixedBytes(bytes))
            }
            ParamType::Bytes => json_to_bytes(value)
                .map(AbiValue::Bytes)
                .ok_or_else(invalid),
            ParamType::String => value
                .as_str()
                .map(|s| AbiValue::String(s.to_string()))
                .ok_or_else(invalid),
            ParamType::Array(inner) => {
                let items = value.as_array().ok_or_else(invalid)?;
                items
                    .iter()
                    .map(|item| AbiValue::from_json(inner, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(AbiValue::Array)
            }
            ParamType::FixedArray(inner, len) => {
                let items = value.as_array().ok_or_else(invalid)?;
                if items.len() != *len {
                    return Err(invalid());
                }
                items
                    .iter()
                    .map(|item| AbiValue::from_json(inner, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(AbiValue::FixedArray)
            }
            ParamType::Tuple(members) => {
                let items = value.as_array().ok_or_else(invalid)?;
                if items.len() != members.len() {
                    return Err(invalid());
                }
                members
                    .iter()
                    .zip(items)
                    .map(|(member, item)| AbiValue::from_json(member, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(AbiValue::Tuple)
            }
        }
    }

    /// Render as JSON.
    ///
    /// Addresses use the prefixed hex form, byte strings `0x` hex. Integers
    /// that fit in 64 bits become JSON numbers, wider ones decimal strings.
    pub fn to_json(&self) -> Value {
        match self {
            AbiValue::Address(address) => Value::String(address.to_hex()),
            AbiValue::Bool(b) => Value::Bool(*b),
            AbiValue::Uint(n) => match n.to_u64() {
                Some(v) => Value::from(v),
                None => Value::String(n.to_string()),
            },
            AbiValue::Int(n) => match n.to_i64() {
                Some(v) => Value::from(v),
                None => Value::String(n.to_string()),
            },
            AbiValue::FixedBytes(bytes) | AbiValue::Bytes(bytes) => {
                Value::String(format!("0x{}", hex::encode(bytes)))
            }
            AbiValue::String(s) => Value::String(s.clone()),
            AbiValue::Array(items) | AbiValue::FixedArray(items) | AbiValue::Tuple(items) => {
                Value::Array(items.iter().map(AbiValue::to_json).collect())
            }
        }
    }

    /// Whether the value is encoded in the tail section.
    pub(crate) fn is_dynamic(&self) -> bool {
        match self {
            AbiValue::Bytes(_) | AbiValue::String(_) | AbiValue::Array(_) => true,
            AbiValue::FixedArray(items) | AbiValue::Tuple(items) => {
                items.iter().any(AbiValue::is_dynamic)
            }
            _ => false,
        }
    }

    /// The value as an address, if it is one.
    pub fn as_address(&self) -> Option<&Address> {
        match self {
            AbiValue::Address(address) => Some(address),
            _ => None,
        }
    }

    /// The value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AbiValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The value as an unsigned integer, if it is one.
    pub fn as_uint(&self) -> Option<&BigUint> {
        match self {
            AbiValue::Uint(n) => Some(n),
            _ => None,
        }
    }

    /// The value as a `u64`, for either integer kind.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            AbiValue::Uint(n) => n.to_u64(),
            AbiValue::Int(n) => n.to_u64(),
            _ => None,
        }
    }

    /// The value as a bool, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AbiValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for AbiValue {
    fn from(s: &str) -> Self {
        AbiValue::String(s.to_string())
    }
}

impl From<String> for AbiValue {
    fn from(s: String) -> Self {
        AbiValue::String(s)
    }
}

impl From<bool> for AbiValue {
    fn from(b: bool) -> Self {
        AbiValue::Bool(b)
    }
}

impl From<u64> for AbiValue {
    fn from(n: u64) -> Self {
        AbiValue::Uint(BigUint::from(n))
    }
}

impl From<Address> for AbiValue {
    fn from(address: Address) -> Self {
        AbiValue::Address(address)
    }
}

fn json_to_bigint(value: &Value) -> Option<BigInt> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                Some(BigInt::from(v))
            } else if let Some(v) = n.as_u64() {
                Some(BigInt::from(v))
            } else {
                let f = n.as_f64()?;
                (f.fract() == 0.0 && f.is_finite())
                    .then(|| BigInt::parse_bytes(format!("{f:.0}").as_bytes(), 10))
                    .flatten()
            }
        }
        Value::String(s) => {
            let s = s.trim();
            let (negative, body) = match s.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, s),
            };
            let magnitude = match body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
                Some(hex) => BigUint::parse_bytes(hex.as_bytes(), 16)?,
                None => BigUint::parse_bytes(body.as_bytes(), 10)?,
            };
            let sign = if negative && !magnitude.is_zero() {
                Sign::Minus
            } else {
                Sign::Plus
            };
            Some(BigInt::from_biguint(sign, magnitude))
        }
        _ => None,
    }
}

fn json_to_bytes(value: &Value) -> Option<Vec<u8>> {
    let s = value.as_str()?;
    let body = s.strip_prefix("0x")?;
    hex::decode(body).ok()
}
