//! Solidity parameter types.

use std::fmt::{self, Display};
use std::str::FromStr;

use crate::error::AbiError;

/// A Solidity ABI parameter type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParamType {
    Address,
    Bool,
    /// Unsigned integer with bit width.
    Uint(usize),
    /// Signed integer with bit width.
    Int(usize),
    /// `bytesN`, 1 to 32 bytes.
    FixedBytes(usize),
    Bytes,
    String,
    /// `T[]`
    Array(Box<ParamType>),
    /// `T[k]`
    FixedArray(Box<ParamType>, usize),
    /// `(T1,T2,...)`
    Tuple(Vec<ParamType>),
}

impl ParamType {
    /// Parse a type string. The chain-specific `mcashToken` type is read as
    /// `uint256`.
    pub fn parse(s: &str) -> Result<Self, AbiError> {
        let normalized = s.trim().replace("mcashToken", "uint256");
        parse_type(&normalized)
    }

    /// Whether the encoding lives in the tail section.
    pub fn is_dynamic(&self) -> bool {
        match self {
            ParamType::Bytes | ParamType::String | ParamType::Array(_) => true,
            ParamType::FixedArray(inner, _) => inner.is_dynamic(),
            ParamType::Tuple(members) => members.iter().any(ParamType::is_dynamic),
            _ => false,
        }
    }

    /// Size of the head encoding in bytes.
    pub(crate) fn head_size(&self) -> usize {
        if self.is_dynamic() {
            return 32;
        }
        match self {
            ParamType::FixedArray(inner, len) => inner.head_size() * len,
            ParamType::Tuple(members) => members.iter().map(ParamType::head_size).sum(),
            _ => 32,
        }
    }
}

fn parse_type(s: &str) -> Result<ParamType, AbiError> {
    let invalid = || AbiError::InvalidType(s.to_string());

    // Array suffixes bind last: `uint8[2][]` is an array of `uint8[2]`.
    if let Some(stripped) = s.strip_suffix(']') {
        let open = stripped.rfind('[').ok_or_else(invalid)?;
        let inner = parse_type(&stripped[..open])?;
        let size = &stripped[open + 1..];
        return if size.is_empty() {
            Ok(ParamType::Array(Box::new(inner)))
        } else {
            let len: usize = size.parse().map_err(|_| invalid())?;
            Ok(ParamType::FixedArray(Box::new(inner), len))
        };
    }

    if let Some(body) = s.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        return split_tuple(body)
            .ok_or_else(invalid)?
            .into_iter()
            .map(parse_type)
            .collect::<Result<Vec<_>, _>>()
            .map(ParamType::Tuple);
    }

    match s {
        "address" => return Ok(ParamType::Address),
        "bool" => return Ok(ParamType::Bool),
        "string" => return Ok(ParamType::String),
        "bytes" => return Ok(ParamType::Bytes),
        "uint" => return Ok(ParamType::Uint(256)),
        "int" => return Ok(ParamType::Int(256)),
        _ => {}
    }

    if let Some(bits) = s.strip_prefix("uint") {
        return int_width(bits).map(ParamType::Uint).ok_or_else(invalid);
    }
    if let Some(bits) = s.strip_prefix("int") {
        return int_width(bits).map(ParamType::Int).ok_or_else(invalid);
    }
    if let Some(len) = s.strip_prefix("bytes") {
        return match len.parse::<usize>() {
            Ok(n) if (1..=32).contains(&n) => Ok(ParamType::FixedBytes(n)),
            _ => Err(invalid()),
        };
    }

    Err(invalid())
}

fn int_width(bits: &str) -> Option<usize> {
    let bits: usize = bits.parse().ok()?;
    (bits > 0 && bits <= 256 && bits % 8 == 0).then_some(bits)
}

/// Split a tuple body on top-level commas. Returns `None` on unbalanced
/// parentheses.
fn split_tuple(body: &str) -> Option<Vec<&str>> {
    if body.is_empty() {
        return Some(Vec::new());
    }
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    parts.push(&body[start..]);
    Some(parts)
}

impl FromStr for ParamType {
    type Err = AbiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParamType::parse(s)
    }
}

impl Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Address => write!(f, "address"),
            ParamType::Bool => write!(f, "bool"),
            ParamType::Uint(bits) => write!(f, "uint{bits}"),
            ParamType::Int(bits) => write!(f, "int{bits}"),
            ParamType::FixedBytes(len) => write!(f, "bytes{len}"),
            ParamType::Bytes => write!(f, "bytes"),
            ParamType::String => write!(f, "string"),
            ParamType::Array(inner) => write!(f, "{inner}[]"),
            ParamType::FixedArray(inner, len) => write!(f, "{inner}[{len}]"),
            ParamType::Tuple(members) => {
                write!(f, "(")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{member}")?;
                }
                write!(f, ")")
            }
        }
    }
}
