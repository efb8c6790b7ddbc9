//! Solidity ABI coding.
//!
//! Values are encoded with the standard head/tail layout. Two chain-specific
//! adjustments apply at the edges:
//!
//! - the `mcashToken` type is coded as `uint256`
//! - addresses go in as base58 or prefixed hex and come out as prefixed hex
//!   (`32…`), never as the bare 20-byte form
//!
//! ```
//! use mcash_kit::abi::{decode_params, encode_params};
//! use serde_json::json;
//!
//! let data = encode_params(&["string", "uint8"], &[json!("PIE"), json!(18)]).unwrap();
//! let decoded = decode_params(None, &["string", "uint8"], &data, false).unwrap();
//! assert_eq!(decoded.to_json(), json!(["PIE", 18]));
//! ```

mod decoder;
mod encoder;
mod entry;
mod param_type;
mod value;

pub use decoder::decode;
pub use encoder::encode;
pub use entry::{AbiEntry, AbiParam, EntryType, StateMutability, parse_abi};
pub use param_type::ParamType;
pub use value::AbiValue;

use serde_json::{Map, Value};

use crate::error::AbiError;
use crate::utils::sha3;

/// Encode JSON arguments against a list of type strings.
///
/// Returns `0x`-prefixed hex.
pub fn encode_params<T: AsRef<str>>(types: &[T], values: &[Value]) -> Result<String, AbiError> {
    if types.len() != values.len() {
        return Err(AbiError::LengthMismatch {
            types: types.len(),
            values: values.len(),
        });
    }
    let tokens = types
        .iter()
        .zip(values)
        .map(|(ty, value)| AbiValue::from_json(&ParamType::parse(ty.as_ref())?, value))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("0x{}", hex::encode(encode(&tokens))))
}

/// Decode hex output against a list of type strings.
///
/// When `strip_selector` is set and the payload is a 4-byte selector plus
/// whole words, the selector is dropped first. With `names`, the result can
/// also be read by name.
pub fn decode_params<T: AsRef<str>>(
    names: Option<&[String]>,
    types: &[T],
    output: &str,
    strip_selector: bool,
) -> Result<DecodedParams, AbiError> {
    let body = output.strip_prefix("0x").unwrap_or(output);
    if !body.is_ascii() {
        return Err(AbiError::InvalidHex(output.to_string()));
    }
    let body = if strip_selector && body.len() % 64 == 8 {
        &body[8..]
    } else {
        body
    };
    if body.len() % 64 != 0 {
        return Err(AbiError::InvalidLength);
    }
    if !output.starts_with("0x") {
        return Err(AbiError::MissingHexPrefix);
    }

    let data = hex::decode(body).map_err(|e| AbiError::InvalidHex(e.to_string()))?;
    let param_types = types
        .iter()
        .map(|ty| ParamType::parse(ty.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    let values = decode(&param_types, &data)?;

    Ok(DecodedParams {
        names: names.map(|names| {
            (0..values.len())
                .map(|i| names.get(i).cloned().unwrap_or_default())
                .collect()
        }),
        values,
    })
}

/// Decoded values, positionally and optionally by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedParams {
    values: Vec<AbiValue>,
    names: Option<Vec<String>>,
}

impl DecodedParams {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at a position.
    pub fn get(&self, index: usize) -> Option<&AbiValue> {
        self.values.get(index)
    }

    /// Value by output name.
    pub fn by_name(&self, name: &str) -> Option<&AbiValue> {
        let names = self.names.as_ref()?;
        names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.values.get(i))
    }

    /// Output names, if decoded with names.
    pub fn names(&self) -> Option<&[String]> {
        self.names.as_deref()
    }

    pub fn values(&self) -> &[AbiValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<AbiValue> {
        self.values
    }

    /// JSON view: an object keyed by name when decoded with names, otherwise
    /// an array.
    pub fn to_json(&self) -> Value {
        match &self.names {
            Some(names) => {
                let mut map = Map::new();
                for (name, value) in names.iter().zip(&self.values) {
                    map.insert(name.clone(), value.to_json());
                }
                Value::Object(map)
            }
            None => Value::Array(self.values.iter().map(AbiValue::to_json).collect()),
        }
    }
}

/// Build the canonical signature `name(type1,type2)`.
pub fn function_signature(name: &str, inputs: &[AbiParam]) -> String {
    let types: Vec<String> = inputs.iter().map(AbiParam::canonical_type).collect();
    format!("{}({})", name, types.join(","))
}

/// The 4-byte selector of a signature, as 8 hex characters.
pub fn method_id(signature: &str) -> String {
    sha3(signature, false)[..8].to_string()
}
