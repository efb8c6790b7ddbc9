//! Head/tail ABI decoding.

use num_bigint::{BigInt, BigUint};
use num_traits::ToPrimitive;

use crate::error::AbiError;
use crate::types::Address;

use super::{AbiValue, ParamType};

/// Decode a tuple body of the given types.
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<AbiValue>, AbiError> {
    decode_sequence(types, data, 0)
}

/// Decode a sequence whose head starts at `base`. Offsets are relative to
/// `base`.
fn decode_sequence(
    types: &[ParamType],
    data: &[u8],
    base: usize,
) -> Result<Vec<AbiValue>, AbiError> {
    let mut values = Vec::with_capacity(types.len());
    let mut cursor = base;

    for ty in types {
        if ty.is_dynamic() {
            let offset = read_usize(data, cursor)?;
            let position = base.checked_add(offset).ok_or(AbiError::InvalidOffset {
                offset,
                length: data.len(),
            })?;
            values.push(decode_value(ty, data, position)?);
        } else {
            values.push(decode_value(ty, data, cursor)?);
        }
        cursor += ty.head_size();
    }

    Ok(values)
}

fn decode_value(ty: &ParamType, data: &[u8], position: usize) -> Result<AbiValue, AbiError> {
    match ty {
        ParamType::Address => {
            let word = read_word(data, position)?;
            let mut hash = [0u8; 20];
            hash.copy_from_slice(&word[12..]);
            Ok(AbiValue::Address(Address::from_account_hash(hash)))
        }
        ParamType::Bool => {
            let word = read_word(data, position)?;
            Ok(AbiValue::Bool(word.iter().any(|b| *b != 0)))
        }
        ParamType::Uint(_) => {
            let word = read_word(data, position)?;
            Ok(AbiValue::Uint(BigUint::from_bytes_be(word)))
        }
        ParamType::Int(_) => {
            let word = read_word(data, position)?;
            Ok(AbiValue::Int(BigInt::from_signed_bytes_be(word)))
        }
        ParamType::FixedBytes(len) => {
            let word = read_word(data, position)?;
            Ok(AbiValue::FixedBytes(word[..*len].to_vec()))
        }
        ParamType::Bytes => read_dynamic_bytes(data, position).map(AbiValue::Bytes),
        ParamType::String => {
            let bytes = read_dynamic_bytes(data, position)?;
            String::from_utf8(bytes)
                .map(AbiValue::String)
                .map_err(|err| AbiError::InvalidValue {
                    kind: "string".to_string(),
                    value: hex::encode(err.as_bytes()),
                })
        }
        ParamType::Array(inner) => {
            let len = read_usize(data, position)?;
            let start = position + 32;
            // Each element takes at least one word.
            if len > data.len().saturating_sub(start) / 32 {
                return Err(AbiError::TruncatedData);
            }
            let types = vec![(**inner).clone(); len];
            decode_sequence(&types, data, start).map(AbiValue::Array)
        }
        ParamType::FixedArray(inner, len) => {
            let types = vec![(**inner).clone(); *len];
            decode_sequence(&types, data, position).map(AbiValue::FixedArray)
        }
        ParamType::Tuple(members) => {
            decode_sequence(members, data, position).map(AbiValue::Tuple)
        }
    }
}

fn read_word(data: &[u8], position: usize) -> Result<&[u8], AbiError> {
    let end = position.checked_add(32).filter(|end| *end <= data.len());
    match end {
        Some(end) => Ok(&data[position..end]),
        None => Err(AbiError::InvalidOffset {
            offset: position,
            length: data.len(),
        }),
    }
}

fn read_usize(data: &[u8], position: usize) -> Result<usize, AbiError> {
    let word = read_word(data, position)?;
    BigUint::from_bytes_be(word)
        .to_usize()
        .ok_or(AbiError::InvalidOffset {
            offset: position,
            length: data.len(),
        })
}

fn read_dynamic_bytes(data: &[u8], position: usize) -> Result<Vec<u8>, AbiError> {
    let len = read_usize(data, position)?;
    let start = position + 32;
    let end = start.checked_add(len).ok_or(AbiError::TruncatedData)?;
    if end > data.len() {
        return Err(AbiError::TruncatedData);
    }
    Ok(data[start..end].to_vec())
}
