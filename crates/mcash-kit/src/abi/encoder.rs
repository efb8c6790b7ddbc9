//! Head/tail ABI encoding.

use num_bigint::{BigInt, Sign};

use super::AbiValue;

type Word = [u8; 32];

/// Encode a sequence of values as a tuple body.
pub fn encode(values: &[AbiValue]) -> Vec<u8> {
    let head_len: usize = values.iter().map(head_size).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for value in values {
        if value.is_dynamic() {
            head.extend_from_slice(&usize_word(head_len + tail.len()));
            tail.extend(encode_value(value));
        } else {
            head.extend(encode_value(value));
        }
    }

    head.extend(tail);
    head
}

fn head_size(value: &AbiValue) -> usize {
    if value.is_dynamic() {
        return 32;
    }
    match value {
        AbiValue::FixedArray(items) | AbiValue::Tuple(items) => items.iter().map(head_size).sum(),
        _ => 32,
    }
}

fn encode_value(value: &AbiValue) -> Vec<u8> {
    match value {
        AbiValue::Address(address) => {
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(&address.account_hash());
            word.to_vec()
        }
        AbiValue::Bool(b) => usize_word(usize::from(*b)).to_vec(),
        AbiValue::Uint(n) => {
            let bytes = n.to_bytes_be();
            let mut word = [0u8; 32];
            word[32 - bytes.len()..].copy_from_slice(&bytes);
            word.to_vec()
        }
        AbiValue::Int(n) => int_word(n).to_vec(),
        AbiValue::FixedBytes(bytes) => pad_right(bytes),
        AbiValue::Bytes(bytes) => {
            let mut out = usize_word(bytes.len()).to_vec();
            out.extend(pad_right(bytes));
            out
        }
        AbiValue::String(s) => {
            let mut out = usize_word(s.len()).to_vec();
            out.extend(pad_right(s.as_bytes()));
            out
        }
        AbiValue::Array(items) => {
            let mut out = usize_word(items.len()).to_vec();
            out.extend(encode(items));
            out
        }
        AbiValue::FixedArray(items) | AbiValue::Tuple(items) => encode(items),
    }
}

pub(crate) fn usize_word(n: usize) -> Word {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&(n as u64).to_be_bytes());
    word
}

/// Two's complement, sign-extended to 256 bits.
fn int_word(n: &BigInt) -> Word {
    let fill = if n.sign() == Sign::Minus { 0xff } else { 0x00 };
    let bytes = n.to_signed_bytes_be();
    let mut word = [fill; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    word
}

/// Right-pad to a multiple of 32 bytes.
fn pad_right(bytes: &[u8]) -> Vec<u8> {
    let padded_len = bytes.len().div_ceil(32) * 32;
    let mut out = bytes.to_vec();
    out.resize(padded_len, 0);
    out
}
