//! # LEB128 Varints
//!
//! Each byte carries 7 payload bits, least significant group first. The high bit
//! is set on every byte except the last.
//!
//! ## Invariants
//! - Values `0..=127` encode to exactly one byte.
//! - Decoding never reads past `max_len(bits)` bytes.

use crate::Error;
use crate::Malformed;
use crate::Result;

const CONTINUE: u8 = 0x80;
const PAYLOAD: u8 = 0x7f;
const SIGN: u8 = 0x40;

/// Maximal encoded length of a 32-bit varint.
pub const MAX_LEN_U32: usize = max_len(32);
/// Maximal encoded length of a 64-bit varint.
pub const MAX_LEN_U64: usize = max_len(64);

/// Number of bytes needed to carry `bits` bits, 7 per byte.
pub const fn max_len(bits: u32) -> usize {
    (bits as usize + 6) / 7
}

/// Number of bytes `encode_u64(v)` would write.
pub fn encoded_len(v: u64) -> usize {
    let bits = 64 - v.leading_zeros();
    max_len(bits.max(1))
}

/// Appends the unsigned LEB128 encoding of `v`, returning the bytes written.
pub fn encode_u64(mut v: u64, buf: &mut Vec<u8>) -> usize {
    let start = buf.len();
    loop {
        let byte = (v as u8) & PAYLOAD;
        v >>= 7;
        if v == 0 {
            buf.push(byte);
            return buf.len() - start;
        }
        buf.push(byte | CONTINUE);
    }
}

/// Appends the unsigned LEB128 encoding of `v`, returning the bytes written.
pub fn encode_u32(v: u32, buf: &mut Vec<u8>) -> usize {
    encode_u64(v as u64, buf)
}

/// Appends the signed LEB128 encoding of `v`, returning the bytes written.
pub fn encode_i64(mut v: i64, buf: &mut Vec<u8>) -> usize {
    let start = buf.len();
    loop {
        let byte = (v as u8) & PAYLOAD;
        v >>= 7;
        let done = (v == 0 && byte & SIGN == 0) || (v == -1 && byte & SIGN != 0);
        if done {
            buf.push(byte);
            return buf.len() - start;
        }
        buf.push(byte | CONTINUE);
    }
}

/// Decodes an unsigned varint of at most `bits` bits.
///
/// Returns the value and the number of bytes consumed.
///
/// # Errors
/// - `MalformedEncoding(VarintOverflow)` if no terminating byte appears within
///   `max_len(bits)` bytes, or the value does not fit in `bits`.
/// - `UnexpectedEnd` if the input ends before a terminating byte.
pub fn decode_unsigned(bytes: &[u8], bits: u32) -> Result<(u64, usize)> {
    let limit = max_len(bits);
    let mut value: u128 = 0;

    for (i, &byte) in bytes.iter().enumerate() {
        if i == limit {
            return Err(Malformed::VarintOverflow { bits }.into());
        }
        value |= ((byte & PAYLOAD) as u128) << (7 * i);
        if byte & CONTINUE == 0 {
            if value >> bits != 0 {
                return Err(Malformed::VarintOverflow { bits }.into());
            }
            return Ok((value as u64, i + 1));
        }
    }

    if bytes.len() >= limit {
        return Err(Malformed::VarintOverflow { bits }.into());
    }
    Err(Error::UnexpectedEnd)
}

/// Decodes a signed varint of at most `bits` bits.
///
/// Same failure modes as [`decode_unsigned`].
pub fn decode_signed(bytes: &[u8], bits: u32) -> Result<(i64, usize)> {
    let limit = max_len(bits);
    let mut value: i128 = 0;

    for (i, &byte) in bytes.iter().enumerate() {
        if i == limit {
            return Err(Malformed::VarintOverflow { bits }.into());
        }
        let shift = 7 * i as u32;
        value |= ((byte & PAYLOAD) as i128) << shift;
        if byte & CONTINUE == 0 {
            if byte & SIGN != 0 {
                value |= -1i128 << (shift + 7);
            }
            let min = -(1i128 << (bits - 1));
            let max = (1i128 << (bits - 1)) - 1;
            if value < min || value > max {
                return Err(Malformed::VarintOverflow { bits }.into());
            }
            return Ok((value as i64, i + 1));
        }
    }

    if bytes.len() >= limit {
        return Err(Malformed::VarintOverflow { bits }.into());
    }
    Err(Error::UnexpectedEnd)
}

/// Decodes a 64-bit unsigned varint.
pub fn decode_u64(bytes: &[u8]) -> Result<(u64, usize)> {
    decode_unsigned(bytes, 64)
}

/// Decodes a 32-bit unsigned varint.
pub fn decode_u32(bytes: &[u8]) -> Result<(u32, usize)> {
    let (v, n) = decode_unsigned(bytes, 32)?;
    Ok((v as u32, n))
}

/// Decodes a 64-bit signed varint.
pub fn decode_i64(bytes: &[u8]) -> Result<(i64, usize)> {
    decode_signed(bytes, 64)
}

/// Decodes a 32-bit signed varint.
pub fn decode_i32(bytes: &[u8]) -> Result<(i32, usize)> {
    let (v, n) = decode_signed(bytes, 32)?;
    Ok((v as i32, n))
}
