//! # Encoder
//!
//! An append-only writer for inline values. The encoder knows nothing about
//! schemas: callers emit fields in declaration order.

use crate::Error;
use crate::Result;
use crate::varint;

/// An append-only writer for inline wire values.
#[derive(Debug, Default, Clone)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Creates a new encoder with default capacity.
    pub fn new() -> Self {
        Self { buf: Vec::with_capacity(64) }
    }

    /// Consumes the encoder and returns the final byte vector.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns a view of the current buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn len_prefix(&mut self, len: usize) -> Result<()> {
        if len > u32::MAX as usize {
            return Err(Error::TooLarge(len));
        }
        varint::encode_u32(len as u32, &mut self.buf);
        Ok(())
    }

    /// Encodes a tagged union discriminant.
    pub fn discriminant(&mut self, v: u32) -> Result<()> {
        varint::encode_u32(v, &mut self.buf);
        Ok(())
    }

    /// Encodes a boolean as a single 0/1 byte.
    pub fn bool(&mut self, v: bool) -> Result<()> { self.buf.push(v as u8); Ok(()) }

    /// Encodes an unsigned 8-bit integer verbatim.
    pub fn u8(&mut self, v: u8) -> Result<()> { self.buf.push(v); Ok(()) }
    /// Encodes a signed 8-bit integer verbatim.
    pub fn s8(&mut self, v: i8) -> Result<()> { self.buf.push(v as u8); Ok(()) }

    /// Encodes an unsigned 16-bit integer (ULEB128).
    pub fn u16(&mut self, v: u16) -> Result<()> { varint::encode_u64(v as u64, &mut self.buf); Ok(()) }
    /// Encodes an unsigned 32-bit integer (ULEB128).
    pub fn u32(&mut self, v: u32) -> Result<()> { varint::encode_u32(v, &mut self.buf); Ok(()) }
    /// Encodes an unsigned 64-bit integer (ULEB128).
    pub fn u64(&mut self, v: u64) -> Result<()> { varint::encode_u64(v, &mut self.buf); Ok(()) }

    /// Encodes a signed 16-bit integer (SLEB128).
    pub fn s16(&mut self, v: i16) -> Result<()> { varint::encode_i64(v as i64, &mut self.buf); Ok(()) }
    /// Encodes a signed 32-bit integer (SLEB128).
    pub fn s32(&mut self, v: i32) -> Result<()> { varint::encode_i64(v as i64, &mut self.buf); Ok(()) }
    /// Encodes a signed 64-bit integer (SLEB128).
    pub fn s64(&mut self, v: i64) -> Result<()> { varint::encode_i64(v, &mut self.buf); Ok(()) }

    /// Encodes a 32-bit float (LE).
    pub fn f32(&mut self, v: f32) -> Result<()> { self.buf.extend_from_slice(&v.to_le_bytes()); Ok(()) }
    /// Encodes a 64-bit float (LE).
    pub fn f64(&mut self, v: f64) -> Result<()> { self.buf.extend_from_slice(&v.to_le_bytes()); Ok(()) }

    /// Encodes a char as its scalar value (ULEB128).
    pub fn char(&mut self, v: char) -> Result<()> { self.u32(v as u32) }

    /// Encodes a UTF-8 string blob.
    pub fn str(&mut self, v: &str) -> Result<()> {
        self.bytes(v.as_bytes())
    }

    /// Encodes a length-prefixed byte blob.
    pub fn bytes(&mut self, v: &[u8]) -> Result<()> {
        self.len_prefix(v.len())?;
        self.buf.extend_from_slice(v);
        Ok(())
    }

    /// Begins a list of `len` items. The caller writes the items next.
    pub fn list_len(&mut self, len: usize) -> Result<()> {
        self.len_prefix(len)
    }

    /// Encodes `option::none`.
    pub fn option_none(&mut self) -> Result<()> { self.buf.push(0); Ok(()) }
    /// Begins `option::some`. The caller writes the payload next.
    pub fn option_some(&mut self) -> Result<()> { self.buf.push(1); Ok(()) }

    /// Begins `result::ok`. The caller writes the payload next.
    pub fn result_ok(&mut self) -> Result<()> { self.buf.push(0); Ok(()) }
    /// Begins `result::err`. The caller writes the payload next.
    pub fn result_err(&mut self) -> Result<()> { self.buf.push(1); Ok(()) }
}
