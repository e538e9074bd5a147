//! # Decoder
//!
//! A bounds-checked cursor over a byte slice. Reading advances the cursor.
//!
//! ## Invariants
//! - **Panic Safety**: All decoding paths return `Result`, never panicking on bad input.
//! - A failed read does not advance the cursor.

use crate::Error;
use crate::Malformed;
use crate::Result;
use crate::varint;

/// A zero-copy, bounds-checked cursor over a byte slice.
///
/// # Errors
/// All read operations return `Error::UnexpectedEnd` if the buffer is exhausted.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over the slice.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the remaining bytes in the view.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Succeeds only if every byte has been consumed.
    pub fn finish(&self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(Malformed::TrailingBytes(n).into()),
        }
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    fn read_u8(&mut self) -> Result<u8> {
        let b = *self.rest().first().ok_or(Error::UnexpectedEnd)?;
        self.pos += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::UnexpectedEnd);
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn unsigned(&mut self, bits: u32) -> Result<u64> {
        let (v, n) = varint::decode_unsigned(self.rest(), bits)?;
        self.pos += n;
        Ok(v)
    }

    fn signed(&mut self, bits: u32) -> Result<i64> {
        let (v, n) = varint::decode_signed(self.rest(), bits)?;
        self.pos += n;
        Ok(v)
    }

    fn flag(&mut self) -> Result<bool> {
        match self.rest().first() {
            None => Err(Error::UnexpectedEnd),
            Some(0) => { self.pos += 1; Ok(false) }
            Some(1) => { self.pos += 1; Ok(true) }
            Some(&b) => Err(Malformed::InvalidFlag(b).into()),
        }
    }

    fn len_prefix(&mut self) -> Result<usize> {
        let mut probe = self.clone();
        let len = probe.unsigned(32)?;
        let len = usize::try_from(len).map_err(|_| Malformed::LengthOverflow(len))?;
        *self = probe;
        Ok(len)
    }

    /// Decodes a tagged union discriminant.
    pub fn discriminant(&mut self) -> Result<u32> {
        Ok(self.unsigned(32)? as u32)
    }

    /// Decodes a bool.
    pub fn bool(&mut self) -> Result<bool> {
        match self.rest().first() {
            None => Err(Error::UnexpectedEnd),
            Some(0) => { self.pos += 1; Ok(false) }
            Some(1) => { self.pos += 1; Ok(true) }
            Some(&b) => Err(Malformed::InvalidBool(b).into()),
        }
    }

    /// Decodes u8.
    pub fn u8(&mut self) -> Result<u8> { self.read_u8() }
    /// Decodes s8.
    pub fn s8(&mut self) -> Result<i8> { Ok(self.read_u8()? as i8) }

    /// Decodes u16 (ULEB128).
    pub fn u16(&mut self) -> Result<u16> { Ok(self.unsigned(16)? as u16) }
    /// Decodes u32 (ULEB128).
    pub fn u32(&mut self) -> Result<u32> { Ok(self.unsigned(32)? as u32) }
    /// Decodes u64 (ULEB128).
    pub fn u64(&mut self) -> Result<u64> { self.unsigned(64) }

    /// Decodes s16 (SLEB128).
    pub fn s16(&mut self) -> Result<i16> { Ok(self.signed(16)? as i16) }
    /// Decodes s32 (SLEB128).
    pub fn s32(&mut self) -> Result<i32> { Ok(self.signed(32)? as i32) }
    /// Decodes s64 (SLEB128).
    pub fn s64(&mut self) -> Result<i64> { self.signed(64) }

    /// Decodes f32 (LE).
    pub fn f32(&mut self) -> Result<f32> { Ok(f32::from_le_bytes(self.read_array()?)) }
    /// Decodes f64 (LE).
    pub fn f64(&mut self) -> Result<f64> { Ok(f64::from_le_bytes(self.read_array()?)) }

    /// Decodes a char from its scalar value.
    pub fn char(&mut self) -> Result<char> {
        let mut probe = self.clone();
        let v = probe.u32()?;
        let c = char::from_u32(v).ok_or(Malformed::InvalidChar(v))?;
        *self = probe;
        Ok(c)
    }

    /// Decodes a string slice (UTF-8).
    pub fn str(&mut self) -> Result<&'a str> {
        let mut probe = self.clone();
        let bytes = probe.bytes()?;
        let s = std::str::from_utf8(bytes).map_err(|_| Malformed::InvalidUtf8)?;
        *self = probe;
        Ok(s)
    }

    /// Decodes a length-prefixed byte slice.
    pub fn bytes(&mut self) -> Result<&'a [u8]> {
        let mut probe = self.clone();
        let len = probe.len_prefix()?;
        let bytes = probe.read_bytes(len)?;
        *self = probe;
        Ok(bytes)
    }

    /// Decodes a list header, returning the number of items that follow.
    pub fn list_len(&mut self) -> Result<usize> {
        self.len_prefix()
    }

    /// Decodes an option header. Returns true if a payload follows.
    pub fn option(&mut self) -> Result<bool> {
        self.flag()
    }

    /// Decodes a result header. Returns `Ok(())` for ok, `Err(())` for err; the payload follows.
    pub fn result(&mut self) -> Result<std::result::Result<(), ()>> {
        Ok(if self.flag()? { Err(()) } else { Ok(()) })
    }
}
