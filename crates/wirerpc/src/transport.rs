//! # Transport Abstraction
//!
//! A minimal, async interface over a carrier that multiplexes many ordered byte
//! sub-channels, each addressed by an [`IndexPath`].
//!
//! ## Philosophy
//!
//! - **Byte-Oriented**: Channels know nothing about values or variants.
//!   They move opaque buffers.
//! - **Path-Addressed**: A child channel is derived from its parent by index.
//!   Neither side needs to know offsets in advance.
//!
//! ## Invariants
//! - `index(i)` is deterministic: two calls with the same `i` on the same channel
//!   address the same logical sub-channel.
//! - An empty `read` means the sub-channel is complete.

use tracing::trace;
use wirepack::IndexPath;
use wirepack::Malformed;
use wirepack::varint;

use crate::Error;
use crate::Result;

/// The sending half of an indexed sub-channel.
///
/// This trait is designed to be object-safe (`Box<dyn IndexWriter>`).
#[async_trait::async_trait]
pub trait IndexWriter: Send + Sync {
    /// The sub-channel this writer addresses.
    fn path(&self) -> &IndexPath;

    /// Derives the writer for `path()/index`.
    ///
    /// # Errors
    /// `RoutingFailed` if the carrier can no longer open sub-channels.
    fn index(&self, index: usize) -> Result<Box<dyn IndexWriter>>;

    async fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Hands everything written so far to the carrier.
    async fn flush(&mut self) -> Result<()>;

    /// Flushes and signals that this sub-channel is complete.
    async fn close(&mut self) -> Result<()>;
}

/// The receiving half of an indexed sub-channel.
#[async_trait::async_trait]
pub trait IndexReader: Send + Sync {
    fn path(&self) -> &IndexPath;

    /// Derives the reader for `path()/index`.
    fn index(&self, index: usize) -> Result<Box<dyn IndexReader>>;

    /// Reads up to `len` bytes, waiting until at least one is available.
    ///
    /// Returns an empty buffer once the sub-channel is complete.
    async fn read(&mut self, len: usize) -> Result<Vec<u8>>;
}

/// Derives the child writer for `index`.
pub fn route(base: &dyn IndexWriter, index: usize) -> Result<Box<dyn IndexWriter>> {
    let child = base.index(index)?;
    trace!(from = %base.path(), to = %child.path(), "route");
    Ok(child)
}

/// Derives the writer `relative` levels below `base`.
///
/// # Errors
/// `RoutingFailed` for an empty `relative`: the base channel itself already
/// carries its own inline message.
pub fn route_path(base: &dyn IndexWriter, relative: &[usize]) -> Result<Box<dyn IndexWriter>> {
    let Some((&first, rest)) = relative.split_first() else {
        return Err(Error::RoutingFailed {
            path: base.path().clone(),
            reason: "no sub-channel below the base".into(),
        });
    };
    let mut writer = route(base, first)?;
    for &index in rest {
        writer = route(writer.as_ref(), index)?;
    }
    Ok(writer)
}

/// Reader-side counterpart of [`route_path`].
pub fn route_reader(base: &dyn IndexReader, relative: &[usize]) -> Result<Box<dyn IndexReader>> {
    let Some((&first, rest)) = relative.split_first() else {
        return Err(Error::RoutingFailed {
            path: base.path().clone(),
            reason: "no sub-channel below the base".into(),
        });
    };
    let mut reader = base.index(first)?;
    for &index in rest {
        reader = reader.index(index)?;
    }
    Ok(reader)
}

/// Reads exactly `len` bytes.
///
/// # Errors
/// `UnexpectedEof` if the sub-channel completes first.
pub async fn read_exact(r: &mut dyn IndexReader, len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        let chunk = r.read(len - out.len()).await?;
        if chunk.is_empty() {
            return Err(Error::UnexpectedEof(r.path().clone()));
        }
        out.extend_from_slice(&chunk);
    }
    Ok(out)
}

/// Reads one unsigned LEB128 value.
///
/// Returns `None` if the sub-channel completes cleanly before the first byte.
pub async fn read_uvarint(r: &mut dyn IndexReader) -> Result<Option<u64>> {
    let mut buf = Vec::with_capacity(varint::MAX_LEN_U64);
    loop {
        let byte = match r.read(1).await?.first() {
            Some(&b) => b,
            None if buf.is_empty() => return Ok(None),
            None => return Err(Error::UnexpectedEof(r.path().clone())),
        };
        buf.push(byte);
        if byte & 0x80 == 0 {
            let (v, _) = varint::decode_u64(&buf)?;
            return Ok(Some(v));
        }
        if buf.len() == varint::MAX_LEN_U64 {
            return Err(Malformed::VarintOverflow { bits: 64 }.into());
        }
    }
}

/// Writes `bytes` as one self-delimited message: `[Len: ULEB128][Data: Len]`.
pub async fn write_message(w: &mut dyn IndexWriter, bytes: &[u8]) -> Result<()> {
    let mut header = Vec::with_capacity(varint::MAX_LEN_U64);
    varint::encode_u64(bytes.len() as u64, &mut header);
    w.write(&header).await?;
    w.write(bytes).await
}

/// Reads one message written by [`write_message`].
///
/// # Errors
/// - `UnexpectedEof` if the sub-channel completes before or inside the message.
/// - `MessageTooLarge` if the header announces more than `max` bytes.
pub async fn read_message(r: &mut dyn IndexReader, max: usize) -> Result<Vec<u8>> {
    let Some(len) = read_uvarint(r).await? else {
        return Err(Error::UnexpectedEof(r.path().clone()));
    };
    match usize::try_from(len) {
        Ok(n) if n <= max => read_exact(r, n).await,
        _ => Err(Error::MessageTooLarge { len, max }),
    }
}
