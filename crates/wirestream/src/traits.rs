//! # Stream Contract
//!
//! The non-blocking primitives every stream resource implements. None of them
//! ever waits: zero progress is reported as an empty read or a zero permit.
//! Waiting is layered on top in [`crate::blocking`].
//!
//! ## Invariants
//! - Once an operation returns `Closed`, every later operation returns `Closed`.
//! - `write` requires a permit from the most recent `check_write`, and consumes
//!   it whole. Writing without one, or past it, panics.
//! - While a flush is pending, `check_write` reports 0.

use crate::error::StreamResult;
use crate::pollable::Pollable;

/// A source of bytes.
pub trait InputStream: Send + Sync {
    /// Reads up to `len` bytes.
    ///
    /// An empty result on an open stream means no data yet, not end of stream.
    fn read(&mut self, len: u64) -> StreamResult<Vec<u8>>;

    /// Discards up to `len` bytes, returning how many were discarded.
    fn skip(&mut self, len: u64) -> StreamResult<u64>;

    /// Ready once data is available or the stream has closed or failed.
    fn subscribe(&self) -> Pollable;
}

/// A sink for bytes.
pub trait OutputStream: Send + Sync {
    /// Returns how many bytes the next `write` may carry. 0 means not writable yet.
    fn check_write(&mut self) -> StreamResult<u64>;

    /// Writes `contents` verbatim.
    ///
    /// # Panics
    /// If `contents` exceeds the outstanding permit, or there is none.
    fn write(&mut self, contents: &[u8]) -> StreamResult<()>;

    /// Requests that buffered output be committed. Never waits.
    fn flush(&mut self) -> StreamResult<()>;

    /// Ready once `check_write` would report a non-zero permit or an error.
    fn subscribe(&self) -> Pollable;

    /// Writes `len` zero bytes under the same permit rules as `write`.
    fn write_zeroes(&mut self, len: u64) -> StreamResult<()> {
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        self.write(&vec![0; len])
    }

    /// Moves up to `len` bytes from `src` without waiting on either side.
    ///
    /// Returns the number of bytes moved. The first error from either stream
    /// aborts the splice and is returned.
    fn splice(&mut self, src: &mut dyn InputStream, len: u64) -> StreamResult<u64> {
        let permit = self.check_write()?.min(len);
        if permit == 0 {
            return Ok(0);
        }
        let bytes = src.read(permit)?;
        if bytes.is_empty() {
            return Ok(0);
        }
        self.write(&bytes)?;
        Ok(bytes.len() as u64)
    }
}

impl<T: InputStream + ?Sized> InputStream for Box<T> {
    fn read(&mut self, len: u64) -> StreamResult<Vec<u8>> {
        (**self).read(len)
    }

    fn skip(&mut self, len: u64) -> StreamResult<u64> {
        (**self).skip(len)
    }

    fn subscribe(&self) -> Pollable {
        (**self).subscribe()
    }
}

impl<T: OutputStream + ?Sized> OutputStream for Box<T> {
    fn check_write(&mut self) -> StreamResult<u64> {
        (**self).check_write()
    }

    fn write(&mut self, contents: &[u8]) -> StreamResult<()> {
        (**self).write(contents)
    }

    fn flush(&mut self) -> StreamResult<()> {
        (**self).flush()
    }

    fn subscribe(&self) -> Pollable {
        (**self).subscribe()
    }

    fn write_zeroes(&mut self, len: u64) -> StreamResult<()> {
        (**self).write_zeroes(len)
    }

    fn splice(&mut self, src: &mut dyn InputStream, len: u64) -> StreamResult<u64> {
        (**self).splice(src, len)
    }
}

/// Tracks the permit granted by the most recent `check_write`.
#[derive(Debug, Default)]
pub(crate) struct Permit(Option<u64>);

impl Permit {
    pub(crate) fn grant(&mut self, n: u64) {
        self.0 = Some(n);
    }

    /// Consumes the whole permit for a write of `len` bytes.
    ///
    /// # Panics
    /// If there is no permit or `len` exceeds it.
    pub(crate) fn consume(&mut self, len: usize, resource: &str) {
        match self.0.take() {
            Some(permit) if len as u64 <= permit => {}
            Some(permit) => panic!(
                "{}: write of {} bytes exceeds the permit of {} bytes",
                resource, len, permit
            ),
            None => panic!("{}: write of {} bytes without a check-write permit", resource, len),
        }
    }
}
