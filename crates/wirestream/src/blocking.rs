//! # Blocking Combinators
//!
//! Every waiting operation is written once here, in terms of the non-blocking
//! primitives plus [`Pollable::block`](crate::Pollable::block). Stream resources
//! only implement [`InputStream`] and [`OutputStream`].

use async_trait::async_trait;

use crate::error::StreamResult;
use crate::traits::InputStream;
use crate::traits::OutputStream;

fn clamp(len: u64) -> usize {
    usize::try_from(len).unwrap_or(usize::MAX)
}

/// Waiting variants of the [`InputStream`] operations.
#[async_trait]
pub trait InputStreamExt: InputStream {
    /// Waits until at least one byte is available, then reads up to `len`.
    async fn blocking_read(&mut self, len: u64) -> StreamResult<Vec<u8>> {
        loop {
            let bytes = self.read(len)?;
            if !bytes.is_empty() || len == 0 {
                return Ok(bytes);
            }
            self.subscribe().block().await;
        }
    }

    /// Waits until at least one byte is available, then skips up to `len`.
    async fn blocking_skip(&mut self, len: u64) -> StreamResult<u64> {
        loop {
            let skipped = self.skip(len)?;
            if skipped > 0 || len == 0 {
                return Ok(skipped);
            }
            self.subscribe().block().await;
        }
    }
}

impl<T: InputStream + ?Sized> InputStreamExt for T {}

/// Waiting variants of the [`OutputStream`] operations.
#[async_trait]
pub trait OutputStreamExt: OutputStream {
    /// Flushes, then waits until the flush has completed.
    async fn blocking_flush(&mut self) -> StreamResult<()> {
        self.flush()?;
        self.subscribe().block().await;
        self.check_write().map(|_| ())
    }

    /// Writes all of `contents` in chunks of at most the current permit, then
    /// flushes and waits for the flush to complete.
    async fn blocking_write_and_flush(&mut self, contents: &[u8]) -> StreamResult<()> {
        let mut rest = contents;
        while !rest.is_empty() {
            self.subscribe().block().await;
            let permit = clamp(self.check_write()?);
            let (chunk, tail) = rest.split_at(permit.min(rest.len()));
            if !chunk.is_empty() {
                self.write(chunk)?;
            }
            rest = tail;
        }
        self.blocking_flush().await
    }

    /// Writes `len` zero bytes like [`blocking_write_and_flush`](Self::blocking_write_and_flush).
    async fn blocking_write_zeroes_and_flush(&mut self, len: u64) -> StreamResult<()> {
        let mut rest = len;
        while rest > 0 {
            self.subscribe().block().await;
            let n = self.check_write()?.min(rest);
            if n > 0 {
                self.write_zeroes(n)?;
            }
            rest -= n;
        }
        self.blocking_flush().await
    }

    /// Waits until both streams are ready, then splices up to `len` bytes.
    async fn blocking_splice(&mut self, src: &mut dyn InputStream, len: u64) -> StreamResult<u64> {
        if len == 0 {
            return self.splice(src, 0);
        }
        loop {
            self.subscribe().block().await;
            src.subscribe().block().await;
            let n = self.splice(src, len)?;
            if n > 0 {
                return Ok(n);
            }
        }
    }
}

impl<T: OutputStream + ?Sized> OutputStreamExt for T {}
