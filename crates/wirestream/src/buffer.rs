//! # Buffer Streams
//!
//! Streams over plain memory. They never wait, so their pollables are always ready.

use std::sync::Arc;

use crate::error::StreamError;
use crate::error::StreamResult;
use crate::pollable::AlwaysReady;
use crate::pollable::Pollable;
use crate::pollable::Subscriptions;
use crate::traits::InputStream;
use crate::traits::OutputStream;
use crate::traits::Permit;

/// Yields a fixed byte buffer, then `Closed`.
#[derive(Debug)]
pub struct BufferInputStream {
    data: Vec<u8>,
    pos: usize,
    closed: bool,
    ready: Arc<AlwaysReady>,
    subscriptions: Subscriptions,
}

impl BufferInputStream {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            closed: false,
            ready: Arc::default(),
            subscriptions: Subscriptions::new(),
        }
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn advance(&mut self, len: u64) -> StreamResult<&[u8]> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        if self.remaining() == 0 {
            self.closed = true;
            return Err(StreamError::Closed);
        }
        let n = self.remaining().min(usize::try_from(len).unwrap_or(usize::MAX));
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..self.pos])
    }
}

impl InputStream for BufferInputStream {
    fn read(&mut self, len: u64) -> StreamResult<Vec<u8>> {
        self.advance(len).map(<[u8]>::to_vec)
    }

    fn skip(&mut self, len: u64) -> StreamResult<u64> {
        self.advance(len).map(|skipped| skipped.len() as u64)
    }

    fn subscribe(&self) -> Pollable {
        self.subscriptions.subscribe(self.ready.clone())
    }
}

impl Drop for BufferInputStream {
    fn drop(&mut self) {
        self.subscriptions.release("buffer input stream");
    }
}

/// Default permit of a [`BufferOutputStream`].
pub const DEFAULT_MAX_PERMIT: u64 = 4096;

/// Collects everything written to it.
///
/// Every `check_write` grants the same fixed permit. Write sizes and flushes are
/// recorded so callers can observe how a writer chunked its output.
#[derive(Debug)]
pub struct BufferOutputStream {
    data: Vec<u8>,
    max_permit: u64,
    writes: Vec<usize>,
    flushes: usize,
    closed: bool,
    permit: Permit,
    ready: Arc<AlwaysReady>,
    subscriptions: Subscriptions,
}

impl Default for BufferOutputStream {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferOutputStream {
    pub fn new() -> Self {
        Self::with_max_permit(DEFAULT_MAX_PERMIT)
    }

    /// A stream whose permits never exceed `max_permit` bytes (at least 1).
    pub fn with_max_permit(max_permit: u64) -> Self {
        Self {
            data: Vec::new(),
            max_permit: max_permit.max(1),
            writes: Vec::new(),
            flushes: 0,
            closed: false,
            permit: Permit::default(),
            ready: Arc::default(),
            subscriptions: Subscriptions::new(),
        }
    }

    /// Everything written so far.
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    /// The size of every write, in order.
    pub fn writes(&self) -> &[usize] {
        &self.writes
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Closes the stream. Every later operation reports `Closed`.
    pub fn close(&mut self) {
        self.closed = true;
    }

    fn open(&self) -> StreamResult<()> {
        match self.closed {
            true => Err(StreamError::Closed),
            false => Ok(()),
        }
    }
}

impl OutputStream for BufferOutputStream {
    fn check_write(&mut self) -> StreamResult<u64> {
        self.open()?;
        self.permit.grant(self.max_permit);
        Ok(self.max_permit)
    }

    fn write(&mut self, contents: &[u8]) -> StreamResult<()> {
        self.open()?;
        self.permit.consume(contents.len(), "buffer output stream");
        self.data.extend_from_slice(contents);
        self.writes.push(contents.len());
        Ok(())
    }

    fn flush(&mut self) -> StreamResult<()> {
        self.open()?;
        self.flushes += 1;
        Ok(())
    }

    fn subscribe(&self) -> Pollable {
        self.subscriptions.subscribe(self.ready.clone())
    }
}

impl Drop for BufferOutputStream {
    fn drop(&mut self) {
        self.subscriptions.release("buffer output stream");
    }
}
