//! # Pipes
//!
//! An in-process stream pair over a bounded buffer. Bytes written to the
//! [`PipeWriter`] are readable from the [`PipeReader`] immediately. A flush
//! completes once the reader has drained every byte written before it.
//!
//! ## Invariants
//! - The buffer never holds more than `capacity` bytes.
//! - Dropping the writer closes the reader after the buffered bytes are read.
//! - Dropping the reader closes the writer at once.

use std::collections::VecDeque;
use std::collections::vec_deque::Drain;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use tokio::sync::Notify;
use tracing::debug;
use tracing::trace;

use crate::error::IoError;
use crate::error::StreamError;
use crate::error::StreamResult;
use crate::pollable::Pollable;
use crate::pollable::Readiness;
use crate::pollable::Subscriptions;
use crate::traits::InputStream;
use crate::traits::OutputStream;
use crate::traits::Permit;

/// Default buffer size of a pipe.
pub const DEFAULT_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct PipeConfig {
    /// Bytes the pipe buffers before `check_write` reports 0.
    pub capacity: usize,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self { capacity: DEFAULT_CAPACITY }
    }
}

impl PipeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the buffer size. A capacity of 0 is raised to 1.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }
}

/// Creates a connected writer and reader.
pub fn pipe(config: PipeConfig) -> (PipeWriter, PipeReader) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            buf: VecDeque::new(),
            capacity: config.capacity.max(1),
            flush_pending: false,
            writer_gone: false,
            reader_gone: false,
            failure: None,
        }),
        notify: Notify::new(),
    });
    let writer = PipeWriter {
        shared: shared.clone(),
        permit: Permit::default(),
        closed: false,
        subscriptions: Subscriptions::new(),
    };
    let reader = PipeReader { shared, closed: false, subscriptions: Subscriptions::new() };
    (writer, reader)
}

#[derive(Debug)]
struct State {
    buf: VecDeque<u8>,
    capacity: usize,
    flush_pending: bool,
    writer_gone: bool,
    reader_gone: bool,
    /// Reported to the reader once the buffer is drained, in place of `Closed`.
    failure: Option<IoError>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    notify: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // Every update leaves the state consistent, so poisoning is ignored.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn wake(&self) {
        self.notify.notify_waiters();
    }
}

struct ReadSide(Arc<Shared>);

impl Readiness for ReadSide {
    fn is_ready(&self) -> bool {
        let state = self.0.lock();
        !state.buf.is_empty() || state.writer_gone
    }

    fn notify(&self) -> &Notify {
        &self.0.notify
    }
}

struct WriteSide(Arc<Shared>);

impl Readiness for WriteSide {
    fn is_ready(&self) -> bool {
        let state = self.0.lock();
        state.reader_gone || (!state.flush_pending && state.buf.len() < state.capacity)
    }

    fn notify(&self) -> &Notify {
        &self.0.notify
    }
}

/// The writing end of a [`pipe`].
#[derive(Debug)]
pub struct PipeWriter {
    shared: Arc<Shared>,
    permit: Permit,
    closed: bool,
    subscriptions: Subscriptions,
}

impl PipeWriter {
    /// Closes the pipe with a failure. The reader still receives every byte
    /// already buffered, then `LastOperationFailed(error)` once, then `Closed`.
    pub fn abort(self, error: IoError) {
        debug!(%error, "pipe aborted");
        self.shared.lock().failure = Some(error);
    }

    fn open(&mut self) -> StreamResult<MutexGuard<'_, State>> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        let state = self.shared.lock();
        if state.reader_gone {
            drop(state);
            self.closed = true;
            trace!("pipe writer closed");
            return Err(StreamError::Closed);
        }
        Ok(state)
    }
}

impl OutputStream for PipeWriter {
    fn check_write(&mut self) -> StreamResult<u64> {
        let state = self.open()?;
        let n = if state.flush_pending { 0 } else { state.capacity - state.buf.len() };
        drop(state);
        self.permit.grant(n as u64);
        Ok(n as u64)
    }

    fn write(&mut self, contents: &[u8]) -> StreamResult<()> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        let mut state = self.shared.lock();
        if state.reader_gone {
            drop(state);
            self.closed = true;
            return Err(StreamError::Closed);
        }
        self.permit.consume(contents.len(), "pipe writer");
        state.buf.extend(contents);
        drop(state);
        self.shared.wake();
        Ok(())
    }

    fn flush(&mut self) -> StreamResult<()> {
        let mut state = self.open()?;
        if !state.buf.is_empty() {
            state.flush_pending = true;
        }
        Ok(())
    }

    fn subscribe(&self) -> Pollable {
        self.subscriptions.subscribe(Arc::new(WriteSide(self.shared.clone())))
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.shared.lock().writer_gone = true;
        self.shared.wake();
        self.subscriptions.release("pipe writer");
    }
}

/// The reading end of a [`pipe`].
#[derive(Debug)]
pub struct PipeReader {
    shared: Arc<Shared>,
    closed: bool,
    subscriptions: Subscriptions,
}

impl PipeReader {
    /// Takes up to `len` buffered bytes, passing each run to `sink`.
    fn take(&mut self, len: u64, sink: impl FnOnce(Drain<'_, u8>)) -> StreamResult<u64> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        let mut state = self.shared.lock();
        if !state.buf.is_empty() {
            let n = state.buf.len().min(usize::try_from(len).unwrap_or(usize::MAX));
            sink(state.buf.drain(..n));
            if state.buf.is_empty() {
                state.flush_pending = false;
            }
            drop(state);
            self.shared.wake();
            return Ok(n as u64);
        }
        if !state.writer_gone {
            return Ok(0);
        }
        if let Some(error) = state.failure.take() {
            return Err(StreamError::LastOperationFailed(error));
        }
        drop(state);
        self.closed = true;
        trace!("pipe reader closed");
        Err(StreamError::Closed)
    }
}

impl InputStream for PipeReader {
    fn read(&mut self, len: u64) -> StreamResult<Vec<u8>> {
        let mut out = Vec::new();
        self.take(len, |drained| out.extend(drained))?;
        Ok(out)
    }

    fn skip(&mut self, len: u64) -> StreamResult<u64> {
        self.take(len, |_| ())
    }

    fn subscribe(&self) -> Pollable {
        self.subscriptions.subscribe(Arc::new(ReadSide(self.shared.clone())))
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            state.reader_gone = true;
            state.buf.clear();
            state.flush_pending = false;
        }
        self.shared.wake();
        self.subscriptions.release("pipe reader");
    }
}
