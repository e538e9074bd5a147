//! # In-Memory Carrier
//!
//! Every sub-channel of a call is multiplexed onto one ordered queue of
//! [`Frame`]s. The reading side demultiplexes frames into per-path inboxes.
//!
//! Frames are delivered in the order they were flushed, so a sub-channel's data
//! can never overtake the parent message that was flushed before it was routed.
//!
//! ## Invariants
//! - Routing alone sends no frames. Only a writer that was written to or
//!   closed ever completes its sub-channel.
//! - A sub-channel's inbox is dropped once the reader drains it to completion.
//!   From then on only that reader (and its clones) report it complete.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::sync::MutexGuard;
use tokio::sync::Notify;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::trace;
use wirepack::IndexPath;

use crate::Error;
use crate::Result;
use crate::transport::IndexReader;
use crate::transport::IndexWriter;

/// One unit on the shared queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub path: IndexPath,
    pub data: Vec<u8>,
    /// Marks the sub-channel at `path` as complete.
    pub fin: bool,
}

/// Creates a connected writer and reader, both addressing the root channel.
pub fn channel() -> (MemWriter, MemReader) {
    let (tx, rx) = mpsc::unbounded_channel();
    let demux = Arc::new(Demux {
        rx: Mutex::new(rx),
        inbox: DashMap::new(),
        notify: Notify::new(),
        disconnected: AtomicBool::new(false),
    });
    let writer = MemWriter::new(IndexPath::root(), tx);
    let reader = MemReader { path: IndexPath::root(), demux, finished: false };
    (writer, reader)
}

/// Writes to one sub-channel. Bytes are buffered until `flush` or `close`.
///
/// Dropping an unclosed writer that was written to flushes and closes it.
#[derive(Debug)]
pub struct MemWriter {
    path: IndexPath,
    tx: mpsc::UnboundedSender<Frame>,
    buf: Vec<u8>,
    written: bool,
    closed: bool,
}

impl MemWriter {
    fn new(path: IndexPath, tx: mpsc::UnboundedSender<Frame>) -> Self {
        Self { path, tx, buf: Vec::new(), written: false, closed: false }
    }

    fn send(&self, data: Vec<u8>, fin: bool) -> Result<()> {
        trace!(path = %self.path, len = data.len(), fin, "frame");
        self.tx
            .send(Frame { path: self.path.clone(), data, fin })
            .map_err(|_| Error::Transport(format!("peer gone while sending on {}", self.path)))
    }
}

#[async_trait::async_trait]
impl IndexWriter for MemWriter {
    fn path(&self) -> &IndexPath {
        &self.path
    }

    fn index(&self, index: usize) -> Result<Box<dyn IndexWriter>> {
        let path = self.path.child(index);
        if self.tx.is_closed() {
            return Err(Error::RoutingFailed { path, reason: "reader is gone".into() });
        }
        Ok(Box::new(MemWriter::new(path, self.tx.clone())))
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::Transport(format!("write to closed sub-channel {}", self.path)));
        }
        self.written = true;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let data = std::mem::take(&mut self.buf);
        self.send(data, false)
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let data = std::mem::take(&mut self.buf);
        self.send(data, true)
    }
}

impl Drop for MemWriter {
    fn drop(&mut self) {
        if self.written && !self.closed {
            let data = std::mem::take(&mut self.buf);
            let _ = self.send(data, true);
        }
    }
}

#[derive(Debug, Default)]
struct Inbox {
    data: VecDeque<u8>,
    fin: bool,
}

#[derive(Debug)]
struct Demux {
    rx: Mutex<mpsc::UnboundedReceiver<Frame>>,
    inbox: DashMap<IndexPath, Inbox>,
    notify: Notify,
    disconnected: AtomicBool,
}

impl Demux {
    /// Takes buffered bytes for `path`. `Some(empty)` means the path is complete.
    ///
    /// A complete inbox is removed by the call that reports it complete.
    fn take(&self, path: &IndexPath, len: usize) -> Option<Vec<u8>> {
        let finished = match self.inbox.get_mut(path) {
            Some(mut inbox) if !inbox.data.is_empty() => {
                let n = len.min(inbox.data.len());
                return Some(inbox.data.drain(..n).collect());
            }
            Some(inbox) => inbox.fin,
            None => false,
        };
        if finished {
            self.inbox.remove_if(path, |_, inbox| inbox.fin && inbox.data.is_empty());
            trace!(%path, "inbox done");
            return Some(Vec::new());
        }
        self.disconnected.load(Ordering::Acquire).then(Vec::new)
    }

    fn deliver(&self, frame: Option<Frame>) {
        match frame {
            Some(frame) => {
                let mut inbox = self.inbox.entry(frame.path).or_default();
                inbox.data.extend(frame.data);
                inbox.fin |= frame.fin;
            }
            None => {
                debug!("all writers gone");
                self.disconnected.store(true, Ordering::Release);
            }
        }
    }
}

/// Holds the queue while one reader pumps it. Other readers wait on `notify`.
///
/// Releasing the queue always wakes the waiters, so one of them can take over.
struct Pump<'a> {
    rx: Option<MutexGuard<'a, mpsc::UnboundedReceiver<Frame>>>,
    notify: &'a Notify,
}

impl Pump<'_> {
    async fn recv(&mut self) -> Option<Frame> {
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }
}

impl Drop for Pump<'_> {
    fn drop(&mut self) {
        self.rx.take();
        self.notify.notify_waiters();
    }
}

/// Reads one sub-channel of a [`channel`].
#[derive(Debug, Clone)]
pub struct MemReader {
    path: IndexPath,
    demux: Arc<Demux>,
    finished: bool,
}

impl MemReader {
    /// Sub-channels with frames still buffered or not yet read to completion.
    #[cfg(test)]
    pub(crate) fn open_inboxes(&self) -> usize {
        self.demux.inbox.len()
    }
}

#[async_trait::async_trait]
impl IndexReader for MemReader {
    fn path(&self) -> &IndexPath {
        &self.path
    }

    fn index(&self, index: usize) -> Result<Box<dyn IndexReader>> {
        Ok(Box::new(MemReader {
            path: self.path.child(index),
            demux: self.demux.clone(),
            finished: false,
        }))
    }

    async fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        if len == 0 || self.finished {
            return Ok(Vec::new());
        }
        loop {
            let notified = self.demux.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(bytes) = self.demux.take(&self.path, len) {
                self.finished = bytes.is_empty();
                return Ok(bytes);
            }

            match self.demux.rx.try_lock() {
                Ok(rx) => {
                    let mut pump = Pump { rx: Some(rx), notify: &self.demux.notify };
                    let frame = pump.recv().await;
                    self.demux.deliver(frame);
                }
                Err(_) => notified.await,
            }
        }
    }
}
