//! # Pollables
//!
//! A [`Pollable`] is a non-owning readiness view of a stream. Streams hand them
//! out through their [`Subscriptions`], which count the live views and trap if
//! the stream is released while any remain.
//!
//! ## Invariants
//! - Readiness is re-evaluated on every check. Only the stream's own operations
//!   make a ready source unready again.
//! - Dropping a stream with live pollables is a usage violation and panics.
//! - Using a pollable after its stream is gone panics.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use futures::future::select_all;
use tokio::sync::Notify;
use tracing::trace;

/// The readiness source behind a pollable.
pub trait Readiness: Send + Sync {
    /// True if the next operation on the stream would make progress or fail.
    fn is_ready(&self) -> bool;

    /// Woken whenever readiness may have changed.
    fn notify(&self) -> &Notify;
}

#[derive(Debug, Default)]
struct Tracker {
    live: AtomicUsize,
    released: AtomicBool,
}

/// Hands out pollables for one stream and tracks their lifetime.
#[derive(Debug, Default)]
pub struct Subscriptions {
    tracker: Arc<Tracker>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pollable over `source`.
    pub fn subscribe(&self, source: Arc<dyn Readiness>) -> Pollable {
        self.tracker.live.fetch_add(1, Ordering::AcqRel);
        Pollable { source, tracker: self.tracker.clone() }
    }

    /// Number of pollables still alive.
    pub fn live(&self) -> usize {
        self.tracker.live.load(Ordering::Acquire)
    }

    /// Marks the stream as gone. Call from the stream's `Drop`.
    ///
    /// # Panics
    /// If any pollable derived from the stream is still alive.
    pub fn release(&self, resource: &str) {
        self.tracker.released.store(true, Ordering::Release);
        let live = self.live();
        if live > 0 && !std::thread::panicking() {
            panic!("{} dropped while {} pollable(s) derived from it are still live", resource, live);
        }
    }
}

/// A readiness token derived from a stream.
pub struct Pollable {
    source: Arc<dyn Readiness>,
    tracker: Arc<Tracker>,
}

impl Pollable {
    fn source(&self) -> &dyn Readiness {
        if self.tracker.released.load(Ordering::Acquire) {
            panic!("pollable used after its stream was dropped");
        }
        self.source.as_ref()
    }

    /// Returns immediately with the current readiness.
    pub fn ready(&self) -> bool {
        self.source().is_ready()
    }

    /// Waits until the source is ready.
    pub async fn block(&self) {
        loop {
            let source = self.source();
            let notified = source.notify().notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if source.is_ready() {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for Pollable {
    fn drop(&mut self) {
        self.tracker.live.fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for Pollable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pollable")
            .field("released", &self.tracker.released.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

/// Waits until at least one of `pollables` is ready.
///
/// Returns the indices of every ready pollable, in ascending order.
///
/// # Panics
/// If `pollables` is empty, or has more than `u32::MAX` entries.
pub async fn poll(pollables: &[&Pollable]) -> Vec<u32> {
    if pollables.is_empty() {
        panic!("poll requires at least one pollable");
    }
    if u32::try_from(pollables.len()).is_err() {
        panic!("poll accepts at most u32::MAX pollables");
    }
    loop {
        let ready: Vec<u32> = pollables
            .iter()
            .enumerate()
            .filter(|(_, p)| p.ready())
            .map(|(i, _)| i as u32)
            .collect();
        if !ready.is_empty() {
            trace!(?ready, "poll");
            return ready;
        }
        select_all(pollables.iter().map(|p| Box::pin(p.block()))).await;
    }
}

/// A source that is always ready, for streams that never wait.
#[derive(Debug, Default)]
pub(crate) struct AlwaysReady {
    notify: Notify,
}

impl Readiness for AlwaysReady {
    fn is_ready(&self) -> bool {
        true
    }

    fn notify(&self) -> &Notify {
        &self.notify
    }
}
