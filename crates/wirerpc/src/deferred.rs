//! # Deferred Writes
//!
//! While a value is encoded, every payload that cannot be inlined registers a
//! [`DeferredWrite`] in the [`Outgoing`] worklist at its [`IndexPath`]. After the
//! inline message has been flushed, [`drain`] routes each item to its sub-channel
//! and runs it.
//!
//! ## Invariants
//! - Each item runs exactly once, with the writer for its own path.
//! - An item's sub-channel is closed before the item's own nested items run.
//! - Sibling items run concurrently. The first failure aborts the whole drain.

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::try_join_all;
use tracing::debug;
use wirepack::Deferred;
use wirepack::IndexPath;
use wirepack::Worklist;

use crate::Error;
use crate::Result;
use crate::transport::IndexWriter;
use crate::transport::route_path;

/// Payload bytes to be written later on an indexed sub-channel.
///
/// Consumed by value: after `write` returns the item is spent.
#[async_trait::async_trait]
pub trait DeferredWrite: Send {
    /// Writes a complete, self-delimited representation of the payload to `w`.
    ///
    /// Anything the payload defers in turn goes into `nested`, which is rooted at
    /// `w.path()`.
    async fn write(self: Box<Self>, w: &mut dyn IndexWriter, nested: &mut Outgoing) -> Result<()>;
}

impl std::fmt::Debug for dyn DeferredWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredWrite").finish_non_exhaustive()
    }
}

/// The deferred writes collected while encoding one value.
pub type Outgoing = Worklist<Box<dyn DeferredWrite>>;

/// Runs every item of `work`, routing each relative to `root`.
pub fn drain<'a>(root: &'a dyn IndexWriter, work: Outgoing) -> BoxFuture<'a, Result<()>> {
    async move {
        if work.is_empty() {
            return Ok(());
        }
        debug!(root = %root.path(), items = work.len(), "drain");
        let jobs = work.into_items().into_iter().map(|deferred| run(root, deferred));
        try_join_all(jobs).await?;
        Ok(())
    }
    .boxed()
}

async fn run(root: &dyn IndexWriter, deferred: Deferred<Box<dyn DeferredWrite>>) -> Result<()> {
    let Deferred { path, item } = deferred;
    let Some(relative) = path.relative_to(root.path()) else {
        return Err(escaped(root.path(), &path));
    };
    let mut w = route_path(root, relative)?;
    let mut nested = Outgoing::at(path);
    item.write(w.as_mut(), &mut nested).await?;
    w.close().await?;
    drain(w.as_ref(), nested).await
}

pub(crate) fn escaped(root: &IndexPath, path: &IndexPath) -> Error {
    Error::RoutingFailed {
        path: path.clone(),
        reason: format!("path is not below {}", root),
    }
}
