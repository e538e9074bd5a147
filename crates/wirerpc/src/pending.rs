//! # Pending Reads
//!
//! Receiving-side mirror of [`crate::deferred`]. Decoding registers a
//! [`DeferredRead`] for every placeholder; [`resolve`] reads each one from its
//! sub-channel and then resolves whatever that payload deferred in turn.

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::try_join_all;
use tracing::debug;
use wirepack::Deferred;
use wirepack::Worklist;

use crate::Result;
use crate::call::Config;
use crate::deferred::escaped;
use crate::transport::IndexReader;
use crate::transport::route_reader;

/// A placeholder waiting for its payload on an indexed sub-channel.
#[async_trait::async_trait]
pub trait DeferredRead: Send {
    /// Reads the payload from `r` and completes the placeholder.
    async fn read(
        self: Box<Self>,
        r: &mut dyn IndexReader,
        nested: &mut Incoming,
        config: &Config,
    ) -> Result<()>;
}

impl std::fmt::Debug for dyn DeferredRead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredRead").finish_non_exhaustive()
    }
}

/// The placeholders registered while decoding one value.
pub type Incoming = Worklist<Box<dyn DeferredRead>>;

/// Resolves every placeholder of `pending` with the default [`Config`].
pub fn resolve<'a>(root: &'a dyn IndexReader, pending: Incoming) -> BoxFuture<'a, Result<()>> {
    async move {
        let config = Config::default();
        resolve_with(root, pending, &config).await
    }
    .boxed()
}

/// Resolves every placeholder of `pending`, reading relative to `root`.
///
/// A placeholder whose read fails is dropped unresolved, so whoever awaits it
/// observes `Error::Abandoned`.
pub fn resolve_with<'a>(
    root: &'a dyn IndexReader,
    pending: Incoming,
    config: &'a Config,
) -> BoxFuture<'a, Result<()>> {
    async move {
        if pending.is_empty() {
            return Ok(());
        }
        debug!(root = %root.path(), items = pending.len(), "resolve");
        let jobs = pending.into_items().into_iter().map(|deferred| run(root, deferred, config));
        try_join_all(jobs).await?;
        Ok(())
    }
    .boxed()
}

async fn run(
    root: &dyn IndexReader,
    deferred: Deferred<Box<dyn DeferredRead>>,
    config: &Config,
) -> Result<()> {
    let Deferred { path, item } = deferred;
    let Some(relative) = path.relative_to(root.path()) else {
        return Err(escaped(root.path(), &path));
    };
    let mut r = route_reader(root, relative)?;
    let mut nested = Incoming::at(path);
    item.read(r.as_mut(), &mut nested, config).await?;
    resolve_with(r.as_ref(), nested, config).await
}
