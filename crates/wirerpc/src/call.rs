//! # Calls
//!
//! Sends and receives one value: the inline message first, as a single framed
//! message on the root channel, then every deferred payload on its sub-channel.

use tracing::debug;
use wirepack::Decoder;
use wirepack::Encoder;

use crate::Decode;
use crate::Encode;
use crate::Error;
use crate::Result;
use crate::deferred::Outgoing;
use crate::deferred::drain;
use crate::pending::Incoming;
use crate::transport::IndexReader;
use crate::transport::IndexWriter;
use crate::transport::read_message;
use crate::transport::write_message;

/// Default upper bound on a single framed message.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 16 * 1024 * 1024;

/// Receive-side limits.
#[derive(Debug, Clone)]
pub struct Config {
    /// Largest framed message accepted on any sub-channel.
    pub max_message_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self { max_message_len: DEFAULT_MAX_MESSAGE_LEN }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_message_len(mut self, max: usize) -> Self {
        self.max_message_len = max;
        self
    }
}

/// Writes `value` to `w`, then drains its deferred payloads and closes `w`.
///
/// Nothing is written if encoding fails.
///
/// # Errors
/// `RoutingFailed` if the value defers a payload onto `w` itself. Wrap such a
/// value in a tuple or option so it gets a sub-channel of its own.
pub async fn write_value<T: Encode>(w: &mut dyn IndexWriter, value: T) -> Result<()> {
    let mut enc = Encoder::new();
    let mut out = Outgoing::at(w.path().clone());
    value.encode(&mut enc, &mut out)?;
    if out.paths().any(|p| p == w.path()) {
        return Err(Error::RoutingFailed {
            path: w.path().clone(),
            reason: "deferred payload collides with the inline message".into(),
        });
    }

    debug!(path = %w.path(), len = enc.len(), deferred = out.len(), "write value");
    write_message(w, enc.as_bytes()).await?;
    w.flush().await?;
    drain(&*w, out).await?;
    w.close().await
}

/// Reads one value with the default [`Config`].
pub async fn read_value<T: Decode>(r: &mut dyn IndexReader) -> Result<(T, Incoming)> {
    read_value_with(r, &Config::default()).await
}

/// Reads the inline message of one value from `r`.
///
/// Returns the value together with its unresolved placeholders. Pass them to
/// [`crate::resolve_with`], usually on a separate task, since a placeholder such
/// as a stream completes only as its consumer makes progress.
pub async fn read_value_with<T: Decode>(
    r: &mut dyn IndexReader,
    config: &Config,
) -> Result<(T, Incoming)> {
    let bytes = read_message(r, config.max_message_len).await?;
    let mut dec = Decoder::new(&bytes);
    let mut inc = Incoming::at(r.path().clone());
    let value = T::decode(&mut dec, &mut inc)?;
    dec.finish()?;
    debug!(path = %r.path(), len = bytes.len(), pending = inc.len(), "read value");
    Ok((value, inc))
}
