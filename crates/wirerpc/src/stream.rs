//! # Typed Streams
//!
//! A [`BoxStream`] of values travels on its own sub-channel as framed batches.
//! Each batch is one message `[Len: ULEB128][Items]`, and an empty batch ends
//! the stream. Element `i` of the whole stream scopes its nested payloads under
//! `stream_path/i`.
//!
//! ## Invariants
//! - Elements reach the receiver in the order they were produced.
//! - Nested payloads of the elements are drained after the stream's own
//!   sub-channel is closed.
//! - A sub-channel that ends without the empty batch ends the decoded stream
//!   early. The cause is the error returned by [`crate::resolve`].

use futures::StreamExt;
use futures::channel::mpsc;
use futures::stream::BoxStream;
use tracing::debug;
use tracing::trace;
use wirepack::Decoder;
use wirepack::Encoder;

use crate::Result;
use crate::call::Config;
use crate::deferred::DeferredWrite;
use crate::deferred::Outgoing;
use crate::pending::DeferredRead;
use crate::pending::Incoming;
use crate::transport::IndexReader;
use crate::transport::IndexWriter;
use crate::transport::read_message;
use crate::transport::write_message;
use crate::value::Decode;
use crate::value::Encode;

/// Most elements sent in one batch.
pub const MAX_BATCH: usize = 256;

impl<T: Encode + 'static> Encode for BoxStream<'static, T> {
    fn encode(self, _: &mut Encoder, out: &mut Outgoing) -> Result<()> {
        trace!(path = %out.base(), "defer stream");
        Ok(out.defer(Box::new(WriteStream(self)))?)
    }
}

impl<T: Decode + 'static> Decode for BoxStream<'static, T> {
    fn decode(_: &mut Decoder<'_>, inc: &mut Incoming) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded();
        inc.defer(Box::new(ReadStream { tx }))?;
        Ok(rx.boxed())
    }
}

struct WriteStream<T>(BoxStream<'static, T>);

#[async_trait::async_trait]
impl<T: Encode + 'static> DeferredWrite for WriteStream<T> {
    async fn write(self: Box<Self>, w: &mut dyn IndexWriter, nested: &mut Outgoing) -> Result<()> {
        let WriteStream(stream) = *self;
        let mut batches = stream.ready_chunks(MAX_BATCH);
        let mut sent = 0;
        while let Some(batch) = batches.next().await {
            let len = batch.len();
            let mut enc = Encoder::new();
            enc.list_len(len)?;
            for (j, item) in batch.into_iter().enumerate() {
                nested.with_index(sent + j, |nested| item.encode(&mut enc, nested))?;
            }
            write_message(w, enc.as_bytes()).await?;
            w.flush().await?;
            sent += len;
        }
        write_message(w, &[0x00]).await?;
        debug!(path = %w.path(), items = sent, "stream sent");
        Ok(())
    }
}

struct ReadStream<T> {
    tx: mpsc::UnboundedSender<T>,
}

#[async_trait::async_trait]
impl<T: Decode + 'static> DeferredRead for ReadStream<T> {
    async fn read(
        self: Box<Self>,
        r: &mut dyn IndexReader,
        nested: &mut Incoming,
        config: &Config,
    ) -> Result<()> {
        let mut received = 0;
        loop {
            let bytes = read_message(r, config.max_message_len).await?;
            let mut dec = Decoder::new(&bytes);
            let len = dec.list_len()?;
            for j in 0..len {
                let item = nested.with_index(received + j, |nested| T::decode(&mut dec, nested))?;
                // Once the receiver is gone the remaining elements are discarded.
                let _ = self.tx.unbounded_send(item);
            }
            dec.finish()?;
            if len == 0 {
                break;
            }
            received += len;
        }
        debug!(path = %r.path(), items = received, "stream received");
        Ok(())
    }
}
