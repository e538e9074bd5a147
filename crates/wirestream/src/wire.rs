//! # Streams on the Wire
//!
//! A stream travels on its own sub-channel as a sequence of framed [`Chunk`]s:
//! any number of `Data` chunks, then exactly one `End` or `Failed`. A `Failed`
//! chunk's error description is deferred to `stream_path/0`.
//!
//! Decoding a stream yields a [`PipeReader`] at once. Resolving the placeholder
//! pumps the received chunks into the matching [`PipeWriter`], so the consumer
//! reads while the transfer is still in flight. A sub-channel that fails, or
//! ends without a terminal chunk, reaches the consumer as `LastOperationFailed`.

use async_trait::async_trait;
use tracing::debug;
use tracing::trace;
use wirepack::Decoder;
use wirepack::Encoder;
use wirerpc::Config;
use wirerpc::Decode;
use wirerpc::DeferredRead;
use wirerpc::DeferredWrite;
use wirerpc::Encode;
use wirerpc::Incoming;
use wirerpc::IndexReader;
use wirerpc::IndexWriter;
use wirerpc::Outgoing;
use wirerpc::transport::read_message;
use wirerpc::transport::write_message;

use crate::blocking::InputStreamExt;
use crate::blocking::OutputStreamExt;
use crate::error::IoError;
use crate::error::StreamError;
use crate::pipe::PipeConfig;
use crate::pipe::PipeWriter;
use crate::pipe::pipe;
use crate::traits::InputStream;

/// Default size of a `Data` chunk.
pub const DEFAULT_CHUNK_SIZE: u64 = 4096;

wirerpc::variant! {
    /// One framed message on a stream's sub-channel.
    #[derive(Debug)]
    pub enum Chunk: ChunkCase as "chunk" {
        Data(Vec<u8>) = 0 => "data" { get_data, set_data },
        End = 1 => "end" { is_end, set_end },
        Failed(IoError) = 2 => "failed" { get_failed, set_failed },
    }
}

/// Sends an input stream as a deferred payload.
pub struct SendStream {
    stream: Box<dyn InputStream>,
    chunk_size: u64,
}

impl SendStream {
    pub fn new(stream: Box<dyn InputStream>) -> Self {
        Self { stream, chunk_size: DEFAULT_CHUNK_SIZE }
    }

    /// Largest `Data` chunk to send (at least 1 byte).
    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

impl std::fmt::Debug for SendStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendStream").field("chunk_size", &self.chunk_size).finish_non_exhaustive()
    }
}

impl Encode for SendStream {
    fn encode(self, _: &mut Encoder, out: &mut Outgoing) -> wirerpc::Result<()> {
        trace!(path = %out.base(), "defer stream");
        Ok(out.defer(Box::new(self))?)
    }
}

impl Encode for Box<dyn InputStream> {
    fn encode(self, enc: &mut Encoder, out: &mut Outgoing) -> wirerpc::Result<()> {
        SendStream::new(self).encode(enc, out)
    }
}

#[async_trait]
impl DeferredWrite for SendStream {
    async fn write(self: Box<Self>, w: &mut dyn IndexWriter, nested: &mut Outgoing) -> wirerpc::Result<()> {
        let SendStream { mut stream, chunk_size } = *self;
        let mut sent = 0u64;
        loop {
            let chunk = match stream.blocking_read(chunk_size).await {
                Ok(bytes) => {
                    sent += bytes.len() as u64;
                    Chunk::Data(bytes)
                }
                Err(StreamError::Closed) => Chunk::End,
                Err(StreamError::LastOperationFailed(error)) => Chunk::Failed(error),
            };
            let last = chunk.get_data().is_none();

            let mut enc = Encoder::new();
            chunk.encode(&mut enc, nested)?;
            write_message(w, enc.as_bytes()).await?;
            w.flush().await?;

            if last {
                debug!(path = %w.path(), sent, "stream sent");
                return Ok(());
            }
        }
    }
}

impl Decode for Box<dyn InputStream> {
    fn decode(_: &mut Decoder<'_>, inc: &mut Incoming) -> wirerpc::Result<Self> {
        let (writer, reader) = pipe(PipeConfig::default());
        trace!(path = %inc.base(), "stream placeholder");
        inc.defer(Box::new(RecvStream { writer }))?;
        Ok(Box::new(reader))
    }
}

struct RecvStream {
    writer: PipeWriter,
}

/// How a received stream ended.
enum Ending {
    End,
    Failed(IoError),
    ReceiverGone,
}

impl RecvStream {
    /// Feeds every `Data` chunk into the pipe until a terminal chunk arrives.
    async fn pump(
        &mut self,
        r: &mut dyn IndexReader,
        nested: &mut Incoming,
        config: &Config,
        received: &mut u64,
    ) -> wirerpc::Result<Ending> {
        loop {
            let bytes = read_message(r, config.max_message_len).await?;
            let mut dec = Decoder::new(&bytes);
            let chunk = Chunk::decode(&mut dec, nested)?;
            dec.finish()?;

            match chunk {
                Chunk::Data(data) => {
                    *received += data.len() as u64;
                    if self.writer.blocking_write_and_flush(&data).await.is_err() {
                        return Ok(Ending::ReceiverGone);
                    }
                }
                Chunk::End => return Ok(Ending::End),
                Chunk::Failed(error) => return Ok(Ending::Failed(error)),
            }
        }
    }
}

#[async_trait]
impl DeferredRead for RecvStream {
    async fn read(
        mut self: Box<Self>,
        r: &mut dyn IndexReader,
        nested: &mut Incoming,
        config: &Config,
    ) -> wirerpc::Result<()> {
        let mut received = 0u64;
        let ending = self.pump(r, nested, config, &mut received).await;
        let RecvStream { writer } = *self;
        match ending {
            Ok(Ending::End) => {
                debug!(path = %r.path(), received, "stream received");
                Ok(())
            }
            Ok(Ending::Failed(error)) => {
                debug!(path = %r.path(), received, "stream failed");
                writer.abort(error);
                Ok(())
            }
            Ok(Ending::ReceiverGone) => {
                // Nobody reads the stream any more; the rest is dropped.
                debug!(path = %r.path(), received, "stream receiver gone");
                Ok(())
            }
            Err(e) => {
                debug!(path = %r.path(), received, error = %e, "stream cut off");
                writer.abort(IoError::new(e.to_string()));
                Err(e)
            }
        }
    }
}
