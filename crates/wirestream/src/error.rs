//! # Stream Errors
//!
//! Stream failures are ordinary values. `LastOperationFailed` is transient and
//! the caller may retry; `Closed` is terminal.

use std::fmt;

use wirepack::Decoder;
use wirepack::Encoder;
use wirerpc::Decode;
use wirerpc::Encode;
use wirerpc::Incoming;
use wirerpc::OutOfBand;
use wirerpc::Outgoing;

/// An opaque error resource. Its description travels on its own sub-channel.
pub struct IoError {
    message: OutOfBand<String>,
}

impl IoError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: OutOfBand::new(message.into()) }
    }

    /// The description, if it has already arrived.
    pub fn message(&self) -> Option<&str> {
        self.message.try_get().map(String::as_str)
    }

    /// Waits for the description.
    ///
    /// An error whose description never arrives reports why instead.
    pub async fn to_debug_string(&mut self) -> String {
        match self.message.get().await {
            Ok(message) => message.clone(),
            Err(e) => e.to_string(),
        }
    }
}

impl fmt::Debug for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(message) => f.debug_tuple("IoError").field(&message).finish(),
            None => f.write_str("IoError(<pending>)"),
        }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message().unwrap_or("<pending>"))
    }
}

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl Encode for IoError {
    fn encode(self, enc: &mut Encoder, out: &mut Outgoing) -> wirerpc::Result<()> {
        self.message.encode(enc, out)
    }
}

impl Decode for IoError {
    fn decode(dec: &mut Decoder<'_>, inc: &mut Incoming) -> wirerpc::Result<Self> {
        Ok(Self { message: OutOfBand::decode(dec, inc)? })
    }
}

wirerpc::variant! {
    /// Why a stream operation could not complete.
    #[derive(Debug)]
    pub enum StreamError: StreamErrorCase as "stream-error" {
        /// The last operation failed. Later operations may still succeed.
        LastOperationFailed(IoError) = 0 => "last-operation-failed" {
            get_last_operation_failed, set_last_operation_failed
        },
        /// The stream is closed. Every later operation reports the same.
        Closed = 1 => "closed" { is_closed, set_closed },
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LastOperationFailed(e) => write!(f, "last operation failed: {}", e),
            Self::Closed => write!(f, "stream closed"),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<IoError> for StreamError {
    fn from(e: IoError) -> Self {
        Self::LastOperationFailed(e)
    }
}

/// A specialized Result type for stream operations.
pub type StreamResult<T> = std::result::Result<T, StreamError>;
