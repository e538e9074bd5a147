//! # Error Definitions
//!
//! Failures of a single call: encoding, routing, and the carrier underneath.

use wirepack::IndexPath;
use wirepack::Malformed;

/// Operational failures within the call machinery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The wirepack codec failed (bad bytes, oversized blobs, overlapping paths).
    Pack(wirepack::Error),
    /// The carrier could not provide the sub-channel at `path`.
    RoutingFailed { path: IndexPath, reason: String },
    /// The carrier failed while moving bytes.
    Transport(String),
    /// A sub-channel completed before a full message was read from it.
    UnexpectedEof(IndexPath),
    /// A length-framed message announced more bytes than the configured limit.
    MessageTooLarge { len: u64, max: usize },
    /// A placeholder was dropped by its producer without ever being resolved.
    Abandoned(IndexPath),
}

impl Error {
    /// Returns true for decode-time schema violations.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::Pack(e) if e.is_malformed())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pack(e) => write!(f, "Wirepack error: {}", e),
            Self::RoutingFailed { path, reason } => {
                write!(f, "Routing to {} failed: {}", path, reason)
            }
            Self::Transport(msg) => write!(f, "Transport error: {}", msg),
            Self::UnexpectedEof(path) => write!(f, "Sub-channel {} ended mid-message", path),
            Self::MessageTooLarge { len, max } => {
                write!(f, "Message of {} bytes exceeds limit of {}", len, max)
            }
            Self::Abandoned(path) => write!(f, "Value at {} was never delivered", path),
        }
    }
}

impl std::error::Error for Error {}

impl From<wirepack::Error> for Error {
    fn from(e: wirepack::Error) -> Self {
        Self::Pack(e)
    }
}

impl From<Malformed> for Error {
    fn from(m: Malformed) -> Self {
        Self::Pack(m.into())
    }
}

/// A specialized Result type for call operations.
pub type Result<T> = std::result::Result<T, Error>;
