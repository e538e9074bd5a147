//! # Wirestream
//!
//! Byte stream resources with non-blocking primitives, readiness pollables, and
//! the blocking combinators built on them. Input streams can be sent as
//! deferred payloads of a [`wirerpc`] call.
//!
//! ## Philosophy
//!
//! - **Never wait by accident**: [`InputStream`] and [`OutputStream`] operations
//!   return at once, reporting zero progress rather than blocking. Waiting is an
//!   explicit [`Pollable::block`] or one of the `blocking_*` combinators.
//! - **Errors are values**: [`StreamError`] is returned, never raised. Misuse of
//!   the contract (writing past a permit, outliving a stream with a pollable)
//!   panics instead.
//! - **One caller per stream**: Streams take `&mut self` and are not shared.

pub mod blocking;
pub mod buffer;
pub mod error;
pub mod pipe;
pub mod pollable;
pub mod traits;
pub mod wire;

pub use blocking::InputStreamExt;
pub use blocking::OutputStreamExt;
pub use buffer::BufferInputStream;
pub use buffer::BufferOutputStream;
pub use error::IoError;
pub use error::StreamError;
pub use error::StreamErrorCase;
pub use error::StreamResult;
pub use pipe::PipeConfig;
pub use pipe::PipeReader;
pub use pipe::PipeWriter;
pub use pipe::pipe;
pub use pollable::Pollable;
pub use pollable::Readiness;
pub use pollable::Subscriptions;
pub use pollable::poll;
pub use traits::InputStream;
pub use traits::OutputStream;
pub use wire::Chunk;
pub use wire::SendStream;
