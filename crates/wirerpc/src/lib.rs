//! # Wirerpc
//!
//! The async call layer over [`wirepack`]: typed values whose bulk travels on
//! indexed sub-channels of a generic byte carrier.
//!
//! ## Philosophy
//!
//! - **Inline first**: A value's inline message is flushed before any of its
//!   deferred payloads is routed, so out-of-band data is always causally
//!   downstream of the message that references it.
//! - **Explicit work**: Deferred payloads are items in a [`wirepack::Worklist`],
//!   drained by [`drain`] and resolved by [`resolve`]. Nothing runs behind the
//!   caller's back.
//! - **Carrier-agnostic**: Anything implementing [`IndexWriter`] and
//!   [`IndexReader`] can carry a call. [`mem`] provides an in-process one.
//!
//! Besides scalars and composites, [`stream`] sends a boxed `futures` stream of
//! values as batches on its own sub-channel.

pub mod call;
pub mod deferred;
pub mod mem;
pub mod pending;
pub mod stream;
pub mod transport;
pub mod value;
pub mod variant;

mod error;

pub use wirepack;

pub use call::Config;
pub use call::read_value;
pub use call::read_value_with;
pub use call::write_value;
pub use deferred::DeferredWrite;
pub use deferred::Outgoing;
pub use deferred::drain;
pub use error::Error;
pub use error::Result;
pub use pending::DeferredRead;
pub use pending::Incoming;
pub use pending::resolve;
pub use pending::resolve_with;
pub use transport::IndexReader;
pub use transport::IndexWriter;
pub use transport::route;
pub use transport::route_path;
pub use value::Decode;
pub use value::Encode;
pub use value::OutOfBand;
pub use variant::Variant;
pub use variant::case_name;

#[cfg(test)]
mod tests;
