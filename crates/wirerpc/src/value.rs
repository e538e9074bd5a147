//! # Values
//!
//! [`Encode`] writes a value's inline part and registers whatever must travel
//! out-of-band. [`Decode`] mirrors it, registering a placeholder for every
//! deferred position.
//!
//! Nested payload positions scope the worklist base: the payload of an `option`
//! or `result` lives at index 0, a tuple field at its position, and a list
//! element at its position in the list.

use std::fmt;

use tokio::sync::oneshot;
use tracing::trace;
use wirepack::Decoder;
use wirepack::Encoder;
use wirepack::IndexPath;

use crate::Error;
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

/// A value that can be written to the wire.
pub trait Encode: Send {
    /// Appends the inline encoding to `enc`, deferring out-of-band parts into `out`.
    fn encode(self, enc: &mut Encoder, out: &mut Outgoing) -> Result<()>;
}

/// A value that can be read from the wire.
pub trait Decode: Sized + Send {
    /// Reads the inline encoding. Out-of-band parts become placeholders in `inc`.
    fn decode(dec: &mut Decoder<'_>, inc: &mut Incoming) -> Result<Self>;
}

macro_rules! scalar {
    ($($ty:ty => $method:ident),* $(,)?) => {$(
        impl Encode for $ty {
            fn encode(self, enc: &mut Encoder, _: &mut Outgoing) -> Result<()> {
                Ok(enc.$method(self)?)
            }
        }

        impl Decode for $ty {
            fn decode(dec: &mut Decoder<'_>, _: &mut Incoming) -> Result<Self> {
                Ok(dec.$method()?)
            }
        }
    )*};
}

scalar! {
    bool => bool,
    u8 => u8,
    i8 => s8,
    u16 => u16,
    i16 => s16,
    u32 => u32,
    i32 => s32,
    u64 => u64,
    i64 => s64,
    f32 => f32,
    f64 => f64,
    char => char,
}

impl Encode for () {
    fn encode(self, _: &mut Encoder, _: &mut Outgoing) -> Result<()> {
        Ok(())
    }
}

impl Decode for () {
    fn decode(_: &mut Decoder<'_>, _: &mut Incoming) -> Result<Self> {
        Ok(())
    }
}

impl Encode for String {
    fn encode(self, enc: &mut Encoder, _: &mut Outgoing) -> Result<()> {
        Ok(enc.str(&self)?)
    }
}

impl Decode for String {
    fn decode(dec: &mut Decoder<'_>, _: &mut Incoming) -> Result<Self> {
        Ok(dec.str()?.to_owned())
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(self, enc: &mut Encoder, out: &mut Outgoing) -> Result<()> {
        enc.list_len(self.len())?;
        for (i, item) in self.into_iter().enumerate() {
            out.with_index(i, |out| item.encode(enc, out))?;
        }
        Ok(())
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(dec: &mut Decoder<'_>, inc: &mut Incoming) -> Result<Self> {
        let len = dec.list_len()?;
        // Every element takes at least one byte, except zero-sized ones.
        let mut items = Vec::with_capacity(len.min(dec.remaining()));
        for i in 0..len {
            items.push(inc.with_index(i, |inc| T::decode(dec, inc))?);
        }
        Ok(items)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(self, enc: &mut Encoder, out: &mut Outgoing) -> Result<()> {
        match self {
            None => Ok(enc.option_none()?),
            Some(v) => {
                enc.option_some()?;
                out.with_index(0, |out| v.encode(enc, out))
            }
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(dec: &mut Decoder<'_>, inc: &mut Incoming) -> Result<Self> {
        if !dec.option()? {
            return Ok(None);
        }
        inc.with_index(0, |inc| T::decode(dec, inc)).map(Some)
    }
}

impl<T: Encode, E: Encode> Encode for std::result::Result<T, E> {
    fn encode(self, enc: &mut Encoder, out: &mut Outgoing) -> Result<()> {
        match self {
            Ok(v) => {
                enc.result_ok()?;
                out.with_index(0, |out| v.encode(enc, out))
            }
            Err(e) => {
                enc.result_err()?;
                out.with_index(0, |out| e.encode(enc, out))
            }
        }
    }
}

impl<T: Decode, E: Decode> Decode for std::result::Result<T, E> {
    fn decode(dec: &mut Decoder<'_>, inc: &mut Incoming) -> Result<Self> {
        match dec.result()? {
            Ok(()) => inc.with_index(0, |inc| T::decode(dec, inc)).map(Ok),
            Err(()) => inc.with_index(0, |inc| E::decode(dec, inc)).map(Err),
        }
    }
}

macro_rules! tuple {
    ($($ty:ident $var:ident $idx:tt),+) => {
        impl<$($ty: Encode),+> Encode for ($($ty,)+) {
            fn encode(self, enc: &mut Encoder, out: &mut Outgoing) -> Result<()> {
                let ($($var,)+) = self;
                $( out.with_index($idx, |out| $var.encode(enc, out))?; )+
                Ok(())
            }
        }

        impl<$($ty: Decode),+> Decode for ($($ty,)+) {
            fn decode(dec: &mut Decoder<'_>, inc: &mut Incoming) -> Result<Self> {
                Ok(($( inc.with_index($idx, |inc| <$ty as Decode>::decode(dec, inc))?, )+))
            }
        }
    };
}

tuple!(A a 0);
tuple!(A a 0, B b 1);
tuple!(A a 0, B b 1, C c 2);
tuple!(A a 0, B b 1, C c 2, D d 3);

// ============================================================================
//  OUT-OF-BAND VALUES
// ============================================================================

/// A value that always travels on its own indexed sub-channel.
///
/// Contributes nothing to the inline message. The payload is one framed message
/// on the sub-channel, and anything the payload defers in turn lives under
/// `path/0`.
///
/// A decoded `OutOfBand` is a placeholder until [`crate::resolve`] reads its
/// sub-channel. Encoding a placeholder forwards the value once it arrives.
pub struct OutOfBand<T> {
    inner: Inner<T>,
}

enum Inner<T> {
    Ready(T),
    Pending { path: IndexPath, rx: oneshot::Receiver<T> },
}

impl<T> OutOfBand<T> {
    pub fn new(value: T) -> Self {
        Self { inner: Inner::Ready(value) }
    }

    /// The sub-channel a placeholder is waiting on, or `None` once available.
    pub fn path(&self) -> Option<&IndexPath> {
        match &self.inner {
            Inner::Ready(_) => None,
            Inner::Pending { path, .. } => Some(path),
        }
    }

    /// Returns the value if it is already available.
    pub fn try_get(&self) -> Option<&T> {
        match &self.inner {
            Inner::Ready(v) => Some(v),
            Inner::Pending { .. } => None,
        }
    }

    /// Waits for the value to arrive.
    ///
    /// # Errors
    /// `Abandoned` if the sub-channel failed or was never resolved.
    pub async fn get(&mut self) -> Result<&T> {
        if let Inner::Pending { path, rx } = &mut self.inner {
            let value = rx.await.map_err(|_| Error::Abandoned(path.clone()))?;
            self.inner = Inner::Ready(value);
        }
        match &self.inner {
            Inner::Ready(v) => Ok(v),
            Inner::Pending { path, .. } => Err(Error::Abandoned(path.clone())),
        }
    }

    /// Waits for the value and takes it.
    pub async fn into_inner(self) -> Result<T> {
        match self.inner {
            Inner::Ready(v) => Ok(v),
            Inner::Pending { path, rx } => rx.await.map_err(|_| Error::Abandoned(path)),
        }
    }
}

impl<T> From<T> for OutOfBand<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for OutOfBand<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Inner::Ready(v) => f.debug_tuple("OutOfBand").field(v).finish(),
            Inner::Pending { path, .. } => write!(f, "OutOfBand(<pending at {}>)", path),
        }
    }
}

impl<T: Encode + 'static> Encode for OutOfBand<T> {
    fn encode(self, _: &mut Encoder, out: &mut Outgoing) -> Result<()> {
        trace!(path = %out.base(), "defer");
        Ok(out.defer(Box::new(WriteOutOfBand(self)))?)
    }
}

impl<T: Decode + 'static> Decode for OutOfBand<T> {
    fn decode(_: &mut Decoder<'_>, inc: &mut Incoming) -> Result<Self> {
        let (tx, rx) = oneshot::channel();
        let path = inc.base().clone();
        inc.defer(Box::new(ReadOutOfBand { tx }))?;
        Ok(Self { inner: Inner::Pending { path, rx } })
    }
}

struct WriteOutOfBand<T>(OutOfBand<T>);

#[async_trait::async_trait]
impl<T: Encode + 'static> DeferredWrite for WriteOutOfBand<T> {
    async fn write(self: Box<Self>, w: &mut dyn IndexWriter, nested: &mut Outgoing) -> Result<()> {
        let value = self.0.into_inner().await?;
        let mut enc = Encoder::new();
        nested.with_index(0, |nested| value.encode(&mut enc, nested))?;
        write_message(w, enc.as_bytes()).await
    }
}

struct ReadOutOfBand<T> {
    tx: oneshot::Sender<T>,
}

#[async_trait::async_trait]
impl<T: Decode + 'static> DeferredRead for ReadOutOfBand<T> {
    async fn read(
        self: Box<Self>,
        r: &mut dyn IndexReader,
        nested: &mut Incoming,
        config: &Config,
    ) -> Result<()> {
        let bytes = read_message(r, config.max_message_len).await?;
        let mut dec = Decoder::new(&bytes);
        let value = nested.with_index(0, |nested| T::decode(&mut dec, nested))?;
        dec.finish()?;
        if self.tx.send(value).is_err() {
            trace!(path = %r.path(), "placeholder dropped before its value arrived");
        }
        Ok(())
    }
}
