//! # Wirepack
//!
//! A compact, schema-driven binary encoding for tagged values whose bulk may
//! travel out-of-band on indexed sub-channels.
//!
//! ## Philosophy
//!
//! - **Schema-driven**: The bytes carry no type tags. Both peers agree on the shape.
//! - **Small by default**: Discriminants and lengths are LEB128 varints, so the
//!   common case (a discriminant or length under 128) costs one byte.
//! - **Explicit deferral**: Values that cannot be inlined are collected into a
//!   [`Worklist`] addressed by [`IndexPath`], never written behind the caller's back.
//!
//! ## Format
//!
//! - **bool / u8 / s8**: `[Byte]`
//! - **u16..u64**: `[ULEB128]`, **s16..s64**: `[SLEB128]`
//! - **f32 / f64**: `[Little-Endian IEEE]`
//! - **string / bytes**: `[Len: ULEB128][Data: Len]`
//! - **list**: `[Len: ULEB128][Items]`
//! - **option**: `[0]` or `[1][Payload]`, **result**: `[0][Ok]` or `[1][Err]`
//! - **variant**: `[Discriminant: ULEB128][Payload?]`

pub mod varint;

mod decoder;
mod encoder;
mod path;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use path::Deferred;
pub use path::IndexPath;
pub use path::Worklist;


/// Ways in which bytes can be inconsistent with the schema they are decoded against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Malformed {
    /// No terminating varint byte within the integer's width, or the final byte overflows it.
    VarintOverflow { bits: u32 },
    /// A bool byte other than 0 or 1.
    InvalidBool(u8),
    /// An option or result tag other than 0 or 1.
    InvalidFlag(u8),
    /// String data is not valid UTF-8.
    InvalidUtf8,
    /// A char is not a Unicode scalar value.
    InvalidChar(u32),
    /// A tagged union discriminant outside the declared set of cases.
    UnknownDiscriminant { ty: &'static str, discriminant: u32 },
    /// A length prefix does not fit the platform's address space.
    LengthOverflow(u64),
    /// Bytes were left over after the value was fully decoded.
    TrailingBytes(usize),
}

impl std::fmt::Display for Malformed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Malformed::VarintOverflow { bits } => write!(f, "varint exceeds {} bits", bits),
            Malformed::InvalidBool(b) => write!(f, "invalid bool byte {:#04x}", b),
            Malformed::InvalidFlag(b) => write!(f, "invalid option/result tag {:#04x}", b),
            Malformed::InvalidUtf8 => write!(f, "string is not valid UTF-8"),
            Malformed::InvalidChar(c) => write!(f, "{:#x} is not a unicode scalar value", c),
            Malformed::UnknownDiscriminant { ty, discriminant } => {
                write!(f, "unknown discriminant {} for `{}`", discriminant, ty)
            }
            Malformed::LengthOverflow(n) => write!(f, "length {} does not fit in usize", n),
            Malformed::TrailingBytes(n) => write!(f, "{} trailing bytes after value", n),
        }
    }
}

/// Wirepack serialization and deserialization errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Buffer exhausted while reading.
    UnexpectedEnd,
    /// Bytes are inconsistent with the expected encoding.
    MalformedEncoding(Malformed),
    /// Blob or list length exceeds `u32::MAX`.
    TooLarge(usize),
    /// A deferred item was registered at a path overlapping an existing one.
    PathConflict(IndexPath),
}

impl Error {
    /// Returns true for decode-time schema violations.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::MalformedEncoding(_))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnexpectedEnd => write!(f, "unexpected end of input"),
            Error::MalformedEncoding(m) => write!(f, "malformed encoding: {}", m),
            Error::TooLarge(n) => write!(f, "length {} exceeds u32::MAX", n),
            Error::PathConflict(p) => write!(f, "deferred path {} overlaps an existing one", p),
        }
    }
}

impl std::error::Error for Error {}

impl From<Malformed> for Error {
    fn from(m: Malformed) -> Self {
        Error::MalformedEncoding(m)
    }
}

/// Specialized `Result` for Wirepack operations.
pub type Result<T> = std::result::Result<T, Error>;
