//! # Variants
//!
//! A closed tagged union: exactly one case is active, selected by a discriminant.
//! On the wire a variant is `[Discriminant: ULEB128]` followed by the active
//! case's payload, encoded under worklist index 0. Cases without a payload
//! contribute only the discriminant.
//!
//! Declare one with [`variant!`](crate::variant!):
//!
//! ```
//! wirerpc::variant! {
//!     #[derive(Debug, PartialEq)]
//!     pub enum Shape: ShapeCase as "shape" {
//!         Circle(u32) = 0 => "circle" { get_circle, set_circle },
//!         Empty = 1 => "empty" { is_empty, set_empty },
//!     }
//! }
//!
//! use wirerpc::Variant;
//!
//! let mut shape = Shape::Empty;
//! shape.set_circle(3);
//! assert_eq!(shape.get_circle(), Some(&3));
//! assert!(!shape.is_empty());
//! assert_eq!(shape.display_name(), "circle");
//! ```

use tracing::trace;
use wirepack::Encoder;

use crate::Decode;
use crate::Encode;
use crate::Result;

/// The capability every declared variant provides.
pub trait Variant: Encode + Decode {
    /// The case selector, convertible to its discriminant.
    type Case: Copy + Into<u32>;

    /// Type name used in diagnostics.
    const NAME: &'static str;

    /// Every declared `(discriminant, display name)` pair.
    const CASES: &'static [(u32, &'static str)];

    /// The active case.
    fn case(&self) -> Self::Case;

    fn discriminant(&self) -> u32 {
        self.case().into()
    }

    /// Human-readable name of the active case.
    fn display_name(&self) -> &'static str {
        case_name::<Self>(self.discriminant())
    }
}

/// Looks up the display name of `discriminant` in `V::CASES`.
///
/// # Panics
/// If `discriminant` is not declared. Decoding never produces such a value, so
/// reaching this is a broken invariant rather than bad input.
pub fn case_name<V: Variant + ?Sized>(discriminant: u32) -> &'static str {
    match V::CASES.iter().find(|(d, _)| *d == discriminant) {
        Some((_, name)) => name,
        None => panic!("invalid variant: `{}` has no case {}", V::NAME, discriminant),
    }
}

#[doc(hidden)]
pub fn write_discriminant(enc: &mut Encoder, ty: &'static str, discriminant: u32) -> Result<()> {
    trace!(ty, discriminant, "discriminant");
    Ok(enc.discriminant(discriminant)?)
}

/// Declares a closed tagged union.
///
/// Generates the enum, a `repr(u32)` case enum with `TryFrom<u32>`, one getter
/// and one setter per case, and the [`Variant`], [`Encode`] and [`Decode`]
/// impls. Getters of payload-carrying cases return `Option<&Payload>`, those of
/// payload-less cases return `bool`.
#[macro_export]
macro_rules! variant {
    (@ident $i:ident, $t:ty) => { $i };

    (@encode $v:ident, $enc:ident, $out:ident, $t:ty) => {
        $out.with_index(0, |$out| <$t as $crate::Encode>::encode($v, $enc, $out))
    };

    (@decode $dec:ident, $inc:ident, $t:ty) => {
        $inc.with_index(0, |$inc| <$t as $crate::Decode>::decode($dec, $inc))
    };

    (@accessors $name:ident, $case:ident, $get:ident, $set:ident, $t:ty) => {
        #[allow(unreachable_patterns)]
        pub fn $get(&self) -> ::core::option::Option<&$t> {
            match self {
                $name::$case(v) => ::core::option::Option::Some(v),
                _ => ::core::option::Option::None,
            }
        }

        pub fn $set(&mut self, v: $t) -> &mut Self {
            *self = $name::$case(v);
            self
        }
    };

    (@accessors $name:ident, $case:ident, $get:ident, $set:ident) => {
        pub fn $get(&self) -> bool {
            ::core::matches!(self, $name::$case)
        }

        pub fn $set(&mut self) -> &mut Self {
            *self = $name::$case;
            self
        }
    };

    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $case_ty:ident as $wit:literal {
            $(
                $(#[$case_meta:meta])*
                $case:ident $( ( $payload:ty ) )? = $disc:literal => $display:literal { $get:ident, $set:ident }
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $( $(#[$case_meta])* $case $( ($payload) )? ),+
        }

        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        $vis enum $case_ty {
            $( $case = $disc ),+
        }

        impl ::core::convert::From<$case_ty> for u32 {
            fn from(case: $case_ty) -> u32 {
                case as u32
            }
        }

        impl ::core::convert::TryFrom<u32> for $case_ty {
            type Error = $crate::Error;

            fn try_from(discriminant: u32) -> $crate::Result<Self> {
                $( if discriminant == $disc { return ::core::result::Result::Ok($case_ty::$case); } )+
                ::core::result::Result::Err($crate::Error::from(
                    $crate::wirepack::Malformed::UnknownDiscriminant { ty: $wit, discriminant },
                ))
            }
        }

        impl $name {
            $( $crate::variant!(@accessors $name, $case, $get, $set $(, $payload)?); )+
        }

        impl $crate::Variant for $name {
            type Case = $case_ty;

            const NAME: &'static str = $wit;

            const CASES: &'static [(u32, &'static str)] = &[ $( ($disc, $display) ),+ ];

            fn case(&self) -> $case_ty {
                match self {
                    $( $name::$case { .. } => $case_ty::$case ),+
                }
            }
        }

        impl $crate::Encode for $name {
            #[allow(unused_variables)]
            fn encode(
                self,
                enc: &mut $crate::wirepack::Encoder,
                out: &mut $crate::Outgoing,
            ) -> $crate::Result<()> {
                let discriminant = $crate::Variant::discriminant(&self);
                $crate::variant::write_discriminant(enc, $wit, discriminant)?;
                match self {
                    $(
                        $name::$case $( ($crate::variant!(@ident payload, $payload)) )? => {
                            $( ($crate::variant!(@encode payload, enc, out, $payload))?; )?
                        }
                    )+
                }
                ::core::result::Result::Ok(())
            }
        }

        impl $crate::Decode for $name {
            #[allow(unused_variables)]
            fn decode(
                dec: &mut $crate::wirepack::Decoder<'_>,
                inc: &mut $crate::Incoming,
            ) -> $crate::Result<Self> {
                let discriminant = dec.discriminant()?;
                let case = <$case_ty as ::core::convert::TryFrom<u32>>::try_from(discriminant)?;
                ::core::result::Result::Ok(match case {
                    $(
                        $case_ty::$case => $name::$case $( ($crate::variant!(@decode dec, inc, $payload)?) )?,
                    )+
                })
            }
        }
    };
}
