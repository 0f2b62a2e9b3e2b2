//! The compact variable-length encoding of unsigned integers.
//!
//! The two low bits of the first byte select one of four modes:
//!
//! | mode | range                     | layout                                    |
//! |------|---------------------------|-------------------------------------------|
//! | `00` | `0..=0x3F`                | 1 byte, `value << 2`                      |
//! | `01` | `0x40..=0x3FFF`           | 2 bytes LE, `value << 2 \| 0b01`          |
//! | `10` | `0x4000..=0x3FFF_FFFF`    | 4 bytes LE, `value << 2 \| 0b10`          |
//! | `11` | `0x4000_0000..=u64::MAX`  | `0b11 \| (N - 4) << 2`, then N LE bytes   |
//!
//! The codec only talks to a [`Serializer`] / [`Deserializer`], so it works
//! with any binding. Decoding rejects values that do not fit the requested
//! width and, under [`CompactPolicy::Strict`], encodings that are longer
//! than necessary.

use derive_more::Display;

use crate::{
    de::{Deserialize, Deserializer, Error as _},
    ser::{Serialize, Serializer},
};

const MODE_0_MAX: u64 = 0x3F;
const MODE_1_MAX: u64 = 0x3FFF;
const MODE_2_MAX: u64 = 0x3FFF_FFFF;

/// The unsigned width a compact integer is decoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum CompactWidth {
    /// `u8`
    #[display(fmt = "u8")]
    U8,

    /// `u16`
    #[display(fmt = "u16")]
    U16,

    /// `u32`
    #[display(fmt = "u32")]
    U32,

    /// `u64`
    #[display(fmt = "u64")]
    U64,
}

/// Whether the decoder rejects compact integers that use a longer mode
/// than their value needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompactPolicy {
    /// Reject non-minimal encodings.
    #[default]
    Strict,

    /// Accept non-minimal encodings. Values that do not fit the requested
    /// width are still rejected.
    Lenient,
}

mod sealed {
    pub trait Sealed {}
}

/// An unsigned integer type that can be wrapped in [`Compact`].
///
/// Implemented for `u8`, `u16`, `u32` and `u64`.
pub trait CompactInt: Copy + Into<u64> + sealed::Sealed {
    /// The width tag reported in decode errors.
    const WIDTH: CompactWidth;

    /// Narrows a decoded value, returning `None` if it does not fit.
    fn from_u64(value: u64) -> Option<Self>;
}

macro_rules! impl_compact_int {
    ($($ty:ty => $width:ident),*) => {
        $(
            impl sealed::Sealed for $ty {}

            impl CompactInt for $ty {
                const WIDTH: CompactWidth = CompactWidth::$width;

                fn from_u64(value: u64) -> Option<Self> {
                    Self::try_from(value).ok()
                }
            }
        )*
    };
}

impl_compact_int! {
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64
}

/// An unsigned integer serialized with the compact encoding.
///
/// ```
/// use scalec_serialize::compact::Compact;
///
/// assert_eq!(Compact(63u8).compact_len(), 1);
/// assert_eq!(Compact(16384u32).compact_len(), 4);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
pub struct Compact<T>(pub T);

impl<T: CompactInt> Compact<T> {
    /// Wraps `value`.
    #[must_use]
    pub const fn new(value: T) -> Self { Self(value) }

    /// Returns the wrapped value.
    #[must_use]
    pub const fn get(self) -> T { self.0 }

    /// The number of bytes the encoded form occupies.
    #[must_use]
    pub fn compact_len(self) -> usize { compact_len(self.0.into()) }
}

impl<T: CompactInt> From<T> for Compact<T> {
    fn from(value: T) -> Self { Self(value) }
}

/// The number of bytes the compact encoding of `value` occupies.
#[must_use]
pub const fn compact_len(value: u64) -> usize {
    if value <= MODE_0_MAX {
        1
    } else if value <= MODE_1_MAX {
        2
    } else if value <= MODE_2_MAX {
        4
    } else {
        1 + significant_bytes(value)
    }
}

const fn significant_bytes(value: u64) -> usize {
    8 - (value.leading_zeros() / 8) as usize
}

impl<T: CompactInt, S: Serializer> Serialize<S> for Compact<T> {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        encode(self.0.into(), serializer)
    }
}

impl<T: CompactInt, D: Deserializer> Deserialize<D> for Compact<T> {
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        let value = decode(deserializer, T::WIDTH)?;

        T::from_u64(value).map(Self).ok_or_else(|| {
            log::debug!("compact value {value} does not fit in {}", T::WIDTH);
            D::Error::compact_out_of_range(T::WIDTH)
        })
    }
}

#[allow(clippy::cast_possible_truncation)]
fn encode<S: Serializer>(value: u64, serializer: &mut S) -> Result<(), S::Error> {
    if value <= MODE_0_MAX {
        serializer.emit_u8((value as u8) << 2)
    } else if value <= MODE_1_MAX {
        serializer.emit_u16(((value as u16) << 2) | 0b01)
    } else if value <= MODE_2_MAX {
        serializer.emit_u32(((value as u32) << 2) | 0b10)
    } else {
        let len = significant_bytes(value);
        debug_assert!(len >= 4, "mode 2 covers everything below 2^30");

        serializer.emit_u8(0b11 | (((len - 4) as u8) << 2))?;
        for byte in &value.to_le_bytes()[..len] {
            serializer.emit_u8(*byte)?;
        }

        Ok(())
    }
}

fn decode<D: Deserializer>(
    deserializer: &mut D,
    width: CompactWidth,
) -> Result<u64, D::Error> {
    let prefix = deserializer.expect_u8()?;

    let (value, minimal) = match prefix & 0b11 {
        0b00 => (u64::from(prefix >> 2), true),

        0b01 => {
            let raw =
                u16::from(prefix) | (u16::from(deserializer.expect_u8()?) << 8);
            let value = u64::from(raw >> 2);

            (value, value > MODE_0_MAX)
        }

        0b10 => {
            let mut raw = u32::from(prefix);
            for shift in [8, 16, 24] {
                raw |= u32::from(deserializer.expect_u8()?) << shift;
            }
            let value = u64::from(raw >> 2);

            (value, value > MODE_1_MAX)
        }

        _ => {
            let len = usize::from(prefix >> 2) + 4;

            let value = match len {
                4 => u64::from(deserializer.expect_u32()?),
                5..=7 => {
                    let mut value = 0;
                    for index in 0..len {
                        value |= u64::from(deserializer.expect_u8()?)
                            << (index * 8);
                    }
                    value
                }
                8 => deserializer.expect_u64()?,
                _ => {
                    log::debug!(
                        "compact prefix {prefix:#04x} announces {len} bytes"
                    );
                    return Err(D::Error::compact_out_of_range(width));
                }
            };

            let minimal = if len == 4 {
                value > MODE_2_MAX
            } else {
                value > u64::MAX >> ((8 - len + 1) * 8)
            };

            (value, minimal)
        }
    };

    if !minimal && deserializer.compact_policy() == CompactPolicy::Strict {
        log::debug!(
            "rejecting non-minimal compact encoding of {value} (prefix \
             {prefix:#04x})"
        );
        return Err(D::Error::non_minimal_compact(width));
    }

    Ok(value)
}
