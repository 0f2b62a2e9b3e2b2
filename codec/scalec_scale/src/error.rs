//! Contains the [`Error`] type shared by the Scale serializer and
//! deserializer.

use std::{fmt::Display, string::FromUtf8Error};

use scalec_buffer::BufferUnderflow;
use scalec_serialize::{compact::CompactWidth, de, ser};

/// An error raised while encoding or decoding Scale bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Input ended before the value did.
    #[error(transparent)]
    BufferUnderflow(#[from] BufferUnderflow),

    /// A compact integer does not fit the requested width.
    #[error("out of range decoding Compact<{0}>")]
    CompactOutOfRange(CompactWidth),

    /// A compact integer used a longer mode than its value needs.
    #[error("non-minimal encoding decoding Compact<{0}>")]
    NonMinimalEncoding(CompactWidth),

    /// The value has a category Scale cannot represent.
    #[error("Scale: cannot use {0} type")]
    UnsupportedOperation(&'static str),

    /// A boolean byte other than `0x00` or `0x01`.
    #[error("invalid boolean byte {0:#04x}")]
    InvalidBool(u8),

    /// An option presence byte other than `0x00` or `0x01`.
    #[error("invalid option presence byte {0:#04x}")]
    InvalidPresence(u8),

    /// A `char` that is not a unicode scalar value.
    #[error("{0:#x} is not a unicode scalar value")]
    InvalidChar(u32),

    /// A string payload that is not UTF-8.
    #[error(transparent)]
    InvalidUtf8(#[from] FromUtf8Error),

    /// A collection too long for a `Compact<u32>` length prefix.
    #[error("length {0} does not fit in a Compact<u32> prefix")]
    LengthOverflow(usize),

    /// A variant index above 255.
    #[error("variant index {0} does not fit in one byte")]
    VariantIndexOverflow(u32),

    /// A variant index the variant type does not have.
    #[error("unknown variant index {index} of `{name}`")]
    UnknownVariant {
        /// The variant type.
        name: &'static str,

        /// The decoded index.
        index: u32,
    },

    /// A collection whose length differs from the expected one.
    #[error("expected {expected} element(s), found {found}")]
    InvalidLength {
        /// The required number of elements.
        expected: usize,

        /// The number of elements present.
        found: usize,
    },

    /// A length prefix above [`crate::ScaleConfig::max_length`].
    #[error("length prefix {length} exceeds the configured limit of {limit}")]
    LengthLimitExceeded {
        /// The decoded length prefix.
        length: u32,

        /// The configured limit.
        limit: u32,
    },

    /// A message raised by a `Serialize` or `Deserialize` implementation.
    #[error("{0}")]
    Custom(String),
}

impl ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self { Self::Custom(msg.to_string()) }

    fn unsupported(operation: &'static str) -> Self {
        Self::UnsupportedOperation(operation)
    }
}

impl de::Error for Error {
    fn custom<T: Display>(msg: T) -> Self { Self::Custom(msg.to_string()) }

    fn unsupported(operation: &'static str) -> Self {
        Self::UnsupportedOperation(operation)
    }

    fn compact_out_of_range(width: CompactWidth) -> Self {
        Self::CompactOutOfRange(width)
    }

    fn non_minimal_compact(width: CompactWidth) -> Self {
        Self::NonMinimalEncoding(width)
    }

    fn unknown_variant(name: &'static str, index: u32) -> Self {
        Self::UnknownVariant { name, index }
    }

    fn invalid_length(expected: usize, found: usize) -> Self {
        Self::InvalidLength { expected, found }
    }
}
