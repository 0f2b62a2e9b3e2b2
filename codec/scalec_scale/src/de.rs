//! Scale deserializer implementation.
//!
//! Reads the format written by [`crate::ScaleSerializer`]. Every malformed
//! input is reported as an [`Error`]; nothing panics on hostile bytes, and
//! length prefixes never allocate more than the input can back.

use scalec_buffer::{ByteBuffer, Number};
use scalec_serialize::{
    compact::{Compact, CompactInt, CompactPolicy},
    de::{
        Deserialize, Deserializer, MapAccess, SeqAccess, StructAccess,
        TupleAccess,
    },
    StructLayout,
};

use crate::{Error, ScaleConfig};

/// Reads values in the Scale format from an owned [`ByteBuffer`], starting
/// at its read cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleDeserializer {
    buffer: ByteBuffer,
    config: ScaleConfig,
}

impl ScaleDeserializer {
    /// Creates a deserializer over a copy of `bytes`.
    #[must_use]
    pub fn new(bytes: &[u8]) -> Self {
        Self::with_buffer(ByteBuffer::from_slice(bytes))
    }

    /// Creates a deserializer reading `buffer` from its read cursor.
    #[must_use]
    pub fn with_buffer(buffer: ByteBuffer) -> Self {
        Self { buffer, config: ScaleConfig::default() }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ScaleConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &ScaleConfig { &self.config }

    /// The position of the next read.
    #[must_use]
    pub fn position(&self) -> usize { self.buffer.read_offset() }

    /// The number of bytes not yet read.
    #[must_use]
    pub const fn remaining(&self) -> usize { self.buffer.remaining() }

    /// Consumes the deserializer and returns its buffer, with the read
    /// cursor left after the last decoded value.
    #[must_use]
    pub fn into_inner(self) -> ByteBuffer { self.buffer }

    /// Decodes the next value.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is malformed or ends early.
    pub fn deserialize<T: Deserialize<Self>>(&mut self) -> Result<T, Error> {
        T::deserialize(self)
    }

    /// Decodes the next value as a compact integer of width `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoding does not fit `T`, is non-minimal
    /// under [`CompactPolicy::Strict`], or the input ends early.
    pub fn expect_compact<T: CompactInt>(&mut self) -> Result<T, Error> {
        Compact::<T>::deserialize(self).map(Compact::get)
    }

    fn expect_len(&mut self) -> Result<usize, Error> {
        let length = self.expect_compact::<u32>()?;

        if let Some(limit) = self.config.max_length {
            if length > limit {
                log::debug!("length prefix {length} is above the limit {limit}");
                return Err(Error::LengthLimitExceeded { length, limit });
            }
        }

        usize::try_from(length).map_err(|_| {
            Error::Custom(format!("length prefix {length} does not fit in usize"))
        })
    }
}

/// Reads the elements of a sequence, set or map.
#[derive(Debug)]
pub struct ScaleCollectionAccess<'s> {
    deserializer: &'s mut ScaleDeserializer,
    remaining: usize,
}

impl SeqAccess for ScaleCollectionAccess<'_> {
    type Parent = ScaleDeserializer;

    fn next_element<T: Deserialize<Self::Parent>>(
        &mut self,
    ) -> Result<Option<T>, Error> {
        if self.remaining == 0 {
            return Ok(None);
        }

        self.remaining -= 1;
        T::deserialize(self.deserializer).map(Some)
    }

    fn size_hint(&self) -> Option<usize> { Some(self.remaining) }
}

impl MapAccess for ScaleCollectionAccess<'_> {
    type Parent = ScaleDeserializer;

    fn next_entry<K: Deserialize<Self::Parent>, V: Deserialize<Self::Parent>>(
        &mut self,
    ) -> Result<Option<(K, V)>, Error> {
        if self.remaining == 0 {
            return Ok(None);
        }

        self.remaining -= 1;
        let key = K::deserialize(self.deserializer)?;
        let value = V::deserialize(self.deserializer)?;

        Ok(Some((key, value)))
    }

    fn size_hint(&self) -> Option<usize> { Some(self.remaining) }
}

/// Reads the members of a tuple, fixed-size array or variant payload.
#[derive(Debug)]
pub struct ScaleTupleAccess<'s> {
    deserializer: &'s mut ScaleDeserializer,
}

impl TupleAccess for ScaleTupleAccess<'_> {
    type Parent = ScaleDeserializer;

    fn next_element<T: Deserialize<Self::Parent>>(&mut self) -> Result<T, Error> {
        T::deserialize(self.deserializer)
    }
}

/// Reads the fields of a field aggregate.
#[derive(Debug)]
pub struct ScaleStructAccess<'s> {
    deserializer: &'s mut ScaleDeserializer,
    include_base: bool,
}

impl StructAccess for ScaleStructAccess<'_> {
    type Parent = ScaleDeserializer;

    fn next_base<B: Deserialize<Self::Parent> + Default>(
        &mut self,
    ) -> Result<B, Error> {
        if self.include_base {
            B::deserialize(self.deserializer)
        } else {
            Ok(B::default())
        }
    }

    fn next_field<T: Deserialize<Self::Parent>>(
        &mut self,
        _name: &'static str,
    ) -> Result<T, Error> {
        T::deserialize(self.deserializer)
    }
}

macro_rules! expect_le {
    ($($method:ident => $ty:ty),*) => {
        $(
            fn $method(&mut self) -> Result<$ty, Error> {
                Ok(self.buffer.read_number_le()?)
            }
        )*
    };
}

impl Deserializer for ScaleDeserializer {
    type Error = Error;

    type SeqAccess<'s>
        = ScaleCollectionAccess<'s>
    where
        Self: 's;

    type TupleAccess<'s>
        = ScaleTupleAccess<'s>
    where
        Self: 's;

    type StructAccess<'s>
        = ScaleStructAccess<'s>
    where
        Self: 's;

    type MapAccess<'s>
        = ScaleCollectionAccess<'s>
    where
        Self: 's;

    expect_le! {
        expect_u8 => u8,
        expect_u16 => u16,
        expect_u32 => u32,
        expect_u64 => u64,
        expect_u128 => u128,
        expect_i8 => i8,
        expect_i16 => i16,
        expect_i32 => i32,
        expect_i64 => i64,
        expect_i128 => i128
    }

    fn compact_policy(&self) -> CompactPolicy { self.config.compact_policy }

    fn expect_bool(&mut self) -> Result<bool, Error> {
        match self.buffer.read_byte()? {
            0x00 => Ok(false),
            0x01 => Ok(true),
            byte => Err(Error::InvalidBool(byte)),
        }
    }

    fn expect_f32(&mut self) -> Result<f32, Error> {
        log::debug!("refusing to decode an f32");
        Err(Error::UnsupportedOperation("f32"))
    }

    fn expect_f64(&mut self) -> Result<f64, Error> {
        log::debug!("refusing to decode an f64");
        Err(Error::UnsupportedOperation("f64"))
    }

    fn expect_char(&mut self) -> Result<char, Error> {
        let code = self.expect_u32()?;
        char::from_u32(code).ok_or(Error::InvalidChar(code))
    }

    fn expect_string(&mut self) -> Result<String, Error> {
        let bytes = self.expect_bytes()?;
        Ok(String::from_utf8(bytes)?)
    }

    fn expect_bytes(&mut self) -> Result<Vec<u8>, Error> {
        let len = self.expect_len()?;
        Ok(self.buffer.read_bytes(len)?.to_vec())
    }

    fn expect_packed<T: Number + Deserialize<Self>>(
        &mut self,
    ) -> Result<Vec<T>, Error> {
        if T::IS_FLOAT {
            log::debug!("refusing to decode a packed sequence of {}", T::NAME);
            return Err(Error::UnsupportedOperation(T::NAME));
        }

        let len = self.expect_len()?;
        let mut values = Vec::with_capacity(len.min(self.remaining() / T::SIZE));
        for _ in 0..len {
            values.push(self.buffer.read_number_le()?);
        }

        Ok(values)
    }

    fn expect_unit(&mut self) -> Result<(), Error> { Ok(()) }

    fn expect_option<T: Deserialize<Self>>(
        &mut self,
    ) -> Result<Option<T>, Error> {
        match self.buffer.read_byte()? {
            0x00 => Ok(None),
            0x01 => T::deserialize(self).map(Some),
            byte => Err(Error::InvalidPresence(byte)),
        }
    }

    fn expect_seq<'s, R>(
        &'s mut self,
        f: impl FnOnce(Self::SeqAccess<'s>) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let remaining = self.expect_len()?;
        f(ScaleCollectionAccess { deserializer: self, remaining })
    }

    fn expect_map<'s, R>(
        &'s mut self,
        f: impl FnOnce(Self::MapAccess<'s>) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let remaining = self.expect_len()?;
        f(ScaleCollectionAccess { deserializer: self, remaining })
    }

    fn expect_tuple<'s, R>(
        &'s mut self,
        _len: usize,
        f: impl FnOnce(Self::TupleAccess<'s>) -> Result<R, Error>,
    ) -> Result<R, Error> {
        f(ScaleTupleAccess { deserializer: self })
    }

    fn expect_struct<'s, R>(
        &'s mut self,
        layout: &StructLayout,
        f: impl FnOnce(Self::StructAccess<'s>) -> Result<R, Error>,
    ) -> Result<R, Error> {
        f(ScaleStructAccess {
            deserializer: self,
            include_base: layout.include_base,
        })
    }

    fn expect_variant<'s, R>(
        &'s mut self,
        name: &'static str,
        variants: &'static [&'static str],
        f: impl FnOnce(u32, Self::TupleAccess<'s>) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let index = self.buffer.read_byte()?;
        if usize::from(index) >= variants.len() {
            return Err(Error::UnknownVariant { name, index: u32::from(index) });
        }

        f(u32::from(index), ScaleTupleAccess { deserializer: self })
    }
}
