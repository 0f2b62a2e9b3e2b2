//! Scale serializer implementation.
//!
//! # Examples
//!
//! ```rust
//! use scalec_scale::ScaleSerializer;
//!
//! let mut serializer = ScaleSerializer::new();
//! serializer.serialize("Hamlet").unwrap();
//!
//! assert_eq!(serializer.as_slice(), b"\x18Hamlet");
//! ```
//!
//! # Binary Format
//!
//! - **Integers**: fixed width, little-endian; `usize`/`isize` as 64 bits
//! - **Booleans**: one byte, `0x00` or `0x01`
//! - **Characters**: the code point as a `u32`
//! - **Strings, sequences, sets, maps**: a `Compact<u32>` length followed by
//!   the UTF-8 bytes or the items
//! - **Options**: a presence byte followed by the payload when present
//! - **Variants**: the index as one byte followed by the payload
//! - **Tuples, fixed-size arrays, aggregates**: the members back to back
//! - **Floating point**: not representable

use scalec_buffer::{ByteBuffer, Number};
use scalec_serialize::{
    compact::{Compact, CompactInt},
    ser::{Map, Seq, Serialize, Serializer, Struct, Tuple},
    StructLayout,
};

use crate::{Error, ScaleConfig};

/// Writes values in the Scale format into an owned [`ByteBuffer`].
///
/// The buffer keeps growing across calls to [`ScaleSerializer::serialize`];
/// call [`ScaleSerializer::clear`] to reuse the allocation for a new
/// message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScaleSerializer {
    buffer: ByteBuffer,
}

impl ScaleSerializer {
    /// Creates a serializer with the default initial capacity.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Creates a serializer whose buffer starts with `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buffer: ByteBuffer::with_capacity(capacity) }
    }

    /// Creates a serializer sized by [`ScaleConfig::initial_capacity`].
    #[must_use]
    pub fn with_config(config: &ScaleConfig) -> Self {
        Self::with_capacity(config.initial_capacity)
    }

    /// Creates a serializer that appends to `buffer` at its write cursor.
    #[must_use]
    pub const fn with_buffer(buffer: ByteBuffer) -> Self { Self { buffer } }

    /// The buffer written so far.
    #[must_use]
    pub const fn buffer(&self) -> &ByteBuffer { &self.buffer }

    /// The bytes written so far.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] { self.buffer.as_slice() }

    /// Copies the bytes written so far.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> { self.buffer.to_vec() }

    /// Consumes the serializer and returns its buffer.
    #[must_use]
    pub fn into_inner(self) -> ByteBuffer { self.buffer }

    /// Discards the written bytes, keeping the allocation.
    pub fn clear(&mut self) { self.buffer.clear(); }

    /// Discards the written bytes and shrinks the allocation back to the
    /// default size.
    pub fn clear_buffer(&mut self) { self.buffer.clear_buffer(); }

    /// Appends the encoding of `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` contains something Scale cannot
    /// represent. Bytes written before the failure stay in the buffer.
    pub fn serialize<T: Serialize<Self> + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), Error> {
        value.serialize(self)
    }

    /// Appends `value` in the compact encoding.
    ///
    /// # Errors
    ///
    /// Never fails for the provided integer widths; the `Result` mirrors
    /// [`Serializer`] methods.
    pub fn emit_compact<T: CompactInt>(&mut self, value: T) -> Result<(), Error> {
        Compact(value).serialize(self)
    }

    fn emit_len(&mut self, len: usize) -> Result<(), Error> {
        let len = u32::try_from(len).map_err(|_| Error::LengthOverflow(len))?;
        self.emit_compact(len)
    }
}

/// The compound handed to sequence, set, map, tuple and variant closures.
#[derive(Debug)]
pub struct ScaleCompound<'s> {
    serializer: &'s mut ScaleSerializer,
}

impl Seq for ScaleCompound<'_> {
    type Parent = ScaleSerializer;

    fn serialize_element<T: Serialize<Self::Parent> + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), Error> {
        value.serialize(self.serializer)
    }
}

impl Tuple for ScaleCompound<'_> {
    type Parent = ScaleSerializer;

    fn serialize_element<T: Serialize<Self::Parent> + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), Error> {
        value.serialize(self.serializer)
    }
}

impl Map for ScaleCompound<'_> {
    type Parent = ScaleSerializer;

    fn serialize_entry<
        K: Serialize<Self::Parent> + ?Sized,
        V: Serialize<Self::Parent> + ?Sized,
    >(
        &mut self,
        key: &K,
        value: &V,
    ) -> Result<(), Error> {
        key.serialize(self.serializer)?;
        value.serialize(self.serializer)
    }
}

/// The compound handed to field aggregate closures.
#[derive(Debug)]
pub struct ScaleStruct<'s> {
    serializer: &'s mut ScaleSerializer,
    include_base: bool,
}

impl Struct for ScaleStruct<'_> {
    type Parent = ScaleSerializer;

    fn serialize_base<B: Serialize<Self::Parent> + ?Sized>(
        &mut self,
        base: &B,
    ) -> Result<(), Error> {
        if self.include_base {
            base.serialize(self.serializer)
        } else {
            Ok(())
        }
    }

    fn serialize_field<T: Serialize<Self::Parent> + ?Sized>(
        &mut self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        value.serialize(self.serializer)
    }
}

macro_rules! emit_le {
    ($($method:ident => $ty:ty),*) => {
        $(
            fn $method(&mut self, value: $ty) -> Result<(), Error> {
                self.buffer.write_number_le(value);
                Ok(())
            }
        )*
    };
}

impl Serializer for ScaleSerializer {
    type Error = Error;

    type Seq<'s>
        = ScaleCompound<'s>
    where
        Self: 's;

    type Tuple<'s>
        = ScaleCompound<'s>
    where
        Self: 's;

    type Struct<'s>
        = ScaleStruct<'s>
    where
        Self: 's;

    type Map<'s>
        = ScaleCompound<'s>
    where
        Self: 's;

    emit_le! {
        emit_u8 => u8,
        emit_u16 => u16,
        emit_u32 => u32,
        emit_u64 => u64,
        emit_u128 => u128,
        emit_i8 => i8,
        emit_i16 => i16,
        emit_i32 => i32,
        emit_i64 => i64,
        emit_i128 => i128
    }

    fn emit_bool(&mut self, value: bool) -> Result<(), Error> {
        self.buffer.write_bool(value);
        Ok(())
    }

    fn emit_f32(&mut self, _value: f32) -> Result<(), Error> {
        log::debug!("refusing to encode an f32");
        Err(Error::UnsupportedOperation("f32"))
    }

    fn emit_f64(&mut self, _value: f64) -> Result<(), Error> {
        log::debug!("refusing to encode an f64");
        Err(Error::UnsupportedOperation("f64"))
    }

    fn emit_char(&mut self, value: char) -> Result<(), Error> {
        self.emit_u32(u32::from(value))
    }

    fn emit_str(&mut self, value: &str) -> Result<(), Error> {
        self.emit_bytes(value.as_bytes())
    }

    fn emit_bytes(&mut self, value: &[u8]) -> Result<(), Error> {
        self.emit_len(value.len())?;
        self.buffer.write_bytes(value);
        Ok(())
    }

    fn emit_packed<T: Number + Serialize<Self>>(
        &mut self,
        values: &[T],
    ) -> Result<(), Error> {
        if T::IS_FLOAT {
            log::debug!("refusing to encode a packed sequence of {}", T::NAME);
            return Err(Error::UnsupportedOperation(T::NAME));
        }

        self.emit_len(values.len())?;
        self.buffer.reserve(values.len() * T::SIZE);
        for value in values {
            self.buffer.write_number_le(*value);
        }

        Ok(())
    }

    fn emit_unit(&mut self) -> Result<(), Error> { Ok(()) }

    fn emit_none(&mut self) -> Result<(), Error> {
        self.buffer.write_byte(0x00);
        Ok(())
    }

    fn emit_some<T: Serialize<Self> + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), Error> {
        self.buffer.write_byte(0x01);
        value.serialize(self)
    }

    fn emit_seq<'s>(
        &'s mut self,
        len: usize,
        f: impl FnOnce(Self::Seq<'s>) -> Result<(), Error>,
    ) -> Result<(), Error> {
        self.emit_len(len)?;
        f(ScaleCompound { serializer: self })
    }

    fn emit_map<'s>(
        &'s mut self,
        len: usize,
        f: impl FnOnce(Self::Map<'s>) -> Result<(), Error>,
    ) -> Result<(), Error> {
        self.emit_len(len)?;
        f(ScaleCompound { serializer: self })
    }

    fn emit_tuple<'s>(
        &'s mut self,
        _len: usize,
        f: impl FnOnce(Self::Tuple<'s>) -> Result<(), Error>,
    ) -> Result<(), Error> {
        f(ScaleCompound { serializer: self })
    }

    fn emit_struct<'s>(
        &'s mut self,
        layout: &StructLayout,
        f: impl FnOnce(Self::Struct<'s>) -> Result<(), Error>,
    ) -> Result<(), Error> {
        f(ScaleStruct { serializer: self, include_base: layout.include_base })
    }

    fn emit_variant<'s>(
        &'s mut self,
        _name: &'static str,
        _variant: &'static str,
        index: u32,
        _len: usize,
        f: impl FnOnce(Self::Tuple<'s>) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let index =
            u8::try_from(index).map_err(|_| Error::VariantIndexOverflow(index))?;
        self.buffer.write_byte(index);

        f(ScaleCompound { serializer: self })
    }
}
