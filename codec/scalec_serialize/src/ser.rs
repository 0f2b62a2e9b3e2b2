//! Serialization half of the dispatch core.
//!
//! ## Key Traits
//!
//! - [`Serializer`] - A format binding; one `emit_*` method per structural
//!   category
//! - [`Serialize`] - The capability a value needs to be serialized by a
//!   given binding
//! - [`Error`] - Trait for serialization error types
//! - [`Seq`], [`Tuple`], [`Struct`], [`Map`] - Compound serializers handed
//!   to the closures of [`Serializer::emit_seq`] and friends
//!
//! ## Bracketing
//!
//! Compound values are serialized through a closure:
//!
//! ```ignore
//! serializer.emit_struct(&LAYOUT, |mut fields| {
//!     fields.serialize_field("x", &self.x)?;
//!     fields.serialize_last_field("y", &self.y)
//! })
//! ```
//!
//! The binding runs its opening hook before calling the closure. The
//! compound handed to the closure borrows the serializer and runs the
//! closing hook when it is dropped, which happens as the closure returns,
//! so an aggregate is always bracketed exactly once. Inside the closure the
//! last member goes through the `*_last_*` method so formats with
//! separators can omit the trailing one.

use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    fmt::Display,
    hash::BuildHasher,
    marker::PhantomData,
    rc::Rc,
    sync::Arc,
};

use crate::{Bytes, Number, Packed, StructLayout};

/// Trait used by `Serialize` implementations to generically construct
/// errors belonging to the `Serializer` against which they are
/// currently running.
pub trait Error: Sized + std::error::Error {
    /// Create a custom error with a message.
    ///
    /// The message should not be capitalized and should not end with a
    /// period.
    fn custom<T>(msg: T) -> Self
    where
        T: Display;

    /// Create an error for a category the format cannot represent, such as
    /// floating point under a binary format that forbids it.
    ///
    /// `operation` names the rejected type, e.g. `"f64"`.
    fn unsupported(operation: &'static str) -> Self {
        Self::custom(format!("unsupported operation `{operation}`"))
    }
}

/// Serializes the elements of a sequence or set.
pub trait Seq {
    /// The serializer that created this compound.
    type Parent: Serializer;

    /// Serialize a single element.
    ///
    /// # Errors
    ///
    /// Returns an error if the element cannot be serialized.
    fn serialize_element<T: Serialize<Self::Parent> + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), <Self::Parent as Serializer>::Error>;
}

/// Serializes the members of a fixed-arity aggregate: tuples, tuple-like
/// aggregates, fixed-size arrays and variant payloads.
pub trait Tuple {
    /// The serializer that created this compound.
    type Parent: Serializer;

    /// Serialize a member that is not the last one.
    ///
    /// # Errors
    ///
    /// Returns an error if the member cannot be serialized.
    fn serialize_element<T: Serialize<Self::Parent> + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), <Self::Parent as Serializer>::Error>;

    /// Serialize the last member.
    ///
    /// # Errors
    ///
    /// Returns an error if the member cannot be serialized.
    fn serialize_last_element<T: Serialize<Self::Parent> + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), <Self::Parent as Serializer>::Error> {
        self.serialize_element(value)
    }
}

/// Serializes the fields of a field aggregate.
pub trait Struct {
    /// The serializer that created this compound.
    type Parent: Serializer;

    /// Serialize the embedded base aggregate.
    ///
    /// Must be called before any field. Whether anything is written is
    /// decided by [`StructLayout::include_base`].
    ///
    /// # Errors
    ///
    /// Returns an error if the base cannot be serialized.
    fn serialize_base<B: Serialize<Self::Parent> + ?Sized>(
        &mut self,
        base: &B,
    ) -> Result<(), <Self::Parent as Serializer>::Error>;

    /// Serialize a field that is not the last one.
    ///
    /// # Errors
    ///
    /// Returns an error if the field cannot be serialized.
    fn serialize_field<T: Serialize<Self::Parent> + ?Sized>(
        &mut self,
        name: &'static str,
        value: &T,
    ) -> Result<(), <Self::Parent as Serializer>::Error>;

    /// Serialize the last field.
    ///
    /// # Errors
    ///
    /// Returns an error if the field cannot be serialized.
    fn serialize_last_field<T: Serialize<Self::Parent> + ?Sized>(
        &mut self,
        name: &'static str,
        value: &T,
    ) -> Result<(), <Self::Parent as Serializer>::Error> {
        self.serialize_field(name, value)
    }
}

/// Serializes the entries of a map.
pub trait Map {
    /// The serializer that created this compound.
    type Parent: Serializer;

    /// Serialize a key-value pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or value cannot be serialized.
    fn serialize_entry<
        K: Serialize<Self::Parent> + ?Sized,
        V: Serialize<Self::Parent> + ?Sized,
    >(
        &mut self,
        key: &K,
        value: &V,
    ) -> Result<(), <Self::Parent as Serializer>::Error>;
}

/// A format binding.
///
/// Every structural category has its own method. The narrow numeric widths
/// have defaults that widen to the 64-bit method; a binding that emits an
/// exact byte count per width must override all of them.
pub trait Serializer: Sized {
    /// The error type returned by serialization operations.
    type Error: Error;

    /// The compound used for sequences and sets.
    type Seq<'s>: Seq<Parent = Self>
    where
        Self: 's;

    /// The compound used for tuples, fixed-size arrays and variants.
    type Tuple<'s>: Tuple<Parent = Self>
    where
        Self: 's;

    /// The compound used for field aggregates.
    type Struct<'s>: Struct<Parent = Self>
    where
        Self: 's;

    /// The compound used for maps.
    type Map<'s>: Map<Parent = Self>
    where
        Self: 's;

    /// Serialize a boolean value.
    fn emit_bool(&mut self, value: bool) -> Result<(), Self::Error>;

    /// Serialize a u8 value. Defaults to [`Serializer::emit_u64`].
    fn emit_u8(&mut self, value: u8) -> Result<(), Self::Error> {
        self.emit_u64(u64::from(value))
    }

    /// Serialize a u16 value. Defaults to [`Serializer::emit_u64`].
    fn emit_u16(&mut self, value: u16) -> Result<(), Self::Error> {
        self.emit_u64(u64::from(value))
    }

    /// Serialize a u32 value. Defaults to [`Serializer::emit_u64`].
    fn emit_u32(&mut self, value: u32) -> Result<(), Self::Error> {
        self.emit_u64(u64::from(value))
    }

    /// Serialize a u64 value.
    fn emit_u64(&mut self, value: u64) -> Result<(), Self::Error>;

    /// Serialize an i8 value. Defaults to [`Serializer::emit_i64`].
    fn emit_i8(&mut self, value: i8) -> Result<(), Self::Error> {
        self.emit_i64(i64::from(value))
    }

    /// Serialize an i16 value. Defaults to [`Serializer::emit_i64`].
    fn emit_i16(&mut self, value: i16) -> Result<(), Self::Error> {
        self.emit_i64(i64::from(value))
    }

    /// Serialize an i32 value. Defaults to [`Serializer::emit_i64`].
    fn emit_i32(&mut self, value: i32) -> Result<(), Self::Error> {
        self.emit_i64(i64::from(value))
    }

    /// Serialize an i64 value.
    fn emit_i64(&mut self, value: i64) -> Result<(), Self::Error>;

    /// Serialize a usize value as a u64.
    fn emit_usize(&mut self, value: usize) -> Result<(), Self::Error> {
        self.emit_u64(value as u64)
    }

    /// Serialize an isize value as an i64.
    fn emit_isize(&mut self, value: isize) -> Result<(), Self::Error> {
        self.emit_i64(value as i64)
    }

    /// Serialize a u128 value. Unsupported unless the binding opts in.
    fn emit_u128(&mut self, _value: u128) -> Result<(), Self::Error> {
        Err(Self::Error::unsupported("u128"))
    }

    /// Serialize an i128 value. Unsupported unless the binding opts in.
    fn emit_i128(&mut self, _value: i128) -> Result<(), Self::Error> {
        Err(Self::Error::unsupported("i128"))
    }

    /// Serialize an f32 value. Defaults to [`Serializer::emit_f64`].
    fn emit_f32(&mut self, value: f32) -> Result<(), Self::Error> {
        self.emit_f64(f64::from(value))
    }

    /// Serialize an f64 value.
    fn emit_f64(&mut self, value: f64) -> Result<(), Self::Error>;

    /// Serialize a character. Defaults to a one-character string.
    fn emit_char(&mut self, value: char) -> Result<(), Self::Error> {
        self.emit_str(value.encode_utf8(&mut [0; 4]))
    }

    /// Serialize a string slice.
    fn emit_str(&mut self, value: &str) -> Result<(), Self::Error>;

    /// Serialize raw bytes. Defaults to an element-wise sequence.
    fn emit_bytes(&mut self, value: &[u8]) -> Result<(), Self::Error> {
        self.emit_seq(value.len(), |mut seq| {
            for byte in value {
                seq.serialize_element(byte)?;
            }
            Ok(())
        })
    }

    /// Serialize a sequence of fixed-width numbers. Defaults to an
    /// element-wise sequence.
    fn emit_packed<T: Number + Serialize<Self>>(
        &mut self,
        values: &[T],
    ) -> Result<(), Self::Error> {
        self.emit_seq(values.len(), |mut seq| {
            for value in values {
                seq.serialize_element(value)?;
            }
            Ok(())
        })
    }

    /// Serialize an error-like value as its message.
    fn emit_error(
        &mut self,
        error: &(dyn std::error::Error + '_),
    ) -> Result<(), Self::Error> {
        self.emit_str(&error.to_string())
    }

    /// Serialize the unit value.
    fn emit_unit(&mut self) -> Result<(), Self::Error>;

    /// Serialize an absent optional value.
    fn emit_none(&mut self) -> Result<(), Self::Error>;

    /// Serialize a present optional value.
    fn emit_some<T: Serialize<Self> + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), Self::Error>;

    /// Serialize a sequence of `len` elements.
    fn emit_seq<'s>(
        &'s mut self,
        len: usize,
        f: impl FnOnce(Self::Seq<'s>) -> Result<(), Self::Error>,
    ) -> Result<(), Self::Error>;

    /// Serialize a set of `len` elements. Defaults to
    /// [`Serializer::emit_seq`].
    fn emit_set<'s>(
        &'s mut self,
        len: usize,
        f: impl FnOnce(Self::Seq<'s>) -> Result<(), Self::Error>,
    ) -> Result<(), Self::Error> {
        self.emit_seq(len, f)
    }

    /// Serialize a map of `len` entries.
    fn emit_map<'s>(
        &'s mut self,
        len: usize,
        f: impl FnOnce(Self::Map<'s>) -> Result<(), Self::Error>,
    ) -> Result<(), Self::Error>;

    /// Serialize an anonymous tuple of `len` members.
    fn emit_tuple<'s>(
        &'s mut self,
        len: usize,
        f: impl FnOnce(Self::Tuple<'s>) -> Result<(), Self::Error>,
    ) -> Result<(), Self::Error>;

    /// Serialize a named tuple-like aggregate. Defaults to
    /// [`Serializer::emit_tuple`].
    fn emit_tuple_struct<'s>(
        &'s mut self,
        _name: &'static str,
        len: usize,
        f: impl FnOnce(Self::Tuple<'s>) -> Result<(), Self::Error>,
    ) -> Result<(), Self::Error> {
        self.emit_tuple(len, f)
    }

    /// Serialize a field aggregate described by `layout`.
    fn emit_struct<'s>(
        &'s mut self,
        layout: &StructLayout,
        f: impl FnOnce(Self::Struct<'s>) -> Result<(), Self::Error>,
    ) -> Result<(), Self::Error>;

    /// Serialize the variant at `index` of the variant type `name`, carrying
    /// `len` payload members.
    fn emit_variant<'s>(
        &'s mut self,
        name: &'static str,
        variant: &'static str,
        index: u32,
        len: usize,
        f: impl FnOnce(Self::Tuple<'s>) -> Result<(), Self::Error>,
    ) -> Result<(), Self::Error>;
}

/// The capability to be serialized by `S`.
pub trait Serialize<S: Serializer> {
    /// Serialize this value into the given serializer.
    ///
    /// # Errors
    ///
    /// Returns an error if the binding cannot represent the value.
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error>;
}

// =============================================================================
// Primitive Type Implementations
// =============================================================================

macro_rules! impl_serialize_primitive {
    ($($ty:ty => $method:ident),*) => {
        $(
            impl<S: Serializer> Serialize<S> for $ty {
                fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
                    serializer.$method(*self)
                }
            }
        )*
    };
}

impl_serialize_primitive! {
    bool => emit_bool,
    u8 => emit_u8,
    u16 => emit_u16,
    u32 => emit_u32,
    u64 => emit_u64,
    u128 => emit_u128,
    usize => emit_usize,
    i8 => emit_i8,
    i16 => emit_i16,
    i32 => emit_i32,
    i64 => emit_i64,
    i128 => emit_i128,
    isize => emit_isize,
    f32 => emit_f32,
    f64 => emit_f64,
    char => emit_char
}

impl<S: Serializer> Serialize<S> for str {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        serializer.emit_str(self)
    }
}

impl<S: Serializer> Serialize<S> for String {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        serializer.emit_str(self)
    }
}

impl<S: Serializer> Serialize<S> for Bytes {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        serializer.emit_bytes(self)
    }
}

impl<T: Number + Serialize<S>, S: Serializer> Serialize<S> for Packed<T> {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        serializer.emit_packed(self)
    }
}

impl<S: Serializer> Serialize<S> for std::io::Error {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        serializer.emit_error(self)
    }
}

impl<S: Serializer> Serialize<S> for dyn std::error::Error + Send + Sync {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        serializer.emit_error(self)
    }
}

// =============================================================================
// Collection Implementations
// =============================================================================

fn serialize_seq<'a, T, S>(
    serializer: &mut S,
    len: usize,
    items: impl IntoIterator<Item = &'a T>,
) -> Result<(), S::Error>
where
    T: Serialize<S> + 'a,
    S: Serializer,
{
    serializer.emit_seq(len, |mut seq| {
        for item in items {
            seq.serialize_element(item)?;
        }
        Ok(())
    })
}

fn serialize_set<'a, T, S>(
    serializer: &mut S,
    len: usize,
    items: impl IntoIterator<Item = &'a T>,
) -> Result<(), S::Error>
where
    T: Serialize<S> + 'a,
    S: Serializer,
{
    serializer.emit_set(len, |mut seq| {
        for item in items {
            seq.serialize_element(item)?;
        }
        Ok(())
    })
}

fn serialize_map<'a, K, V, S>(
    serializer: &mut S,
    len: usize,
    entries: impl IntoIterator<Item = (&'a K, &'a V)>,
) -> Result<(), S::Error>
where
    K: Serialize<S> + 'a,
    V: Serialize<S> + 'a,
    S: Serializer,
{
    serializer.emit_map(len, |mut map| {
        for (key, value) in entries {
            map.serialize_entry(key, value)?;
        }
        Ok(())
    })
}

impl<T: Serialize<S>, S: Serializer> Serialize<S> for Vec<T> {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        serialize_seq(serializer, self.len(), self)
    }
}

impl<T: Serialize<S>, S: Serializer> Serialize<S> for [T] {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        serialize_seq(serializer, self.len(), self)
    }
}

impl<T: Serialize<S>, S: Serializer> Serialize<S> for VecDeque<T> {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        serialize_seq(serializer, self.len(), self)
    }
}

/// Fixed-size arrays have a statically known length and are serialized as
/// tuples, without a length prefix.
impl<T: Serialize<S>, const N: usize, S: Serializer> Serialize<S> for [T; N] {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        serializer.emit_tuple(N, |mut tuple| {
            for (index, item) in self.iter().enumerate() {
                if index + 1 == N {
                    tuple.serialize_last_element(item)?;
                } else {
                    tuple.serialize_element(item)?;
                }
            }
            Ok(())
        })
    }
}

impl<T, BH, S> Serialize<S> for HashSet<T, BH>
where
    T: Serialize<S>,
    BH: BuildHasher,
    S: Serializer,
{
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        serialize_set(serializer, self.len(), self)
    }
}

impl<T: Serialize<S>, S: Serializer> Serialize<S> for BTreeSet<T> {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        serialize_set(serializer, self.len(), self)
    }
}

impl<K, V, BH, S> Serialize<S> for HashMap<K, V, BH>
where
    K: Serialize<S>,
    V: Serialize<S>,
    BH: BuildHasher,
    S: Serializer,
{
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        serialize_map(serializer, self.len(), self)
    }
}

impl<K, V, S> Serialize<S> for BTreeMap<K, V>
where
    K: Serialize<S>,
    V: Serialize<S>,
    S: Serializer,
{
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        serialize_map(serializer, self.len(), self)
    }
}

// =============================================================================
// Option and Result Implementations
// =============================================================================

impl<T: Serialize<S>, S: Serializer> Serialize<S> for Option<T> {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        match self {
            Some(value) => serializer.emit_some(value),
            None => serializer.emit_none(),
        }
    }
}

/// `Err` is variant 0 and `Ok` is variant 1, so a one-byte index reads as
/// the "is ok" flag.
impl<T, E, S> Serialize<S> for Result<T, E>
where
    T: Serialize<S>,
    E: Serialize<S>,
    S: Serializer,
{
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        match self {
            Ok(value) => serializer
                .emit_variant("Result", "Ok", 1, 1, |mut variant| {
                    variant.serialize_last_element(value)
                }),
            Err(error) => serializer
                .emit_variant("Result", "Err", 0, 1, |mut variant| {
                    variant.serialize_last_element(error)
                }),
        }
    }
}

// =============================================================================
// Tuple Implementations
// =============================================================================

impl<S: Serializer> Serialize<S> for () {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        serializer.emit_unit()
    }
}

macro_rules! impl_serialize_tuple {
    ($($len:expr => ($($idx:tt $T:ident),+)),*) => {
        $(
            impl<$($T,)* S> Serialize<S> for ($($T,)*)
            where
                $($T: Serialize<S>,)*
                S: Serializer,
            {
                fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
                    serializer.emit_tuple($len, |mut tuple| {
                        let mut remaining = $len;
                        $(
                            remaining -= 1;
                            if remaining == 0 {
                                tuple.serialize_last_element(&self.$idx)?;
                            } else {
                                tuple.serialize_element(&self.$idx)?;
                            }
                        )*
                        Ok(())
                    })
                }
            }
        )*
    };
}

impl_serialize_tuple! {
    1 => (0 T0),
    2 => (0 T0, 1 T1),
    3 => (0 T0, 1 T1, 2 T2),
    4 => (0 T0, 1 T1, 2 T2, 3 T3),
    5 => (0 T0, 1 T1, 2 T2, 3 T3, 4 T4),
    6 => (0 T0, 1 T1, 2 T2, 3 T3, 4 T4, 5 T5),
    7 => (0 T0, 1 T1, 2 T2, 3 T3, 4 T4, 5 T5, 6 T6),
    8 => (0 T0, 1 T1, 2 T2, 3 T3, 4 T4, 5 T5, 6 T6, 7 T7),
    9 => (0 T0, 1 T1, 2 T2, 3 T3, 4 T4, 5 T5, 6 T6, 7 T7, 8 T8),
    10 => (0 T0, 1 T1, 2 T2, 3 T3, 4 T4, 5 T5, 6 T6, 7 T7, 8 T8, 9 T9),
    11 => (0 T0, 1 T1, 2 T2, 3 T3, 4 T4, 5 T5, 6 T6, 7 T7, 8 T8, 9 T9, 10 T10),
    12 => (0 T0, 1 T1, 2 T2, 3 T3, 4 T4, 5 T5, 6 T6, 7 T7, 8 T8, 9 T9, 10 T10, 11 T11),
    13 => (0 T0, 1 T1, 2 T2, 3 T3, 4 T4, 5 T5, 6 T6, 7 T7, 8 T8, 9 T9, 10 T10, 11 T11, 12 T12),
    14 => (0 T0, 1 T1, 2 T2, 3 T3, 4 T4, 5 T5, 6 T6, 7 T7, 8 T8, 9 T9, 10 T10, 11 T11, 12 T12, 13 T13),
    15 => (0 T0, 1 T1, 2 T2, 3 T3, 4 T4, 5 T5, 6 T6, 7 T7, 8 T8, 9 T9, 10 T10, 11 T11, 12 T12, 13 T13, 14 T14),
    16 => (0 T0, 1 T1, 2 T2, 3 T3, 4 T4, 5 T5, 6 T6, 7 T7, 8 T8, 9 T9, 10 T10, 11 T11, 12 T12, 13 T13, 14 T14, 15 T15)
}

// =============================================================================
// Reference and Smart Pointer Implementations
// =============================================================================

impl<T: Serialize<S> + ?Sized, S: Serializer> Serialize<S> for &T {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        (**self).serialize(serializer)
    }
}

impl<T: Serialize<S> + ?Sized, S: Serializer> Serialize<S> for &mut T {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        (**self).serialize(serializer)
    }
}

impl<T: Serialize<S> + ?Sized, S: Serializer> Serialize<S> for Box<T> {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        (**self).serialize(serializer)
    }
}

impl<T: Serialize<S> + ?Sized, S: Serializer> Serialize<S> for Rc<T> {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        (**self).serialize(serializer)
    }
}

impl<T: Serialize<S> + ?Sized, S: Serializer> Serialize<S> for Arc<T> {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        (**self).serialize(serializer)
    }
}

impl<T, S> Serialize<S> for Cow<'_, T>
where
    T: Serialize<S> + ToOwned + ?Sized,
    S: Serializer,
{
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        (**self).serialize(serializer)
    }
}

impl<T: ?Sized, S: Serializer> Serialize<S> for PhantomData<T> {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        serializer.emit_unit()
    }
}
