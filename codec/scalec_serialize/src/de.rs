//! Deserialization half of the dispatch core.
//!
//! Mirrors [`crate::ser`]: a [`Deserializer`] exposes one `expect_*` method
//! per structural category, and compound values are read through access
//! objects handed to a closure. There is no visitor; the caller states the
//! shape it expects and the binding either produces it or fails.
//!
//! ## Key Traits
//!
//! - [`Deserializer`] - A format binding
//! - [`Deserialize`] - The capability a type needs to be deserialized by a
//!   given binding
//! - [`Error`] - Trait for deserialization error types
//! - [`SeqAccess`], [`TupleAccess`], [`StructAccess`], [`MapAccess`] -
//!   Compound accessors

use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    fmt::Display,
    hash::{BuildHasher, Hash},
    marker::PhantomData,
    rc::Rc,
    sync::Arc,
};

use crate::{
    compact::{CompactPolicy, CompactWidth},
    Bytes, Number, Packed, StructLayout,
};

/// Upper bound on the number of elements preallocated from a length
/// prefix. Longer collections still decode; they just grow as they go.
const MAX_PREALLOCATION: usize = 4096;

/// Trait used by `Deserialize` implementations to generically construct
/// errors belonging to the `Deserializer` against which they are
/// currently running.
///
/// Every method except [`Error::custom`] has a message-based default; a
/// binding overrides the ones it reports as dedicated variants.
pub trait Error: Sized + std::error::Error {
    /// Create a custom error with a message.
    ///
    /// The message should not be capitalized and should not end with a
    /// period.
    fn custom<T>(msg: T) -> Self
    where
        T: Display;

    /// Create an error for a category the format cannot represent.
    fn unsupported(operation: &'static str) -> Self {
        Self::custom(format!("unsupported operation `{operation}`"))
    }

    /// Create an error for a compact integer that does not fit `width`.
    fn compact_out_of_range(width: CompactWidth) -> Self {
        Self::custom(format!("out of range decoding Compact<{width}>"))
    }

    /// Create an error for a compact integer that used a longer mode than
    /// its value needs.
    fn non_minimal_compact(width: CompactWidth) -> Self {
        Self::custom(format!("non-minimal encoding decoding Compact<{width}>"))
    }

    /// Create an error for a variant index the variant type does not have.
    fn unknown_variant(name: &'static str, index: u32) -> Self {
        Self::custom(format!("unknown variant index {index} of `{name}`"))
    }

    /// Create an error for a collection whose length differs from the
    /// expected one.
    fn invalid_length(expected: usize, found: usize) -> Self {
        Self::custom(format!("expected {expected} element(s), found {found}"))
    }
}

/// Reads the elements of a sequence or set.
pub trait SeqAccess {
    /// The deserializer that created this access.
    type Parent: Deserializer;

    /// Deserialize the next element, or `None` once the sequence is
    /// exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if the element cannot be deserialized.
    fn next_element<T: Deserialize<Self::Parent>>(
        &mut self,
    ) -> Result<Option<T>, <Self::Parent as Deserializer>::Error>;

    /// The number of remaining elements, if known.
    fn size_hint(&self) -> Option<usize>;
}

/// Reads the members of a fixed-arity aggregate.
pub trait TupleAccess {
    /// The deserializer that created this access.
    type Parent: Deserializer;

    /// Deserialize a member that is not the last one.
    ///
    /// # Errors
    ///
    /// Returns an error if the member cannot be deserialized.
    fn next_element<T: Deserialize<Self::Parent>>(
        &mut self,
    ) -> Result<T, <Self::Parent as Deserializer>::Error>;

    /// Deserialize the last member.
    ///
    /// # Errors
    ///
    /// Returns an error if the member cannot be deserialized.
    fn next_last_element<T: Deserialize<Self::Parent>>(
        &mut self,
    ) -> Result<T, <Self::Parent as Deserializer>::Error> {
        self.next_element()
    }
}

/// Reads the fields of a field aggregate, in declaration order.
pub trait StructAccess {
    /// The deserializer that created this access.
    type Parent: Deserializer;

    /// Deserialize the embedded base aggregate.
    ///
    /// Must be called before any field. When the layout excludes base
    /// fields nothing is read and `B::default()` is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the base cannot be deserialized.
    fn next_base<B: Deserialize<Self::Parent> + Default>(
        &mut self,
    ) -> Result<B, <Self::Parent as Deserializer>::Error>;

    /// Deserialize a field that is not the last one.
    ///
    /// # Errors
    ///
    /// Returns an error if the field cannot be deserialized.
    fn next_field<T: Deserialize<Self::Parent>>(
        &mut self,
        name: &'static str,
    ) -> Result<T, <Self::Parent as Deserializer>::Error>;

    /// Deserialize the last field.
    ///
    /// # Errors
    ///
    /// Returns an error if the field cannot be deserialized.
    fn next_last_field<T: Deserialize<Self::Parent>>(
        &mut self,
        name: &'static str,
    ) -> Result<T, <Self::Parent as Deserializer>::Error> {
        self.next_field(name)
    }
}

/// Reads the entries of a map.
pub trait MapAccess {
    /// The deserializer that created this access.
    type Parent: Deserializer;

    /// Deserialize the next key-value pair, or `None` once the map is
    /// exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or value cannot be deserialized.
    #[allow(clippy::type_complexity)]
    fn next_entry<K: Deserialize<Self::Parent>, V: Deserialize<Self::Parent>>(
        &mut self,
    ) -> Result<Option<(K, V)>, <Self::Parent as Deserializer>::Error>;

    /// The number of remaining entries, if known.
    fn size_hint(&self) -> Option<usize>;
}

/// A format binding.
///
/// The narrow numeric widths default to reading the 64-bit value and
/// narrowing it with a checked conversion; a binding with exact per-width
/// byte counts must override all of them.
pub trait Deserializer: Sized {
    /// The error type returned by deserialization operations.
    type Error: Error;

    /// The access used for sequences and sets.
    type SeqAccess<'s>: SeqAccess<Parent = Self>
    where
        Self: 's;

    /// The access used for tuples, fixed-size arrays and variants.
    type TupleAccess<'s>: TupleAccess<Parent = Self>
    where
        Self: 's;

    /// The access used for field aggregates.
    type StructAccess<'s>: StructAccess<Parent = Self>
    where
        Self: 's;

    /// The access used for maps.
    type MapAccess<'s>: MapAccess<Parent = Self>
    where
        Self: 's;

    /// Whether non-minimal compact integers are rejected.
    fn compact_policy(&self) -> CompactPolicy { CompactPolicy::Strict }

    /// Deserialize a boolean value.
    fn expect_bool(&mut self) -> Result<bool, Self::Error>;

    /// Deserialize a u8 value. Defaults to a narrowed
    /// [`Deserializer::expect_u64`].
    fn expect_u8(&mut self) -> Result<u8, Self::Error> {
        let value = self.expect_u64()?;
        narrow(value, "u8")
    }

    /// Deserialize a u16 value. Defaults to a narrowed
    /// [`Deserializer::expect_u64`].
    fn expect_u16(&mut self) -> Result<u16, Self::Error> {
        let value = self.expect_u64()?;
        narrow(value, "u16")
    }

    /// Deserialize a u32 value. Defaults to a narrowed
    /// [`Deserializer::expect_u64`].
    fn expect_u32(&mut self) -> Result<u32, Self::Error> {
        let value = self.expect_u64()?;
        narrow(value, "u32")
    }

    /// Deserialize a u64 value.
    fn expect_u64(&mut self) -> Result<u64, Self::Error>;

    /// Deserialize an i8 value. Defaults to a narrowed
    /// [`Deserializer::expect_i64`].
    fn expect_i8(&mut self) -> Result<i8, Self::Error> {
        let value = self.expect_i64()?;
        narrow(value, "i8")
    }

    /// Deserialize an i16 value. Defaults to a narrowed
    /// [`Deserializer::expect_i64`].
    fn expect_i16(&mut self) -> Result<i16, Self::Error> {
        let value = self.expect_i64()?;
        narrow(value, "i16")
    }

    /// Deserialize an i32 value. Defaults to a narrowed
    /// [`Deserializer::expect_i64`].
    fn expect_i32(&mut self) -> Result<i32, Self::Error> {
        let value = self.expect_i64()?;
        narrow(value, "i32")
    }

    /// Deserialize an i64 value.
    fn expect_i64(&mut self) -> Result<i64, Self::Error>;

    /// Deserialize a usize value from a u64.
    fn expect_usize(&mut self) -> Result<usize, Self::Error> {
        let value = self.expect_u64()?;
        narrow(value, "usize")
    }

    /// Deserialize an isize value from an i64.
    fn expect_isize(&mut self) -> Result<isize, Self::Error> {
        let value = self.expect_i64()?;
        narrow(value, "isize")
    }

    /// Deserialize a u128 value. Unsupported unless the binding opts in.
    fn expect_u128(&mut self) -> Result<u128, Self::Error> {
        Err(Self::Error::unsupported("u128"))
    }

    /// Deserialize an i128 value. Unsupported unless the binding opts in.
    fn expect_i128(&mut self) -> Result<i128, Self::Error> {
        Err(Self::Error::unsupported("i128"))
    }

    /// Deserialize an f32 value. Defaults to a narrowed
    /// [`Deserializer::expect_f64`].
    #[allow(clippy::cast_possible_truncation)]
    fn expect_f32(&mut self) -> Result<f32, Self::Error> {
        self.expect_f64().map(|value| value as f32)
    }

    /// Deserialize an f64 value.
    fn expect_f64(&mut self) -> Result<f64, Self::Error>;

    /// Deserialize a character. Defaults to a one-character string.
    fn expect_char(&mut self) -> Result<char, Self::Error> {
        let string = self.expect_string()?;
        let mut chars = string.chars();

        match (chars.next(), chars.next()) {
            (Some(ch), None) => Ok(ch),
            _ => Err(Self::Error::custom(format!(
                "expected a single character, found `{string}`"
            ))),
        }
    }

    /// Deserialize an owned string.
    fn expect_string(&mut self) -> Result<String, Self::Error>;

    /// Deserialize raw bytes. Defaults to an element-wise sequence.
    fn expect_bytes(&mut self) -> Result<Vec<u8>, Self::Error> {
        Vec::<u8>::deserialize(self)
    }

    /// Deserialize a sequence of fixed-width numbers. Defaults to an
    /// element-wise sequence.
    fn expect_packed<T: Number + Deserialize<Self>>(
        &mut self,
    ) -> Result<Vec<T>, Self::Error> {
        Vec::<T>::deserialize(self)
    }

    /// Deserialize the message of an error-like value.
    fn expect_error(&mut self) -> Result<String, Self::Error> {
        self.expect_string()
    }

    /// Deserialize the unit value.
    fn expect_unit(&mut self) -> Result<(), Self::Error>;

    /// Deserialize an optional value.
    fn expect_option<T: Deserialize<Self>>(
        &mut self,
    ) -> Result<Option<T>, Self::Error>;

    /// Deserialize a sequence.
    fn expect_seq<'s, R>(
        &'s mut self,
        f: impl FnOnce(Self::SeqAccess<'s>) -> Result<R, Self::Error>,
    ) -> Result<R, Self::Error>;

    /// Deserialize a set. Defaults to [`Deserializer::expect_seq`].
    fn expect_set<'s, R>(
        &'s mut self,
        f: impl FnOnce(Self::SeqAccess<'s>) -> Result<R, Self::Error>,
    ) -> Result<R, Self::Error> {
        self.expect_seq(f)
    }

    /// Deserialize a map.
    fn expect_map<'s, R>(
        &'s mut self,
        f: impl FnOnce(Self::MapAccess<'s>) -> Result<R, Self::Error>,
    ) -> Result<R, Self::Error>;

    /// Deserialize an anonymous tuple of `len` members.
    fn expect_tuple<'s, R>(
        &'s mut self,
        len: usize,
        f: impl FnOnce(Self::TupleAccess<'s>) -> Result<R, Self::Error>,
    ) -> Result<R, Self::Error>;

    /// Deserialize a named tuple-like aggregate. Defaults to
    /// [`Deserializer::expect_tuple`].
    fn expect_tuple_struct<'s, R>(
        &'s mut self,
        _name: &'static str,
        len: usize,
        f: impl FnOnce(Self::TupleAccess<'s>) -> Result<R, Self::Error>,
    ) -> Result<R, Self::Error> {
        self.expect_tuple(len, f)
    }

    /// Deserialize a field aggregate described by `layout`.
    fn expect_struct<'s, R>(
        &'s mut self,
        layout: &StructLayout,
        f: impl FnOnce(Self::StructAccess<'s>) -> Result<R, Self::Error>,
    ) -> Result<R, Self::Error>;

    /// Deserialize a value of the variant type `name`. The closure receives
    /// the variant index and an access to its payload; `variants` lists the
    /// variant names in index order.
    fn expect_variant<'s, R>(
        &'s mut self,
        name: &'static str,
        variants: &'static [&'static str],
        f: impl FnOnce(u32, Self::TupleAccess<'s>) -> Result<R, Self::Error>,
    ) -> Result<R, Self::Error>;
}

fn narrow<T, W, E>(value: W, target: &'static str) -> Result<T, E>
where
    T: TryFrom<W>,
    W: Display + Copy,
    E: Error,
{
    T::try_from(value)
        .map_err(|_| E::custom(format!("{value} does not fit in {target}")))
}

/// The capability to be deserialized by `D`.
pub trait Deserialize<D: Deserializer>: Sized {
    /// Deserialize a value from the given deserializer.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is malformed or does not describe a
    /// value of this type.
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error>;
}

// =============================================================================
// Primitive Type Implementations
// =============================================================================

macro_rules! impl_deserialize_primitive {
    ($($ty:ty => $method:ident),*) => {
        $(
            impl<D: Deserializer> Deserialize<D> for $ty {
                fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
                    deserializer.$method()
                }
            }
        )*
    };
}

impl_deserialize_primitive! {
    bool => expect_bool,
    u8 => expect_u8,
    u16 => expect_u16,
    u32 => expect_u32,
    u64 => expect_u64,
    u128 => expect_u128,
    usize => expect_usize,
    i8 => expect_i8,
    i16 => expect_i16,
    i32 => expect_i32,
    i64 => expect_i64,
    i128 => expect_i128,
    isize => expect_isize,
    f32 => expect_f32,
    f64 => expect_f64,
    char => expect_char,
    String => expect_string
}

impl<D: Deserializer> Deserialize<D> for Bytes {
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        deserializer.expect_bytes().map(Self)
    }
}

impl<T: Number + Deserialize<D>, D: Deserializer> Deserialize<D> for Packed<T> {
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        deserializer.expect_packed().map(Self)
    }
}

impl<D: Deserializer> Deserialize<D> for std::io::Error {
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        deserializer.expect_error().map(Self::other)
    }
}

// =============================================================================
// Collection Implementations
// =============================================================================

fn preallocation(hint: Option<usize>) -> usize {
    hint.unwrap_or(0).min(MAX_PREALLOCATION)
}

impl<T: Deserialize<D>, D: Deserializer> Deserialize<D> for Vec<T> {
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        deserializer.expect_seq(|mut seq| {
            let mut vec = Self::with_capacity(preallocation(seq.size_hint()));
            while let Some(element) = seq.next_element()? {
                vec.push(element);
            }

            Ok(vec)
        })
    }
}

impl<T: Deserialize<D>, D: Deserializer> Deserialize<D> for VecDeque<T> {
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        deserializer.expect_seq(|mut seq| {
            let mut deque = Self::with_capacity(preallocation(seq.size_hint()));
            while let Some(element) = seq.next_element()? {
                deque.push_back(element);
            }

            Ok(deque)
        })
    }
}

impl<T: Deserialize<D>, const N: usize, D: Deserializer> Deserialize<D>
    for [T; N]
{
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        deserializer.expect_tuple(N, |mut tuple| {
            let mut elements: Vec<T> = Vec::with_capacity(N);
            for index in 0..N {
                elements.push(if index + 1 == N {
                    tuple.next_last_element()?
                } else {
                    tuple.next_element()?
                });
            }

            let found = elements.len();
            elements.try_into().map_err(|_| D::Error::invalid_length(N, found))
        })
    }
}

impl<T, BH, D> Deserialize<D> for HashSet<T, BH>
where
    T: Deserialize<D> + Eq + Hash,
    BH: BuildHasher + Default,
    D: Deserializer,
{
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        deserializer.expect_set(|mut seq| {
            let mut set = Self::with_capacity_and_hasher(
                preallocation(seq.size_hint()),
                BH::default(),
            );
            while let Some(element) = seq.next_element()? {
                set.insert(element);
            }

            Ok(set)
        })
    }
}

impl<T: Deserialize<D> + Ord, D: Deserializer> Deserialize<D> for BTreeSet<T> {
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        deserializer.expect_set(|mut seq| {
            let mut set = Self::new();
            while let Some(element) = seq.next_element()? {
                set.insert(element);
            }

            Ok(set)
        })
    }
}

impl<K, V, BH, D> Deserialize<D> for HashMap<K, V, BH>
where
    K: Deserialize<D> + Eq + Hash,
    V: Deserialize<D>,
    BH: BuildHasher + Default,
    D: Deserializer,
{
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        deserializer.expect_map(|mut map| {
            let mut result = Self::with_capacity_and_hasher(
                preallocation(map.size_hint()),
                BH::default(),
            );
            while let Some((key, value)) = map.next_entry()? {
                result.insert(key, value);
            }

            Ok(result)
        })
    }
}

impl<K, V, D> Deserialize<D> for BTreeMap<K, V>
where
    K: Deserialize<D> + Ord,
    V: Deserialize<D>,
    D: Deserializer,
{
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        deserializer.expect_map(|mut map| {
            let mut result = Self::new();
            while let Some((key, value)) = map.next_entry()? {
                result.insert(key, value);
            }

            Ok(result)
        })
    }
}

// =============================================================================
// Option and Result Implementations
// =============================================================================

impl<T: Deserialize<D>, D: Deserializer> Deserialize<D> for Option<T> {
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        deserializer.expect_option()
    }
}

impl<T, E, D> Deserialize<D> for Result<T, E>
where
    T: Deserialize<D>,
    E: Deserialize<D>,
    D: Deserializer,
{
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        const VARIANTS: &[&str] = &["Err", "Ok"];

        deserializer.expect_variant("Result", VARIANTS, |index, mut variant| {
            match index {
                0 => Ok(Err(variant.next_last_element()?)),
                1 => Ok(Ok(variant.next_last_element()?)),
                index => Err(D::Error::unknown_variant("Result", index)),
            }
        })
    }
}

// =============================================================================
// Tuple Implementations
// =============================================================================

impl<D: Deserializer> Deserialize<D> for () {
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        deserializer.expect_unit()
    }
}

macro_rules! impl_deserialize_tuple {
    ($($len:expr => ($($T:ident),+)),*) => {
        $(
            impl<$($T,)* D> Deserialize<D> for ($($T,)*)
            where
                $($T: Deserialize<D>,)*
                D: Deserializer,
            {
                fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
                    deserializer.expect_tuple($len, |mut tuple| {
                        let mut remaining = $len;
                        Ok(($(
                            {
                                remaining -= 1;
                                if remaining == 0 {
                                    tuple.next_last_element::<$T>()?
                                } else {
                                    tuple.next_element::<$T>()?
                                }
                            },
                        )*))
                    })
                }
            }
        )*
    };
}

impl_deserialize_tuple! {
    1 => (T0),
    2 => (T0, T1),
    3 => (T0, T1, T2),
    4 => (T0, T1, T2, T3),
    5 => (T0, T1, T2, T3, T4),
    6 => (T0, T1, T2, T3, T4, T5),
    7 => (T0, T1, T2, T3, T4, T5, T6),
    8 => (T0, T1, T2, T3, T4, T5, T6, T7),
    9 => (T0, T1, T2, T3, T4, T5, T6, T7, T8),
    10 => (T0, T1, T2, T3, T4, T5, T6, T7, T8, T9),
    11 => (T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10),
    12 => (T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11),
    13 => (T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12),
    14 => (T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13),
    15 => (T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14),
    16 => (T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15)
}

// =============================================================================
// Smart Pointer Implementations
// =============================================================================

impl<T: Deserialize<D>, D: Deserializer> Deserialize<D> for Box<T> {
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Box::new)
    }
}

impl<T: Deserialize<D>, D: Deserializer> Deserialize<D> for Rc<T> {
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Rc::new)
    }
}

impl<T: Deserialize<D>, D: Deserializer> Deserialize<D> for Arc<T> {
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Arc::new)
    }
}

impl<T, D> Deserialize<D> for Cow<'static, T>
where
    T: ToOwned + ?Sized,
    T::Owned: Deserialize<D>,
    D: Deserializer,
{
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        T::Owned::deserialize(deserializer).map(Cow::Owned)
    }
}

impl<T: ?Sized, D: Deserializer> Deserialize<D> for PhantomData<T> {
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        deserializer.expect_unit().map(|()| Self)
    }
}
