//! Format-agnostic serialization core.
//!
//! A value participates in serialization by implementing [`Serialize`] and
//! [`Deserialize`] for a [`ser::Serializer`] / [`de::Deserializer`]. The
//! implementations provided here route every standard shape (primitives,
//! optionals, sequences, sets, maps, tuples, variants and big integers) to
//! the matching `emit_*` / `expect_*` method, so a binding only decides how
//! each category looks on the wire.
//!
//! User aggregates implement the same two traits by hand (or through code
//! generation) using [`ser::Serializer::emit_struct`] and
//! [`de::Deserializer::expect_struct`] together with a [`StructLayout`].

use derive_more::{Deref, DerefMut, From, Into};

pub use de::Deserialize;
pub use scalec_buffer::Number;
pub use ser::Serialize;

pub mod compact;
pub mod de;
pub mod ser;

/// Describes the members of a field aggregate.
///
/// The layout is fixed at compile time and handed to
/// [`ser::Serializer::emit_struct`] / [`de::Deserializer::expect_struct`].
/// Bindings that need the field names (for example textual formats) read
/// them from here; binary bindings rely on call order only.
///
/// # Example
///
/// ```
/// use scalec_serialize::StructLayout;
///
/// const POINT: StructLayout = StructLayout::new("Point", &["x", "y"]);
/// const POINT_3D: StructLayout =
///     StructLayout::new("Point3D", &["z"]).exclude_base();
///
/// assert!(POINT.include_base);
/// assert!(!POINT_3D.include_base);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructLayout {
    /// The name of the aggregate type.
    pub name: &'static str,

    /// The names of the aggregate's own fields, in declaration order.
    pub fields: &'static [&'static str],

    /// Whether the fields of an embedded base aggregate are encoded before
    /// the aggregate's own fields.
    pub include_base: bool,

    /// Whether a binding that normally writes field names should omit them.
    pub omit_names: bool,
}

impl StructLayout {
    /// Creates a layout that includes base fields and keeps field names.
    #[must_use]
    pub const fn new(
        name: &'static str,
        fields: &'static [&'static str],
    ) -> Self {
        Self { name, fields, include_base: true, omit_names: false }
    }

    /// Excludes the fields of the embedded base aggregate.
    #[must_use]
    pub const fn exclude_base(mut self) -> Self {
        self.include_base = false;
        self
    }

    /// Asks bindings to omit field names.
    #[must_use]
    pub const fn omit_names(mut self) -> Self {
        self.omit_names = true;
        self
    }
}

/// A byte sequence serialized through the raw-byte fast path
/// ([`ser::Serializer::emit_bytes`]) instead of element by element.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Deref,
    DerefMut,
    From,
    Into,
)]
pub struct Bytes(pub Vec<u8>);

/// A sequence of fixed-width numbers serialized through the typed numeric
/// fast path ([`ser::Serializer::emit_packed`]).
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Deref,
    DerefMut,
    From,
    Into,
)]
pub struct Packed<T>(pub Vec<T>);

#[cfg(test)]
mod test;
