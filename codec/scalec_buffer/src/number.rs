//! Fixed-width numeric types that can be stored in a
//! [`ByteBuffer`](crate::ByteBuffer).

mod sealed {
    pub trait Sealed {}
}

/// A fixed-width numeric type with a known byte representation.
///
/// Floating point types are stored through the bit pattern of the unsigned
/// integer of the same width, so `1.0f32` and `0x3F80_0000u32` produce the
/// same bytes.
///
/// This trait is sealed; it is implemented for every primitive integer of
/// 8 to 128 bits and for `f32`/`f64`.
pub trait Number: Copy + sealed::Sealed {
    /// The number of bytes the value occupies.
    const SIZE: usize;

    /// Whether the type is a floating point type.
    const IS_FLOAT: bool;

    /// Whether the type is signed.
    const IS_SIGNED: bool;

    /// The name of the type as written in Rust source.
    const NAME: &'static str;

    /// Writes the little-endian representation into `out`.
    ///
    /// `out` must be exactly [`Self::SIZE`] bytes long.
    fn write_le(self, out: &mut [u8]);

    /// Writes the big-endian representation into `out`.
    ///
    /// `out` must be exactly [`Self::SIZE`] bytes long.
    fn write_be(self, out: &mut [u8]);

    /// Reads a value from its little-endian representation.
    ///
    /// `bytes` must be exactly [`Self::SIZE`] bytes long.
    fn read_le(bytes: &[u8]) -> Self;

    /// Reads a value from its big-endian representation.
    ///
    /// `bytes` must be exactly [`Self::SIZE`] bytes long.
    fn read_be(bytes: &[u8]) -> Self;
}

macro_rules! impl_integer {
    ($($ty:ty => $signed:literal),*) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Number for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();
                const IS_FLOAT: bool = false;
                const IS_SIGNED: bool = $signed;
                const NAME: &'static str = stringify!($ty);

                fn write_le(self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_le_bytes());
                }

                fn write_be(self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_be_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    Self::from_le_bytes(raw)
                }

                fn read_be(bytes: &[u8]) -> Self {
                    let mut raw = [0; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    Self::from_be_bytes(raw)
                }
            }
        )*
    };
}

impl_integer! {
    u8 => false,
    u16 => false,
    u32 => false,
    u64 => false,
    u128 => false,
    i8 => true,
    i16 => true,
    i32 => true,
    i64 => true,
    i128 => true
}

macro_rules! impl_float {
    ($($ty:ty => $bits:ty),*) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Number for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();
                const IS_FLOAT: bool = true;
                const IS_SIGNED: bool = true;
                const NAME: &'static str = stringify!($ty);

                fn write_le(self, out: &mut [u8]) {
                    self.to_bits().write_le(out);
                }

                fn write_be(self, out: &mut [u8]) {
                    self.to_bits().write_be(out);
                }

                fn read_le(bytes: &[u8]) -> Self {
                    Self::from_bits(<$bits>::read_le(bytes))
                }

                fn read_be(bytes: &[u8]) -> Self {
                    Self::from_bits(<$bits>::read_be(bytes))
                }
            }
        )*
    };
}

impl_float! {
    f32 => u32,
    f64 => u64
}
