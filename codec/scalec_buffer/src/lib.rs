//! A growable byte buffer with independent write and read cursors.
//!
//! [`ByteBuffer`] is the storage every binary serializer in the workspace
//! writes into. Writing at the cursor never fails: the backing store grows to
//! the next power of two whenever a write would overflow it, and already
//! written bytes are preserved across the reallocation. Reading is bounded by the
//! write cursor; reading past it yields [`BufferUnderflow`].

use std::ops::{Bound, RangeBounds};

use getset::CopyGetters;

mod number;

pub use number::Number;

/// The capacity of a buffer created with [`ByteBuffer::new`], and the size
/// the backing store falls back to in [`ByteBuffer::clear_buffer`].
pub const DEFAULT_BUFFER_SIZE: usize = 16;

/// An attempt to read bytes that have not been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error(
    "cannot read {requested} byte(s) at offset {offset}, only {written} \
     byte(s) are written"
)]
pub struct BufferUnderflow {
    /// The offset the read started at.
    pub offset: usize,

    /// The number of bytes requested.
    pub requested: usize,

    /// The number of bytes written to the buffer.
    pub written: usize,
}

/// A positioned write whose end lies past `usize::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot write {requested} byte(s) at offset {offset}")]
pub struct OffsetOverflow {
    /// The offset the write started at.
    pub offset: usize,

    /// The number of bytes to write.
    pub requested: usize,
}

/// A growable byte store with a write cursor and an independent read
/// cursor.
///
/// The bytes in `0..offset` are the written content. The backing store may
/// be larger than that; [`ByteBuffer::capacity`] reports its size.
///
/// Two buffers compare equal when their written content is equal,
/// regardless of capacity or read position.
#[derive(Debug, Clone, CopyGetters)]
pub struct ByteBuffer {
    bytes: Vec<u8>,

    /// The number of bytes written so far; the position of the next write.
    #[get_copy = "pub"]
    offset: usize,

    /// The position of the next read.
    #[get_copy = "pub"]
    read_offset: usize,
}

impl Default for ByteBuffer {
    fn default() -> Self { Self::new() }
}

impl PartialEq for ByteBuffer {
    fn eq(&self, other: &Self) -> bool { self.as_slice() == other.as_slice() }
}

impl Eq for ByteBuffer {}

impl From<Vec<u8>> for ByteBuffer {
    fn from(bytes: Vec<u8>) -> Self { Self::wrap(bytes) }
}

impl From<&[u8]> for ByteBuffer {
    fn from(bytes: &[u8]) -> Self { Self::from_slice(bytes) }
}

impl From<ByteBuffer> for Vec<u8> {
    fn from(buffer: ByteBuffer) -> Self { buffer.into_vec() }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] { self.as_slice() }
}

/// Generates the positioned and cursor-relative numeric accessors for one
/// byte order.
macro_rules! numeric_access {
    ($($endian:ident => $order:literal),*) => {
        paste::paste! {
            $(
                #[doc = concat!(
                    "Writes `value` in ", $order, " byte order at the write \
                     cursor and advances the cursor by `T::SIZE`."
                )]
                pub fn [<write_number_ $endian>]<T: Number>(&mut self, value: T) {
                    self.reserve(T::SIZE);
                    let end = self.offset + T::SIZE;
                    value.[<write_ $endian>](&mut self.bytes[self.offset..end]);
                    self.offset = end;
                }

                #[doc = concat!(
                    "Writes `value` in ", $order, " byte order at `offset`, \
                     growing the buffer as needed. The write cursor is moved \
                     to the end of the written value."
                )]
                ///
                /// # Errors
                ///
                /// Returns [`OffsetOverflow`] if the end of the value does
                /// not fit in `usize`.
                pub fn [<write_number_ $endian _at>]<T: Number>(
                    &mut self,
                    value: T,
                    offset: usize,
                ) -> Result<(), OffsetOverflow> {
                    let end = offset
                        .checked_add(T::SIZE)
                        .ok_or(OffsetOverflow { offset, requested: T::SIZE })?;
                    self.ensure_capacity(end);
                    value.[<write_ $endian>](&mut self.bytes[offset..end]);
                    self.offset = end;
                    Ok(())
                }

                #[doc = concat!(
                    "Reads a `T` in ", $order, " byte order at the read \
                     cursor and advances the cursor by `T::SIZE`."
                )]
                ///
                /// # Errors
                ///
                /// Returns [`BufferUnderflow`] if fewer than `T::SIZE`
                /// written bytes remain.
                pub fn [<read_number_ $endian>]<T: Number>(
                    &mut self,
                ) -> Result<T, BufferUnderflow> {
                    self.[<read_number_ $endian _at>](self.read_offset)
                }

                #[doc = concat!(
                    "Reads a `T` in ", $order, " byte order at `offset`. \
                     The read cursor is moved to the end of the value."
                )]
                ///
                /// # Errors
                ///
                /// Returns [`BufferUnderflow`] if the value would extend
                /// past the written region.
                pub fn [<read_number_ $endian _at>]<T: Number>(
                    &mut self,
                    offset: usize,
                ) -> Result<T, BufferUnderflow> {
                    let end = self.readable_end(offset, T::SIZE)?;
                    let value = T::[<read_ $endian>](&self.bytes[offset..end]);
                    self.read_offset = end;
                    Ok(value)
                }
            )*
        }
    };
}

impl ByteBuffer {
    /// Creates an empty buffer with [`DEFAULT_BUFFER_SIZE`] bytes of
    /// capacity.
    #[must_use]
    pub fn new() -> Self { Self::with_capacity(DEFAULT_BUFFER_SIZE) }

    /// Creates an empty buffer whose backing store is `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { bytes: vec![0; capacity], offset: 0, read_offset: 0 }
    }

    /// Takes ownership of `bytes` without copying. The whole content is
    /// treated as already written.
    #[must_use]
    pub fn wrap(bytes: Vec<u8>) -> Self {
        let offset = bytes.len();
        Self { bytes, offset, read_offset: 0 }
    }

    /// Copies `bytes` into a new buffer. The whole content is treated as
    /// already written.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Self { Self::wrap(bytes.to_vec()) }

    /// The size of the backing store in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize { self.bytes.len() }

    /// The number of bytes that can be written before the buffer grows.
    #[must_use]
    pub fn remaining_capacity(&self) -> usize {
        self.bytes.len().saturating_sub(self.offset)
    }

    /// The number of written bytes that have not been read yet.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.offset.saturating_sub(self.read_offset)
    }

    /// Ensures `additional` more bytes can be written at the write cursor.
    ///
    /// When the backing store is too small it is reallocated to the smallest
    /// power of two that fits `offset + additional`. Written bytes are
    /// preserved.
    pub fn reserve(&mut self, additional: usize) {
        self.ensure_capacity(self.offset.saturating_add(additional));
    }

    fn ensure_capacity(&mut self, required: usize) {
        if required <= self.bytes.len() {
            return;
        }

        let capacity = required.checked_next_power_of_two().unwrap_or(required);
        log::trace!(
            "growing byte buffer from {} to {capacity} bytes",
            self.bytes.len()
        );
        self.bytes.resize(capacity, 0);
    }

    /// Appends a single byte.
    pub fn write_byte(&mut self, byte: u8) {
        self.reserve(1);
        self.bytes[self.offset] = byte;
        self.offset += 1;
    }

    /// Appends `bytes`.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len());
        self.bytes[self.offset..self.offset + bytes.len()]
            .copy_from_slice(bytes);
        self.offset += bytes.len();
    }

    /// Appends the part of `bytes` selected by `range`.
    ///
    /// Both bounds are clamped to `bytes.len()` and a reversed range is
    /// normalized, so this never panics.
    pub fn write_bytes_slice(
        &mut self,
        bytes: &[u8],
        range: impl RangeBounds<usize>,
    ) {
        let (start, end) = clamp_range(&range, bytes.len());
        self.write_bytes(&bytes[start..end]);
    }

    /// Appends `1` for `true` and `0` for `false`.
    pub fn write_bool(&mut self, value: bool) { self.write_byte(u8::from(value)); }

    numeric_access! {
        le => "little-endian",
        be => "big-endian"
    }

    /// Reads one byte at the read cursor.
    ///
    /// # Errors
    ///
    /// Returns [`BufferUnderflow`] if every written byte has been read.
    pub fn read_byte(&mut self) -> Result<u8, BufferUnderflow> {
        self.read_number_le::<u8>()
    }

    /// Reads `len` bytes at the read cursor and advances it.
    ///
    /// # Errors
    ///
    /// Returns [`BufferUnderflow`] if fewer than `len` written bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&[u8], BufferUnderflow> {
        let start = self.read_offset;
        let end = self.readable_end(start, len)?;
        self.read_offset = end;

        Ok(&self.bytes[start..end])
    }

    fn readable_end(
        &self,
        offset: usize,
        len: usize,
    ) -> Result<usize, BufferUnderflow> {
        match offset.checked_add(len) {
            Some(end) if end <= self.offset => Ok(end),
            _ => Err(BufferUnderflow {
                offset,
                requested: len,
                written: self.offset,
            }),
        }
    }

    /// Moves the write cursor to `offset`, clamped to the capacity.
    pub fn reset_offset(&mut self, offset: usize) {
        self.offset = offset.min(self.bytes.len());
    }

    /// Moves the read cursor to `offset`.
    pub fn reset_read_offset(&mut self, offset: usize) {
        self.read_offset = offset;
    }

    /// Resets both cursors, keeping the backing store for reuse.
    pub fn clear(&mut self) {
        self.offset = 0;
        self.read_offset = 0;
    }

    /// Resets both cursors and shrinks the backing store to
    /// [`DEFAULT_BUFFER_SIZE`].
    pub fn clear_buffer(&mut self) {
        self.clear();
        self.bytes = vec![0; DEFAULT_BUFFER_SIZE];
    }

    /// Shrinks the backing store to `max(offset, DEFAULT_BUFFER_SIZE)`.
    pub fn shrink(&mut self) {
        self.bytes.resize(self.offset.max(DEFAULT_BUFFER_SIZE), 0);
        self.bytes.shrink_to_fit();
    }

    /// Copies the written bytes in `start..end` into a new buffer.
    ///
    /// Both bounds are clamped to `0..=offset`; negative values select the
    /// start of the buffer. An empty selection yields a fresh, empty
    /// buffer.
    #[must_use]
    pub fn slice(&self, start: isize, end: isize) -> Self {
        let clamp = |bound: isize| usize::try_from(bound).unwrap_or(0).min(self.offset);
        let (start, end) = (clamp(start), clamp(end));

        if end <= start {
            return Self::new();
        }

        let size = end - start;
        let mut slice = Self::with_capacity(size.next_power_of_two());
        slice.write_bytes(&self.bytes[start..end]);
        slice
    }

    /// Copies the written bytes from `start` to the write cursor into a new
    /// buffer, clamping like [`ByteBuffer::slice`].
    #[must_use]
    pub fn slice_from(&self, start: isize) -> Self {
        self.slice(start, isize::try_from(self.offset).unwrap_or(isize::MAX))
    }

    /// The written bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] { &self.bytes[..self.offset] }

    /// Copies the written bytes into a new vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> { self.as_slice().to_vec() }

    /// Consumes the buffer, returning the written bytes.
    #[must_use]
    pub fn into_vec(mut self) -> Vec<u8> {
        self.bytes.truncate(self.offset);
        self.bytes
    }
}

fn clamp_range(range: &impl RangeBounds<usize>, len: usize) -> (usize, usize) {
    let start = match range.start_bound() {
        Bound::Included(start) => *start,
        Bound::Excluded(start) => start.saturating_add(1),
        Bound::Unbounded => 0,
    }
    .min(len);
    let end = match range.end_bound() {
        Bound::Included(end) => end.saturating_add(1),
        Bound::Excluded(end) => *end,
        Bound::Unbounded => len,
    }
    .min(len);

    (start.min(end), start.max(end))
}
