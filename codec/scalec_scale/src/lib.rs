//! The Scale binary format on top of the
//! [`scalec_serialize`] dispatch core.
//!
//! Scale is a compact, non-self-describing format: the reader must know the
//! shape it expects. Integers are fixed-width little-endian, lengths use the
//! [`compact`] encoding and aggregates are the plain concatenation of their
//! members.
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! let map = BTreeMap::from([("hello".to_owned(), "world".to_owned())]);
//! let bytes = scalec_scale::to_vec(&map).unwrap();
//!
//! assert_eq!(bytes, b"\x04\x14hello\x14world");
//! assert_eq!(
//!     scalec_scale::from_slice::<BTreeMap<String, String>>(&bytes).unwrap(),
//!     map
//! );
//! ```

use std::cell::RefCell;

use scalec_buffer::ByteBuffer;

pub use config::ScaleConfig;
pub use de::{
    ScaleCollectionAccess, ScaleDeserializer, ScaleStructAccess,
    ScaleTupleAccess,
};
pub use error::Error;
pub use pool::{PooledSerializer, SerializerPool};
pub use scalec_serialize::{compact, Deserialize, Serialize};
pub use ser::{ScaleCompound, ScaleSerializer, ScaleStruct};

mod config;
mod de;
mod error;
mod pool;
mod ser;

/// The scratch serializer used by [`to_vec`] is reset to the default size
/// when a message leaves it larger than this.
const SCRATCH_RETAIN_LIMIT: usize = 64 * 1024;

thread_local! {
    static SCRATCH: RefCell<ScaleSerializer> =
        RefCell::new(ScaleSerializer::new());
}

/// Encodes `value` into a new byte vector.
///
/// The encoding happens in a per-thread scratch buffer, so repeated calls
/// do not reallocate while growing.
///
/// # Errors
///
/// Returns an error if `value` contains something Scale cannot represent,
/// such as a floating point number.
pub fn to_vec<T: Serialize<ScaleSerializer> + ?Sized>(
    value: &T,
) -> Result<Vec<u8>, Error> {
    SCRATCH.with(|scratch| {
        let Ok(mut serializer) = scratch.try_borrow_mut() else {
            // a `Serialize` impl called back into `to_vec`
            let mut serializer = ScaleSerializer::new();
            serializer.serialize(value)?;

            return Ok(serializer.into_inner().into_vec());
        };

        serializer.clear();
        let result = serializer.serialize(value).map(|()| serializer.to_vec());

        if serializer.buffer().capacity() > SCRATCH_RETAIN_LIMIT {
            serializer.clear_buffer();
        } else {
            serializer.clear();
        }

        result
    })
}

/// Encodes `value` into a new [`ByteBuffer`].
///
/// # Errors
///
/// Returns an error if `value` contains something Scale cannot represent.
pub fn to_buffer<T: Serialize<ScaleSerializer> + ?Sized>(
    value: &T,
) -> Result<ByteBuffer, Error> {
    let mut serializer = ScaleSerializer::new();
    serializer.serialize(value)?;

    Ok(serializer.into_inner())
}

/// Decodes a `T` from the start of `bytes`. Bytes after the value are
/// ignored.
///
/// # Errors
///
/// Returns an error if `bytes` does not start with a valid encoding of `T`.
pub fn from_slice<T: Deserialize<ScaleDeserializer>>(
    bytes: &[u8],
) -> Result<T, Error> {
    ScaleDeserializer::new(bytes).deserialize()
}

/// Decodes a `T` from `buffer`, starting at `offset`.
///
/// # Errors
///
/// Returns an error if the bytes at `offset` are not a valid encoding of
/// `T`.
pub fn from_buffer<T: Deserialize<ScaleDeserializer>>(
    mut buffer: ByteBuffer,
    offset: usize,
) -> Result<T, Error> {
    buffer.reset_read_offset(offset);
    ScaleDeserializer::with_buffer(buffer).deserialize()
}
