//! A shared pool of reusable serializers.

use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;
use scalec_serialize::Serialize;

use crate::{Error, ScaleConfig, ScaleSerializer};

/// Hands out [`ScaleSerializer`]s whose buffers are recycled between
/// messages.
///
/// ```
/// use scalec_scale::SerializerPool;
///
/// let pool = SerializerPool::new();
/// assert_eq!(pool.encode(&(1u8, true)).unwrap(), [0x01, 0x01]);
/// assert_eq!(pool.idle(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SerializerPool {
    idle: Mutex<Vec<ScaleSerializer>>,
    config: ScaleConfig,
}

impl SerializerPool {
    /// Creates an empty pool with the default configuration.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Creates an empty pool whose serializers follow `config`.
    #[must_use]
    pub fn with_config(config: ScaleConfig) -> Self {
        Self { idle: Mutex::new(Vec::new()), config }
    }

    /// Takes an idle serializer, or creates one if none is available. The
    /// serializer goes back to the pool, emptied, when the guard drops.
    #[must_use]
    pub fn checkout(&self) -> PooledSerializer<'_> {
        let serializer = self.idle.lock().pop().unwrap_or_else(|| {
            log::trace!("serializer pool is empty, creating a serializer");
            ScaleSerializer::with_config(&self.config)
        });

        PooledSerializer { pool: self, serializer }
    }

    /// Encodes `value` with a pooled serializer and returns a copy of the
    /// bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` contains something Scale cannot
    /// represent.
    pub fn encode<T: Serialize<ScaleSerializer> + ?Sized>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, Error> {
        let mut serializer = self.checkout();
        serializer.serialize(value)?;

        Ok(serializer.to_vec())
    }

    /// The number of serializers waiting to be reused.
    #[must_use]
    pub fn idle(&self) -> usize { self.idle.lock().len() }
}

/// A serializer borrowed from a [`SerializerPool`].
#[derive(Debug)]
pub struct PooledSerializer<'p> {
    pool: &'p SerializerPool,
    serializer: ScaleSerializer,
}

impl Deref for PooledSerializer<'_> {
    type Target = ScaleSerializer;

    fn deref(&self) -> &Self::Target { &self.serializer }
}

impl DerefMut for PooledSerializer<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target { &mut self.serializer }
}

impl Drop for PooledSerializer<'_> {
    fn drop(&mut self) {
        let mut serializer = std::mem::replace(
            &mut self.serializer,
            ScaleSerializer::with_capacity(0),
        );
        serializer.clear();

        log::trace!(
            "returning a serializer with {} bytes of capacity to the pool",
            serializer.buffer().capacity()
        );
        self.pool.idle.lock().push(serializer);
    }
}
