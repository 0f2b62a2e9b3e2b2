//! Knobs shared by the serializer, the deserializer and the pool.

use scalec_buffer::DEFAULT_BUFFER_SIZE;
use scalec_serialize::compact::CompactPolicy;

/// Configuration for [`crate::ScaleSerializer`] and
/// [`crate::ScaleDeserializer`].
///
/// ```
/// use scalec_scale::{compact::CompactPolicy, ScaleConfig};
///
/// const CONFIG: ScaleConfig = ScaleConfig::new()
///     .with_compact_policy(CompactPolicy::Lenient)
///     .with_max_length(1024);
///
/// assert_eq!(CONFIG.max_length, Some(1024));
/// assert_eq!(CONFIG.initial_capacity, 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScaleConfig {
    /// The capacity a freshly created serializer starts with.
    pub initial_capacity: usize,

    /// Whether non-minimal compact integers are rejected on decode.
    pub compact_policy: CompactPolicy,

    /// The largest length prefix the deserializer accepts, checked before
    /// anything is allocated. `None` accepts any `u32`.
    pub max_length: Option<u32>,
}

impl ScaleConfig {
    /// The default configuration: [`DEFAULT_BUFFER_SIZE`] bytes of initial
    /// capacity, strict compact decoding and no length limit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initial_capacity: DEFAULT_BUFFER_SIZE,
            compact_policy: CompactPolicy::Strict,
            max_length: None,
        }
    }

    /// Sets [`ScaleConfig::initial_capacity`].
    #[must_use]
    pub const fn with_initial_capacity(self, initial_capacity: usize) -> Self {
        Self { initial_capacity, ..self }
    }

    /// Sets [`ScaleConfig::compact_policy`].
    #[must_use]
    pub const fn with_compact_policy(self, compact_policy: CompactPolicy) -> Self {
        Self { compact_policy, ..self }
    }

    /// Limits decoded length prefixes to `max_length`.
    #[must_use]
    pub const fn with_max_length(self, max_length: u32) -> Self {
        Self { max_length: Some(max_length), ..self }
    }
}

impl Default for ScaleConfig {
    fn default() -> Self { Self::new() }
}
