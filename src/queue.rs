// Wait-free producer queue: many writers, one consumer, two alternating
// linear byte regions. Producers acquire length-prefixed sub-spans of the
// active region; the consumer flips regions and drains the released one.

pub mod alternating;
pub mod linear;

pub use alternating::{
    AlternatingAcquiredRegion, AlternatingControlBlock, AlternatingReader, BlockId,
    WaitFreeAlternatingWriter,
};
pub use linear::{
    max_acquire_length_bytes, max_concurrent_writers, max_linear_buffer_capacity_bytes,
    AcquiredRegion, Length, LinearControlBlock, LinearReader, WaitFreeLinearWriter,
    LENGTH_PREFIX_BYTES,
};
