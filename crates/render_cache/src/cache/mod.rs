//! # Render Cache
//!
//! Batches per-frame draw requests into as few device submissions as
//! possible.
//!
//! ## Architecture
//!
//! - **CacheManager**: public entry point; one material index per vertex layout
//! - **MaterialIndex**: AVL tree keyed by material, owning the accumulators
//! - **BatchAccumulator**: streaming buffers for one (layout, material, primitive)
//!   combination plus the static ranges queued through it
//!
//! Buffer and material bindings are tracked by the manager and lent to the
//! accumulators for each add and flush, so redundant binds never reach the
//! device.

mod accumulator;
mod frame;
mod manager;
mod material_index;
mod static_pool;
mod stats;

#[cfg(test)]
mod tests;

pub use accumulator::{AccumulatorKey, BatchAccumulator, BufferRef, StaticRange};
pub use manager::{CacheManager, StaticDraw, StaticIndices};
pub use material_index::{Insertion, Iter, MaterialIndex, MaterialNode};
pub use static_pool::{StaticBuffer, StaticBufferId, StaticBufferPool, StaticContents};
pub use stats::CacheStats;
