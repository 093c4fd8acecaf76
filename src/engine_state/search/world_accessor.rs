//! # World Accessor
//!
//! The read-only view of the world the search engine scans. The engine never
//! writes through it.

use std::ops::Range;

use cgmath::Point3;

use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::chunk::{BlockLayer, ChunkKey, CHUNK_DIMENSION};

/// A block position in world coordinates.
pub type Position = Point3<i32>;

/// Read-only access to world blocks.
///
/// Implementations are called concurrently from every search worker and from the
/// tick thread, so they must be safe for concurrent reads.
pub trait WorldAccessor: Send + Sync {
    /// Returns the block at `position`, or `None` if its chunk is not loaded or
    /// `position` is outside the vertical range.
    fn block_at(&self, position: Position) -> Option<BlockType>;

    /// Whether the column at `key` is currently available.
    fn is_chunk_loaded(&self, key: ChunkKey) -> bool;

    /// The block Y range every column spans.
    fn vertical_range(&self) -> Range<i32>;

    /// Copies layer `y` of the column at `key` into `layer`, X fastest, then Z.
    ///
    /// Returns `false` if the column is not loaded or `y` is out of range;
    /// `layer` may then be partly written. Scans read whole layers through this.
    /// The default goes through `block_at` once per block; accessors backed by
    /// locked column storage should override it to lock once per layer.
    fn read_layer(&self, key: ChunkKey, y: i32, layer: &mut BlockLayer) -> bool {
        let (origin_x, origin_z) = key.origin();
        for (index, slot) in layer.iter_mut().enumerate() {
            let index = index as i32;
            let position = Point3::new(
                origin_x + index % CHUNK_DIMENSION,
                y,
                origin_z + index / CHUNK_DIMENSION,
            );
            match self.block_at(position) {
                Some(block) => *slot = block,
                None => return false,
            }
        }
        true
    }
}
