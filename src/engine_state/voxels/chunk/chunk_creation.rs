//! # Chunk Creation Module
//!
//! A builder that fills a [`ChunkColumn`] in storage order while keeping the
//! occupancy bit vector in step with the block storage.
//!
//! Blocks are pushed layer by layer from the bottom of the world upwards; within a
//! layer, X varies fastest, then Z. This is the same order the searcher walks.

use bitvec::vec::BitVec;

use crate::engine_state::voxels::block::{block_type::BlockType, Block};

use super::{ChunkColumn, ChunkKey, CHUNK_PLANE_SIZE};

/// Builds a chunk column one block at a time.
pub struct ChunkCreationIterator {
    /// The key of the column being created
    key: ChunkKey,
    /// Lowest block Y of the column
    min_y: i32,
    /// Number of layers in the column
    height: i32,
    /// One bit per block: set when the block is not air
    occupancy: BitVec,
    /// Dense block storage in push order
    blocks: Vec<Block>,
}

impl ChunkCreationIterator {
    /// Creates a builder for a column spanning `min_y..min_y + height`.
    pub fn new(key: ChunkKey, min_y: i32, height: i32) -> Self {
        let capacity = CHUNK_PLANE_SIZE as usize * height.max(0) as usize;
        ChunkCreationIterator {
            key,
            min_y,
            height,
            occupancy: BitVec::with_capacity(capacity),
            blocks: Vec::with_capacity(capacity),
        }
    }

    /// Adds a block at the current position and advances.
    pub fn push_block_type(&mut self, block_type: BlockType) {
        self.occupancy.push(block_type != BlockType::AIR);
        self.blocks.push(Block::new(block_type));
    }

    /// Finalizes the column, padding any missing tail with air.
    pub fn return_chunk(mut self) -> ChunkColumn {
        let capacity = CHUNK_PLANE_SIZE as usize * self.height.max(0) as usize;
        while self.blocks.len() < capacity {
            self.push_block_type(BlockType::AIR);
        }
        self.blocks.truncate(capacity);
        self.occupancy.truncate(capacity);

        ChunkColumn {
            key: self.key,
            min_y: self.min_y,
            height: self.height,
            occupancy: self.occupancy,
            blocks: self.blocks,
        }
    }
}
