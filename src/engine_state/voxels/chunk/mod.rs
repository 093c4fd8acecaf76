//! # Chunk Module
//!
//! This module provides [`ChunkColumn`], the full-height column of blocks the
//! reference world is made of, and [`ChunkKey`], the horizontal coordinate that
//! names it.
//!
//! ## Storage
//!
//! A column stores one [`Block`] byte per voxel in layer order (Y outermost, then Z,
//! then X) plus an occupancy bit vector with one bit per voxel:
//! - `occupancy`: set when the block is not air
//! - `blocks`: the block kinds
//!
//! Air is by far the most common kind above the surface, so `get_block` answers
//! from the bit vector alone whenever the bit is clear.

use std::ops::Range;

use bitvec::prelude::BitVec;
use cgmath::Point3;
use noise::{NoiseFn, Perlin};

use super::block::block_type::BlockType;
use super::block::Block;

mod chunk_creation;
mod chunk_key;

pub use chunk_creation::ChunkCreationIterator;
pub use chunk_key::ChunkKey;

/// The width and depth of a chunk column in blocks.
pub const CHUNK_DIMENSION: i32 = 16;
/// The number of blocks in one horizontal layer of a column (CHUNK_DIMENSION²).
pub const CHUNK_PLANE_SIZE: i32 = CHUNK_DIMENSION * CHUNK_DIMENSION;

/// One horizontal layer of block kinds, X fastest, then Z.
pub type BlockLayer = [BlockType; CHUNK_PLANE_SIZE as usize];

/// Scaling factor applied to world X/Z when sampling the surface height noise.
pub const SURFACE_SCALE_FACTOR: f64 = 0.015;
/// Maximum deviation of the surface from sea level, in blocks.
pub const SURFACE_AMPLITUDE: f64 = 12.0;
/// Scaling factor applied to world coordinates when sampling ore vein noise.
pub const ORE_SCALE_FACTOR: f64 = 0.12;
/// Ore vein noise above this value turns stone into ore.
pub const ORE_THRESHOLD: f64 = 0.4;
/// Depth of the dirt layer under the grass.
const DIRT_DEPTH: i32 = 3;

/// A full-height column of blocks at one [`ChunkKey`].
pub struct ChunkColumn {
    /// The key of this column.
    pub key: ChunkKey,
    min_y: i32,
    height: i32,
    occupancy: BitVec,
    blocks: Vec<Block>,
}

impl ChunkColumn {
    /// Creates a column filled with air.
    pub fn empty(key: ChunkKey, min_y: i32, height: i32) -> Self {
        ChunkCreationIterator::new(key, min_y, height).return_chunk()
    }

    /// Creates a flat column: bedrock floor, stone, a thin dirt layer and grass at
    /// `surface_y`, air above.
    pub fn flat(key: ChunkKey, min_y: i32, height: i32, surface_y: i32) -> Self {
        let mut cci = ChunkCreationIterator::new(key, min_y, height);

        for y in min_y..min_y + height {
            let block_type = Self::layered_type(y, min_y, surface_y);
            for _ in 0..CHUNK_PLANE_SIZE {
                cci.push_block_type(block_type);
            }
        }

        cci.return_chunk()
    }

    /// Generates a column using Perlin noise: a rolling surface around sea level
    /// with water in the dips and ore veins in the stone.
    ///
    /// The same `seed` and key always produce the same column.
    pub fn perlin(key: ChunkKey, min_y: i32, height: i32, seed: u32) -> Self {
        let terrain = Perlin::new(seed);
        let veins = Perlin::new(seed.wrapping_add(1));
        let mut rng = fastrand::Rng::with_seed(
            u64::from(seed) ^ ((key.x as u64) << 32) ^ (key.z as u32 as u64),
        );
        let (ox, oz) = key.origin();
        let sea_level = min_y + height * 2 / 3;
        let lowest_surface = min_y + 1;
        let highest_surface = (min_y + height - 1).max(lowest_surface);

        let mut surface = [0i32; CHUNK_PLANE_SIZE as usize];
        for z in 0..CHUNK_DIMENSION {
            for x in 0..CHUNK_DIMENSION {
                let sample = terrain.get([
                    f64::from(ox + x) * SURFACE_SCALE_FACTOR,
                    f64::from(oz + z) * SURFACE_SCALE_FACTOR,
                ]);
                let surface_y = sea_level + (sample * SURFACE_AMPLITUDE) as i32;
                surface[(x + CHUNK_DIMENSION * z) as usize] =
                    surface_y.clamp(lowest_surface, highest_surface);
            }
        }

        let mut cci = ChunkCreationIterator::new(key, min_y, height);
        for y in min_y..min_y + height {
            for z in 0..CHUNK_DIMENSION {
                for x in 0..CHUNK_DIMENSION {
                    let surface_y = surface[(x + CHUNK_DIMENSION * z) as usize];
                    let block_type = if y > surface_y {
                        if y <= sea_level {
                            BlockType::WATER
                        } else {
                            BlockType::AIR
                        }
                    } else if y <= surface_y - DIRT_DEPTH && y > min_y {
                        let sample = veins.get([
                            f64::from(ox + x) * ORE_SCALE_FACTOR,
                            f64::from(y) * ORE_SCALE_FACTOR,
                            f64::from(oz + z) * ORE_SCALE_FACTOR,
                        ]);
                        if sample > ORE_THRESHOLD {
                            Self::ore_for_depth(y - min_y, height, &mut rng)
                        } else {
                            BlockType::STONE
                        }
                    } else {
                        Self::layered_type(y, min_y, surface_y)
                    };
                    cci.push_block_type(block_type);
                }
            }
        }

        cci.return_chunk()
    }

    fn layered_type(y: i32, min_y: i32, surface_y: i32) -> BlockType {
        if y == min_y {
            BlockType::BEDROCK
        } else if y > surface_y {
            BlockType::AIR
        } else if y == surface_y {
            BlockType::GRASS
        } else if y > surface_y - DIRT_DEPTH {
            BlockType::DIRT
        } else {
            BlockType::STONE
        }
    }

    /// Diamonds only appear in the bottom quarter of the world.
    fn ore_for_depth(depth: i32, height: i32, rng: &mut fastrand::Rng) -> BlockType {
        match BlockType::get_random_ore(rng) {
            BlockType::DIAMOND_ORE if depth * 4 > height => BlockType::IRON_ORE,
            ore => ore,
        }
    }

    fn index(&self, x: usize, y: i32, z: usize) -> Option<usize> {
        if x >= CHUNK_DIMENSION as usize || z >= CHUNK_DIMENSION as usize || !self.contains_y(y) {
            return None;
        }
        let layer = (y - self.min_y) as usize;
        Some(x + CHUNK_DIMENSION as usize * z + CHUNK_PLANE_SIZE as usize * layer)
    }

    /// Lowest block Y stored in this column.
    pub fn min_y(&self) -> i32 {
        self.min_y
    }

    /// Number of layers stored in this column.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Block Y range covered by this column.
    pub fn vertical_range(&self) -> Range<i32> {
        self.min_y..self.min_y + self.height
    }

    /// Whether `y` falls inside the column.
    pub fn contains_y(&self, y: i32) -> bool {
        self.vertical_range().contains(&y)
    }

    /// Gets the block at local coordinates; `None` when out of bounds.
    pub fn get_block(&self, x: usize, y: i32, z: usize) -> Option<BlockType> {
        let index = self.index(x, y, z)?;
        if !self.occupancy[index] {
            return Some(BlockType::AIR);
        }
        Some(self.blocks[index].block_type())
    }

    /// Gets the block at a world position, which must lie in this column.
    pub fn get_block_at(&self, position: Point3<i32>) -> Option<BlockType> {
        if !self.key.contains(position) {
            return None;
        }
        let (x, z) = ChunkKey::local_coords(position);
        self.get_block(x, position.y, z)
    }

    /// Copies layer `y` into `layer`. Returns `false` when `y` is out of range.
    pub fn read_layer(&self, y: i32, layer: &mut BlockLayer) -> bool {
        let Some(start) = self.index(0, y, 0) else {
            return false;
        };
        for (offset, slot) in layer.iter_mut().enumerate() {
            let index = start + offset;
            *slot = if self.occupancy[index] {
                self.blocks[index].block_type()
            } else {
                BlockType::AIR
            };
        }
        true
    }

    /// Replaces the block at local coordinates, returning the previous kind.
    ///
    /// Returns `None` and changes nothing when out of bounds.
    pub fn set_block(&mut self, x: usize, y: i32, z: usize, block_type: BlockType) -> Option<BlockType> {
        let index = self.index(x, y, z)?;
        let previous = self.blocks[index].block_type();
        self.blocks[index] = Block::new(block_type);
        self.occupancy.set(index, block_type != BlockType::AIR);
        Some(previous)
    }

    /// Whether the block at local coordinates is anything but air.
    pub fn is_block_occupied(&self, x: usize, y: i32, z: usize) -> bool {
        self.index(x, y, z).is_some_and(|index| self.occupancy[index])
    }

    /// Number of non-air blocks in the column.
    pub fn occupied_count(&self) -> usize {
        self.occupancy.count_ones()
    }
}
