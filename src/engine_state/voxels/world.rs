//! # World Module
//!
//! This module provides the `World` struct, an in-memory collection of chunk
//! columns implementing [`WorldAccessor`]. It is the world the demo binary and
//! the tests search; a game client plugs in its own accessor instead.
//!
//! ## Chunk Generation
//!
//! Multiple column generation strategies are supported:
//! - Perlin noise terrain with ore veins
//! - Flat layered terrain
//! - Empty columns (all air)
//!
//! ## Thread Safety
//!
//! Each column lives in its own [`MtResource`], so a block edit only write-locks
//! the one column it touches while workers keep reading the others. The world
//! itself is shared as `MtResource<World>`; loading and unloading columns takes
//! the outer write lock.

use std::collections::HashMap;
use std::ops::Range;

use log::trace;

use crate::core::MtResource;
use crate::engine_state::search::world_accessor::{Position, WorldAccessor};
use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::chunk::{BlockLayer, ChunkColumn, ChunkKey};

/// Lowest block Y of a default world.
pub const DEFAULT_MIN_Y: i32 = -64;
/// Number of block layers in a default world.
pub const DEFAULT_HEIGHT: i32 = 384;

/// The method used to generate new columns.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChunkGenerationMethod {
    /// Noise terrain with ore veins, seeded.
    Perlin {
        /// Noise seed
        seed: u32,
    },
    /// Layered terrain with grass at the given Y.
    Flat {
        /// Y of the grass layer
        surface_y: i32,
    },
    /// All air.
    Empty,
}

/// A voxel world composed of loaded chunk columns.
///
/// # Examples
///
/// ```
/// use voxel_area_search::{BlockType, ChunkGenerationMethod, ChunkKey, World};
/// use cgmath::Point3;
///
/// let mut world = World::new(0, 16, ChunkGenerationMethod::Empty);
/// world.add_chunk_at(ChunkKey::ZERO);
///
/// world.set_block_at(Point3::new(1, 2, 3), BlockType::IRON_ORE);
/// assert_eq!(world.get_block_at(Point3::new(1, 2, 3)), Some(BlockType::IRON_ORE));
/// ```
pub struct World {
    /// Loaded columns by key.
    chunks: HashMap<ChunkKey, MtResource<ChunkColumn>>,
    min_y: i32,
    height: i32,
    generation_method: ChunkGenerationMethod,
}

impl World {
    /// Creates a new, empty world spanning `min_y..min_y + height`.
    ///
    /// `height` is clamped to at least one layer.
    pub fn new(min_y: i32, height: i32, generation_method: ChunkGenerationMethod) -> Self {
        World {
            chunks: HashMap::new(),
            min_y,
            height: height.max(1),
            generation_method,
        }
    }

    /// Adds a generated column at `key` if one doesn't already exist.
    pub fn add_chunk_at(&mut self, key: ChunkKey) {
        if self.chunks.contains_key(&key) {
            return;
        }

        let column = self.generate_chunk(key);
        self.chunks.insert(key, MtResource::new(column));
    }

    /// Generates the column at `key` without loading it.
    ///
    /// Only needs shared access, so background tasks can generate under the read
    /// lock and take the write lock just to insert.
    pub fn generate_chunk(&self, key: ChunkKey) -> ChunkColumn {
        let column = match self.generation_method {
            ChunkGenerationMethod::Perlin { seed } => {
                ChunkColumn::perlin(key, self.min_y, self.height, seed)
            }
            ChunkGenerationMethod::Flat { surface_y } => {
                ChunkColumn::flat(key, self.min_y, self.height, surface_y)
            }
            ChunkGenerationMethod::Empty => ChunkColumn::empty(key, self.min_y, self.height),
        };
        trace!("Generated chunk {}", key);
        column
    }

    /// Adds every column within `radius` chunks (square) of `center`.
    pub fn add_chunks_around(&mut self, center: ChunkKey, radius: i32) {
        for x in -radius..=radius {
            for z in -radius..=radius {
                self.add_chunk_at(ChunkKey::new(center.x + x, center.z + z));
            }
        }
    }

    /// Inserts a prebuilt column, replacing any existing one at its key.
    pub fn insert_chunk(&mut self, column: ChunkColumn) {
        self.chunks.insert(column.key, MtResource::new(column));
    }

    /// Unloads the column at `key`.
    pub fn remove_chunk_at(&mut self, key: ChunkKey) -> Option<MtResource<ChunkColumn>> {
        self.chunks.remove(&key)
    }

    /// Retrieves the column at `key`.
    pub fn get_chunk_at(&self, key: ChunkKey) -> Option<MtResource<ChunkColumn>> {
        self.chunks.get(&key).cloned()
    }

    /// Number of loaded columns.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Block Y range of every column.
    pub fn vertical_range(&self) -> Range<i32> {
        self.min_y..self.min_y + self.height
    }

    /// Reads one block; `None` if its column is not loaded or `y` is out of range.
    pub fn get_block_at(&self, position: Position) -> Option<BlockType> {
        let column = self.chunks.get(&ChunkKey::from_position(position))?;
        let column = column.get();
        column.get_block_at(position)
    }

    /// Writes one block and returns the previous kind.
    ///
    /// Returns `None` and changes nothing if the column is not loaded or `y` is out
    /// of range. Callers forward successful edits to the search coordinators as
    /// block-changed notifications.
    pub fn set_block_at(&self, position: Position, block_type: BlockType) -> Option<BlockType> {
        let column = self.chunks.get(&ChunkKey::from_position(position))?;
        let (x, z) = ChunkKey::local_coords(position);
        column.get_mut().set_block(x, position.y, z, block_type)
    }
}

impl WorldAccessor for World {
    fn block_at(&self, position: Position) -> Option<BlockType> {
        self.get_block_at(position)
    }

    fn is_chunk_loaded(&self, key: ChunkKey) -> bool {
        self.chunks.contains_key(&key)
    }

    fn vertical_range(&self) -> Range<i32> {
        World::vertical_range(self)
    }

    fn read_layer(&self, key: ChunkKey, y: i32, layer: &mut BlockLayer) -> bool {
        self.chunks
            .get(&key)
            .is_some_and(|column| column.get().read_layer(y, layer))
    }
}

impl WorldAccessor for MtResource<World> {
    fn block_at(&self, position: Position) -> Option<BlockType> {
        self.get().get_block_at(position)
    }

    fn is_chunk_loaded(&self, key: ChunkKey) -> bool {
        self.get().chunks.contains_key(&key)
    }

    fn vertical_range(&self) -> Range<i32> {
        self.get().vertical_range()
    }

    /// Holds the world lock only for the column lookup, then the column lock for
    /// the copy.
    fn read_layer(&self, key: ChunkKey, y: i32, layer: &mut BlockLayer) -> bool {
        let Some(column) = self.get().get_chunk_at(key) else {
            return false;
        };
        let column = column.get();
        column.read_layer(y, layer)
    }
}
