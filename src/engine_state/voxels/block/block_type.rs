//! # Block Type Module
//!
//! This module defines the different kinds of blocks a world accessor can report.
//! Search queries are written against these kinds.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use super::BlockTypeSize;

/// Enumerates all block kinds known to the engine.
///
/// The `FromPrimitive` derive allows conversion from the compact storage byte
/// used by [`Block`](super::Block).
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
pub enum BlockType {
    /// Empty space.
    AIR,
    /// Base terrain rock.
    STONE,
    /// Soil layer below the surface.
    DIRT,
    /// Surface block.
    GRASS,
    /// Tree trunk.
    WOOD,
    /// Common ore.
    COAL_ORE,
    /// Ore found at medium depth.
    IRON_ORE,
    /// Ore found deep underground.
    GOLD_ORE,
    /// Rarest ore, only near the bottom of the world.
    DIAMOND_ORE,
    /// Liquid water.
    WATER,
    /// Liquid lava.
    LAVA,
    /// Unbreakable floor of the world.
    BEDROCK,
}

impl BlockType {
    /// Converts a `BlockTypeSize` back to a `BlockType`.
    ///
    /// Returns `None` for bytes that do not name a block kind.
    pub fn from_int(btype: BlockTypeSize) -> Option<Self> {
        FromPrimitive::from_u8(btype)
    }

    /// `true` for the ore kinds.
    pub fn is_ore(self) -> bool {
        matches!(
            self,
            BlockType::COAL_ORE | BlockType::IRON_ORE | BlockType::GOLD_ORE | BlockType::DIAMOND_ORE
        )
    }

    /// Picks a random ore, weighted towards the common kinds.
    pub fn get_random_ore(rng: &mut fastrand::Rng) -> Self {
        match rng.u8(0..100) {
            0..=54 => BlockType::COAL_ORE,
            55..=84 => BlockType::IRON_ORE,
            85..=96 => BlockType::GOLD_ORE,
            _ => BlockType::DIAMOND_ORE,
        }
    }
}
