//! # Chunk Key
//!
//! Horizontal chunk coordinates. A key names one full-height column of
//! `CHUNK_DIMENSION` x `CHUNK_DIMENSION` blocks.

use std::fmt;

use cgmath::Point3;
use serde::{Deserialize, Serialize};

use super::CHUNK_DIMENSION;

/// Identifies one vertical chunk column by its horizontal chunk coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    /// Chunk coordinate along the X axis.
    pub x: i32,
    /// Chunk coordinate along the Z axis.
    pub z: i32,
}

impl ChunkKey {
    /// The column containing the world origin.
    pub const ZERO: ChunkKey = ChunkKey { x: 0, z: 0 };

    /// Creates a key from chunk coordinates.
    pub const fn new(x: i32, z: i32) -> Self {
        ChunkKey { x, z }
    }

    /// Returns the key of the column containing a block position.
    ///
    /// Uses floored division so block `x = -1` lands in chunk `x = -1`.
    pub fn from_position(position: Point3<i32>) -> Self {
        ChunkKey {
            x: position.x.div_euclid(CHUNK_DIMENSION),
            z: position.z.div_euclid(CHUNK_DIMENSION),
        }
    }

    /// Block coordinates `(x, z)` of the column's minimum corner.
    pub fn origin(self) -> (i32, i32) {
        (self.x * CHUNK_DIMENSION, self.z * CHUNK_DIMENSION)
    }

    /// Whether a block position lies inside this column (any height).
    pub fn contains(self, position: Point3<i32>) -> bool {
        ChunkKey::from_position(position) == self
    }

    /// Converts a block position to local column coordinates `(x, z)`.
    pub fn local_coords(position: Point3<i32>) -> (usize, usize) {
        (
            position.x.rem_euclid(CHUNK_DIMENSION) as usize,
            position.z.rem_euclid(CHUNK_DIMENSION) as usize,
        )
    }

    /// Square-ring distance, the metric the search window is built on.
    pub fn chebyshev_distance(self, other: ChunkKey) -> u32 {
        self.x.abs_diff(other.x).max(self.z.abs_diff(other.z))
    }

    /// Squared euclidean distance in chunk units, used to order scans.
    pub fn distance_squared(self, other: ChunkKey) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dz = i64::from(self.z) - i64::from(other.z);
        dx * dx + dz * dz
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_positions_floor_into_negative_chunks() {
        assert_eq!(ChunkKey::from_position(Point3::new(-1, 70, -1)), ChunkKey::new(-1, -1));
        assert_eq!(ChunkKey::from_position(Point3::new(-16, 0, 15)), ChunkKey::new(-1, 0));
        assert_eq!(ChunkKey::from_position(Point3::new(-17, 0, 16)), ChunkKey::new(-2, 1));
    }

    #[test]
    fn local_coords_stay_in_range() {
        assert_eq!(ChunkKey::local_coords(Point3::new(-1, 0, 17)), (15, 1));
        assert_eq!(ChunkKey::local_coords(Point3::new(32, 0, -32)), (0, 0));
    }

    #[test]
    fn origin_and_contains_agree() {
        let key = ChunkKey::new(-3, 2);
        let (ox, oz) = key.origin();
        assert!(key.contains(Point3::new(ox, -60, oz)));
        assert!(key.contains(Point3::new(ox + 15, 100, oz + 15)));
        assert!(!key.contains(Point3::new(ox + 16, 0, oz)));
    }

    #[test]
    fn distances() {
        let a = ChunkKey::new(0, 0);
        let b = ChunkKey::new(-2, 3);
        assert_eq!(a.chebyshev_distance(b), 3);
        assert_eq!(a.distance_squared(b), 13);
    }
}
