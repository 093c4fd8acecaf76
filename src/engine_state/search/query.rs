//! # Block Query
//!
//! The caller-supplied test a search runs against every block in its area.

use std::fmt;
use std::sync::Arc;

use crate::engine_state::search::world_accessor::Position;
use crate::engine_state::voxels::block::block_type::BlockType;

type QueryFn = dyn Fn(Position, BlockType) -> bool + Send + Sync;

/// An opaque, shareable block predicate.
///
/// Cloning is cheap: every clone shares the same closure. Workers capture a clone
/// when their scan starts and never look at later queries.
///
/// # Examples
///
/// ```
/// use voxel_area_search::{BlockQuery, BlockType};
/// use cgmath::Point3;
///
/// let query = BlockQuery::new(|position, block| block.is_ore() && position.y < 0);
/// assert!(query.test(Point3::new(0, -10, 0), BlockType::IRON_ORE));
/// assert!(!query.test(Point3::new(0, 10, 0), BlockType::IRON_ORE));
/// ```
#[derive(Clone)]
pub struct BlockQuery {
    test: Arc<QueryFn>,
}

impl BlockQuery {
    /// Wraps a closure as a query.
    pub fn new<F>(test: F) -> Self
    where
        F: Fn(Position, BlockType) -> bool + Send + Sync + 'static,
    {
        BlockQuery {
            test: Arc::new(test),
        }
    }

    /// Matches blocks of exactly one kind.
    pub fn matching_type(block_type: BlockType) -> Self {
        BlockQuery::new(move |_, block| block == block_type)
    }

    /// Matches blocks of any of the given kinds.
    pub fn matching_any(block_types: impl IntoIterator<Item = BlockType>) -> Self {
        let block_types: Vec<BlockType> = block_types.into_iter().collect();
        BlockQuery::new(move |_, block| block_types.contains(&block))
    }

    /// Runs the predicate.
    #[inline]
    pub fn test(&self, position: Position, block: BlockType) -> bool {
        (self.test)(position, block)
    }
}

impl fmt::Debug for BlockQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockQuery").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Point3;

    use super::*;

    #[test]
    fn matching_type_ignores_position() {
        let query = BlockQuery::matching_type(BlockType::COAL_ORE);
        assert!(query.test(Point3::new(-100, 5, 3), BlockType::COAL_ORE));
        assert!(!query.test(Point3::new(-100, 5, 3), BlockType::IRON_ORE));
    }

    #[test]
    fn matching_any_accepts_listed_kinds() {
        let query = BlockQuery::matching_any([BlockType::WATER, BlockType::LAVA]);
        assert!(query.test(Point3::new(0, 0, 0), BlockType::LAVA));
        assert!(query.test(Point3::new(0, 0, 0), BlockType::WATER));
        assert!(!query.test(Point3::new(0, 0, 0), BlockType::STONE));
    }

    #[test]
    fn clones_share_the_closure() {
        let query = BlockQuery::new(|position, _| position.x == 7);
        let clone = query.clone();
        assert!(Arc::ptr_eq(&query.test, &clone.test));
        assert!(clone.test(Point3::new(7, 0, 0), BlockType::AIR));
    }
}
