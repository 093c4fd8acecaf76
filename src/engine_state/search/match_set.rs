//! # Match Set
//!
//! The coordinator's working copy of every chunk's matches, and the immutable
//! snapshots it publishes from it.
//!
//! Consumers only ever see a [`MatchSnapshot`]. A snapshot is built once per
//! observable change and shared as `Arc<MatchSnapshot>`; per-chunk lists are
//! `Arc<[BlockMatch]>`, so chunks that did not change between two snapshots share
//! their storage.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use web_time::Instant;

use crate::engine_state::search::world_accessor::Position;
use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::chunk::ChunkKey;

/// A block that satisfied the query, with the kind it had when tested.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockMatch {
    /// World position of the block
    pub position: Position,
    /// Kind observed when the block matched
    pub block: BlockType,
}

/// One chunk's published match list.
#[derive(Clone, Debug)]
pub struct ChunkMatches {
    /// The chunk the matches belong to
    pub key: ChunkKey,
    /// Matches inside that chunk, in no particular order
    pub matches: Arc<[BlockMatch]>,
    /// Whether the chunk's searcher was done when the snapshot was published.
    /// Lists of chunks awaiting a rescan are published with `ready == false`.
    pub ready: bool,
}

/// An immutable, versioned view of every match in the search area.
///
/// # Examples
///
/// ```
/// use voxel_area_search::MatchSnapshot;
///
/// let snapshot = MatchSnapshot::empty(0);
/// assert_eq!(snapshot.version(), 0);
/// assert!(snapshot.is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct MatchSnapshot {
    version: u64,
    chunks: Vec<ChunkMatches>,
}

impl MatchSnapshot {
    /// A snapshot with no matches.
    pub fn empty(version: u64) -> Self {
        MatchSnapshot {
            version,
            chunks: Vec::new(),
        }
    }

    /// Version this snapshot was published under.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Per-chunk lists, sorted by chunk key.
    pub fn chunks(&self) -> &[ChunkMatches] {
        &self.chunks
    }

    /// The list of one chunk, if it has one.
    pub fn chunk(&self, key: ChunkKey) -> Option<&ChunkMatches> {
        self.chunks
            .binary_search_by_key(&(key.x, key.z), |chunk| (chunk.key.x, chunk.key.z))
            .ok()
            .map(|index| &self.chunks[index])
    }

    /// Every match.
    pub fn iter(&self) -> impl Iterator<Item = &BlockMatch> + '_ {
        self.chunks.iter().flat_map(|chunk| chunk.matches.iter())
    }

    /// Matches from chunks that were done at publication.
    pub fn ready_matches(&self) -> impl Iterator<Item = &BlockMatch> + '_ {
        self.chunks
            .iter()
            .filter(|chunk| chunk.ready)
            .flat_map(|chunk| chunk.matches.iter())
    }

    /// Positions of every match.
    pub fn positions(&self) -> HashSet<Position> {
        self.iter().map(|found| found.position).collect()
    }

    /// Whether `position` is a match.
    pub fn contains(&self, position: Position) -> bool {
        self.chunk(ChunkKey::from_position(position))
            .is_some_and(|chunk| chunk.matches.iter().any(|found| found.position == position))
    }

    /// Total number of matches.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.matches.len()).sum()
    }

    /// Whether there are no matches.
    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(|chunk| chunk.matches.is_empty())
    }
}

struct ChunkMatchState {
    matches: HashMap<Position, BlockType>,
    /// Published list; `None` once a patch changed `matches`.
    published: Option<Arc<[BlockMatch]>>,
    patches_since_scan: u32,
    last_scan: Instant,
}

impl ChunkMatchState {
    fn published(&mut self) -> Arc<[BlockMatch]> {
        let matches = &self.matches;
        self.published
            .get_or_insert_with(|| {
                matches
                    .iter()
                    .map(|(&position, &block)| BlockMatch { position, block })
                    .collect()
            })
            .clone()
    }
}

/// Mutable per-chunk match storage owned by the coordinator.
#[derive(Default)]
pub struct MatchSet {
    chunks: HashMap<ChunkKey, ChunkMatchState>,
}

impl MatchSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        MatchSet::default()
    }

    /// Replaces a chunk's matches with the result of a full scan.
    pub fn replace_chunk(&mut self, key: ChunkKey, matches: Vec<BlockMatch>) {
        let published: Arc<[BlockMatch]> = matches.into();
        let matches = published
            .iter()
            .map(|found| (found.position, found.block))
            .collect();
        self.chunks.insert(
            key,
            ChunkMatchState {
                matches,
                published: Some(published),
                patches_since_scan: 0,
                last_scan: Instant::now(),
            },
        );
    }

    /// Drops a chunk's matches. Returns whether it had any entry.
    pub fn remove_chunk(&mut self, key: ChunkKey) -> bool {
        self.chunks.remove(&key).is_some()
    }

    /// Sets or clears the match at `position` in O(1).
    ///
    /// `block` is the kind now matching there, or `None` if the position no
    /// longer matches. Returns whether the chunk's set changed. Chunks without
    /// a full scan are left alone.
    pub fn patch(&mut self, key: ChunkKey, position: Position, block: Option<BlockType>) -> bool {
        let Some(state) = self.chunks.get_mut(&key) else {
            return false;
        };
        state.patches_since_scan += 1;

        let changed = match block {
            Some(block) => state.matches.insert(position, block) != Some(block),
            None => state.matches.remove(&position).is_some(),
        };
        if changed {
            state.published = None;
        }
        changed
    }

    /// Whether a chunk has a stored list.
    pub fn contains_chunk(&self, key: ChunkKey) -> bool {
        self.chunks.contains_key(&key)
    }

    /// Patches applied to a chunk since its last full scan.
    pub fn patches_since_scan(&self, key: ChunkKey) -> u32 {
        self.chunks
            .get(&key)
            .map_or(0, |state| state.patches_since_scan)
    }

    /// When a chunk's last full scan was merged.
    pub fn last_scan(&self, key: ChunkKey) -> Option<Instant> {
        self.chunks.get(&key).map(|state| state.last_scan)
    }

    /// Number of chunks with a stored list.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Total number of stored matches.
    pub fn total_matches(&self) -> usize {
        self.chunks.values().map(|state| state.matches.len()).sum()
    }

    /// Drops every chunk.
    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    /// Builds a snapshot of every stored chunk. `is_ready` decides which chunks
    /// are flagged ready.
    pub fn snapshot(&mut self, version: u64, is_ready: impl Fn(ChunkKey) -> bool) -> MatchSnapshot {
        let mut chunks: Vec<ChunkMatches> = self
            .chunks
            .iter_mut()
            .map(|(&key, state)| ChunkMatches {
                key,
                matches: state.published(),
                ready: is_ready(key),
            })
            .collect();
        chunks.sort_unstable_by_key(|chunk| (chunk.key.x, chunk.key.z));

        MatchSnapshot { version, chunks }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Point3;

    use super::*;

    fn ore(x: i32, y: i32, z: i32) -> BlockMatch {
        BlockMatch {
            position: Point3::new(x, y, z),
            block: BlockType::IRON_ORE,
        }
    }

    #[test]
    fn snapshot_reuses_unpatched_lists() {
        let mut set = MatchSet::new();
        set.replace_chunk(ChunkKey::ZERO, vec![ore(1, 1, 1), ore(2, 2, 2)]);
        set.replace_chunk(ChunkKey::new(1, 0), vec![ore(17, 0, 0)]);

        let first = set.snapshot(1, |_| true);
        set.patch(ChunkKey::new(1, 0), Point3::new(18, 0, 0), Some(BlockType::IRON_ORE));
        let second = set.snapshot(2, |_| true);

        let unchanged = |snapshot: &MatchSnapshot| snapshot.chunk(ChunkKey::ZERO).unwrap().matches.clone();
        assert!(Arc::ptr_eq(&unchanged(&first), &unchanged(&second)));
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 4);
        assert!(second.contains(Point3::new(18, 0, 0)));
    }

    #[test]
    fn patch_reports_only_real_changes() {
        let mut set = MatchSet::new();
        set.replace_chunk(ChunkKey::ZERO, vec![ore(1, 1, 1)]);

        assert!(!set.patch(ChunkKey::ZERO, Point3::new(1, 1, 1), Some(BlockType::IRON_ORE)));
        assert!(set.patch(ChunkKey::ZERO, Point3::new(1, 1, 1), Some(BlockType::GOLD_ORE)));
        assert!(set.patch(ChunkKey::ZERO, Point3::new(1, 1, 1), None));
        assert!(!set.patch(ChunkKey::ZERO, Point3::new(1, 1, 1), None));
        assert_eq!(set.patches_since_scan(ChunkKey::ZERO), 4);

        assert!(!set.patch(ChunkKey::new(9, 9), Point3::new(145, 0, 145), None));
        assert!(!set.contains_chunk(ChunkKey::new(9, 9)));
    }

    #[test]
    fn rescan_resets_patch_count() {
        let mut set = MatchSet::new();
        set.replace_chunk(ChunkKey::ZERO, Vec::new());
        set.patch(ChunkKey::ZERO, Point3::new(0, 0, 0), Some(BlockType::COAL_ORE));
        set.replace_chunk(ChunkKey::ZERO, Vec::new());
        assert_eq!(set.patches_since_scan(ChunkKey::ZERO), 0);
        assert_eq!(set.total_matches(), 0);
    }

    #[test]
    fn ready_flags_filter_ready_matches() {
        let mut set = MatchSet::new();
        set.replace_chunk(ChunkKey::ZERO, vec![ore(1, 1, 1)]);
        set.replace_chunk(ChunkKey::new(-1, 0), vec![ore(-1, 1, 1)]);

        let snapshot = set.snapshot(3, |key| key == ChunkKey::ZERO);
        let ready: Vec<_> = snapshot.ready_matches().copied().collect();

        assert_eq!(ready, vec![ore(1, 1, 1)]);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.chunks()[0].key, ChunkKey::new(-1, 0));
    }
}
