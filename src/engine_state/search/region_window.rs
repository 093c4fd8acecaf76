//! # Region Window
//!
//! The set of chunk columns a search covers: a square of `(2r + 1)²` columns
//! centered on the reference chunk. Every recenter or resize reports which keys
//! entered and which left, so the coordinator can start and evict searchers
//! without diffing its whole table.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::engine_state::voxels::chunk::ChunkKey;

/// Largest supported radius (65×65 = 4225 columns).
pub const MAX_AREA_RADIUS: u32 = 32;

/// Search radius in chunks.
///
/// # Examples
///
/// ```
/// use voxel_area_search::AreaSpec;
///
/// let area = AreaSpec::chunks_across(5);
/// assert_eq!(area.radius, 2);
/// assert_eq!(area.chunk_count(), 25);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AreaSpec {
    /// Columns searched on each side of the center column
    pub radius: u32,
}

impl AreaSpec {
    /// Just the center column.
    pub const SINGLE_CHUNK: AreaSpec = AreaSpec { radius: 0 };

    /// Creates an area of the given radius, capped at [`MAX_AREA_RADIUS`].
    pub const fn new(radius: u32) -> Self {
        let radius = if radius > MAX_AREA_RADIUS {
            MAX_AREA_RADIUS
        } else {
            radius
        };
        AreaSpec { radius }
    }

    /// The area `chunks` columns wide, as listed in area menus (3, 5, ... 65).
    ///
    /// Even widths round down to the next odd width.
    pub const fn chunks_across(chunks: u32) -> Self {
        AreaSpec::new(chunks.saturating_sub(1) / 2)
    }

    /// Columns along one side of the window.
    pub const fn side_length(self) -> u32 {
        self.radius * 2 + 1
    }

    /// Columns in the window.
    pub const fn chunk_count(self) -> usize {
        let side = self.side_length() as usize;
        side * side
    }
}

impl Default for AreaSpec {
    fn default() -> Self {
        AreaSpec::chunks_across(11)
    }
}

/// When [`SearchCoordinator::update`](crate::SearchCoordinator::update) moves the
/// window.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecenterPolicy {
    /// Recenter whenever the reference point enters a different chunk.
    #[default]
    FollowChunk,
    /// Recenter only once the reference chunk leaves the current window.
    Sticky,
}

/// Keys gained and lost by a window change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WindowDiff {
    /// Keys now inside the window that were not before
    pub entered: HashSet<ChunkKey>,
    /// Keys that were inside the window and no longer are
    pub left: HashSet<ChunkKey>,
}

impl WindowDiff {
    /// Whether the window is unchanged.
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.left.is_empty()
    }
}

/// The chunk columns currently subject to search.
#[derive(Clone, Debug)]
pub struct RegionWindow {
    center: Option<ChunkKey>,
    area: AreaSpec,
    keys: HashSet<ChunkKey>,
}

impl RegionWindow {
    /// Creates an uncentered, empty window.
    pub fn new(area: AreaSpec) -> Self {
        RegionWindow {
            center: None,
            area: AreaSpec::new(area.radius),
            keys: HashSet::new(),
        }
    }

    /// The center column, once the window has been centered.
    pub fn center(&self) -> Option<ChunkKey> {
        self.center
    }

    /// The current radius.
    pub fn area(&self) -> AreaSpec {
        self.area
    }

    /// Whether `key` is inside the window.
    pub fn contains(&self, key: ChunkKey) -> bool {
        self.keys.contains(&key)
    }

    /// Every key inside the window.
    pub fn keys(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        self.keys.iter().copied()
    }

    /// Number of keys inside the window.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the window is empty (it is until first centered).
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Moves the window to `center`. Recentering on the current center yields an
    /// empty diff.
    pub fn recenter(&mut self, center: ChunkKey) -> WindowDiff {
        if self.center == Some(center) {
            return WindowDiff::default();
        }
        self.center = Some(center);
        self.rebuild()
    }

    /// Changes the radius around the current center.
    ///
    /// An uncentered window only records the new radius.
    pub fn resize(&mut self, area: AreaSpec) -> WindowDiff {
        let area = AreaSpec::new(area.radius);
        if self.area == area {
            return WindowDiff::default();
        }
        self.area = area;
        self.rebuild()
    }

    /// Forgets the center and every key. The radius is kept.
    pub fn clear(&mut self) -> WindowDiff {
        self.center = None;
        WindowDiff {
            entered: HashSet::new(),
            left: std::mem::take(&mut self.keys),
        }
    }

    fn rebuild(&mut self) -> WindowDiff {
        let keys = match self.center {
            Some(center) => Self::square_around(center, self.area),
            None => HashSet::new(),
        };

        let entered = keys.difference(&self.keys).copied().collect();
        let left = self.keys.difference(&keys).copied().collect();
        self.keys = keys;

        WindowDiff { entered, left }
    }

    fn square_around(center: ChunkKey, area: AreaSpec) -> HashSet<ChunkKey> {
        let radius = area.radius as i32;
        let mut keys = HashSet::with_capacity(area.chunk_count());
        for x in -radius..=radius {
            for z in -radius..=radius {
                keys.insert(ChunkKey::new(center.x + x, center.z + z));
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_recenter_enters_whole_square() {
        let mut window = RegionWindow::new(AreaSpec::new(1));
        let diff = window.recenter(ChunkKey::new(-1, 4));

        assert_eq!(diff.entered.len(), 9);
        assert!(diff.left.is_empty());
        assert!(window.contains(ChunkKey::new(-2, 3)));
        assert!(window.contains(ChunkKey::new(0, 5)));
        assert!(!window.contains(ChunkKey::new(1, 4)));

        assert_eq!(window.keys().collect::<HashSet<_>>(), diff.entered);
    }

    #[test]
    fn recenter_on_same_key_is_a_no_op() {
        let mut window = RegionWindow::new(AreaSpec::new(2));
        window.recenter(ChunkKey::ZERO);
        assert!(window.recenter(ChunkKey::ZERO).is_empty());
        assert_eq!(window.len(), 25);
    }

    #[test]
    fn moving_one_chunk_shifts_one_row() {
        let mut window = RegionWindow::new(AreaSpec::new(1));
        window.recenter(ChunkKey::ZERO);
        let diff = window.recenter(ChunkKey::new(1, 0));

        let entered: HashSet<_> = (-1..=1).map(|z| ChunkKey::new(2, z)).collect();
        let left: HashSet<_> = (-1..=1).map(|z| ChunkKey::new(-1, z)).collect();
        assert_eq!(diff.entered, entered);
        assert_eq!(diff.left, left);
    }

    #[test]
    fn shrink_reports_the_outer_ring() {
        let mut window = RegionWindow::new(AreaSpec::new(2));
        window.recenter(ChunkKey::new(3, 3));
        let diff = window.resize(AreaSpec::new(1));

        assert!(diff.entered.is_empty());
        assert_eq!(diff.left.len(), 16);
        assert!(diff.left.iter().all(|key| key.chebyshev_distance(ChunkKey::new(3, 3)) == 2));
        assert_eq!(window.len(), 9);
    }

    #[test]
    fn resize_before_centering_only_records_radius() {
        let mut window = RegionWindow::new(AreaSpec::new(1));
        assert!(window.resize(AreaSpec::new(3)).is_empty());
        assert_eq!(window.area(), AreaSpec::new(3));
        assert!(window.is_empty());
    }

    #[test]
    fn radius_is_capped() {
        assert_eq!(AreaSpec::new(1000).radius, MAX_AREA_RADIUS);
        assert_eq!(AreaSpec::chunks_across(65).chunk_count(), 4225);
        assert_eq!(AreaSpec::chunks_across(4), AreaSpec::new(1));
        assert_eq!(AreaSpec::chunks_across(0), AreaSpec::SINGLE_CHUNK);
    }

    #[test]
    fn clear_keeps_radius() {
        let mut window = RegionWindow::new(AreaSpec::new(1));
        window.recenter(ChunkKey::ZERO);
        let diff = window.clear();
        assert_eq!(diff.left.len(), 9);
        assert!(window.center().is_none());
        assert_eq!(window.area(), AreaSpec::new(1));
    }
}
