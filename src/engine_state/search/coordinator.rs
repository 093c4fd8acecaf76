//! # Search Coordinator
//!
//! Owns one search: the region window, a searcher per chunk in it, the worker
//! pool the scans run on, and the published [`MatchSnapshot`].
//!
//! All methods are called from a single owning thread, typically once per tick
//! via [`SearchCoordinator::update`]. Workers never touch coordinator state;
//! their results are drained and merged during `update`, and every merge of one
//! call is published under a single version bump.
//!
//! ## Invalidation
//!
//! - A new query discards every result. The previous snapshot stays published
//!   until the first result of the new query lands.
//! - Chunks leaving the window are evicted and their matches unpublished at once.
//! - A block change in a done chunk is re-tested and patched in place, unless the
//!   chunk's last full scan is too old or too heavily patched, in which case the
//!   chunk is rescanned. A block change in a chunk being scanned is re-tested when
//!   that scan is merged.

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error, info, trace};
use web_time::Instant;

use crate::config::SearchConfig;
use crate::engine_state::search::chunk_searcher::{
    panic_message, ChunkSearchResult, ChunkSearchTask, ChunkSearcher, SearchOutcome, SearchTicket,
    SearcherState,
};
use crate::engine_state::search::match_set::{BlockMatch, MatchSet, MatchSnapshot};
use crate::engine_state::search::query::BlockQuery;
use crate::engine_state::search::region_window::{AreaSpec, RecenterPolicy, RegionWindow, WindowDiff};
use crate::engine_state::search::world_accessor::{Position, WorldAccessor};
use crate::engine_state::task_management::TaskManager;
use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::chunk::ChunkKey;
use crate::error::SearchError;

/// Searcher and pool counters, for overlays and logs.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchDebugInfo {
    /// Chunks in the window
    pub window_chunks: usize,
    /// Searchers waiting to start
    pub pending: usize,
    /// Searchers with a scan on a worker
    pub running: usize,
    /// Searchers whose matches are current
    pub done: usize,
    /// Cancelled scans still running on a worker
    pub cancelled: usize,
    /// Searchers whose query panicked
    pub failed: usize,
    /// Matches in the working set
    pub total_matches: usize,
    /// Scans handed to workers and not yet collected
    pub tasks_in_flight: usize,
    /// Published version
    pub version: u64,
}

enum Retest {
    Matches(BlockType),
    NoMatch,
    Unloaded,
}

/// Incremental, background block search over a window of chunks.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use cgmath::Point3;
/// use voxel_area_search::{
///     AreaSpec, BlockQuery, BlockType, ChunkGenerationMethod, ChunkKey, MtResource,
///     SearchConfig, SearchCoordinator, World,
/// };
///
/// let mut world = World::new(0, 16, ChunkGenerationMethod::Flat { surface_y: 8 });
/// world.add_chunks_around(ChunkKey::ZERO, 1);
/// world.set_block_at(Point3::new(3, 2, -7), BlockType::DIAMOND_ORE);
///
/// let config = SearchConfig { area: AreaSpec::new(1), ..SearchConfig::default() };
/// let mut search = SearchCoordinator::with_query(
///     Arc::new(MtResource::new(world)),
///     config,
///     BlockQuery::matching_type(BlockType::DIAMOND_ORE),
/// )
/// .unwrap();
///
/// while !search.is_done() {
///     search.update(Point3::new(0, 8, 0));
///     std::thread::sleep(std::time::Duration::from_millis(1));
/// }
/// let matches = search.get_matches();
/// assert!(matches.contains(Point3::new(3, 2, -7)));
/// assert_eq!(matches.len(), 1);
/// ```
pub struct SearchCoordinator {
    world: Arc<dyn WorldAccessor>,
    config: SearchConfig,
    query: Option<BlockQuery>,
    /// Bumped on every query change.
    generation: u64,
    window: RegionWindow,
    searchers: HashMap<ChunkKey, ChunkSearcher>,
    /// Cancelled scans whose result has not come back yet. Their chunk is not
    /// restarted until it does.
    retired: HashMap<ChunkKey, SearchTicket>,
    /// Positions changed while their chunk was being scanned.
    changed_while_running: HashMap<ChunkKey, HashSet<Position>>,
    matches: MatchSet,
    published: Arc<MatchSnapshot>,
    version: u64,
    dirty: bool,
    pool: Option<TaskManager<ChunkSearchTask>>,
    next_ticket: u64,
    last_error: Option<SearchError>,
}

impl SearchCoordinator {
    /// Creates a coordinator with no query. Nothing is scanned until
    /// [`set_query`](Self::set_query) is called.
    ///
    /// The worker pool is started by the first `update` that has work for it.
    pub fn new(world: Arc<dyn WorldAccessor>, config: SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        Ok(SearchCoordinator {
            world,
            window: RegionWindow::new(config.area),
            config,
            query: None,
            generation: 0,
            searchers: HashMap::new(),
            retired: HashMap::new(),
            changed_while_running: HashMap::new(),
            matches: MatchSet::new(),
            published: Arc::new(MatchSnapshot::empty(0)),
            version: 0,
            dirty: false,
            pool: None,
            next_ticket: 0,
            last_error: None,
        })
    }

    /// Creates a coordinator that starts searching for `query` on the first
    /// `update`.
    pub fn with_query(
        world: Arc<dyn WorldAccessor>,
        config: SearchConfig,
        query: BlockQuery,
    ) -> Result<Self, SearchError> {
        let mut coordinator = Self::new(world, config)?;
        coordinator.set_query(query);
        Ok(coordinator)
    }

    /// The active configuration. `area` tracks [`set_area`](Self::set_area).
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The current query.
    pub fn query(&self) -> Option<&BlockQuery> {
        self.query.as_ref()
    }

    /// The current search radius.
    pub fn area(&self) -> AreaSpec {
        self.window.area()
    }

    /// The chunk the window is centered on, once `update` has run.
    pub fn center(&self) -> Option<ChunkKey> {
        self.window.center()
    }

    /// State of the searcher for `key`, if `key` is in the window.
    pub fn searcher_state(&self, key: ChunkKey) -> Option<SearcherState> {
        self.searchers.get(&key).map(ChunkSearcher::state)
    }

    /// Replaces the query.
    ///
    /// Running scans are cancelled and every chunk is queued for a fresh scan.
    /// The published snapshot is left alone until the first new result lands.
    pub fn set_query(&mut self, query: BlockQuery) {
        self.generation += 1;
        for searcher in self.searchers.values_mut() {
            retire_running(searcher, &mut self.retired);
            searcher.requeue();
        }
        self.changed_while_running.clear();
        self.matches.clear();
        self.query = Some(query);

        info!(
            "Search query replaced (generation {}), {} chunks queued",
            self.generation,
            self.searchers.len()
        );
    }

    /// Changes the search radius around the current center.
    ///
    /// Chunks that left the window are evicted; if any of them had published
    /// matches, a new snapshot is published immediately. Returns whether it was.
    pub fn set_area(&mut self, area: AreaSpec) -> bool {
        let diff = self.window.resize(area);
        self.config.area = self.window.area();
        if !diff.is_empty() {
            info!(
                "Search area set to radius {}: {} chunks entered, {} left",
                self.window.area().radius,
                diff.entered.len(),
                diff.left.len()
            );
        }
        self.apply_diff(diff);
        self.publish_if_dirty()
    }

    /// Advances the search by one tick.
    ///
    /// Recenters the window on `reference` as the recenter policy dictates,
    /// merges every finished scan, and starts pending chunks closest-first
    /// within the per-update budget. Never blocks on a worker.
    ///
    /// Returns whether a new snapshot was published.
    pub fn update(&mut self, reference: Position) -> bool {
        let start = Instant::now();
        let reference_chunk = ChunkKey::from_position(reference);

        let recenter = match (self.window.center(), self.config.recenter) {
            (None, _) => true,
            (Some(center), RecenterPolicy::FollowChunk) => center != reference_chunk,
            (Some(_), RecenterPolicy::Sticky) => !self.window.contains(reference_chunk),
        };
        if recenter {
            let diff = self.window.recenter(reference_chunk);
            trace!(
                "Window recentered on {}: {} entered, {} left",
                reference_chunk,
                diff.entered.len(),
                diff.left.len()
            );
            self.apply_diff(diff);
        }

        let merged = self.harvest();
        let started = self.start_pending();
        let changed = self.publish_if_dirty();

        if merged > 0 || started > 0 || changed {
            debug!(
                "Search update: merged {}, started {}, version {}, took {:?}",
                merged,
                started,
                self.version,
                start.elapsed()
            );
        }
        changed
    }

    /// Feeds one block change into the search. Returns whether a new snapshot
    /// was published.
    pub fn on_world_block_changed(&mut self, position: Position) -> bool {
        self.apply_block_change(position);
        self.publish_if_dirty()
    }

    /// Feeds a batch of block changes into the search under one version bump.
    pub fn on_world_blocks_changed(&mut self, positions: impl IntoIterator<Item = Position>) -> bool {
        for position in positions {
            self.apply_block_change(position);
        }
        self.publish_if_dirty()
    }

    /// Queues a full rescan of `key`, e.g. after the chunk was reloaded. Its last
    /// known matches stay published until the rescan lands.
    pub fn on_chunk_changed(&mut self, key: ChunkKey) -> bool {
        let rescan = matches!(
            self.searcher_state(key),
            Some(SearcherState::Done | SearcherState::Running | SearcherState::Failed)
        );
        if rescan {
            trace!("Chunk {} changed, queued for rescan", key);
            self.requeue_chunk(key);
        }
        self.publish_if_dirty()
    }

    /// The published snapshot.
    pub fn get_matches(&self) -> Arc<MatchSnapshot> {
        self.published.clone()
    }

    /// Published matches of chunks that were done at publication.
    pub fn get_ready_matches(&self) -> Vec<BlockMatch> {
        self.published.ready_matches().copied().collect()
    }

    /// Whether every chunk in the window has been scanned.
    pub fn is_done(&self) -> bool {
        !self.searchers.is_empty()
            && self
                .searchers
                .values()
                .all(|searcher| searcher.state() == SearcherState::Done)
    }

    /// Whether at least one chunk in the window has been scanned.
    pub fn has_ready_matches(&self) -> bool {
        self.searchers
            .values()
            .any(|searcher| searcher.state() == SearcherState::Done)
    }

    /// Version of the published snapshot. Never decreases.
    pub fn get_matches_version(&self) -> u64 {
        self.version
    }

    /// The most recent error, such as a query panic.
    pub fn last_error(&self) -> Option<&SearchError> {
        self.last_error.as_ref()
    }

    /// Takes the most recent error, clearing it.
    pub fn take_last_error(&mut self) -> Option<SearchError> {
        self.last_error.take()
    }

    /// Stops the search and publishes an empty snapshot.
    ///
    /// Cancels every scan and joins the worker pool; this blocks until each
    /// running scan reaches its next cancellation check. The query, the area and
    /// the configuration are kept, so the next `update` starts over.
    pub fn reset(&mut self) {
        self.cancel_all();
        if let Some(mut pool) = self.pool.take() {
            pool.shutdown();
        }

        self.searchers.clear();
        self.retired.clear();
        self.changed_while_running.clear();
        self.matches.clear();
        self.window.clear();
        self.last_error = None;
        self.dirty = false;

        self.version += 1;
        self.published = Arc::new(MatchSnapshot::empty(self.version));
        info!("Search reset (version {})", self.version);
    }

    /// Counters describing the current state.
    pub fn debug_info(&self) -> SearchDebugInfo {
        let mut info = SearchDebugInfo {
            window_chunks: self.window.len(),
            cancelled: self.retired.len(),
            total_matches: self.matches.total_matches(),
            tasks_in_flight: self.pool.as_ref().map_or(0, |pool| {
                pool.tasks_in_flight() + pool.queued_task_count()
            }),
            version: self.version,
            ..SearchDebugInfo::default()
        };
        for searcher in self.searchers.values() {
            match searcher.state() {
                SearcherState::Pending => info.pending += 1,
                SearcherState::Running => info.running += 1,
                SearcherState::Done => info.done += 1,
                SearcherState::Cancelled => info.cancelled += 1,
                SearcherState::Failed => info.failed += 1,
            }
        }
        info
    }

    fn apply_diff(&mut self, diff: WindowDiff) {
        for key in diff.left {
            if let Some(mut searcher) = self.searchers.remove(&key) {
                retire_running(&mut searcher, &mut self.retired);
            }
            self.changed_while_running.remove(&key);
            let had_working = self.matches.remove_chunk(key);
            if had_working || self.published.chunk(key).is_some() {
                self.dirty = true;
            }
        }
        for key in diff.entered {
            self.searchers
                .entry(key)
                .or_insert_with(|| ChunkSearcher::new(key));
        }
        debug_assert!(
            self.searchers.len() == self.window.len()
                && self.window.keys().all(|key| self.searchers.contains_key(&key)),
            "searchers out of step with the window"
        );
    }

    /// Drains finished scans and merges the accepted ones. Returns how many
    /// were merged.
    fn harvest(&mut self) -> usize {
        let results = match self.pool.as_mut() {
            Some(pool) => pool.process_completed_tasks(),
            None => return 0,
        };

        let mut merged = 0;
        for result in results {
            if self.retired.get(&result.key) == Some(&result.ticket) {
                self.retired.remove(&result.key);
                trace!("Dropped cancelled scan {} of chunk {}", result.ticket, result.key);
                continue;
            }
            if self.merge(result) {
                merged += 1;
            }
        }
        merged
    }

    fn merge(&mut self, result: ChunkSearchResult) -> bool {
        let key = result.key;
        let accepted = result.generation == self.generation
            && self
                .searchers
                .get(&key)
                .is_some_and(|searcher| searcher.accepts(&result));
        if !accepted {
            trace!("Dropped stale scan {} of chunk {}", result.ticket, key);
            return false;
        }

        let changed = self.changed_while_running.remove(&key);
        match result.outcome {
            SearchOutcome::Completed(matches) => {
                trace!(
                    "Chunk {} scanned in {:?}: {} matches",
                    key,
                    result.elapsed,
                    matches.len()
                );
                if let Some(searcher) = self.searchers.get_mut(&key) {
                    searcher.complete();
                }
                self.matches.replace_chunk(key, matches);
                self.dirty = true;
                if let Some(positions) = changed {
                    self.retest_changed(key, positions);
                }
                true
            }
            SearchOutcome::NotLoaded | SearchOutcome::Cancelled => {
                trace!("Chunk {} not available, back to pending", key);
                if let Some(searcher) = self.searchers.get_mut(&key) {
                    searcher.requeue();
                }
                false
            }
            SearchOutcome::Failed(message) => {
                self.fail_chunk(key, message);
                false
            }
        }
    }

    /// Re-tests positions that changed while `key` was being scanned.
    fn retest_changed(&mut self, key: ChunkKey, positions: HashSet<Position>) {
        if positions.len() > self.config.rescan.max_patches as usize {
            self.requeue_chunk(key);
            return;
        }
        for position in positions {
            if !self.patch_position(key, position) {
                return;
            }
        }
    }

    fn start_pending(&mut self) -> usize {
        let (Some(query), Some(center)) = (self.query.clone(), self.window.center()) else {
            return 0;
        };

        let mut candidates: Vec<ChunkKey> = self
            .searchers
            .values()
            .filter(|searcher| searcher.state() == SearcherState::Pending)
            .map(ChunkSearcher::key)
            .filter(|key| !self.retired.contains_key(key))
            .collect();
        if candidates.is_empty() {
            return 0;
        }
        candidates.sort_unstable_by_key(|key| (key.distance_squared(center), key.x, key.z));

        if self.pool.is_none() {
            let workers = self.config.resolved_worker_count();
            match TaskManager::new(workers, self.config.max_in_flight_per_worker) {
                Ok(pool) => self.pool = Some(pool),
                Err(err) => {
                    error!("Could not start search workers: {}", err);
                    self.last_error = Some(err);
                    return 0;
                }
            }
        }
        let Some(pool) = self.pool.as_mut() else {
            return 0;
        };
        pool.process_queued_tasks();

        let mut started = 0;
        for key in candidates {
            if started >= self.config.max_starts_per_update || !pool.has_capacity() {
                break;
            }
            if !self.world.is_chunk_loaded(key) {
                continue;
            }
            let Some(searcher) = self.searchers.get_mut(&key) else {
                continue;
            };

            let ticket = SearchTicket(self.next_ticket);
            self.next_ticket += 1;
            let cancel = searcher.start(ticket);
            pool.publish_task(ChunkSearchTask::new(
                key,
                ticket,
                self.generation,
                query.clone(),
                self.world.clone(),
                cancel,
            ));
            started += 1;
        }
        started
    }

    fn apply_block_change(&mut self, position: Position) {
        let key = ChunkKey::from_position(position);
        if self.query.is_none() || !self.world.vertical_range().contains(&position.y) {
            return;
        }

        match self.searcher_state(key) {
            Some(SearcherState::Running) => {
                let limit = self.config.rescan.max_patches as usize;
                let changed = self.changed_while_running.entry(key).or_default();
                if changed.len() <= limit {
                    changed.insert(position);
                }
            }
            Some(SearcherState::Done) => {
                if self.needs_rescan(key) {
                    trace!("Chunk {} exceeded its patch budget, rescanning", key);
                    self.requeue_chunk(key);
                } else {
                    self.patch_position(key, position);
                }
            }
            _ => {}
        }
    }

    fn needs_rescan(&self, key: ChunkKey) -> bool {
        let policy = self.config.rescan;
        self.matches.patches_since_scan(key) >= policy.max_patches
            || self
                .matches
                .last_scan(key)
                .map_or(true, |scanned| scanned.elapsed() >= policy.max_age())
    }

    /// Re-tests one position of a done chunk and patches its matches. Returns
    /// `false` if the chunk had to be requeued or failed instead.
    fn patch_position(&mut self, key: ChunkKey, position: Position) -> bool {
        match self.retest(position) {
            Ok(Retest::Matches(block)) => {
                if self.matches.patch(key, position, Some(block)) {
                    self.dirty = true;
                }
                true
            }
            Ok(Retest::NoMatch) => {
                if self.matches.patch(key, position, None) {
                    self.dirty = true;
                }
                true
            }
            Ok(Retest::Unloaded) => {
                self.requeue_chunk(key);
                false
            }
            Err(message) => {
                self.fail_chunk(key, message);
                false
            }
        }
    }

    fn retest(&self, position: Position) -> Result<Retest, String> {
        let Some(query) = self.query.as_ref() else {
            return Ok(Retest::NoMatch);
        };
        let Some(block) = self.world.block_at(position) else {
            return Ok(Retest::Unloaded);
        };
        panic::catch_unwind(AssertUnwindSafe(|| query.test(position, block)))
            .map(|matched| {
                if matched {
                    Retest::Matches(block)
                } else {
                    Retest::NoMatch
                }
            })
            .map_err(|payload| panic_message(payload.as_ref()))
    }

    /// Sends `key` back to pending. Its last known matches stay in the working
    /// set, flagged not ready.
    fn requeue_chunk(&mut self, key: ChunkKey) {
        let Some(searcher) = self.searchers.get_mut(&key) else {
            return;
        };
        let was_done = searcher.state() == SearcherState::Done;
        retire_running(searcher, &mut self.retired);
        searcher.requeue();
        self.changed_while_running.remove(&key);
        if was_done && self.matches.contains_chunk(key) {
            self.dirty = true;
        }
    }

    fn fail_chunk(&mut self, key: ChunkKey, message: String) {
        error!("Block query failed on chunk {}: {}", key, message);
        if let Some(searcher) = self.searchers.get_mut(&key) {
            searcher.fail();
        }
        self.changed_while_running.remove(&key);
        if self.matches.remove_chunk(key) {
            self.dirty = true;
        }
        self.last_error = Some(SearchError::PredicateFailed { chunk: key, message });
    }

    fn cancel_all(&mut self) {
        for searcher in self.searchers.values_mut() {
            searcher.cancel();
        }
    }

    fn publish_if_dirty(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;
        self.version += 1;

        let searchers = &self.searchers;
        let snapshot = self.matches.snapshot(self.version, |key| {
            searchers
                .get(&key)
                .is_some_and(|searcher| searcher.state() == SearcherState::Done)
        });
        self.published = Arc::new(snapshot);
        true
    }
}

impl Drop for SearchCoordinator {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Cancels `searcher`'s scan if one is running and remembers its ticket until
/// the result comes back.
fn retire_running(searcher: &mut ChunkSearcher, retired: &mut HashMap<ChunkKey, SearchTicket>) {
    if let Some(ticket) = searcher.ticket() {
        if searcher.cancel() {
            retired.insert(searcher.key(), ticket);
        }
    }
}
