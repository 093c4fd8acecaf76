//! # Chunk Searcher
//!
//! One chunk column's scan: the coordinator-side handle tracking its lifecycle,
//! and the task that runs the scan on a worker.
//!
//! ## Lifecycle
//!
//! ```text
//! Pending ──start──▶ Running ──Completed──▶ Done
//!    ▲                 │  │
//!    └────NotLoaded────┘  └──Failed──▶ Failed
//!
//! Running ──cancel──▶ Cancelled (result dropped at merge)
//! ```
//!
//! A scan reads the world through a [`WorldAccessor`] only. It checks its cancel
//! flag once per horizontal layer (256 blocks), so a cancelled scan stops within
//! one layer of work.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cgmath::Point3;
use log::trace;
use web_time::{Duration, Instant};

use crate::engine_state::search::match_set::BlockMatch;
use crate::engine_state::search::query::BlockQuery;
use crate::engine_state::search::world_accessor::WorldAccessor;
use crate::engine_state::task_management::task::Task;
use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::chunk::{BlockLayer, ChunkKey, CHUNK_DIMENSION, CHUNK_PLANE_SIZE};

/// Lifecycle state of one chunk's searcher.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SearcherState {
    /// Waiting to be started.
    Pending,
    /// A scan is on a worker.
    Running,
    /// The scan finished; the chunk's matches are current.
    Done,
    /// The scan was abandoned; its result will be dropped.
    Cancelled,
    /// The query panicked on this chunk. Stays failed until the query, the area
    /// or the chunk changes.
    Failed,
}

/// A cooperative cancellation flag shared between a searcher and its scan.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates an unset flag.
    pub fn new() -> Self {
        CancelFlag::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Unique id of one started scan. Results carrying any other ticket are stale.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SearchTicket(pub u64);

impl fmt::Display for SearchTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Coordinator-side handle for one chunk in the window.
#[derive(Debug)]
pub struct ChunkSearcher {
    key: ChunkKey,
    state: SearcherState,
    ticket: Option<SearchTicket>,
    cancel: CancelFlag,
}

impl ChunkSearcher {
    /// A pending searcher for `key`.
    pub fn new(key: ChunkKey) -> Self {
        ChunkSearcher {
            key,
            state: SearcherState::Pending,
            ticket: None,
            cancel: CancelFlag::new(),
        }
    }

    /// The chunk this searcher covers.
    pub fn key(&self) -> ChunkKey {
        self.key
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SearcherState {
        self.state
    }

    /// Ticket of the scan last started, if any.
    pub fn ticket(&self) -> Option<SearchTicket> {
        self.ticket
    }

    /// Marks the searcher running under `ticket` and returns the fresh cancel flag
    /// the scan must watch.
    pub fn start(&mut self, ticket: SearchTicket) -> CancelFlag {
        self.state = SearcherState::Running;
        self.ticket = Some(ticket);
        self.cancel = CancelFlag::new();
        self.cancel.clone()
    }

    /// Whether `result` belongs to the scan this searcher is waiting on.
    ///
    /// Checked at merge time, so a scan that finished just as it was cancelled
    /// is still rejected.
    pub fn accepts(&self, result: &ChunkSearchResult) -> bool {
        self.state == SearcherState::Running
            && self.ticket == Some(result.ticket)
            && !self.cancel.is_cancelled()
    }

    /// Cancels a running scan. Returns whether one was running.
    pub fn cancel(&mut self) -> bool {
        if self.state == SearcherState::Running {
            self.cancel.cancel();
            self.state = SearcherState::Cancelled;
            true
        } else {
            false
        }
    }

    /// Returns the searcher to `Pending`, cancelling any running scan.
    pub fn requeue(&mut self) {
        self.cancel();
        self.state = SearcherState::Pending;
        self.ticket = None;
    }

    /// Records a completed scan.
    pub fn complete(&mut self) {
        self.state = SearcherState::Done;
    }

    /// Records a failed scan.
    pub fn fail(&mut self) {
        self.state = SearcherState::Failed;
    }
}

/// How a scan ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Every block was tested.
    Completed(Vec<BlockMatch>),
    /// The chunk was not loaded when the scan started or was unloaded mid-scan.
    NotLoaded,
    /// The cancel flag was observed; partial matches were dropped.
    Cancelled,
    /// The query panicked.
    Failed(String),
}

/// What a worker sends back for one scan.
#[derive(Clone, Debug)]
pub struct ChunkSearchResult {
    /// Chunk that was scanned
    pub key: ChunkKey,
    /// Ticket of the scan
    pub ticket: SearchTicket,
    /// Query generation the scan ran under
    pub generation: u64,
    /// How the scan ended
    pub outcome: SearchOutcome,
    /// Wall time spent on the worker
    pub elapsed: Duration,
}

/// A scan of one chunk column, run on a search worker.
pub struct ChunkSearchTask {
    key: ChunkKey,
    ticket: SearchTicket,
    generation: u64,
    query: BlockQuery,
    world: Arc<dyn WorldAccessor>,
    cancel: CancelFlag,
}

impl ChunkSearchTask {
    /// Creates a scan task. The query is captured here and never re-read.
    pub fn new(
        key: ChunkKey,
        ticket: SearchTicket,
        generation: u64,
        query: BlockQuery,
        world: Arc<dyn WorldAccessor>,
        cancel: CancelFlag,
    ) -> Self {
        ChunkSearchTask {
            key,
            ticket,
            generation,
            query,
            world,
            cancel,
        }
    }
}

impl Task for ChunkSearchTask {
    type Output = ChunkSearchResult;

    fn process(self) -> ChunkSearchResult {
        let start = Instant::now();
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| {
            scan_chunk(self.key, &self.query, self.world.as_ref(), &self.cancel)
        })) {
            Ok(outcome) => outcome,
            Err(payload) => SearchOutcome::Failed(panic_message(payload.as_ref())),
        };
        let elapsed = start.elapsed();

        trace!(
            "Scan {} of chunk {} finished in {:?}: {}",
            self.ticket,
            self.key,
            elapsed,
            match &outcome {
                SearchOutcome::Completed(matches) => format!("{} matches", matches.len()),
                SearchOutcome::NotLoaded => "not loaded".to_owned(),
                SearchOutcome::Cancelled => "cancelled".to_owned(),
                SearchOutcome::Failed(message) => format!("failed ({message})"),
            }
        );

        ChunkSearchResult {
            key: self.key,
            ticket: self.ticket,
            generation: self.generation,
            outcome,
            elapsed,
        }
    }
}

/// Tests every block of the column at `key` against `query`.
///
/// Layers are scanned bottom-up, each fetched with one
/// [`WorldAccessor::read_layer`] call; within a layer X varies fastest, then Z.
pub fn scan_chunk(
    key: ChunkKey,
    query: &BlockQuery,
    world: &dyn WorldAccessor,
    cancel: &CancelFlag,
) -> SearchOutcome {
    if cancel.is_cancelled() {
        return SearchOutcome::Cancelled;
    }
    if !world.is_chunk_loaded(key) {
        return SearchOutcome::NotLoaded;
    }

    let (origin_x, origin_z) = key.origin();
    let mut matches = Vec::new();
    let mut layer: BlockLayer = [BlockType::AIR; CHUNK_PLANE_SIZE as usize];

    for y in world.vertical_range() {
        if cancel.is_cancelled() {
            return SearchOutcome::Cancelled;
        }
        if !world.read_layer(key, y, &mut layer) {
            return SearchOutcome::NotLoaded;
        }
        for (index, &block) in layer.iter().enumerate() {
            let index = index as i32;
            let position = Point3::new(
                origin_x + index % CHUNK_DIMENSION,
                y,
                origin_z + index / CHUNK_DIMENSION,
            );
            if query.test(position, block) {
                matches.push(BlockMatch { position, block });
            }
        }
    }

    if cancel.is_cancelled() {
        return SearchOutcome::Cancelled;
    }
    SearchOutcome::Completed(matches)
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::core::MtResource;
    use crate::engine_state::search::world_accessor::Position;
    use crate::engine_state::voxels::block::block_type::BlockType;
    use crate::engine_state::voxels::world::{ChunkGenerationMethod, World};

    fn flat_world() -> MtResource<World> {
        let mut world = World::new(0, 8, ChunkGenerationMethod::Flat { surface_y: 3 });
        world.add_chunks_around(ChunkKey::ZERO, 1);
        MtResource::new(world)
    }

    #[test]
    fn finds_every_matching_block() {
        let world = flat_world();
        world
            .get()
            .set_block_at(Point3::new(-3, 6, -14), BlockType::GOLD_ORE);
        world
            .get()
            .set_block_at(Point3::new(-16, 0, -1), BlockType::GOLD_ORE);
        world.get().set_block_at(Point3::new(0, 6, 0), BlockType::GOLD_ORE);

        let outcome = scan_chunk(
            ChunkKey::new(-1, -1),
            &BlockQuery::matching_type(BlockType::GOLD_ORE),
            &world,
            &CancelFlag::new(),
        );

        let SearchOutcome::Completed(matches) = outcome else {
            panic!("scan did not complete: {outcome:?}");
        };
        let found: HashSet<Position> = matches.iter().map(|m| m.position).collect();
        assert_eq!(
            found,
            HashSet::from([Point3::new(-3, 6, -14), Point3::new(-16, 0, -1)])
        );
        assert!(matches.iter().all(|m| m.block == BlockType::GOLD_ORE));
    }

    /// Refuses single-block reads and counts layer reads.
    struct LayerReads {
        world: MtResource<World>,
        layers: std::sync::atomic::AtomicUsize,
    }

    impl WorldAccessor for LayerReads {
        fn block_at(&self, _: Position) -> Option<BlockType> {
            panic!("scans read whole layers");
        }

        fn is_chunk_loaded(&self, key: ChunkKey) -> bool {
            self.world.is_chunk_loaded(key)
        }

        fn vertical_range(&self) -> std::ops::Range<i32> {
            self.world.vertical_range()
        }

        fn read_layer(&self, key: ChunkKey, y: i32, layer: &mut BlockLayer) -> bool {
            self.layers.fetch_add(1, Ordering::SeqCst);
            self.world.read_layer(key, y, layer)
        }
    }

    #[test]
    fn scan_reads_one_layer_at_a_time() {
        let world = flat_world();
        world.get().set_block_at(Point3::new(7, 2, 9), BlockType::COAL_ORE);
        let accessor = LayerReads {
            world,
            layers: std::sync::atomic::AtomicUsize::new(0),
        };

        let outcome = scan_chunk(
            ChunkKey::ZERO,
            &BlockQuery::matching_type(BlockType::COAL_ORE),
            &accessor,
            &CancelFlag::new(),
        );

        assert_eq!(
            outcome,
            SearchOutcome::Completed(vec![BlockMatch {
                position: Point3::new(7, 2, 9),
                block: BlockType::COAL_ORE,
            }])
        );
        assert_eq!(accessor.layers.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn empty_result_is_still_completed() {
        let world = flat_world();
        let outcome = scan_chunk(
            ChunkKey::ZERO,
            &BlockQuery::matching_type(BlockType::LAVA),
            &world,
            &CancelFlag::new(),
        );
        assert_eq!(outcome, SearchOutcome::Completed(Vec::new()));
    }

    #[test]
    fn unloaded_chunk_is_not_loaded() {
        let world = flat_world();
        let outcome = scan_chunk(
            ChunkKey::new(5, 5),
            &BlockQuery::matching_type(BlockType::STONE),
            &world,
            &CancelFlag::new(),
        );
        assert_eq!(outcome, SearchOutcome::NotLoaded);
    }

    #[test]
    fn cancelled_scan_drops_partial_matches() {
        let world = flat_world();
        let cancel = CancelFlag::new();
        let seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let query = {
            let cancel = cancel.clone();
            let seen = seen.clone();
            BlockQuery::new(move |_, _| {
                if seen.fetch_add(1, Ordering::SeqCst) == 10 {
                    cancel.cancel();
                }
                true
            })
        };

        let outcome = scan_chunk(ChunkKey::ZERO, &query, &world, &cancel);
        assert_eq!(outcome, SearchOutcome::Cancelled);
        assert!(seen.load(Ordering::SeqCst) <= 256);
    }

    #[test]
    fn panicking_query_fails_the_task() {
        let world: Arc<dyn WorldAccessor> = Arc::new(flat_world());
        let task = ChunkSearchTask::new(
            ChunkKey::ZERO,
            SearchTicket(1),
            0,
            BlockQuery::new(|position, _| {
                if position.y == 2 {
                    panic!("bad query");
                }
                false
            }),
            world,
            CancelFlag::new(),
        );

        let result = task.process();
        assert_eq!(result.ticket, SearchTicket(1));
        assert_eq!(result.outcome, SearchOutcome::Failed("bad query".to_owned()));
    }

    #[test]
    fn searcher_rejects_stale_and_cancelled_results() {
        let mut searcher = ChunkSearcher::new(ChunkKey::ZERO);
        let result = |ticket| ChunkSearchResult {
            key: ChunkKey::ZERO,
            ticket,
            generation: 0,
            outcome: SearchOutcome::Completed(Vec::new()),
            elapsed: Duration::ZERO,
        };

        assert!(!searcher.accepts(&result(SearchTicket(1))));

        searcher.start(SearchTicket(1));
        assert!(searcher.accepts(&result(SearchTicket(1))));
        assert!(!searcher.accepts(&result(SearchTicket(2))));

        assert!(searcher.cancel());
        assert_eq!(searcher.state(), SearcherState::Cancelled);
        assert!(!searcher.accepts(&result(SearchTicket(1))));

        searcher.requeue();
        let flag = searcher.start(SearchTicket(3));
        assert!(!flag.is_cancelled());
        assert!(searcher.accepts(&result(SearchTicket(3))));
    }
}
