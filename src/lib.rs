#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Area Search
//!
//! A background, incremental block search for voxel worlds. It finds every block
//! matching a query within a square of chunk columns around a moving reference
//! point and republishes the result as a versioned snapshot that any number of
//! consumers can poll every frame without blocking.
//!
//! ## Key Modules
//!
//! * `core` - Shared-ownership primitives
//! * `config` - Search tuning, loadable from JSON
//! * `engine_state` - The search engine, its worker pool and the voxel model
//! * `error` - Errors surfaced to the owning feature
//!
//! ## Architecture
//!
//! * A region window decides which chunk columns are in range
//! * One searcher per column scans it on a worker thread
//! * The coordinator merges finished scans once per `update` and bumps the version
//! * Block-change notifications patch matches in place instead of rescanning
//!
//! ## Usage
//!
//! ```rust,no_run
//! fn main() {
//!     if let Err(err) = voxel_area_search::run() {
//!         eprintln!("{err}");
//!     }
//! }
//! ```
//!
//! ## Performance Considerations
//!
//! * Scans run on an owned pool, never on the thread calling `update`
//! * Chunks closest to the reference point are scanned first
//! * Snapshots share unchanged per-chunk lists, so publishing is cheap

use std::sync::Arc;

use cgmath::Point3;
use log::{debug, info, warn};
use web_time::{Duration, Instant};

pub mod config;
pub mod core;
pub mod engine_state;
pub mod error;

pub use crate::config::{RescanPolicy, SearchConfig};
pub use crate::core::MtResource;
pub use crate::engine_state::search::chunk_searcher::SearcherState;
pub use crate::engine_state::search::{
    AreaSpec, BlockMatch, BlockQuery, ChunkMatches, MatchSnapshot, Position, RecenterPolicy,
    SearchCoordinator, SearchDebugInfo, WorldAccessor, MAX_AREA_RADIUS,
};
pub use crate::engine_state::voxels::block::block_type::BlockType;
pub use crate::engine_state::voxels::chunk::ChunkKey;
pub use crate::engine_state::voxels::world::{ChunkGenerationMethod, World};
pub use crate::error::SearchError;

use crate::engine_state::task_management::TaskManager;
use crate::engine_state::voxels::tasks::chunk_generation_task::ChunkGenerationTask;
use crate::engine_state::voxels::world::{DEFAULT_HEIGHT, DEFAULT_MIN_Y};

/// Name of the stopwatch logged around the demo search.
pub const DEMO_SEARCH_STOPWATCH: &str = "Demo Search";

const DEMO_SEED: u32 = 42;
const DEMO_TICKS_MOVING: u32 = 40;
const DEMO_MAX_TICKS: u32 = 20_000;
const DEMO_TICK: Duration = Duration::from_millis(5);

/// Runs the demo: streams in a Perlin world around a moving reference point while
/// a coordinator searches it for gold and diamonds.
///
/// The first command line argument, if any, is a JSON [`SearchConfig`] file.
pub fn run() -> Result<(), SearchError> {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading search configuration from {}", path);
            SearchConfig::from_json_file(path)?
        }
        None => SearchConfig {
            area: AreaSpec::new(4),
            ..SearchConfig::default()
        },
    };
    debug!("{:?}", config);

    let world = MtResource::new(World::new(
        DEFAULT_MIN_Y,
        DEFAULT_HEIGHT,
        ChunkGenerationMethod::Perlin { seed: DEMO_SEED },
    ));
    let mut loader = TaskManager::new(2, 4)?;
    let load_radius = config.area.radius as i32 + 1;

    let mut search = SearchCoordinator::with_query(
        Arc::new(world.clone()),
        config,
        BlockQuery::matching_any([BlockType::GOLD_ORE, BlockType::DIAMOND_ORE]),
    )?;

    let stopwatch = Instant::now();
    let mut reference = Point3::new(0, 64, 0);
    let mut loaded_center = None;

    for tick in 0..DEMO_MAX_TICKS {
        if tick < DEMO_TICKS_MOVING {
            reference.x += 2;
        }

        let reference_chunk = ChunkKey::from_position(reference);
        if loaded_center != Some(reference_chunk) {
            for x in -load_radius..=load_radius {
                for z in -load_radius..=load_radius {
                    let key = ChunkKey::new(reference_chunk.x + x, reference_chunk.z + z);
                    if !world.is_chunk_loaded(key) {
                        loader.publish_task(ChunkGenerationTask::new(world.clone(), key));
                    }
                }
            }
            loaded_center = Some(reference_chunk);
        }
        loader.process_queued_tasks();
        for key in loader.process_completed_tasks() {
            search.on_chunk_changed(key);
        }

        if search.update(reference) {
            let info = search.debug_info();
            info!(
                "Tick {}: version {}, {} matches, {}/{} chunks done",
                tick,
                search.get_matches_version(),
                search.get_matches().len(),
                info.done,
                info.window_chunks
            );
        }

        if let Some(err) = search.take_last_error() {
            warn!("Search error: {}", err);
        }

        if tick >= DEMO_TICKS_MOVING && search.is_done() {
            break;
        }
        std::thread::sleep(DEMO_TICK);
    }

    let matches = search.get_matches();
    info!(
        "{}: {} matches in {:?} ({:?})",
        DEMO_SEARCH_STOPWATCH,
        matches.len(),
        stopwatch.elapsed(),
        search.debug_info()
    );

    let Some(mined) = matches.iter().next().copied() else {
        info!("Nothing found to mine");
        return Ok(());
    };
    world.get().set_block_at(mined.position, BlockType::STONE);
    search.on_world_block_changed(mined.position);
    info!(
        "Mined {:?} at {:?}: version {}, {} matches left",
        mined.block,
        mined.position,
        search.get_matches_version(),
        search.get_matches().len()
    );

    search.reset();
    Ok(())
}
