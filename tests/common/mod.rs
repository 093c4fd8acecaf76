//! Shared helpers for the area search integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use cgmath::Point3;
use voxel_area_search::{
    AreaSpec, BlockQuery, BlockType, ChunkGenerationMethod, ChunkKey, MtResource, Position,
    SearchConfig, SearchCoordinator, World, WorldAccessor,
};

pub const MIN_Y: i32 = -8;
pub const HEIGHT: i32 = 24;
pub const SURFACE_Y: i32 = 6;

/// A flat world with `radius` chunks loaded around the origin and `ores` random
/// ore blocks sprinkled below the surface.
pub fn ore_world(seed: u64, radius: i32, ores: usize) -> MtResource<World> {
    let mut world = World::new(MIN_Y, HEIGHT, ChunkGenerationMethod::Flat { surface_y: SURFACE_Y });
    world.add_chunks_around(ChunkKey::ZERO, radius);

    let mut rng = fastrand::Rng::with_seed(seed);
    let span = (radius + 1) * 16;
    for _ in 0..ores {
        let position = Point3::new(
            rng.i32(-span..span),
            rng.i32(MIN_Y + 1..SURFACE_Y),
            rng.i32(-span..span),
        );
        world.set_block_at(position, BlockType::get_random_ore(&mut rng));
    }
    MtResource::new(world)
}

/// A Perlin world with `radius` chunks loaded around the origin.
pub fn perlin_world(seed: u32, radius: i32) -> MtResource<World> {
    let mut world = World::new(-32, 64, ChunkGenerationMethod::Perlin { seed });
    world.add_chunks_around(ChunkKey::ZERO, radius);
    MtResource::new(world)
}

pub fn config(radius: u32) -> SearchConfig {
    SearchConfig {
        area: AreaSpec::new(radius),
        worker_count: Some(2),
        max_starts_per_update: 4,
        ..SearchConfig::default()
    }
}

pub fn search(world: &MtResource<World>, config: SearchConfig, query: BlockQuery) -> SearchCoordinator {
    SearchCoordinator::with_query(std::sync::Arc::new(world.clone()), config, query).unwrap()
}

/// Calls `update` until every chunk is done and no scan is left on a worker.
pub fn settle(search: &mut SearchCoordinator, reference: Position) {
    for _ in 0..10_000 {
        search.update(reference);
        let info = search.debug_info();
        if search.is_done() && info.tasks_in_flight == 0 && info.cancelled == 0 {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("search did not settle: {:?}", search.debug_info());
}

/// Calls `update` until `condition` holds.
pub fn update_until(
    search: &mut SearchCoordinator,
    reference: Position,
    mut condition: impl FnMut(&SearchCoordinator) -> bool,
) -> bool {
    for _ in 0..10_000 {
        search.update(reference);
        if condition(search) {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

/// Every matching position in the square of chunks around `center`, found by
/// testing each block directly.
pub fn brute_force(
    world: &dyn WorldAccessor,
    center: ChunkKey,
    radius: u32,
    query: &BlockQuery,
) -> HashSet<Position> {
    let radius = radius as i32;
    let mut found = HashSet::new();
    for cx in center.x - radius..=center.x + radius {
        for cz in center.z - radius..=center.z + radius {
            let (ox, oz) = ChunkKey::new(cx, cz).origin();
            for y in world.vertical_range() {
                for z in oz..oz + 16 {
                    for x in ox..ox + 16 {
                        let position = Point3::new(x, y, z);
                        if let Some(block) = world.block_at(position) {
                            if query.test(position, block) {
                                found.insert(position);
                            }
                        }
                    }
                }
            }
        }
    }
    found
}

pub fn ore_query() -> BlockQuery {
    BlockQuery::new(|_, block| block.is_ore())
}

/// Holds a query inside one call until opened, so a scan can be caught while
/// running.
#[derive(Default)]
pub struct Gate {
    open: AtomicBool,
    entered: AtomicBool,
}

impl Gate {
    pub fn wait(&self) {
        self.entered.store(true, Ordering::SeqCst);
        while !self.open.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    pub fn entered(&self) -> bool {
        self.entered.load(Ordering::SeqCst)
    }
}
