//! # Chunk Generation Task
//!
//! This module defines the `ChunkGenerationTask` which loads a column into a
//! shared [`World`] off the owning thread. It is scheduled as the reference point
//! moves, so the search window can run ahead of loaded terrain; chunks that are
//! not loaded yet simply stay pending in the search until their task lands.

use crate::{
    core::MtResource,
    engine_state::{
        task_management::task::Task,
        voxels::{chunk::ChunkKey, world::World},
    },
};

/// A task that generates and loads one column.
///
/// This task is responsible for:
/// 1. Generating the column under the world's read lock
/// 2. Inserting it under the write lock, unless another task got there first
pub struct ChunkGenerationTask {
    /// A thread-safe reference to the world where the column will be added
    world: MtResource<World>,
    /// The column to generate
    key: ChunkKey,
}

impl ChunkGenerationTask {
    /// Creates a new chunk generation task.
    ///
    /// # Arguments
    /// * `world` - A thread-safe reference to the world
    /// * `key` - The column to generate
    pub fn new(world: MtResource<World>, key: ChunkKey) -> Self {
        ChunkGenerationTask { world, key }
    }
}

impl Task for ChunkGenerationTask {
    /// The key of the column, once it is loaded.
    type Output = ChunkKey;

    fn process(self) -> ChunkKey {
        if self.world.get().get_chunk_at(self.key).is_some() {
            return self.key;
        }

        let column = self.world.get().generate_chunk(self.key);

        let mut world = self.world.get_mut();
        if world.get_chunk_at(self.key).is_none() {
            world.insert_chunk(column);
        }
        self.key
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::engine_state::task_management::TaskManager;
    use crate::engine_state::voxels::world::ChunkGenerationMethod;

    #[test]
    fn loads_columns_in_the_background() {
        let world = MtResource::new(World::new(0, 16, ChunkGenerationMethod::Perlin { seed: 9 }));
        let mut tasks = TaskManager::new(2, 2).unwrap();

        for x in -1..=1 {
            tasks.publish_task(ChunkGenerationTask::new(world.clone(), ChunkKey::new(x, 0)));
        }
        tasks.publish_task(ChunkGenerationTask::new(world.clone(), ChunkKey::new(0, 0)));

        let mut loaded = Vec::new();
        for _ in 0..2000 {
            tasks.process_queued_tasks();
            loaded.extend(tasks.process_completed_tasks());
            if loaded.len() == 4 {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(loaded.len(), 4);
        assert_eq!(world.get().chunk_count(), 3);
    }
}
