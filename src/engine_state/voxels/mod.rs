//! # Voxels
//!
//! The voxel model the search engine reads: block kinds, chunk columns and an
//! in-memory world.
//!
//! ## Architecture
//!
//! * **Block**: block kinds and their one-byte storage record
//! * **Chunk**: full-height columns of blocks addressed by [`ChunkKey`](chunk::ChunkKey)
//! * **World**: loaded columns plus the [`WorldAccessor`](crate::WorldAccessor) implementation
//! * **Tasks**: background column generation on the worker pool
//!
//! ## Thread Safety
//!
//! * Columns are individually locked, so edits on the tick thread only contend with
//!   workers reading that same column
//! * Loading and unloading columns takes the world-wide write lock

pub mod block;
pub mod chunk;
pub mod tasks;
pub mod world;
