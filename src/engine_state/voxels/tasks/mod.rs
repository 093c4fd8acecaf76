//! # Voxel Task System
//!
//! Tasks that load world data on the worker pool, keeping chunk generation off
//! the thread that drives the search.

pub mod chunk_generation_task;
