//! # Engine State Module
//!
//! The search engine and the systems it runs on.
//!
//! ## Key Components
//!
//! * `search` - Region window, chunk searchers and the search coordinator
//! * `task_management` - The worker pool chunk scans execute on
//! * `voxels` - Block kinds, chunk columns and an in-memory world
//!
//! ## Architecture
//!
//! Each subsystem owns one concern. `search` only reads the world through the
//! [`WorldAccessor`](search::WorldAccessor) trait, so any world that can answer
//! block lookups concurrently can be searched; `voxels` provides one such world.

pub mod search;
pub mod task_management;
pub mod voxels;
