//! # Area Block Search
//!
//! Background, incremental search for every block matching a query within a
//! window of chunk columns around a moving reference point.
//!
//! ## Key Components
//!
//! * `world_accessor` - The read-only world view scans run against
//! * `query` - The caller-supplied block predicate
//! * `region_window` - Which chunk columns are in range
//! * `chunk_searcher` - One column's scan and its lifecycle
//! * `match_set` - Working matches and the published snapshots
//! * `coordinator` - Ties the above together behind the per-tick API
//!
//! ## Data Flow
//!
//! The region window tells the coordinator which chunks must be searched. The
//! coordinator starts a scan per chunk on its worker pool, merges finished scans
//! during `update`, and publishes a new versioned snapshot whenever the set of
//! matches changed. Consumers compare the version with the last one they saw and
//! rebuild their own data only when it moved.

pub mod chunk_searcher;
pub mod coordinator;
pub mod match_set;
pub mod query;
pub mod region_window;
pub mod world_accessor;

pub use coordinator::{SearchCoordinator, SearchDebugInfo};
pub use match_set::{BlockMatch, ChunkMatches, MatchSnapshot};
pub use query::BlockQuery;
pub use region_window::{AreaSpec, RecenterPolicy, RegionWindow, WindowDiff, MAX_AREA_RADIUS};
pub use world_accessor::{Position, WorldAccessor};
