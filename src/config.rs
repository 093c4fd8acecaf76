//! # Search Configuration
//!
//! Tuning for one [`SearchCoordinator`](crate::SearchCoordinator). Every field has
//! a default, so a config file only lists what it changes:
//!
//! ```json
//! {
//!     "area": { "radius": 4 },
//!     "recenter": "sticky",
//!     "worker_count": 2,
//!     "rescan": { "max_patches": 16 }
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use web_time::Duration;

use crate::engine_state::search::region_window::{AreaSpec, RecenterPolicy, MAX_AREA_RADIUS};
use crate::engine_state::task_management::DEFAULT_MAX_TASKS_IN_FLIGHT;
use crate::error::SearchError;

/// When a chunk that keeps receiving block patches is rescanned from scratch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RescanPolicy {
    /// Patches accepted after a full scan before the next change requeues the chunk
    pub max_patches: u32,
    /// Age of a full scan, in seconds, after which a change requeues the chunk
    pub max_age_secs: u64,
}

impl RescanPolicy {
    /// `max_age_secs` as a duration.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

impl Default for RescanPolicy {
    fn default() -> Self {
        RescanPolicy {
            max_patches: 32,
            max_age_secs: 60,
        }
    }
}

/// Configuration of one search coordinator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Initial search radius
    pub area: AreaSpec,
    /// When `update` moves the window
    pub recenter: RecenterPolicy,
    /// Worker threads; `None` uses the available parallelism
    pub worker_count: Option<usize>,
    /// Searchers started per `update` call at most
    pub max_starts_per_update: usize,
    /// Scans queued on one worker at a time
    pub max_in_flight_per_worker: usize,
    /// Patch-versus-rescan policy
    pub rescan: RescanPolicy,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            area: AreaSpec::default(),
            recenter: RecenterPolicy::default(),
            worker_count: None,
            max_starts_per_update: 64,
            max_in_flight_per_worker: DEFAULT_MAX_TASKS_IN_FLIGHT,
            rescan: RescanPolicy::default(),
        }
    }
}

impl SearchConfig {
    /// Parses and validates a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, SearchError> {
        let config: SearchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SearchError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Checks every value is in range.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.area.radius > MAX_AREA_RADIUS {
            return Err(SearchError::InvalidConfig(format!(
                "area radius {} exceeds the maximum of {}",
                self.area.radius, MAX_AREA_RADIUS
            )));
        }
        if self.worker_count == Some(0) {
            return Err(SearchError::InvalidConfig(
                "worker_count must be at least 1".to_owned(),
            ));
        }
        if self.max_starts_per_update == 0 {
            return Err(SearchError::InvalidConfig(
                "max_starts_per_update must be at least 1".to_owned(),
            ));
        }
        if self.max_in_flight_per_worker == 0 {
            return Err(SearchError::InvalidConfig(
                "max_in_flight_per_worker must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }

    /// Worker threads the pool is created with.
    pub fn resolved_worker_count(&self) -> usize {
        self.worker_count.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|count| count.get())
                .unwrap_or(1)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_the_default() {
        assert_eq!(SearchConfig::from_json_str("{}").unwrap(), SearchConfig::default());
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config = SearchConfig::from_json_str(
            r#"{ "area": { "radius": 4 }, "recenter": "sticky", "rescan": { "max_patches": 8 } }"#,
        )
        .unwrap();

        assert_eq!(config.area, AreaSpec::new(4));
        assert_eq!(config.recenter, RecenterPolicy::Sticky);
        assert_eq!(config.rescan.max_patches, 8);
        assert_eq!(config.rescan.max_age(), Duration::from_secs(60));
        assert_eq!(config.max_in_flight_per_worker, DEFAULT_MAX_TASKS_IN_FLIGHT);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(matches!(
            SearchConfig::from_json_str(r#"{ "area": { "radius": 33 } }"#),
            Err(SearchError::InvalidConfig(_))
        ));
        assert!(matches!(
            SearchConfig::from_json_str(r#"{ "worker_count": 0 }"#),
            Err(SearchError::InvalidConfig(_))
        ));
        assert!(matches!(
            SearchConfig::from_json_str(r#"{ "max_starts_per_update": 0 }"#),
            Err(SearchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            SearchConfig::from_json_str(r#"{ "recenter": "sometimes" }"#),
            Err(SearchError::ConfigParse(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            SearchConfig::from_json_file("/nonexistent/area-search.json"),
            Err(SearchError::ConfigIo(_))
        ));
    }

    #[test]
    fn explicit_worker_count_wins() {
        let config = SearchConfig {
            worker_count: Some(3),
            ..SearchConfig::default()
        };
        assert_eq!(config.resolved_worker_count(), 3);
        assert!(SearchConfig::default().resolved_worker_count() >= 1);
    }
}
