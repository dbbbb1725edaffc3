use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::path::HeadingBias;
use crate::provider::RetryPolicy;
use crate::weight::RoutePreferences;

const RADIUS_ENV: &str = "VELOROUTE_RADIUS_METERS";
const SEGMENT_KM_ENV: &str = "VELOROUTE_SEGMENT_KM";
const MAX_GAP_ENV: &str = "VELOROUTE_MAX_GAP_METERS";
const DIRECT_THRESHOLD_ENV: &str = "VELOROUTE_DIRECT_THRESHOLD_KM";

/// Shortest accepted waypoint spacing. Anything finer than a city block only
/// multiplies provider calls.
pub const MIN_SEGMENT_KM: f64 = 0.1;

/// Tunables for the segment planner.
///
/// Every field has a default so partial JSON files are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Buffer around each segment's endpoints requested from the provider.
    pub radius_meters: f64,
    /// Spacing of interpolated waypoints on long routes.
    pub segment_km: f64,
    /// Routes shorter than this are planned with a single search.
    pub direct_threshold_km: f64,
    /// Consecutive points further apart than this count as a gap.
    pub max_gap_meters: f64,
    /// Base multiplier for edges deviating from the goal bearing.
    pub heading_penalty_factor: f64,
    /// Graphs with at most this many nodes are searched exactly on the raw
    /// graph instead of heuristically on the intersection graph.
    pub exact_search_node_limit: usize,
    /// Maximum bisection depth while repairing a gap.
    pub repair_max_depth: u32,
    /// Buffer around a gap's endpoints fetched for repair.
    pub repair_radius_meters: f64,
    /// Pause between consecutive segment fetches.
    pub segment_pause_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            radius_meters: 8000.0,
            segment_km: 20.0,
            direct_threshold_km: 20.0,
            max_gap_meters: 1000.0,
            heading_penalty_factor: 1.5,
            exact_search_node_limit: 2000,
            repair_max_depth: 3,
            repair_radius_meters: 2000.0,
            segment_pause_ms: 1000,
            retry: RetryPolicy::default(),
        }
    }
}

impl PlannerConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: PlannerConfig = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), "loaded planner configuration");
        Ok(config)
    }

    /// Apply `VELOROUTE_*` environment overrides on top of `self`.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| env::var(key).ok())
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply overrides resolved through `lookup`, which maps a variable
    /// name to its value.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse = |key: &str| -> Result<Option<f64>> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| Error::InvalidConfig {
                        message: format!("{key} must be a number, got {raw:?}"),
                    }),
                None => Ok(None),
            }
        };

        if let Some(value) = parse(RADIUS_ENV)? {
            self.radius_meters = value;
        }
        if let Some(value) = parse(SEGMENT_KM_ENV)? {
            self.segment_km = value;
        }
        if let Some(value) = parse(MAX_GAP_ENV)? {
            self.max_gap_meters = value;
        }
        if let Some(value) = parse(DIRECT_THRESHOLD_ENV)? {
            self.direct_threshold_km = value;
        }
        Ok(self)
    }

    /// Reject non-positive or non-finite distances.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("radius_meters", self.radius_meters),
            ("segment_km", self.segment_km),
            ("direct_threshold_km", self.direct_threshold_km),
            ("max_gap_meters", self.max_gap_meters),
            ("repair_radius_meters", self.repair_radius_meters),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidConfig {
                    message: format!("{name} must be a positive number, got {value}"),
                });
            }
        }
        if self.segment_km < MIN_SEGMENT_KM {
            return Err(Error::InvalidConfig {
                message: format!(
                    "segment_km must be at least {MIN_SEGMENT_KM}, got {}",
                    self.segment_km
                ),
            });
        }
        if !self.heading_penalty_factor.is_finite() || self.heading_penalty_factor < 1.0 {
            return Err(Error::InvalidConfig {
                message: format!(
                    "heading_penalty_factor must be at least 1.0, got {}",
                    self.heading_penalty_factor
                ),
            });
        }
        if !self.retry.radius_growth.is_finite() || !self.retry.backoff_multiplier.is_finite() {
            return Err(Error::InvalidConfig {
                message: "retry multipliers must be finite".to_string(),
            });
        }
        Ok(())
    }

    pub fn heading_bias(&self, prefs: &RoutePreferences) -> HeadingBias {
        HeadingBias {
            threshold_deg: prefs.clamped().heading_threshold_deg,
            penalty_factor: self.heading_penalty_factor,
        }
    }
}
