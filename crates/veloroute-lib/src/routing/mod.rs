//! Route search selection and the top-level planning entry point.
//!
//! This module provides:
//! - [`RouteAlgorithm`] - Supported search algorithms (Dijkstra, A*)
//! - [`RoutePlanner`] - Strategy trait implemented by each algorithm
//! - [`RouteRequest`] - Endpoints, preferences and planner configuration
//! - [`plan_route`] - Main entry point for computing a route
//!
//! # Example
//!
//! ```ignore
//! use veloroute_lib::{plan_route, Coordinate, RouteRequest, StaticProvider, RoadGraph};
//!
//! let graph = RoadGraph::load_json("docs/fixtures/sample_network.json".as_ref())?;
//! let provider = StaticProvider::new(graph);
//! let request = RouteRequest::new(Coordinate::new(52.0, 21.0), Coordinate::new(52.01, 21.01));
//! let result = plan_route(&provider, &request)?;
//! println!("{} points", result.coordinates.len());
//! ```

mod planner;

pub use planner::{select_planner, AStarPlanner, DijkstraPlanner, RoutePlanner};

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::config::PlannerConfig;
use crate::error::Result;
use crate::geodesy::Coordinate;
use crate::provider::GraphProvider;
use crate::segment::{RouteResult, SegmentPlanner};
use crate::weight::RoutePreferences;

/// Supported search algorithms.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum RouteAlgorithm {
    /// Dijkstra's algorithm (exact).
    #[strum(serialize = "dijkstra")]
    Dijkstra,
    /// A* search (heuristic guided).
    #[default]
    #[serde(rename = "a-star")]
    #[strum(serialize = "a-star", serialize = "astar")]
    AStar,
}

impl fmt::Display for RouteAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            RouteAlgorithm::Dijkstra => "dijkstra",
            RouteAlgorithm::AStar => "a-star",
        };
        f.write_str(value)
    }
}

/// Pick exact search for graphs small enough to enumerate fully.
pub fn select_algorithm(node_count: usize, exact_search_node_limit: usize) -> RouteAlgorithm {
    if node_count <= exact_search_node_limit {
        RouteAlgorithm::Dijkstra
    } else {
        RouteAlgorithm::AStar
    }
}

/// High-level route planning request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub start: Coordinate,
    pub end: Coordinate,
    #[serde(default)]
    pub preferences: RoutePreferences,
    #[serde(default)]
    pub config: PlannerConfig,
}

impl RouteRequest {
    pub fn new(start: Coordinate, end: Coordinate) -> Self {
        Self {
            start,
            end,
            preferences: RoutePreferences::default(),
            config: PlannerConfig::default(),
        }
    }

    pub fn with_preferences(mut self, preferences: RoutePreferences) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }
}

/// Plan a route for `request` using `provider` for road data.
pub fn plan_route<P>(provider: &P, request: &RouteRequest) -> Result<RouteResult>
where
    P: GraphProvider + ?Sized,
{
    SegmentPlanner::new(provider, request.config).plan_route(
        request.start,
        request.end,
        &request.preferences,
    )
}
