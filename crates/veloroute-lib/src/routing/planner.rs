//! Search strategies behind a common trait.
//!
//! Callers pick a planner once and run it over either graph representation
//! without caring which algorithm is underneath.

use crate::graph::NodeId;
use crate::path::{find_route_a_star, find_route_dijkstra, HeadingBias, SearchGraph, SearchPath};

use super::RouteAlgorithm;

/// Trait for route search strategies.
pub trait RoutePlanner: Send + Sync {
    /// The algorithm identifier for this planner.
    fn algorithm(&self) -> RouteAlgorithm;

    /// Find the least-cost path from `start` to `goal`.
    ///
    /// Returns `None` when the goal is unreachable or either node is absent.
    fn find_path(&self, graph: &dyn SearchGraph, start: NodeId, goal: NodeId)
        -> Option<SearchPath>;
}

/// Exact search; guaranteed optimal over non-negative weights.
#[derive(Debug, Clone, Copy, Default)]
pub struct DijkstraPlanner;

impl RoutePlanner for DijkstraPlanner {
    fn algorithm(&self) -> RouteAlgorithm {
        RouteAlgorithm::Dijkstra
    }

    fn find_path(
        &self,
        graph: &dyn SearchGraph,
        start: NodeId,
        goal: NodeId,
    ) -> Option<SearchPath> {
        find_route_dijkstra(graph, start, goal)
    }
}

/// Heuristic search guided by great-circle distance, optionally biased
/// towards the goal bearing.
#[derive(Debug, Clone, Copy, Default)]
pub struct AStarPlanner {
    heading: Option<HeadingBias>,
}

impl AStarPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_heading(heading: HeadingBias) -> Self {
        Self {
            heading: Some(heading),
        }
    }

    pub fn heading(&self) -> Option<&HeadingBias> {
        self.heading.as_ref()
    }
}

impl RoutePlanner for AStarPlanner {
    fn algorithm(&self) -> RouteAlgorithm {
        RouteAlgorithm::AStar
    }

    fn find_path(
        &self,
        graph: &dyn SearchGraph,
        start: NodeId,
        goal: NodeId,
    ) -> Option<SearchPath> {
        find_route_a_star(graph, start, goal, self.heading.as_ref())
    }
}

/// Build the planner for `algorithm`. The heading bias only affects A*.
pub fn select_planner(
    algorithm: RouteAlgorithm,
    heading: Option<HeadingBias>,
) -> Box<dyn RoutePlanner> {
    match algorithm {
        RouteAlgorithm::Dijkstra => Box::new(DijkstraPlanner),
        RouteAlgorithm::AStar => Box::new(AStarPlanner { heading }),
    }
}
