//! Veloroute library entry points.
//!
//! This crate weights raw road graphs by user preference, collapses them into
//! intersection graphs, searches them with Dijkstra or A*, and stitches long
//! routes together from many short searches with gap repair. Higher-level
//! consumers (the CLI) should only depend on the items exported here instead
//! of reimplementing behavior.

pub mod cache;
pub mod config;
pub mod error;
pub mod geodesy;
pub mod graph;
pub mod output;
pub mod path;
pub mod provider;
pub mod routing;
pub mod segment;
pub mod simplify;
pub mod tags;
pub mod weight;

pub use cache::{default_cache_dir, CachingProvider, TileCache, TileKey};
pub use config::PlannerConfig;
pub use error::{Error, Result};
pub use geodesy::{bearing_deg, haversine_m, Coordinate};
pub use graph::{
    Direction, EdgeIndex, NodeId, RoadEdge, RoadGraph, RoadGraphBuilder, RoadGraphDocument,
    RoadSpec,
};
pub use output::{render_geojson, render_gpx, RouteRenderMode, RouteSummary};
pub use path::{find_route_a_star, find_route_dijkstra, HeadingBias, SearchGraph, SearchPath};
pub use provider::{
    fetch_with_retry, parse_overpass_response, FetchArea, GraphProvider, OverpassProvider,
    RetryPolicy, StaticProvider,
};
pub use routing::{
    plan_route, select_algorithm, select_planner, RouteAlgorithm, RoutePlanner, RouteRequest,
};
pub use segment::{CancellationFlag, Gap, RouteResult, SegmentPlanner};
pub use simplify::{simplify, ClosedLoop, CompositeEdge, IntersectionGraph};
pub use tags::{RoadClass, SurfaceKind};
pub use weight::{edge_weight, edge_weight_from_tags, RoutePreferences};
