use std::time::Instant;

use tracing::debug;

use crate::geodesy::Coordinate;
use crate::graph::{NodeId, RoadGraph};
use crate::path::{find_route_dijkstra, HeadingBias, SearchEdge, SearchGraph, SearchPath};
use crate::routing::{select_algorithm, select_planner, RouteAlgorithm};
use crate::simplify::{simplify, IntersectionGraph};

use super::stitch::append_dedup;

/// Graph representation a single leg is searched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegMode {
    /// Heuristic search on the intersection graph.
    Intersection,
    /// Exact search on the raw graph.
    Raw,
    /// Exact search on small graphs, otherwise intersection search with a
    /// raw fallback.
    Auto,
}

/// Search settings shared by every leg of one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegOptions {
    pub heading: HeadingBias,
    pub exact_search_node_limit: usize,
}

/// Route between the nodes nearest to `from` and `to` on an already weighted
/// graph and return the track coordinates.
pub fn route_on_graph(
    graph: &RoadGraph,
    from: Coordinate,
    to: Coordinate,
    mode: LegMode,
    options: &LegOptions,
) -> Option<Vec<Coordinate>> {
    let start = graph.nearest_node(from)?;
    let goal = graph.nearest_node(to)?;
    if start == goal {
        return graph.coordinate(start).map(|coord| vec![coord]);
    }

    match mode {
        LegMode::Raw => raw_leg(graph, start, goal),
        LegMode::Intersection => intersection_leg(graph, start, goal, options),
        LegMode::Auto => {
            match select_algorithm(graph.node_count(), options.exact_search_node_limit) {
                RouteAlgorithm::Dijkstra => raw_leg(graph, start, goal),
                RouteAlgorithm::AStar => intersection_leg(graph, start, goal, options)
                    .or_else(|| {
                        debug!(start, goal, "intersection search failed; retrying on raw graph");
                        raw_leg(graph, start, goal)
                    }),
            }
        }
    }
}

fn raw_leg(graph: &RoadGraph, start: NodeId, goal: NodeId) -> Option<Vec<Coordinate>> {
    let started = Instant::now();
    let path = select_planner(RouteAlgorithm::Dijkstra, None).find_path(graph, start, goal)?;
    debug!(
        edges = path.edges.len(),
        cost = path.cost,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "raw search complete"
    );
    Some(raw_polyline(graph, &path))
}

fn intersection_leg(
    graph: &RoadGraph,
    start: NodeId,
    goal: NodeId,
    options: &LegOptions,
) -> Option<Vec<Coordinate>> {
    let intersections = simplify(graph, &[start, goal]);

    let started = Instant::now();
    let planner = select_planner(RouteAlgorithm::AStar, Some(options.heading));
    let path = planner.find_path(&intersections, start, goal)?;
    debug!(
        composite_edges = path.edges.len(),
        cost = path.cost,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "intersection search complete"
    );

    let started = Instant::now();
    let track = reconstruct(graph, &intersections, &path);
    debug!(
        points = track.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "reconstructed leg geometry"
    );
    Some(track)
}

/// Expand a path over composite edges into coordinates.
///
/// Stored composite geometry is used as is. A hop without geometry is
/// re-routed on the raw graph by weight, then by plain length, and finally
/// drawn as a straight line between its junctions.
pub fn reconstruct(
    graph: &RoadGraph,
    intersections: &IntersectionGraph,
    path: &SearchPath,
) -> Vec<Coordinate> {
    let mut track = Vec::new();
    if path.edges.is_empty() {
        if let Some(coord) = path.nodes.first().and_then(|node| graph.coordinate(*node)) {
            track.push(coord);
        }
        return track;
    }

    for &index in &path.edges {
        let Some(composite) = intersections.edge(index) else {
            continue;
        };
        match &composite.geometry {
            Some(points) => append_dedup(&mut track, points),
            None => append_dedup(&mut track, &hop_fallback(graph, composite.from, composite.to)),
        }
    }
    track
}

fn hop_fallback(graph: &RoadGraph, from: NodeId, to: NodeId) -> Vec<Coordinate> {
    if let Some(path) = find_route_dijkstra(graph, from, to) {
        return raw_polyline(graph, &path);
    }
    if let Some(path) = find_route_dijkstra(&LengthWeighted(graph), from, to) {
        debug!(from, to, "hop re-routed by plain length");
        return raw_polyline(graph, &path);
    }
    debug!(from, to, "hop drawn as straight line");
    [from, to]
        .iter()
        .filter_map(|node| graph.coordinate(*node))
        .collect()
}

fn raw_polyline(graph: &RoadGraph, path: &SearchPath) -> Vec<Coordinate> {
    let mut track = Vec::new();
    for &index in &path.edges {
        append_dedup(&mut track, &graph.edge_polyline(index));
    }
    if track.is_empty() {
        let nodes: Vec<Coordinate> = path
            .nodes
            .iter()
            .filter_map(|node| graph.coordinate(*node))
            .collect();
        append_dedup(&mut track, &nodes);
    }
    track
}

/// Raw graph view weighted by edge length instead of computed cost.
struct LengthWeighted<'a>(&'a RoadGraph);

impl SearchGraph for LengthWeighted<'_> {
    fn contains(&self, node: NodeId) -> bool {
        self.0.contains(node)
    }

    fn coordinate(&self, node: NodeId) -> Option<Coordinate> {
        self.0.coordinate(node)
    }

    fn node_count(&self) -> usize {
        self.0.node_count()
    }

    fn visit_edges(&self, node: NodeId, visit: &mut dyn FnMut(SearchEdge)) {
        for &index in self.0.outgoing(node) {
            if let Some(edge) = self.0.edge(index) {
                visit(SearchEdge {
                    index,
                    target: edge.to,
                    weight: edge.length_m,
                    bearing: edge.bearing,
                });
            }
        }
    }
}
