use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use tracing::debug;

use crate::geodesy::{angle_between, bearing_deg, haversine_m, Coordinate};
use crate::graph::{NodeId, RoadGraph};
use crate::simplify::IntersectionGraph;

/// Edge view handed to the search by a [`SearchGraph`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchEdge {
    /// Index of the edge in the owning graph.
    pub index: usize,
    pub target: NodeId,
    pub weight: f64,
    pub bearing: f64,
}

/// Graph representation the searchers can traverse.
///
/// Implemented by both the raw multigraph and the intersection graph so the
/// same search code runs over either.
pub trait SearchGraph {
    fn contains(&self, node: NodeId) -> bool;

    fn coordinate(&self, node: NodeId) -> Option<Coordinate>;

    fn node_count(&self) -> usize;

    /// Call `visit` for every edge leaving `node`.
    fn visit_edges(&self, node: NodeId, visit: &mut dyn FnMut(SearchEdge));
}

impl SearchGraph for RoadGraph {
    fn contains(&self, node: NodeId) -> bool {
        RoadGraph::contains(self, node)
    }

    fn coordinate(&self, node: NodeId) -> Option<Coordinate> {
        RoadGraph::coordinate(self, node)
    }

    fn node_count(&self) -> usize {
        RoadGraph::node_count(self)
    }

    fn visit_edges(&self, node: NodeId, visit: &mut dyn FnMut(SearchEdge)) {
        for &index in self.outgoing(node) {
            if let Some(edge) = self.edge(index) {
                visit(SearchEdge {
                    index,
                    target: edge.to,
                    weight: edge.weight,
                    bearing: edge.bearing,
                });
            }
        }
    }
}

impl SearchGraph for IntersectionGraph {
    fn contains(&self, node: NodeId) -> bool {
        IntersectionGraph::contains(self, node)
    }

    fn coordinate(&self, node: NodeId) -> Option<Coordinate> {
        IntersectionGraph::coordinate(self, node)
    }

    fn node_count(&self) -> usize {
        self.junction_count()
    }

    fn visit_edges(&self, node: NodeId, visit: &mut dyn FnMut(SearchEdge)) {
        for &index in self.outgoing(node) {
            if let Some(edge) = self.edge(index) {
                visit(SearchEdge {
                    index,
                    target: edge.to,
                    weight: edge.weight,
                    bearing: edge.bearing,
                });
            }
        }
    }
}

/// Least-cost path returned by a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPath {
    /// Visited nodes from start to goal, inclusive.
    pub nodes: Vec<NodeId>,
    /// Indices of the traversed edges; one fewer than `nodes`.
    pub edges: Vec<usize>,
    /// Accumulated cost, including any heading penalties.
    pub cost: f64,
}

impl SearchPath {
    fn trivial(node: NodeId) -> Self {
        Self {
            nodes: vec![node],
            edges: Vec::new(),
            cost: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Penalty for edges pointing away from the goal during heuristic search.
///
/// An edge whose bearing deviates from the direct bearing to the goal by more
/// than `threshold_deg` has its cost scaled by
/// `penalty_factor + (deviation - threshold_deg) / 180`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingBias {
    pub threshold_deg: f64,
    pub penalty_factor: f64,
}

impl Default for HeadingBias {
    fn default() -> Self {
        Self {
            threshold_deg: 60.0,
            penalty_factor: 1.5,
        }
    }
}

impl HeadingBias {
    /// Extra cost added on top of `weight` for an edge with `edge_bearing`
    /// leaving a node whose direct bearing to the goal is `goal_bearing`.
    pub fn extra_cost(&self, weight: f64, edge_bearing: f64, goal_bearing: f64) -> f64 {
        let deviation = angle_between(edge_bearing, goal_bearing);
        if deviation <= self.threshold_deg {
            return 0.0;
        }
        let multiplier = self.penalty_factor + (deviation - self.threshold_deg) / 180.0;
        (weight * (multiplier - 1.0)).max(0.0)
    }
}

/// Run Dijkstra's algorithm over non-negative edge weights.
///
/// Returns `None` when either endpoint is missing or the goal is unreachable.
pub fn find_route_dijkstra<G>(graph: &G, start: NodeId, goal: NodeId) -> Option<SearchPath>
where
    G: SearchGraph + ?Sized,
{
    if !graph.contains(start) || !graph.contains(goal) {
        return None;
    }
    if start == goal {
        return Some(SearchPath::trivial(start));
    }

    let mut distances: HashMap<NodeId, f64> = HashMap::new();
    let mut parents: HashMap<NodeId, (NodeId, usize)> = HashMap::new();
    let mut queue = BinaryHeap::new();
    let mut settled = 0usize;

    distances.insert(start, 0.0);
    queue.push(QueueEntry::new(start, 0.0));

    while let Some(entry) = queue.pop() {
        let current_distance = match distances.get(&entry.node) {
            Some(distance) if *distance < entry.cost.0 => continue,
            Some(distance) => *distance,
            None => continue,
        };
        settled += 1;

        if entry.node == goal {
            debug!(settled, cost = current_distance, "dijkstra reached goal");
            return Some(reconstruct_path(&parents, start, goal, current_distance));
        }

        graph.visit_edges(entry.node, &mut |edge| {
            let next_cost = current_distance + edge.weight.max(0.0);
            if next_cost < *distances.get(&edge.target).unwrap_or(&f64::INFINITY) {
                distances.insert(edge.target, next_cost);
                parents.insert(edge.target, (entry.node, edge.index));
                queue.push(QueueEntry::new(edge.target, next_cost));
            }
        });
    }

    debug!(settled, "dijkstra exhausted frontier");
    None
}

/// Run A* with a great-circle distance heuristic.
///
/// The heuristic assumes every metre costs at least one unit of weight. Road
/// classes discounted below `1.0` break that assumption, so results are
/// near-optimal rather than guaranteed optimal unless discounts are clamped.
/// With `heading` set, edges pointing away from the goal are penalised.
pub fn find_route_a_star<G>(
    graph: &G,
    start: NodeId,
    goal: NodeId,
    heading: Option<&HeadingBias>,
) -> Option<SearchPath>
where
    G: SearchGraph + ?Sized,
{
    if !graph.contains(start) || !graph.contains(goal) {
        return None;
    }
    if start == goal {
        return Some(SearchPath::trivial(start));
    }
    let goal_coord = graph.coordinate(goal);

    let mut g_score: HashMap<NodeId, f64> = HashMap::new();
    let mut parents: HashMap<NodeId, (NodeId, usize)> = HashMap::new();
    let mut queue = BinaryHeap::new();
    let mut settled = 0usize;

    g_score.insert(start, 0.0);
    queue.push(AStarEntry::new(
        start,
        0.0,
        heuristic_distance(graph, start, goal_coord),
    ));

    while let Some(entry) = queue.pop() {
        let current_score = match g_score.get(&entry.node) {
            Some(score) if *score < entry.cost.0 => continue,
            Some(score) => *score,
            None => continue,
        };
        settled += 1;

        if entry.node == goal {
            debug!(settled, cost = current_score, "a* reached goal");
            return Some(reconstruct_path(&parents, start, goal, current_score));
        }

        let goal_bearing = match (graph.coordinate(entry.node), goal_coord) {
            (Some(here), Some(there)) => Some(bearing_deg(here, there)),
            _ => None,
        };

        graph.visit_edges(entry.node, &mut |edge| {
            let weight = edge.weight.max(0.0);
            let penalty = match (heading, goal_bearing) {
                (Some(bias), Some(goal_bearing)) => {
                    bias.extra_cost(weight, edge.bearing, goal_bearing)
                }
                _ => 0.0,
            };
            let tentative_g = current_score + weight + penalty;
            if tentative_g < *g_score.get(&edge.target).unwrap_or(&f64::INFINITY) {
                g_score.insert(edge.target, tentative_g);
                parents.insert(edge.target, (entry.node, edge.index));
                let heuristic = heuristic_distance(graph, edge.target, goal_coord);
                queue.push(AStarEntry::new(edge.target, tentative_g, heuristic));
            }
        });
    }

    debug!(settled, "a* exhausted frontier");
    None
}

fn heuristic_distance<G>(graph: &G, from: NodeId, goal: Option<Coordinate>) -> f64
where
    G: SearchGraph + ?Sized,
{
    match (graph.coordinate(from), goal) {
        (Some(here), Some(there)) => haversine_m(here, there),
        _ => 0.0,
    }
}

fn reconstruct_path(
    parents: &HashMap<NodeId, (NodeId, usize)>,
    start: NodeId,
    goal: NodeId,
    cost: f64,
) -> SearchPath {
    let mut nodes = vec![goal];
    let mut edges = Vec::new();
    let mut current = goal;
    while current != start {
        let Some(&(parent, edge)) = parents.get(&current) else {
            break;
        };
        edges.push(edge);
        nodes.push(parent);
        current = parent;
    }
    nodes.reverse();
    edges.reverse();
    SearchPath { nodes, edges, cost }
}

#[derive(Copy, Clone, Debug, Default)]
struct FloatOrd(f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq(&other.0)
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct QueueEntry {
    node: NodeId,
    cost: FloatOrd,
}

impl QueueEntry {
    fn new(node: NodeId, cost: f64) -> Self {
        Self {
            node,
            cost: FloatOrd(cost),
        }
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering so BinaryHeap becomes a min-heap by cost.
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct AStarEntry {
    node: NodeId,
    cost: FloatOrd,
    estimate: FloatOrd,
}

impl AStarEntry {
    fn new(node: NodeId, cost: f64, heuristic: f64) -> Self {
        Self {
            node,
            cost: FloatOrd(cost),
            estimate: FloatOrd(cost + heuristic),
        }
    }
}

impl Ord for AStarEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .estimate
            .cmp(&self.estimate)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for AStarEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
