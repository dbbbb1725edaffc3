//! Collapse chains of through-nodes into intersection-to-intersection edges.
//!
//! A node is a junction when its undirected degree in the raw graph is not
//! exactly two, or when the caller names it as a route endpoint. Every other
//! node is a through-node and disappears into a [`CompositeEdge`].
//!
//! Chains are walked per outgoing edge of each junction, so direction is
//! preserved and a two-way road yields one composite edge per direction.
//! Rings made only of through-nodes never reach a junction; they are reported
//! as [`ClosedLoop`] entries rather than composite edges.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Instant;

use tracing::{debug, warn};

use crate::error::Error;
use crate::geodesy::{bearing_deg, Coordinate};
use crate::graph::{EdgeIndex, NodeId, RoadGraph};

/// Aggregated edge between two junctions.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeEdge {
    pub from: NodeId,
    pub to: NodeId,
    /// Sequential sum of the constituent raw-edge weights.
    pub weight: f64,
    pub length_m: f64,
    /// Concatenated polyline, `None` when any constituent lacks geometry.
    pub geometry: Option<Vec<Coordinate>>,
    /// Constituent raw-edge indices in travel order.
    pub edges: Vec<EdgeIndex>,
    pub bearing: f64,
}

/// A ring of through-nodes with no junction on it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedLoop {
    pub start: NodeId,
    pub edges: Vec<EdgeIndex>,
}

/// Junction-level view of a [`RoadGraph`].
#[derive(Debug, Clone, Default)]
pub struct IntersectionGraph {
    junctions: BTreeMap<NodeId, Coordinate>,
    edges: Vec<CompositeEdge>,
    outgoing: HashMap<NodeId, Vec<usize>>,
    closed_loops: Vec<ClosedLoop>,
}

impl IntersectionGraph {
    pub fn junction_count(&self) -> usize {
        self.junctions.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.junctions.contains_key(&node)
    }

    pub fn coordinate(&self, node: NodeId) -> Option<Coordinate> {
        self.junctions.get(&node).copied()
    }

    pub fn junctions(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.junctions.keys().copied()
    }

    pub fn edges(&self) -> &[CompositeEdge] {
        &self.edges
    }

    pub fn edge(&self, index: usize) -> Option<&CompositeEdge> {
        self.edges.get(index)
    }

    pub fn outgoing(&self, node: NodeId) -> &[usize] {
        self.outgoing
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn closed_loops(&self) -> &[ClosedLoop] {
        &self.closed_loops
    }
}

/// Build the intersection graph of `raw`, forcing every node in `endpoints`
/// to be kept as a junction.
pub fn simplify(raw: &RoadGraph, endpoints: &[NodeId]) -> IntersectionGraph {
    let started = Instant::now();
    let forced: HashSet<NodeId> = endpoints.iter().copied().collect();
    let is_junction = |node: NodeId| raw.undirected_degree(node) != 2 || forced.contains(&node);

    let mut graph = IntersectionGraph::default();
    for (node, coordinate) in raw.nodes() {
        if is_junction(node) {
            graph.junctions.insert(node, coordinate);
        }
    }

    let mut covered: HashSet<NodeId> = HashSet::new();
    let origins: Vec<NodeId> = graph.junctions.keys().copied().collect();
    for origin in origins {
        for &first in raw.outgoing(origin) {
            match walk_chain(raw, origin, first, &is_junction, &mut covered) {
                ChainEnd::Junction { to, edges } => {
                    let composite = aggregate(raw, &graph.junctions, origin, to, edges);
                    graph.push(composite);
                }
                ChainEnd::Cycle { edges } => {
                    warn!(
                        origin,
                        edges = edges.len(),
                        "{}",
                        Error::DegenerateChain { start: origin }
                    );
                }
                ChainEnd::DeadEnd { at } => {
                    debug!(origin, at, "chain stopped at a through-node without continuation");
                }
            }
        }
    }

    graph.closed_loops = find_closed_loops(raw, &is_junction, &mut covered);
    for ring in &graph.closed_loops {
        warn!(
            start = ring.start,
            edges = ring.edges.len(),
            "{}; excluded from intersection graph",
            Error::DegenerateChain { start: ring.start }
        );
    }

    debug!(
        raw_nodes = raw.node_count(),
        junctions = graph.junction_count(),
        composite_edges = graph.edge_count(),
        closed_loops = graph.closed_loops.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "simplified road graph"
    );
    graph
}

impl IntersectionGraph {
    fn push(&mut self, edge: CompositeEdge) {
        let index = self.edges.len();
        self.outgoing.entry(edge.from).or_default().push(index);
        self.edges.push(edge);
    }
}

enum ChainEnd {
    Junction { to: NodeId, edges: Vec<EdgeIndex> },
    Cycle { edges: Vec<EdgeIndex> },
    DeadEnd { at: NodeId },
}

fn walk_chain(
    raw: &RoadGraph,
    origin: NodeId,
    first: EdgeIndex,
    is_junction: &impl Fn(NodeId) -> bool,
    covered: &mut HashSet<NodeId>,
) -> ChainEnd {
    let mut visited: HashSet<NodeId> = HashSet::from([origin]);
    let mut chain = vec![first];
    let mut incoming = first;

    loop {
        let Some(edge) = raw.edge(incoming) else {
            return ChainEnd::DeadEnd { at: origin };
        };
        let current = edge.to;
        if is_junction(current) {
            return ChainEnd::Junction {
                to: current,
                edges: chain,
            };
        }
        if !visited.insert(current) {
            return ChainEnd::Cycle { edges: chain };
        }
        covered.insert(current);

        match continuation(raw, current, incoming) {
            Some(next) => {
                chain.push(next);
                incoming = next;
            }
            None => return ChainEnd::DeadEnd { at: current },
        }
    }
}

/// The single edge leaving a through-node other than the reverse twin of the
/// edge it was entered by.
fn continuation(raw: &RoadGraph, node: NodeId, incoming: EdgeIndex) -> Option<EdgeIndex> {
    let entered = raw.edge(incoming)?;
    let mut candidates = raw.outgoing(node).iter().copied().filter(|&index| {
        raw.edge(index)
            .map(|edge| !(edge.to == entered.from && edge.key == entered.key))
            .unwrap_or(false)
    });
    let next = candidates.next()?;
    if candidates.next().is_some() {
        return None;
    }
    Some(next)
}

fn aggregate(
    raw: &RoadGraph,
    junctions: &BTreeMap<NodeId, Coordinate>,
    from: NodeId,
    to: NodeId,
    edges: Vec<EdgeIndex>,
) -> CompositeEdge {
    let mut weight = 0.0;
    let mut length_m = 0.0;
    let mut geometry: Option<Vec<Coordinate>> = Some(Vec::new());
    let mut first_bearing = None;

    for &index in &edges {
        let Some(edge) = raw.edge(index) else {
            geometry = None;
            continue;
        };
        weight += edge.weight;
        length_m += edge.length_m;
        first_bearing.get_or_insert(edge.bearing);
        match geometry.as_mut() {
            Some(points) if edge.has_geometry() => append_points(points, &edge.geometry),
            _ => geometry = None,
        }
    }

    let bearing = match (junctions.get(&from), junctions.get(&to)) {
        (Some(a), Some(b)) if from != to => bearing_deg(*a, *b),
        _ => first_bearing.unwrap_or(0.0),
    };

    CompositeEdge {
        from,
        to,
        weight,
        length_m,
        geometry,
        edges,
        bearing,
    }
}

fn append_points(target: &mut Vec<Coordinate>, points: &[Coordinate]) {
    for point in points {
        if target.last() != Some(point) {
            target.push(*point);
        }
    }
}

fn find_closed_loops(
    raw: &RoadGraph,
    is_junction: &impl Fn(NodeId) -> bool,
    covered: &mut HashSet<NodeId>,
) -> Vec<ClosedLoop> {
    let stranded: BTreeSet<NodeId> = raw
        .nodes()
        .map(|(id, _)| id)
        .filter(|id| !is_junction(*id) && !covered.contains(id))
        .collect();

    let mut loops = Vec::new();
    for start in stranded {
        if covered.contains(&start) {
            continue;
        }
        covered.insert(start);
        let Some(&first) = raw.outgoing(start).first() else {
            continue;
        };

        let mut edges = vec![first];
        let mut incoming = first;
        let mut visited: HashSet<NodeId> = HashSet::from([start]);
        loop {
            let Some(current) = raw.edge(incoming).map(|edge| edge.to) else {
                break;
            };
            if current == start {
                loops.push(ClosedLoop { start, edges });
                break;
            }
            if is_junction(current) || !visited.insert(current) {
                break;
            }
            covered.insert(current);
            match continuation(raw, current, incoming) {
                Some(next) => {
                    edges.push(next);
                    incoming = next;
                }
                None => break,
            }
        }
    }
    loops
}
