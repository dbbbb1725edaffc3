mod common;

use common::{grid_node, sample_network};
use veloroute_lib::{simplify, RoutePreferences};

#[test]
fn grid_corners_collapse_and_ring_is_reported() {
    let mut graph = sample_network();
    graph.apply_weights(&RoutePreferences::default());
    let intersections = simplify(&graph, &[]);

    // Four grid corners are through-nodes; the detached ring has no junction.
    assert_eq!(intersections.junction_count(), graph.node_count() - 4 - 4);
    assert!(!intersections.contains(grid_node(0, 0)));
    assert!(intersections.contains(grid_node(0, 1)));

    let loops = intersections.closed_loops();
    assert_eq!(loops.len(), 1);
    assert_eq!(loops[0].edges.len(), 4);
}

#[test]
fn composite_edges_preserve_weight_and_never_repeat_points() {
    let mut graph = sample_network();
    graph.apply_weights(&RoutePreferences {
        prefer_unpaved: 0.2,
        ..RoutePreferences::default()
    });
    let intersections = simplify(&graph, &[]);

    for composite in intersections.edges() {
        let raw_sum: f64 = composite
            .edges
            .iter()
            .map(|&index| graph.edge(index).expect("raw edge").weight)
            .sum();
        assert!(
            (composite.weight - raw_sum).abs() < 1e-9,
            "{} -> {}: {} vs {}",
            composite.from,
            composite.to,
            composite.weight,
            raw_sum
        );
        if let Some(points) = &composite.geometry {
            assert!(points.windows(2).all(|pair| pair[0] != pair[1]));
        }
    }

    let around_corner = intersections
        .outgoing(grid_node(0, 1))
        .iter()
        .filter_map(|&index| intersections.edge(index))
        .find(|edge| edge.to == grid_node(1, 0))
        .expect("chain through the south-west corner");
    assert_eq!(around_corner.edges.len(), 2);
    // The north-south leg carries no geometry in the fixture.
    assert!(around_corner.geometry.is_none());
}

#[test]
fn endpoints_stay_junctions() {
    let graph = sample_network();
    let corner = grid_node(29, 29);
    let intersections = simplify(&graph, &[corner]);
    assert!(intersections.contains(corner));
    assert_eq!(intersections.outgoing(corner).len(), 2);
}
