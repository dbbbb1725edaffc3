mod common;

use veloroute_lib::segment::{route_on_graph, LegMode, LegOptions};
use veloroute_lib::{
    edge_weight, edge_weight_from_tags, Coordinate, HeadingBias, RoadClass, RoadGraph, RoadSpec,
    RoutePreferences, SurfaceKind,
};

const A: Coordinate = Coordinate::new(52.0, 21.0);
const PAVED_MID: Coordinate = Coordinate::new(52.003, 21.005);
const UNPAVED_MID: Coordinate = Coordinate::new(51.997, 21.005);
const B: Coordinate = Coordinate::new(52.0, 21.01);

/// Two alternatives between A and B: 1000 m of asphalt to the north and
/// 800 m of unpaved track to the south.
fn paved_or_unpaved(prefs: &RoutePreferences) -> RoadGraph {
    let mut builder = RoadGraph::builder();
    builder
        .add_node(1, A)
        .add_node(2, B)
        .add_node(3, PAVED_MID)
        .add_node(4, UNPAVED_MID);
    let legs = [
        (1, 3, A, PAVED_MID, SurfaceKind::Paved, 500.0),
        (3, 2, PAVED_MID, B, SurfaceKind::Paved, 500.0),
        (1, 4, A, UNPAVED_MID, SurfaceKind::Unpaved, 400.0),
        (4, 2, UNPAVED_MID, B, SurfaceKind::Unpaved, 400.0),
    ];
    for (from, to, a, b, surface, length) in legs {
        builder
            .add_road(
                RoadSpec::new(from, to, RoadClass::Residential)
                    .surface(surface)
                    .length(length)
                    .geometry(vec![a, b]),
            )
            .expect("nodes exist");
    }
    let mut graph = builder.build();
    graph.apply_weights(prefs);
    graph
}

fn options() -> LegOptions {
    LegOptions {
        heading: HeadingBias::default(),
        exact_search_node_limit: 2000,
    }
}

#[test]
fn weights_are_finite_and_non_negative_for_every_tag_combination() {
    let highways = [
        None,
        Some("motorway"),
        Some("primary;secondary"),
        Some("cycleway"),
        Some("track"),
        Some("no-such-class"),
    ];
    let surfaces = [None, Some("asphalt"), Some("gravel"), Some("mud"), Some("???")];
    let preferences = [
        RoutePreferences::default(),
        RoutePreferences {
            prefer_main_roads: 1.0,
            prefer_unpaved: 1.0,
            surface_weight_factor: 3.0,
            ..RoutePreferences::default()
        },
        RoutePreferences {
            prefer_main_roads: f64::NAN,
            surface_weight_factor: 42.0,
            ..RoutePreferences::default()
        },
    ];
    for length in [0.0, 12.5, f64::NAN, -3.0, f64::INFINITY] {
        for highway in highways {
            for surface in surfaces {
                for prefs in &preferences {
                    let weight = edge_weight_from_tags(length, highway, surface, prefs);
                    assert!(
                        weight.is_finite() && weight >= 0.0,
                        "{highway:?}/{surface:?} at {length} m gave {weight}"
                    );
                }
            }
        }
    }
}

#[test]
fn cycleways_beat_trunk_roads_under_any_main_road_preference() {
    for preference in [0.0, 0.5, 1.0] {
        let prefs = RoutePreferences {
            prefer_main_roads: preference,
            ..RoutePreferences::default()
        };
        let cycleway = edge_weight(100.0, RoadClass::Cycleway, SurfaceKind::Paved, &prefs);
        let trunk = edge_weight(100.0, RoadClass::Trunk, SurfaceKind::Paved, &prefs);
        assert!(cycleway < trunk, "preference {preference}");
    }
}

#[test]
fn heavy_surface_factor_keeps_the_paved_detour() {
    let prefs = RoutePreferences {
        surface_weight_factor: 2.0,
        ..RoutePreferences::default()
    };
    let graph = paved_or_unpaved(&prefs);
    for mode in [LegMode::Raw, LegMode::Intersection] {
        let track = route_on_graph(&graph, A, B, mode, &options()).expect("connected");
        assert!(track.contains(&PAVED_MID), "{mode:?}: {track:?}");
        assert!(!track.contains(&UNPAVED_MID), "{mode:?}: {track:?}");
    }
}

#[test]
fn light_surface_factor_takes_the_shorter_unpaved_track() {
    let prefs = RoutePreferences {
        surface_weight_factor: 0.1,
        ..RoutePreferences::default()
    };
    let graph = paved_or_unpaved(&prefs);
    for mode in [LegMode::Raw, LegMode::Intersection] {
        let track = route_on_graph(&graph, A, B, mode, &options()).expect("connected");
        assert!(track.contains(&UNPAVED_MID), "{mode:?}: {track:?}");
        assert_eq!(track.first(), Some(&A));
        assert_eq!(track.last(), Some(&B));
    }
}

#[test]
fn weight_is_positive_and_non_decreasing_in_length() {
    let classes = [
        RoadClass::Motorway,
        RoadClass::Secondary,
        RoadClass::Residential,
        RoadClass::Cycleway,
        RoadClass::Unknown,
    ];
    let surfaces = [
        SurfaceKind::Paved,
        SurfaceKind::Gravel,
        SurfaceKind::Dirt,
        SurfaceKind::Unknown,
    ];
    let preferences = [
        RoutePreferences::default(),
        RoutePreferences {
            prefer_main_roads: 0.0,
            prefer_unpaved: 1.0,
            surface_weight_factor: 0.1,
            ..RoutePreferences::default()
        },
        RoutePreferences {
            prefer_main_roads: 1.0,
            prefer_unpaved: 0.0,
            surface_weight_factor: 3.0,
            ..RoutePreferences::default()
        },
    ];
    let lengths = [0.5, 1.0, 7.25, 100.0, 1_000.0, 250_000.0];
    for class in classes {
        for surface in surfaces {
            for prefs in &preferences {
                let weights: Vec<f64> = lengths
                    .iter()
                    .map(|&length| edge_weight(length, class, surface, prefs))
                    .collect();
                assert!(weights.iter().all(|&w| w > 0.0), "{class}/{surface}: {weights:?}");
                assert!(
                    weights.windows(2).all(|pair| pair[0] <= pair[1]),
                    "{class}/{surface}: {weights:?}"
                );
            }
        }
    }
}

#[test]
fn unit_surface_factor_reproduces_the_penalty_table() {
    let prefs = RoutePreferences::default();
    for (surface, penalty) in [
        (SurfaceKind::Paved, 1.0),
        (SurfaceKind::Gravel, 1.6),
        (SurfaceKind::Dirt, 2.0),
    ] {
        let weight = edge_weight(100.0, RoadClass::Residential, surface, &prefs);
        assert!((weight - 100.0 * penalty).abs() < 1e-9, "{surface}: {weight}");
    }
}

#[test]
fn raising_surface_factor_makes_rough_surfaces_relatively_dearer() {
    for rough in [SurfaceKind::Gravel, SurfaceKind::Dirt] {
        let ratios: Vec<f64> = [0.1, 0.5, 1.0, 1.5, 2.0, 3.0]
            .into_iter()
            .map(|factor| {
                let prefs = RoutePreferences {
                    surface_weight_factor: factor,
                    ..RoutePreferences::default()
                };
                edge_weight(500.0, RoadClass::Residential, rough, &prefs)
                    / edge_weight(500.0, RoadClass::Residential, SurfaceKind::Paved, &prefs)
            })
            .collect();
        assert!(
            ratios.windows(2).all(|pair| pair[0] < pair[1]),
            "{rough}: {ratios:?}"
        );
    }
}

#[test]
fn missing_surface_weighs_like_explicit_paved() {
    for prefs in [
        RoutePreferences::default(),
        RoutePreferences {
            prefer_unpaved: 1.0,
            surface_weight_factor: 3.0,
            ..RoutePreferences::default()
        },
    ] {
        let missing = edge_weight_from_tags(321.0, Some("residential"), None, &prefs);
        for explicit in ["paved", "asphalt", "concrete"] {
            let tagged = edge_weight_from_tags(321.0, Some("residential"), Some(explicit), &prefs);
            assert_eq!(missing, tagged, "{explicit}");
        }
    }
}

#[test]
fn compound_surface_tag_weighs_like_its_base_value() {
    let prefs = RoutePreferences::default();
    for highway in [Some("primary"), Some("cycleway"), None] {
        let compound = edge_weight_from_tags(250.0, highway, Some("asphalt:lanes"), &prefs);
        let plain = edge_weight_from_tags(250.0, highway, Some("asphalt"), &prefs);
        assert_eq!(compound, plain, "{highway:?}");
    }
    let gravel = edge_weight_from_tags(250.0, Some("track"), Some("gravel:both"), &prefs);
    assert_eq!(
        gravel,
        edge_weight_from_tags(250.0, Some("track"), Some("gravel"), &prefs)
    );
}

/// A 1000 m paved road and an 800 m unpaved road joining the same two
/// nodes, told apart by the bend in their geometry.
fn parallel_roads(prefs: &RoutePreferences) -> RoadGraph {
    let mut builder = RoadGraph::builder();
    builder.add_node(1, A).add_node(2, B);
    builder
        .add_road(
            RoadSpec::new(1, 2, RoadClass::Residential)
                .surface(SurfaceKind::Paved)
                .length(1000.0)
                .geometry(vec![A, PAVED_MID, B]),
        )
        .expect("nodes exist")
        .add_road(
            RoadSpec::new(1, 2, RoadClass::Residential)
                .surface(SurfaceKind::Unpaved)
                .length(800.0)
                .geometry(vec![A, UNPAVED_MID, B]),
        )
        .expect("nodes exist");
    let mut graph = builder.build();
    graph.apply_weights(prefs);
    graph
}

#[test]
fn parallel_edges_between_the_same_nodes_follow_the_surface_factor() {
    for (factor, kept, skipped) in [(2.0, PAVED_MID, UNPAVED_MID), (0.1, UNPAVED_MID, PAVED_MID)] {
        let prefs = RoutePreferences {
            surface_weight_factor: factor,
            ..RoutePreferences::default()
        };
        let graph = parallel_roads(&prefs);
        assert_eq!(graph.edge_count(), 4);
        for mode in [LegMode::Raw, LegMode::Intersection] {
            let track = route_on_graph(&graph, A, B, mode, &options()).expect("connected");
            assert!(track.contains(&kept), "factor {factor} {mode:?}: {track:?}");
            assert!(!track.contains(&skipped), "factor {factor} {mode:?}: {track:?}");
        }
    }
}
