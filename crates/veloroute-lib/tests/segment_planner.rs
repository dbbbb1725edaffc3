mod common;

use common::{
    fast_config, grid_coordinate, north_road, road_coordinate, sample_network, FlakyProvider,
    Reply, ScriptedProvider,
};
use veloroute_lib::segment::max_step_m;
use veloroute_lib::{
    plan_route, CancellationFlag, Coordinate, Error, PlannerConfig, RouteRequest,
    RoutePreferences, SegmentPlanner, StaticProvider,
};

fn segmented_config() -> PlannerConfig {
    PlannerConfig {
        segment_km: 2.0,
        direct_threshold_km: 2.0,
        radius_meters: 500.0,
        ..fast_config()
    }
}

#[test]
fn short_route_is_planned_directly_on_the_sample_grid() {
    let provider = StaticProvider::new(sample_network());
    let start = grid_coordinate(2, 2);
    let end = grid_coordinate(25, 25);
    let request = RouteRequest::new(start, end).with_config(fast_config());

    let result = plan_route(&provider, &request).expect("route planned");
    assert_eq!(result.segments, 1);
    assert_eq!(result.coordinates.first(), Some(&start));
    assert_eq!(result.coordinates.last(), Some(&end));
    assert!(!result.has_unrepaired_gap());
    assert!(max_step_m(&result.coordinates) <= 1000.0);
    // Manhattan distance on the grid is at least the straight line.
    assert!(result.distance_m >= veloroute_lib::haversine_m(start, end));
}

#[test]
fn long_straight_road_is_stitched_from_segments() {
    // About 5.5 km of road sampled every ~111 m.
    let provider = StaticProvider::new(north_road(0..=50));
    let planner = SegmentPlanner::new(&provider, segmented_config());
    let start = road_coordinate(0);
    let end = road_coordinate(50);

    let waypoints = planner.waypoints(start, end);
    assert_eq!(waypoints.len(), 4);
    assert_eq!(waypoints[0], start);
    assert_eq!(waypoints[3], end);

    let result = planner
        .plan_route(start, end, &RoutePreferences::default())
        .expect("route planned");
    assert_eq!(result.segments, 3);
    assert_eq!(result.repaired_gaps, 0);
    assert!(!result.has_unrepaired_gap());
    assert_eq!(result.coordinates.first(), Some(&start));
    assert_eq!(result.coordinates.last(), Some(&end));
    assert_eq!(result.point_count(), 51);
    assert!(result
        .coordinates
        .windows(2)
        .all(|pair| pair[0] != pair[1] && pair[0].lat < pair[1].lat));
}

#[test]
fn unbridgeable_hole_is_flagged_not_hidden() {
    // A ~1.5 km stretch with no road between rows 20 and 34.
    let provider = StaticProvider::new(north_road((0..=20).chain(34..=54)));
    let config = PlannerConfig {
        segment_km: 1.0,
        direct_threshold_km: 1.0,
        ..segmented_config()
    };
    let planner = SegmentPlanner::new(&provider, config);

    let result = planner
        .plan_route(
            road_coordinate(0),
            road_coordinate(54),
            &RoutePreferences::default(),
        )
        .expect("partial route still returned");

    assert!(max_step_m(&result.coordinates) <= 1000.0 || result.has_unrepaired_gap());
    assert!(result.has_unrepaired_gap());
    for gap in &result.unrepaired_gaps {
        assert!(gap.distance_m > 1000.0);
        assert_eq!(result.coordinates[gap.index], gap.from);
        assert_eq!(result.coordinates[gap.index + 1], gap.to);
    }
    assert_eq!(result.coordinates.last(), Some(&road_coordinate(54)));
}

/// Three legs over `north_road(0..=30)` with waypoints near rows 10 and 20.
fn three_leg_config() -> PlannerConfig {
    PlannerConfig {
        segment_km: 1.2,
        direct_threshold_km: 1.0,
        radius_meters: 500.0,
        repair_max_depth: 0,
        ..fast_config()
    }
}

#[test]
fn segment_without_roads_is_repaired_through_provider_outages() {
    // Leg 2 only ever sees empty graphs; the repair fetch then hits two
    // rate-limit responses before the third attempt is served.
    let script = vec![
        Reply::Serve,
        Reply::Empty,
        Reply::Empty,
        Reply::Empty,
        Reply::Serve,
        Reply::Outage,
        Reply::Outage,
    ];
    let provider = ScriptedProvider::new(north_road(0..=30), script);
    let planner = SegmentPlanner::new(&provider, three_leg_config());

    let result = planner
        .plan_route(
            road_coordinate(0),
            road_coordinate(30),
            &RoutePreferences::default(),
        )
        .expect("route planned");

    assert_eq!(provider.calls(), 8);
    assert_eq!(result.segments, 3);
    assert_eq!(result.repaired_gaps, 1);
    assert!(!result.has_unrepaired_gap());
    assert_eq!(result.point_count(), 31);
    assert!(max_step_m(&result.coordinates) <= 1000.0);
}

#[test]
fn repair_gives_up_quietly_when_the_provider_stays_down() {
    let mut script = vec![Reply::Serve, Reply::Empty, Reply::Empty, Reply::Empty, Reply::Serve];
    script.extend([Reply::Outage; 32]);
    let provider = ScriptedProvider::new(north_road(0..=30), script);
    let planner = SegmentPlanner::new(&provider, three_leg_config());

    let result = planner
        .plan_route(
            road_coordinate(0),
            road_coordinate(30),
            &RoutePreferences::default(),
        )
        .expect("partial route still returned");

    assert_eq!(result.repaired_gaps, 0);
    assert_eq!(result.unrepaired_gaps.len(), 1);
    assert_eq!(result.unrepaired_gaps[0].from, road_coordinate(10));
    assert_eq!(result.unrepaired_gaps[0].to, road_coordinate(20));
}

#[test]
fn request_far_from_any_road_is_an_empty_graph() {
    let provider = StaticProvider::new(north_road(0..=5));
    let planner = SegmentPlanner::new(&provider, fast_config());
    let err = planner
        .plan_route(
            Coordinate::new(10.0, 10.0),
            Coordinate::new(10.001, 10.0),
            &RoutePreferences::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::EmptyGraph), "{err}");
}

#[test]
fn disconnected_single_segment_is_no_path() {
    let provider = StaticProvider::new(north_road((0..=5).chain(15..=20)));
    let planner = SegmentPlanner::new(&provider, fast_config());
    let err = planner
        .plan_route(
            road_coordinate(0),
            road_coordinate(20),
            &RoutePreferences::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::NoPathFound { .. }), "{err}");
}

#[test]
fn cancelled_request_stops_before_fetching() {
    let provider = FlakyProvider::new(north_road(0..=10), 0);
    let flag = CancellationFlag::new();
    let planner = SegmentPlanner::new(&provider, fast_config()).with_cancellation(flag.clone());
    flag.cancel();

    let err = planner
        .plan_route(
            road_coordinate(0),
            road_coordinate(10),
            &RoutePreferences::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(provider.calls(), 0);
}

#[test]
fn transient_outages_are_retried_within_a_segment() {
    let provider = FlakyProvider::new(north_road(0..=10), 2);
    let planner = SegmentPlanner::new(&provider, fast_config());
    let result = planner
        .plan_route(
            road_coordinate(0),
            road_coordinate(10),
            &RoutePreferences::default(),
        )
        .expect("third attempt succeeds");
    assert_eq!(provider.calls(), 3);
    assert_eq!(result.point_count(), 11);
}

#[test]
fn exhausted_retries_surface_provider_unavailable() {
    let provider = FlakyProvider::new(north_road(0..=10), usize::MAX);
    let planner = SegmentPlanner::new(&provider, fast_config());
    let err = planner
        .plan_route(
            road_coordinate(0),
            road_coordinate(10),
            &RoutePreferences::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::ProviderUnavailable { attempts: 3, .. }), "{err}");
    assert_eq!(provider.calls(), 3);
}

#[test]
fn invalid_inputs_are_rejected_up_front() {
    let provider = StaticProvider::new(north_road(0..=3));
    let planner = SegmentPlanner::new(&provider, fast_config());

    let err = planner
        .plan_route(
            Coordinate::new(f64::NAN, 21.0),
            road_coordinate(3),
            &RoutePreferences::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCoordinate { .. }));

    let prefs = RoutePreferences {
        prefer_unpaved: 1.5,
        ..RoutePreferences::default()
    };
    let err = planner
        .plan_route(road_coordinate(0), road_coordinate(3), &prefs)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidPreference { name: "prefer_unpaved", .. }));

    let planner = SegmentPlanner::new(
        &provider,
        PlannerConfig {
            segment_km: 1e-9,
            ..fast_config()
        },
    );
    let err = planner
        .plan_route(road_coordinate(0), road_coordinate(3), &RoutePreferences::default())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig { .. }), "{err}");
}
