//! Long-route planning: segmentation, stitching and gap repair.
//!
//! Routes shorter than [`PlannerConfig::direct_threshold_km`] are searched in
//! one go. Longer routes are cut into legs between waypoints interpolated
//! along the straight line from start to end, each leg routed on a graph
//! fetched around it. The legs are concatenated, scanned for gaps and the gaps
//! repaired through the ladder in [`repair`].
//!
//! Provider calls happen strictly one after another; a segment's retries only
//! start once the previous segment has finished.

mod leg;
mod repair;
mod stitch;

pub use leg::{reconstruct, route_on_graph, LegMode, LegOptions};
pub use repair::{repair_gaps, LegRouter, RepairBudget, RepairReport};
pub use stitch::{append_dedup, detect_gaps, max_step_m, Gap};

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{PlannerConfig, MIN_SEGMENT_KM};
use crate::error::{Error, Result};
use crate::geodesy::{haversine_m, interpolate, path_length_m, Coordinate};
use crate::graph::RoadGraph;
use crate::provider::{fetch_with_retry, FetchArea, GraphProvider};
use crate::weight::RoutePreferences;

/// Shared flag for cancelling a request between segments.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Final track for a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    /// Ordered, non-empty track from the requested start to the requested end.
    pub coordinates: Vec<Coordinate>,
    /// Number of waypoint legs planned.
    pub segments: usize,
    pub repaired_gaps: usize,
    /// Gaps that survived repair; non-empty means the track contains
    /// straight-line jumps longer than the gap threshold.
    pub unrepaired_gaps: Vec<Gap>,
    pub distance_m: f64,
}

impl RouteResult {
    pub fn has_unrepaired_gap(&self) -> bool {
        !self.unrepaired_gaps.is_empty()
    }

    pub fn point_count(&self) -> usize {
        self.coordinates.len()
    }
}

/// Orchestrates searches across waypoint legs and repairs the stitched track.
#[derive(Debug)]
pub struct SegmentPlanner<P> {
    provider: P,
    config: PlannerConfig,
    cancel: Option<CancellationFlag>,
}

impl<P: GraphProvider> SegmentPlanner<P> {
    pub fn new(provider: P, config: PlannerConfig) -> Self {
        Self {
            provider,
            config,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Waypoints including `start` and `end`.
    ///
    /// Short routes get just the two endpoints. Longer routes are split into
    /// `ceil(distance / segment_km)` equal legs by linear interpolation.
    pub fn waypoints(&self, start: Coordinate, end: Coordinate) -> Vec<Coordinate> {
        let distance_m = haversine_m(start, end);
        if distance_m < self.config.direct_threshold_km * 1000.0 {
            return vec![start, end];
        }
        let spacing_m = self.config.segment_km.max(MIN_SEGMENT_KM) * 1000.0;
        let legs = (distance_m / spacing_m).ceil().max(1.0) as usize;
        let mut points = Vec::with_capacity(legs + 1);
        points.push(start);
        for i in 1..legs {
            points.push(interpolate(start, end, i as f64 / legs as f64));
        }
        points.push(end);
        points
    }

    /// Plan a route from `start` to `end`.
    ///
    /// Fails with [`Error::ProviderUnavailable`] once provider retries are
    /// exhausted, with [`Error::EmptyGraph`] when the provider has no roads
    /// anywhere along the request and with [`Error::NoPathFound`] when no leg
    /// could be routed.
    /// Gaps that cannot be repaired are reported in the result.
    pub fn plan_route(
        &self,
        start: Coordinate,
        end: Coordinate,
        prefs: &RoutePreferences,
    ) -> Result<RouteResult> {
        prefs.validate()?;
        self.config.validate()?;
        let start = Coordinate::checked(start.lat, start.lon)?;
        let end = Coordinate::checked(end.lat, end.lon)?;

        let started = Instant::now();
        let waypoints = self.waypoints(start, end);
        let segments = waypoints.len() - 1;
        info!(
            from = %start,
            to = %end,
            distance_m = haversine_m(start, end),
            segments,
            "planning route"
        );

        let mut track = vec![start];
        let mut routed = 0usize;
        let mut without_roads = 0usize;
        for (index, pair) in waypoints.windows(2).enumerate() {
            self.check_cancelled()?;
            if index > 0 && self.config.segment_pause_ms > 0 {
                thread::sleep(Duration::from_millis(self.config.segment_pause_ms));
            }
            match self.route_segment(pair[0], pair[1], prefs)? {
                SegmentOutcome::Routed(points) => {
                    debug!(segment = index, points = points.len(), "segment routed");
                    append_dedup(&mut track, &points);
                    routed += 1;
                }
                SegmentOutcome::NoPath => {
                    warn!(segment = index, "segment could not be routed; leaving a gap");
                }
                SegmentOutcome::NoRoads => {
                    warn!(segment = index, "no roads around segment; leaving a gap");
                    without_roads += 1;
                }
            }
        }
        if routed == 0 {
            if without_roads == segments {
                return Err(Error::EmptyGraph);
            }
            return Err(Error::no_path(start, end));
        }
        append_dedup(&mut track, &[end]);

        let router = ProviderLegRouter::new(self, prefs);
        let budget = RepairBudget {
            max_gap_m: self.config.max_gap_meters,
            max_depth: self.config.repair_max_depth,
        };
        let report = repair_gaps(&mut track, &router, &budget, self.cancel.as_ref())?;

        if track.is_empty() {
            return Err(Error::EmptyRoute);
        }
        let distance_m = path_length_m(&track);
        info!(
            points = track.len(),
            distance_m,
            gaps_detected = report.detected,
            gaps_repaired = report.repaired,
            gaps_unrepaired = report.unrepaired.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "route planned"
        );

        Ok(RouteResult {
            coordinates: track,
            segments,
            repaired_gaps: report.repaired,
            unrepaired_gaps: report.unrepaired,
            distance_m,
        })
    }

    /// Route one leg, retrying transient provider failures with backoff and
    /// widening the fetched area when no path is found.
    ///
    /// An empty graph counts as a failed attempt and widens the area like a
    /// missing path does.
    fn route_segment(
        &self,
        from: Coordinate,
        to: Coordinate,
        prefs: &RoutePreferences,
    ) -> Result<SegmentOutcome> {
        let options = self.leg_options(prefs);
        let policy = self.config.retry;
        let mut provider_failure: Option<String> = None;
        let mut found_roads = false;
        let mut attempts = 0;

        for attempt in policy.schedule(self.config.radius_meters) {
            attempts = attempt.number;
            if provider_failure.is_some() && !attempt.backoff.is_zero() {
                thread::sleep(attempt.backoff);
            }

            let area = FetchArea::enclosing(from, to, attempt.radius_m);
            let started = Instant::now();
            let mut graph = match self.provider.fetch(&area) {
                Ok(graph) => graph,
                Err(err) if err.is_transient() => {
                    warn!(
                        attempt = attempt.number,
                        max_attempts = policy.max_attempts,
                        error = %err,
                        "provider request failed"
                    );
                    provider_failure = Some(err.to_string());
                    continue;
                }
                Err(err) => return Err(err),
            };
            provider_failure = None;
            debug!(
                nodes = graph.node_count(),
                edges = graph.edge_count(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "fetched segment graph"
            );

            if graph.node_count() == 0 {
                warn!(
                    attempt = attempt.number,
                    radius_m = attempt.radius_m,
                    "{}",
                    Error::EmptyGraph
                );
                continue;
            }
            found_roads = true;

            graph.apply_weights(prefs);
            if let Some(points) = route_on_graph(&graph, from, to, LegMode::Auto, &options) {
                return Ok(SegmentOutcome::Routed(points));
            }
            warn!(
                attempt = attempt.number,
                radius_m = attempt.radius_m,
                "{}",
                Error::no_path(from, to)
            );
        }

        match provider_failure {
            Some(message) => Err(Error::ProviderUnavailable { attempts, message }),
            None if found_roads => Ok(SegmentOutcome::NoPath),
            None => Ok(SegmentOutcome::NoRoads),
        }
    }

    fn leg_options(&self, prefs: &RoutePreferences) -> LegOptions {
        LegOptions {
            heading: self.config.heading_bias(prefs),
            exact_search_node_limit: self.config.exact_search_node_limit,
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }
}

enum SegmentOutcome {
    Routed(Vec<Coordinate>),
    /// Roads were fetched but none connected the endpoints.
    NoPath,
    /// Every fetch came back without a single node.
    NoRoads,
}

/// Repair router backed by the planner's provider.
///
/// Fetches go through the planner's retry policy: transient failures back
/// off and retry, a missing path widens the area. Both ladder rungs for one
/// span request the same areas, so the graphs fetched for the current span
/// are kept and reused.
struct ProviderLegRouter<'a, P> {
    planner: &'a SegmentPlanner<P>,
    prefs: &'a RoutePreferences,
    options: LegOptions,
    fetched: RefCell<Vec<(FetchArea, RoadGraph)>>,
}

impl<'a, P: GraphProvider> ProviderLegRouter<'a, P> {
    fn new(planner: &'a SegmentPlanner<P>, prefs: &'a RoutePreferences) -> Self {
        Self {
            planner,
            prefs,
            options: planner.leg_options(prefs),
            fetched: RefCell::new(Vec::new()),
        }
    }

    /// Run `route` on the weighted graph for `area`, fetching it first if
    /// this span has not requested it yet.
    fn with_graph<T>(&self, area: &FetchArea, route: impl FnOnce(&RoadGraph) -> T) -> Result<T> {
        let mut fetched = self.fetched.borrow_mut();
        if fetched
            .first()
            .is_some_and(|(cached, _)| cached.center != area.center)
        {
            fetched.clear();
        }
        if let Some((_, graph)) = fetched.iter().find(|(cached, _)| cached == area) {
            return Ok(route(graph));
        }

        let policy = &self.planner.config.retry;
        let mut graph = fetch_with_retry(&self.planner.provider, area, policy)?;
        graph.apply_weights(self.prefs);
        let result = route(&graph);
        fetched.push((*area, graph));
        Ok(result)
    }
}

impl<P: GraphProvider> LegRouter for ProviderLegRouter<'_, P> {
    fn route_leg(
        &self,
        from: Coordinate,
        to: Coordinate,
        mode: LegMode,
    ) -> Option<Vec<Coordinate>> {
        let policy = self.planner.config.retry;
        for attempt in policy.schedule(self.planner.config.repair_radius_meters) {
            let area = FetchArea::enclosing(from, to, attempt.radius_m);
            match self.with_graph(&area, |graph| {
                route_on_graph(graph, from, to, mode, &self.options)
            }) {
                Ok(Some(points)) => return Some(points),
                Ok(None) => debug!(
                    ?mode,
                    attempt = attempt.number,
                    radius_m = attempt.radius_m,
                    "repair leg not found; widening"
                ),
                Err(err) => {
                    warn!(?mode, error = %err, "repair fetch failed");
                    return None;
                }
            }
        }
        None
    }
}
