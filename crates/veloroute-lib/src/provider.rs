use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::geodesy::{haversine_m, midpoint, Coordinate};
use crate::graph::{Direction, NodeId, RoadGraph, RoadGraphBuilder, RoadSpec};
use crate::tags::{RoadClass, SurfaceKind};

/// Public Overpass API endpoint used when no override is configured.
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Minimum spacing between two requests to the same Overpass endpoint.
pub const DEFAULT_MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(1);

/// Way filter selecting roads a bicycle may use.
const BIKE_WAY_FILTER: &str = concat!(
    r#"["highway"]["area"!~"yes"]"#,
    r#"["highway"!~"abandoned|bus_guideway|construction|corridor|elevator|escalator|footway|motor|no|planned|platform|proposed|raceway|steps"]"#,
    r#"["bicycle"!~"no"]["service"!~"private"]"#,
);

/// Circular area requested from a provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchArea {
    pub center: Coordinate,
    pub radius_m: f64,
}

impl FetchArea {
    pub fn new(center: Coordinate, radius_m: f64) -> Self {
        Self { center, radius_m }
    }

    /// Smallest circle around the midpoint of `a` and `b` that contains both,
    /// widened by `buffer_m`.
    pub fn enclosing(a: Coordinate, b: Coordinate, buffer_m: f64) -> Self {
        let center = midpoint(a, b);
        let half = haversine_m(a, center).max(haversine_m(b, center));
        Self {
            center,
            radius_m: half + buffer_m.max(0.0),
        }
    }
}

/// Source of raw road graphs for a geographic area.
pub trait GraphProvider {
    /// Fetch the raw road graph covering `area`.
    ///
    /// Transient failures (rate limits, timeouts) are reported as errors for
    /// which [`Error::is_transient`] returns `true`.
    fn fetch(&self, area: &FetchArea) -> Result<RoadGraph>;
}

impl<P: GraphProvider + ?Sized> GraphProvider for &P {
    fn fetch(&self, area: &FetchArea) -> Result<RoadGraph> {
        (**self).fetch(area)
    }
}

impl<P: GraphProvider + ?Sized> GraphProvider for Box<P> {
    fn fetch(&self, area: &FetchArea) -> Result<RoadGraph> {
        (**self).fetch(area)
    }
}

impl<P: GraphProvider + ?Sized> GraphProvider for Arc<P> {
    fn fetch(&self, area: &FetchArea) -> Result<RoadGraph> {
        (**self).fetch(area)
    }
}

/// Serves crops of a graph held in memory, typically loaded from a JSON
/// document.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    graph: RoadGraph,
}

impl StaticProvider {
    pub fn new(graph: RoadGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &RoadGraph {
        &self.graph
    }
}

impl GraphProvider for StaticProvider {
    fn fetch(&self, area: &FetchArea) -> Result<RoadGraph> {
        let crop = self.graph.subgraph_within(area.center, area.radius_m);
        debug!(
            center = %area.center,
            radius_m = area.radius_m,
            nodes = crop.node_count(),
            edges = crop.edge_count(),
            "served static road graph crop"
        );
        Ok(crop)
    }
}

/// Fetches bicycle-usable ways from an Overpass API endpoint.
///
/// Requests are serialised and spaced by a minimum interval so a single
/// planner never exceeds the endpoint's rate limit.
#[derive(Debug)]
pub struct OverpassProvider {
    client: Client,
    endpoint: String,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl OverpassProvider {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            endpoint: endpoint.into(),
            min_interval: DEFAULT_MIN_REQUEST_INTERVAL,
            last_request: Mutex::new(None),
        })
    }

    /// Provider for the public endpoint.
    pub fn public() -> Result<Self> {
        Self::new(DEFAULT_OVERPASS_URL)
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn send(&self, query: &str) -> Result<String> {
        // The guard is held for the whole request, serialising callers.
        let mut last = self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                thread::sleep(self.min_interval - elapsed);
            }
        }
        *last = Some(Instant::now());

        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("data", query)])
            .send()?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(Error::ProviderUnavailable {
                attempts: 1,
                message: format!("overpass responded with {status}"),
            });
        }
        let response = response.error_for_status()?;
        Ok(response.text()?)
    }
}

impl GraphProvider for OverpassProvider {
    fn fetch(&self, area: &FetchArea) -> Result<RoadGraph> {
        let started = Instant::now();
        let query = overpass_query(area);
        let body = self.send(&query)?;
        let graph = parse_overpass_response(&body)?;
        info!(
            center = %area.center,
            radius_m = area.radius_m,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched road graph"
        );
        Ok(graph)
    }
}

fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(180))
        .user_agent(user_agent())
        .build()
        .map_err(Error::Http)
}

fn user_agent() -> String {
    format!("veloroute-lib/{version}", version = env!("CARGO_PKG_VERSION"))
}

/// Overpass QL selecting bicycle-usable ways and their nodes around `area`.
pub fn overpass_query(area: &FetchArea) -> String {
    format!(
        "[out:json][timeout:180];way{filter}(around:{radius:.0},{lat:.7},{lon:.7});(._;>;);out body;",
        filter = BIKE_WAY_FILTER,
        radius = area.radius_m.max(1.0),
        lat = area.center.lat,
        lon = area.center.lon,
    )
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OverpassElement {
    Node {
        id: NodeId,
        lat: f64,
        lon: f64,
    },
    Way {
        #[serde(default)]
        nodes: Vec<NodeId>,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
    #[serde(other)]
    Other,
}

/// Convert an Overpass JSON response into a raw road graph.
///
/// Each way is split into one road per consecutive node pair. Direction
/// follows `oneway` (`yes`/`true`/`1` forward, `-1`/`reverse` backward,
/// roundabouts forward) unless `oneway:bicycle=no` reopens the contraflow.
pub fn parse_overpass_response(body: &str) -> Result<RoadGraph> {
    let response: OverpassResponse = serde_json::from_str(body)?;
    let mut builder = RoadGraphBuilder::new();
    let mut ways = Vec::new();

    for element in response.elements {
        match element {
            OverpassElement::Node { id, lat, lon } => match Coordinate::checked(lat, lon) {
                Ok(coordinate) => {
                    builder.add_node(id, coordinate);
                }
                Err(err) => warn!(node = id, error = %err, "skipping overpass node"),
            },
            OverpassElement::Way { nodes, tags } => ways.push((nodes, tags)),
            OverpassElement::Other => {}
        }
    }

    let mut skipped = 0usize;
    for (nodes, tags) in ways {
        let road_class = RoadClass::from_tag(tags.get("highway").map(String::as_str));
        let surface = SurfaceKind::from_tag(tags.get("surface").map(String::as_str));
        let direction = way_direction(&tags);
        for pair in nodes.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let (Some(a), Some(b)) = (builder.node_coordinate(from), builder.node_coordinate(to))
            else {
                skipped += 1;
                continue;
            };
            builder.add_road(
                RoadSpec::new(from, to, road_class)
                    .surface(surface)
                    .geometry(vec![a, b])
                    .direction(direction),
            )?;
        }
    }
    if skipped > 0 {
        debug!(skipped, "ignored way segments referencing missing nodes");
    }
    Ok(builder.build())
}

fn way_direction(tags: &HashMap<String, String>) -> Direction {
    if tags.get("oneway:bicycle").map(String::as_str) == Some("no") {
        return Direction::Both;
    }
    match tags.get("oneway").map(String::as_str) {
        Some("yes" | "true" | "1") => Direction::Forward,
        Some("-1" | "reverse") => Direction::Backward,
        _ if tags.get("junction").map(String::as_str) == Some("roundabout") => Direction::Forward,
        _ => Direction::Both,
    }
}

/// Bounded retry policy for provider calls and fetch-radius growth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    /// Factor applied to the fetch radius on every attempt after the first.
    pub radius_growth: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 2000,
            backoff_multiplier: 2.0,
            radius_growth: 1.5,
        }
    }
}

impl RetryPolicy {
    /// Policy that tries once and never waits.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            ..Self::default()
        }
    }

    pub fn schedule(&self, initial_radius_m: f64) -> RetrySchedule {
        RetrySchedule {
            policy: *self,
            initial_radius_m,
            next: 1,
        }
    }
}

/// One step of a [`RetrySchedule`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attempt {
    /// 1-based attempt number.
    pub number: u32,
    /// Wait before this attempt when the previous one failed transiently.
    pub backoff: Duration,
    pub radius_m: f64,
}

/// Iterator over the attempts permitted by a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    policy: RetryPolicy,
    initial_radius_m: f64,
    next: u32,
}

impl Iterator for RetrySchedule {
    type Item = Attempt;

    fn next(&mut self) -> Option<Attempt> {
        let max = self.policy.max_attempts.max(1);
        if self.next > max {
            return None;
        }
        let number = self.next;
        self.next += 1;

        let backoff = if number == 1 {
            Duration::ZERO
        } else {
            let scale = self.policy.backoff_multiplier.max(1.0).powi(number as i32 - 2);
            Duration::from_secs_f64(self.policy.initial_backoff_ms as f64 * scale / 1000.0)
        };
        let radius_m =
            self.initial_radius_m * self.policy.radius_growth.max(1.0).powi(number as i32 - 1);

        Some(Attempt {
            number,
            backoff,
            radius_m,
        })
    }
}

/// Fetch `area`, retrying transient failures with exponential backoff.
///
/// The radius stays fixed; growth is applied by callers that retry on a
/// missing path rather than on a failed fetch. Once the schedule is
/// exhausted the last failure is reported as
/// [`Error::ProviderUnavailable`].
pub fn fetch_with_retry<P>(provider: &P, area: &FetchArea, policy: &RetryPolicy) -> Result<RoadGraph>
where
    P: GraphProvider + ?Sized,
{
    let mut last_message = String::new();
    let mut attempts = 0;
    for attempt in policy.schedule(area.radius_m) {
        if attempt.number > 1 && !attempt.backoff.is_zero() {
            thread::sleep(attempt.backoff);
        }
        attempts = attempt.number;
        match provider.fetch(area) {
            Ok(graph) => return Ok(graph),
            Err(err) if err.is_transient() => {
                warn!(
                    attempt = attempt.number,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "provider request failed; retrying"
                );
                last_message = err.to_string();
            }
            Err(err) => return Err(err),
        }
    }
    Err(Error::ProviderUnavailable {
        attempts,
        message: last_message,
    })
}
