//! Common test utilities and fixture helpers.
//!
//! Shared by the integration tests: fixture paths, small synthetic road
//! networks and providers with scripted failures.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use veloroute_lib::{
    Coordinate, Error, FetchArea, GraphProvider, NodeId, PlannerConfig, RoadClass, RoadGraph,
    RoadSpec, Result, RetryPolicy, StaticProvider,
};

/// Latitude/longitude spacing of synthetic networks, roughly 111 m north-south.
#[allow(dead_code)]
pub const STEP_DEG: f64 = 0.001;

/// Path to fixtures directory used by tests.
#[allow(dead_code)]
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs/fixtures")
}

/// The 30x30 grid network shipped with the docs, plus one detached ring.
#[allow(dead_code)]
pub fn sample_network() -> RoadGraph {
    RoadGraph::load_json(&fixtures_dir().join("sample_network.json")).expect("fixture loads")
}

/// Node identifier of grid cell `(row, col)` in [`sample_network`].
#[allow(dead_code)]
pub fn grid_node(row: i64, col: i64) -> NodeId {
    1000 + row * 30 + col
}

/// Coordinate of grid cell `(row, col)` in [`sample_network`].
#[allow(dead_code)]
pub fn grid_coordinate(row: i64, col: i64) -> Coordinate {
    Coordinate::new(52.0 + row as f64 * STEP_DEG, 21.0 + col as f64 * STEP_DEG)
}

/// North-bound residential road with one node per index in `rows`, each
/// `STEP_DEG` apart. Consecutive indices are joined; a jump in `rows`
/// leaves a hole without any road.
#[allow(dead_code)]
pub fn north_road(rows: impl IntoIterator<Item = i64>) -> RoadGraph {
    let rows: Vec<i64> = rows.into_iter().collect();
    let mut builder = RoadGraph::builder();
    for &row in &rows {
        builder.add_node(row, road_coordinate(row));
    }
    for pair in rows.windows(2) {
        if pair[1] != pair[0] + 1 {
            continue;
        }
        builder
            .add_road(
                RoadSpec::new(pair[0], pair[1], RoadClass::Residential)
                    .geometry(vec![road_coordinate(pair[0]), road_coordinate(pair[1])]),
            )
            .expect("road endpoints exist");
    }
    builder.build()
}

#[allow(dead_code)]
pub fn road_coordinate(row: i64) -> Coordinate {
    Coordinate::new(52.0 + row as f64 * STEP_DEG, 21.0)
}

/// Planner configuration that never sleeps.
#[allow(dead_code)]
pub fn fast_config() -> PlannerConfig {
    PlannerConfig {
        segment_pause_ms: 0,
        retry: RetryPolicy {
            initial_backoff_ms: 0,
            ..RetryPolicy::default()
        },
        ..PlannerConfig::default()
    }
}

/// Provider that fails transiently for its first `failures` calls.
#[allow(dead_code)]
pub struct FlakyProvider {
    inner: StaticProvider,
    failures: usize,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl FlakyProvider {
    pub fn new(graph: RoadGraph, failures: usize) -> Self {
        Self {
            inner: StaticProvider::new(graph),
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GraphProvider for FlakyProvider {
    fn fetch(&self, area: &FetchArea) -> Result<RoadGraph> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(Error::ProviderUnavailable {
                attempts: 1,
                message: format!("scripted outage {}", call + 1),
            });
        }
        self.inner.fetch(area)
    }
}

/// Provider that counts fetches before delegating.
#[allow(dead_code)]
pub struct CountingProvider {
    inner: StaticProvider,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl CountingProvider {
    pub fn new(graph: RoadGraph) -> Self {
        Self {
            inner: StaticProvider::new(graph),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GraphProvider for CountingProvider {
    fn fetch(&self, area: &FetchArea) -> Result<RoadGraph> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(area)
    }
}

/// Scripted answer for one provider call.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Serve,
    Empty,
    Outage,
}

/// Provider that answers call `n` with `script[n]` and serves the graph once
/// the script runs out.
#[allow(dead_code)]
pub struct ScriptedProvider {
    inner: StaticProvider,
    script: Vec<Reply>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn new(graph: RoadGraph, script: Vec<Reply>) -> Self {
        Self {
            inner: StaticProvider::new(graph),
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GraphProvider for ScriptedProvider {
    fn fetch(&self, area: &FetchArea) -> Result<RoadGraph> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.get(call).copied().unwrap_or(Reply::Serve) {
            Reply::Serve => self.inner.fetch(area),
            Reply::Empty => Ok(RoadGraph::builder().build()),
            Reply::Outage => Err(Error::ProviderUnavailable {
                attempts: 1,
                message: format!("scripted outage {}", call + 1),
            }),
        }
    }
}
