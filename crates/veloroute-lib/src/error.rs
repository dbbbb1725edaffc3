use std::path::PathBuf;

use thiserror::Error;

use crate::graph::NodeId;

/// Convenient result alias for the veloroute library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// The map-data provider could not serve a request after every retry.
    #[error("map-data provider unavailable after {attempts} attempt(s): {message}")]
    ProviderUnavailable { attempts: u32, message: String },

    /// The two endpoints are not connected within the fetched graph.
    #[error("no path found between {start} and {goal}")]
    NoPathFound { start: String, goal: String },

    /// A through-node chain cycles back on itself without reaching a junction.
    #[error("through-node chain starting at node {start} cycles without reaching a junction")]
    DegenerateChain { start: NodeId },

    /// A detected gap could not be closed within the repair budget.
    #[error("gap of {distance_m:.0} m at point {index} could not be repaired")]
    GapUnrepaired { index: usize, distance_m: f64 },

    /// A routing preference was outside its accepted range.
    #[error("preference {name} = {value} is outside the accepted range [{min}, {max}]")]
    InvalidPreference {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A planner configuration value was rejected.
    #[error("invalid planner configuration: {message}")]
    InvalidConfig { message: String },

    /// A coordinate was not a finite latitude/longitude pair.
    #[error("invalid coordinate ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },

    /// An edge referenced a node the graph does not contain.
    #[error("unknown node {id}")]
    UnknownNode { id: NodeId },

    /// The provider returned a graph without any nodes.
    #[error("road graph for the requested area is empty")]
    EmptyGraph,

    /// A route result was assembled without any coordinates.
    #[error("route contained no coordinates")]
    EmptyRoute,

    /// The caller cancelled the request between segments.
    #[error("route planning was cancelled")]
    Cancelled,

    /// Raised when loading a cached tile or graph document from disk fails.
    #[error("failed to load road graph from {path}: {message}")]
    GraphLoad { path: PathBuf, message: String },

    /// No suitable cache directory could be resolved for persisted tiles.
    #[error("failed to resolve cache directories for road graph tiles")]
    CacheDirsUnavailable,

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapper for JSON (de)serialisation errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Wrapper for HTTP client errors.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::ProviderUnavailable { .. } => true,
            Error::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            _ => false,
        }
    }

    /// Build a [`Error::NoPathFound`] from anything displayable.
    pub fn no_path(start: impl ToString, goal: impl ToString) -> Self {
        Error::NoPathFound {
            start: start.to_string(),
            goal: goal.to_string(),
        }
    }
}
