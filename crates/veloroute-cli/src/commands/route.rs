//! Route command handler for planning a ride between two coordinates.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use veloroute_lib::cache::DEFAULT_TILE_CAPACITY;
use veloroute_lib::provider::DEFAULT_OVERPASS_URL;
use veloroute_lib::{
    default_cache_dir, plan_route, CachingProvider, Coordinate, Error as RouteError,
    GraphProvider, OverpassProvider, PlannerConfig, RoadGraph, RouteRequest, RoutePreferences,
    StaticProvider, TileCache,
};

use super::parse_coordinate;
use crate::output::OutputFormat;

/// Arguments for the route command.
#[derive(Args, Debug, Clone)]
pub struct RouteCommandArgs {
    /// Start as "lat,lon".
    #[arg(long, value_parser = parse_coordinate, allow_hyphen_values = true)]
    pub from: Coordinate,

    /// Destination as "lat,lon".
    #[arg(long, value_parser = parse_coordinate, allow_hyphen_values = true)]
    pub to: Coordinate,

    /// Route on a local road graph document instead of querying Overpass.
    #[arg(long)]
    pub graph: Option<PathBuf>,

    /// Overpass API endpoint.
    #[arg(long, default_value = DEFAULT_OVERPASS_URL)]
    pub overpass_url: String,

    /// Directory for cached Overpass tiles.
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Query Overpass for every segment without the tile cache.
    #[arg(long)]
    pub no_cache: bool,

    /// 0 avoids main roads, 1 prefers them.
    #[arg(long, default_value_t = 0.5)]
    pub prefer_main_roads: f64,

    /// 0 avoids rough surfaces, 1 prefers them.
    #[arg(long, default_value_t = 0.5)]
    pub prefer_unpaved: f64,

    /// Exponent applied to surface penalties (0.1 to 3.0).
    #[arg(long, default_value_t = 1.0)]
    pub surface_weight_factor: f64,

    /// Bearing deviation in degrees tolerated before heading penalties apply.
    #[arg(long, default_value_t = 60.0)]
    pub heading_threshold: f64,

    /// Never discount an edge below its length, keeping A* exact.
    #[arg(long)]
    pub clamp_discounts: bool,

    /// Fetch radius around each segment, in metres.
    #[arg(long)]
    pub radius: Option<f64>,

    /// Segment length for long routes, in kilometres.
    #[arg(long)]
    pub segment_km: Option<f64>,

    /// Largest tolerated jump between track points, in metres.
    #[arg(long)]
    pub max_gap: Option<f64>,

    /// List every track point in text output.
    #[arg(long)]
    pub detailed: bool,

    /// Track name used in GPX output.
    #[arg(long, default_value = "veloroute")]
    pub name: String,

    /// Write the rendered route to a file instead of stdout.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

impl RouteCommandArgs {
    pub fn preferences(&self) -> RoutePreferences {
        RoutePreferences {
            prefer_main_roads: self.prefer_main_roads,
            prefer_unpaved: self.prefer_unpaved,
            surface_weight_factor: self.surface_weight_factor,
            heading_threshold_deg: self.heading_threshold,
            clamp_discounts: self.clamp_discounts,
            ..RoutePreferences::default()
        }
    }

    /// Layer command-line overrides on top of the loaded configuration.
    pub fn planner_config(&self, mut config: PlannerConfig) -> PlannerConfig {
        if let Some(radius) = self.radius {
            config.radius_meters = radius;
        }
        if let Some(segment_km) = self.segment_km {
            config.segment_km = segment_km;
        }
        if let Some(max_gap) = self.max_gap {
            config.max_gap_meters = max_gap;
        }
        config
    }

    pub fn to_request(&self, config: PlannerConfig) -> RouteRequest {
        RouteRequest::new(self.from, self.to)
            .with_preferences(self.preferences())
            .with_config(self.planner_config(config))
    }
}

/// Handle the route subcommand.
pub fn handle_route_command(
    config: PlannerConfig,
    format: OutputFormat,
    args: &RouteCommandArgs,
) -> Result<()> {
    let request = args.to_request(config);
    let provider = build_provider(args)?;

    let result = match plan_route(&provider, &request) {
        Ok(result) => result,
        Err(err) => return Err(handle_route_failure(args, err)),
    };

    if result.has_unrepaired_gap() {
        eprintln!(
            "Warning: {} gap(s) longer than {:.0} m could not be bridged and are drawn as straight lines.",
            result.unrepaired_gaps.len(),
            request.config.max_gap_meters
        );
    }

    let rendered = format.render_route(&result, args.detailed, &args.name)?;
    match &args.output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("failed to write route to {}", path.display()))?,
        None => print!("{rendered}"),
    }
    Ok(())
}

fn build_provider(args: &RouteCommandArgs) -> Result<Box<dyn GraphProvider>> {
    if let Some(path) = &args.graph {
        let graph = RoadGraph::load_json(path)
            .with_context(|| format!("failed to load road graph from {}", path.display()))?;
        return Ok(Box::new(StaticProvider::new(graph)));
    }

    let overpass = OverpassProvider::new(args.overpass_url.clone())
        .context("failed to build the Overpass client")?;
    if args.no_cache {
        return Ok(Box::new(overpass));
    }
    let dir = match &args.cache_dir {
        Some(dir) => dir.clone(),
        None => default_cache_dir().context("failed to resolve the tile cache directory")?,
    };
    let cache = TileCache::with_disk(DEFAULT_TILE_CAPACITY, &dir)
        .with_context(|| format!("failed to open tile cache at {}", dir.display()))?;
    Ok(Box::new(CachingProvider::new(overpass, Arc::new(cache))))
}

fn handle_route_failure(args: &RouteCommandArgs, err: RouteError) -> anyhow::Error {
    match err {
        RouteError::NoPathFound { start, goal } => {
            anyhow::anyhow!(format_no_path_message(&start, &goal, args))
        }
        RouteError::ProviderUnavailable { attempts, message } => anyhow::anyhow!(
            "Map data could not be fetched after {attempts} attempt(s): {message}. \
             Check the connection or try again later."
        ),
        RouteError::EmptyGraph => anyhow::anyhow!(
            "No road data around {} or {}. Check the coordinates or the graph file.",
            args.from,
            args.to
        ),
        other => anyhow::Error::new(other),
    }
}

fn format_no_path_message(start: &str, goal: &str, args: &RouteCommandArgs) -> String {
    let mut message = format!("No route found between {start} and {goal}.");
    if args.graph.is_some() {
        message.push_str(" Check that both points lie near connected roads in the graph.");
    } else {
        message.push_str(" Try a larger --radius or points closer to mapped roads.");
    }
    message
}
