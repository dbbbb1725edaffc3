//! Output formatting for planned routes.

use std::fmt;

use anyhow::{Context, Result};
use clap::ValueEnum;

use veloroute_lib::{render_geojson, render_gpx, RouteRenderMode, RouteResult, RouteSummary};

/// Formats a route can be rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    #[default]
    Text,
    /// The full route result as JSON.
    Json,
    /// GPX 1.1 track.
    Gpx,
    /// GeoJSON `Feature` with a `LineString` geometry.
    Geojson,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Gpx => "gpx",
            OutputFormat::Geojson => "geojson",
        };
        f.write_str(value)
    }
}

impl OutputFormat {
    /// Render `result`. `detailed` only affects text output, `name` only GPX.
    pub fn render_route(&self, result: &RouteResult, detailed: bool, name: &str) -> Result<String> {
        match self {
            OutputFormat::Text => {
                let summary = RouteSummary::from_result(result)
                    .context("failed to build route summary for display")?;
                let mode = if detailed {
                    RouteRenderMode::Detailed
                } else {
                    RouteRenderMode::Summary
                };
                Ok(summary.render(mode))
            }
            OutputFormat::Json => {
                let mut rendered = serde_json::to_string_pretty(result)?;
                rendered.push('\n');
                Ok(rendered)
            }
            OutputFormat::Gpx => Ok(render_gpx(&result.coordinates, name)),
            OutputFormat::Geojson => {
                let mut rendered = render_geojson(result)?;
                rendered.push('\n');
                Ok(rendered)
            }
        }
    }
}
