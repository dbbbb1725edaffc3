//! Inspect command: structural statistics for a road graph document.

use std::fmt::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;

use veloroute_lib::{simplify, RoadGraph, RoutePreferences};

use crate::output::OutputFormat;

/// Arguments for the inspect command.
#[derive(Args, Debug, Clone)]
pub struct InspectCommandArgs {
    /// Road graph document to inspect.
    #[arg(long)]
    pub graph: PathBuf,
}

/// Counts describing a raw graph and its intersection graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphReport {
    pub nodes: usize,
    pub edges: usize,
    pub edges_without_geometry: usize,
    pub total_length_km: f64,
    pub junctions: usize,
    pub composite_edges: usize,
    pub composite_edges_without_geometry: usize,
    pub closed_loops: usize,
}

impl GraphReport {
    pub fn from_graph(graph: &RoadGraph) -> Self {
        let mut weighted = graph.clone();
        weighted.apply_weights(&RoutePreferences::default());
        let intersections = simplify(&weighted, &[]);

        Self {
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            edges_without_geometry: graph
                .edges()
                .iter()
                .filter(|edge| !edge.has_geometry())
                .count(),
            total_length_km: graph.edges().iter().map(|edge| edge.length_m).sum::<f64>()
                / 1000.0,
            junctions: intersections.junction_count(),
            composite_edges: intersections.edge_count(),
            composite_edges_without_geometry: intersections
                .edges()
                .iter()
                .filter(|edge| edge.geometry.is_none())
                .count(),
            closed_loops: intersections.closed_loops().len(),
        }
    }

    pub fn render_text(&self) -> String {
        let mut buffer = String::new();
        let _ = writeln!(buffer, "Raw graph");
        let _ = writeln!(buffer, "  nodes: {}", self.nodes);
        let _ = writeln!(
            buffer,
            "  edges: {} ({} without geometry)",
            self.edges, self.edges_without_geometry
        );
        let _ = writeln!(
            buffer,
            "  directed length: {:.2} km",
            self.total_length_km
        );
        let _ = writeln!(buffer, "Intersection graph");
        let _ = writeln!(buffer, "  junctions: {}", self.junctions);
        let _ = writeln!(
            buffer,
            "  composite edges: {} ({} without geometry)",
            self.composite_edges, self.composite_edges_without_geometry
        );
        let _ = writeln!(buffer, "  closed loops: {}", self.closed_loops);
        buffer
    }
}

/// Handle the inspect subcommand.
pub fn handle_inspect_command(format: OutputFormat, args: &InspectCommandArgs) -> Result<()> {
    let graph = RoadGraph::load_json(&args.graph)
        .with_context(|| format!("failed to load road graph from {}", args.graph.display()))?;
    let report = GraphReport::from_graph(&graph);

    match format {
        OutputFormat::Text => print!("{}", report.render_text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        other => bail!("inspect does not support --format {other}; use text or json"),
    }
    Ok(())
}
