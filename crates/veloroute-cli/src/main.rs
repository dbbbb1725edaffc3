use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use veloroute_cli::commands::inspect::{handle_inspect_command, InspectCommandArgs};
use veloroute_cli::commands::route::{handle_route_command, RouteCommandArgs};
use veloroute_cli::output::OutputFormat;
use veloroute_lib::PlannerConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Multi-criteria cycling route planner")]
struct Cli {
    /// JSON planner configuration file. `VELOROUTE_*` variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Plan a route between two "lat,lon" coordinates.
    Route(RouteCommandArgs),
    /// Summarise a road graph document and its intersection graph.
    Inspect(InspectCommandArgs),
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Route(args) => handle_route_command(config, cli.format, &args),
        Command::Inspect(args) => handle_inspect_command(cli.format, &args),
    }
}

fn load_config(path: Option<&Path>) -> Result<PlannerConfig> {
    let base = match path {
        Some(path) => PlannerConfig::from_json_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => PlannerConfig::default(),
    };
    base.with_env_overrides()
        .context("invalid VELOROUTE_* environment override")
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
