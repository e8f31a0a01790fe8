use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use routeaudit_cli::output::{render, OutputFormat};
use routeaudit_cli::terminal::ColorPalette;
use routeaudit_lib::{
    load_reference_features, load_route_graph, AuditConfig, AuditContext, AuditReport,
    RelationId, RouteCategory, RouteGraph,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Route relation topology and coverage checker")]
struct Cli {
    /// JSON configuration file; command-line flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format for the report.
    #[arg(long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    /// Worker threads for the passes (defaults to one per core).
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Exit with status 1 on warnings as well as errors.
    #[arg(long, global = true)]
    fail_on_warning: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check route topology, stop order and tagging.
    Check {
        /// Overpass JSON document with the route relations.
        #[arg(long)]
        graph: PathBuf,
        #[command(flatten)]
        selection: Selection,
    },
    /// Compare route geometries with a reference dataset in both directions.
    Coverage {
        /// Overpass JSON document with the route relations.
        #[arg(long)]
        graph: PathBuf,
        /// GeoJSON reference files.
        #[arg(long = "reference", required = true)]
        references: Vec<PathBuf>,
        /// Maximum deviation in metres for a route to count as covered.
        #[arg(long)]
        tolerance: Option<f64>,
    },
    /// Run the topology checks and, given reference files, the coverage comparison.
    Audit {
        /// Overpass JSON document with the route relations.
        #[arg(long)]
        graph: PathBuf,
        /// GeoJSON reference files.
        #[arg(long = "reference")]
        references: Vec<PathBuf>,
        #[command(flatten)]
        selection: Selection,
    },
}

/// Route selection overrides shared by `check` and `audit`.
#[derive(Args, Debug)]
struct Selection {
    /// Route categories to check (e.g. hiking, bus, bicycle).
    #[arg(long = "routes", num_args = 1..)]
    routes: Vec<String>,
    /// Relation ids to skip.
    #[arg(long = "ignore", num_args = 1..)]
    ignore: Vec<RelationId>,
    /// Relation ids whose errors are reported as warnings.
    #[arg(long = "warn", num_args = 1..)]
    warn: Vec<RelationId>,
}

impl Selection {
    fn apply(&self, config: &mut AuditConfig) -> Result<()> {
        if !self.routes.is_empty() {
            config.categories = self
                .routes
                .iter()
                .map(|name| name.parse::<RouteCategory>())
                .collect::<routeaudit_lib::Result<_>>()?;
        }
        config.ignore_routes.extend(self.ignore.iter().copied());
        config.warn_routes.extend(self.warn.iter().copied());
        Ok(())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(report) => exit_status(&report, cli.fail_on_warning),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<AuditReport> {
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure the worker pool")?;
    }

    let mut config = match &cli.config {
        Some(path) => AuditConfig::from_path(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => AuditConfig::default(),
    };

    let report = match &cli.command {
        Command::Check { graph, selection } => {
            selection.apply(&mut config)?;
            config.validate()?;
            let graph = load_graph(graph)?;
            AuditContext::new(&graph, &config).run_topology_pass()
        }
        Command::Coverage {
            graph,
            references,
            tolerance,
        } => {
            if let Some(tolerance) = tolerance {
                config.coverage.tolerance = *tolerance;
            }
            config.validate()?;
            let graph = load_graph(graph)?;
            let references = load_reference_features(references, &config.coverage)
                .context("failed to load reference features")?;
            AuditContext::new(&graph, &config)
                .run_coverage_pass(&references)
                .into_report()
        }
        Command::Audit {
            graph,
            references,
            selection,
        } => {
            selection.apply(&mut config)?;
            config.validate()?;
            let graph = load_graph(graph)?;
            let context = AuditContext::new(&graph, &config);
            if references.is_empty() {
                info!("no reference files given, skipping the coverage comparison");
                context.run_topology_pass()
            } else {
                let references = load_reference_features(references, &config.coverage)
                    .context("failed to load reference features")?;
                context.run_audit(&references)
            }
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    render(&mut out, &report, cli.format, &ColorPalette::detect())
        .context("failed to write report")?;
    out.flush().context("failed to write report")?;
    Ok(report)
}

fn load_graph(path: &Path) -> Result<RouteGraph> {
    let graph = load_route_graph(path)
        .with_context(|| format!("failed to load route graph from {}", path.display()))?;
    debug!(path = %path.display(), "route graph ready");
    Ok(graph)
}

fn exit_status(report: &AuditReport, fail_on_warning: bool) -> ExitCode {
    if report.has_errors() || (fail_on_warning && report.has_warnings()) {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
