use std::convert::Infallible;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use confluence::{
    insert_local_points, read_segments, Address, EngineConfig, InsertionPoint, Point,
    SegmentPool, SimulationScheduler, Tree, TreeBuilder, TreeNode, Upstream,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "confluence", about = "Binary drainage trees from river segments")]
struct Cli {
    /// Number of worker threads (default: available cores).
    #[arg(long, global = true)]
    workers: Option<usize>,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the tree and print one node per line.
    Build {
        /// Segment file (`x0 y0 x1 y1 [origin]` per line).
        segments: PathBuf,
        /// Validate the finished tree.
        #[arg(long)]
        validate: bool,
    },
    /// Build the tree and accumulate upstream length bottom-up.
    Simulate {
        /// Segment file (`x0 y0 x1 y1 [origin]` per line).
        segments: PathBuf,
        /// Gauge to splice in, as `<address>:<x>:<y>:<label>`. Repeatable.
        #[arg(long = "gauge")]
        gauges: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match cli.workers {
        Some(workers) => EngineConfig::with_workers(workers)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Build { segments, validate } => run_build(config, segments, validate)?,
        Commands::Simulate { segments, gauges } => run_simulate(config, segments, gauges)?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_pool(path: &Path) -> Result<SegmentPool> {
    let file = File::open(path)
        .with_context(|| format!("failed to open segment file {}", path.display()))?;
    read_segments(BufReader::new(file))
        .with_context(|| format!("failed to read segments from {}", path.display()))
}

fn build_tree(config: &EngineConfig, path: &Path) -> Result<Tree> {
    let pool = load_pool(path)?;
    let report = TreeBuilder::new(config.clone())
        .build(pool)
        .context("tree construction failed")?;
    eprintln!(
        "built {} node(s) from {} segment(s), {} ghost(s), fingerprint {}",
        report.tree.len(),
        report.segments_consumed,
        report.ghosts_inserted,
        report.tree.fingerprint()
    );
    Ok(report.tree)
}

fn run_build(config: EngineConfig, path: PathBuf, validate: bool) -> Result<()> {
    let tree = build_tree(&config, &path)?;
    if validate {
        tree.validate().context("tree validation failed")?;
    }
    for node in tree.iter() {
        println!("{}", node);
    }
    Ok(())
}

fn run_simulate(config: EngineConfig, path: PathBuf, gauges: Vec<String>) -> Result<()> {
    let mut tree = build_tree(&config, &path)?;
    if !gauges.is_empty() {
        let points = gauges
            .iter()
            .map(|gauge| parse_gauge(gauge))
            .collect::<Result<Vec<_>>>()?;
        tree = insert_local_points(tree, &points).context("failed to insert gauges")?;
    }

    let report = SimulationScheduler::new(config)
        .run_fn(tree, |node: &TreeNode, upstream: Upstream<f64>| {
            Ok::<_, Infallible>(node.length() + upstream.results().sum::<f64>())
        })
        .context("simulation failed")?;

    for (address, upstream_length) in &report.results {
        println!("{}\tupstream_length={:.3}", address, upstream_length);
    }
    Ok(())
}

fn parse_gauge(raw: &str) -> Result<InsertionPoint> {
    let fields: Vec<&str> = raw.splitn(4, ':').collect();
    let [address, x, y, label] = fields.as_slice() else {
        anyhow::bail!("gauge '{}' must look like <address>:<x>:<y>:<label>", raw);
    };
    let index: u64 = address
        .parse()
        .with_context(|| format!("invalid gauge address '{}'", address))?;
    let x: f64 = x.parse().with_context(|| format!("invalid gauge x '{}'", x))?;
    let y: f64 = y.parse().with_context(|| format!("invalid gauge y '{}'", y))?;
    Ok(InsertionPoint::new(
        Address::from_index(index)?,
        Point::new(x, y),
        *label,
    ))
}
