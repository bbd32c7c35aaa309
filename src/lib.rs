//! # Concurrent drainage-network trees
//!
//! Turns a flat set of directed river segments into a binary tree that
//! mirrors the drainage network, then runs a bottom-up computation over it
//! where a node starts only after all of its upstream children finished.
//!
//! ## Pipeline
//!
//! 1. **Build**: N workers race over a shared segment pool, claiming roots,
//!    discovering tributaries (`child.end == root.start`) and assigning heap
//!    addresses (children of `a` at `2a`, `2a + 1`). Confluences of three or
//!    more tributaries are binarized with zero-length ghost nodes.
//! 2. **Simulate**: N workers poll the tree for ready nodes, claim one,
//!    simulate it outside the lock and notify its parent.
//!
//! ## Usage Example
//!
//! ```ignore
//! use confluence::{EngineConfig, Point, Segment, SegmentPool, Pipeline, Upstream};
//!
//! let pool = SegmentPool::from_segments(vec![
//!     Segment::origin(Point::new(0.0, 0.0), Point::new(0.0, -1.0)),
//!     Segment::new(Point::new(1.0, 1.0), Point::new(0.0, 0.0)),
//! ])?;
//! let pipeline = Pipeline::new(EngineConfig::with_workers(4)?);
//! let outcome = pipeline.run_fn(pool, |node, upstream: Upstream<f64>| {
//!     Ok::<_, std::convert::Infallible>(node.length() + upstream.results().sum::<f64>())
//! })?;
//! ```

#![warn(missing_docs, missing_debug_implementations)]

// Core modules
pub mod tree;       // Addresses, node variants, factory, tree map
pub mod segment;    // Input records and pool validation
pub mod builder;    // Concurrent tree construction
pub mod ledger;     // Per-node child completion tracking
pub mod scheduler;  // Dependency-ordered simulation
pub mod decorator;  // LocalPoint insertion after construction
pub mod config;     // Worker-pool parameters

// Re-exports for convenience
pub use builder::{BuildReport, TreeBuilder};
pub use config::EngineConfig;
pub use decorator::{insert_local_points, InsertionPoint};
pub use ledger::{ChildLedger, Upstream};
pub use scheduler::{NodeSimulation, SimulationReport, SimulationScheduler};
pub use segment::{read_segments, Point, Segment, SegmentId, SegmentPool};
pub use tree::{Address, Connections, NodeFactory, NodeKind, Tree, TreeNode};

use thiserror::Error;
use tracing::info;

/// Boxed error returned by a caller-supplied simulation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by either phase
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Malformed input: origin missing or duplicated, null key, bad coordinates
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Work left over (or nothing produced) once all workers drained
    #[error("incomplete {phase}: {remaining} item(s) left, {detail}")]
    IncompleteComputation {
        /// Phase that stopped short ("build", "simulate", ...)
        phase: &'static str,
        /// Segments left in the pool, or nodes left in the tree
        remaining: usize,
        /// What was observed
        detail: String,
    },

    /// Inconsistent notification or claim
    #[error("protocol violation at node {address}: {detail}")]
    ProtocolViolation {
        /// Node at which the violation was detected
        address: Address,
        /// What went wrong
        detail: String,
    },

    /// Caller-supplied simulation failed
    #[error("simulation failed at node {address}: {source}")]
    Simulation {
        /// Node whose simulation failed
        address: Address,
        /// Error returned by the simulation
        #[source]
        source: BoxError,
    },

    /// A worker thread panicked
    #[error("{phase} worker {worker} panicked")]
    WorkerPanicked {
        /// Phase the worker belonged to
        phase: &'static str,
        /// Worker index
        worker: usize,
    },

    /// Segment file could not be parsed
    #[error("parse error on line {line}: {message}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// Description
        message: String,
    },

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NetworkError {
    /// Helper for constructing input errors.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        NetworkError::InvalidInput(msg.into())
    }

    /// Helper for constructing protocol violations.
    pub fn protocol(address: Address, detail: impl Into<String>) -> Self {
        NetworkError::ProtocolViolation {
            address,
            detail: detail.into(),
        }
    }
}

/// Result of a full build-then-simulate run.
#[derive(Debug)]
pub struct PipelineOutcome<R> {
    /// Construction phase report
    pub build: BuildReport,
    /// Simulation phase report
    pub simulation: SimulationReport<R>,
}

/// Builds a tree and simulates it with one configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: EngineConfig,
    local_points: Vec<InsertionPoint>,
}

impl Pipeline {
    /// Create a pipeline.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            local_points: Vec::new(),
        }
    }

    /// Splice these points into the tree between the two phases.
    pub fn with_local_points(mut self, points: Vec<InsertionPoint>) -> Self {
        self.local_points = points;
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build, decorate, simulate.
    pub fn run<S: NodeSimulation>(
        &self,
        pool: SegmentPool,
        simulation: &S,
    ) -> Result<PipelineOutcome<S::Output>, NetworkError> {
        let mut build = TreeBuilder::new(self.config.clone()).build(pool)?;
        if !self.local_points.is_empty() {
            let tree = std::mem::take(&mut build.tree);
            build.tree = insert_local_points(tree, &self.local_points)?;
        }

        let simulation = SimulationScheduler::new(self.config.clone()).run(build.tree.clone(), simulation)?;
        info!(
            nodes = build.tree.len(),
            ghosts = build.ghosts_inserted,
            "pipeline finished"
        );

        Ok(PipelineOutcome { build, simulation })
    }

    /// [`Pipeline::run`] with a closure as the simulation.
    pub fn run_fn<R, E, F>(
        &self,
        pool: SegmentPool,
        simulate: F,
    ) -> Result<PipelineOutcome<R>, NetworkError>
    where
        R: Clone + Send,
        E: Into<BoxError>,
        F: Fn(&TreeNode, Upstream<R>) -> Result<R, E> + Sync,
    {
        self.run(pool, &scheduler::FnSimulation::new(simulate))
    }
}
