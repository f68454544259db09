//! Task Bench serial driver
//!
//! Executes time-stepped task graphs one point at a time on a single
//! thread. Every point's output lives in a circular pool of buffers that
//! keeps the last `nb_fields` timesteps resident, so a reused slot that is
//! overwritten too early surfaces as a verification failure.
//!
//! # Example
//!
//! ```
//! use taskbench_serial::graph::{BenchGraph, DependenceType, GraphConfig, TaskGraph};
//! use taskbench_serial::Engine;
//!
//! let graph = BenchGraph::new(GraphConfig {
//!     dependence: DependenceType::Stencil1d,
//!     timesteps: 3,
//!     max_width: 4,
//!     ..GraphConfig::default()
//! })
//! .unwrap();
//!
//! let mut engine = Engine::construct(&[&graph as &dyn TaskGraph]).unwrap();
//! let report = engine.run().unwrap();
//! assert_eq!(report.stats.total_tasks(), 12);
//! assert!(report.is_clean());
//! ```

#![warn(rust_2018_idioms)]

pub mod graph;
pub mod runtime;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use runtime::scheduler::{Engine, EngineConfig, EngineError, ExecutionMode, RunReport, RunStats};
pub use util::config::BenchConfig;

use std::path::Path;

use tracing::{debug, info};

use crate::graph::TaskGraph;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Program name
pub const NAME: &str = "Task Bench serial driver";

/// Build the configured graphs and execute them.
///
/// # Example
///
/// ```no_run
/// use taskbench_serial::{run_config, BenchConfig, Result};
/// use taskbench_serial::graph::GraphConfig;
///
/// fn main() -> Result<()> {
///     let report = run_config(&BenchConfig::single(GraphConfig::default()))?;
///     println!("{} tasks", report.stats.total_tasks());
///     Ok(())
/// }
/// ```
pub fn run_config(config: &BenchConfig) -> Result<RunReport> {
    let graphs = config.build_graphs().context("Invalid graph configuration")?;
    for (idx, graph) in graphs.iter().enumerate() {
        info!(graph = idx, "{}", graph.describe());
    }

    let refs: Vec<&dyn TaskGraph> = graphs.iter().map(|g| g as &dyn TaskGraph).collect();
    let engine_config = EngineConfig { mode: config.mode };
    let mut engine = Engine::construct_with(&refs, engine_config, graph::prepare_scratch)
        .context("Failed to set up execution engine")?;
    debug!("{:?}", engine);

    let report = engine.run().context("Execution failed")?;
    let teardown = engine.destroy();
    debug!(
        pools = teardown.pools,
        tiles = teardown.tiles,
        scratch_bytes = teardown.scratch_bytes,
        "released buffers"
    );
    Ok(report)
}

/// Load a configuration file and execute it.
pub fn run_file(path: &Path) -> Result<RunReport> {
    let config = util::config::load_config(path)
        .with_context(|| format!("Failed to load config: {}", path.display()))?;
    run_config(&config)
}

/// Validate the configured graphs and describe each one, without executing.
pub fn check_config(config: &BenchConfig) -> Result<Vec<String>> {
    let graphs = config.build_graphs().context("Invalid graph configuration")?;
    Ok(graphs.iter().map(|g| g.describe()).collect())
}
