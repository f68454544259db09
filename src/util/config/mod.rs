//! Benchmark configuration
//!
//! A run is described by a TOML file listing the graph instances to execute
//! and the execution mode.
//!
//! ```toml
//! mode = "verify"
//!
//! [[graphs]]
//! dependence = "stencil_1d"
//! timesteps = 8
//! max_width = 4
//!
//! [[graphs]]
//! dependence = "fft"
//! max_width = 8
//! scratch_bytes_per_task = 64
//! kernel = { kind = "memory_bound", iterations = 10 }
//! ```
//!
//! Missing fields take their defaults.
//!
//! # Usage
//!
//! ```rust
//! use taskbench_serial::util::config::from_toml_str;
//!
//! let config = from_toml_str("[[graphs]]\nmax_width = 2\n").unwrap();
//! assert_eq!(config.graphs[0].max_width, 2);
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::{BenchGraph, GraphConfig, GraphError};
use crate::runtime::scheduler::ExecutionMode;

/// Top-level benchmark configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BenchConfig {
    /// Kernel or scalar execution
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Graph instances, executed in this order
    #[serde(default)]
    pub graphs: Vec<GraphConfig>,
}

impl BenchConfig {
    /// Configuration holding a single graph.
    pub fn single(graph: GraphConfig) -> Self {
        Self {
            mode: ExecutionMode::default(),
            graphs: vec![graph],
        }
    }

    /// Check there is at least one graph and every graph is valid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.graphs.is_empty() {
            return Err(ConfigError::NoGraphs);
        }
        for (index, graph) in self.graphs.iter().enumerate() {
            graph
                .validate()
                .map_err(|source| ConfigError::Graph { index, source })?;
        }
        Ok(())
    }

    /// Validate and build every graph.
    pub fn build_graphs(&self) -> Result<Vec<BenchGraph>, ConfigError> {
        if self.graphs.is_empty() {
            return Err(ConfigError::NoGraphs);
        }
        self.graphs
            .iter()
            .enumerate()
            .map(|(index, graph)| {
                BenchGraph::new(graph.clone()).map_err(|source| ConfigError::Graph { index, source })
            })
            .collect()
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeError)
    }
}

/// Parse a configuration from TOML text.
pub fn from_toml_str(text: &str) -> Result<BenchConfig, ConfigError> {
    toml::from_str(text).map_err(ConfigError::ParseError)
}

/// Load a configuration file.
pub fn load_config(path: &Path) -> Result<BenchConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    from_toml_str(&content)
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", .path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config parse error: {0}")]
    ParseError(#[source] toml::de::Error),

    #[error("Config serialize error: {0}")]
    SerializeError(#[source] toml::ser::Error),

    #[error("configuration lists no graphs")]
    NoGraphs,

    #[error("graph {index}: {source}")]
    Graph {
        index: usize,
        #[source]
        source: GraphError,
    },
}
