//! Task graph descriptors
//!
//! The execution engine never computes graph topology itself. It consumes
//! graphs through the [`TaskGraph`] trait, which bundles the per-timestep
//! geometry, the dependency calculus and the point kernel.
//!
//! # Architecture
//!
//! - [`TaskGraph`] - the capability bundle the engine drives
//! - [`Dependency`] - one `(index, dset)` predecessor pair
//! - [`BenchGraph`](bench::BenchGraph) - the benchmark graph shipped with the crate
//! - [`DependenceType`](pattern::DependenceType) - supported dependency patterns
//! - [`KernelKind`](kernel::KernelKind) - supported point kernels

pub mod bench;
pub mod kernel;
pub mod pattern;

pub use bench::{BenchGraph, GraphConfig, GraphError};
pub use kernel::{prepare_scratch, KernelConfig, KernelError, KernelKind, SCRATCH_MAGIC};
pub use pattern::DependenceType;

use std::fmt;

/// A predecessor of a point: an index at the previous timestep together
/// with the dependence set it was resolved under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dependency {
    /// Index at timestep `t - 1`.
    pub index: i64,
    /// Dependence set the pair belongs to.
    pub dset: i64,
}

impl Dependency {
    #[inline]
    pub fn new(
        index: i64,
        dset: i64,
    ) -> Self {
        Self { index, dset }
    }
}

impl From<(i64, i64)> for Dependency {
    fn from((index, dset): (i64, i64)) -> Self {
        Self { index, dset }
    }
}

impl fmt::Display for Dependency {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "({}, dset {})", self.index, self.dset)
    }
}

/// Geometry, dependency and kernel functions of one graph instance.
///
/// Implementations are trusted: the engine still bounds-checks every index
/// they hand back before touching a buffer.
pub trait TaskGraph {
    /// Number of timesteps to execute.
    fn timesteps(&self) -> i64;

    /// Number of timestep rows kept resident (M).
    fn nb_fields(&self) -> i64;

    /// Maximum number of active indices at any timestep (N).
    fn max_width(&self) -> i64;

    /// Size of one point's output buffer in bytes.
    fn output_bytes_per_task(&self) -> usize;

    /// Scratch bytes one point invocation needs.
    fn scratch_bytes_per_task(&self) -> usize;

    /// First active index at timestep `t`.
    fn offset_at_timestep(
        &self,
        t: i64,
    ) -> i64;

    /// Number of active indices at timestep `t`.
    fn width_at_timestep(
        &self,
        t: i64,
    ) -> i64;

    /// Which dependency table governs timestep `t`.
    fn dependence_set_at_timestep(
        &self,
        t: i64,
    ) -> i64;

    /// Ordered predecessors of index `x` under dependence set `dset`.
    fn dependencies(
        &self,
        dset: i64,
        x: i64,
    ) -> Vec<Dependency>;

    /// Compute point `(t, x)`.
    ///
    /// `inputs` are the predecessor outputs in the order [`dependencies`]
    /// returned them; they are empty for seed invocations.
    ///
    /// [`dependencies`]: TaskGraph::dependencies
    fn execute_point(
        &self,
        t: i64,
        x: i64,
        output: &mut [u8],
        inputs: &[&[u8]],
        scratch: &mut [u8],
    ) -> Result<(), KernelError>;

    /// One-line human readable summary.
    fn describe(&self) -> String {
        format!(
            "timesteps {}, max_width {}, nb_fields {}, output {} B, scratch {} B",
            self.timesteps(),
            self.max_width(),
            self.nb_fields(),
            self.output_bytes_per_task(),
            self.scratch_bytes_per_task()
        )
    }
}

#[cfg(test)]
mod tests;
