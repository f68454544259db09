//! Dependency resolution
//!
//! Thin query layer over a [`TaskGraph`]'s geometry: which indices are live
//! at a timestep, which dependence set applies, and which indices of the
//! previous timestep a point reads.
//!
//! # Architecture
//!
//! - [`Point`](point::Point) - `(timestep, index)` coordinate
//! - [`ActiveRange`] - live index interval of one timestep
//! - [`TimestepPlan`] - range and dependence set resolved once per timestep

pub mod point;

pub use point::Point;

use std::ops::Range;

use crate::graph::{Dependency, TaskGraph};

/// Inclusive interval `[offset, offset + width - 1]` of live indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveRange {
    pub offset: i64,
    pub width: i64,
}

impl ActiveRange {
    #[inline]
    pub fn new(
        offset: i64,
        width: i64,
    ) -> Self {
        Self { offset, width }
    }

    /// Number of live indices; a non-positive width is empty.
    #[inline]
    pub fn len(&self) -> usize {
        usize::try_from(self.width).unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0
    }

    /// Live indices in ascending order.
    #[inline]
    pub fn indices(&self) -> Range<i64> {
        let end = self.offset.saturating_add(self.width.max(0));
        self.offset..end
    }

    #[inline]
    pub fn contains(
        &self,
        x: i64,
    ) -> bool {
        self.indices().contains(&x)
    }
}

/// Active range of `graph` at timestep `t`.
pub fn active_range(
    graph: &dyn TaskGraph,
    t: i64,
) -> ActiveRange {
    ActiveRange::new(graph.offset_at_timestep(t), graph.width_at_timestep(t))
}

/// Dependence set of `graph` at timestep `t`.
#[inline]
pub fn dependence_set(
    graph: &dyn TaskGraph,
    t: i64,
) -> i64 {
    graph.dependence_set_at_timestep(t)
}

/// Ordered predecessors of `x` under `dset`.
#[inline]
pub fn predecessors(
    graph: &dyn TaskGraph,
    dset: i64,
    x: i64,
) -> Vec<Dependency> {
    graph.dependencies(dset, x)
}

/// Per-timestep geometry, resolved once before the index loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestepPlan {
    pub timestep: i64,
    pub range: ActiveRange,
    pub dset: i64,
}

impl TimestepPlan {
    pub fn resolve(
        graph: &dyn TaskGraph,
        t: i64,
    ) -> Self {
        Self {
            timestep: t,
            range: active_range(graph, t),
            dset: dependence_set(graph, t),
        }
    }

    /// Predecessors of `x` at this timestep.
    ///
    /// Timestep 0 has no history, so its points never have predecessors
    /// whatever the graph reports.
    pub fn predecessors(
        &self,
        graph: &dyn TaskGraph,
        x: i64,
    ) -> Vec<Dependency> {
        if !self.has_history() {
            return Vec::new();
        }
        predecessors(graph, self.dset, x)
    }

    /// Whether this timestep can read predecessor data at all.
    #[inline]
    pub fn has_history(&self) -> bool {
        self.timestep > 0
    }
}

#[cfg(test)]
mod tests;
