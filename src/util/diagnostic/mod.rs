//! Recoverable execution diagnostics
//!
//! A diagnostic names a problem confined to one graph, point or dependency.
//! The engine logs it, records it in the run report, skips the affected
//! piece of work and keeps going.

use crate::runtime::memory::SlotError;
use crate::runtime::resolver::Point;

/// Per-point (or per-graph) problem that does not stop the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Diagnostic {
    #[error("graph {graph}: no such graph instance ({count} configured)")]
    InvalidGraphIndex { graph: usize, count: usize },

    #[error("graph {graph}: field count must be positive, got {nb_fields}; graph skipped")]
    InvalidFieldCount { graph: usize, nb_fields: i64 },

    #[error("graph {graph}: max width must be positive, got {max_width}; graph skipped")]
    InvalidWidth { graph: usize, max_width: i64 },

    #[error("graph {graph}: point {point} not addressable: {error}; point skipped")]
    PointOutOfBounds {
        graph: usize,
        point: Point,
        #[source]
        error: SlotError,
    },

    #[error("graph {graph}: point {point} dependency on index {dependency} not addressable: {error}; dependency skipped")]
    DependencyOutOfBounds {
        graph: usize,
        point: Point,
        dependency: i64,
        #[source]
        error: SlotError,
    },

    #[error("graph {graph}: point {point} dependency on index {dependency} aliases its own output slot; dependency skipped")]
    AliasedDependency {
        graph: usize,
        point: Point,
        dependency: i64,
    },

    #[error("graph {graph}: point {point} output buffer is {found} bytes, expected {expected}; point skipped")]
    MissingOutput {
        graph: usize,
        point: Point,
        expected: usize,
        found: usize,
    },
}

impl Diagnostic {
    /// Graph instance the diagnostic is attributed to.
    pub fn graph(&self) -> usize {
        match self {
            Diagnostic::InvalidGraphIndex { graph, .. }
            | Diagnostic::InvalidFieldCount { graph, .. }
            | Diagnostic::InvalidWidth { graph, .. }
            | Diagnostic::PointOutOfBounds { graph, .. }
            | Diagnostic::DependencyOutOfBounds { graph, .. }
            | Diagnostic::AliasedDependency { graph, .. }
            | Diagnostic::MissingOutput { graph, .. } => *graph,
        }
    }

    /// Point the diagnostic is attributed to, if any.
    pub fn point(&self) -> Option<Point> {
        match self {
            Diagnostic::PointOutOfBounds { point, .. }
            | Diagnostic::DependencyOutOfBounds { point, .. }
            | Diagnostic::AliasedDependency { point, .. }
            | Diagnostic::MissingOutput { point, .. } => Some(*point),
            _ => None,
        }
    }

    /// Whether the whole point was dropped (as opposed to one of its inputs).
    pub fn skips_point(&self) -> bool {
        matches!(
            self,
            Diagnostic::PointOutOfBounds { .. } | Diagnostic::MissingOutput { .. }
        )
    }

    /// Whether a whole graph was dropped.
    pub fn skips_graph(&self) -> bool {
        matches!(
            self,
            Diagnostic::InvalidFieldCount { .. } | Diagnostic::InvalidWidth { .. }
        )
    }
}
