//! Task dispatch.
//!
//! Turns one resolved point into one kernel invocation. Two shapes exist:
//! the seed form (no inputs) and the gather form (predecessor outputs in
//! dependency order). Both write into a tile the caller already validated.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::graph::{Dependency, KernelError, TaskGraph};
use crate::runtime::memory::{Tile, TilePool};
use crate::runtime::resolver::Point;

/// How points are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Invoke the graph kernel, which verifies its inputs.
    #[default]
    Verify,
    /// Skip the kernel; propagate a scalar per tile and log every point.
    Scalar,
}

/// Kernel invocation shape chosen for a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchForm {
    /// No predecessor data: first timestep or no dependencies.
    Seed,
    /// One or more predecessor buffers from the previous timestep.
    Gather,
}

impl DispatchForm {
    /// Timestep 0 always seeds, whatever the graph reports.
    #[inline]
    pub fn select(
        t: i64,
        predecessors: &[Dependency],
    ) -> Self {
        if t == 0 || predecessors.is_empty() {
            DispatchForm::Seed
        } else {
            DispatchForm::Gather
        }
    }
}

/// Per-invocation context, built fresh for every point.
#[derive(Clone, Copy)]
pub struct Payload<'g> {
    /// Index.
    pub x: i64,
    /// Timestep.
    pub y: i64,
    /// Owning graph.
    pub graph: &'g dyn TaskGraph,
}

impl<'g> Payload<'g> {
    #[inline]
    pub fn new(
        graph: &'g dyn TaskGraph,
        point: Point,
    ) -> Self {
        Self {
            x: point.index,
            y: point.timestep,
            graph,
        }
    }

    #[inline]
    pub fn point(&self) -> Point {
        Point::new(self.y, self.x)
    }
}

impl std::fmt::Debug for Payload<'_> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Payload")
            .field("x", &self.x)
            .field("y", &self.y)
            .finish_non_exhaustive()
    }
}

/// Seed form: compute the tile at `out` from no inputs.
///
/// `out` must be a slot the caller obtained from [`TilePool::slot`].
pub fn dispatch_seed(
    pool: &mut TilePool,
    out: usize,
    payload: &Payload<'_>,
    scratch: &mut [u8],
    mode: ExecutionMode,
) -> Result<(), KernelError> {
    match mode {
        ExecutionMode::Verify => {
            let Some(mut output) = pool.take_output(out) else {
                return Ok(());
            };
            trace!(t = payload.y, x = payload.x, "seed");
            let result = payload
                .graph
                .execute_point(payload.y, payload.x, &mut output, &[], scratch);
            pool.restore_output(out, output);
            result
        }
        ExecutionMode::Scalar => {
            if let Some(tile) = pool.tile_mut(out) {
                tile.set_scalar(0.0);
                debug!("Task1 x {}, y {}, out {}", payload.x, payload.y, 0.0);
            }
            Ok(())
        }
    }
}

/// Gather form: compute the tile at `out` from the tiles at `inputs`, in
/// order. No input slot may equal `out`.
pub fn dispatch_gather(
    pool: &mut TilePool,
    out: usize,
    inputs: &[usize],
    payload: &Payload<'_>,
    scratch: &mut [u8],
    mode: ExecutionMode,
) -> Result<(), KernelError> {
    match mode {
        ExecutionMode::Verify => {
            let Some(mut output) = pool.take_output(out) else {
                return Ok(());
            };
            let result = {
                let buffers: SmallVec<[&[u8]; 8]> = inputs
                    .iter()
                    .filter_map(|&slot| pool.tile(slot).map(Tile::output))
                    .collect();
                trace!(t = payload.y, x = payload.x, inputs = buffers.len(), "gather");
                payload
                    .graph
                    .execute_point(payload.y, payload.x, &mut output, &buffers, scratch)
            };
            pool.restore_output(out, output);
            result
        }
        ExecutionMode::Scalar => {
            let sum: f32 = inputs
                .iter()
                .filter_map(|&slot| pool.tile(slot).and_then(Tile::scalar))
                .sum();
            if let Some(tile) = pool.tile_mut(out) {
                tile.set_scalar(sum);
                debug!("Task2 x {}, y {}, out {}", payload.x, payload.y, sum);
            }
            Ok(())
        }
    }
}
