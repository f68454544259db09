//! Serial execution engine
//!
//! This module provides the [`Engine`], which sizes every buffer a run needs
//! up front and then executes graphs, timesteps and active indices in that
//! fixed order on the calling thread.
//!
//! ```text
//! Init ─► for graph ─► for t in 0..timesteps ─► for x in active range ─► Done
//!   │                        │                         │
//!   │ pools + scratch        │ range, dset             │ predecessors, dispatch
//! ```

pub mod task;

pub use task::{dispatch_gather, dispatch_seed, DispatchForm, ExecutionMode, Payload};

use std::fmt;
use std::time::{Duration, Instant};

use smallvec::SmallVec;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::graph::{prepare_scratch, KernelError, TaskGraph};
use crate::runtime::memory::{AllocError, ScratchArena, TilePool};
use crate::runtime::resolver::{Point, TimestepPlan};
use crate::util::diagnostic::Diagnostic;

/// Diagnostics kept verbatim in a [`RunReport`]; later ones only update the
/// counters.
pub const MAX_RECORDED_DIAGNOSTICS: usize = 1024;

/// Engine configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Whether points run the kernel or the scalar fallback.
    pub mode: ExecutionMode,
}

/// Counters collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Graphs executed to completion.
    pub graphs_run: usize,
    /// Graphs skipped because of an invalid shape.
    pub graphs_skipped: usize,
    /// Timesteps executed, over all graphs.
    pub timesteps: usize,
    /// Points whose kernel ran (or scalar was computed).
    pub points_executed: usize,
    /// Points dispatched in seed form.
    pub seed_dispatches: usize,
    /// Points dispatched in gather form.
    pub gather_dispatches: usize,
    /// Predecessor buffers handed to the kernel.
    pub dependencies_gathered: usize,
    /// Points dropped by a diagnostic.
    pub points_skipped: usize,
    /// Predecessors dropped by a diagnostic.
    pub dependencies_skipped: usize,
    /// Diagnostics counted but not kept, past [`MAX_RECORDED_DIAGNOSTICS`].
    pub diagnostics_suppressed: usize,
}

impl RunStats {
    #[inline]
    pub fn record_seed(&mut self) {
        self.seed_dispatches += 1;
        self.points_executed += 1;
    }

    #[inline]
    pub fn record_gather(
        &mut self,
        inputs: usize,
    ) {
        self.gather_dispatches += 1;
        self.points_executed += 1;
        self.dependencies_gathered += inputs;
    }

    /// Total tasks executed.
    #[inline]
    pub fn total_tasks(&self) -> usize {
        self.points_executed
    }

    /// Total dependency edges consumed.
    #[inline]
    pub fn total_dependencies(&self) -> usize {
        self.dependencies_gathered
    }
}

/// Outcome of [`Engine::run`].
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub stats: RunStats,
    /// The first [`MAX_RECORDED_DIAGNOSTICS`] recoverable problems met, in
    /// the order they were met.
    pub diagnostics: Vec<Diagnostic>,
    /// Wall time of the main loop.
    pub elapsed: Duration,
}

impl RunReport {
    /// Update the skip counters and, while under the cap, log and keep the
    /// diagnostic.
    pub fn record(
        &mut self,
        diagnostic: Diagnostic,
    ) {
        match &diagnostic {
            Diagnostic::DependencyOutOfBounds { .. } | Diagnostic::AliasedDependency { .. } => {
                self.stats.dependencies_skipped += 1;
            }
            d if d.skips_point() => self.stats.points_skipped += 1,
            _ => {}
        }

        if self.diagnostics.len() < MAX_RECORDED_DIAGNOSTICS {
            warn!("{}", diagnostic);
            self.diagnostics.push(diagnostic);
            return;
        }
        if self.stats.diagnostics_suppressed == 0 {
            warn!(
                "more than {} diagnostics; further ones are counted only",
                MAX_RECORDED_DIAGNOSTICS
            );
        }
        self.stats.diagnostics_suppressed += 1;
    }

    /// Diagnostics met, kept or not.
    #[inline]
    pub fn total_diagnostics(&self) -> usize {
        self.diagnostics.len() + self.stats.diagnostics_suppressed
    }

    #[inline]
    pub fn is_clean(&self) -> bool {
        self.total_diagnostics() == 0
    }

    /// Tasks per second over the measured wall time.
    pub fn tasks_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.stats.total_tasks() as f64 / secs
    }
}

/// What teardown released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Teardown {
    pub pools: usize,
    pub tiles: usize,
    pub scratch_bytes: usize,
}

/// Errors that stop a run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no graph instances to execute")]
    NoGraphs,

    #[error("allocating buffers for graph {graph}: {source}")]
    PoolAllocation {
        graph: usize,
        #[source]
        source: AllocError,
    },

    #[error("allocating scratch arena: {0}")]
    ScratchAllocation(#[source] AllocError),

    #[error("graph {graph}: kernel failed at {point}: {source}")]
    Kernel {
        graph: usize,
        point: Point,
        #[source]
        source: KernelError,
    },
}

/// Serial executor for a list of graph instances.
///
/// Holds the graphs by reference; owns one [`TilePool`] per valid graph and
/// the run-wide [`ScratchArena`].
pub struct Engine<'g> {
    graphs: Vec<&'g dyn TaskGraph>,
    /// `None` for graphs skipped at construction.
    pools: Vec<Option<TilePool>>,
    scratch: ScratchArena,
    config: EngineConfig,
    setup_diagnostics: Vec<Diagnostic>,
}

impl fmt::Debug for Engine<'_> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Engine")
            .field("graphs", &self.graphs.len())
            .field("pools", &self.pools)
            .field("scratch", &self.scratch.size())
            .field("config", &self.config)
            .finish()
    }
}

impl<'g> Engine<'g> {
    /// Build an engine with the default configuration and scratch preparation.
    pub fn construct(graphs: &[&'g dyn TaskGraph]) -> Result<Self, EngineError> {
        Self::construct_with(graphs, EngineConfig::default(), prepare_scratch)
    }

    /// Build an engine, allocating every tile pool and the scratch arena.
    ///
    /// `prepare` runs once over the scratch arena, and only if it is
    /// non-empty. Any allocation failure is fatal and leaves nothing
    /// allocated.
    pub fn construct_with<F>(
        graphs: &[&'g dyn TaskGraph],
        config: EngineConfig,
        prepare: F,
    ) -> Result<Self, EngineError>
    where
        F: FnOnce(&mut [u8]),
    {
        if graphs.is_empty() {
            error!("no graph instances to execute");
            return Err(EngineError::NoGraphs);
        }

        let mut pools = Vec::with_capacity(graphs.len());
        let mut setup_diagnostics = Vec::new();

        for (idx, graph) in graphs.iter().enumerate() {
            let (field_slots, max_width) = match pool_shape(idx, *graph) {
                Ok(shape) => shape,
                Err(diagnostic) => {
                    warn!("{}", diagnostic);
                    setup_diagnostics.push(diagnostic);
                    pools.push(None);
                    continue;
                }
            };

            let pool = TilePool::allocate(field_slots, max_width, graph.output_bytes_per_task())
                .map_err(|source| {
                    error!(graph = idx, "tile pool allocation failed: {}", source);
                    EngineError::PoolAllocation { graph: idx, source }
                })?;
            debug!(
                graph = idx,
                field_slots,
                max_width,
                bytes = pool.total_bytes(),
                "allocated tile pool"
            );
            pools.push(Some(pool));
        }

        let scratch_size = ScratchArena::required_size(
            graphs
                .iter()
                .zip(&pools)
                .filter(|(_, pool)| pool.is_some())
                .map(|(graph, _)| graph.scratch_bytes_per_task()),
        );
        let scratch = ScratchArena::allocate(scratch_size, prepare).map_err(|source| {
            error!("scratch allocation failed: {}", source);
            EngineError::ScratchAllocation(source)
        })?;
        debug!(bytes = scratch_size, "allocated scratch arena");

        Ok(Self {
            graphs: graphs.to_vec(),
            pools,
            scratch,
            config,
            setup_diagnostics,
        })
    }

    /// Execute every graph, timestep and active index once.
    pub fn run(&mut self) -> Result<RunReport, EngineError> {
        let mut report = RunReport {
            diagnostics: self.setup_diagnostics.clone(),
            ..RunReport::default()
        };
        report.stats.graphs_skipped = self.pools.iter().filter(|p| p.is_none()).count();

        let start = Instant::now();
        for idx in 0..self.graphs.len() {
            if self.pools[idx].is_none() {
                continue;
            }
            let timesteps = self.graphs[idx].timesteps();
            info!(graph = idx, timesteps, "executing graph");
            for t in 0..timesteps {
                self.execute_timestep(idx, t, &mut report)?;
            }
            report.stats.graphs_run += 1;
        }
        report.elapsed = start.elapsed();

        info!(
            tasks = report.stats.total_tasks(),
            dependencies = report.stats.total_dependencies(),
            diagnostics = report.total_diagnostics(),
            "run complete"
        );
        Ok(report)
    }

    /// Execute every active point of graph `idx` at timestep `t`.
    ///
    /// Timesteps of a graph must be executed in ascending order: gather
    /// reads row `t - 1` of the pool.
    pub fn execute_timestep(
        &mut self,
        idx: usize,
        t: i64,
        report: &mut RunReport,
    ) -> Result<(), EngineError> {
        let Some(&graph) = self.graphs.get(idx) else {
            report.record(Diagnostic::InvalidGraphIndex {
                graph: idx,
                count: self.graphs.len(),
            });
            return Ok(());
        };
        // Graphs rejected at construction were already diagnosed.
        let Some(pool) = self.pools[idx].as_mut() else {
            return Ok(());
        };

        let mode = self.config.mode;
        let plan = TimestepPlan::resolve(graph, t);
        let scratch = self.scratch.slice_mut(graph.scratch_bytes_per_task());
        report.stats.timesteps += 1;

        for x in plan.range.indices() {
            let point = Point::new(t, x);

            let out = match pool.slot(t, x) {
                Ok(slot) => slot,
                Err(error) => {
                    report.record(Diagnostic::PointOutOfBounds {
                        graph: idx,
                        point,
                        error,
                    });
                    continue;
                }
            };
            let found = pool.tile(out).map_or(0, |tile| tile.output().len());
            if found != pool.output_bytes() {
                report.record(Diagnostic::MissingOutput {
                    graph: idx,
                    point,
                    expected: pool.output_bytes(),
                    found,
                });
                continue;
            }

            let predecessors = plan.predecessors(graph, x);
            let payload = Payload::new(graph, point);

            let result = match DispatchForm::select(t, &predecessors) {
                DispatchForm::Seed => {
                    let result = dispatch_seed(pool, out, &payload, scratch, mode);
                    report.stats.record_seed();
                    result
                }
                DispatchForm::Gather => {
                    let mut inputs: SmallVec<[usize; 8]> =
                        SmallVec::with_capacity(predecessors.len());
                    for dep in &predecessors {
                        match pool.slot(t - 1, dep.index) {
                            Ok(slot) if slot == out => {
                                report.record(Diagnostic::AliasedDependency {
                                    graph: idx,
                                    point,
                                    dependency: dep.index,
                                });
                            }
                            Ok(slot) => inputs.push(slot),
                            Err(error) => {
                                report.record(Diagnostic::DependencyOutOfBounds {
                                    graph: idx,
                                    point,
                                    dependency: dep.index,
                                    error,
                                });
                            }
                        }
                    }
                    let result = dispatch_gather(pool, out, &inputs, &payload, scratch, mode);
                    report.stats.record_gather(inputs.len());
                    result
                }
            };

            result.map_err(|source| {
                error!(graph = idx, "kernel failed at {}: {}", point, source);
                EngineError::Kernel {
                    graph: idx,
                    point,
                    source,
                }
            })?;
        }

        Ok(())
    }

    /// Release every pool (last allocated first) and then the scratch arena.
    pub fn destroy(mut self) -> Teardown {
        self.release_all()
    }

    fn release_all(&mut self) -> Teardown {
        let mut teardown = Teardown::default();
        while let Some(slot) = self.pools.pop() {
            if let Some(pool) = slot {
                teardown.pools += 1;
                teardown.tiles += pool.release();
            }
        }
        teardown.scratch_bytes = std::mem::take(&mut self.scratch).release();
        teardown
    }

    #[inline]
    pub fn graph_count(&self) -> usize {
        self.graphs.len()
    }

    /// Tile pool of graph `idx`, `None` if the graph was skipped.
    #[inline]
    pub fn pool(
        &self,
        idx: usize,
    ) -> Option<&TilePool> {
        self.pools.get(idx).and_then(Option::as_ref)
    }

    #[inline]
    pub fn scratch(&self) -> &ScratchArena {
        &self.scratch
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Diagnostics raised while constructing the engine.
    #[inline]
    pub fn setup_diagnostics(&self) -> &[Diagnostic] {
        &self.setup_diagnostics
    }
}

impl Drop for Engine<'_> {
    fn drop(&mut self) {
        let teardown = self.release_all();
        if teardown.pools > 0 {
            debug!(
                pools = teardown.pools,
                tiles = teardown.tiles,
                scratch = teardown.scratch_bytes,
                "released engine buffers"
            );
        }
    }
}

/// Validate a graph's pool shape `(M, N)`.
fn pool_shape(
    idx: usize,
    graph: &dyn TaskGraph,
) -> Result<(usize, usize), Diagnostic> {
    let nb_fields = graph.nb_fields();
    let field_slots = usize::try_from(nb_fields)
        .ok()
        .filter(|m| *m > 0)
        .ok_or(Diagnostic::InvalidFieldCount {
            graph: idx,
            nb_fields,
        })?;
    let width = graph.max_width();
    let max_width = usize::try_from(width)
        .ok()
        .filter(|n| *n > 0)
        .ok_or(Diagnostic::InvalidWidth {
            graph: idx,
            max_width: width,
        })?;
    Ok((field_slots, max_width))
}
