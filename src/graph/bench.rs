//! Benchmark graph
//!
//! [`BenchGraph`] combines a [`DependenceType`] with a [`KernelConfig`] and
//! verifies, at every point, that each input holds exactly the record its
//! predecessor wrote one timestep earlier. A reused buffer slot that gets
//! overwritten too early therefore surfaces as a [`KernelError`].
//!
//! # Output records
//!
//! An output buffer is a run of 16-byte records, each the little-endian pair
//! `(timestep, index)` of the point that wrote it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::kernel::{scratch_is_prepared, KernelConfig, KernelError, KernelKind};
use super::pattern::DependenceType;
use super::{Dependency, TaskGraph};

/// Bytes of one `(timestep, index)` output record.
pub const RECORD_BYTES: usize = 16;

/// Parameters of one benchmark graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_timesteps")]
    pub timesteps: i64,
    #[serde(default = "default_max_width")]
    pub max_width: i64,
    #[serde(default)]
    pub dependence: DependenceType,
    #[serde(default = "default_radix")]
    pub radix: i64,
    #[serde(default = "default_period")]
    pub period: i64,
    #[serde(default = "default_nb_fields")]
    pub nb_fields: i64,
    #[serde(default = "default_output_bytes")]
    pub output_bytes_per_task: usize,
    #[serde(default)]
    pub scratch_bytes_per_task: usize,
    #[serde(default)]
    pub kernel: KernelConfig,
}

fn default_timesteps() -> i64 {
    4
}

fn default_max_width() -> i64 {
    4
}

fn default_radix() -> i64 {
    3
}

fn default_period() -> i64 {
    3
}

fn default_nb_fields() -> i64 {
    5
}

fn default_output_bytes() -> usize {
    RECORD_BYTES
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            timesteps: 4,
            max_width: 4,
            dependence: DependenceType::Trivial,
            radix: 3,
            period: 3,
            nb_fields: 5,
            output_bytes_per_task: RECORD_BYTES,
            scratch_bytes_per_task: 0,
            kernel: KernelConfig::default(),
        }
    }
}

impl GraphConfig {
    /// Check the parameters can form a valid graph.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.timesteps < 0 {
            return Err(GraphError::NegativeTimesteps(self.timesteps));
        }
        if self.max_width < 1 {
            return Err(GraphError::InvalidWidth(self.max_width));
        }
        if self.nb_fields < 1 {
            return Err(GraphError::InvalidFieldCount(self.nb_fields));
        }
        if self.output_bytes_per_task < RECORD_BYTES {
            return Err(GraphError::OutputTooSmall(self.output_bytes_per_task));
        }
        if self.scratch_bytes_per_task % 8 != 0 {
            return Err(GraphError::UnalignedScratch(self.scratch_bytes_per_task));
        }
        if self.kernel.kind.needs_scratch() && self.scratch_bytes_per_task == 0 {
            return Err(GraphError::MissingScratch(self.kernel.kind));
        }
        if self.dependence == DependenceType::Spread && self.period < 1 {
            return Err(GraphError::InvalidPeriod(self.period));
        }
        if matches!(self.dependence, DependenceType::Nearest | DependenceType::Spread)
            && !(1..=self.max_width).contains(&self.radix)
        {
            return Err(GraphError::InvalidRadix {
                radix: self.radix,
                max_width: self.max_width,
            });
        }
        Ok(())
    }
}

/// Invalid graph parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("timesteps must not be negative, got {0}")]
    NegativeTimesteps(i64),

    #[error("max_width must be at least 1, got {0}")]
    InvalidWidth(i64),

    #[error("nb_fields must be at least 1, got {0}")]
    InvalidFieldCount(i64),

    #[error("output_bytes_per_task must be at least {RECORD_BYTES}, got {0}")]
    OutputTooSmall(usize),

    #[error("scratch_bytes_per_task must be a multiple of 8, got {0}")]
    UnalignedScratch(usize),

    #[error("kernel {0:?} needs scratch_bytes_per_task > 0")]
    MissingScratch(KernelKind),

    #[error("spread dependence needs period >= 1, got {0}")]
    InvalidPeriod(i64),

    #[error("radix must be between 1 and max_width ({max_width}), got {radix}")]
    InvalidRadix { radix: i64, max_width: i64 },
}

/// A benchmark graph built from validated [`GraphConfig`] parameters.
#[derive(Debug, Clone)]
pub struct BenchGraph {
    config: GraphConfig,
}

impl BenchGraph {
    /// Validate `config` and build the graph.
    pub fn new(config: GraphConfig) -> Result<Self, GraphError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[inline]
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Expected predecessors of `(t, x)`; empty when the point is seeded.
    fn expected_inputs(
        &self,
        t: i64,
        x: i64,
    ) -> Vec<Dependency> {
        if t == 0 {
            return Vec::new();
        }
        let dset = self.dependence_set_at_timestep(t);
        self.dependencies(dset, x)
    }

    fn verify_inputs(
        &self,
        t: i64,
        x: i64,
        inputs: &[&[u8]],
    ) -> Result<(), KernelError> {
        let expected = self.expected_inputs(t, x);
        if expected.is_empty() {
            return Ok(());
        }
        if expected.len() != inputs.len() {
            return Err(KernelError::InputCount {
                timestep: t,
                index: x,
                expected: expected.len(),
                found: inputs.len(),
            });
        }
        for (i, (dep, input)) in expected.iter().zip(inputs).enumerate() {
            let found = read_record(input).ok_or(KernelError::InputTooShort {
                timestep: t,
                index: x,
                input: i,
                len: input.len(),
            })?;
            let want = (t - 1, dep.index);
            if found != want {
                return Err(KernelError::InputMismatch {
                    timestep: t,
                    index: x,
                    input: i,
                    expected: want,
                    found,
                });
            }
        }
        Ok(())
    }
}

impl TaskGraph for BenchGraph {
    fn timesteps(&self) -> i64 {
        self.config.timesteps
    }

    fn nb_fields(&self) -> i64 {
        self.config.nb_fields
    }

    fn max_width(&self) -> i64 {
        self.config.max_width
    }

    fn output_bytes_per_task(&self) -> usize {
        self.config.output_bytes_per_task
    }

    fn scratch_bytes_per_task(&self) -> usize {
        self.config.scratch_bytes_per_task
    }

    fn offset_at_timestep(
        &self,
        t: i64,
    ) -> i64 {
        self.config.dependence.offset_at_timestep(t)
    }

    fn width_at_timestep(
        &self,
        t: i64,
    ) -> i64 {
        if t >= self.config.timesteps {
            return 0;
        }
        self.config
            .dependence
            .width_at_timestep(t, self.config.max_width)
    }

    fn dependence_set_at_timestep(
        &self,
        t: i64,
    ) -> i64 {
        self.config.dependence.dependence_set_at_timestep(
            t,
            self.config.max_width,
            self.config.period,
        )
    }

    fn dependencies(
        &self,
        dset: i64,
        x: i64,
    ) -> Vec<Dependency> {
        self.config
            .dependence
            .dependencies(dset, x, self.config.max_width, self.config.radix)
    }

    fn execute_point(
        &self,
        t: i64,
        x: i64,
        output: &mut [u8],
        inputs: &[&[u8]],
        scratch: &mut [u8],
    ) -> Result<(), KernelError> {
        if !scratch_is_prepared(scratch) {
            return Err(KernelError::ScratchNotPrepared {
                timestep: t,
                index: x,
            });
        }
        self.verify_inputs(t, x, inputs)?;

        self.config.kernel.execute(scratch);

        write_records(output, t, x).ok_or(KernelError::OutputTooSmall {
            timestep: t,
            index: x,
            len: output.len(),
        })
    }

    fn describe(&self) -> String {
        let c = &self.config;
        format!(
            "{} graph: timesteps {}, max_width {}, radix {}, period {}, nb_fields {}, \
             kernel {:?} x{}, output {} B, scratch {} B",
            c.dependence,
            c.timesteps,
            c.max_width,
            c.radix,
            c.period,
            c.nb_fields,
            c.kernel.kind,
            c.kernel.iterations,
            c.output_bytes_per_task,
            c.scratch_bytes_per_task
        )
    }
}

/// Fill `output` with `(t, x)` records. `None` if not even one fits.
pub fn write_records(
    output: &mut [u8],
    t: i64,
    x: i64,
) -> Option<()> {
    if output.len() < RECORD_BYTES {
        return None;
    }
    let mut record = [0u8; RECORD_BYTES];
    record[..8].copy_from_slice(&t.to_le_bytes());
    record[8..].copy_from_slice(&x.to_le_bytes());
    for chunk in output.chunks_exact_mut(RECORD_BYTES) {
        chunk.copy_from_slice(&record);
    }
    Some(())
}

/// Decode the leading `(timestep, index)` record of a buffer.
pub fn read_record(buffer: &[u8]) -> Option<(i64, i64)> {
    let t = buffer.get(..8)?.try_into().ok().map(i64::from_le_bytes)?;
    let x = buffer.get(8..16)?.try_into().ok().map(i64::from_le_bytes)?;
    Some((t, x))
}
