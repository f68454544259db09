//! Point kernels
//!
//! The busy work each point performs before it writes its output record.

use std::hint::black_box;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Word written over the whole scratch buffer by [`prepare_scratch`].
pub const SCRATCH_MAGIC: u64 = 0x5C4A_7C8C_5C4A_7C8C;

/// Kind of work a point performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum KernelKind {
    /// Do nothing.
    #[default]
    Empty,
    /// Spin for `iterations` rounds.
    BusyWait,
    /// `iterations` rounds of multiply-add over a small register block.
    ComputeBound,
    /// `iterations` passes copying half of the scratch slice over the other.
    MemoryBound,
}

impl KernelKind {
    /// Whether the kernel touches the scratch buffer.
    #[inline]
    pub fn needs_scratch(&self) -> bool {
        matches!(self, KernelKind::MemoryBound)
    }
}

/// Kernel selection plus its iteration count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KernelConfig {
    #[serde(default)]
    pub kind: KernelKind,
    #[serde(default)]
    pub iterations: u64,
}

impl KernelConfig {
    pub fn new(
        kind: KernelKind,
        iterations: u64,
    ) -> Self {
        Self { kind, iterations }
    }

    /// Run the kernel once against the given scratch slice.
    pub fn execute(
        &self,
        scratch: &mut [u8],
    ) {
        match self.kind {
            KernelKind::Empty => {}
            KernelKind::BusyWait => {
                for _ in 0..self.iterations {
                    std::hint::spin_loop();
                }
            }
            KernelKind::ComputeBound => {
                let mut block = [1.0f64; 8];
                for _ in 0..self.iterations {
                    for v in block.iter_mut() {
                        *v = v.mul_add(1.000_000_1, 0.000_000_1);
                    }
                }
                black_box(block);
            }
            KernelKind::MemoryBound => {
                let half = scratch.len() / 2;
                if half == 0 {
                    return;
                }
                for _ in 0..self.iterations {
                    scratch.copy_within(0..half, half);
                }
                black_box(&scratch[..]);
            }
        }
    }
}

/// Fill `scratch` with [`SCRATCH_MAGIC`] words.
///
/// Trailing bytes that do not form a whole word are left untouched.
pub fn prepare_scratch(scratch: &mut [u8]) {
    let magic = SCRATCH_MAGIC.to_le_bytes();
    for chunk in scratch.chunks_exact_mut(magic.len()) {
        chunk.copy_from_slice(&magic);
    }
}

/// Whether `scratch` starts with the preparation word (trivially true for
/// slices too short to hold one).
pub fn scratch_is_prepared(scratch: &[u8]) -> bool {
    match scratch.get(..8) {
        Some(head) => head == SCRATCH_MAGIC.to_le_bytes(),
        None => true,
    }
}

/// Point kernel failures.
///
/// These are verification failures: an input did not hold what its
/// predecessor should have written, or the kernel was handed a malformed
/// buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    #[error("point ({timestep}, {index}): expected {expected} inputs, got {found}")]
    InputCount {
        timestep: i64,
        index: i64,
        expected: usize,
        found: usize,
    },

    #[error("point ({timestep}, {index}): input {input} holds {found:?}, expected {expected:?}")]
    InputMismatch {
        timestep: i64,
        index: i64,
        input: usize,
        expected: (i64, i64),
        found: (i64, i64),
    },

    #[error("point ({timestep}, {index}): input {input} is {len} bytes, shorter than one record")]
    InputTooShort {
        timestep: i64,
        index: i64,
        input: usize,
        len: usize,
    },

    #[error("point ({timestep}, {index}): output buffer of {len} bytes cannot hold a record")]
    OutputTooSmall { timestep: i64, index: i64, len: usize },

    #[error("point ({timestep}, {index}): scratch memory was not prepared")]
    ScratchNotPrepared { timestep: i64, index: i64 },
}
