//! Dependency patterns
//!
//! Each [`DependenceType`] fixes the per-timestep geometry of a graph and the
//! predecessor set of every point. Predecessors always live at the
//! immediately preceding timestep.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Dependency;

/// Shape of the edges between consecutive timesteps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum DependenceType {
    /// No edges at all.
    #[default]
    Trivial,
    /// Each point depends on itself.
    NoComm,
    /// Left neighbour, self, right neighbour (clipped at the edges).
    #[serde(rename = "stencil_1d")]
    #[value(name = "stencil_1d")]
    Stencil1d,
    /// Like `Stencil1d` but wrapping around at the edges.
    #[serde(rename = "stencil_1d_periodic")]
    #[value(name = "stencil_1d_periodic")]
    Stencil1dPeriodic,
    /// Binary fan-out: width doubles every timestep.
    Tree,
    /// Butterfly exchange with stride `2^dset`.
    Fft,
    /// Every point depends on every point.
    AllToAll,
    /// `radix` contiguous neighbours centred on the point.
    Nearest,
    /// `radix` neighbours spread evenly over the width.
    Spread,
}

impl DependenceType {
    /// Whether the pattern cycles through more than one dependence set.
    #[inline]
    pub fn has_multiple_sets(&self) -> bool {
        matches!(self, DependenceType::Fft | DependenceType::Spread)
    }

    /// Number of distinct dependence sets the pattern cycles through.
    pub fn max_dependence_sets(
        &self,
        max_width: i64,
        period: i64,
    ) -> i64 {
        match self {
            DependenceType::Fft => ceil_log2(max_width).max(1),
            DependenceType::Spread => period.max(1),
            _ => 1,
        }
    }

    /// First active index at timestep `t`.
    #[inline]
    pub fn offset_at_timestep(
        &self,
        _t: i64,
    ) -> i64 {
        0
    }

    /// Number of active indices at timestep `t`.
    pub fn width_at_timestep(
        &self,
        t: i64,
        max_width: i64,
    ) -> i64 {
        if t < 0 {
            return 0;
        }
        match self {
            DependenceType::Tree => {
                if t >= 62 {
                    max_width
                } else {
                    max_width.min(1i64 << t)
                }
            }
            _ => max_width,
        }
    }

    /// Dependence set in force at timestep `t`.
    pub fn dependence_set_at_timestep(
        &self,
        t: i64,
        max_width: i64,
        period: i64,
    ) -> i64 {
        let sets = self.max_dependence_sets(max_width, period);
        match self {
            DependenceType::Fft => (t + sets - 1).rem_euclid(sets),
            DependenceType::Spread => t.rem_euclid(sets),
            _ => 0,
        }
    }

    /// Ordered predecessors of `x` under `dset`.
    pub fn dependencies(
        &self,
        dset: i64,
        x: i64,
        max_width: i64,
        radix: i64,
    ) -> Vec<Dependency> {
        let n = max_width;
        let indices: Vec<i64> = match self {
            DependenceType::Trivial => Vec::new(),
            DependenceType::NoComm => vec![x],
            DependenceType::Stencil1d => ((x - 1).max(0)..=(x + 1).min(n - 1)).collect(),
            DependenceType::Stencil1dPeriodic => {
                if n <= 0 {
                    Vec::new()
                } else {
                    let mut v = vec![(x - 1).rem_euclid(n), x, (x + 1).rem_euclid(n)];
                    v.sort_unstable();
                    v.dedup();
                    v
                }
            }
            DependenceType::Tree => vec![x / 2],
            DependenceType::Fft => {
                let stride = u32::try_from(dset)
                    .ok()
                    .and_then(|s| 1i64.checked_shl(s))
                    .filter(|s| *s > 0);
                let mut v = Vec::with_capacity(3);
                match stride {
                    Some(d) => {
                        if x - d >= 0 {
                            v.push(x - d);
                        }
                        v.push(x);
                        if x + d < n {
                            v.push(x + d);
                        }
                    }
                    None => v.push(x),
                }
                v
            }
            DependenceType::AllToAll => (0..n).collect(),
            DependenceType::Nearest => {
                if radix <= 0 {
                    Vec::new()
                } else {
                    ((x - (radix - 1) / 2).max(0)..=(x + radix / 2).min(n - 1)).collect()
                }
            }
            DependenceType::Spread => {
                if radix <= 0 || n <= 0 {
                    Vec::new()
                } else {
                    (0..radix)
                        .map(|i| (x + i * n / radix + dset).rem_euclid(n))
                        .collect()
                }
            }
        };

        indices
            .into_iter()
            .map(|index| Dependency::new(index, dset))
            .collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            DependenceType::Trivial => "trivial",
            DependenceType::NoComm => "no_comm",
            DependenceType::Stencil1d => "stencil_1d",
            DependenceType::Stencil1dPeriodic => "stencil_1d_periodic",
            DependenceType::Tree => "tree",
            DependenceType::Fft => "fft",
            DependenceType::AllToAll => "all_to_all",
            DependenceType::Nearest => "nearest",
            DependenceType::Spread => "spread",
        }
    }
}

impl fmt::Display for DependenceType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `ceil(log2(n))` for `n >= 1`, 0 otherwise.
fn ceil_log2(n: i64) -> i64 {
    if n <= 1 {
        return 0;
    }
    (64 - ((n - 1) as u64).leading_zeros()) as i64
}
