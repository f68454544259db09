//! 任务图单元测试

use crate::graph::bench::{read_record, write_records, RECORD_BYTES};
use crate::graph::kernel::scratch_is_prepared;
use crate::graph::{
    prepare_scratch, BenchGraph, DependenceType, Dependency, GraphConfig, GraphError, KernelConfig,
    KernelError, KernelKind, TaskGraph, SCRATCH_MAGIC,
};

fn deps(
    pattern: DependenceType,
    dset: i64,
    x: i64,
    max_width: i64,
    radix: i64,
) -> Vec<i64> {
    pattern
        .dependencies(dset, x, max_width, radix)
        .iter()
        .map(|d| d.index)
        .collect()
}

fn record(
    t: i64,
    x: i64,
) -> Vec<u8> {
    let mut buf = vec![0u8; RECORD_BYTES];
    write_records(&mut buf, t, x).unwrap();
    buf
}

#[cfg(test)]
mod pattern_tests {
    use super::*;

    #[test]
    fn test_trivial_and_no_comm() {
        assert!(deps(DependenceType::Trivial, 0, 2, 4, 3).is_empty());
        assert_eq!(deps(DependenceType::NoComm, 0, 2, 4, 3), vec![2]);
    }

    #[test]
    fn test_stencil_clips_at_edges() {
        assert_eq!(deps(DependenceType::Stencil1d, 0, 0, 4, 3), vec![0, 1]);
        assert_eq!(deps(DependenceType::Stencil1d, 0, 3, 4, 3), vec![2, 3]);
        assert_eq!(deps(DependenceType::Stencil1d, 0, 0, 1, 3), vec![0]);
    }

    #[test]
    fn test_periodic_stencil_wraps() {
        assert_eq!(deps(DependenceType::Stencil1dPeriodic, 0, 0, 4, 3), vec![0, 1, 3]);
        assert_eq!(deps(DependenceType::Stencil1dPeriodic, 0, 3, 4, 3), vec![0, 2, 3]);
        assert_eq!(deps(DependenceType::Stencil1dPeriodic, 0, 0, 2, 3), vec![0, 1]);
        assert_eq!(deps(DependenceType::Stencil1dPeriodic, 0, 0, 1, 3), vec![0]);
    }

    #[test]
    fn test_tree_width_doubles() {
        let tree = DependenceType::Tree;
        let widths: Vec<i64> = (0..5).map(|t| tree.width_at_timestep(t, 10)).collect();
        assert_eq!(widths, vec![1, 2, 4, 8, 10]);
        assert_eq!(tree.width_at_timestep(100, 10), 10);
        assert_eq!(tree.width_at_timestep(-1, 10), 0);
        assert_eq!(deps(tree, 0, 5, 10, 3), vec![2]);
    }

    #[test]
    fn test_fft_stride_per_set() {
        let fft = DependenceType::Fft;
        assert_eq!(fft.max_dependence_sets(8, 3), 3);
        assert_eq!(fft.max_dependence_sets(5, 3), 3);
        assert_eq!(fft.max_dependence_sets(1, 3), 1);
        assert_eq!(deps(fft, 0, 0, 8, 3), vec![0, 1]);
        assert_eq!(deps(fft, 1, 3, 8, 3), vec![1, 3, 5]);
        assert_eq!(deps(fft, 2, 5, 8, 3), vec![1, 5]);
    }

    #[test]
    fn test_fft_dependence_set_cycle() {
        let fft = DependenceType::Fft;
        let sets: Vec<i64> = (0..6)
            .map(|t| fft.dependence_set_at_timestep(t, 8, 3))
            .collect();
        assert_eq!(sets, vec![2, 0, 1, 2, 0, 1]);
    }

    #[test]
    fn test_all_to_all() {
        assert_eq!(deps(DependenceType::AllToAll, 0, 1, 3, 3), vec![0, 1, 2]);
    }

    #[test]
    fn test_nearest_radix() {
        assert_eq!(deps(DependenceType::Nearest, 0, 0, 4, 3), vec![0, 1]);
        assert_eq!(deps(DependenceType::Nearest, 0, 2, 4, 3), vec![1, 2, 3]);
        assert_eq!(deps(DependenceType::Nearest, 0, 2, 6, 4), vec![1, 2, 3, 4]);
        assert!(deps(DependenceType::Nearest, 0, 2, 4, 0).is_empty());
    }

    #[test]
    fn test_spread_shifts_with_set() {
        let spread = DependenceType::Spread;
        assert_eq!(deps(spread, 0, 1, 6, 3), vec![1, 3, 5]);
        assert_eq!(deps(spread, 1, 1, 6, 3), vec![2, 4, 0]);
        assert_eq!(spread.dependence_set_at_timestep(4, 6, 3), 1);
        assert!(spread.has_multiple_sets());
    }

    #[test]
    fn test_dependencies_carry_set() {
        let d = DependenceType::Spread.dependencies(2, 0, 6, 2);
        assert!(d.iter().all(|dep| dep.dset == 2));
        assert_eq!(Dependency::from((4, 1)), Dependency::new(4, 1));
    }

    #[test]
    fn test_pattern_names_round_trip_through_serde() {
        for pattern in [
            DependenceType::Stencil1d,
            DependenceType::Stencil1dPeriodic,
            DependenceType::AllToAll,
        ] {
            let config = GraphConfig {
                dependence: pattern,
                ..GraphConfig::default()
            };
            let text = toml::to_string(&config).unwrap();
            assert!(text.contains(pattern.name()));
            let parsed: GraphConfig = toml::from_str(&text).unwrap();
            assert_eq!(parsed.dependence, pattern);
        }
    }
}

#[cfg(test)]
mod kernel_tests {
    use super::*;

    #[test]
    fn test_prepare_fills_whole_words() {
        let mut scratch = vec![0u8; 20];
        prepare_scratch(&mut scratch);
        assert_eq!(&scratch[..8], &SCRATCH_MAGIC.to_le_bytes());
        assert_eq!(&scratch[8..16], &SCRATCH_MAGIC.to_le_bytes());
        assert_eq!(&scratch[16..], &[0, 0, 0, 0]);
        assert!(scratch_is_prepared(&scratch));
    }

    #[test]
    fn test_unprepared_scratch_detected() {
        assert!(!scratch_is_prepared(&[0u8; 16]));
        assert!(scratch_is_prepared(&[]));
        assert!(scratch_is_prepared(&[0u8; 4]));
    }

    #[test]
    fn test_memory_bound_keeps_scratch_prepared() {
        let mut scratch = vec![0u8; 64];
        prepare_scratch(&mut scratch);
        KernelConfig::new(KernelKind::MemoryBound, 10).execute(&mut scratch);
        assert!(scratch_is_prepared(&scratch));
    }

    #[test]
    fn test_kernels_without_scratch() {
        for kind in [KernelKind::Empty, KernelKind::BusyWait, KernelKind::ComputeBound] {
            assert!(!kind.needs_scratch());
            KernelConfig::new(kind, 100).execute(&mut []);
        }
        assert!(KernelKind::MemoryBound.needs_scratch());
    }
}

#[cfg(test)]
mod bench_graph_tests {
    use super::*;

    fn bench(
        dependence: DependenceType,
        max_width: i64,
    ) -> BenchGraph {
        BenchGraph::new(GraphConfig {
            dependence,
            max_width,
            ..GraphConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = GraphConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.nb_fields, 5);
        assert_eq!(config.output_bytes_per_task, RECORD_BYTES);
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        let cases = [
            (
                GraphConfig {
                    timesteps: -1,
                    ..GraphConfig::default()
                },
                GraphError::NegativeTimesteps(-1),
            ),
            (
                GraphConfig {
                    max_width: 0,
                    ..GraphConfig::default()
                },
                GraphError::InvalidWidth(0),
            ),
            (
                GraphConfig {
                    nb_fields: 0,
                    ..GraphConfig::default()
                },
                GraphError::InvalidFieldCount(0),
            ),
            (
                GraphConfig {
                    output_bytes_per_task: 8,
                    ..GraphConfig::default()
                },
                GraphError::OutputTooSmall(8),
            ),
            (
                GraphConfig {
                    scratch_bytes_per_task: 12,
                    ..GraphConfig::default()
                },
                GraphError::UnalignedScratch(12),
            ),
            (
                GraphConfig {
                    kernel: KernelConfig::new(KernelKind::MemoryBound, 1),
                    ..GraphConfig::default()
                },
                GraphError::MissingScratch(KernelKind::MemoryBound),
            ),
            (
                GraphConfig {
                    dependence: DependenceType::Spread,
                    period: 0,
                    ..GraphConfig::default()
                },
                GraphError::InvalidPeriod(0),
            ),
            (
                GraphConfig {
                    dependence: DependenceType::Spread,
                    max_width: 4,
                    radix: 1_000_000,
                    ..GraphConfig::default()
                },
                GraphError::InvalidRadix {
                    radix: 1_000_000,
                    max_width: 4,
                },
            ),
            (
                GraphConfig {
                    dependence: DependenceType::Nearest,
                    radix: 0,
                    ..GraphConfig::default()
                },
                GraphError::InvalidRadix {
                    radix: 0,
                    max_width: 4,
                },
            ),
            (
                GraphConfig {
                    dependence: DependenceType::Nearest,
                    radix: -2,
                    ..GraphConfig::default()
                },
                GraphError::InvalidRadix {
                    radix: -2,
                    max_width: 4,
                },
            ),
        ];
        for (config, expected) in cases {
            assert_eq!(BenchGraph::new(config).unwrap_err(), expected);
        }
    }

    #[test]
    fn test_radix_only_checked_where_used() {
        let stencil = GraphConfig {
            dependence: DependenceType::Stencil1d,
            radix: 0,
            ..GraphConfig::default()
        };
        assert_eq!(stencil.validate(), Ok(()));

        let full = GraphConfig {
            dependence: DependenceType::Spread,
            radix: 4,
            max_width: 4,
            ..GraphConfig::default()
        };
        assert_eq!(full.validate(), Ok(()));
        let g = BenchGraph::new(full).unwrap();
        assert_eq!(g.dependencies(0, 1).len(), 4);
    }

    #[test]
    fn test_seed_writes_every_record() {
        let g = BenchGraph::new(GraphConfig {
            output_bytes_per_task: 3 * RECORD_BYTES,
            ..GraphConfig::default()
        })
        .unwrap();
        let mut out = vec![0u8; 3 * RECORD_BYTES];
        g.execute_point(0, 2, &mut out, &[], &mut []).unwrap();
        for chunk in out.chunks(RECORD_BYTES) {
            assert_eq!(read_record(chunk), Some((0, 2)));
        }
    }

    #[test]
    fn test_gather_accepts_matching_inputs() {
        let g = bench(DependenceType::Stencil1d, 4);
        let inputs = [record(2, 1), record(2, 2), record(2, 3)];
        let refs: Vec<&[u8]> = inputs.iter().map(Vec::as_slice).collect();
        let mut out = vec![0u8; RECORD_BYTES];
        g.execute_point(3, 2, &mut out, &refs, &mut []).unwrap();
        assert_eq!(read_record(&out), Some((3, 2)));
    }

    #[test]
    fn test_gather_rejects_stale_input() {
        let g = bench(DependenceType::NoComm, 4);
        let stale = record(0, 1);
        let mut out = vec![0u8; RECORD_BYTES];
        let err = g
            .execute_point(2, 1, &mut out, &[stale.as_slice()], &mut [])
            .unwrap_err();
        assert_eq!(
            err,
            KernelError::InputMismatch {
                timestep: 2,
                index: 1,
                input: 0,
                expected: (1, 1),
                found: (0, 1),
            }
        );
    }

    #[test]
    fn test_gather_rejects_wrong_order() {
        let g = bench(DependenceType::Stencil1d, 4);
        let inputs = [record(0, 2), record(0, 1), record(0, 3)];
        let refs: Vec<&[u8]> = inputs.iter().map(Vec::as_slice).collect();
        let mut out = vec![0u8; RECORD_BYTES];
        let err = g.execute_point(1, 2, &mut out, &refs, &mut []).unwrap_err();
        assert!(matches!(err, KernelError::InputMismatch { input: 0, .. }));
    }

    #[test]
    fn test_gather_rejects_wrong_count() {
        let g = bench(DependenceType::AllToAll, 3);
        let only = record(0, 0);
        let mut out = vec![0u8; RECORD_BYTES];
        let err = g.execute_point(1, 0, &mut out, &[only.as_slice()], &mut []).unwrap_err();
        assert!(matches!(
            err,
            KernelError::InputCount {
                expected: 3,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_short_input_rejected() {
        let g = bench(DependenceType::NoComm, 2);
        let mut out = vec![0u8; RECORD_BYTES];
        let err = g
            .execute_point(1, 0, &mut out, &[&[0u8; 4][..]], &mut [])
            .unwrap_err();
        assert!(matches!(err, KernelError::InputTooShort { len: 4, .. }));
    }

    #[test]
    fn test_unprepared_scratch_rejected() {
        let g = bench(DependenceType::Trivial, 2);
        let mut out = vec![0u8; RECORD_BYTES];
        let mut scratch = vec![0u8; 16];
        let err = g
            .execute_point(0, 0, &mut out, &[], &mut scratch)
            .unwrap_err();
        assert!(matches!(err, KernelError::ScratchNotPrepared { .. }));

        prepare_scratch(&mut scratch);
        g.execute_point(0, 0, &mut out, &[], &mut scratch).unwrap();
    }

    #[test]
    fn test_small_output_rejected() {
        let g = bench(DependenceType::Trivial, 2);
        let mut out = vec![0u8; 8];
        let err = g.execute_point(0, 0, &mut out, &[], &mut []).unwrap_err();
        assert!(matches!(err, KernelError::OutputTooSmall { len: 8, .. }));
    }

    #[test]
    fn test_width_zero_past_last_timestep() {
        let g = bench(DependenceType::Stencil1d, 4);
        assert_eq!(g.width_at_timestep(3), 4);
        assert_eq!(g.width_at_timestep(4), 0);
    }

    #[test]
    fn test_describe_names_pattern() {
        let g = bench(DependenceType::Stencil1dPeriodic, 4);
        let text = g.describe();
        assert!(text.starts_with("stencil_1d_periodic graph"));
        assert!(text.contains("max_width 4"));
    }

    #[test]
    fn test_records_fill_whole_chunks_only() {
        let mut buf = vec![0xFFu8; RECORD_BYTES + 3];
        write_records(&mut buf, 7, -2).unwrap();
        assert_eq!(read_record(&buf), Some((7, -2)));
        assert_eq!(&buf[RECORD_BYTES..], &[0xFF, 0xFF, 0xFF]);
        assert!(write_records(&mut [0u8; 15], 0, 0).is_none());
        assert_eq!(read_record(&[0u8; 15]), None);
    }
}
