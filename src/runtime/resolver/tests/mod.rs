//! 依赖解析测试

use crate::graph::{BenchGraph, DependenceType, Dependency, GraphConfig};
use crate::runtime::resolver::{active_range, dependence_set, predecessors, ActiveRange, Point, TimestepPlan};

fn graph(
    dependence: DependenceType,
    max_width: i64,
) -> BenchGraph {
    BenchGraph::new(GraphConfig {
        dependence,
        max_width,
        timesteps: 8,
        ..GraphConfig::default()
    })
    .unwrap()
}

fn indices(deps: &[Dependency]) -> Vec<i64> {
    deps.iter().map(|d| d.index).collect()
}

#[cfg(test)]
mod active_range_tests {
    use super::*;

    #[test]
    fn test_indices_ascending() {
        let range = ActiveRange::new(2, 3);
        assert_eq!(range.indices().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(range.len(), 3);
        assert!(range.contains(4));
        assert!(!range.contains(5));
        assert!(!range.contains(1));
    }

    #[test]
    fn test_non_positive_width_is_empty() {
        for width in [0, -4] {
            let range = ActiveRange::new(1, width);
            assert!(range.is_empty());
            assert_eq!(range.len(), 0);
            assert_eq!(range.indices().count(), 0);
        }
    }

    #[test]
    fn test_negative_offset() {
        let range = ActiveRange::new(-1, 3);
        assert_eq!(range.indices().collect::<Vec<_>>(), vec![-1, 0, 1]);
    }

    #[test]
    fn test_saturates_at_i64_max() {
        let range = ActiveRange::new(i64::MAX - 1, 10);
        assert_eq!(range.indices().count(), 1);
    }

    #[test]
    fn test_graph_active_range() {
        let g = graph(DependenceType::Tree, 8);
        assert_eq!(active_range(&g, 0), ActiveRange::new(0, 1));
        assert_eq!(active_range(&g, 2), ActiveRange::new(0, 4));
        assert_eq!(active_range(&g, 5), ActiveRange::new(0, 8));
        // Past the last timestep nothing is active.
        assert!(active_range(&g, 8).is_empty());
    }
}

#[cfg(test)]
mod plan_tests {
    use super::*;

    #[test]
    fn test_first_timestep_has_no_predecessors() {
        let g = graph(DependenceType::AllToAll, 4);
        let plan = TimestepPlan::resolve(&g, 0);
        assert!(!plan.has_history());
        assert!(plan.predecessors(&g, 2).is_empty());
        // The raw query still reports the graph's table.
        assert_eq!(predecessors(&g, 0, 2).len(), 4);
    }

    #[test]
    fn test_predecessors_follow_dependence_set() {
        let g = graph(DependenceType::Fft, 8);
        for t in 1..8 {
            let plan = TimestepPlan::resolve(&g, t);
            assert_eq!(plan.dset, dependence_set(&g, t));
            let deps = plan.predecessors(&g, 3);
            assert!(deps.iter().all(|d| d.dset == plan.dset));
            assert!(deps.iter().any(|d| d.index == 3));
        }
    }

    #[test]
    fn test_stencil_predecessors() {
        let g = graph(DependenceType::Stencil1d, 4);
        let plan = TimestepPlan::resolve(&g, 1);
        assert_eq!(plan.range, ActiveRange::new(0, 4));
        assert_eq!(indices(&plan.predecessors(&g, 0)), vec![0, 1]);
        assert_eq!(indices(&plan.predecessors(&g, 2)), vec![1, 2, 3]);
        assert_eq!(indices(&plan.predecessors(&g, 3)), vec![2, 3]);
    }

    #[test]
    fn test_point_previous() {
        let p = Point::new(4, 2);
        assert_eq!(p.previous(), Point::new(3, 2));
        assert_eq!(p.to_string(), "(t=4, x=2)");
    }
}
