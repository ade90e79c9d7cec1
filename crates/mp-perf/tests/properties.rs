use mp_dtype::Depth;
use mp_mat::Size;
use mp_perf::cycle::{TimingPolicy, run_cycle};
use mp_perf::params::{Dimension, ParamSpace};
use mp_perf::sanity::Tolerance;
use proptest::prelude::*;
use std::time::Duration;

fn any_value() -> impl Strategy<Value = f64> {
    prop_oneof![
        -1.0e12..1.0e12f64,
        Just(0.0),
        Just(f64::NAN),
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
    ]
}

proptest! {
    /// A value always matches itself in either mode.
    #[test]
    fn comparison_is_reflexive(value in any_value(), eps in 1.0e-15..1.0f64) {
        prop_assert!(Tolerance::absolute(eps).accepts(value, value));
        prop_assert!(Tolerance::relative(eps).accepts(value, value));
    }
}

proptest! {
    /// Scaling both sides by a power of two never changes a relative verdict.
    #[test]
    fn relative_comparison_is_scale_invariant(
        expected in 1.0e-3..1.0e6f64,
        actual in 1.0e-3..1.0e6f64,
        exponent in -30i32..30,
        eps in 1.0e-9..1.0f64,
    ) {
        let tol = Tolerance::relative(eps);
        let scale = 2f64.powi(exponent);
        prop_assert_eq!(
            tol.accepts(expected, actual),
            tol.accepts(expected * scale, actual * scale)
        );
    }
}

proptest! {
    /// The cycle always records at least one sample and never more than the cap.
    #[test]
    fn sample_count_respects_the_stopping_rule(min in 0usize..8, extra in 0usize..8) {
        let policy = TimingPolicy {
            warmup_runs: 0,
            min_samples: min,
            max_samples: min + extra,
            time_limit: Duration::ZERO,
        };
        let outcome = run_cycle(policy, || Ok::<_, String>(())).expect("cycle");
        let normalized = policy.normalized();
        prop_assert!(!outcome.samples.is_empty());
        prop_assert!(outcome.samples.len() >= normalized.min_samples);
        prop_assert!(outcome.samples.len() <= normalized.max_samples);
    }
}

proptest! {
    /// One instance per tuple, with pairwise distinct names.
    #[test]
    fn one_instance_per_tuple(widths in prop::collection::btree_set(1usize..4096, 1..6)) {
        let sizes: Vec<Size> = widths.iter().map(|&w| Size::new(w, 16)).collect();
        let space = ParamSpace::combine(vec![
            Dimension::new(sizes.iter().copied()),
            Dimension::new([Depth::U8, Depth::S16, Depth::F64]),
        ]);
        prop_assert_eq!(space.len(), sizes.len() * 3);
        let names: std::collections::BTreeSet<String> =
            space.tuples().iter().map(|t| t.instance_name("Core_Prop")).collect();
        prop_assert_eq!(names.len(), space.len());
    }
}
