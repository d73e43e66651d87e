use proptest::prelude::*;
use rns_engine::evidence::{log_add_exp, log_sum_exp, replay_log_z};
use rns_engine::EvidenceState;

proptest! {
    #[test]
    fn log_add_exp_is_commutative_and_dominates(a in -700.0f64..700.0, b in -700.0f64..700.0) {
        let ab = log_add_exp(a, b);
        let ba = log_add_exp(b, a);
        prop_assert!((ab - ba).abs() < 1e-12);
        prop_assert!(ab >= a.max(b));
    }

    #[test]
    fn log_sum_exp_matches_pairwise_accumulation(values in prop::collection::vec(-50.0f64..50.0, 1..32)) {
        let pairwise = values
            .iter()
            .fold(f64::NEG_INFINITY, |acc, &value| log_add_exp(acc, value));
        prop_assert!((log_sum_exp(&values) - pairwise).abs() < 1e-9);
    }

    #[test]
    fn accumulation_shrinks_volume_and_grows_evidence(
        logls in prop::collection::vec(-100.0f64..0.0, 1..200),
        live in 2usize..64,
    ) {
        let mut evidence = EvidenceState::new();
        let mut previous_x = evidence.log_x;
        let mut previous_z = f64::NEG_INFINITY;
        for &logl in &logls {
            evidence.accumulate(logl, live).unwrap();
            prop_assert!(evidence.log_x < previous_x);
            prop_assert!(evidence.log_z >= previous_z);
            previous_x = evidence.log_x;
            previous_z = evidence.log_z;
        }

        let entries: Vec<(f64, usize)> = logls.iter().map(|&logl| (logl, live)).collect();
        let replayed = replay_log_z(&entries, &[]);
        prop_assert!((replayed - evidence.log_z).abs() < 1e-9);
    }
}
