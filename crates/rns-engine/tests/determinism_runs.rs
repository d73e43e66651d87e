use rns_core::Problem;
use rns_engine::{run, RunConfig};

fn gaussian_problem() -> Problem<
    impl rns_core::PriorTransform,
    impl rns_core::LogLikelihood,
> {
    Problem::new(
        vec!["x".to_string()],
        |u: &[f64]| u.to_vec(),
        |theta: &[f64]| {
            let sigma = 0.05;
            let z = (theta[0] - 0.5) / sigma;
            -0.5 * z * z - (sigma * (2.0 * std::f64::consts::PI).sqrt()).ln()
        },
    )
    .unwrap()
}

fn deterministic_config() -> RunConfig {
    let mut config = RunConfig::default();
    config.sampler.min_live_points = 40;
    config.sampler.max_rounds = 20_000;
    config.seed_policy.master_seed = 2024;
    config.output.log_dir = None;
    config.checkpoint.interval = 0;
    config
}

#[test]
fn repeated_runs_with_same_seed_match() {
    let problem = gaussian_problem();
    let config = deterministic_config();

    let summary_a = run(&config, &problem).unwrap();
    let summary_b = run(&config, &problem).unwrap();

    assert_eq!(summary_a, summary_b);
}

#[test]
fn single_candidate_mode_is_deterministic_too() {
    let problem = gaussian_problem();
    let mut config = deterministic_config();
    config.dispatch.draw_multiple = false;

    let summary_a = run(&config, &problem).unwrap();
    let summary_b = run(&config, &problem).unwrap();

    assert_eq!(summary_a, summary_b);
}

#[test]
fn worker_count_does_not_change_the_dead_sequence() {
    let problem = gaussian_problem();
    let mut config = deterministic_config();
    config.dispatch.num_workers = 1;
    let serial = run(&config, &problem).unwrap();
    config.dispatch.num_workers = 4;
    let parallel = run(&config, &problem).unwrap();

    assert_eq!(serial.log_z, parallel.log_z);
    assert_eq!(serial.posterior.samples, parallel.posterior.samples);
}
