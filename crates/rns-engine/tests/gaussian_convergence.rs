use rns_core::Problem;
use rns_engine::{run, Phase, RunConfig};

fn narrow_gaussian_problem() -> Problem<
    impl rns_core::PriorTransform,
    impl rns_core::LogLikelihood,
> {
    Problem::new(
        vec!["x".to_string()],
        |u: &[f64]| u.to_vec(),
        |theta: &[f64]| {
            let sigma = 0.01;
            let z = (theta[0] - 0.5) / sigma;
            -0.5 * z * z - (sigma * (2.0 * std::f64::consts::PI).sqrt()).ln()
        },
    )
    .unwrap()
}

fn convergence_config() -> RunConfig {
    let mut config = RunConfig::default();
    config.sampler.min_live_points = 50;
    config.sampler.max_rounds = 20_000;
    config.seed_policy.master_seed = 4321;
    config.output.log_dir = None;
    config.checkpoint.interval = 0;
    config
}

#[test]
fn unit_gaussian_evidence_and_posterior_are_recovered() {
    // A normalized Gaussian well inside the unit interval integrates to one
    // against the uniform prior, so log Z should come out near zero.
    let problem = narrow_gaussian_problem();
    let config = convergence_config();

    let summary = run(&config, &problem).unwrap();

    assert_eq!(summary.phase, Phase::Converged);
    assert!(summary.iterations < 5000, "iterations: {}", summary.iterations);
    assert!(summary.log_z.abs() < 0.6, "log_z: {}", summary.log_z);
    assert!(summary.log_z_err > 0.0);
    assert!(summary.log_z_err < 0.6, "log_z_err: {}", summary.log_z_err);
    assert!(
        (summary.posterior.mean[0] - 0.5).abs() < 0.02,
        "posterior mean: {}",
        summary.posterior.mean[0]
    );
    assert!(summary.posterior.stddev[0] < 0.05);
}

#[test]
fn wrapped_dimension_handles_a_peak_at_the_seam() {
    // Von Mises style likelihood peaked at u = 0 == 1. With kappa = 20 the
    // evidence is exp(-kappa) I0(kappa), i.e. log Z about -2.41.
    let problem = Problem::new(
        vec!["phase".to_string()],
        |u: &[f64]| u.to_vec(),
        |theta: &[f64]| {
            let kappa = 20.0;
            kappa * ((2.0 * std::f64::consts::PI * theta[0]).cos() - 1.0)
        },
    )
    .unwrap()
    .with_wrapped_params(vec![0])
    .unwrap();
    let config = convergence_config();

    let summary = run(&config, &problem).unwrap();

    assert_eq!(summary.phase, Phase::Converged);
    assert!(
        (summary.log_z - (-2.41)).abs() < 0.7,
        "log_z: {}",
        summary.log_z
    );
}

#[test]
fn non_finite_likelihoods_never_reach_the_dead_sequence() {
    let problem = Problem::new(
        vec!["x".to_string()],
        |u: &[f64]| u.to_vec(),
        |theta: &[f64]| {
            if theta[0] < 0.2 {
                f64::NAN
            } else {
                let sigma = 0.05;
                let z = (theta[0] - 0.6) / sigma;
                -0.5 * z * z - (sigma * (2.0 * std::f64::consts::PI).sqrt()).ln()
            }
        },
    )
    .unwrap();
    let mut config = convergence_config();
    config.sampler.min_live_points = 40;

    let summary = run(&config, &problem).unwrap();

    assert_eq!(summary.phase, Phase::Converged);
    for sample in &summary.posterior.samples {
        assert!(sample.logl.is_finite());
    }
    assert!(summary.log_z.is_finite());
}
