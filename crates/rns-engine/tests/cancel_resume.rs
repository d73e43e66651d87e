use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rns_core::Problem;
use rns_engine::{resume, run_cancellable, CancelToken, Phase, RunConfig};
use tempfile::tempdir;

fn counting_problem(
    counter: Arc<AtomicUsize>,
    token: CancelToken,
    cancel_after: usize,
) -> Problem<impl rns_core::PriorTransform, impl rns_core::LogLikelihood> {
    Problem::new(
        vec!["x".to_string()],
        |u: &[f64]| u.to_vec(),
        move |theta: &[f64]| {
            if counter.fetch_add(1, Ordering::SeqCst) + 1 >= cancel_after {
                token.cancel();
            }
            let sigma = 0.05;
            let z = (theta[0] - 0.5) / sigma;
            -0.5 * z * z - (sigma * (2.0 * std::f64::consts::PI).sqrt()).ln()
        },
    )
    .unwrap()
}

fn plain_problem() -> Problem<impl rns_core::PriorTransform, impl rns_core::LogLikelihood> {
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

fn cancellable_config(root: &Path) -> RunConfig {
    let mut config = RunConfig::default();
    config.sampler.min_live_points = 30;
    config.sampler.max_rounds = 20_000;
    config.seed_policy.master_seed = 777;
    config.output.log_dir = Some(root.join("runs"));
    config.checkpoint.interval = 1;
    config
}

#[test]
fn cancelled_runs_checkpoint_and_resume_without_duplicates() {
    let dir = tempdir().unwrap();
    let config = cancellable_config(dir.path());
    let token = CancelToken::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let problem = counting_problem(counter, token.clone(), 150);

    let cancelled = run_cancellable(&config, &problem, &token).unwrap();
    let Phase::Failed { reason } = &cancelled.phase else {
        panic!("expected a failed phase, got {:?}", cancelled.phase);
    };
    assert!(reason.contains("cancelled"));
    assert!(cancelled.iterations > 0);
    let snapshot_path = cancelled.snapshot_path.clone().unwrap();
    assert!(snapshot_path.exists());

    let run_dir = snapshot_path
        .parent()
        .and_then(|path| path.parent())
        .unwrap()
        .to_path_buf();

    let resumed = resume(&run_dir, &plain_problem()).unwrap();
    assert_eq!(resumed.phase, Phase::Converged);
    assert!(resumed.iterations > cancelled.iterations);
    // Every dead point id is distinct across the cancel/resume boundary.
    assert_eq!(
        resumed.diagnostics.unique_dead_points,
        resumed.posterior.samples.len()
    );
}
