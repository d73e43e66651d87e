use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rns_core::errors::ErrorInfo;
use rns_core::{LogLikelihood, Point, PointId, PriorTransform, Problem, RngHandle, RnsError};
use serde::{Deserialize, Serialize};

use crate::analysis::{self, WeightedPosterior};
use crate::bootstrap;
use crate::checkpoint::{self, Snapshot};
use crate::config::RunConfig;
use crate::controller::{self, Phase, Policy, Signals};
use crate::determinism;
use crate::dispatch::Dispatcher;
use crate::evidence::{DeadPoint, EvidenceState};
use crate::live::LivePopulation;
use crate::manifest::RunManifest;
use crate::metrics::{MetricsRecorder, RoundSample, RunDiagnostics};
use crate::region::Region;

/// Cooperative cancellation flag checked at round boundaries.
///
/// Cancellation never interrupts a batch: the round in flight completes, a
/// checkpoint is written when a run directory exists, and the run exits in
/// the failed state with a cancellation reason.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates an unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation at the next round boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Result object returned to callers after a run terminates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Log evidence estimate.
    pub log_z: f64,
    /// Bootstrap standard deviation of the evidence.
    pub log_z_err: f64,
    /// Importance-weighted posterior samples and moments.
    pub posterior: WeightedPosterior,
    /// Shrink removals accumulated.
    pub iterations: usize,
    /// Rounds driven by the controller.
    pub rounds: usize,
    /// Live population size at termination.
    pub final_live_size: usize,
    /// Terminal controller phase.
    pub phase: Phase,
    /// Aggregate run diagnostics.
    pub diagnostics: RunDiagnostics,
    /// Non-fatal problems encountered (checkpoint IO, empty injections).
    pub warnings: Vec<String>,
    /// Manifest location, when a run directory was configured.
    pub manifest_path: Option<PathBuf>,
    /// Metrics CSV location, when a run directory was configured.
    pub metrics_path: Option<PathBuf>,
    /// Snapshot location, when a run directory was configured.
    pub snapshot_path: Option<PathBuf>,
}

/// In-memory engine state; the snapshot payload mirrors it field for field.
struct EngineState {
    config: RunConfig,
    master_seed: u64,
    dim: usize,
    round: usize,
    next_point_id: u64,
    phase: Phase,
    finalized: bool,
    final_live_size: usize,
    live: LivePopulation,
    buffer: Vec<Point>,
    dead: Vec<DeadPoint>,
    flushed_dead: usize,
    evidence: EvidenceState,
    total_evaluations: usize,
}

impl EngineState {
    fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            round: self.round,
            config: self.config.clone(),
            master_seed: self.master_seed,
            dim: self.dim,
            next_point_id: self.next_point_id,
            phase: self.phase.clone(),
            finalized: self.finalized,
            final_live_size: self.final_live_size,
            live: self.live.points().to_vec(),
            buffer: self.buffer.clone(),
            dead: self.dead.clone(),
            flushed_dead: self.flushed_dead,
            evidence: self.evidence.clone(),
            total_evaluations: self.total_evaluations,
        }
    }

    fn from_snapshot(snapshot: Snapshot) -> Result<Self, RnsError> {
        let live = LivePopulation::from_points(snapshot.live)?;
        Ok(Self {
            config: snapshot.config,
            master_seed: snapshot.master_seed,
            dim: snapshot.dim,
            round: snapshot.round,
            next_point_id: snapshot.next_point_id,
            phase: snapshot.phase,
            finalized: snapshot.finalized,
            final_live_size: snapshot.final_live_size,
            live,
            buffer: snapshot.buffer,
            dead: snapshot.dead,
            flushed_dead: snapshot.flushed_dead,
            evidence: snapshot.evidence,
            total_evaluations: snapshot.total_evaluations,
        })
    }
}

/// Runs the sampler from scratch with the provided configuration.
pub fn run<T, L>(config: &RunConfig, problem: &Problem<T, L>) -> Result<RunSummary, RnsError>
where
    T: PriorTransform,
    L: LogLikelihood,
{
    run_cancellable(config, problem, &CancelToken::new())
}

/// Runs the sampler with an external cancellation token.
pub fn run_cancellable<T, L>(
    config: &RunConfig,
    problem: &Problem<T, L>,
    cancel: &CancelToken,
) -> Result<RunSummary, RnsError>
where
    T: PriorTransform,
    L: LogLikelihood,
{
    config.validate()?;
    let master_seed = config.seed_policy.master_seed;
    problem.validate(
        config.sampler.num_test_samples,
        determinism::validation_seed(master_seed),
    )?;
    let run_dir = config.output.resolve_run_dir()?;
    let dispatcher = Dispatcher::new(config.dispatch.num_workers)?;
    let state = initialize(config, problem, &dispatcher)?;
    drive(state, problem, &dispatcher, cancel, run_dir)
}

/// Resumes a run from the snapshot stored in `run_dir`.
pub fn resume<T, L>(run_dir: &Path, problem: &Problem<T, L>) -> Result<RunSummary, RnsError>
where
    T: PriorTransform,
    L: LogLikelihood,
{
    resume_cancellable(run_dir, problem, &CancelToken::new())
}

/// Resumes a run with an external cancellation token.
pub fn resume_cancellable<T, L>(
    run_dir: &Path,
    problem: &Problem<T, L>,
    cancel: &CancelToken,
) -> Result<RunSummary, RnsError>
where
    T: PriorTransform,
    L: LogLikelihood,
{
    let snapshot_path = locate_snapshot(run_dir)?;
    let snapshot = Snapshot::load(&snapshot_path)?;
    if snapshot.dim != problem.dim() {
        return Err(RnsError::Config(
            ErrorInfo::new("dimension-mismatch", "problem does not match the checkpointed run")
                .with_context("snapshot_dim", snapshot.dim.to_string())
                .with_context("problem_dim", problem.dim().to_string()),
        ));
    }
    let mut state = EngineState::from_snapshot(snapshot)?;
    // Cancelled or aborted runs pick up where they stopped; converged runs
    // stay terminal and only have their artefacts rebuilt.
    if matches!(state.phase, Phase::Failed { .. }) && !state.finalized {
        state.phase = Phase::Running;
    }
    let dispatcher = Dispatcher::new(state.config.dispatch.num_workers)?;
    drive(state, problem, &dispatcher, cancel, Some(run_dir.to_path_buf()))
}

/// Starts fresh or continues an existing run, honouring `output.resume`.
pub fn run_or_resume<T, L>(
    config: &RunConfig,
    problem: &Problem<T, L>,
) -> Result<RunSummary, RnsError>
where
    T: PriorTransform,
    L: LogLikelihood,
{
    if config.output.resume {
        if let Some(run_dir) = config.output.resolve_run_dir()? {
            let snapshot_path =
                checkpoint::snapshot_path(&run_dir, &config.output.checkpoint_dir);
            if snapshot_path.exists() {
                return resume(&run_dir, problem);
            }
        }
    }
    run(config, problem)
}

fn locate_snapshot(run_dir: &Path) -> Result<PathBuf, RnsError> {
    let default_path = run_dir.join("checkpoints").join("snapshot.json");
    if default_path.exists() {
        return Ok(default_path);
    }
    let manifest = RunManifest::load(&run_dir.join("manifest.json")).map_err(|err| {
        RnsError::Checkpoint(
            ErrorInfo::new("snapshot-missing", "no snapshot found in run directory")
                .with_context("run_dir", run_dir.display().to_string())
                .with_context("cause", err.to_string()),
        )
    })?;
    Ok(checkpoint::snapshot_path(
        run_dir,
        &manifest.config.output.checkpoint_dir,
    ))
}

/// Draws the initial live population directly from the prior.
fn initialize<T, L>(
    config: &RunConfig,
    problem: &Problem<T, L>,
    dispatcher: &Dispatcher,
) -> Result<EngineState, RnsError>
where
    T: PriorTransform,
    L: LogLikelihood,
{
    let master_seed = config.seed_policy.master_seed;
    let dim = problem.dim();
    let count = config.sampler.min_live_points;
    let mut candidates = Vec::with_capacity(count);
    for slot in 0..count {
        let mut rng = RngHandle::from_seed(determinism::init_seed(master_seed, slot));
        let u: Vec<f64> = (0..dim).map(|_| rng.uniform()).collect();
        candidates.push((PointId::from_raw(slot as u64), u));
    }
    let points = evaluate_with_retry(dispatcher, problem, &candidates)?;
    let mut live = LivePopulation::new();
    for point in points {
        live.insert(point)?;
    }
    Ok(EngineState {
        config: config.clone(),
        master_seed,
        dim,
        round: 0,
        next_point_id: count as u64,
        phase: Phase::Running,
        finalized: false,
        final_live_size: count,
        live,
        buffer: Vec::new(),
        dead: Vec::new(),
        flushed_dead: 0,
        evidence: EvidenceState::new(),
        total_evaluations: count,
    })
}

/// Round loop: worst point out, constrained replacement in, evidence
/// updated, controller consulted, checkpoint on cadence.
fn drive<T, L>(
    mut state: EngineState,
    problem: &Problem<T, L>,
    dispatcher: &Dispatcher,
    cancel: &CancelToken,
    run_dir: Option<PathBuf>,
) -> Result<RunSummary, RnsError>
where
    T: PriorTransform,
    L: LogLikelihood,
{
    let mut recorder = MetricsRecorder::new();
    for entry in &state.dead {
        recorder.note_dead(entry.point.id.as_raw());
    }
    let mut warnings = Vec::new();
    let mut region: Option<Region> = None;
    let mut rounds_since_refit = 0usize;
    let policy = Policy {
        dlogz_tolerance: state.config.sampler.dlogz_tolerance,
        min_ess: state.config.sampler.min_ess,
        max_live_points: state.config.sampler.max_live_points,
        max_rounds: state.config.sampler.max_rounds,
    };

    while !state.phase.is_terminal() {
        if cancel.is_cancelled() {
            state.phase = Phase::Failed {
                reason: "cancelled by caller".to_string(),
            };
            break;
        }
        state.round += 1;

        if region.is_none() || rounds_since_refit >= state.config.region.refit_interval {
            match Region::fit(
                &state.live.snapshot(),
                problem.wrapped_params(),
                &state.config.region,
            ) {
                Ok(fitted) => {
                    region = Some(fitted);
                    rounds_since_refit = 0;
                }
                Err(err) => {
                    state.phase = Phase::Failed {
                        reason: err.to_string(),
                    };
                    break;
                }
            }
        }
        rounds_since_refit += 1;
        let Some(current_region) = region.as_ref() else {
            break;
        };

        let worst = state
            .live
            .worst()
            .map_err(|err| tag_iteration(err, state.evidence.iteration))?
            .clone();
        let threshold = worst.logl;

        // Buffered candidates go stale as the threshold rises.
        state.buffer.retain(|point| point.logl > threshold);

        let replacement = match acquire_replacement(
            &mut state,
            problem,
            dispatcher,
            current_region,
            threshold,
        ) {
            Ok(Some(point)) => point,
            Ok(None) => {
                state.phase = Phase::Failed {
                    reason: format!(
                        "rejection budget of {} exhausted at logl threshold {}",
                        state.config.region.max_rejections, threshold
                    ),
                };
                break;
            }
            Err(err) => return Err(tag_iteration(err, state.evidence.iteration)),
        };

        let removed = state
            .live
            .replace(worst.id, replacement)
            .map_err(|err| tag_iteration(err, state.evidence.iteration))?;
        let live_size = state.live.size();
        let (log_x, log_weight) = state
            .evidence
            .accumulate(removed.logl, live_size)
            .map_err(|err| tag_iteration(err, state.evidence.iteration))?;
        if !recorder.note_dead(removed.id.as_raw()) {
            return Err(RnsError::Population(
                ErrorInfo::new("duplicate-dead", "dead point identifier recorded twice")
                    .with_context("id", removed.id.as_raw().to_string()),
            ));
        }
        state.dead.push(DeadPoint {
            point: removed,
            log_x,
            log_weight,
            live_size,
        });

        let live_logls = state.live.logls();
        let remaining = state.evidence.remaining_log_evidence(&live_logls);
        let signals = Signals {
            remaining_delta: state.evidence.remaining_delta(remaining),
            effective_sample_size: state.evidence.effective_sample_size(),
            live_size: state.live.size(),
            rounds: state.round,
        };

        if state.config.sampler.metrics_thinning > 0
            && state.round % state.config.sampler.metrics_thinning == 0
        {
            recorder.push_sample(RoundSample {
                round: state.round,
                live_size: state.live.size(),
                logl_min: threshold,
                log_x: state.evidence.log_x,
                log_z: state.evidence.log_z,
                remaining_log_evidence: remaining,
                region_log_volume: current_region.log_volume(),
                evaluations: state.total_evaluations,
            });
        }

        match controller::next_phase(&state.phase, &signals, &policy) {
            Phase::Refining => {
                let injected =
                    inject_live_points(&mut state, problem, dispatcher, current_region)
                        .map_err(|err| tag_iteration(err, state.evidence.iteration))?;
                if injected == 0 {
                    warnings.push(format!(
                        "round {}: refinement produced no acceptable points",
                        state.round
                    ));
                }
                // Next round must refit around the grown population.
                rounds_since_refit = state.config.region.refit_interval;
                state.phase = Phase::Running;
            }
            next => state.phase = next,
        }

        let interval = state.config.checkpoint.interval;
        if interval > 0 && state.round % interval == 0 {
            if let Some(dir) = &run_dir {
                if let Err(err) = save_checkpoint(&mut state, dir) {
                    if err.is_fatal() {
                        return Err(err);
                    }
                    warnings.push(format!("round {}: {}", state.round, err));
                }
            }
        }
    }

    let final_live_logls = state.live.logls();
    if !state.finalized {
        state.final_live_size = state.live.size();
        state.evidence.log_z_err = bootstrap::logz_error(
            &state.dead,
            &final_live_logls,
            state.config.sampler.num_bootstraps,
            state.master_seed,
        );
        if state.phase == Phase::Converged {
            let leftover = state.live.drain_sorted();
            let records = state.evidence.finalize(leftover);
            for record in &records {
                if !recorder.note_dead(record.point.id.as_raw()) {
                    return Err(RnsError::Population(
                        ErrorInfo::new("duplicate-dead", "dead point identifier recorded twice")
                            .with_context("id", record.point.id.as_raw().to_string()),
                    ));
                }
            }
            state.dead.extend(records);
            state.finalized = true;
        }
    }

    let mut manifest_path = None;
    let mut metrics_path = None;
    let mut snapshot_path = None;
    // No artefacts before the first removal; serialized evidence values
    // must stay finite.
    if let Some(dir) = run_dir.as_ref().filter(|_| state.evidence.iteration > 0) {
        match save_checkpoint(&mut state, dir) {
            Ok(path) => snapshot_path = Some(path),
            Err(err) => {
                if err.is_fatal() {
                    return Err(err);
                }
                warnings.push(err.to_string());
            }
        }
        let metrics_file = dir.join(&state.config.output.metrics_file);
        match recorder.write_csv(&metrics_file) {
            Ok(()) => metrics_path = Some(metrics_file),
            Err(err) => warnings.push(format!("metrics write failed: {err}")),
        }
        let manifest_file = dir.join(&state.config.output.manifest_file);
        let manifest = RunManifest {
            config: state.config.clone(),
            master_seed: state.master_seed,
            seed_label: state.config.seed_policy.label.clone(),
            param_names: problem.param_names().to_vec(),
            derived_param_names: problem.derived_param_names().to_vec(),
            wrapped_params: problem.wrapped_params().to_vec(),
            phase: state.phase.clone(),
            iterations: state.evidence.iteration,
            log_z: state.evidence.log_z,
            log_z_err: state.evidence.log_z_err,
            metrics_file: metrics_path
                .as_ref()
                .map(|_| state.config.output.metrics_file.clone()),
            snapshot_file: snapshot_path.as_ref().and_then(|path| {
                path.strip_prefix(dir).ok().map(|rel| rel.to_path_buf())
            }),
            chain_file: if state.flushed_dead > 0 {
                Some(state.config.output.chain_dir.join("dead_points.jsonl"))
            } else {
                None
            },
        };
        match manifest.write(&manifest_file) {
            Ok(()) => manifest_path = Some(manifest_file),
            Err(err) => warnings.push(format!("manifest write failed: {err}")),
        }
    }

    let posterior = analysis::weighted_posterior(
        problem.param_names(),
        problem.derived_param_names(),
        &state.dead,
        state.evidence.log_z,
    );
    let diagnostics = recorder.diagnostics(
        state.round,
        state.evidence.iteration,
        state.total_evaluations,
    );

    Ok(RunSummary {
        log_z: state.evidence.log_z,
        log_z_err: state.evidence.log_z_err,
        posterior,
        iterations: state.evidence.iteration,
        rounds: state.round,
        final_live_size: state.final_live_size,
        phase: state.phase,
        diagnostics,
        warnings,
        manifest_path,
        metrics_path,
        snapshot_path,
    })
}

/// Pops a buffered candidate or proposes fresh batches until one clears the
/// threshold; returns `None` when the rejection budget runs dry.
fn acquire_replacement<T, L>(
    state: &mut EngineState,
    problem: &Problem<T, L>,
    dispatcher: &Dispatcher,
    region: &Region,
    threshold: f64,
) -> Result<Option<Point>, RnsError>
where
    T: PriorTransform,
    L: LogLikelihood,
{
    if !state.buffer.is_empty() {
        return Ok(Some(state.buffer.remove(0)));
    }
    let batch_size = if state.config.dispatch.draw_multiple {
        state.config.dispatch.batch_size
    } else {
        1
    };
    let mut attempts = 0usize;
    let mut batch_index = 0usize;
    while attempts < state.config.region.max_rejections {
        let mut rng = RngHandle::from_seed(determinism::proposal_seed(
            state.master_seed,
            state.round,
            batch_index,
        ));
        batch_index += 1;
        let candidates: Vec<(PointId, Vec<f64>)> = (0..batch_size)
            .map(|_| {
                let id = PointId::from_raw(state.next_point_id);
                state.next_point_id += 1;
                (id, region.sample(&mut rng))
            })
            .collect();
        let points = evaluate_with_retry(dispatcher, problem, &candidates)?;
        state.total_evaluations += points.len();
        attempts += points.len();
        for point in points {
            if point.logl > threshold {
                state.buffer.push(point);
            }
        }
        if !state.buffer.is_empty() {
            return Ok(Some(state.buffer.remove(0)));
        }
    }
    Ok(None)
}

/// Grows the live population with points above the current dead threshold.
fn inject_live_points<T, L>(
    state: &mut EngineState,
    problem: &Problem<T, L>,
    dispatcher: &Dispatcher,
    region: &Region,
) -> Result<usize, RnsError>
where
    T: PriorTransform,
    L: LogLikelihood,
{
    let threshold = state
        .dead
        .last()
        .map(|entry| entry.point.logl)
        .unwrap_or(f64::NEG_INFINITY);
    let headroom = state
        .config
        .sampler
        .max_live_points
        .saturating_sub(state.live.size());
    let target = state.config.sampler.injection_batch.min(headroom);
    if target == 0 {
        return Ok(0);
    }
    let batch_size = if state.config.dispatch.draw_multiple {
        state.config.dispatch.batch_size
    } else {
        1
    };
    let mut injected = 0usize;
    let mut attempts = 0usize;
    let mut batch_index = 0usize;
    while injected < target && attempts < state.config.region.max_rejections {
        let mut rng = RngHandle::from_seed(determinism::injection_seed(
            state.master_seed,
            state.round,
            batch_index,
        ));
        batch_index += 1;
        let candidates: Vec<(PointId, Vec<f64>)> = (0..batch_size)
            .map(|_| {
                let id = PointId::from_raw(state.next_point_id);
                state.next_point_id += 1;
                (id, region.sample(&mut rng))
            })
            .collect();
        let points = evaluate_with_retry(dispatcher, problem, &candidates)?;
        state.total_evaluations += points.len();
        attempts += points.len();
        for point in points {
            if injected < target && point.logl > threshold {
                state.live.insert(point)?;
                injected += 1;
            }
        }
    }
    Ok(injected)
}

/// One retry with identical candidates on whole-batch dispatch failures;
/// user-function errors are surfaced immediately.
fn evaluate_with_retry<T, L>(
    dispatcher: &Dispatcher,
    problem: &Problem<T, L>,
    candidates: &[(PointId, Vec<f64>)],
) -> Result<Vec<Point>, RnsError>
where
    T: PriorTransform,
    L: LogLikelihood,
{
    match dispatcher.evaluate_batch(problem, candidates) {
        Err(err) if matches!(err, RnsError::Dispatch(_)) => {
            dispatcher.evaluate_batch(problem, candidates)
        }
        other => other,
    }
}

/// Flushes new dead points to the chain log and stores the snapshot.
fn save_checkpoint(state: &mut EngineState, run_dir: &Path) -> Result<PathBuf, RnsError> {
    let chain = checkpoint::chain_path(run_dir, &state.config.output.chain_dir);
    checkpoint::append_dead_points(&chain, &state.dead[state.flushed_dead..])?;
    state.flushed_dead = state.dead.len();
    let path = checkpoint::snapshot_path(run_dir, &state.config.output.checkpoint_dir);
    state.to_snapshot().store(&path)?;
    Ok(path)
}

/// Attaches the last completed iteration to a fatal error.
fn tag_iteration(err: RnsError, iteration: usize) -> RnsError {
    let tag = |info: ErrorInfo| info.with_context("last_iteration", iteration.to_string());
    match err {
        RnsError::UserFunction(info) => RnsError::UserFunction(tag(info)),
        RnsError::Population(info) => RnsError::Population(tag(info)),
        RnsError::Region(info) => RnsError::Region(tag(info)),
        RnsError::Dispatch(info) => RnsError::Dispatch(tag(info)),
        RnsError::Checkpoint(info) => RnsError::Checkpoint(tag(info)),
        RnsError::Config(info) => RnsError::Config(tag(info)),
        RnsError::Serde(info) => RnsError::Serde(tag(info)),
    }
}
