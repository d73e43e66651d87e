#![deny(missing_docs)]

//! Reactive nested sampling engine.
//!
//! Estimates the Bayesian evidence and weighted posterior samples by
//! shrinking a likelihood-constrained live population, growing it adaptively
//! until evidence and posterior precision targets are met. Runs are
//! deterministic for a fixed master seed, checkpoint/resumable, and fan
//! likelihood evaluations out over a worker pool.

/// Posterior reconstruction from recorded run artefacts.
pub mod analysis;
/// Bootstrap estimate of the evidence uncertainty.
pub mod bootstrap;
/// Atomic snapshot store and append-only dead point log.
pub mod checkpoint;
/// YAML configuration schema and defaults.
pub mod config;
/// Reactive controller state machine.
pub mod controller;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Parallel candidate evaluation with ordered fan-in.
pub mod dispatch;
/// Evidence accumulation and prior-volume bookkeeping.
pub mod evidence;
/// Round loop and public `run`/`resume` entry points.
pub mod kernel;
/// Live point population manager.
pub mod live;
/// Run manifest serialization helpers.
pub mod manifest;
/// Per-round diagnostics collection and CSV export.
pub mod metrics;
/// Bounding-region construction and constrained proposals.
pub mod region;

pub use analysis::{load_results, PosteriorSample, WeightedPosterior};
pub use config::{
    CheckpointConfig, DispatchConfig, OutputConfig, RegionConfig, RunConfig, SamplerConfig,
    SeedPolicy,
};
pub use controller::Phase;
pub use evidence::{DeadPoint, EvidenceState};
pub use kernel::{
    resume, resume_cancellable, run, run_cancellable, run_or_resume, CancelToken, RunSummary,
};
pub use metrics::{RoundSample, RunDiagnostics};
