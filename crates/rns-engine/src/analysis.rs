use std::collections::BTreeSet;
use std::path::Path;

use rns_core::RnsError;
use serde::{Deserialize, Serialize};

use crate::checkpoint::{self, Snapshot};
use crate::evidence::DeadPoint;
use crate::kernel::RunSummary;
use crate::manifest::RunManifest;
use crate::metrics::RunDiagnostics;

/// One importance-weighted posterior draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorSample {
    /// Physical-space coordinates, sampled components first, derived after.
    pub theta: Vec<f64>,
    /// Normalized posterior weight.
    pub weight: f64,
    /// Log-likelihood of the sample.
    pub logl: f64,
}

/// Importance-weighted posterior representation of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedPosterior {
    /// Ordered labels of the sampled parameters.
    pub param_names: Vec<String>,
    /// Ordered labels of derived quantities.
    pub derived_param_names: Vec<String>,
    /// Weighted samples in removal order.
    pub samples: Vec<PosteriorSample>,
    /// Weighted posterior mean per component.
    pub mean: Vec<f64>,
    /// Weighted posterior standard deviation per component.
    pub stddev: Vec<f64>,
    /// Effective sample size implied by the weights.
    pub effective_sample_size: f64,
}

/// Builds the weighted posterior from a recorded dead sequence.
pub fn weighted_posterior(
    param_names: &[String],
    derived_param_names: &[String],
    dead: &[DeadPoint],
    log_z: f64,
) -> WeightedPosterior {
    let width = param_names.len() + derived_param_names.len();
    let mut posterior = WeightedPosterior {
        param_names: param_names.to_vec(),
        derived_param_names: derived_param_names.to_vec(),
        samples: Vec::with_capacity(dead.len()),
        mean: vec![0.0; width],
        stddev: vec![0.0; width],
        effective_sample_size: 0.0,
    };
    if dead.is_empty() || log_z == f64::NEG_INFINITY {
        return posterior;
    }

    for entry in dead {
        posterior.samples.push(PosteriorSample {
            theta: entry.point.theta.clone(),
            weight: (entry.log_weight - log_z).exp(),
            logl: entry.point.logl,
        });
    }

    let weights: Vec<f64> = posterior.samples.iter().map(|sample| sample.weight).collect();
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        for component in 0..width {
            let mean = posterior
                .samples
                .iter()
                .map(|sample| sample.weight * sample.theta[component])
                .sum::<f64>()
                / total;
            let variance = posterior
                .samples
                .iter()
                .map(|sample| {
                    let delta = sample.theta[component] - mean;
                    sample.weight * delta * delta
                })
                .sum::<f64>()
                / total;
            posterior.mean[component] = mean;
            posterior.stddev[component] = variance.max(0.0).sqrt();
        }
    }
    posterior.effective_sample_size = effective_sample_size(&weights);
    posterior
}

/// Effective sample size `(Σw)² / Σw²` of a weight sequence.
pub fn effective_sample_size(weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().sum();
    let squared: f64 = weights.iter().map(|weight| weight * weight).sum();
    if squared == 0.0 {
        0.0
    } else {
        total * total / squared
    }
}

/// Rebuilds the result object of a persisted run from its artefacts alone.
///
/// No likelihood is re-evaluated: the manifest supplies the labels and the
/// snapshot supplies the dead sequence and evidence state.
pub fn load_results(run_dir: &Path) -> Result<RunSummary, RnsError> {
    let manifest_path = run_dir.join("manifest.json");
    let manifest = RunManifest::load(&manifest_path)?;
    let snapshot_path =
        checkpoint::snapshot_path(run_dir, &manifest.config.output.checkpoint_dir);
    let snapshot = Snapshot::load(&snapshot_path)?;

    let posterior = weighted_posterior(
        &manifest.param_names,
        &manifest.derived_param_names,
        &snapshot.dead,
        snapshot.evidence.log_z,
    );
    let unique_dead_points = snapshot
        .dead
        .iter()
        .map(|entry| entry.point.id.as_raw())
        .collect::<BTreeSet<u64>>()
        .len();
    let acceptance_rate = if snapshot.total_evaluations == 0 {
        0.0
    } else {
        snapshot.evidence.iteration as f64 / snapshot.total_evaluations as f64
    };

    Ok(RunSummary {
        log_z: snapshot.evidence.log_z,
        log_z_err: snapshot.evidence.log_z_err,
        posterior,
        iterations: snapshot.evidence.iteration,
        rounds: snapshot.round,
        final_live_size: snapshot.final_live_size,
        phase: snapshot.phase.clone(),
        diagnostics: RunDiagnostics {
            rounds: snapshot.round,
            iterations: snapshot.evidence.iteration,
            likelihood_evaluations: snapshot.total_evaluations,
            acceptance_rate,
            unique_dead_points,
        },
        warnings: Vec::new(),
        manifest_path: Some(manifest_path),
        metrics_path: manifest.metrics_file.as_ref().map(|rel| run_dir.join(rel)),
        snapshot_path: Some(snapshot_path),
    })
}
