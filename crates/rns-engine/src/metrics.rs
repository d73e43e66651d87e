use std::fs::File;
use std::io::Write;
use std::path::Path;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Per-round diagnostics stored for CSV export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSample {
    /// Round number when the sample was recorded.
    pub round: usize,
    /// Live population size after the round.
    pub live_size: usize,
    /// Log-likelihood threshold of the round (worst removed point).
    pub logl_min: f64,
    /// Log prior volume after the round's shrink.
    pub log_x: f64,
    /// Running log evidence.
    pub log_z: f64,
    /// Remaining-evidence bound from the live population.
    pub remaining_log_evidence: f64,
    /// Log volume of the proposal region in use.
    pub region_log_volume: f64,
    /// Likelihood evaluations spent so far.
    pub evaluations: usize,
}

/// Aggregate diagnostics summarising a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDiagnostics {
    /// Rounds completed.
    pub rounds: usize,
    /// Shrink removals accumulated.
    pub iterations: usize,
    /// Likelihood evaluations spent.
    pub likelihood_evaluations: usize,
    /// Removals per evaluation.
    pub acceptance_rate: f64,
    /// Distinct dead point identifiers observed.
    pub unique_dead_points: usize,
}

/// Collects per-round samples and run-level aggregates.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    samples: Vec<RoundSample>,
    dead_ids: IndexSet<u64>,
}

impl MetricsRecorder {
    /// Creates a new recorder instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a per-round sample.
    pub fn push_sample(&mut self, sample: RoundSample) {
        self.samples.push(sample);
    }

    /// Tracks a dead point identifier; returns false on a duplicate.
    pub fn note_dead(&mut self, id: u64) -> bool {
        self.dead_ids.insert(id)
    }

    /// Returns an immutable view over the recorded samples.
    pub fn samples(&self) -> &[RoundSample] {
        &self.samples
    }

    /// Aggregates diagnostics from the recorded data.
    pub fn diagnostics(
        &self,
        rounds: usize,
        iterations: usize,
        evaluations: usize,
    ) -> RunDiagnostics {
        let acceptance_rate = if evaluations == 0 {
            0.0
        } else {
            iterations as f64 / evaluations as f64
        };
        RunDiagnostics {
            rounds,
            iterations,
            likelihood_evaluations: evaluations,
            acceptance_rate,
            unique_dead_points: self.dead_ids.len(),
        }
    }

    /// Writes the recorded samples to a CSV file.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        writeln!(
            file,
            "round,live_size,logl_min,log_x,log_z,remaining,region_log_volume,evaluations"
        )?;
        for sample in &self.samples {
            writeln!(
                file,
                "{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{}",
                sample.round,
                sample.live_size,
                sample.logl_min,
                sample.log_x,
                sample.log_z,
                sample.remaining_log_evidence,
                sample.region_log_volume,
                sample.evaluations
            )?;
        }
        Ok(())
    }
}
