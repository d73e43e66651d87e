use std::fs;
use std::path::{Path, PathBuf};

use rns_core::errors::ErrorInfo;
use rns_core::RnsError;
use serde::{Deserialize, Serialize};

/// YAML-configurable parameters governing a nested sampling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Live population sizing and stopping criteria.
    #[serde(default)]
    pub sampler: SamplerConfig,
    /// Region construction and proposal rejection budget.
    #[serde(default)]
    pub region: RegionConfig,
    /// Worker pool sizing and batched proposal behaviour.
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Checkpointing behaviour.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Run directory and artefact layout.
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            region: RegionConfig::default(),
            dispatch: DispatchConfig::default(),
            checkpoint: CheckpointConfig::default(),
            seed_policy: SeedPolicy::default(),
            output: OutputConfig::default(),
        }
    }
}

impl RunConfig {
    /// Parses a configuration from its YAML representation.
    pub fn from_yaml(contents: &str) -> Result<Self, RnsError> {
        serde_yaml::from_str(contents).map_err(|err| {
            RnsError::Serde(ErrorInfo::new("config-parse", err.to_string()))
        })
    }

    /// Loads a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, RnsError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            RnsError::Serde(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml(&contents)
    }

    /// Checks option consistency before a run starts.
    pub fn validate(&self) -> Result<(), RnsError> {
        if self.sampler.min_live_points < 2 {
            return Err(RnsError::Config(
                ErrorInfo::new("min-live-points", "at least two live points are required")
                    .with_context("min_live_points", self.sampler.min_live_points.to_string()),
            ));
        }
        if self.sampler.max_live_points < self.sampler.min_live_points {
            return Err(RnsError::Config(
                ErrorInfo::new("live-point-bounds", "max_live_points below min_live_points")
                    .with_context("min_live_points", self.sampler.min_live_points.to_string())
                    .with_context("max_live_points", self.sampler.max_live_points.to_string()),
            ));
        }
        if !(self.sampler.dlogz_tolerance > 0.0) {
            return Err(RnsError::Config(
                ErrorInfo::new("dlogz-tolerance", "dlogz_tolerance must be positive")
                    .with_context("dlogz_tolerance", self.sampler.dlogz_tolerance.to_string()),
            ));
        }
        if self.region.max_rejections == 0 {
            return Err(RnsError::Config(ErrorInfo::new(
                "rejection-budget",
                "max_rejections must allow at least one evaluation",
            )));
        }
        if !(self.region.padding >= 0.0) {
            return Err(RnsError::Config(ErrorInfo::new(
                "region-padding",
                "padding must be non-negative",
            )));
        }
        if self.dispatch.batch_size == 0 {
            return Err(RnsError::Config(ErrorInfo::new(
                "batch-size",
                "batch_size must be at least one",
            )));
        }
        Ok(())
    }
}

/// Live population sizing and stopping criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Live points drawn from the prior at start-up.
    #[serde(default = "default_min_live_points")]
    pub min_live_points: usize,
    /// Upper bound on the live population after reactive injections.
    #[serde(default = "default_max_live_points")]
    pub max_live_points: usize,
    /// Remaining-evidence tolerance used as the convergence signal.
    #[serde(default = "default_dlogz_tolerance")]
    pub dlogz_tolerance: f64,
    /// Posterior effective-sample-size target driving refinement.
    #[serde(default = "default_min_ess")]
    pub min_ess: f64,
    /// Hard bound on rounds before the run is abandoned.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    /// Live points added per reactive injection.
    #[serde(default = "default_injection_batch")]
    pub injection_batch: usize,
    /// Prior samples used to exercise the user callables before the run.
    #[serde(default = "default_num_test_samples")]
    pub num_test_samples: usize,
    /// Bootstrap replicates used for the evidence uncertainty.
    #[serde(default = "default_num_bootstraps")]
    pub num_bootstraps: usize,
    /// Interval in rounds between recorded metric samples.
    #[serde(default = "default_metrics_thinning")]
    pub metrics_thinning: usize,
}

fn default_min_live_points() -> usize {
    100
}

fn default_max_live_points() -> usize {
    1000
}

fn default_dlogz_tolerance() -> f64 {
    0.5
}

fn default_min_ess() -> f64 {
    0.0
}

fn default_max_rounds() -> usize {
    100_000
}

fn default_injection_batch() -> usize {
    50
}

fn default_num_test_samples() -> usize {
    2
}

fn default_num_bootstraps() -> usize {
    30
}

fn default_metrics_thinning() -> usize {
    10
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            min_live_points: default_min_live_points(),
            max_live_points: default_max_live_points(),
            dlogz_tolerance: default_dlogz_tolerance(),
            min_ess: default_min_ess(),
            max_rounds: default_max_rounds(),
            injection_batch: default_injection_batch(),
            num_test_samples: default_num_test_samples(),
            num_bootstraps: default_num_bootstraps(),
            metrics_thinning: default_metrics_thinning(),
        }
    }
}

/// Region construction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Per-side inflation factor applied to the fitted bounding box.
    #[serde(default = "default_padding")]
    pub padding: f64,
    /// Rounds between region refits.
    #[serde(default = "default_refit_interval")]
    pub refit_interval: usize,
    /// Width below which a dimension counts as collapsed.
    #[serde(default = "default_min_width")]
    pub min_width: f64,
    /// Likelihood evaluations allowed per replacement before giving up.
    #[serde(default = "default_max_rejections")]
    pub max_rejections: usize,
}

fn default_padding() -> f64 {
    0.1
}

fn default_refit_interval() -> usize {
    20
}

fn default_min_width() -> f64 {
    1e-12
}

fn default_max_rejections() -> usize {
    10_000
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            padding: default_padding(),
            refit_interval: default_refit_interval(),
            min_width: default_min_width(),
            max_rejections: default_max_rejections(),
        }
    }
}

/// Worker pool sizing and batched proposal behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Worker threads for likelihood evaluation (0 uses the pool default).
    #[serde(default)]
    pub num_workers: usize,
    /// Whether to propose several candidates per batch.
    #[serde(default = "default_draw_multiple")]
    pub draw_multiple: bool,
    /// Candidates proposed per batch when `draw_multiple` is enabled.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_draw_multiple() -> bool {
    true
}

fn default_batch_size() -> usize {
    8
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            num_workers: 0,
            draw_multiple: default_draw_multiple(),
            batch_size: default_batch_size(),
        }
    }
}

/// Checkpointing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Interval in rounds between checkpoint writes (0 disables periodic
    /// saves; a final snapshot is still written at termination).
    #[serde(default = "default_checkpoint_interval")]
    pub interval: usize,
}

fn default_checkpoint_interval() -> usize {
    100
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: default_checkpoint_interval(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label used when documenting substream seeds in manifests.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Run directory layout configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for run artefacts; no artefacts are written when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Continue from an existing snapshot in the resolved run directory.
    #[serde(default)]
    pub resume: bool,
    /// Number run directories `run1`, `run2`, ... under `log_dir`.
    #[serde(default = "default_append_run_num")]
    pub append_run_num: bool,
    /// Explicit run number overriding automatic numbering.
    #[serde(default)]
    pub run_num: Option<usize>,
    /// Recorded for external progress reporters; the engine emits no console
    /// output of its own.
    #[serde(default = "default_show_status")]
    pub show_status: bool,
    /// Metrics filename relative to the run directory.
    #[serde(default = "default_metrics_filename")]
    pub metrics_file: PathBuf,
    /// Manifest filename relative to the run directory.
    #[serde(default = "default_manifest_filename")]
    pub manifest_file: PathBuf,
    /// Subdirectory used for checkpoint files.
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,
    /// Subdirectory used for the append-only dead-point chain.
    #[serde(default = "default_chain_dir")]
    pub chain_dir: PathBuf,
}

fn default_append_run_num() -> bool {
    true
}

fn default_show_status() -> bool {
    true
}

fn default_metrics_filename() -> PathBuf {
    PathBuf::from("metrics.csv")
}

fn default_manifest_filename() -> PathBuf {
    PathBuf::from("manifest.json")
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("checkpoints")
}

fn default_chain_dir() -> PathBuf {
    PathBuf::from("chain")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            resume: false,
            append_run_num: default_append_run_num(),
            run_num: None,
            show_status: default_show_status(),
            metrics_file: default_metrics_filename(),
            manifest_file: default_manifest_filename(),
            checkpoint_dir: default_checkpoint_dir(),
            chain_dir: default_chain_dir(),
        }
    }
}

impl OutputConfig {
    /// Resolves (and creates) the run directory for a fresh or resumed run.
    ///
    /// Numbered directories follow `run<K>`: an explicit `run_num` wins,
    /// otherwise `append_run_num` picks the highest existing number plus one
    /// for fresh runs and the highest existing number for resumes. Without
    /// numbering the directory is simply `log_dir/run`.
    pub fn resolve_run_dir(&self) -> Result<Option<PathBuf>, RnsError> {
        let log_dir = match &self.log_dir {
            Some(dir) => dir.clone(),
            None => return Ok(None),
        };
        fs::create_dir_all(&log_dir).map_err(|err| {
            RnsError::Checkpoint(
                ErrorInfo::new("log-dir-create", err.to_string())
                    .with_context("path", log_dir.display().to_string()),
            )
        })?;
        let run_dir = match self.run_num {
            Some(num) => log_dir.join(format!("run{num}")),
            None if self.append_run_num => {
                let highest = highest_run_number(&log_dir)?;
                let num = match (self.resume, highest) {
                    (true, Some(existing)) => existing,
                    (_, existing) => existing.unwrap_or(0) + 1,
                };
                log_dir.join(format!("run{num}"))
            }
            None => log_dir.join("run"),
        };
        fs::create_dir_all(&run_dir).map_err(|err| {
            RnsError::Checkpoint(
                ErrorInfo::new("run-dir-create", err.to_string())
                    .with_context("path", run_dir.display().to_string()),
            )
        })?;
        Ok(Some(run_dir))
    }
}

fn highest_run_number(log_dir: &Path) -> Result<Option<usize>, RnsError> {
    let entries = fs::read_dir(log_dir).map_err(|err| {
        RnsError::Checkpoint(
            ErrorInfo::new("log-dir-read", err.to_string())
                .with_context("path", log_dir.display().to_string()),
        )
    })?;
    let mut highest = None;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(number) = name.strip_prefix("run").and_then(|rest| rest.parse::<usize>().ok())
        {
            highest = Some(number.max(highest.unwrap_or(0)));
        }
    }
    Ok(highest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        RunConfig::default().validate().unwrap();
    }

    #[test]
    fn yaml_roundtrip_preserves_config() {
        let mut config = RunConfig::default();
        config.sampler.min_live_points = 64;
        config.seed_policy.master_seed = 17;
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back = RunConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn tiny_populations_are_rejected() {
        let mut config = RunConfig::default();
        config.sampler.min_live_points = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn run_numbers_increment_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut output = OutputConfig::default();
        output.log_dir = Some(dir.path().to_path_buf());

        let first = output.resolve_run_dir().unwrap().unwrap();
        let second = output.resolve_run_dir().unwrap().unwrap();
        assert_eq!(first.file_name().unwrap(), "run1");
        assert_eq!(second.file_name().unwrap(), "run2");

        output.resume = true;
        let resumed = output.resolve_run_dir().unwrap().unwrap();
        assert_eq!(resumed, second);
    }
}
