use std::fs;
use std::path::{Path, PathBuf};

use rns_core::errors::ErrorInfo;
use rns_core::RnsError;
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::controller::Phase;

/// Structured manifest describing a completed or running sampling run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Configuration used for the run.
    pub config: RunConfig,
    /// Master seed used to derive all substreams.
    pub master_seed: u64,
    /// Optional seed label captured from the configuration.
    pub seed_label: Option<String>,
    /// Ordered labels of the sampled parameters.
    pub param_names: Vec<String>,
    /// Ordered labels of derived quantities.
    pub derived_param_names: Vec<String>,
    /// Dimension indices treated as circular.
    pub wrapped_params: Vec<usize>,
    /// Controller phase when the manifest was written.
    pub phase: Phase,
    /// Shrink removals accumulated.
    pub iterations: usize,
    /// Log evidence estimate.
    pub log_z: f64,
    /// Bootstrap standard deviation of the evidence.
    pub log_z_err: f64,
    /// Metrics file relative to the run directory, if written.
    pub metrics_file: Option<PathBuf>,
    /// Snapshot file relative to the run directory, if written.
    pub snapshot_file: Option<PathBuf>,
    /// Dead point chain file relative to the run directory, if written.
    pub chain_file: Option<PathBuf>,
}

impl RunManifest {
    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), RnsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                RnsError::Checkpoint(
                    ErrorInfo::new("manifest-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            RnsError::Serde(
                ErrorInfo::new("manifest-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            RnsError::Checkpoint(
                ErrorInfo::new("manifest-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, RnsError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            RnsError::Checkpoint(
                ErrorInfo::new("manifest-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            RnsError::Serde(
                ErrorInfo::new("manifest-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}
