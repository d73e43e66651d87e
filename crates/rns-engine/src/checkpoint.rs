use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use rns_core::errors::ErrorInfo;
use rns_core::{Point, RnsError};
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::controller::Phase;
use crate::evidence::{DeadPoint, EvidenceState};

/// Durable snapshot of a paused or completed run.
///
/// The randomness position is carried structurally: every draw in the engine
/// is seeded from `(master_seed, round, slot)` substreams, so restoring the
/// counters below restores the exact stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Rounds completed when the snapshot was written.
    pub round: usize,
    /// Configuration the run started with.
    pub config: RunConfig,
    /// Master seed for all substream derivations.
    pub master_seed: u64,
    /// Sampled dimensionality, checked against the problem on resume.
    pub dim: usize,
    /// Next unassigned point identifier.
    pub next_point_id: u64,
    /// Controller phase at snapshot time.
    pub phase: Phase,
    /// Whether the leftover live volume has been drained into `dead`.
    pub finalized: bool,
    /// Live population size at termination (or at snapshot time).
    pub final_live_size: usize,
    /// Current live points.
    pub live: Vec<Point>,
    /// Accepted candidates awaiting use, in proposal order.
    pub buffer: Vec<Point>,
    /// Dead point sequence accumulated so far.
    pub dead: Vec<DeadPoint>,
    /// Dead points already flushed to the chain log.
    pub flushed_dead: usize,
    /// Evidence accumulator state.
    pub evidence: EvidenceState,
    /// Likelihood evaluations spent so far.
    pub total_evaluations: usize,
}

impl Snapshot {
    /// Restores a snapshot from disk.
    pub fn load(path: &Path) -> Result<Self, RnsError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            RnsError::Checkpoint(
                ErrorInfo::new("snapshot-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            RnsError::Serde(
                ErrorInfo::new("snapshot-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Persists the snapshot atomically.
    ///
    /// Writes to a sibling temporary file first and renames it into place,
    /// so a crash mid-write leaves the previous good snapshot intact.
    pub fn store(&self, path: &Path) -> Result<(), RnsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                RnsError::Checkpoint(
                    ErrorInfo::new("snapshot-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            RnsError::Serde(
                ErrorInfo::new("snapshot-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|err| {
            RnsError::Checkpoint(
                ErrorInfo::new("snapshot-write", err.to_string())
                    .with_context("path", tmp.display().to_string()),
            )
        })?;
        fs::rename(&tmp, path).map_err(|err| {
            RnsError::Checkpoint(
                ErrorInfo::new("snapshot-rename", err.to_string())
                    .with_context("from", tmp.display().to_string())
                    .with_context("to", path.display().to_string()),
            )
        })
    }
}

/// Location of the atomic snapshot inside a run directory.
pub fn snapshot_path(run_dir: &Path, checkpoint_dir: &Path) -> PathBuf {
    run_dir.join(checkpoint_dir).join("snapshot.json")
}

/// Location of the append-only dead point log inside a run directory.
pub fn chain_path(run_dir: &Path, chain_dir: &Path) -> PathBuf {
    run_dir.join(chain_dir).join("dead_points.jsonl")
}

/// Appends dead point records to the chain log, one JSON line each.
pub fn append_dead_points(path: &Path, entries: &[DeadPoint]) -> Result<(), RnsError> {
    if entries.is_empty() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            RnsError::Checkpoint(
                ErrorInfo::new("chain-mkdir", err.to_string())
                    .with_context("path", parent.display().to_string()),
            )
        })?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| {
            RnsError::Checkpoint(
                ErrorInfo::new("chain-open", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
    for entry in entries {
        let line = serde_json::to_string(entry).map_err(|err| {
            RnsError::Serde(ErrorInfo::new("chain-serialize", err.to_string()))
        })?;
        writeln!(file, "{line}").map_err(|err| {
            RnsError::Checkpoint(
                ErrorInfo::new("chain-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
    }
    Ok(())
}
