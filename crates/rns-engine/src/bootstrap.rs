use rns_core::RngHandle;

use crate::determinism;
use crate::evidence::{replay_log_z, DeadPoint};

/// Bootstrap estimate of the evidence uncertainty.
///
/// Each replicate resamples the recorded removals (log-likelihood and
/// live-size pairs) with replacement, reorders them ascending in
/// log-likelihood as a nested run would have visited them, and replays the
/// shrinkage recursion under that realization, with the current live
/// population's drain contribution added on top. The reported value is the
/// standard deviation of the replicate `log_z` values. Offline and
/// non-mutating: the recorded history is only read.
pub fn logz_error(
    dead: &[DeadPoint],
    live_logls: &[f64],
    num_bootstraps: usize,
    master_seed: u64,
) -> f64 {
    if dead.is_empty() || num_bootstraps == 0 {
        return 0.0;
    }
    let entries: Vec<(f64, usize)> = dead
        .iter()
        .map(|entry| (entry.point.logl, entry.live_size))
        .collect();

    let mut replicates = Vec::with_capacity(num_bootstraps);
    for replicate in 0..num_bootstraps {
        let mut rng = RngHandle::from_seed(determinism::bootstrap_seed(master_seed, replicate));
        let mut resampled: Vec<(f64, usize)> = (0..entries.len())
            .map(|_| entries[rng.index_below(entries.len())])
            .collect();
        resampled.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        replicates.push(replay_log_z(&resampled, live_logls));
    }
    standard_deviation(&replicates)
}

fn standard_deviation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values
        .iter()
        .map(|value| (value - mean) * (value - mean))
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rns_core::{Point, PointId};

    fn dead_sequence(live_size: usize, count: usize, logl_step: f64) -> Vec<DeadPoint> {
        let mut entries = Vec::with_capacity(count);
        let mut log_x = 0.0;
        for index in 0..count {
            let logl = -((count - index) as f64) * logl_step;
            log_x -= 1.0 / live_size as f64;
            entries.push(DeadPoint {
                point: Point::new(PointId::from_raw(index as u64), vec![0.5], vec![0.5], logl),
                log_x,
                log_weight: log_x + logl,
                live_size,
            });
        }
        entries
    }

    #[test]
    fn flat_history_has_zero_spread() {
        // Resampling a constant history reproduces the same replay.
        let dead = dead_sequence(30, 200, 0.0);
        let err = logz_error(&dead, &[], 20, 99);
        assert_eq!(err, 0.0);
    }

    #[test]
    fn varied_history_has_positive_spread() {
        let dead = dead_sequence(30, 200, 0.05);
        let err = logz_error(&dead, &[-0.001], 20, 99);
        assert!(err > 0.0);
    }

    #[test]
    fn estimate_is_deterministic_per_seed() {
        let dead = dead_sequence(30, 50, 0.02);
        let a = logz_error(&dead, &[-0.5], 16, 7);
        let b = logz_error(&dead, &[-0.5], 16, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_history_reports_zero() {
        assert_eq!(logz_error(&[], &[], 30, 1), 0.0);
    }
}
