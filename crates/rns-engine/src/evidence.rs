use rns_core::errors::ErrorInfo;
use rns_core::{Point, RnsError};
use serde::{Deserialize, Serialize};

/// A removed live point together with its prior-volume bookkeeping.
///
/// Immutable once appended: the dead sequence is the posterior sample source
/// and the evidence's building block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadPoint {
    /// The removed point.
    pub point: Point,
    /// Log prior volume remaining after this removal.
    pub log_x: f64,
    /// Log posterior weight assigned at removal.
    pub log_weight: f64,
    /// Live population size read at removal time.
    pub live_size: usize,
}

/// Running evidence accumulator state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceState {
    /// Running log-evidence estimate.
    pub log_z: f64,
    /// Bootstrap standard deviation of the evidence, set at reporting points.
    pub log_z_err: f64,
    /// Log-sum-exp of doubled weights, tracked for the effective sample size.
    pub log_z_second: f64,
    /// Log prior volume still enclosed by the live population.
    pub log_x: f64,
    /// Number of shrink removals accumulated.
    pub iteration: usize,
}

impl EvidenceState {
    /// Fresh state with the full prior volume and no accumulated mass.
    pub fn new() -> Self {
        Self {
            log_z: f64::NEG_INFINITY,
            log_z_err: 0.0,
            log_z_second: f64::NEG_INFINITY,
            log_x: 0.0,
            iteration: 0,
        }
    }

    /// Accumulates one worst-point removal.
    ///
    /// The shrink factor is `1/N` with `N` read at removal time, so reactive
    /// injections change the factor from the round they land in. Returns the
    /// post-shrink log volume and the removed point's log weight, which the
    /// caller records in the dead sequence.
    pub fn accumulate(&mut self, logl: f64, live_size: usize) -> Result<(f64, f64), RnsError> {
        if live_size == 0 {
            return Err(RnsError::Population(ErrorInfo::new(
                "zero-live-size",
                "evidence accumulation requires a non-empty live population",
            )));
        }
        let shrink = 1.0 / live_size as f64;
        let log_mass = self.log_x + ln_one_minus_exp_neg(shrink);
        let log_weight = log_mass + logl;
        self.log_z = log_add_exp(self.log_z, log_weight);
        self.log_z_second = log_add_exp(self.log_z_second, 2.0 * log_weight);
        self.log_x -= shrink;
        self.iteration += 1;
        Ok((self.log_x, log_weight))
    }

    /// Assigns the leftover live points equal shares of the remaining volume.
    ///
    /// Points must arrive in ascending log-likelihood order; each receives
    /// `log_x - ln(n)` of mass. Returns the dead records to append.
    pub fn finalize(&mut self, leftover: Vec<Point>) -> Vec<DeadPoint> {
        let count = leftover.len();
        if count == 0 {
            return Vec::new();
        }
        let log_share = self.log_x - (count as f64).ln();
        leftover
            .into_iter()
            .map(|point| {
                let log_weight = log_share + point.logl;
                self.log_z = log_add_exp(self.log_z, log_weight);
                self.log_z_second = log_add_exp(self.log_z_second, 2.0 * log_weight);
                DeadPoint {
                    point,
                    log_x: self.log_x,
                    log_weight,
                    live_size: count,
                }
            })
            .collect()
    }

    /// Upper bound on the log evidence still held by the live population.
    pub fn remaining_log_evidence(&self, live_logls: &[f64]) -> f64 {
        log_sum_exp(live_logls) + self.log_x
    }

    /// Contribution the remaining bound would add to the evidence estimate.
    pub fn remaining_delta(&self, remaining_log_evidence: f64) -> f64 {
        if self.log_z == f64::NEG_INFINITY {
            return f64::INFINITY;
        }
        log_add_exp(self.log_z, remaining_log_evidence) - self.log_z
    }

    /// Effective sample size implied by the accumulated weights.
    pub fn effective_sample_size(&self) -> f64 {
        if self.log_z == f64::NEG_INFINITY {
            return 0.0;
        }
        (2.0 * self.log_z - self.log_z_second).exp()
    }
}

impl Default for EvidenceState {
    fn default() -> Self {
        Self::new()
    }
}

/// Recomputes the log evidence of a recorded dead sequence.
///
/// Used by replay tests and the bootstrap estimator; the live drain
/// contribution is added when `live_logls` is non-empty.
pub fn replay_log_z(entries: &[(f64, usize)], live_logls: &[f64]) -> f64 {
    let mut log_x = 0.0;
    let mut log_z = f64::NEG_INFINITY;
    for &(logl, live_size) in entries {
        let shrink = 1.0 / live_size.max(1) as f64;
        let log_mass = log_x + ln_one_minus_exp_neg(shrink);
        log_z = log_add_exp(log_z, log_mass + logl);
        log_x -= shrink;
    }
    if !live_logls.is_empty() {
        let drain = log_x - (live_logls.len() as f64).ln() + log_sum_exp(live_logls);
        log_z = log_add_exp(log_z, drain);
    }
    log_z
}

/// Numerically stable `log(exp(a) + exp(b))`.
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

/// Numerically stable log-sum-exp over a slice; empty input yields `-inf`.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if hi == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let sum: f64 = values.iter().map(|&value| (value - hi).exp()).sum();
    hi + sum.ln()
}

/// `log(1 - e^{-s})` for positive `s`, stable for small shrink factors.
fn ln_one_minus_exp_neg(s: f64) -> f64 {
    (-(-s).exp_m1()).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rns_core::PointId;

    #[test]
    fn log_x_strictly_decreases() {
        let mut evidence = EvidenceState::new();
        let mut previous = evidence.log_x;
        for _ in 0..50 {
            evidence.accumulate(-1.0, 25).unwrap();
            assert!(evidence.log_x < previous);
            previous = evidence.log_x;
        }
        assert!((evidence.log_x - (-2.0)).abs() < 1e-9);
    }

    #[test]
    fn log_z_never_decreases_as_points_accumulate() {
        let mut evidence = EvidenceState::new();
        let mut previous = f64::NEG_INFINITY;
        for step in 0..100 {
            evidence.accumulate(-(step as f64) * 0.01, 10).unwrap();
            assert!(evidence.log_z >= previous);
            previous = evidence.log_z;
        }
    }

    #[test]
    fn replay_matches_incremental_accumulation() {
        let mut evidence = EvidenceState::new();
        let mut entries = Vec::new();
        for step in 0..200 {
            let logl = -((200 - step) as f64) * 0.05;
            evidence.accumulate(logl, 40).unwrap();
            entries.push((logl, 40));
        }
        let replayed = replay_log_z(&entries, &[]);
        assert!((replayed - evidence.log_z).abs() < 1e-12);
    }

    #[test]
    fn constant_likelihood_converges_to_that_likelihood() {
        // Z = L when the likelihood is flat, however the volume is carved up.
        let mut evidence = EvidenceState::new();
        let mut entries = Vec::new();
        for _ in 0..2000 {
            evidence.accumulate(-3.0, 20).unwrap();
            entries.push((-3.0, 20));
        }
        let live_logls = vec![-3.0; 20];
        let total = replay_log_z(&entries, &live_logls);
        assert!((total - (-3.0)).abs() < 1e-6);
    }

    #[test]
    fn finalize_distributes_leftover_volume_equally() {
        let mut evidence = EvidenceState::new();
        evidence.accumulate(-1.0, 4).unwrap();
        let leftover: Vec<Point> = (0..4)
            .map(|id| Point::new(PointId::from_raw(10 + id), vec![0.5], vec![0.5], -0.5))
            .collect();
        let log_x = evidence.log_x;
        let records = evidence.finalize(leftover);
        assert_eq!(records.len(), 4);
        for record in &records {
            assert!((record.log_weight - (log_x - 4f64.ln() - 0.5)).abs() < 1e-12);
        }
    }

    #[test]
    fn zero_live_size_is_rejected() {
        let mut evidence = EvidenceState::new();
        assert!(evidence.accumulate(-1.0, 0).is_err());
    }

    #[test]
    fn remaining_delta_is_infinite_before_any_mass() {
        let evidence = EvidenceState::new();
        assert_eq!(evidence.remaining_delta(-1.0), f64::INFINITY);
    }
}
