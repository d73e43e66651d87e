use serde::{Deserialize, Serialize};

/// Run phase of the reactive controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum Phase {
    /// Shrinking the prior volume round over round.
    Running,
    /// Injecting extra live points to meet the posterior precision target.
    Refining,
    /// Evidence and precision criteria both satisfied.
    Converged,
    /// Aborted; partial results remain available via the checkpoint.
    Failed {
        /// Why the run stopped.
        reason: String,
    },
}

impl Phase {
    /// Whether the phase ends the round loop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Converged | Phase::Failed { .. })
    }
}

/// Observed quantities the controller decides on after each round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signals {
    /// Contribution the remaining live evidence would add to `log_z`.
    pub remaining_delta: f64,
    /// Effective sample size of the accumulated posterior weights.
    pub effective_sample_size: f64,
    /// Current live population size.
    pub live_size: usize,
    /// Rounds completed so far.
    pub rounds: usize,
}

/// Thresholds the controller compares signals against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Policy {
    /// Remaining-evidence tolerance.
    pub dlogz_tolerance: f64,
    /// Posterior effective-sample-size target.
    pub min_ess: f64,
    /// Ceiling on reactive live population growth.
    pub max_live_points: usize,
    /// Hard bound on rounds.
    pub max_rounds: usize,
}

/// Pure transition function of the controller state machine.
///
/// Terminal states absorb. The precision criterion is best effort: once the
/// live population has reached its ceiling, a satisfied evidence criterion
/// alone converges the run, which keeps termination guaranteed.
pub fn next_phase(current: &Phase, signals: &Signals, policy: &Policy) -> Phase {
    if current.is_terminal() {
        return current.clone();
    }
    let evidence_ok = signals.remaining_delta <= policy.dlogz_tolerance;
    let precision_ok = signals.effective_sample_size >= policy.min_ess;
    let can_grow = signals.live_size < policy.max_live_points;

    if evidence_ok && (precision_ok || !can_grow) {
        Phase::Converged
    } else if signals.rounds >= policy.max_rounds {
        Phase::Failed {
            reason: format!("round budget of {} exhausted", policy.max_rounds),
        }
    } else if evidence_ok && can_grow {
        Phase::Refining
    } else {
        Phase::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> Policy {
        Policy {
            dlogz_tolerance: 0.5,
            min_ess: 100.0,
            max_live_points: 400,
            max_rounds: 1000,
        }
    }

    fn signals(delta: f64, ess: f64, live: usize, rounds: usize) -> Signals {
        Signals {
            remaining_delta: delta,
            effective_sample_size: ess,
            live_size: live,
            rounds,
        }
    }

    #[test]
    fn keeps_running_while_evidence_remains() {
        let next = next_phase(&Phase::Running, &signals(2.0, 10.0, 100, 5), &policy());
        assert_eq!(next, Phase::Running);
    }

    #[test]
    fn converges_when_both_criteria_hold() {
        let next = next_phase(&Phase::Running, &signals(0.1, 250.0, 100, 50), &policy());
        assert_eq!(next, Phase::Converged);
    }

    #[test]
    fn refines_when_precision_lags_the_evidence() {
        let next = next_phase(&Phase::Running, &signals(0.1, 20.0, 100, 50), &policy());
        assert_eq!(next, Phase::Refining);
    }

    #[test]
    fn precision_is_best_effort_at_the_population_ceiling() {
        let next = next_phase(&Phase::Running, &signals(0.1, 20.0, 400, 50), &policy());
        assert_eq!(next, Phase::Converged);
    }

    #[test]
    fn round_budget_exhaustion_fails_the_run() {
        let next = next_phase(&Phase::Running, &signals(2.0, 10.0, 100, 1000), &policy());
        assert!(matches!(next, Phase::Failed { .. }));
    }

    #[test]
    fn terminal_states_absorb() {
        let converged = next_phase(&Phase::Converged, &signals(9.0, 0.0, 2, 1), &policy());
        assert_eq!(converged, Phase::Converged);
        let failed = Phase::Failed {
            reason: "cancelled".to_string(),
        };
        assert_eq!(next_phase(&failed, &signals(0.0, 1e9, 2, 1), &policy()), failed);
    }
}
