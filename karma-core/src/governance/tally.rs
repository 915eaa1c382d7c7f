//! Tally rules applied when voting ends.

use super::proposal::{Tally, TallyOutcome};
use serde::{Deserialize, Serialize};

/// Decision derived from a tally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyResult {
    pub outcome: TallyOutcome,
    /// Total weight cast
    pub cast: f64,
    /// Weight required for quorum
    pub required_quorum: f64,
}

impl TallyResult {
    pub fn passed(&self) -> bool {
        self.outcome == TallyOutcome::Passed
    }
}

/// Decide a proposal.
///
/// Quorum is checked first and overrides everything else. A `no_with_veto`
/// share at or above `veto_threshold` of the cast weight rejects outright.
/// Otherwise the proposal passes when `yes` strictly outweighs `no`.
pub fn decide(tally: &Tally, quorum_base: f64, quorum_fraction: f64, veto_threshold: f64) -> TallyResult {
    let cast = tally.total_cast();
    let required_quorum = quorum_fraction * quorum_base;

    let outcome = if cast <= 0.0 || cast < required_quorum {
        TallyOutcome::QuorumNotMet
    } else if tally.no_with_veto >= veto_threshold * cast {
        TallyOutcome::Vetoed
    } else if tally.yes > tally.no {
        TallyOutcome::Passed
    } else {
        TallyOutcome::ThresholdNotMet
    };

    TallyResult {
        outcome,
        cast,
        required_quorum,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(yes: f64, no: f64, abstain: f64, veto: f64) -> Tally {
        Tally {
            yes,
            no,
            abstain,
            no_with_veto: veto,
        }
    }

    #[test]
    fn test_below_quorum_rejected_even_if_unanimous() {
        let result = decide(&tally(150.0, 0.0, 0.0, 0.0), 1000.0, 0.2, 0.334);
        assert_eq!(result.outcome, TallyOutcome::QuorumNotMet);
        assert_eq!(result.required_quorum, 200.0);
    }

    #[test]
    fn test_quorum_scenario_100_yes_50_no() {
        let result = decide(&tally(100.0, 50.0, 0.0, 0.0), 1000.0, 0.2, 0.334);
        assert_eq!(result.outcome, TallyOutcome::QuorumNotMet);
        assert_eq!(result.cast, 150.0);
        assert!(!result.passed());
    }

    #[test]
    fn test_passes_with_quorum_and_majority() {
        let result = decide(&tally(150.0, 50.0, 10.0, 0.0), 1000.0, 0.2, 0.334);
        assert!(result.passed());
    }

    #[test]
    fn test_veto_overrides_majority() {
        let result = decide(&tally(200.0, 0.0, 0.0, 110.0), 1000.0, 0.2, 0.334);
        assert_eq!(result.outcome, TallyOutcome::Vetoed);
    }

    #[test]
    fn test_veto_below_threshold_does_not_count_as_no() {
        // 60 / 260 of cast weight is under the veto threshold
        let result = decide(&tally(110.0, 90.0, 0.0, 60.0), 1000.0, 0.2, 0.334);
        assert!(result.passed());
    }

    #[test]
    fn test_tie_does_not_pass() {
        let result = decide(&tally(100.0, 100.0, 0.0, 0.0), 1000.0, 0.2, 0.334);
        assert_eq!(result.outcome, TallyOutcome::ThresholdNotMet);
    }

    #[test]
    fn test_abstain_counts_toward_quorum_only() {
        let result = decide(&tally(10.0, 5.0, 200.0, 0.0), 1000.0, 0.2, 0.334);
        assert!(result.passed());
    }

    #[test]
    fn test_no_votes_never_pass_with_zero_base() {
        let result = decide(&Tally::default(), 0.0, 0.2, 0.334);
        assert_eq!(result.outcome, TallyOutcome::QuorumNotMet);
    }
}
