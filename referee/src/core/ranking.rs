//! Deterministic total order over scored candidates.

use std::cmp::Ordering;

use crate::core::types::ScoredCandidate;

/// Compare two candidates, best first.
///
/// Chain: total, correctness, safety (all descending), then files changed,
/// runtime, candidate id (all ascending). The id makes the order strict.
pub fn compare_candidates(left: &ScoredCandidate, right: &ScoredCandidate) -> Ordering {
    right
        .score
        .total
        .total_cmp(&left.score.total)
        .then_with(|| right.score.correctness.total_cmp(&left.score.correctness))
        .then_with(|| right.score.safety.total_cmp(&left.score.safety))
        .then_with(|| {
            left.evaluation
                .diff_stats
                .files_changed
                .cmp(&right.evaluation.diff_stats.files_changed)
        })
        .then_with(|| left.evaluation.runtime_ms.cmp(&right.evaluation.runtime_ms))
        .then_with(|| left.candidate_id.cmp(&right.candidate_id))
}

/// Rank candidates without touching the input slice.
pub fn rank_candidates(candidates: &[ScoredCandidate]) -> Vec<&ScoredCandidate> {
    let mut ranked: Vec<&ScoredCandidate> = candidates.iter().collect();
    ranked.sort_by(|left, right| compare_candidates(left, right));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::scored;

    fn ids(ranked: &[&ScoredCandidate]) -> Vec<String> {
        ranked
            .iter()
            .map(|candidate| candidate.candidate_id.clone())
            .collect()
    }

    #[test]
    fn empty_set_ranks_to_empty() {
        assert!(rank_candidates(&[]).is_empty());
    }

    #[test]
    fn higher_total_ranks_first() {
        let candidates = vec![scored("a", 80.0), scored("b", 91.5), scored("c", 85.0)];
        assert_eq!(ids(&rank_candidates(&candidates)), vec!["b", "c", "a"]);
        assert_eq!(candidates[0].candidate_id, "a");
    }

    #[test]
    fn correctness_then_safety_break_total_ties() {
        let mut first = scored("first", 80.0);
        let mut second = scored("second", 80.0);
        let mut third = scored("third", 80.0);
        first.score.correctness = 30.0;
        second.score.correctness = 32.0;
        third.score.correctness = 30.0;
        first.score.safety = 20.0;
        third.score.safety = 22.0;

        let candidates = vec![first, second, third];
        assert_eq!(
            ids(&rank_candidates(&candidates)),
            vec!["second", "third", "first"]
        );
    }

    #[test]
    fn smaller_diff_then_faster_runtime_break_remaining_ties() {
        let mut wide = scored("wide", 80.0);
        let mut slow = scored("slow", 80.0);
        let mut fast = scored("fast", 80.0);
        wide.evaluation.diff_stats.files_changed = 9;
        slow.evaluation.diff_stats.files_changed = 3;
        fast.evaluation.diff_stats.files_changed = 3;
        slow.evaluation.runtime_ms = 9_000;
        fast.evaluation.runtime_ms = 1_000;

        let candidates = vec![wide, slow, fast];
        assert_eq!(
            ids(&rank_candidates(&candidates)),
            vec!["fast", "slow", "wide"]
        );
    }

    #[test]
    fn identical_candidates_fall_back_to_id() {
        let candidates = vec![scored("speed-03", 70.0), scored("safe-01", 70.0)];
        assert_eq!(
            ids(&rank_candidates(&candidates)),
            vec!["safe-01", "speed-03"]
        );
        assert_eq!(
            compare_candidates(&candidates[0], &candidates[0]),
            Ordering::Equal
        );
    }
}
