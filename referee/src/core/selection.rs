//! Winner selection over a full tournament round.

use serde::{Deserialize, Serialize};

use crate::core::ranking::rank_candidates;
use crate::core::scoring::round2;
use crate::core::types::{Confidence, ScoredCandidate, SelectionOutcome, WinnerSelection};

/// Closeness thresholds and the auto-accept switch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SelectionOptions {
    /// Deltas at or below this note that tie-breakers decided the winner.
    pub tie_delta: f64,
    /// Deltas at or below this require manual review unless auto-accepting.
    pub review_delta: f64,
    pub auto_accept: bool,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            tie_delta: 2.0,
            review_delta: 3.0,
            auto_accept: false,
        }
    }
}

/// One entry of the selection reason trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionNote {
    TopEligible,
    TieBreakersApplied,
    ManualReview,
    LowConfidence,
    AllFailedGates,
}

impl SelectionNote {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionNote::TopEligible => "top eligible candidate by weighted score",
            SelectionNote::TieBreakersApplied => {
                "tie-breakers applied (correctness, safety, blast radius, runtime)"
            }
            SelectionNote::ManualReview => {
                "manual review required because top candidates are close"
            }
            SelectionNote::LowConfidence => "winner confidence is low; recommendation is advisory",
            SelectionNote::AllFailedGates => "all candidates failed hard gates",
        }
    }
}

fn join_notes(notes: &[SelectionNote]) -> String {
    notes
        .iter()
        .map(|note| note.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Decide the round. Never fails; "no safe winner" is an ordinary outcome.
pub fn select_winner(candidates: &[ScoredCandidate], options: &SelectionOptions) -> WinnerSelection {
    // Filtering a total order keeps it ranked, so one sort serves both paths.
    let full_ranking = rank_candidates(candidates);
    let ranked: Vec<&ScoredCandidate> = full_ranking
        .iter()
        .copied()
        .filter(|candidate| candidate.eligible)
        .collect();

    let Some(winner) = ranked.first() else {
        let salvage = full_ranking
            .first()
            .map(|candidate| candidate.candidate_id.clone());
        return WinnerSelection {
            outcome: SelectionOutcome::NoSafeWinner {
                salvage_candidate_id: salvage,
            },
            selection_reason: join_notes(&[SelectionNote::AllFailedGates]),
            manual_review_required: true,
            advisory: true,
        };
    };

    let runner_up = ranked.get(1);
    let runner_up_delta = runner_up.map(|other| round2(winner.score.total - other.score.total));

    let close_call = |threshold: f64| runner_up_delta.is_some_and(|delta| delta <= threshold);
    let tie_breakers = close_call(options.tie_delta);
    let manual_review_required = !options.auto_accept && close_call(options.review_delta);
    let advisory = winner.confidence == Confidence::Low;

    let notes: Vec<SelectionNote> = [
        Some(SelectionNote::TopEligible),
        tie_breakers.then_some(SelectionNote::TieBreakersApplied),
        manual_review_required.then_some(SelectionNote::ManualReview),
        advisory.then_some(SelectionNote::LowConfidence),
    ]
    .into_iter()
    .flatten()
    .collect();

    WinnerSelection {
        outcome: SelectionOutcome::Winner {
            winner_candidate_id: winner.candidate_id.clone(),
            winner_strategy: winner.strategy.clone(),
            winner_score: winner.score.total,
            winner_confidence: winner.confidence,
            runner_up_candidate_id: runner_up.map(|other| other.candidate_id.clone()),
            runner_up_delta,
        },
        selection_reason: join_notes(&notes),
        manual_review_required,
        advisory,
    }
}
