//! Weighted scoring of evaluations under a named profile.

use crate::core::error::Result;
use crate::core::types::{
    CandidateEvaluation, Confidence, ScoreBreakdown, ScoredCandidate, ScoringProfile,
};

/// Per-metric weights on a 0-100 scale. Each profile sums to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileWeights {
    pub correctness: u8,
    pub safety: u8,
    pub maintainability: u8,
    pub efficiency: u8,
    pub personal_fit: u8,
}

impl ProfileWeights {
    pub fn sum(&self) -> u32 {
        u32::from(self.correctness)
            + u32::from(self.safety)
            + u32::from(self.maintainability)
            + u32::from(self.efficiency)
            + u32::from(self.personal_fit)
    }
}

impl ScoringProfile {
    pub fn weights(self) -> ProfileWeights {
        match self {
            ScoringProfile::Safe => ProfileWeights {
                correctness: 45,
                safety: 30,
                maintainability: 15,
                efficiency: 5,
                personal_fit: 5,
            },
            ScoringProfile::Balanced => ProfileWeights {
                correctness: 40,
                safety: 25,
                maintainability: 20,
                efficiency: 10,
                personal_fit: 5,
            },
            ScoringProfile::Speed => ProfileWeights {
                correctness: 35,
                safety: 20,
                maintainability: 15,
                efficiency: 25,
                personal_fit: 5,
            },
        }
    }
}

const HIGH_CONFIDENCE_TOTAL: f64 = 85.0;
const MEDIUM_CONFIDENCE_TOTAL: f64 = 70.0;

/// Round half away from zero to two decimals.
///
/// The epsilon nudge keeps values like `1.005` from truncating because of
/// their binary representation.
pub fn round2(value: f64) -> f64 {
    ((value + f64::EPSILON) * 100.0).round() / 100.0
}

/// Score one evaluation. Rejects records that fail [`CandidateEvaluation::validate`].
pub fn score_candidate(
    evaluation: CandidateEvaluation,
    profile: ScoringProfile,
) -> Result<ScoredCandidate> {
    evaluation.validate()?;

    let weights = profile.weights();
    let metrics = &evaluation.metrics;
    let correctness = round2(metrics.correctness * f64::from(weights.correctness));
    let safety = round2(metrics.safety * f64::from(weights.safety));
    let maintainability = round2(metrics.maintainability * f64::from(weights.maintainability));
    let efficiency = round2(metrics.efficiency * f64::from(weights.efficiency));
    let personal_fit = round2(metrics.personal_fit * f64::from(weights.personal_fit));
    let total = round2(correctness + safety + maintainability + efficiency + personal_fit);
    let score = ScoreBreakdown {
        correctness,
        safety,
        maintainability,
        efficiency,
        personal_fit,
        total,
    };

    let eligible = evaluation.gates.all_passed();
    let confidence = if eligible {
        derive_confidence(total, &evaluation)
    } else {
        Confidence::Low
    };

    Ok(ScoredCandidate {
        candidate_id: evaluation.candidate_id.clone(),
        strategy: evaluation.strategy.clone(),
        eligible,
        confidence,
        advisory: confidence == Confidence::Low,
        evaluation,
        score,
    })
}

fn derive_confidence(total: f64, evaluation: &CandidateEvaluation) -> Confidence {
    if evaluation.reduced_confidence {
        return Confidence::Low;
    }
    if total >= HIGH_CONFIDENCE_TOTAL && evaluation.risk_flags.is_empty() {
        return Confidence::High;
    }
    if total >= MEDIUM_CONFIDENCE_TOTAL {
        return Confidence::Medium;
    }
    Confidence::Low
}
