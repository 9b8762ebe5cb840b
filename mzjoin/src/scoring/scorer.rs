use std::fmt;
use std::sync::Arc;

use crate::data::feature::FeatureRecord;
use crate::data::row::AlignedRow;
use crate::data::table::MasterTable;
use crate::error::AlignmentError;
use crate::scoring::isotope::{IsotopePatternScore, PatternSimilarity};
use crate::scoring::params::JoinParameters;
use crate::tolerance::ToleranceWindow;

/// Hard rule a (row, feature) pair must satisfy before it is scored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchConstraint {
    /// Reject when both charges are known and differ.
    SameCharge,
    /// Reject when both sides carry identities and share none. Unknown never blocks.
    SameIdentity,
}

impl MatchConstraint {
    pub fn permits(&self, row: &AlignedRow, record: &FeatureRecord) -> bool {
        match self {
            MatchConstraint::SameCharge => {
                row.charge() == 0 || record.charge == 0 || row.charge() == record.charge
            }
            MatchConstraint::SameIdentity => {
                row.identities().is_empty()
                    || record.identities.is_empty()
                    || !row.identities().is_disjoint(&record.identities)
            }
        }
    }
}

/// Optional isotope-pattern term of the match score.
#[derive(Clone)]
pub enum PatternComparison {
    None,
    Weighted {
        weight: f64,
        /// Below this similarity a pair with two known patterns is not admissible; 0 disables.
        min_score: f64,
        similarity: Arc<dyn PatternSimilarity>,
    },
}

impl fmt::Debug for PatternComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternComparison::None => write!(f, "None"),
            PatternComparison::Weighted { weight, min_score, .. } => f
                .debug_struct("Weighted")
                .field("weight", weight)
                .field("min_score", min_score)
                .finish_non_exhaustive(),
        }
    }
}

/// Score of an admissible pair, with the raw differences used for tie-breaking.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchScore {
    pub score: f64,
    pub mz_diff: f64,
    pub rt_diff: f64,
    pub pattern_score: Option<f64>,
}

/// Scores (row, feature) pairs.
///
/// Pure and deterministic: the same inputs always produce the same result, which
/// lets candidate generation run on any number of threads.
#[derive(Clone, Debug)]
pub struct Scorer {
    mz_tolerance: ToleranceWindow,
    mz_weight: f64,
    rt_tolerance: ToleranceWindow,
    rt_weight: f64,
    constraints: Vec<MatchConstraint>,
    pattern: PatternComparison,
}

impl Scorer {
    /// Build a scorer from validated parameters.
    pub fn new(params: &JoinParameters) -> Result<Self, AlignmentError> {
        params.validate()?;

        let mut constraints = Vec::new();
        if params.require_same_charge {
            constraints.push(MatchConstraint::SameCharge);
        }
        if params.require_same_identity {
            constraints.push(MatchConstraint::SameIdentity);
        }

        let pattern = match &params.isotope {
            Some(iso) => PatternComparison::Weighted {
                weight: iso.weight,
                min_score: iso.min_score,
                similarity: Arc::new(IsotopePatternScore::from(iso)),
            },
            None => PatternComparison::None,
        };

        Ok(Scorer {
            mz_tolerance: params.mz_tolerance,
            mz_weight: params.mz_weight,
            rt_tolerance: params.rt_tolerance,
            rt_weight: params.rt_weight,
            constraints,
            pattern,
        })
    }

    /// Replace the isotope similarity function, enabling the pattern term if needed.
    pub fn with_pattern_similarity(
        mut self,
        weight: f64,
        similarity: impl PatternSimilarity + 'static,
    ) -> Result<Self, AlignmentError> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(AlignmentError::configuration(format!(
                "isotope weight must be finite and >= 0, got {weight}"
            )));
        }
        let min_score = match &self.pattern {
            PatternComparison::Weighted { min_score, .. } => *min_score,
            PatternComparison::None => 0.0,
        };
        self.pattern = PatternComparison::Weighted {
            weight,
            min_score,
            similarity: Arc::new(similarity),
        };
        Ok(self)
    }

    pub fn constraints(&self) -> &[MatchConstraint] {
        &self.constraints
    }

    pub fn pattern_comparison(&self) -> &PatternComparison {
        &self.pattern
    }

    pub fn mz_tolerance(&self) -> &ToleranceWindow {
        &self.mz_tolerance
    }

    pub fn rt_tolerance(&self) -> &ToleranceWindow {
        &self.rt_tolerance
    }

    /// Score `record` against `row`, `None` when the pair is not admissible.
    ///
    /// `table` is the master table owning `row`; it is only read to look up the row's
    /// representative isotope pattern.
    pub fn score(&self, row: &AlignedRow, table: &MasterTable, record: &FeatureRecord) -> Option<MatchScore> {
        if !record.is_valid() || !row.avg_mz().is_finite() || !row.avg_rt().is_finite() {
            return None;
        }
        if row.contains_run(&record.run) {
            return None;
        }
        if !self.constraints.iter().all(|c| c.permits(row, record)) {
            return None;
        }
        if !self.mz_tolerance.accepts(row.avg_mz(), record.mz)
            || !self.rt_tolerance.accepts(row.avg_rt(), record.rt)
        {
            return None;
        }

        let mut score = self.mz_weight * self.mz_tolerance.closeness(row.avg_mz(), record.mz)
            + self.rt_weight * self.rt_tolerance.closeness(row.avg_rt(), record.rt);

        let mut pattern_score = None;
        if let PatternComparison::Weighted { weight, min_score, similarity } = &self.pattern {
            if let (Some(a), Some(b)) = (table.representative_pattern(row), record.isotope_pattern.as_ref()) {
                let s = similarity.similarity(a, b);
                let s = if s.is_finite() { s.clamp(0.0, 1.0) } else { 0.0 };
                if *min_score > 0.0 && s < *min_score {
                    return None;
                }
                score += weight * s;
                pattern_score = Some(s);
            }
        }

        Some(MatchScore {
            score,
            mz_diff: (row.avg_mz() - record.mz).abs(),
            rt_diff: (row.avg_rt() - record.rt).abs(),
            pattern_score,
        })
    }
}
