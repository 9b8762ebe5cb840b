//! Alignment parameters.
//!
//! A flat, serde-friendly record of everything the join aligner can be configured
//! with. Validation happens once, before the first merge pass.

use serde::{Deserialize, Serialize};

use crate::error::AlignmentError;
use crate::tolerance::{deserialize_rt_window, ToleranceWindow};

/// Settings for the optional isotope-pattern comparison.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsotopeComparisonParameters {
    /// Weight of the pattern similarity (0-1) in the match score.
    pub weight: f64,
    /// Tolerance used to pair peaks of the two patterns.
    pub mz_tolerance: ToleranceWindow,
    /// Relative intensity (tallest peak = 1) below which peaks are ignored.
    pub noise_level: f64,
    /// Pairs whose patterns are both known but less similar than this are not aligned.
    /// 0 disables the gate.
    pub min_score: f64,
}

impl Default for IsotopeComparisonParameters {
    fn default() -> Self {
        Self {
            weight: 1.0,
            mz_tolerance: ToleranceWindow::mz(0.001, 5.0),
            noise_level: 0.01,
            min_score: 0.0,
        }
    }
}

impl IsotopeComparisonParameters {
    pub fn validate(&self) -> Result<(), AlignmentError> {
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(AlignmentError::configuration(format!(
                "isotope weight must be finite and >= 0, got {}",
                self.weight
            )));
        }
        self.mz_tolerance.validate("isotope m/z tolerance")?;
        if !(0.0..1.0).contains(&self.noise_level) {
            return Err(AlignmentError::configuration(format!(
                "isotope noise level must be in [0, 1), got {}",
                self.noise_level
            )));
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(AlignmentError::configuration(format!(
                "isotope minimum score must be in [0, 1], got {}",
                self.min_score
            )));
        }
        Ok(())
    }
}

/// Configuration of the join aligner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinParameters {
    /// Name of the aligned feature list.
    pub name: String,
    pub mz_tolerance: ToleranceWindow,
    /// Score for perfectly matching m/z values.
    pub mz_weight: f64,
    #[serde(deserialize_with = "deserialize_rt_window")]
    pub rt_tolerance: ToleranceWindow,
    /// Score for perfectly matching retention times.
    pub rt_weight: f64,
    /// Only align features with the same (known) charge state.
    pub require_same_charge: bool,
    /// Only align features with a shared identity, or without any identity.
    pub require_same_identity: bool,
    /// Add an isotope-pattern similarity term when both sides carry a pattern.
    pub isotope: Option<IsotopeComparisonParameters>,
    /// Seed the master table with the largest input table instead of the first one.
    pub seed_with_largest: bool,
}

impl Default for JoinParameters {
    fn default() -> Self {
        Self {
            name: "Aligned feature list".to_string(),
            mz_tolerance: ToleranceWindow::mz(0.001, 5.0),
            mz_weight: 1.0,
            rt_tolerance: ToleranceWindow::rt(0.1, 0.0),
            rt_weight: 1.0,
            require_same_charge: false,
            require_same_identity: false,
            isotope: None,
            seed_with_largest: false,
        }
    }
}

impl JoinParameters {
    pub fn validate(&self) -> Result<(), AlignmentError> {
        self.mz_tolerance.validate("m/z tolerance")?;
        self.rt_tolerance.validate("RT tolerance")?;

        for (name, w) in [("m/z weight", self.mz_weight), ("RT weight", self.rt_weight)] {
            if !w.is_finite() || w < 0.0 {
                return Err(AlignmentError::configuration(format!(
                    "{name} must be finite and >= 0, got {w}"
                )));
            }
        }
        if self.mz_weight == 0.0 && self.rt_weight == 0.0 {
            return Err(AlignmentError::configuration(
                "m/z weight and RT weight are both zero, every candidate pair would tie",
            ));
        }

        if let Some(isotope) = &self.isotope {
            isotope.validate()?;
        }
        Ok(())
    }
}
