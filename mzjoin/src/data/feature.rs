use std::collections::BTreeSet;
use std::fmt;
use std::fmt::{Display, Formatter};
use serde::{Serialize, Deserialize};

use crate::data::isotope::IsotopePattern;
use crate::error::RecordError;

/// Identifier of the analytical run (raw file / sample) a feature was detected in.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    pub fn new(name: impl Into<String>) -> Self {
        RunId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RunId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RunId {
    fn from(name: &str) -> Self {
        RunId(name.to_string())
    }
}

impl From<String> for RunId {
    fn from(name: String) -> Self {
        RunId(name)
    }
}

/// One detected chemical feature from one run.
///
/// # Description
///
/// Produced upstream by feature detection and never modified afterwards. A charge of
/// `0` means the charge state is unknown. `height` is only used to pick the
/// representative member of an aligned row (the tallest feature carries the row's
/// isotope pattern).
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub run: RunId,
    pub mz: f64,
    pub rt: f64,
    #[serde(default)]
    pub charge: i32,
    #[serde(default)]
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isotope_pattern: Option<IsotopePattern>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub identities: BTreeSet<String>,
}

impl FeatureRecord {
    /// Constructs a new `FeatureRecord` with unknown charge and no annotations.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use mzjoin::data::feature::FeatureRecord;
    /// let feature = FeatureRecord::new("run_a", 301.1412, 4.87).with_charge(1);
    /// assert_eq!(feature.run.as_str(), "run_a");
    /// assert_eq!(feature.charge, 1);
    /// assert!(feature.identities.is_empty());
    /// ```
    pub fn new(run: impl Into<RunId>, mz: f64, rt: f64) -> Self {
        FeatureRecord {
            run: run.into(),
            mz,
            rt,
            charge: 0,
            height: 0.0,
            isotope_pattern: None,
            identities: BTreeSet::new(),
        }
    }

    pub fn with_charge(mut self, charge: i32) -> Self {
        self.charge = charge;
        self
    }

    pub fn with_height(mut self, height: f64) -> Self {
        self.height = height;
        self
    }

    pub fn with_isotope_pattern(mut self, pattern: IsotopePattern) -> Self {
        self.isotope_pattern = Some(pattern);
        self
    }

    pub fn with_identity(mut self, label: impl Into<String>) -> Self {
        self.identities.insert(label.into());
        self
    }

    /// Check the numeric fields a feature needs to take part in matching.
    pub fn validate(&self) -> Result<(), RecordError> {
        if !self.mz.is_finite() {
            return Err(RecordError::NonFiniteMz(self.mz));
        }
        if self.mz < 0.0 {
            return Err(RecordError::NegativeMz(self.mz));
        }
        if !self.rt.is_finite() {
            return Err(RecordError::NonFiniteRt(self.rt));
        }
        Ok(())
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
