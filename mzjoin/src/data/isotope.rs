use itertools::Itertools;
use serde::{Serialize, Deserialize};

use crate::tolerance::ToleranceWindow;

/// Centroided isotope envelope of a feature: m/z values with their intensities.
///
/// Peaks are kept sorted by m/z. Pairs with a non-finite m/z or intensity are dropped
/// on construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IsotopePattern {
    pub mz: Vec<f64>,
    pub intensity: Vec<f64>,
}

impl IsotopePattern {
    /// Constructs a new `IsotopePattern`, sorting peaks by m/z.
    ///
    /// # Arguments
    ///
    /// * `mz` - A vector of m/z values.
    /// * `intensity` - A vector of intensity values corresponding to the m/z values.
    ///
    /// Extra values of the longer vector are ignored.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use mzjoin::data::isotope::IsotopePattern;
    /// let pattern = IsotopePattern::new(vec![501.0, 500.0], vec![40.0, 100.0]);
    /// assert_eq!(pattern.mz, vec![500.0, 501.0]);
    /// assert_eq!(pattern.intensity, vec![100.0, 40.0]);
    /// ```
    pub fn new(mz: Vec<f64>, intensity: Vec<f64>) -> Self {
        let (mz, intensity): (Vec<f64>, Vec<f64>) = mz
            .into_iter()
            .zip(intensity)
            .filter(|(m, i)| m.is_finite() && i.is_finite())
            .sorted_by(|a, b| a.0.total_cmp(&b.0))
            .unzip();
        IsotopePattern { mz, intensity }
    }

    pub fn len(&self) -> usize {
        self.mz.len().min(self.intensity.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn peaks(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.mz.iter().copied().zip(self.intensity.iter().copied())
    }

    pub fn max_intensity(&self) -> f64 {
        self.intensity.iter().copied().fold(0.0, f64::max)
    }

    /// Scale intensities so that the tallest peak is 1.0.
    pub fn normalized(&self) -> IsotopePattern {
        let max = self.max_intensity();
        if max <= 0.0 {
            return self.clone();
        }
        IsotopePattern {
            mz: self.mz.clone(),
            intensity: self.intensity.iter().map(|i| i / max).collect(),
        }
    }

    /// Combine neighbouring peaks that fall within `tolerance` of each other.
    ///
    /// Intensities are summed, the m/z of a merged peak is the intensity-weighted mean.
    pub fn merged(&self, tolerance: &ToleranceWindow) -> IsotopePattern {
        let mut mz: Vec<f64> = Vec::with_capacity(self.len());
        let mut intensity: Vec<f64> = Vec::with_capacity(self.len());

        for (m, i) in self.peaks() {
            match (mz.last_mut(), intensity.last_mut()) {
                (Some(last_mz), Some(last_i)) if tolerance.accepts(*last_mz, m) => {
                    let total = *last_i + i;
                    if total > 0.0 {
                        *last_mz = (*last_mz * *last_i + m * i) / total;
                    }
                    *last_i = total;
                }
                _ => {
                    mz.push(m);
                    intensity.push(i);
                }
            }
        }

        IsotopePattern { mz, intensity }
    }

    /// Drop all peaks with an intensity below `level`.
    pub fn above(&self, level: f64) -> IsotopePattern {
        let (mz, intensity) = self.peaks().filter(|(_, i)| *i >= level).unzip();
        IsotopePattern { mz, intensity }
    }
}
