use crate::data::isotope::IsotopePattern;
use crate::scoring::params::IsotopeComparisonParameters;
use crate::tolerance::ToleranceWindow;

/// Shape similarity of two isotope patterns, in `[0, 1]`.
///
/// Implementations must be deterministic; the scorer calls them from several threads.
pub trait PatternSimilarity: Send + Sync {
    fn similarity(&self, a: &IsotopePattern, b: &IsotopePattern) -> f64;
}

impl<F> PatternSimilarity for F
where
    F: Fn(&IsotopePattern, &IsotopePattern) -> f64 + Send + Sync,
{
    fn similarity(&self, a: &IsotopePattern, b: &IsotopePattern) -> f64 {
        self(a, b)
    }
}

/// Default isotope pattern score.
///
/// Both patterns are normalized to their tallest peak, neighbouring peaks are merged,
/// and peaks under the noise level are dropped. Every peak position of the union then
/// contributes a factor `1 - |i_a - i_b|`, a peak missing on one side counting as
/// intensity 0. The product is the score.
#[derive(Clone, Debug, PartialEq)]
pub struct IsotopePatternScore {
    pub mz_tolerance: ToleranceWindow,
    pub noise_level: f64,
}

impl IsotopePatternScore {
    pub fn new(mz_tolerance: ToleranceWindow, noise_level: f64) -> Self {
        IsotopePatternScore { mz_tolerance, noise_level }
    }

    fn prepare(&self, pattern: &IsotopePattern) -> IsotopePattern {
        pattern
            .normalized()
            .merged(&self.mz_tolerance)
            .normalized()
            .above(self.noise_level)
    }

    fn nearest_intensity(&self, pattern: &IsotopePattern, mz: f64) -> f64 {
        pattern
            .peaks()
            .filter(|(m, _)| self.mz_tolerance.accepts(mz, *m))
            .min_by(|a, b| (a.0 - mz).abs().total_cmp(&(b.0 - mz).abs()))
            .map(|(_, i)| i)
            .unwrap_or(0.0)
    }
}

impl From<&IsotopeComparisonParameters> for IsotopePatternScore {
    fn from(params: &IsotopeComparisonParameters) -> Self {
        IsotopePatternScore::new(params.mz_tolerance, params.noise_level)
    }
}

impl PatternSimilarity for IsotopePatternScore {
    fn similarity(&self, a: &IsotopePattern, b: &IsotopePattern) -> f64 {
        let a = self.prepare(a);
        let b = self.prepare(b);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let union = IsotopePattern::new(
            a.mz.iter().chain(b.mz.iter()).copied().collect(),
            a.intensity.iter().chain(b.intensity.iter()).copied().collect(),
        )
        .merged(&self.mz_tolerance);

        let score = union.mz.iter().fold(1.0, |acc, &mz| {
            let diff = (self.nearest_intensity(&a, mz) - self.nearest_intensity(&b, mz)).abs();
            acc * (1.0 - diff)
        });

        score.clamp(0.0, 1.0)
    }
}
