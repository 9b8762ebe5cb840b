use std::fmt;
use std::fmt::{Display, Formatter};
use serde::{Serialize, Deserialize, Deserializer};

use crate::error::AlignmentError;

/// How the relative part of a tolerance window is scaled.
///
/// # Description
///
/// `Ppm` is used for m/z: the relative term is read as parts-per-million of the
/// larger of the two compared values. `Fraction` is used for retention time: the
/// relative term is a plain fraction of the reference (first) value.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RelativeScale {
    #[default]
    Ppm,
    Fraction,
}

impl Display for RelativeScale {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RelativeScale::Ppm => write!(f, "ppm"),
            RelativeScale::Fraction => write!(f, "fraction"),
        }
    }
}

/// An absolute + relative acceptance window for one numeric dimension.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToleranceWindow {
    pub absolute: f64,
    #[serde(default)]
    pub relative: f64,
    #[serde(default)]
    pub scale: RelativeScale,
}

impl ToleranceWindow {
    pub fn new(absolute: f64, relative: f64, scale: RelativeScale) -> Self {
        ToleranceWindow { absolute, relative, scale }
    }

    /// m/z window: `absolute` in Da (or Th), `ppm` in parts-per-million.
    ///
    /// # Examples
    ///
    /// ```
    /// use mzjoin::tolerance::ToleranceWindow;
    ///
    /// let tol = ToleranceWindow::mz(0.0, 10.0);
    /// // 10 ppm of 500.0 is 0.005
    /// assert!(tol.accepts(500.0, 500.004));
    /// assert!(!tol.accepts(500.0, 500.006));
    /// ```
    pub fn mz(absolute: f64, ppm: f64) -> Self {
        Self::new(absolute, ppm, RelativeScale::Ppm)
    }

    /// Retention-time window: `absolute` in the unit of the data, `fraction` of the reference RT.
    ///
    /// # Examples
    ///
    /// ```
    /// use mzjoin::tolerance::ToleranceWindow;
    ///
    /// let tol = ToleranceWindow::rt(0.05, 0.0);
    /// assert_eq!(tol.closeness(5.0, 5.0), 1.0);
    /// assert!((tol.closeness(5.0, 5.025) - 0.5).abs() < 1e-9);
    /// assert_eq!(tol.closeness(5.0, 5.1), 0.0);
    /// ```
    pub fn rt(absolute: f64, fraction: f64) -> Self {
        Self::new(absolute, fraction, RelativeScale::Fraction)
    }

    /// Check that both components are finite and not negative.
    ///
    /// A zero-width window is valid and accepts exact equality only.
    pub fn validate(&self, name: &str) -> Result<(), AlignmentError> {
        if !self.absolute.is_finite() || self.absolute < 0.0 {
            return Err(AlignmentError::configuration(format!(
                "{name}: absolute tolerance must be finite and >= 0, got {}",
                self.absolute
            )));
        }
        if !self.relative.is_finite() || self.relative < 0.0 {
            return Err(AlignmentError::configuration(format!(
                "{name}: relative tolerance must be finite and >= 0, got {}",
                self.relative
            )));
        }
        Ok(())
    }

    #[inline]
    fn reference_scale(&self, a: f64, b: f64) -> f64 {
        match self.scale {
            RelativeScale::Ppm => a.abs().max(b.abs()) * 1e-6,
            RelativeScale::Fraction => a.abs(),
        }
    }

    /// Half-width of the window when comparing `a` (reference) against `b`.
    #[inline]
    pub fn width(&self, a: f64, b: f64) -> f64 {
        let reference = self.reference_scale(a, b);
        // zero or broken reference falls back to the absolute term
        let relative = if reference > 0.0 && reference.is_finite() {
            self.relative * reference
        } else {
            0.0
        };
        self.absolute + relative
    }

    /// `|a - b| <= absolute + relative * reference`; non-finite values never pass.
    #[inline]
    pub fn accepts(&self, a: f64, b: f64) -> bool {
        if !a.is_finite() || !b.is_finite() {
            return false;
        }
        (a - b).abs() <= self.width(a, b)
    }

    /// Linear closeness in `[0, 1]`: 1 at equality, 0 at and beyond the window edge.
    #[inline]
    pub fn closeness(&self, a: f64, b: f64) -> f64 {
        if !a.is_finite() || !b.is_finite() {
            return 0.0;
        }
        if a == b {
            return 1.0;
        }
        let w = self.width(a, b);
        let d = (a - b).abs();
        if w <= 0.0 || d > w {
            return 0.0;
        }
        (1.0 - d / w).clamp(0.0, 1.0)
    }

    /// Conservative range of values `b` that `accepts(x, b)` or `accepts(b, x)` may hold for.
    ///
    /// Used to prune candidate scans; the exact test is still `accepts`.
    pub fn bounds(&self, x: f64) -> (f64, f64) {
        if !x.is_finite() {
            return (f64::NAN, f64::NAN);
        }
        let r = match self.scale {
            RelativeScale::Ppm => self.relative * 1e-6,
            RelativeScale::Fraction => self.relative,
        };
        if r >= 1.0 {
            return (f64::NEG_INFINITY, f64::INFINITY);
        }
        // |x - b| <= abs + r * (|x| + |x - b|), whichever side is the reference
        let w = (self.absolute + r * x.abs()) / (1.0 - r);
        let slack = 1e-9 * (1.0 + x.abs());
        (x - w - slack, x + w + slack)
    }
}

/// Deserialize a window whose scale defaults to [`RelativeScale::Fraction`] when omitted.
pub fn deserialize_rt_window<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ToleranceWindow, D::Error> {
    #[derive(Deserialize)]
    struct RtWindow {
        absolute: f64,
        #[serde(default)]
        relative: f64,
        scale: Option<RelativeScale>,
    }

    let raw = RtWindow::deserialize(deserializer)?;
    Ok(ToleranceWindow::new(
        raw.absolute,
        raw.relative,
        raw.scale.unwrap_or(RelativeScale::Fraction),
    ))
}

impl Display for ToleranceWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "±({} + {} {})", self.absolute, self.relative, self.scale)
    }
}
