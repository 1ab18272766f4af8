//! Numeric series and header comments produced by the text readers.
//!
//! `NumericSeries` stores one diffraction or small-angle pattern as parallel
//! columns (x, y, weight) plus the zero-initialised work columns the fitting
//! stage fills in later.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A pattern stored as parallel columns of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NumericSeries {
    /// Abscissa (2θ, Q, ...).
    pub x: Vec<f64>,
    /// Observed intensity.
    pub y: Vec<f64>,
    /// Inverse-variance weight, never negative.
    pub weight: Vec<f64>,
    /// Calculated intensity (zero on import).
    pub calc: Vec<f64>,
    /// Background (zero on import).
    pub background: Vec<f64>,
    /// Observed minus calculated (zero on import).
    pub residual: Vec<f64>,
}

impl NumericSeries {
    /// Creates a new empty series with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            weight: Vec::with_capacity(capacity),
            calc: Vec::with_capacity(capacity),
            background: Vec::with_capacity(capacity),
            residual: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns true if the series holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Pushes one observed point; the work columns get zeros.
    pub fn push(&mut self, x: f64, y: f64, weight: f64) {
        self.x.push(x);
        self.y.push(y);
        self.weight.push(weight);
        self.calc.push(0.0);
        self.background.push(0.0);
        self.residual.push(0.0);
    }

    /// Multiplies every abscissa by `factor`.
    pub fn scale_x(&mut self, factor: f64) {
        for x in &mut self.x {
            *x *= factor;
        }
    }
}

/// A header line kept verbatim for later metadata extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Comment(String);

impl Comment {
    /// Wraps a header line.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Returns the full line.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Text left of the first `=`, or the whole line.
    #[must_use]
    pub fn key(&self) -> &str {
        self.0.split('=').next().unwrap_or("")
    }

    /// Text between the first and second `=`, if any.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.0.split('=').nth(1)
    }

    /// Parses [`Comment::value`] as a float.
    #[must_use]
    pub fn float_value(&self) -> Option<f64> {
        self.value().and_then(|v| v.trim().parse().ok())
    }
}

impl std::fmt::Display for Comment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scans comments for a `Temp` key; the last parseable match wins.
#[must_use]
pub fn temperature_from_comments(comments: &[Comment], default: f64) -> f64 {
    comments
        .iter()
        .filter(|c| c.key().contains("Temp"))
        .filter_map(Comment::float_value)
        .last()
        .unwrap_or(default)
}

/// Instrument type tag attached to imported small-angle data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InstrumentKind {
    /// Laboratory X-ray, constant wavelength (`LXC`).
    XrayCw,
    /// Neutron, constant wavelength (`LNC`).
    NeutronCw,
}

impl InstrumentKind {
    /// The short code used in instrument parameter files.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::XrayCw => "LXC",
            Self::NeutronCw => "LNC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_push_keeps_columns_aligned() {
        let mut series = NumericSeries::with_capacity(2);
        assert!(series.is_empty());

        series.push(1.0, 10.0, 0.1);
        series.push(2.0, 20.0, 0.05);

        assert_eq!(series.len(), 2);
        assert_eq!(series.calc, vec![0.0, 0.0]);
        assert_eq!(series.background.len(), 2);
        assert_eq!(series.residual.len(), 2);
    }

    #[test]
    fn test_scale_x() {
        let mut series = NumericSeries::default();
        series.push(20.0, 1.0, 1.0);
        series.scale_x(0.1);
        assert!((series.x[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_comment_key_value() {
        let c = Comment::new("Temperature=295.5");
        assert_eq!(c.key(), "Temperature");
        assert_eq!(c.value(), Some("295.5"));
        assert_eq!(c.float_value(), Some(295.5));

        let free = Comment::new("no separator here");
        assert_eq!(free.key(), "no separator here");
        assert_eq!(free.value(), None);
    }

    #[test]
    fn test_temperature_last_match_wins() {
        let comments = vec![
            Comment::new("Temp=250"),
            Comment::new("Temp=bogus"),
            Comment::new("SampleTemp=310"),
            Comment::new("Pressure=1"),
        ];
        assert_eq!(temperature_from_comments(&comments, 300.0), 310.0);
        assert_eq!(temperature_from_comments(&[], 300.0), 300.0);
    }

    #[test]
    fn test_temperature_unparseable_keeps_default() {
        let comments = vec![Comment::new("Temp=n/a")];
        assert_eq!(temperature_from_comments(&comments, 300.0), 300.0);
    }
}
