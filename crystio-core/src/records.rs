//! Line-oriented numeric record parsing.
//!
//! Every text importer reduces to the same loop: split a line into tokens,
//! read `x`, `y` and an optional absolute uncertainty, and derive an
//! inverse-variance weight. The formats differ in small but significant
//! ways (delimiters, unit conversion, what to do with non-positive
//! intensities, whether a bad line stops the read), so each variant carries
//! its own [`RecordPolicy`] rather than sharing one rule.

use crate::series::{temperature_from_comments, Comment, InstrumentKind, NumericSeries};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cu Kα wavelength used when a file does not state one.
pub const DEFAULT_WAVELENGTH: f64 = 1.5428;
/// Sample temperature (K) used when no `Temp` comment parses.
pub const DEFAULT_TEMPERATURE: f64 = 300.0;
/// Any Q above this (in Å⁻¹) means the file was really in nm⁻¹.
pub const NM_DETECTION_THRESHOLD: f64 = 2.0;

/// How a line is split into tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiters {
    /// Whitespace only.
    Whitespace,
    /// Commas and semicolons count as whitespace.
    Flexible,
}

impl Delimiters {
    /// Splits a line into tokens.
    #[must_use]
    pub fn tokenize(self, line: &str) -> Vec<&str> {
        match self {
            Self::Whitespace => line.split_whitespace().collect(),
            Self::Flexible => line
                .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

/// Treatment of a point whose intensity is zero or negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroIntensity {
    /// Discard the point.
    Drop,
    /// Keep it with `y = 0, weight = 0`.
    ZeroWeight,
    /// Keep it with `y = 0, weight = 1`.
    UnitWeight,
}

/// Conversion applied to the abscissa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisUnits {
    /// Already in the target unit.
    Native,
    /// Q in nm⁻¹, divided by 10 on read.
    Nanometre,
    /// Rescale the whole series by 1/10 if any Q exceeds
    /// [`NM_DETECTION_THRESHOLD`].
    AutoDetect,
}

/// Which column, if any, carries the uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigmaColumn {
    /// Column 3 whenever more than two columns are present; every token
    /// must be numeric.
    Trailing,
    /// Column 3 only when exactly three columns are present; tokens past
    /// the third are ignored.
    ExactlyThird,
}

/// What happens after a data line fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadLine {
    /// Report it and continue with the next line.
    Skip,
    /// Report it and stop reading; points gathered so far are kept.
    Abort,
}

/// Complete parsing policy for one text format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordPolicy {
    pub delimiters: Delimiters,
    pub zero_intensity: ZeroIntensity,
    pub units: AxisUnits,
    pub sigma: SigmaColumn,
    pub bad_line: BadLine,
    /// Collect `key=value` header lines and skip blank lines.
    pub comments: bool,
    /// Lines with fewer than two tokens are reported rather than ignored.
    pub report_short_lines: bool,
    /// Leading lines whose parse failures are tolerated as header text.
    pub header_lines: usize,
}

/// The numeric text formats understood by the record parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RecordFormat {
    /// Comma/semicolon/whitespace separated powder data.
    Csv,
    /// X-ray small-angle Q (Å⁻¹), I, E.
    XrayQ,
    /// X-ray small-angle Q (nm⁻¹), I, E.
    XrayQNm,
    /// Neutron CW small-angle Q (Å⁻¹, nm⁻¹ auto-detected), I, E.
    NeutronQ,
    /// Neutron CW small-angle Q (nm⁻¹), I, E.
    NeutronQNm,
}

impl RecordFormat {
    /// All record formats.
    pub const ALL: [Self; 5] = [
        Self::Csv,
        Self::XrayQ,
        Self::XrayQNm,
        Self::NeutronQ,
        Self::NeutronQNm,
    ];

    /// Parsing policy for this format.
    #[must_use]
    pub fn policy(self) -> RecordPolicy {
        let q_step = RecordPolicy {
            delimiters: Delimiters::Whitespace,
            zero_intensity: ZeroIntensity::Drop,
            units: AxisUnits::Native,
            sigma: SigmaColumn::Trailing,
            bad_line: BadLine::Skip,
            comments: true,
            report_short_lines: false,
            header_lines: 0,
        };
        match self {
            Self::Csv => RecordPolicy {
                delimiters: Delimiters::Flexible,
                zero_intensity: ZeroIntensity::ZeroWeight,
                units: AxisUnits::Native,
                sigma: SigmaColumn::ExactlyThird,
                bad_line: BadLine::Abort,
                comments: false,
                report_short_lines: true,
                header_lines: 1,
            },
            Self::XrayQ => q_step,
            Self::XrayQNm => RecordPolicy {
                units: AxisUnits::Nanometre,
                ..q_step
            },
            Self::NeutronQ => RecordPolicy {
                zero_intensity: ZeroIntensity::UnitWeight,
                units: AxisUnits::AutoDetect,
                ..q_step
            },
            Self::NeutronQNm => RecordPolicy {
                zero_intensity: ZeroIntensity::UnitWeight,
                units: AxisUnits::Nanometre,
                ..q_step
            },
        }
    }

    /// Instrument type for small-angle formats.
    #[must_use]
    pub fn instrument(self) -> Option<InstrumentKind> {
        match self {
            Self::Csv => None,
            Self::XrayQ | Self::XrayQNm => Some(InstrumentKind::XrayCw),
            Self::NeutronQ | Self::NeutronQNm => Some(InstrumentKind::NeutronCw),
        }
    }

    /// Parses `text` with this format's policy.
    #[must_use]
    pub fn parse(self, text: &str, defaults: &RecordDefaults) -> ParsedRecords {
        if self.policy().comments {
            log::info!("Read a q-step text file");
        }
        let mut parsed = parse_records(text, &self.policy(), defaults);
        parsed.instrument = self.instrument();
        parsed
    }
}

/// Fallback values applied before header comments are scanned.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RecordDefaults {
    pub wavelength: f64,
    pub temperature: f64,
}

impl Default for RecordDefaults {
    fn default() -> Self {
        Self {
            wavelength: DEFAULT_WAVELENGTH,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// A data line that could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    /// 1-based line number.
    pub line: usize,
    /// The offending line.
    pub text: String,
}

/// Result of parsing one text file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecords {
    pub series: NumericSeries,
    pub comments: Vec<Comment>,
    /// Instrument wavelength; `None` for formats without header comments.
    pub wavelength: Option<f64>,
    pub temperature: f64,
    pub instrument: Option<InstrumentKind>,
    pub line_errors: Vec<LineError>,
    /// Line at which an aborting policy stopped reading.
    pub aborted_at: Option<usize>,
}

enum Record {
    Point { x: f64, y: f64, weight: f64 },
    Dropped,
}

/// Parses line-oriented numeric text according to `policy`.
///
/// Never fails: unreadable lines are logged and recorded in
/// [`ParsedRecords::line_errors`].
#[must_use]
pub fn parse_records(text: &str, policy: &RecordPolicy, defaults: &RecordDefaults) -> ParsedRecords {
    let mut series = NumericSeries::default();
    let mut comments = Vec::new();
    let mut wavelength = policy.comments.then_some(defaults.wavelength);
    let mut line_errors = Vec::new();
    let mut aborted_at = None;

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;

        if policy.comments {
            if line.is_empty() {
                continue;
            }
            if line.contains('=') {
                let comment = Comment::new(line);
                if comment.key().to_lowercase().contains("wave") {
                    if let Some(value) = comment.float_value() {
                        wavelength = Some(value);
                    }
                }
                comments.push(comment);
                continue;
            }
        }

        let tokens = policy.delimiters.tokenize(line);
        if tokens.len() < 2 {
            if policy.report_short_lines && index >= policy.header_lines {
                log::warn!("Line {line_no} cannot be read: {}", line.trim());
                line_errors.push(LineError {
                    line: line_no,
                    text: line.to_string(),
                });
            }
            continue;
        }

        match parse_record(&tokens, policy) {
            Some(Record::Point { x, y, weight }) => series.push(x, y, weight),
            Some(Record::Dropped) => {}
            None => {
                if index < policy.header_lines {
                    continue;
                }
                log::warn!("Error in line {line_no}");
                line_errors.push(LineError {
                    line: line_no,
                    text: line.to_string(),
                });
                if policy.bad_line == BadLine::Abort {
                    log::debug!("{}", line.trim());
                    aborted_at = Some(line_no);
                    break;
                }
            }
        }
    }

    if policy.units == AxisUnits::AutoDetect
        && series.x.iter().any(|&x| x > NM_DETECTION_THRESHOLD)
    {
        series.scale_x(0.1);
    }

    let temperature = temperature_from_comments(&comments, defaults.temperature);

    ParsedRecords {
        series,
        comments,
        wavelength,
        temperature,
        instrument: None,
        line_errors,
        aborted_at,
    }
}

fn parse_record(tokens: &[&str], policy: &RecordPolicy) -> Option<Record> {
    let (x, y, sigma) = match policy.sigma {
        SigmaColumn::Trailing => {
            let values = tokens
                .iter()
                .map(|t| t.parse::<f64>().ok())
                .collect::<Option<Vec<_>>>()?;
            (values[0], values[1], values.get(2).copied())
        }
        SigmaColumn::ExactlyThird => {
            let x = tokens[0].parse::<f64>().ok()?;
            let y = tokens[1].parse::<f64>().ok()?;
            // Non-positive intensities never consult the sigma column.
            let sigma = if tokens.len() == 3 && y > 0.0 {
                Some(tokens[2].parse::<f64>().ok()?)
            } else {
                None
            };
            (x, y, sigma)
        }
    };

    let x = match policy.units {
        AxisUnits::Nanometre => x / 10.0,
        AxisUnits::Native | AxisUnits::AutoDetect => x,
    };

    if y <= 0.0 {
        return Some(match policy.zero_intensity {
            ZeroIntensity::Drop => Record::Dropped,
            ZeroIntensity::ZeroWeight => Record::Point {
                x,
                y: 0.0,
                weight: 0.0,
            },
            ZeroIntensity::UnitWeight => Record::Point {
                x,
                y: 0.0,
                weight: 1.0,
            },
        });
    }

    let weight = match sigma {
        Some(s) => 1.0 / (s * s),
        None => 1.0 / y,
    };
    if !weight.is_finite() {
        return None;
    }
    Some(Record::Point { x, y, weight })
}
