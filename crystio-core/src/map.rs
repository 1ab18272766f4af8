//! Density map codecs.
//!
//! Two export layouts are supported:
//!
//! * a plain-text grid (FOX/DrawXTL `.grd`): title, cell, extents, then one
//!   value per line with `i` outermost and `k` innermost;
//! * the fixed 1024-byte-header CCP4 map (`.map`) read by COOT, followed by
//!   float32 values in column-major order (first axis fastest).
//!
//! The binary header is parsed by offset downstream, so field count, order
//! and width must not change.

use crate::validate::looks_like_ccp4;
use crate::{Error, Result};
use ndarray::{Array3, ShapeBuilder};
use std::fmt::Write as _;

/// Header length of a CCP4 map in bytes (256 words).
pub const CCP4_HEADER_BYTES: usize = 1024;
/// Data mode 2: 32-bit reals.
pub const CCP4_MODE_FLOAT32: i32 = 2;
/// Machine stamp for little-endian IEEE data.
pub const CCP4_MACHINE_STAMP: i32 = 0x4441_0000;

/// File tag stored at [`CCP4_TAG_OFFSET`].
pub const CCP4_MAP_TAG: [u8; 4] = *b"MAP ";
/// Byte offset of the `MAP ` tag (word 53).
pub const CCP4_TAG_OFFSET: usize = 208;
const OFFSET_CELL: usize = 40;
const OFFSET_AXES: usize = 64;
const OFFSET_MIN: usize = 76;
const OFFSET_MAX: usize = 80;
const OFFSET_MEAN: usize = 84;
const OFFSET_STAMP: usize = 212;
const OFFSET_RMS: usize = 216;

/// A unit-cell periodic density grid.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeMap {
    /// Density values indexed `[i, j, k]`.
    pub rho: Array3<f64>,
    /// a, b, c (Å) and α, β, γ (degrees).
    pub cell: [f64; 6],
}

impl VolumeMap {
    /// Creates a map from a grid and cell.
    #[must_use]
    pub fn new(rho: Array3<f64>, cell: [f64; 6]) -> Self {
        Self { rho, cell }
    }

    /// Builds a map from a phase cell record `[id, a, b, c, α, β, γ, ...]`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMap`] if fewer than seven values are given.
    pub fn from_phase_cell(rho: Array3<f64>, phase_cell: &[f64]) -> Result<Self> {
        let cell: [f64; 6] = phase_cell
            .get(1..7)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| {
                Error::InvalidMap(format!(
                    "phase cell needs 7 values, got {}",
                    phase_cell.len()
                ))
            })?;
        Ok(Self { rho, cell })
    }

    /// Grid extents `(nx, ny, nz)`.
    #[must_use]
    pub fn extents(&self) -> (usize, usize, usize) {
        self.rho.dim()
    }

    /// True if the grid holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rho.is_empty()
    }

    /// Min, max, mean and population standard deviation of the grid.
    #[must_use]
    pub fn statistics(&self) -> MapStatistics {
        if self.rho.is_empty() {
            return MapStatistics::default();
        }
        let min = self.rho.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.rho.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        #[allow(clippy::cast_precision_loss)]
        let n = self.rho.len() as f64;
        let mean = self.rho.sum() / n;
        let variance = self.rho.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        MapStatistics {
            min,
            max,
            mean,
            rms: variance.sqrt(),
        }
    }
}

/// Summary statistics written into the binary header.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MapStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub rms: f64,
}

/// Title information for the text grid.
#[derive(Debug, Clone, Default)]
pub struct MapTitle {
    pub phase: String,
    pub project: Option<String>,
}

impl MapTitle {
    /// Title for `phase` with no project name.
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            project: None,
        }
    }

    /// Adds the project file name to the title line.
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }
}

impl std::fmt::Display for MapTitle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Map of Phase {}", self.phase)?;
        if let Some(project) = &self.project {
            write!(f, " from {project}")?;
        }
        Ok(())
    }
}

fn require_data(map: &VolumeMap, phase: &str) -> Result<()> {
    if map.is_empty() {
        return Err(Error::NoData(format!("There is no map for phase {phase}")));
    }
    Ok(())
}

/// Renders a map as a `.grd` text grid.
///
/// # Errors
/// Returns [`Error::NoData`] if the grid is empty.
pub fn encode_text(map: &VolumeMap, title: &MapTitle) -> Result<String> {
    require_data(map, &title.phase)?;
    let (nx, ny, nz) = map.extents();
    let c = &map.cell;

    let mut out = String::with_capacity(64 + map.rho.len() * 12);
    // Writing to a String cannot fail.
    let _ = writeln!(out, "{title}");
    let _ = writeln!(
        out,
        " {:9.5} {:9.5} {:9.5} {:9.3} {:9.3} {:9.3}",
        c[0], c[1], c[2], c[3], c[4], c[5]
    );
    let _ = writeln!(out, " {nx:3} {ny:3} {nz:3}");
    for &value in &map.rho {
        let _ = writeln!(out, "{}", grid_value(value));
    }
    Ok(out)
}

/// Shortest round-trip form with a signed, two-digit exponent (`1e-05`,
/// `2.5e+20`), the layout other `.grd` writers produce.
fn grid_value(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    let text = format!("{value:?}");
    let Some((mantissa, exponent)) = text.split_once('e') else {
        return text;
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{mantissa}e{sign}{digits:0>2}")
}

fn push_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_le_bytes());
}

#[allow(clippy::cast_possible_truncation)]
fn push_f32(out: &mut Vec<u8>, value: f64) {
    out.extend_from_slice(&(value as f32).to_le_bytes());
}

fn extent_i32(n: usize) -> Result<i32> {
    i32::try_from(n).map_err(|_| Error::InvalidMap(format!("extent {n} exceeds i32")))
}

/// Encodes a map in the CCP4 binary layout.
///
/// # Errors
/// Returns [`Error::NoData`] if the grid is empty and
/// [`Error::InvalidMap`] if an extent does not fit in 32 bits.
pub fn encode_ccp4(map: &VolumeMap, phase: &str) -> Result<Vec<u8>> {
    require_data(map, phase)?;
    let (nx, ny, nz) = map.extents();
    let extents = [extent_i32(nx)?, extent_i32(ny)?, extent_i32(nz)?];
    let stats = map.statistics();

    let mut out = Vec::with_capacity(CCP4_HEADER_BYTES + map.rho.len() * 4);
    for n in extents {
        push_i32(&mut out, n);
    }
    push_i32(&mut out, CCP4_MODE_FLOAT32);
    for origin in [0, 0, 0] {
        push_i32(&mut out, origin);
    }
    for n in extents {
        push_i32(&mut out, n);
    }
    for c in map.cell {
        push_f32(&mut out, c);
    }
    for axis in [1, 2, 3] {
        push_i32(&mut out, axis);
    }
    push_f32(&mut out, stats.min);
    push_f32(&mut out, stats.max);
    push_f32(&mut out, stats.mean);
    push_i32(&mut out, 0);
    // Words 23..=51.
    for _ in 24..53 {
        push_i32(&mut out, 0);
    }
    out.extend_from_slice(&CCP4_MAP_TAG);
    push_i32(&mut out, CCP4_MACHINE_STAMP);
    push_f32(&mut out, stats.rms);
    // Words 55..=255.
    for _ in 56..257 {
        push_i32(&mut out, 0);
    }
    debug_assert_eq!(out.len(), CCP4_HEADER_BYTES);

    // Transposed view iterates with the first axis fastest.
    for value in map.rho.t() {
        push_f32(&mut out, *value);
    }
    Ok(out)
}

/// Fields recovered from a CCP4 header.
#[derive(Debug, Clone, PartialEq)]
pub struct Ccp4Header {
    pub extents: [usize; 3],
    pub mode: i32,
    pub axis_order: [i32; 3],
    pub statistics: MapStatistics,
    pub machine_stamp: i32,
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    i32::from_le_bytes(word)
}

fn read_f32(bytes: &[u8], offset: usize) -> f64 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    f64::from(f32::from_le_bytes(word))
}

/// Decodes a little-endian mode-2 CCP4 map.
///
/// # Errors
/// Returns [`Error::InvalidMap`] for a short or malformed header or an
/// unsupported mode, and [`Error::ShapeMismatch`] when the payload length
/// disagrees with the extents.
pub fn decode_ccp4(bytes: &[u8]) -> Result<(Ccp4Header, VolumeMap)> {
    if bytes.len() < CCP4_HEADER_BYTES {
        return Err(Error::InvalidMap(format!(
            "file is {} bytes, shorter than the {CCP4_HEADER_BYTES}-byte header",
            bytes.len()
        )));
    }
    if !looks_like_ccp4(bytes) {
        return Err(Error::InvalidMap("missing 'MAP ' tag".to_string()));
    }

    let mut extents = [0usize; 3];
    for (axis, extent) in extents.iter_mut().enumerate() {
        let n = read_i32(bytes, axis * 4);
        *extent = usize::try_from(n)
            .map_err(|_| Error::InvalidMap(format!("negative extent {n}")))?;
    }
    let mode = read_i32(bytes, 12);
    if mode != CCP4_MODE_FLOAT32 {
        return Err(Error::InvalidMap(format!("unsupported mode {mode}")));
    }

    let mut cell = [0.0; 6];
    for (i, c) in cell.iter_mut().enumerate() {
        *c = read_f32(bytes, OFFSET_CELL + i * 4);
    }
    let axis_order = [
        read_i32(bytes, OFFSET_AXES),
        read_i32(bytes, OFFSET_AXES + 4),
        read_i32(bytes, OFFSET_AXES + 8),
    ];
    let statistics = MapStatistics {
        min: read_f32(bytes, OFFSET_MIN),
        max: read_f32(bytes, OFFSET_MAX),
        mean: read_f32(bytes, OFFSET_MEAN),
        rms: read_f32(bytes, OFFSET_RMS),
    };

    let byte_count = extents
        .iter()
        .try_fold(4usize, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| {
            Error::InvalidMap(format!("extents {extents:?} overflow the payload size"))
        })?;
    let payload = &bytes[CCP4_HEADER_BYTES..];
    if payload.len() != byte_count {
        return Err(Error::ShapeMismatch {
            expected: extents.to_vec(),
            found: vec![payload.len() / 4],
        });
    }
    let values: Vec<f64> = payload
        .chunks_exact(4)
        .map(|chunk| read_f32(chunk, 0))
        .collect();
    let rho = Array3::from_shape_vec((extents[0], extents[1], extents[2]).f(), values).map_err(
        |e| Error::InvalidMap(format!("cannot shape payload as {extents:?}: {e}")),
    )?;

    let header = Ccp4Header {
        extents,
        mode,
        axis_order,
        statistics,
        machine_stamp: read_i32(bytes, OFFSET_STAMP),
    };
    Ok((header, VolumeMap { rho, cell }))
}
