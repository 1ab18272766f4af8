//! Format registry and dispatch.
//!
//! Every supported format is a [`FormatKind`] variant. Each variant maps to
//! a static [`FormatInfo`] and to its validator, reader and writer; there
//! is no per-format object state. [`FormatRegistry`] filters out formats
//! whose decoder was not compiled in and picks a format for a file.

use crate::config::ImportConfig;
use crate::png::decode_png;
use crate::reader::MappedFileReader;
use crate::{Error, Result};
use crystio_core::map::{decode_ccp4, encode_ccp4, encode_text, MapTitle};
use crystio_core::records::ParsedRecords;
use crystio_core::validate::{
    as_text, delimited_contents, looks_like_ccp4, looks_like_hdf5, looks_like_png,
    qstep_contents,
};
use crystio_core::{ImageBuffer, RecordFormat, VolumeMap};
use std::path::Path;

/// Whether a format reads, writes, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Import,
    Export,
    Both,
}

/// Static description of a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    /// Short identifier, e.g. for `--format`.
    pub id: &'static str,
    pub name: &'static str,
    pub long_name: &'static str,
    /// Extensions including the leading dot.
    pub extensions: &'static [&'static str],
    /// Only try this format on files with a listed extension.
    pub strict_extension: bool,
    pub direction: Direction,
    /// Usable without an interactive host.
    pub scriptable: bool,
}

/// All known formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    Csv,
    XrayQ,
    XrayQNm,
    NeutronQ,
    NeutronQNm,
    Png,
    Hdf5,
    GridText,
    Ccp4,
}

const Q_XRAY_EXTENSIONS: &[&str] = &[".xsad", ".xdat"];
const Q_NEUTRON_EXTENSIONS: &[&str] = &[".nsad", ".ndat"];

impl FormatKind {
    /// Every format, in probing order.
    pub const ALL: [Self; 9] = [
        Self::Csv,
        Self::XrayQ,
        Self::XrayQNm,
        Self::NeutronQ,
        Self::NeutronQNm,
        Self::Png,
        Self::Hdf5,
        Self::GridText,
        Self::Ccp4,
    ];

    /// Static description.
    #[must_use]
    pub fn info(self) -> FormatInfo {
        match self {
            Self::Csv => FormatInfo {
                id: "csv",
                name: "comma/tab/semicolon separated",
                long_name: "Worksheet-type .csv powder data file",
                extensions: &[".csv", ".xy"],
                strict_extension: true,
                direction: Direction::Import,
                scriptable: true,
            },
            Self::XrayQ => FormatInfo {
                id: "xray-q",
                name: "q (A-1) step X-ray QIE data",
                long_name: "q (A-1) stepped X-ray text data file in Q,I,E order; E optional",
                extensions: Q_XRAY_EXTENSIONS,
                strict_extension: false,
                direction: Direction::Import,
                scriptable: false,
            },
            Self::XrayQNm => FormatInfo {
                id: "xray-q-nm",
                name: "q (nm-1) step X-ray QIE data",
                long_name: "q (nm-1) stepped X-ray text data file in Q,I,E order; E optional",
                extensions: Q_XRAY_EXTENSIONS,
                strict_extension: false,
                direction: Direction::Import,
                scriptable: false,
            },
            Self::NeutronQ => FormatInfo {
                id: "neutron-q",
                name: "q (A-1) step neutron CW QIE data",
                long_name: "q (A-1) stepped neutron CW text data file in Q,I,E order; E optional",
                extensions: Q_NEUTRON_EXTENSIONS,
                strict_extension: false,
                direction: Direction::Import,
                scriptable: false,
            },
            Self::NeutronQNm => FormatInfo {
                id: "neutron-q-nm",
                name: "q (nm-1) step neutron CW QIE data",
                long_name: "q (nm-1) stepped neutron CW text data file in Q,I,E order; E optional",
                extensions: Q_NEUTRON_EXTENSIONS,
                strict_extension: false,
                direction: Direction::Import,
                scriptable: false,
            },
            Self::Png => FormatInfo {
                id: "png",
                name: "PNG image",
                long_name: "PNG image from CheMin",
                extensions: &[".png"],
                strict_extension: true,
                direction: Direction::Import,
                scriptable: false,
            },
            Self::Hdf5 => FormatInfo {
                id: "hdf5",
                name: "HDF5 image",
                long_name: "HDF5 image file",
                extensions: &[".hdf5", ".hd5", ".h5", ".hdf"],
                strict_extension: true,
                direction: Direction::Import,
                scriptable: false,
            },
            Self::GridText => FormatInfo {
                id: "grd",
                name: "FOX/DrawXTL file",
                long_name: "Export map as text (.grd) file",
                extensions: &[".grd"],
                strict_extension: true,
                direction: Direction::Export,
                scriptable: false,
            },
            Self::Ccp4 => FormatInfo {
                id: "ccp4",
                name: "CCP4 map file",
                long_name: "Export CCP4 .map file",
                extensions: &[".map"],
                strict_extension: true,
                direction: Direction::Both,
                scriptable: false,
            },
        }
    }

    /// Looks a format up by its short identifier.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.info().id.eq_ignore_ascii_case(id))
    }

    /// The record parser variant behind a text format.
    #[must_use]
    pub fn record_format(self) -> Option<RecordFormat> {
        match self {
            Self::Csv => Some(RecordFormat::Csv),
            Self::XrayQ => Some(RecordFormat::XrayQ),
            Self::XrayQNm => Some(RecordFormat::XrayQNm),
            Self::NeutronQ => Some(RecordFormat::NeutronQ),
            Self::NeutronQNm => Some(RecordFormat::NeutronQNm),
            Self::Png | Self::Hdf5 | Self::GridText | Self::Ccp4 => None,
        }
    }

    /// True if the decoder for this format was compiled in.
    #[must_use]
    pub fn is_available(self) -> bool {
        match self {
            Self::Hdf5 => cfg!(feature = "hdf5"),
            _ => true,
        }
    }

    /// True if the format can read files.
    #[must_use]
    pub fn can_import(self) -> bool {
        matches!(self.info().direction, Direction::Import | Direction::Both)
    }

    /// True if the format can write maps.
    #[must_use]
    pub fn can_export(self) -> bool {
        matches!(self.info().direction, Direction::Export | Direction::Both)
    }

    /// Case-insensitive extension match.
    #[must_use]
    pub fn matches_extension(self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.info()
            .extensions
            .iter()
            .any(|candidate| candidate[1..].eq_ignore_ascii_case(ext))
    }

    /// Content check. Export-only formats never accept.
    #[must_use]
    pub fn validate(self, bytes: &[u8]) -> bool {
        match self {
            Self::Csv => as_text(bytes).is_some_and(|text| delimited_contents(&text).is_ok()),
            Self::XrayQ | Self::XrayQNm | Self::NeutronQ | Self::NeutronQNm => {
                as_text(bytes).is_some_and(|text| qstep_contents(&text).is_ok())
            }
            Self::Png => looks_like_png(bytes),
            Self::Hdf5 => looks_like_hdf5(bytes),
            Self::Ccp4 => looks_like_ccp4(bytes),
            Self::GridText => false,
        }
    }

    /// Reads a file with this format.
    ///
    /// Containers yield their first image; use a container session to
    /// step through the rest.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the format cannot
    /// import, or the content holds no data.
    pub fn read<P: AsRef<Path>>(self, path: P, config: &ImportConfig) -> Result<Imported> {
        if !self.is_available() {
            return Err(Error::FormatUnavailable(self.info().name.to_string()));
        }
        if !self.can_import() {
            return Err(Error::UnsupportedFormat(format!(
                "{} is export only",
                self.info().name
            )));
        }
        if self == Self::Hdf5 {
            return read_container(path.as_ref(), config);
        }

        let reader = MappedFileReader::open(&path)?;
        let label = reader.file_name();
        if let Some(format) = self.record_format() {
            let text = reader.as_text().ok_or_else(|| {
                Error::InvalidFormat(format!("{label} is not a text file"))
            })?;
            let records = format.parse(&text, &config.q_step.record_defaults());
            if records.series.is_empty() {
                return Err(crystio_core::Error::NoData(format!(
                    "no data points read from {label}"
                ))
                .into());
            }
            return Ok(Imported::Series(SeriesImport { label, records }));
        }

        match self {
            Self::Png => {
                let image = decode_png(reader.as_bytes(), &config.png.image_defaults())?;
                Ok(Imported::Image(ImageImport {
                    label,
                    image,
                    number: 1,
                    repeat: false,
                }))
            }
            Self::Ccp4 => {
                let (_, map) = decode_ccp4(reader.as_bytes())?;
                Ok(Imported::Map(MapImport { label, map }))
            }
            _ => Err(Error::UnsupportedFormat(self.info().name.to_string())),
        }
    }

    /// Encodes a map with this format.
    ///
    /// # Errors
    /// Returns an error if the format cannot export or the map is empty.
    pub fn write(self, map: &VolumeMap, title: &MapTitle) -> Result<Vec<u8>> {
        match self {
            Self::GridText => Ok(encode_text(map, title)?.into_bytes()),
            Self::Ccp4 => Ok(encode_ccp4(map, &title.phase)?),
            _ => Err(Error::UnsupportedFormat(format!(
                "{} cannot export maps",
                self.info().name
            ))),
        }
    }
}

#[cfg(feature = "hdf5")]
fn read_container(path: &Path, config: &ImportConfig) -> Result<Imported> {
    let mut session = crate::ContainerSession::open(path, config.hdf5.image_defaults())?;
    let read = session.read_image(1)?;
    Ok(Imported::Image(ImageImport {
        label: path
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned()),
        image: read.image,
        number: read.number,
        repeat: read.repeat,
    }))
}

#[cfg(not(feature = "hdf5"))]
fn read_container(_path: &Path, _config: &ImportConfig) -> Result<Imported> {
    Err(Error::FormatUnavailable(FormatKind::Hdf5.info().name.to_string()))
}

/// A numeric series read from a text file.
#[derive(Debug, Clone)]
pub struct SeriesImport {
    /// File name of the source.
    pub label: String,
    pub records: ParsedRecords,
}

/// An image read from an image file or container.
#[derive(Debug, Clone)]
pub struct ImageImport {
    pub label: String,
    pub image: ImageBuffer,
    /// 1-based image number within the file.
    pub number: usize,
    /// True if the file holds further images.
    pub repeat: bool,
}

/// A density map read back from a map file.
#[derive(Debug, Clone)]
pub struct MapImport {
    pub label: String,
    pub map: VolumeMap,
}

/// Result of a successful import.
#[derive(Debug, Clone)]
pub enum Imported {
    Series(SeriesImport),
    Image(ImageImport),
    Map(MapImport),
}

/// The set of formats usable in this build.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    formats: Vec<FormatKind>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::probe()
    }
}

impl FormatRegistry {
    /// Probes decoder capabilities once and keeps the available formats.
    #[must_use]
    pub fn probe() -> Self {
        let formats = FormatKind::ALL
            .into_iter()
            .filter(|kind| {
                let available = kind.is_available();
                if !available {
                    log::info!(
                        "{} reader skipped because crystio was built without its decoder",
                        kind.info().name
                    );
                }
                available
            })
            .collect();
        Self { formats }
    }

    /// Available formats in probing order.
    #[must_use]
    pub fn formats(&self) -> &[FormatKind] {
        &self.formats
    }

    /// Available formats that can read files.
    pub fn importers(&self) -> impl Iterator<Item = FormatKind> + '_ {
        self.formats.iter().copied().filter(|k| k.can_import())
    }

    /// Export format chosen by the output file extension.
    #[must_use]
    pub fn exporter_for(&self, path: &Path) -> Option<FormatKind> {
        self.formats
            .iter()
            .copied()
            .find(|k| k.can_export() && k.matches_extension(path))
    }

    /// Importers to try for `path`: extension matches first, then the
    /// formats that do not insist on their extension.
    #[must_use]
    pub fn candidates(&self, path: &Path) -> [Vec<FormatKind>; 2] {
        let (matched, rest): (Vec<_>, Vec<_>) =
            self.importers().partition(|k| k.matches_extension(path));
        let fallback = rest.into_iter().filter(|k| !k.info().strict_extension).collect();
        [matched, fallback]
    }

    /// Picks the single format that accepts `bytes`.
    ///
    /// Several formats share extensions and differ only in units, so more
    /// than one acceptance within the same tier is reported rather than
    /// resolved.
    ///
    /// # Errors
    /// Returns [`Error::AmbiguousFormat`] when several formats accept,
    /// [`Error::FormatUnavailable`] when only a compiled-out format claims
    /// the extension, and [`Error::UnsupportedFormat`] otherwise.
    pub fn select(&self, path: &Path, bytes: &[u8]) -> Result<FormatKind> {
        for tier in self.candidates(path) {
            let accepted: Vec<FormatKind> =
                tier.into_iter().filter(|k| k.validate(bytes)).collect();
            match accepted.as_slice() {
                [] => continue,
                [single] => return Ok(*single),
                _ => {
                    return Err(Error::AmbiguousFormat {
                        candidates: accepted.iter().map(|k| k.info().id.to_string()).collect(),
                    })
                }
            }
        }

        if let Some(missing) = FormatKind::ALL
            .into_iter()
            .find(|k| !self.formats.contains(k) && k.matches_extension(path))
        {
            return Err(Error::FormatUnavailable(missing.info().name.to_string()));
        }
        Err(Error::UnsupportedFormat(path.display().to_string()))
    }

    /// Returns `forced` if given, otherwise selects from the file content.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, or selection errors
    /// from [`FormatRegistry::select`].
    pub fn resolve(&self, path: &Path, forced: Option<FormatKind>) -> Result<FormatKind> {
        if let Some(kind) = forced {
            return Ok(kind);
        }
        let reader = MappedFileReader::open(path)?;
        self.select(path, reader.as_bytes())
    }

    /// Selects a format for `path` (or uses `forced`) and reads the file.
    ///
    /// # Errors
    /// Returns selection errors from [`FormatRegistry::resolve`], or read
    /// errors from [`FormatKind::read`].
    pub fn read<P: AsRef<Path>>(
        &self,
        path: P,
        forced: Option<FormatKind>,
        config: &ImportConfig,
    ) -> Result<(FormatKind, Imported)> {
        let path = path.as_ref();
        let kind = self.resolve(path, forced)?;
        Ok((kind, kind.read(path, config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crystio_core::map::CCP4_HEADER_BYTES;

    #[test]
    fn test_from_id() {
        assert_eq!(FormatKind::from_id("CSV"), Some(FormatKind::Csv));
        assert_eq!(FormatKind::from_id("neutron-q-nm"), Some(FormatKind::NeutronQNm));
        assert_eq!(FormatKind::from_id("tiff"), None);
    }

    #[test]
    fn test_extension_matching_is_case_insensitive() {
        assert!(FormatKind::Csv.matches_extension(Path::new("run.XY")));
        assert!(FormatKind::Hdf5.matches_extension(Path::new("scan.H5")));
        assert!(!FormatKind::Png.matches_extension(Path::new("noext")));
    }

    #[test]
    fn test_directions() {
        assert!(FormatKind::Ccp4.can_export() && FormatKind::Ccp4.can_import());
        assert!(FormatKind::GridText.can_export() && !FormatKind::GridText.can_import());
        assert!(!FormatKind::Csv.can_export());
        assert!(FormatKind::Csv.info().scriptable);
    }

    #[test]
    fn test_probe_filters_unavailable() {
        let registry = FormatRegistry::probe();
        assert_eq!(
            registry.formats().contains(&FormatKind::Hdf5),
            cfg!(feature = "hdf5")
        );
        assert!(registry.formats().contains(&FormatKind::Csv));
    }

    #[test]
    fn test_select_unique_by_extension() {
        let registry = FormatRegistry::probe();
        let kind = registry
            .select(Path::new("pattern.csv"), b"10.0,5\n10.5,6\n")
            .unwrap();
        assert_eq!(kind, FormatKind::Csv);
    }

    #[test]
    fn test_select_surfaces_shared_extension_ambiguity() {
        let registry = FormatRegistry::probe();
        let err = registry
            .select(Path::new("saxs.xsad"), b"0.01 100\n0.02 90\n")
            .unwrap_err();
        match err {
            Error::AmbiguousFormat { candidates } => {
                assert_eq!(candidates, vec!["xray-q", "xray-q-nm"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn test_select_rejects_binary_text_formats() {
        let registry = FormatRegistry::probe();
        assert!(registry
            .select(Path::new("data.bin"), &[0u8, 1, 2, 3])
            .is_err());
    }

    #[test]
    fn test_resolve_prefers_forced_format() {
        use std::io::Write;
        let mut file = tempfile::Builder::new().suffix(".xsad").tempfile().unwrap();
        file.write_all(b"0.01 100\n0.02 90\n").unwrap();
        file.flush().unwrap();
        let registry = FormatRegistry::probe();

        assert!(matches!(
            registry.resolve(file.path(), None),
            Err(Error::AmbiguousFormat { .. })
        ));
        assert_eq!(
            registry
                .resolve(file.path(), Some(FormatKind::XrayQNm))
                .unwrap(),
            FormatKind::XrayQNm
        );
        assert!(registry
            .resolve(Path::new("/nonexistent/run.csv"), None)
            .is_err());
    }

    #[test]
    fn test_write_dispatch() {
        let map = VolumeMap::new(ndarray::Array3::ones((1, 1, 2)), [1.0; 6]);
        let title = MapTitle::new("p");
        let text = FormatKind::GridText.write(&map, &title).unwrap();
        assert!(text.starts_with(b"Map of Phase p\n"));
        assert_eq!(
            FormatKind::Ccp4.write(&map, &title).unwrap().len(),
            CCP4_HEADER_BYTES + 8
        );
        assert!(FormatKind::Csv.write(&map, &title).is_err());
    }
}
