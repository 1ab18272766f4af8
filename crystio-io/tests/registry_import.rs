#![allow(clippy::float_cmp)]
use approx::assert_relative_eq;
use crystio_core::map::MapTitle;
use crystio_core::{InstrumentKind, VolumeMap};
use crystio_io::{
    Error, FormatKind, FormatRegistry, ImportConfig, Imported, MapFileWriter, MappedFileReader,
};
use ndarray::Array3;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

fn temp_with(suffix: &str, content: &[u8]) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content).unwrap();
    file.flush().unwrap();
    file
}

fn select(registry: &FormatRegistry, path: &Path) -> crystio_io::Result<FormatKind> {
    let reader = MappedFileReader::open(path).unwrap();
    registry.select(path, reader.as_bytes())
}

#[test]
fn test_csv_selected_and_read() {
    let file = temp_with(".CSV", b"2theta;counts\n10.00;120\n10.02;130;11\n10.04;0\n");
    let registry = FormatRegistry::probe();

    let (kind, imported) = registry
        .read(file.path(), None, &ImportConfig::default())
        .unwrap();
    assert_eq!(kind, FormatKind::Csv);

    let Imported::Series(import) = imported else {
        panic!("expected a numeric series");
    };
    let series = &import.records.series;
    assert_eq!(series.x, vec![10.00, 10.02, 10.04]);
    assert_relative_eq!(series.weight[0], 1.0 / 120.0);
    assert_relative_eq!(series.weight[1], 1.0 / 121.0);
    assert_eq!(series.weight[2], 0.0);
    assert!(import.label.ends_with(".CSV"));
}

#[test]
fn test_shared_extension_needs_explicit_format() {
    let file = temp_with(".nsad", b"Temp=10\n0.5 100 10\n3.0 50 5\n");
    let registry = FormatRegistry::probe();

    match select(&registry, file.path()) {
        Err(Error::AmbiguousFormat { candidates }) => {
            assert_eq!(candidates, vec!["neutron-q", "neutron-q-nm"]);
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }

    let (_, imported) = registry
        .read(
            file.path(),
            Some(FormatKind::NeutronQ),
            &ImportConfig::default(),
        )
        .unwrap();
    let Imported::Series(import) = imported else {
        panic!("expected a numeric series");
    };
    // Any x above 2 marks the file as nm-1.
    assert_relative_eq!(import.records.series.x[0], 0.05);
    assert_relative_eq!(import.records.series.x[1], 0.3);
    assert_eq!(import.records.temperature, 10.0);
    assert_eq!(import.records.instrument, Some(InstrumentKind::NeutronCw));
}

#[test]
fn test_unknown_extension_falls_back_to_content() {
    let file = temp_with(".txt", b"just words here\nand more words\n");
    let registry = FormatRegistry::probe();
    assert!(matches!(
        select(&registry, file.path()),
        Err(Error::UnsupportedFormat(_))
    ));
}

#[test]
fn test_config_defaults_reach_reader() {
    let file = temp_with(".xdat", b"0.1 10\n0.2 20\n");
    let config = ImportConfig::from_json(r#"{ "q_step": { "wavelength": 0.7093 } }"#).unwrap();

    let Imported::Series(import) = FormatKind::XrayQNm.read(file.path(), &config).unwrap() else {
        panic!("expected a numeric series");
    };
    assert_eq!(import.records.wavelength, Some(0.7093));
    assert_relative_eq!(import.records.series.x[1], 0.02);
}

#[test]
fn test_empty_series_is_no_data() {
    let file = temp_with(".xsad", b"0.1 0\n0.2 0\n");
    let err = FormatKind::XrayQ
        .read(file.path(), &ImportConfig::default())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::CoreError(crystio_core::Error::NoData(_))
    ));
}

#[test]
fn test_hdf5_availability_matches_build() {
    let mut bytes = vec![0u8; 512];
    bytes.extend_from_slice(&[0x89, b'H', b'D', b'F', 0x0D, 0x0A, 0x1A, 0x0A]);
    let file = temp_with(".h5", &bytes);
    let registry = FormatRegistry::probe();

    let selected = select(&registry, file.path());
    if cfg!(feature = "hdf5") {
        assert_eq!(selected.unwrap(), FormatKind::Hdf5);
    } else {
        assert!(matches!(selected, Err(Error::FormatUnavailable(_))));
    }
}

#[test]
fn test_exported_map_reads_back() {
    let rho = Array3::from_shape_fn((2, 3, 4), |(i, j, k)| (i * 12 + j * 4 + k) as f64 / 8.0);
    let map = VolumeMap::new(rho.clone(), [6.0, 7.0, 8.0, 90.0, 90.0, 90.0]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("density.map");

    MapFileWriter::new(&path).write_ccp4(&map, "Si").unwrap();

    let registry = FormatRegistry::probe();
    assert_eq!(select(&registry, &path).unwrap(), FormatKind::Ccp4);
    let (_, imported) = registry
        .read(&path, None, &ImportConfig::default())
        .unwrap();
    let Imported::Map(import) = imported else {
        panic!("expected a map");
    };
    assert_eq!(import.map.rho, rho);
    assert_eq!(import.label, "density.map");

    let grd = dir.path().join("density.grd");
    let exporter = registry.exporter_for(&grd).unwrap();
    assert_eq!(exporter, FormatKind::GridText);
    let text = exporter
        .write(&import.map, &MapTitle::new("Si").with_project("silicon.gpx"))
        .unwrap();
    assert!(String::from_utf8(text)
        .unwrap()
        .starts_with("Map of Phase Si from silicon.gpx\n"));
}
