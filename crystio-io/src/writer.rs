//! File writers for density maps.

use crate::Result;
use crystio_core::map::{encode_ccp4, encode_text, MapTitle};
use crystio_core::VolumeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writer for exported density maps.
///
/// The map is encoded completely before the file is created, so a map
/// without data never leaves an empty file behind.
pub struct MapFileWriter {
    path: PathBuf,
}

impl MapFileWriter {
    /// Creates a writer targeting `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Target path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes a FOX/DrawXTL text grid.
    ///
    /// # Errors
    /// Returns an error if the map is empty or the file cannot be written.
    pub fn write_text(&self, map: &VolumeMap, title: &MapTitle) -> Result<()> {
        let text = encode_text(map, title)?;
        self.write_bytes(text.as_bytes())?;
        log::info!(
            "map from Phase {} written to file {}",
            title.phase,
            self.path.display()
        );
        Ok(())
    }

    /// Writes a CCP4 binary map.
    ///
    /// # Errors
    /// Returns an error if the map is empty or the file cannot be written.
    pub fn write_ccp4(&self, map: &VolumeMap, phase: &str) -> Result<()> {
        let bytes = encode_ccp4(map, phase)?;
        self.write_bytes(&bytes)?;
        log::info!(
            "map from Phase {phase} written to file {}",
            self.path.display()
        );
        Ok(())
    }

    fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()?;
        Ok(())
    }
}
