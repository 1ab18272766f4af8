//! Memory-mapped file access.
//!

use crate::{Error, Result};
use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A memory-mapped file reader.
///
/// Validators and byte-level decoders borrow the mapping; the file handle
/// is released when the reader is dropped.
pub struct MappedFileReader {
    mmap: Option<Mmap>,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        // Zero-length files cannot be mapped on every platform.
        let mmap = if len == 0 {
            None
        } else {
            // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
            // This is the standard safety contract for memory mapping.
            #[allow(unsafe_code)]
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
                Error::MmapError(format!("{}: {e}", path.as_ref().display()))
            })?;
            Some(mmap)
        };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    /// Returns the contents as text, or `None` for binary content.
    #[must_use]
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        crystio_core::validate::as_text(self.as_bytes())
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path the reader was opened with.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without directories, used as the dataset label.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_mapped_file_reader() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"0.01 10.0\n0.02 20.0\n").unwrap();
        file.flush().unwrap();

        let reader = MappedFileReader::open(file.path()).unwrap();
        assert_eq!(reader.len(), 20);
        assert!(!reader.is_empty());
        assert_eq!(reader.as_text().unwrap(), "0.01 10.0\n0.02 20.0\n");
    }

    #[test]
    fn test_mapped_file_reader_empty() {
        let file = NamedTempFile::new().unwrap();
        let reader = MappedFileReader::open(file.path()).unwrap();
        assert!(reader.is_empty());
        assert_eq!(reader.as_bytes(), &[] as &[u8]);
    }

    #[test]
    fn test_binary_content_is_not_text() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x89, b'H', b'D', b'F', 0, 0]).unwrap();
        file.flush().unwrap();

        let reader = MappedFileReader::open(file.path()).unwrap();
        assert!(reader.as_text().is_none());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            MappedFileReader::open("/nonexistent/crystio/file.xye"),
            Err(Error::Io(_))
        ));
    }
}
