//! HDF5 image containers.
//!
//! A [`ContainerSession`] owns one open file. The first image read walks
//! the whole file, recording every image-shaped dataset in a
//! [`DatasetIndex`] and every scalar or 1-D dataset as a header line; later
//! reads in the same session reuse that scan.

use crate::{Error, Result};
use crystio_core::{Comment, DatasetIndex, ImageBuffer, ImageDefaults, ImageSelection};
use hdf5::types::{FixedAscii, FixedUnicode, VarLenAscii, VarLenUnicode};
use hdf5::{Dataset, File, Group};
use ndarray::{s, Array2};
use std::path::{Path, PathBuf};

/// The outcome of scanning one container file.
#[derive(Clone, Debug)]
pub struct ContainerScan {
    /// File the scan belongs to.
    pub source: PathBuf,
    pub index: DatasetIndex,
    /// `"<path>: <first value>"` lines for scalar and 1-D datasets.
    pub header: Vec<Comment>,
}

/// One image read from a container.
#[derive(Clone, Debug)]
pub struct ContainerImage {
    pub image: ImageBuffer,
    /// 1-based image number.
    pub number: usize,
    /// True if images with higher numbers remain.
    pub repeat: bool,
}

/// An open container plus its (lazily built) image index.
pub struct ContainerSession {
    file: File,
    path: PathBuf,
    defaults: ImageDefaults,
    scan: Option<ContainerScan>,
}

impl ContainerSession {
    /// Opens a container for reading.
    ///
    /// # Errors
    /// Returns an error if the HDF5 library cannot open the file.
    pub fn open<P: AsRef<Path>>(path: P, defaults: ImageDefaults) -> Result<Self> {
        let file = File::open(&path).map_err(|e| {
            log::warn!("cannot open file {}", path.as_ref().display());
            Error::from(e)
        })?;
        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
            defaults,
            scan: None,
        })
    }

    /// Opens a container, reusing an earlier scan of the same file.
    ///
    /// A scan of a different file is discarded and the container is
    /// rescanned on first use.
    ///
    /// # Errors
    /// Returns an error if the HDF5 library cannot open the file.
    pub fn resume<P: AsRef<Path>>(
        path: P,
        scan: ContainerScan,
        defaults: ImageDefaults,
    ) -> Result<Self> {
        let mut session = Self::open(&path, defaults)?;
        if scan.source == session.path {
            session.scan = Some(scan);
        } else {
            log::warn!(
                "Ignoring image index for {} when opening {}",
                scan.source.display(),
                session.path.display()
            );
        }
        Ok(session)
    }

    /// Returns the scan, walking the file on first call.
    ///
    /// # Errors
    /// Returns an error if the file structure cannot be traversed.
    pub fn scan(&mut self) -> Result<&ContainerScan> {
        if self.scan.is_none() {
            let scan = scan_file(&self.file, &self.path)?;
            log::debug!(
                "Indexed {} image(s) in {}",
                scan.index.len(),
                self.path.display()
            );
            self.scan = Some(scan);
        }
        self.scan
            .as_ref()
            .ok_or_else(|| Error::InvalidFormat("container scan missing".to_string()))
    }

    /// Number of images in the container.
    ///
    /// # Errors
    /// Returns an error if the file cannot be scanned.
    pub fn image_count(&mut self) -> Result<usize> {
        Ok(self.scan()?.index.len())
    }

    /// Reads image `number` (1-based).
    ///
    /// # Errors
    /// Returns [`crystio_core::Error::NoData`] if the container holds no
    /// images, [`crystio_core::Error::ImageIndexOutOfRange`] for a bad
    /// number, or an HDF5 error if the slice cannot be read.
    pub fn read_image(&mut self, number: usize) -> Result<ContainerImage> {
        let defaults = self.defaults;
        let scan = self.scan()?;
        if scan.index.is_empty() {
            return Err(crystio_core::Error::NoData(
                "No valid images found in file".to_string(),
            )
            .into());
        }
        let entry = scan.index.get(number)?.clone();
        let header = scan.header.clone();
        let count = scan.index.len();

        let dataset = self.file.dataset(&entry.path)?;
        let data = read_selection(&dataset, entry.selection(dataset.ndim())?)?;
        let image = ImageBuffer::new(data, &defaults, header)?;

        log::debug!(
            "Read image #{number} from file {}",
            self.path.display()
        );
        Ok(ContainerImage {
            image,
            number,
            repeat: number < count,
        })
    }

    /// Consumes the session and returns its scan for later reuse.
    ///
    /// # Errors
    /// Returns an error if the file cannot be scanned.
    pub fn into_scan(mut self) -> Result<ContainerScan> {
        self.scan()?;
        self.scan
            .take()
            .ok_or_else(|| Error::InvalidFormat("container scan missing".to_string()))
    }
}

fn read_selection(dataset: &Dataset, selection: ImageSelection) -> Result<Array2<f64>> {
    let data = match selection {
        ImageSelection::Whole => dataset.read_2d::<f64>()?,
        ImageSelection::Frame(n) => dataset.read_slice_2d::<f64, _>(s![n, .., ..])?,
        ImageSelection::StackFrame(n) => dataset.read_slice_2d::<f64, _>(s![0, n, .., ..])?,
    };
    Ok(data)
}

/// Walks every node of `file` in name order.
///
/// # Errors
/// Returns an error if group membership cannot be listed.
pub fn scan_file(file: &File, path: &Path) -> Result<ContainerScan> {
    let mut scan = ContainerScan {
        source: path.to_path_buf(),
        index: DatasetIndex::new(),
        header: Vec::new(),
    };
    visit_group(file, &mut scan)?;
    Ok(scan)
}

fn visit_group(group: &Group, scan: &mut ContainerScan) -> Result<()> {
    for name in group.member_names()? {
        if let Ok(dataset) = group.dataset(&name) {
            visit_dataset(&dataset, scan);
        } else if let Ok(child) = group.group(&name) {
            visit_group(&child, scan)?;
        } else {
            log::debug!("Skipping member {name} of {}", group.name());
        }
    }
    Ok(())
}

fn visit_dataset(dataset: &Dataset, scan: &mut ContainerScan) {
    let path = dataset.name();
    let shape = dataset.shape();
    if shape.len() < 2 {
        if let Some(value) = first_value(dataset) {
            scan.header.push(Comment::new(format!("{path}: {value}")));
        }
    }
    scan.index.register(&path, &shape);
}

const FIXED_STRING_BYTES: usize = 256;

fn first_value(dataset: &Dataset) -> Option<String> {
    if let Ok(values) = dataset.read_raw::<f64>() {
        return values.first().map(ToString::to_string);
    }
    if let Ok(values) = dataset.read_raw::<VarLenUnicode>() {
        return values.first().map(|v| v.as_str().to_string());
    }
    if let Ok(values) = dataset.read_raw::<VarLenAscii>() {
        return values.first().map(|v| v.as_str().to_string());
    }
    // Fixed-length strings convert into any wider fixed buffer.
    if let Ok(values) = dataset.read_raw::<FixedUnicode<FIXED_STRING_BYTES>>() {
        return values.first().map(|v| v.as_str().to_string());
    }
    if let Ok(values) = dataset.read_raw::<FixedAscii<FIXED_STRING_BYTES>>() {
        return values.first().map(|v| v.as_str().to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array3, Array4};
    use std::str::FromStr;
    use tempfile::NamedTempFile;

    fn write_fixture(path: &Path) {
        let file = File::create(path).unwrap();
        let entry = file.create_group("entry").unwrap();
        let detector = entry.create_group("detector").unwrap();

        let stack = Array4::from_shape_fn((1, 5, 4, 6), |(_, n, r, c)| (n * 100 + r * 10 + c) as f64);
        detector
            .new_dataset::<f64>()
            .shape((1, 5, 4, 6))
            .create("data")
            .unwrap()
            .write(&stack)
            .unwrap();

        let wavelength = Array1::from(vec![0.1173]);
        detector
            .new_dataset::<f64>()
            .shape((1,))
            .create("wavelength")
            .unwrap()
            .write(&wavelength)
            .unwrap();
        detector
            .new_dataset::<f64>()
            .shape((1,))
            .create("distance")
            .unwrap()
            .write(&Array1::from(vec![350.0]))
            .unwrap();

        let frames = Array3::from_shape_fn((2, 3, 3), |(n, _, _)| n as f64);
        entry
            .new_dataset::<f64>()
            .shape((2, 3, 3))
            .create("images")
            .unwrap()
            .write(&frames)
            .unwrap();

        let kind = FixedAscii::<16>::from_ascii(b"NXdetector").unwrap();
        detector
            .new_dataset::<FixedAscii<16>>()
            .shape(())
            .create("type")
            .unwrap()
            .write_scalar(&kind)
            .unwrap();
        let location = FixedUnicode::<32>::from_str("beamline 11-BM").unwrap();
        entry
            .new_dataset::<FixedUnicode<32>>()
            .shape(())
            .create("location")
            .unwrap()
            .write_scalar(&location)
            .unwrap();

        let label = VarLenUnicode::from_str("sample A").unwrap();
        entry
            .new_dataset::<VarLenUnicode>()
            .shape(())
            .create("title")
            .unwrap()
            .write_scalar(&label)
            .unwrap();
    }

    #[test]
    fn test_scan_indexes_stacks_in_name_order() {
        let file = NamedTempFile::new().unwrap();
        write_fixture(file.path());

        let mut session = ContainerSession::open(file.path(), ImageDefaults::AREA_DETECTOR).unwrap();
        let scan = session.scan().unwrap();

        assert_eq!(scan.index.len(), 7);
        let first = scan.index.get(1).unwrap();
        assert_eq!(first.path, "/entry/detector/data");
        assert_eq!(first.sub_index, Some(0));
        let last = scan.index.get(7).unwrap();
        assert_eq!(last.path, "/entry/images");
        assert_eq!(last.sub_index, Some(1));

        let header: Vec<&str> = scan.header.iter().map(Comment::as_str).collect();
        assert!(header.contains(&"/entry/detector/wavelength: 0.1173"));
        assert!(header.contains(&"/entry/title: sample A"));
        assert!(header.contains(&"/entry/detector/type: NXdetector"));
        assert!(header.contains(&"/entry/location: beamline 11-BM"));
    }

    #[test]
    fn test_read_stack_frame_with_header_metadata() {
        let file = NamedTempFile::new().unwrap();
        write_fixture(file.path());

        let mut session = ContainerSession::open(file.path(), ImageDefaults::AREA_DETECTOR).unwrap();
        let read = session.read_image(3).unwrap();

        assert_eq!(read.image.data.dim(), (4, 6));
        assert_eq!(read.image.data[[1, 2]], 212.0);
        assert_eq!(read.image.metadata.wavelength, 0.1173);
        assert_eq!(read.image.metadata.distance, 350.0);
        assert!(read.repeat);

        let last = session.read_image(7).unwrap();
        assert_eq!(last.image.data[[0, 0]], 1.0);
        assert!(!last.repeat);
    }

    #[test]
    fn test_read_out_of_range() {
        let file = NamedTempFile::new().unwrap();
        write_fixture(file.path());

        let mut session = ContainerSession::open(file.path(), ImageDefaults::AREA_DETECTOR).unwrap();
        assert!(matches!(
            session.read_image(8),
            Err(Error::CoreError(crystio_core::Error::ImageIndexOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_empty_container_has_no_images() {
        let file = NamedTempFile::new().unwrap();
        {
            let h5 = File::create(file.path()).unwrap();
            h5.create_group("entry").unwrap();
        }
        let mut session = ContainerSession::open(file.path(), ImageDefaults::AREA_DETECTOR).unwrap();
        assert_eq!(session.image_count().unwrap(), 0);
        assert!(matches!(
            session.read_image(1),
            Err(Error::CoreError(crystio_core::Error::NoData(_)))
        ));
    }

    #[test]
    fn test_resume_reuses_scan_for_same_file_only() {
        let file = NamedTempFile::new().unwrap();
        write_fixture(file.path());
        let other = NamedTempFile::new().unwrap();
        write_fixture(other.path());

        let session = ContainerSession::open(file.path(), ImageDefaults::AREA_DETECTOR).unwrap();
        let scan = session.into_scan().unwrap();

        let resumed =
            ContainerSession::resume(file.path(), scan.clone(), ImageDefaults::AREA_DETECTOR).unwrap();
        assert!(resumed.scan.is_some());

        let elsewhere =
            ContainerSession::resume(other.path(), scan, ImageDefaults::AREA_DETECTOR).unwrap();
        assert!(elsewhere.scan.is_none());
    }
}
