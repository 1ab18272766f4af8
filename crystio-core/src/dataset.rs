//! Image index for hierarchical containers.
//!
//! A container scan reports every dataset it visits; datasets whose name
//! ends in a recognised keyword and whose rank can hold images are turned
//! into one or more entries. Entry `k` (1-based) then names the dataset and
//! the frame to slice out of it.

use crate::{Error, Result};

/// Dataset name suffixes that mark image data.
pub const IMAGE_KEYWORDS: [&str; 2] = ["data", "images"];

/// One image location inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetEntry {
    /// Absolute dataset path.
    pub path: String,
    /// Frame along the stacking axis; `None` for a plain 2-D dataset.
    pub sub_index: Option<usize>,
}

/// How to cut one 2-D image out of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSelection {
    /// The whole rank-2 dataset.
    Whole,
    /// `[n, .., ..]` of a rank-3 stack.
    Frame(usize),
    /// `[0, n, .., ..]` of a rank-4 stack.
    StackFrame(usize),
}

impl DatasetEntry {
    /// Selection for this entry given the dataset's actual rank.
    ///
    /// # Errors
    /// Returns [`Error::UnexpectedRank`] if the rank no longer matches the
    /// entry.
    pub fn selection(&self, rank: usize) -> Result<ImageSelection> {
        match (self.sub_index, rank) {
            (None, _) => Ok(ImageSelection::Whole),
            (Some(n), 3) => Ok(ImageSelection::Frame(n)),
            (Some(n), 4) => Ok(ImageSelection::StackFrame(n)),
            (Some(_), rank) => Err(Error::UnexpectedRank {
                path: self.path.clone(),
                rank,
            }),
        }
    }
}

/// Ordered map from 1-based image number to its location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetIndex {
    entries: Vec<DatasetEntry>,
}

impl DatasetIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from `(path, shape)` pairs in traversal order.
    pub fn from_nodes<'a, I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [usize])>,
    {
        let mut index = Self::new();
        for (path, shape) in nodes {
            index.register(path, shape);
        }
        index
    }

    /// Registers a visited dataset. Returns the number of images added.
    ///
    /// Rank 4 is taken as `(1, n, h, w)` and yields `n` entries, rank 3 as
    /// `(n, h, w)`, rank 2 as a single image.
    pub fn register(&mut self, path: &str, shape: &[usize]) -> usize {
        if !IMAGE_KEYWORDS.iter().any(|k| path.ends_with(k)) {
            return 0;
        }
        let before = self.entries.len();
        match shape.len() {
            4 => self.push_frames(path, shape[1]),
            3 => self.push_frames(path, shape[0]),
            2 => self.entries.push(DatasetEntry {
                path: path.to_string(),
                sub_index: None,
            }),
            _ => log::debug!("Skipping entry {path}. Shape is {shape:?}"),
        }
        self.entries.len() - before
    }

    fn push_frames(&mut self, path: &str, count: usize) {
        self.entries.extend((0..count).map(|i| DatasetEntry {
            path: path.to_string(),
            sub_index: Some(i),
        }));
    }

    /// Number of images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no image was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up image `number` (1-based).
    ///
    /// # Errors
    /// Returns [`Error::ImageIndexOutOfRange`] for 0 or a number past the
    /// end.
    pub fn get(&self, number: usize) -> Result<&DatasetEntry> {
        number
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .ok_or(Error::ImageIndexOutOfRange {
                index: number,
                count: self.entries.len(),
            })
    }

    /// Iterates over entries in image order.
    pub fn iter(&self) -> impl Iterator<Item = &DatasetEntry> {
        self.entries.iter()
    }
}
