//! Cheap content checks run before committing to a full parse.
//!
//! A caller probes several formats against one file and keeps the ones
//! that accept. Validators only look at content; extension handling lives
//! with the format registry.

use crate::map::{CCP4_HEADER_BYTES, CCP4_MAP_TAG, CCP4_TAG_OFFSET};
use crate::records::Delimiters;
use crate::{Error, Result};
use std::borrow::Cow;

/// Lines inspected by the delimited-text check (0-based index bound).
pub const DELIMITED_SCAN_LINES: usize = 1000;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', 0x0D, 0x0A, 0x1A, 0x0A];

fn no_numeric_data() -> Error {
    Error::InvalidFormat("No 2 or more column numeric data found".to_string())
}

/// Decodes bytes as text, rejecting anything containing NUL bytes.
#[must_use]
pub fn as_text(bytes: &[u8]) -> Option<Cow<'_, str>> {
    if bytes.contains(&0) {
        return None;
    }
    Some(String::from_utf8_lossy(bytes))
}

/// Accepts a Q-step file if any line holds two or more numeric tokens.
///
/// Every line is inspected; header and comment lines are simply not
/// counted.
///
/// # Errors
/// Returns [`Error::InvalidFormat`] if no numeric line is found.
pub fn qstep_contents(text: &str) -> Result<usize> {
    let numeric = text
        .lines()
        .map(str::split_whitespace)
        .map(|tokens| tokens.map(str::parse::<f64>).collect::<Vec<_>>())
        .filter(|values| values.len() >= 2 && values.iter().all(std::result::Result::is_ok))
        .count();
    if numeric == 0 {
        return Err(no_numeric_data());
    }
    Ok(numeric)
}

/// Accepts comma/semicolon/whitespace separated columns.
///
/// The first two multi-token lines are tolerated even when they do not
/// parse (column titles); after that any non-numeric token among the first
/// three, or any line with fewer than two tokens, rejects the file. Only
/// the first [`DELIMITED_SCAN_LINES`] lines are examined.
///
/// # Errors
/// Returns [`Error::InvalidFormat`] on a rejected line or when no fully
/// numeric line was seen.
pub fn delimited_contents(text: &str) -> Result<usize> {
    let mut good = 0usize;
    let mut numeric = 0usize;

    for (index, line) in text.lines().enumerate() {
        if index > DELIMITED_SCAN_LINES {
            break;
        }
        let tokens = Delimiters::Flexible.tokenize(line);
        if tokens.len() < 2 {
            if good > 1 {
                return Err(Error::InvalidFormat(format!(
                    "line {} has fewer than two columns",
                    index + 1
                )));
            }
            continue;
        }

        let mut all_numeric = true;
        for token in tokens.iter().take(3) {
            if token.parse::<f64>().is_err() {
                if good > 1 {
                    return Err(Error::InvalidFormat(format!(
                        "non-numeric value '{token}' in line {}",
                        index + 1
                    )));
                }
                all_numeric = false;
            }
        }
        if all_numeric {
            numeric += 1;
        }
        good += 1;
    }

    if numeric == 0 {
        return Err(no_numeric_data());
    }
    Ok(numeric)
}

/// True if the bytes start with the PNG signature.
#[must_use]
pub fn looks_like_png(bytes: &[u8]) -> bool {
    bytes.starts_with(&PNG_SIGNATURE)
}

/// True if the bytes hold a full CCP4 header carrying the `MAP ` tag.
#[must_use]
pub fn looks_like_ccp4(bytes: &[u8]) -> bool {
    bytes.len() >= CCP4_HEADER_BYTES
        && bytes[CCP4_TAG_OFFSET..CCP4_TAG_OFFSET + CCP4_MAP_TAG.len()] == CCP4_MAP_TAG
}

/// True if an HDF5 superblock signature sits at offset 0 or at any
/// power-of-two user-block offset from 512 bytes on.
#[must_use]
pub fn looks_like_hdf5(bytes: &[u8]) -> bool {
    if bytes.starts_with(&HDF5_SIGNATURE) {
        return true;
    }
    let mut offset = 512usize;
    while offset + HDF5_SIGNATURE.len() <= bytes.len() {
        if bytes[offset..].starts_with(&HDF5_SIGNATURE) {
            return true;
        }
        offset *= 2;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qstep_accepts_numeric_with_header() {
        let text = "title line\nwavelength=1.54\n0.01 100 1.0\n0.02 90 1.0\n";
        assert_eq!(qstep_contents(text).unwrap(), 2);
    }

    #[test]
    fn test_qstep_rejects_text() {
        assert!(qstep_contents("just words here\nand more\n").is_err());
        assert!(qstep_contents("").is_err());
        assert!(qstep_contents("1\n2\n3\n").is_err());
    }

    #[test]
    fn test_delimited_tolerates_leading_titles() {
        let text = "angle,counts\n10.0,5\n10.5,6\n";
        assert_eq!(delimited_contents(text).unwrap(), 2);
    }

    #[test]
    fn test_delimited_rejects_late_garbage() {
        let text = "10.0,5\n10.5,6\n11.0,7\nend,of,data\n";
        assert!(delimited_contents(text).is_err());
    }

    #[test]
    fn test_delimited_rejects_short_line_after_data() {
        let text = "10.0,5\n10.5,6\n11.0,7\n\n";
        assert!(delimited_contents(text).is_err());
    }

    #[test]
    fn test_delimited_requires_numeric_line() {
        assert!(delimited_contents("a,b\nc,d\n").is_err());
        assert!(delimited_contents("").is_err());
    }

    #[test]
    fn test_delimited_scan_is_bounded() {
        let mut text = String::new();
        for i in 0..=DELIMITED_SCAN_LINES {
            text.push_str(&format!("{i},1\n"));
        }
        text.push_str("garbage,line\n");
        assert!(delimited_contents(&text).is_ok());
    }

    #[test]
    fn test_validation_is_idempotent() {
        let text = "0.01 1\n0.02 2\n";
        assert_eq!(qstep_contents(text).ok(), qstep_contents(text).ok());
        assert_eq!(delimited_contents(text).ok(), delimited_contents(text).ok());
    }

    #[test]
    fn test_binary_signatures() {
        let mut png = PNG_SIGNATURE.to_vec();
        png.extend_from_slice(&[0; 16]);
        assert!(looks_like_png(&png));
        assert!(!looks_like_hdf5(&png));

        let mut h5 = vec![0u8; 512];
        h5.extend_from_slice(&HDF5_SIGNATURE);
        assert!(looks_like_hdf5(&h5));
        assert!(!looks_like_png(&h5));
    }

    #[test]
    fn test_ccp4_tag_check() {
        let mut header = vec![0u8; CCP4_HEADER_BYTES];
        assert!(!looks_like_ccp4(&header));
        header[CCP4_TAG_OFFSET..CCP4_TAG_OFFSET + 4].copy_from_slice(&CCP4_MAP_TAG);
        assert!(looks_like_ccp4(&header));
        assert!(!looks_like_ccp4(&header[..CCP4_HEADER_BYTES - 1]));
    }

    #[test]
    fn test_as_text_rejects_nul() {
        assert!(as_text(b"1 2\n").is_some());
        assert!(as_text(b"1\0 2\n").is_none());
    }
}
