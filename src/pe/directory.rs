//! Per-directory parse outcome.
//!
//! A PE image declares up to 16 directories and any of them can be damaged independently.
//! Directory parsers never decide whether a failure is fatal. They return
//! `Result<Option<T>>` and [`DirectoryStatus`] turns that into one of three states, so a
//! broken relocation table does not hide a perfectly readable export table.
//!
//! # Examples
//!
//! ```rust
//! use pescope::{pe::DirectoryStatus, Error};
//!
//! let parsed = DirectoryStatus::from_result(Ok(Some(3u32)));
//! assert_eq!(parsed.parsed(), Some(&3));
//!
//! let absent: DirectoryStatus<u32> = DirectoryStatus::from_result(Ok(None));
//! assert!(absent.is_absent());
//!
//! let broken: DirectoryStatus<u32> = DirectoryStatus::from_result(Err(Error::OutOfBounds));
//! assert!(broken.is_malformed());
//! ```

use crate::{
    pe::{export::ExportTable, import::ImportedDll, reloc::RelocationBlock},
    Error, Result,
};

/// Outcome of parsing one directory
#[derive(Debug)]
pub enum DirectoryStatus<T> {
    /// The image does not declare this directory
    Absent,
    /// The directory was parsed successfully
    Parsed(T),
    /// The directory is declared but could not be parsed
    Malformed(Error),
}

impl<T> DirectoryStatus<T> {
    /// Map a parser result: `Ok(None)` is absent, `Ok(Some)` parsed and `Err` malformed.
    pub fn from_result(result: Result<Option<T>>) -> Self {
        match result {
            Ok(None) => DirectoryStatus::Absent,
            Ok(Some(value)) => DirectoryStatus::Parsed(value),
            Err(error) => DirectoryStatus::Malformed(error),
        }
    }

    /// Returns `true` if the directory is not declared.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, DirectoryStatus::Absent)
    }

    /// Returns `true` if the directory was parsed.
    #[must_use]
    pub fn is_parsed(&self) -> bool {
        matches!(self, DirectoryStatus::Parsed(_))
    }

    /// Returns `true` if the directory is declared but broken.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, DirectoryStatus::Malformed(_))
    }

    /// The parsed value, if any.
    #[must_use]
    pub fn parsed(&self) -> Option<&T> {
        match self {
            DirectoryStatus::Parsed(value) => Some(value),
            _ => None,
        }
    }

    /// The error that made the directory unreadable, if any.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        match self {
            DirectoryStatus::Malformed(error) => Some(error),
            _ => None,
        }
    }

    /// Convert back into the parser result shape.
    ///
    /// # Errors
    /// Returns the recorded error for a malformed directory.
    pub fn into_result(self) -> Result<Option<T>> {
        match self {
            DirectoryStatus::Absent => Ok(None),
            DirectoryStatus::Parsed(value) => Ok(Some(value)),
            DirectoryStatus::Malformed(error) => Err(error),
        }
    }
}

/// Parse status of every directory [`crate::File::directories`] understands
#[derive(Debug)]
pub struct DirectoryReport {
    /// Export directory and function table
    pub exports: DirectoryStatus<ExportTable>,
    /// Base relocation blocks
    pub relocations: DirectoryStatus<Vec<RelocationBlock>>,
    /// Import descriptors and their functions
    pub imports: DirectoryStatus<Vec<ImportedDll>>,
}

impl DirectoryReport {
    /// Names and errors of all malformed directories.
    #[must_use]
    pub fn malformed(&self) -> Vec<(&'static str, &Error)> {
        [
            ("exports", self.exports.error()),
            ("relocations", self.relocations.error()),
            ("imports", self.imports.error()),
        ]
        .into_iter()
        .filter_map(|(name, error)| error.map(|error| (name, error)))
        .collect()
    }

    /// Returns `true` if no directory is malformed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.exports.is_malformed()
            && !self.relocations.is_malformed()
            && !self.imports.is_malformed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tri_state() {
        let parsed = DirectoryStatus::from_result(Ok(Some(vec![1u8, 2])));
        assert!(parsed.is_parsed());
        assert!(!parsed.is_absent());
        assert_eq!(parsed.parsed().map(Vec::len), Some(2));
        assert!(parsed.error().is_none());

        let absent: DirectoryStatus<Vec<u8>> = DirectoryStatus::from_result(Ok(None));
        assert!(absent.is_absent());
        assert!(absent.parsed().is_none());
        assert!(matches!(absent.into_result(), Ok(None)));

        let malformed: DirectoryStatus<Vec<u8>> =
            DirectoryStatus::from_result(Err(Error::UnmappedAddress(0x4000)));
        assert!(malformed.is_malformed());
        assert!(matches!(
            malformed.error(),
            Some(Error::UnmappedAddress(0x4000))
        ));
        assert!(malformed.into_result().is_err());
    }

    #[test]
    fn report() {
        let report = DirectoryReport {
            exports: DirectoryStatus::Absent,
            relocations: DirectoryStatus::Malformed(Error::CorruptRelocationBlock {
                offset: 0x810,
                size: 4,
            }),
            imports: DirectoryStatus::Parsed(Vec::new()),
        };

        assert!(!report.is_clean());
        let malformed = report.malformed();
        assert_eq!(malformed.len(), 1);
        assert_eq!(malformed[0].0, "relocations");
    }
}
