use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! corrupt_directory {
    ($msg:expr) => {
        crate::Error::CorruptDirectory {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::CorruptDirectory {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which covers every failure this library can return.
///
/// Absence of a directory is never an error. Parsers report it as `Ok(None)` and the
/// [`crate::File`] facade records it as [`crate::pe::DirectoryStatus::Absent`], so a caller
/// can always tell "not there" apart from "there, but broken".
///
/// # Error Categories
///
/// ## Address and bounds errors
/// - [`Error::OutOfBounds`] - A read or write would cross the end of the buffer
/// - [`Error::UnmappedAddress`] - An RVA does not fall inside any section
///
/// ## Structural errors
/// - [`Error::CorruptDirectory`] - Directory counts or indices disagree with the data
/// - [`Error::CorruptRelocationBlock`] - A relocation block is shorter than its own header
/// - [`Error::Malformed`] - Headers are inconsistent with the PE/COFF format
/// - [`Error::LimitExceeded`] - A declared count exceeds the configured [`crate::ParserConfig`] cap
///
/// ## Input errors
/// - [`Error::NotSupported`] - Not a PE image
/// - [`Error::Empty`] - Empty input
/// - [`Error::FileError`] - Filesystem I/O errors
///
/// # Examples
///
/// ```rust,no_run
/// use pescope::{Error, File};
/// use std::path::Path;
///
/// match File::from_file(Path::new("kernel32.dll")) {
///     Ok(file) => println!("{} sections", file.sections().len()),
///     Err(Error::NotSupported) => eprintln!("Not a PE image"),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Malformed file: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// An out of bound access was attempted while parsing the file.
    ///
    /// Raised whenever a computed offset plus the width of the field to access exceeds the
    /// buffer length.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The RVA could not be mapped into any section.
    ///
    /// Either the file is corrupt or the section table it was translated against is wrong.
    #[error("RVA {0:#010x} is not mapped by any section")]
    UnmappedAddress(u32),

    /// A directory table is inconsistent with the buffer.
    ///
    /// Used for counts that exceed the available data and indices that point outside the
    /// table they refer to, such as an export name ordinal beyond `NumberOfFunctions`.
    #[error("Corrupt directory - {file}:{line}: {message}")]
    CorruptDirectory {
        /// Description of the inconsistency
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A base relocation block declares a size smaller than its 8-byte header.
    #[error("Corrupt relocation block at offset {offset:#x}: SizeOfBlock {size} is smaller than the header")]
    CorruptRelocationBlock {
        /// File offset of the offending block
        offset: usize,
        /// The declared `SizeOfBlock`
        size: u32,
    },

    /// The file is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A declared entry count is larger than the configured limit.
    #[error("{what}: {count} entries exceed the limit of {limit}")]
    LimitExceeded {
        /// Which table hit the limit
        what: &'static str,
        /// The declared or accumulated count
        count: usize,
        /// The configured maximum
        limit: usize,
    },

    /// This file type is not supported.
    ///
    /// The input does not carry the `MZ` / `PE\0\0` signatures or uses an unknown optional
    /// header magic.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` for errors that describe inconsistent input bytes, as opposed to
    /// I/O failures or unsupported formats.
    #[must_use]
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Error::OutOfBounds
                | Error::UnmappedAddress(_)
                | Error::CorruptDirectory { .. }
                | Error::CorruptRelocationBlock { .. }
                | Error::Malformed { .. }
                | Error::LimitExceeded { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_macro_records_location() {
        let err = malformed_error!("bad magic {:#x}", 0x1234);
        match err {
            Error::Malformed {
                message,
                file,
                line,
            } => {
                assert_eq!(message, "bad magic 0x1234");
                assert!(file.ends_with("error.rs"));
                assert!(line > 0);
            }
            _ => panic!("unexpected variant"),
        }
    }

    #[test]
    fn corrupt_directory_display() {
        let err = corrupt_directory!("index {} out of range", 7);
        assert!(err.to_string().contains("index 7 out of range"));
        assert!(err.is_malformed_input());
    }

    #[test]
    fn unmapped_display() {
        assert_eq!(
            Error::UnmappedAddress(0x5000).to_string(),
            "RVA 0x00005000 is not mapped by any section"
        );
        assert!(!Error::NotSupported.is_malformed_input());
    }
}
