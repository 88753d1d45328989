//! Physical file backend for memory-mapped I/O.
//!
//! [`crate::file::physical::Physical`] maps an image from disk read-only with `memmap2`, so that
//! large files can be inspected without reading them into memory up front. Mapped data is never
//! writable; images that need in-place edits should be loaded with [`crate::File::from_mem`].

use super::Backend;
use crate::{file::io::slice_at, Error::FileError, Result};

use memmap2::Mmap;
use std::{fs, path::Path};

/// A file backend that uses memory-mapped I/O for efficient access to files on disk.
#[derive(Debug)]
pub struct Physical {
    /// Memory-mapped file data
    data: Mmap,
}

impl Physical {
    /// Map the file at `path` into memory.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = fs::File::open(path).map_err(FileError)?;

        // The mapping is read-only. Concurrent modification of the file on disk by another
        // process is outside of what this crate can guard against.
        let mmap = unsafe { Mmap::map(&file) }.map_err(FileError)?;

        Ok(Physical { data: mmap })
    }
}

impl Backend for Physical {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        slice_at(&self.data, offset, len)
    }

    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn data_mut(&mut self) -> Option<&mut [u8]> {
        None
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical() {
        let temp_path = std::env::temp_dir().join("pescope_physical_backend.bin");
        let test_data = vec![0x4D, 0x5A, 0x90, 0x00, 0xAA, 0xBB];
        std::fs::write(&temp_path, &test_data).unwrap();

        let mut physical = Physical::new(&temp_path).unwrap();
        assert_eq!(physical.len(), 6);
        assert_eq!(physical.data(), test_data.as_slice());
        assert_eq!(physical.data_slice(4, 2).unwrap(), &[0xAA, 0xBB]);
        assert!(physical.data_slice(5, 2).is_err());
        assert!(physical.data_slice(usize::MAX, 1).is_err());
        assert!(physical.data_mut().is_none());

        std::fs::remove_file(&temp_path).unwrap();
    }

    #[test]
    fn test_physical_invalid_file_path() {
        let result = Physical::new("/nonexistent/path/to/file.dll");
        match result {
            Err(FileError(io_error)) => {
                assert_eq!(io_error.kind(), std::io::ErrorKind::NotFound);
            }
            _ => panic!("Expected FileError"),
        }
    }
}
