use super::Backend;
use crate::{file::io::slice_at, Result};

/// Input file backed by an owned buffer
#[derive(Debug)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Create a new memory backend
    ///
    /// ## Arguments
    /// * 'data' - The data buffer to consume
    pub fn new(data: Vec<u8>) -> Memory {
        Memory { data }
    }
}

impl Backend for Memory {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        slice_at(&self.data, offset, len)
    }

    fn data(&self) -> &[u8] {
        self.data.as_slice()
    }

    fn data_mut(&mut self) -> Option<&mut [u8]> {
        Some(self.data.as_mut_slice())
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}
