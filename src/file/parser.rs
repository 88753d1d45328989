//! Cursor-based byte stream parser for PE structures.
//!
//! [`crate::file::parser::Parser`] wraps a byte slice and a position. It is used wherever a
//! structure is read as a sequence of fields, e.g. the COFF header, the section table or a
//! relocation block, so that each decoder only has to list its fields in order.
//!
//! # Usage Examples
//!
//! ```rust
//! use pescope::Parser;
//!
//! // An 8-byte relocation block header followed by one entry
//! let data = [0x00, 0x10, 0x00, 0x00, 0x0A, 0x00, 0x00, 0x00, 0xA3, 0x00];
//! let mut parser = Parser::new(&data);
//!
//! let page = parser.read_le::<u32>()?;
//! let size = parser.read_le::<u32>()?;
//! let word = parser.read_le::<u16>()?;
//! assert_eq!((page, size, word), (0x1000, 10, 0x00A3));
//! assert!(!parser.has_more_data());
//! # Ok::<(), pescope::Error>(())
//! ```
//!
//! # Error Handling
//!
//! Every read is bounds-checked and fails with [`crate::Error::OutOfBounds`]. A failed read does
//! not move the cursor.

use crate::{
    file::io::{read_cstr_at, read_le_from, PeIO},
    Error::OutOfBounds,
    Result,
};

/// A cursor over a borrowed byte slice.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Create a parser positioned at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `offset` is beyond the end of `data`.
    pub fn at(data: &'a [u8], offset: usize) -> Result<Self> {
        let mut parser = Parser::new(data);
        parser.seek(offset)?;
        Ok(parser)
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the current position to the specified index.
    ///
    /// Seeking to exactly the end of the data is allowed; any read from there fails.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(OutOfBounds);
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing by step would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        self.position = self.calc_end_position(step)?;
        Ok(())
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Read a value at the current position without advancing.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if there are not enough bytes.
    pub fn peek_le<T: PeIO>(&self) -> Result<T> {
        read_le_from(self.data, self.position)
    }

    /// Read a little-endian value and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if there are not enough bytes.
    pub fn read_le<T: PeIO>(&mut self) -> Result<T> {
        let value = self.peek_le::<T>()?;
        self.position += std::mem::size_of::<T>();
        Ok(value)
    }

    /// Read a zero-terminated ASCII string and advance past its terminator.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the string runs off the end of the data and
    /// [`crate::Error::Malformed`] if it is longer than `max_len`.
    pub fn read_cstr(&mut self, max_len: usize) -> Result<String> {
        let value = read_cstr_at(self.data, self.position, max_len)?;
        // One char per input byte, so count chars rather than UTF-8 length
        self.position += value.chars().count() + 1;
        Ok(value)
    }

    /// Returns the number of bytes remaining from the current position.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Ensures that at least `needed` bytes are available from the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `needed` bytes remain.
    pub fn ensure_remaining(&self, needed: usize) -> Result<()> {
        if self.remaining() < needed {
            return Err(OutOfBounds);
        }
        Ok(())
    }

    /// Calculates an end position safely with overflow checking.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the calculation would overflow
    /// or if the resulting position exceeds the data length.
    pub fn calc_end_position(&self, length: usize) -> Result<usize> {
        let end = self.position.checked_add(length).ok_or(OutOfBounds)?;

        if end > self.data.len() {
            return Err(OutOfBounds);
        }

        Ok(end)
    }

    /// Reads a slice of bytes of the specified length from the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading `length` bytes would exceed the data.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self.calc_end_position(length)?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Reads a fixed-size byte array, e.g. an 8-byte section name.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `N` bytes remain.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }
}
