//! Little-endian, bounds-checked field access over raw PE buffers.
//!
//! Every structure in this crate is decoded through the functions in this module. A structure
//! is never a live view into the buffer: it is read once from a `(buffer, offset)` pair into a
//! plain record, and written back explicitly through the `write_*` functions. That keeps the
//! points where the buffer is mutated visible at the call site.
//!
//! # Key Components
//!
//! ## Core Trait
//! - [`crate::file::io::PeIO`] - Conversion between fixed-width integers and their byte arrays
//!
//! ## Reading
//! - [`crate::file::io::read_le`] - Read a value from the start of a buffer
//! - [`crate::file::io::read_le_at`] - Read a value at an offset and advance the offset
//! - [`crate::file::io::read_le_from`] - Read a value at a fixed offset
//! - [`crate::file::io::slice_at`] - Bounds-checked sub-slice
//! - [`crate::file::io::read_cstr_at`] - Zero-terminated ASCII string
//!
//! ## Writing
//! - [`crate::file::io::write_le`] - Write a value to the start of a buffer
//! - [`crate::file::io::write_le_at`] - Write a value at an offset and advance the offset
//!
//! # Usage Examples
//!
//! ```rust
//! use pescope::file::io::{read_le_at, write_le_at};
//!
//! let mut data = [0u8; 6];
//! let mut offset = 0;
//! write_le_at(&mut data, &mut offset, 0x5A4Du16)?;
//! write_le_at(&mut data, &mut offset, 0x0000_0080u32)?;
//! assert_eq!(offset, 6);
//!
//! let mut offset = 0;
//! let magic: u16 = read_le_at(&data, &mut offset)?;
//! let lfanew: u32 = read_le_at(&data, &mut offset)?;
//! assert_eq!((magic, lfanew), (0x5A4D, 0x80));
//! # Ok::<(), pescope::Error>(())
//! ```
//!
//! # Error Handling
//!
//! All functions return [`crate::Error::OutOfBounds`] when the requested range crosses the end
//! of the buffer, including when `offset + width` overflows `usize`.
//!
//! # Thread Safety
//!
//! All functions are pure and may be called concurrently on shared read-only buffers.

use crate::{Error::OutOfBounds, Result};

/// Conversion between a fixed-width integer and its little-endian byte representation.
///
/// Implemented for the integer widths used by PE/COFF structures.
pub trait PeIO: Sized {
    /// The fixed-size byte array for this type (e.g. `[u8; 4]` for `u32`).
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in little-endian
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_pe_io {
    ($($ty:ty),*) => {
        $(
            impl PeIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_pe_io!(u8, i8, u16, i16, u32, i32, u64, i64);

/// Returns the end of `offset..offset + len`, or [`crate::Error::OutOfBounds`] when the range
/// does not fit into `data_len`.
fn checked_end(data_len: usize, offset: usize, len: usize) -> Result<usize> {
    match offset.checked_add(len) {
        Some(end) if end <= data_len => Ok(end),
        _ => Err(OutOfBounds),
    }
}

/// Safely reads a value of type `T` in little-endian byte order from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le<T: PeIO>(data: &[u8]) -> Result<T> {
    read_le_from(data, 0)
}

/// Safely reads a value of type `T` at `offset` and advances `offset` past it.
///
/// # Arguments
/// * `data`   - The byte buffer to read from
/// * `offset` - Position to read at, advanced by `size_of::<T>()` on success
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes. The offset is left
/// unchanged in that case.
pub fn read_le_at<T: PeIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let value = read_le_from(data, *offset)?;
    *offset += std::mem::size_of::<T>();
    Ok(value)
}

/// Safely reads a value of type `T` at a fixed `offset`, without any cursor.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le_from<T: PeIO>(data: &[u8], offset: usize) -> Result<T> {
    let end = checked_end(data.len(), offset, std::mem::size_of::<T>())?;
    let Ok(read) = data[offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    Ok(T::from_le_bytes(read))
}

/// Safely writes `value` in little-endian byte order to the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer is too small.
pub fn write_le<T: PeIO>(data: &mut [u8], value: T) -> Result<()> {
    let mut offset = 0_usize;
    write_le_at(data, &mut offset, value)
}

/// Safely writes `value` at `offset` and advances `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer is too small. Nothing is written in that
/// case.
pub fn write_le_at<T: PeIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let type_len = std::mem::size_of::<T>();
    let end = checked_end(data.len(), *offset, type_len)?;

    data[*offset..end].copy_from_slice(value.to_le_bytes().as_ref());
    *offset = end;

    Ok(())
}

/// Returns `data[offset..offset + len]` after bounds checking.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the range crosses the end of `data`.
pub fn slice_at(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    let end = checked_end(data.len(), offset, len)?;
    Ok(&data[offset..end])
}

/// Decodes a zero-terminated ASCII string starting at `offset`.
///
/// The string may hold up to `max_len` bytes, so at most `max_len + 1` bytes are scanned for
/// the terminator. Bytes outside the ASCII range are replaced with `U+FFFD`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `offset` is outside the buffer or the string runs
/// into the end of the buffer before its terminator, and [`crate::Error::Malformed`] if the
/// string is longer than `max_len` bytes.
pub fn read_cstr_at(data: &[u8], offset: usize, max_len: usize) -> Result<String> {
    if offset >= data.len() {
        return Err(OutOfBounds);
    }

    let scan = max_len.saturating_add(1);
    let window = &data[offset..data.len().min(offset.saturating_add(scan))];
    let Some(end) = window.iter().position(|&b| b == 0) else {
        if window.len() < scan {
            return Err(OutOfBounds);
        }
        return Err(malformed_error!(
            "String at offset {:#x} is longer than {} bytes",
            offset,
            max_len
        ));
    };

    Ok(window[..end]
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '\u{FFFD}' })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn read_le_u8() {
        let result = read_le::<u8>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x01);
    }

    #[test]
    fn read_le_u16() {
        let result = read_le::<u16>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0201);
    }

    #[test]
    fn read_le_u32() {
        let result = read_le::<u32>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0403_0201);
    }

    #[test]
    fn read_le_u64() {
        let result = read_le::<u64>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0807_0605_0403_0201);
    }

    #[test]
    fn read_le_at_advances() {
        let mut offset = 2;
        let value = read_le_at::<u32>(&TEST_BUFFER, &mut offset).unwrap();
        assert_eq!(value, 0x0605_0403);
        assert_eq!(offset, 6);
    }

    #[test]
    fn read_le_from_fixed() {
        assert_eq!(read_le_from::<u16>(&TEST_BUFFER, 6).unwrap(), 0x0807);
        assert!(matches!(
            read_le_from::<u16>(&TEST_BUFFER, 7),
            Err(Error::OutOfBounds)
        ));
    }

    #[test]
    fn read_out_of_bounds_keeps_offset() {
        let mut offset = 6;
        let result = read_le_at::<u32>(&TEST_BUFFER, &mut offset);
        assert!(matches!(result, Err(Error::OutOfBounds)));
        assert_eq!(offset, 6);
    }

    #[test]
    fn read_offset_overflow() {
        let mut offset = usize::MAX - 1;
        assert!(matches!(
            read_le_at::<u32>(&TEST_BUFFER, &mut offset),
            Err(Error::OutOfBounds)
        ));
    }

    #[test]
    fn write_le_at_advances() {
        let mut buffer = [0u8; 8];
        let mut offset = 0;
        write_le_at(&mut buffer, &mut offset, 0xBEEFu16).unwrap();
        write_le_at(&mut buffer, &mut offset, 0xDEAD_C0DEu32).unwrap();
        assert_eq!(offset, 6);
        assert_eq!(buffer, [0xEF, 0xBE, 0xDE, 0xC0, 0xAD, 0xDE, 0x00, 0x00]);
    }

    #[test]
    fn write_le_out_of_bounds() {
        let mut buffer = [0u8; 3];
        assert!(matches!(
            write_le(&mut buffer, 1u32),
            Err(Error::OutOfBounds)
        ));
        assert_eq!(buffer, [0, 0, 0]);
    }

    #[test]
    fn slice_bounds() {
        assert_eq!(slice_at(&TEST_BUFFER, 2, 3).unwrap(), &[0x03, 0x04, 0x05]);
        assert_eq!(slice_at(&TEST_BUFFER, 8, 0).unwrap(), &[] as &[u8]);
        assert!(slice_at(&TEST_BUFFER, 7, 2).is_err());
        assert!(slice_at(&TEST_BUFFER, usize::MAX, 2).is_err());
    }

    #[test]
    fn cstr() {
        let data = b"foo\0bar\0baz";
        assert_eq!(read_cstr_at(data, 0, 256).unwrap(), "foo");
        assert_eq!(read_cstr_at(data, 4, 256).unwrap(), "bar");
        // Runs into the end of the buffer
        assert!(matches!(
            read_cstr_at(data, 8, 256),
            Err(Error::OutOfBounds)
        ));
        // Longer than allowed
        assert!(matches!(
            read_cstr_at(data, 0, 2),
            Err(Error::Malformed { .. })
        ));
        assert!(matches!(read_cstr_at(data, 11, 8), Err(Error::OutOfBounds)));
    }

    #[test]
    fn cstr_at_length_limit() {
        let data = b"abcd\0";
        assert_eq!(read_cstr_at(data, 0, 4).unwrap(), "abcd");
        assert!(matches!(
            read_cstr_at(data, 0, 3),
            Err(Error::Malformed { .. })
        ));
        assert_eq!(read_cstr_at(b"\0", 0, 0).unwrap(), "");
    }

    #[test]
    fn cstr_non_ascii() {
        let data = [b'a', 0xE9, b'b', 0];
        assert_eq!(read_cstr_at(&data, 0, 16).unwrap(), "a\u{FFFD}b");
    }
}
