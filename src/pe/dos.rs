//! MS-DOS stub header.
//!
//! Only the two fields needed to reach the NT headers are decoded: the `MZ` magic and
//! `e_lfanew`, the file offset of the `PE\0\0` signature.

use crate::{
    file::io::{read_le_from, write_le_at},
    pe::dump::{impl_display_via_dump, FieldDump},
    Error, Result,
};

/// `MZ`
pub const DOS_MAGIC: u16 = 0x5A4D;

/// `PE\0\0`
pub const PE_SIGNATURE: u32 = 0x0000_4550;

/// `IMAGE_DOS_HEADER`, reduced to the fields used for navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosHeader {
    /// Magic number, `MZ` for every valid image
    pub e_magic: u16,
    /// File offset of the PE signature
    pub e_lfanew: u32,
}

impl DosHeader {
    /// Size of the full DOS header on disk
    pub const SIZE: usize = 64;

    /// Offset of `e_lfanew` within the DOS header
    const LFANEW_OFFSET: usize = 0x3C;

    /// Decode the DOS header at the start of `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] if the magic is not `MZ`, and
    /// [`crate::Error::OutOfBounds`] if the buffer is shorter than the DOS header.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let e_magic = read_le_from::<u16>(data, 0)?;
        if e_magic != DOS_MAGIC {
            return Err(Error::NotSupported);
        }

        Ok(DosHeader {
            e_magic,
            e_lfanew: read_le_from(data, Self::LFANEW_OFFSET)?,
        })
    }

    /// Write `e_magic` and `e_lfanew` back into `data`, leaving the stub untouched.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the buffer is shorter than the DOS header.
    pub fn encode(&self, data: &mut [u8]) -> Result<()> {
        if data.len() < Self::SIZE {
            return Err(Error::OutOfBounds);
        }

        let mut offset = 0;
        write_le_at(data, &mut offset, self.e_magic)?;
        let mut offset = Self::LFANEW_OFFSET;
        write_le_at(data, &mut offset, self.e_lfanew)
    }
}

impl FieldDump for DosHeader {
    fn type_name(&self) -> &'static str {
        "IMAGE_DOS_HEADER"
    }

    fn fields(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("e_magic", u64::from(self.e_magic)),
            ("e_lfanew", u64::from(self.e_lfanew)),
        ]
    }
}

impl_display_via_dump!(DosHeader);
