//! COFF file header (`IMAGE_FILE_HEADER`).
//!
//! Directly follows the `PE\0\0` signature. Besides descriptive fields it carries the two
//! values needed to reach the section table: `number_of_sections` and
//! `size_of_optional_header`.

use bitflags::bitflags;

use crate::{
    file::{io::write_le_at, parser::Parser},
    pe::dump::{impl_display_via_dump, FieldDump},
    Error, Result,
};

bitflags! {
    /// `IMAGE_FILE_*` characteristics of the image
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FileCharacteristics: u16 {
        /// Relocation information was stripped from the file
        const RELOCS_STRIPPED = 0x0001;
        /// The file is executable
        const EXECUTABLE_IMAGE = 0x0002;
        /// COFF line numbers were stripped from the file
        const LINE_NUMS_STRIPPED = 0x0004;
        /// COFF symbol table entries were stripped from the file
        const LOCAL_SYMS_STRIPPED = 0x0008;
        /// Aggressively trim the working set (obsolete)
        const AGGRESSIVE_WS_TRIM = 0x0010;
        /// The application can handle addresses larger than 2 GiB
        const LARGE_ADDRESS_AWARE = 0x0020;
        /// Bytes of word are reversed (obsolete)
        const BYTES_REVERSED_LO = 0x0080;
        /// The computer supports 32-bit words
        const MACHINE_32BIT = 0x0100;
        /// Debugging information was removed
        const DEBUG_STRIPPED = 0x0200;
        /// Copy the image to the swap file when run from removable media
        const REMOVABLE_RUN_FROM_SWAP = 0x0400;
        /// Copy the image to the swap file when run from the network
        const NET_RUN_FROM_SWAP = 0x0800;
        /// The image is a system file
        const SYSTEM = 0x1000;
        /// The image is a DLL
        const DLL = 0x2000;
        /// The file should be run only on a uniprocessor computer
        const UP_SYSTEM_ONLY = 0x4000;
        /// Bytes of word are reversed (obsolete)
        const BYTES_REVERSED_HI = 0x8000;
    }
}

/// `IMAGE_FILE_HEADER`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoffHeader {
    /// Target machine (`IMAGE_FILE_MACHINE_*`)
    pub machine: u16,
    /// Number of entries in the section table
    pub number_of_sections: u16,
    /// Link time, seconds since 1970-01-01
    pub time_date_stamp: u32,
    /// File offset of the COFF symbol table, 0 if none
    pub pointer_to_symbol_table: u32,
    /// Number of COFF symbols
    pub number_of_symbols: u32,
    /// Size of the optional header that follows
    pub size_of_optional_header: u16,
    /// `IMAGE_FILE_*` flags, see [`FileCharacteristics`]
    pub characteristics: u16,
}

/// `IMAGE_FILE_MACHINE_I386`
pub const MACHINE_I386: u16 = 0x014C;
/// `IMAGE_FILE_MACHINE_AMD64`
pub const MACHINE_AMD64: u16 = 0x8664;
/// `IMAGE_FILE_MACHINE_ARM64`
pub const MACHINE_ARM64: u16 = 0xAA64;

impl CoffHeader {
    /// Size of the COFF header on disk
    pub const SIZE: usize = 20;

    /// Decode the COFF header at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 20 bytes are available.
    pub fn decode(data: &[u8], offset: usize) -> Result<Self> {
        let mut parser = Parser::at(data, offset)?;
        parser.ensure_remaining(Self::SIZE)?;

        Ok(CoffHeader {
            machine: parser.read_le()?,
            number_of_sections: parser.read_le()?,
            time_date_stamp: parser.read_le()?,
            pointer_to_symbol_table: parser.read_le()?,
            number_of_symbols: parser.read_le()?,
            size_of_optional_header: parser.read_le()?,
            characteristics: parser.read_le()?,
        })
    }

    /// Write the COFF header at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 20 bytes are available.
    pub fn encode(&self, data: &mut [u8], offset: usize) -> Result<()> {
        if offset.checked_add(Self::SIZE).is_none_or(|end| end > data.len()) {
            return Err(Error::OutOfBounds);
        }

        let mut cursor = offset;
        write_le_at(data, &mut cursor, self.machine)?;
        write_le_at(data, &mut cursor, self.number_of_sections)?;
        write_le_at(data, &mut cursor, self.time_date_stamp)?;
        write_le_at(data, &mut cursor, self.pointer_to_symbol_table)?;
        write_le_at(data, &mut cursor, self.number_of_symbols)?;
        write_le_at(data, &mut cursor, self.size_of_optional_header)?;
        write_le_at(data, &mut cursor, self.characteristics)
    }

    /// Parsed characteristic flags.
    #[must_use]
    pub fn flags(&self) -> FileCharacteristics {
        FileCharacteristics::from_bits_retain(self.characteristics)
    }

    /// Returns `true` if the image is a DLL.
    #[must_use]
    pub fn is_dll(&self) -> bool {
        self.flags().contains(FileCharacteristics::DLL)
    }
}

impl FieldDump for CoffHeader {
    fn type_name(&self) -> &'static str {
        "IMAGE_FILE_HEADER"
    }

    fn fields(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("Machine", u64::from(self.machine)),
            ("NumberOfSections", u64::from(self.number_of_sections)),
            ("TimeDateStamp", u64::from(self.time_date_stamp)),
            ("PointerToSymbolTable", u64::from(self.pointer_to_symbol_table)),
            ("NumberOfSymbols", u64::from(self.number_of_symbols)),
            ("SizeOfOptionalHeader", u64::from(self.size_of_optional_header)),
            ("Characteristics", u64::from(self.characteristics)),
        ]
    }
}

impl_display_via_dump!(CoffHeader);
