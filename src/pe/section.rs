//! Section header table.
//!
//! Each section header describes one mapping window: `virtual_size` bytes at `virtual_address`
//! in the loaded image, backed by `size_of_raw_data` bytes at `pointer_to_raw_data` in the file.
//! The table is read once and is only changed through explicit [`SectionHeader::encode`] calls.

use bitflags::bitflags;

use crate::{
    config::ParserConfig,
    file::{
        io::{slice_at, write_le_at},
        parser::Parser,
    },
    pe::dump::{impl_display_via_dump, FieldDump},
    Error, Result,
};

bitflags! {
    /// `IMAGE_SCN_*` section characteristics
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SectionCharacteristics: u32 {
        /// The section contains executable code
        const CNT_CODE = 0x0000_0020;
        /// The section contains initialized data
        const CNT_INITIALIZED_DATA = 0x0000_0040;
        /// The section contains uninitialized data
        const CNT_UNINITIALIZED_DATA = 0x0000_0080;
        /// The section contains comments or other information (object files only)
        const LNK_INFO = 0x0000_0200;
        /// The section will not become part of the image (object files only)
        const LNK_REMOVE = 0x0000_0800;
        /// The section contains COMDAT data (object files only)
        const LNK_COMDAT = 0x0000_1000;
        /// The section contains extended relocations
        const LNK_NRELOC_OVFL = 0x0100_0000;
        /// The section can be discarded as needed
        const MEM_DISCARDABLE = 0x0200_0000;
        /// The section cannot be cached
        const MEM_NOT_CACHED = 0x0400_0000;
        /// The section is not pageable
        const MEM_NOT_PAGED = 0x0800_0000;
        /// The section can be shared in memory
        const MEM_SHARED = 0x1000_0000;
        /// The section can be executed as code
        const MEM_EXECUTE = 0x2000_0000;
        /// The section can be read
        const MEM_READ = 0x4000_0000;
        /// The section can be written to
        const MEM_WRITE = 0x8000_0000;

        // Alignment and other bits we don't name
        const _ = !0;
    }
}

/// `IMAGE_SECTION_HEADER`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionHeader {
    /// 8-byte, zero padded name
    pub name: [u8; 8],
    /// Size of the section when loaded
    pub virtual_size: u32,
    /// RVA of the first byte of the section when loaded
    pub virtual_address: u32,
    /// Size of the initialized data on disk
    pub size_of_raw_data: u32,
    /// File offset of the initialized data
    pub pointer_to_raw_data: u32,
    /// File offset of COFF relocations (object files)
    pub pointer_to_relocations: u32,
    /// File offset of COFF line numbers (deprecated)
    pub pointer_to_linenumbers: u32,
    /// Number of COFF relocations
    pub number_of_relocations: u16,
    /// Number of COFF line numbers
    pub number_of_linenumbers: u16,
    /// `IMAGE_SCN_*` flags, see [`SectionCharacteristics`]
    pub characteristics: u32,
}

impl SectionHeader {
    /// Size of one section header on disk
    pub const SIZE: usize = 40;

    /// Decode a section header at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 40 bytes are available.
    pub fn decode(data: &[u8], offset: usize) -> Result<Self> {
        let mut parser = Parser::at(data, offset)?;
        parser.ensure_remaining(Self::SIZE)?;

        Ok(SectionHeader {
            name: parser.read_array()?,
            virtual_size: parser.read_le()?,
            virtual_address: parser.read_le()?,
            size_of_raw_data: parser.read_le()?,
            pointer_to_raw_data: parser.read_le()?,
            pointer_to_relocations: parser.read_le()?,
            pointer_to_linenumbers: parser.read_le()?,
            number_of_relocations: parser.read_le()?,
            number_of_linenumbers: parser.read_le()?,
            characteristics: parser.read_le()?,
        })
    }

    /// Write this section header at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 40 bytes are available. Nothing is
    /// written in that case.
    pub fn encode(&self, data: &mut [u8], offset: usize) -> Result<()> {
        match offset.checked_add(Self::SIZE) {
            Some(end) if end <= data.len() => {}
            _ => return Err(Error::OutOfBounds),
        }

        data[offset..offset + 8].copy_from_slice(&self.name);
        let mut cursor = offset + 8;
        write_le_at(data, &mut cursor, self.virtual_size)?;
        write_le_at(data, &mut cursor, self.virtual_address)?;
        write_le_at(data, &mut cursor, self.size_of_raw_data)?;
        write_le_at(data, &mut cursor, self.pointer_to_raw_data)?;
        write_le_at(data, &mut cursor, self.pointer_to_relocations)?;
        write_le_at(data, &mut cursor, self.pointer_to_linenumbers)?;
        write_le_at(data, &mut cursor, self.number_of_relocations)?;
        write_le_at(data, &mut cursor, self.number_of_linenumbers)?;
        write_le_at(data, &mut cursor, self.characteristics)?;

        Ok(())
    }

    /// The section name with trailing padding removed.
    #[must_use]
    pub fn name_str(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(8);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    /// Parsed characteristic flags.
    #[must_use]
    pub fn flags(&self) -> SectionCharacteristics {
        SectionCharacteristics::from_bits_retain(self.characteristics)
    }

    /// Returns `true` if `rva` lies in `[virtual_address, virtual_address + virtual_size)`.
    ///
    /// A window whose end overflows `u32` is clamped to the top of the address space.
    #[must_use]
    pub fn contains_rva(&self, rva: u32) -> bool {
        let end = u64::from(self.virtual_address) + u64::from(self.virtual_size);
        rva >= self.virtual_address && u64::from(rva) < end
    }

    /// Returns `true` if `offset` lies in `[pointer_to_raw_data, pointer_to_raw_data + size_of_raw_data)`.
    #[must_use]
    pub fn contains_offset(&self, offset: u32) -> bool {
        let end = u64::from(self.pointer_to_raw_data) + u64::from(self.size_of_raw_data);
        offset >= self.pointer_to_raw_data && u64::from(offset) < end
    }
}

impl FieldDump for SectionHeader {
    fn type_name(&self) -> &'static str {
        "IMAGE_SECTION_HEADER"
    }

    fn fields(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("Name", u64::from_le_bytes(self.name)),
            ("VirtualSize", u64::from(self.virtual_size)),
            ("VirtualAddress", u64::from(self.virtual_address)),
            ("SizeOfRawData", u64::from(self.size_of_raw_data)),
            ("PointerToRawData", u64::from(self.pointer_to_raw_data)),
            ("PointerToRelocations", u64::from(self.pointer_to_relocations)),
            ("PointerToLinenumbers", u64::from(self.pointer_to_linenumbers)),
            ("NumberOfRelocations", u64::from(self.number_of_relocations)),
            ("NumberOfLinenumbers", u64::from(self.number_of_linenumbers)),
            ("Characteristics", u64::from(self.characteristics)),
        ]
    }
}

impl_display_via_dump!(SectionHeader);

/// Read `count` consecutive section headers starting at `offset`.
///
/// # Errors
/// Returns [`crate::Error::LimitExceeded`] if `count` is above
/// [`ParserConfig::max_sections`] and [`crate::Error::OutOfBounds`] if the table is truncated.
pub fn read_section_table(
    data: &[u8],
    offset: usize,
    count: usize,
    config: &ParserConfig,
) -> Result<Vec<SectionHeader>> {
    if count > config.max_sections {
        return Err(Error::LimitExceeded {
            what: "section table",
            count,
            limit: config.max_sections,
        });
    }

    let table_size = count.checked_mul(SectionHeader::SIZE).ok_or(Error::OutOfBounds)?;
    slice_at(data, offset, table_size)?;

    (0..count)
        .map(|index| SectionHeader::decode(data, offset + index * SectionHeader::SIZE))
        .collect()
}
