//! Optional header and data directories.
//!
//! The optional header comes in two layouts, PE32 (`0x10B`) and PE32+ (`0x20B`), which differ in
//! the width of `ImageBase` and the four stack/heap size fields. Both end in the
//! data-directory array, the `(rva, size)` pairs locating every directory table.

use strum::{Display, EnumCount, EnumIter, FromRepr};

use crate::{
    file::{io::write_le_at, parser::Parser},
    pe::dump::{impl_display_via_dump, FieldDump},
    Error, Result,
};

/// Optional header magic of 32-bit images
pub const PE32_MAGIC: u16 = 0x10B;

/// Optional header magic of 64-bit images
pub const PE32_PLUS_MAGIC: u16 = 0x20B;

/// Index into the data-directory array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount, FromRepr)]
#[repr(usize)]
pub enum DataDirectoryType {
    /// Export table (`.edata`)
    ExportTable = 0,
    /// Import table (`.idata`)
    ImportTable = 1,
    /// Resource table (`.rsrc`)
    ResourceTable = 2,
    /// Exception table (`.pdata`)
    ExceptionTable = 3,
    /// Attribute certificate table. Its `rva` is a file offset.
    CertificateTable = 4,
    /// Base relocation table (`.reloc`)
    BaseRelocationTable = 5,
    /// Debug directory
    Debug = 6,
    /// Reserved, must be zero
    Architecture = 7,
    /// Global pointer register value
    GlobalPtr = 8,
    /// Thread local storage table
    TlsTable = 9,
    /// Load configuration table
    LoadConfigTable = 10,
    /// Bound import table
    BoundImport = 11,
    /// Import address table
    ImportAddressTable = 12,
    /// Delay-load import descriptors
    DelayImportDescriptor = 13,
    /// CLR runtime header
    ClrRuntimeHeader = 14,
    /// Reserved, must be zero
    Reserved = 15,
}

/// `IMAGE_DATA_DIRECTORY`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataDirectory {
    /// RVA of the table
    pub virtual_address: u32,
    /// Size of the table in bytes
    pub size: u32,
}

impl DataDirectory {
    /// Size of one data directory on disk
    pub const SIZE: usize = 8;

    /// A directory with a zero address is not present in the image.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.virtual_address != 0
    }
}

impl FieldDump for DataDirectory {
    fn type_name(&self) -> &'static str {
        "IMAGE_DATA_DIRECTORY"
    }

    fn fields(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("VirtualAddress", u64::from(self.virtual_address)),
            ("Size", u64::from(self.size)),
        ]
    }
}

/// `IMAGE_OPTIONAL_HEADER32` / `IMAGE_OPTIONAL_HEADER64`
///
/// Fields whose width differs between the two layouts are widened to `u64`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OptionalHeader {
    /// [`PE32_MAGIC`] or [`PE32_PLUS_MAGIC`]
    pub magic: u16,
    /// Linker major version
    pub major_linker_version: u8,
    /// Linker minor version
    pub minor_linker_version: u8,
    /// Sum of all code sections
    pub size_of_code: u32,
    /// Sum of all initialized data sections
    pub size_of_initialized_data: u32,
    /// Sum of all uninitialized data sections
    pub size_of_uninitialized_data: u32,
    /// RVA of the entry point, 0 if none
    pub address_of_entry_point: u32,
    /// RVA of the start of the code section
    pub base_of_code: u32,
    /// RVA of the start of the data section (PE32 only, 0 for PE32+)
    pub base_of_data: u32,
    /// Preferred load address
    pub image_base: u64,
    /// Alignment of sections in memory
    pub section_alignment: u32,
    /// Alignment of raw section data in the file
    pub file_alignment: u32,
    /// Size of the loaded image, including headers
    pub size_of_image: u32,
    /// Combined size of all headers, rounded to `file_alignment`
    pub size_of_headers: u32,
    /// Image checksum
    pub checksum: u32,
    /// `IMAGE_SUBSYSTEM_*`
    pub subsystem: u16,
    /// `IMAGE_DLLCHARACTERISTICS_*`
    pub dll_characteristics: u16,
    /// Declared number of data directories
    pub number_of_rva_and_sizes: u32,
    /// The data directories that were read, at most [`DataDirectoryType::COUNT`]
    pub data_directories: Vec<DataDirectory>,
}

impl OptionalHeader {
    /// Decode an optional header of `size` bytes at `offset`.
    ///
    /// `number_of_rva_and_sizes` is clamped to 16 and to what fits into `size`, the way the
    /// Windows loader reads it.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for an unknown magic, and
    /// [`crate::Error::OutOfBounds`] if the header is truncated.
    pub fn decode(data: &[u8], offset: usize, size: usize) -> Result<Self> {
        let mut parser = Parser::at(data, offset)?;
        let magic = parser.read_le::<u16>()?;
        let is_64 = match magic {
            PE32_MAGIC => false,
            PE32_PLUS_MAGIC => true,
            _ => return Err(Error::NotSupported),
        };

        let mut header = OptionalHeader {
            magic,
            major_linker_version: parser.read_le()?,
            minor_linker_version: parser.read_le()?,
            size_of_code: parser.read_le()?,
            size_of_initialized_data: parser.read_le()?,
            size_of_uninitialized_data: parser.read_le()?,
            address_of_entry_point: parser.read_le()?,
            base_of_code: parser.read_le()?,
            ..OptionalHeader::default()
        };

        if is_64 {
            header.image_base = parser.read_le::<u64>()?;
        } else {
            header.base_of_data = parser.read_le()?;
            header.image_base = u64::from(parser.read_le::<u32>()?);
        }

        header.section_alignment = parser.read_le()?;
        header.file_alignment = parser.read_le()?;
        // OS, image and subsystem versions, Win32VersionValue
        parser.advance_by(16)?;
        header.size_of_image = parser.read_le()?;
        header.size_of_headers = parser.read_le()?;
        header.checksum = parser.read_le()?;
        header.subsystem = parser.read_le()?;
        header.dll_characteristics = parser.read_le()?;
        // Stack and heap reserve/commit, LoaderFlags
        parser.advance_by(if is_64 { 36 } else { 20 })?;
        header.number_of_rva_and_sizes = parser.read_le()?;

        let fixed_size = parser.pos() - offset;
        let room = size.saturating_sub(fixed_size) / DataDirectory::SIZE;
        let count = (header.number_of_rva_and_sizes as usize)
            .min(DataDirectoryType::COUNT)
            .min(room);

        header.data_directories = (0..count)
            .map(|_| -> Result<DataDirectory> {
                Ok(DataDirectory {
                    virtual_address: parser.read_le()?,
                    size: parser.read_le()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(header)
    }

    /// Returns `true` for PE32+ images.
    #[must_use]
    pub fn is_pe32_plus(&self) -> bool {
        self.magic == PE32_PLUS_MAGIC
    }

    /// Size of the fixed part of the header, before the data-directory array.
    #[must_use]
    pub fn fixed_size(&self) -> usize {
        if self.is_pe32_plus() {
            112
        } else {
            96
        }
    }

    /// Look up a data directory. Directories beyond the declared count are `None`.
    #[must_use]
    pub fn data_directory(&self, kind: DataDirectoryType) -> Option<&DataDirectory> {
        self.data_directories.get(kind as usize)
    }

    /// Overwrite data directory `kind` in `data`, where `offset` is the start of the optional
    /// header this record was decoded from.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the image declares fewer directories than
    /// `kind`, and [`crate::Error::OutOfBounds`] if the buffer is too small.
    pub fn encode_data_directory(
        &mut self,
        kind: DataDirectoryType,
        directory: DataDirectory,
        data: &mut [u8],
        offset: usize,
    ) -> Result<()> {
        let index = kind as usize;
        let fixed_size = self.fixed_size();
        let Some(slot) = self.data_directories.get_mut(index) else {
            return Err(malformed_error!("Data directory {} is not declared", kind));
        };

        let mut cursor = offset + fixed_size + index * DataDirectory::SIZE;
        write_le_at(data, &mut cursor, directory.virtual_address)?;
        write_le_at(data, &mut cursor, directory.size)?;
        *slot = directory;

        Ok(())
    }
}

impl FieldDump for OptionalHeader {
    fn type_name(&self) -> &'static str {
        if self.is_pe32_plus() {
            "IMAGE_OPTIONAL_HEADER64"
        } else {
            "IMAGE_OPTIONAL_HEADER32"
        }
    }

    fn fields(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("Magic", u64::from(self.magic)),
            ("MajorLinkerVersion", u64::from(self.major_linker_version)),
            ("MinorLinkerVersion", u64::from(self.minor_linker_version)),
            ("SizeOfCode", u64::from(self.size_of_code)),
            ("SizeOfInitializedData", u64::from(self.size_of_initialized_data)),
            ("SizeOfUninitializedData", u64::from(self.size_of_uninitialized_data)),
            ("AddressOfEntryPoint", u64::from(self.address_of_entry_point)),
            ("BaseOfCode", u64::from(self.base_of_code)),
            ("BaseOfData", u64::from(self.base_of_data)),
            ("ImageBase", self.image_base),
            ("SectionAlignment", u64::from(self.section_alignment)),
            ("FileAlignment", u64::from(self.file_alignment)),
            ("SizeOfImage", u64::from(self.size_of_image)),
            ("SizeOfHeaders", u64::from(self.size_of_headers)),
            ("CheckSum", u64::from(self.checksum)),
            ("Subsystem", u64::from(self.subsystem)),
            ("DllCharacteristics", u64::from(self.dll_characteristics)),
            ("NumberOfRvaAndSizes", u64::from(self.number_of_rva_and_sizes)),
        ]
    }
}

impl_display_via_dump!(DataDirectory, OptionalHeader);

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    fn crafted(is_64: bool, directories: u32) -> Vec<u8> {
        let fixed = if is_64 { 112 } else { 96 };
        let mut data = vec![0u8; fixed + 16 * 8];
        let magic = if is_64 { PE32_PLUS_MAGIC } else { PE32_MAGIC };
        data[0..2].copy_from_slice(&magic.to_le_bytes());
        data[16..20].copy_from_slice(&0x1234u32.to_le_bytes()); // entry point
        if is_64 {
            data[24..32].copy_from_slice(&0x1_4000_0000u64.to_le_bytes());
        } else {
            data[28..32].copy_from_slice(&0x0040_0000u32.to_le_bytes());
        }
        data[32..36].copy_from_slice(&0x1000u32.to_le_bytes());
        data[36..40].copy_from_slice(&0x200u32.to_le_bytes());
        data[fixed - 4..fixed].copy_from_slice(&directories.to_le_bytes());
        // export directory
        data[fixed..fixed + 4].copy_from_slice(&0x3000u32.to_le_bytes());
        data[fixed + 4..fixed + 8].copy_from_slice(&0x80u32.to_le_bytes());
        data
    }

    #[test]
    fn pe32() {
        let data = crafted(false, 16);
        let header = OptionalHeader::decode(&data, 0, data.len()).unwrap();

        assert!(!header.is_pe32_plus());
        assert_eq!(header.address_of_entry_point, 0x1234);
        assert_eq!(header.image_base, 0x40_0000);
        assert_eq!(header.section_alignment, 0x1000);
        assert_eq!(header.file_alignment, 0x200);
        assert_eq!(header.data_directories.len(), 16);

        let export = header.data_directory(DataDirectoryType::ExportTable).unwrap();
        assert_eq!(export.virtual_address, 0x3000);
        assert_eq!(export.size, 0x80);
        assert!(!header
            .data_directory(DataDirectoryType::ImportTable)
            .unwrap()
            .is_present());
    }

    #[test]
    fn pe32_plus() {
        let data = crafted(true, 16);
        let header = OptionalHeader::decode(&data, 0, data.len()).unwrap();

        assert!(header.is_pe32_plus());
        assert_eq!(header.image_base, 0x1_4000_0000);
        assert_eq!(header.fixed_size(), 112);
        assert_eq!(
            header
                .data_directory(DataDirectoryType::ExportTable)
                .unwrap()
                .virtual_address,
            0x3000
        );
    }

    #[test]
    fn directory_count_clamped() {
        let data = crafted(false, 0xFFFF_FFFF);
        let header = OptionalHeader::decode(&data, 0, data.len()).unwrap();
        assert_eq!(header.data_directories.len(), 16);

        // SizeOfOptionalHeader only leaves room for two directories
        let header = OptionalHeader::decode(&data, 0, 96 + 16).unwrap();
        assert_eq!(header.data_directories.len(), 2);
        assert!(header
            .data_directory(DataDirectoryType::BaseRelocationTable)
            .is_none());
    }

    #[test]
    fn unknown_magic() {
        let mut data = crafted(false, 16);
        data[0] = 0x07;
        data[1] = 0x01;
        assert!(matches!(
            OptionalHeader::decode(&data, 0, data.len()),
            Err(Error::NotSupported)
        ));
    }

    #[test]
    fn encode_data_directory() {
        let mut data = crafted(true, 16);
        let mut header = OptionalHeader::decode(&data, 0, data.len()).unwrap();

        let reloc = DataDirectory {
            virtual_address: 0x8000,
            size: 0x20,
        };
        header
            .encode_data_directory(DataDirectoryType::BaseRelocationTable, reloc, &mut data, 0)
            .unwrap();

        let reread = OptionalHeader::decode(&data, 0, data.len()).unwrap();
        assert_eq!(
            reread.data_directory(DataDirectoryType::BaseRelocationTable),
            Some(&reloc)
        );
        assert_eq!(reread, header);
    }

    #[test]
    fn directory_types() {
        assert_eq!(DataDirectoryType::COUNT, 16);
        for (index, kind) in DataDirectoryType::iter().enumerate() {
            assert_eq!(kind as usize, index);
            assert_eq!(DataDirectoryType::from_repr(index), Some(kind));
        }
        assert_eq!(DataDirectoryType::from_repr(16), None);
        assert_eq!(
            DataDirectoryType::BaseRelocationTable.to_string(),
            "BaseRelocationTable"
        );
    }
}
