//! PE file abstraction.
//!
//! This module ties the byte-level decoders in [`crate::pe`] to an owned image. It abstracts
//! over where the bytes come from (a memory-mapped file or an owned buffer), parses the headers
//! once on load and runs the directory parsers on demand.
//!
//! # Architecture
//!
//! - **Backend system** - [`crate::file::Backend`] hides whether data is mapped or owned
//! - **Header parsing** - DOS header, PE signature, COFF header, optional header and section
//!   table are decoded eagerly; any failure there rejects the file
//! - **Directory parsing** - export, import and base relocation directories are parsed lazily
//!   and each one reports its own [`crate::pe::DirectoryStatus`]
//!
//! ## Parsing Infrastructure
//! - [`crate::file::parser::Parser`] - Cursor used by the structure decoders
//! - [`crate::file::io`] - Bounds-checked little-endian reads and writes
//!
//! ## Backend Implementations
//! - [`crate::file::physical::Physical`] - Read-only memory-mapped file
//! - [`crate::file::memory::Memory`] - Owned, writable buffer
//!
//! # Examples
//!
//! ## Loading from File
//!
//! ```rust,no_run
//! use pescope::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("kernel32.dll"))?;
//! println!("Loaded PE file with {} bytes", file.len());
//! println!("Image base: 0x{:x}", file.imagebase());
//! println!("Number of sections: {}", file.sections().len());
//! # Ok::<(), pescope::Error>(())
//! ```
//!
//! ## Inspecting directories
//!
//! ```rust,no_run
//! use pescope::File;
//! use std::fs;
//!
//! let file = File::from_mem(fs::read("kernel32.dll")?)?;
//! let report = file.directories();
//!
//! if let Some(relocations) = report.relocations.parsed() {
//!     println!("{} relocation blocks", relocations.len());
//! }
//! for (directory, error) in report.malformed() {
//!     eprintln!("{} directory is damaged: {}", directory, error);
//! }
//! # Ok::<(), pescope::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! [`File`] is `Send + Sync`. [`File::directories`] uses that to parse the independent
//! directories concurrently with `rayon` when [`crate::ParserConfig::parallel`] is set.

pub mod io;
pub mod parser;

mod memory;
mod physical;

use std::path::Path;

use crate::{
    config::ParserConfig,
    file::io::{read_cstr_at, read_le_from},
    pe::{
        export::{parse_exports, ExportDirectory, ExportTable},
        import::{parse_imports, ImportedDll},
        reloc::{parse_relocations, RelocationBlock},
        rva::{offset_to_rva, translate},
        section::read_section_table,
        CoffHeader, DataDirectory, DataDirectoryType, DirectoryReport, DirectoryStatus,
        DosHeader, OptionalHeader, SectionHeader, PE_SIGNATURE,
    },
    Error::{Empty, NotSupported},
    Result,
};
use memory::Memory;
use physical::Physical;

/// Backend trait for file data sources.
///
/// This trait abstracts over the source of PE data, allowing for both in-memory and on-disk
/// representations. All implementations must be thread-safe.
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Arguments
    ///
    /// * `offset` - The starting offset within the data.
    /// * `len` - The length of the slice in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the buffer for in-place edits, or `None` if the backend is read-only.
    fn data_mut(&mut self) -> Option<&mut [u8]>;

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

/// A loaded PE image.
///
/// Owns the raw bytes together with the decoded headers and section table. Directory tables
/// are not kept; they are parsed from the bytes whenever they are requested.
///
/// # Examples
///
/// ```rust,no_run
/// use pescope::{File, ParserConfig};
/// use std::fs;
///
/// let data = fs::read("sample.exe")?;
/// let file = File::from_mem_with_config(data, ParserConfig::strict())?;
///
/// let entry = file.optional_header().map(|header| header.address_of_entry_point);
/// if let Some(entry) = entry {
///     let offset = file.rva_to_offset(entry)?;
///     println!("Entry point bytes: {:02x?}", file.data_slice(offset, 16)?);
/// }
/// # Ok::<(), pescope::Error>(())
/// ```
pub struct File {
    /// The underlying data source (memory or file).
    data: Box<dyn Backend>,
    /// Limits used for every directory parse
    config: ParserConfig,
    dos_header: DosHeader,
    coff_header: CoffHeader,
    /// `None` for images with `SizeOfOptionalHeader == 0`
    optional_header: Option<OptionalHeader>,
    optional_header_offset: usize,
    section_table_offset: usize,
    sections: Vec<SectionHeader>,
}

impl File {
    /// Loads a PE file from the given path.
    ///
    /// The file is memory-mapped read-only; in-place edits through [`File::update_section`]
    /// and [`File::set_data_directory`] are refused for such images.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or opened
    /// - The file is empty
    /// - The file is not a PE image, or its headers are truncated or inconsistent
    pub fn from_file(file: &Path) -> Result<File> {
        Self::from_file_with_config(file, ParserConfig::default())
    }

    /// Loads a PE file from the given path with custom limits.
    ///
    /// # Errors
    ///
    /// See [`File::from_file`].
    pub fn from_file_with_config(file: &Path, config: ParserConfig) -> Result<File> {
        let input = Physical::new(file)?;

        Self::load(input, config)
    }

    /// Loads a PE file from a memory buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The buffer is empty
    /// - The data is not a PE image, or its headers are truncated or inconsistent
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        Self::from_mem_with_config(data, ParserConfig::default())
    }

    /// Loads a PE file from a memory buffer with custom limits.
    ///
    /// # Errors
    ///
    /// See [`File::from_mem`].
    pub fn from_mem_with_config(data: Vec<u8>, config: ParserConfig) -> Result<File> {
        let input = Memory::new(data);

        Self::load(input, config)
    }

    /// Internal loader for any backend.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Empty`] for empty input, [`crate::Error::NotSupported`] if the
    /// `MZ` magic, the `PE\0\0` signature or the optional header magic do not match, and
    /// [`crate::Error::OutOfBounds`] / [`crate::Error::Malformed`] /
    /// [`crate::Error::LimitExceeded`] for damaged headers.
    fn load<T: Backend + 'static>(data: T, config: ParserConfig) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        let bytes = data.data();
        let dos_header = DosHeader::decode(bytes)?;

        let signature_offset = dos_header.e_lfanew as usize;
        if read_le_from::<u32>(bytes, signature_offset)? != PE_SIGNATURE {
            return Err(NotSupported);
        }

        let coff_offset = signature_offset + 4;
        let coff_header = CoffHeader::decode(bytes, coff_offset)?;

        let optional_header_offset = coff_offset + CoffHeader::SIZE;
        let optional_size = coff_header.size_of_optional_header as usize;
        let optional_header = if optional_size == 0 {
            None
        } else {
            let header = OptionalHeader::decode(bytes, optional_header_offset, optional_size)?;
            if header.fixed_size() > optional_size {
                return Err(malformed_error!(
                    "SizeOfOptionalHeader {} is smaller than the {} byte header",
                    optional_size,
                    header.fixed_size()
                ));
            }
            Some(header)
        };

        let section_table_offset = optional_header_offset + optional_size;
        let sections = read_section_table(
            bytes,
            section_table_offset,
            coff_header.number_of_sections as usize,
            &config,
        )?;

        log::debug!(
            "Loaded PE image: machine {:#06x}, {} sections, {} data directories",
            coff_header.machine,
            sections.len(),
            optional_header
                .as_ref()
                .map_or(0, |header| header.data_directories.len())
        );

        Ok(File {
            data: Box::new(data),
            config,
            dos_header,
            coff_header,
            optional_header,
            optional_header_offset,
            section_table_offset,
            sections,
        })
    }

    /// Returns the total size of the loaded file in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the file has a length of zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// The limits this image was loaded with.
    #[must_use]
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Returns the raw data of the loaded file.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Returns a slice of the file data at the given offset and length.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the file.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data.data_slice(offset, len)
    }

    /// The DOS header.
    #[must_use]
    pub fn dos_header(&self) -> &DosHeader {
        &self.dos_header
    }

    /// The COFF file header.
    #[must_use]
    pub fn coff_header(&self) -> &CoffHeader {
        &self.coff_header
    }

    /// The optional header, `None` if the image declares none.
    #[must_use]
    pub fn optional_header(&self) -> Option<&OptionalHeader> {
        self.optional_header.as_ref()
    }

    /// Preferred load address, 0 without an optional header.
    #[must_use]
    pub fn imagebase(&self) -> u64 {
        self.optional_header
            .as_ref()
            .map_or(0, |header| header.image_base)
    }

    /// Returns `true` for PE32+ images.
    #[must_use]
    pub fn is_pe32_plus(&self) -> bool {
        self.optional_header
            .as_ref()
            .is_some_and(OptionalHeader::is_pe32_plus)
    }

    /// The section table in file order.
    #[must_use]
    pub fn sections(&self) -> &[SectionHeader] {
        &self.sections
    }

    /// Look up a data directory entry. Directories the image does not declare are `None`.
    #[must_use]
    pub fn data_directory(&self, kind: DataDirectoryType) -> Option<&DataDirectory> {
        self.optional_header
            .as_ref()
            .and_then(|header| header.data_directory(kind))
    }

    /// Declared data directory that has a non-zero address.
    fn present_directory(&self, kind: DataDirectoryType) -> Option<&DataDirectory> {
        let directory = self
            .data_directory(kind)
            .filter(|directory| directory.is_present());
        if directory.is_none() {
            log::debug!("{} directory is absent", kind);
        }
        directory
    }

    /// Converts a relative virtual address to a file offset.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnmappedAddress`] if no section contains `rva`.
    pub fn rva_to_offset(&self, rva: u32) -> Result<usize> {
        Ok(translate(rva, &self.sections)? as usize)
    }

    /// Converts a file offset to a relative virtual address.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if no section's raw data contains `offset`.
    pub fn offset_to_rva(&self, offset: usize) -> Result<u32> {
        let offset = u32::try_from(offset)
            .map_err(|_| malformed_error!("Offset too large to fit in u32: {}", offset))?;
        offset_to_rva(offset, &self.sections)
    }

    /// Decode the export directory header.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnmappedAddress`] or [`crate::Error::OutOfBounds`] if the data
    /// directory points to unreadable memory.
    pub fn export_directory(&self) -> Result<Option<ExportDirectory>> {
        let Some(directory) = self.present_directory(DataDirectoryType::ExportTable) else {
            return Ok(None);
        };

        let offset = self.rva_to_offset(directory.virtual_address)?;
        ExportDirectory::decode(self.data(), offset).map(Some)
    }

    /// Parse the export directory and its function table.
    ///
    /// # Errors
    ///
    /// Any error of [`crate::pe::parse_exports`], plus failures to read the DLL name.
    pub fn exports(&self) -> Result<Option<ExportTable>> {
        let Some(directory) = self.export_directory()? else {
            return Ok(None);
        };
        let Some(functions) =
            parse_exports(self.data(), Some(&directory), &self.sections, &self.config)?
        else {
            return Ok(None);
        };

        let dll_name = match directory.name {
            0 => None,
            rva => Some(read_cstr_at(
                self.data(),
                self.rva_to_offset(rva)?,
                self.config.max_name_length,
            )?),
        };

        Ok(Some(ExportTable {
            directory,
            dll_name,
            functions,
        }))
    }

    /// Parse the base relocation directory.
    ///
    /// A directory with a zero `Size` carries no blocks and is reported as absent.
    ///
    /// # Errors
    ///
    /// Any error of [`crate::pe::parse_relocations`], or [`crate::Error::UnmappedAddress`] if
    /// the directory is not mapped.
    pub fn relocations(&self) -> Result<Option<Vec<RelocationBlock>>> {
        let Some(directory) = self.present_directory(DataDirectoryType::BaseRelocationTable)
        else {
            return Ok(None);
        };
        if directory.size == 0 {
            log::debug!("BaseRelocationTable directory has zero size");
            return Ok(None);
        }

        let offset = self.rva_to_offset(directory.virtual_address)?;
        parse_relocations(self.data(), offset, directory.size as usize, &self.config).map(Some)
    }

    /// Parse the import directory.
    ///
    /// # Errors
    ///
    /// Any error of [`crate::pe::parse_imports`].
    pub fn imports(&self) -> Result<Option<Vec<ImportedDll>>> {
        let directory = self.present_directory(DataDirectoryType::ImportTable);

        parse_imports(
            self.data(),
            directory,
            &self.sections,
            self.is_pe32_plus(),
            &self.config,
        )
    }

    /// Parse every supported directory and record a status for each.
    ///
    /// A damaged directory never prevents the others from being parsed. With
    /// [`ParserConfig::parallel`] set, the parsers run concurrently.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use pescope::File;
    /// use std::path::Path;
    ///
    /// let file = File::from_file(Path::new("kernel32.dll"))?;
    /// let report = file.directories();
    ///
    /// if let Some(exports) = report.exports.parsed() {
    ///     println!("{} exports", exports.functions.len());
    /// }
    /// if let Some(error) = report.relocations.error() {
    ///     eprintln!("Relocations unreadable: {}", error);
    /// }
    /// # Ok::<(), pescope::Error>(())
    /// ```
    #[must_use]
    pub fn directories(&self) -> DirectoryReport {
        let (exports, (relocations, imports)) = if self.config.parallel {
            rayon::join(
                || self.exports(),
                || rayon::join(|| self.relocations(), || self.imports()),
            )
        } else {
            (self.exports(), (self.relocations(), self.imports()))
        };

        let report = DirectoryReport {
            exports: DirectoryStatus::from_result(exports),
            relocations: DirectoryStatus::from_result(relocations),
            imports: DirectoryStatus::from_result(imports),
        };

        for (directory, error) in report.malformed() {
            log::warn!("Malformed {} directory: {}", directory, error);
        }

        report
    }

    /// Overwrite section header `index` in the file and in the decoded table.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotSupported`] for memory-mapped files and
    /// [`crate::Error::Malformed`] if `index` is out of range.
    pub fn update_section(&mut self, index: usize, section: SectionHeader) -> Result<()> {
        let Some(slot) = self.sections.get_mut(index) else {
            return Err(malformed_error!(
                "Section index {} out of range, image has {} sections",
                index,
                self.sections.len()
            ));
        };

        let data = self.data.data_mut().ok_or(NotSupported)?;
        section.encode(data, self.section_table_offset + index * SectionHeader::SIZE)?;
        *slot = section;

        Ok(())
    }

    /// Overwrite data directory `kind` in the file and in the decoded optional header.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotSupported`] for memory-mapped files and
    /// [`crate::Error::Malformed`] if the image has no optional header or declares fewer
    /// directories than `kind`.
    pub fn set_data_directory(
        &mut self,
        kind: DataDirectoryType,
        directory: DataDirectory,
    ) -> Result<()> {
        let Some(optional_header) = self.optional_header.as_mut() else {
            return Err(malformed_error!("Image has no optional header"));
        };

        let data = self.data.data_mut().ok_or(NotSupported)?;
        optional_header.encode_data_directory(kind, directory, data, self.optional_header_offset)
    }
}
