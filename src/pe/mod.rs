//! PE/COFF structures and directory parsers.
//!
//! Every structure in this module is a plain owned record decoded from a borrowed `&[u8]`. Nothing
//! keeps a reference into the input after decoding, so parsed values can outlive the buffer and
//! move freely between threads.
//!
//! # Key Components
//!
//! ## Headers
//! - [`DosHeader`] - `MZ` stub and the offset of the NT headers
//! - [`CoffHeader`] - machine, section count and optional header size
//! - [`OptionalHeader`] - PE32 / PE32+ header with the [`DataDirectory`] array
//! - [`SectionHeader`] - one entry of the section table
//!
//! ## Address translation
//! - [`rva::translate`] - RVA to file offset through the section table
//! - [`rva::offset_to_rva`] - the inverse mapping
//!
//! ## Directories
//! - [`parse_exports`] - exported-function table reconstruction
//! - [`parse_relocations`] - base relocation block chain
//! - [`parse_imports`] - import descriptors and thunks
//! - [`DirectoryStatus`] - per-directory absent / parsed / malformed outcome
//!
//! ## Diagnostics
//! - [`FieldDump`] - `(name, value)` listing and `Display` for every record
//!
//! # Examples
//!
//! ```rust
//! use pescope::{
//!     pe::{parse_exports, ExportDirectory, SectionHeader},
//!     ParserConfig,
//! };
//!
//! // One section mapping RVA 0x1000.. onto file offset 0
//! let sections = [SectionHeader {
//!     virtual_address: 0x1000,
//!     virtual_size: 0x100,
//!     size_of_raw_data: 0x100,
//!     ..SectionHeader::default()
//! }];
//!
//! let mut data = vec![0u8; 0x100];
//! data[0..4].copy_from_slice(&0x1234u32.to_le_bytes());
//!
//! let directory = ExportDirectory {
//!     base: 5,
//!     number_of_functions: 1,
//!     address_of_functions: 0x1000,
//!     ..ExportDirectory::default()
//! };
//!
//! let functions = parse_exports(&data, Some(&directory), &sections, &ParserConfig::default())?
//!     .unwrap_or_default();
//! assert_eq!(functions[0].address, 0x1234);
//! assert_eq!(functions[0].ordinal, 5);
//! assert!(functions[0].name.is_none());
//! # Ok::<(), pescope::Error>(())
//! ```

pub mod coff;
pub mod directory;
pub mod dos;
pub mod dump;
pub mod export;
pub mod import;
pub mod optional;
pub mod reloc;
pub mod rva;
pub mod section;

pub use coff::{CoffHeader, FileCharacteristics, MACHINE_AMD64, MACHINE_ARM64, MACHINE_I386};
pub use directory::{DirectoryReport, DirectoryStatus};
pub use dos::{DosHeader, DOS_MAGIC, PE_SIGNATURE};
pub use dump::FieldDump;
pub use export::{parse_exports, ExportDirectory, ExportFunction, ExportTable};
pub use import::{parse_imports, ImportDescriptor, ImportFunction, ImportedDll};
pub use optional::{
    DataDirectory, DataDirectoryType, OptionalHeader, PE32_MAGIC, PE32_PLUS_MAGIC,
};
pub use reloc::{parse_relocations, RelocationBlock, RelocationEntry, RelocationType};
pub use section::{read_section_table, SectionCharacteristics, SectionHeader};
