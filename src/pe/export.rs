//! Export directory and exported-function-table reconstruction.
//!
//! The export directory points at three parallel tables:
//!
//! - `AddressOfFunctions` - one RVA per exported function, indexed by `ordinal - Base`
//! - `AddressOfNames` - RVAs of the zero-terminated names, sorted for binary search by the loader
//! - `AddressOfNameOrdinals` - for every name, the *index* into `AddressOfFunctions`
//!
//! Only `NumberOfNames` of the `NumberOfFunctions` entries carry a name. [`parse_exports`]
//! therefore builds the dense address table first and attaches names to it afterwards.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pescope::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("kernel32.dll"))?;
//! if let Some(exports) = file.directories().exports.parsed() {
//!     for function in &exports.functions {
//!         println!("{:5} {:#010x} {}", function.ordinal, function.address,
//!             function.name.as_deref().unwrap_or("<unnamed>"));
//!     }
//! }
//! # Ok::<(), pescope::Error>(())
//! ```

use std::fmt::Write;

use crate::{
    config::ParserConfig,
    file::{
        io::{read_cstr_at, read_le_from, slice_at, write_le_at},
        parser::Parser,
    },
    pe::{
        dump::{impl_display_via_dump, FieldDump},
        rva::translate,
        section::SectionHeader,
    },
    Error, Result,
};

/// `IMAGE_EXPORT_DIRECTORY`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportDirectory {
    /// Reserved, must be 0
    pub characteristics: u32,
    /// Time the export data was created
    pub time_date_stamp: u32,
    /// Major version number
    pub major_version: u16,
    /// Minor version number
    pub minor_version: u16,
    /// RVA of the DLL name
    pub name: u32,
    /// Ordinal of the first entry in the address table
    pub base: u32,
    /// Entries in the address table
    pub number_of_functions: u32,
    /// Entries in the name pointer and name ordinal tables
    pub number_of_names: u32,
    /// RVA of the address table
    pub address_of_functions: u32,
    /// RVA of the name pointer table
    pub address_of_names: u32,
    /// RVA of the name ordinal table
    pub address_of_name_ordinals: u32,
}

impl ExportDirectory {
    /// Size of the export directory on disk
    pub const SIZE: usize = 40;

    /// Decode an export directory at file offset `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 40 bytes are available.
    pub fn decode(data: &[u8], offset: usize) -> Result<Self> {
        let mut parser = Parser::at(data, offset)?;
        parser.ensure_remaining(Self::SIZE)?;

        Ok(ExportDirectory {
            characteristics: parser.read_le()?,
            time_date_stamp: parser.read_le()?,
            major_version: parser.read_le()?,
            minor_version: parser.read_le()?,
            name: parser.read_le()?,
            base: parser.read_le()?,
            number_of_functions: parser.read_le()?,
            number_of_names: parser.read_le()?,
            address_of_functions: parser.read_le()?,
            address_of_names: parser.read_le()?,
            address_of_name_ordinals: parser.read_le()?,
        })
    }

    /// Write the export directory at file offset `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 40 bytes are available. Nothing is
    /// written in that case.
    pub fn encode(&self, data: &mut [u8], offset: usize) -> Result<()> {
        slice_at(data, offset, Self::SIZE)?;

        let mut cursor = offset;
        write_le_at(data, &mut cursor, self.characteristics)?;
        write_le_at(data, &mut cursor, self.time_date_stamp)?;
        write_le_at(data, &mut cursor, self.major_version)?;
        write_le_at(data, &mut cursor, self.minor_version)?;
        write_le_at(data, &mut cursor, self.name)?;
        write_le_at(data, &mut cursor, self.base)?;
        write_le_at(data, &mut cursor, self.number_of_functions)?;
        write_le_at(data, &mut cursor, self.number_of_names)?;
        write_le_at(data, &mut cursor, self.address_of_functions)?;
        write_le_at(data, &mut cursor, self.address_of_names)?;
        write_le_at(data, &mut cursor, self.address_of_name_ordinals)
    }
}

impl FieldDump for ExportDirectory {
    fn type_name(&self) -> &'static str {
        "IMAGE_EXPORT_DIRECTORY"
    }

    fn fields(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("Characteristics", u64::from(self.characteristics)),
            ("TimeDateStamp", u64::from(self.time_date_stamp)),
            ("MajorVersion", u64::from(self.major_version)),
            ("MinorVersion", u64::from(self.minor_version)),
            ("Name", u64::from(self.name)),
            ("Base", u64::from(self.base)),
            ("NumberOfFunctions", u64::from(self.number_of_functions)),
            ("NumberOfNames", u64::from(self.number_of_names)),
            ("AddressOfFunctions", u64::from(self.address_of_functions)),
            ("AddressOfNames", u64::from(self.address_of_names)),
            ("AddressOfNameOrdinals", u64::from(self.address_of_name_ordinals)),
        ]
    }
}

/// One entry of the exported-function table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFunction {
    /// Exported name, `None` for ordinal-only exports
    pub name: Option<String>,
    /// RVA of the function, or of a forwarder string
    pub address: u32,
    /// `index + Base`
    pub ordinal: u16,
}

impl FieldDump for ExportFunction {
    fn type_name(&self) -> &'static str {
        "ExportFunction"
    }

    fn fields(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("Address", u64::from(self.address)),
            ("Ordinal", u64::from(self.ordinal)),
        ]
    }

    fn dump(&self) -> String {
        let mut out = String::new();
        out.push_str(self.type_name());
        out.push('\n');
        let function_name = self.name.as_deref().unwrap_or("<none>");
        let _ = writeln!(out, "{:<24}: {function_name}", "Name");
        for (name, value) in self.fields() {
            let _ = writeln!(out, "{name:<24}: {value:#x}");
        }
        out
    }
}

impl_display_via_dump!(ExportDirectory, ExportFunction);

/// A parsed export directory together with its resolved function table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTable {
    /// The raw directory header
    pub directory: ExportDirectory,
    /// The DLL name the directory declares, if any
    pub dll_name: Option<String>,
    /// Every exported function, ordered by ordinal
    pub functions: Vec<ExportFunction>,
}

impl ExportTable {
    /// Find an export by name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&ExportFunction> {
        self.functions
            .iter()
            .find(|function| function.name.as_deref() == Some(name))
    }

    /// Find an export by ordinal.
    #[must_use]
    pub fn find_by_ordinal(&self, ordinal: u16) -> Option<&ExportFunction> {
        self.functions
            .iter()
            .find(|function| function.ordinal == ordinal)
    }
}

fn check_limit(what: &'static str, count: u32, limit: usize) -> Result<usize> {
    let count = count as usize;
    if count > limit {
        return Err(Error::LimitExceeded { what, count, limit });
    }
    Ok(count)
}

/// Translate a table RVA and make sure `count` entries of `width` bytes fit into `data`.
fn locate_table(
    data: &[u8],
    rva: u32,
    count: usize,
    width: usize,
    sections: &[SectionHeader],
    what: &str,
) -> Result<usize> {
    let offset = translate(rva, sections)? as usize;
    let fits = count
        .checked_mul(width)
        .is_some_and(|len| slice_at(data, offset, len).is_ok());
    if !fits {
        return Err(corrupt_directory!(
            "{} at {:#x} declares {} entries, more than the file holds",
            what,
            offset,
            count
        ));
    }
    Ok(offset)
}

/// Reconstruct the exported-function table.
///
/// Returns `Ok(None)` if `directory` is `None` or its `AddressOfFunctions` is zero: such an
/// image has no exports, which is not an error.
///
/// The result has one entry per slot of the address table, so `result[i].ordinal` is
/// `i + Base` (truncated to 16 bits). Names are attached from the name tables afterwards;
/// entries without a name keep `name: None`.
///
/// # Arguments
/// * `data`      - The complete file
/// * `directory` - The export directory, if the image declares one
/// * `sections`  - The section table used for RVA translation
/// * `config`    - Entry count and name length limits
///
/// # Errors
/// - [`crate::Error::UnmappedAddress`] if a table or name RVA lies outside every section
/// - [`crate::Error::CorruptDirectory`] if a table does not fit into the file, or a name ordinal
///   index points past `NumberOfFunctions`
/// - [`crate::Error::LimitExceeded`] if `NumberOfFunctions` or `NumberOfNames` exceeds
///   [`ParserConfig::max_exports`]
/// - [`crate::Error::OutOfBounds`] if a name runs off the end of the file
pub fn parse_exports(
    data: &[u8],
    directory: Option<&ExportDirectory>,
    sections: &[SectionHeader],
    config: &ParserConfig,
) -> Result<Option<Vec<ExportFunction>>> {
    let Some(directory) = directory else {
        return Ok(None);
    };
    if directory.address_of_functions == 0 {
        log::debug!("Export directory has no address table");
        return Ok(None);
    }

    let function_count = check_limit(
        "export address table",
        directory.number_of_functions,
        config.max_exports,
    )?;
    let name_count = check_limit(
        "export name table",
        directory.number_of_names,
        config.max_exports,
    )?;

    // Pass 1: the dense address table, one entry per ordinal slot
    let functions_offset = locate_table(
        data,
        directory.address_of_functions,
        function_count,
        4,
        sections,
        "Export address table",
    )?;

    let mut functions = Vec::with_capacity(function_count);
    for index in 0..function_count {
        let address = read_le_from::<u32>(data, functions_offset + index * 4)?;
        #[allow(clippy::cast_possible_truncation)]
        let ordinal = directory.base.wrapping_add(index as u32) as u16;
        functions.push(ExportFunction {
            name: None,
            address,
            ordinal,
        });
    }

    if name_count == 0 {
        return Ok(Some(functions));
    }

    // Pass 2: attach names through the name ordinal table
    let names_offset = locate_table(
        data,
        directory.address_of_names,
        name_count,
        4,
        sections,
        "Export name table",
    )?;
    let ordinals_offset = locate_table(
        data,
        directory.address_of_name_ordinals,
        name_count,
        2,
        sections,
        "Export name ordinal table",
    )?;

    for index in 0..name_count {
        let name_rva = read_le_from::<u32>(data, names_offset + index * 4)?;
        let name_offset = translate(name_rva, sections)? as usize;
        let name = read_cstr_at(data, name_offset, config.max_name_length)?;

        let function_index = read_le_from::<u16>(data, ordinals_offset + index * 2)? as usize;
        let Some(function) = functions.get_mut(function_index) else {
            return Err(corrupt_directory!(
                "Export name '{}' refers to function index {}, but only {} functions exist",
                name,
                function_index,
                function_count
            ));
        };

        function.name = Some(name);
    }

    Ok(Some(functions))
}
