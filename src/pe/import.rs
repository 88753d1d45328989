//! Import descriptor table and thunk decoding.
//!
//! The import directory is an array of 20-byte `IMAGE_IMPORT_DESCRIPTOR`s terminated by an
//! all-zero entry. Each descriptor names one DLL and points at a zero-terminated array of
//! thunks, 4 bytes wide in PE32 images and 8 bytes wide in PE32+ images. A thunk with its
//! high bit set imports by ordinal; otherwise it holds the RVA of an `IMAGE_IMPORT_BY_NAME`
//! (a 16-bit hint followed by the function name).

use crate::{
    config::ParserConfig,
    file::{
        io::{read_cstr_at, read_le_from, slice_at, write_le_at},
        parser::Parser,
    },
    pe::{
        dump::{impl_display_via_dump, FieldDump},
        optional::DataDirectory,
        rva::translate,
        section::SectionHeader,
    },
    Error, Result,
};

/// `IMAGE_IMPORT_DESCRIPTOR`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportDescriptor {
    /// RVA of the import lookup table, 0 in some old linkers' output
    pub original_first_thunk: u32,
    /// 0 unless the image is bound
    pub time_date_stamp: u32,
    /// Index of the first forwarder reference
    pub forwarder_chain: u32,
    /// RVA of the DLL name
    pub name: u32,
    /// RVA of the import address table
    pub first_thunk: u32,
}

impl ImportDescriptor {
    /// Size of an import descriptor on disk
    pub const SIZE: usize = 20;

    /// Decode an import descriptor at file offset `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 20 bytes are available.
    pub fn decode(data: &[u8], offset: usize) -> Result<Self> {
        let mut parser = Parser::at(data, offset)?;
        parser.ensure_remaining(Self::SIZE)?;

        Ok(ImportDescriptor {
            original_first_thunk: parser.read_le()?,
            time_date_stamp: parser.read_le()?,
            forwarder_chain: parser.read_le()?,
            name: parser.read_le()?,
            first_thunk: parser.read_le()?,
        })
    }

    /// Write the descriptor at file offset `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 20 bytes are available.
    pub fn encode(&self, data: &mut [u8], offset: usize) -> Result<()> {
        slice_at(data, offset, Self::SIZE)?;

        let mut cursor = offset;
        write_le_at(data, &mut cursor, self.original_first_thunk)?;
        write_le_at(data, &mut cursor, self.time_date_stamp)?;
        write_le_at(data, &mut cursor, self.forwarder_chain)?;
        write_le_at(data, &mut cursor, self.name)?;
        write_le_at(data, &mut cursor, self.first_thunk)
    }

    /// The all-zero descriptor that ends the table.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        *self == ImportDescriptor::default()
    }

    /// RVA of the thunk array to decode, preferring the lookup table over the IAT.
    #[must_use]
    pub fn lookup_rva(&self) -> u32 {
        if self.original_first_thunk != 0 {
            self.original_first_thunk
        } else {
            self.first_thunk
        }
    }
}

impl FieldDump for ImportDescriptor {
    fn type_name(&self) -> &'static str {
        "IMAGE_IMPORT_DESCRIPTOR"
    }

    fn fields(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("OriginalFirstThunk", u64::from(self.original_first_thunk)),
            ("TimeDateStamp", u64::from(self.time_date_stamp)),
            ("ForwarderChain", u64::from(self.forwarder_chain)),
            ("Name", u64::from(self.name)),
            ("FirstThunk", u64::from(self.first_thunk)),
        ]
    }
}

impl_display_via_dump!(ImportDescriptor);

/// One imported function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFunction {
    /// Name of the DLL the function is imported from
    pub dll: String,
    /// Function name, set for imports by name
    pub name: Option<String>,
    /// Export name table hint, set for imports by name
    pub hint: Option<u16>,
    /// Ordinal, set for imports by ordinal
    pub ordinal: Option<u16>,
    /// RVA of the IAT slot the loader patches for this function
    pub iat_rva: u32,
}

/// All functions imported from one DLL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedDll {
    /// DLL name as stored in the image
    pub name: String,
    /// The raw descriptor
    pub descriptor: ImportDescriptor,
    /// Imported functions in thunk order
    pub functions: Vec<ImportFunction>,
}

/// Decoded content of a single thunk
enum Thunk {
    Ordinal(u16),
    ByName(u32),
}

fn read_thunk(data: &[u8], offset: usize, is_pe32_plus: bool) -> Result<Option<Thunk>> {
    let (value, ordinal_flag) = if is_pe32_plus {
        (read_le_from::<u64>(data, offset)?, 1u64 << 63)
    } else {
        (
            u64::from(read_le_from::<u32>(data, offset)?),
            1u64 << 31,
        )
    };

    if value == 0 {
        return Ok(None);
    }

    #[allow(clippy::cast_possible_truncation)]
    let thunk = if value & ordinal_flag != 0 {
        Thunk::Ordinal((value & 0xFFFF) as u16)
    } else {
        Thunk::ByName((value & 0x7FFF_FFFF) as u32)
    };
    Ok(Some(thunk))
}

/// Decode every descriptor of the import directory and its thunks.
///
/// Returns `Ok(None)` if `directory` is `None` or has a zero RVA.
///
/// # Arguments
/// * `data`         - The complete file
/// * `directory`    - The import data directory entry
/// * `sections`     - The section table used for RVA translation
/// * `is_pe32_plus` - Selects 8-byte thunks instead of 4-byte thunks
/// * `config`       - Import count and name length limits
///
/// # Errors
/// - [`crate::Error::UnmappedAddress`] if a descriptor, name or thunk RVA is not mapped
/// - [`crate::Error::OutOfBounds`] if a table runs off the end of the file
/// - [`crate::Error::LimitExceeded`] if the number of DLLs or of imported functions exceeds
///   [`ParserConfig::max_imports`]
/// - [`crate::Error::Malformed`] if a name is longer than [`ParserConfig::max_name_length`]
pub fn parse_imports(
    data: &[u8],
    directory: Option<&DataDirectory>,
    sections: &[SectionHeader],
    is_pe32_plus: bool,
    config: &ParserConfig,
) -> Result<Option<Vec<ImportedDll>>> {
    let Some(directory) = directory.filter(|directory| directory.virtual_address != 0) else {
        return Ok(None);
    };

    let thunk_size: u32 = if is_pe32_plus { 8 } else { 4 };
    let mut descriptor_offset = translate(directory.virtual_address, sections)? as usize;
    let mut dlls = Vec::new();
    let mut total_functions = 0usize;

    loop {
        let descriptor = ImportDescriptor::decode(data, descriptor_offset)?;
        if descriptor.is_terminator() {
            break;
        }
        if dlls.len() >= config.max_imports {
            return Err(Error::LimitExceeded {
                what: "import descriptors",
                count: dlls.len() + 1,
                limit: config.max_imports,
            });
        }

        let name = read_cstr_at(
            data,
            translate(descriptor.name, sections)? as usize,
            config.max_name_length,
        )?;

        let mut thunk_offset = translate(descriptor.lookup_rva(), sections)? as usize;
        let mut iat_rva = descriptor.first_thunk;
        let mut functions = Vec::new();

        while let Some(thunk) = read_thunk(data, thunk_offset, is_pe32_plus)? {
            total_functions += 1;
            if total_functions > config.max_imports {
                return Err(Error::LimitExceeded {
                    what: "imported functions",
                    count: total_functions,
                    limit: config.max_imports,
                });
            }

            let function = match thunk {
                Thunk::Ordinal(ordinal) => ImportFunction {
                    dll: name.clone(),
                    name: None,
                    hint: None,
                    ordinal: Some(ordinal),
                    iat_rva,
                },
                Thunk::ByName(rva) => {
                    let hint_offset = translate(rva, sections)? as usize;
                    ImportFunction {
                        dll: name.clone(),
                        hint: Some(read_le_from::<u16>(data, hint_offset)?),
                        name: Some(read_cstr_at(
                            data,
                            hint_offset + 2,
                            config.max_name_length,
                        )?),
                        ordinal: None,
                        iat_rva,
                    }
                }
            };
            functions.push(function);

            thunk_offset += thunk_size as usize;
            iat_rva = iat_rva.wrapping_add(thunk_size);
        }

        log::debug!("Import descriptor '{}' with {} functions", name, functions.len());
        dlls.push(ImportedDll {
            name,
            descriptor,
            functions,
        });
        descriptor_offset += ImportDescriptor::SIZE;
    }

    Ok(Some(dlls))
}
