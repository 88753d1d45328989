//! Base relocation blocks (`.reloc`).
//!
//! The base relocation directory is a chain of variable-sized blocks. Each block covers one
//! page and consists of an 8-byte header followed by packed 16-bit entries:
//!
//! ```text
//! +----------------+----------------+--------+--------+-----
//! | VirtualAddress |  SizeOfBlock   | entry  | entry  | ...
//! |      u32       |      u32       |  u16   |  u16   |
//! +----------------+----------------+--------+--------+-----
//! ```
//!
//! Each entry word is split into a 4-bit type in its **low** nibble and a 12-bit page offset
//! in the upper 12 bits.
//!
//! A block with `SizeOfBlock == 0` terminates the chain.

use std::fmt::Write;

use strum::{Display, FromRepr};

use crate::{
    config::ParserConfig,
    file::parser::Parser,
    pe::dump::{impl_display_via_dump, FieldDump},
    Error, Result,
};

/// Interpretation of a relocation entry's 4-bit type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(u8)]
pub enum RelocationType {
    /// Padding, skipped by the loader
    Absolute = 0,
    /// High 16 bits of the delta added to the 16-bit field
    High = 1,
    /// Low 16 bits of the delta added to the 16-bit field
    Low = 2,
    /// Full 32-bit delta added to the 32-bit field
    HighLow = 3,
    /// High 16 bits with the low half in the following entry
    HighAdj = 4,
    /// Machine-specific (MIPS jump, ARM `MOV32`, RISC-V high 20 bits)
    MachineSpecific5 = 5,
    /// Reserved
    Reserved6 = 6,
    /// Machine-specific (Thumb `MOV32`, RISC-V low 12 bits)
    MachineSpecific7 = 7,
    /// Machine-specific (RISC-V low 12 bits, LoongArch)
    MachineSpecific8 = 8,
    /// Machine-specific (MIPS16 jump, IA-64 `IMM64`)
    MachineSpecific9 = 9,
    /// Full 64-bit delta added to the 64-bit field
    Dir64 = 10,
}

/// A single packed relocation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelocationEntry {
    /// Raw 4-bit type, see [`RelocationEntry::relocation_type`]
    pub kind: u8,
    /// 12-bit offset from the block's `VirtualAddress`
    pub offset: u16,
}

impl RelocationEntry {
    /// Split a packed entry word into type and offset.
    ///
    /// ```rust
    /// use pescope::pe::RelocationEntry;
    ///
    /// let entry = RelocationEntry::decode(0x00A3);
    /// assert_eq!(entry.kind, 0x3);
    /// assert_eq!(entry.offset, 0x00A);
    /// ```
    #[must_use]
    pub fn decode(word: u16) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let kind = (word & 0xF) as u8;
        RelocationEntry {
            kind,
            offset: word >> 4,
        }
    }

    /// Pack the entry back into a 16-bit word.
    #[must_use]
    pub fn encode(&self) -> u16 {
        (self.offset << 4) | u16::from(self.kind & 0xF)
    }

    /// The named relocation type, `None` for the undefined values 11 to 15.
    #[must_use]
    pub fn relocation_type(&self) -> Option<RelocationType> {
        RelocationType::from_repr(self.kind)
    }

    /// RVA patched by this entry.
    #[must_use]
    pub fn rva(&self, block: &RelocationBlock) -> u32 {
        block.virtual_address.wrapping_add(u32::from(self.offset))
    }
}

impl FieldDump for RelocationEntry {
    fn type_name(&self) -> &'static str {
        "RelocationEntry"
    }

    fn fields(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("Type", u64::from(self.kind)),
            ("Offset", u64::from(self.offset)),
        ]
    }
}

/// One page worth of relocations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationBlock {
    /// Page RVA all entry offsets are relative to
    pub virtual_address: u32,
    /// Declared size of the block, header included
    pub size_of_block: u32,
    /// Decoded entries, `(SizeOfBlock - 8) / 2` of them
    pub entries: Vec<RelocationEntry>,
}

impl RelocationBlock {
    /// Size of the block header on disk
    pub const HEADER_SIZE: usize = 8;

    /// Iterate over the RVAs patched by this block, skipping `Absolute` padding.
    pub fn targets(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries
            .iter()
            .filter(|entry| entry.relocation_type() != Some(RelocationType::Absolute))
            .map(|entry| entry.rva(self))
    }
}

impl FieldDump for RelocationBlock {
    fn type_name(&self) -> &'static str {
        "RelocationBlock"
    }

    fn fields(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("VirtualAddress", u64::from(self.virtual_address)),
            ("SizeOfBlock", u64::from(self.size_of_block)),
        ]
    }

    fn dump(&self) -> String {
        let mut out = String::new();
        out.push_str(self.type_name());
        out.push('\n');
        for (name, value) in self.fields() {
            let _ = writeln!(out, "{name:<24}: {value:#x}");
        }
        for entry in &self.entries {
            let kind = entry
                .relocation_type()
                .map_or_else(|| format!("Unknown({})", entry.kind), |kind| kind.to_string());
            let _ = writeln!(out, "  {:#06x} {kind}", entry.offset);
        }
        out
    }
}

impl_display_via_dump!(RelocationEntry, RelocationBlock);

/// Walk the chain of relocation blocks.
///
/// Reading starts at file offset `first_block_offset` and stops once `directory_size` bytes
/// were consumed or a block with `SizeOfBlock == 0` is found. Entries are decoded
/// unconditionally, including `Absolute` padding and undefined types.
///
/// # Arguments
/// * `data`               - The complete file
/// * `first_block_offset` - File offset of the first block
/// * `directory_size`     - Size of the base relocation directory in bytes
/// * `config`             - The total entry limit
///
/// # Errors
/// - [`crate::Error::CorruptRelocationBlock`] if a block declares `0 < SizeOfBlock < 8`
/// - [`crate::Error::CorruptDirectory`] if a block runs past `directory_size`, or fewer than
///   8 bytes of the directory remain for the next block header
/// - [`crate::Error::OutOfBounds`] if a block runs past the end of the file
/// - [`crate::Error::LimitExceeded`] if the entry total exceeds
///   [`ParserConfig::max_relocation_entries`]
pub fn parse_relocations(
    data: &[u8],
    first_block_offset: usize,
    directory_size: usize,
    config: &ParserConfig,
) -> Result<Vec<RelocationBlock>> {
    let mut parser = Parser::at(data, first_block_offset)?;
    let mut blocks = Vec::new();
    let mut consumed = 0usize;
    let mut total_entries = 0usize;

    while consumed < directory_size {
        let block_offset = parser.pos();
        if directory_size - consumed < RelocationBlock::HEADER_SIZE {
            return Err(corrupt_directory!(
                "{} trailing bytes at offset {:#x} are too few for a relocation block header",
                directory_size - consumed,
                block_offset
            ));
        }

        let virtual_address = parser.read_le::<u32>()?;
        let size_of_block = parser.read_le::<u32>()?;

        if size_of_block == 0 {
            break;
        }

        let block_size = size_of_block as usize;
        if block_size < RelocationBlock::HEADER_SIZE {
            return Err(Error::CorruptRelocationBlock {
                offset: block_offset,
                size: size_of_block,
            });
        }
        if block_size > directory_size - consumed {
            return Err(corrupt_directory!(
                "Relocation block at {:#x} declares {} bytes, but only {} remain in the directory",
                block_offset,
                block_size,
                directory_size - consumed
            ));
        }

        let count = (block_size - RelocationBlock::HEADER_SIZE) / 2;
        total_entries += count;
        if total_entries > config.max_relocation_entries {
            return Err(Error::LimitExceeded {
                what: "base relocation entries",
                count: total_entries,
                limit: config.max_relocation_entries,
            });
        }

        parser.ensure_remaining(count * 2)?;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            entries.push(RelocationEntry::decode(parser.read_le()?));
        }

        blocks.push(RelocationBlock {
            virtual_address,
            size_of_block,
            entries,
        });

        // An odd SizeOfBlock leaves one padding byte that belongs to this block
        parser.seek(block_offset)?;
        parser.advance_by(block_size)?;
        consumed += block_size;
    }

    log::debug!(
        "Parsed {} relocation blocks with {} entries",
        blocks.len(),
        total_entries
    );

    Ok(blocks)
}
