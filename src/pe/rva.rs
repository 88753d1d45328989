//! Relative virtual address translation.
//!
//! PE directories reference each other by RVA, an offset from the image base once the loader
//! has mapped every section. Parsing the raw file requires the inverse mapping: find the section
//! whose virtual window contains the RVA and rebase it onto that section's raw data.
//!
//! Sections are scanned in table order and the first match wins, so overlapping windows resolve
//! to the earlier section.
//!
//! ```rust
//! use pescope::pe::{rva::translate, SectionHeader};
//!
//! let sections = [SectionHeader {
//!     virtual_address: 0x1000,
//!     virtual_size: 0x2000,
//!     pointer_to_raw_data: 0x400,
//!     ..SectionHeader::default()
//! }];
//!
//! assert_eq!(translate(0x1234, &sections)?, 0x634);
//! assert!(translate(0x3000, &sections).is_err());
//! # Ok::<(), pescope::Error>(())
//! ```

use crate::{pe::section::SectionHeader, Error, Result};

/// Translate `rva` to a file offset through the first section whose virtual window contains it.
///
/// No check against the buffer length is made; the caller bounds-checks before dereferencing.
///
/// # Errors
/// Returns [`crate::Error::UnmappedAddress`] if no section contains `rva`, or if the resulting
/// offset does not fit into `u32`.
pub fn translate(rva: u32, sections: &[SectionHeader]) -> Result<u32> {
    let Some(section) = sections.iter().find(|section| section.contains_rva(rva)) else {
        return Err(Error::UnmappedAddress(rva));
    };

    section
        .pointer_to_raw_data
        .checked_add(rva - section.virtual_address)
        .ok_or(Error::UnmappedAddress(rva))
}

/// Translate a file offset back to an RVA through the first section whose raw window
/// contains it.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if no section's raw data contains `offset`.
pub fn offset_to_rva(offset: u32, sections: &[SectionHeader]) -> Result<u32> {
    let Some(section) = sections
        .iter()
        .find(|section| section.contains_offset(offset))
    else {
        return Err(malformed_error!(
            "Offset could not be converted to RVA - {:#x}",
            offset
        ));
    };

    section
        .virtual_address
        .checked_add(offset - section.pointer_to_raw_data)
        .ok_or_else(|| malformed_error!("RVA for offset {:#x} overflows", offset))
}
