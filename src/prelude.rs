//! # pescope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the pescope library. Import this module to get quick access to the essential
//! types for PE image analysis.
//!
//! ```rust,no_run
//! use pescope::prelude::*;
//!
//! let file = File::from_mem(std::fs::read("sample.dll")?)?;
//! for section in file.sections() {
//!     println!("{}", section.dump());
//! }
//! # Ok::<(), pescope::Error>(())
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all pescope operations
pub use crate::Error;

/// The result type used throughout pescope
pub use crate::Result;

/// Limits applied while parsing
pub use crate::ParserConfig;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Image facade and the low-level cursor
pub use crate::{File, Parser};

// ================================================================================================
// Headers
// ================================================================================================

/// Header records and their flag types
pub use crate::pe::{
    CoffHeader, DataDirectory, DataDirectoryType, DosHeader, FileCharacteristics,
    OptionalHeader, SectionCharacteristics, SectionHeader,
};

// ================================================================================================
// Directories
// ================================================================================================

/// Per-directory parse outcome
pub use crate::pe::{DirectoryReport, DirectoryStatus};

/// Exports
pub use crate::pe::{ExportDirectory, ExportFunction, ExportTable};

/// Imports
pub use crate::pe::{ImportDescriptor, ImportFunction, ImportedDll};

/// Base relocations
pub use crate::pe::{RelocationBlock, RelocationEntry, RelocationType};

// ================================================================================================
// Diagnostics
// ================================================================================================

/// Field listing and dump for every decoded record
pub use crate::pe::FieldDump;
