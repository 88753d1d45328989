// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # pescope
//!
//! A tolerant parser for Portable Executable (PE/COFF) images, the format of Windows
//! executables, DLLs and drivers. Built in pure Rust, `pescope` decodes the headers, translates
//! relative virtual addresses and reconstructs the export, import and base relocation
//! directories of an image without loading or executing it.
//!
//! ## Features
//!
//! - **Efficient memory access** - Memory-mapped file access, every read bounds-checked
//! - **Tolerant parsing** - A damaged directory is reported next to the readable ones instead
//!   of failing the whole image
//! - **Configurable limits** - Counts taken from the file are capped by [`ParserConfig`]
//! - **Parallel directory parsing** - Independent directories are decoded concurrently
//! - **Round-trip encoding** - Headers and directory records can be written back in place
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pescope::prelude::*;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("kernel32.dll"))?;
//! let report = file.directories();
//!
//! if let Some(exports) = report.exports.parsed() {
//!     for function in &exports.functions {
//!         println!("{:5} {:#010x} {:?}", function.ordinal, function.address, function.name);
//!     }
//! }
//! # Ok::<(), pescope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types
//! - [`file`] - The [`File`] facade, data backends and low-level byte I/O
//! - [`pe`] - PE structures, RVA translation and the directory parsers
//! - [`config`] - [`ParserConfig`] limits
//! - [`Error`] and [`Result`] - Error handling
//!
//! ### Parse contract
//!
//! Header damage is fatal: [`File::from_mem`] and [`File::from_file`] return an [`Error`].
//! Directory damage is not: [`File::directories`] records a [`pe::DirectoryStatus`] per
//! directory, distinguishing a directory the image does not declare from one that is declared
//! but unreadable.
//!
//! ### Low-level parsing
//!
//! ```rust
//! use pescope::{pe::parse_relocations, ParserConfig};
//!
//! // One block for page 0x1000 with a single HIGHLOW entry at offset 0xA, then the terminator
//! let data = [
//!     0x00, 0x10, 0x00, 0x00, 0x0A, 0x00, 0x00, 0x00, 0xA3, 0x00,
//!     0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
//! ];
//!
//! let blocks = parse_relocations(&data, 0, data.len(), &ParserConfig::default())?;
//! assert_eq!(blocks.len(), 1);
//! assert_eq!(blocks[0].entries[0].kind, 3);
//! assert_eq!(blocks[0].entries[0].offset, 0xA);
//! # Ok::<(), pescope::Error>(())
//! ```
//!
//! ## Logging
//!
//! `pescope` emits diagnostics through the [`log`](https://docs.rs/log) facade: `debug` for
//! absent directories and chain terminations, `warn` for malformed directories. No logger is
//! installed by the library.

#[macro_use]
pub(crate) mod error;

pub mod config;
pub mod file;
pub mod pe;
pub mod prelude;

#[cfg(test)]
mod test;

/// `pescope` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `pescope` Error type
///
/// The main error type for all operations in this crate. See [`Error`] for the variants and
/// their meaning.
pub use error::Error;

/// Limits and switches applied while parsing
pub use config::ParserConfig;

/// Provides access to low-level file and memory parsing utilities.
///
/// The [`Parser`] type is a bounds-checked cursor over a byte slice, the building block of
/// every structure decoder in [`pe`].
pub use file::parser::Parser;

/// Main entry point for working with PE images.
///
/// See [`file::File`] for loading, address translation and directory parsing.
pub use file::File;
