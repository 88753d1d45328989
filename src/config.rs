//! Parser configuration
//!
//! [`ParserConfig`] holds the limits applied while decoding a PE image. Every table whose size
//! is taken from the file is capped before anything is allocated for it.

/// Limits and switches for PE parsing.
///
/// # Examples
///
/// ```rust
/// use pescope::ParserConfig;
///
/// let config = ParserConfig {
///     max_exports: 1024,
///     ..ParserConfig::default()
/// };
/// assert!(config.parallel);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Maximum entries in the section table
    pub max_sections: usize,

    /// Maximum `NumberOfFunctions` / `NumberOfNames` of an export directory
    pub max_exports: usize,

    /// Maximum relocation entries across all blocks of the relocation directory
    pub max_relocation_entries: usize,

    /// Maximum import descriptors, and maximum imported functions across all descriptors
    pub max_imports: usize,

    /// Maximum length of a zero-terminated name, excluding the terminator
    pub max_name_length: usize,

    /// Parse independent directories concurrently
    pub parallel: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_sections: 65_535,
            max_exports: 65_536,
            max_relocation_entries: 1 << 22,
            max_imports: 1 << 16,
            max_name_length: 4096,
            parallel: true,
        }
    }
}

impl ParserConfig {
    /// No limits beyond what the field widths of the format allow.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            max_sections: usize::MAX,
            max_exports: usize::MAX,
            max_relocation_entries: usize::MAX,
            max_imports: usize::MAX,
            max_name_length: usize::MAX,
            parallel: true,
        }
    }

    /// Limits matching what the Windows loader accepts in practice.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            max_sections: 96,
            max_exports: 16_384,
            max_relocation_entries: 1 << 20,
            max_imports: 4096,
            max_name_length: 512,
            parallel: true,
        }
    }

    /// Strict limits, single-threaded. Suited for fuzzing and for parsing many small
    /// files from an outer worker pool.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            parallel: false,
            ..Self::strict()
        }
    }
}
