//! Human-readable field dumps of decoded structures.
//!
//! Every header and directory record implements [`FieldDump`], which lists its fields as
//! `(name, value)` pairs. The rendered form is meant for diagnostics and logs only; its exact
//! layout is not a stable interface.
//!
//! ```rust
//! use pescope::pe::{FieldDump, RelocationEntry};
//!
//! let entry = RelocationEntry::decode(0x00A3);
//! assert_eq!(entry.fields(), vec![("Type", 3), ("Offset", 10)]);
//! assert!(entry.dump().starts_with("RelocationEntry\n"));
//! ```

use std::fmt::Write;

/// Field-level introspection for decoded PE structures.
pub trait FieldDump {
    /// Name of the structure, printed as the dump header.
    fn type_name(&self) -> &'static str;

    /// All fields of the structure in on-disk order, widened to `u64`.
    fn fields(&self) -> Vec<(&'static str, u64)>;

    /// Render the structure as one `name : value` line per field.
    fn dump(&self) -> String {
        let mut out = String::new();
        out.push_str(self.type_name());
        out.push('\n');
        for (name, value) in self.fields() {
            // Writing into a String cannot fail
            let _ = writeln!(out, "{name:<24}: {value:#x}");
        }
        out
    }
}

/// Implements [`std::fmt::Display`] in terms of [`FieldDump::dump`].
macro_rules! impl_display_via_dump {
    ($($ty:ty),* $(,)?) => {
        $(
            impl std::fmt::Display for $ty {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&crate::pe::FieldDump::dump(self))
                }
            }
        )*
    };
}

pub(crate) use impl_display_via_dump;
