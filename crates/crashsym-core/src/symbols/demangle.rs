//! Symbol demangling utilities.
//!
//! Symbol files usually carry names that were demangled when the file was
//! produced, but `PUBLIC` records and some toolchains emit linkage names
//! verbatim. Rust names are demangled here; C++ linkage names are only
//! classified.

use rustc_demangle::try_demangle;

use crate::types::{SymbolLanguage, SymbolName};

/// Build a [`SymbolName`] from a name as it appears in a symbol file.
///
/// Rust hashes (`::h0123456789abcdef`) are stripped from the demangled form.
pub(crate) fn make_symbol_name(raw: &str) -> SymbolName
{
    let demangled = try_demangle(raw).ok().map(|d| format!("{d:#}"));
    let language = if demangled.is_some() {
        SymbolLanguage::Rust
    } else {
        SymbolLanguage::of_linkage_name(raw)
    };

    SymbolName::new(raw.to_owned(), demangled, language)
}
