//! Names and source positions read from `FUNC`, `PUBLIC`, `FILE`, and line records.

use std::fmt;

/// Mangling scheme detected on a `FUNC` or `PUBLIC` name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolLanguage
{
    Rust,
    /// Itanium `_Z` linkage name that is not a Rust legacy name.
    Cpp,
    /// Already demangled by the dump tool, or a plain C name.
    Unknown,
}

impl SymbolLanguage
{
    /// Classify a record name by its linkage prefix alone.
    ///
    /// Rust legacy names also start with `_Z`; callers that managed to demangle
    /// a name as Rust should prefer that answer.
    pub fn of_linkage_name(name: &str) -> Self
    {
        if name.starts_with("_R") {
            SymbolLanguage::Rust
        } else if name.starts_with("_Z") {
            SymbolLanguage::Cpp
        } else {
            SymbolLanguage::Unknown
        }
    }
}

impl fmt::Display for SymbolLanguage
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            SymbolLanguage::Rust => "rust",
            SymbolLanguage::Cpp => "c++",
            SymbolLanguage::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

/// Name field of a `FUNC` or `PUBLIC` record.
///
/// The record text is kept as-is. `demangled` is only set when the record
/// carried a Rust linkage name; names the dump tool already demangled have
/// no second form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolName
{
    raw: String,
    demangled: Option<String>,
    language: SymbolLanguage,
}

impl SymbolName
{
    pub fn new(raw: String, demangled: Option<String>, language: SymbolLanguage) -> Self
    {
        Self {
            raw,
            demangled,
            language,
        }
    }

    /// Record name, including any parameter list the dump tool appended.
    pub fn raw(&self) -> &str
    {
        &self.raw
    }

    pub fn demangled(&self) -> Option<&str>
    {
        self.demangled.as_deref()
    }

    /// What a symbolicated frame shows for this record.
    pub fn display_name(&self) -> &str
    {
        self.demangled.as_deref().unwrap_or(&self.raw)
    }

    pub fn language(&self) -> SymbolLanguage
    {
        self.language
    }
}

impl fmt::Display for SymbolName
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.display_name())
    }
}

/// Line record resolved through the `FILE` table.
///
/// Only produced when the line record's file id names a `FILE` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation
{
    /// `FILE` record path, unnormalized.
    pub file: String,
    /// Decimal line number from the line record.
    pub line: u32,
}

impl SourceLocation
{
    pub fn new(file: impl Into<String>, line: u32) -> Self
    {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}:{}", self.file, self.line)
    }
}
