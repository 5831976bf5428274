//! # Error Types
//!
//! Error handling for symbol loading and frame lookups.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.
//!
//! A lookup against a module that was never loaded is *not* an error: lookups
//! return `None` or leave the frame untouched instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::Address;

/// Main error type for symbol registry operations
///
/// ## Error Categories
///
/// 1. **Acquisition errors**: Io, Allocation, InvalidArgument
/// 2. **Registration errors**: InvalidModule, DuplicateModule
/// 3. **Content errors**: Parse, CfiRuleSet
/// 4. **Evaluation errors**: Evaluation, MemoryRead
#[derive(Error, Debug)]
pub enum SymbolError
{
    /// A symbol file could not be stat'd, opened, or fully read
    ///
    /// A short read (fewer bytes than the file's reported length) also lands
    /// here with `io::ErrorKind::UnexpectedEof`.
    #[error("IO error on {}: {source}", path.display())]
    Io
    {
        /// File that was being read
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// The symbol buffer could not be allocated
    ///
    /// Raised when the fallible reservation fails or when the requested size
    /// is above the configured [`LoadLimits`](crate::symbols::LoadLimits).
    #[error("Could not allocate {requested} bytes for symbol data: {reason}")]
    Allocation
    {
        /// Bytes requested, including the terminator
        requested: u64,
        /// Why the allocation was refused
        reason: String,
    },

    /// Invalid argument passed to a loader function (e.g. an empty path)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The module identity cannot be used as a registry key
    #[error("Invalid module: {0}")]
    InvalidModule(String),

    /// Symbols for this module key are already loaded
    #[error("Symbols for module {0} already loaded")]
    DuplicateModule(String),

    /// The symbol table rejected the buffer contents
    #[error("Parse error in {module} at line {line}: {message}")]
    Parse
    {
        /// Module key the table was created for
        module: String,
        /// 1-based line number of the offending record
        line: usize,
        /// What was wrong with the record
        message: String,
    },

    /// Syntax error in a CFI rule set
    #[error("Malformed CFI rule set: {0}")]
    CfiRuleSet(String),

    /// A postfix expression could not be evaluated
    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    /// Memory at the given address could not be read during evaluation
    #[error("Could not read memory at {0}")]
    MemoryRead(Address),
}

impl SymbolError
{
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self
    {
        SymbolError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience type alias for `Result<T, SymbolError>`
///
/// ```rust
/// use crashsym_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, SymbolError>;
