//! Code module identity.
//!
//! A code module is one binary image (executable or shared library) that was
//! mapped into the crashed process. Module enumeration happens elsewhere in the
//! pipeline; this crate only reads the identity it is handed.

use std::fmt;

use super::Address;

/// Read-only identity of a binary image present at crash time.
///
/// `code_file()` is the registry key: two modules with the same code file are
/// the same module as far as symbol loading is concerned.
pub trait CodeModule: fmt::Debug
{
    /// Stable identifier used for registry lookups and de-duplication.
    fn code_file(&self) -> &str;

    /// Address the image was loaded at.
    fn base_address(&self) -> Address;

    /// Size of the mapped image in bytes.
    fn size(&self) -> u64;

    /// Name of the file holding debug information, if different from the code file.
    fn debug_file(&self) -> Option<&str>
    {
        None
    }

    /// Build identifier of the debug file.
    fn debug_identifier(&self) -> Option<&str>
    {
        None
    }

    /// Version string of the image.
    fn version(&self) -> Option<&str>
    {
        None
    }

    /// Whether `address` falls inside this image.
    fn contains(&self, address: Address) -> bool
    {
        address
            .relative_to(self.base_address())
            .is_some_and(|offset| offset < self.size())
    }
}

/// Plain-data [`CodeModule`] for callers that do not carry their own module type.
///
/// ```rust
/// use crashsym_core::types::{Address, CodeModule, ModuleDescriptor};
///
/// let module = ModuleDescriptor::new("libc.so.6")
///     .with_base_address(0x7f00_0000_0000)
///     .with_size(0x20_0000);
/// assert!(module.contains(Address::new(0x7f00_0000_1000)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor
{
    pub code_file: String,
    pub base_address: Address,
    pub size: u64,
    pub debug_file: Option<String>,
    pub debug_identifier: Option<String>,
    pub version: Option<String>,
}

impl ModuleDescriptor
{
    /// Describe a module by its code file, mapped at zero with an unbounded size.
    pub fn new(code_file: impl Into<String>) -> Self
    {
        Self {
            code_file: code_file.into(),
            base_address: Address::ZERO,
            size: u64::MAX,
            debug_file: None,
            debug_identifier: None,
            version: None,
        }
    }

    #[must_use]
    pub fn with_base_address(mut self, base: impl Into<Address>) -> Self
    {
        self.base_address = base.into();
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self
    {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_debug_info(mut self, debug_file: impl Into<String>, debug_identifier: impl Into<String>) -> Self
    {
        self.debug_file = Some(debug_file.into());
        self.debug_identifier = Some(debug_identifier.into());
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self
    {
        self.version = Some(version.into());
        self
    }
}

impl CodeModule for ModuleDescriptor
{
    fn code_file(&self) -> &str
    {
        &self.code_file
    }

    fn base_address(&self) -> Address
    {
        self.base_address
    }

    fn size(&self) -> u64
    {
        self.size
    }

    fn debug_file(&self) -> Option<&str>
    {
        self.debug_file.as_deref()
    }

    fn debug_identifier(&self) -> Option<&str>
    {
        self.debug_identifier.as_deref()
    }

    fn version(&self) -> Option<&str>
    {
        self.version.as_deref()
    }
}
