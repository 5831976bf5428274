//! # Module Registry
//!
//! Owns one parsed [`SymbolModule`] per code module and enforces that a code
//! file is loaded at most once. Per-frame queries are dispatched from here as
//! well (see the `lookup` module).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use crashsym_core::symbols::{BasicModuleFactory, ModuleRegistry};
//! use crashsym_core::types::{CodeModule, ModuleDescriptor, StackFrame};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>>
//! {
//!     let mut registry = ModuleRegistry::new(Box::new(BasicModuleFactory));
//!     let module: Arc<dyn CodeModule> = Arc::new(ModuleDescriptor::new("app").with_base_address(0x40_0000));
//!
//!     registry.load_module(module.as_ref(), "/symbols/app.sym")?;
//!
//!     let mut frame = StackFrame::new(0x40_1000, Some(module));
//!     registry.fill_source_line_info(&mut frame);
//!     if let Some(location) = &frame.location {
//!         println!("{location}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Thread Safety
//!
//! The registry is not thread-safe. Shard registries per worker or serialize
//! access externally.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, warn};

use super::buffer::{LoadLimits, SymbolBuffer};
use super::hooks::{BufferHandoff, DiscardBuffers, LoadHooks};
use super::module::{ModuleFactory, SymbolModule};
use crate::error::{Result, SymbolError};
use crate::types::CodeModule;

/// Registry of loaded symbol modules keyed by code file.
///
/// Dropping the registry drops every symbol module, then the factory, and
/// finally fires [`LoadHooks::on_teardown`].
pub struct ModuleRegistry<H: LoadHooks = DiscardBuffers>
{
    // Fields drop in declaration order; the hook slot must stay last.
    modules: HashMap<String, Box<dyn SymbolModule>>,
    factory: Box<dyn ModuleFactory>,
    limits: LoadLimits,
    hooks: HookSlot<H>,
}

/// Fires `on_teardown` when the registry's last field is dropped.
struct HookSlot<H: LoadHooks>(H);

impl<H: LoadHooks> Drop for HookSlot<H>
{
    fn drop(&mut self)
    {
        self.0.on_teardown();
    }
}

impl ModuleRegistry<DiscardBuffers>
{
    /// Registry that drops each raw buffer once its module is parsed.
    pub fn new(factory: Box<dyn ModuleFactory>) -> Self
    {
        Self::with_hooks(factory, DiscardBuffers)
    }
}

impl<H: LoadHooks> ModuleRegistry<H>
{
    /// Registry driving the given lifecycle strategy.
    pub fn with_hooks(factory: Box<dyn ModuleFactory>, hooks: H) -> Self
    {
        Self {
            modules: HashMap::new(),
            factory,
            limits: LoadLimits::default(),
            hooks: HookSlot(hooks),
        }
    }

    /// Replace the buffer allocation limits.
    #[must_use]
    pub fn with_limits(mut self, limits: LoadLimits) -> Self
    {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> &LoadLimits
    {
        &self.limits
    }

    /// The lifecycle strategy.
    pub fn hooks(&self) -> &H
    {
        &self.hooks.0
    }

    /// Load symbols for `module` from a file.
    ///
    /// ## Errors
    ///
    /// - `InvalidModule` if the module has an empty code file
    /// - `DuplicateModule` if symbols for the code file are already loaded
    /// - `InvalidArgument`, `Io`, or `Allocation` if the file cannot be read
    /// - `Parse` if the symbol module rejects the contents
    ///
    /// The registry is unchanged on every error.
    pub fn load_module(&mut self, module: &dyn CodeModule, path: impl AsRef<Path>) -> Result<()>
    {
        let path = path.as_ref();
        let key = module_key(module)?;
        self.ensure_absent(key)?;

        info!(module = key, path = %path.display(), "Loading symbols for module");
        let buffer = SymbolBuffer::from_file(path, &self.limits)?;
        debug!(path = %path.display(), size = buffer.len(), "Read symbol file");

        let handoff = self.hooks.0.before_load(module, &buffer);
        self.load_from_buffer(module, buffer, handoff)
    }

    /// Load symbols for `module` from an in-memory copy of a symbol file.
    ///
    /// ## Errors
    ///
    /// Same as [`load_module`](Self::load_module), without the I/O cases.
    pub fn load_module_from_blob(&mut self, module: &dyn CodeModule, blob: &[u8]) -> Result<()>
    {
        let key = module_key(module)?;
        self.ensure_absent(key)?;

        let buffer = SymbolBuffer::from_blob(blob, &self.limits)?;
        let handoff = self.hooks.0.before_load(module, &buffer);
        self.load_from_buffer(module, buffer, handoff)
    }

    /// Shared tail of both load paths. Consumes `buffer` on every path.
    fn load_from_buffer(&mut self, module: &dyn CodeModule, buffer: SymbolBuffer, handoff: BufferHandoff) -> Result<()>
    {
        let key = match module_key(module).and_then(|key| self.ensure_absent(key).map(|()| key)) {
            Ok(key) => key,
            Err(err) => {
                self.hooks.0.after_load(buffer);
                return Err(err);
            }
        };

        info!(module = key, size = buffer.len(), "Loading symbols for module from buffer");
        let mut symbol_module = self.factory.create_module(key);

        if let Err(err) = symbol_module.load_map_from_memory(buffer.contents()) {
            warn!(module = key, error = %err, "Symbol data rejected");
            drop(symbol_module);
            self.hooks.0.after_load(buffer);
            return Err(err);
        }

        self.modules.insert(key.to_owned(), symbol_module);
        match handoff {
            BufferHandoff::Release => self.hooks.0.after_load(buffer),
            BufferHandoff::Retain => self.hooks.0.retain_buffer(module, buffer),
        }
        Ok(())
    }

    /// Drop the symbols for `module`.
    ///
    /// Fires [`LoadHooks::on_unload`] whether or not the module was loaded, so
    /// strategy state for modules that failed to load is cleaned up too.
    pub fn unload_module(&mut self, module: &dyn CodeModule)
    {
        let Ok(key) = module_key(module) else {
            return;
        };
        if self.modules.remove(key).is_some() {
            info!(module = key, "Unloaded symbols for module");
        }
        self.hooks.0.on_unload(module);
    }

    /// Whether symbols for `module` are loaded.
    pub fn has_module(&self, module: &dyn CodeModule) -> bool
    {
        module_key(module).is_ok_and(|key| self.modules.contains_key(key))
    }

    pub fn module_count(&self) -> usize
    {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.modules.is_empty()
    }

    /// Code files with loaded symbols, in no particular order.
    pub fn module_names(&self) -> impl Iterator<Item = &str>
    {
        self.modules.keys().map(String::as_str)
    }

    pub(crate) fn symbol_module(&self, key: &str) -> Option<&dyn SymbolModule>
    {
        self.modules.get(key).map(|module| &**module)
    }

    fn ensure_absent(&self, key: &str) -> Result<()>
    {
        if self.modules.contains_key(key) {
            info!(module = key, "Symbols for module already loaded");
            return Err(SymbolError::DuplicateModule(key.to_owned()));
        }
        Ok(())
    }
}

/// Registry key of `module`, rejecting identities that cannot serve as one.
fn module_key(module: &dyn CodeModule) -> Result<&str>
{
    let key = module.code_file();
    if key.is_empty() {
        return Err(SymbolError::InvalidModule("code file is empty".into()));
    }
    Ok(key)
}
