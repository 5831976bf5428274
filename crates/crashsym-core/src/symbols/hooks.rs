//! Load lifecycle hooks.
//!
//! A [`LoadHooks`] strategy lets a symbol module kind manage the raw symbol
//! data itself: keep it for lazy parsing, index it by module, or drop it as
//! soon as parsing is done. The registry calls the hooks at fixed points and
//! has no opinion on storage.
//!
//! ## Buffer ownership
//!
//! `before_load` returns a [`BufferHandoff`]. The registry honors it exactly
//! once per load:
//!
//! | Handoff   | Load succeeded               | Load failed          |
//! |-----------|------------------------------|----------------------|
//! | `Release` | `after_load(buffer)`         | `after_load(buffer)` |
//! | `Retain`  | `retain_buffer(module, buf)` | `after_load(buffer)` |

use std::collections::HashMap;

use tracing::debug;

use super::buffer::SymbolBuffer;
use crate::types::CodeModule;

/// Who owns the raw symbol buffer once the load finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferHandoff
{
    /// The registry drops the buffer after passing it to `after_load`.
    Release,
    /// The strategy takes the buffer through `retain_buffer` if the load succeeds.
    Retain,
}

/// Callbacks fired around module loads, unloads, and registry teardown.
///
/// Every method has a no-op default.
pub trait LoadHooks
{
    /// Observe the buffer before it is parsed and decide who owns it afterwards.
    fn before_load(&mut self, module: &dyn CodeModule, buffer: &SymbolBuffer) -> BufferHandoff
    {
        let _ = (module, buffer);
        BufferHandoff::Release
    }

    /// Last look at a buffer the registry is releasing.
    fn after_load(&mut self, buffer: SymbolBuffer)
    {
        drop(buffer);
    }

    /// Take ownership of the buffer of a successfully loaded module.
    fn retain_buffer(&mut self, module: &dyn CodeModule, buffer: SymbolBuffer)
    {
        let _ = module;
        drop(buffer);
    }

    /// Fired by every unload of a valid module, loaded or not.
    fn on_unload(&mut self, module: &dyn CodeModule)
    {
        let _ = module;
    }

    /// Fired once, after every symbol module and the factory are gone.
    fn on_teardown(&mut self) {}
}

/// Drops each buffer as soon as its module is parsed.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardBuffers;

impl LoadHooks for DiscardBuffers {}

/// Keeps the raw buffer of every loaded module until it is unloaded.
///
/// Useful for symbol modules that parse lazily or want the raw text for
/// diagnostics.
#[derive(Debug, Default)]
pub struct RetainBuffers
{
    buffers: HashMap<String, SymbolBuffer>,
}

impl RetainBuffers
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Raw buffer kept for `code_file`.
    pub fn retained(&self, code_file: &str) -> Option<&SymbolBuffer>
    {
        self.buffers.get(code_file)
    }

    pub fn retained_count(&self) -> usize
    {
        self.buffers.len()
    }
}

impl LoadHooks for RetainBuffers
{
    fn before_load(&mut self, _module: &dyn CodeModule, _buffer: &SymbolBuffer) -> BufferHandoff
    {
        BufferHandoff::Retain
    }

    fn retain_buffer(&mut self, module: &dyn CodeModule, buffer: SymbolBuffer)
    {
        debug!(module = module.code_file(), size = buffer.len(), "Retaining symbol buffer");
        self.buffers.insert(module.code_file().to_owned(), buffer);
    }

    fn on_unload(&mut self, module: &dyn CodeModule)
    {
        self.buffers.remove(module.code_file());
    }

    fn on_teardown(&mut self)
    {
        self.buffers.clear();
    }
}
