//! Per-frame lookup dispatch.
//!
//! Lookups are best-effort enrichment: a frame without a module, or whose
//! module has no loaded symbols, is a silent miss rather than an error.

use tracing::trace;

use super::hooks::LoadHooks;
use super::module::SymbolModule;
use super::registry::ModuleRegistry;
use crate::cfi::CfiFrameInfo;
use crate::types::{StackFrame, WindowsFrameInfo};

impl<H: LoadHooks> ModuleRegistry<H>
{
    /// Annotate `frame` with function and source-line information.
    pub fn fill_source_line_info(&self, frame: &mut StackFrame)
    {
        if let Some(module) = self.module_for_frame(frame) {
            module.lookup_address(frame);
        }
    }

    /// Windows stack-walking record for the frame's instruction.
    ///
    /// The record borrows from the registry and cannot outlive an unload.
    pub fn find_windows_frame_info(&self, frame: &StackFrame) -> Option<&WindowsFrameInfo>
    {
        self.module_for_frame(frame)?.find_windows_frame_info(frame)
    }

    /// CFI rules in effect at the frame's instruction.
    ///
    /// The record borrows from the registry and cannot outlive an unload.
    pub fn find_cfi_frame_info(&self, frame: &StackFrame) -> Option<&CfiFrameInfo>
    {
        self.module_for_frame(frame)?.find_cfi_frame_info(frame)
    }

    fn module_for_frame(&self, frame: &StackFrame) -> Option<&dyn SymbolModule>
    {
        let key = frame.module_key()?;
        let module = self.symbol_module(key);
        if module.is_none() {
            trace!(module = key, instruction = %frame.instruction, "No symbols loaded for frame module");
        }
        module
    }
}
