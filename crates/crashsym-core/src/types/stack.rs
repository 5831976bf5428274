//! Stack frame types.

use std::sync::Arc;

use super::symbols::{SourceLocation, SymbolName};
use super::{Address, CodeModule};

/// One entry of an unwound call stack.
///
/// The frame is owned by the caller. Symbol lookups only read `module` and
/// `instruction` and write the annotation fields.
#[derive(Debug, Clone)]
pub struct StackFrame
{
    /// Absolute instruction address for this frame.
    pub instruction: Address,
    /// Module containing `instruction`, if the unwinder could attribute one.
    pub module: Option<Arc<dyn CodeModule>>,
    /// Function (or nearest public symbol) containing the instruction.
    pub function: Option<SymbolName>,
    /// Absolute start address of `function`.
    pub function_base: Option<Address>,
    /// Source file and line for the instruction.
    pub location: Option<SourceLocation>,
    /// Absolute start address of the line record covering the instruction.
    pub source_line_base: Option<Address>,
}

impl StackFrame
{
    /// Unannotated frame at `instruction`.
    pub fn new(instruction: impl Into<Address>, module: Option<Arc<dyn CodeModule>>) -> Self
    {
        Self {
            instruction: instruction.into(),
            module,
            function: None,
            function_base: None,
            location: None,
            source_line_base: None,
        }
    }

    /// Registry key of the frame's module.
    pub fn module_key(&self) -> Option<&str>
    {
        self.module.as_deref().map(CodeModule::code_file)
    }

    /// Returns `true` once any lookup has written to the frame.
    pub fn is_annotated(&self) -> bool
    {
        self.function.is_some() || self.location.is_some()
    }

    /// Drop every annotation, keeping the instruction and module.
    pub fn clear_annotations(&mut self)
    {
        self.function = None;
        self.function_base = None;
        self.location = None;
        self.source_line_base = None;
    }
}
