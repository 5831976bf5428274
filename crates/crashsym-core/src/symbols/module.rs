//! Symbol module capability traits.
//!
//! The registry never looks inside a symbol module. It creates one through a
//! [`ModuleFactory`], asks it to parse a buffer, and then forwards per-frame
//! queries to it.

use crate::cfi::{self, CfiFrameInfo};
use crate::error::Result;
use crate::types::{StackFrame, WindowsFrameInfo};

/// Queryable symbol table for one code module.
pub trait SymbolModule
{
    /// Parse symbol data.
    ///
    /// The buffer is borrowed for the call only; anything the module needs
    /// afterwards must be copied out.
    ///
    /// ## Errors
    ///
    /// Returns `Parse` if the data is malformed.
    fn load_map_from_memory(&mut self, buffer: &[u8]) -> Result<()>;

    /// Annotate `frame` with function and source-line information.
    ///
    /// Leaves the frame untouched when nothing covers its instruction.
    fn lookup_address(&self, frame: &mut StackFrame);

    /// Windows stack-walking record covering the frame's instruction.
    fn find_windows_frame_info(&self, frame: &StackFrame) -> Option<&WindowsFrameInfo>;

    /// CFI rules in effect at the frame's instruction.
    fn find_cfi_frame_info(&self, frame: &StackFrame) -> Option<&CfiFrameInfo>;

    /// Apply a textual rule set to `frame_info`.
    ///
    /// ## Errors
    ///
    /// Returns `CfiRuleSet` on a syntax error; earlier rules stay applied.
    fn parse_cfi_rule_set(&self, rule_set: &str, frame_info: &mut CfiFrameInfo) -> Result<()>
    {
        cfi::parse_cfi_rule_set(rule_set, frame_info)
    }
}

/// Creates empty symbol modules of one concrete kind.
pub trait ModuleFactory
{
    /// New, unparsed module for the code file `name`.
    fn create_module(&self, name: &str) -> Box<dyn SymbolModule>;
}
