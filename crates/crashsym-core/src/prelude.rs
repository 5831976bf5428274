//! Common imports for pipelines driving a registry

pub use crate::cfi::{CfiFrameInfo, MemoryAccess, RegisterValues};
pub use crate::error::{Result, SymbolError};
pub use crate::symbols::{
    BasicModuleFactory, BufferHandoff, LoadHooks, LoadLimits, ModuleFactory, ModuleRegistry, SymbolBuffer, SymbolModule,
};
pub use crate::types::{Address, CodeModule, ModuleDescriptor, StackFrame, WindowsFrameInfo};
