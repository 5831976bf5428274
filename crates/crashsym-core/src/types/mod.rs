//! # Types
//!
//! Plain data shared between the registry, symbol modules, and the pipeline
//! that drives them: addresses, module identities, stack frames, and the
//! unwind records symbol modules hand back.

pub mod address;
pub mod frame_info;
pub mod module;
pub mod stack;
pub mod symbols;

pub use address::Address;
pub use frame_info::{StackInfoType, WindowsFrameInfo};
pub use module::{CodeModule, ModuleDescriptor};
pub use stack::StackFrame;
pub use symbols::{SourceLocation, SymbolLanguage, SymbolName};
