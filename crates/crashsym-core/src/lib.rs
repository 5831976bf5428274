//! # crashsym-core
//!
//! Symbol-module registry and lookup dispatch for post-mortem crash analysis.
//!
//! A crash-processing pipeline hands this crate the modules it found in a
//! crashed process and the stack frames it unwound. The crate:
//! - Loads one symbol table per module, at most once per code file
//! - Routes each frame to its module's table for source lines and unwind data
//! - Lets a lifecycle strategy decide what happens to raw symbol data
//!
//! It does not unwind stacks, enumerate modules, or synchronize access: a
//! registry is meant for one worker at a time.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use crashsym_core::symbols::{BasicModuleFactory, ModuleRegistry};
//! use crashsym_core::types::{CodeModule, ModuleDescriptor, StackFrame};
//!
//! let mut registry = ModuleRegistry::new(Box::new(BasicModuleFactory));
//! let module: Arc<dyn CodeModule> = Arc::new(ModuleDescriptor::new("app"));
//! registry
//!     .load_module_from_blob(module.as_ref(), b"FILE 0 main.c\nFUNC 1000 10 0 main\n1000 10 7 0\n")
//!     .unwrap();
//!
//! let mut frame = StackFrame::new(0x1004, Some(module));
//! registry.fill_source_line_info(&mut frame);
//! assert_eq!(frame.location.unwrap().to_string(), "main.c:7");
//! ```

pub mod cfi;
pub mod error;
pub mod prelude;
pub mod symbols;
pub mod types;

pub use error::{Result, SymbolError};
pub use symbols::{ModuleFactory, ModuleRegistry, SymbolModule};
