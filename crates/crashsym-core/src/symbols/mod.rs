//! # Symbols
//!
//! Loading, caching, and querying per-module symbol tables.
//!
//! - [`buffer`]: reads symbol files (or copies blobs) into owned buffers
//! - [`module`]: the traits a symbol table kind implements
//! - [`hooks`]: lifecycle strategies deciding what happens to raw buffers
//! - [`registry`]: the module registry and its load/unload operations
//! - [`basic`]: a symbol table for the line-oriented text symbol format
//!
//! Per-frame lookups (`fill_source_line_info`, `find_windows_frame_info`,
//! `find_cfi_frame_info`) are methods on [`ModuleRegistry`].

pub mod basic;
pub mod buffer;
mod demangle;
pub mod hooks;
mod lookup;
pub mod module;
pub mod registry;

pub use basic::{BasicModuleFactory, BasicSymbolModule, ModuleRecord};
pub use buffer::{LoadLimits, SymbolBuffer};
pub use hooks::{BufferHandoff, DiscardBuffers, LoadHooks, RetainBuffers};
pub use module::{ModuleFactory, SymbolModule};
pub use registry::ModuleRegistry;
