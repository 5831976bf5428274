//! Tests for module registration, lifecycle hooks, and teardown

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use crashsym_core::prelude::*;
use crashsym_core::symbols::RetainBuffers;

const SYMBOLS: &str = "\
MODULE Linux x86_64 A1B2C3 liba.so
FILE 0 a.c
FUNC 1000 20 0 crash_here
1000 10 41 0
1010 10 42 0
PUBLIC 2000 0 exported
";

const OTHER_SYMBOLS: &str = "FILE 0 b.c\nFUNC 1000 20 0 something_else\n1000 20 9 0\n";

const BASE: u64 = 0x7f00_0000_0000;

fn module(name: &str) -> Arc<dyn CodeModule>
{
    Arc::new(ModuleDescriptor::new(name).with_base_address(BASE).with_size(0x10_0000))
}

fn write_symbols(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf
{
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn annotated(registry: &ModuleRegistry<impl LoadHooks>, module: &Arc<dyn CodeModule>, offset: u64) -> StackFrame
{
    let mut frame = StackFrame::new(BASE + offset, Some(module.clone()));
    registry.fill_source_line_info(&mut frame);
    frame
}

#[test]
fn test_load_annotate_reload_unload()
{
    let dir = tempfile::tempdir().unwrap();
    let path = write_symbols(&dir, "a.sym", SYMBOLS);
    let module_a = module("liba.so");
    let mut registry = ModuleRegistry::new(Box::new(BasicModuleFactory));

    registry.load_module(module_a.as_ref(), &path).unwrap();
    assert!(registry.has_module(module_a.as_ref()));

    let frame = annotated(&registry, &module_a, 0x1000);
    assert_eq!(frame.function.as_ref().unwrap().display_name(), "crash_here");
    assert_eq!(frame.location.as_ref().unwrap().to_string(), "a.c:41");

    let err = registry.load_module(module_a.as_ref(), &path).unwrap_err();
    assert!(matches!(err, SymbolError::DuplicateModule(ref key) if key == "liba.so"));
    assert_eq!(registry.module_count(), 1);

    registry.unload_module(module_a.as_ref());
    assert!(!registry.has_module(module_a.as_ref()));
    assert!(!annotated(&registry, &module_a, 0x1000).is_annotated());
}

#[test]
fn test_duplicate_blob_leaves_first_table_untouched()
{
    let dir = tempfile::tempdir().unwrap();
    let path = write_symbols(&dir, "a.sym", SYMBOLS);
    let module_a = module("liba.so");
    let mut registry = ModuleRegistry::new(Box::new(BasicModuleFactory));

    registry.load_module(module_a.as_ref(), &path).unwrap();
    let err = registry
        .load_module_from_blob(module_a.as_ref(), OTHER_SYMBOLS.as_bytes())
        .unwrap_err();
    assert!(matches!(err, SymbolError::DuplicateModule(_)));

    let frame = annotated(&registry, &module_a, 0x1004);
    assert_eq!(frame.function.as_ref().unwrap().display_name(), "crash_here");
}

#[test]
fn test_path_and_blob_loads_answer_identically()
{
    let dir = tempfile::tempdir().unwrap();
    let path = write_symbols(&dir, "a.sym", SYMBOLS);
    let module_a = module("liba.so");

    let mut from_path = ModuleRegistry::new(Box::new(BasicModuleFactory));
    from_path.load_module(module_a.as_ref(), &path).unwrap();
    let mut from_blob = ModuleRegistry::new(Box::new(BasicModuleFactory));
    from_blob.load_module_from_blob(module_a.as_ref(), SYMBOLS.as_bytes()).unwrap();

    for offset in [0x0, 0x1000, 0x100f, 0x1010, 0x101f, 0x1020, 0x2000, 0x2400] {
        let a = annotated(&from_path, &module_a, offset);
        let b = annotated(&from_blob, &module_a, offset);
        assert_eq!(a.function, b.function, "function at {offset:x}");
        assert_eq!(a.function_base, b.function_base, "function base at {offset:x}");
        assert_eq!(a.location, b.location, "location at {offset:x}");
        assert_eq!(a.source_line_base, b.source_line_base, "line base at {offset:x}");
    }
}

#[test]
fn test_lookup_miss_leaves_frame_alone()
{
    let registry = ModuleRegistry::new(Box::new(BasicModuleFactory));
    let unknown = module("never-loaded.so");

    let frame = annotated(&registry, &unknown, 0x1000);
    assert!(!frame.is_annotated());
    assert!(registry.find_cfi_frame_info(&frame).is_none());
    assert!(registry.find_windows_frame_info(&frame).is_none());

    let mut orphan = StackFrame::new(0x1000, None);
    registry.fill_source_line_info(&mut orphan);
    assert!(!orphan.is_annotated());
    assert!(registry.find_cfi_frame_info(&orphan).is_none());
}

#[test]
fn test_failed_loads_leave_registry_unchanged()
{
    let dir = tempfile::tempdir().unwrap();
    let module_a = module("liba.so");
    let mut registry = ModuleRegistry::new(Box::new(BasicModuleFactory));

    let err = registry
        .load_module_from_blob(module_a.as_ref(), b"FUNC 1000 nothex 0 f\n")
        .unwrap_err();
    assert!(matches!(err, SymbolError::Parse { line: 1, .. }));

    let err = registry
        .load_module(module_a.as_ref(), dir.path().join("missing.sym"))
        .unwrap_err();
    assert!(matches!(err, SymbolError::Io { .. }));

    assert!(registry.is_empty());
    assert!(!registry.has_module(module_a.as_ref()));

    registry
        .load_module_from_blob(module_a.as_ref(), SYMBOLS.as_bytes())
        .unwrap();
    assert_eq!(registry.module_names().collect::<Vec<_>>(), vec!["liba.so"]);
}

#[test]
fn test_allocation_limit_rejects_large_symbol_data()
{
    let module_a = module("liba.so");
    let mut registry = ModuleRegistry::new(Box::new(BasicModuleFactory)).with_limits(LoadLimits {
        max_symbol_file_size: 16,
    });

    let err = registry
        .load_module_from_blob(module_a.as_ref(), SYMBOLS.as_bytes())
        .unwrap_err();
    assert!(matches!(err, SymbolError::Allocation { .. }));
    assert!(registry.is_empty());
    assert_eq!(registry.limits().max_symbol_file_size, 16);
}

#[test]
fn test_empty_code_file_is_an_invalid_module()
{
    let nameless = module("");
    let mut registry = ModuleRegistry::new(Box::new(BasicModuleFactory));

    let err = registry
        .load_module_from_blob(nameless.as_ref(), SYMBOLS.as_bytes())
        .unwrap_err();
    assert!(matches!(err, SymbolError::InvalidModule(_)));
    assert!(!registry.has_module(nameless.as_ref()));
    registry.unload_module(nameless.as_ref());
    assert!(registry.is_empty());
}

#[test]
fn test_independent_registries_coexist()
{
    let module_a = module("liba.so");
    let mut first = ModuleRegistry::new(Box::new(BasicModuleFactory));
    let mut second = ModuleRegistry::new(Box::new(BasicModuleFactory));

    first.load_module_from_blob(module_a.as_ref(), SYMBOLS.as_bytes()).unwrap();
    second
        .load_module_from_blob(module_a.as_ref(), OTHER_SYMBOLS.as_bytes())
        .unwrap();

    let name = |registry: &ModuleRegistry| {
        annotated(registry, &module_a, 0x1000)
            .function
            .map(|name| name.display_name().to_owned())
    };
    assert_eq!(name(&first).as_deref(), Some("crash_here"));
    assert_eq!(name(&second).as_deref(), Some("something_else"));
}

// Recording collaborators: every construction, drop, and hook call is logged.

type Log = Rc<RefCell<Vec<String>>>;

struct RecordingModule
{
    name: String,
    log: Log,
}

impl SymbolModule for RecordingModule
{
    fn load_map_from_memory(&mut self, buffer: &[u8]) -> Result<()>
    {
        if buffer.starts_with(b"bad") {
            return Err(SymbolError::Parse {
                module: self.name.clone(),
                line: 1,
                message: "rejected".into(),
            });
        }
        Ok(())
    }

    fn lookup_address(&self, _frame: &mut StackFrame) {}

    fn find_windows_frame_info(&self, _frame: &StackFrame) -> Option<&WindowsFrameInfo>
    {
        None
    }

    fn find_cfi_frame_info(&self, _frame: &StackFrame) -> Option<&CfiFrameInfo>
    {
        None
    }
}

impl Drop for RecordingModule
{
    fn drop(&mut self)
    {
        self.log.borrow_mut().push(format!("drop module {}", self.name));
    }
}

struct RecordingFactory
{
    log: Log,
}

impl ModuleFactory for RecordingFactory
{
    fn create_module(&self, name: &str) -> Box<dyn SymbolModule>
    {
        self.log.borrow_mut().push(format!("create {name}"));
        Box::new(RecordingModule {
            name: name.to_owned(),
            log: self.log.clone(),
        })
    }
}

impl Drop for RecordingFactory
{
    fn drop(&mut self)
    {
        self.log.borrow_mut().push("drop factory".into());
    }
}

struct RecordingHooks
{
    log: Log,
    handoff: BufferHandoff,
}

impl LoadHooks for RecordingHooks
{
    fn before_load(&mut self, module: &dyn CodeModule, _buffer: &SymbolBuffer) -> BufferHandoff
    {
        self.log.borrow_mut().push(format!("before {}", module.code_file()));
        self.handoff
    }

    fn after_load(&mut self, buffer: SymbolBuffer)
    {
        self.log.borrow_mut().push(format!("after {}", buffer.len()));
    }

    fn retain_buffer(&mut self, module: &dyn CodeModule, _buffer: SymbolBuffer)
    {
        self.log.borrow_mut().push(format!("retain {}", module.code_file()));
    }

    fn on_unload(&mut self, module: &dyn CodeModule)
    {
        self.log.borrow_mut().push(format!("unload {}", module.code_file()));
    }

    fn on_teardown(&mut self)
    {
        self.log.borrow_mut().push("teardown".into());
    }
}

fn recording_registry(handoff: BufferHandoff) -> (ModuleRegistry<RecordingHooks>, Log)
{
    let log = Log::default();
    let registry = ModuleRegistry::with_hooks(
        Box::new(RecordingFactory { log: log.clone() }),
        RecordingHooks {
            log: log.clone(),
            handoff,
        },
    );
    (registry, log)
}

fn take(log: &Log) -> Vec<String>
{
    std::mem::take(&mut *log.borrow_mut())
}

#[test]
fn test_successful_load_releases_buffer_once()
{
    let (mut registry, log) = recording_registry(BufferHandoff::Release);
    registry.load_module_from_blob(module("a").as_ref(), b"good").unwrap();
    assert_eq!(take(&log), vec!["before a", "create a", "after 4"]);
}

#[test]
fn test_parse_failure_drops_table_before_releasing_buffer()
{
    let (mut registry, log) = recording_registry(BufferHandoff::Retain);
    let err = registry.load_module_from_blob(module("a").as_ref(), b"bad!").unwrap_err();
    assert!(matches!(err, SymbolError::Parse { .. }));
    assert_eq!(take(&log), vec!["before a", "create a", "drop module a", "after 4"]);
    assert!(registry.is_empty());
}

#[test]
fn test_retained_buffer_goes_to_strategy_only_on_success()
{
    let (mut registry, log) = recording_registry(BufferHandoff::Retain);
    registry.load_module_from_blob(module("a").as_ref(), b"good").unwrap();
    assert_eq!(take(&log), vec!["before a", "create a", "retain a"]);
}

#[test]
fn test_early_failures_never_reach_hooks()
{
    let dir = tempfile::tempdir().unwrap();
    let (mut registry, log) = recording_registry(BufferHandoff::Release);
    registry.load_module_from_blob(module("a").as_ref(), b"good").unwrap();
    take(&log);

    assert!(registry.load_module_from_blob(module("a").as_ref(), b"good").is_err());
    assert!(registry
        .load_module(module("b").as_ref(), dir.path().join("missing.sym"))
        .is_err());
    assert!(take(&log).is_empty());
}

#[test]
fn test_unload_fires_hook_for_unknown_modules_too()
{
    let (mut registry, log) = recording_registry(BufferHandoff::Release);
    registry.load_module_from_blob(module("a").as_ref(), b"good").unwrap();
    take(&log);

    registry.unload_module(module("a").as_ref());
    registry.unload_module(module("a").as_ref());
    registry.unload_module(module("never").as_ref());
    registry.unload_module(module("").as_ref());
    assert_eq!(take(&log), vec!["drop module a", "unload a", "unload a", "unload never"]);
}

#[test]
fn test_teardown_drops_modules_then_factory_then_fires_hook()
{
    let (mut registry, log) = recording_registry(BufferHandoff::Release);
    for name in ["a", "b", "c"] {
        registry.load_module_from_blob(module(name).as_ref(), b"good").unwrap();
    }
    take(&log);

    drop(registry);
    let events = take(&log);
    assert_eq!(events.len(), 5);
    let mut dropped: Vec<_> = events[..3].to_vec();
    dropped.sort();
    assert_eq!(dropped, vec!["drop module a", "drop module b", "drop module c"]);
    assert_eq!(&events[3..], ["drop factory", "teardown"]);
}

#[test]
fn test_retain_buffers_strategy_tracks_loaded_modules()
{
    let module_a = module("liba.so");
    let module_b = module("libb.so");
    let mut registry = ModuleRegistry::with_hooks(Box::new(BasicModuleFactory), RetainBuffers::new());

    registry.load_module_from_blob(module_a.as_ref(), SYMBOLS.as_bytes()).unwrap();
    assert!(registry.load_module_from_blob(module_b.as_ref(), b"NOT A RECORD\n").is_err());

    assert_eq!(registry.hooks().retained_count(), 1);
    assert_eq!(
        registry.hooks().retained("liba.so").unwrap().contents(),
        SYMBOLS.as_bytes()
    );
    assert!(registry.hooks().retained("libb.so").is_none());

    registry.unload_module(module_a.as_ref());
    assert_eq!(registry.hooks().retained_count(), 0);
}
