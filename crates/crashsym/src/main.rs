use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use crashsym_core::symbols::{BasicModuleFactory, LoadLimits, ModuleRegistry};
use crashsym_core::types::{CodeModule, ModuleDescriptor, StackFrame};
use crashsym_utils::{info, init_logging, init_logging_with_level, warn, LogFormat, LogLevel, LoggingGuard};

/// Symbolicate crash addresses against Breakpad-style text symbol files.
#[derive(Parser, Debug)]
#[command(name = "crashsym")]
#[command(version)]
#[command(about = "Symbolicate crash addresses against text symbol files", long_about = None)]
struct Cli
{
    #[command(subcommand)]
    command: Commands,

    /// Log level; overrides RUST_LOG when given
    #[arg(long, global = true, value_parser = LogLevel::from_str)]
    log_level: Option<LogLevel>,

    /// Largest symbol file accepted, in bytes
    #[arg(long, global = true, value_parser = parse_number)]
    max_file_size: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Annotate instruction addresses with function, line, and unwind info
    Lookup
    {
        /// Symbol file to load
        #[arg(short, long)]
        symbols: PathBuf,
        /// Code file the symbols belong to (defaults to the symbol file's stem)
        #[arg(short, long)]
        module: Option<String>,
        /// Load address of the module (hex format: 0x1000 or decimal)
        #[arg(short, long, default_value = "0", value_parser = parse_number)]
        base: u64,
        /// Absolute instruction addresses (hex format: 0x1000 or decimal)
        #[arg(required = true, value_parser = parse_number)]
        addresses: Vec<u64>,
    },
    /// Load symbol files and report whether each one parses
    Check
    {
        /// Symbol files to load; each is registered under its file stem
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main()
{
    let cli = Cli::parse();

    let _guard = match start_logging(cli.log_level) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn start_logging(level: Option<LogLevel>) -> Result<LoggingGuard, crashsym_utils::LoggingError>
{
    match level {
        Some(level) => init_logging_with_level(level, LogFormat::Pretty),
        None => init_logging(),
    }
}

fn run_command(cli: Cli) -> Result<(), Box<dyn Error>>
{
    let limits = cli
        .max_file_size
        .map(|max_symbol_file_size| LoadLimits { max_symbol_file_size })
        .unwrap_or_default();

    match cli.command {
        Commands::Lookup {
            symbols,
            module,
            base,
            addresses,
        } => {
            let code_file = match module {
                Some(name) => name,
                None => module_name(&symbols)?,
            };
            let module: Arc<dyn CodeModule> = Arc::new(ModuleDescriptor::new(code_file).with_base_address(base));

            let mut registry = ModuleRegistry::new(Box::new(BasicModuleFactory)).with_limits(limits);
            registry.load_module(module.as_ref(), &symbols)?;
            info!(module = module.code_file(), count = addresses.len(), "Symbolicating addresses");

            for address in addresses {
                let mut frame = StackFrame::new(address, Some(module.clone()));
                registry.fill_source_line_info(&mut frame);
                print_frame(&registry, &frame);
            }
            Ok(())
        }
        Commands::Check { files } => {
            let mut registry = ModuleRegistry::new(Box::new(BasicModuleFactory)).with_limits(limits);
            let mut failed = 0usize;

            for path in &files {
                let result = module_name(path).and_then(|name| {
                    let module = ModuleDescriptor::new(name);
                    registry.load_module(&module, path)?;
                    Ok(module.code_file)
                });
                match result {
                    Ok(name) => println!("ok    {} ({name})", path.display()),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Symbol file failed to load");
                        println!("FAIL  {}: {e}", path.display());
                        failed += 1;
                    }
                }
            }

            if failed > 0 {
                return Err(format!("{failed} of {} symbol files failed to load", files.len()).into());
            }
            Ok(())
        }
    }
}

fn print_frame(registry: &ModuleRegistry, frame: &StackFrame)
{
    let mut line = frame.instruction.to_string();
    match (&frame.function, frame.function_base) {
        (Some(function), Some(function_base)) => {
            let offset = frame.instruction.value().wrapping_sub(function_base.value());
            line.push_str(&format!("  {function} + {offset:#x}"));
        }
        (Some(function), None) => line.push_str(&format!("  {function}")),
        (None, _) => line.push_str("  <unknown>"),
    }
    if let Some(location) = &frame.location {
        line.push_str(&format!("  [{location}]"));
    }
    println!("{line}");

    if let Some(cfi) = registry.find_cfi_frame_info(frame) {
        println!("    cfi: {cfi}");
    }
    if let Some(win) = registry.find_windows_frame_info(frame) {
        let program = win.program_string.as_deref().unwrap_or("-");
        println!(
            "    win: {} params={:#x} locals={:#x} saved={:#x} program={program}",
            win.kind, win.parameter_size, win.local_size, win.saved_register_size
        );
    }
}

/// Registry key for a symbol file given without an explicit module name.
fn module_name(path: &Path) -> Result<String, Box<dyn Error>>
{
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| format!("cannot derive a module name from {}", path.display()).into())
}

/// Parse `0x`-prefixed hex or plain decimal.
fn parse_number(raw: &str) -> Result<u64, String>
{
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|e| format!("invalid number {raw:?}: {e}"))
}
