//! Text symbol file module.
//!
//! Parses the line-oriented symbol format produced by `dump_syms`-style
//! tools. Every number except line numbers and file ids is hexadecimal.
//!
//! ```text
//! MODULE Linux x86_64 6EDC6ACDB282125843FD59DA9C81BD830 app
//! FILE 0 src/main.c
//! FUNC 1000 40 0 main
//! 1000 10 12 0
//! 1010 30 13 0
//! PUBLIC 2000 0 _start
//! STACK CFI INIT 1000 40 .cfa: $rsp 8 + .ra: .cfa -8 + ^
//! STACK CFI 1004 .cfa: $rsp 16 +
//! STACK WIN 4 1000 40 4 0 8 0 10 0 1 $T0 $ebp = $eip $T0 4 + ^ =
//! ```
//!
//! All records are folded into lookup tables at load time, so lookups never
//! touch the raw text.

use std::collections::{BTreeMap, HashMap};

use smallvec::SmallVec;
use tracing::debug;

use super::demangle::make_symbol_name;
use super::module::{ModuleFactory, SymbolModule};
use crate::cfi::CfiFrameInfo;
use crate::error::{Result, SymbolError};
use crate::types::{SourceLocation, StackFrame, StackInfoType, SymbolName, WindowsFrameInfo};

/// Creates [`BasicSymbolModule`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicModuleFactory;

impl ModuleFactory for BasicModuleFactory
{
    fn create_module(&self, name: &str) -> Box<dyn SymbolModule>
    {
        Box::new(BasicSymbolModule::new(name))
    }
}

/// Header line of a symbol file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord
{
    pub os: String,
    pub arch: String,
    pub id: String,
    pub name: String,
}

/// Value covering `[start, start + size)`, keyed by `start` in a `BTreeMap`.
#[derive(Debug)]
struct Ranged<T>
{
    size: u64,
    value: T,
}

#[derive(Debug)]
struct Function
{
    name: SymbolName,
    lines: BTreeMap<u64, Ranged<Line>>,
}

#[derive(Debug)]
struct Line
{
    line: u32,
    file_id: u32,
}

/// CFI rules for one `STACK CFI INIT` range, one cumulative snapshot per record.
#[derive(Debug)]
struct CfiRange
{
    snapshots: Vec<(u64, CfiFrameInfo)>,
}

#[derive(Default)]
struct ParseState
{
    function: Option<u64>,
    cfi_range: Option<u64>,
}

type RecordResult<T> = std::result::Result<T, String>;

/// Symbol module backed by a parsed text symbol file.
#[derive(Debug, Default)]
pub struct BasicSymbolModule
{
    name: String,
    record: Option<ModuleRecord>,
    files: HashMap<u32, String>,
    functions: BTreeMap<u64, Ranged<Function>>,
    public_symbols: BTreeMap<u64, SymbolName>,
    windows_frame_info: HashMap<StackInfoType, BTreeMap<u64, Ranged<WindowsFrameInfo>>>,
    cfi: BTreeMap<u64, Ranged<CfiRange>>,
}

impl BasicSymbolModule
{
    pub fn new(name: &str) -> Self
    {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    /// Code file this module was created for.
    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// The `MODULE` header, if the file had one.
    pub fn module_record(&self) -> Option<&ModuleRecord>
    {
        self.record.as_ref()
    }

    pub fn function_count(&self) -> usize
    {
        self.functions.len()
    }

    pub fn public_symbol_count(&self) -> usize
    {
        self.public_symbols.len()
    }

    fn parse_record(&mut self, text: &str, state: &mut ParseState) -> RecordResult<()>
    {
        let (keyword, rest) = split_token(text);
        match keyword {
            "MODULE" => self.parse_module(rest),
            "INFO" | "INLINE" | "INLINE_ORIGIN" => Ok(()),
            "FILE" => self.parse_file(rest),
            "FUNC" => {
                state.function = Some(self.parse_func(rest)?);
                Ok(())
            }
            "PUBLIC" => {
                state.function = None;
                self.parse_public(rest)
            }
            "STACK" => match split_token(rest) {
                ("WIN", rest) => self.parse_stack_win(rest),
                ("CFI", rest) => self.parse_stack_cfi(rest, state),
                (other, _) => Err(format!("unknown STACK record {other:?}")),
            },
            _ if keyword.bytes().all(|b| b.is_ascii_hexdigit()) => self.parse_line(text, state),
            other => Err(format!("unknown record type {other:?}")),
        }
    }

    fn parse_module(&mut self, rest: &str) -> RecordResult<()>
    {
        let (os, rest) = split_token(rest);
        let (arch, rest) = split_token(rest);
        let (id, name) = split_token(rest);
        if name.is_empty() {
            return Err("MODULE record needs os, arch, id, and name".into());
        }
        self.record = Some(ModuleRecord {
            os: os.to_owned(),
            arch: arch.to_owned(),
            id: id.to_owned(),
            name: name.to_owned(),
        });
        Ok(())
    }

    fn parse_file(&mut self, rest: &str) -> RecordResult<()>
    {
        let (id, name) = split_token(rest);
        if name.is_empty() {
            return Err("FILE record needs an id and a name".into());
        }
        self.files.insert(parse_decimal(id, "file id")?, name.to_owned());
        Ok(())
    }

    fn parse_func(&mut self, rest: &str) -> RecordResult<u64>
    {
        let (address, rest) = split_token(strip_multiple(rest));
        let (size, rest) = split_token(rest);
        let (parameter_size, name) = split_token(rest);
        let address = parse_hex(address, "function address")?;
        let size = parse_hex(size, "function size")?;
        parse_hex(parameter_size, "parameter size")?;
        if name.is_empty() {
            return Err("FUNC record has no name".into());
        }

        self.functions.insert(
            address,
            Ranged {
                size,
                value: Function {
                    name: make_symbol_name(name),
                    lines: BTreeMap::new(),
                },
            },
        );
        Ok(address)
    }

    fn parse_line(&mut self, text: &str, state: &ParseState) -> RecordResult<()>
    {
        let function = state
            .function
            .and_then(|address| self.functions.get_mut(&address))
            .ok_or("line record outside of a FUNC")?;

        let fields: SmallVec<[&str; 4]> = text.split_whitespace().collect();
        let [address, size, line, file_id] = fields.as_slice() else {
            return Err(format!("line record needs 4 fields, found {}", fields.len()));
        };
        let line = Line {
            line: parse_decimal(line, "line number")?,
            file_id: parse_decimal(file_id, "file id")?,
        };
        function.value.lines.insert(
            parse_hex(address, "line address")?,
            Ranged {
                size: parse_hex(size, "line size")?,
                value: line,
            },
        );
        Ok(())
    }

    fn parse_public(&mut self, rest: &str) -> RecordResult<()>
    {
        let (address, rest) = split_token(strip_multiple(rest));
        let (parameter_size, name) = split_token(rest);
        let address = parse_hex(address, "public address")?;
        parse_hex(parameter_size, "parameter size")?;
        if name.is_empty() {
            return Err("PUBLIC record has no name".into());
        }
        self.public_symbols.insert(address, make_symbol_name(name));
        Ok(())
    }

    fn parse_stack_win(&mut self, rest: &str) -> RecordResult<()>
    {
        let mut fields = [0u64; 10];
        let mut rest = rest;
        for (index, slot) in fields.iter_mut().enumerate() {
            let (token, tail) = split_token(rest);
            if token.is_empty() {
                return Err(format!("STACK WIN record has only {index} fields"));
            }
            *slot = parse_hex(token, "STACK WIN field")?;
            rest = tail;
        }
        let [kind, rva, code_size, prolog, epilog, parameters, saved_registers, locals, max_stack, has_program] = fields;

        let kind = StackInfoType::from_raw(kind).ok_or_else(|| format!("unknown STACK WIN type {kind}"))?;
        let (program_string, allocates_base_pointer) = if has_program != 0 {
            if rest.is_empty() {
                return Err("STACK WIN record is missing its program string".into());
            }
            (Some(rest.to_owned()), false)
        } else {
            (None, parse_hex(rest, "allocates_base_pointer")? != 0)
        };

        let info = WindowsFrameInfo {
            kind,
            prolog_size: narrow(prolog, "prolog size")?,
            epilog_size: narrow(epilog, "epilog size")?,
            parameter_size: narrow(parameters, "parameter size")?,
            saved_register_size: narrow(saved_registers, "saved register size")?,
            local_size: narrow(locals, "local size")?,
            max_stack_size: narrow(max_stack, "max stack size")?,
            allocates_base_pointer,
            program_string,
        };
        self.windows_frame_info.entry(kind).or_default().insert(
            rva,
            Ranged {
                size: code_size,
                value: info,
            },
        );
        Ok(())
    }

    fn parse_stack_cfi(&mut self, rest: &str, state: &mut ParseState) -> RecordResult<()>
    {
        let (first, rest) = split_token(rest);
        if first == "INIT" {
            let (address, rest) = split_token(rest);
            let (size, rules) = split_token(rest);
            let address = parse_hex(address, "CFI address")?;
            let size = parse_hex(size, "CFI size")?;

            let mut initial = CfiFrameInfo::default();
            self.parse_cfi_rule_set(rules, &mut initial).map_err(|err| err.to_string())?;
            self.cfi.insert(
                address,
                Ranged {
                    size,
                    value: CfiRange {
                        snapshots: vec![(address, initial)],
                    },
                },
            );
            state.cfi_range = Some(address);
            return Ok(());
        }

        let address = parse_hex(first, "CFI address")?;
        let Some((start, range)) = state
            .cfi_range
            .and_then(|start| self.cfi.get(&start).map(|range| (start, range)))
        else {
            return Err("STACK CFI record before any STACK CFI INIT".into());
        };
        if !address.checked_sub(start).is_some_and(|offset| offset < range.size) {
            return Err(format!("STACK CFI address {address:x} is outside its INIT range"));
        }
        let Some((previous, current)) = range.value.snapshots.last() else {
            return Err("STACK CFI INIT range has no rules".into());
        };
        if address < *previous {
            return Err(format!("STACK CFI address {address:x} is out of order"));
        }

        let mut next = current.clone();
        self.parse_cfi_rule_set(rest, &mut next).map_err(|err| err.to_string())?;
        if let Some(range) = self.cfi.get_mut(&start) {
            range.value.snapshots.push((address, next));
        }
        Ok(())
    }
}

impl SymbolModule for BasicSymbolModule
{
    fn load_map_from_memory(&mut self, buffer: &[u8]) -> Result<()>
    {
        let mut state = ParseState::default();
        for (index, raw) in buffer.split(|byte| *byte == b'\n').enumerate() {
            let text = String::from_utf8_lossy(raw);
            let text = text.trim_end_matches(['\r', '\0']);
            if text.trim().is_empty() {
                continue;
            }
            self.parse_record(text, &mut state).map_err(|message| SymbolError::Parse {
                module: self.name.clone(),
                line: index + 1,
                message,
            })?;
        }

        debug!(
            module = %self.name,
            files = self.files.len(),
            functions = self.functions.len(),
            public_symbols = self.public_symbols.len(),
            cfi_ranges = self.cfi.len(),
            "Parsed symbol data"
        );
        Ok(())
    }

    fn lookup_address(&self, frame: &mut StackFrame)
    {
        let Some(base) = frame.module.as_deref().map(|module| module.base_address()) else {
            return;
        };
        let Some(address) = frame.instruction.relative_to(base) else {
            return;
        };

        let preceding = self.functions.range(..=address).next_back();
        match preceding {
            Some((&start, function)) if address - start < function.size => {
                let function = &function.value;
                frame.function = Some(function.name.clone());
                frame.function_base = Some(base + start);
                if let Some((line_start, line)) = find_range(&function.lines, address) {
                    frame.location = self
                        .files
                        .get(&line.file_id)
                        .map(|file| SourceLocation::new(file.clone(), line.line));
                    frame.source_line_base = Some(base + line_start);
                }
            }
            _ => {
                let Some((&start, name)) = self.public_symbols.range(..=address).next_back() else {
                    return;
                };
                // A FUNC between the public symbol and the address ends the symbol's reach.
                if preceding.is_some_and(|(&function_start, _)| start <= function_start) {
                    return;
                }
                frame.function = Some(name.clone());
                frame.function_base = Some(base + start);
            }
        }
    }

    fn find_windows_frame_info(&self, frame: &StackFrame) -> Option<&WindowsFrameInfo>
    {
        let address = module_offset(frame)?;
        [StackInfoType::FrameData, StackInfoType::Fpo]
            .into_iter()
            .find_map(|kind| find_range(self.windows_frame_info.get(&kind)?, address))
            .map(|(_, info)| info)
    }

    fn find_cfi_frame_info(&self, frame: &StackFrame) -> Option<&CfiFrameInfo>
    {
        let address = module_offset(frame)?;
        let (_, range) = find_range(&self.cfi, address)?;
        let index = range.snapshots.partition_point(|(start, _)| *start <= address);
        range.snapshots.get(index.checked_sub(1)?).map(|(_, info)| info)
    }
}

fn module_offset(frame: &StackFrame) -> Option<u64>
{
    frame.instruction.relative_to(frame.module.as_deref()?.base_address())
}

/// Entry whose range covers `address`.
fn find_range<T>(map: &BTreeMap<u64, Ranged<T>>, address: u64) -> Option<(u64, &T)>
{
    let (&start, entry) = map.range(..=address).next_back()?;
    (address - start < entry.size).then_some((start, &entry.value))
}

/// First whitespace-separated token and the trimmed remainder.
fn split_token(text: &str) -> (&str, &str)
{
    let text = text.trim_start();
    match text.split_once(char::is_whitespace) {
        Some((token, rest)) => (token, rest.trim()),
        None => (text.trim_end(), ""),
    }
}

/// Skip the `m` marker of functions with multiple names.
fn strip_multiple(rest: &str) -> &str
{
    match split_token(rest) {
        ("m", tail) => tail,
        _ => rest,
    }
}

fn parse_hex(token: &str, what: &str) -> RecordResult<u64>
{
    u64::from_str_radix(token, 16).map_err(|_| format!("invalid {what} {token:?}"))
}

fn parse_decimal(token: &str, what: &str) -> RecordResult<u32>
{
    token.parse().map_err(|_| format!("invalid {what} {token:?}"))
}

fn narrow(value: u64, what: &str) -> RecordResult<u32>
{
    u32::try_from(value).map_err(|_| format!("{what} {value:x} does not fit in 32 bits"))
}
