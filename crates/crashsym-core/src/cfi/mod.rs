//! # Call Frame Information
//!
//! CFI describes, for a range of code addresses, how to recover the caller's
//! registers from the callee's registers and stack memory. Symbol files encode
//! it as textual rule sets (see [`rules`]) whose right-hand sides are postfix
//! expressions (see [`postfix`]).
//!
//! ## Recovering a caller frame
//!
//! ```rust
//! use crashsym_core::cfi::{parse_cfi_rule_set, CfiFrameInfo, MemoryAccess, RegisterValues};
//! use crashsym_core::error::{Result, SymbolError};
//! use crashsym_core::types::Address;
//!
//! struct Stack;
//!
//! impl MemoryAccess for Stack
//! {
//!     fn read_u64(&self, address: Address) -> Result<u64>
//!     {
//!         match address.value() {
//!             0x7ff8 => Ok(0x40_1234),
//!             _ => Err(SymbolError::MemoryRead(address)),
//!         }
//!     }
//! }
//!
//! let mut info = CfiFrameInfo::default();
//! parse_cfi_rule_set(".cfa: $rsp 8 + .ra: .cfa -8 + ^", &mut info).unwrap();
//!
//! let callee = RegisterValues::from([("$rsp".to_string(), 0x7ff8)]);
//! let caller = info.find_caller_regs(&callee, &Stack).unwrap();
//! assert_eq!(caller[".cfa"], 0x8000);
//! assert_eq!(caller[".ra"], 0x40_1234);
//! ```

pub mod postfix;
pub mod rules;

use std::collections::BTreeMap;
use std::fmt;

pub use postfix::PostfixEvaluator;
pub use rules::{CfiFrameInfoParseHandler, CfiRuleHandler, CfiRuleParser};

use crate::error::{Result, SymbolError};
use crate::types::Address;

/// Register name to value, as handed to and returned from CFI evaluation.
pub type RegisterValues = BTreeMap<String, u64>;

/// Name under which the canonical frame address is stored.
pub const CFA: &str = ".cfa";
/// Name under which the return address is stored.
pub const RA: &str = ".ra";

/// Minimal memory accessor required to evaluate `^` (dereference).
///
/// Implementations should return an error for unreadable addresses rather
/// than panic; minidumps only capture part of the stack.
pub trait MemoryAccess
{
    /// Read a 64-bit value from the given address.
    fn read_u64(&self, address: Address) -> Result<u64>;
}

/// Recovery rules in effect at one code address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CfiFrameInfo
{
    cfa_rule: Option<String>,
    ra_rule: Option<String>,
    register_rules: BTreeMap<String, String>,
}

impl CfiFrameInfo
{
    pub fn set_cfa_rule(&mut self, expression: &str)
    {
        self.cfa_rule = Some(expression.to_owned());
    }

    pub fn set_ra_rule(&mut self, expression: &str)
    {
        self.ra_rule = Some(expression.to_owned());
    }

    pub fn set_register_rule(&mut self, name: &str, expression: &str)
    {
        self.register_rules.insert(name.to_owned(), expression.to_owned());
    }

    pub fn cfa_rule(&self) -> Option<&str>
    {
        self.cfa_rule.as_deref()
    }

    pub fn ra_rule(&self) -> Option<&str>
    {
        self.ra_rule.as_deref()
    }

    pub fn register_rule(&self, name: &str) -> Option<&str>
    {
        self.register_rules.get(name).map(String::as_str)
    }

    /// Register rules other than `.cfa` and `.ra`, ordered by name.
    pub fn register_rules(&self) -> impl Iterator<Item = (&str, &str)>
    {
        self.register_rules.iter().map(|(name, rule)| (name.as_str(), rule.as_str()))
    }

    /// Compute the caller's registers from the callee's.
    ///
    /// `.cfa` is evaluated first and made visible to every other rule. The
    /// result holds `.cfa`, `.ra`, and each register that has a rule;
    /// registers without a rule are not recovered.
    ///
    /// ## Errors
    ///
    /// `Evaluation` if either the `.cfa` or `.ra` rule is missing, or any rule
    /// fails to evaluate.
    pub fn find_caller_regs<M: MemoryAccess + ?Sized>(
        &self,
        registers: &RegisterValues,
        memory: &M,
    ) -> Result<RegisterValues>
    {
        let (Some(cfa_rule), Some(ra_rule)) = (self.cfa_rule(), self.ra_rule()) else {
            return Err(SymbolError::Evaluation("frame info lacks a .cfa or .ra rule".into()));
        };

        let cfa = PostfixEvaluator::new(registers, memory).evaluate(cfa_rule)?;
        let mut working = registers.clone();
        working.insert(CFA.to_owned(), cfa);

        let evaluator = PostfixEvaluator::new(&working, memory);
        let mut caller = RegisterValues::new();
        caller.insert(CFA.to_owned(), cfa);
        caller.insert(RA.to_owned(), evaluator.evaluate(ra_rule)?);
        for (name, rule) in &self.register_rules {
            caller.insert(name.clone(), evaluator.evaluate(rule)?);
        }
        Ok(caller)
    }
}

impl fmt::Display for CfiFrameInfo
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let rules = self
            .cfa_rule
            .as_deref()
            .map(|rule| (CFA, rule))
            .into_iter()
            .chain(self.ra_rule.as_deref().map(|rule| (RA, rule)))
            .chain(self.register_rules());
        for (index, (name, rule)) in rules.enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{name}: {rule}")?;
        }
        Ok(())
    }
}

/// Apply the rules in `rule_set` to `frame_info`.
///
/// On a syntax error the rules before the error have already been applied
/// and remain in `frame_info`.
///
/// ## Errors
///
/// Returns `CfiRuleSet` on any syntax error.
pub fn parse_cfi_rule_set(rule_set: &str, frame_info: &mut CfiFrameInfo) -> Result<()>
{
    let mut handler = CfiFrameInfoParseHandler::new(frame_info);
    CfiRuleParser::new(&mut handler).parse(rule_set)
}
