//! CFI rule-set grammar.
//!
//! A rule set is a flat token stream: a token ending in `:` names a register
//! (`.cfa`, `.ra`, or a machine register such as `$rbp`), and the tokens up to
//! the next name form that register's postfix expression:
//!
//! ```text
//! .cfa: $rsp 16 + .ra: .cfa -8 + ^ $rbp: .cfa -16 + ^
//! ```

use smallvec::SmallVec;

use super::CfiFrameInfo;
use crate::error::{Result, SymbolError};

/// Receives each complete rule as the parser finishes it.
pub trait CfiRuleHandler
{
    /// Rule computing the canonical frame address.
    fn cfa_rule(&mut self, expression: &str);

    /// Rule computing the return address.
    fn ra_rule(&mut self, expression: &str);

    /// Rule recovering the caller's value of `name`.
    fn register_rule(&mut self, name: &str, expression: &str);
}

/// Tokenizes a rule set and reports rules to a [`CfiRuleHandler`].
pub struct CfiRuleParser<'h, H: ?Sized>
{
    handler: &'h mut H,
}

impl<'h, H: CfiRuleHandler + ?Sized> CfiRuleParser<'h, H>
{
    pub fn new(handler: &'h mut H) -> Self
    {
        Self { handler }
    }

    /// Parse `rule_set`, reporting each rule once its expression is complete.
    ///
    /// Rules reported before a syntax error stay reported; the handler sees a
    /// prefix of the rule set.
    ///
    /// ## Errors
    ///
    /// Returns `CfiRuleSet` for an empty rule set, an expression with no
    /// preceding name, an empty name, or a name with no expression.
    pub fn parse(&mut self, rule_set: &str) -> Result<()>
    {
        let mut name: Option<&str> = None;
        let mut expression: SmallVec<[&str; 8]> = SmallVec::new();

        for token in rule_set.split_whitespace() {
            if let Some(next) = token.strip_suffix(':') {
                if let Some(current) = name {
                    self.report(current, &expression)?;
                }
                if next.is_empty() {
                    return Err(SymbolError::CfiRuleSet(format!("empty register name in {rule_set:?}")));
                }
                name = Some(next);
                expression.clear();
            } else if name.is_none() {
                return Err(SymbolError::CfiRuleSet(format!(
                    "expression token {token:?} precedes any register name"
                )));
            } else {
                expression.push(token);
            }
        }

        match name {
            Some(current) => self.report(current, &expression),
            None => Err(SymbolError::CfiRuleSet("rule set is empty".into())),
        }
    }

    fn report(&mut self, name: &str, expression: &[&str]) -> Result<()>
    {
        if expression.is_empty() {
            return Err(SymbolError::CfiRuleSet(format!("register {name} has no expression")));
        }
        let expression = expression.join(" ");
        match name {
            ".cfa" => self.handler.cfa_rule(&expression),
            ".ra" => self.handler.ra_rule(&expression),
            _ => self.handler.register_rule(name, &expression),
        }
        Ok(())
    }
}

/// Handler that writes rules into a [`CfiFrameInfo`].
pub struct CfiFrameInfoParseHandler<'a>
{
    frame_info: &'a mut CfiFrameInfo,
}

impl<'a> CfiFrameInfoParseHandler<'a>
{
    pub fn new(frame_info: &'a mut CfiFrameInfo) -> Self
    {
        Self { frame_info }
    }
}

impl CfiRuleHandler for CfiFrameInfoParseHandler<'_>
{
    fn cfa_rule(&mut self, expression: &str)
    {
        self.frame_info.set_cfa_rule(expression);
    }

    fn ra_rule(&mut self, expression: &str)
    {
        self.frame_info.set_ra_rule(expression);
    }

    fn register_rule(&mut self, name: &str, expression: &str)
    {
        self.frame_info.set_register_rule(name, expression);
    }
}
