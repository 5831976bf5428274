//! Postfix expression evaluation for CFI rules.

use smallvec::SmallVec;

use super::{MemoryAccess, RegisterValues};
use crate::error::{Result, SymbolError};
use crate::types::Address;

/// Evaluates postfix expressions against a register dictionary.
///
/// Supported tokens:
///
/// - integers: decimal (optionally negative) or `0x` hexadecimal
/// - identifiers: looked up in the dictionary (`$rsp`, `.cfa`, ...)
/// - binary operators: `+ - * / %` and `@` (align the left operand down to the right)
/// - `^`: replace the top of the stack with the 64-bit value stored at that address
///
/// Arithmetic wraps, matching the register width.
pub struct PostfixEvaluator<'a, M: ?Sized>
{
    dictionary: &'a RegisterValues,
    memory: &'a M,
}

impl<'a, M: MemoryAccess + ?Sized> PostfixEvaluator<'a, M>
{
    pub fn new(dictionary: &'a RegisterValues, memory: &'a M) -> Self
    {
        Self { dictionary, memory }
    }

    /// Evaluate `expression` to a single value.
    ///
    /// ## Errors
    ///
    /// `Evaluation` for unknown identifiers, stack underflow, division by zero,
    /// or an expression that leaves other than one value; `MemoryRead` when a
    /// dereference fails.
    pub fn evaluate(&self, expression: &str) -> Result<u64>
    {
        let mut stack: SmallVec<[u64; 8]> = SmallVec::new();

        for token in expression.split_whitespace() {
            match token {
                "+" | "-" | "*" | "/" | "%" | "@" => {
                    let rhs = pop(&mut stack, token)?;
                    let lhs = pop(&mut stack, token)?;
                    stack.push(binary(token, lhs, rhs)?);
                }
                "^" => {
                    let address = Address::from(pop(&mut stack, token)?);
                    stack.push(self.memory.read_u64(address)?);
                }
                _ => stack.push(self.operand(token)?),
            }
        }

        match stack.as_slice() {
            [value] => Ok(*value),
            [] => Err(SymbolError::Evaluation(format!("{expression:?} produced no value"))),
            _ => Err(SymbolError::Evaluation(format!(
                "{expression:?} left {} values on the stack",
                stack.len()
            ))),
        }
    }

    fn operand(&self, token: &str) -> Result<u64>
    {
        if let Some(value) = parse_integer(token) {
            return Ok(value);
        }
        self.dictionary
            .get(token)
            .copied()
            .ok_or_else(|| SymbolError::Evaluation(format!("unknown identifier {token:?}")))
    }
}

fn pop(stack: &mut SmallVec<[u64; 8]>, operator: &str) -> Result<u64>
{
    stack
        .pop()
        .ok_or_else(|| SymbolError::Evaluation(format!("stack underflow at {operator:?}")))
}

fn binary(operator: &str, lhs: u64, rhs: u64) -> Result<u64>
{
    let value = match operator {
        "+" => lhs.wrapping_add(rhs),
        "-" => lhs.wrapping_sub(rhs),
        "*" => lhs.wrapping_mul(rhs),
        "/" | "%" | "@" if rhs == 0 => {
            return Err(SymbolError::Evaluation(format!("zero right operand for {operator:?}")));
        }
        "/" => lhs / rhs,
        "%" => lhs % rhs,
        "@" => lhs & !(rhs - 1),
        _ => return Err(SymbolError::Evaluation(format!("unknown operator {operator:?}"))),
    };
    Ok(value)
}

/// Decimal (signed) or `0x`-prefixed hexadecimal integer.
fn parse_integer(token: &str) -> Option<u64>
{
    if let Some(hex) = token.strip_prefix("0x") {
        return u64::from_str_radix(hex, 16).ok();
    }
    let first = token.bytes().next()?;
    if !(first.is_ascii_digit() || first == b'-') {
        return None;
    }
    token
        .parse::<i64>()
        .map(|value| value as u64)
        .or_else(|_| token.parse::<u64>())
        .ok()
}
