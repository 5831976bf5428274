//! Instruction address type.

use std::fmt;
use std::ops::{Add, Sub};

/// Strongly typed address in the crashed process's address space
///
/// Frames carry absolute instruction addresses while symbol files describe
/// module-relative ones. Keeping both behind a newtype makes the conversion
/// ([`Address::relative_to`]) explicit at every call site.
///
/// ## Example
///
/// ```rust
/// use crashsym_core::types::Address;
///
/// let pc = Address::from(0x7f00_0000_1234);
/// let base = Address::from(0x7f00_0000_0000);
/// assert_eq!(pc.relative_to(base), Some(0x1234));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value in const contexts.
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Raw `u64` value of this address.
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Offset of this address from `base`, or `None` if it lies below `base`.
    ///
    /// ```rust
    /// use crashsym_core::types::Address;
    ///
    /// assert_eq!(Address::new(0x1000).relative_to(Address::new(0x2000)), None);
    /// ```
    pub fn relative_to(self, base: Address) -> Option<u64>
    {
        self.0.checked_sub(base.0)
    }

    /// Add an offset, returning `None` on overflow.
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

impl Sub<u64> for Address
{
    type Output = Address;

    fn sub(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_sub(rhs))
    }
}
