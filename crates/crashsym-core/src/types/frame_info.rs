//! Platform unwind records attached to code ranges.

use std::fmt;

/// Kind of a Windows stack-walking record.
///
/// Discriminants match the type field of `STACK WIN` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackInfoType
{
    /// Frame-pointer-omission data.
    Fpo = 0,
    Trap = 1,
    Tss = 2,
    Standard = 3,
    /// Frame data with an optional program string.
    FrameData = 4,
}

impl StackInfoType
{
    /// Every type, in discriminant order.
    pub const ALL: [StackInfoType; 5] = [
        StackInfoType::Fpo,
        StackInfoType::Trap,
        StackInfoType::Tss,
        StackInfoType::Standard,
        StackInfoType::FrameData,
    ];

    /// Map the numeric type field of a record.
    pub fn from_raw(raw: u64) -> Option<Self>
    {
        Self::ALL.into_iter().find(|ty| *ty as u64 == raw)
    }
}

impl fmt::Display for StackInfoType
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            StackInfoType::Fpo => "fpo",
            StackInfoType::Trap => "trap",
            StackInfoType::Tss => "tss",
            StackInfoType::Standard => "standard",
            StackInfoType::FrameData => "frame-data",
        };
        write!(f, "{label}")
    }
}

/// Windows frame layout for one code range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowsFrameInfo
{
    pub kind: StackInfoType,
    pub prolog_size: u32,
    pub epilog_size: u32,
    pub parameter_size: u32,
    pub saved_register_size: u32,
    pub local_size: u32,
    pub max_stack_size: u32,
    /// Set for FPO records whose function uses EBP as a general register.
    pub allocates_base_pointer: bool,
    /// Postfix program recovering the caller's registers (frame data only).
    pub program_string: Option<String>,
}
