//! Result and errors.
use std::fmt::{self, Display, Formatter};

use crate::constants::{Address, PROGRAM_SIZE_MAX};

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug)]
pub enum Chip8Error {
    /// Attempt to load a program that can't fit in memory.
    LargeProgram { size: usize },
    /// The program file could not be read.
    Io(std::io::Error),
    /// Attempt to run the machine before a program was loaded.
    NotLoaded,
    /// Opcode does not match any instruction, and the VM is configured to halt on it.
    UnknownOpcode { pc: Address, opcode: u16 },
    /// `00EE` (RET) executed with an empty call stack.
    StackUnderflow { pc: Address },
    /// `2NNN` (CALL) executed with a full call stack.
    StackOverflow { pc: Address },
    /// The program counter points past the last complete instruction in memory.
    FetchOutOfRange { pc: Address },
    /// An instruction addressed memory outside of the 4KB RAM.
    MemoryOutOfRange { pc: Address, address: usize },
    /// The machine faulted earlier, and must be reset before it can continue.
    Halted,
}

impl Chip8Error {
    /// Whether this error stopped the machine.
    ///
    /// Load errors leave the machine untouched.
    pub fn is_fault(&self) -> bool {
        !matches!(
            self,
            Self::LargeProgram { .. } | Self::Io(_) | Self::NotLoaded | Self::Halted
        )
    }
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::LargeProgram { size } => write!(
                f,
                "program of {size} bytes too large for VM memory, maximum is {PROGRAM_SIZE_MAX}"
            ),
            Self::Io(err) => write!(f, "failed to read program: {err}"),
            Self::NotLoaded => write!(f, "no program loaded"),
            Self::UnknownOpcode { pc, opcode } => {
                write!(f, "unrecognized instruction {opcode:04X} at {pc:04X}")
            }
            Self::StackUnderflow { pc } => write!(f, "call stack underflow at {pc:04X}"),
            Self::StackOverflow { pc } => write!(f, "call stack overflow at {pc:04X}"),
            Self::FetchOutOfRange { pc } => {
                write!(f, "instruction fetch out of memory range at {pc:04X}")
            }
            Self::MemoryOutOfRange { pc, address } => write!(
                f,
                "memory access out of range at {pc:04X}, address {address:04X}"
            ),
            Self::Halted => write!(f, "machine halted after a fault"),
        }
    }
}

impl std::error::Error for Chip8Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Chip8Error {
    fn from(err: std::io::Error) -> Self {
        Chip8Error::Io(err)
    }
}
