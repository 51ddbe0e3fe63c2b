//! CHIP-8 virtual machine with configurable interpreter quirks.
mod clock;
mod conf;
pub mod constants;
mod cpu;
mod error;
mod keypad;
mod opcode;
mod runner;
mod vm;

pub use self::{
    clock::Clock,
    conf::{Chip8Conf, Hz, IndexOverflow, Quirks, UnknownOpcodePolicy},
    cpu::RunState,
    error::{Chip8Error, Chip8Result},
    keypad::{InvalidKeyCode, KeyCode},
    opcode::Opcode,
    runner::Runner,
    vm::{Chip8Vm, Flow},
};

/// Version of this crate.
pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Read-only view of the 64x32 monochrome display, row-major.
pub type Chip8DisplayBuffer<'a> = &'a [bool; constants::DISPLAY_BUFFER_SIZE];

pub mod prelude {
    pub use super::{
        error::{Chip8Error, Chip8Result},
        keypad::KeyCode,
        runner::Runner,
        vm::{Chip8Vm, Flow},
        Chip8Conf, Quirks, RunState,
    };
}
