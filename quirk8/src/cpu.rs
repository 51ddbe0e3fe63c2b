//! CPU and memory state.
use std::ops::Range;

use crate::{
    constants::*,
    error::{Chip8Error, Chip8Result},
    keypad::KeyCode,
    opcode::Opcode,
};

/// Execution state of the machine between instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Fetching and executing instructions.
    Running,
    /// Stalled on `FX0A` (LD Vx, K) until a key is pressed.
    ///
    /// The key value will be stored in the given register.
    WaitingForKey { register: usize },
    /// Stopped by a fault. Only a reset resumes execution.
    Faulted,
}

/// Core state for a chip8 interpreter.
pub struct Chip8Cpu {
    // ------------------------------------------------------------------------
    // Registers
    /// Program counter pointing to the next instruction to fetch.
    pub(crate) pc: Address,
    /// Stack pointer, the number of return addresses on the stack.
    pub(crate) sp: usize,
    /// General purpose registers for temporary values.
    ///
    /// Register 16 (VF) is used for either the carry flag or borrow switch depending on opcode.
    pub(crate) registers: [u8; REGISTER_COUNT],
    /// (I) Pointer register used as a base for memory access.
    pub(crate) address: Address,
    /// (DT) Delay timer that counts down to 0.
    pub(crate) delay_timer: u8,
    /// (ST) Sound timer that counts down to 0.
    pub(crate) sound_timer: u8,
    /// Last pressed key, if any is down.
    pub(crate) key: Option<KeyCode>,

    // ------------------------------------------------------------------------
    // Memory
    /// Main memory storage space.
    pub(crate) ram: Box<[u8; MEM_SIZE]>,
    /// Stack of return pointers used for jumping when a routine call finishes.
    pub(crate) stack: Box<[Address; STACK_SIZE]>,
    /// Screen buffer that is drawn to.
    pub(crate) display: Box<[bool; DISPLAY_BUFFER_SIZE]>,

    // ------------------------------------------------------------------------
    // Control
    pub(crate) state: RunState,
}

impl Default for Chip8Cpu {
    fn default() -> Self {
        let mut cpu = Self {
            pc: MEM_START as Address,
            sp: 0,
            registers: [0; REGISTER_COUNT],
            address: 0,
            delay_timer: TIMER_INITIAL,
            sound_timer: TIMER_INITIAL,
            key: None,

            ram: Box::new([0; MEM_SIZE]),
            stack: Box::new([0; STACK_SIZE]),
            display: Box::new([false; DISPLAY_BUFFER_SIZE]),

            state: RunState::Running,
        };
        cpu.load_font();
        cpu
    }
}

impl Chip8Cpu {
    pub fn new() -> Self {
        Default::default()
    }

    /// Put every register, buffer and timer back to the power-on state.
    pub(crate) fn power_on(&mut self) {
        self.pc = MEM_START as Address;
        self.sp = 0;
        self.registers.fill(0);
        self.address = 0;
        self.delay_timer = TIMER_INITIAL;
        self.sound_timer = TIMER_INITIAL;
        self.key = None;
        self.ram.fill(0);
        self.stack.fill(0);
        self.display.fill(false);
        self.state = RunState::Running;
        self.load_font();
    }

    fn load_font(&mut self) {
        let start = FONTSET_START as usize;
        self.ram[start..start + FONTSET_DATA_LENGTH].copy_from_slice(&FONTSET);
    }

    pub fn clear_display(&mut self) {
        self.display.fill(false);
    }

    /// Count down both timers, stopping at zero.
    #[inline]
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// Read the instruction at the program counter, and advance past it.
    #[inline]
    pub fn fetch(&mut self) -> Chip8Result<Opcode> {
        let pc = self.pc as usize;
        if pc >= MEM_SIZE - 1 {
            return Err(Chip8Error::FetchOutOfRange { pc: self.pc });
        }

        let opcode = Opcode::from_bytes([self.ram[pc], self.ram[pc + 1]]);
        self.pc += 2;

        Ok(opcode)
    }

    /// Address of the instruction currently being executed.
    ///
    /// Only meaningful after a fetch, which has already advanced the program counter.
    #[inline(always)]
    pub(crate) fn current_pc(&self) -> Address {
        self.pc.wrapping_sub(2)
    }

    /// Bounds check `len` bytes of memory starting at `address`.
    ///
    /// Returns the range to index `ram` with.
    #[inline]
    pub(crate) fn mem_range(&self, address: usize, len: usize) -> Chip8Result<Range<usize>> {
        let end = address + len;
        if end > MEM_SIZE {
            return Err(Chip8Error::MemoryOutOfRange {
                pc: self.current_pc(),
                address: end - 1,
            });
        }

        Ok(address..end)
    }

    pub(crate) fn push_stack(&mut self, address: Address) -> Chip8Result<()> {
        if self.sp >= STACK_SIZE {
            return Err(Chip8Error::StackOverflow {
                pc: self.current_pc(),
            });
        }

        self.stack[self.sp] = address;
        self.sp += 1;

        Ok(())
    }

    pub(crate) fn pop_stack(&mut self) -> Chip8Result<Address> {
        match self.sp.checked_sub(1) {
            Some(sp) => {
                self.sp = sp;
                Ok(self.stack[sp])
            }
            None => Err(Chip8Error::StackUnderflow {
                pc: self.current_pc(),
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_power_on_state() {
        let cpu = Chip8Cpu::default();

        assert_eq!(cpu.pc, 0x200);
        assert_eq!(cpu.sp, 0);
        assert_eq!(cpu.address, 0);
        assert_eq!(cpu.registers, [0; REGISTER_COUNT]);
        assert_eq!(cpu.key, None);
        assert_eq!(cpu.state, RunState::Running);
        assert!(cpu.display.iter().all(|px| !px));

        // glyph 0 and F
        assert_eq!(&cpu.ram[0x50..0x55], &[0xF0, 0x90, 0x90, 0x90, 0xF0]);
        assert_eq!(&cpu.ram[0x9B..0xA0], &[0xF0, 0x80, 0xF0, 0x80, 0x80]);
        assert!(cpu.ram[MEM_START..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_fetch_big_endian() {
        let mut cpu = Chip8Cpu::default();
        cpu.ram[0x200] = 0x12;
        cpu.ram[0x201] = 0x34;

        assert_eq!(cpu.fetch().unwrap(), Opcode(0x1234));
        assert_eq!(cpu.pc, 0x202);
    }

    #[test]
    fn test_fetch_out_of_range() {
        let mut cpu = Chip8Cpu::default();

        // last complete instruction
        cpu.pc = 0xFFE;
        assert!(cpu.fetch().is_ok());

        cpu.pc = 0xFFF;
        assert!(matches!(
            cpu.fetch(),
            Err(Chip8Error::FetchOutOfRange { pc: 0xFFF })
        ));
        assert_eq!(cpu.pc, 0xFFF);

        cpu.pc = 0x1002;
        assert!(cpu.fetch().is_err());
    }

    #[test]
    fn test_timers_floor_at_zero() {
        let mut cpu = Chip8Cpu::default();
        cpu.delay_timer = 2;
        cpu.sound_timer = 1;

        cpu.tick_timers();
        assert_eq!((cpu.delay_timer, cpu.sound_timer), (1, 0));
        cpu.tick_timers();
        assert_eq!((cpu.delay_timer, cpu.sound_timer), (0, 0));
        cpu.tick_timers();
        assert_eq!((cpu.delay_timer, cpu.sound_timer), (0, 0));
    }

    #[test]
    fn test_stack() {
        let mut cpu = Chip8Cpu::default();
        cpu.pc = 0x202;

        assert!(matches!(
            cpu.pop_stack(),
            Err(Chip8Error::StackUnderflow { pc: 0x200 })
        ));

        cpu.push_stack(0x300).unwrap();
        cpu.push_stack(0x400).unwrap();
        assert_eq!(cpu.pop_stack().unwrap(), 0x400);
        assert_eq!(cpu.pop_stack().unwrap(), 0x300);
        assert!(cpu.pop_stack().is_err());

        for _ in 0..STACK_SIZE {
            cpu.push_stack(0x200).unwrap();
        }
        assert!(matches!(
            cpu.push_stack(0x200),
            Err(Chip8Error::StackOverflow { .. })
        ));
    }

    #[test]
    fn test_memory_bounds() {
        let cpu = Chip8Cpu::default();

        assert_eq!(cpu.mem_range(0xFFD, 3).unwrap(), 0xFFD..0x1000);
        assert_eq!(cpu.mem_range(0x1000, 0).unwrap(), 0x1000..0x1000);
        assert!(matches!(
            cpu.mem_range(0xFFE, 3),
            Err(Chip8Error::MemoryOutOfRange { address: 0x1000, .. })
        ));
    }
}
