//! Virtual machine.
use std::{fmt::Write, fs, path::Path};

use log::{debug, error, info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    conf::{Chip8Conf, UnknownOpcodePolicy},
    constants::*,
    cpu::{Chip8Cpu, RunState},
    error::{Chip8Error, Chip8Result},
    keypad::KeyCode,
    opcode::Opcode,
    Chip8DisplayBuffer,
};

pub struct Chip8Vm {
    cpu: Chip8Cpu,
    conf: Chip8Conf,
    rng: StdRng,
    /// Copy of the loaded program image, so the machine can be reset.
    program: Option<Box<[u8]>>,
}

impl Chip8Vm {
    pub fn new(conf: Chip8Conf) -> Self {
        let rng = match conf.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Chip8Vm {
            cpu: Chip8Cpu::new(),
            conf,
            rng,
            program: None,
        }
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &Chip8Conf {
        &self.conf
    }

    /// Load a program image into memory at `0x200`, resetting the machine.
    ///
    /// On error the machine is left as it was.
    pub fn load_program(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        if bytecode.len() > PROGRAM_SIZE_MAX {
            return Err(Chip8Error::LargeProgram {
                size: bytecode.len(),
            });
        }

        self.program = Some(bytecode.into());
        self.reset();

        info!("loaded program of {} bytes", bytecode.len());

        Ok(())
    }

    /// Read a ROM file and load it with [`Chip8Vm::load_program`].
    pub fn load_program_file(&mut self, filepath: impl AsRef<Path>) -> Chip8Result<()> {
        let filepath = filepath.as_ref();
        debug!("load rom: {}", filepath.display());

        let bytecode = fs::read(filepath)?;
        self.load_program(&bytecode)
    }

    pub fn is_loaded(&self) -> bool {
        self.program.is_some()
    }

    /// Restore the power-on state, and copy the loaded program back into memory.
    ///
    /// This clears the display and any fault.
    pub fn reset(&mut self) {
        // Start with clean memory to avoid leaking previous program.
        self.cpu.power_on();

        if let Some(program) = &self.program {
            self.cpu.ram[MEM_START..MEM_START + program.len()].copy_from_slice(program);
        }

        debug!("machine reset");
    }

    pub fn framebuffer(&self) -> Chip8DisplayBuffer<'_> {
        &self.cpu.display
    }
}

/// Control flow signal returned after each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Ok,
    /// Program counter has jumped to a new address.
    ///
    /// This is returned when the interpreter encounters:
    ///
    /// - 1nnn (`JP addr`)
    /// - 2nnn (`CALL addr`)
    /// - 00EE (`RET`)
    /// - Bnnn (`JP V0, addr`)
    Jump,
    /// The display buffer changed.
    Draw,
    /// Wait for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`), which stops
    /// execution until a key is pressed, and loads the key value into `Vx`.
    KeyWait,
    /// The opcode matched no instruction, and was skipped.
    Unknown(Opcode),
}

/// Interpreter
impl Chip8Vm {
    /// Sets the keyboard key input state.
    ///
    /// Only one key is tracked, so a press replaces any earlier key, and
    /// `None` releases it. If the VM is waiting for keyboard input, the key
    /// is stored and execution resumes.
    pub fn set_key(&mut self, key: Option<KeyCode>) {
        self.cpu.key = key;

        if let (Some(k), RunState::WaitingForKey { register }) = (key, self.cpu.state) {
            debug!("key {k} resumes execution");
            self.cpu.registers[register] = k.as_u8();
            self.cpu.state = RunState::Running;
        }
    }

    /// Count down the delay and sound timers.
    ///
    /// Must be called at 60Hz, independent of the instruction rate.
    pub fn tick_timers(&mut self) {
        self.cpu.tick_timers();
    }

    /// Read the instruction at the program counter, and advance past it.
    pub fn fetch(&mut self) -> Chip8Result<Opcode> {
        let result = self.cpu.fetch();
        self.check_fault(result)
    }

    /// Fetch and execute one instruction.
    ///
    /// Does not fetch while the machine is waiting for a key.
    pub fn step(&mut self) -> Chip8Result<Flow> {
        if !self.is_loaded() {
            return Err(Chip8Error::NotLoaded);
        }

        match self.cpu.state {
            RunState::Running => {
                let opcode = self.fetch()?;
                self.execute(opcode.0)
            }
            RunState::WaitingForKey { .. } => Ok(Flow::KeyWait),
            RunState::Faulted => Err(Chip8Error::Halted),
        }
    }

    /// Step the machine up to `step_count` times.
    ///
    /// Returns early when the machine starts waiting for a key.
    pub fn run_steps(&mut self, step_count: usize) -> Chip8Result<Flow> {
        let mut flow = Flow::Ok;

        for _ in 0..step_count {
            flow = self.step()?;
            if flow == Flow::KeyWait {
                break;
            }
        }

        Ok(flow)
    }

    /// Decode and execute a single opcode.
    ///
    /// The program counter is expected to already point past the instruction.
    pub fn execute(&mut self, opcode: u16) -> Chip8Result<Flow> {
        let result = self.exec(Opcode(opcode));
        self.check_fault(result)
    }

    /// Faults stop the machine until it is reset.
    fn check_fault<T>(&mut self, result: Chip8Result<T>) -> Chip8Result<T> {
        if let Err(ref err) = result {
            error!("{err}");
            self.cpu.state = RunState::Faulted;
        }
        result
    }

    fn unknown(&mut self, opcode: Opcode) -> Chip8Result<Flow> {
        let pc = self.cpu.current_pc();
        match self.conf.unknown_opcode {
            UnknownOpcodePolicy::Skip => {
                warn!("unrecognized instruction {opcode} at {pc:04X}");
                Ok(Flow::Unknown(opcode))
            }
            UnknownOpcodePolicy::Halt => Err(Chip8Error::UnknownOpcode {
                pc,
                opcode: opcode.0,
            }),
        }
    }

    fn exec(&mut self, opcode: Opcode) -> Chip8Result<Flow> {
        let vx = opcode.x();
        let vy = opcode.y();
        let n = opcode.n();
        let nn = opcode.nn();
        let nnn = opcode.nnn();

        let mut control_flow = Flow::Ok;

        match opcode.op() {
            // Miscellaneous instructions identified by nn
            0x0 | 0xE | 0xF => return self.exec_misc(opcode),
            // 1NNN (JP addr)
            //
            // Jump to address.
            0x1 => {
                op_trace("JP", opcode, &self.cpu);

                self.cpu.pc = nnn;

                control_flow = Flow::Jump;
            }
            // 2NNN (CALL addr)
            //
            // Call subroutine at NNN.
            0x2 => {
                op_trace("CALL", opcode, &self.cpu);

                self.cpu.push_stack(self.cpu.pc)?;
                self.cpu.pc = nnn;

                control_flow = Flow::Jump;
            }
            // 3XNN (SE Vx, byte)
            //
            // Skip the next instruction if register VX equals value NN.
            0x3 => {
                op_trace("SE", opcode, &self.cpu);

                if self.cpu.registers[vx] == nn {
                    self.cpu.pc += 2;
                }
            }
            // 4XNN (SNE Vx, byte)
            //
            // Skip the next instruction if register VX does not equal value NN.
            0x4 => {
                op_trace("SNE", opcode, &self.cpu);

                if self.cpu.registers[vx] != nn {
                    self.cpu.pc += 2;
                }
            }
            // 5XY0 (SE Vx, Vy)
            //
            // Skip the next instruction if register VX equals value VY.
            0x5 if n == 0 => {
                op_trace("SE", opcode, &self.cpu);

                if self.cpu.registers[vx] == self.cpu.registers[vy] {
                    self.cpu.pc += 2;
                }
            }
            // 6XNN (LD Vx, byte)
            //
            // Set register VX to value NN.
            0x6 => {
                op_trace("LD", opcode, &self.cpu);

                self.cpu.registers[vx] = nn;
            }
            // 7xnn (ADD Vx, byte)
            //
            // Add value NN to register VX. Carry flag is not set.
            0x7 => {
                op_trace("ADD", opcode, &self.cpu);

                self.cpu.registers[vx] = self.cpu.registers[vx].wrapping_add(nn);
            }
            // Arithmetic instructions indentified by n
            0x8 => return self.exec_math(opcode),
            // 9xy0 (SNE Vx, Vy)
            //
            // Skip next instruction if Vx != Vy.
            0x9 if n == 0 => {
                op_trace("SNE", opcode, &self.cpu);

                if self.cpu.registers[vx] != self.cpu.registers[vy] {
                    self.cpu.pc += 2;
                }
            }
            // Annn (LD I, addr)
            //
            // Set address register I to value NNN.
            0xA => {
                op_trace("LD I", opcode, &self.cpu);

                self.cpu.address = nnn;
            }
            // Bnnn (JP V0, addr)
            //
            // Jump to address NNN plus an offset register, depending on quirks.
            // The modern variant reads the offset from VX, where X is the upper nibble of NNN.
            0xB => {
                op_trace("JP", opcode, &self.cpu);

                let quirks = &self.conf.quirks;
                let offset = if quirks.jump_adds_vx {
                    self.cpu.registers[vx]
                } else if quirks.jump_base_v0 {
                    self.cpu.registers[0]
                } else {
                    0
                };
                self.cpu.pc = nnn + offset as Address;

                control_flow = Flow::Jump;
            }
            // CXNN (RND Vx, byte)
            //
            // Generate random number.
            // Set register VX to the result of bitwise AND between a random number and NN.
            0xC => {
                op_trace("RND", opcode, &self.cpu);

                self.cpu.registers[vx] = nn & self.rng.gen::<u8>();
            }
            // Dxyn (DRW Vx, Vy, nibble)
            //
            // Draw sprite to the display buffer, at coordinate as per registers Vx and Vy.
            // Sprite is encoded as 8 pixels wide, N pixels high, stored in bits located in
            // memory pointed to by address register I.
            //
            // The origin wraps around the display, but the sprite itself is clipped at
            // the right and bottom edges.
            //
            // If the drawing operation erases existing pixels in the display buffer, register VF is set to
            // 1, and set to 0 if no display bits are unset. This is used for collision detection.
            0xD => {
                op_trace("DRW", opcode, &self.cpu);

                self.draw_sprite(vx, vy, n as usize)?;

                control_flow = Flow::Draw;
            }
            // Unsupported operation.
            _ => return self.unknown(opcode),
        }

        Ok(control_flow)
    }

    fn draw_sprite(&mut self, vx: usize, vy: usize, height: usize) -> Chip8Result<()> {
        let x = self.cpu.registers[vx] as usize % DISPLAY_WIDTH;
        let y = self.cpu.registers[vy] as usize % DISPLAY_HEIGHT;

        // Rows below the display are never read.
        let rows = height.min(DISPLAY_HEIGHT - y);
        let cols = SPRITE_WIDTH.min(DISPLAY_WIDTH - x);
        let range = self.cpu.mem_range(self.cpu.address as usize, rows)?;

        let mut is_erased = false;

        // Iteration from pointer in address register I to number of rows specified by opcode value N.
        for (r, &row) in self.cpu.ram[range].iter().enumerate() {
            // Each row is 8 bits representing the 8 pixels of the sprite.
            for c in 0..cols {
                if (row >> (7 - c)) & 1 == 0 {
                    continue;
                }

                let d = (x + c) + (y + r) * DISPLAY_WIDTH;

                // XOR erases a pixel when both the old and new values are both 1.
                is_erased |= self.cpu.display[d];

                // Write to display buffer
                self.cpu.display[d] ^= true;
            }
        }

        // If a pixel was erased, then a collision occurred.
        self.cpu.registers[FLAG_REGISTER] = is_erased as u8;

        Ok(())
    }

    /// Execute an arithmetic instruction
    ///
    /// Flags are computed from the operands before the operation, and
    /// written to VF after the result, so VF holds the flag even when it
    /// is the destination register.
    #[inline]
    fn exec_math(&mut self, opcode: Opcode) -> Chip8Result<Flow> {
        debug_assert_eq!(opcode.op(), 0x8);

        let vx = opcode.x();
        let vy = opcode.y();
        let (x, y) = (self.cpu.registers[vx], self.cpu.registers[vy]);

        let (result, flag) = match opcode.n() {
            // 8XY0 (LD Vx, Vy)
            //
            // Store the value of register VY in register VX.
            0x0 => {
                op_trace("LD", opcode, &self.cpu);
                (y, None)
            }
            // 8XY1 (OR Vx, Vy)
            0x1 => {
                op_trace("OR", opcode, &self.cpu);
                (x | y, None)
            }
            // 8XY2 (AND Vx, Vy)
            0x2 => {
                op_trace("AND", opcode, &self.cpu);
                (x & y, None)
            }
            // 8XY3 (XOR Vx, Vy)
            0x3 => {
                op_trace("XOR", opcode, &self.cpu);
                (x ^ y, None)
            }
            // 8XY4 (ADD Vx, Vy)
            //
            // ADDs VY to VX, and stores the result in VX.
            // Overflow is wrapped.
            // If overflow, set VF to 1, else 0.
            0x4 => {
                op_trace("ADD", opcode, &self.cpu);

                let (result, carry) = x.overflowing_add(y);
                (result, Some(carry as u8))
            }
            // 8XY5 (SUB Vx, Vy)
            //
            // Subtracts VY from VX, and stores the result in VX.
            // VF is set to 0 when there is a borrow, set to 1 when there isn't.
            0x5 => {
                op_trace("SUB", opcode, &self.cpu);
                (x.wrapping_sub(y), Some((x >= y) as u8))
            }
            // 8XY6 (SHR Vx {, Vy})
            //
            // Shift right by 1. VF is set to the bit shifted out.
            0x6 => {
                op_trace("SHR", opcode, &self.cpu);

                let value = self.shift_source(x, y);
                (value >> 1, Some(value & 1))
            }
            // 8XY7 (SUBN Vx, Vy)
            //
            // Subtracts VX from VY, and stores the result in VX.
            // VF is set to 0 when there is a borrow, set to 1 when there isn't.
            0x7 => {
                op_trace("SUBN", opcode, &self.cpu);
                (y.wrapping_sub(x), Some((y >= x) as u8))
            }
            // 8XYE (SHL Vx {, Vy})
            //
            // Shift left by 1. VF is set to the bit shifted out.
            0xE => {
                op_trace("SHL", opcode, &self.cpu);

                let value = self.shift_source(x, y);
                (value << 1, Some((value >> 7) & 1))
            }
            // ----------------------------------------------------------------
            // Unsupported operation.
            _ => return self.unknown(opcode),
        };

        self.cpu.registers[vx] = result;
        if let Some(flag) = flag {
            self.cpu.registers[FLAG_REGISTER] = flag;
        }

        Ok(Flow::Ok)
    }

    /// The COSMAC VIP copies VY into VX before shifting.
    #[inline(always)]
    fn shift_source(&self, x: u8, y: u8) -> u8 {
        if self.conf.quirks.shift_in_place {
            x
        } else {
            y
        }
    }

    /// Execute a miscellaneous instruction
    #[inline]
    fn exec_misc(&mut self, opcode: Opcode) -> Chip8Result<Flow> {
        let vx = opcode.x();

        let mut control_flow = Flow::Ok;

        match (opcode.op(), opcode.nnn(), opcode.nn()) {
            // ----------------------------------------------------------------
            // 00E0 (CLS)
            //
            // Clear display
            (0x0, 0x0E0, _) => {
                op_trace("CLS", opcode, &self.cpu);

                self.cpu.clear_display();
                control_flow = Flow::Draw;
            }
            // 00EE (RET)
            //
            // Return from a subroutine.
            // Set the program counter to the value at the top of the stack.
            (0x0, 0x0EE, _) => {
                op_trace("RET", opcode, &self.cpu);

                self.cpu.pc = self.cpu.pop_stack()?;
                control_flow = Flow::Jump;
            }
            // ----------------------------------------------------------------
            // Ex9E (SKP Vx)
            //
            // Skip the next instruction if the key with the value of Vx is pressed.
            (0xE, _, 0x9E) => {
                op_trace("SKP", opcode, &self.cpu);

                if self.key_is(self.cpu.registers[vx]) {
                    self.cpu.pc += 2;
                }
            }
            // ExA1 (SKNP Vx)
            (0xE, _, 0xA1) => {
                op_trace("SKNP", opcode, &self.cpu);

                if !self.key_is(self.cpu.registers[vx]) {
                    self.cpu.pc += 2;
                }
            }
            // ----------------------------------------------------------------
            // Fx07 (LD Vx, DT)
            //
            // Set Vx = delay timer value.
            (0xF, _, 0x07) => {
                op_trace("LD DT", opcode, &self.cpu);

                self.cpu.registers[vx] = self.cpu.delay_timer;
            }
            // Fx0A (LD Vx, K)
            //
            // Wait for a key press, store the value of the key in Vx.
            // All execution stops until a key is pressed, then the value of that key is stored in Vx.
            (0xF, _, 0x0A) => {
                op_trace("LD K", opcode, &self.cpu);

                match self.cpu.key {
                    Some(k) => self.cpu.registers[vx] = k.as_u8(),
                    None => {
                        // stall the machine until `set_key`
                        self.cpu.state = RunState::WaitingForKey { register: vx };
                        control_flow = Flow::KeyWait;
                    }
                }
            }
            // Fx15 (LD DT, Vx)
            //
            // Set delay timer = Vx.
            (0xF, _, 0x15) => {
                op_trace("LD DT", opcode, &self.cpu);

                self.cpu.delay_timer = self.cpu.registers[vx];
            }
            // Fx18 (LD ST, Vx)
            //
            // Set sound timer = Vx.
            (0xF, _, 0x18) => {
                op_trace("LD ST", opcode, &self.cpu);

                self.cpu.sound_timer = self.cpu.registers[vx];
            }
            // Fx1E (ADD I, Vx)
            //
            // Add Vx to I. Whether VF reports overflow depends on quirks.
            (0xF, _, 0x1E) => {
                op_trace("ADD I", opcode, &self.cpu);

                let addr = self.cpu.address;
                let x = self.cpu.registers[vx];
                self.cpu.address = addr.wrapping_add(x as Address);

                let sum = addr as u32 + x as u32;
                if let Some(flag) = self.conf.quirks.index_overflow.flag(sum) {
                    self.cpu.registers[FLAG_REGISTER] = flag;
                }
            }
            // Fx29 (LD F, Vx)
            //
            // Set I = location of sprite for digit Vx.
            (0xF, _, 0x29) => {
                op_trace("LD F", opcode, &self.cpu);

                let x = self.cpu.registers[vx] & 0xF;
                self.cpu.address = FONTSET_START + x as Address * FONTSET_HEIGHT as Address;
            }
            // Fx33 (LD B, Vx)
            //
            // Store the binary-coded decimal representation of Vx
            // in the memory locations I, I+1, and I+2.
            (0xF, _, 0x33) => {
                op_trace("LD B", opcode, &self.cpu);

                let x = self.cpu.registers[vx];
                let range = self.cpu.mem_range(self.cpu.address as usize, 3)?;
                self.cpu.ram[range].copy_from_slice(&[x / 100, x / 10 % 10, x % 10]);
            }
            // Fx55 (LD [I], Vx)
            //
            // Store registers V0 through Vx in memory starting at location I.
            (0xF, _, 0x55) => {
                op_trace("LD [I]", opcode, &self.cpu);

                let range = self.cpu.mem_range(self.cpu.address as usize, vx + 1)?;
                self.cpu.ram[range].copy_from_slice(&self.cpu.registers[..=vx]);
                self.advance_index(vx);
            }
            // Fx65 (LD Vx, [I])
            //
            // Read registers V0 through Vx from memory starting at location I.
            (0xF, _, 0x65) => {
                op_trace("LD [I]", opcode, &self.cpu);

                let range = self.cpu.mem_range(self.cpu.address as usize, vx + 1)?;
                self.cpu.registers[..=vx].copy_from_slice(&self.cpu.ram[range]);
                self.advance_index(vx);
            }
            // ----------------------------------------------------------------
            // Unsupported operation.
            _ => return self.unknown(opcode),
        }

        Ok(control_flow)
    }

    /// Whether the pressed key matches the given register value.
    ///
    /// No key matches nothing.
    #[inline(always)]
    fn key_is(&self, value: u8) -> bool {
        self.cpu.key.map(|k| k.as_u8()) == Some(value)
    }

    /// The COSMAC VIP leaves I pointing after the last register transferred.
    #[inline(always)]
    fn advance_index(&mut self, vx: usize) {
        if !self.conf.quirks.memory_ops_preserve_index {
            self.cpu.address = self.cpu.address.wrapping_add(vx as Address + 1);
        }
    }
}

/// State inspection
impl Chip8Vm {
    pub fn state(&self) -> RunState {
        self.cpu.state
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.cpu.registers
    }

    /// Value of register `Vx`.
    ///
    /// # Panics
    ///
    /// When `index` is not a register, 0x0 to 0xF.
    pub fn register(&self, index: usize) -> u8 {
        self.cpu.registers[index]
    }

    /// Index register I.
    pub fn index(&self) -> Address {
        self.cpu.address
    }

    pub fn pc(&self) -> Address {
        self.cpu.pc
    }

    pub fn delay_timer(&self) -> u8 {
        self.cpu.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.cpu.sound_timer
    }

    /// Number of return addresses on the call stack.
    pub fn stack_depth(&self) -> usize {
        self.cpu.sp
    }

    pub fn key(&self) -> Option<KeyCode> {
        self.cpu.key
    }

    pub fn memory(&self) -> &[u8; MEM_SIZE] {
        &self.cpu.ram
    }
}

/// Troubleshooting
impl Chip8Vm {
    /// Returns the contents of the display as a human readable string.
    pub fn dump_display(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();

        for row in self.cpu.display.chunks(DISPLAY_WIDTH) {
            for px in row {
                if *px {
                    write!(buf, "#")?;
                } else {
                    write!(buf, ".")?;
                }
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }
}

#[cfg(feature = "op_trace")]
#[inline]
fn op_trace(name: &str, opcode: Opcode, cpu: &Chip8Cpu) {
    log::trace!(
        "{:04X}: {:7} {} I={:04X} V={:02X?}",
        cpu.current_pc(),
        name,
        opcode,
        cpu.address,
        cpu.registers
    );
}

#[cfg(not(feature = "op_trace"))]
#[inline]
fn op_trace(_: &str, _: Opcode, _: &Chip8Cpu) {}

#[cfg(test)]
mod test {
    use super::*;
    use crate::conf::Quirks;

    fn vm_with(conf: Chip8Conf, program: &[u8]) -> Chip8Vm {
        let mut vm = Chip8Vm::new(conf);
        vm.load_program(program).unwrap();
        vm
    }

    /// Fx0A (LD Vx, K)
    ///
    /// Wait for a keypress, then store the key value in Vx.
    /// The VM must stall while waiting, and signal the state to the outer executer.
    #[test]
    #[rustfmt::skip]
    fn test_key_wait() {
        let mut vm = vm_with(Chip8Conf::default(), &[
            0xF1, 0x0A, // LD v1, K
            0x62, 0x42, // LD v2, 0x42  ; sentinal
        ]);

        // machine must stall
        assert_eq!(vm.step().unwrap(), Flow::KeyWait);
        assert_eq!(vm.cpu.state, RunState::WaitingForKey { register: 1 });
        for _ in 0..5 {
            assert_eq!(vm.step().unwrap(), Flow::KeyWait);
            assert_eq!(vm.cpu.pc, 0x202);
        }

        // release does not resume
        vm.set_key(None);
        assert_eq!(vm.step().unwrap(), Flow::KeyWait);

        // machine has yielded, waiting for any key to be pressed.
        vm.set_key(Some(KeyCode::Key5));
        assert_eq!(vm.cpu.state, RunState::Running);
        assert_eq!(vm.cpu.registers[1], 0x05);

        // Ensure the machine is continuing
        assert_eq!(vm.step().unwrap(), Flow::Ok);
        assert_eq!(vm.cpu.pc, 0x204);
        assert_eq!(vm.cpu.registers[2], 0x42); // sentinal
    }

    #[test]
    fn test_key_wait_with_key_held() {
        let mut vm = vm_with(Chip8Conf::default(), &[0xF3, 0x0A]);
        vm.set_key(Some(KeyCode::KeyB));

        assert_eq!(vm.step().unwrap(), Flow::Ok);
        assert_eq!(vm.cpu.registers[3], 0xB);
        assert_eq!(vm.cpu.state, RunState::Running);
    }

    /// Booleans must be cast to u8 1 or 0
    #[test]
    fn test_assert_bool_cast() {
        assert_eq!(true as u8, 1);
        assert_eq!(false as u8, 0);
    }

    #[test]
    #[rustfmt::skip]
    fn test_draw_collision() {
        // Draw two pixels next to each other.
        // The zero bits of the second draw must not erase
        // the pixels of the first draw
        //
        // draw sprite 1
        // ____####, vf == 0
        //
        // draw sprite 2
        // ########, vf == 0
        let mut vm = vm_with(Chip8Conf::default(), &[
            0xA2, 0x0C, // LD I, .sprite
            0x60, 0x04, // LD v0, 4
            0x61, 0x00, // LD v1, 0
            0xD0, 0x11, // DRW v0, v1, 1
            0x60, 0x00, // LD v0, 0
            0xD0, 0x11, // DRW v0, v1, 1
            // .sprite
            0b11110000,
            0b00000000,
        ]);

        vm.run_steps(6).unwrap();

        assert!(vm.framebuffer()[0]); // sprite 2
        assert!(vm.framebuffer()[3]); // sprite 2
        assert!(vm.framebuffer()[4]); // sprite 1
        assert!(vm.framebuffer()[7]); // sprite 1
        assert!(!vm.framebuffer()[8]);
        assert_eq!(vm.cpu.registers[0xF], 0);

        // overlap erases
        vm.execute(0xD011).unwrap();
        assert!(!vm.framebuffer()[0]);
        assert_eq!(vm.cpu.registers[0xF], 1);
    }

    #[test]
    fn test_draw_clips_at_edges() {
        let mut vm = vm_with(Chip8Conf::default(), &[]);
        vm.cpu.address = FONTSET_START; // glyph 0, 5 rows
        vm.cpu.registers[0] = 62 + DISPLAY_WIDTH as u8; // origin wraps
        vm.cpu.registers[1] = 30;

        vm.execute(0xD015).unwrap();

        // 0xF0, 0x90 rows, only two columns and rows visible
        assert!(vm.framebuffer()[62 + 30 * DISPLAY_WIDTH]);
        assert!(vm.framebuffer()[63 + 30 * DISPLAY_WIDTH]);
        assert!(vm.framebuffer()[62 + 31 * DISPLAY_WIDTH]);
        assert!(!vm.framebuffer()[63 + 31 * DISPLAY_WIDTH]);
        assert_eq!(vm.framebuffer().iter().filter(|px| **px).count(), 3);

        // nothing wrapped onto the left or top edge
        assert!(!vm.framebuffer()[0]);
        assert!(!vm.framebuffer()[30 * DISPLAY_WIDTH]);
    }

    #[test]
    fn test_flag_written_after_result() {
        let mut vm = vm_with(Chip8Conf::default(), &[]);

        // 8FE4 (ADD VF, VE)
        vm.cpu.registers[0xF] = 0xFF;
        vm.cpu.registers[0xE] = 0x02;
        vm.execute(0x8FE4).unwrap();
        assert_eq!(vm.cpu.registers[0xF], 1);

        // 8F05 (SUB VF, V0), 0x10 - 0x20 borrows
        vm.cpu.registers[0xF] = 0x10;
        vm.cpu.registers[0x0] = 0x20;
        vm.execute(0x8F05).unwrap();
        assert_eq!(vm.cpu.registers[0xF], 0);

        // 8FF6 (SHR VF, VF)
        vm.cpu.registers[0xF] = 0b11;
        vm.execute(0x8FF6).unwrap();
        assert_eq!(vm.cpu.registers[0xF], 1);
    }

    #[test]
    fn test_jump_offset_quirks() {
        let mut vm = vm_with(Chip8Conf::default(), &[]);
        vm.cpu.registers[0] = 0x10;
        vm.cpu.registers[3] = 0x20;
        assert_eq!(vm.execute(0xB300).unwrap(), Flow::Jump);
        assert_eq!(vm.cpu.pc, 0x300);

        let conf = Chip8Conf {
            quirks: Quirks {
                jump_adds_vx: true,
                ..Quirks::default()
            },
            ..Chip8Conf::default()
        };
        let mut vm = vm_with(conf, &[]);
        vm.cpu.registers[0] = 0x10;
        vm.cpu.registers[3] = 0x20;
        vm.execute(0xB300).unwrap();
        assert_eq!(vm.cpu.pc, 0x320);

        let conf = Chip8Conf {
            quirks: Quirks {
                jump_base_v0: true,
                ..Quirks::default()
            },
            ..Chip8Conf::default()
        };
        let mut vm = vm_with(conf, &[]);
        vm.cpu.registers[0] = 0x10;
        vm.cpu.registers[3] = 0x20;
        vm.execute(0xB300).unwrap();
        assert_eq!(vm.cpu.pc, 0x310);
    }

    #[test]
    fn test_fault_halts_machine() {
        let mut vm = vm_with(Chip8Conf::default(), &[0x00, 0xEE, 0x60, 0x01]);

        assert!(matches!(
            vm.step(),
            Err(Chip8Error::StackUnderflow { pc: 0x200 })
        ));
        assert_eq!(vm.state(), RunState::Faulted);
        assert!(matches!(vm.step(), Err(Chip8Error::Halted)));
        assert_eq!(vm.cpu.registers[0], 0);

        vm.reset();
        assert_eq!(vm.state(), RunState::Running);
        assert_eq!(vm.pc(), 0x200);
    }

    #[test]
    fn test_dump_display() {
        let mut vm = vm_with(Chip8Conf::default(), &[]);
        vm.cpu.display[1] = true;

        let dump = vm.dump_display().unwrap();
        let mut lines = dump.lines();
        assert_eq!(lines.next().unwrap(), format!(".#{}", ".".repeat(62)));
        assert_eq!(dump.lines().count(), DISPLAY_HEIGHT);
    }
}
