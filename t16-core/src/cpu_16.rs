//! The T16 processor core: register file, program counter, flags, and the
//! fetch/decode/execute loop.

use colored::*;

use crate::alu::Flags;
use crate::bus::Bus;
use crate::opcodes::{self, OpCode};

pub mod opcodes_alu;
pub mod opcodes_jump;
pub mod opcodes_move;

#[cfg(test)]
mod test_helpers;

// Test must be after test_helpers, rust format tries to move things around.
#[cfg(test)]
mod test;

/// Index of the stack pointer in the register file. There is no separate
/// name at the hardware level; `R[7]` is it.
pub const SP: usize = 7;

/// Where `reset` parks the stack pointer: below the device window and
/// below typical code, leaving room for the downward-growing stack.
pub const RESET_SP: u16 = 0xF000;

pub struct Cpu16 {
    /// The bus holds all of memory and the device window.
    pub bus: Bus,

    /// The register file. All eight are general purpose; `r[SP]` doubles
    /// as the stack pointer for PUSH/POP/CALL/RET.
    pub r: [u16; 8],

    /// Program counter, in words. Starts at 0 after reset.
    pub pc: u16,

    /// Z, N, C, V. Z and N track every register write; C and V are only
    /// touched by the arithmetic, shift, compare, and multiply paths.
    pub flags: Flags,

    /// Set by HALT and by an undecodable instruction word.
    pub halted: bool,

    /// Populated when the machine stopped on an undecodable word. The PC
    /// is left pointing at the faulting instruction.
    pub error: Option<String>,

    /// Counts every fetch, memory transaction, and register write. The
    /// TIMER device exposes its low 16 bits.
    pub cycles: u64,

    /// Print one state line per executed instruction to stderr.
    pub trace: bool,

    /// Number of instructions executed so far.
    pub tick_count: u64,

    // Stop running after so many instructions. Useful for testing.
    pub max_ticks: Option<u64>,
}

impl Cpu16 {
    pub fn new(bus: Bus) -> Cpu16 {
        Cpu16 {
            bus,
            r: reset_registers(),
            pc: 0,
            flags: Flags::default(),
            halted: false,
            error: None,
            cycles: 0,
            trace: false,
            tick_count: 0,
            max_ticks: None,
        }
    }

    /// Return the machine to its power-on state. Memory is left alone;
    /// [`Cpu16::load`] overlays the program afterwards.
    pub fn reset(&mut self) {
        self.r = reset_registers();
        self.pc = 0;
        self.flags.clear();
        self.halted = false;
        self.error = None;
        self.cycles = 0;
        self.tick_count = 0;
    }

    /// Copy an image into memory starting at `base`, truncating at the
    /// top of the address space.
    pub fn load(&mut self, words: &[u16], base: u16) {
        self.bus.load(words, base);
    }

    /// Run until the machine halts, either through HALT or an
    /// undecodable instruction word.
    pub fn run(&mut self) {
        while !self.halted {
            self.tick();

            // If there is a max ticks counter, respect it.
            if let Some(max_ticks) = self.max_ticks {
                if self.tick_count >= max_ticks {
                    break;
                }
            }
        }
    }

    /// This function is useful for testing the emulator. It will only run
    /// while the predicate is true and the machine has not halted.
    pub fn run_until<F>(&mut self, predicate: F)
    where
        F: Fn(&Cpu16) -> bool,
    {
        while !predicate(self) && !self.halted {
            self.tick();
        }
    }

    /// Execute one instruction, then give the devices their post-step to
    /// drain any armed string print.
    pub fn tick(&mut self) {
        if self.halted {
            return;
        }
        self.tick_count += 1;

        let instruction_pc = self.pc;
        let word = self.next_word();
        let (bits, rd, rs) = opcodes::decode(word);
        let opcode = match OpCode::from_bits(bits) {
            Some(opcode) => opcode,
            None => {
                // Leave the PC pointing at the faulting word so the state
                // can be inspected.
                self.pc = instruction_pc;
                self.halted = true;
                self.error = Some(format!(
                    "undecodable opcode {:#04x} at {:#06x}",
                    bits, instruction_pc
                ));
                return;
            }
        };
        let rd = rd as usize;
        let rs = rs as usize;

        use OpCode::*;
        match opcode {
            NOP => {}
            MOV => opcodes_move::mov(self, rd, rs),
            ADD => opcodes_alu::add(self, rd, rs),
            SUB => opcodes_alu::sub(self, rd, rs),
            AND => opcodes_alu::and(self, rd, rs),
            OR => opcodes_alu::or(self, rd, rs),
            XOR => opcodes_alu::xor(self, rd, rs),
            NOT => opcodes_alu::not(self, rd),
            SHL => opcodes_alu::shl(self, rd, rs),
            SHR => opcodes_alu::shr(self, rd, rs),
            CMP => opcodes_alu::cmp(self, rd, rs),
            PUSH => opcodes_move::push(self, rs),
            POP => opcodes_move::pop(self, rd),
            LD_ABS => opcodes_move::ld_abs(self, rd),
            ST_ABS => opcodes_move::st_abs(self, rs),
            LDI => opcodes_move::ldi(self, rd),
            JMP => opcodes_jump::jmp(self),
            JZ => opcodes_jump::jz(self),
            JNZ => opcodes_jump::jnz(self),
            JC => opcodes_jump::jc(self),
            JN => opcodes_jump::jn(self),
            CALL => opcodes_jump::call(self),
            RET => opcodes_jump::ret(self),
            HALT => opcodes_jump::halt(self),
            LD_IND => opcodes_move::ld_ind(self, rd, rs),
            ST_IND => opcodes_move::st_ind(self, rd, rs),
            LEA => opcodes_move::lea(self, rd),
            ADDI => opcodes_alu::addi(self, rd),
            SUBI => opcodes_alu::subi(self, rd),
            MUL => opcodes_alu::mul(self, rd, rs),
        }

        if self.trace {
            self.print_trace(instruction_pc);
        }

        self.bus.drain();
    }

    /// Fetch the word at the PC and advance. Used for the instruction
    /// word and for payload words; each fetch is a memory transaction.
    pub(crate) fn next_word(&mut self) -> u16 {
        let value = self.read_mem(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    pub(crate) fn read_mem(&mut self, address: u16) -> u16 {
        self.cycles += 1;
        self.bus.read(address, self.cycles)
    }

    pub(crate) fn write_mem(&mut self, address: u16, value: u16) {
        self.cycles += 1;
        self.bus.write(address, value);
    }

    /// Every destination write funnels through here: Z and N always track
    /// the stored value, and the write costs one cycle.
    pub(crate) fn write_reg(&mut self, rd: usize, value: u16) {
        self.r[rd] = value;
        self.flags.set_zn(value);
        self.cycles += 1;
    }

    fn print_trace(&self, at: u16) {
        let disasm =
            opcodes::disassemble(self.bus.peek(at), self.bus.peek(at.wrapping_add(1)));
        let flags = format!(
            "{}{}{}{}",
            if self.flags.z { 'Z' } else { '-' },
            if self.flags.n { 'N' } else { '-' },
            if self.flags.c { 'C' } else { '-' },
            if self.flags.v { 'V' } else { '-' },
        );
        eprintln!(
            "{} {:<18} r0={:04X} r1={:04X} r2={:04X} r3={:04X} r4={:04X} r5={:04X} r6={:04X} sp={:04X} {} cy={}",
            format!("{:04X}", at).cyan(),
            disasm,
            self.r[0],
            self.r[1],
            self.r[2],
            self.r[3],
            self.r[4],
            self.r[5],
            self.r[6],
            self.r[SP],
            flags.bright_white(),
            self.cycles,
        );
    }
}

fn reset_registers() -> [u16; 8] {
    let mut r = [0; 8];
    r[SP] = RESET_SP;
    r
}
