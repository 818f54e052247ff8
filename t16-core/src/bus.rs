//! The memory bus: a 64K-word store with the device window overlaid on
//! the top page. Accesses inside the window are routed to the devices and
//! never touch the underlying storage, with one exception: the string
//! printer reads the storage back for the characters it emits.

use std::io::{self, Write};

/// Addresses of the memory-mapped device registers.
pub mod mmio {
    /// Everything from here up is routed to the device layer.
    pub const WINDOW_BASE: u16 = 0xFF00;
    /// Write-only: emits the low 8 bits of the word as one character.
    pub const TX_CHAR: u16 = 0xFF00;
    /// A write latches the address of a zero-terminated string. The
    /// characters are emitted after the storing instruction completes.
    pub const TX_STR_ADDR: u16 = 0xFF10;
    /// Write-only: emits the word as unsigned decimal plus a newline.
    pub const TX_INT: u16 = 0xFF12;
    /// Read returns the low 16 bits of the cycle counter.
    pub const TIMER: u16 = 0xFF20;
}

pub struct Bus {
    memory: Box<[u16]>,
    /// Latched by a write to `TX_STR_ADDR`; drained once per instruction.
    pending_str: Option<u16>,
    out: Box<dyn Write>,
}

impl Bus {
    pub fn new() -> Bus {
        Bus::with_output(Box::new(io::stdout()))
    }

    /// A bus whose device output goes to the given sink. Tests use this to
    /// capture what the program printed.
    pub fn with_output(out: Box<dyn Write>) -> Bus {
        Bus {
            memory: vec![0; 0x10000].into_boxed_slice(),
            pending_str: None,
            out,
        }
    }

    /// Word read. Device reads are pure: only `TIMER` observes anything,
    /// and what it observes is the cycle counter passed in by the CPU.
    pub fn read(&self, address: u16, cycles: u64) -> u16 {
        if address >= mmio::WINDOW_BASE {
            return match address {
                mmio::TIMER => cycles as u16,
                _ => 0,
            };
        }
        self.memory[address as usize]
    }

    /// Word write. Writes inside the window reach the devices; the string
    /// printer only latches here, the emission happens in [`Bus::drain`].
    pub fn write(&mut self, address: u16, value: u16) {
        if address >= mmio::WINDOW_BASE {
            match address {
                mmio::TX_CHAR => {
                    self.emit(&[(value & 0xFF) as u8]);
                }
                mmio::TX_STR_ADDR => {
                    self.pending_str = Some(value);
                }
                mmio::TX_INT => {
                    writeln!(self.out, "{}", value)
                        .expect("failed to write to the output device");
                    self.flush();
                }
                _ => {}
            }
            return;
        }
        self.memory[address as usize] = value;
    }

    /// Emit an armed string print, if any. The CPU calls this once after
    /// each executed instruction, which guarantees the program's store to
    /// the string address has completed before any character leaves the
    /// device, and that each arming prints exactly once.
    pub fn drain(&mut self) {
        let start = match self.pending_str.take() {
            Some(start) => start,
            None => return,
        };
        for address in start..=u16::MAX {
            // The scan reads the underlying storage, bypassing the device
            // routing.
            let word = self.memory[address as usize];
            if word == 0 {
                break;
            }
            self.emit(&[(word & 0xFF) as u8]);
        }
    }

    /// Read the underlying storage without device routing. Used by the
    /// memory dump and by tests inspecting machine state.
    pub fn peek(&self, address: u16) -> u16 {
        self.memory[address as usize]
    }

    /// Copy an image into the underlying storage, truncating at the top of
    /// the address space.
    pub fn load(&mut self, words: &[u16], base: u16) {
        let base = base as usize;
        let end = (base + words.len()).min(0x10000);
        self.memory[base..end].copy_from_slice(&words[..end - base]);
    }

    fn emit(&mut self, bytes: &[u8]) {
        self.out
            .write_all(bytes)
            .expect("failed to write to the output device");
        self.flush();
    }

    fn flush(&mut self) {
        self.out
            .flush()
            .expect("failed to flush the output device");
    }
}
