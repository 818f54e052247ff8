use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::asm;
use crate::bus::Bus;
use crate::cpu_16::Cpu16;

/// A clonable sink: the bus owns one handle as its output device while the
/// test keeps another to read back what the program printed.
#[derive(Clone, Default)]
pub struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl SharedOutput {
    pub fn new() -> SharedOutput {
        SharedOutput::default()
    }

    pub fn as_string(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("device output was not UTF-8")
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn captured_cpu() -> (Cpu16, SharedOutput) {
    let output = SharedOutput::new();
    let cpu = Cpu16::new(Bus::with_output(Box::new(output.clone())));
    (cpu, output)
}

/// Assemble the program, run it to a halt, and hand back the machine plus
/// everything it printed.
pub fn run_program(text: &str) -> (Cpu16, SharedOutput) {
    let (mut cpu, output) = captured_cpu();
    match asm::assemble(text) {
        Ok(image) => {
            cpu.load(image.words(), 0);
            // A broken program must not hang the test run.
            cpu.max_ticks = Some(1_000_000);
            cpu.run();
            assert!(cpu.halted, "the program should halt on its own:\n{}", text);
            (cpu, output)
        }
        Err(error) => error.panic_nicely(),
    }
}

pub fn assert_output(text: &str, expected: &str) -> Cpu16 {
    let (cpu, output) = run_program(text);
    assert_eq!(output.as_string(), expected, "\n{}", text);
    cpu
}
