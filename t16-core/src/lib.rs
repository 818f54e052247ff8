// Clippy rules to disable.
#![allow(clippy::new_without_default)]

pub mod alu;
pub mod asm;
pub mod bus;
pub mod cpu_16;
pub mod image;
pub mod opcodes;
