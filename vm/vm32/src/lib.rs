//! A small register-based virtual machine over segmented memory.
//!
//! The engine executes fixed-width 32-bit instructions against
//! sixteen registers and a 64 KiB address space split into code,
//! data, stack and heap segments, with a first-fit allocator managing
//! per-block protection inside the heap. Faults carry a stable error
//! code plus the PC of the offending instruction so external tooling
//! (debugger, disassembler) can localize them.
//!
//! The crate is library-first: [`Vm`] is the embedding surface, the
//! `vm32` binary is a thin host runner around it.

pub mod cpu;
pub mod decode;
pub mod errors;
pub mod interrupts;
pub mod logging;
pub mod ports;
pub mod syscalls;

mod console;
mod exec;
mod loader;
mod machine;

pub use console::Console;
pub use machine::{Fault, Vm};
