//! Host services reached through SYSCALL.
//!
//! Convention: syscall number in the instruction immediate, arguments
//! in R0/R5/R6/R7, result in R0, error indicator in R5 (0 on success,
//! 1 for an unknown syscall). The number space is carved into
//! categories of ten.

mod console;
mod file;
mod memory;
mod process;
mod random;

use crate::errors::VmError;
use crate::machine::Vm;

pub(crate) use random::{Lcg, DEFAULT_SEED};

// Console I/O
pub const SYS_PRINT_CHAR: u16 = 0;
pub const SYS_PRINT_INT: u16 = 1;
pub const SYS_PRINT_STRING: u16 = 2;
pub const SYS_PRINT_HEX: u16 = 3;
pub const SYS_PRINT_BASE: u16 = 4;
pub const SYS_READ_CHAR: u16 = 5;
pub const SYS_READ_LINE: u16 = 6;
pub const SYS_CLEAR_SCREEN: u16 = 7;
pub const SYS_SET_COLOR: u16 = 8;
// File operations (stubbed)
pub const SYS_OPEN: u16 = 10;
pub const SYS_CLOSE: u16 = 11;
pub const SYS_FILE_READ: u16 = 12;
pub const SYS_FILE_WRITE: u16 = 13;
// Memory
pub const SYS_ALLOC: u16 = 20;
pub const SYS_FREE: u16 = 21;
pub const SYS_COPY: u16 = 22;
pub const SYS_SEGMENT_BASE: u16 = 23;
pub const SYS_SEGMENT_SIZE: u16 = 24;
// Process
pub const SYS_EXIT: u16 = 30;
pub const SYS_SLEEP: u16 = 31;
pub const SYS_TIME: u16 = 32;
pub const SYS_PERF: u16 = 33;
// Random
pub const SYS_SEED: u16 = 40;
pub const SYS_RANDOM: u16 = 41;
pub const SYS_RANDOM_BOUNDED: u16 = 42;

/// R0 doubles as first argument and result.
pub(crate) const REG_ARG0: usize = 0;
pub(crate) const REG_ARG1: usize = 5;
pub(crate) const REG_ARG2: usize = 6;
#[allow(dead_code)]
pub(crate) const REG_ARG3: usize = 7;
/// R5 carries the error indicator on return.
pub(crate) const REG_ERR: usize = 5;

pub(crate) fn dispatch(vm: &mut Vm, number: u16) -> Result<(), VmError> {
    log::debug!("handling syscall {number}");
    let result = match number {
        0..=9 => console::handle(vm, number),
        10..=19 => file::handle(vm, number),
        20..=29 => memory::handle(vm, number),
        30..=39 => process::handle(vm, number),
        40..=49 => random::handle(vm, number),
        _ => Err(VmError::InvalidSyscall { number }),
    };
    match result {
        Ok(()) => {
            vm.cpu.regs[REG_ERR] = 0;
            Ok(())
        }
        Err(error @ VmError::InvalidSyscall { .. }) => {
            log::warn!("guest invoked unknown syscall {number}");
            vm.cpu.regs[REG_ERR] = 1;
            Err(error)
        }
        Err(error) => Err(error),
    }
}
