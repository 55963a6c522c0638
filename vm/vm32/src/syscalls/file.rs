//! File-operation syscalls.
//!
//! The VM has no file system; these return synthetic results so that
//! guest programs written against the full convention still run.
//! open(R0 path, R5 flags) hands out a fixed descriptor, read reports
//! end-of-file, write claims the whole buffer was taken.

use super::{REG_ARG0, REG_ARG2, SYS_CLOSE, SYS_FILE_READ, SYS_FILE_WRITE, SYS_OPEN};
use crate::errors::VmError;
use crate::machine::Vm;

/// The descriptor every open "file" gets.
const STUB_FD: u32 = 3;

pub(super) fn handle(vm: &mut Vm, number: u16) -> Result<(), VmError> {
    match number {
        SYS_OPEN => {
            log::debug!("file open stubbed, handing out fd {STUB_FD}");
            vm.cpu.regs[REG_ARG0] = STUB_FD;
        }
        SYS_CLOSE => {
            vm.cpu.regs[REG_ARG0] = 0;
        }
        SYS_FILE_READ => {
            vm.cpu.regs[REG_ARG0] = 0;
        }
        SYS_FILE_WRITE => {
            vm.cpu.regs[REG_ARG0] = vm.cpu.regs[REG_ARG2];
        }
        _ => return Err(VmError::InvalidSyscall { number }),
    }
    Ok(())
}
