//! Software interrupt vectoring.
//!
//! The vector table is ordinary guest memory: 32 dword entries in a
//! reserved region at the bottom of the code segment. Guest code
//! installs a handler by writing its address into a slot; a zero slot
//! means no handler.

use crate::cpu::{StatusFlags, R_SR};
use crate::errors::VmError;
use crate::machine::Vm;

pub const VECTOR_TABLE_BASE: u32 = 0x0000;
pub const VECTOR_COUNT: u8 = 32;

/// INT: save flags and the return PC on the stack, mask further
/// interrupts and vector to the handler.
pub(crate) fn raise(vm: &mut Vm, vector: u8) -> Result<(), VmError> {
    if !vm.cpu.flag(StatusFlags::INTERRUPT) {
        return Err(VmError::NestedInterrupt { vector });
    }
    if vector >= VECTOR_COUNT {
        return Err(VmError::UnhandledInterrupt { vector });
    }
    let handler = vm.mem.fetch(VECTOR_TABLE_BASE + vector as u32 * 4)?;
    if handler == 0 {
        return Err(VmError::UnhandledInterrupt { vector });
    }
    let flags = vm.cpu.regs[R_SR];
    vm.cpu.push(&mut vm.mem, flags)?;
    let return_pc = vm.cpu.pc();
    vm.cpu.push(&mut vm.mem, return_pc)?;
    vm.cpu.set_flag(StatusFlags::INTERRUPT, false);
    vm.cpu.set_pc(handler);
    log::debug!("interrupt {vector} vectored to {handler:#06x}");
    Ok(())
}

/// IRET: pop the return PC, then the saved flags.
pub(crate) fn iret(vm: &mut Vm) -> Result<(), VmError> {
    let return_pc = vm.cpu.pop(&vm.mem)?;
    let flags = vm.cpu.pop(&vm.mem)?;
    vm.cpu.regs[R_SR] = flags;
    vm.cpu.set_pc(return_pc);
    Ok(())
}
