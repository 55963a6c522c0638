//! System group: halting, syscall and interrupt entry points, flag
//! switches, reset and the debug latch.

use super::{read_operand, Slot};
use crate::cpu::StatusFlags;
use crate::decode::Instruction;
use crate::errors::VmError;
use crate::machine::Vm;
use crate::{interrupts, syscalls};

pub(super) fn halt(vm: &mut Vm) -> Result<(), VmError> {
    vm.cpu.halted = true;
    Ok(())
}

pub(super) fn syscall(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    syscalls::dispatch(vm, ins.immediate)
}

pub(super) fn int(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let vector = read_operand(vm, ins, Slot::First)? as u8;
    interrupts::raise(vm, vector)
}

pub(super) fn iret(vm: &mut Vm) -> Result<(), VmError> {
    interrupts::iret(vm)
}

pub(super) fn cli(vm: &mut Vm) -> Result<(), VmError> {
    vm.cpu.set_flag(StatusFlags::INTERRUPT, false);
    Ok(())
}

pub(super) fn sti(vm: &mut Vm) -> Result<(), VmError> {
    vm.cpu.set_flag(StatusFlags::INTERRUPT, true);
    Ok(())
}

pub(super) fn reset(vm: &mut Vm) -> Result<(), VmError> {
    vm.reset();
    Ok(())
}

/// DEBUG flips the externally observable debug latch; execution
/// continues.
pub(super) fn debug(vm: &mut Vm) -> Result<(), VmError> {
    vm.debug_mode = true;
    log::debug!("guest enabled debug mode");
    Ok(())
}
