//! Data transfer: loads, stores, register moves, address material and
//! port I/O.

use super::{effective_addr, invalid, read_operand_sized, Slot, Width};
use crate::decode::{AddrMode, Instruction};
use crate::errors::VmError;
use crate::machine::Vm;

pub(super) fn load(vm: &mut Vm, ins: &Instruction, width: Width) -> Result<(), VmError> {
    let value = read_operand_sized(vm, ins, Slot::Second, width)?;
    vm.cpu.regs[ins.reg1 as usize] = value;
    Ok(())
}

/// Store the low bits of `R[reg1]` through the mode-resolved
/// destination address.
pub(super) fn store(vm: &mut Vm, ins: &Instruction, width: Width) -> Result<(), VmError> {
    let addr = effective_addr(vm, ins, Slot::Second)?;
    let value = vm.cpu.regs[ins.reg1 as usize];
    match width {
        Width::Byte => vm.mem.write_u8(addr, value as u8)?,
        Width::Word => vm.mem.write_u16(addr, value as u16)?,
        Width::Dword => vm.mem.write_u32(addr, value)?,
    }
    Ok(())
}

/// MOVE is the register-only transfer.
pub(super) fn move_registers(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    if ins.mode != AddrMode::Reg as u8 {
        return Err(invalid(ins));
    }
    vm.cpu.regs[ins.reg1 as usize] = vm.cpu.regs[ins.reg2 as usize];
    Ok(())
}

/// LEA materializes the effective address without dereferencing it.
pub(super) fn lea(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let addr = effective_addr(vm, ins, Slot::Second)?;
    vm.cpu.regs[ins.reg1 as usize] = addr as u32;
    Ok(())
}

pub(super) fn port_in(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let value = vm.port_read(ins.immediate)?;
    vm.cpu.regs[ins.reg1 as usize] = value;
    Ok(())
}

pub(super) fn port_out(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let value = vm.cpu.regs[ins.reg1 as usize];
    vm.port_write(ins.immediate, value)
}
