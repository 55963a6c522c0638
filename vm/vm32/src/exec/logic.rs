//! Logic group: bitwise operations, shifts, rotates and TEST.
//!
//! Plain bitwise operations update Zero and Negative only. Shifts and
//! rotates additionally latch the last bit moved out (or around) into
//! Carry, each per its own rule.

use super::{read_operand, Slot};
use crate::cpu::StatusFlags;
use crate::decode::Instruction;
use crate::errors::VmError;
use crate::machine::Vm;

fn bitwise(
    vm: &mut Vm,
    ins: &Instruction,
    apply: impl Fn(u32, u32) -> u32,
) -> Result<(), VmError> {
    let a = vm.cpu.regs[ins.reg1 as usize];
    let b = read_operand(vm, ins, Slot::Second)?;
    let result = apply(a, b);
    vm.cpu.set_zero_negative(result);
    vm.cpu.regs[ins.reg1 as usize] = result;
    Ok(())
}

pub(super) fn and(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    bitwise(vm, ins, |a, b| a & b)
}

pub(super) fn or(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    bitwise(vm, ins, |a, b| a | b)
}

pub(super) fn xor(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    bitwise(vm, ins, |a, b| a ^ b)
}

pub(super) fn not(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let result = !vm.cpu.regs[ins.reg1 as usize];
    vm.cpu.set_zero_negative(result);
    vm.cpu.regs[ins.reg1 as usize] = result;
    Ok(())
}

/// SHL: Carry takes bit (32 - count) of the pre-shift value.
pub(super) fn shl(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let a = vm.cpu.regs[ins.reg1 as usize];
    let count = read_operand(vm, ins, Slot::Second)?;
    let result = if count >= 32 { 0 } else { a << count };
    if count > 0 {
        let carry = count <= 32 && (a >> (32 - count)) & 1 == 1;
        vm.cpu.set_flag(StatusFlags::CARRY, carry);
    }
    vm.cpu.set_zero_negative(result);
    vm.cpu.regs[ins.reg1 as usize] = result;
    Ok(())
}

/// SHR: Carry takes bit (count - 1) of the pre-shift value.
pub(super) fn shr(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let a = vm.cpu.regs[ins.reg1 as usize];
    let count = read_operand(vm, ins, Slot::Second)?;
    let result = if count >= 32 { 0 } else { a >> count };
    if count > 0 {
        let carry = count <= 32 && (a >> (count - 1)) & 1 == 1;
        vm.cpu.set_flag(StatusFlags::CARRY, carry);
    }
    vm.cpu.set_zero_negative(result);
    vm.cpu.regs[ins.reg1 as usize] = result;
    Ok(())
}

/// SAR: like SHR but the sign bit back-fills; counts past 31 saturate
/// to the sign extension.
pub(super) fn sar(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let a = vm.cpu.regs[ins.reg1 as usize];
    let count = read_operand(vm, ins, Slot::Second)?;
    let effective = count.min(32);
    let result = if effective == 32 {
        ((a as i32) >> 31) as u32
    } else {
        ((a as i32) >> effective) as u32
    };
    if count > 0 {
        let carry = (a >> (effective - 1)) & 1 == 1;
        vm.cpu.set_flag(StatusFlags::CARRY, carry);
    }
    vm.cpu.set_zero_negative(result);
    vm.cpu.regs[ins.reg1 as usize] = result;
    Ok(())
}

/// ROL: Carry takes the low bit of the rotated result.
pub(super) fn rol(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let a = vm.cpu.regs[ins.reg1 as usize];
    let count = read_operand(vm, ins, Slot::Second)?;
    let result = a.rotate_left(count);
    vm.cpu.set_flag(StatusFlags::CARRY, result & 1 == 1);
    vm.cpu.set_zero_negative(result);
    vm.cpu.regs[ins.reg1 as usize] = result;
    Ok(())
}

/// ROR: Carry takes the high bit of the rotated result.
pub(super) fn ror(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let a = vm.cpu.regs[ins.reg1 as usize];
    let count = read_operand(vm, ins, Slot::Second)?;
    let result = a.rotate_right(count);
    vm.cpu.set_flag(StatusFlags::CARRY, result & 0x8000_0000 != 0);
    vm.cpu.set_zero_negative(result);
    vm.cpu.regs[ins.reg1 as usize] = result;
    Ok(())
}

/// TEST is AND without the store; Carry and Overflow are untouched.
pub(super) fn test(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let a = vm.cpu.regs[ins.reg1 as usize];
    let b = read_operand(vm, ins, Slot::Second)?;
    vm.cpu.set_zero_negative(a & b);
    Ok(())
}
