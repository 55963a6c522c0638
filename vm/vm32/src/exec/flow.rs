//! Control flow: jumps, the call/return pair and LOOP.

use super::{read_operand, Slot};
use crate::cpu::{StatusFlags, R_SP};
use crate::decode::Instruction;
use crate::errors::VmError;
use crate::machine::Vm;

/// Conditional transfer. The PC has already been advanced past this
/// instruction, so a not-taken branch simply falls through.
pub(super) fn branch(
    vm: &mut Vm,
    ins: &Instruction,
    condition: impl Fn(StatusFlags) -> bool,
) -> Result<(), VmError> {
    if condition(vm.cpu.flags()) {
        let target = read_operand(vm, ins, Slot::First)?;
        vm.cpu.set_pc(target);
    }
    Ok(())
}

/// CALL pushes the already-advanced PC, which is exactly the return
/// address.
pub(super) fn call(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let target = read_operand(vm, ins, Slot::First)?;
    let return_pc = vm.cpu.pc();
    vm.cpu.push(&mut vm.mem, return_pc)?;
    vm.cpu.set_pc(target);
    Ok(())
}

/// RET pops the return PC; a non-zero immediate additionally drops
/// that many argument bytes from the stack.
pub(super) fn ret(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let return_pc = vm.cpu.pop(&vm.mem)?;
    vm.cpu.set_pc(return_pc);
    if ins.immediate > 0 {
        vm.cpu.regs[R_SP] += ins.immediate as u32;
    }
    Ok(())
}

/// LOOP: decrement the counter register and branch while it is
/// non-zero.
pub(super) fn loop_dec(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let counter = vm.cpu.regs[ins.reg1 as usize].wrapping_sub(1);
    vm.cpu.regs[ins.reg1 as usize] = counter;
    if counter != 0 {
        let target = read_operand(vm, ins, Slot::Second)?;
        vm.cpu.set_pc(target);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::cpu::{StatusFlags, R_SP};
    use crate::decode::{Instruction, Opcode};
    use crate::machine::Vm;
    use segmem::STACK_TOP;

    fn exec(vm: &mut Vm, ins: Instruction) {
        crate::exec::dispatch(vm, &ins).unwrap();
    }

    #[test]
    fn conditional_jumps_read_their_flags() {
        let mut vm = Vm::new();
        vm.cpu.set_pc(0x100);

        exec(&mut vm, Instruction::imm(Opcode::Jz, 0, 0x200));
        assert_eq!(vm.cpu.pc(), 0x100, "Z clear, JZ must fall through");

        vm.cpu.set_flag(StatusFlags::ZERO, true);
        exec(&mut vm, Instruction::imm(Opcode::Jz, 0, 0x200));
        assert_eq!(vm.cpu.pc(), 0x200);

        // JP is strictly positive: neither negative nor zero.
        exec(&mut vm, Instruction::imm(Opcode::Jp, 0, 0x300));
        assert_eq!(vm.cpu.pc(), 0x200);
        vm.cpu.set_flag(StatusFlags::ZERO, false);
        exec(&mut vm, Instruction::imm(Opcode::Jp, 0, 0x300));
        assert_eq!(vm.cpu.pc(), 0x300);

        // JBE takes carry or zero; JA the complement.
        vm.cpu.set_flag(StatusFlags::CARRY, true);
        exec(&mut vm, Instruction::imm(Opcode::Ja, 0, 0x400));
        assert_eq!(vm.cpu.pc(), 0x300);
        exec(&mut vm, Instruction::imm(Opcode::Jbe, 0, 0x400));
        assert_eq!(vm.cpu.pc(), 0x400);
    }

    #[test]
    fn jump_through_a_register() {
        let mut vm = Vm::new();
        vm.cpu.regs[7] = 0x123;
        exec(&mut vm, Instruction::reg(Opcode::Jmp, 7, 0));
        assert_eq!(vm.cpu.pc(), 0x123);
    }

    #[test]
    fn call_ret_round_trip() {
        let mut vm = Vm::new();
        vm.cpu.set_pc(0x104); // as left by the engine after fetch
        exec(&mut vm, Instruction::imm(Opcode::Call, 0, 0x800));
        assert_eq!(vm.cpu.pc(), 0x800);
        assert_eq!(vm.cpu.regs[R_SP], STACK_TOP - 4);

        exec(&mut vm, Instruction::imm(Opcode::Ret, 0, 0));
        assert_eq!(vm.cpu.pc(), 0x104);
        assert_eq!(vm.cpu.regs[R_SP], STACK_TOP);
    }

    #[test]
    fn ret_with_immediate_drops_arguments() {
        let mut vm = Vm::new();
        vm.cpu.push(&mut vm.mem, 0xAAAA).unwrap(); // fake argument
        vm.cpu.set_pc(0x104);
        exec(&mut vm, Instruction::imm(Opcode::Call, 0, 0x800));
        exec(&mut vm, Instruction::imm(Opcode::Ret, 0, 4));
        assert_eq!(vm.cpu.pc(), 0x104);
        assert_eq!(vm.cpu.regs[R_SP], STACK_TOP);
    }

    #[test]
    fn loop_counts_down_to_zero() {
        let mut vm = Vm::new();
        vm.cpu.regs[5] = 3;
        vm.cpu.set_pc(0x10);

        exec(&mut vm, Instruction::imm(Opcode::Loop, 5, 0x4));
        assert_eq!((vm.cpu.regs[5], vm.cpu.pc()), (2, 0x4));
        exec(&mut vm, Instruction::imm(Opcode::Loop, 5, 0x4));
        assert_eq!((vm.cpu.regs[5], vm.cpu.pc()), (1, 0x4));

        vm.cpu.set_pc(0x10);
        exec(&mut vm, Instruction::imm(Opcode::Loop, 5, 0x4));
        assert_eq!((vm.cpu.regs[5], vm.cpu.pc()), (0, 0x10), "exhausted LOOP falls through");
    }
}
