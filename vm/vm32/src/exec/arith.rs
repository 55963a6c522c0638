//! Arithmetic group: add/subtract with and without carry, multiply,
//! divide, modulo, the single-register steps and compare.

use super::{read_operand, Slot};
use crate::cpu::{Cpu, StatusFlags};
use crate::decode::Instruction;
use crate::errors::VmError;
use crate::machine::Vm;

fn sign(value: u32) -> bool {
    value & 0x8000_0000 != 0
}

/// Flag update shared by the additive operations. Carry is the
/// unsigned wrap, overflow the same-signs-flipped rule.
fn set_add_flags(cpu: &mut Cpu, a: u32, b: u32, result: u32, carry: bool) {
    cpu.set_zero_negative(result);
    cpu.set_flag(StatusFlags::CARRY, carry);
    cpu.set_flag(
        StatusFlags::OVERFLOW,
        sign(a) == sign(b) && sign(result) != sign(a),
    );
}

/// Flag update for subtraction and compare. Carry is the unsigned
/// borrow `A < B`.
fn set_sub_flags(cpu: &mut Cpu, a: u32, b: u32, result: u32, borrow: bool) {
    cpu.set_zero_negative(result);
    cpu.set_flag(StatusFlags::CARRY, borrow);
    cpu.set_flag(
        StatusFlags::OVERFLOW,
        sign(a) != sign(b) && sign(result) != sign(a),
    );
}

pub(super) fn add(vm: &mut Vm, ins: &Instruction, with_carry: bool) -> Result<(), VmError> {
    let a = vm.cpu.regs[ins.reg1 as usize];
    let b = read_operand(vm, ins, Slot::Second)?;
    let carry_in = (with_carry && vm.cpu.flag(StatusFlags::CARRY)) as u64;
    let wide = a as u64 + b as u64 + carry_in;
    let result = wide as u32;
    set_add_flags(&mut vm.cpu, a, b, result, wide > u32::MAX as u64);
    vm.cpu.regs[ins.reg1 as usize] = result;
    Ok(())
}

pub(super) fn sub(vm: &mut Vm, ins: &Instruction, with_borrow: bool) -> Result<(), VmError> {
    let a = vm.cpu.regs[ins.reg1 as usize];
    let b = read_operand(vm, ins, Slot::Second)?;
    let borrow_in = (with_borrow && vm.cpu.flag(StatusFlags::CARRY)) as u32;
    let result = a.wrapping_sub(b).wrapping_sub(borrow_in);
    let borrow = (a as u64) < b as u64 + borrow_in as u64;
    set_sub_flags(&mut vm.cpu, a, b, result, borrow);
    vm.cpu.regs[ins.reg1 as usize] = result;
    Ok(())
}

/// Unsigned multiply; the result register keeps the low dword. Carry
/// and overflow report that the product did not fit.
pub(super) fn mul(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let a = vm.cpu.regs[ins.reg1 as usize];
    let b = read_operand(vm, ins, Slot::Second)?;
    let wide = a as u64 * b as u64;
    let result = wide as u32;
    let spilled = wide >> 32 != 0;
    vm.cpu.set_zero_negative(result);
    vm.cpu.set_flag(StatusFlags::CARRY, spilled);
    vm.cpu.set_flag(StatusFlags::OVERFLOW, spilled);
    vm.cpu.regs[ins.reg1 as usize] = result;
    Ok(())
}

pub(super) fn div(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let a = vm.cpu.regs[ins.reg1 as usize];
    let b = read_operand(vm, ins, Slot::Second)?;
    if b == 0 {
        return Err(VmError::DivisionByZero);
    }
    let result = a / b;
    vm.cpu.set_zero_negative(result);
    vm.cpu.regs[ins.reg1 as usize] = result;
    Ok(())
}

pub(super) fn rem(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let a = vm.cpu.regs[ins.reg1 as usize];
    let b = read_operand(vm, ins, Slot::Second)?;
    if b == 0 {
        return Err(VmError::DivisionByZero);
    }
    let result = a % b;
    vm.cpu.set_zero_negative(result);
    vm.cpu.regs[ins.reg1 as usize] = result;
    Ok(())
}

pub(super) fn inc(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let a = vm.cpu.regs[ins.reg1 as usize];
    let result = a.wrapping_add(1);
    set_add_flags(&mut vm.cpu, a, 1, result, result == 0);
    vm.cpu.regs[ins.reg1 as usize] = result;
    Ok(())
}

pub(super) fn dec(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let a = vm.cpu.regs[ins.reg1 as usize];
    let result = a.wrapping_sub(1);
    set_sub_flags(&mut vm.cpu, a, 1, result, a == 0);
    vm.cpu.regs[ins.reg1 as usize] = result;
    Ok(())
}

pub(super) fn neg(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let a = vm.cpu.regs[ins.reg1 as usize];
    let result = 0u32.wrapping_sub(a);
    set_sub_flags(&mut vm.cpu, 0, a, result, a != 0);
    vm.cpu.regs[ins.reg1 as usize] = result;
    Ok(())
}

/// CMP is subtraction without the store.
pub(super) fn cmp(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let a = vm.cpu.regs[ins.reg1 as usize];
    let b = read_operand(vm, ins, Slot::Second)?;
    let result = a.wrapping_sub(b);
    set_sub_flags(&mut vm.cpu, a, b, result, a < b);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::cpu::StatusFlags;
    use crate::decode::{Instruction, Opcode};
    use crate::machine::Vm;
    use proptest::prelude::*;

    fn flags_after(op: Opcode, a: u32, b: u32) -> (u32, StatusFlags) {
        let mut vm = Vm::new();
        vm.cpu.regs[5] = a;
        vm.cpu.regs[6] = b;
        crate::exec::dispatch(&mut vm, &Instruction::reg(op, 5, 6)).unwrap();
        (vm.cpu.regs[5], vm.cpu.flags())
    }

    const INTERESTING: [u32; 6] = [0, 1, u32::MAX, 0x8000_0000, 0x7FFF_FFFF, 0xDEAD_BEEF];

    #[test]
    fn add_flags_match_their_definitions() {
        for &a in &INTERESTING {
            for &b in &INTERESTING {
                let (r, flags) = flags_after(Opcode::Add, a, b);
                assert_eq!(r, a.wrapping_add(b));
                assert_eq!(flags.contains(StatusFlags::ZERO), r == 0, "Z for {a:#x}+{b:#x}");
                assert_eq!(
                    flags.contains(StatusFlags::NEGATIVE),
                    r & 0x8000_0000 != 0
                );
                assert_eq!(flags.contains(StatusFlags::CARRY), r < a, "C for {a:#x}+{b:#x}");
                let (_, signed_overflow) = (a as i32).overflowing_add(b as i32);
                assert_eq!(
                    flags.contains(StatusFlags::OVERFLOW),
                    signed_overflow,
                    "O for {a:#x}+{b:#x}"
                );
            }
        }
    }

    #[test]
    fn sub_and_cmp_flags_match_their_definitions() {
        for &a in &INTERESTING {
            for &b in &INTERESTING {
                for op in [Opcode::Sub, Opcode::Cmp] {
                    let (r, flags) = flags_after(op, a, b);
                    if op == Opcode::Cmp {
                        assert_eq!(r, a, "CMP must not store");
                    }
                    let diff = a.wrapping_sub(b);
                    assert_eq!(flags.contains(StatusFlags::ZERO), diff == 0);
                    assert_eq!(flags.contains(StatusFlags::CARRY), a < b);
                    let (_, signed_overflow) = (a as i32).overflowing_sub(b as i32);
                    assert_eq!(flags.contains(StatusFlags::OVERFLOW), signed_overflow);
                }
            }
        }
    }

    #[test]
    fn addc_chains_the_carry() {
        let mut vm = Vm::new();
        // 0xFFFFFFFF + 1 sets carry...
        vm.cpu.regs[5] = u32::MAX;
        vm.cpu.regs[6] = 1;
        crate::exec::dispatch(&mut vm, &Instruction::reg(Opcode::Add, 5, 6)).unwrap();
        assert!(vm.cpu.flag(StatusFlags::CARRY));
        // ...and ADDC folds it into the high word.
        vm.cpu.regs[5] = 10;
        vm.cpu.regs[6] = 20;
        crate::exec::dispatch(&mut vm, &Instruction::reg(Opcode::Addc, 5, 6)).unwrap();
        assert_eq!(vm.cpu.regs[5], 31);
        assert!(!vm.cpu.flag(StatusFlags::CARRY));
    }

    #[test]
    fn division_by_zero_leaves_the_dividend() {
        let mut vm = Vm::new();
        vm.cpu.regs[0] = 10;
        vm.cpu.regs[1] = 0;
        let err = crate::exec::dispatch(&mut vm, &Instruction::reg(Opcode::Div, 0, 1))
            .unwrap_err();
        assert!(matches!(err, crate::errors::VmError::DivisionByZero));
        assert_eq!(vm.cpu.regs[0], 10);
    }

    #[test]
    fn neg_of_int_min_overflows() {
        let (r, flags) = flags_after_unary(Opcode::Neg, 0x8000_0000);
        assert_eq!(r, 0x8000_0000);
        assert!(flags.contains(StatusFlags::OVERFLOW));
        assert!(flags.contains(StatusFlags::CARRY));
    }

    fn flags_after_unary(op: Opcode, a: u32) -> (u32, StatusFlags) {
        let mut vm = Vm::new();
        vm.cpu.regs[5] = a;
        crate::exec::dispatch(&mut vm, &Instruction::reg(op, 5, 0)).unwrap();
        (vm.cpu.regs[5], vm.cpu.flags())
    }

    #[test]
    fn inc_dec_are_add_sub_by_one() {
        let (r, flags) = flags_after_unary(Opcode::Inc, u32::MAX);
        assert_eq!(r, 0);
        assert!(flags.contains(StatusFlags::ZERO));
        assert!(flags.contains(StatusFlags::CARRY));

        let (r, flags) = flags_after_unary(Opcode::Dec, 0);
        assert_eq!(r, u32::MAX);
        assert!(flags.contains(StatusFlags::CARRY));
        assert!(flags.contains(StatusFlags::NEGATIVE));
    }

    proptest! {
        #[test]
        fn add_matches_the_wide_model(a in any::<u32>(), b in any::<u32>()) {
            let (r, flags) = flags_after(Opcode::Add, a, b);
            let wide = a as u64 + b as u64;
            prop_assert_eq!(r, wide as u32);
            prop_assert_eq!(flags.contains(StatusFlags::CARRY), wide > u32::MAX as u64);
        }

        #[test]
        fn cmp_orders_unsigned_via_carry(a in any::<u32>(), b in any::<u32>()) {
            let (_, flags) = flags_after(Opcode::Cmp, a, b);
            // JBE's condition is C || Z, JA's is !C && !Z.
            prop_assert_eq!(
                flags.contains(StatusFlags::CARRY) || flags.contains(StatusFlags::ZERO),
                a <= b
            );
        }

        #[test]
        fn cmp_orders_signed_via_negative_xor_overflow(a in any::<u32>(), b in any::<u32>()) {
            let (_, flags) = flags_after(Opcode::Cmp, a, b);
            prop_assert_eq!(
                flags.contains(StatusFlags::NEGATIVE) != flags.contains(StatusFlags::OVERFLOW),
                (a as i32) < (b as i32)
            );
        }
    }
}
