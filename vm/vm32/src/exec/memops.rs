//! Memory-management group: the guest-facing face of the heap
//! allocator plus block copy/fill.

use super::{read_operand, Slot};
use crate::decode::Instruction;
use crate::errors::VmError;
use crate::machine::Vm;
use segmem::Protection;

pub(super) fn alloc(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let size = read_operand(vm, ins, Slot::Second)?;
    let addr = vm.mem.alloc(size)?;
    vm.cpu.regs[ins.reg1 as usize] = addr as u32;
    Ok(())
}

pub(super) fn free(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let addr = vm.cpu.regs[ins.reg1 as usize] as u16;
    vm.mem.free(addr)?;
    Ok(())
}

/// MEMCPY dst-reg, src-reg, #count.
pub(super) fn memcpy(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let dst = vm.cpu.regs[ins.reg1 as usize] as u16;
    let src = vm.cpu.regs[ins.reg2 as usize] as u16;
    vm.mem.copy(dst, src, ins.immediate as u32)?;
    Ok(())
}

/// MEMSET dst-reg, byte-reg, #count.
pub(super) fn memset(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let dst = vm.cpu.regs[ins.reg1 as usize] as u16;
    let value = vm.cpu.regs[ins.reg2 as usize] as u8;
    vm.mem.fill(dst, value, ins.immediate as u32)?;
    Ok(())
}

pub(super) fn protect(vm: &mut Vm, ins: &Instruction) -> Result<(), VmError> {
    let addr = vm.cpu.regs[ins.reg1 as usize] as u16;
    let mask = read_operand(vm, ins, Slot::Second)? as u8;
    vm.mem.protect(addr, Protection::from_bits_truncate(mask))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::decode::{Instruction, Opcode};
    use crate::errors::{ErrorCode, VmError};
    use crate::machine::Vm;
    use segmem::{HEAP_BASE, HEAP_END, HEADER_SIZE};

    fn exec(vm: &mut Vm, ins: Instruction) -> Result<(), VmError> {
        crate::exec::dispatch(vm, &ins)
    }

    #[test]
    fn alloc_returns_a_heap_payload_address() {
        let mut vm = Vm::new();
        exec(&mut vm, Instruction::imm(Opcode::Alloc, 10, 100)).unwrap();
        let addr = vm.cpu.regs[10];
        assert!(addr >= HEAP_BASE + HEADER_SIZE && addr < HEAP_END);

        // A register-sized request works the same.
        vm.cpu.regs[5] = 64;
        exec(&mut vm, Instruction::reg(Opcode::Alloc, 11, 5)).unwrap();
        assert_ne!(vm.cpu.regs[11], addr);
    }

    #[test]
    fn memcpy_and_memset_respect_checks() {
        let mut vm = Vm::new();
        vm.cpu.regs[5] = 0x4000;
        vm.cpu.regs[6] = 0x42;
        exec(&mut vm, Instruction::mm3(Opcode::Memset, 5, 6, 8)).unwrap();
        assert_eq!(vm.mem.read_u8(0x4007).unwrap(), 0x42);

        vm.cpu.regs[7] = 0x4100;
        exec(&mut vm, Instruction::mm3(Opcode::Memcpy, 7, 5, 8)).unwrap();
        assert_eq!(vm.mem.read_u8(0x4107).unwrap(), 0x42);

        // Copy into unallocated heap memory must fault.
        vm.cpu.regs[8] = HEAP_BASE + HEADER_SIZE;
        let err = exec(&mut vm, Instruction::mm3(Opcode::Memcpy, 8, 5, 8)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SegmentationFault);
    }

    #[test]
    fn protect_applies_the_operand_mask() {
        let mut vm = Vm::new();
        exec(&mut vm, Instruction::imm(Opcode::Alloc, 10, 16)).unwrap();
        exec(&mut vm, Instruction::imm(Opcode::Protect, 10, 1)).unwrap();
        let addr = vm.cpu.regs[10] as u16;
        assert!(vm.mem.read_u8(addr).is_ok());
        let err = vm.mem.write_u8(addr, 1).unwrap_err();
        assert_eq!(VmError::from(err).code(), ErrorCode::ProtectionFault);
    }
}
