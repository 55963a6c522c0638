//! Memory syscalls: the allocator for dynamically sized requests and
//! the segment-layout queries.

use super::{REG_ARG0, REG_ARG1, REG_ARG2, SYS_ALLOC, SYS_COPY, SYS_FREE, SYS_SEGMENT_BASE,
            SYS_SEGMENT_SIZE};
use crate::errors::VmError;
use crate::machine::Vm;
use segmem::Segment;

pub(super) fn handle(vm: &mut Vm, number: u16) -> Result<(), VmError> {
    match number {
        SYS_ALLOC => {
            let size = vm.cpu.regs[REG_ARG0];
            let addr = vm.mem.alloc(size)?;
            vm.cpu.regs[REG_ARG0] = addr as u32;
        }
        SYS_FREE => {
            let addr = vm.cpu.regs[REG_ARG0] as u16;
            vm.mem.free(addr)?;
        }
        SYS_COPY => {
            let dst = vm.cpu.regs[REG_ARG0] as u16;
            let src = vm.cpu.regs[REG_ARG1] as u16;
            let len = vm.cpu.regs[REG_ARG2];
            vm.mem.copy(dst, src, len)?;
        }
        SYS_SEGMENT_BASE => {
            let segment = segment_argument(vm, number)?;
            vm.cpu.regs[REG_ARG0] = segment.base();
        }
        SYS_SEGMENT_SIZE => {
            let segment = segment_argument(vm, number)?;
            vm.cpu.regs[REG_ARG0] = segment.size();
        }
        _ => return Err(VmError::InvalidSyscall { number }),
    }
    Ok(())
}

fn segment_argument(vm: &Vm, number: u16) -> Result<Segment, VmError> {
    Segment::from_index(vm.cpu.regs[REG_ARG0]).ok_or(VmError::InvalidSyscall { number })
}
