//! Process syscalls: exit, host sleep and the two clocks.

use super::{REG_ARG0, SYS_EXIT, SYS_PERF, SYS_SLEEP, SYS_TIME};
use crate::errors::VmError;
use crate::machine::Vm;
use std::thread;
use std::time::Duration;

pub(super) fn handle(vm: &mut Vm, number: u16) -> Result<(), VmError> {
    match number {
        SYS_EXIT => {
            let code = vm.cpu.regs[REG_ARG0];
            log::debug!("guest exited with code {code}");
            vm.exit_code = code;
            vm.cpu.halted = true;
        }
        SYS_SLEEP => {
            let millis = vm.cpu.regs[REG_ARG0];
            thread::sleep(Duration::from_millis(millis as u64));
        }
        SYS_TIME => {
            vm.cpu.regs[REG_ARG0] = vm.uptime_ms();
        }
        SYS_PERF => {
            vm.cpu.regs[REG_ARG0] = vm.instruction_count() as u32;
        }
        _ => return Err(VmError::InvalidSyscall { number }),
    }
    Ok(())
}
