//! Console syscalls: formatted output, character and line input,
//! screen control through ANSI sequences.

use super::{REG_ARG0, REG_ARG1, SYS_CLEAR_SCREEN, SYS_PRINT_BASE, SYS_PRINT_CHAR, SYS_PRINT_HEX,
            SYS_PRINT_INT, SYS_PRINT_STRING, SYS_READ_CHAR, SYS_READ_LINE, SYS_SET_COLOR};
use crate::errors::VmError;
use crate::machine::Vm;
use segmem::MEM_SIZE;

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn format_radix(mut value: u32, base: u32) -> String {
    let mut digits = Vec::new();
    loop {
        digits.push(DIGITS[(value % base) as usize]);
        value /= base;
        if value == 0 {
            break;
        }
    }
    digits.reverse();
    digits.iter().map(|&d| d as char).collect()
}

pub(super) fn handle(vm: &mut Vm, number: u16) -> Result<(), VmError> {
    match number {
        SYS_PRINT_CHAR => {
            let byte = vm.cpu.regs[REG_ARG0] as u8;
            vm.console.write_out(&[byte])?;
        }
        SYS_PRINT_INT => {
            let value = vm.cpu.regs[REG_ARG0] as i32;
            vm.console.write_out(value.to_string().as_bytes())?;
        }
        SYS_PRINT_STRING => {
            let mut addr = vm.cpu.regs[REG_ARG0] as u16;
            // A string without a terminator cannot run longer than the
            // address space.
            for _ in 0..MEM_SIZE {
                let byte = vm.mem.read_u8(addr)?;
                if byte == 0 {
                    break;
                }
                vm.console.write_out(&[byte])?;
                addr = addr.wrapping_add(1);
            }
        }
        SYS_PRINT_HEX => {
            let value = vm.cpu.regs[REG_ARG0];
            vm.console.write_out(format!("{value:#x}").as_bytes())?;
        }
        SYS_PRINT_BASE => {
            let value = vm.cpu.regs[REG_ARG0];
            let base = vm.cpu.regs[REG_ARG1];
            if !(2..=36).contains(&base) {
                return Err(VmError::InvalidSyscall { number });
            }
            vm.console.write_out(format_radix(value, base).as_bytes())?;
        }
        SYS_READ_CHAR => {
            let byte = vm.console.read_byte()?.unwrap_or(0);
            vm.cpu.regs[REG_ARG0] = byte as u32;
        }
        SYS_READ_LINE => {
            let addr = vm.cpu.regs[REG_ARG0] as u16;
            let capacity = vm.cpu.regs[REG_ARG1];
            let line = vm.console.read_line()?;
            let bytes = line.trim_end_matches(['\n', '\r']).as_bytes();
            let mut written = 0u16;
            if capacity > 0 {
                let keep = bytes.len().min(capacity as usize - 1);
                for (i, &byte) in bytes[..keep].iter().enumerate() {
                    vm.mem.write_u8(addr.wrapping_add(i as u16), byte)?;
                }
                vm.mem.write_u8(addr.wrapping_add(keep as u16), 0)?;
                written = keep as u16;
            }
            vm.cpu.regs[REG_ARG0] = written as u32;
        }
        SYS_CLEAR_SCREEN => {
            vm.console.write_out(b"\x1b[2J\x1b[H")?;
        }
        SYS_SET_COLOR => {
            let color = vm.cpu.regs[REG_ARG0];
            vm.console.write_out(format!("\x1b[{color}m").as_bytes())?;
        }
        _ => return Err(VmError::InvalidSyscall { number }),
    }
    vm.console.flush()?;
    Ok(())
}
