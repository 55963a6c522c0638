//! The engine: fetch/decode/dispatch stepping, fault capture and the
//! host-facing lifecycle.

use crate::console::Console;
use crate::cpu::{Cpu, R_BP, R_PC, R_SP, R_SR};
use crate::decode::Instruction;
use crate::errors::{ErrorCode, VmError};
use crate::ports::Timer;
use crate::syscalls::{Lcg, DEFAULT_SEED};
use crate::{exec, loader};
use segmem::Memory;
use std::io;
use std::time::Instant;
use vm_image::SymbolTable;

/// Snapshot of the first error since the last RESET: the stable code,
/// the PC at which the faulting instruction began and the rendered
/// message.
#[derive(Debug, Clone)]
pub struct Fault {
    pub pc: u32,
    pub code: ErrorCode,
    pub message: String,
}

/// One virtual machine: CPU, memory and host devices. Instances are
/// independent; nothing is shared between two engines.
pub struct Vm {
    pub cpu: Cpu,
    pub mem: Memory,
    pub(crate) console: Console,
    pub(crate) timer: Timer,
    pub(crate) rng: Lcg,
    pub(crate) exit_code: u32,
    pub(crate) debug_mode: bool,
    pub(crate) symbols: Option<SymbolTable>,
    started: Instant,
    instructions: u64,
    last_fault: Option<Fault>,
}

impl Vm {
    pub fn new() -> Vm {
        Vm::with_console(Console::stdio())
    }

    /// Build an engine around an injected console; the test suites
    /// use this to capture guest output.
    pub fn with_console(console: Console) -> Vm {
        Vm {
            cpu: Cpu::new(),
            mem: Memory::new(),
            console,
            timer: Timer::new(),
            rng: Lcg::new(DEFAULT_SEED),
            exit_code: 0,
            debug_mode: false,
            symbols: None,
            started: Instant::now(),
            instructions: 0,
            last_fault: None,
        }
    }

    /// Place a program image (container or raw stream) and point the
    /// PC at its entry.
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), VmError> {
        loader::load(self, bytes)
    }

    /// Execute exactly one instruction. A step on a halted machine is
    /// a no-op.
    ///
    /// The PC of the instruction is captured up front so that a fault
    /// can always be localized, then the PC is advanced by 4 before
    /// dispatch; control-flow instructions overwrite it from there.
    pub fn step(&mut self) -> Result<(), VmError> {
        if self.cpu.halted {
            return Ok(());
        }
        let pc = self.cpu.pc();
        match self.execute_at(pc) {
            Ok(()) => {
                self.instructions += 1;
                Ok(())
            }
            Err(error) => {
                log::debug!("fault at {pc:#06x}: {error}");
                self.last_fault = Some(Fault {
                    pc,
                    code: error.code(),
                    message: error.to_string(),
                });
                Err(error)
            }
        }
    }

    fn execute_at(&mut self, pc: u32) -> Result<(), VmError> {
        if pc % 4 != 0 {
            return Err(VmError::InvalidAlignment { pc });
        }
        let word = self.mem.fetch(pc)?;
        let ins = Instruction::decode(word);
        self.cpu.set_pc(pc + 4);
        exec::dispatch(self, &ins)
    }

    /// Run until HALT (or an exit syscall) or the first fault.
    pub fn run(&mut self) -> Result<(), VmError> {
        while !self.cpu.halted {
            self.step()?;
        }
        log::debug!("halted after {} instructions", self.instructions);
        Ok(())
    }

    /// RESET: back to the initial CPU state with memory preserved.
    /// This is also the only engine-side path that clears a recorded
    /// fault.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.exit_code = 0;
        self.last_fault = None;
    }

    pub fn halted(&self) -> bool {
        self.cpu.halted
    }

    pub fn exit_code(&self) -> u32 {
        self.exit_code
    }

    pub fn instruction_count(&self) -> u64 {
        self.instructions
    }

    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    /// Enable debug mode before loading to capture container symbol
    /// tables for the debugger.
    pub fn set_debug_mode(&mut self, on: bool) {
        self.debug_mode = on;
    }

    pub fn last_fault(&self) -> Option<&Fault> {
        self.last_fault.as_ref()
    }

    /// Host-side acknowledgement of a fault, the explicit counterpart
    /// of RESET.
    pub fn clear_fault(&mut self) {
        self.last_fault = None;
    }

    pub fn symbols(&self) -> Option<&SymbolTable> {
        self.symbols.as_ref()
    }

    pub(crate) fn uptime_ms(&self) -> u32 {
        self.started.elapsed().as_millis() as u32
    }

    /// Render registers, flags and the recorded fault; the runner and
    /// external debuggers feed this to the user.
    pub fn dump_state(&self, out: &mut dyn io::Write) -> io::Result<()> {
        writeln!(out, "registers:")?;
        for (i, chunk) in self.cpu.regs.chunks(4).enumerate() {
            let cells: Vec<String> = chunk
                .iter()
                .enumerate()
                .map(|(j, value)| format!("R{:<2} {value:#010x}", i * 4 + j))
                .collect();
            writeln!(out, "  {}", cells.join("  "))?;
        }
        writeln!(
            out,
            "  BP {:#06x}  SP {:#06x}  PC {:#06x}  SR {:#04x} [{:?}]",
            self.cpu.regs[R_BP],
            self.cpu.regs[R_SP],
            self.cpu.regs[R_PC],
            self.cpu.regs[R_SR],
            self.cpu.flags(),
        )?;
        writeln!(out, "instructions retired: {}", self.instructions)?;
        match &self.last_fault {
            None => writeln!(out, "no fault recorded")?,
            Some(fault) => {
                writeln!(
                    out,
                    "fault {} ({}) at {:#06x}: {}",
                    fault.code.value(),
                    fault.code.name(),
                    fault.pc,
                    fault.message,
                )?;
                if let Some(word) = self.mem.peek_u32(fault.pc) {
                    writeln!(out, "  at: {}", Instruction::decode(word))?;
                }
                if let Some(symbols) = &self.symbols {
                    if let Some(symbol) = symbols.symbol_at(fault.pc) {
                        writeln!(out, "  in: {} ({})", symbol.name, symbol.file)?;
                    }
                    if let Some(line) = symbols.line_at(fault.pc) {
                        writeln!(out, "  source: {} ({}:{})", line.source, line.file, line.line)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for Vm {
    fn default() -> Vm {
        Vm::new()
    }
}
