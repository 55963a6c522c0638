//! Engine error taxonomy.
//!
//! Every fault the guest can provoke lands in [`VmError`]; the stable
//! numeric identity consumed by external tooling is [`ErrorCode`].

use segmem::MemFault;
use std::io;
use thiserror::Error;

/// Stable error numbering. The values are part of the external
/// contract and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    None = 0,
    InvalidInstruction = 1,
    SegmentationFault = 2,
    StackOverflow = 3,
    StackUnderflow = 4,
    DivisionByZero = 5,
    InvalidAddress = 6,
    InvalidSyscall = 7,
    MemoryAllocation = 8,
    InvalidAlignment = 9,
    UnhandledInterrupt = 10,
    IoError = 11,
    ProtectionFault = 12,
    NestedInterrupt = 13,
}

impl ErrorCode {
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::None => "none",
            ErrorCode::InvalidInstruction => "invalid-instruction",
            ErrorCode::SegmentationFault => "segmentation-fault",
            ErrorCode::StackOverflow => "stack-overflow",
            ErrorCode::StackUnderflow => "stack-underflow",
            ErrorCode::DivisionByZero => "division-by-zero",
            ErrorCode::InvalidAddress => "invalid-address",
            ErrorCode::InvalidSyscall => "invalid-syscall",
            ErrorCode::MemoryAllocation => "memory-allocation",
            ErrorCode::InvalidAlignment => "invalid-alignment",
            ErrorCode::UnhandledInterrupt => "unhandled-interrupt",
            ErrorCode::IoError => "io-error",
            ErrorCode::ProtectionFault => "protection-fault",
            ErrorCode::NestedInterrupt => "nested-interrupt",
        }
    }
}

#[derive(Debug, Error)]
pub enum VmError {
    #[error("invalid instruction {opcode:#04x} (mode {mode})")]
    InvalidInstruction { opcode: u8, mode: u8 },
    #[error(transparent)]
    Memory(#[from] MemFault),
    #[error("stack overflow: push with SP at {sp:#06x}")]
    StackOverflow { sp: u32 },
    #[error("stack underflow: pop with SP at {sp:#06x}")]
    StackUnderflow { sp: u32 },
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid syscall {number}")]
    InvalidSyscall { number: u16 },
    #[error("instruction fetch at unaligned address {pc:#06x}")]
    InvalidAlignment { pc: u32 },
    #[error("no handler installed for interrupt vector {vector}")]
    UnhandledInterrupt { vector: u8 },
    #[error("interrupt vector {vector} raised while interrupts are disabled")]
    NestedInterrupt { vector: u8 },
    #[error("host i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Image(#[from] vm_image::ImageError),
}

impl VmError {
    pub fn code(&self) -> ErrorCode {
        match self {
            VmError::InvalidInstruction { .. } => ErrorCode::InvalidInstruction,
            VmError::Memory(fault) => match fault {
                MemFault::OutOfRange { .. }
                | MemFault::UnallocatedHeap { .. }
                | MemFault::CorruptHeap { .. } => ErrorCode::SegmentationFault,
                MemFault::Protection { .. } => ErrorCode::ProtectionFault,
                MemFault::NotAllocated { .. } | MemFault::DoubleFree { .. } => {
                    ErrorCode::InvalidAddress
                }
                MemFault::Exhausted { .. } => ErrorCode::MemoryAllocation,
            },
            VmError::StackOverflow { .. } => ErrorCode::StackOverflow,
            VmError::StackUnderflow { .. } => ErrorCode::StackUnderflow,
            VmError::DivisionByZero => ErrorCode::DivisionByZero,
            VmError::InvalidSyscall { .. } => ErrorCode::InvalidSyscall,
            VmError::InvalidAlignment { .. } => ErrorCode::InvalidAlignment,
            VmError::UnhandledInterrupt { .. } => ErrorCode::UnhandledInterrupt,
            VmError::NestedInterrupt { .. } => ErrorCode::NestedInterrupt,
            VmError::Io(_) | VmError::Image(_) => ErrorCode::IoError,
        }
    }
}
