//! Instruction word decoding.
//!
//! Words are 32-bit little-endian with a big-endian field layout:
//! bits [31:24] opcode, [23:20] addressing mode, [19:16] reg1,
//! [15:12] reg2, [11:0] immediate. In the four modes that do not use
//! `reg2` as a register the field doubles as the high nibble of the
//! immediate, widening it to 16 bits.
//!
//! Decoding never rejects a word; opcode and mode legality is judged
//! at dispatch so that the decoder can also serve the disassembly
//! side of the fault reports.

use std::fmt;

/// Define the opcode enum together with its decode and mnemonic
/// tables. Columns: encoding value, variant, mnemonic, operand count.
macro_rules! opcodes {
    ($($value:literal $name:ident $mnemonic:literal $arity:literal,)*) => {
        /// Operation selector of a decoded instruction.
        ///
        /// The numeric grouping (data transfer 0x00, arithmetic 0x20,
        /// logic 0x40, control flow 0x60, stack 0x80, system 0xA0,
        /// memory management 0xC0) is an encoding convenience; the
        /// engine dispatches on the variants.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum Opcode {
            $($name = $value,)*
        }

        impl Opcode {
            pub fn from_u8(raw: u8) -> Option<Opcode> {
                match raw {
                    $($value => Some(Opcode::$name),)*
                    _ => None,
                }
            }

            /// Assembler spelling, shared with the disassembler.
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$name => $mnemonic,)*
                }
            }

            /// How many operands the assembler syntax carries.
            pub fn arity(self) -> u8 {
                match self {
                    $(Opcode::$name => $arity,)*
                }
            }
        }
    };
}

opcodes! {
    // Data transfer
    0x00 Nop "NOP" 0,
    0x01 Load "LOAD" 2,
    0x02 Loadb "LOADB" 2,
    0x03 Loadw "LOADW" 2,
    0x04 Store "STORE" 2,
    0x05 Storeb "STOREB" 2,
    0x06 Storew "STOREW" 2,
    0x07 Move "MOVE" 2,
    0x08 Lea "LEA" 2,
    0x0A In "IN" 2,
    0x0B Out "OUT" 2,
    // Arithmetic
    0x20 Add "ADD" 2,
    0x21 Addc "ADDC" 2,
    0x22 Sub "SUB" 2,
    0x23 Subc "SUBC" 2,
    0x24 Mul "MUL" 2,
    0x25 Div "DIV" 2,
    0x26 Mod "MOD" 2,
    0x27 Inc "INC" 1,
    0x28 Dec "DEC" 1,
    0x29 Neg "NEG" 1,
    0x2A Cmp "CMP" 2,
    // Logic
    0x40 And "AND" 2,
    0x41 Or "OR" 2,
    0x42 Xor "XOR" 2,
    0x43 Not "NOT" 1,
    0x44 Shl "SHL" 2,
    0x45 Shr "SHR" 2,
    0x46 Sar "SAR" 2,
    0x47 Rol "ROL" 2,
    0x48 Ror "ROR" 2,
    0x49 Test "TEST" 2,
    // Control flow
    0x60 Jmp "JMP" 1,
    0x61 Jz "JZ" 1,
    0x62 Jnz "JNZ" 1,
    0x63 Jn "JN" 1,
    0x64 Jp "JP" 1,
    0x65 Jo "JO" 1,
    0x66 Jc "JC" 1,
    0x67 Jbe "JBE" 1,
    0x68 Ja "JA" 1,
    0x69 Call "CALL" 1,
    0x6A Ret "RET" 1,
    0x6B Loop "LOOP" 2,
    // Stack
    0x80 Push "PUSH" 1,
    0x81 Pop "POP" 1,
    0x82 Pushf "PUSHF" 0,
    0x83 Popf "POPF" 0,
    0x84 Pusha "PUSHA" 0,
    0x85 Popa "POPA" 0,
    0x86 Enter "ENTER" 1,
    0x87 Leave "LEAVE" 0,
    // System
    0xA0 Halt "HALT" 0,
    0xA1 Syscall "SYSCALL" 1,
    0xA2 Int "INT" 1,
    0xA3 Iret "IRET" 0,
    0xA4 Cli "CLI" 0,
    0xA5 Sti "STI" 0,
    0xA6 Reset "RESET" 0,
    0xA7 Debug "DEBUG" 0,
    // Memory management
    0xC0 Alloc "ALLOC" 2,
    0xC1 Free "FREE" 1,
    0xC2 Memcpy "MEMCPY" 3,
    0xC3 Memset "MEMSET" 3,
    0xC4 Protect "PROTECT" 2,
}

/// Mnemonic for a raw opcode byte; unknown opcodes disassemble as
/// `???`.
pub fn mnemonic(raw: u8) -> &'static str {
    Opcode::from_u8(raw).map_or("???", Opcode::mnemonic)
}

/// Addressing mode of the instruction's flexible operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AddrMode {
    /// Literal operand inside the instruction word.
    Imm = 0,
    /// Register operand.
    Reg = 1,
    /// Direct memory operand at the immediate address.
    Mem = 2,
    /// Memory operand at the address held in a register.
    RegInd = 3,
    /// Register base plus 12-bit displacement.
    Idx = 4,
    /// Stack-pointer relative.
    Stk = 5,
    /// Base-pointer relative.
    Bas = 6,
}

impl AddrMode {
    pub fn from_u8(raw: u8) -> Option<AddrMode> {
        match raw {
            0 => Some(AddrMode::Imm),
            1 => Some(AddrMode::Reg),
            2 => Some(AddrMode::Mem),
            3 => Some(AddrMode::RegInd),
            4 => Some(AddrMode::Idx),
            5 => Some(AddrMode::Stk),
            6 => Some(AddrMode::Bas),
            _ => None,
        }
    }

    /// Modes that fold the `reg2` field into the immediate, widening
    /// it from 12 to 16 bits.
    pub fn widens_immediate(self) -> bool {
        matches!(
            self,
            AddrMode::Imm | AddrMode::Mem | AddrMode::Stk | AddrMode::Bas
        )
    }
}

/// A decoded instruction word. Fields are kept raw; use
/// [`Opcode::from_u8`] / [`AddrMode::from_u8`] to interpret them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: u8,
    pub mode: u8,
    pub reg1: u8,
    pub reg2: u8,
    pub immediate: u16,
}

impl Instruction {
    pub fn decode(word: u32) -> Instruction {
        let opcode = (word >> 24) as u8;
        let mode = ((word >> 20) & 0xF) as u8;
        let reg1 = ((word >> 16) & 0xF) as u8;
        let reg2 = ((word >> 12) & 0xF) as u8;
        let mut immediate = (word & 0xFFF) as u16;
        if AddrMode::from_u8(mode).is_some_and(AddrMode::widens_immediate) {
            immediate |= (reg2 as u16) << 12;
        }
        Instruction {
            opcode,
            mode,
            reg1,
            reg2,
            immediate,
        }
    }

    /// Exact inverse of [`Instruction::decode`]:
    /// `encode(decode(w)) == w` for every word.
    pub fn encode(&self) -> u32 {
        let widened = AddrMode::from_u8(self.mode).is_some_and(AddrMode::widens_immediate);
        let reg2 = if widened {
            (self.immediate >> 12) as u8
        } else {
            self.reg2
        };
        (self.opcode as u32) << 24
            | (self.mode as u32 & 0xF) << 20
            | (self.reg1 as u32 & 0xF) << 16
            | (reg2 as u32 & 0xF) << 12
            | (self.immediate as u32 & 0xFFF)
    }

    fn with_mode(opcode: Opcode, mode: AddrMode, reg1: u8, reg2: u8, immediate: u16) -> Instruction {
        Instruction {
            opcode: opcode as u8,
            mode: mode as u8,
            reg1: reg1 & 0xF,
            reg2: reg2 & 0xF,
            immediate,
        }
    }

    /// Immediate operand, 16 bits.
    pub fn imm(opcode: Opcode, reg1: u8, immediate: u16) -> Instruction {
        Self::with_mode(opcode, AddrMode::Imm, reg1, 0, immediate)
    }

    /// Register operand.
    pub fn reg(opcode: Opcode, reg1: u8, reg2: u8) -> Instruction {
        Self::with_mode(opcode, AddrMode::Reg, reg1, reg2, 0)
    }

    /// Direct memory operand, 16-bit address.
    pub fn mem(opcode: Opcode, reg1: u8, address: u16) -> Instruction {
        Self::with_mode(opcode, AddrMode::Mem, reg1, 0, address)
    }

    /// Register-indirect memory operand.
    pub fn reg_ind(opcode: Opcode, reg1: u8, reg2: u8) -> Instruction {
        Self::with_mode(opcode, AddrMode::RegInd, reg1, reg2, 0)
    }

    /// Indexed memory operand: base register plus 12-bit offset.
    pub fn idx(opcode: Opcode, reg1: u8, base: u8, offset: u16) -> Instruction {
        Self::with_mode(opcode, AddrMode::Idx, reg1, base, offset & 0xFFF)
    }

    /// Stack-pointer relative operand, 16-bit offset.
    pub fn stk(opcode: Opcode, reg1: u8, offset: u16) -> Instruction {
        Self::with_mode(opcode, AddrMode::Stk, reg1, 0, offset)
    }

    /// Base-pointer relative operand, 16-bit offset.
    pub fn bas(opcode: Opcode, reg1: u8, offset: u16) -> Instruction {
        Self::with_mode(opcode, AddrMode::Bas, reg1, 0, offset)
    }

    /// A three-operand memory-management form (MEMCPY/MEMSET):
    /// two registers plus a 12-bit count.
    pub fn mm3(opcode: Opcode, reg1: u8, reg2: u8, count: u16) -> Instruction {
        Self::with_mode(opcode, AddrMode::Reg, reg1, reg2, count & 0xFFF)
    }

    /// Render the flexible operand the way the assembler writes it,
    /// reading the register number from `reg`.
    fn operand_text(&self, reg: u8) -> String {
        match AddrMode::from_u8(self.mode) {
            Some(AddrMode::Imm) => format!("#{}", self.immediate),
            Some(AddrMode::Reg) => format!("R{reg}"),
            Some(AddrMode::Mem) => format!("[{:#06x}]", self.immediate),
            Some(AddrMode::RegInd) => format!("[R{reg}]"),
            Some(AddrMode::Idx) => format!("[R{reg}+{}]", self.immediate),
            Some(AddrMode::Stk) => format!("[SP+{}]", self.immediate),
            Some(AddrMode::Bas) => format!("[BP+{}]", self.immediate),
            None => format!("<mode {}>", self.mode),
        }
    }
}

impl fmt::Display for Instruction {
    /// Assembler-like rendering for fault reports and disassembly.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(opcode) = Opcode::from_u8(self.opcode) else {
            return write!(f, ".word {:#010x}", self.encode());
        };
        match opcode.arity() {
            0 => write!(f, "{}", opcode.mnemonic()),
            1 => write!(f, "{} {}", opcode.mnemonic(), self.operand_text(self.reg1)),
            3 => write!(
                f,
                "{} R{}, R{}, #{}",
                opcode.mnemonic(),
                self.reg1,
                self.reg2,
                self.immediate
            ),
            _ => write!(
                f,
                "{} R{}, {}",
                opcode.mnemonic(),
                self.reg1,
                self.operand_text(self.reg2)
            ),
        }
    }
}
