//! Segmented guest memory with a first-fit heap allocator.
//!
//! All guest-visible state lives inside a single owned byte array:
//! segment contents, the stack, and the heap including its block
//! headers. Accessors are little-endian and every guest access is
//! checked against the array bounds and, inside the heap segment,
//! against the owning block's protection mask.

mod heap;
mod layout;

use bitflags::bitflags;
use thiserror::Error;

pub use heap::{BlockHeader, BlockIter, BLOCK_MAGIC, HEADER_SIZE, MIN_PAYLOAD};
pub use layout::{
    Segment, CODE_BASE, CODE_SIZE, DATA_BASE, DATA_SIZE, HEAP_BASE, HEAP_END, HEAP_SIZE, MEM_SIZE,
    SEGMENT_SIZE, STACK_BASE, STACK_SIZE, STACK_TOP,
};

bitflags! {
    /// Per-block access permissions stored in the block header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Protection: u8 {
        const READ = 1;
        const WRITE = 2;
        const EXECUTE = 4;
    }
}

/// A failed memory operation. The engine maps these onto its stable
/// error codes; the messages are what ends up in the fault report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemFault {
    #[error("memory access [{addr:#06x}, +{size}) is outside physical memory")]
    OutOfRange { addr: u32, size: u32 },
    #[error("heap access [{addr:#06x}, +{size}) is not inside a single allocated block")]
    UnallocatedHeap { addr: u32, size: u32 },
    #[error("heap block at {addr:#06x} denies {required:?} access")]
    Protection { addr: u32, required: Protection },
    #[error("address {addr:#06x} is not an allocated heap payload")]
    NotAllocated { addr: u32 },
    #[error("double free detected at {addr:#06x}")]
    DoubleFree { addr: u32 },
    #[error("heap exhausted: cannot allocate {size} bytes")]
    Exhausted { size: u32 },
    #[error("corrupt heap block header at {addr:#06x}")]
    CorruptHeap { addr: u32 },
}

/// The machine's backing memory.
///
/// Created zero-filled with the heap seeded as one free block spanning
/// the whole heap segment. Heap metadata is kept inside the array
/// itself (see [`heap`]) so payload addresses are stable and visible
/// to guest code.
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    pub fn new() -> Memory {
        let mut mem = Memory {
            bytes: vec![0; MEM_SIZE as usize],
        };
        mem.seed_heap();
        mem
    }

    /// Validate a guest access of `size` bytes at `addr` needing the
    /// `required` permissions.
    ///
    /// Outside the heap segment permission is implicitly granted and
    /// only the array bounds matter. Any range touching the heap must
    /// lie wholly inside a single allocated block whose protection
    /// mask covers `required`.
    fn check(&self, addr: u32, size: u32, required: Protection) -> Result<(), MemFault> {
        if size == 0 {
            return Ok(());
        }
        let end = addr as u64 + size as u64;
        if end > MEM_SIZE as u64 {
            return Err(MemFault::OutOfRange { addr, size });
        }
        if end as u32 - 1 >= HEAP_BASE {
            return self.check_heap(addr, size, required);
        }
        Ok(())
    }

    pub fn read_u8(&self, addr: u16) -> Result<u8, MemFault> {
        self.check(addr as u32, 1, Protection::READ)?;
        Ok(self.bytes[addr as usize])
    }

    pub fn read_u16(&self, addr: u16) -> Result<u16, MemFault> {
        self.check(addr as u32, 2, Protection::READ)?;
        let at = addr as usize;
        Ok(u16::from_le_bytes([self.bytes[at], self.bytes[at + 1]]))
    }

    pub fn read_u32(&self, addr: u16) -> Result<u32, MemFault> {
        self.check(addr as u32, 4, Protection::READ)?;
        let at = addr as usize;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.bytes[at..at + 4]);
        Ok(u32::from_le_bytes(word))
    }

    pub fn write_u8(&mut self, addr: u16, value: u8) -> Result<(), MemFault> {
        self.check(addr as u32, 1, Protection::WRITE)?;
        self.bytes[addr as usize] = value;
        Ok(())
    }

    pub fn write_u16(&mut self, addr: u16, value: u16) -> Result<(), MemFault> {
        self.check(addr as u32, 2, Protection::WRITE)?;
        self.bytes[addr as usize..addr as usize + 2].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_u32(&mut self, addr: u16, value: u32) -> Result<(), MemFault> {
        self.check(addr as u32, 4, Protection::WRITE)?;
        self.bytes[addr as usize..addr as usize + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Block copy with full access checking on both ranges. Overlap is
    /// handled like `memmove`.
    pub fn copy(&mut self, dst: u16, src: u16, len: u32) -> Result<(), MemFault> {
        self.check(src as u32, len, Protection::READ)?;
        self.check(dst as u32, len, Protection::WRITE)?;
        self.bytes.copy_within(
            src as usize..src as usize + len as usize,
            dst as usize,
        );
        Ok(())
    }

    /// Block fill with access checking.
    pub fn fill(&mut self, dst: u16, value: u8, len: u32) -> Result<(), MemFault> {
        self.check(dst as u32, len, Protection::WRITE)?;
        self.bytes[dst as usize..dst as usize + len as usize].fill(value);
        Ok(())
    }

    /// Instruction fetch: a bounds-checked dword read that is exempt
    /// from heap block and protection rules. Execute permission is
    /// never enforced on fetches.
    pub fn fetch(&self, addr: u32) -> Result<u32, MemFault> {
        if addr as u64 + 4 > MEM_SIZE as u64 {
            return Err(MemFault::OutOfRange { addr, size: 4 });
        }
        let at = addr as usize;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.bytes[at..at + 4]);
        Ok(u32::from_le_bytes(word))
    }

    /// Host-side raw byte view, used by fault reports and debuggers.
    /// Never reachable from guest code.
    pub fn peek(&self, addr: u32) -> Option<u8> {
        self.bytes.get(addr as usize).copied()
    }

    pub fn peek_u32(&self, addr: u32) -> Option<u32> {
        if addr as u64 + 4 > MEM_SIZE as u64 {
            return None;
        }
        let at = addr as usize;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.bytes[at..at + 4]);
        Some(u32::from_le_bytes(word))
    }

    /// Loader entry point: place an image chunk, bypassing segment
    /// permissions (the loader writes into the code segment).
    pub fn load_chunk(&mut self, at: u32, chunk: &[u8]) -> Result<(), MemFault> {
        let end = at as u64 + chunk.len() as u64;
        if end > MEM_SIZE as u64 {
            return Err(MemFault::OutOfRange {
                addr: at,
                size: chunk.len() as u32,
            });
        }
        self.bytes[at as usize..end as usize].copy_from_slice(chunk);
        Ok(())
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Default for Memory {
    fn default() -> Memory {
        Memory::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_memory_is_zeroed_outside_heap_metadata() {
        let mem = Memory::new();
        assert_eq!(mem.read_u32(0x0000).unwrap(), 0);
        assert_eq!(mem.read_u32(DATA_BASE as u16).unwrap(), 0);
        assert_eq!(mem.read_u32(STACK_BASE as u16).unwrap(), 0);
    }

    #[test]
    fn words_are_little_endian() {
        let mut mem = Memory::new();
        mem.write_u32(0x4000, 0x1122_3344).unwrap();
        assert_eq!(mem.read_u8(0x4000).unwrap(), 0x44);
        assert_eq!(mem.read_u8(0x4003).unwrap(), 0x11);
        assert_eq!(mem.read_u16(0x4002).unwrap(), 0x1122);
    }

    #[test]
    fn access_past_end_is_out_of_range() {
        let mem = Memory::new();
        assert_eq!(
            mem.read_u32(0xFFFE),
            Err(MemFault::OutOfRange {
                addr: 0xFFFE,
                size: 4
            })
        );
    }

    #[test]
    fn fetch_ignores_heap_rules() {
        let mem = Memory::new();
        // No allocated block at the heap base, yet a fetch succeeds.
        assert!(mem.fetch(HEAP_BASE + 8).is_ok());
        assert!(mem.read_u32((HEAP_BASE + 8) as u16).is_err());
    }

    #[test]
    fn copy_and_fill_check_both_ranges() {
        let mut mem = Memory::new();
        mem.fill(0x4000, 0xAA, 16).unwrap();
        mem.copy(0x4100, 0x4000, 16).unwrap();
        assert_eq!(mem.read_u8(0x410F).unwrap(), 0xAA);
        // Destination range leaks into the (unallocated) heap.
        assert!(matches!(
            mem.copy(0xBFFC as u16, 0x4000, 16),
            Err(MemFault::UnallocatedHeap { .. })
        ));
    }

    #[test]
    fn segment_lookup() {
        assert_eq!(Segment::of(0x0000), Some(Segment::Code));
        assert_eq!(Segment::of(0x7FFF), Some(Segment::Data));
        assert_eq!(Segment::of(0x8000), Some(Segment::Stack));
        assert_eq!(Segment::of(0xFFFF), Some(Segment::Heap));
        assert_eq!(Segment::of(0x1_0000), None);
        assert!(Segment::Heap.contains(HEAP_BASE));
        assert_eq!(Segment::from_index(2), Some(Segment::Stack));
        assert_eq!(Segment::from_index(7), None);
    }
}
