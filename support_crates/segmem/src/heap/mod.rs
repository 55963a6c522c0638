//! First-fit heap allocator over an in-array block chain.
//!
//! Blocks are header-prefixed spans tiling the heap segment with no
//! gaps. The header is reached through offset-based reads and writes
//! on the backing array, never pointer casts, so guest code sees the
//! exact same bytes the allocator does.


use crate::layout::{HEAP_BASE, HEAP_END, HEAP_SIZE};
use crate::{MemFault, Memory, Protection};

/// Size of a block header in bytes.
pub const HEADER_SIZE: u32 = 8;

/// Marker stored at the front of every block header.
pub const BLOCK_MAGIC: u16 = 0xABCD;

/// Smallest payload ever handed out.
pub const MIN_PAYLOAD: u32 = 8;

/// Decoded form of the 8-byte header that precedes every heap block.
///
/// On-array layout, little-endian: magic u16, size u16, free u8,
/// protection u8, next u16. `size` covers header plus payload;
/// `next` is the byte distance to the following header (0 terminates
/// the chain).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub size: u16,
    pub free: bool,
    pub protection: Protection,
    pub next: u16,
}

impl BlockHeader {
    pub(crate) fn read(bytes: &[u8], at: u32) -> Result<BlockHeader, MemFault> {
        let i = at as usize;
        if at + HEADER_SIZE > HEAP_END {
            return Err(MemFault::CorruptHeap { addr: at });
        }
        let magic = u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        if magic != BLOCK_MAGIC {
            return Err(MemFault::CorruptHeap { addr: at });
        }
        Ok(BlockHeader {
            size: u16::from_le_bytes([bytes[i + 2], bytes[i + 3]]),
            free: bytes[i + 4] != 0,
            protection: Protection::from_bits_truncate(bytes[i + 5]),
            next: u16::from_le_bytes([bytes[i + 6], bytes[i + 7]]),
        })
    }

    pub(crate) fn write(&self, bytes: &mut [u8], at: u32) {
        let i = at as usize;
        bytes[i..i + 2].copy_from_slice(&BLOCK_MAGIC.to_le_bytes());
        bytes[i + 2..i + 4].copy_from_slice(&self.size.to_le_bytes());
        bytes[i + 4] = self.free as u8;
        bytes[i + 5] = self.protection.bits();
        bytes[i + 6..i + 8].copy_from_slice(&self.next.to_le_bytes());
    }

    /// First payload byte of a block whose header sits at `at`.
    pub fn payload(at: u32) -> u32 {
        at + HEADER_SIZE
    }
}

/// Iterator over the block chain, yielding `(header address, header)`
/// pairs. Stops after reporting a corrupt header.
pub struct BlockIter<'m> {
    bytes: &'m [u8],
    at: Option<u32>,
}

impl<'m> Iterator for BlockIter<'m> {
    type Item = Result<(u32, BlockHeader), MemFault>;

    fn next(&mut self) -> Option<Self::Item> {
        let at = self.at?;
        match BlockHeader::read(self.bytes, at) {
            Ok(header) => {
                self.at = match header.next {
                    0 => None,
                    step => Some(at + step as u32),
                };
                Some(Ok((at, header)))
            }
            Err(fault) => {
                self.at = None;
                Some(Err(fault))
            }
        }
    }
}

impl Memory {
    pub(crate) fn seed_heap(&mut self) {
        BlockHeader {
            size: HEAP_SIZE as u16,
            free: true,
            protection: Protection::empty(),
            next: 0,
        }
        .write(self.bytes_mut(), HEAP_BASE);
    }

    /// Walk the heap block chain from the heap base.
    pub fn heap_blocks(&self) -> BlockIter<'_> {
        BlockIter {
            bytes: self.bytes(),
            at: Some(HEAP_BASE),
        }
    }

    /// Allocate `size` payload bytes, first fit.
    ///
    /// The request is rounded up to [`MIN_PAYLOAD`] and then to a
    /// multiple of 4. A found block with enough surplus for another
    /// header plus minimum payload is split; the new block is handed
    /// out readable, writable and executable.
    pub fn alloc(&mut self, size: u32) -> Result<u16, MemFault> {
        if size > HEAP_SIZE {
            return Err(MemFault::Exhausted { size });
        }
        let payload = (size.max(MIN_PAYLOAD) + 3) & !3;
        let total = payload + HEADER_SIZE;

        let mut at = HEAP_BASE;
        loop {
            let header = BlockHeader::read(self.bytes(), at)?;
            let block_size = header.size as u32;
            if header.free && block_size >= total {
                if block_size >= total + HEADER_SIZE + MIN_PAYLOAD {
                    // Split: carve the tail off as a new free block and
                    // stitch it into the chain.
                    BlockHeader {
                        size: (block_size - total) as u16,
                        free: true,
                        protection: Protection::empty(),
                        next: match header.next {
                            0 => 0,
                            step => step - total as u16,
                        },
                    }
                    .write(self.bytes_mut(), at + total);
                    BlockHeader {
                        size: total as u16,
                        free: false,
                        protection: Protection::all(),
                        next: total as u16,
                    }
                    .write(self.bytes_mut(), at);
                } else {
                    BlockHeader {
                        free: false,
                        protection: Protection::all(),
                        ..header
                    }
                    .write(self.bytes_mut(), at);
                }
                let addr = BlockHeader::payload(at) as u16;
                log::trace!("heap: allocated {payload} payload bytes at {addr:#06x}");
                return Ok(addr);
            }
            match header.next {
                0 => break,
                step => at += step as u32,
            }
            if at >= HEAP_END {
                return Err(MemFault::CorruptHeap { addr: at });
            }
        }
        Err(MemFault::Exhausted { size })
    }

    /// Free the block whose payload contains `addr`.
    pub fn free(&mut self, addr: u16) -> Result<(), MemFault> {
        match self.block_containing(addr as u32)? {
            None => Err(MemFault::NotAllocated { addr: addr as u32 }),
            Some((_, header)) if header.free => Err(MemFault::DoubleFree { addr: addr as u32 }),
            Some((at, header)) => {
                BlockHeader {
                    free: true,
                    protection: Protection::empty(),
                    ..header
                }
                .write(self.bytes_mut(), at);
                self.coalesce()?;
                log::trace!("heap: freed block at {addr:#06x}");
                Ok(())
            }
        }
    }

    /// Replace the protection mask of the allocated block whose
    /// payload contains `addr`.
    pub fn protect(&mut self, addr: u16, protection: Protection) -> Result<(), MemFault> {
        match self.block_containing(addr as u32)? {
            Some((at, header)) if !header.free => {
                BlockHeader { protection, ..header }.write(self.bytes_mut(), at);
                Ok(())
            }
            _ => Err(MemFault::NotAllocated { addr: addr as u32 }),
        }
    }

    /// Locate the block whose payload range contains `addr`.
    /// Addresses outside the heap, inside header bytes, or past the
    /// chain yield `None`.
    fn block_containing(&self, addr: u32) -> Result<Option<(u32, BlockHeader)>, MemFault> {
        if !(HEAP_BASE..HEAP_END).contains(&addr) {
            return Ok(None);
        }
        for block in self.heap_blocks() {
            let (at, header) = block?;
            let payload = BlockHeader::payload(at);
            let end = at + header.size as u32;
            if addr >= payload && addr < end {
                return Ok(Some((at, header)));
            }
        }
        Ok(None)
    }

    pub(crate) fn check_heap(
        &self,
        addr: u32,
        size: u32,
        required: Protection,
    ) -> Result<(), MemFault> {
        match self.block_containing(addr)? {
            Some((at, header)) if !header.free => {
                let end = at + header.size as u32;
                if addr + size > end {
                    return Err(MemFault::UnallocatedHeap { addr, size });
                }
                if !header.protection.contains(required) {
                    return Err(MemFault::Protection { addr, required });
                }
                Ok(())
            }
            _ => Err(MemFault::UnallocatedHeap { addr, size }),
        }
    }

    /// Merge runs of adjacent free blocks. Keeps the tiling invariant:
    /// every non-terminal header's `next` equals its `size`.
    fn coalesce(&mut self) -> Result<(), MemFault> {
        let mut at = HEAP_BASE;
        loop {
            let header = BlockHeader::read(self.bytes(), at)?;
            if header.free && header.next != 0 {
                let next_at = at + header.next as u32;
                let next = BlockHeader::read(self.bytes(), next_at)?;
                if next.free {
                    let merged = header.size + next.size;
                    BlockHeader {
                        size: merged,
                        free: true,
                        protection: Protection::empty(),
                        next: match next.next {
                            0 => 0,
                            _ => merged,
                        },
                    }
                    .write(self.bytes_mut(), at);
                    continue;
                }
            }
            match header.next {
                0 => return Ok(()),
                step => at += step as u32,
            }
        }
    }
}
