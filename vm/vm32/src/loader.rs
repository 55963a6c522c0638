//! Program image placement.
//!
//! Container streams are placed exactly where their header says;
//! anything else is treated as raw code starting at the bottom of the
//! code segment, allowed to spill over into the data segment.

use crate::errors::VmError;
use crate::machine::Vm;
use segmem::{MemFault, CODE_BASE, CODE_SIZE, DATA_SIZE};
use vm_image::{Image, SymbolTable};

pub(crate) fn load(vm: &mut Vm, bytes: &[u8]) -> Result<(), VmError> {
    if vm_image::is_container(bytes) {
        let image = Image::parse(bytes)?;
        let header = &image.header;
        log::debug!(
            "loading container v{}.{}: {} code bytes at {:#06x}, {} data bytes at {:#06x}",
            header.major,
            header.minor,
            header.code_size,
            header.code_base,
            header.data_size,
            header.data_base,
        );
        vm.mem.load_chunk(header.code_base, image.code)?;
        vm.mem.load_chunk(header.data_base, image.data)?;
        if vm.debug_mode && !image.symbols.is_empty() {
            vm.symbols = Some(SymbolTable::parse(image.symbols)?);
        }
        vm.cpu.set_pc(header.code_base);
    } else {
        let len = bytes.len() as u32;
        if len > CODE_SIZE + DATA_SIZE {
            return Err(VmError::Memory(MemFault::OutOfRange {
                addr: CODE_BASE,
                size: len,
            }));
        }
        if len > CODE_SIZE {
            log::debug!("raw stream of {len} bytes overflows into the data segment");
        }
        vm.mem.load_chunk(CODE_BASE, bytes)?;
        vm.cpu.set_pc(CODE_BASE);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::errors::ErrorCode;
    use crate::machine::Vm;
    use segmem::{CODE_BASE, CODE_SIZE, DATA_BASE, DATA_SIZE};
    use vm_image::{ImageHeader, HEADER_LEN};

    fn container(code: &[u8], data: &[u8], symbols: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        ImageHeader {
            major: 1,
            minor: 0,
            header_len: HEADER_LEN as u32,
            code_base: CODE_BASE,
            code_size: code.len() as u32,
            data_base: DATA_BASE,
            data_size: data.len() as u32,
            symbol_size: symbols.len() as u32,
        }
        .write_to(&mut bytes);
        bytes.extend_from_slice(code);
        bytes.extend_from_slice(data);
        bytes.extend_from_slice(symbols);
        bytes
    }

    #[test]
    fn container_segments_land_at_their_bases() {
        let mut vm = Vm::new();
        vm.load(&container(&[1, 2, 3, 4], b"hi\0", &[])).unwrap();
        assert_eq!(vm.cpu.pc(), CODE_BASE);
        assert_eq!(vm.mem.read_u32(CODE_BASE as u16).unwrap(), 0x0403_0201);
        assert_eq!(vm.mem.read_u8(DATA_BASE as u16).unwrap(), b'h');
    }

    #[test]
    fn symbols_are_captured_only_in_debug_mode() {
        // An empty but valid table: zero symbols, zero lines.
        let table = [0u8; 8];
        let image = container(&[0; 4], &[], &table);

        let mut vm = Vm::new();
        vm.load(&image).unwrap();
        assert!(vm.symbols().is_none());

        let mut vm = Vm::new();
        vm.set_debug_mode(true);
        vm.load(&image).unwrap();
        assert!(vm.symbols().is_some());
    }

    #[test]
    fn raw_stream_loads_at_the_code_base() {
        let mut vm = Vm::new();
        vm.load(&[0x00; 16]).unwrap();
        assert_eq!(vm.cpu.pc(), CODE_BASE);
    }

    #[test]
    fn raw_stream_may_overflow_into_data_only() {
        let mut vm = Vm::new();
        let just_fits = vec![0u8; (CODE_SIZE + DATA_SIZE) as usize];
        vm.load(&just_fits).unwrap();

        let too_big = vec![0u8; (CODE_SIZE + DATA_SIZE + 1) as usize];
        let err = vm.load(&too_big).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SegmentationFault);
    }

    #[test]
    fn truncated_container_is_an_io_error() {
        let mut vm = Vm::new();
        let mut image = container(&[1, 2, 3, 4], &[], &[]);
        image.truncate(HEADER_LEN + 2);
        let err = vm.load(&image).unwrap_err();
        assert_eq!(err.code(), ErrorCode::IoError);
    }
}
