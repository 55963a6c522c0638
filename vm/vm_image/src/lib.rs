//! The VM32 program-image container.
//!
//! This crate is the ABI boundary shared with the assembler that
//! produces images: the 32-byte little-endian header, the segment
//! payloads that follow it, and the optional debug symbol table.
//! Nothing in here touches engine state; the loader decides where the
//! parsed pieces land in memory.

mod symbols;

use thiserror::Error;

pub use symbols::{SourceLine, Symbol, SymbolKind, SymbolTable};

/// Magic bytes at offset 0 of every container.
pub const MAGIC: [u8; 4] = *b"VM32";

/// Fixed size of the container header in bytes.
pub const HEADER_LEN: usize = 32;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("not a VM32 container")]
    BadMagic,
    #[error("image truncated: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },
    #[error("malformed symbol table at byte {at}")]
    MalformedSymbols { at: usize },
}

/// Decoded container header.
///
/// Field order on disk: magic, major u16, minor u16, header length
/// u32, code base u32, code size u32, data base u32, data size u32,
/// symbol table size u32. All little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub major: u16,
    pub minor: u16,
    pub header_len: u32,
    pub code_base: u32,
    pub code_size: u32,
    pub data_base: u32,
    pub data_size: u32,
    pub symbol_size: u32,
}

/// Whether a byte stream carries the container magic.
pub fn is_container(bytes: &[u8]) -> bool {
    bytes.len() >= MAGIC.len() && bytes[..MAGIC.len()] == MAGIC
}

impl ImageHeader {
    pub fn parse(bytes: &[u8]) -> Result<ImageHeader, ImageError> {
        if !is_container(bytes) {
            return Err(ImageError::BadMagic);
        }
        if bytes.len() < HEADER_LEN {
            return Err(ImageError::Truncated {
                needed: HEADER_LEN,
                have: bytes.len(),
            });
        }
        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        Ok(ImageHeader {
            major: u16_at(4),
            minor: u16_at(6),
            header_len: u32_at(8),
            code_base: u32_at(12),
            code_size: u32_at(16),
            data_base: u32_at(20),
            data_size: u32_at(24),
            symbol_size: u32_at(28),
        })
    }

    /// Serialize the header; the inverse of [`ImageHeader::parse`].
    /// Used by the assembler side and by tests building containers.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&self.major.to_le_bytes());
        out.extend_from_slice(&self.minor.to_le_bytes());
        out.extend_from_slice(&self.header_len.to_le_bytes());
        out.extend_from_slice(&self.code_base.to_le_bytes());
        out.extend_from_slice(&self.code_size.to_le_bytes());
        out.extend_from_slice(&self.data_base.to_le_bytes());
        out.extend_from_slice(&self.data_size.to_le_bytes());
        out.extend_from_slice(&self.symbol_size.to_le_bytes());
    }
}

/// Borrowed view of a parsed container: header plus the three payload
/// slices in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Image<'a> {
    pub header: ImageHeader,
    pub code: &'a [u8],
    pub data: &'a [u8],
    pub symbols: &'a [u8],
}

impl<'a> Image<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Image<'a>, ImageError> {
        let header = ImageHeader::parse(bytes)?;
        let code_at = header.header_len as usize;
        let data_at = code_at + header.code_size as usize;
        let symbols_at = data_at + header.data_size as usize;
        let end = symbols_at + header.symbol_size as usize;
        if bytes.len() < end {
            return Err(ImageError::Truncated {
                needed: end,
                have: bytes.len(),
            });
        }
        Ok(Image {
            header,
            code: &bytes[code_at..data_at],
            data: &bytes[data_at..symbols_at],
            symbols: &bytes[symbols_at..end],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> ImageHeader {
        ImageHeader {
            major: 1,
            minor: 2,
            header_len: HEADER_LEN as u32,
            code_base: 0x0000,
            code_size: 8,
            data_base: 0x4000,
            data_size: 4,
            symbol_size: 0,
        }
    }

    #[test]
    fn header_round_trips() {
        let header = sample_header();
        let mut bytes = Vec::new();
        header.write_to(&mut bytes);
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(ImageHeader::parse(&bytes), Ok(header));
    }

    #[test]
    fn magic_is_checked_first() {
        assert_eq!(ImageHeader::parse(b"ELF!"), Err(ImageError::BadMagic));
        assert!(!is_container(b"VM"));
        assert!(is_container(b"VM32"));
    }

    #[test]
    fn payload_slices_follow_the_header_in_order() {
        let header = sample_header();
        let mut bytes = Vec::new();
        header.write_to(&mut bytes);
        bytes.extend_from_slice(&[0xAA; 8]);
        bytes.extend_from_slice(&[0xBB; 4]);

        let image = Image::parse(&bytes).unwrap();
        assert_eq!(image.code, &[0xAA; 8]);
        assert_eq!(image.data, &[0xBB; 4]);
        assert!(image.symbols.is_empty());
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let header = sample_header();
        let mut bytes = Vec::new();
        header.write_to(&mut bytes);
        bytes.extend_from_slice(&[0xAA; 4]);
        assert_eq!(
            Image::parse(&bytes),
            Err(ImageError::Truncated {
                needed: HEADER_LEN + 12,
                have: HEADER_LEN + 4,
            })
        );
    }
}
