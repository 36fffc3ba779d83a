use log::{debug, info, warn};
use thiserror::Error;

use crate::header::{Header, HeaderEntry, header_size};
use crate::loader::LoadedBlock;

/// Block lengths are padded to a multiple of this before the next block.
pub const ALIGNMENT: u32 = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("header for {count} blocks at {base:#X} overflows the 32-bit address space")]
    HeaderOverflow { base: u32, count: usize },

    #[error("{name}: {length} bytes at {address:#X} overflow the 32-bit address space")]
    BlockOverflow {
        name: String,
        address: u64,
        length: usize,
    },
}

/// Round `value` up to the next multiple of [`ALIGNMENT`]. Already aligned
/// values are returned unchanged.
pub fn align_up(value: u32) -> Option<u32> {
    value.checked_add((ALIGNMENT - value % ALIGNMENT) % ALIGNMENT)
}

fn padded(length: u64) -> u64 {
    let alignment = ALIGNMENT as u64;
    length + (alignment - length % alignment) % alignment
}

/// A block with its assigned flash address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedBlock {
    pub address: u32,
    pub source_name: String,
    pub payload: Vec<u8>,
}

impl PlacedBlock {
    /// Address one past the last payload byte.
    pub fn end(&self) -> u64 {
        self.address as u64 + self.payload.len() as u64
    }
}

/// The complete layout of one flash image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedImage {
    base_address: u32,
    header: Header,
    blocks: Vec<PlacedBlock>,
}

impl PlannedImage {
    pub fn base_address(&self) -> u32 {
        self.base_address
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn header_bytes(&self) -> Vec<u8> {
        self.header.to_bytes()
    }

    pub fn blocks(&self) -> &[PlacedBlock] {
        &self.blocks
    }

    /// Inclusive last address used by the image.
    pub fn end_address(&self) -> u32 {
        match self.blocks.last() {
            Some(block) => (block.end() - 1) as u32,
            None => self.base_address + (header_size(0) as u32 - 1),
        }
    }
}

/// Place `blocks` after the header at `base_address`, in the given order.
///
/// Block `i` starts at `base_address + header_size(n)` plus the padded
/// lengths of the blocks before it. Addresses are computed in `u64`; only a
/// block whose last byte lies above `u32::MAX` is rejected.
pub fn plan(base_address: u32, blocks: Vec<LoadedBlock>) -> Result<PlannedImage, LayoutError> {
    let count = blocks.len();
    let first = base_address as u64 + header_size(count) as u64;
    if first - 1 > u32::MAX as u64 {
        return Err(LayoutError::HeaderOverflow {
            base: base_address,
            count,
        });
    }

    info!("planning {count} blocks at {base_address:#X}");
    if base_address % ALIGNMENT != 0 {
        warn!("base address {base_address:#X} is not {ALIGNMENT}-byte aligned");
    }

    let mut entries = Vec::with_capacity(count);
    let mut placed = Vec::with_capacity(count);
    let mut offset: u64 = 0;

    for block in blocks {
        let start = first + offset;
        let length = block.len() as u64;
        let last = start + length.max(1) - 1;
        if last > u32::MAX as u64 {
            return Err(LayoutError::BlockOverflow {
                name: block.source_name,
                address: start,
                length: block.payload.len(),
            });
        }
        let (address, length) = (start as u32, length as u32);

        debug!(
            "{}: addr {address:#X} len {length} (origin {:#X})",
            block.source_name, block.origin
        );
        entries.push(HeaderEntry { address, length });
        placed.push(PlacedBlock {
            address,
            source_name: block.source_name,
            payload: block.payload,
        });
        offset += padded(length as u64);
    }

    Ok(PlannedImage {
        base_address,
        header: Header::new(entries),
        blocks: placed,
    })
}
