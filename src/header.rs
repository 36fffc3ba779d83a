//! The directory header stored at the start of the flash area.
//!
//! Layout, all fields little-endian `u32`:
//!
//! ```text
//! offset 0          block count n
//! offset 4 + 8*i    entry[i].address
//! offset 8 + 8*i    entry[i].length     for i in 0..n
//! ```

use thiserror::Error;

use crate::RegionSet;

const WORD: usize = 4;
const ENTRY_SIZE: usize = 2 * WORD;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("header truncated: need {expected} bytes, have {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("header declares {count} blocks, more than fit in the address space")]
    CountTooLarge { count: u32 },

    #[error("no header data at {address:#X}")]
    Missing { address: u32 },
}

/// Size in bytes of a header describing `count` blocks.
pub const fn header_size(count: usize) -> usize {
    WORD + ENTRY_SIZE * count
}

/// Where one block sits in flash and how many bytes it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderEntry {
    pub address: u32,
    pub length: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    entries: Vec<HeaderEntry>,
}

impl Header {
    pub fn new(entries: Vec<HeaderEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[HeaderEntry] {
        &self.entries
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn size(&self) -> usize {
        header_size(self.entries.len())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.size());
        buf.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for entry in &self.entries {
            buf.extend_from_slice(&entry.address.to_le_bytes());
            buf.extend_from_slice(&entry.length.to_le_bytes());
        }
        buf
    }

    /// Decode a header from the start of `bytes`. Trailing bytes are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HeaderError> {
        let count = read_u32(bytes, 0).ok_or(HeaderError::Truncated {
            expected: WORD,
            actual: bytes.len(),
        })?;
        let expected = checked_header_size(count)?;
        if bytes.len() < expected {
            return Err(HeaderError::Truncated {
                expected,
                actual: bytes.len(),
            });
        }

        let entries = bytes[WORD..expected]
            .chunks_exact(ENTRY_SIZE)
            .map(|chunk| HeaderEntry {
                address: u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
                length: u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]),
            })
            .collect();

        Ok(Self { entries })
    }

    /// Re-derive the header of a decoded image whose flash area starts at
    /// `base_address`.
    pub fn read_from(regions: &RegionSet, base_address: u32) -> Result<Self, HeaderError> {
        let count_bytes = regions
            .read_bytes(base_address, WORD)
            .ok_or(HeaderError::Missing {
                address: base_address,
            })?;
        let count = read_u32(&count_bytes, 0).ok_or(HeaderError::Missing {
            address: base_address,
        })?;
        let size = checked_header_size(count)?;
        let bytes = regions
            .read_bytes(base_address, size)
            .ok_or(HeaderError::Truncated {
                expected: size,
                actual: available_from(regions, base_address),
            })?;
        Self::from_bytes(&bytes)
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let word = bytes.get(offset..offset + WORD)?;
    Some(u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
}

fn checked_header_size(count: u32) -> Result<usize, HeaderError> {
    (count as usize)
        .checked_mul(ENTRY_SIZE)
        .and_then(|n| n.checked_add(WORD))
        .filter(|&n| n <= u32::MAX as usize)
        .ok_or(HeaderError::CountTooLarge { count })
}

fn available_from(regions: &RegionSet, address: u32) -> usize {
    regions
        .regions()
        .iter()
        .find(|r| address >= r.address && address <= r.end_address())
        .map_or(0, |r| r.len() - (address - r.address) as usize)
}
