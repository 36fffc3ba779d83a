use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegionError {
    #[error(
        "overlapping regions at address {address:#X}: existing {existing_start:#X}..={existing_end:#X}, new {new_start:#X}..={new_end:#X}"
    )]
    Overlapping {
        address: u32,
        existing_start: u32,
        existing_end: u32,
        new_start: u32,
        new_end: u32,
    },
}

/// A contiguous run of bytes at an absolute address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub address: u32,
    pub data: Vec<u8>,
}

impl Region {
    pub fn new(address: u32, data: Vec<u8>) -> Self {
        debug_assert!(
            data.len() <= u32::MAX as usize,
            "region data exceeds u32::MAX bytes"
        );
        Self { address, data }
    }

    /// Inclusive end address. Equal to `address` for an empty region.
    pub fn end_address(&self) -> u32 {
        if self.data.is_empty() {
            self.address
        } else {
            self.address.saturating_add(self.data.len() as u32 - 1)
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.address <= other.end_address()
            && other.address <= self.end_address()
    }

    /// True when `other` starts on the byte right after this region.
    pub fn touches(&self, other: &Region) -> bool {
        self.end_address().checked_add(1) == Some(other.address)
    }
}

/// An ordered set of regions, as produced by decoding a hex container or
/// assembled for encoding one.
///
/// Empty regions are never stored. Insertion order is kept until
/// `normalized()` sorts and merges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionSet {
    regions: Vec<Region>,
}

impl RegionSet {
    pub fn new() -> Self {
        Self { regions: vec![] }
    }

    pub fn with_regions(regions: Vec<Region>) -> Self {
        Self {
            regions: regions.into_iter().filter(|r| !r.is_empty()).collect(),
        }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn into_regions(self) -> Vec<Region> {
        self.regions
    }

    pub fn insert(&mut self, region: Region) {
        if region.is_empty() {
            return;
        }
        self.regions.push(region);
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn min_address(&self) -> Option<u32> {
        self.regions.iter().map(|r| r.address).min()
    }

    pub fn max_address(&self) -> Option<u32> {
        self.regions.iter().map(|r| r.end_address()).max()
    }

    pub fn total_bytes(&self) -> usize {
        self.regions.iter().map(|r| r.len()).sum()
    }

    /// Returns a sorted copy where touching regions are merged into one.
    /// Errors on the first pair of overlapping regions.
    pub fn normalized(&self) -> Result<RegionSet, RegionError> {
        self.ensure_disjoint()?;

        let mut sorted = self.regions.clone();
        sorted.sort_by_key(|r| r.address);

        let mut merged: Vec<Region> = Vec::with_capacity(sorted.len());
        for region in sorted {
            match merged.last_mut() {
                Some(last) if last.touches(&region) => last.data.extend(region.data),
                _ => merged.push(region),
            }
        }
        Ok(RegionSet { regions: merged })
    }

    /// Errors on the first pair of overlapping regions, in address order.
    pub fn ensure_disjoint(&self) -> Result<(), RegionError> {
        let mut sorted: Vec<&Region> = self.regions.iter().collect();
        sorted.sort_by_key(|r| r.address);
        match sorted.windows(2).find(|pair| pair[0].overlaps(pair[1])) {
            Some([existing, new]) => Err(RegionError::Overlapping {
                address: new.address,
                existing_start: existing.address,
                existing_end: existing.end_address(),
                new_start: new.address,
                new_end: new.end_address(),
            }),
            _ => Ok(()),
        }
    }

    /// Read `len` bytes starting at `address`. `None` if any byte is uncovered.
    pub fn read_bytes(&self, address: u32, len: usize) -> Option<Vec<u8>> {
        let region = self.regions.iter().find(|r| {
            address >= r.address && address <= r.end_address()
        })?;
        let offset = (address - region.address) as usize;
        region.data.get(offset..offset.checked_add(len)?).map(<[u8]>::to_vec)
    }
}
