use log::debug;
use thiserror::Error;

use crate::codec::{HexCodec, ParseError};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{file}: malformed input: {source}")]
    MalformedInput {
        file: String,
        #[source]
        source: ParseError,
    },

    #[error("{file}: a hex file should contain exactly one contiguous block, found {count}")]
    MultiRegionInput { file: String, count: usize },
}

/// The payload of one input file, ready for placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedBlock {
    /// File name, for diagnostics.
    pub source_name: String,
    /// Address the payload was linked at in its own file.
    pub origin: u32,
    pub payload: Vec<u8>,
}

impl LoadedBlock {
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Decode one input file and check it holds a single contiguous region.
pub fn load_block(
    codec: &dyn HexCodec,
    source_name: &str,
    input: &[u8],
) -> Result<LoadedBlock, LoadError> {
    let regions = codec
        .decode(input)
        .map_err(|source| LoadError::MalformedInput {
            file: source_name.to_string(),
            source,
        })?;

    for region in regions.regions() {
        debug!(
            "{source_name}: offset {:#X} len {} [{}]",
            region.address,
            region.len(),
            preview(&region.data)
        );
    }

    match <[_; 1]>::try_from(regions.into_regions()) {
        Ok([region]) => Ok(LoadedBlock {
            source_name: source_name.to_string(),
            origin: region.address,
            payload: region.data,
        }),
        Err(regions) => Err(LoadError::MultiRegionInput {
            file: source_name.to_string(),
            count: regions.len(),
        }),
    }
}

/// First and last two bytes of a payload.
fn preview(data: &[u8]) -> String {
    let hex = |bytes: &[u8]| {
        bytes
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    if data.len() <= 4 {
        hex(data)
    } else {
        format!("{} ... {}", hex(&data[..2]), hex(&data[data.len() - 2..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::fake::FakeCodec;

    #[test]
    fn test_single_region() {
        let block = load_block(&FakeCodec, "app.hex", b"1000:0102030405").unwrap();
        assert_eq!(block.source_name, "app.hex");
        assert_eq!(block.origin, 0x1000);
        assert_eq!(block.payload, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_touching_records_count_as_one() {
        let block = load_block(&FakeCodec, "a.hex", b"1002:0304\n1000:0102").unwrap();
        assert_eq!(block.payload, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_two_regions_rejected() {
        let err = load_block(&FakeCodec, "split.hex", b"1000:01\n2000:02").unwrap_err();
        assert!(matches!(
            err,
            LoadError::MultiRegionInput { ref file, count: 2 } if file == "split.hex"
        ));
        assert!(err.to_string().starts_with("split.hex:"));
    }

    #[test]
    fn test_no_region_rejected() {
        assert!(matches!(
            load_block(&FakeCodec, "empty.hex", b""),
            Err(LoadError::MultiRegionInput { count: 0, .. })
        ));
    }

    #[test]
    fn test_malformed_rejected() {
        let err = load_block(&FakeCodec, "junk.hex", b"not a block").unwrap_err();
        assert!(matches!(
            err,
            LoadError::MalformedInput { ref file, .. } if file == "junk.hex"
        ));
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview(&[1, 2, 3]), "01, 02, 03");
        assert_eq!(preview(&[1, 2, 3, 4, 5, 6]), "01, 02 ... 05, 06");
    }
}
