//! Hex container encoding.
//!
//! The layout core only talks to [`HexCodec`]; [`IntelHex`] is the codec the
//! binary uses.

mod error;
mod intel_hex;

pub use error::ParseError;
pub use intel_hex::IntelHex;

use crate::RegionSet;

/// Decode a container into regions and encode regions back into one.
pub trait HexCodec {
    /// Decode `input`. The returned set is normalized: sorted, touching
    /// records merged, no overlaps.
    fn decode(&self, input: &[u8]) -> Result<RegionSet, ParseError>;

    /// Encode `regions` into container bytes.
    fn encode(&self, regions: &RegionSet) -> Vec<u8>;
}

/// In-memory codec over one `ADDRESS:BYTES` line per region, both in hex.
#[cfg(test)]
pub(crate) mod fake {
    use super::{HexCodec, ParseError};
    use crate::{Region, RegionSet};

    pub(crate) struct FakeCodec;

    impl HexCodec for FakeCodec {
        fn decode(&self, input: &[u8]) -> Result<RegionSet, ParseError> {
            let text = String::from_utf8_lossy(input);
            let mut regions = RegionSet::new();
            for (index, line) in text.lines().enumerate() {
                let invalid = |message: &str| ParseError::InvalidRecord {
                    line: index + 1,
                    message: message.to_string(),
                };
                let (address, bytes) = line.split_once(':').ok_or_else(|| invalid("no ':'"))?;
                let address =
                    u32::from_str_radix(address, 16).map_err(|_| invalid("bad address"))?;
                let data = (0..bytes.len())
                    .step_by(2)
                    .map(|i| {
                        bytes
                            .get(i..i + 2)
                            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                            .ok_or_else(|| invalid("bad byte"))
                    })
                    .collect::<Result<Vec<u8>, _>>()?;
                regions.insert(Region::new(address, data));
            }
            Ok(regions.normalized()?)
        }

        fn encode(&self, regions: &RegionSet) -> Vec<u8> {
            let mut out = String::new();
            for region in regions.regions() {
                out.push_str(&format!("{:X}:", region.address));
                for b in &region.data {
                    out.push_str(&format!("{b:02X}"));
                }
                out.push('\n');
            }
            out.into_bytes()
        }
    }
}
