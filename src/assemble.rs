use log::debug;

use crate::codec::HexCodec;
use crate::layout::PlannedImage;
use crate::region::RegionError;
use crate::{Region, RegionSet};

/// Collect the header and every placed block into one region set.
///
/// The planner never produces overlapping blocks; an overlap here means the
/// plan was corrupted and is reported instead of being written.
pub fn assemble(image: &PlannedImage) -> Result<RegionSet, RegionError> {
    let mut regions = RegionSet::new();
    regions.insert(Region::new(image.base_address(), image.header_bytes()));
    for block in image.blocks() {
        regions.insert(Region::new(block.address, block.payload.clone()));
    }
    regions.ensure_disjoint()?;

    debug!(
        "assembled {} regions, {} bytes, {:#X}..={:#X}",
        regions.len(),
        regions.total_bytes(),
        image.base_address(),
        image.end_address()
    );
    Ok(regions)
}

/// Assemble `image` and serialize it with `codec`.
pub fn render(image: &PlannedImage, codec: &dyn HexCodec) -> Result<Vec<u8>, RegionError> {
    let regions = assemble(image)?;
    Ok(codec.encode(&regions))
}
