//! Flat flash file system image builder.
//!
//! Input blocks (one contiguous region per hex file) are laid out back to
//! back after a small directory header at a configured flash address:
//!
//! 1. [`load_block`] decodes a file and checks it is a single region.
//! 2. [`plan`] assigns 4-byte aligned addresses and builds the [`Header`].
//! 3. [`assemble`] merges header and blocks; [`render`] encodes them.
//!
//! [`build_image`] and [`run`] drive the steps over a directory.

pub mod assemble;
pub mod build;
pub mod codec;
pub mod error;
pub mod header;
pub mod layout;
pub mod loader;
pub mod region;

pub use assemble::{assemble, render};
pub use build::{
    BuildOptions, BuiltImage, DEFAULT_BASE_ADDRESS, OUTPUT_FILE_NAME, build_image,
    discover_inputs, read_image_header, run,
};
pub use codec::{HexCodec, IntelHex, ParseError};
pub use error::BuildError;
pub use header::{Header, HeaderEntry, HeaderError, header_size};
pub use layout::{ALIGNMENT, LayoutError, PlacedBlock, PlannedImage, align_up, plan};
pub use loader::{LoadError, LoadedBlock, load_block};
pub use region::{Region, RegionError, RegionSet};
