use std::path::PathBuf;

use thiserror::Error;

use crate::header::HeaderError;
use crate::layout::LayoutError;
use crate::loader::LoadError;
use crate::region::RegionError;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot read directory {}: {source}", .path.display())]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read {}: {source}", .path.display())]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("internal layout error: {0}")]
    OverlapDetected(#[from] RegionError),

    #[error("{}: {source}", .path.display())]
    Header {
        path: PathBuf,
        #[source]
        source: HeaderError,
    },

    #[error("cannot write {}: {source}", .path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
