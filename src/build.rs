use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::codec::{HexCodec, IntelHex};
use crate::error::BuildError;
use crate::header::Header;
use crate::layout::{PlannedImage, plan};
use crate::loader::{LoadError, load_block};
use crate::render;

/// File name of the built image. Never picked up as an input.
pub const OUTPUT_FILE_NAME: &str = "flashfs.hex";

pub const DEFAULT_BASE_ADDRESS: u32 = 0x40000;

const INPUT_SUFFIX: &str = ".hex";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Flash address of the header.
    pub base_address: u32,
    pub input_dir: PathBuf,
    pub output: PathBuf,
    /// Data bytes per Intel HEX record in the output.
    pub bytes_per_line: u8,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            base_address: DEFAULT_BASE_ADDRESS,
            input_dir: PathBuf::from("."),
            output: PathBuf::from(OUTPUT_FILE_NAME),
            bytes_per_line: 16,
        }
    }
}

/// A planned image and its encoded bytes.
#[derive(Debug, Clone)]
pub struct BuiltImage {
    pub image: PlannedImage,
    pub bytes: Vec<u8>,
}

/// List `*.hex` regular files directly inside `dir`, sorted by name.
/// Names in `exclude` are skipped.
pub fn discover_inputs(dir: &Path, exclude: &[&OsStr]) -> Result<Vec<PathBuf>, BuildError> {
    let read_err = |source: std::io::Error| BuildError::DirectoryRead {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let name = entry.file_name();
        let Some(name_str) = name.to_str() else {
            debug!("skipping non UTF-8 name {name:?}");
            continue;
        };
        if !name_str.ends_with(INPUT_SUFFIX) || exclude.contains(&name.as_os_str()) {
            continue;
        }
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        files.push(path);
    }
    files.sort();

    debug!(
        "input files: {:?}",
        files
            .iter()
            .filter_map(|p| p.file_name())
            .collect::<Vec<_>>()
    );
    Ok(files)
}

/// Discover, load, plan and encode, without touching the output file.
pub fn build_image(options: &BuildOptions, codec: &dyn HexCodec) -> Result<BuiltImage, BuildError> {
    info!("start address = {:#X}", options.base_address);
    info!("directory = {}", options.input_dir.display());

    let mut exclude = vec![OsStr::new(OUTPUT_FILE_NAME)];
    if let Some(name) = options.output.file_name() {
        exclude.push(name);
    }

    let paths = discover_inputs(&options.input_dir, &exclude)?;
    info!("count: {}", paths.len());

    let mut blocks = Vec::with_capacity(paths.len());
    for path in &paths {
        let input = std::fs::read(path).map_err(|source| BuildError::ReadInput {
            path: path.clone(),
            source,
        })?;
        blocks.push(load_block(codec, &display_name(path), &input)?);
    }

    let image = plan(options.base_address, blocks)?;
    let bytes = render(&image, codec)?;
    Ok(BuiltImage { image, bytes })
}

/// Build with the Intel HEX codec and write the result to `options.output`.
/// Nothing is written unless the whole image was built.
pub fn run(options: &BuildOptions) -> Result<BuiltImage, BuildError> {
    let codec = IntelHex::new(options.bytes_per_line);
    let built = build_image(options, &codec)?;

    write_replacing(&options.output, &built.bytes).map_err(|source| BuildError::OutputWrite {
        path: options.output.clone(),
        source,
    })?;
    info!(
        "wrote {} blocks to {}",
        built.image.block_count(),
        options.output.display()
    );
    Ok(built)
}

/// Decode a built image and read back its header.
pub fn read_image_header(
    path: &Path,
    base_address: u32,
    codec: &dyn HexCodec,
) -> Result<Header, BuildError> {
    let input = std::fs::read(path).map_err(|source| BuildError::ReadInput {
        path: path.to_path_buf(),
        source,
    })?;
    let regions = codec
        .decode(&input)
        .map_err(|source| LoadError::MalformedInput {
            file: display_name(path),
            source,
        })?;
    Header::read_from(&regions, base_address).map_err(|source| BuildError::Header {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `bytes` to a sibling temp file, then rename it over `path`, so
/// `path` is either the old content or the complete new one.
fn write_replacing(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let temp = temp_sibling(path);
    let result = std::fs::write(&temp, bytes).and_then(|()| std::fs::rename(&temp, path));
    if result.is_err() {
        let _ = std::fs::remove_file(&temp);
    }
    result
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = std::ffi::OsString::from(".");
    name.push(path.file_name().unwrap_or(OsStr::new(OUTPUT_FILE_NAME)));
    name.push(".tmp");
    path.with_file_name(name)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
