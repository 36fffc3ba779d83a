#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};

use flashfs::{HexCodec, IntelHex, Region, RegionSet};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

pub fn temp_dir(prefix: &str) -> PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let mut dir = std::env::temp_dir();
    dir.push(format!("flashfs_{prefix}_{}_{}", std::process::id(), id));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write an Intel HEX file holding one region per `(address, data)` pair.
pub fn write_hex(path: &Path, regions: &[(u32, Vec<u8>)]) {
    let set = RegionSet::with_regions(
        regions
            .iter()
            .map(|(address, data)| Region::new(*address, data.clone()))
            .collect(),
    );
    std::fs::write(path, IntelHex::default().encode(&set)).unwrap();
}

/// Run the binary with `dir` as working directory.
pub fn run_flashfs(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_flashfs"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

pub fn assert_success(output: &Output) {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("flashfs failed: {stderr}");
    }
}

pub fn read_image(path: &Path) -> RegionSet {
    let data = std::fs::read(path).unwrap();
    IntelHex::default().decode(&data).unwrap()
}
