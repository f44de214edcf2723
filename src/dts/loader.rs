//! External file loader for `/incbin/` payloads (spec §4.G, §9).

use crate::error::Error;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

/// Resolves `/incbin/` references to raw bytes.
///
/// The DTS parser never touches the filesystem directly; it asks an
/// `IncBinLoader` for bytes instead, so callers (tests included) can supply
/// in-memory contents without a real filesystem underneath.
pub trait IncBinLoader {
    /// Reads `length` bytes starting at `offset` from the file named by
    /// `path`. `length == 0` means "read to the end of the file".
    fn load(&self, path: &str, offset: u64, length: u64) -> Result<Vec<u8>, Error>;
}

/// The default [`IncBinLoader`], backed by the real filesystem.
///
/// `path` (as written in the DTS source) is resolved relative to
/// `root_dir`.
pub struct FsLoader {
    root_dir: PathBuf,
}

impl FsLoader {
    /// Creates a loader that resolves `/incbin/` paths under `root_dir`.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }
}

impl IncBinLoader for FsLoader {
    fn load(&self, path: &str, offset: u64, length: u64) -> Result<Vec<u8>, Error> {
        let mut file = File::open(self.root_dir.join(path))?;
        if offset != 0 {
            file.seek(SeekFrom::Start(offset))?;
        }
        let mut buf = Vec::new();
        if length == 0 {
            file.read_to_end(&mut buf)?;
        } else {
            buf.resize(length as usize, 0);
            file.read_exact(&mut buf)?;
        }
        Ok(buf)
    }
}
