use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use ard_log::{debug, warn};
use ard_shader_core::io;
use thiserror::Error;

use crate::data::ReflectionData;

/// Tag at the start of every reflection cache file.
pub const REFLECTION_CACHE_MAGIC: [u8; 4] = *b"ARSR";

/// Bumped whenever the layout of [`ReflectionData`] changes.
pub const REFLECTION_CACHE_VERSION: u32 = 1;

/// Folder inside the cache directory holding reflection data.
pub const REFLECTION_DIR_NAME: &str = "reflection";

const HEADER_SIZE: usize = 8;

#[derive(Debug, Error)]
pub enum ReflectionCacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing or corrupted header")]
    BadMagic,
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
}

/// Reflection data on disk, one file per shader file name.
///
/// Files start with [`REFLECTION_CACHE_MAGIC`] and a little endian format version, followed by
/// the bincode encoded [`ReflectionData`]. Anything that doesn't match is treated as a missing
/// file.
#[derive(Debug, Clone)]
pub struct ReflectionCache {
    dir: PathBuf,
}

impl ReflectionCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[inline]
    pub fn in_dir(cache_dir: &Path) -> Self {
        Self::new(cache_dir.join(REFLECTION_DIR_NAME))
    }

    #[inline(always)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, shader: &Path) -> PathBuf {
        let file_name = shader
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();
        self.dir.join(format!("{file_name}.refl"))
    }

    /// Reads the cached reflection data of `shader`.
    pub fn try_read(&self, shader: &Path) -> Option<ReflectionData> {
        let path = self.path(shader);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                warn!("unable to read reflection cache `{}`: {err}", path.display());
                return None;
            }
        };

        match decode(&bytes) {
            Ok(data) => Some(data),
            Err(err) => {
                debug!("ignoring reflection cache `{}`: {err}", path.display());
                None
            }
        }
    }

    pub fn write(&self, shader: &Path, data: &ReflectionData) -> Result<(), ReflectionCacheError> {
        let bytes = encode(data)?;
        io::write_bytes_atomic(&self.path(shader), &bytes)?;
        Ok(())
    }

    /// Deletes all cached reflection data.
    pub fn clear(&self) -> std::io::Result<()> {
        match std::fs::remove_dir_all(&self.dir) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

pub fn encode(data: &ReflectionData) -> Result<Vec<u8>, ReflectionCacheError> {
    let mut bytes = Vec::with_capacity(256);
    bytes.extend_from_slice(&REFLECTION_CACHE_MAGIC);
    bytes.extend_from_slice(&REFLECTION_CACHE_VERSION.to_le_bytes());
    bincode::serialize_into(&mut bytes, data)?;
    Ok(bytes)
}

/// Decodes a cache file. The header is verified before anything else is looked at.
pub fn decode(bytes: &[u8]) -> Result<ReflectionData, ReflectionCacheError> {
    if bytes.len() < HEADER_SIZE || bytes[..4] != REFLECTION_CACHE_MAGIC {
        return Err(ReflectionCacheError::BadMagic);
    }

    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != REFLECTION_CACHE_VERSION {
        return Err(ReflectionCacheError::UnsupportedVersion(version));
    }

    Ok(bincode::deserialize(&bytes[HEADER_SIZE..])?)
}
