use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use ard_log::warn;
use ard_shader_core::{io, prelude::ShaderStage};

use crate::backend::BinaryVariant;

/// Folder inside the cache directory holding compiled binaries.
pub const BINARY_DIR_NAME: &str = "binaries";

/// Compiled SPIR-V on disk. One headerless word file per shader file name, stage and variant.
#[derive(Debug, Clone)]
pub struct BinaryCache {
    dir: PathBuf,
}

impl BinaryCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[inline]
    pub fn in_dir(cache_dir: &Path) -> Self {
        Self::new(cache_dir.join(BINARY_DIR_NAME))
    }

    #[inline(always)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a cached binary. Named `<file name>.<stage>.spv` for release binaries and
    /// `<file name>.<stage>.debug.spv` for debug binaries.
    pub fn path(&self, shader: &Path, stage: ShaderStage, variant: BinaryVariant) -> PathBuf {
        let file_name = shader
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();
        let debug = if variant.is_debug() { ".debug" } else { "" };
        self.dir
            .join(format!("{file_name}.{}{debug}.spv", stage.short_name()))
    }

    /// Loads a cached binary. Missing and empty files yield `None`.
    pub fn load(
        &self,
        shader: &Path,
        stage: ShaderStage,
        variant: BinaryVariant,
    ) -> Option<Vec<u32>> {
        let path = self.path(shader, stage, variant);
        match io::read_words(&path) {
            Ok(words) if words.is_empty() => None,
            Ok(words) => Some(words),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                warn!("unable to read cached binary `{}`: {err}", path.display());
                None
            }
        }
    }

    pub fn store(
        &self,
        shader: &Path,
        stage: ShaderStage,
        variant: BinaryVariant,
        words: &[u32],
    ) -> std::io::Result<()> {
        io::write_words_atomic(&self.path(shader, stage, variant), words)
    }

    /// Deletes every cached binary.
    pub fn clear(&self) -> std::io::Result<()> {
        match std::fs::remove_dir_all(&self.dir) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}
