use std::{
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use ard_log::{error, trace};
use ard_shader_core::prelude::StageFlags;

use crate::registry::{ShaderRegistry, StageMap};

/// Name of the registry file inside a cache directory.
pub const REGISTRY_FILE_NAME: &str = "ShaderRegistry.ron";

/// Decides which stages of a shader must be recompiled by comparing their metadata against the
/// registry file.
pub struct StageCache {
    path: PathBuf,
    /// Serializes the read-modify-write of the registry file within this process.
    lock: Mutex<()>,
}

impl StageCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Creates a cache using the registry file of `cache_dir`.
    #[inline]
    pub fn in_dir(cache_dir: &Path) -> Self {
        Self::new(cache_dir.join(REGISTRY_FILE_NAME))
    }

    #[inline(always)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stages of `shader` whose metadata differs from the registry.
    ///
    /// The registry entry for the shader is replaced by `stages`, so stages no longer present in
    /// the source are forgotten. The registry file is rewritten only if a stage changed. Failing
    /// to write it is logged and otherwise ignored.
    pub fn has_changed(&self, shader: &Path, stages: &StageMap) -> StageFlags {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut registry = ShaderRegistry::load(&self.path).unwrap_or_default();
        let cached = registry.stages_or_default(shader);

        let mut changed = StageFlags::empty();
        for (stage, fresh) in stages {
            if cached.get(stage) != Some(fresh) {
                changed |= stage.flag();
                cached.insert(*stage, fresh.clone());
            }
        }

        *cached = stages.clone();

        if changed.is_empty() {
            trace!("`{}` is up to date", shader.display());
            return changed;
        }

        if let Err(err) = registry.save(&self.path) {
            error!(
                "unable to write shader registry `{}`: {err}",
                self.path.display()
            );
        }

        changed
    }
}
