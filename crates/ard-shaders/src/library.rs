use std::{
    collections::{BTreeMap, BTreeSet},
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use ard_log::{error, info, warn};
use ard_shader_compiler::prelude::{CompilerBackend, GlslcBackend};
use ard_shader_core::prelude::StageFlags;
use ard_shader_reflect::prelude::{GlobalReflectionRegistry, ReflectionData};
use crossbeam_channel::{Receiver, Sender};
use rayon::prelude::*;

use crate::{
    compiler::{CompiledShader, ReloadReport, ShaderBinaries, ShaderCompiler},
    config::ShaderSystemConfig,
    error::ShaderLoadError,
};

/// Sent to subscribers every time a shader is successfully (re)loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderReloaded {
    pub path: PathBuf,
    pub changed: StageFlags,
}

/// Outcome of reloading a single shader during a bulk pass.
pub type ReloadResult = (PathBuf, Result<ReloadReport, ShaderLoadError>);

/// Owns the compiled state of every loaded shader.
///
/// Shaders are identified by the path they were loaded with. A reload that fails leaves the
/// previously loaded binaries and reflection data in place.
pub struct ShaderLibrary {
    cache_dir: PathBuf,
    compiler: ShaderCompiler,
    shaders: Mutex<BTreeMap<PathBuf, CompiledShader>>,
    /// Global macros changed since the last [`ShaderLibrary::reload_dirty`].
    dirty_macros: Mutex<BTreeSet<String>>,
    subscribers: Mutex<Vec<Sender<ShaderReloaded>>>,
}

impl ShaderLibrary {
    /// Creates a library compiling with `glslc`.
    pub fn new(config: ShaderSystemConfig) -> Self {
        let backend = Arc::new(GlslcBackend::new(config.glslc.clone()));
        Self::with_backend(config, backend)
    }

    pub fn with_backend(config: ShaderSystemConfig, backend: Arc<dyn CompilerBackend>) -> Self {
        let registry = Arc::new(GlobalReflectionRegistry::new());
        Self {
            cache_dir: config.cache_dir.clone(),
            compiler: ShaderCompiler::new(&config, backend, registry),
            shaders: Mutex::default(),
            dirty_macros: Mutex::default(),
            subscribers: Mutex::default(),
        }
    }

    #[inline(always)]
    pub fn compiler(&self) -> &ShaderCompiler {
        &self.compiler
    }

    #[inline(always)]
    pub fn registry(&self) -> &GlobalReflectionRegistry {
        self.compiler.registry()
    }

    #[inline]
    pub fn is_loaded(&self, path: &Path) -> bool {
        self.shaders().contains_key(path)
    }

    /// Paths of every loaded shader.
    pub fn loaded(&self) -> Vec<PathBuf> {
        self.shaders().keys().cloned().collect()
    }

    /// Loads a shader, reusing cached binaries and reflection data where possible.
    #[inline]
    pub fn load(&self, path: impl AsRef<Path>) -> Result<ReloadReport, ShaderLoadError> {
        self.reload(path, false)
    }

    /// Recompiles a shader. Subscribers are notified on success.
    pub fn reload(
        &self,
        path: impl AsRef<Path>,
        force: bool,
    ) -> Result<ReloadReport, ShaderLoadError> {
        let path = path.as_ref();
        let compiled = self.compiler.compile(path, force).map_err(|err| {
            error!("unable to reload `{}`: {err}", path.display());
            err
        })?;
        Ok(self.install(compiled))
    }

    /// Reloads every loaded shader in parallel.
    ///
    /// A forced reload also resets the global reflection registry, so buffer sizes are rebuilt
    /// from the current sources only.
    pub fn reload_all(&self, force: bool) -> Vec<ReloadResult> {
        if force {
            self.registry().clear();
        }
        self.reload_many(self.loaded(), force)
    }

    /// Reloads every shader that refers to a global macro changed since the last call.
    pub fn reload_dirty(&self) -> Vec<ReloadResult> {
        let dirty = std::mem::take(&mut *self.dirty());
        if dirty.is_empty() {
            return Vec::default();
        }

        let paths: Vec<_> = self
            .shaders()
            .iter()
            .filter(|(_, shader)| !shader.acknowledged_macros.is_disjoint(&dirty))
            .map(|(path, _)| path.clone())
            .collect();

        info!(
            "{} shader(s) affected by changes to global macros",
            paths.len()
        );
        self.reload_many(paths, false)
    }

    /// Per-stage binaries of a loaded shader.
    pub fn binaries(&self, path: &Path) -> Option<ShaderBinaries> {
        self.shaders()
            .get(path)
            .map(|shader| shader.binaries.clone())
    }

    /// Reflection data of a loaded shader, with buffer sizes converged across every shader.
    pub fn reflection_data(&self, path: &Path) -> Option<ReflectionData> {
        let mut data = self.shaders().get(path)?.reflection.clone();
        data.resolve_with(self.registry());
        Some(data)
    }

    /// Receives a [`ShaderReloaded`] event for every successful (re)load.
    pub fn subscribe(&self) -> Receiver<ShaderReloaded> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }

    /// Defines a global macro. Shaders using it are reloaded by the next
    /// [`ShaderLibrary::reload_dirty`].
    pub fn set_global_macro(&self, name: &str, value: Option<&str>) {
        if self
            .compiler
            .set_global_macro(name, value.unwrap_or_default())
        {
            self.dirty().insert(name.to_owned());
        }
    }

    pub fn remove_global_macro(&self, name: &str) {
        if self.compiler.remove_global_macro(name) {
            self.dirty().insert(name.to_owned());
        }
    }

    /// Deletes the shader registry, compiled binaries and reflection data. Loaded shaders are
    /// kept.
    pub fn clear_caches(&self) -> std::io::Result<()> {
        match std::fs::remove_dir_all(&self.cache_dir) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }

    fn reload_many(&self, paths: Vec<PathBuf>, force: bool) -> Vec<ReloadResult> {
        let compiled: Vec<_> = paths
            .into_par_iter()
            .map(|path| {
                let result = self.compiler.compile(&path, force);
                (path, result)
            })
            .collect();

        compiled
            .into_iter()
            .map(|(path, result)| {
                let result = match result {
                    Ok(compiled) => Ok(self.install(compiled)),
                    Err(err) => {
                        error!("unable to reload `{}`: {err}", path.display());
                        Err(err)
                    }
                };
                (path, result)
            })
            .collect()
    }

    fn install(&self, mut compiled: CompiledShader) -> ReloadReport {
        let mut shaders = self.shaders();

        // Caches are keyed by file name
        let file_name = compiled.path.file_name();
        if let Some(other) = shaders
            .keys()
            .find(|other| **other != compiled.path && other.file_name() == file_name)
        {
            let warning = format!(
                "`{}` shares cached binaries and reflection data with `{}`",
                compiled.path.display(),
                other.display()
            );
            warn!("{warning}");
            compiled.report.warnings.push(warning);
        }

        let report = compiled.report.clone();
        let event = ShaderReloaded {
            path: compiled.path.clone(),
            changed: report.changed,
        };

        shaders.insert(compiled.path.clone(), compiled);
        drop(shaders);

        // Subscribers that dropped their receiver are forgotten
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|sender| sender.send(event.clone()).is_ok());

        report
    }

    #[inline]
    fn shaders(&self) -> MutexGuard<'_, BTreeMap<PathBuf, CompiledShader>> {
        self.shaders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn dirty(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.dirty_macros
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
