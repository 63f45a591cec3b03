use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use ard_log::{error, info};
use ard_shader_compiler::prelude::*;
use ard_shader_core::prelude::{ShaderStage, StageFlags};
use ard_shader_preprocess::prelude::*;
use ard_shader_reflect::prelude::*;
use ard_shader_registry::prelude::StageCache;

use crate::{config::ShaderSystemConfig, error::ShaderLoadError};

/// Binaries of one stage.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StageBinaries {
    pub debug: Vec<u32>,
    /// `None` when release binaries are disabled.
    pub release: Option<Vec<u32>>,
}

/// Binaries of every stage of a shader.
pub type ShaderBinaries = BTreeMap<ShaderStage, StageBinaries>;

/// Summary of a successful compile pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReloadReport {
    /// Stages whose source or includes changed since they were last compiled.
    pub changed: StageFlags,
    /// Reflection data was read from the reflection cache instead of being recomputed.
    pub reflection_from_cache: bool,
    /// Non-fatal problems, such as stale binaries being used.
    pub warnings: Vec<String>,
}

/// Everything produced by compiling one shader file.
#[derive(Debug, Clone)]
pub struct CompiledShader {
    pub path: PathBuf,
    pub binaries: ShaderBinaries,
    /// Reflected from the debug binaries. Buffer sizes are as seen at reflection time. Use
    /// [`ReflectionData::resolve_with`] to get the converged sizes.
    pub reflection: ReflectionData,
    /// Global and engine-reserved macros the shader refers to.
    pub acknowledged_macros: BTreeSet<String>,
    pub report: ReloadReport,
}

impl StageBinaries {
    #[inline]
    pub fn get(&self, variant: BinaryVariant) -> Option<&[u32]> {
        match variant {
            BinaryVariant::Debug => Some(&self.debug),
            BinaryVariant::Release => self.release.as_deref(),
        }
    }
}

/// Runs the full pipeline for a shader file: preprocessing, change detection, compilation and
/// reflection.
pub struct ShaderCompiler {
    include_dirs: Vec<PathBuf>,
    global_macros: Mutex<BTreeMap<String, String>>,
    stage_cache: StageCache,
    stages: StageCompiler,
    reflection_cache: Option<ReflectionCache>,
    registry: Arc<GlobalReflectionRegistry>,
    release_binaries: bool,
}

impl ShaderCompiler {
    pub fn new(
        config: &ShaderSystemConfig,
        backend: Arc<dyn CompilerBackend>,
        registry: Arc<GlobalReflectionRegistry>,
    ) -> Self {
        Self {
            include_dirs: config.include_dirs.clone(),
            global_macros: Mutex::new(config.macro_definitions()),
            stage_cache: StageCache::new(config.registry_path()),
            stages: StageCompiler::new(backend, BinaryCache::new(config.binary_dir())),
            reflection_cache: config
                .reflection_cache
                .then(|| ReflectionCache::new(config.reflection_dir())),
            registry,
            release_binaries: config.release_binaries,
        }
    }

    #[inline(always)]
    pub fn registry(&self) -> &Arc<GlobalReflectionRegistry> {
        &self.registry
    }

    #[inline(always)]
    pub fn stage_cache(&self) -> &StageCache {
        &self.stage_cache
    }

    #[inline(always)]
    pub fn stage_compiler(&self) -> &StageCompiler {
        &self.stages
    }

    #[inline(always)]
    pub fn reflection_cache(&self) -> Option<&ReflectionCache> {
        self.reflection_cache.as_ref()
    }

    pub fn global_macros(&self) -> BTreeMap<String, String> {
        self.macros().clone()
    }

    /// Defines a global macro. Returns `true` if the set of global macros changed.
    pub fn set_global_macro(&self, name: &str, value: &str) -> bool {
        let mut macros = self.macros();
        match macros.get(name) {
            Some(current) if current == value => false,
            _ => {
                macros.insert(name.to_owned(), value.to_owned());
                true
            }
        }
    }

    /// Removes a global macro. Returns `true` if it was defined.
    pub fn remove_global_macro(&self, name: &str) -> bool {
        self.macros().remove(name).is_some()
    }

    /// Compiles the shader at `path`.
    ///
    /// Unchanged stages reuse their cached binaries unless `force` is set. Failing stages fall
    /// back to stale binaries when they exist. The shader fails as a whole only if a stage fails
    /// to preprocess, or fails to compile without any binary to fall back on.
    pub fn compile(&self, path: &Path, force: bool) -> Result<CompiledShader, ShaderLoadError> {
        let start = Instant::now();

        let preprocessor = Preprocessor::new(
            IncludeResolver::new(self.include_dirs.iter().cloned()),
            self.global_macros(),
        );
        let output = preprocessor
            .preprocess_file(path)
            .map_err(|source| ShaderLoadError::Preprocess {
                path: path.into(),
                source,
            })?;

        if !output.is_ok() {
            for err in &output.errors {
                error!("{err}");
            }
            return Err(ShaderLoadError::Stages {
                path: path.into(),
                errors: output.errors,
            });
        }

        if output.stages.is_empty() {
            return Err(ShaderLoadError::Empty { path: path.into() });
        }

        let changed = self.stage_cache.has_changed(path, &output.metadata());
        let mut report = ReloadReport {
            changed,
            ..Default::default()
        };

        let mut binaries = ShaderBinaries::default();
        let mut failures = Vec::default();
        for (stage, processed) in &output.stages {
            match self.compile_stage(path, *stage, &processed.source, changed, force, &mut report) {
                Ok(stage_binaries) => {
                    binaries.insert(*stage, stage_binaries);
                }
                Err(err) => failures.push(err),
            }
        }

        if !failures.is_empty() {
            return Err(ShaderLoadError::Compile {
                path: path.into(),
                errors: failures,
            });
        }

        let reflection = self.reflection(path, &binaries, changed.is_empty() && !force, &mut report);

        let changed_names: Vec<_> = changed.stages().map(ShaderStage::short_name).collect();
        info!(
            "compiled `{}` in {:.2?} (changed stages: [{}])",
            path.display(),
            start.elapsed(),
            changed_names.join(", ")
        );

        Ok(CompiledShader {
            path: path.into(),
            binaries,
            reflection,
            acknowledged_macros: output.acknowledged_macros,
            report,
        })
    }

    fn compile_stage(
        &self,
        path: &Path,
        stage: ShaderStage,
        source: &str,
        changed: StageFlags,
        force: bool,
        report: &mut ReloadReport,
    ) -> Result<StageBinaries, CompileError> {
        let mut request = CompileRequest {
            shader: path,
            stage,
            variant: BinaryVariant::Debug,
            source,
            changed,
            force,
        };

        let debug = self.stages.compile_or_get_binary(&request)?;
        report.warnings.extend(debug.warning);

        let release = if self.release_binaries {
            request.variant = BinaryVariant::Release;
            let release = self.stages.compile_or_get_binary(&request)?;
            report.warnings.extend(release.warning);
            Some(release.words)
        } else {
            None
        };

        Ok(StageBinaries {
            debug: debug.words,
            release,
        })
    }

    fn reflection(
        &self,
        path: &Path,
        binaries: &ShaderBinaries,
        unchanged: bool,
        report: &mut ReloadReport,
    ) -> ReflectionData {
        if unchanged {
            let cached = self
                .reflection_cache
                .as_ref()
                .and_then(|cache| cache.try_read(path));
            if let Some(data) = cached {
                // Sizes must still be visible to shaders reflected later
                self.registry.absorb(&data);
                report.reflection_from_cache = true;
                return data;
            }
        }

        let reflector = Reflector::new(&self.registry);
        let mut data = ReflectionData::default();
        for (stage, stage_binaries) in binaries {
            reflector.reflect(*stage, &stage_binaries.debug, &mut data);
        }

        if let Some(cache) = &self.reflection_cache {
            if let Err(err) = cache.write(path, &data) {
                error!(
                    "unable to write reflection cache for `{}`: {err}",
                    path.display()
                );
            }
        }

        data
    }

    #[inline]
    fn macros(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.global_macros
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
