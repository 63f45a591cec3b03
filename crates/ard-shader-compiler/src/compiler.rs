use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use ard_log::{error, trace, warn};
use ard_shader_core::prelude::{ShaderStage, StageFlags};
use thiserror::Error;

use crate::{
    backend::{BackendError, BinaryVariant, CompileOptions, CompilerBackend},
    cache::BinaryCache,
};

/// Compiles individual stages, reusing cached binaries when possible.
#[derive(Clone)]
pub struct StageCompiler {
    backend: Arc<dyn CompilerBackend>,
    cache: BinaryCache,
}

/// One stage to produce a binary for.
#[derive(Debug, Copy, Clone)]
pub struct CompileRequest<'a> {
    /// Shader file the stage belongs to.
    pub shader: &'a Path,
    pub stage: ShaderStage,
    pub variant: BinaryVariant,
    /// Preprocessed source of the stage.
    pub source: &'a str,
    /// Stages of the shader that changed since they were last compiled.
    pub changed: StageFlags,
    /// Compile even if a cached binary could be used.
    pub force: bool,
}

/// Where a [`StageBinary`] came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryOrigin {
    /// The stage was unchanged and the cached binary was used.
    Cache,
    /// The stage was compiled.
    Compiled,
    /// Compilation failed and a previously cached binary was used instead.
    StaleCache,
}

#[derive(Debug, Clone)]
pub struct StageBinary {
    pub words: Vec<u32>,
    pub origin: BinaryOrigin,
    /// Set when the binary is usable but not up to date.
    pub warning: Option<String>,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(
        "{variant} binary of the {stage} stage of `{shader}` failed to compile and no cached \
        binary exists: {source}"
    )]
    NoBinary {
        shader: PathBuf,
        stage: ShaderStage,
        variant: BinaryVariant,
        #[source]
        source: BackendError,
    },
}

impl StageCompiler {
    pub fn new(backend: Arc<dyn CompilerBackend>, cache: BinaryCache) -> Self {
        Self { backend, cache }
    }

    #[inline(always)]
    pub fn cache(&self) -> &BinaryCache {
        &self.cache
    }

    #[inline(always)]
    pub fn backend(&self) -> &Arc<dyn CompilerBackend> {
        &self.backend
    }

    /// Produces the binary for a stage.
    ///
    /// Unchanged stages are loaded from the cache unless compilation is forced. If the backend
    /// fails, the cached binary is used as a fallback and the returned binary carries a warning.
    /// Only when no binary can be found at all is an error returned.
    pub fn compile_or_get_binary(
        &self,
        request: &CompileRequest,
    ) -> Result<StageBinary, CompileError> {
        let CompileRequest {
            shader,
            stage,
            variant,
            ..
        } = *request;

        // Skipping is decided per stage, not per file
        if !request.force && !request.changed.has_stage(stage) {
            if let Some(words) = self.cache.load(shader, stage, variant) {
                trace!(
                    "using cached {variant} {stage} binary of `{}`",
                    shader.display()
                );
                return Ok(StageBinary {
                    words,
                    origin: BinaryOrigin::Cache,
                    warning: None,
                });
            }
        }

        let options = CompileOptions::for_stage(stage, variant);
        match self.backend.compile(request.source, stage, &options) {
            Ok(words) => {
                if let Err(err) = self.cache.store(shader, stage, variant, &words) {
                    error!(
                        "unable to cache {variant} {stage} binary of `{}`: {err}",
                        shader.display()
                    );
                }

                Ok(StageBinary {
                    words,
                    origin: BinaryOrigin::Compiled,
                    warning: None,
                })
            }
            Err(err) => {
                error!(
                    "unable to compile the {variant} {stage} binary of `{}`: {err}",
                    shader.display()
                );

                match self.cache.load(shader, stage, variant) {
                    Some(words) => {
                        let warning = format!(
                            "using a stale {variant} {stage} binary for `{}`",
                            shader.display()
                        );
                        warn!("{warning}");
                        Ok(StageBinary {
                            words,
                            origin: BinaryOrigin::StaleCache,
                            warning: Some(warning),
                        })
                    }
                    None => Err(CompileError::NoBinary {
                        shader: shader.into(),
                        stage,
                        variant,
                        source: err,
                    }),
                }
            }
        }
    }
}
