use std::path::{Path, PathBuf};

use ard_shader_compiler::prelude::CompileError;
use ard_shader_preprocess::prelude::PreprocessError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShaderLoadError {
    #[error("unable to preprocess `{path}`: {source}")]
    Preprocess {
        path: PathBuf,
        #[source]
        source: PreprocessError,
    },
    #[error("unable to preprocess `{path}`: {}", join(.errors))]
    Stages {
        path: PathBuf,
        errors: Vec<PreprocessError>,
    },
    #[error("`{path}` does not contain any stages")]
    Empty { path: PathBuf },
    #[error("unable to compile `{path}`: {}", join(.errors))]
    Compile {
        path: PathBuf,
        errors: Vec<CompileError>,
    },
}

impl ShaderLoadError {
    pub fn path(&self) -> &Path {
        match self {
            ShaderLoadError::Preprocess { path, .. }
            | ShaderLoadError::Stages { path, .. }
            | ShaderLoadError::Empty { path }
            | ShaderLoadError::Compile { path, .. } => path,
        }
    }
}

fn join<E: std::fmt::Display>(errors: &[E]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
