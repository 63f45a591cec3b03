use std::path::PathBuf;

use ard_shader_core::prelude::ShaderStage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("unable to read `{file}`: {source}")]
    Read {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("`{file}` has no `#pragma stage` markers and its extension does not name a stage")]
    UnknownStage { file: PathBuf },
    #[error("`{file}` line {line}: unknown shader stage `{name}`")]
    UnknownStageMarker {
        file: PathBuf,
        line: usize,
        name: String,
    },
    #[error("`{file}` line {line}: the {stage} stage is declared more than once")]
    DuplicateStage {
        file: PathBuf,
        line: usize,
        stage: ShaderStage,
    },
    #[error(
        "{stage} stage of `{file}`: unable to resolve include `{include}` \
        (from `{from}` line {line})"
    )]
    UnresolvedInclude {
        file: PathBuf,
        stage: ShaderStage,
        include: String,
        from: PathBuf,
        line: usize,
    },
    #[error("{stage} stage of `{file}`: unable to read include `{path}`: {source}")]
    IncludeRead {
        file: PathBuf,
        stage: ShaderStage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "{stage} stage of `{file}`: `{include}` is recursively included \
        (from `{from}` line {line})"
    )]
    RecursiveInclude {
        file: PathBuf,
        stage: ShaderStage,
        include: PathBuf,
        from: PathBuf,
        line: usize,
    },
    #[error("{stage} stage of `{file}`: `{from}` line {line}: {message}")]
    Directive {
        file: PathBuf,
        stage: ShaderStage,
        from: PathBuf,
        line: usize,
        message: String,
    },
}

impl PreprocessError {
    /// The stage the error belongs to. `None` for errors affecting the whole file.
    pub fn stage(&self) -> Option<ShaderStage> {
        match self {
            PreprocessError::Read { .. }
            | PreprocessError::UnknownStage { .. }
            | PreprocessError::UnknownStageMarker { .. }
            | PreprocessError::DuplicateStage { .. } => None,
            PreprocessError::UnresolvedInclude { stage, .. }
            | PreprocessError::IncludeRead { stage, .. }
            | PreprocessError::RecursiveInclude { stage, .. }
            | PreprocessError::Directive { stage, .. } => Some(*stage),
        }
    }
}
