use std::fmt;

use ard_shader_core::prelude::ShaderStage;
use thiserror::Error;

/// Every stage is compiled twice. Debug binaries keep names and source information and are the
/// ones reflected. Release binaries are optimized.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BinaryVariant {
    Debug,
    Release,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OptimizationLevel {
    None,
    Performance,
}

/// Options handed to a [`CompilerBackend`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Emit debug information into the binary.
    pub debug_info: bool,
    pub optimization: OptimizationLevel,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("unable to launch compiler: {0}")]
    Launch(#[from] std::io::Error),
    #[error("{0}")]
    Failed(String),
    #[error("compiler produced an invalid binary: {0}")]
    InvalidOutput(String),
}

/// Compiles one preprocessed stage into SPIR-V words.
pub trait CompilerBackend: Send + Sync {
    fn compile(
        &self,
        source: &str,
        stage: ShaderStage,
        options: &CompileOptions,
    ) -> Result<Vec<u32>, BackendError>;
}

impl BinaryVariant {
    pub const ALL: [BinaryVariant; 2] = [BinaryVariant::Debug, BinaryVariant::Release];

    #[inline(always)]
    pub const fn is_debug(self) -> bool {
        matches!(self, BinaryVariant::Debug)
    }
}

impl fmt::Display for BinaryVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryVariant::Debug => f.write_str("debug"),
            BinaryVariant::Release => f.write_str("release"),
        }
    }
}

impl CompileOptions {
    /// Options used to build `variant` of `stage`.
    ///
    /// Compute shaders are never optimized. The optimizer miscompiles some of the engine's
    /// compute shaders.
    pub fn for_stage(stage: ShaderStage, variant: BinaryVariant) -> Self {
        let optimization = match (variant, stage) {
            (BinaryVariant::Debug, _) => OptimizationLevel::None,
            (BinaryVariant::Release, ShaderStage::Compute) => OptimizationLevel::None,
            (BinaryVariant::Release, _) => OptimizationLevel::Performance,
        };

        Self {
            debug_info: variant.is_debug(),
            optimization,
        }
    }
}
