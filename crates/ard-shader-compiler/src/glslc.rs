use std::{
    io::Write,
    path::PathBuf,
    process::{Command, Stdio},
};

use ard_shader_core::prelude::ShaderStage;
use serde::{Deserialize, Serialize};

use crate::backend::{BackendError, CompileOptions, CompilerBackend, OptimizationLevel};

/// First word of every SPIR-V module.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlslcConfig {
    /// Path to the `glslc` executable. Looked up on `PATH` if not absolute.
    pub executable: PathBuf,
    /// Value of `--target-env`.
    pub target_env: String,
    /// Additional arguments passed verbatim.
    pub extra_args: Vec<String>,
}

/// Compiles shaders by running `glslc` from the Vulkan SDK.
///
/// The stage source is fed through stdin and the binary is read back from stdout, so no
/// temporary files are involved.
#[derive(Debug, Clone, Default)]
pub struct GlslcBackend {
    config: GlslcConfig,
}

impl Default for GlslcConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("glslc"),
            target_env: "vulkan1.3".into(),
            extra_args: Vec::default(),
        }
    }
}

impl GlslcBackend {
    pub fn new(config: GlslcConfig) -> Self {
        Self { config }
    }

    #[inline(always)]
    pub fn config(&self) -> &GlslcConfig {
        &self.config
    }

    /// Checks if the configured executable can be launched.
    pub fn is_available(&self) -> bool {
        Command::new(&self.config.executable)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn command(&self, stage: ShaderStage, options: &CompileOptions) -> Command {
        let mut command = Command::new(&self.config.executable);
        command
            .arg(format!("-fshader-stage={}", stage.short_name()))
            .arg(format!("--target-env={}", self.config.target_env));

        if options.debug_info {
            command.arg("-g");
        }

        command.arg(match options.optimization {
            OptimizationLevel::None => "-O0",
            OptimizationLevel::Performance => "-O",
        });

        command
            .args(&self.config.extra_args)
            .arg("-o")
            .arg("-")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        command
    }
}

impl CompilerBackend for GlslcBackend {
    fn compile(
        &self,
        source: &str,
        stage: ShaderStage,
        options: &CompileOptions,
    ) -> Result<Vec<u32>, BackendError> {
        let mut child = self.command(stage, options).spawn()?;

        // Feed stdin from another thread so a full stdout pipe can't stall us
        let (output, written) = std::thread::scope(|scope| {
            let stdin = child.stdin.take();
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(source.as_bytes()),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(std::io::ErrorKind::BrokenPipe.into()));
            (output, written)
        });

        let output = output?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::Failed(stderr.trim().to_owned()));
        }
        written?;

        let bytes = output.stdout;
        if bytes.is_empty() || bytes.len() % 4 != 0 {
            return Err(BackendError::InvalidOutput(format!(
                "{} bytes is not a whole number of words",
                bytes.len()
            )));
        }

        let words: Vec<u32> = bytemuck::allocation::pod_collect_to_vec(bytes.as_slice());
        if words[0] != SPIRV_MAGIC {
            return Err(BackendError::InvalidOutput(format!(
                "bad magic number {:#010x}",
                words[0]
            )));
        }

        Ok(words)
    }
}
