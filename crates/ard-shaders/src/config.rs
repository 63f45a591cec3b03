use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use ard_log::warn;
use ard_shader_compiler::prelude::{GlslcConfig, BINARY_DIR_NAME};
use ard_shader_reflect::prelude::REFLECTION_DIR_NAME;
use ard_shader_registry::prelude::REGISTRY_FILE_NAME;
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};

/// Settings of a shader system. Stored as a `ron` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderSystemConfig {
    /// Root folder of the shader registry, compiled binaries and reflection data.
    pub cache_dir: PathBuf,
    /// Searched in order when resolving includes.
    pub include_dirs: Vec<PathBuf>,
    /// Engine wide macros. `None` defines the macro without a value.
    pub global_macros: BTreeMap<String, Option<String>>,
    /// Also produce optimized binaries for every stage.
    pub release_binaries: bool,
    /// Persist reflection data so unchanged shaders skip reflection.
    pub reflection_cache: bool,
    pub glslc: GlslcConfig,
}

impl Default for ShaderSystemConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./shader_cache"),
            include_dirs: Vec::default(),
            global_macros: BTreeMap::default(),
            release_binaries: true,
            reflection_cache: true,
            glslc: GlslcConfig::default(),
        }
    }
}

impl ShaderSystemConfig {
    /// Loads the config at `path`. Returns `None` if it is missing or malformed.
    pub fn load(path: &Path) -> Option<Self> {
        let file = std::fs::File::open(path).ok()?;
        let reader = std::io::BufReader::new(file);
        match ron::de::from_reader::<_, ShaderSystemConfig>(reader) {
            Ok(config) => Some(config),
            Err(err) => {
                warn!("ignoring malformed shader config `{}`: {err}", path.display());
                None
            }
        }
    }

    pub fn save(&self, path: &Path) {
        let file = match std::fs::File::create(path) {
            Ok(file) => file,
            Err(err) => {
                warn!("unable to save shader config `{}`: {err}", path.display());
                return;
            }
        };
        let writer = std::io::BufWriter::new(file);
        if let Err(err) = ron::ser::to_writer_pretty(writer, self, PrettyConfig::default()) {
            warn!("unable to save shader config `{}`: {err}", path.display());
        }
    }

    #[inline]
    pub fn registry_path(&self) -> PathBuf {
        self.cache_dir.join(REGISTRY_FILE_NAME)
    }

    #[inline]
    pub fn binary_dir(&self) -> PathBuf {
        self.cache_dir.join(BINARY_DIR_NAME)
    }

    #[inline]
    pub fn reflection_dir(&self) -> PathBuf {
        self.cache_dir.join(REFLECTION_DIR_NAME)
    }

    /// Global macros in the form the preprocessor expects.
    pub fn macro_definitions(&self) -> BTreeMap<String, String> {
        self.global_macros
            .iter()
            .map(|(name, value)| (name.clone(), value.clone().unwrap_or_default()))
            .collect()
    }
}
