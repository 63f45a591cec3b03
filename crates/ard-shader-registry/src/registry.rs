use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use ard_log::{debug, error, warn};
use ard_shader_core::{
    io,
    prelude::{ContentHash, ShaderStage},
};
use ard_shader_preprocess::prelude::{IncludeRecord, StageMetadata};
use ron::ser::PrettyConfig;
use serde::{
    de::{IgnoredAny, MapAccess, Visitor},
    Deserialize, Deserializer, Serialize,
};
use thiserror::Error;

/// Cached metadata of every stage of one shader.
pub type StageMap = BTreeMap<ShaderStage, StageMetadata>;

/// Maps shader file paths to the metadata their stages had the last time they were compiled.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShaderRegistry {
    shaders: BTreeMap<PathBuf, StageMap>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to parse registry: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("unable to serialize registry: {0}")]
    Serialize(#[from] ron::Error),
    #[error("registry uses an incompatible legacy layout")]
    Legacy,
}

impl ShaderRegistry {
    /// Loads the registry at `path`. A missing, empty, malformed or legacy file means there is no
    /// registry, so `None` is returned and the reason is logged.
    pub fn load(path: &Path) -> Option<Self> {
        let text = match io::read_text(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("no shader registry at `{}`", path.display());
                return None;
            }
            Err(err) => {
                warn!("unable to read shader registry `{}`: {err}", path.display());
                return None;
            }
        };

        if text.trim().is_empty() {
            return None;
        }

        match Self::from_ron(&text) {
            Ok(registry) => Some(registry),
            Err(RegistryError::Legacy) => {
                error!(
                    "shader registry `{}` uses an incompatible legacy layout and will be rebuilt",
                    path.display()
                );
                None
            }
            Err(err) => {
                warn!("discarding shader registry `{}`: {err}", path.display());
                None
            }
        }
    }

    /// Writes the whole registry to `path`, replacing the previous file in one step.
    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        let text = self.to_ron()?;
        io::write_text_atomic(path, &text)?;
        Ok(())
    }

    pub fn from_ron(text: &str) -> Result<Self, RegistryError> {
        match ron::from_str::<RegistryFile>(text) {
            Ok(file) => Ok(file.into()),
            Err(err) => {
                if ron::from_str::<LegacyRegistryFile>(text).is_ok() {
                    Err(RegistryError::Legacy)
                } else {
                    Err(err.into())
                }
            }
        }
    }

    pub fn to_ron(&self) -> Result<String, RegistryError> {
        let file = RegistryFile::from(self);
        Ok(ron::ser::to_string_pretty(&file, PrettyConfig::default())?)
    }

    #[inline]
    pub fn shader(&self, path: &Path) -> Option<&StageMap> {
        self.shaders.get(path)
    }

    /// Looks up the stages of a shader, inserting an empty map if the shader is unknown.
    ///
    /// An empty map holds no metadata for any stage, so every stage compared against it counts as
    /// changed. Absence is never mistaken for a match.
    pub fn stages_or_default(&mut self, path: &Path) -> &mut StageMap {
        self.shaders.entry(path.to_path_buf()).or_default()
    }

    #[inline]
    pub fn remove(&mut self, path: &Path) -> Option<StageMap> {
        self.shaders.remove(path)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &StageMap)> {
        self.shaders
            .iter()
            .map(|(path, stages)| (path.as_path(), stages))
    }
}

/// On disk layout of the registry.
#[derive(Serialize, Deserialize)]
struct RegistryFile {
    #[serde(rename = "ShaderRegistry")]
    shaders: Vec<ShaderRecord>,
}

#[derive(Serialize, Deserialize)]
struct ShaderRecord {
    #[serde(rename = "ShaderPath")]
    path: PathBuf,
    #[serde(rename = "Stages")]
    stages: Vec<StageRecord>,
}

#[derive(Serialize, Deserialize)]
struct StageRecord {
    #[serde(rename = "Stage")]
    stage: ShaderStage,
    #[serde(rename = "StageHash")]
    hash: ContentHash,
    #[serde(rename = "Headers")]
    headers: Vec<IncludeRecord>,
}

/// Older registries stored shaders in a map rather than a sequence.
#[derive(Deserialize)]
struct LegacyRegistryFile {
    #[serde(rename = "ShaderRegistry")]
    _shaders: LegacyShaderMap,
}

struct LegacyShaderMap;

impl<'de> Deserialize<'de> for LegacyShaderMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LegacyVisitor;

        impl<'de> Visitor<'de> for LegacyVisitor {
            type Value = LegacyShaderMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of shaders")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
                Ok(LegacyShaderMap)
            }
        }

        deserializer.deserialize_map(LegacyVisitor)
    }
}

impl From<RegistryFile> for ShaderRegistry {
    fn from(file: RegistryFile) -> Self {
        let shaders = file
            .shaders
            .into_iter()
            .map(|shader| {
                let stages = shader
                    .stages
                    .into_iter()
                    .map(|stage| {
                        (
                            stage.stage,
                            StageMetadata::new(stage.hash, stage.headers),
                        )
                    })
                    .collect();
                (shader.path, stages)
            })
            .collect();

        ShaderRegistry { shaders }
    }
}

impl From<&ShaderRegistry> for RegistryFile {
    fn from(registry: &ShaderRegistry) -> Self {
        let shaders = registry
            .shaders
            .iter()
            .map(|(path, stages)| ShaderRecord {
                path: path.clone(),
                stages: stages
                    .iter()
                    .map(|(stage, metadata)| StageRecord {
                        stage: *stage,
                        hash: metadata.hash,
                        headers: metadata.headers().cloned().collect(),
                    })
                    .collect(),
            })
            .collect();

        RegistryFile { shaders }
    }
}
