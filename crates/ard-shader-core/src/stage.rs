use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// A single programmable step of a shader program. Each stage is compiled, cached and reflected
/// as an independent unit.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    Compute,
}

bitflags! {
    /// A set of shader stages. Used to report which stages of a shader changed and which stages
    /// can see a particular resource.
    #[derive(Debug, Default, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[serde(transparent)]
    pub struct StageFlags: u32 {
        const VERTEX                  = 0b000001;
        const TESSELLATION_CONTROL    = 0b000010;
        const TESSELLATION_EVALUATION = 0b000100;
        const GEOMETRY                = 0b001000;
        const FRAGMENT                = 0b010000;
        const COMPUTE                 = 0b100000;
    }
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 6] = [
        ShaderStage::Vertex,
        ShaderStage::TessellationControl,
        ShaderStage::TessellationEvaluation,
        ShaderStage::Geometry,
        ShaderStage::Fragment,
        ShaderStage::Compute,
    ];

    /// Short name of the stage. Matches the names accepted by `glslc -fshader-stage` and the
    /// conventional file extensions.
    #[inline]
    pub const fn short_name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vert",
            ShaderStage::TessellationControl => "tesc",
            ShaderStage::TessellationEvaluation => "tese",
            ShaderStage::Geometry => "geom",
            ShaderStage::Fragment => "frag",
            ShaderStage::Compute => "comp",
        }
    }

    #[inline]
    pub const fn flag(self) -> StageFlags {
        match self {
            ShaderStage::Vertex => StageFlags::VERTEX,
            ShaderStage::TessellationControl => StageFlags::TESSELLATION_CONTROL,
            ShaderStage::TessellationEvaluation => StageFlags::TESSELLATION_EVALUATION,
            ShaderStage::Geometry => StageFlags::GEOMETRY,
            ShaderStage::Fragment => StageFlags::FRAGMENT,
            ShaderStage::Compute => StageFlags::COMPUTE,
        }
    }

    /// Parses the name written after a `#pragma stage :` marker. Both the short and long forms
    /// are accepted.
    pub fn from_marker(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "vert" | "vertex" => Some(ShaderStage::Vertex),
            "tesc" | "tess_control" | "tessellation_control" => {
                Some(ShaderStage::TessellationControl)
            }
            "tese" | "tess_eval" | "tessellation_evaluation" => {
                Some(ShaderStage::TessellationEvaluation)
            }
            "geom" | "geometry" => Some(ShaderStage::Geometry),
            "frag" | "fragment" | "pixel" => Some(ShaderStage::Fragment),
            "comp" | "compute" => Some(ShaderStage::Compute),
            _ => None,
        }
    }

    /// Infers the stage of a single stage shader file from its extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        ShaderStage::ALL
            .into_iter()
            .find(|stage| stage.short_name().eq_ignore_ascii_case(ext))
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::TessellationControl => "tessellation control",
            ShaderStage::TessellationEvaluation => "tessellation evaluation",
            ShaderStage::Geometry => "geometry",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
        };
        f.write_str(name)
    }
}

impl From<ShaderStage> for StageFlags {
    #[inline]
    fn from(value: ShaderStage) -> Self {
        value.flag()
    }
}

impl StageFlags {
    #[inline]
    pub fn has_stage(self, stage: ShaderStage) -> bool {
        self.contains(stage.flag())
    }

    /// Iterates over the individual stages contained in the set in pipeline order.
    pub fn stages(self) -> impl Iterator<Item = ShaderStage> {
        ShaderStage::ALL
            .into_iter()
            .filter(move |stage| self.has_stage(*stage))
    }
}

impl FromIterator<ShaderStage> for StageFlags {
    fn from_iter<T: IntoIterator<Item = ShaderStage>>(iter: T) -> Self {
        iter.into_iter()
            .fold(StageFlags::empty(), |flags, stage| flags | stage.flag())
    }
}
