use std::collections::BTreeMap;

use ard_shader_core::prelude::StageFlags;
use serde::{Deserialize, Serialize};

use crate::registry::GlobalReflectionRegistry;

/// Name of the push constant block reserved by the renderer. It gets a push constant range but is
/// never exposed as a constant buffer.
pub const RENDERER_PUSH_CONSTANT_NAME: &str = "u_Renderer";

/// Every kind of resource bound through a descriptor set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    UniformBuffer,
    StorageBuffer,
    /// Combined image and sampler.
    ImageSampler,
    StorageImage,
    SeparateTexture,
    SeparateSampler,
}

/// Type of a member of a constant buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderUniformType {
    Bool,
    Int,
    UInt,
    Float,
    IVec2,
    IVec3,
    IVec4,
    UVec2,
    UVec3,
    UVec4,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniformBuffer {
    pub name: String,
    pub binding: u32,
    /// Size in bytes. Converges to the largest size declared by any shader for this binding.
    pub size: u32,
    /// Stages that use the buffer.
    pub stages: StageFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageBuffer {
    pub name: String,
    pub binding: u32,
    /// Size in bytes of the statically sized part of the buffer.
    pub size: u32,
    pub stages: StageFlags,
}

/// An image, sampler or combination of the two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSampler {
    pub name: String,
    pub set: u32,
    pub binding: u32,
    /// Number of array elements. `1` for non-array resources.
    pub array_size: u32,
    pub stages: StageFlags,
}

/// Describes the descriptor write needed to bind a named resource.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteDescriptor {
    pub binding: u32,
    pub kind: ResourceKind,
    pub count: u32,
}

/// Resources of a single descriptor set, keyed by binding.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderDescriptorSet {
    pub uniform_buffers: BTreeMap<u32, UniformBuffer>,
    pub storage_buffers: BTreeMap<u32, StorageBuffer>,
    pub image_samplers: BTreeMap<u32, ImageSampler>,
    pub storage_images: BTreeMap<u32, ImageSampler>,
    pub separate_textures: BTreeMap<u32, ImageSampler>,
    pub separate_samplers: BTreeMap<u32, ImageSampler>,
    /// Keyed by resource name.
    pub write_descriptors: BTreeMap<String, WriteDescriptor>,
}

/// Name based lookup entry for an image or sampler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderResourceDeclaration {
    pub name: String,
    pub set: u32,
    pub binding: u32,
    pub count: u32,
    pub kind: ResourceKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderUniform {
    pub name: String,
    pub ty: ShaderUniformType,
    pub size: u32,
    /// Offset relative to the start of the owning push constant range.
    pub offset: u32,
}

/// A named push constant block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderBuffer {
    pub name: String,
    pub size: u32,
    /// Keyed by `<buffer>.<member>`.
    pub uniforms: BTreeMap<String, ShaderUniform>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushConstantRange {
    pub stages: StageFlags,
    pub offset: u32,
    pub size: u32,
}

/// Everything reflected from the stages of one shader.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectionData {
    /// Indexed by set number. Sets the shader doesn't use are empty.
    pub descriptor_sets: Vec<ShaderDescriptorSet>,
    /// Images and samplers by name.
    pub resources: BTreeMap<String, ShaderResourceDeclaration>,
    /// Push constant blocks by name.
    pub constant_buffers: BTreeMap<String, ShaderBuffer>,
    /// In stage processing order. Each range starts where the previous one ends.
    pub push_constant_ranges: Vec<PushConstantRange>,
}

impl ShaderDescriptorSet {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.uniform_buffers.is_empty()
            && self.storage_buffers.is_empty()
            && self.image_samplers.is_empty()
            && self.storage_images.is_empty()
            && self.separate_textures.is_empty()
            && self.separate_samplers.is_empty()
    }
}

impl ReflectionData {
    #[inline]
    pub fn descriptor_set(&self, set: u32) -> Option<&ShaderDescriptorSet> {
        self.descriptor_sets.get(set as usize)
    }

    /// Gets a descriptor set, growing the set list with empty sets if needed.
    pub fn descriptor_set_mut(&mut self, set: u32) -> &mut ShaderDescriptorSet {
        let idx = set as usize;
        if idx >= self.descriptor_sets.len() {
            self.descriptor_sets
                .resize_with(idx + 1, ShaderDescriptorSet::default);
        }
        &mut self.descriptor_sets[idx]
    }

    /// Total size of all push constant ranges.
    #[inline]
    pub fn push_constant_size(&self) -> u32 {
        self.push_constant_ranges
            .last()
            .map_or(0, |range| range.offset + range.size)
    }

    /// Updates buffer sizes to the sizes converged on by `registry`.
    pub fn resolve_with(&mut self, registry: &GlobalReflectionRegistry) {
        for (set, descriptors) in self.descriptor_sets.iter_mut().enumerate() {
            let set = set as u32;
            for (binding, buffer) in descriptors.uniform_buffers.iter_mut() {
                if let Some(size) = registry.uniform_buffer_size(set, *binding) {
                    buffer.size = buffer.size.max(size);
                }
            }
            for (binding, buffer) in descriptors.storage_buffers.iter_mut() {
                if let Some(size) = registry.storage_buffer_size(set, *binding) {
                    buffer.size = buffer.size.max(size);
                }
            }
        }
    }
}
