use std::collections::BTreeMap;

use ard_log::{error, trace};
use ard_shader_core::prelude::ShaderStage;
use spirv::{StorageClass, Word};

use crate::{
    data::*,
    registry::GlobalReflectionRegistry,
    module::{GlobalVariable, SpirvModule, SpirvParseError, SpirvType},
};

/// Reflects stage binaries into [`ReflectionData`], converging buffer sizes through a shared
/// [`GlobalReflectionRegistry`].
pub struct Reflector<'a> {
    registry: &'a GlobalReflectionRegistry,
}

/// A resource bound through a descriptor set, before it is merged into the reflection data.
struct DescriptorResource<'a> {
    kind: ResourceKind,
    name: &'a str,
    set: u32,
    binding: u32,
    /// Array element count. At least 1.
    count: u32,
    /// Declared size of buffers. `0` for images and samplers.
    size: u32,
}

impl<'a> Reflector<'a> {
    pub fn new(registry: &'a GlobalReflectionRegistry) -> Self {
        Self { registry }
    }

    /// Reflects one stage into `data`.
    ///
    /// Binaries handed to the reflector come straight from the compiler, so a malformed binary is
    /// a bug. It is logged and asserted on in debug builds, and otherwise leaves `data`
    /// untouched.
    pub fn reflect(&self, stage: ShaderStage, words: &[u32], data: &mut ReflectionData) {
        if let Err(err) = self.try_reflect(stage, words, data) {
            error!("unable to reflect the {stage} stage: {err}");
            debug_assert!(false, "unable to reflect the {stage} stage: {err}");
        }
    }

    pub fn try_reflect(
        &self,
        stage: ShaderStage,
        words: &[u32],
        data: &mut ReflectionData,
    ) -> Result<(), SpirvParseError> {
        let module = SpirvModule::parse(words)?;
        for variable in module.variables() {
            self.reflect_variable(stage, &module, variable, data);
        }
        Ok(())
    }

    fn reflect_variable(
        &self,
        stage: ShaderStage,
        module: &SpirvModule,
        variable: &GlobalVariable,
        data: &mut ReflectionData,
    ) {
        let Some(SpirvType::Pointer { pointee, .. }) = module.ty(variable.pointer_type) else {
            return;
        };
        let var_name = module.name(variable.id).unwrap_or_default();

        if variable.storage_class == StorageClass::PushConstant {
            self.push_constant(stage, module, var_name, pointee, data);
            return;
        }

        let (base, count) = match module.ty(pointee) {
            Some(SpirvType::Array { element, .. }) => (element, module.array_length(pointee)),
            Some(SpirvType::RuntimeArray { element }) => (element, 0),
            _ => (pointee, 1),
        };

        let Some(kind) = resource_kind(module, variable.storage_class, base) else {
            return;
        };

        let is_buffer = matches!(kind, ResourceKind::UniformBuffer | ResourceKind::StorageBuffer);
        if is_buffer && !module.is_referenced(variable.id) {
            trace!("skipping unused buffer `{var_name}` in the {stage} stage");
            return;
        }

        // Anonymous buffer instances are named after their block
        let name = match var_name {
            "" if is_buffer => module.name(base).unwrap_or_default(),
            name => name,
        };

        let decorations = module.decorations(variable.id);
        let resource = DescriptorResource {
            kind,
            name,
            set: decorations.set.unwrap_or(0),
            binding: decorations.binding.unwrap_or(0),
            count: count.max(1),
            size: if is_buffer {
                module.declared_struct_size(base)
            } else {
                0
            },
        };

        self.merge(stage, resource, data);
    }

    fn merge(&self, stage: ShaderStage, resource: DescriptorResource, data: &mut ReflectionData) {
        let DescriptorResource {
            kind,
            name,
            set,
            binding,
            count,
            size,
        } = resource;

        let descriptors = data.descriptor_set_mut(set);
        descriptors
            .write_descriptors
            .insert(name.to_owned(), WriteDescriptor {
                binding,
                kind,
                count,
            });

        let images = match kind {
            ResourceKind::UniformBuffer => {
                let size = self.registry.register_uniform_buffer(set, binding, size);
                let buffer = descriptors
                    .uniform_buffers
                    .entry(binding)
                    .or_insert_with(|| UniformBuffer {
                        name: name.to_owned(),
                        binding,
                        size,
                        stages: Default::default(),
                    });
                buffer.size = buffer.size.max(size);
                buffer.stages |= stage.flag();
                return;
            }
            ResourceKind::StorageBuffer => {
                let size = self.registry.register_storage_buffer(set, binding, size);
                let buffer = descriptors
                    .storage_buffers
                    .entry(binding)
                    .or_insert_with(|| StorageBuffer {
                        name: name.to_owned(),
                        binding,
                        size,
                        stages: Default::default(),
                    });
                buffer.size = buffer.size.max(size);
                buffer.stages |= stage.flag();
                return;
            }
            ResourceKind::ImageSampler => &mut descriptors.image_samplers,
            ResourceKind::StorageImage => &mut descriptors.storage_images,
            ResourceKind::SeparateTexture => &mut descriptors.separate_textures,
            ResourceKind::SeparateSampler => &mut descriptors.separate_samplers,
        };

        let image = images.entry(binding).or_insert_with(|| ImageSampler {
            name: name.to_owned(),
            set,
            binding,
            array_size: count,
            stages: Default::default(),
        });
        image.stages |= stage.flag();

        data.resources.insert(
            name.to_owned(),
            ShaderResourceDeclaration {
                name: name.to_owned(),
                set,
                binding,
                count,
                kind,
            },
        );
    }

    fn push_constant(
        &self,
        stage: ShaderStage,
        module: &SpirvModule,
        name: &str,
        block: Word,
        data: &mut ReflectionData,
    ) {
        let declared = module.declared_struct_size(block);
        let end = data.push_constant_size();

        let offset = if declared > end {
            data.push_constant_ranges.push(PushConstantRange {
                stages: stage.flag(),
                offset: end,
                size: declared - end,
            });
            end
        } else {
            // The block lies inside ranges of earlier stages, as when a header is shared
            let start = module.struct_start(block);
            let mut first = None;
            for range in data
                .push_constant_ranges
                .iter_mut()
                .filter(|range| range.offset < declared && start < range.offset + range.size)
            {
                range.stages |= stage.flag();
                first.get_or_insert(range.offset);
            }

            if data.constant_buffers.contains_key(name) {
                return;
            }
            first.unwrap_or(start)
        };
        let size = declared.saturating_sub(offset);

        if name.is_empty() || name == RENDERER_PUSH_CONSTANT_NAME {
            return;
        }

        let mut uniforms = BTreeMap::default();
        for (idx, member) in module.struct_members(block).iter().enumerate() {
            let idx = idx as u32;
            let decorations = module.member_decorations(block, idx);
            let member_name = module.member_name(block, idx).unwrap_or_default();
            let uniform_name = format!("{name}.{member_name}");

            let Some(ty) = uniform_type(module, *member) else {
                error!("push constant `{uniform_name}` has an unsupported type");
                debug_assert!(false, "push constant `{uniform_name}` has an unsupported type");
                continue;
            };

            uniforms.insert(
                uniform_name.clone(),
                ShaderUniform {
                    name: uniform_name,
                    ty,
                    size: module.type_size(*member, decorations.matrix_stride),
                    offset: decorations.offset.unwrap_or(0).saturating_sub(offset),
                },
            );
        }

        data.constant_buffers.insert(
            name.to_owned(),
            ShaderBuffer {
                name: name.to_owned(),
                size,
                uniforms,
            },
        );
    }
}

fn resource_kind(
    module: &SpirvModule,
    storage: StorageClass,
    base: Word,
) -> Option<ResourceKind> {
    let kind = match (storage, module.ty(base)?) {
        (StorageClass::Uniform, SpirvType::Struct) if module.decorations(base).buffer_block => {
            ResourceKind::StorageBuffer
        }
        (StorageClass::Uniform, SpirvType::Struct) => ResourceKind::UniformBuffer,
        (StorageClass::StorageBuffer, SpirvType::Struct) => ResourceKind::StorageBuffer,
        (StorageClass::UniformConstant, SpirvType::SampledImage { .. }) => {
            ResourceKind::ImageSampler
        }
        (StorageClass::UniformConstant, SpirvType::Image { sampled: 2 }) => {
            ResourceKind::StorageImage
        }
        (StorageClass::UniformConstant, SpirvType::Image { .. }) => {
            ResourceKind::SeparateTexture
        }
        (StorageClass::UniformConstant, SpirvType::Sampler) => ResourceKind::SeparateSampler,
        _ => return None,
    };
    Some(kind)
}

fn uniform_type(module: &SpirvModule, id: Word) -> Option<ShaderUniformType> {
    let ty = match module.ty(id)? {
        SpirvType::Bool => ShaderUniformType::Bool,
        SpirvType::Int {
            width: 32,
            signed: true,
        } => ShaderUniformType::Int,
        SpirvType::Int {
            width: 32,
            signed: false,
        } => ShaderUniformType::UInt,
        SpirvType::Float { width: 32 } => ShaderUniformType::Float,
        SpirvType::Vector { component, count } => match (module.ty(component)?, count) {
            (SpirvType::Int { signed: true, .. }, 2) => ShaderUniformType::IVec2,
            (SpirvType::Int { signed: true, .. }, 3) => ShaderUniformType::IVec3,
            (SpirvType::Int { signed: true, .. }, 4) => ShaderUniformType::IVec4,
            (SpirvType::Int { signed: false, .. }, 2) => ShaderUniformType::UVec2,
            (SpirvType::Int { signed: false, .. }, 3) => ShaderUniformType::UVec3,
            (SpirvType::Int { signed: false, .. }, 4) => ShaderUniformType::UVec4,
            (SpirvType::Float { .. }, 2) => ShaderUniformType::Vec2,
            (SpirvType::Float { .. }, 3) => ShaderUniformType::Vec3,
            (SpirvType::Float { .. }, 4) => ShaderUniformType::Vec4,
            _ => return None,
        },
        SpirvType::Matrix { column, count } => match (module.ty(column)?, count) {
            (SpirvType::Vector { count: 3, .. }, 3) => ShaderUniformType::Mat3,
            (SpirvType::Vector { count: 4, .. }, 4) => ShaderUniformType::Mat4,
            _ => return None,
        },
        _ => return None,
    };
    Some(ty)
}
