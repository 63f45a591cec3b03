use std::path::Path;

use ard_shader_core::prelude::*;
use spirv::{Decoration, MemoryAccess, Op, StorageClass, MAGIC_NUMBER};
use tempfile::TempDir;

use crate::{
    cache,
    module::{SpirvModule, SpirvType},
    prelude::*,
};

/// Assembles just enough of a SPIR-V module to exercise reflection.
#[derive(Default)]
struct SpirvBuilder {
    decls: Vec<u32>,
    body: Vec<u32>,
    next_id: u32,
    void: u32,
    float: u32,
    int: u32,
    uint: u32,
    bool: u32,
    vec4: u32,
    ivec3: u32,
    uvec2: u32,
    mat3: u32,
    mat4: u32,
}

fn string_words(text: &str) -> Vec<u32> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0);
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

impl SpirvBuilder {
    fn new() -> Self {
        let mut b = SpirvBuilder {
            next_id: 1,
            ..Default::default()
        };
        b.void = b.ty(Op::TypeVoid, &[]);
        b.float = b.ty(Op::TypeFloat, &[32]);
        b.int = b.ty(Op::TypeInt, &[32, 1]);
        b.uint = b.ty(Op::TypeInt, &[32, 0]);
        b.bool = b.ty(Op::TypeBool, &[]);
        b.vec4 = b.ty(Op::TypeVector, &[b.float, 4]);
        b.ivec3 = b.ty(Op::TypeVector, &[b.int, 3]);
        b.uvec2 = b.ty(Op::TypeVector, &[b.uint, 2]);
        let vec3 = b.ty(Op::TypeVector, &[b.float, 3]);
        b.mat3 = b.ty(Op::TypeMatrix, &[vec3, 3]);
        b.mat4 = b.ty(Op::TypeMatrix, &[b.vec4, 4]);
        b
    }

    fn id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn inst(&mut self, opcode: Op, operands: &[u32]) {
        self.decls
            .push(((operands.len() as u32 + 1) << 16) | opcode as u32);
        self.decls.extend_from_slice(operands);
    }

    fn body_inst(&mut self, opcode: Op, operands: &[u32]) {
        self.body
            .push(((operands.len() as u32 + 1) << 16) | opcode as u32);
        self.body.extend_from_slice(operands);
    }

    fn ty(&mut self, opcode: Op, operands: &[u32]) -> u32 {
        let id = self.id();
        let mut all = vec![id];
        all.extend_from_slice(operands);
        self.inst(opcode, &all);
        id
    }

    fn name(&mut self, id: u32, name: &str) {
        let mut operands = vec![id];
        operands.extend(string_words(name));
        self.inst(Op::Name, &operands);
    }

    fn member_name(&mut self, id: u32, member: u32, name: &str) {
        let mut operands = vec![id, member];
        operands.extend(string_words(name));
        self.inst(Op::MemberName, &operands);
    }

    fn constant(&mut self, value: u32) -> u32 {
        let id = self.id();
        self.inst(Op::Constant, &[self.uint, id, value]);
        id
    }

    fn array(&mut self, element: u32, length: u32) -> u32 {
        let length = self.constant(length);
        self.ty(Op::TypeArray, &[element, length])
    }

    /// Declares a block struct. Members are `(name, type, offset)`.
    fn block(&mut self, name: &str, members: &[(&str, u32, u32)]) -> u32 {
        let types: Vec<u32> = members.iter().map(|(_, ty, _)| *ty).collect();
        let id = self.ty(Op::TypeStruct, &types);
        self.name(id, name);
        self.inst(Op::Decorate, &[id, Decoration::Block as u32]);
        for (idx, (member, ty, offset)) in members.iter().enumerate() {
            let idx = idx as u32;
            self.member_name(id, idx, member);
            self.inst(Op::MemberDecorate, &[id, idx, Decoration::Offset as u32, *offset]);
            if *ty == self.mat3 || *ty == self.mat4 {
                self.inst(Op::MemberDecorate, &[id, idx, Decoration::MatrixStride as u32, 16]);
            }
        }
        id
    }

    /// Block of `count` vec4s.
    fn vec4_block(&mut self, name: &str, count: u32) -> u32 {
        let members: Vec<(String, u32)> = (0..count)
            .map(|idx| (format!("m{idx}"), idx * 16))
            .collect();
        let vec4 = self.vec4;
        let members: Vec<(&str, u32, u32)> = members
            .iter()
            .map(|(name, offset)| (name.as_str(), vec4, *offset))
            .collect();
        self.block(name, &members)
    }

    fn variable(&mut self, name: &str, class: StorageClass, pointee: u32) -> u32 {
        let pointer = self.ty(Op::TypePointer, &[class as u32, pointee]);
        let id = self.id();
        self.inst(Op::Variable, &[pointer, id, class as u32]);
        self.name(id, name);
        id
    }

    fn bind(&mut self, var: u32, set: u32, binding: u32) {
        self.inst(Op::Decorate, &[var, Decoration::DescriptorSet as u32, set]);
        self.inst(Op::Decorate, &[var, Decoration::Binding as u32, binding]);
    }

    fn use_var(&mut self, var: u32) {
        let result = self.id();
        self.body_inst(Op::Load, &[self.float, result, var]);
    }

    fn uniform_buffer(&mut self, name: &str, set: u32, binding: u32, vec4s: u32) -> u32 {
        let block = self.vec4_block(&format!("{name}Block"), vec4s);
        let var = self.variable(name, StorageClass::Uniform, block);
        self.bind(var, set, binding);
        var
    }

    fn build(mut self) -> Vec<u32> {
        let fn_type = self.ty(Op::TypeFunction, &[self.void]);
        let function = self.id();
        let label = self.id();

        let mut words = vec![MAGIC_NUMBER, 0x0001_0000, 0, 0, 0];
        words.extend_from_slice(&self.decls);
        words.extend_from_slice(&[(5 << 16) | Op::Function as u32, self.void, function, 0, fn_type]);
        words.extend_from_slice(&[(2 << 16) | Op::Label as u32, label]);
        words.extend_from_slice(&self.body);
        words.extend_from_slice(&[(1 << 16) | Op::Return as u32, (1 << 16) | Op::FunctionEnd as u32]);
        words[3] = self.next_id;
        words
    }
}

fn reflect(registry: &GlobalReflectionRegistry, stage: ShaderStage, words: &[u32], data: &mut ReflectionData) {
    Reflector::new(registry)
        .try_reflect(stage, words, data)
        .unwrap();
}

#[test]
fn parse_errors() {
    assert_eq!(
        SpirvModule::parse(&[MAGIC_NUMBER, 0, 0]).unwrap_err(),
        SpirvParseError::TooShort(3)
    );
    assert_eq!(
        SpirvModule::parse(&[0xDEAD_BEEF, 0, 0, 0, 0]).unwrap_err(),
        SpirvParseError::BadMagic(0xDEAD_BEEF)
    );
    // Instruction claims three words but only two remain
    let truncated = [MAGIC_NUMBER, 0x0001_0000, 0, 2, 0, (3 << 16) | Op::TypeFloat as u32, 1];
    assert!(matches!(
        SpirvModule::parse(&truncated),
        Err(SpirvParseError::Malformed(_))
    ));
    // Zero length instruction
    let empty = [MAGIC_NUMBER, 0x0001_0000, 0, 2, 0, Op::TypeFloat as u32];
    assert!(matches!(
        SpirvModule::parse(&empty),
        Err(SpirvParseError::Malformed(_))
    ));

    let registry = GlobalReflectionRegistry::new();
    let mut data = ReflectionData::default();
    assert!(Reflector::new(&registry)
        .try_reflect(ShaderStage::Vertex, &[1, 2, 3, 4, 5], &mut data)
        .is_err());
    assert_eq!(data, ReflectionData::default());
}

#[test]
fn module_layout_queries() {
    let mut b = SpirvBuilder::new();
    let float_array = b.array(b.float, 3);
    b.inst(Op::Decorate, &[float_array, Decoration::ArrayStride as u32, 16]);
    let block = b.block(
        "Layout",
        &[("model", b.mat4, 0), ("tint", b.vec4, 64), ("weights", float_array, 80)],
    );
    let words = b.build();

    let module = SpirvModule::parse(&words).unwrap();
    assert_eq!(module.ty(block), Some(SpirvType::Struct));
    assert_eq!(module.name(block), Some("Layout"));
    assert_eq!(module.member_name(block, 1), Some("tint"));
    assert_eq!(module.array_length(float_array), 3);
    assert_eq!(module.declared_struct_size(block), 128);
}

#[test]
fn uniform_buffer_size_convergence() {
    let registry = GlobalReflectionRegistry::new();

    let mut a = SpirvBuilder::new();
    let var = a.uniform_buffer("u_Globals", 0, 0, 4);
    a.use_var(var);
    let shader_a = a.build();

    let mut b = SpirvBuilder::new();
    let var = b.uniform_buffer("u_Globals", 0, 0, 6);
    b.use_var(var);
    let shader_b = b.build();

    let mut data_a = ReflectionData::default();
    reflect(&registry, ShaderStage::Vertex, &shader_a, &mut data_a);
    assert_eq!(data_a.descriptor_sets[0].uniform_buffers[&0].size, 64);

    let mut data_b = ReflectionData::default();
    reflect(&registry, ShaderStage::Vertex, &shader_b, &mut data_b);
    assert_eq!(data_b.descriptor_sets[0].uniform_buffers[&0].size, 96);
    assert_eq!(registry.uniform_buffer_size(0, 0), Some(96));

    // The first shader converges once resolved against the registry
    data_a.resolve_with(&registry);
    assert_eq!(data_a.descriptor_sets[0].uniform_buffers[&0].size, 96);

    // Shaders reflected after the larger declaration see it immediately
    let mut data_c = ReflectionData::default();
    reflect(&registry, ShaderStage::Fragment, &shader_a, &mut data_c);
    assert_eq!(data_c.descriptor_sets[0].uniform_buffers[&0].size, 96);
}

#[test]
fn storage_buffers() {
    let registry = GlobalReflectionRegistry::new();
    let mut b = SpirvBuilder::new();
    let runtime = b.ty(Op::TypeRuntimeArray, &[b.vec4]);
    let block = b.block("Particles", &[("count", b.uint, 0), ("data", runtime, 16)]);
    let var = b.variable("", StorageClass::StorageBuffer, block);
    b.bind(var, 1, 3);
    b.use_var(var);
    let words = b.build();

    let mut data = ReflectionData::default();
    reflect(&registry, ShaderStage::Compute, &words, &mut data);

    let buffer = &data.descriptor_sets[1].storage_buffers[&3];
    assert_eq!(buffer.name, "Particles");
    assert_eq!(buffer.size, 16);
    assert_eq!(buffer.stages, StageFlags::COMPUTE);
    assert_eq!(registry.storage_buffer_size(1, 3), Some(16));
    assert!(data.descriptor_sets[0].is_empty());

    let write = data.descriptor_sets[1].write_descriptors["Particles"];
    assert_eq!(write.kind, ResourceKind::StorageBuffer);
    assert_eq!(write.binding, 3);
    assert_eq!(write.count, 1);
}

#[test]
fn unused_buffers_are_skipped() {
    let registry = GlobalReflectionRegistry::new();
    let mut b = SpirvBuilder::new();
    let used = b.uniform_buffer("u_Camera", 0, 0, 4);
    let unused = b.uniform_buffer("u_Unused", 0, 1, 2);
    b.use_var(used);
    // A line number that happens to equal the unused variable's id is not a reference
    let file = b.id();
    b.body_inst(Op::Line, &[file, unused, 1]);
    let words = b.build();

    let mut data = ReflectionData::default();
    reflect(&registry, ShaderStage::Vertex, &words, &mut data);

    let set = &data.descriptor_sets[0];
    assert!(set.uniform_buffers.contains_key(&0));
    assert!(!set.uniform_buffers.contains_key(&1));
    assert!(!set.write_descriptors.contains_key("u_Unused"));
    assert_eq!(registry.uniform_buffer_size(0, 1), None);
}

#[test]
fn literal_operands_are_not_references() {
    let registry = GlobalReflectionRegistry::new();
    let mut b = SpirvBuilder::new();
    let used = b.uniform_buffer("u_Camera", 0, 0, 4);
    let unused = b.uniform_buffer("u_Unused", 0, 1, 2);
    let selector = b.constant(0);

    // Alignment of an aligned load
    let loaded = b.id();
    let aligned = MemoryAccess::ALIGNED.bits();
    b.body_inst(Op::Load, &[b.float, loaded, used, aligned, unused]);

    // Switch case literal, followed by the blocks it branches to
    let default = b.id();
    let case = b.id();
    b.body_inst(Op::Switch, &[selector, default, unused, case]);
    b.body_inst(Op::Label, &[default]);
    b.body_inst(Op::Return, &[]);
    b.body_inst(Op::Label, &[case]);
    let words = b.build();

    let mut data = ReflectionData::default();
    reflect(&registry, ShaderStage::Fragment, &words, &mut data);

    let set = &data.descriptor_sets[0];
    assert_eq!(set.uniform_buffers[&0].name, "u_Camera");
    assert!(!set.uniform_buffers.contains_key(&1));
    assert!(!set.write_descriptors.contains_key("u_Unused"));
    assert_eq!(registry.uniform_buffer_size(0, 1), None);
}

#[test]
fn stages_are_merged() {
    let registry = GlobalReflectionRegistry::new();
    let mut data = ReflectionData::default();

    for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
        let mut b = SpirvBuilder::new();
        let var = b.uniform_buffer("u_Camera", 0, 0, 4);
        b.use_var(var);
        reflect(&registry, stage, &b.build(), &mut data);
    }

    assert_eq!(data.descriptor_sets.len(), 1);
    let buffer = &data.descriptor_sets[0].uniform_buffers[&0];
    assert_eq!(buffer.stages, StageFlags::VERTEX | StageFlags::FRAGMENT);
    assert_eq!(buffer.name, "u_Camera");
}

#[test]
fn push_constant_ranges_accumulate() {
    let registry = GlobalReflectionRegistry::new();
    let mut data = ReflectionData::default();

    let mut vert = SpirvBuilder::new();
    let block = vert.block("VertexConstants", &[("transform_index", vert.vec4, 0)]);
    vert.variable("u_Vertex", StorageClass::PushConstant, block);
    reflect(&registry, ShaderStage::Vertex, &vert.build(), &mut data);

    let mut frag = SpirvBuilder::new();
    let block = frag.block(
        "MaterialConstants",
        &[("albedo", frag.vec4, 16), ("emissive", frag.vec4, 32)],
    );
    frag.variable("u_Material", StorageClass::PushConstant, block);
    reflect(&registry, ShaderStage::Fragment, &frag.build(), &mut data);

    let ranges: Vec<_> = data
        .push_constant_ranges
        .iter()
        .map(|range| (range.stages, range.offset, range.size))
        .collect();
    assert_eq!(
        ranges,
        vec![(StageFlags::VERTEX, 0, 16), (StageFlags::FRAGMENT, 16, 32)]
    );
    assert_eq!(data.push_constant_size(), 48);

    let material = &data.constant_buffers["u_Material"];
    assert_eq!(material.size, 32);
    let albedo = &material.uniforms["u_Material.albedo"];
    assert_eq!(albedo.offset, 0);
    assert_eq!(albedo.size, 16);
    assert_eq!(albedo.ty, ShaderUniformType::Vec4);
    assert_eq!(material.uniforms["u_Material.emissive"].offset, 16);

    assert_eq!(
        data.constant_buffers["u_Vertex"].uniforms["u_Vertex.transform_index"].offset,
        0
    );
}

#[test]
fn reserved_push_constants_only_get_a_range() {
    let registry = GlobalReflectionRegistry::new();
    let mut data = ReflectionData::default();

    let mut vert = SpirvBuilder::new();
    let block = vert.block("Renderer", &[("model", vert.mat4, 0)]);
    vert.variable(RENDERER_PUSH_CONSTANT_NAME, StorageClass::PushConstant, block);
    reflect(&registry, ShaderStage::Vertex, &vert.build(), &mut data);

    let mut frag = SpirvBuilder::new();
    let block = frag.block("Anonymous", &[("model", frag.mat4, 0), ("tint", frag.vec4, 64)]);
    frag.variable("", StorageClass::PushConstant, block);
    reflect(&registry, ShaderStage::Fragment, &frag.build(), &mut data);

    assert!(data.constant_buffers.is_empty());
    assert_eq!(data.push_constant_ranges.len(), 2);
    assert_eq!(data.push_constant_ranges[0].size, 64);
    assert_eq!(data.push_constant_ranges[1].offset, 64);
    assert_eq!(data.push_constant_ranges[1].size, 16);
}

#[test]
fn shared_push_constant_block_extends_range_stages() {
    let registry = GlobalReflectionRegistry::new();
    let mut data = ReflectionData::default();

    for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
        let mut b = SpirvBuilder::new();
        let block = b.block("Constants", &[("tint", b.vec4, 0)]);
        b.variable("u_Constants", StorageClass::PushConstant, block);
        reflect(&registry, stage, &b.build(), &mut data);
    }

    assert_eq!(data.push_constant_ranges.len(), 1);
    let range = data.push_constant_ranges[0];
    assert_eq!(range.stages, StageFlags::VERTEX | StageFlags::FRAGMENT);
    assert_eq!((range.offset, range.size), (0, 16));

    let constants = &data.constant_buffers["u_Constants"];
    assert_eq!(constants.size, 16);
    assert_eq!(constants.uniforms["u_Constants.tint"].offset, 0);

    // A later stage reading only part of an earlier range joins that range
    let mut compute = SpirvBuilder::new();
    let block = compute.block("Tail", &[("tint", compute.vec4, 0)]);
    compute.variable("u_Tail", StorageClass::PushConstant, block);
    reflect(&registry, ShaderStage::Compute, &compute.build(), &mut data);

    assert_eq!(data.push_constant_ranges.len(), 1);
    assert!(data.push_constant_ranges[0]
        .stages
        .contains(StageFlags::COMPUTE));
    assert_eq!(data.constant_buffers["u_Tail"].size, 16);
}

#[test]
fn uniform_types() {
    let registry = GlobalReflectionRegistry::new();
    let mut b = SpirvBuilder::new();
    let block = b.block(
        "Types",
        &[
            ("flag", b.bool, 0),
            ("index", b.int, 4),
            ("count", b.uint, 8),
            ("scale", b.float, 12),
            ("cell", b.ivec3, 16),
            ("size", b.uvec2, 32),
            ("normal", b.mat3, 48),
            ("model", b.mat4, 96),
        ],
    );
    b.variable("u_Types", StorageClass::PushConstant, block);

    let mut data = ReflectionData::default();
    reflect(&registry, ShaderStage::Compute, &b.build(), &mut data);

    let uniforms = &data.constant_buffers["u_Types"].uniforms;
    let ty = |name: &str| uniforms[&format!("u_Types.{name}")].ty;
    assert_eq!(ty("flag"), ShaderUniformType::Bool);
    assert_eq!(ty("index"), ShaderUniformType::Int);
    assert_eq!(ty("count"), ShaderUniformType::UInt);
    assert_eq!(ty("scale"), ShaderUniformType::Float);
    assert_eq!(ty("cell"), ShaderUniformType::IVec3);
    assert_eq!(ty("size"), ShaderUniformType::UVec2);
    assert_eq!(ty("normal"), ShaderUniformType::Mat3);
    assert_eq!(ty("model"), ShaderUniformType::Mat4);

    assert_eq!(uniforms["u_Types.normal"].size, 48);
    assert_eq!(uniforms["u_Types.model"].size, 64);
    assert_eq!(data.constant_buffers["u_Types"].size, 160);
}

#[test]
fn images_and_samplers() {
    let registry = GlobalReflectionRegistry::new();
    let mut b = SpirvBuilder::new();

    // Image operands: sampled type, dim, depth, arrayed, ms, sampled, format
    let texture = b.ty(Op::TypeImage, &[b.float, 1, 0, 0, 0, 1, 0]);
    let storage = b.ty(Op::TypeImage, &[b.float, 1, 0, 0, 0, 2, 1]);
    let sampled = b.ty(Op::TypeSampledImage, &[texture]);
    let sampler = b.ty(Op::TypeSampler, &[]);
    let sampled_array = b.array(sampled, 4);
    let unsized_textures = b.ty(Op::TypeRuntimeArray, &[texture]);

    let albedo = b.variable("u_Textures", StorageClass::UniformConstant, sampled_array);
    b.bind(albedo, 2, 1);
    let output = b.variable("u_Output", StorageClass::UniformConstant, storage);
    b.bind(output, 0, 0);
    let bindless = b.variable("u_Bindless", StorageClass::UniformConstant, unsized_textures);
    b.bind(bindless, 1, 0);
    let linear = b.variable("u_Linear", StorageClass::UniformConstant, sampler);
    b.bind(linear, 1, 1);
    // Inputs are not resources
    b.variable("in_Position", StorageClass::Input, b.vec4);

    let mut data = ReflectionData::default();
    reflect(&registry, ShaderStage::Fragment, &b.build(), &mut data);

    // Set list grows without gaps
    assert_eq!(data.descriptor_sets.len(), 3);

    let textures = &data.descriptor_sets[2].image_samplers[&1];
    assert_eq!(textures.name, "u_Textures");
    assert_eq!(textures.array_size, 4);
    assert_eq!(textures.stages, StageFlags::FRAGMENT);

    assert_eq!(data.descriptor_sets[0].storage_images[&0].name, "u_Output");
    assert_eq!(data.descriptor_sets[1].separate_textures[&0].array_size, 1);
    assert_eq!(data.descriptor_sets[1].separate_samplers[&1].name, "u_Linear");

    let declaration = &data.resources["u_Textures"];
    assert_eq!(declaration.set, 2);
    assert_eq!(declaration.binding, 1);
    assert_eq!(declaration.count, 4);
    assert_eq!(declaration.kind, ResourceKind::ImageSampler);
    assert_eq!(data.resources.len(), 4);
    assert!(!data.resources.contains_key("in_Position"));

    assert_eq!(
        data.descriptor_sets[1].write_descriptors["u_Linear"].kind,
        ResourceKind::SeparateSampler
    );
}

fn sample_data() -> ReflectionData {
    let registry = GlobalReflectionRegistry::new();
    let mut data = ReflectionData::default();

    let mut vert = SpirvBuilder::new();
    let camera = vert.uniform_buffer("u_Camera", 0, 0, 8);
    vert.use_var(camera);
    let block = vert.block("Draw", &[("model", vert.mat4, 0)]);
    vert.variable("u_Draw", StorageClass::PushConstant, block);
    reflect(&registry, ShaderStage::Vertex, &vert.build(), &mut data);

    let mut frag = SpirvBuilder::new();
    let texture = frag.ty(Op::TypeImage, &[frag.float, 1, 0, 0, 0, 1, 0]);
    let sampled = frag.ty(Op::TypeSampledImage, &[texture]);
    let var = frag.variable("u_Albedo", StorageClass::UniformConstant, sampled);
    frag.bind(var, 1, 0);
    reflect(&registry, ShaderStage::Fragment, &frag.build(), &mut data);

    data
}

#[test]
fn cache_round_trip() {
    let data = sample_data();
    assert!(!data.constant_buffers.is_empty());
    assert!(!data.resources.is_empty());

    let bytes = cache::encode(&data).unwrap();
    assert_eq!(&bytes[..4], &REFLECTION_CACHE_MAGIC);
    assert_eq!(cache::decode(&bytes).unwrap(), data);

    let dir = TempDir::new().unwrap();
    let reflection = ReflectionCache::in_dir(dir.path());
    let shader = Path::new("shaders/pbr.glsl");
    assert!(reflection.try_read(shader).is_none());

    reflection.write(shader, &data).unwrap();
    assert_eq!(reflection.try_read(shader).unwrap(), data);

    reflection.clear().unwrap();
    assert!(reflection.try_read(shader).is_none());
}

#[test]
fn cache_rejects_bad_headers() {
    let data = sample_data();
    let bytes = cache::encode(&data).unwrap();

    let mut corrupted = bytes.clone();
    corrupted[1] ^= 0xFF;
    assert!(matches!(
        cache::decode(&corrupted),
        Err(ReflectionCacheError::BadMagic)
    ));

    assert!(matches!(
        cache::decode(&bytes[..3]),
        Err(ReflectionCacheError::BadMagic)
    ));

    let mut future = bytes.clone();
    future[4..8].copy_from_slice(&(REFLECTION_CACHE_VERSION + 1).to_le_bytes());
    assert!(matches!(
        cache::decode(&future),
        Err(ReflectionCacheError::UnsupportedVersion(_))
    ));

    assert!(cache::decode(&bytes[..bytes.len() / 2]).is_err());

    // A corrupted file on disk reads as missing
    let dir = TempDir::new().unwrap();
    let reflection = ReflectionCache::in_dir(dir.path());
    let shader = Path::new("pbr.glsl");
    reflection.write(shader, &data).unwrap();
    std::fs::write(reflection.path(shader), &corrupted).unwrap();
    assert!(reflection.try_read(shader).is_none());
}

#[test]
fn registry_absorb_and_clear() {
    let data = sample_data();
    let registry = GlobalReflectionRegistry::new();
    assert!(registry.is_empty());

    registry.absorb(&data);
    assert_eq!(registry.uniform_buffer_size(0, 0), Some(128));

    assert_eq!(registry.register_uniform_buffer(0, 0, 64), 128);
    assert_eq!(registry.register_uniform_buffer(0, 0, 256), 256);

    registry.clear();
    assert!(registry.is_empty());
    assert_eq!(registry.uniform_buffer_size(0, 0), None);
}
