//! Lookup tables over a SPIR-V module loaded with `rspirv`.
//!
//! Only what reflection needs is kept: debug names, decorations, type declarations, integer
//! constants and module scope variables. Function bodies are scanned for id operands, which is
//! how unused resources are detected.

use rspirv::dr::{self, Instruction, Operand};
use rustc_hash::{FxHashMap, FxHashSet};
use spirv::{Decoration, Op, StorageClass, Word};
use thiserror::Error;

const HEADER_WORDS: usize = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpirvParseError {
    #[error("module has {0} words which is shorter than the header")]
    TooShort(usize),
    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),
    #[error("malformed module: {0}")]
    Malformed(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpirvType {
    Void,
    Bool,
    Int { width: u32, signed: bool },
    Float { width: u32 },
    Vector { component: Word, count: u32 },
    Matrix { column: Word, count: u32 },
    /// `sampled` is 1 for images used with a sampler and 2 for storage images.
    Image { sampled: u32 },
    Sampler,
    SampledImage { image: Word },
    Array { element: Word, length: Word },
    RuntimeArray { element: Word },
    /// Members are listed separately. See [`SpirvModule::struct_members`].
    Struct,
    Pointer {
        storage_class: StorageClass,
        pointee: Word,
    },
}

/// Decorations relevant to reflection.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Decorations {
    pub binding: Option<u32>,
    pub set: Option<u32>,
    pub offset: Option<u32>,
    pub array_stride: Option<u32>,
    pub matrix_stride: Option<u32>,
    pub block: bool,
    pub buffer_block: bool,
}

/// A variable declared outside of any function.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GlobalVariable {
    pub id: Word,
    pub pointer_type: Word,
    pub storage_class: StorageClass,
}

#[derive(Debug, Default)]
pub struct SpirvModule {
    names: FxHashMap<Word, String>,
    member_names: FxHashMap<(Word, u32), String>,
    decorations: FxHashMap<Word, Decorations>,
    member_decorations: FxHashMap<(Word, u32), Decorations>,
    types: FxHashMap<Word, SpirvType>,
    struct_members: FxHashMap<Word, Vec<Word>>,
    constants: FxHashMap<Word, u32>,
    variables: Vec<GlobalVariable>,
    referenced: FxHashSet<Word>,
}

impl SpirvModule {
    pub fn parse(words: &[u32]) -> Result<Self, SpirvParseError> {
        if words.len() < HEADER_WORDS {
            return Err(SpirvParseError::TooShort(words.len()));
        }

        if words[0] != spirv::MAGIC_NUMBER {
            return Err(SpirvParseError::BadMagic(words[0]));
        }

        let loaded =
            dr::load_words(words).map_err(|err| SpirvParseError::Malformed(err.to_string()))?;

        let mut module = SpirvModule::default();
        for inst in &loaded.debug_names {
            module.debug_name(inst);
        }
        for inst in &loaded.annotations {
            module.annotation(inst);
        }
        for inst in &loaded.types_global_values {
            module.declaration(inst);
        }

        // Only id operands count. Literals such as line numbers, switch cases or alignments
        // never refer to a variable.
        let body = loaded
            .functions
            .iter()
            .flat_map(|function| function.blocks.iter())
            .flat_map(|block| block.instructions.iter());
        for inst in body {
            module
                .referenced
                .extend(inst.operands.iter().filter_map(|operand| match operand {
                    Operand::IdRef(id) => Some(*id),
                    _ => None,
                }));
        }

        Ok(module)
    }

    fn debug_name(&mut self, inst: &Instruction) {
        match inst.class.opcode {
            Op::Name => {
                if let (Some(target), Some(name)) = (id_operand(inst, 0), string_operand(inst, 1))
                {
                    self.names.insert(target, name.to_owned());
                }
            }
            Op::MemberName => {
                if let (Some(target), Some(member), Some(name)) = (
                    id_operand(inst, 0),
                    literal_operand(inst, 1),
                    string_operand(inst, 2),
                ) {
                    self.member_names.insert((target, member), name.to_owned());
                }
            }
            _ => {}
        }
    }

    fn annotation(&mut self, inst: &Instruction) {
        match inst.class.opcode {
            Op::Decorate => {
                let (Some(target), Some(Operand::Decoration(kind))) =
                    (id_operand(inst, 0), inst.operands.get(1))
                else {
                    return;
                };
                let entry = self.decorations.entry(target).or_default();
                apply_decoration(entry, *kind, literal_operand(inst, 2));
            }
            Op::MemberDecorate => {
                let (Some(target), Some(member), Some(Operand::Decoration(kind))) = (
                    id_operand(inst, 0),
                    literal_operand(inst, 1),
                    inst.operands.get(2),
                ) else {
                    return;
                };
                let entry = self.member_decorations.entry((target, member)).or_default();
                apply_decoration(entry, *kind, literal_operand(inst, 3));
            }
            _ => {}
        }
    }

    fn declaration(&mut self, inst: &Instruction) {
        let Some(result) = inst.result_id else {
            return;
        };

        let ty = match inst.class.opcode {
            Op::TypeVoid => SpirvType::Void,
            Op::TypeBool => SpirvType::Bool,
            Op::TypeInt => SpirvType::Int {
                width: literal_operand(inst, 0).unwrap_or(0),
                signed: literal_operand(inst, 1).unwrap_or(0) != 0,
            },
            Op::TypeFloat => SpirvType::Float {
                width: literal_operand(inst, 0).unwrap_or(0),
            },
            Op::TypeVector => SpirvType::Vector {
                component: id_operand(inst, 0).unwrap_or(0),
                count: literal_operand(inst, 1).unwrap_or(0),
            },
            Op::TypeMatrix => SpirvType::Matrix {
                column: id_operand(inst, 0).unwrap_or(0),
                count: literal_operand(inst, 1).unwrap_or(0),
            },
            Op::TypeImage => SpirvType::Image {
                sampled: literal_operand(inst, 5).unwrap_or(0),
            },
            Op::TypeSampler => SpirvType::Sampler,
            Op::TypeSampledImage => SpirvType::SampledImage {
                image: id_operand(inst, 0).unwrap_or(0),
            },
            Op::TypeArray => SpirvType::Array {
                element: id_operand(inst, 0).unwrap_or(0),
                length: id_operand(inst, 1).unwrap_or(0),
            },
            Op::TypeRuntimeArray => SpirvType::RuntimeArray {
                element: id_operand(inst, 0).unwrap_or(0),
            },
            Op::TypeStruct => {
                let members = (0..inst.operands.len())
                    .filter_map(|idx| id_operand(inst, idx))
                    .collect();
                self.struct_members.insert(result, members);
                SpirvType::Struct
            }
            Op::TypePointer => {
                let (Some(Operand::StorageClass(storage_class)), Some(pointee)) =
                    (inst.operands.first(), id_operand(inst, 1))
                else {
                    return;
                };
                SpirvType::Pointer {
                    storage_class: *storage_class,
                    pointee,
                }
            }
            Op::Constant => {
                if let Some(value) = literal_operand(inst, 0) {
                    self.constants.insert(result, value);
                }
                return;
            }
            Op::Variable => {
                if let (Some(pointer_type), Some(Operand::StorageClass(storage_class))) =
                    (inst.result_type, inst.operands.first())
                {
                    self.variables.push(GlobalVariable {
                        id: result,
                        pointer_type,
                        storage_class: *storage_class,
                    });
                }
                return;
            }
            _ => return,
        };

        self.types.insert(result, ty);
    }

    /// Variables declared at module scope, in declaration order.
    #[inline(always)]
    pub fn variables(&self) -> &[GlobalVariable] {
        &self.variables
    }

    #[inline]
    pub fn name(&self, id: Word) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    #[inline]
    pub fn member_name(&self, struct_id: Word, member: u32) -> Option<&str> {
        self.member_names
            .get(&(struct_id, member))
            .map(String::as_str)
    }

    #[inline]
    pub fn decorations(&self, id: Word) -> Decorations {
        self.decorations.get(&id).copied().unwrap_or_default()
    }

    #[inline]
    pub fn member_decorations(&self, struct_id: Word, member: u32) -> Decorations {
        self.member_decorations
            .get(&(struct_id, member))
            .copied()
            .unwrap_or_default()
    }

    #[inline]
    pub fn ty(&self, id: Word) -> Option<SpirvType> {
        self.types.get(&id).copied()
    }

    /// Member type ids of a struct.
    #[inline]
    pub fn struct_members(&self, id: Word) -> &[Word] {
        self.struct_members
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    #[inline]
    pub fn constant(&self, id: Word) -> Option<u32> {
        self.constants.get(&id).copied()
    }

    /// `true` if any function refers to `id`.
    #[inline]
    pub fn is_referenced(&self, id: Word) -> bool {
        self.referenced.contains(&id)
    }

    /// Number of elements in an array type. Runtime arrays report `0`.
    pub fn array_length(&self, id: Word) -> u32 {
        match self.ty(id) {
            Some(SpirvType::Array { length, .. }) => self.constant(length).unwrap_or(0),
            _ => 0,
        }
    }

    /// Offset of the first member of a struct. Structs without offsets start at `0`.
    pub fn struct_start(&self, id: Word) -> u32 {
        (0..self.struct_members(id).len() as u32)
            .filter_map(|idx| self.member_decorations(id, idx).offset)
            .min()
            .unwrap_or(0)
    }

    /// Size of a struct as laid out in memory. This is the end of its furthest member, so
    /// trailing padding is not included.
    pub fn declared_struct_size(&self, id: Word) -> u32 {
        self.struct_members(id)
            .iter()
            .enumerate()
            .map(|(idx, member)| {
                let decorations = self.member_decorations(id, idx as u32);
                decorations.offset.unwrap_or(0)
                    + self.type_size(*member, decorations.matrix_stride)
            })
            .max()
            .unwrap_or(0)
    }

    /// Size in bytes of a type inside a buffer. Runtime arrays have no static size and report
    /// `0`.
    pub fn type_size(&self, id: Word, matrix_stride: Option<u32>) -> u32 {
        match self.ty(id) {
            Some(SpirvType::Bool) => 4,
            Some(SpirvType::Int { width, .. }) | Some(SpirvType::Float { width }) => width / 8,
            Some(SpirvType::Vector { component, count }) => {
                self.type_size(component, None) * count
            }
            Some(SpirvType::Matrix { column, count }) => match matrix_stride {
                Some(stride) => stride * count,
                None => self.type_size(column, None) * count,
            },
            Some(SpirvType::Array { element, .. }) => {
                let stride = match self.decorations(id).array_stride {
                    Some(stride) => stride,
                    None => self.type_size(element, matrix_stride),
                };
                stride * self.array_length(id)
            }
            Some(SpirvType::Struct) => self.declared_struct_size(id),
            _ => 0,
        }
    }
}

#[inline]
fn id_operand(inst: &Instruction, idx: usize) -> Option<Word> {
    match inst.operands.get(idx)? {
        Operand::IdRef(id) => Some(*id),
        _ => None,
    }
}

#[inline]
fn literal_operand(inst: &Instruction, idx: usize) -> Option<u32> {
    match inst.operands.get(idx)? {
        Operand::LiteralBit32(value) => Some(*value),
        _ => None,
    }
}

#[inline]
fn string_operand(inst: &Instruction, idx: usize) -> Option<&str> {
    match inst.operands.get(idx)? {
        Operand::LiteralString(text) => Some(text.as_str()),
        _ => None,
    }
}

fn apply_decoration(target: &mut Decorations, kind: Decoration, literal: Option<u32>) {
    match kind {
        Decoration::Block => target.block = true,
        Decoration::BufferBlock => target.buffer_block = true,
        Decoration::ArrayStride => target.array_stride = literal,
        Decoration::MatrixStride => target.matrix_stride = literal,
        Decoration::Binding => target.binding = literal,
        Decoration::DescriptorSet => target.set = literal,
        Decoration::Offset => target.offset = literal,
        _ => {}
    }
}
