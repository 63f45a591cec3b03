//! Recovers descriptor layouts, buffer sizes and push constant ranges from compiled SPIR-V.
//!
//! Stages are reflected one at a time into a shared [`ReflectionData`](data::ReflectionData).
//! Buffer sizes are reconciled across every shader through a
//! [`GlobalReflectionRegistry`](registry::GlobalReflectionRegistry), and the result of a whole
//! shader can be persisted with a [`ReflectionCache`](cache::ReflectionCache).

pub mod cache;
pub mod data;
pub mod module;
pub mod reflector;
pub mod registry;

#[cfg(test)]
mod tests;

pub mod prelude {
    pub use crate::{cache::*, data::*, reflector::*, registry::*, module::SpirvParseError};
}
