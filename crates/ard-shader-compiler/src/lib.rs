//! Turns preprocessed stage source into SPIR-V, reusing previously compiled binaries whenever a
//! stage has not changed and falling back to them when the compiler fails.

pub mod backend;
pub mod cache;
pub mod compiler;
pub mod glslc;


pub mod prelude {
    pub use crate::{backend::*, cache::*, compiler::*, glslc::*};
}
