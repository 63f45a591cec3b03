//! Top level of the shader pipeline.
//!
//! A [`ShaderLibrary`](library::ShaderLibrary) keeps the binaries and reflection data of every
//! loaded shader and reloads them on request. Each reload runs the
//! [`ShaderCompiler`](compiler::ShaderCompiler), which preprocesses the shader, asks the stage
//! cache which stages changed, compiles those (or reuses cached binaries) and reflects the
//! result.

pub mod compiler;
pub mod config;
pub mod error;
pub mod library;


pub mod prelude {
    pub use crate::{compiler::*, config::*, error::*, library::*};
}
