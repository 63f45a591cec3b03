//! Turns a multi-stage shader file into per-stage source text.
//!
//! Stages are split on `#pragma stage : <name>` markers. Each stage is then expanded: includes are
//! resolved against a search path, conditional blocks are evaluated, and the engine's global
//! macros the stage refers to are injected. Alongside the text, every stage gets a
//! [`StageMetadata`](metadata::StageMetadata) describing its content hash and include tree, which
//! is what the stage cache compares to decide if a recompile is needed.

pub mod error;
pub mod expr;
pub mod include;
pub mod metadata;
pub mod preprocessor;

mod directive;


pub mod prelude {
    pub use crate::{error::*, include::*, metadata::*, preprocessor::*};
}
