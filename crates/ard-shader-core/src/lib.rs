//! Types shared by every stage of the shader pipeline: pipeline stages, stage bitmasks, content
//! hashes, and whole-file I/O helpers used by the caches.

pub mod hash;
pub mod io;
pub mod stage;

#[cfg(test)]
mod tests;

pub mod prelude {
    pub use crate::{hash::*, stage::*};
}
