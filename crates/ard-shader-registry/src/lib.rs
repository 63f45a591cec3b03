//! Persistent record of the last preprocessed state of every shader stage.
//!
//! The [`StageCache`](cache::StageCache) compares freshly preprocessed stage metadata against the
//! registry file to find out which stages of a shader need to be recompiled.

pub mod cache;
pub mod registry;


pub mod prelude {
    pub use crate::{cache::*, registry::*};
}
