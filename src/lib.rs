pub mod core {
    pub use ard_shader_core::*;
}

pub mod log {
    pub use ard_log::*;
}

pub mod preprocess {
    pub use ard_shader_preprocess::*;
}

pub mod registry {
    pub use ard_shader_registry::*;
}

pub mod compiler {
    pub use ard_shader_compiler::*;
}

pub mod reflect {
    pub use ard_shader_reflect::*;
}

pub mod shaders {
    pub use ard_shaders::*;
}

pub mod prelude {
    pub use ard_shader_compiler::prelude::*;
    pub use ard_shader_core::prelude::*;
    pub use ard_shader_preprocess::prelude::*;
    pub use ard_shader_reflect::prelude::*;
    pub use ard_shader_registry::prelude::*;
    pub use ard_shaders::prelude::*;
}
