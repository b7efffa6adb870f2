pub mod binding_builder;
#[allow(non_snake_case)]
pub mod binding_glsl;
pub mod pipelines;
pub mod shader;
