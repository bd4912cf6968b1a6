use bytemuck::{Pod, Zeroable};
use grainparams::GrainParams;

/// Uniform block bound at group 2, slot 0. Field order and offsets mirror the
/// `GrainParams` struct in `shaders/grain_header.wgsl`; the layout needs no
/// explicit padding because every member already lands on its WGSL alignment.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GrainUniforms {
    pub offset_r: [i32; 2],
    pub offset_g: [i32; 2],
    pub offset_b: [i32; 2],
    pub tile_size: i32,
    pub grayscale: i32,
    pub layer_weights: [f32; 4],
    pub base_color: [f32; 3],
    pub use_base_color: f32,
}

impl From<&GrainParams> for GrainUniforms {
    fn from(params: &GrainParams) -> Self {
        Self {
            offset_r: params.noise_offsets_r,
            offset_g: params.noise_offsets_g,
            offset_b: params.noise_offsets_b,
            tile_size: params.noise_tile_size,
            grayscale: i32::from(params.grayscale),
            layer_weights: params.layer_weights,
            base_color: params.base_color,
            use_base_color: params.use_base_color,
        }
    }
}
