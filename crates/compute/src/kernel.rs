//! Assembles the WGSL grain kernel and describes the resources it expects.
//!
//! The kernel is built from a shared header (struct and texture bindings), a
//! variant prologue that defines `grain_params()`, and the entry body. The
//! baked variant compiles the default parameter record into the source; the
//! parameterized variant reads it from a uniform block at group 2.

use grainparams::GrainParams;

use crate::gpu::DISPATCH_TILE;
use crate::types::PipelineError;

const HEADER: &str = include_str!("shaders/grain_header.wgsl");
const BODY: &str = include_str!("shaders/grain_main.wgsl");

pub const ENTRY_POINT: &str = "composite_grain";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelVariant {
    /// Default parameters compiled into the kernel; no uniform block.
    Baked,
    /// Parameters supplied per dispatch through uniform slot 0.
    Parameterized,
}

impl KernelVariant {
    pub fn has_uniforms(self) -> bool {
        matches!(self, KernelVariant::Parameterized)
    }

    pub fn contract(self) -> KernelContract {
        KernelContract {
            readonly_textures: 2,
            readwrite_textures: 1,
            uniform_buffers: u32::from(self.has_uniforms()),
            threads: [DISPATCH_TILE, DISPATCH_TILE, 1],
        }
    }
}

/// Resource counts and thread tile a compiled kernel was declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelContract {
    pub readonly_textures: u32,
    pub readwrite_textures: u32,
    pub uniform_buffers: u32,
    pub threads: [u32; 3],
}

/// What the orchestrator is about to bind for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingPlan {
    pub readonly_textures: u32,
    pub readwrite_textures: u32,
    pub uniform_buffers: u32,
}

impl KernelContract {
    pub fn check(&self, plan: &BindingPlan) -> Result<(), PipelineError> {
        let mismatches: Vec<String> = [
            ("read-only textures", self.readonly_textures, plan.readonly_textures),
            ("read-write textures", self.readwrite_textures, plan.readwrite_textures),
            ("uniform buffers", self.uniform_buffers, plan.uniform_buffers),
        ]
        .into_iter()
        .filter(|(_, declared, bound)| declared != bound)
        .map(|(what, declared, bound)| format!("{what}: kernel declares {declared}, bound {bound}"))
        .collect();

        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::ContractMismatch(mismatches.join("; ")))
        }
    }
}

fn wgsl_float(value: f32) -> String {
    format!("{value:?}")
}

fn baked_prologue(params: &GrainParams) -> String {
    let ivec2 = |v: [i32; 2]| format!("vec2<i32>({}, {})", v[0], v[1]);
    let floats = |values: &[f32]| {
        values
            .iter()
            .map(|value| wgsl_float(*value))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "fn grain_params() -> GrainParams {{\n    return GrainParams(\n        {},\n        {},\n        {},\n        {},\n        {},\n        vec4<f32>({}),\n        vec3<f32>({}),\n        {}\n    );\n}}\n",
        ivec2(params.noise_offsets_r),
        ivec2(params.noise_offsets_g),
        ivec2(params.noise_offsets_b),
        params.noise_tile_size,
        i32::from(params.grayscale),
        floats(&params.layer_weights),
        floats(&params.base_color),
        wgsl_float(params.use_base_color),
    )
}

const UNIFORM_PROLOGUE: &str = "@group(2) @binding(0) var<uniform> params: GrainParams;\n\n\
fn grain_params() -> GrainParams {\n    return params;\n}\n";

/// Full WGSL source for `variant`.
pub fn kernel_source(variant: KernelVariant) -> String {
    let prologue = match variant {
        KernelVariant::Baked => baked_prologue(&GrainParams::default()),
        KernelVariant::Parameterized => UNIFORM_PROLOGUE.to_string(),
    };
    let body = BODY
        .replace("__TILE_X__", &DISPATCH_TILE.to_string())
        .replace("__TILE_Y__", &DISPATCH_TILE.to_string());
    format!("{HEADER}\n{prologue}\n{body}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::naga;

    fn parse(variant: KernelVariant) -> naga::Module {
        let source = kernel_source(variant);
        let module = naga::front::wgsl::parse_str(&source)
            .unwrap_or_else(|err| panic!("{}", err.emit_to_string(&source)));
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .unwrap_or_else(|err| panic!("{variant:?} failed validation: {err:?}"));
        module
    }

    fn declared_contract(module: &naga::Module) -> KernelContract {
        let mut contract = KernelContract {
            readonly_textures: 0,
            readwrite_textures: 0,
            uniform_buffers: 0,
            threads: module.entry_points[0].workgroup_size,
        };
        for (_, global) in module.global_variables.iter() {
            let Some(binding) = &global.binding else {
                continue;
            };
            match (&global.space, &module.types[global.ty].inner) {
                (naga::AddressSpace::Uniform, _) => {
                    assert_eq!((binding.group, binding.binding), (2, 0));
                    contract.uniform_buffers += 1;
                }
                (_, naga::TypeInner::Image { class, .. }) => match class {
                    naga::ImageClass::Storage { .. } => {
                        assert_eq!(binding.group, 1);
                        contract.readwrite_textures += 1;
                    }
                    _ => {
                        assert_eq!(binding.group, 0);
                        contract.readonly_textures += 1;
                    }
                },
                other => panic!("unexpected binding {other:?}"),
            }
        }
        contract
    }

    #[test]
    fn both_variants_compile_and_honour_their_contract() {
        for variant in [KernelVariant::Baked, KernelVariant::Parameterized] {
            let module = parse(variant);
            assert_eq!(module.entry_points.len(), 1);
            assert_eq!(module.entry_points[0].name, ENTRY_POINT);
            assert_eq!(declared_contract(&module), variant.contract());
        }
    }

    #[test]
    fn baked_source_embeds_defaults() {
        let source = kernel_source(KernelVariant::Baked);
        assert!(!source.contains("var<uniform>"));
        assert!(source.contains("vec2<i32>(6, 3)"));
        assert!(source.contains("vec4<f32>(1.0, 0.9, 0.75, 0.5)"));
        assert!(source.contains("@workgroup_size(8, 8, 1)"));
    }

    #[test]
    fn contract_check_flags_uniform_mismatch() {
        let contract = KernelVariant::Baked.contract();
        let plan = BindingPlan {
            readonly_textures: 2,
            readwrite_textures: 1,
            uniform_buffers: 1,
        };
        let err = contract.check(&plan).unwrap_err();
        assert!(err.to_string().contains("uniform buffers"));

        let matching = BindingPlan {
            uniform_buffers: 0,
            ..plan
        };
        assert!(contract.check(&matching).is_ok());
    }
}
