//! GPU compute pipeline for filmgrain.
//!
//! One run loads an image, composites film grain onto it with a single
//! compute dispatch and writes the result as a TGA file:
//!
//! ```text
//!   load_input ─┐
//!               ├─▶ GrainResources::create ──▶ run_passes ──▶ write_tga
//!   noise ──────┘        (device, transfer         │
//!                         buffer, textures,        ├─ upload input
//!                         kernel pipeline)         ├─ upload noise
//!                                                  ├─ dispatch (+ uniforms)
//!                                                  ├─ readback
//!                                                  └─ submit, wait, map
//! ```
//!
//! `run_job` strings these together. The kernel either bakes the default
//! grain parameters into its source (`KernelVariant::Baked`) or reads them
//! from a uniform block (`KernelVariant::Parameterized`).

pub mod gpu;
pub mod image_io;
pub mod kernel;
pub mod noise;
mod types;

use std::path::PathBuf;

use grainparams::GrainParams;

pub use gpu::{
    dispatch_groups, run_passes, GpuContext, GrainResources, PassStage, TransferLayout,
    DISPATCH_TILE,
};
pub use image_io::{load_input, load_noise, write_tga, BitDepth, PixelImage};
pub use kernel::{KernelContract, KernelVariant};
pub use noise::{builtin_noise, DEFAULT_NOISE_SEED};
pub use types::{ErrorClass, Extent, GpuPowerPreference, PipelineError};

/// Everything one invocation needs.
#[derive(Debug, Clone)]
pub struct GrainJob {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Replacement noise texture; the built-in one is generated when absent.
    pub noise: Option<PathBuf>,
    pub noise_seed: u64,
    /// `None` selects the baked kernel with default parameters.
    pub params: Option<GrainParams>,
    pub power: GpuPowerPreference,
}

impl GrainJob {
    pub fn variant(&self) -> KernelVariant {
        if self.params.is_some() {
            KernelVariant::Parameterized
        } else {
            KernelVariant::Baked
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobReport {
    pub extent: Extent,
    pub noise_extent: Extent,
    pub source_channels: u8,
    pub variant: KernelVariant,
    pub adapter: String,
    pub output: PathBuf,
}

pub fn run_job(job: &GrainJob) -> Result<JobReport, PipelineError> {
    let input = load_input(&job.input)?;
    let noise = match &job.noise {
        Some(path) => load_noise(path)?,
        None => builtin_noise(job.noise_seed),
    };

    let context = GpuContext::new(job.power)?;
    let adapter = context.adapter_info.name.clone();
    let variant = job.variant();
    let resources = GrainResources::create(context, input.extent, noise.extent, variant)?;

    let output = run_passes(&resources, &input, &noise, job.params.as_ref())?;
    drop(resources);

    write_tga(&job.output, &output)?;
    tracing::info!(
        path = %job.output.display(),
        extent = %output.extent,
        "wrote output"
    );

    Ok(JobReport {
        extent: input.extent,
        noise_extent: noise.extent,
        source_channels: input.source_channels,
        variant,
        adapter,
        output: job.output.clone(),
    })
}
